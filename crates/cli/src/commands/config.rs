use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ration_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

/// One rendered configuration field and where its value may come from.
struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

impl Field {
    fn new(key: &'static str, env_keys: &'static [&'static str], value: impl Into<String>) -> Self {
        Self { key, env_keys, value: value.into() }
    }
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overridden = overridden_flags(&options.overrides);

    let mut lines = vec![
        "effective config (source precedence: overrides > env > file > default):".to_string()
    ];
    for field in fields(&config) {
        let source = match overridden.iter().find(|(key, _)| *key == field.key) {
            Some((_, flag)) => format!("override ({flag})"),
            None => field_source(
                field.key,
                field.env_keys,
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        };
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_secret(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    vec![
        Field::new("database.url", &["RATION_DATABASE_URL"], config.database.url.as_str()),
        Field::new(
            "database.max_connections",
            &["RATION_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        Field::new(
            "database.timeout_secs",
            &["RATION_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        Field::new("llm.provider", &["RATION_LLM_PROVIDER"], config.llm.provider.as_str()),
        Field::new("llm.model", &["RATION_LLM_MODEL"], config.llm.model.as_str()),
        Field::new(
            "llm.base_url",
            &["RATION_LLM_BASE_URL"],
            config.llm_base_url().unwrap_or_else(|| "<unset>".to_string()),
        ),
        Field::new("llm.api_key", &["RATION_LLM_API_KEY"], api_key),
        Field::new("llm.timeout_secs", &["RATION_LLM_TIMEOUT_SECS"], config.llm.timeout_secs.to_string()),
        Field::new(
            "session.max_cart_items",
            &["RATION_SESSION_MAX_CART_ITEMS"],
            config.session.max_cart_items.to_string(),
        ),
        Field::new(
            "session.max_item_quantity",
            &["RATION_SESSION_MAX_ITEM_QUANTITY"],
            config.session.max_item_quantity.to_string(),
        ),
        Field::new("session.max_turns", &["RATION_SESSION_MAX_TURNS"], config.session.max_turns.to_string()),
        Field::new(
            "session.max_llm_calls",
            &["RATION_SESSION_MAX_LLM_CALLS"],
            config.session.max_llm_calls.to_string(),
        ),
        Field::new("rate_limit.burst", &["RATION_RATE_LIMIT_BURST"], config.rate_limit.burst.to_string()),
        Field::new(
            "rate_limit.refill_per_sec",
            &["RATION_RATE_LIMIT_REFILL_PER_SEC"],
            config.rate_limit.refill_per_sec.to_string(),
        ),
        Field::new(
            "logging.level",
            &["RATION_LOGGING_LEVEL", "RATION_LOG_LEVEL"],
            config.logging.level.as_str(),
        ),
        Field::new(
            "logging.format",
            &["RATION_LOGGING_FORMAT", "RATION_LOG_FORMAT"],
            format!("{:?}", config.logging.format).to_lowercase(),
        ),
    ]
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("ration.toml"), PathBuf::from("config/ration.toml")]
        .into_iter()
        .find(|path| path.exists())
}

/// Config keys set by command-line flags, paired with the flag that set them.
fn overridden_flags(overrides: &ConfigOverrides) -> Vec<(&'static str, &'static str)> {
    [
        ("database.url", "--database-url", overrides.database_url.is_some()),
        ("logging.level", "--log-level", overrides.log_level.is_some()),
        ("logging.format", "--log-format", overrides.log_format.is_some()),
        ("llm.provider", "--llm-provider", overrides.llm_provider.is_some()),
        ("llm.model", "--llm-model", overrides.llm_model.is_some()),
        ("session.max_turns", "--max-turns", overrides.max_turns.is_some()),
        ("session.max_llm_calls", "--max-llm-calls", overrides.max_llm_calls.is_some()),
    ]
    .into_iter()
    .filter(|(_, _, set)| *set)
    .map(|(key, flag, _)| (key, flag))
    .collect()
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}

/// Keeps a vendor prefix such as `gsk_` or `sk-` and hides the rest.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(['-', '_']) {
        Some(index) if index <= 4 => format!("{}***", &trimmed[..=index]),
        _ => "<redacted>".to_string(),
    }
}
