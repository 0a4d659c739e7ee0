pub mod bootstrap;
pub mod commands;

use clap::{Args, Parser, Subcommand};
use ration_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ration",
    about = "Ration ordering agent operator CLI",
    long_about = "Run a text ordering session against the dialogue agent, inspect configuration, and apply migrations.",
    after_help = "Examples:\n  ration chat\n  ration chat --session-id call-42 --resume\n  ration --config ./ration.toml config\n  ration --database-url sqlite://orders.db migrate"
)]
pub struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(subcommand)]
    command: Command,
}

/// Flags that sit above env and file values in configuration precedence.
#[derive(Debug, Default, Args)]
struct ConfigArgs {
    #[arg(long = "config", global = true, value_name = "PATH", help = "Config file to load (must exist)")]
    config_path: Option<PathBuf>,
    #[arg(long, global = true, value_name = "URL", help = "Override database.url")]
    database_url: Option<String>,
    #[arg(long, global = true, value_name = "LEVEL", help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, value_name = "FORMAT", help = "Override logging.format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
    #[arg(long, global = true, value_name = "PROVIDER", help = "Override llm.provider (disabled|openai|groq|ollama)")]
    llm_provider: Option<LlmProvider>,
    #[arg(long, global = true, value_name = "MODEL", help = "Override llm.model")]
    llm_model: Option<String>,
    #[arg(long, global = true, value_name = "N", help = "Override session.max_turns")]
    max_turns: Option<u32>,
    #[arg(long, global = true, value_name = "N", help = "Override session.max_llm_calls")]
    max_llm_calls: Option<u32>,
}

impl ConfigArgs {
    fn into_load_options(self) -> LoadOptions {
        LoadOptions {
            require_file: self.config_path.is_some(),
            config_path: self.config_path,
            overrides: ConfigOverrides {
                database_url: self.database_url,
                log_level: self.log_level,
                log_format: self.log_format,
                llm_provider: self.llm_provider,
                llm_model: self.llm_model,
                max_turns: self.max_turns,
                max_llm_calls: self.max_llm_calls,
            },
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Talk to the agent on stdin/stdout, one utterance per line")]
    Chat {
        #[arg(long, help = "Session identifier (a new UUID when omitted)")]
        session_id: Option<String>,
        #[arg(long, requires = "session_id", help = "Continue the stored session instead of starting fresh")]
        resume: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.config.into_load_options();

    // Commands load and report configuration themselves; logging only needs a
    // best-effort view of it.
    if let Ok(config) = AppConfig::load(options.clone()) {
        bootstrap::init_logging(&config);
    }

    let result = match cli.command {
        Command::Chat { session_id, resume } => commands::chat::run(&options, session_id, resume),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Migrate => commands::migrate::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use ration_core::config::{LlmProvider, LogFormat};

    use super::Cli;

    #[test]
    fn global_flags_become_load_overrides() {
        let cli = Cli::try_parse_from([
            "ration",
            "migrate",
            "--database-url",
            "sqlite://flag.db",
            "--llm-provider",
            "ollama",
            "--log-format",
            "json",
            "--max-turns",
            "12",
        ])
        .expect("flags should parse");

        let options = cli.config.into_load_options();
        assert!(!options.require_file);
        assert_eq!(options.overrides.database_url.as_deref(), Some("sqlite://flag.db"));
        assert_eq!(options.overrides.llm_provider, Some(LlmProvider::Ollama));
        assert_eq!(options.overrides.log_format, Some(LogFormat::Json));
        assert_eq!(options.overrides.max_turns, Some(12));
        assert_eq!(options.overrides.max_llm_calls, None);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let cli = Cli::try_parse_from(["ration", "--config", "custom.toml", "config"])
            .expect("flags should parse");

        let options = cli.config.into_load_options();
        assert!(options.require_file);
        assert_eq!(options.config_path.as_deref(), Some(std::path::Path::new("custom.toml")));
    }

    #[test]
    fn unknown_provider_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from(["ration", "--llm-provider", "bard", "config"]).is_err());
    }
}
