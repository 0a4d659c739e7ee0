use std::sync::Arc;

use ration_agent::llm::client_from_config;
use ration_agent::runtime::AgentRuntime;
use ration_core::config::{AppConfig, LogFormat};
use ration_db::{connect_from_config, migrations, DbPool, SqlOrderRepository, SqlSessionStore};
use thiserror::Error;
use tracing::{info, Level};

pub struct Application {
    pub db_pool: DbPool,
    pub agent_runtime: AgentRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("language model client setup failed: {0}")]
    LlmClient(#[source] anyhow::Error),
}

impl BootstrapError {
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::DatabaseConnect(_) => "db_connectivity",
            Self::Migration(_) => "migration",
            Self::LlmClient(_) => "llm_client",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::DatabaseConnect(_) => 4,
            Self::Migration(_) => 5,
            Self::LlmClient(_) => 6,
        }
    }
}

/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    // A subscriber may already be installed (tests); keep the existing one.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub async fn bootstrap_with_config(config: &AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let llm = client_from_config(config).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "language model client ready"
    );

    let agent_runtime = AgentRuntime::from_config(
        config,
        Arc::new(SqlSessionStore::new(db_pool.clone())),
        Arc::new(SqlOrderRepository::new(db_pool.clone())),
        llm,
    );

    Ok(Application { db_pool, agent_runtime })
}
