use ration_core::config::{AppConfig, LoadOptions};
use ration_db::{connect_from_config, migrations, DbPool};

use crate::bootstrap::BootstrapError;
use crate::commands::CommandResult;

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("migrate", error),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::runtime_failure("migrate", error),
    };

    let result = runtime.block_on(async {
        let pool: DbPool =
            connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
        let applied = migrations::run_pending(&pool).await.map_err(BootstrapError::Migration);
        pool.close().await;
        applied
    });

    match result {
        Ok(()) => {
            tracing::info!(event_name = "cli.migrate.applied", "pending migrations applied");
            CommandResult::success("migrate", "applied pending migrations")
        }
        Err(error) => CommandResult::bootstrap_failure("migrate", &error),
    }
}
