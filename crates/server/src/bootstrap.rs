use std::sync::Arc;

use procura_core::config::{AppConfig, ConfigError, LoadOptions};
use procura_db::{connect_with_settings, migrations, DbPool};
use procura_workflow::{GatewayError, HttpWorkflowGateway, WorkflowGateway};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: Arc<dyn WorkflowGateway>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("workflow gateway setup failed: {0}")]
    Gateway(#[source] GatewayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gateway = HttpWorkflowGateway::new(
        config.workflow_api.base_url.clone(),
        config.workflow_api.timeout_secs,
    )
    .map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.workflow_gateway_ready",
        correlation_id = "bootstrap",
        base_url = %config.workflow_api.base_url,
        "workflow template gateway configured"
    );

    Ok(Application { config, db_pool, gateway: Arc::new(gateway) })
}
