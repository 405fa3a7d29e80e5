// HTTP API server binary: health check and random product sampling.

use anyhow::Result;
use catalog_sync::api::ApiServer;
use catalog_sync::database_ops::db::Db;
use catalog_sync::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::bootstrap_cli("api_server");

    env_util::preflight_check(
        "api server",
        &[],
        &["DATABASE_URL", "DB_URL", "DB_HOST", "API_HOST", "API_PORT", "ALLOWED_ORIGINS"],
    )?;

    let server = ApiServer::from_env()?;
    let db = Db::from_env().await?;
    tracing::info!("database connected");

    server.run(db).await
}
