// API server implementation using actix-web

use crate::api::handlers::ServerState;
use crate::api::{middleware, routes};
use crate::database_ops::db::Db;
use crate::database_ops::pg_store::PgCatalogReader;
use crate::database_ops::sampler::RandomSampler;
use crate::util::env as env_util;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::time::Instant;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    pub fn from_env() -> Result<Self> {
        env_util::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_util::env_opt("API_PORT") {
            Some(raw) => raw.trim().parse().context("Invalid API_PORT")?,
            None => 8080,
        };
        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    /// Detect the engine once, then serve until shutdown.
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        let engine = db.detect_engine().await?;
        let reader = PgCatalogReader::with_engine(db.clone(), engine);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            %engine,
            "starting catalog API server"
        );

        let sampler = web::Data::new(RandomSampler::new(reader));
        let db_data = web::Data::new(db);
        let state = web::Data::new(ServerState {
            started: Instant::now(),
            engine: engine.to_string(),
        });
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .app_data(db_data.clone())
                .app_data(sampler.clone())
                .app_data(state.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_routes::<PgCatalogReader>)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
