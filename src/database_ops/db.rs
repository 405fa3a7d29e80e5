use crate::util::env as env_util;
use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Storage engines we know how to randomize rows on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Postgres,
    CockroachDb,
    Sqlite,
    MySql,
    MariaDb,
    Unknown,
}

/// Engine -> native random-ordering expression. The pool speaks the Postgres
/// wire protocol, so only Postgres and CockroachDB are reachable through `Db`;
/// the other rows serve `PgCatalogReader::with_engine` callers.
const RANDOM_PRIMITIVES: &[(Engine, &str)] = &[
    (Engine::Postgres, "RANDOM()"),
    (Engine::CockroachDb, "random()"),
    (Engine::Sqlite, "RANDOM()"),
    (Engine::MySql, "RAND()"),
    (Engine::MariaDb, "RAND()"),
];

const FALLBACK_RANDOM_PRIMITIVE: &str = "RANDOM()";

impl Engine {
    /// Classify the banner returned by `SELECT version()`.
    pub fn from_version_banner(banner: &str) -> Self {
        let b = banner.to_ascii_lowercase();
        // Cockroach and MariaDB banners also mention their upstream lineage
        if b.contains("cockroachdb") {
            Engine::CockroachDb
        } else if b.contains("mariadb") {
            Engine::MariaDb
        } else if b.contains("postgresql") {
            Engine::Postgres
        } else if b.contains("mysql") {
            Engine::MySql
        } else if b.contains("sqlite") {
            Engine::Sqlite
        } else {
            Engine::Unknown
        }
    }

    pub fn random_primitive(self) -> &'static str {
        RANDOM_PRIMITIVES
            .iter()
            .find(|(engine, _)| *engine == self)
            .map(|(_, f)| *f)
            .unwrap_or(FALLBACK_RANDOM_PRIMITIVE)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::Postgres => "postgresql",
            Engine::CockroachDb => "cockroachdb",
            Engine::Sqlite => "sqlite",
            Engine::MySql => "mysql",
            Engine::MariaDb => "mariadb",
            Engine::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let use_prepared = env_util::env_flag("USE_PREPARED", true);
        let mut connect_options =
            PgConnectOptions::from_str(database_url).context("invalid database URL")?;

        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        if !use_prepared {
            // PgBouncer txn mode safe
            connect_options = connect_options.statement_cache_capacity(0);
        }

        // Bulk imports may trade durability of the last few commits for speed.
        let fast_ingest = env_util::env_flag("FAST_INGEST", false);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if fast_ingest {
                        // Best-effort; ignore errors to avoid blocking startup in restricted envs
                        let _ = sqlx::query("SET synchronous_commit = 'off'")
                            .execute(&mut *conn)
                            .await;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options)
            .await
            .context("failed to connect to database")?;
        info!(max_connections, fast_ingest, "connected to db");
        Ok(Self { pool })
    }

    /// Connect using the URL resolved from the environment and `DB_MAX_CONNS`.
    pub async fn from_env() -> Result<Self> {
        let url = env_util::db_url()?;
        let max_connections: u32 = env_util::env_parse("DB_MAX_CONNS", 5u32);
        Self::connect(&url, max_connections).await
    }

    /// Ask the connected server what it is.
    pub async fn detect_engine(&self) -> Result<Engine> {
        let banner: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&self.pool)
            .await
            .context("failed to read server version")?;
        let engine = Engine::from_version_banner(&banner);
        if engine == Engine::Unknown {
            warn!(%banner, fallback = FALLBACK_RANDOM_PRIMITIVE, "unrecognized database engine");
        } else {
            info!(%engine, "database engine detected");
        }
        Ok(engine)
    }

    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, bool>("SELECT true")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_version_banners() {
        assert_eq!(
            Engine::from_version_banner(
                "PostgreSQL 16.2 on x86_64-pc-linux-gnu, compiled by gcc 12.2.0, 64-bit"
            ),
            Engine::Postgres
        );
        assert_eq!(
            Engine::from_version_banner("CockroachDB CCL v23.1.11 (x86_64-pc-linux-gnu)"),
            Engine::CockroachDb
        );
        assert_eq!(
            Engine::from_version_banner("10.11.6-MariaDB-0+deb12u1"),
            Engine::MariaDb
        );
        assert_eq!(Engine::from_version_banner("8.0.36 MySQL Community Server"), Engine::MySql);
        assert_eq!(Engine::from_version_banner("SQLite 3.45.1"), Engine::Sqlite);
        assert_eq!(Engine::from_version_banner("Oracle Database 19c"), Engine::Unknown);
    }

    #[test]
    fn picks_native_random_function() {
        assert_eq!(Engine::Postgres.random_primitive(), "RANDOM()");
        assert_eq!(Engine::Sqlite.random_primitive(), "RANDOM()");
        assert_eq!(Engine::MySql.random_primitive(), "RAND()");
        assert_eq!(Engine::MariaDb.random_primitive(), "RAND()");
        assert_eq!(Engine::Unknown.random_primitive(), FALLBACK_RANDOM_PRIMITIVE);
    }
}
