use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Default directive set for the catalog binaries when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,actix_server=warn";

/// Install the global fmt subscriber shared by every catalog binary.
///
/// `RUST_LOG` wins over `default_filter`. `LOG_COMPACT=1` drops file/line
/// locations for terse console output, and `NO_COLOR` disables ANSI styling.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let compact = crate::util::env::env_flag("LOG_COMPACT", false);
    let ansi = std::env::var_os("NO_COLOR").is_none();

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(!compact)
        .with_file(!compact)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}
