use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::toml_config::LogFormat;

fn default_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose {
        "salon_booking=debug,tower_http=debug,info"
    } else {
        "salon_booking=info,tower_http=info"
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_logger(verbose: bool, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(default_filter(verbose));

    match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init(),
        // JSON 格式方便集中式日誌收集
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false)
                    .json(),
            )
            .init(),
    }
}
