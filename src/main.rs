use clap::Parser;
use salon_booking::utils::error::ErrorSeverity;
use salon_booking::utils::{logger, validation::Validate};
use salon_booking::{web, AppConfig, AppState, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 載入配置 (日誌格式取決於配置，因此先於日誌初始化)
    let mut config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", args.config, e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // 初始化日誌
    logger::init_logger(args.verbose, config.logging.format);
    tracing::info!("Starting salon-booking");

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if args.check {
        println!("✅ Configuration {} is valid", args.config);
        return Ok(());
    }

    let state = AppState::new(config)?;

    if let Err(e) = web::serve(state).await {
        tracing::error!(
            "❌ Server failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());

        let exit_code = match e.severity() {
            ErrorSeverity::Critical => 3,
            _ => 1,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}
