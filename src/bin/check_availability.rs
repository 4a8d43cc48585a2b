use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use salon_booking::adapters::SquareClient;
use salon_booking::core::availability::{search_window, AvailabilityAggregator, AvailabilityRequest};
use salon_booking::core::session::{validate_selection, SelectedService, StaffPreference};
use salon_booking::domain::ports::{BookingPlatform, ConfigProvider};
use salon_booking::utils::error::{BookingError, Result};
use salon_booking::AppConfig;

/// 直接對 Square 執行 availability 搜尋，列出每種搜尋方式的結果
#[derive(Debug, Parser)]
#[command(name = "check_availability")]
#[command(about = "Run the availability aggregation against Square and print every scope")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "salon.toml")]
    config: String,

    /// Service variation id, optionally `<id>:<quantity>`; repeatable
    #[arg(short, long = "service", required = true)]
    services: Vec<String>,

    /// Team member id; omit for any staff
    #[arg(long)]
    staff: Option<String>,

    /// First day to search (YYYY-MM-DD), defaults to today
    #[arg(long)]
    start: Option<NaiveDate>,

    #[arg(long)]
    days: Option<i64>,
}

fn parse_service(raw: &str) -> Result<SelectedService> {
    let (id, quantity) = match raw.split_once(':') {
        Some((id, qty)) => {
            let quantity = qty
                .parse::<u32>()
                .map_err(|_| BookingError::validation(format!("Invalid quantity in '{}'", raw)))?;
            (id, quantity)
        }
        None => (raw, 1),
    };
    Ok(SelectedService {
        variation_id: id.trim().to_string(),
        quantity,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = AppConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config))?;
    let platform: Arc<dyn BookingPlatform> = Arc::new(SquareClient::new(&config.square)?);

    println!("🔍 檢查 {} 的可預約時段", config.location_id());

    let catalog = platform
        .list_services()
        .await
        .context("Failed to load the service catalog")?;
    let submitted = args
        .services
        .iter()
        .map(|raw| parse_service(raw))
        .collect::<Result<Vec<_>>>()?;
    let services = validate_selection(submitted, &catalog, config.max_quantity_per_service())?;

    let staff = match args.staff {
        Some(id) => StaffPreference::Member(id),
        None => StaffPreference::Any,
    };

    let (start_at, end_at) = search_window(
        args.start,
        args.days,
        Utc::now(),
        config.default_search_days(),
        config.max_search_days(),
    )?;

    let aggregator = AvailabilityAggregator::new(platform, config.location_id());
    let request = AvailabilityRequest {
        services,
        staff,
        start_at,
        end_at,
    };
    let result = aggregator.search(&request, &catalog).await?;

    println!("📊 各搜尋方式:");
    for outcome in &result.scopes {
        match &outcome.error {
            Some(error) => println!("  - {}: ❌ {}", outcome.scope.label(), error),
            None => println!("  - {}: {} 筆", outcome.scope.label(), outcome.returned),
        }
    }

    println!(
        "\n✅ 合併後 {} 個時段 (每段需 {} 分鐘)",
        result.slots.len(),
        result.required_minutes
    );
    for slot in &result.slots {
        println!(
            "  {}  {} 分鐘  [{}]",
            slot.start_at.format("%Y-%m-%d %H:%M"),
            slot.total_minutes(),
            slot.team_member_ids().collect::<Vec<_>>().join(", ")
        );
    }

    Ok(())
}
