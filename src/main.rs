use restock_bot::core::filter::LinkFilter;
use restock_bot::core::purchase::{CheckoutGate, PurchaseSequencer};
use restock_bot::domain::model::PurchaseOutcome;
use restock_bot::domain::ports::FilterRequest;
use restock_bot::utils::error::ErrorSeverity;
use restock_bot::utils::{logger, validation::Validate};
use restock_bot::{
    AuditLog, BotConfig, BotError, BotOutcome, HttpStreamClient, RestockBot, StreamSupervisor,
    WebDriverClient, WorkerContext,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_format);
    tracing::info!("Starting restock-bot");
    tracing::debug!(
        "WebDriver: {} ({:?}), stream: {}, workers: {}",
        config.webdriver_url,
        config.browser,
        config.stream_endpoint,
        config.worker_count
    );

    match run(config).await {
        Ok(BotOutcome::Purchased(PurchaseOutcome::Completed { product_id, price })) => {
            tracing::info!("✅ Purchased {} for £{}", product_id, price);
            println!("✅ Purchased {} for £{}", product_id, price);
        }
        Ok(outcome) => {
            tracing::info!("Bot stopped: {:?}", outcome);
        }
        Err(e) => {
            tracing::error!(
                "❌ Bot failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 設定錯誤回 1，執行期錯誤回 2
            let exit_code = match e.severity() {
                ErrorSeverity::Critical => 1,
                _ => 2,
            };
            std::process::exit(exit_code);
        }
    }
}

async fn run(config: BotConfig) -> Result<BotOutcome, BotError> {
    // 驗證配置
    config.validate()?;
    let catalog_file = config.load_catalog()?;
    catalog_file.validate()?;
    let catalog = Arc::new(catalog_file.catalog()?);
    tracing::info!(
        "📦 Watching {} products at {}",
        catalog.len(),
        catalog_file.retailer.name
    );

    let driver = Arc::new(WebDriverClient::new(&config.webdriver_url, config.browser)?);
    let stream_client = Arc::new(HttpStreamClient::new(
        &config.stream_endpoint,
        &config.stream_credentials,
    )?);

    let supervisor = StreamSupervisor::new(
        stream_client,
        FilterRequest::follow(config.tracked_authors.clone()),
    );
    let filter = LinkFilter::new(&config.tracked_authors, &catalog_file.retailer, catalog);
    let sequencer = PurchaseSequencer::new(
        driver,
        catalog_file.retailer.clone(),
        catalog_file.purchase.clone(),
        config.retailer_credentials.clone(),
        CheckoutGate::new(),
    );
    let audit_log = Arc::new(AuditLog::open(&config.audit_log_path).await?);

    let context = WorkerContext {
        filter,
        sequencer,
        audit_log,
    };
    let bot = RestockBot::new(supervisor, context, config.worker_count);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 Interrupt received");
            on_signal.cancel();
        }
    });

    bot.run(cancel).await
}
