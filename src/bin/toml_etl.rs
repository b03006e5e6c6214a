use clap::Parser;
use venue_insight::config::toml_config::TomlConfig;
use venue_insight::core::ConfigProvider;
use venue_insight::utils::{logger, validation::Validate};
use venue_insight::{EtlEngine, LocalStorage, VenuePipeline};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Venue scoring run driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "venue-insight.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override worker count from config
    #[arg(long)]
    workers: Option<usize>,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置 (日誌格式由配置決定)
    let loaded = TomlConfig::from_file(&args.config);
    let json_logs = loaded.as_ref().map(|c| c.json_logs()).unwrap_or(false);
    if json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based venue scoring");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(workers) = args.workers {
        config.transform.workers = Some(workers);
        tracing::info!("🔧 Worker count overridden to: {}", workers);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.severity().exit_code().max(1));
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = VenuePipeline::new(LocalStorage::default(), config)?;
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            println!("✅ Scored {} venues", report.venues_scored);
            if report.venues_failed > 0 {
                println!("⚠️ {} venues skipped", report.venues_failed);
            }
            println!("📁 Output saved to: {}", report.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Venue scoring failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code().max(1));
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("0")
    );
    println!("  Source: {} ({})", config.feed_location(), config.source.r#type);
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    println!("  Workers: {}", config.workers());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    let estimator = config.estimator();

    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📡 Venue Feed:");
    println!("  Location: {}", config.feed_location());
    if let Some(timeout) = config.request_timeout() {
        println!("  Timeout: {:?}", timeout);
    }

    println!();
    println!("🪑 Capacity Tables:");
    println!("  Size keywords: {}", estimator.text.keywords.len());
    for entry in &estimator.capacity.categories {
        println!("  {} -> {}", entry.category, entry.value);
    }
    println!("  default -> {}", estimator.capacity.default_baseline);
    println!(
        "  Price step: +{} per level, review uplift above {} reviews",
        estimator.capacity.price_multiplier, estimator.capacity.review_volume_threshold
    );

    println!();
    println!("📈 Affluence Weights:");
    let w = &estimator.affluence.weights;
    println!(
        "  busy {} / peak {} / reviews {} / check-ins {}",
        w.current_busy, w.peak_density, w.review_velocity, w.checkin_frequency
    );

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if config.compress_output() {
        println!("  Compression: {} (ZIP)", config.archive_name());
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
