use clap::Parser;
use venue_insight::utils::{logger, validation::Validate};
use venue_insight::{CliConfig, EtlEngine, EtlError, LocalStorage, VenuePipeline};

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Venue scoring failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 低嚴重度錯誤仍視為失敗
    std::process::exit(e.severity().exit_code().max(1));
}

#[tokio::main]
async fn main() {
    let mut config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting venue-insight CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.load_estimator().and_then(|_| config.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let pipeline = match VenuePipeline::new(LocalStorage::default(), config) {
        Ok(pipeline) => pipeline,
        Err(e) => fail(&e),
    };
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(report) => {
            println!("✅ Scored {} venues", report.venues_scored);
            if report.venues_failed > 0 {
                println!(
                    "⚠️ {} venues skipped, see failures.json for details",
                    report.venues_failed
                );
            }
            println!("📁 Output saved to: {}", report.output_path);
        }
        Err(e) => fail(&e),
    }
}
