use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::RunMonitor;
use tokio::sync::Mutex;

/// Summary of one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub output_path: String,
    pub venues_scored: usize,
    pub venues_failed: usize,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: Mutex<RunMonitor>,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitoring: bool) -> Self {
        Self {
            pipeline,
            monitor: Mutex::new(RunMonitor::new(monitoring)),
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("🚀 Starting venue scoring run");
        let mut monitor = self.monitor.lock().await;

        tracing::info!("📥 Extracting venue records...");
        let extracted = self.pipeline.extract().await?;
        monitor.end_phase("extract");

        tracing::info!("🔧 Estimating capacity and affluence...");
        let result = self.pipeline.transform(extracted).await?;
        monitor.end_phase("transform");

        let venues_scored = result.scored.len();
        let venues_failed = result.failures.len();

        tracing::info!("💾 Writing results...");
        let output_path = self.pipeline.load(result).await?;
        monitor.end_phase("load");
        monitor.log_final_stats();

        tracing::info!(
            "✅ Run complete: {} venues scored, {} failed, output at {}",
            venues_scored,
            venues_failed,
            output_path
        );

        Ok(RunReport {
            output_path,
            venues_scored,
            venues_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{
        Extracted, FailureKind, RawVenueRecord, TransformResult, VenueFailure,
    };
    use crate::utils::error::EtlError;
    use async_trait::async_trait;

    struct CannedPipeline {
        fail_load: bool,
    }

    #[async_trait]
    impl Pipeline for CannedPipeline {
        async fn extract(&self) -> Result<Extracted> {
            Ok(Extracted {
                records: vec![RawVenueRecord::new("google", "g-1", "Bar")],
                rejected: vec![VenueFailure {
                    venue_key: "google:g-9".to_string(),
                    kind: FailureKind::MalformedInput,
                    message: "bad".to_string(),
                }],
            })
        }

        async fn transform(&self, data: Extracted) -> Result<TransformResult> {
            Ok(TransformResult {
                scored: Vec::new(),
                failures: data.rejected,
            })
        }

        async fn load(&self, _result: TransformResult) -> Result<String> {
            if self.fail_load {
                return Err(EtlError::ProcessingError {
                    message: "disk full".to_string(),
                });
            }
            Ok("out/venue_scores.csv".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_reports_counts() {
        let engine = EtlEngine::new_with_monitoring(CannedPipeline { fail_load: false }, true);
        let report = engine.run().await.unwrap();

        assert_eq!(
            report,
            RunReport {
                output_path: "out/venue_scores.csv".to_string(),
                venues_scored: 0,
                venues_failed: 1,
            }
        );
    }

    #[test]
    fn test_run_propagates_load_error() {
        let engine = EtlEngine::new(CannedPipeline { fail_load: true });
        assert!(tokio_test::block_on(engine.run()).is_err());
    }
}
