use crate::config::estimator::EstimatorConfig;
use crate::domain::model::{CapacitySignal, Extracted, TransformResult, UnifiedVenueRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    /// Local path (relative to storage) or http(s) URL of the venue feed.
    fn feed_location(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn compress_output(&self) -> bool;
    fn workers(&self) -> usize;
    fn estimator(&self) -> &EstimatorConfig;

    fn request_timeout(&self) -> Option<Duration> {
        None
    }

    fn archive_name(&self) -> &str {
        "venue_scores.zip"
    }
}

/// Additional capacity evidence fed into the estimator next to review text,
/// e.g. seat counts from an image-analysis service.
pub trait CapacitySignalSource: Send + Sync {
    fn name(&self) -> &str;
    fn signals(&self, venue: &UnifiedVenueRecord) -> Vec<CapacitySignal>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extracted>;
    async fn transform(&self, data: Extracted) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
