pub mod affluence;
pub mod analyzer;
pub mod baseline;
pub mod capacity;
pub mod crowd;
pub mod etl;
pub mod extractor;
pub mod merger;
pub mod pipeline;

pub use crate::domain::model::{Extracted, TransformResult};
pub use crate::domain::ports::{CapacitySignalSource, ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
