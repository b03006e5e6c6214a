use crate::core::analyzer::VenueAnalyzer;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{
    Extracted, FailureKind, RawVenueRecord, TransformResult, VenueFailure, VenueRow,
};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{is_url, Validate};
use reqwest::Client;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use zip::write::{FileOptions, ZipWriter};

pub const CSV_FILE: &str = "venue_scores.csv";
pub const JSON_FILE: &str = "venue_scores.json";
pub const FAILURES_FILE: &str = "failures.json";

/// Venue feed -> scored venues -> CSV/JSON files.
pub struct VenuePipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
    analyzer: Arc<VenueAnalyzer>,
}

impl<S: Storage, C: ConfigProvider> VenuePipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let analyzer = VenueAnalyzer::new(config.estimator())?;
        Ok(Self::with_analyzer(storage, config, analyzer))
    }

    pub fn with_analyzer(storage: S, config: C, analyzer: VenueAnalyzer) -> Self {
        Self {
            storage,
            config,
            client: Client::new(),
            analyzer: Arc::new(analyzer),
        }
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    async fn fetch_feed(&self) -> Result<serde_json::Value> {
        let location = self.config.feed_location();

        if is_url(location) {
            tracing::debug!("Making API request to: {}", location);
            let mut request = self.client.get(location);
            if let Some(timeout) = self.config.request_timeout() {
                request = request.timeout(timeout);
            }
            let response = request.send().await?;
            tracing::debug!("API response status: {}", response.status());
            let response = response.error_for_status()?;
            Ok(response.json().await?)
        } else {
            tracing::debug!("Reading venue feed from: {}", location);
            let bytes = self.storage.read_file(location).await?;
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

/// Best-effort key for a feed element that may not even parse.
fn element_key(item: &serde_json::Value, index: usize) -> String {
    let text = |field: &str| item.get(field).and_then(|v| v.as_str()).map(str::to_string);
    text("venue_key")
        .or_else(|| match (text("source"), text("id")) {
            (Some(source), Some(id)) => Some(format!("{}:{}", source, id)),
            _ => None,
        })
        .unwrap_or_else(|| format!("#{}", index))
}

/// Parses and validates each feed element on its own, so one bad element
/// only costs that element.
pub fn parse_feed(payload: serde_json::Value) -> Result<Extracted> {
    let items = match payload {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut obj) => match obj.remove("venues") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(EtlError::ProcessingError {
                    message: "venue feed must be a JSON array or an object with a 'venues' array"
                        .to_string(),
                })
            }
        },
        _ => {
            return Err(EtlError::ProcessingError {
                message: "venue feed must be a JSON array".to_string(),
            })
        }
    };

    let mut extracted = Extracted::default();
    for (index, item) in items.into_iter().enumerate() {
        let key = element_key(&item, index);
        let parsed = serde_json::from_value::<RawVenueRecord>(item)
            .map_err(|e| EtlError::malformed(&key, "record", e.to_string()))
            .and_then(|record| record.validate().map(|_| record));

        match parsed {
            Ok(record) => extracted.records.push(record),
            Err(e) => {
                tracing::warn!("⚠️ Skipping venue record {}: {}", key, e);
                extracted.rejected.push(VenueFailure {
                    venue_key: key,
                    kind: FailureKind::MalformedInput,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(extracted)
}

fn failure_kind(error: &EtlError) -> FailureKind {
    match error {
        EtlError::MalformedInput { .. } => FailureKind::MalformedInput,
        EtlError::Conflict { .. } => FailureKind::Conflict,
        _ => FailureKind::Processing,
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for VenuePipeline<S, C> {
    async fn extract(&self) -> Result<Extracted> {
        tracing::info!("🚀 Reading venue feed: {}", self.config.feed_location());
        let extracted = parse_feed(self.fetch_feed().await?)?;
        tracing::info!(
            "📊 Extracted {} venue records ({} rejected)",
            extracted.records.len(),
            extracted.rejected.len()
        );
        Ok(extracted)
    }

    async fn transform(&self, data: Extracted) -> Result<TransformResult> {
        let mut groups: BTreeMap<String, Vec<RawVenueRecord>> = BTreeMap::new();
        for record in data.records {
            groups.entry(record.group_key()).or_default().push(record);
        }
        tracing::info!(
            "🔧 Scoring {} venues with {} workers",
            groups.len(),
            self.config.workers()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers().max(1)));
        let mut tasks = JoinSet::new();

        for (key, group) in groups {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| EtlError::ProcessingError {
                    message: format!("worker pool closed: {}", e),
                })?;
            let analyzer = Arc::clone(&self.analyzer);
            tasks.spawn_blocking(move || {
                let outcome = analyzer.analyze(&group);
                drop(permit);
                (key, outcome)
            });
        }

        let mut result = TransformResult {
            scored: Vec::new(),
            failures: data.rejected,
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(scored))) => result.scored.push(scored),
                Ok((key, Err(e))) => {
                    tracing::warn!("⚠️ Venue {} dropped: {}", key, e);
                    result.failures.push(VenueFailure {
                        venue_key: key,
                        kind: failure_kind(&e),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!("❌ Venue worker failed: {}", e);
                    result.failures.push(VenueFailure {
                        venue_key: "<unknown>".to_string(),
                        kind: FailureKind::Processing,
                        message: e.to_string(),
                    });
                }
            }
        }

        // workers finish in any order
        result
            .scored
            .sort_by(|a, b| a.venue.venue_key.cmp(&b.venue.venue_key));
        result.failures.sort_by(|a, b| a.venue_key.cmp(&b.venue_key));

        tracing::info!(
            "✅ Transform complete: {} venues scored, {} failures",
            result.scored.len(),
            result.failures.len()
        );
        Ok(result)
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let collected_at = chrono::Utc::now().to_rfc3339();
        let rows: Vec<VenueRow> = result
            .scored
            .iter()
            .map(|scored| VenueRow::from_scored(scored, &collected_at))
            .collect();

        let mut files: Vec<(&str, Vec<u8>)> = Vec::new();
        for format in self.config.output_formats() {
            match format.as_str() {
                "csv" => files.push((CSV_FILE, rows_to_csv(&rows)?)),
                "json" => files.push((JSON_FILE, serde_json::to_vec_pretty(&rows)?)),
                other => {
                    return Err(EtlError::InvalidConfigValueError {
                        field: "output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Supported formats: csv, json".to_string(),
                    })
                }
            }
        }
        if !result.failures.is_empty() {
            files.push((FAILURES_FILE, serde_json::to_vec_pretty(&result.failures)?));
        }

        if self.config.compress_output() {
            let archive_path = self.output_file(self.config.archive_name());
            tracing::debug!("Creating ZIP file with {} files", files.len());

            let zip_data = {
                let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
                for (name, data) in &files {
                    zip.start_file::<_, ()>(*name, FileOptions::default())?;
                    zip.write_all(data)?;
                }
                let cursor = zip.finish()?;
                cursor.into_inner()
            };

            self.storage.write_file(&archive_path, &zip_data).await?;
            tracing::info!("📦 Output saved: {} ({} bytes)", archive_path, zip_data.len());
            return Ok(archive_path);
        }

        let mut primary = None;
        for (name, data) in &files {
            let path = self.output_file(name);
            self.storage.write_file(&path, data).await?;
            tracing::info!("💾 Wrote {}", path);
            primary.get_or_insert(path);
        }

        Ok(primary.unwrap_or_else(|| self.config.output_path().to_string()))
    }
}

pub fn rows_to_csv(rows: &[VenueRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::estimator::EstimatorConfig;
    use httpmock::prelude::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        feed_location: String,
        output_path: String,
        output_formats: Vec<String>,
        compress: bool,
        estimator: EstimatorConfig,
    }

    impl MockConfig {
        fn new(feed_location: impl Into<String>) -> Self {
            Self {
                feed_location: feed_location.into(),
                output_path: "out".to_string(),
                output_formats: vec!["csv".to_string()],
                compress: false,
                estimator: EstimatorConfig::default(),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn feed_location(&self) -> &str {
            &self.feed_location
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn compress_output(&self) -> bool {
            self.compress
        }

        fn workers(&self) -> usize {
            2
        }

        fn estimator(&self) -> &EstimatorConfig {
            &self.estimator
        }

        fn request_timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(5))
        }
    }

    fn feed() -> serde_json::Value {
        serde_json::json!([
            {
                "source": "google", "id": "g-1", "venue_key": "alpha", "name": "Bar Alpha",
                "categories": ["wine_bar"], "price_level": 3, "review_count": 80,
                "reviews": ["cozy little spot", "fits about 40 people"]
            },
            {
                "source": "populartimes", "id": "pt-1", "venue_key": "alpha", "name": "Bar Alpha",
                "busy_percent": 80, "popular_hours": {"20": 70, "21": 75, "22": 65, "12": 10}
            },
            {
                "source": "google", "id": "g-2", "name": "Beta Pub",
                "categories": ["pub"], "review_count": 10
            },
            {
                "source": "google", "id": "g-3", "name": "Broken", "price_level": -2
            },
            {
                "source": "google", "name": "No id"
            }
        ])
    }

    #[test]
    fn test_parse_feed_isolates_bad_elements() {
        let extracted = parse_feed(feed()).unwrap();

        assert_eq!(extracted.records.len(), 3);
        assert_eq!(extracted.rejected.len(), 2);
        assert_eq!(extracted.rejected[0].venue_key, "google:g-3");
        assert_eq!(extracted.rejected[0].kind, FailureKind::MalformedInput);
        assert_eq!(extracted.rejected[1].venue_key, "#4");
    }

    #[test]
    fn test_parse_feed_accepts_wrapped_object() {
        let wrapped = serde_json::json!({"venues": [{"source": "google", "id": "g-1", "name": "A"}]});
        assert_eq!(parse_feed(wrapped).unwrap().records.len(), 1);

        assert!(parse_feed(serde_json::json!("nope")).is_err());
        assert!(parse_feed(serde_json::json!({"items": []})).is_err());
    }

    #[tokio::test]
    async fn test_extract_from_storage() {
        let storage = MockStorage::new();
        storage
            .put("feeds/venues.json", feed().to_string().as_bytes())
            .await;
        let pipeline =
            VenuePipeline::new(storage, MockConfig::new("feeds/venues.json")).unwrap();

        let extracted = pipeline.extract().await.unwrap();
        assert_eq!(extracted.records.len(), 3);
    }

    #[tokio::test]
    async fn test_extract_from_http_feed() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/venues");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(feed());
        });

        let pipeline =
            VenuePipeline::new(MockStorage::new(), MockConfig::new(server.url("/venues"))).unwrap();
        let extracted = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert_eq!(extracted.records.len(), 3);
        assert_eq!(extracted.rejected.len(), 2);
    }

    #[tokio::test]
    async fn test_extract_http_error_is_reported() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/venues");
            then.status(500);
        });

        let pipeline =
            VenuePipeline::new(MockStorage::new(), MockConfig::new(server.url("/venues"))).unwrap();
        let err = pipeline.extract().await.unwrap_err();

        api_mock.assert();
        assert!(matches!(err, EtlError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_transform_groups_and_scores() {
        let pipeline = VenuePipeline::new(MockStorage::new(), MockConfig::new("unused")).unwrap();
        let result = pipeline.transform(parse_feed(feed()).unwrap()).await.unwrap();

        assert_eq!(result.scored.len(), 2);
        assert_eq!(result.failures.len(), 2);

        let alpha = &result.scored[0];
        assert_eq!(alpha.venue.venue_key, "alpha");
        assert_eq!(alpha.venue.provider_ids.len(), 2);
        assert_eq!(alpha.capacity.capacity, 70);
        assert_eq!(alpha.crowd.best_time_to_visit.as_deref(), Some("12:00"));

        let beta = &result.scored[1];
        assert_eq!(beta.venue.venue_key, "google:g-2");
        assert_eq!(beta.capacity.capacity, 60);
    }

    #[tokio::test]
    async fn test_transform_reports_conflicting_group() {
        let payload = serde_json::json!([
            {"source": "google", "id": "g-1", "venue_key": "k", "name": "A",
             "location": {"lat": 45.43, "lng": 12.33}},
            {"source": "populartimes", "id": "p-1", "venue_key": "k", "name": "A",
             "location": {"lat": 45.53, "lng": 12.33}},
            {"source": "google", "id": "g-2", "name": "B"}
        ]);

        let pipeline = VenuePipeline::new(MockStorage::new(), MockConfig::new("unused")).unwrap();
        let result = pipeline.transform(parse_feed(payload).unwrap()).await.unwrap();

        assert_eq!(result.scored.len(), 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].venue_key, "k");
        assert_eq!(result.failures[0].kind, FailureKind::Conflict);
    }

    #[tokio::test]
    async fn test_load_writes_csv_and_failures() {
        let storage = MockStorage::new();
        let pipeline = VenuePipeline::new(storage.clone(), MockConfig::new("unused")).unwrap();

        let result = pipeline.transform(parse_feed(feed()).unwrap()).await.unwrap();
        let output_path = pipeline.load(result).await.unwrap();

        assert_eq!(output_path, "out/venue_scores.csv");
        let csv_bytes = storage.get_file("out/venue_scores.csv").await.unwrap();
        let mut reader = csv::Reader::from_reader(csv_bytes.as_slice());
        let rows: Vec<VenueRow> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].venue_key, "alpha");
        assert_eq!(rows[0].capacity_signals, "explicit_mention=40|price_adjustment=+30");
        assert_eq!(rows[0].peak_hours, "21");
        assert_eq!(rows[1].bar_types, "pub");
        assert_eq!(rows[1].current_popularity, None);

        assert!(storage.get_file("out/failures.json").await.is_some());
        assert!(storage.get_file("out/venue_scores.json").await.is_none());
    }

    #[tokio::test]
    async fn test_load_bundles_zip() {
        let storage = MockStorage::new();
        let mut config = MockConfig::new("unused");
        config.output_formats = vec!["csv".to_string(), "json".to_string()];
        config.compress = true;
        let pipeline = VenuePipeline::new(storage.clone(), config).unwrap();

        let output_path = pipeline.load(TransformResult::default()).await.unwrap();
        assert_eq!(output_path, "out/venue_scores.zip");

        let zip_bytes = storage.get_file("out/venue_scores.zip").await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();

        // no failures, so no failures.json
        assert_eq!(names, vec!["venue_scores.csv", "venue_scores.json"]);
    }

    #[tokio::test]
    async fn test_load_rejects_unknown_format() {
        let mut config = MockConfig::new("unused");
        config.output_formats = vec!["xlsx".to_string()];
        let pipeline = VenuePipeline::new(MockStorage::new(), config).unwrap();

        let err = pipeline.load(TransformResult::default()).await.unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfigValueError { .. }));
    }
}
