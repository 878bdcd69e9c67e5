//! Region boundary collection: name lookup for search and the source of
//! mask holes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::NAME_KEYS;
use crate::geometry::{Bounds, Feature, FeatureCollection};
use crate::mask::Mask;
use crate::retry::{is_retryable_http_status, is_retryable_network_error, retry_async, Permanent, RetryConfig};

/// First non-empty string among `NAME_KEYS`.
pub fn display_name(properties: Option<&Map<String, Value>>) -> Option<String> {
    let props = properties?;
    NAME_KEYS
        .iter()
        .filter_map(|k| props.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryIndex {
    /// Every feature, named or not; the full-country mask uses all of them.
    features: Vec<Feature>,
    by_name: HashMap<String, usize>,
    /// Names in first-registration order, for the search list.
    names: Vec<String>,
}

impl BoundaryIndex {
    pub fn from_collection(collection: FeatureCollection) -> Self {
        let mut index = Self::default();
        for feature in collection.features {
            let slot = index.features.len();
            if let Some(name) = display_name(feature.properties.as_ref()) {
                // a repeated name points at its latest feature
                if index.by_name.insert(name.clone(), slot).is_none() {
                    index.names.push(name);
                }
            }
            index.features.push(feature);
        }
        index
    }

    pub fn parse(text: &str) -> Result<Self> {
        let fc: FeatureCollection = serde_json::from_str(text).context("parse boundary collection")?;
        Ok(Self::from_collection(fc))
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.by_name.get(name).map(|&i| &self.features[i])
    }

    pub fn bounds_of(&self, name: &str) -> Option<Bounds> {
        self.get(name)?.geometry.as_ref()?.bounds()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn full_mask(&self) -> Mask {
        Mask::from_features(&self.features)
    }

    pub fn region_mask(&self, name: &str) -> Option<Mask> {
        self.get(name).map(|f| Mask::from_features([f]))
    }
}

// =============================================================================
// Sources
// =============================================================================

#[async_trait]
pub trait BoundarySource: Send + Sync {
    fn describe(&self) -> String;
    async fn fetch(&self) -> Result<String>;
}

pub struct HttpBoundarySource {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl HttpBoundarySource {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self { client, url: url.to_string(), retry: RetryConfig::default() })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self) -> Result<String> {
        let resp = match self.client.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) if is_retryable_network_error(&e) => return Err(anyhow!("GET {}: {}", self.url, e)),
            Err(e) => return Err(Permanent(format!("GET {}: {}", self.url, e)).into()),
        };
        let status = resp.status();
        if !status.is_success() {
            let msg = format!("GET {} returned {}", self.url, status);
            if is_retryable_http_status(status.as_u16()) {
                return Err(anyhow!(msg));
            }
            return Err(Permanent(msg).into());
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl BoundarySource for HttpBoundarySource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String> {
        retry_async(&self.retry, "boundary_fetch", || self.fetch_once()).await
    }
}

pub struct FileBoundarySource {
    pub path: PathBuf,
}

#[async_trait]
impl BoundarySource for FileBoundarySource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path.display()))
    }
}

/// `http(s)://` goes over the network, anything else is a local path.
pub fn source_for(location: &str) -> Result<Box<dyn BoundarySource>> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpBoundarySource::new(location)?))
    } else {
        Ok(Box::new(FileBoundarySource { path: PathBuf::from(location) }))
    }
}

pub async fn load_index(source: &dyn BoundarySource) -> Result<BoundaryIndex> {
    let text = source.fetch().await?;
    BoundaryIndex::parse(&text).with_context(|| format!("from {}", source.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"NAME_1":"Kerala","name":"ignored"},
         "geometry":{"type":"Polygon","coordinates":[[[76,8],[77,8],[77,12],[76,8]]]}},
        {"type":"Feature","properties":{"NAME_1":"","name":"Goa"},
         "geometry":{"type":"Polygon","coordinates":[[[73.7,14.9],[74.3,14.9],[74.3,15.8],[73.7,14.9]]]}},
        {"type":"Feature","properties":{"code":7},
         "geometry":{"type":"Polygon","coordinates":[[[80,20],[81,20],[81,21],[80,20]]]}},
        {"type":"Feature","properties":{"name":"Andaman"},
         "geometry":{"type":"MultiPolygon","coordinates":[[[[92,11],[93,11],[93,12],[92,11]]],[[[92.5,13],[93,13],[93,13.5],[92.5,13]]]]}}
    ]}"#;

    #[test]
    fn name_prefers_first_key() {
        let props = json!({"NAME_1": "Kerala", "name": "x"});
        assert_eq!(display_name(props.as_object()).as_deref(), Some("Kerala"));
        let props = json!({"name": "Goa"});
        assert_eq!(display_name(props.as_object()).as_deref(), Some("Goa"));
        let props = json!({"NAME_1": 3});
        assert_eq!(display_name(props.as_object()), None);
        assert_eq!(display_name(None), None);
    }

    #[test]
    fn index_registers_named_features() {
        let idx = BoundaryIndex::parse(SAMPLE).unwrap();
        assert_eq!(idx.len(), 4);
        assert_eq!(idx.names(), &["Kerala", "Goa", "Andaman"]);
        assert!(idx.get("Kerala").is_some());
        assert!(idx.get("kerala").is_none());
    }

    #[test]
    fn full_mask_includes_unnamed_features() {
        let idx = BoundaryIndex::parse(SAMPLE).unwrap();
        assert_eq!(idx.full_mask().holes.len(), 5);
        assert_eq!(idx.region_mask("Andaman").unwrap().holes.len(), 2);
        assert!(idx.region_mask("Atlantis").is_none());
    }

    #[test]
    fn region_bounds() {
        let idx = BoundaryIndex::parse(SAMPLE).unwrap();
        let b = idx.bounds_of("Kerala").unwrap();
        assert_eq!(b, Bounds { south: 8.0, west: 76.0, north: 12.0, east: 77.0 });
    }

    #[test]
    fn duplicate_name_keeps_latest_geometry() {
        let text = r#"{"features":[
            {"properties":{"name":"X"},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"properties":{"name":"X"},"geometry":{"type":"Polygon","coordinates":[[[5,5],[6,5],[6,6],[5,5]]]}}
        ]}"#;
        let idx = BoundaryIndex::parse(text).unwrap();
        assert_eq!(idx.names().len(), 1);
        assert_eq!(idx.bounds_of("X").unwrap().south, 5.0);
    }

    #[test]
    fn malformed_collection_is_an_error() {
        assert!(BoundaryIndex::parse("{\"type\":\"FeatureCollection\"}").is_err());
        assert!(BoundaryIndex::parse("<html>").is_err());
    }

    #[tokio::test]
    async fn file_source_loads_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("states.geojson");
        std::fs::write(&path, SAMPLE).unwrap();
        let src = source_for(path.to_str().unwrap()).unwrap();
        let idx = load_index(src.as_ref()).await.unwrap();
        assert_eq!(idx.names().len(), 3);
    }

    #[tokio::test]
    async fn unreachable_host_fails_after_retries() {
        let retry = RetryConfig { max_retries: 1, base_delay_ms: 1, max_delay_ms: 1, jitter_factor: 0.0 };
        let src = HttpBoundarySource::new("http://127.0.0.1:9/states.geojson").unwrap().with_retry(retry);
        assert_eq!(src.describe(), "http://127.0.0.1:9/states.geojson");
        assert!(load_index(&src).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let src = FileBoundarySource { path: PathBuf::from("/nonexistent/states.geojson") };
        assert!(load_index(&src).await.is_err());
    }
}
