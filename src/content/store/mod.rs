use super::records::{ActivityRecord, LegendRecord, NewsRecord, PersonRecord, PlaceRecord};
use crate::config::ContentConfig;
use crate::utils::http::{MAX_JSON_BODY_BYTES, http_client, read_json};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Read access to the five external content collections.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn persons(&self) -> Result<Vec<PersonRecord>>;
    async fn news(&self) -> Result<Vec<NewsRecord>>;
    async fn activities(&self) -> Result<Vec<ActivityRecord>>;
    async fn places(&self) -> Result<Vec<PlaceRecord>>;
    async fn legends(&self) -> Result<Vec<LegendRecord>>;
}

/// Content store backed by a JSON HTTP API.
///
/// Each collection is fetched with `GET {baseUrl}/{collectionPath}` and must
/// return either a JSON array of documents or an object with an `items` array.
pub struct HttpContentStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    persons_path: String,
    news_path: String,
    activities_path: String,
    places_path: String,
    legends_path: String,
}

impl HttpContentStore {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            bail!("content.baseUrl is not configured");
        }
        let mut base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("Invalid content.baseUrl: {}", config.base_url))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: http_client(Duration::from_secs(config.timeout_secs)),
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            persons_path: config.persons_path.clone(),
            news_path: config.news_path.clone(),
            activities_path: config.activities_path.clone(),
            places_path: config.places_path.clone(),
            legends_path: config.legends_path.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid collection path: {}", path))
    }

    async fn fetch_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = self.endpoint(path)?;
        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        let body: serde_json::Value = read_json(resp, MAX_JSON_BODY_BYTES).await?;
        let documents = match body {
            serde_json::Value::Array(docs) => docs,
            serde_json::Value::Object(mut obj) => match obj.remove("items") {
                Some(serde_json::Value::Array(docs)) => docs,
                _ => bail!("{} returned an object without an items array", url),
            },
            _ => bail!("{} returned neither an array nor an object", url),
        };

        let total = documents.len();
        let records: Vec<T> = documents
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("skipping malformed document from {}: {}", url, e);
                    None
                }
            })
            .collect();
        debug!("fetched {}/{} documents from {}", records.len(), total, url);
        Ok(records)
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn persons(&self) -> Result<Vec<PersonRecord>> {
        self.fetch_collection(&self.persons_path).await
    }

    async fn news(&self) -> Result<Vec<NewsRecord>> {
        self.fetch_collection(&self.news_path).await
    }

    async fn activities(&self) -> Result<Vec<ActivityRecord>> {
        self.fetch_collection(&self.activities_path).await
    }

    async fn places(&self) -> Result<Vec<PlaceRecord>> {
        self.fetch_collection(&self.places_path).await
    }

    async fn legends(&self) -> Result<Vec<LegendRecord>> {
        self.fetch_collection(&self.legends_path).await
    }
}
