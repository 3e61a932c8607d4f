//! Sonarr/Radarr v3 API client.
//!
//! Both managers share the same API layout and differ only in the resource
//! name (`series` / `movie`), the external id field (`tvdbId` / `tmdbId`)
//! and the add options.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::BackendConfig;

use super::{AddRequest, AddedTitle, BackendError, Candidate, MediaBackend, MediaKind};

/// HTTP client for one library manager.
pub struct ArrClient {
    client: Client,
    base_url: String,
    api_key: String,
    kind: MediaKind,
}

impl ArrClient {
    /// Create a client for the manager of `kind`.
    pub fn new(kind: MediaKind, config: &BackendConfig) -> Result<Self, BackendError> {
        if config.api_key.is_empty() {
            return Err(BackendError::NotConfigured(format!(
                "{} API key is required",
                manager_name(kind)
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            kind,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3/{}", self.base_url, path)
    }

    fn resource(&self) -> &'static str {
        match self.kind {
            MediaKind::Series => "series",
            MediaKind::Movie => "movie",
        }
    }

    fn id_field(&self) -> &'static str {
        external_id_field(self.kind)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unavailable(format!(
                "{} rejected the API key",
                self.name()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "HTTP {}: {}",
                status,
                truncate(&body)
            )));
        }

        response.json::<T>().await.map_err(|e| {
            BackendError::Unavailable(format!("Failed to parse {} response: {}", path, e))
        })
    }

    /// Build the add payload: the lookup object plus the add defaults.
    fn build_add_body(&self, request: &AddRequest) -> Value {
        let candidate = &request.candidate;
        let mut body = match &candidate.lookup {
            Value::Object(map) => map.clone(),
            _ => {
                let mut map = Map::new();
                map.insert("title".to_string(), json!(candidate.title));
                if let Some(year) = candidate.year {
                    map.insert("year".to_string(), json!(year));
                }
                map
            }
        };

        body.remove("id");
        body.insert(self.id_field().to_string(), json!(candidate.external_id));
        body.insert(
            "qualityProfileId".to_string(),
            json!(request.quality_profile_id),
        );
        body.insert("rootFolderPath".to_string(), json!(request.root_folder));
        body.insert("monitored".to_string(), json!(true));

        match self.kind {
            MediaKind::Series => {
                body.insert("seasonFolder".to_string(), json!(true));
                body.insert(
                    "addOptions".to_string(),
                    json!({ "monitor": "all", "searchForMissingEpisodes": true }),
                );
            }
            MediaKind::Movie => {
                body.entry("minimumAvailability")
                    .or_insert_with(|| json!("released"));
                body.insert("addOptions".to_string(), json!({ "searchForMovie": true }));
            }
        }

        Value::Object(body)
    }
}

#[async_trait]
impl MediaBackend for ArrClient {
    fn name(&self) -> &str {
        manager_name(self.kind)
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn test_connection(&self) -> Result<(), BackendError> {
        let status: SystemStatus = self.get_json("system/status", &[]).await?;
        debug!(backend = self.name(), version = %status.version, "Connected");
        Ok(())
    }

    async fn search(&self, title: &str) -> Result<Vec<Candidate>, BackendError> {
        debug!(backend = self.name(), "Lookup: term='{}'", title);

        let path = format!("{}/lookup", self.resource());
        let items: Vec<Value> = self.get_json(&path, &[("term", title.to_string())]).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| lookup_to_candidate(self.kind, item))
            .collect())
    }

    async fn list_existing(&self) -> Result<HashSet<u64>, BackendError> {
        let items: Vec<LibraryItem> = self.get_json(self.resource(), &[]).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| item.external_id(self.kind))
            .collect())
    }

    async fn exists(&self, external_id: u64) -> Result<bool, BackendError> {
        let items: Vec<LibraryItem> = self
            .get_json(
                self.resource(),
                &[(self.id_field(), external_id.to_string())],
            )
            .await?;
        Ok(items
            .iter()
            .any(|item| item.external_id(self.kind) == Some(external_id)))
    }

    async fn add(&self, request: &AddRequest) -> Result<AddedTitle, BackendError> {
        let body = self.build_add_body(request);
        debug!(
            backend = self.name(),
            external_id = request.candidate.external_id,
            "Adding '{}'",
            request.candidate.title
        );

        let response = self
            .client
            .post(self.url(self.resource()))
            .header("X-Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_add_failure(status, &body);
            warn!(backend = self.name(), "Add failed: {}", err);
            return Err(err);
        }

        let added: AddedItem = response.json().await.map_err(|e| {
            BackendError::Unavailable(format!("Failed to parse add response: {}", e))
        })?;

        Ok(AddedTitle {
            library_id: added.id,
            title: added
                .title
                .unwrap_or_else(|| request.candidate.title.clone()),
        })
    }
}

fn manager_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Series => "sonarr",
        MediaKind::Movie => "radarr",
    }
}

fn external_id_field(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Series => "tvdbId",
        MediaKind::Movie => "tmdbId",
    }
}

/// Convert one lookup entry; entries without an external id are dropped.
fn lookup_to_candidate(kind: MediaKind, item: Value) -> Option<Candidate> {
    let parsed: LookupItem = match serde_json::from_value(item.clone()) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Skipping unparseable lookup entry: {}", e);
            return None;
        }
    };

    let external_id = match kind {
        MediaKind::Series => parsed.tvdb_id,
        MediaKind::Movie => parsed.tmdb_id,
    }
    .filter(|id| *id > 0)?;

    Some(Candidate {
        title: parsed.title,
        external_id,
        year: parsed.year.filter(|y| *y > 0),
        kind,
        already_in_library: parsed.id.is_some_and(|id| id > 0),
        overview: parsed.overview.filter(|o| !o.is_empty()),
        lookup: item,
    })
}

/// Map a failed add response onto the error taxonomy.
fn classify_add_failure(status: StatusCode, body: &str) -> BackendError {
    let lower = body.to_lowercase();
    if lower.contains("existsvalidator") || lower.contains("already been added") {
        return BackendError::AlreadyExists(truncate(body));
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        return BackendError::Unavailable(format!("HTTP {}: {}", status, truncate(body)));
    }
    BackendError::Rejected(format!("HTTP {}: {}", status, truncate(body)))
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

// ============================================================================
// API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SystemStatus {
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupItem {
    title: String,
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    tvdb_id: Option<u64>,
    #[serde(default)]
    tmdb_id: Option<u64>,
    #[serde(default)]
    overview: Option<String>,
    /// Present only when the title is already in the library.
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryItem {
    #[serde(default)]
    tvdb_id: Option<u64>,
    #[serde(default)]
    tmdb_id: Option<u64>,
}

impl LibraryItem {
    fn external_id(&self, kind: MediaKind) -> Option<u64> {
        match kind {
            MediaKind::Series => self.tvdb_id,
            MediaKind::Movie => self.tmdb_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddedItem {
    id: u64,
    #[serde(default)]
    title: Option<String>,
}
