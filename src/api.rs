//! DataTrac registry REST client.
//!
//! Talks to the registry backend over HTTP:
//! - List all registered datasets
//! - Fetch a single dataset and its lineage
//! - Upload a new dataset file (multipart)
//! - Record a download (bumps the server-side statistics)
//! - Deregister a dataset (admin password required)

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::error::ApiError;
use crate::settings::ConnectionSettings;

// -----------------------------------------------------------------------------
// Data structures
// -----------------------------------------------------------------------------

/// Remote account the registry files are served from.
const REMOTE_TARGET: &str = "naruto@taklu.chickenkiller.com";

const ADMIN_PASSWORD_HEADER: &str = "X-Admin-Password";

/// One catalog entry as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub registry_path: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub last_downloaded_at: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Dataset {
    /// Copyable command that fetches the file from the registry host.
    /// Display only, never executed.
    pub fn retrieval_command(&self) -> String {
        format!(
            "scp {}:{} ./{}",
            REMOTE_TARGET, self.registry_path, self.name
        )
    }
}

/// Reference to a related dataset in a lineage response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(default)]
    pub parents: Vec<LineageEntry>,
    #[serde(default)]
    pub children: Vec<LineageEntry>,
}

impl Lineage {
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(config: &ConnectionSettings) -> Result<Self, ApiError> {
        let raw = config.base_url.trim();
        let base_url = Url::parse(raw)
            .map_err(|e| ApiError::Validation(format!("Invalid base URL '{}': {}", raw, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ApiError::Validation(format!(
                "Base URL must be an http(s) address: {}",
                raw
            )));
        }

        Ok(Self {
            base_url,
            http: Client::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, keeping any base path.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // new() rejects cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET /datasets/
    pub async fn list_datasets(&self) -> Result<Vec<Dataset>, ApiError> {
        let url = self.endpoint(&["datasets", ""]);
        log::info!("API: list datasets");

        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        let datasets: Vec<Dataset> = response.json().await?;

        log::debug!("API: received {} dataset(s)", datasets.len());
        Ok(datasets)
    }

    /// GET /datasets/{hash}
    pub async fn get_dataset(&self, hash: &str) -> Result<Dataset, ApiError> {
        let url = self.endpoint(&["datasets", hash]);
        log::info!("API: get dataset {}", hash);

        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// GET /datasets/{hash}/lineage
    pub async fn get_lineage(&self, hash: &str) -> Result<Lineage, ApiError> {
        let url = self.endpoint(&["datasets", hash, "lineage"]);
        log::info!("API: lineage of {}", hash);

        let response = self.http.get(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /datasets/upload (multipart: `file`, optional `source`)
    pub async fn upload_dataset(
        &self,
        file_path: &Path,
        source: Option<&str>,
    ) -> Result<Dataset, ApiError> {
        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Validation(format!("Not a file: {}", file_path.display()))
            })?;

        let data = tokio::fs::read(file_path).await.map_err(|e| {
            ApiError::Validation(format!("Cannot read {}: {}", file_path.display(), e))
        })?;

        log::info!("API: upload {} ({} bytes)", filename, data.len());

        let mut form = Form::new().part("file", Part::bytes(data).file_name(filename));
        if let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) {
            form = form.text("source", source.to_string());
        }

        let url = self.endpoint(&["datasets", "upload"]);
        let response = self.http.post(url).multipart(form).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST /datasets/{hash}/download
    pub async fn mark_downloaded(&self, hash: &str) -> Result<Dataset, ApiError> {
        let url = self.endpoint(&["datasets", hash, "download"]);
        log::info!("API: record download of {}", hash);

        let response = self.http.post(url).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// DELETE /datasets/{hash} with the admin password header
    pub async fn delete_dataset(&self, hash: &str, admin_password: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["datasets", hash]);
        log::info!("API: deregister {}", hash);

        let response = self
            .http
            .delete(url)
            .header(ADMIN_PASSWORD_HEADER, admin_password)
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN {
            log::warn!("API: deregister {} rejected, invalid admin password", hash);
            return Err(ApiError::InvalidPassword);
        }

        check_status(response).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `ApiError::Status`, keeping the server's
/// `detail` message when the body carries one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    log::warn!("API: HTTP {} ({})", status, detail.as_deref().unwrap_or("no detail"));

    Err(ApiError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path as AxumPath};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    fn dataset_json(hash: &str, name: &str, downloads: u64) -> Value {
        json!({
            "hash": hash,
            "name": name,
            "source": null,
            "registry_path": format!("/home/naruto/datasets/{}", name),
            "created_at": "2024-05-01T12:00:00",
            "is_active": true,
            "size_bytes": 2048,
            "download_count": downloads,
            "last_downloaded_at": null
        })
    }

    async fn upload_handler(mut multipart: Multipart) -> Json<Value> {
        let mut name = String::new();
        let mut size = 0usize;
        let mut source = Value::Null;
        while let Ok(Some(field)) = multipart.next_field().await {
            match field.name() {
                Some("file") => {
                    name = field.file_name().unwrap_or_default().to_string();
                    size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
                }
                Some("source") => {
                    source = Value::String(field.text().await.unwrap_or_default());
                }
                _ => {}
            }
        }
        let mut ds = dataset_json("new", &name, 0);
        ds["size_bytes"] = json!(size);
        ds["source"] = source;
        Json(ds)
    }

    async fn delete_handler(
        AxumPath(hash): AxumPath<String>,
        headers: HeaderMap,
    ) -> (AxumStatus, Json<Value>) {
        let password = headers
            .get("x-admin-password")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if password != "secret" {
            return (
                AxumStatus::FORBIDDEN,
                Json(json!({"detail": "Invalid admin password"})),
            );
        }
        if hash != "aaa" {
            return (
                AxumStatus::NOT_FOUND,
                Json(json!({"detail": "Dataset not found"})),
            );
        }
        (AxumStatus::OK, Json(json!({"message": "deleted"})))
    }

    async fn get_handler(AxumPath(hash): AxumPath<String>) -> (AxumStatus, Json<Value>) {
        if hash == "aaa" {
            (AxumStatus::OK, Json(dataset_json("aaa", "alpha.csv", 3)))
        } else {
            (
                AxumStatus::NOT_FOUND,
                Json(json!({"detail": "Dataset not found"})),
            )
        }
    }

    fn backend() -> Router {
        Router::new()
            .route(
                "/datasets/",
                get(|| async {
                    Json(json!([
                        dataset_json("aaa", "alpha.csv", 3),
                        dataset_json("bbb", "beta.parquet", 7)
                    ]))
                }),
            )
            .route("/datasets/upload", post(upload_handler))
            .route("/datasets/:hash", get(get_handler).delete(delete_handler))
            .route(
                "/datasets/:hash/download",
                post(|AxumPath(hash): AxumPath<String>| async move {
                    Json(dataset_json(&hash, "alpha.csv", 4))
                }),
            )
            .route(
                "/datasets/:hash/lineage",
                get(|| async {
                    Json(json!({
                        "parents": [{"name": "raw.csv", "hash": "ppp"}],
                        "children": []
                    }))
                }),
            )
    }

    async fn spawn_backend() -> ApiClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, backend()).await.unwrap();
        });
        ApiClient::new(&ConnectionSettings {
            base_url: format!("http://{}", addr),
        })
        .unwrap()
    }

    fn client_for(base_url: &str) -> Result<ApiClient, ApiError> {
        ApiClient::new(&ConnectionSettings {
            base_url: base_url.to_string(),
        })
    }

    #[test]
    fn test_endpoint_building() {
        let client = client_for("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            client.endpoint(&["datasets", ""]).as_str(),
            "http://127.0.0.1:8000/datasets/"
        );
        assert_eq!(
            client.endpoint(&["datasets", "abc", "download"]).as_str(),
            "http://127.0.0.1:8000/datasets/abc/download"
        );

        // Base path is kept, with or without trailing slash
        let client = client_for("http://host/api").unwrap();
        assert_eq!(
            client.endpoint(&["datasets", "abc"]).as_str(),
            "http://host/api/datasets/abc"
        );
        let client = client_for("http://host/api/").unwrap();
        assert_eq!(
            client.endpoint(&["datasets", "abc"]).as_str(),
            "http://host/api/datasets/abc"
        );

        // Hash segments are encoded, not interpreted as paths
        let client = client_for("http://host").unwrap();
        assert_eq!(
            client.endpoint(&["datasets", "a/b"]).as_str(),
            "http://host/datasets/a%2Fb"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            client_for("not a url"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            client_for("ftp://host"),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            client_for("mailto:someone@example.com"),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_retrieval_command() {
        let ds: Dataset = serde_json::from_value(dataset_json("aaa", "alpha.csv", 0)).unwrap();
        assert_eq!(
            ds.retrieval_command(),
            "scp naruto@taklu.chickenkiller.com:/home/naruto/datasets/alpha.csv ./alpha.csv"
        );
    }

    #[test]
    fn test_dataset_optional_fields() {
        let ds: Dataset = serde_json::from_value(json!({
            "hash": "h",
            "name": "n",
            "registry_path": "/r",
            "is_active": false,
            "download_count": 2
        }))
        .unwrap();
        assert_eq!(ds.size_bytes, None);
        assert_eq!(ds.source, None);
        assert_eq!(ds.last_downloaded_at, None);
        assert!(!ds.is_active);
    }

    #[tokio::test]
    async fn test_list_datasets() {
        let client = spawn_backend().await;
        let datasets = client.list_datasets().await.unwrap();
        let hashes: Vec<&str> = datasets.iter().map(|d| d.hash.as_str()).collect();
        assert_eq!(hashes, vec!["aaa", "bbb"]);
        assert_eq!(datasets[1].download_count, 7);
    }

    #[tokio::test]
    async fn test_get_dataset_not_found() {
        let client = spawn_backend().await;
        assert_eq!(client.get_dataset("aaa").await.unwrap().name, "alpha.csv");

        let err = client.get_dataset("zzz").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                detail: Some("Dataset not found".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_lineage() {
        let client = spawn_backend().await;
        let lineage = client.get_lineage("aaa").await.unwrap();
        assert_eq!(lineage.parents.len(), 1);
        assert_eq!(lineage.parents[0].hash, "ppp");
        assert!(lineage.children.is_empty());
        assert!(!lineage.is_empty());
    }

    #[tokio::test]
    async fn test_upload_dataset() {
        let client = spawn_backend().await;

        let path = std::env::temp_dir().join(format!("datatrac-upload-{}.csv", std::process::id()));
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();

        let created = client
            .upload_dataset(&path, Some("https://example.com/data"))
            .await
            .unwrap();
        assert_eq!(created.size_bytes, Some(8));
        assert_eq!(created.source.as_deref(), Some("https://example.com/data"));
        assert!(created.name.starts_with("datatrac-upload-"));

        // Blank source is not sent
        let created = client.upload_dataset(&path, Some("   ")).await.unwrap();
        assert_eq!(created.source, None);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let client = spawn_backend().await;
        let err = client
            .upload_dataset(Path::new("/definitely/not/here.csv"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_mark_downloaded() {
        let client = spawn_backend().await;
        let updated = client.mark_downloaded("aaa").await.unwrap();
        assert_eq!(updated.hash, "aaa");
        assert_eq!(updated.download_count, 4);
    }

    #[tokio::test]
    async fn test_delete_dataset() {
        let client = spawn_backend().await;

        assert_eq!(
            client.delete_dataset("aaa", "wrong").await,
            Err(ApiError::InvalidPassword)
        );
        assert_eq!(client.delete_dataset("aaa", "secret").await, Ok(()));

        let err = client.delete_dataset("zzz", "secret").await.unwrap_err();
        assert_eq!(err.user_message("Failed to delete dataset."), "Dataset not found");
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}", addr)).unwrap();
        let err = client.list_datasets().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
