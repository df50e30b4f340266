//! The reference HTTP binding for the Transport contract (spec §6):
//!
//! ```text
//! GET    {base}/users/{user_id}/workspace/files
//! GET    {base}/users/{user_id}/workspace/files/{path}
//! PUT    {base}/users/{user_id}/workspace/files/{path}
//! DELETE {base}/users/{user_id}/workspace/files/{path}
//! GET    {base}/health
//! ```
//!
//! Built the way the pack's storage backends wrap `reqwest::Client` -- a
//! single client built once with a fixed timeout, per-request auth applied
//! by a small builder helper -- generalized here to race every request
//! against the caller's `CancelToken` as well as the fixed timeout, since
//! the core contract requires both (spec §5).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sync_config::{Secret, ServerConfig, TRANSPORT_TIMEOUT};
use sync_core::{CancelToken, GetFileOutcome, RelPath, RemoteFileMeta, RemoteListing, Transport, TransportError};

/// HTTP implementation of the `Transport` contract.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    user_id: String,
    api_key: Option<Secret>,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        Self::with_timeout(config, TRANSPORT_TIMEOUT)
    }

    pub fn with_timeout(config: &ServerConfig, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            TransportError::Other(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(HttpTransport {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            user_id: config.user_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/users/{}/workspace/files", self.base_url, self.user_id)
    }

    fn file_url(&self, path: &RelPath) -> String {
        format!(
            "{}/users/{}/workspace/files/{}",
            self.base_url,
            self.user_id,
            urlencoding::encode(path.as_str())
        )
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key.expose()),
            None => req,
        }
    }

    /// Race a request future against the caller's cancellation token, the
    /// way every blocking operation in the core is required to (spec §5).
    /// The client-level timeout above still applies independently.
    async fn run<F, T>(&self, cancel: &CancelToken, op: &str, path: &str, fut: F) -> Result<T, TransportError>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = fut => result.map_err(|e| map_reqwest_error(e, op, path)),
        }
    }
}

fn map_reqwest_error(e: reqwest::Error, operation: &str, path: &str) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            operation: operation.to_string(),
            path: path.to_string(),
        }
    } else if e.is_connect() {
        TransportError::ConnectionFailed { source: Box::new(e) }
    } else {
        TransportError::Other(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct WireFileMeta {
    path: String,
    hash: String,
    size: u64,
    modified: DateTime<Utc>,
}

impl WireFileMeta {
    fn into_remote_meta(self) -> Result<RemoteFileMeta, TransportError> {
        let path = RelPath::new(&self.path)
            .map_err(|e| TransportError::Other(format!("server returned invalid path: {e}")))?;
        Ok(RemoteFileMeta {
            path,
            hash: self.hash,
            size: self.size,
            modified: self.modified,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListFilesResponse {
    #[allow(dead_code)]
    user_id: String,
    files: HashMap<String, WireFileMeta>,
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn ping(&self, cancel: &CancelToken) -> Result<(), TransportError> {
        let url = self.health_url();
        let response = self
            .run(cancel, "ping", &url, self.request(reqwest::Method::GET, &url).send())
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    async fn list_files(&self, cancel: &CancelToken) -> Result<RemoteListing, TransportError> {
        let url = self.files_url();
        let response = self
            .run(cancel, "list_files", &url, self.request(reqwest::Method::GET, &url).send())
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Rejected(format!(
                "list_files returned {}",
                response.status()
            )));
        }

        let body: ListFilesResponse = self
            .run(cancel, "list_files", &url, response.json())
            .await?;

        let mut files = HashMap::with_capacity(body.files.len());
        for (_, meta) in body.files {
            let meta = meta.into_remote_meta()?;
            files.insert(meta.path.clone(), meta);
        }

        Ok(RemoteListing {
            user_id: body.user_id,
            files,
        })
    }

    async fn get_file(
        &self,
        path: &RelPath,
        cancel: &CancelToken,
    ) -> Result<GetFileOutcome, TransportError> {
        let url = self.file_url(path);
        let response = self
            .run(cancel, "get_file", &url, self.request(reqwest::Method::GET, &url).send())
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(GetFileOutcome::NotFound);
        }
        if !response.status().is_success() {
            return Err(TransportError::Rejected(format!(
                "get_file returned {}",
                response.status()
            )));
        }

        let hash = header_string(&response, "hash")
            .ok_or_else(|| TransportError::Other("get_file response missing hash header".to_string()))?;
        let modified = header_string(&response, "modified")
            .ok_or_else(|| TransportError::Other("get_file response missing modified header".to_string()))?;
        let modified = DateTime::parse_from_rfc3339(&modified)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TransportError::Other(format!("invalid modified header: {e}")))?;

        let bytes = self
            .run(cancel, "get_file", &url, response.bytes())
            .await?
            .to_vec();

        let meta = RemoteFileMeta {
            path: path.clone(),
            hash,
            size: bytes.len() as u64,
            modified,
        };

        Ok(GetFileOutcome::Found(bytes, meta))
    }

    async fn put_file(
        &self,
        path: &RelPath,
        content: &[u8],
        cancel: &CancelToken,
    ) -> Result<RemoteFileMeta, TransportError> {
        let url = self.file_url(path);
        let response = self
            .run(
                cancel,
                "put_file",
                &url,
                self.request(reqwest::Method::PUT, &url)
                    .header("Content-Type", "application/octet-stream")
                    .body(content.to_vec())
                    .send(),
            )
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(TransportError::Rejected(format!("put_file returned {status}")));
        }

        let body: WireFileMeta = self.run(cancel, "put_file", &url, response.json()).await?;
        body.into_remote_meta()
    }

    async fn delete_file(&self, path: &RelPath, cancel: &CancelToken) -> Result<(), TransportError> {
        let url = self.file_url(path);
        let response = self
            .run(
                cancel,
                "delete_file",
                &url,
                self.request(reqwest::Method::DELETE, &url).send(),
            )
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(TransportError::Rejected(format!("delete_file returned {status}")))
        }
    }
}

fn header_string(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)?
        .to_str()
        .ok()
        .map(|s| s.to_string())
}
