//! Kubernetes REST implementation of [`Platform`]

use crate::error::PlatformError;
use crate::isolation::storage::ConfigArtifact;
use crate::manifest;
use crate::platform::{ArtifactHandle, OwnerRef, Platform, TaskHandle};
use crate::task::Task;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Connection settings for the API server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    /// API server base URL
    pub api_server: String,

    /// Bearer token file
    pub token_path: PathBuf,

    /// Cluster CA bundle, `None` trusts the system roots only
    pub ca_path: Option<PathBuf>,
}

impl Default for KubeConfig {
    fn default() -> Self {
        let api_server = match (
            std::env::var("KUBERNETES_SERVICE_HOST"),
            std::env::var("KUBERNETES_SERVICE_PORT"),
        ) {
            (Ok(host), Ok(port)) => format!("https://{host}:{port}"),
            _ => "https://kubernetes.default.svc".to_string(),
        };
        Self {
            api_server,
            token_path: Path::new(SERVICE_ACCOUNT_DIR).join("token"),
            ca_path: Some(Path::new(SERVICE_ACCOUNT_DIR).join("ca.crt")),
        }
    }
}

/// Namespace of the running service account, if mounted
#[must_use]
pub fn in_cluster_namespace() -> Option<String> {
    std::fs::read_to_string(Path::new(SERVICE_ACCOUNT_DIR).join("namespace"))
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
}

fn read_file(path: &Path) -> Result<Vec<u8>, PlatformError> {
    std::fs::read(path).map_err(|source| PlatformError::Credentials {
        path: path.display().to_string(),
        source,
    })
}

pub struct KubeClient {
    http: reqwest::Client,
    api_server: String,
    namespace: String,
    token: String,
}

impl KubeClient {
    /// Read credentials once; the client is then shared for every launch
    pub fn new(config: &KubeConfig, namespace: impl Into<String>) -> Result<Self, PlatformError> {
        let token = String::from_utf8_lossy(&read_file(&config.token_path)?)
            .trim()
            .to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(ca_path) = &config.ca_path {
            let cert = reqwest::Certificate::from_pem(&read_file(ca_path)?)?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            http: builder.build()?,
            api_server: config.api_server.trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            token,
        })
    }

    fn config_maps_url(&self) -> String {
        format!("{}/api/v1/namespaces/{}/configmaps", self.api_server, self.namespace)
    }

    fn jobs_url(&self) -> String {
        format!("{}/apis/batch/v1/namespaces/{}/jobs", self.api_server, self.namespace)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, PlatformError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PlatformError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| {
            PlatformError::InvalidResponse(format!("failed to parse response: {e}, body: {body}"))
        })
    }
}

fn metadata_field<'a>(object: &'a Value, field: &str) -> Result<&'a str, PlatformError> {
    object["metadata"][field]
        .as_str()
        .ok_or_else(|| PlatformError::InvalidResponse(format!("object has no metadata.{field}")))
}

fn task_handle(object: &Value) -> Result<TaskHandle, PlatformError> {
    Ok(TaskHandle {
        name: metadata_field(object, "name")?.to_string(),
        uid: metadata_field(object, "uid")?.to_string(),
    })
}

#[async_trait]
impl Platform for KubeClient {
    async fn create_config_artifact(
        &self,
        artifact: &ConfigArtifact,
    ) -> Result<ArtifactHandle, PlatformError> {
        let body = manifest::config_map(artifact, &self.namespace);
        let created = self
            .send(self.http.post(self.config_maps_url()).json(&body))
            .await?;
        Ok(ArtifactHandle {
            name: metadata_field(&created, "name")?.to_string(),
        })
    }

    async fn update_config_artifact(
        &self,
        handle: &ArtifactHandle,
        owner: &OwnerRef,
    ) -> Result<(), PlatformError> {
        let patch = serde_json::to_vec(&manifest::owner_patch(owner))
            .map_err(|e| PlatformError::Other(format!("failed to encode owner patch: {e}")))?;
        let url = format!("{}/{}", self.config_maps_url(), handle.name);
        self.send(
            self.http
                .patch(url)
                .header(CONTENT_TYPE, "application/merge-patch+json")
                .body(patch),
        )
        .await?;
        Ok(())
    }

    async fn create_task(&self, task: &Task) -> Result<TaskHandle, PlatformError> {
        let body = manifest::job(task, &self.namespace);
        let created = self.send(self.http.post(self.jobs_url()).json(&body)).await?;
        task_handle(&created)
    }
}
