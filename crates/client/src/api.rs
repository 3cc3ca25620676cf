//! Typed REST client for the Doublons server

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use doublons_common::models::{
    DuplicateGroup, GroupAction, GroupStatus, IgnoredSignature, MergeRequest, Page, ScanSnapshot,
    ScanStatus, Student,
};

use crate::errors::{ClientError, Result};

#[derive(Debug, Deserialize)]
pub struct StartScanResponse {
    pub job_id: Uuid,
    pub status: ScanStatus,
}

/// Result of a successful merge, as returned by the server
#[derive(Debug, Clone, Deserialize)]
pub struct MergeOutcome {
    pub master: Student,
    pub merged_count: usize,
    pub group_resolved: bool,
}

#[derive(Debug, Serialize)]
struct StartScanPayload {
    resume: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn start_scan(
        &self,
        resume: bool,
        job_id: Option<Uuid>,
    ) -> Result<StartScanResponse> {
        let response = self
            .http
            .post(self.url("/doublons/scan/start"))
            .json(&StartScanPayload { resume, job_id })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn scan_status(&self, job_id: Uuid) -> Result<ScanSnapshot> {
        let response = self
            .http
            .get(self.url(&format!("/doublons/scan/status/{}", job_id)))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn stop_scan(&self, job_id: Uuid) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/doublons/scan/stop/{}", job_id)))
            .send()
            .await?;
        ack(response).await
    }

    pub async fn list_groups(
        &self,
        statut: GroupStatus,
        page: u64,
        limit: u64,
    ) -> Result<Page<DuplicateGroup>> {
        let statut: String = statut.into();
        let response = self
            .http
            .get(self.url("/doublons/list"))
            .query(&[
                ("statut", statut.as_str()),
                ("page", &page.to_string()),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn group_action(
        &self,
        group_id: Uuid,
        action: GroupAction,
    ) -> Result<DuplicateGroup> {
        let response = self
            .http
            .post(self.url(&format!("/doublons/action/{}", group_id)))
            .json(&json!({ "action": action }))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn bulk_ignore(&self, student_ids: &[Uuid]) -> Result<()> {
        let response = self
            .http
            .post(self.url("/doublons/ignore"))
            .json(&json!({ "student_ids": student_ids }))
            .send()
            .await?;
        ack(response).await
    }

    pub async fn list_ignored(&self) -> Result<Vec<IgnoredSignature>> {
        let response = self.http.get(self.url("/doublons/ignored")).send().await?;
        decode(response).await
    }

    pub async fn delete_ignored(&self, id: Uuid) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/doublons/ignored/{}", id)))
            .send()
            .await?;
        ack(response).await
    }

    pub async fn merge(&self, request: &MergeRequest) -> Result<MergeOutcome> {
        let response = self
            .http
            .post(self.url("/doublons/merge/advanced"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    pub async fn get_student(&self, id: Uuid) -> Result<Student> {
        let response = self
            .http
            .get(self.url(&format!("/etudiants/{}", id)))
            .send()
            .await?;
        decode(response).await
    }
}

/// Decode a success body, or lift the server's error envelope into a
/// `ClientError::Api`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    Err(api_error(status, response).await)
}

async fn ack(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(api_error(status, response).await)
}

async fn api_error(status: StatusCode, response: Response) -> ClientError {
    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let code = body["error"]["code"]
        .as_str()
        .unwrap_or("UNKNOWN")
        .to_string();
    let message = body["error"]["message"]
        .as_str()
        .unwrap_or("unexpected server error")
        .to_string();
    ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}
