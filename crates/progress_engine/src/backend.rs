use std::sync::Arc;
use std::time::Duration;

use progress_core::{JobId, UploadMetadata};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::types::parse_status_payload;
use crate::{Endpoints, MonitorConfig, StatusSnapshot, TransportError, TransportFailure, UploadFile};

/// Receives byte counts while an upload body streams out.
pub trait UploadProgressSink: Send + Sync {
    fn on_upload_progress(&self, sent_bytes: u64, total_bytes: u64);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub file: UploadFile,
    pub metadata: UploadMetadata,
}

/// The processing backend as seen by the monitor.
#[async_trait::async_trait]
pub trait JobBackend: Send + Sync {
    async fn submit(
        &self,
        request: SubmitRequest,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<JobId, TransportError>;

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusSnapshot, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: Endpoints,
    upload_timeout: Duration,
}

impl HttpBackend {
    pub fn new(endpoints: Endpoints, config: &MonitorConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| TransportError::new(TransportFailure::Network, err.to_string()))?;
        Ok(Self {
            client,
            endpoints,
            upload_timeout: config.upload_timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait::async_trait]
impl JobBackend for HttpBackend {
    async fn submit(
        &self,
        request: SubmitRequest,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<JobId, TransportError> {
        let SubmitRequest { file, metadata } = request;
        let total = file.size();
        let file_name = file.file_name().to_string();
        let content_type = file.content_type().to_string();

        let body = file.into_body(progress).await?;
        let part = Part::stream_with_length(body, total)
            .file_name(file_name)
            .mime_str(&content_type)
            .map_err(|err| TransportError::new(TransportFailure::Protocol, err.to_string()))?;

        let mut form = Form::new().text("title", metadata.title).part("video", part);
        if let Some(location_id) = metadata.location_id {
            form = form.text("location_id", location_id);
        }
        if let Some(date) = metadata.recorded_on {
            form = form.text("video_date", date.format("%Y-%m-%d").to_string());
        }
        if let Some(start) = metadata.start_time {
            form = form.text("start_time", start.format("%H:%M:%S").to_string());
        }
        if let Some(end) = metadata.end_time {
            form = form.text("end_time", end.format("%H:%M:%S").to_string());
        }

        let response = self
            .client
            .post(self.endpoints.upload_url())
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let accepted: SubmitResponse = serde_json::from_str(&body)
            .map_err(|err| TransportError::new(TransportFailure::Protocol, err.to_string()))?;
        accepted.upload_id.into_job_id()
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusSnapshot, TransportError> {
        let response = self
            .client
            .get(self.endpoints.status_url(job_id))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        parse_status_payload(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    upload_id: RawJobId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawJobId {
    Text(String),
    Number(u64),
}

impl RawJobId {
    fn into_job_id(self) -> Result<JobId, TransportError> {
        match self {
            RawJobId::Number(id) => Ok(JobId::new(id.to_string())),
            RawJobId::Text(id) if !id.trim().is_empty() => Ok(JobId::new(id.trim())),
            RawJobId::Text(_) => Err(TransportError::new(
                TransportFailure::Protocol,
                "backend returned an empty upload_id",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| status.to_string());
    let kind = if status.is_client_error() {
        TransportFailure::Rejected {
            status: status.as_u16(),
        }
    } else {
        TransportFailure::HttpStatus(status.as_u16())
    };
    TransportError::new(kind, message)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportFailure::Timeout, err.to_string());
    }
    if err.is_builder() {
        return TransportError::new(TransportFailure::InvalidUrl, err.to_string());
    }
    TransportError::new(TransportFailure::Network, err.to_string())
}
