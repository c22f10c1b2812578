use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use std::time::Duration;
use tracing::debug;

use leadscout_protocol::BatchJobRequest;
use leadscout_protocol::Candidate;
use leadscout_protocol::DiscoverRequest;
use leadscout_protocol::JobCreated;
use leadscout_protocol::JobSnapshot;
use leadscout_protocol::QualifyRequest;
use leadscout_protocol::SearchContext;
use leadscout_protocol::StoredRun;
use leadscout_protocol::StreamEvent;

use crate::error::BackendError;
use crate::error::QuotaPayload;
use crate::error::Result;
use crate::sse::event_stream;

// The backend's worst case for a discovery call is a full web-search
// round; streams stay open for an entire qualification batch.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub request_timeout: Duration,
    pub stream_timeout: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bearer_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

/// Typed client for the discovery/qualification backend. Cheap to clone.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl BackendClient {
    pub fn new(opts: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            bearer_token: opts.bearer_token,
            request_timeout: opts.request_timeout,
            stream_timeout: opts.stream_timeout,
        })
    }

    /// Run the (non-streaming) discovery call for a search context.
    pub async fn discover(&self, context: &SearchContext) -> Result<Vec<Candidate>> {
        let url = format!("{}/v1/leads/discover", self.base_url);
        let body = DiscoverRequest {
            context: context.clone(),
        };
        let resp = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Launch the qualification pipeline and return its decoded event
    /// stream. The request times out as a whole, covering the full life
    /// of the stream.
    pub async fn qualify_stream(
        &self,
        request: &QualifyRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/leads/qualify", self.base_url);
        let resp = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(self.stream_timeout)
            .json(request)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(event_stream(resp.bytes_stream()).boxed())
    }

    /// Launch a batch enrichment job, returning the backend's job id.
    pub async fn start_job(&self, request: &BatchJobRequest) -> Result<String> {
        let url = format!("{}/v1/jobs", self.base_url);
        let resp = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .timeout(self.request_timeout)
            .json(request)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let created: JobCreated = resp.json().await?;
        Ok(created.job_id)
    }

    /// Fetch a job's current counters.
    pub async fn job_status(&self, job_id: &str) -> Result<JobSnapshot> {
        let url = format!("{}/v1/jobs/{job_id}", self.base_url);
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Open a job's live event stream. `after` skips events for already
    /// observed results so a broken stream can be rejoined mid-batch.
    pub async fn job_events(
        &self,
        job_id: &str,
        after: Option<u32>,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let mut url = format!("{}/v1/jobs/{job_id}/events", self.base_url);
        if let Some(after) = after {
            url.push_str(&format!("?after={after}"));
        }
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(self.stream_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(event_stream(resp.bytes_stream()).boxed())
    }

    /// List known jobs, used by the tracker to refresh after a terminal
    /// status.
    pub async fn list_jobs(&self) -> Result<Vec<JobSnapshot>> {
        let url = format!("{}/v1/jobs", self.base_url);
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Fetch a durably stored run for resumption.
    pub async fn fetch_run(&self, run_id: &str) -> Result<StoredRun> {
        let url = format!("{}/v1/runs/{run_id}", self.base_url);
        let resp = self
            .http
            .get(url)
            .headers(self.auth_headers()?)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let Some(token) = self.bearer_token.as_deref() else {
            return Err(BackendError::MissingCredentials);
        };
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| BackendError::InvalidCredentials)?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS {
        if let Ok(payload) = serde_json::from_str::<QuotaPayload>(&body) {
            debug!("quota rejection from backend: {}", payload.error);
            return Err(BackendError::Quota(payload));
        }
    }
    Err(BackendError::Status { status, body })
}
