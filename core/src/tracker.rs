use std::collections::HashMap;

use futures::StreamExt;
use futures::pin_mut;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use leadscout_backend_client::BackendClient;
use leadscout_protocol::BatchJobRequest;
use leadscout_protocol::JobSnapshot;
use leadscout_protocol::JobStatus;
use leadscout_protocol::StreamEvent;
use leadscout_protocol::Tier;

use crate::config::TrackerConfig;
use crate::error::HuntError;

/// Locally tracked state of one enrichment job. Counters only move
/// forward: `processed` increments on `result` events, `succeeded` and
/// `failed` partition it, and snapshots from polling merge by `max` so a
/// stale poll can never roll the counters back.
#[derive(Clone, Debug, PartialEq)]
pub struct EnrichmentJob {
    pub id: String,
    pub status: JobStatus,
    pub total: u32,
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Set only on terminal error.
    pub last_error: Option<String>,
}

impl EnrichmentJob {
    fn new(id: String, total: u32) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            last_error: None,
        }
    }

    fn apply_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Init { total } => {
                self.total = self.total.max(total);
            }
            StreamEvent::Progress(_) => {
                if self.status == JobStatus::Pending {
                    self.status = JobStatus::Running;
                }
            }
            StreamEvent::Result { company } => {
                if self.status == JobStatus::Pending {
                    self.status = JobStatus::Running;
                }
                self.processed += 1;
                if company.tier == Tier::Failed {
                    self.failed += 1;
                } else {
                    self.succeeded += 1;
                }
                // A missing or understated init must not break the
                // processed <= total invariant.
                self.total = self.total.max(self.processed);
            }
            StreamEvent::Error { error, fatal } => {
                if fatal {
                    self.status = JobStatus::Error;
                    self.last_error = Some(error);
                }
            }
            StreamEvent::Complete { .. } => {
                self.status = JobStatus::Complete;
            }
        }
    }

    /// Merge a polled snapshot without ever decreasing a counter or
    /// stepping a status backwards.
    fn absorb(&mut self, snapshot: &JobSnapshot) {
        self.total = self.total.max(snapshot.total);
        self.processed = self.processed.max(snapshot.processed);
        self.succeeded = self.succeeded.max(snapshot.succeeded);
        self.failed = self.failed.max(snapshot.failed);
        if status_rank(snapshot.status) > status_rank(self.status) {
            self.status = snapshot.status;
        }
        if snapshot.status == JobStatus::Error && snapshot.error.is_some() {
            self.last_error = snapshot.error.clone();
        }
        self.total = self.total.max(self.processed);
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

fn status_rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Running => 1,
        JobStatus::Complete => 2,
        JobStatus::Error => 2,
    }
}

/// Tracks enrichment jobs over a live stream when one can be held open,
/// degrading to fixed-interval polling when it cannot. Jobs live in an
/// explicit map; a separate pinned id marks the one currently shown as
/// live, so a superseded job keeps its last observed state and stays
/// queryable.
pub struct JobTracker {
    client: BackendClient,
    config: TrackerConfig,
    jobs: Mutex<HashMap<String, EnrichmentJob>>,
    pinned: Mutex<Option<String>>,
    live: Mutex<Option<CancellationToken>>,
}

impl JobTracker {
    pub fn new(client: BackendClient, config: TrackerConfig) -> Self {
        Self {
            client,
            config,
            jobs: Mutex::new(HashMap::new()),
            pinned: Mutex::new(None),
            live: Mutex::new(None),
        }
    }

    /// Launch a batch job and pin it as the live one, superseding (and
    /// cancelling the live stream of) any predecessor.
    pub async fn start_batch(
        &self,
        targets: Vec<String>,
        action: impl Into<String>,
    ) -> Result<String, HuntError> {
        let total = targets.len() as u32;
        let request = BatchJobRequest {
            targets,
            action: action.into(),
        };
        let job_id = self.client.start_job(&request).await?;
        self.cancel_tracking().await;
        self.jobs
            .lock()
            .await
            .insert(job_id.clone(), EnrichmentJob::new(job_id.clone(), total));
        *self.pinned.lock().await = Some(job_id.clone());
        Ok(job_id)
    }

    /// Drive one job to a terminal status: stream when possible, poll
    /// otherwise. Returns once the job is terminal, the poll budget is
    /// exhausted (job left in its last observed status), or the tracking
    /// was superseded or cancelled.
    pub async fn track(&self, job_id: &str) -> Result<(), HuntError> {
        let token = self.register_live(job_id).await;

        let outcome = self.track_inner(job_id, &token).await;
        if token.is_cancelled() {
            // Superseded or cancelled: whatever happened to the transport
            // afterwards is not this job's problem.
            return Ok(());
        }
        outcome?;

        if self.job(job_id).await.is_some_and(|job| job.is_terminal()) {
            self.refresh_jobs().await;
            let mut pinned = self.pinned.lock().await;
            if pinned.as_deref() == Some(job_id) {
                *pinned = None;
            }
        }
        Ok(())
    }

    pub async fn job(&self, job_id: &str) -> Option<EnrichmentJob> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn jobs(&self) -> Vec<EnrichmentJob> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// The job currently pinned to the live banner, if any.
    pub async fn pinned(&self) -> Option<EnrichmentJob> {
        let pinned = self.pinned.lock().await.clone();
        match pinned {
            Some(id) => self.job(&id).await,
            None => None,
        }
    }

    /// Stop live-tracking without forgetting any job state.
    pub async fn cancel_tracking(&self) {
        let mut live = self.live.lock().await;
        if let Some(token) = live.take() {
            token.cancel();
        }
    }

    async fn track_inner(
        &self,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<(), HuntError> {
        self.ensure_known(job_id).await;

        match self.stream_phase(job_id, token).await? {
            StreamPhase::Terminal | StreamPhase::Cancelled => Ok(()),
            StreamPhase::FallBack => self.poll_phase(job_id, token).await,
        }
    }

    async fn ensure_known(&self, job_id: &str) {
        self.jobs
            .lock()
            .await
            .entry(job_id.to_string())
            .or_insert_with(|| EnrichmentJob::new(job_id.to_string(), 0));
    }

    /// Try to hold the job's event stream open. A stream that cannot be
    /// opened (after the configured attempts) or that ends before a
    /// terminal status means fallback, not failure.
    async fn stream_phase(
        &self,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<StreamPhase, HuntError> {
        for attempt in 0..self.config.stream_attempts {
            if token.is_cancelled() {
                return Ok(StreamPhase::Cancelled);
            }
            let after = match self.job(job_id).await {
                Some(job) if job.processed > 0 => Some(job.processed),
                _ => None,
            };
            let stream = tokio::select! {
                _ = token.cancelled() => return Ok(StreamPhase::Cancelled),
                opened = self.client.job_events(job_id, after) => opened,
            };
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) if err.is_transport() => {
                    debug!("job stream open attempt {attempt} failed: {err}");
                    continue;
                }
                // Quota and credential rejections are deliberate; polling
                // would just repeat them.
                Err(err) => return Err(err.into()),
            };

            pin_mut!(stream);
            loop {
                let item = tokio::select! {
                    _ = token.cancelled() => return Ok(StreamPhase::Cancelled),
                    item = stream.next() => item,
                };
                match item {
                    Some(Ok(event)) => {
                        let terminal = self.apply_stream_event(job_id, event).await;
                        if terminal {
                            return Ok(StreamPhase::Terminal);
                        }
                    }
                    Some(Err(err)) => {
                        warn!("job stream broke mid-flight: {err}");
                        return Ok(StreamPhase::FallBack);
                    }
                    // Ended without a terminal status: degrade to polling.
                    None => return Ok(StreamPhase::FallBack),
                }
            }
        }
        Ok(StreamPhase::FallBack)
    }

    async fn apply_stream_event(&self, job_id: &str, event: StreamEvent) -> bool {
        let mut jobs = self.jobs.lock().await;
        let job = jobs
            .entry(job_id.to_string())
            .or_insert_with(|| EnrichmentJob::new(job_id.to_string(), 0));
        job.apply_event(event);
        job.is_terminal()
    }

    /// Fixed-interval polling of the status endpoint. Transport errors
    /// count against the attempt budget and are otherwise ignored;
    /// exhausting the budget leaves the job as last observed.
    async fn poll_phase(&self, job_id: &str, token: &CancellationToken) -> Result<(), HuntError> {
        for _ in 0..self.config.max_poll_attempts {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = sleep(self.config.poll_interval) => {}
            }
            let snapshot = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                polled = self.client.job_status(job_id) => polled,
            };
            match snapshot {
                Ok(snapshot) => {
                    let terminal = {
                        let mut jobs = self.jobs.lock().await;
                        let job = jobs
                            .entry(job_id.to_string())
                            .or_insert_with(|| EnrichmentJob::new(job_id.to_string(), 0));
                        job.absorb(&snapshot);
                        job.is_terminal()
                    };
                    if terminal {
                        return Ok(());
                    }
                }
                Err(err) if err.is_transport() => {
                    debug!("job status poll failed, retrying: {err}");
                }
                Err(err) => return Err(err.into()),
            }
        }
        warn!("poll budget exhausted for job {job_id}; leaving last observed status");
        Ok(())
    }

    /// One refresh of the full job list after a terminal status, so
    /// locally tracked counters agree with what the backend stored.
    async fn refresh_jobs(&self) {
        match self.client.list_jobs().await {
            Ok(snapshots) => {
                let mut jobs = self.jobs.lock().await;
                for snapshot in snapshots {
                    let job = jobs
                        .entry(snapshot.id.clone())
                        .or_insert_with(|| EnrichmentJob::new(snapshot.id.clone(), 0));
                    job.absorb(&snapshot);
                }
            }
            Err(err) => debug!("job list refresh failed: {err}"),
        }
    }

    async fn register_live(&self, job_id: &str) -> CancellationToken {
        let mut live = self.live.lock().await;
        if let Some(previous) = live.take() {
            previous.cancel();
        }
        debug!("live-tracking job {job_id}");
        let token = CancellationToken::new();
        *live = Some(token.clone());
        token
    }
}

enum StreamPhase {
    Terminal,
    FallBack,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadscout_protocol::Candidate;
    use leadscout_protocol::ProgressUpdate;
    use leadscout_protocol::QualifiedLead;
    use leadscout_protocol::TierSummary;
    use pretty_assertions::assert_eq;

    fn result_event(tier: Tier) -> StreamEvent {
        StreamEvent::Result {
            company: QualifiedLead {
                candidate: Candidate {
                    name: "t".to_string(),
                    website: None,
                    location: None,
                    snippet: None,
                },
                tier,
                score: None,
                reasoning: None,
                contact_email: None,
            },
        }
    }

    fn assert_invariants(job: &EnrichmentJob) {
        assert!(job.succeeded + job.failed <= job.processed);
        assert!(job.processed <= job.total);
    }

    #[test]
    fn counters_are_monotonic_over_event_sequences() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 0);
        let events = vec![
            StreamEvent::Init { total: 3 },
            StreamEvent::Progress(ProgressUpdate {
                index: 0,
                total: 3,
                phase: None,
                company: None,
            }),
            result_event(Tier::Hot),
            result_event(Tier::Failed),
            result_event(Tier::Review),
            StreamEvent::Complete {
                summary: TierSummary::default(),
                search_id: None,
            },
        ];
        let mut last = job.clone();
        for event in events {
            job.apply_event(event);
            assert_invariants(&job);
            assert!(job.processed >= last.processed);
            assert!(job.succeeded + job.failed >= last.succeeded + last.failed);
            last = job.clone();
        }
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.processed, 3);
        assert_eq!(job.succeeded, 2);
        assert_eq!(job.failed, 1);
    }

    #[test]
    fn first_result_moves_pending_to_running() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 2);
        assert_eq!(job.status, JobStatus::Pending);
        job.apply_event(result_event(Tier::Hot));
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn non_fatal_stream_error_does_not_mark_terminal() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 2);
        job.apply_event(StreamEvent::Error {
            error: "one target 404ed".to_string(),
            fatal: false,
        });
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.last_error, None);
    }

    #[test]
    fn fatal_stream_error_sets_terminal_error() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 2);
        job.apply_event(StreamEvent::Error {
            error: "backend gave up".to_string(),
            fatal: true,
        });
        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.last_error.as_deref(), Some("backend gave up"));
    }

    #[test]
    fn absorb_never_rolls_counters_or_status_back() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 5);
        job.apply_event(result_event(Tier::Hot));
        job.apply_event(result_event(Tier::Hot));
        // A stale snapshot from a poll that raced the stream.
        job.absorb(&JobSnapshot {
            id: "job-1".to_string(),
            status: JobStatus::Pending,
            total: 5,
            processed: 1,
            succeeded: 1,
            failed: 0,
            error: None,
        });
        assert_eq!(job.processed, 2);
        assert_eq!(job.status, JobStatus::Running);
        assert_invariants(&job);

        job.absorb(&JobSnapshot {
            id: "job-1".to_string(),
            status: JobStatus::Complete,
            total: 5,
            processed: 5,
            succeeded: 4,
            failed: 1,
            error: None,
        });
        assert_eq!(job.status, JobStatus::Complete);
        assert_eq!(job.processed, 5);
        assert_invariants(&job);
    }

    #[test]
    fn result_without_init_keeps_invariant() {
        let mut job = EnrichmentJob::new("job-1".to_string(), 0);
        job.apply_event(result_event(Tier::Hot));
        assert_invariants(&job);
        assert_eq!(job.total, 1);
    }
}
