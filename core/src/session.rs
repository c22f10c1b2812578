use futures::StreamExt;
use futures::pin_mut;
use tokio::sync::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use leadscout_backend_client::BackendClient;
use leadscout_protocol::Candidate;
use leadscout_protocol::ChatMessage;
use leadscout_protocol::QualifyRequest;
use leadscout_protocol::SearchContext;
use leadscout_protocol::TierSummary;

use crate::config::SessionConfig;
use crate::config::TerminationMode;
use crate::error::HuntError;
use crate::interpret::StateInstruction;
use crate::interpret::interpret;
use crate::pipeline::PipelineRun;

/// How a driven qualification stream ended, when it did not fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HuntOutcome {
    Completed,
    /// The stream was superseded by a newer launch or an explicit reset.
    /// Never an error; the cancelled stream mutates nothing further.
    Cancelled,
}

#[derive(Default)]
struct StreamSlot {
    token: Option<CancellationToken>,
    generation: u64,
}

/// Long-lived host for the single active hunt. Sole mutator of its
/// [`PipelineRun`]; consumers watch snapshots. Guarantees at most one
/// in-flight qualification stream: every launch or reset cancels the
/// previous one first.
pub struct SessionHost {
    client: BackendClient,
    config: SessionConfig,
    state: watch::Sender<PipelineRun>,
    slot: Mutex<StreamSlot>,
}

impl SessionHost {
    pub fn new(client: BackendClient, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(PipelineRun::default());
        Self {
            client,
            config,
            state,
            slot: Mutex::new(StreamSlot::default()),
        }
    }

    pub fn snapshot(&self) -> PipelineRun {
        self.state.borrow().clone()
    }

    /// Read-only view for UI consumers; notified on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.state.subscribe()
    }

    /// Run the non-streaming discovery call: `Chat` to `Searching`, then
    /// `SearchComplete` on success or back to `Chat` on failure.
    pub async fn launch_search(
        &self,
        context: SearchContext,
        transcript: Vec<ChatMessage>,
    ) -> Result<Vec<Candidate>, HuntError> {
        self.modify(|run| run.begin_search(context.clone(), transcript))?;
        match self.client.discover(&context).await {
            Ok(candidates) => {
                self.modify(|run| run.search_succeeded(candidates.clone()));
                Ok(candidates)
            }
            Err(err) => {
                self.modify(PipelineRun::search_failed);
                Err(err.into())
            }
        }
    }

    /// Launch the qualification stream and drive it to a terminal state.
    ///
    /// Safe to call while a previous stream is active: the predecessor is
    /// cancelled first and at most one stream is ever open. The caller
    /// awaits the whole run; phase changes are observable via
    /// [`SessionHost::subscribe`] as they arrive.
    pub async fn launch_pipeline(&self) -> Result<HuntOutcome, HuntError> {
        // Cancel the predecessor before touching the run, so none of its
        // buffered events can land between our own mutations.
        let (token, generation) = self.acquire_stream_slot().await;
        if let Err(err) = self.modify(PipelineRun::begin_qualify) {
            self.release_stream_slot(generation).await;
            return Err(err);
        }
        let request = {
            let run = self.state.borrow();
            QualifyRequest {
                candidates: run.candidates.clone(),
                context: run.search_context.clone().unwrap_or_default(),
                transcript: run.transcript.clone(),
                prior_results: run.results.clone(),
            }
        };

        let outcome = self.drive_qualification(&request, &token).await;
        self.release_stream_slot(generation).await;

        match outcome {
            Err(err) if !token.is_cancelled() => {
                self.modify(PipelineRun::qualify_failed);
                Err(err)
            }
            Err(_) => {
                // The failure raced an explicit cancel; cancellation wins
                // and the reset/new launch already put the state where it
                // belongs.
                debug!("ignoring stream failure observed after cancellation");
                Ok(HuntOutcome::Cancelled)
            }
            Ok(outcome) => Ok(outcome),
        }
    }

    /// Cancel any in-flight stream and return the run to `Chat`.
    /// Idempotent: repeated resets are no-ops.
    pub async fn reset(&self) {
        self.cancel_stream().await;
        self.modify(PipelineRun::reset);
    }

    /// Cancel the in-flight stream, if any, without touching run state.
    pub async fn cancel_stream(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
    }

    /// Re-enter `Complete` directly from a durably stored run, skipping
    /// `Searching` and `Qualifying` entirely.
    pub async fn resume(&self, run_id: &str) -> Result<(), HuntError> {
        self.cancel_stream().await;
        let stored = self.client.fetch_run(run_id).await?;
        self.modify(|run| run.adopt_stored(stored));
        Ok(())
    }

    async fn drive_qualification(
        &self,
        request: &QualifyRequest,
        token: &CancellationToken,
    ) -> Result<HuntOutcome, HuntError> {
        let stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(HuntOutcome::Cancelled),
            opened = self.client.qualify_stream(request) => opened?,
        };
        pin_mut!(stream);
        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(HuntOutcome::Cancelled),
                item = stream.next() => item,
            };
            match item {
                Some(Ok(event)) => match interpret(event) {
                    Some(StateInstruction::Abort(reason)) => {
                        warn!("qualification stream aborted: {reason}");
                        return Err(HuntError::Aborted(reason));
                    }
                    Some(instruction) => {
                        let terminal =
                            matches!(instruction, StateInstruction::Finish { .. });
                        if !self.apply_unless_cancelled(instruction, token) {
                            return Ok(HuntOutcome::Cancelled);
                        }
                        if terminal {
                            return Ok(HuntOutcome::Completed);
                        }
                    }
                    None => {}
                },
                Some(Err(err)) => return Err(err.into()),
                None => return self.stream_closed_without_terminal(token),
            }
        }
    }

    /// Apply one instruction unless the stream was cancelled. The check
    /// runs inside the watch closure: closures are serialized, and a
    /// cancel always happens before the cancelling caller's own state
    /// write, so an already-buffered event can never land on top of a
    /// reset or a superseding launch.
    fn apply_unless_cancelled(
        &self,
        instruction: StateInstruction,
        token: &CancellationToken,
    ) -> bool {
        self.modify(|run| {
            if token.is_cancelled() {
                return false;
            }
            run.apply(instruction);
            true
        })
    }

    fn stream_closed_without_terminal(
        &self,
        token: &CancellationToken,
    ) -> Result<HuntOutcome, HuntError> {
        match self.config.termination {
            TerminationMode::Lenient => {
                // A cleanly closed connection without a terminal frame is
                // an ordinary completion; the summary stays whatever the
                // stream supplied (usually nothing).
                debug!("stream closed without terminal event; completing leniently");
                let finish = StateInstruction::Finish {
                    summary: TierSummary::default(),
                    search_id: None,
                };
                if self.apply_unless_cancelled(finish, token) {
                    Ok(HuntOutcome::Completed)
                } else {
                    Ok(HuntOutcome::Cancelled)
                }
            }
            TerminationMode::Strict => Err(HuntError::Truncated),
        }
    }

    async fn acquire_stream_slot(&self) -> (CancellationToken, u64) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.token.take() {
            previous.cancel();
        }
        slot.generation += 1;
        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        (token, slot.generation)
    }

    async fn release_stream_slot(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if slot.generation == generation {
            slot.token = None;
        }
    }

    fn modify<R>(&self, f: impl FnOnce(&mut PipelineRun) -> R) -> R {
        let mut out = None;
        self.state.send_modify(|run| out = Some(f(run)));
        match out {
            Some(result) => result,
            None => unreachable!("send_modify always runs the closure"),
        }
    }
}
