use serde::Serialize;

use leadscout_protocol::Candidate;
use leadscout_protocol::ChatMessage;
use leadscout_protocol::ProgressUpdate;
use leadscout_protocol::QualifiedLead;
use leadscout_protocol::SearchContext;
use leadscout_protocol::StoredRun;
use leadscout_protocol::TierSummary;

use crate::error::HuntError;
use crate::interpret::StateInstruction;

/// Coarse-grained phase of one hunt. Moves forward on success, falls back
/// one step on failure (`Searching` to `Chat`, `Qualifying` to
/// `SearchComplete`), and returns to `Chat` only on explicit reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HuntPhase {
    #[default]
    Chat,
    Searching,
    SearchComplete,
    Qualifying,
    Complete,
}

/// One logical hunt: targeting context, discovered candidates, qualified
/// results, and the coarse phase. Exclusively owned by the
/// [`crate::SessionHost`]; consumers observe snapshots and never mutate.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipelineRun {
    pub phase: HuntPhase,
    pub search_context: Option<SearchContext>,
    pub transcript: Vec<ChatMessage>,
    pub candidates: Vec<Candidate>,
    /// Append-only; order is arrival order, never recomputed.
    pub results: Vec<QualifiedLead>,
    /// Last known position, replaced wholesale on each progress event and
    /// cleared on each result event.
    pub progress: Option<ProgressUpdate>,
    pub expected_total: Option<u32>,
    /// Counts by tier. Accumulated by addition across streams: a resumed
    /// or continued hunt merges each terminal summary into this one.
    pub summary: TierSummary,
    /// Assigned by the backend once results are durably stored.
    pub external_id: Option<String>,
}

impl PipelineRun {
    pub(crate) fn begin_search(
        &mut self,
        context: SearchContext,
        transcript: Vec<ChatMessage>,
    ) -> Result<(), HuntError> {
        if self.phase != HuntPhase::Chat {
            return Err(HuntError::InvalidPhase { phase: self.phase });
        }
        self.search_context = Some(context);
        self.transcript = transcript;
        self.phase = HuntPhase::Searching;
        Ok(())
    }

    pub(crate) fn search_succeeded(&mut self, candidates: Vec<Candidate>) {
        self.candidates = candidates;
        self.phase = HuntPhase::SearchComplete;
    }

    pub(crate) fn search_failed(&mut self) {
        self.phase = HuntPhase::Chat;
    }

    /// Entering `Qualifying` is legal from `SearchComplete` and from
    /// `Qualifying` itself: a relaunch supersedes the active stream.
    pub(crate) fn begin_qualify(&mut self) -> Result<(), HuntError> {
        match self.phase {
            HuntPhase::SearchComplete | HuntPhase::Qualifying => {
                self.phase = HuntPhase::Qualifying;
                self.progress = None;
                Ok(())
            }
            phase => Err(HuntError::InvalidPhase { phase }),
        }
    }

    /// Apply one interpreted instruction. `Abort` is not applied here;
    /// the session maps it to [`PipelineRun::qualify_failed`] plus a
    /// surfaced error.
    pub(crate) fn apply(&mut self, instruction: StateInstruction) {
        match instruction {
            StateInstruction::SetTotal(total) => {
                self.expected_total = Some(total);
            }
            StateInstruction::ReplaceProgress(update) => {
                self.progress = Some(update);
            }
            StateInstruction::AppendResult(lead) => {
                self.progress = None;
                self.results.push(lead);
            }
            StateInstruction::Finish { summary, search_id } => {
                self.complete_run(summary, search_id);
            }
            StateInstruction::Abort(_) => {}
        }
    }

    pub(crate) fn complete_run(&mut self, summary: TierSummary, search_id: Option<String>) {
        self.summary.merge(summary);
        if search_id.is_some() {
            self.external_id = search_id;
        }
        self.progress = None;
        self.phase = HuntPhase::Complete;
    }

    /// Non-cancellation failure during qualification: fall back one phase
    /// so the run can be relaunched. Candidates and accumulated results
    /// are preserved.
    pub(crate) fn qualify_failed(&mut self) {
        self.progress = None;
        self.phase = HuntPhase::SearchComplete;
    }

    pub(crate) fn reset(&mut self) {
        *self = PipelineRun::default();
    }

    /// Adopt a durably stored run as if freshly produced, skipping the
    /// searching and qualifying phases entirely.
    pub(crate) fn adopt_stored(&mut self, stored: StoredRun) {
        let summary = TierSummary::tally(&stored.leads);
        *self = PipelineRun {
            phase: HuntPhase::Complete,
            search_context: Some(stored.context),
            transcript: stored.transcript,
            candidates: Vec::new(),
            results: stored.leads,
            progress: None,
            expected_total: None,
            summary,
            external_id: Some(stored.id),
        };
    }
}
