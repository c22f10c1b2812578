use leadscout_protocol::ProgressUpdate;
use leadscout_protocol::QualifiedLead;
use leadscout_protocol::StreamEvent;
use leadscout_protocol::TierSummary;

/// One state mutation derived from one stream event. Instructions are
/// applied strictly in stream arrival order, never reordered or batched.
#[derive(Clone, Debug, PartialEq)]
pub enum StateInstruction {
    /// `init`: record the expected batch size. Phase is unchanged.
    SetTotal(u32),
    /// `progress`: replace the progress marker wholesale.
    ReplaceProgress(ProgressUpdate),
    /// `result`: clear the progress marker, append to results.
    AppendResult(QualifiedLead),
    /// `error` with `fatal: true`: abort the run with this reason.
    Abort(String),
    /// `complete`: merge the summary by addition, store the external id,
    /// mark the run terminal.
    Finish {
        summary: TierSummary,
        search_id: Option<String>,
    },
}

/// Map a decoded event to its instruction.
///
/// Non-fatal `error` events map to `None`: a single-target failure is
/// represented by the backend as a low-quality `result`, so a non-fatal
/// stream `error` carries nothing actionable.
pub fn interpret(event: StreamEvent) -> Option<StateInstruction> {
    match event {
        StreamEvent::Init { total } => Some(StateInstruction::SetTotal(total)),
        StreamEvent::Progress(update) => Some(StateInstruction::ReplaceProgress(update)),
        StreamEvent::Result { company } => Some(StateInstruction::AppendResult(company)),
        StreamEvent::Error { error, fatal } => fatal.then_some(StateInstruction::Abort(error)),
        StreamEvent::Complete { summary, search_id } => {
            Some(StateInstruction::Finish { summary, search_id })
        }
    }
}
