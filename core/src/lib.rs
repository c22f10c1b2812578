//! Orchestration core for lead-discovery runs: the event interpreter, the
//! hunt phase state machine, the session host that owns one run and its
//! single in-flight stream, and the hybrid stream-or-poll job tracker for
//! enrichment jobs.

mod config;
mod error;
mod interpret;
mod pipeline;
mod session;
mod tracker;

pub use config::SessionConfig;
pub use config::TerminationMode;
pub use config::TrackerConfig;
pub use error::HuntError;
pub use interpret::StateInstruction;
pub use interpret::interpret;
pub use pipeline::HuntPhase;
pub use pipeline::PipelineRun;
pub use session::HuntOutcome;
pub use session::SessionHost;
pub use tracker::EnrichmentJob;
pub use tracker::JobTracker;
