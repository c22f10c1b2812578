//! Wire-level types shared between the backend client and the
//! orchestration core: the streaming event union, lead and tier models,
//! job snapshots, and search context payloads.
//!
//! This crate is serde models only; it performs no I/O.

mod event;
mod job;
mod lead;
mod search;

pub use event::FrameParseError;
pub use event::ProgressUpdate;
pub use event::StreamEvent;
pub use event::parse_frame_payload;
pub use job::BatchJobRequest;
pub use job::JobCreated;
pub use job::JobSnapshot;
pub use job::JobStatus;
pub use lead::Candidate;
pub use lead::QualifiedLead;
pub use lead::Tier;
pub use lead::TierSummary;
pub use search::ChatMessage;
pub use search::ChatRole;
pub use search::DiscoverRequest;
pub use search::QualifyRequest;
pub use search::SearchContext;
pub use search::StoredRun;
