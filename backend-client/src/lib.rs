//! HTTP client for the lead-discovery backend.
//!
//! Covers the discovery call, the streaming qualification pipeline, batch
//! enrichment jobs (launch, status, event stream, list), and stored-run
//! retrieval, plus the frame decoder that turns raw response bytes into
//! typed [`leadscout_protocol::StreamEvent`]s.

mod client;
mod error;
mod sse;

pub use client::BackendClient;
pub use client::ClientOptions;
pub use error::BackendError;
pub use error::QuotaPayload;
pub use error::Result;
pub use sse::FrameDecoder;
pub use sse::event_stream;
