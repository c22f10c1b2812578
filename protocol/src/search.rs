use serde::Deserialize;
use serde::Serialize;

use crate::lead::Candidate;
use crate::lead::QualifiedLead;

/// User-declared targeting criteria for one hunt. Immutable once a run is
/// launched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub industry: String,
    pub location: String,

    /// What the user is selling, used by the scoring prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offering: Option<String>,

    /// Extra qualification criteria in free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the targeting conversation that preceded a launch. Carried
/// on pipeline launch and returned on resume so a continued run keeps its
/// context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A durably stored run, as returned by the resume endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: String,
    pub context: SearchContext,
    #[serde(default)]
    pub transcript: Vec<ChatMessage>,
    #[serde(default)]
    pub leads: Vec<QualifiedLead>,
}

/// Request body for the discovery endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoverRequest {
    #[serde(flatten)]
    pub context: SearchContext,
}

/// Request body for the qualification pipeline launch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualifyRequest {
    pub candidates: Vec<Candidate>,
    pub context: SearchContext,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<ChatMessage>,

    /// Results already accumulated by an earlier stream of the same hunt,
    /// so a relaunched run continues instead of re-qualifying them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prior_results: Vec<QualifiedLead>,
}
