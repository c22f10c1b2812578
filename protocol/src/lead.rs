use serde::Deserialize;
use serde::Serialize;

/// A company discovered by the search step, not yet scored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,

    /// Site root used by the crawl step, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Free-form snippet from the search result that surfaced this company.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Qualification bucket assigned by the scoring step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hot,
    Review,
    Rejected,
    /// The target could not be scored at all (crawl failure, empty site).
    /// Represented as a low-quality result rather than a stream error.
    Failed,
}

/// A candidate after qualification, as carried by `result` events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualifiedLead {
    #[serde(flatten)]
    pub candidate: Candidate,

    pub tier: Tier,

    /// 0-100 qualification score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

/// Counts by tier, as carried by `complete` events.
///
/// Summaries merge by field-wise addition: a resumed or continued run
/// issues a second stream for the same logical hunt, and its terminal
/// summary covers only the new batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TierSummary {
    #[serde(default)]
    pub hot: u32,
    #[serde(default)]
    pub review: u32,
    #[serde(default)]
    pub rejected: u32,
    #[serde(default)]
    pub failed: u32,
}

impl TierSummary {
    pub fn merge(&mut self, other: TierSummary) {
        self.hot += other.hot;
        self.review += other.review;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }

    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Hot => self.hot += 1,
            Tier::Review => self.review += 1,
            Tier::Rejected => self.rejected += 1,
            Tier::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.hot + self.review + self.rejected + self.failed
    }

    /// Tally a summary from an already-qualified lead list, used when a
    /// stored run is resumed and no terminal event is available.
    pub fn tally(leads: &[QualifiedLead]) -> TierSummary {
        let mut summary = TierSummary::default();
        for lead in leads {
            summary.record(lead.tier);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lead(name: &str, tier: Tier) -> QualifiedLead {
        QualifiedLead {
            candidate: Candidate {
                name: name.to_string(),
                website: None,
                location: None,
                snippet: None,
            },
            tier,
            score: None,
            reasoning: None,
            contact_email: None,
        }
    }

    #[test]
    fn merge_adds_field_wise() {
        let mut a = TierSummary {
            hot: 1,
            review: 2,
            rejected: 0,
            failed: 1,
        };
        let b = TierSummary {
            hot: 3,
            review: 0,
            rejected: 5,
            failed: 0,
        };
        a.merge(b);
        assert_eq!(
            a,
            TierSummary {
                hot: 4,
                review: 2,
                rejected: 5,
                failed: 1,
            }
        );
    }

    #[test]
    fn tally_counts_each_tier() {
        let leads = vec![
            lead("a", Tier::Hot),
            lead("b", Tier::Review),
            lead("c", Tier::Hot),
            lead("d", Tier::Failed),
        ];
        let summary = TierSummary::tally(&leads);
        assert_eq!(
            summary,
            TierSummary {
                hot: 2,
                review: 1,
                rejected: 0,
                failed: 1,
            }
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn qualified_lead_flattens_candidate_fields() {
        let json = r#"{"name":"Acme","website":"https://acme.test","tier":"hot","score":91}"#;
        let parsed: QualifiedLead = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.candidate.name, "Acme");
        assert_eq!(parsed.tier, Tier::Hot);
        assert_eq!(parsed.score, Some(91));
    }
}
