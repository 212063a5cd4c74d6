use serde::Serialize;

use super::domain::{EvidenceItem, VerificationState};

/// Aggregate verification status over a lifecycle's evidence set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvidenceReadiness {
    pub any_arrived: bool,
    pub all_verified: bool,
    pub rejected_count: usize,
}

/// Pure evaluator used by both the automatic documents-received trigger and
/// admin read paths. Absence of evidence is never "ready": `all_verified`
/// is vacuously false for an empty set.
pub struct DocumentGate;

impl DocumentGate {
    pub fn evaluate(items: &[EvidenceItem]) -> EvidenceReadiness {
        let any_arrived = !items.is_empty();
        let all_verified = any_arrived
            && items
                .iter()
                .all(|item| item.verification == VerificationState::Verified);
        let rejected_count = items
            .iter()
            .filter(|item| item.verification == VerificationState::Rejected)
            .count();

        EvidenceReadiness {
            any_arrived,
            all_verified,
            rejected_count,
        }
    }
}
