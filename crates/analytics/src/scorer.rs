//! Picks one authoritative record out of competing extraction candidates.

use crate::extractor::{Candidate, CandidateKind};
use campaign_core::types::AnalyticsRecord;
use std::cmp::Ordering;

/// Lexicographic quality key: more populated fields, then more total volume,
/// then a higher `(delivered ?? sent) + opened + clicked` signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateScore {
    pub present_fields: usize,
    pub volume: u64,
    pub priority: u64,
}

impl CandidateScore {
    pub fn of(record: &AnalyticsRecord) -> Self {
        Self {
            present_fields: record.present_field_count(),
            volume: record.count_volume(),
            priority: record.priority_signal(),
        }
    }
}

pub fn compare(a: &AnalyticsRecord, b: &AnalyticsRecord) -> Ordering {
    CandidateScore::of(a).cmp(&CandidateScore::of(b))
}

/// Highest-scoring candidate holding at least one metric. Earlier candidates
/// win ties.
pub fn select_best<'a, I>(candidates: I) -> Option<&'a Candidate>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    candidates
        .into_iter()
        .filter(|c| c.record.has_any_metric())
        .fold(None, |best: Option<&Candidate>, c| match best {
            Some(b) if compare(&c.record, &b.record) != Ordering::Greater => Some(b),
            _ => Some(c),
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub record: AnalyticsRecord,
    /// False when no candidate carried a single metric.
    pub found: bool,
    pub winner: Option<CandidateKind>,
}

/// Identifier-scoped candidates are preferred; the whole-payload candidate
/// only wins when none of them qualifies. The result is the payload record
/// with the winner's present fields laid over it.
pub fn reconcile(candidates: &[Candidate]) -> Reconciliation {
    let base = candidates
        .iter()
        .find(|c| c.kind == CandidateKind::Payload)
        .map(|c| c.record.clone())
        .unwrap_or_default();

    let winner = select_best(candidates.iter().filter(|c| c.kind != CandidateKind::Payload))
        .or_else(|| select_best(candidates));

    match winner {
        Some(w) => Reconciliation {
            record: base.overlay(&w.record),
            found: true,
            winner: Some(w.kind),
        },
        None => Reconciliation {
            record: base,
            found: false,
            winner: None,
        },
    }
}
