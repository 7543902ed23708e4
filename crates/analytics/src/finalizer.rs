//! Backfills derivable fields. Present values are never overwritten, which
//! makes [`finalize`] idempotent.

use crate::numeric::normalize_rate;
use campaign_core::types::AnalyticsRecord;

/// Fills `delivered` from `sent`, then rates from counts and counts from
/// rates against `delivered ?? sent`. The delivered backfill must run first
/// so both derivations see the same base.
pub fn finalize(record: &AnalyticsRecord) -> AnalyticsRecord {
    let mut out = record.clone();

    if out.delivered.is_none() {
        out.delivered = out.sent;
    }

    let Some(base) = out.delivered.or(out.sent).filter(|b| *b > 0) else {
        return out;
    };
    let base = base as f64;

    backfill_pair(&mut out.opened, &mut out.open_rate, base);
    backfill_pair(&mut out.clicked, &mut out.click_rate, base);
    backfill_pair(&mut out.replied, &mut out.reply_rate, base);
    out
}

fn backfill_pair(count: &mut Option<u64>, rate: &mut Option<f64>, base: f64) {
    match (*count, *rate) {
        (Some(c), None) => *rate = Some(c as f64 / base),
        (None, Some(r)) if r.is_finite() && r >= 0.0 => {
            *count = Some((base * normalize_rate(r)).round() as u64);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<AnalyticsRecord> {
        vec![
            AnalyticsRecord::default(),
            AnalyticsRecord {
                sent: Some(100),
                opened: Some(25),
                ..Default::default()
            },
            AnalyticsRecord {
                delivered: Some(200),
                open_rate: Some(45.0),
                click_rate: Some(0.1),
                ..Default::default()
            },
            AnalyticsRecord {
                sent: Some(0),
                opened: Some(3),
                ..Default::default()
            },
            AnalyticsRecord {
                sent: Some(50),
                delivered: Some(40),
                opened: Some(10),
                open_rate: Some(0.9),
                replied: Some(1),
                ..Default::default()
            },
            AnalyticsRecord {
                opened: Some(7),
                click_rate: Some(0.5),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_delivered_from_sent_then_rate() {
        let out = finalize(&AnalyticsRecord {
            sent: Some(100),
            opened: Some(25),
            ..Default::default()
        });
        assert_eq!(out.delivered, Some(100));
        assert_eq!(out.open_rate, Some(0.25));
    }

    #[test]
    fn test_counts_from_percentage_rates() {
        let out = finalize(&AnalyticsRecord {
            delivered: Some(200),
            open_rate: Some(45.0),
            click_rate: Some(0.1),
            ..Default::default()
        });
        assert_eq!(out.opened, Some(90));
        assert_eq!(out.clicked, Some(20));
        // the stored rate is left as provided
        assert_eq!(out.open_rate, Some(45.0));
    }

    #[test]
    fn test_zero_base_derives_nothing() {
        let out = finalize(&AnalyticsRecord {
            sent: Some(0),
            opened: Some(3),
            ..Default::default()
        });
        assert_eq!(out.delivered, Some(0));
        assert_eq!(out.open_rate, None);
    }

    #[test]
    fn test_never_overwrites_present_fields() {
        for record in sample() {
            let out = finalize(&record);
            for (before, after) in record.counts().iter().zip(out.counts().iter()) {
                if before.is_some() {
                    assert_eq!(before, after);
                }
            }
            for (before, after) in record.rates().iter().zip(out.rates().iter()) {
                if before.is_some() {
                    assert_eq!(before, after);
                }
            }
        }
    }

    #[test]
    fn test_idempotent() {
        for record in sample() {
            let once = finalize(&record);
            assert_eq!(finalize(&once), once);
        }
    }
}
