//! Field-name aliases for every metric the extractor knows about.
//!
//! The ESP renames fields between API versions and account plans, so each
//! canonical metric maps to the spellings observed so far. Keys are compared
//! after [`crate::deep_field::normalize_key`], so casing and separators do
//! not need separate entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricField {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Replied,
    Bounced,
    Failed,
    Unsubscribed,
    OpenRate,
    ClickRate,
    ReplyRate,
}

impl MetricField {
    pub const ALL: [MetricField; 11] = [
        MetricField::Sent,
        MetricField::Delivered,
        MetricField::Opened,
        MetricField::Clicked,
        MetricField::Replied,
        MetricField::Bounced,
        MetricField::Failed,
        MetricField::Unsubscribed,
        MetricField::OpenRate,
        MetricField::ClickRate,
        MetricField::ReplyRate,
    ];

    pub fn aliases(self) -> &'static [&'static str] {
        ALIAS_TABLE
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricField::Sent => "sent",
            MetricField::Delivered => "delivered",
            MetricField::Opened => "opened",
            MetricField::Clicked => "clicked",
            MetricField::Replied => "replied",
            MetricField::Bounced => "bounced",
            MetricField::Failed => "failed",
            MetricField::Unsubscribed => "unsubscribed",
            MetricField::OpenRate => "openRate",
            MetricField::ClickRate => "clickRate",
            MetricField::ReplyRate => "replyRate",
        }
    }
}

pub static ALIAS_TABLE: &[(MetricField, &[&str])] = &[
    (
        MetricField::Sent,
        &[
            "sentCount",
            "sent",
            "totalSent",
            "emailsSent",
            "sentEmails",
            "processedCount",
            "processed",
            "successCount",
            "success",
            "totalRecipients",
            "recipientCount",
        ],
    ),
    (
        MetricField::Delivered,
        &[
            "deliveredCount",
            "delivered",
            "totalDelivered",
            "emailsDelivered",
            "deliveries",
            "acceptedCount",
            "accepted",
        ],
    ),
    (
        MetricField::Opened,
        &[
            "openedCount",
            "opened",
            "opens",
            "openCount",
            "totalOpens",
            "totalOpened",
            "uniqueOpens",
            "uniqueOpened",
            "emailsOpened",
            "readCount",
            "reads",
        ],
    ),
    (
        MetricField::Clicked,
        &[
            "clickedCount",
            "clicked",
            "clicks",
            "clickCount",
            "totalClicks",
            "totalClicked",
            "uniqueClicks",
            "uniqueClicked",
            "emailsClicked",
        ],
    ),
    (
        MetricField::Replied,
        &[
            "repliedCount",
            "replied",
            "replies",
            "replyCount",
            "totalReplies",
            "emailsReplied",
        ],
    ),
    (
        MetricField::Bounced,
        &[
            "bouncedCount",
            "bounced",
            "bounces",
            "bounceCount",
            "totalBounces",
            "hardBounces",
            "emailsBounced",
        ],
    ),
    (
        MetricField::Failed,
        &[
            "failedCount",
            "failed",
            "failures",
            "failureCount",
            "errorCount",
            "skippedCount",
            "skipped",
        ],
    ),
    (
        MetricField::Unsubscribed,
        &[
            "unsubscribedCount",
            "unsubscribed",
            "unsubscribes",
            "unsubscribeCount",
            "totalUnsubscribes",
            "optOuts",
            "optedOut",
        ],
    ),
    (
        MetricField::OpenRate,
        &["openRate", "openedRate", "openPercentage", "openPercent", "uniqueOpenRate"],
    ),
    (
        MetricField::ClickRate,
        &[
            "clickRate",
            "clickedRate",
            "clickPercentage",
            "clickPercent",
            "clickThroughRate",
            "ctr",
        ],
    ),
    (
        MetricField::ReplyRate,
        &["replyRate", "repliedRate", "replyPercentage", "replyPercent"],
    ),
];

/// Label keywords for bucket arrays, evaluated top to bottom. The first rule
/// whose keyword occurs in the normalized label decides. `None` marks labels
/// that are recognized but deliberately not tracked.
pub static BUCKET_LABEL_RULES: &[(&[&str], Option<MetricField>)] = &[
    (&["unsubscribe", "unsub", "optout"], Some(MetricField::Unsubscribed)),
    (&["complain", "spam"], None),
    (&["bounce"], Some(MetricField::Bounced)),
    (&["skip", "fail", "error"], Some(MetricField::Failed)),
    (&["repl"], Some(MetricField::Replied)),
    (&["click"], Some(MetricField::Clicked)),
    (&["open", "read"], Some(MetricField::Opened)),
    (&["deliver", "accept"], Some(MetricField::Delivered)),
    (&["success", "sent", "processed"], Some(MetricField::Sent)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_metric_has_aliases() {
        for field in MetricField::ALL {
            assert!(!field.aliases().is_empty(), "{field:?} has no aliases");
        }
    }

    #[test]
    fn test_aliases_do_not_overlap_after_normalization() {
        let mut seen = std::collections::HashMap::new();
        for (field, aliases) in ALIAS_TABLE {
            for alias in *aliases {
                let key = crate::deep_field::normalize_key(alias);
                if let Some(previous) = seen.insert(key.clone(), *field) {
                    panic!("alias {key} listed for both {previous:?} and {field:?}");
                }
            }
        }
    }
}
