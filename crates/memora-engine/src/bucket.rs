//! Grouping conversations into recency buckets for navigation

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use memora_client::Conversation;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyLabel {
    Today,
    Yesterday,
    Previous7Days,
    Previous30Days,
    Older,
}

impl RecencyLabel {
    pub const ALL: [RecencyLabel; 5] = [
        RecencyLabel::Today,
        RecencyLabel::Yesterday,
        RecencyLabel::Previous7Days,
        RecencyLabel::Previous30Days,
        RecencyLabel::Older,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecencyLabel::Today => "Today",
            RecencyLabel::Yesterday => "Yesterday",
            RecencyLabel::Previous7Days => "Previous 7 days",
            RecencyLabel::Previous30Days => "Previous 30 days",
            RecencyLabel::Older => "Older",
        }
    }
}

impl fmt::Display for RecencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecencyBucket {
    pub label: RecencyLabel,
    pub conversations: Vec<Conversation>,
}

/// Lower bounds of each bucket except `Older`, derived from `now`
struct Boundaries {
    today: DateTime<Utc>,
    yesterday: DateTime<Utc>,
    week: DateTime<Utc>,
    month: DateTime<Utc>,
}

impl Boundaries {
    /// Day boundaries follow `now`'s own timezone
    fn new<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let since_midnight = Duration::seconds(i64::from(now.num_seconds_from_midnight()))
            + Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000_000));
        let today = now.with_timezone(&Utc) - since_midnight;
        Self {
            today,
            yesterday: today - Duration::days(1),
            week: today - Duration::days(7),
            month: today - Duration::days(30),
        }
    }

    fn label(&self, at: DateTime<Utc>) -> RecencyLabel {
        if at >= self.today {
            RecencyLabel::Today
        } else if at >= self.yesterday {
            RecencyLabel::Yesterday
        } else if at >= self.week {
            RecencyLabel::Previous7Days
        } else if at >= self.month {
            RecencyLabel::Previous30Days
        } else {
            RecencyLabel::Older
        }
    }
}

/// Group conversations by how recently they were updated relative to `now`.
///
/// Buckets come out in fixed order (newest first) and empty buckets are
/// omitted. Within a bucket the input order is kept.
pub fn bucket<Tz: TimeZone>(conversations: &[Conversation], now: &DateTime<Tz>) -> Vec<RecencyBucket> {
    let bounds = Boundaries::new(now);
    let mut grouped: [Vec<Conversation>; 5] = Default::default();

    for conversation in conversations {
        let label = bounds.label(conversation.updated_at);
        grouped[label as usize].push(conversation.clone());
    }

    RecencyLabel::ALL
        .into_iter()
        .zip(grouped)
        .filter(|(_, conversations)| !conversations.is_empty())
        .map(|(label, conversations)| RecencyBucket { label, conversations })
        .collect()
}
