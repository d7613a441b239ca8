use chrono::{DateTime, NaiveDateTime, Utc};
use lanecast_db::models::{DbFeed, DbPlanSlot};

/// Accept ISO-8601 with `Z`, with an explicit offset, or naive (assumed UTC).
pub fn parse_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    None
}

/// The short event identifier: everything up to the first `:` of the
/// event id (the play id of a `<play_id>[:<feed_id>]` pair).
pub fn event_uid(event_id: &str) -> &str {
    event_id.split(':').next().unwrap_or(event_id)
}

/// Deeplink construction is pluggable via the template; the default renders
/// the short sportscenter form.
pub fn deeplink(template: &str, event_id: &str) -> String {
    template.replace("{play_id}", event_uid(event_id))
}

/// Sort key for lane listings: numeric lanes first in numeric order, then
/// everything else lexicographically (`eplus01, eplus02, eplus10, ad-hoc`).
pub fn lane_sort_key(channel_id: &str) -> (u8, i64, String) {
    let digits: String = channel_id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    match digits.parse::<i64>() {
        Ok(n) => (0, n, channel_id.to_string()),
        Err(_) => (1, 0, channel_id.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuneOutcome {
    Feed(String),
    Slate(String),
    NoContent,
    NotFound,
}

/// Where a tune lands when the lane has no playable event right now.
pub fn fallback(slate: Option<&str>, only_live: bool) -> TuneOutcome {
    match slate {
        Some(url) if !only_live => TuneOutcome::Slate(url.to_string()),
        _ if only_live => TuneOutcome::NoContent,
        _ => TuneOutcome::NotFound,
    }
}

/// The tune decision for a resolved slot: redirect to the preferred feed if
/// it still exists, else the primary feed, else the slate fallback.
pub fn decide_tune(
    slot: Option<&DbPlanSlot>,
    feeds: &[DbFeed],
    slate: Option<&str>,
    only_live: bool,
) -> TuneOutcome {
    let Some(slot) = slot else {
        return fallback(slate, only_live);
    };
    if slot.is_placeholder() || slot.event_id.is_none() {
        return fallback(slate, only_live);
    }

    if let Some(preferred) = slot.preferred_feed_id.as_deref()
        && let Some(feed) = feeds.iter().find(|f| f.feed_id == preferred)
    {
        return TuneOutcome::Feed(feed.url.clone());
    }

    if let Some(primary) = feeds.iter().find(|f| f.is_primary) {
        return TuneOutcome::Feed(primary.url.clone());
    }

    fallback(slate, only_live)
}
