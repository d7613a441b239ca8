use chrono::{DateTime, Duration, DurationRound, Utc};
use hashbrown::HashMap;
use itertools::Itertools;
use lanecast_db::models::DbFeed;
use sha2::{Digest, Sha256};
use strum::Display;

use crate::assign::DroppedEvent;
use crate::padding::PaddedEvent;

pub const KIND_EVENT: &str = "event";
pub const KIND_PLACEHOLDER: &str = "placeholder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PlaceholderReason {
    GapBefore,
    GapBetween,
    GapAfter,
}

impl PlaceholderReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaceholderReason::GapBefore => "gap_before",
            PlaceholderReason::GapBetween => "gap_between",
            PlaceholderReason::GapAfter => "gap_after",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotBody {
    Event {
        event_id: String,
        preferred_feed_id: Option<String>,
    },
    Placeholder {
        reason: PlaceholderReason,
    },
}

/// One scheduled interval on one lane, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotDraft {
    pub channel_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub body: SlotBody,
}

impl SlotDraft {
    pub fn is_event(&self) -> bool {
        matches!(self.body, SlotBody::Event { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GridParams {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub min_gap_mins: i64,
}

/// The plan window starts on an `align_mins` grid mark at or before `now`, so
/// placeholder boundaries land on the grid wherever an event endpoint doesn't
/// force them off it.
pub fn window_for(
    now: DateTime<Utc>,
    align_mins: i64,
    min_gap_mins: i64,
    valid_hours: i64,
) -> GridParams {
    let align = Duration::minutes(align_mins.max(1));
    let valid_from = now.duration_trunc(align).unwrap_or(now);

    GridParams {
        valid_from,
        valid_to: valid_from + Duration::hours(valid_hours),
        min_gap_mins,
    }
}

/// Pick the feed a tune should prefer: the primary if one exists, otherwise
/// the highest feed id for a stable choice.
pub fn preferred_feed(feeds: &[DbFeed]) -> Option<&DbFeed> {
    feeds
        .iter()
        .find(|f| f.is_primary)
        .or_else(|| feeds.iter().max_by(|a, b| a.feed_id.cmp(&b.feed_id)))
}

/// Materialize the gap-free schedule for one lane. Events arrive already
/// assigned and conflict-free; overlaps that still show up are dropped
/// defensively, keeping the earlier event. Padded event endpoints are
/// authoritative and placeholders absorb any grid offset.
pub fn build_lane(
    channel_id: &str,
    events: &[PaddedEvent],
    feeds_by_event: &HashMap<String, Vec<DbFeed>>,
    grid: &GridParams,
) -> (Vec<SlotDraft>, Vec<DroppedEvent>) {
    let mut dropped = Vec::new();

    // Clip to the window, dropping intervals that become empty
    let mut clipped = events
        .iter()
        .filter_map(|e| {
            let start = e.effective_start.max(grid.valid_from);
            let end = e.effective_end.min(grid.valid_to);
            (start < end).then_some((start, end, e))
        })
        .collect_vec();
    clipped.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.event.event_id.cmp(&b.2.event.event_id)));

    let mut slots: Vec<SlotDraft> = Vec::new();
    let mut cursor = grid.valid_from;
    let mut saw_event = false;

    for (start, end, padded) in clipped {
        if start < cursor {
            // The assigner shouldn't let this through; keep the earlier event
            dropped.push(DroppedEvent {
                event_id: padded.event.event_id.clone(),
                reason: format!("overlaps prior slot on {channel_id}"),
            });
            continue;
        }

        if start > cursor {
            let gap = start - cursor;
            let too_small =
                gap < Duration::seconds(1) || gap < Duration::minutes(grid.min_gap_mins);
            match slots.last_mut() {
                // Gaps below the placeholder minimum close by extending the
                // prior event slot instead of scheduling a sliver
                Some(prev) if too_small => prev.end = start,
                _ => {
                    let reason = if saw_event {
                        PlaceholderReason::GapBetween
                    } else {
                        PlaceholderReason::GapBefore
                    };
                    slots.push(placeholder(channel_id, cursor, start, reason));
                }
            }
        }

        let feeds = feeds_by_event
            .get(&padded.event.event_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        slots.push(SlotDraft {
            channel_id: channel_id.to_string(),
            start,
            end,
            body: SlotBody::Event {
                event_id: padded.event.event_id.clone(),
                preferred_feed_id: preferred_feed(feeds).map(|f| f.feed_id.clone()),
            },
        });
        saw_event = true;
        cursor = end;
    }

    if cursor < grid.valid_to {
        let gap = grid.valid_to - cursor;
        let too_small =
            gap < Duration::seconds(1) || gap < Duration::minutes(grid.min_gap_mins);
        match slots.last_mut() {
            Some(prev) if too_small => prev.end = grid.valid_to,
            _ => {
                let reason = if saw_event {
                    PlaceholderReason::GapAfter
                } else {
                    PlaceholderReason::GapBefore
                };
                slots.push(placeholder(channel_id, cursor, grid.valid_to, reason));
            }
        }
    }

    (slots, dropped)
}

fn placeholder(
    channel_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reason: PlaceholderReason,
) -> SlotDraft {
    SlotDraft {
        channel_id: channel_id.to_string(),
        start,
        end,
        body: SlotBody::Placeholder { reason },
    }
}

/// Pre-commit check of the per-lane invariants: slots tile
/// `[valid_from, valid_to)` exactly, in order, without overlaps, and event
/// slots carry an event id.
pub fn verify_lane(
    channel_id: &str,
    slots: &[SlotDraft],
    grid: &GridParams,
) -> Result<(), String> {
    let Some(first) = slots.first() else {
        return Err(format!("lane {channel_id} has no slots"));
    };

    if first.start != grid.valid_from {
        return Err(format!(
            "lane {channel_id} starts at {} instead of {}",
            first.start, grid.valid_from
        ));
    }

    for (a, b) in slots.iter().tuple_windows() {
        if a.end != b.start {
            return Err(format!(
                "lane {channel_id} has a seam between {} and {}",
                a.end, b.start
            ));
        }
        if a.start >= a.end {
            return Err(format!("lane {channel_id} has an empty slot at {}", a.start));
        }
    }

    let last = slots.last().expect("checked non-empty above");
    if last.start >= last.end {
        return Err(format!("lane {channel_id} has an empty slot at {}", last.start));
    }
    if last.end != grid.valid_to {
        return Err(format!(
            "lane {channel_id} ends at {} instead of {}",
            last.end, grid.valid_to
        ));
    }

    for slot in slots {
        if let SlotBody::Event { event_id, .. } = &slot.body {
            if event_id.is_empty() {
                return Err(format!(
                    "lane {channel_id} has an event slot without an event at {}",
                    slot.start
                ));
            }
        }
    }

    Ok(())
}

/// Checksum over the sorted slot tuples; identical plan content yields an
/// identical checksum regardless of build order.
pub fn plan_checksum(plan_id: i64, slots: &[SlotDraft]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plan_id.to_le_bytes());

    let sorted = slots
        .iter()
        .sorted_by(|a, b| a.channel_id.cmp(&b.channel_id).then_with(|| a.start.cmp(&b.start)));

    for slot in sorted {
        let (kind, event_id, feed, reason) = match &slot.body {
            SlotBody::Event {
                event_id,
                preferred_feed_id,
            } => (
                KIND_EVENT,
                event_id.as_str(),
                preferred_feed_id.as_deref().unwrap_or(""),
                "",
            ),
            SlotBody::Placeholder { reason } => (KIND_PLACEHOLDER, "", "", reason.as_str()),
        };
        hasher.update(
            format!(
                "{}|{}|{}|{}|{}|{}|{}\n",
                slot.channel_id,
                slot.start.timestamp(),
                slot.end.timestamp(),
                kind,
                event_id,
                feed,
                reason
            )
            .as_bytes(),
        );
    }

    format!("{:x}", hasher.finalize())
}
