use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use itertools::Itertools;
use lanecast_db::models::DbChannel;

use crate::padding::PaddedEvent;

/// The lane facts the assigner needs; `chno` drives the stable first-fit
/// order.
#[derive(Debug, Clone)]
pub struct LaneRef {
    pub channel_id: String,
    pub chno: i32,
}

impl From<&DbChannel> for LaneRef {
    fn from(ch: &DbChannel) -> Self {
        LaneRef {
            channel_id: ch.channel_id.clone(),
            chno: ch.chno,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DroppedEvent {
    pub event_id: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct AssignmentOutcome {
    /// Events per lane, in effective-start order.
    pub by_lane: HashMap<String, Vec<PaddedEvent>>,
    /// The next sticky map: every accepted event's lane.
    pub sticky: HashMap<String, String>,
    pub dropped: Vec<DroppedEvent>,
}

fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

fn fits(timeline: &[(DateTime<Utc>, DateTime<Utc>)], event: &PaddedEvent) -> bool {
    timeline
        .iter()
        .all(|&(s, e)| !overlaps(event.effective_start, event.effective_end, s, e))
}

/// Place each padded event on exactly one lane, preferring its sticky lane
/// when that lane is still free for the interval. Events are processed in
/// (effective_start, event_id) order so the earliest event on any lane wins
/// over later conflicting ones. Events that fit nowhere are dropped and
/// reported.
///
/// With `force_replan` the prior sticky map is ignored entirely and the
/// result depends only on the events, the lanes, and their order.
pub fn assign(
    mut events: Vec<PaddedEvent>,
    lanes: &[LaneRef],
    prior_sticky: &HashMap<String, String>,
    force_replan: bool,
) -> AssignmentOutcome {
    events.sort_by(|a, b| {
        a.effective_start
            .cmp(&b.effective_start)
            .then_with(|| a.event.event_id.cmp(&b.event.event_id))
    });

    let lanes = lanes
        .iter()
        .sorted_by_key(|l| l.chno)
        .cloned()
        .collect_vec();

    let mut timelines: HashMap<&str, Vec<(DateTime<Utc>, DateTime<Utc>)>> = lanes
        .iter()
        .map(|l| (l.channel_id.as_str(), Vec::new()))
        .collect();

    let mut by_lane: HashMap<String, Vec<PaddedEvent>> = HashMap::new();
    let mut sticky = HashMap::new();
    let mut dropped = Vec::new();

    for event in events {
        let pref = if force_replan {
            None
        } else {
            prior_sticky
                .get(&event.event.event_id)
                .filter(|lane| timelines.contains_key(lane.as_str()))
        };

        let target = pref
            .filter(|lane| fits(&timelines[lane.as_str()], &event))
            .cloned()
            .or_else(|| {
                lanes
                    .iter()
                    .find(|lane| fits(&timelines[lane.channel_id.as_str()], &event))
                    .map(|lane| lane.channel_id.clone())
            });

        match target {
            Some(lane) => {
                timelines
                    .get_mut(lane.as_str())
                    .unwrap()
                    .push((event.effective_start, event.effective_end));
                sticky.insert(event.event.event_id.clone(), lane.clone());
                by_lane.entry(lane).or_default().push(event);
            }
            None => {
                dropped.push(DroppedEvent {
                    event_id: event.event.event_id.clone(),
                    reason: "no lane free for padded interval".to_string(),
                });
            }
        }
    }

    AssignmentOutcome {
        by_lane,
        sticky,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanecast_db::{Event, EventType};

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn lanes(n: i32) -> Vec<LaneRef> {
        (1..=n)
            .map(|chno| LaneRef {
                channel_id: format!("eplus{chno:02}"),
                chno,
            })
            .collect()
    }

    fn padded(id: &str, start: &str, stop: &str) -> PaddedEvent {
        let event = Event {
            event_id: id.to_string(),
            title: "Test Event".to_string(),
            subtitle: None,
            summary: None,
            sport: Some("Soccer".to_string()),
            league_name: None,
            league_abbr: None,
            network: None,
            network_short: None,
            language: None,
            packages: Vec::new(),
            event_type: EventType::Live,
            is_reair: false,
            is_studio: false,
            airing_id: None,
            simulcast_airing_id: None,
            image: None,
            start_utc: utc(start),
            stop_utc: utc(stop),
        };
        PaddedEvent {
            effective_start: event.start_utc,
            effective_end: event.stop_utc,
            event,
        }
    }

    #[test]
    fn non_overlapping_events_share_the_first_lane() {
        let outcome = assign(
            vec![
                padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
                padded("b", "2025-01-01T02:00:00Z", "2025-01-01T03:00:00Z"),
            ],
            &lanes(3),
            &HashMap::new(),
            false,
        );

        assert_eq!(outcome.by_lane["eplus01"].len(), 2);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn overlapping_events_spill_to_the_next_lane() {
        let outcome = assign(
            vec![
                padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
                padded("b", "2025-01-01T01:30:00Z", "2025-01-01T02:30:00Z"),
            ],
            &lanes(3),
            &HashMap::new(),
            false,
        );

        assert_eq!(outcome.by_lane["eplus01"][0].event.event_id, "a");
        assert_eq!(outcome.by_lane["eplus02"][0].event.event_id, "b");
        assert_eq!(outcome.sticky["b"], "eplus02");
    }

    #[test]
    fn overflow_is_dropped_with_a_reason() {
        let outcome = assign(
            vec![
                padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
                padded("b", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
            ],
            &lanes(1),
            &HashMap::new(),
            false,
        );

        assert_eq!(outcome.by_lane["eplus01"][0].event.event_id, "a");
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].event_id, "b");
        assert!(!outcome.sticky.contains_key("b"));
    }

    #[test]
    fn sticky_lane_wins_over_a_lower_free_lane() {
        let mut sticky = HashMap::new();
        sticky.insert("a".to_string(), "eplus02".to_string());

        let outcome = assign(
            vec![padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z")],
            &lanes(3),
            &sticky,
            false,
        );

        assert!(outcome.by_lane.contains_key("eplus02"));
        assert_eq!(outcome.sticky["a"], "eplus02");
    }

    #[test]
    fn force_replan_ignores_sticky_entirely() {
        let mut sticky = HashMap::new();
        sticky.insert("a".to_string(), "eplus02".to_string());

        let outcome = assign(
            vec![padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z")],
            &lanes(3),
            &sticky,
            true,
        );

        assert!(outcome.by_lane.contains_key("eplus01"));
        assert_eq!(outcome.sticky["a"], "eplus01");
    }

    #[test]
    fn sticky_to_a_busy_lane_falls_back_to_first_fit() {
        let mut sticky = HashMap::new();
        sticky.insert("b".to_string(), "eplus01".to_string());

        let outcome = assign(
            vec![
                padded("a", "2025-01-01T01:00:00Z", "2025-01-01T03:00:00Z"),
                padded("b", "2025-01-01T02:00:00Z", "2025-01-01T04:00:00Z"),
            ],
            &lanes(2),
            &sticky,
            false,
        );

        // "a" starts earlier so it takes eplus01; "b"'s sticky lane is busy
        assert_eq!(outcome.by_lane["eplus01"][0].event.event_id, "a");
        assert_eq!(outcome.by_lane["eplus02"][0].event.event_id, "b");
    }

    #[test]
    fn sticky_to_a_vanished_lane_is_ignored() {
        let mut sticky = HashMap::new();
        sticky.insert("a".to_string(), "eplus09".to_string());

        let outcome = assign(
            vec![padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z")],
            &lanes(2),
            &sticky,
            false,
        );

        assert!(outcome.by_lane.contains_key("eplus01"));
    }

    #[test]
    fn tied_start_times_break_by_event_id() {
        let outcome = assign(
            vec![
                padded("b", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
                padded("a", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
            ],
            &lanes(2),
            &HashMap::new(),
            false,
        );

        assert_eq!(outcome.by_lane["eplus01"][0].event.event_id, "a");
        assert_eq!(outcome.by_lane["eplus02"][0].event.event_id, "b");
    }
}
