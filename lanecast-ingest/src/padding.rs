use chrono::{DateTime, Duration, Utc};
use lanecast_db::Event;
use lanecast_db::config::PaddingConfig;

/// An admitted event together with its padded interval. The padded endpoints
/// are what the assigner and builder schedule against; the event's own times
/// stay untouched for rendering.
#[derive(Debug, Clone)]
pub struct PaddedEvent {
    pub event: Event,
    pub effective_start: DateTime<Utc>,
    pub effective_end: DateTime<Utc>,
}

fn eligible(event: &Event, cfg: &PaddingConfig) -> bool {
    !cfg.live_only || (!event.is_reair && !event.is_studio)
}

pub fn apply(events: Vec<Event>, cfg: &PaddingConfig) -> Vec<PaddedEvent> {
    events
        .into_iter()
        .map(|event| {
            let (effective_start, effective_end) = if eligible(&event, cfg) {
                (
                    event.start_utc - Duration::minutes(cfg.start_mins),
                    event.stop_utc + Duration::minutes(cfg.end_mins),
                )
            } else {
                (event.start_utc, event.stop_utc)
            };

            PaddedEvent {
                event,
                effective_start,
                effective_end,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanecast_db::EventType;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn event(id: &str, reair: bool, studio: bool) -> Event {
        Event {
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
            is_reair: reair,
            is_studio: studio,
            airing_id: None,
            simulcast_airing_id: None,
            image: None,
            start_utc: utc("2025-01-01T01:00:00Z"),
            stop_utc: utc("2025-01-01T02:00:00Z"),
        }
    }

    #[test]
    fn pads_both_ends() {
        let cfg = PaddingConfig {
            start_mins: 5,
            end_mins: 30,
            live_only: true,
        };
        let padded = apply(vec![event("a", false, false)], &cfg);
        assert_eq!(padded[0].effective_start, utc("2025-01-01T00:55:00Z"));
        assert_eq!(padded[0].effective_end, utc("2025-01-01T02:30:00Z"));
        // The event's own interval is untouched
        assert_eq!(padded[0].event.start_utc, utc("2025-01-01T01:00:00Z"));
    }

    #[test]
    fn live_only_skips_reairs_and_studio_shows() {
        let cfg = PaddingConfig {
            start_mins: 5,
            end_mins: 30,
            live_only: true,
        };
        let padded = apply(
            vec![event("reair", true, false), event("studio", false, true)],
            &cfg,
        );
        for p in &padded {
            assert_eq!(p.effective_start, p.event.start_utc);
            assert_eq!(p.effective_end, p.event.stop_utc);
        }

        let cfg = PaddingConfig {
            live_only: false,
            ..cfg
        };
        let padded = apply(vec![event("reair", true, false)], &cfg);
        assert_eq!(padded[0].effective_end, utc("2025-01-01T02:30:00Z"));
    }

    #[test]
    fn more_end_padding_never_shrinks_an_interval() {
        let small = PaddingConfig {
            start_mins: 0,
            end_mins: 10,
            live_only: true,
        };
        let large = PaddingConfig {
            end_mins: 45,
            ..small.clone()
        };

        let a = apply(vec![event("a", false, false)], &small);
        let b = apply(vec![event("a", false, false)], &large);
        assert!(b[0].effective_end > a[0].effective_end);
        assert_eq!(b[0].effective_start, a[0].effective_start);
    }
}
