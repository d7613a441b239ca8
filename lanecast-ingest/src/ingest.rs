use chrono::{DateTime, Utc};
use futures::{StreamExt, pin_mut};
use lanecast_db::SqliteConnection;
use lanecast_db::db;
use lanecast_db::event::EventType;
use lanecast_db::models::{NewEvent, NewFeed};
use log::warn;
use watchgraph::{Airing, WatchGraph, WatchGraphError};

#[derive(Debug, Default)]
pub struct IngestStats {
    pub upserted: usize,
    pub skipped: usize,
}

/// Drain the paged airing stream into memory so a mid-stream upstream error
/// aborts the whole fetch instead of half-writing a page.
pub async fn fetch_airings(
    source: &WatchGraph,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Airing>, WatchGraphError> {
    let stream = source.airings(from, to);
    pin_mut!(stream);

    let mut airings = Vec::new();
    while let Some(item) = stream.next().await {
        airings.push(item?);
    }

    Ok(airings)
}

/// Keyed upserts make this idempotent: storing the same payload twice leaves
/// the same rows behind.
pub fn store_airings(
    conn: &mut SqliteConnection,
    airings: &[Airing],
    now: DateTime<Utc>,
) -> Result<IngestStats, diesel::result::Error> {
    conn.immediate_transaction(|conn| {
        let mut stats = IngestStats::default();

        for airing in airings {
            if airing.start_time >= airing.end_time {
                warn!(
                    "Skipping airing {} with non-positive duration ({} .. {})",
                    airing.id, airing.start_time, airing.end_time
                );
                stats.skipped += 1;
                continue;
            }

            let packages = serde_json::to_string(&airing.packages)
                .unwrap_or_else(|_| "[]".to_string());
            let event_type = airing
                .airing_type
                .as_deref()
                .map(EventType::parse)
                .unwrap_or(EventType::Unknown);
            let event_type_name = event_type.to_string();

            let row = NewEvent {
                event_id: &airing.id,
                title: &airing.name,
                subtitle: airing.short_name.as_deref(),
                summary: airing.description.as_deref(),
                sport: airing.sport.as_deref(),
                league_name: airing.league.as_ref().and_then(|l| l.name.as_deref()),
                league_abbr: airing
                    .league
                    .as_ref()
                    .and_then(|l| l.abbreviation.as_deref()),
                network: airing.network.as_ref().and_then(|n| n.name.as_deref()),
                network_short: airing
                    .network
                    .as_ref()
                    .and_then(|n| n.short_name.as_deref()),
                language: airing.language.as_deref(),
                packages: &packages,
                event_type: &event_type_name,
                is_reair: airing.re_air,
                is_studio: airing.studio || event_type == EventType::Studio,
                airing_id: airing.airing_id.as_deref(),
                simulcast_airing_id: airing.simulcast_airing_id.as_deref(),
                image: airing.image.as_deref(),
                start_utc: airing.start_time.naive_utc(),
                stop_utc: airing.end_time.naive_utc(),
                first_seen_utc: now.naive_utc(),
                last_seen_utc: now.naive_utc(),
            };

            db::upsert_events(conn, std::slice::from_ref(&row))?;
            db::replace_feeds(conn, &airing.id, &normalized_feeds(airing))?;
            stats.upserted += 1;
        }

        Ok(stats)
    })
}

/// At most one feed per event may be primary; the first one claiming it wins
/// and the rest are demoted.
fn normalized_feeds(airing: &Airing) -> Vec<NewFeed<'_>> {
    let mut seen_primary = false;

    airing
        .feeds
        .iter()
        .map(|feed| {
            let is_primary = feed.primary && !seen_primary;
            seen_primary |= is_primary;
            NewFeed {
                feed_id: &feed.id,
                event_id: &airing.id,
                url: &feed.url,
                is_primary,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanecast_db::migrations::run_migrations_on;
    use watchgraph::AiringFeed;

    fn test_conn() -> SqliteConnection {
        let mut conn = lanecast_db::establish(":memory:").unwrap();
        run_migrations_on(&mut conn).unwrap();
        conn
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn airing(id: &str) -> Airing {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": "Arsenal vs. Chelsea",
            "sport": "Soccer",
            "type": "LIVE",
            "packages": ["ESPN_PLUS"],
            "startTime": "2025-01-01T01:00:00Z",
            "endTime": "2025-01-01T02:00:00Z",
            "feeds": [
                {"id": "f1", "url": "https://example.com/f1.m3u8", "primary": true},
                {"id": "f2", "url": "https://example.com/f2.m3u8", "primary": true}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn storing_the_same_payload_twice_is_a_noop() {
        let mut conn = test_conn();
        let airings = vec![airing("ev1"), airing("ev2")];
        let now = utc("2025-01-01T00:00:00Z");

        store_airings(&mut conn, &airings, now).unwrap();
        let first: Vec<_> = db::list_events_in_window(
            &mut conn,
            utc("2025-01-01T00:00:00Z"),
            utc("2025-01-02T00:00:00Z"),
        )
        .unwrap()
        .iter()
        .map(|e| e.event_id.clone())
        .collect();

        store_airings(&mut conn, &airings, now).unwrap();
        let second: Vec<_> = db::list_events_in_window(
            &mut conn,
            utc("2025-01-01T00:00:00Z"),
            utc("2025-01-02T00:00:00Z"),
        )
        .unwrap()
        .iter()
        .map(|e| e.event_id.clone())
        .collect();

        assert_eq!(first, second);
        assert_eq!(db::count_events(&mut conn).unwrap(), 2);
        assert_eq!(db::feeds_for_event(&mut conn, "ev1").unwrap().len(), 2);
    }

    #[test]
    fn duplicate_primary_flags_are_demoted() {
        let binding = airing("ev1");
        let feeds = normalized_feeds(&binding);
        assert!(feeds[0].is_primary);
        assert!(!feeds[1].is_primary);
    }

    #[test]
    fn no_primary_feed_stays_that_way() {
        let mut a = airing("ev1");
        a.feeds = vec![
            AiringFeed {
                id: "f1".to_string(),
                url: "https://example.com/f1.m3u8".to_string(),
                primary: false,
            },
        ];
        let feeds = normalized_feeds(&a);
        assert!(!feeds[0].is_primary);
    }

    #[test]
    fn inverted_intervals_are_skipped() {
        let mut conn = test_conn();
        let mut bad = airing("bad");
        bad.end_time = utc("2025-01-01T00:30:00Z");

        let stats =
            store_airings(&mut conn, &[bad, airing("ok")], utc("2025-01-01T00:00:00Z")).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.upserted, 1);
        assert_eq!(db::count_events(&mut conn).unwrap(), 1);
    }
}
