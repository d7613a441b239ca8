mod events;

pub use events::*;

use chrono::{DateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::{QueryResult, SqliteConnection};
use hashbrown::HashMap;

use crate::models::{
    DbChannel, DbPlanRun, DbPlanSlot, NewChannel, NewEventLane, NewPlanRun, NewPlanSlot,
};

/// Provision lanes `eplus01..eplusNN` if missing and flip `active` so exactly
/// lanes 1..=count are live. Existing rows keep any operator-edited names.
pub fn ensure_lanes(conn: &mut SqliteConnection, count: i32, group: &str) -> QueryResult<()> {
    use crate::schema::channels::dsl;

    for chno in 1..=count {
        let channel_id = format!("eplus{chno:02}");
        let name = format!("ESPN+ {chno:02}");

        diesel::insert_or_ignore_into(dsl::channels)
            .values(NewChannel {
                channel_id: &channel_id,
                chno,
                name: &name,
                group_name: group,
                active: true,
            })
            .execute(conn)?;
    }

    diesel::update(dsl::channels.filter(dsl::chno.le(count)))
        .set(dsl::active.eq(true))
        .execute(conn)?;
    diesel::update(dsl::channels.filter(dsl::chno.gt(count)))
        .set(dsl::active.eq(false))
        .execute(conn)?;

    Ok(())
}

pub fn active_channels(conn: &mut SqliteConnection) -> QueryResult<Vec<DbChannel>> {
    use crate::schema::channels::dsl;

    dsl::channels
        .filter(dsl::active.eq(true))
        .order_by(dsl::chno.asc())
        .select(DbChannel::as_select())
        .get_results(conn)
}

/// Lane lookup accepting `eplus10`, `10`, and prefixed forms with unpadded
/// digits. Tries the literal channel id first, then the numeric `chno`.
pub fn channel_for_lane(
    conn: &mut SqliteConnection,
    lane: &str,
) -> QueryResult<Option<DbChannel>> {
    use crate::schema::channels::dsl;

    let by_id = dsl::channels
        .filter(dsl::channel_id.eq(lane))
        .select(DbChannel::as_select())
        .first(conn)
        .optional()?;
    if by_id.is_some() {
        return Ok(by_id);
    }

    let digits: String = lane.chars().filter(|c| c.is_ascii_digit()).collect();
    let Ok(chno) = digits.parse::<i32>() else {
        return Ok(None);
    };

    dsl::channels
        .filter(dsl::chno.eq(chno))
        .select(DbChannel::as_select())
        .first(conn)
        .optional()
}

pub fn load_sticky_map(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, String>> {
    use crate::schema::event_lanes::dsl;

    let rows: Vec<(String, String)> = dsl::event_lanes
        .select((dsl::event_id, dsl::channel_id))
        .get_results(conn)?;

    Ok(rows.into_iter().collect())
}

pub fn clear_sticky_map(conn: &mut SqliteConnection) -> QueryResult<usize> {
    use crate::schema::event_lanes::dsl;

    diesel::delete(dsl::event_lanes).execute(conn)
}

/// Upsert the learned event→lane pins. `pinned_at_utc` survives updates so
/// the original pin time stays observable.
pub fn write_sticky_map(
    conn: &mut SqliteConnection,
    map: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    use crate::schema::event_lanes::dsl;
    use diesel::upsert::excluded;

    let now = now.naive_utc();
    for (event_id, channel_id) in map {
        diesel::insert_into(dsl::event_lanes)
            .values(NewEventLane {
                event_id,
                channel_id,
                pinned_at_utc: now,
                last_seen_utc: now,
            })
            .on_conflict(dsl::event_id)
            .do_update()
            .set((
                dsl::channel_id.eq(excluded(dsl::channel_id)),
                dsl::last_seen_utc.eq(excluded(dsl::last_seen_utc)),
            ))
            .execute(conn)?;
    }

    Ok(())
}

/// Open a new, uncommitted plan run. Until `commit_plan` flips `committed`,
/// readers going through `latest_plan_id` cannot see it.
pub fn begin_plan(
    conn: &mut SqliteConnection,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    source_version: Option<&str>,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> QueryResult<i64> {
    use crate::schema::plan_runs::dsl;

    NewPlanRun {
        generated_at_utc: now.naive_utc(),
        valid_from_utc: valid_from.naive_utc(),
        valid_to_utc: valid_to.naive_utc(),
        source_version,
        note,
    }
    .insert_into(dsl::plan_runs)
    .returning(dsl::plan_id)
    .get_result(conn)
}

pub fn write_slots(conn: &mut SqliteConnection, slots: &[NewPlanSlot]) -> QueryResult<usize> {
    use crate::schema::plan_slots::dsl;

    let mut written = 0;
    for chunk in slots.chunks(500) {
        written += diesel::insert_into(dsl::plan_slots)
            .values(chunk)
            .execute(conn)?;
    }

    Ok(written)
}

pub fn commit_plan(
    conn: &mut SqliteConnection,
    plan_id: i64,
    checksum: &str,
) -> QueryResult<()> {
    use crate::schema::plan_runs::dsl;

    diesel::update(dsl::plan_runs.filter(dsl::plan_id.eq(plan_id)))
        .set((dsl::committed.eq(true), dsl::checksum.eq(checksum)))
        .execute(conn)
        .map(|_| ())
}

pub fn latest_plan_id(conn: &mut SqliteConnection) -> QueryResult<Option<i64>> {
    use crate::schema::plan_runs::dsl;

    dsl::plan_runs
        .filter(dsl::committed.eq(true))
        .select(max(dsl::plan_id))
        .get_result(conn)
}

pub fn plan_run(conn: &mut SqliteConnection, plan_id: i64) -> QueryResult<Option<DbPlanRun>> {
    use crate::schema::plan_runs::dsl;

    dsl::plan_runs
        .filter(dsl::plan_id.eq(plan_id))
        .select(DbPlanRun::as_select())
        .first(conn)
        .optional()
}

pub fn slots_for_plan(
    conn: &mut SqliteConnection,
    plan_id: i64,
) -> QueryResult<Vec<DbPlanSlot>> {
    use crate::schema::plan_slots::dsl;

    dsl::plan_slots
        .filter(dsl::plan_id.eq(plan_id))
        .order_by((dsl::channel_id.asc(), dsl::start_utc.asc()))
        .select(DbPlanSlot::as_select())
        .get_results(conn)
}

pub fn slots_for_lane(
    conn: &mut SqliteConnection,
    plan_id: i64,
    channel_id: &str,
) -> QueryResult<Vec<DbPlanSlot>> {
    use crate::schema::plan_slots::dsl;

    dsl::plan_slots
        .filter(dsl::plan_id.eq(plan_id))
        .filter(dsl::channel_id.eq(channel_id))
        .order_by(dsl::start_utc.asc())
        .select(DbPlanSlot::as_select())
        .get_results(conn)
}

/// The unique slot on a lane whose `[start_utc, end_utc)` contains `at`.
/// Ties (which a valid plan never produces) resolve to the largest start.
pub fn find_slot(
    conn: &mut SqliteConnection,
    plan_id: i64,
    channel_id: &str,
    at: DateTime<Utc>,
) -> QueryResult<Option<DbPlanSlot>> {
    use crate::schema::plan_slots::dsl;

    let at = at.naive_utc();

    dsl::plan_slots
        .filter(dsl::plan_id.eq(plan_id))
        .filter(dsl::channel_id.eq(channel_id))
        .filter(dsl::start_utc.le(at))
        .filter(dsl::end_utc.gt(at))
        .order_by(dsl::start_utc.desc())
        .select(DbPlanSlot::as_select())
        .first(conn)
        .optional()
}

/// Retention sweep over committed runs: keep the newest `keep`, delete the
/// rest. Slots cascade. Uncommitted runs older than the newest committed run
/// are leftovers from aborted builds and go too.
pub fn prune_plans_keeping(conn: &mut SqliteConnection, keep: i64) -> QueryResult<usize> {
    use crate::schema::plan_runs::dsl;

    let keep_ids: Vec<i64> = dsl::plan_runs
        .filter(dsl::committed.eq(true))
        .order_by(dsl::plan_id.desc())
        .limit(keep)
        .select(dsl::plan_id)
        .get_results(conn)?;

    let Some(&oldest_kept) = keep_ids.last() else {
        return Ok(0);
    };

    diesel::delete(dsl::plan_runs.filter(dsl::plan_id.lt(oldest_kept))).execute(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::MIGRATIONS;
    use crate::models::{NewEvent, NewFeed};
    use diesel_migrations::MigrationHarness;

    fn test_conn() -> SqliteConnection {
        let mut conn = crate::conn::establish(":memory:").unwrap();
        conn.run_pending_migrations(MIGRATIONS).unwrap();
        conn
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn sample_event<'a>(event_id: &'a str, start: &str, stop: &str) -> NewEvent<'a> {
        NewEvent {
            event_id,
            title: "Arsenal vs. Chelsea",
            subtitle: None,
            summary: None,
            sport: Some("Soccer"),
            league_name: Some("English Premier League"),
            league_abbr: Some("EPL"),
            network: Some("ESPN+"),
            network_short: Some("ESPN+"),
            language: Some("en"),
            packages: r#"["ESPN_PLUS"]"#,
            event_type: "LIVE",
            is_reair: false,
            is_studio: false,
            airing_id: None,
            simulcast_airing_id: None,
            image: None,
            start_utc: utc(start).naive_utc(),
            stop_utc: utc(stop).naive_utc(),
            first_seen_utc: utc("2025-01-01T00:00:00Z").naive_utc(),
            last_seen_utc: utc("2025-01-01T00:00:00Z").naive_utc(),
        }
    }

    #[test]
    fn upsert_events_is_idempotent() {
        let mut conn = test_conn();
        let rows = vec![sample_event(
            "ev1",
            "2025-01-01T01:00:00Z",
            "2025-01-01T02:00:00Z",
        )];

        upsert_events(&mut conn, &rows).unwrap();
        upsert_events(&mut conn, &rows).unwrap();

        assert_eq!(count_events(&mut conn).unwrap(), 1);

        let listed = list_events_in_window(
            &mut conn,
            utc("2025-01-01T00:00:00Z"),
            utc("2025-01-02T00:00:00Z"),
        )
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_id, "ev1");
        assert_eq!(listed[0].start_utc, utc("2025-01-01T01:00:00Z"));
        assert_eq!(listed[0].packages, vec!["ESPN_PLUS"]);
    }

    #[test]
    fn upsert_preserves_first_seen() {
        let mut conn = test_conn();
        let first = sample_event("ev1", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z");
        upsert_events(&mut conn, std::slice::from_ref(&first)).unwrap();

        let mut second = sample_event("ev1", "2025-01-01T01:30:00Z", "2025-01-01T02:30:00Z");
        second.first_seen_utc = utc("2025-01-05T00:00:00Z").naive_utc();
        second.last_seen_utc = utc("2025-01-05T00:00:00Z").naive_utc();
        upsert_events(&mut conn, &[second]).unwrap();

        let row = get_event(&mut conn, "ev1").unwrap().unwrap();
        assert_eq!(row.first_seen_utc, utc("2025-01-01T00:00:00Z").naive_utc());
        assert_eq!(row.last_seen_utc, utc("2025-01-05T00:00:00Z").naive_utc());
        assert_eq!(row.start_utc, utc("2025-01-01T01:30:00Z").naive_utc());
    }

    #[test]
    fn replace_feeds_drops_stale_rows() {
        let mut conn = test_conn();
        upsert_events(
            &mut conn,
            &[sample_event(
                "ev1",
                "2025-01-01T01:00:00Z",
                "2025-01-01T02:00:00Z",
            )],
        )
        .unwrap();

        replace_feeds(
            &mut conn,
            "ev1",
            &[
                NewFeed {
                    feed_id: "f1",
                    event_id: "ev1",
                    url: "https://example.com/f1.m3u8",
                    is_primary: true,
                },
                NewFeed {
                    feed_id: "f2",
                    event_id: "ev1",
                    url: "https://example.com/f2.m3u8",
                    is_primary: false,
                },
            ],
        )
        .unwrap();

        replace_feeds(
            &mut conn,
            "ev1",
            &[NewFeed {
                feed_id: "f2",
                event_id: "ev1",
                url: "https://example.com/f2-new.m3u8",
                is_primary: true,
            }],
        )
        .unwrap();

        let feeds = feeds_for_event(&mut conn, "ev1").unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_id, "f2");
        assert_eq!(feeds[0].url, "https://example.com/f2-new.m3u8");
        assert!(feeds[0].is_primary);
    }

    #[test]
    fn ttl_sweep_removes_event_feeds_and_pins() {
        let mut conn = test_conn();
        upsert_events(
            &mut conn,
            &[
                sample_event("old", "2025-01-01T01:00:00Z", "2025-01-01T02:00:00Z"),
                sample_event("new", "2025-01-03T01:00:00Z", "2025-01-03T02:00:00Z"),
            ],
        )
        .unwrap();
        replace_feeds(
            &mut conn,
            "old",
            &[NewFeed {
                feed_id: "f1",
                event_id: "old",
                url: "https://example.com/f1.m3u8",
                is_primary: true,
            }],
        )
        .unwrap();

        let mut sticky = HashMap::new();
        sticky.insert("old".to_string(), "eplus01".to_string());
        sticky.insert("new".to_string(), "eplus02".to_string());
        write_sticky_map(&mut conn, &sticky, utc("2025-01-01T00:00:00Z")).unwrap();

        let removed = delete_events_before(&mut conn, utc("2025-01-02T00:00:00Z")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(count_events(&mut conn).unwrap(), 1);
        assert!(feeds_for_event(&mut conn, "old").unwrap().is_empty());

        let sticky = load_sticky_map(&mut conn).unwrap();
        assert_eq!(sticky.len(), 1);
        assert_eq!(sticky.get("new").map(String::as_str), Some("eplus02"));
    }

    #[test]
    fn ensure_lanes_is_idempotent_and_resizes() {
        let mut conn = test_conn();
        ensure_lanes(&mut conn, 3, "ESPN+").unwrap();
        ensure_lanes(&mut conn, 3, "ESPN+").unwrap();

        let lanes = active_channels(&mut conn).unwrap();
        assert_eq!(lanes.len(), 3);
        assert_eq!(lanes[0].channel_id, "eplus01");
        assert_eq!(lanes[2].chno, 3);

        ensure_lanes(&mut conn, 2, "ESPN+").unwrap();
        assert_eq!(active_channels(&mut conn).unwrap().len(), 2);

        ensure_lanes(&mut conn, 3, "ESPN+").unwrap();
        assert_eq!(active_channels(&mut conn).unwrap().len(), 3);
    }

    #[test]
    fn channel_lookup_accepts_numeric_and_prefixed_lanes() {
        let mut conn = test_conn();
        ensure_lanes(&mut conn, 12, "ESPN+").unwrap();

        for lane in ["eplus10", "10", "eplus1", "1", "01"] {
            let found = channel_for_lane(&mut conn, lane).unwrap();
            assert!(found.is_some(), "lane {lane} did not resolve");
        }
        assert_eq!(
            channel_for_lane(&mut conn, "10").unwrap().unwrap().channel_id,
            "eplus10"
        );
        assert!(channel_for_lane(&mut conn, "eplus99").unwrap().is_none());
        assert!(channel_for_lane(&mut conn, "nope").unwrap().is_none());
    }

    #[test]
    fn uncommitted_plans_are_invisible() {
        let mut conn = test_conn();
        ensure_lanes(&mut conn, 1, "ESPN+").unwrap();

        let from = utc("2025-01-01T00:00:00Z");
        let to = utc("2025-01-01T02:00:00Z");
        let plan_id = begin_plan(&mut conn, from, to, None, Some("test"), from).unwrap();

        write_slots(
            &mut conn,
            &[NewPlanSlot {
                plan_id,
                channel_id: "eplus01",
                start_utc: from.naive_utc(),
                end_utc: to.naive_utc(),
                kind: "placeholder",
                event_id: None,
                preferred_feed_id: None,
                placeholder_reason: Some("gap_before"),
            }],
        )
        .unwrap();

        assert_eq!(latest_plan_id(&mut conn).unwrap(), None);

        commit_plan(&mut conn, plan_id, "abc123").unwrap();
        assert_eq!(latest_plan_id(&mut conn).unwrap(), Some(plan_id));

        let run = plan_run(&mut conn, plan_id).unwrap().unwrap();
        assert!(run.committed);
        assert_eq!(run.checksum.as_deref(), Some("abc123"));
    }

    #[test]
    fn find_slot_uses_half_open_intervals() {
        let mut conn = test_conn();
        ensure_lanes(&mut conn, 1, "ESPN+").unwrap();

        let from = utc("2025-01-01T00:00:00Z");
        let mid = utc("2025-01-01T01:00:00Z");
        let to = utc("2025-01-01T02:00:00Z");
        let plan_id = begin_plan(&mut conn, from, to, None, None, from).unwrap();
        write_slots(
            &mut conn,
            &[
                NewPlanSlot {
                    plan_id,
                    channel_id: "eplus01",
                    start_utc: from.naive_utc(),
                    end_utc: mid.naive_utc(),
                    kind: "placeholder",
                    event_id: None,
                    preferred_feed_id: None,
                    placeholder_reason: Some("gap_before"),
                },
                NewPlanSlot {
                    plan_id,
                    channel_id: "eplus01",
                    start_utc: mid.naive_utc(),
                    end_utc: to.naive_utc(),
                    kind: "event",
                    event_id: Some("ev1"),
                    preferred_feed_id: None,
                    placeholder_reason: None,
                },
            ],
        )
        .unwrap();
        commit_plan(&mut conn, plan_id, "x").unwrap();

        let at_boundary = find_slot(&mut conn, plan_id, "eplus01", mid)
            .unwrap()
            .unwrap();
        assert_eq!(at_boundary.kind, "event");

        let before = find_slot(&mut conn, plan_id, "eplus01", utc("2025-01-01T00:59:59Z"))
            .unwrap()
            .unwrap();
        assert_eq!(before.kind, "placeholder");

        assert!(find_slot(&mut conn, plan_id, "eplus01", to).unwrap().is_none());
    }

    #[test]
    fn sticky_upsert_keeps_pin_time() {
        let mut conn = test_conn();

        let mut map = HashMap::new();
        map.insert("ev1".to_string(), "eplus01".to_string());
        write_sticky_map(&mut conn, &map, utc("2025-01-01T00:00:00Z")).unwrap();

        map.insert("ev1".to_string(), "eplus02".to_string());
        write_sticky_map(&mut conn, &map, utc("2025-01-02T00:00:00Z")).unwrap();

        use crate::schema::event_lanes::dsl;
        let row: crate::models::DbEventLane = dsl::event_lanes
            .select(crate::models::DbEventLane::as_select())
            .first(&mut conn)
            .unwrap();
        assert_eq!(row.channel_id, "eplus02");
        assert_eq!(row.pinned_at_utc, utc("2025-01-01T00:00:00Z").naive_utc());
        assert_eq!(row.last_seen_utc, utc("2025-01-02T00:00:00Z").naive_utc());

        assert_eq!(clear_sticky_map(&mut conn).unwrap(), 1);
        assert!(load_sticky_map(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn prune_keeps_newest_committed_runs() {
        let mut conn = test_conn();
        ensure_lanes(&mut conn, 1, "ESPN+").unwrap();

        let from = utc("2025-01-01T00:00:00Z");
        let to = utc("2025-01-01T02:00:00Z");
        for i in 0..4 {
            let plan_id = begin_plan(&mut conn, from, to, None, None, from).unwrap();
            commit_plan(&mut conn, plan_id, &format!("sum{i}")).unwrap();
        }

        prune_plans_keeping(&mut conn, 2).unwrap();

        use crate::schema::plan_runs::dsl;
        let remaining: i64 = dsl::plan_runs.count().get_result(&mut conn).unwrap();
        assert_eq!(remaining, 2);
        assert!(latest_plan_id(&mut conn).unwrap().is_some());
    }
}
