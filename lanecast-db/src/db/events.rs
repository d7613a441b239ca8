use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel::{QueryResult, SqliteConnection};
use itertools::Itertools;

use crate::event::Event;
use crate::models::{DbEvent, DbFeed, NewEvent, NewFeed, NewFilterAudit};

/// Upsert by `event_id`. Attribute columns and `last_seen_utc` follow the
/// incoming row; `first_seen_utc` keeps the value from the first sighting.
pub fn upsert_events(conn: &mut SqliteConnection, rows: &[NewEvent]) -> QueryResult<usize> {
    use crate::schema::events::dsl;

    let mut written = 0;
    for row in rows {
        written += diesel::insert_into(dsl::events)
            .values(row)
            .on_conflict(dsl::event_id)
            .do_update()
            .set((
                dsl::title.eq(excluded(dsl::title)),
                dsl::subtitle.eq(excluded(dsl::subtitle)),
                dsl::summary.eq(excluded(dsl::summary)),
                dsl::sport.eq(excluded(dsl::sport)),
                dsl::league_name.eq(excluded(dsl::league_name)),
                dsl::league_abbr.eq(excluded(dsl::league_abbr)),
                dsl::network.eq(excluded(dsl::network)),
                dsl::network_short.eq(excluded(dsl::network_short)),
                dsl::language.eq(excluded(dsl::language)),
                dsl::packages.eq(excluded(dsl::packages)),
                dsl::event_type.eq(excluded(dsl::event_type)),
                dsl::is_reair.eq(excluded(dsl::is_reair)),
                dsl::is_studio.eq(excluded(dsl::is_studio)),
                dsl::airing_id.eq(excluded(dsl::airing_id)),
                dsl::simulcast_airing_id.eq(excluded(dsl::simulcast_airing_id)),
                dsl::image.eq(excluded(dsl::image)),
                dsl::start_utc.eq(excluded(dsl::start_utc)),
                dsl::stop_utc.eq(excluded(dsl::stop_utc)),
                dsl::last_seen_utc.eq(excluded(dsl::last_seen_utc)),
            ))
            .execute(conn)?;
    }

    Ok(written)
}

/// Make the stored feed set for an event exactly `rows`: stale feeds are
/// removed, the rest upserted by `(feed_id, event_id)`.
pub fn replace_feeds(
    conn: &mut SqliteConnection,
    event_id: &str,
    rows: &[NewFeed],
) -> QueryResult<()> {
    use crate::schema::feeds::dsl;

    let keep_ids = rows.iter().map(|f| f.feed_id).collect_vec();

    diesel::delete(
        dsl::feeds
            .filter(dsl::event_id.eq(event_id))
            .filter(dsl::feed_id.ne_all(&keep_ids)),
    )
    .execute(conn)?;

    for row in rows {
        diesel::insert_into(dsl::feeds)
            .values(row)
            .on_conflict((dsl::feed_id, dsl::event_id))
            .do_update()
            .set((
                dsl::url.eq(excluded(dsl::url)),
                dsl::is_primary.eq(excluded(dsl::is_primary)),
            ))
            .execute(conn)?;
    }

    Ok(())
}

/// TTL sweep: drop events that ended before `cutoff`, along with their sticky
/// pins. Feeds go with their event via the cascading foreign key.
pub fn delete_events_before(
    conn: &mut SqliteConnection,
    cutoff: DateTime<Utc>,
) -> QueryResult<usize> {
    use crate::schema::event_lanes::dsl as lanes_dsl;
    use crate::schema::events::dsl as events_dsl;

    let cutoff = cutoff.naive_utc();

    let doomed = events_dsl::events
        .filter(events_dsl::stop_utc.lt(cutoff))
        .select(events_dsl::event_id);

    diesel::delete(lanes_dsl::event_lanes.filter(lanes_dsl::event_id.eq_any(doomed)))
        .execute(conn)?;

    diesel::delete(events_dsl::events.filter(events_dsl::stop_utc.lt(cutoff))).execute(conn)
}

/// Events whose `[start_utc, stop_utc)` intersects `[from, to)`, ordered by
/// start time then id. Callers rely on that ordering for deterministic
/// assignment.
pub fn list_events_in_window(
    conn: &mut SqliteConnection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> QueryResult<Vec<Event>> {
    use crate::schema::events::dsl;

    dsl::events
        .filter(dsl::start_utc.lt(to.naive_utc()))
        .filter(dsl::stop_utc.gt(from.naive_utc()))
        .order_by((dsl::start_utc.asc(), dsl::event_id.asc()))
        .select(DbEvent::as_select())
        .get_results(conn)
        .map(|rows| rows.into_iter().map(Event::from).collect_vec())
}

pub fn count_events(conn: &mut SqliteConnection) -> QueryResult<i64> {
    use crate::schema::events::dsl;

    dsl::events.count().get_result(conn)
}

pub fn get_event(conn: &mut SqliteConnection, id: &str) -> QueryResult<Option<DbEvent>> {
    use crate::schema::events::dsl;

    dsl::events
        .filter(dsl::event_id.eq(id))
        .select(DbEvent::as_select())
        .first(conn)
        .optional()
}

pub fn events_by_ids(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> QueryResult<Vec<DbEvent>> {
    use crate::schema::events::dsl;

    dsl::events
        .filter(dsl::event_id.eq_any(ids))
        .select(DbEvent::as_select())
        .get_results(conn)
}

pub fn feeds_for_event(conn: &mut SqliteConnection, id: &str) -> QueryResult<Vec<DbFeed>> {
    use crate::schema::feeds::dsl;

    dsl::feeds
        .filter(dsl::event_id.eq(id))
        .order_by(dsl::feed_id.asc())
        .select(DbFeed::as_select())
        .get_results(conn)
}

pub fn feeds_for_events(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> QueryResult<Vec<DbFeed>> {
    use crate::schema::feeds::dsl;

    dsl::feeds
        .filter(dsl::event_id.eq_any(ids))
        .order_by((dsl::event_id.asc(), dsl::feed_id.asc()))
        .select(DbFeed::as_select())
        .get_results(conn)
}

/// Replace the `events_filterable` audit view with this cycle's verdicts.
pub fn write_filter_audit(
    conn: &mut SqliteConnection,
    rows: &[NewFilterAudit],
) -> QueryResult<usize> {
    use crate::schema::events_filterable::dsl;

    diesel::delete(dsl::events_filterable).execute(conn)?;

    let mut written = 0;
    for chunk in rows.chunks(500) {
        written += diesel::insert_into(dsl::events_filterable)
            .values(chunk)
            .execute(conn)?;
    }

    Ok(written)
}
