use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use hashbrown::HashMap;
use itertools::Itertools;
use lanecast_db::config::PlannerConfig;
use lanecast_db::models::{DbFeed, NewFilterAudit, NewPlanSlot};
use lanecast_db::{SqliteConnection, db};
use log::{error, info, warn};
use miette::Diagnostic;
use thiserror::Error;
use watchgraph::{Airing, WatchGraph, WatchGraphError};

use crate::assign::{self, LaneRef};
use crate::plan::{self, GridParams, SlotBody, SlotDraft};
use crate::render::xmltv;
use crate::render::{self, m3u};
use crate::{filter, ingest, padding};

const INGEST_ATTEMPTS: u32 = 3;

#[derive(Debug, Error, Diagnostic)]
pub enum CycleError {
    #[error("couldn't open the database")]
    Connect(#[from] lanecast_db::ConnectError),

    #[error(transparent)]
    Db(#[from] diesel::result::Error),

    #[error("plan invariant violated: {0}")]
    InvariantViolation(String),

    #[error("refresh cycle exceeded its deadline")]
    DeadlineExceeded,
}

#[derive(Debug)]
pub struct CycleStats {
    pub plan_id: i64,
    pub programmes: usize,
    pub real: usize,
    pub placeholders: usize,
    pub dropped: usize,
    pub ingested: usize,
}

/// One full refresh: ingest, plan, render. The whole cycle runs under the
/// configured deadline; hitting it aborts without committing anything.
pub async fn run_cycle(config: &PlannerConfig) -> Result<CycleStats, CycleError> {
    let deadline = StdDuration::from_secs(config.cycle_timeout_secs.max(1));
    match tokio::time::timeout(deadline, cycle_inner(config)).await {
        Ok(result) => result,
        Err(_) => Err(CycleError::DeadlineExceeded),
    }
}

async fn cycle_inner(config: &PlannerConfig) -> Result<CycleStats, CycleError> {
    let now = Utc::now();
    let grid = plan::window_for(
        now,
        config.align_mins,
        config.min_gap_mins,
        config.valid_hours,
    );

    let mut conn = lanecast_db::establish(&config.db_path)?;

    // Lane provisioning is idempotent; re-running picks up a resized LANES
    db::ensure_lanes(&mut conn, config.lanes, &config.render.m3u_group_title)?;

    let ingested = match ingest_with_retry(config, grid.valid_from, grid.valid_to).await {
        Ok(airings) => {
            let stats = ingest::store_airings(&mut conn, &airings, now)?;
            info!(
                "Ingested {} airings ({} skipped)",
                stats.upserted, stats.skipped
            );
            stats.upserted
        }
        Err(err) => {
            warn!("Ingest failed; planning against existing events: {err:?}");
            0
        }
    };

    let outcome = build_plan(&mut conn, config, &grid, now)?;

    if let Err(err) = render_plan(&mut conn, config, outcome.plan_id) {
        // Prior artifacts stay in place; the plan itself is already committed
        warn!("Rendering failed; keeping previous artifacts: {err:?}");
    }

    Ok(CycleStats {
        ingested,
        ..outcome
    })
}

async fn ingest_with_retry(
    config: &PlannerConfig,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Airing>, WatchGraphError> {
    let source = WatchGraph::new(&config.source_base_url, config.page_size);

    let mut attempt = 1;
    loop {
        match ingest::fetch_airings(&source, from, to).await {
            Ok(airings) => return Ok(airings),
            Err(err) if attempt < INGEST_ATTEMPTS => {
                let backoff = StdDuration::from_secs(5 * u64::from(attempt));
                warn!("Ingest attempt {attempt} failed, retrying in {backoff:?}: {err:?}");
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Filter, pad, assign, and build in a single immediate transaction. Any
/// error rolls the whole build back, leaving the prior plan as latest.
fn build_plan(
    conn: &mut SqliteConnection,
    config: &PlannerConfig,
    grid: &GridParams,
    now: DateTime<Utc>,
) -> Result<CycleStats, CycleError> {
    conn.immediate_transaction(|conn| {
        let events = db::list_events_in_window(conn, grid.valid_from, grid.valid_to)?;
        let total = events.len();

        let filtered = filter::run(events, &config.filter);
        if filtered.admitted.is_empty() && total > 0 {
            // Treat as a configuration error: keep every stored event and
            // fall through to a placeholder-only plan
            error!(
                "Filter admitted 0 of {total} events; check the VC_FILTER__* configuration. \
                 Skipping the event TTL sweep this cycle."
            );
        } else {
            let cutoff = now - Duration::hours(config.event_ttl_hours);
            let swept = db::delete_events_before(conn, cutoff)?;
            if swept > 0 {
                info!("Swept {swept} events that ended before {cutoff}");
            }
        }

        let reason_lists = filtered
            .verdicts
            .iter()
            .map(|v| v.reasons.iter().join(","))
            .collect_vec();
        let audit_rows = filtered
            .verdicts
            .iter()
            .zip(&reason_lists)
            .map(|(v, reasons)| NewFilterAudit {
                event_id: &v.event_id,
                is_allowed: v.allowed,
                reasons,
                checked_at_utc: now.naive_utc(),
            })
            .collect_vec();
        db::write_filter_audit(conn, &audit_rows)?;

        let admitted = filtered.admitted.len();
        let padded = padding::apply(filtered.admitted, &config.padding);

        let channels = db::active_channels(conn)?;
        let lane_refs = channels.iter().map(LaneRef::from).collect_vec();

        let sticky = if config.force_replan {
            HashMap::new()
        } else {
            db::load_sticky_map(conn)?
        };
        let assignment = assign::assign(padded, &lane_refs, &sticky, config.force_replan);

        let assigned_ids = assignment
            .by_lane
            .values()
            .flatten()
            .map(|p| p.event.event_id.clone())
            .collect_vec();
        let mut feeds_by_event: HashMap<String, Vec<DbFeed>> = HashMap::new();
        for feed in db::feeds_for_events(conn, &assigned_ids)? {
            feeds_by_event
                .entry(feed.event_id.clone())
                .or_default()
                .push(feed);
        }

        let mut slots: Vec<SlotDraft> = Vec::new();
        let mut dropped = assignment.dropped;
        for channel in &channels {
            let lane_events = assignment
                .by_lane
                .get(&channel.channel_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            let (lane_slots, lane_dropped) =
                plan::build_lane(&channel.channel_id, lane_events, &feeds_by_event, grid);

            plan::verify_lane(&channel.channel_id, &lane_slots, grid)
                .map_err(CycleError::InvariantViolation)?;

            dropped.extend(lane_dropped);
            slots.extend(lane_slots);
        }

        for drop in &dropped {
            warn!(
                "event_overlap_detected event_id={} reason=\"{}\"",
                drop.event_id, drop.reason
            );
        }

        let plan_id = db::begin_plan(
            conn,
            grid.valid_from,
            grid.valid_to,
            Some(env!("CARGO_PKG_VERSION")),
            Some(&format!("{admitted} of {total} events admitted")),
            now,
        )?;

        let slot_rows = slots
            .iter()
            .map(|slot| {
                let (kind, event_id, preferred_feed_id, placeholder_reason) = match &slot.body {
                    SlotBody::Event {
                        event_id,
                        preferred_feed_id,
                    } => (
                        plan::KIND_EVENT,
                        Some(event_id.as_str()),
                        preferred_feed_id.as_deref(),
                        None,
                    ),
                    SlotBody::Placeholder { reason } => {
                        (plan::KIND_PLACEHOLDER, None, None, Some(reason.as_str()))
                    }
                };
                NewPlanSlot {
                    plan_id,
                    channel_id: &slot.channel_id,
                    start_utc: slot.start.naive_utc(),
                    end_utc: slot.end.naive_utc(),
                    kind,
                    event_id,
                    preferred_feed_id,
                    placeholder_reason,
                }
            })
            .collect_vec();
        db::write_slots(conn, &slot_rows)?;

        let checksum = plan::plan_checksum(plan_id, &slots);
        db::commit_plan(conn, plan_id, &checksum)?;

        db::write_sticky_map(conn, &assignment.sticky, now)?;
        db::prune_plans_keeping(conn, config.plan_keep)?;

        let real = slots.iter().filter(|s| s.is_event()).count();
        Ok(CycleStats {
            plan_id,
            programmes: slots.len(),
            real,
            placeholders: slots.len() - real,
            dropped: dropped.len(),
            ingested: 0,
        })
    })
}

fn render_plan(
    conn: &mut SqliteConnection,
    config: &PlannerConfig,
    plan_id: i64,
) -> Result<(), render::RenderError> {
    std::fs::create_dir_all(&config.out_dir)?;

    let slots = db::slots_for_plan(conn, plan_id)?;
    let channels = db::active_channels(conn)?;
    let event_ids = slots
        .iter()
        .filter_map(|s| s.event_id.clone())
        .unique()
        .collect_vec();
    let events = db::events_by_ids(conn, &event_ids)?;

    let events_by_id: HashMap<_, _> = events
        .into_iter()
        .map(|e| (e.event_id.clone(), e))
        .collect();

    let guide = xmltv::render(
        &render::channel_entries(&channels),
        &render::programmes_for_slots(&slots, &events_by_id, &config.standby_title),
    )?;
    let out_dir = std::path::Path::new(&config.out_dir);
    render::write_atomic(&out_dir.join("epg.xml"), guide.as_bytes())?;

    let playlist = m3u::render(&channels, &config.render);
    render::write_atomic(&out_dir.join("playlist.m3u"), playlist.as_bytes())?;

    Ok(())
}
