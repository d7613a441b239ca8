use chrono::Utc;
use lanecast_db::config::ResolverConfig;
use lanecast_db::db;
use lanecast_db::models::{DbChannel, DbFeed, DbPlanSlot};
use rocket::http::Status;
use rocket::response::{Redirect, Responder};
use rocket::serde::json::Json;
use rocket::{Request, State, get};
use serde::Serialize;

use crate::Db;
use crate::api::error::ApiError;
use crate::resolve::{self, TuneOutcome};

pub enum TuneResponse {
    Redirect(Redirect),
    NoContent,
    NotFound,
}

impl From<TuneOutcome> for TuneResponse {
    fn from(outcome: TuneOutcome) -> Self {
        match outcome {
            TuneOutcome::Feed(url) | TuneOutcome::Slate(url) => {
                TuneResponse::Redirect(Redirect::found(url))
            }
            TuneOutcome::NoContent => TuneResponse::NoContent,
            TuneOutcome::NotFound => TuneResponse::NotFound,
        }
    }
}

impl<'r> Responder<'r, 'static> for TuneResponse {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'static> {
        match self {
            TuneResponse::Redirect(redirect) => redirect.respond_to(req),
            TuneResponse::NoContent => rocket::Response::build()
                .status(Status::NoContent)
                .ok(),
            TuneResponse::NotFound => Err(Status::NotFound),
        }
    }
}

#[get("/vc/<lane>?<at>&<only_live>")]
pub async fn tune(
    lane: String,
    at: Option<String>,
    only_live: Option<u8>,
    db: Db,
    config: &State<ResolverConfig>,
) -> Result<TuneResponse, ApiError> {
    let now = at
        .as_deref()
        .and_then(resolve::parse_at)
        .unwrap_or_else(Utc::now);
    let only_live = only_live == Some(1);
    let slate = config.slate_url.clone();

    let outcome = db
        .run(move |conn| -> Result<TuneOutcome, diesel::result::Error> {
            let Some(channel) = db::channel_for_lane(conn, &lane)? else {
                return Ok(TuneOutcome::NotFound);
            };
            let Some(plan_id) = db::latest_plan_id(conn)? else {
                return Ok(resolve::fallback(slate.as_deref(), only_live));
            };

            let slot = db::find_slot(conn, plan_id, &channel.channel_id, now)?;
            let feeds = match slot.as_ref().and_then(|s| s.event_id.as_deref()) {
                Some(event_id) => db::feeds_for_event(conn, event_id)?,
                None => Vec::new(),
            };

            Ok(resolve::decide_tune(
                slot.as_ref(),
                &feeds,
                slate.as_deref(),
                only_live,
            ))
        })
        .await?;

    Ok(outcome.into())
}

#[derive(Serialize)]
pub struct TuneDebug {
    pub lane: String,
    pub now: String,
    pub plan_id: Option<i64>,
    pub channel: Option<DbChannel>,
    pub slot: Option<DbPlanSlot>,
    pub feeds: Vec<DbFeed>,
    pub slate: Option<String>,
}

#[get("/vc/<lane>/debug?<at>")]
pub async fn tune_debug(
    lane: String,
    at: Option<String>,
    db: Db,
    config: &State<ResolverConfig>,
) -> Result<Json<TuneDebug>, ApiError> {
    let now = at
        .as_deref()
        .and_then(resolve::parse_at)
        .unwrap_or_else(Utc::now);
    let slate = config.slate_url.clone();
    let lane_for_query = lane.clone();

    let (plan_id, channel, slot, feeds) = db
        .run(move |conn| -> Result<_, diesel::result::Error> {
            let channel = db::channel_for_lane(conn, &lane_for_query)?;
            let plan_id = db::latest_plan_id(conn)?;

            let slot = match (&channel, plan_id) {
                (Some(channel), Some(plan_id)) => {
                    db::find_slot(conn, plan_id, &channel.channel_id, now)?
                }
                _ => None,
            };
            let feeds = match slot.as_ref().and_then(|s| s.event_id.as_deref()) {
                Some(event_id) => db::feeds_for_event(conn, event_id)?,
                None => Vec::new(),
            };

            Ok((plan_id, channel, slot, feeds))
        })
        .await?;

    Ok(Json(TuneDebug {
        lane,
        now: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        plan_id,
        channel,
        slot,
        feeds,
        slate,
    }))
}
