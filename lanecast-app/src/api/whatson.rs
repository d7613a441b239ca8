use chrono::{DateTime, Utc};
use lanecast_db::config::ResolverConfig;
use lanecast_db::db;
use lanecast_db::SqliteConnection;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Responder, State, get};
use serde::Serialize;

use crate::Db;
use crate::api::error::ApiError;
use crate::resolve;

#[derive(Debug, Serialize)]
pub struct WhatsonBody {
    pub ok: bool,
    pub lane: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_uid: Option<String>,
    pub at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deeplink_url: Option<String>,
}

#[derive(Responder)]
pub enum WhatsonResponse {
    Json(Json<WhatsonBody>),
    Text(String),
    NoContent(status::NoContent),
    NotFound(status::NotFound<String>),
}

fn active_event_uid(
    conn: &mut SqliteConnection,
    channel_id: &str,
    at: DateTime<Utc>,
) -> Result<Option<String>, diesel::result::Error> {
    let Some(plan_id) = db::latest_plan_id(conn)? else {
        return Ok(None);
    };

    let slot = db::find_slot(conn, plan_id, channel_id, at)?;
    Ok(slot
        .filter(|s| !s.is_placeholder())
        .and_then(|s| s.event_id)
        .map(|id| resolve::event_uid(&id).to_string()))
}

#[get("/whatson/<lane>?<at>&<include>&<format>&<param>")]
pub async fn whatson(
    lane: String,
    at: Option<String>,
    include: Option<String>,
    format: Option<String>,
    param: Option<String>,
    db: Db,
    config: &State<ResolverConfig>,
) -> Result<WhatsonResponse, ApiError> {
    let now = at
        .as_deref()
        .and_then(resolve::parse_at)
        .unwrap_or_else(Utc::now);
    let template = config.deeplink_template.clone();
    let lane_for_query = lane.clone();

    let found = db
        .run(move |conn| -> Result<_, diesel::result::Error> {
            let Some(channel) = db::channel_for_lane(conn, &lane_for_query)? else {
                return Ok(None);
            };
            let uid = active_event_uid(conn, &channel.channel_id, now)?;
            Ok(Some((channel.channel_id, uid)))
        })
        .await?;

    let Some((channel_id, event_uid)) = found else {
        return Ok(WhatsonResponse::NotFound(status::NotFound(
            "unknown lane".to_string(),
        )));
    };

    let deeplink_url = event_uid
        .as_deref()
        .map(|uid| resolve::deeplink(&template, uid));

    if format.as_deref() == Some("txt") {
        let value = if param.as_deref() == Some("deeplink_url") {
            deeplink_url
        } else {
            event_uid
        };
        return Ok(match value {
            Some(value) => WhatsonResponse::Text(value),
            None => WhatsonResponse::NoContent(status::NoContent),
        });
    }

    let include_deeplink = include.as_deref() == Some("deeplink");
    Ok(WhatsonResponse::Json(Json(WhatsonBody {
        ok: true,
        lane: channel_id,
        event_uid,
        at: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        deeplink_url: if include_deeplink { deeplink_url } else { None },
    })))
}

#[derive(Debug, Serialize)]
pub struct WhatsonItem {
    pub lane: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deeplink_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WhatsonAllBody {
    pub ok: bool,
    pub at: String,
    pub items: Vec<WhatsonItem>,
}

#[get("/whatson_all?<at>&<include>")]
pub async fn whatson_all(
    at: Option<String>,
    include: Option<String>,
    db: Db,
    config: &State<ResolverConfig>,
) -> Result<Json<WhatsonAllBody>, ApiError> {
    let now = at
        .as_deref()
        .and_then(resolve::parse_at)
        .unwrap_or_else(Utc::now);
    let include_deeplink = include.as_deref() == Some("deeplink");
    let template = config.deeplink_template.clone();

    let mut items = db
        .run(move |conn| -> Result<Vec<WhatsonItem>, diesel::result::Error> {
            let channels = db::active_channels(conn)?;

            channels
                .into_iter()
                .map(|channel| {
                    let event_uid = active_event_uid(conn, &channel.channel_id, now)?;
                    let deeplink_url = event_uid
                        .as_deref()
                        .filter(|_| include_deeplink)
                        .map(|uid| resolve::deeplink(&template, uid));

                    Ok(WhatsonItem {
                        lane: channel.channel_id,
                        event_uid,
                        deeplink_url,
                    })
                })
                .collect()
        })
        .await?;

    items.sort_by_key(|item| resolve::lane_sort_key(&item.lane));

    Ok(Json(WhatsonAllBody {
        ok: true,
        at: now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        items,
    }))
}

#[derive(Responder)]
pub enum DeeplinkResponse {
    Text(String),
    NoContent(status::NoContent),
    NotFound(status::NotFound<String>),
}

#[get("/deeplink/<lane>?<at>")]
pub async fn deeplink(
    lane: String,
    at: Option<String>,
    db: Db,
    config: &State<ResolverConfig>,
) -> Result<DeeplinkResponse, ApiError> {
    let now = at
        .as_deref()
        .and_then(resolve::parse_at)
        .unwrap_or_else(Utc::now);
    let template = config.deeplink_template.clone();

    let found = db
        .run(move |conn| -> Result<_, diesel::result::Error> {
            let Some(channel) = db::channel_for_lane(conn, &lane)? else {
                return Ok(None);
            };
            Ok(Some(active_event_uid(conn, &channel.channel_id, now)?))
        })
        .await?;

    Ok(match found {
        None => DeeplinkResponse::NotFound(status::NotFound("unknown lane".to_string())),
        Some(None) => DeeplinkResponse::NoContent(status::NoContent),
        Some(Some(uid)) => DeeplinkResponse::Text(resolve::deeplink(&template, &uid)),
    })
}
