use std::path::Path;

use chrono::Utc;
use lanecast_db::config::ResolverConfig;
use lanecast_db::db;
use log::warn;
use quick_xml::Reader;
use quick_xml::events::Event;
use rocket::serde::json::Json;
use rocket::{State, get};
use serde::Serialize;

use crate::Db;
use crate::api::error::ApiError;

#[derive(Serialize)]
pub struct HealthBody {
    pub ok: bool,
    pub ts: i64,
}

#[get("/health")]
pub fn health() -> Json<HealthBody> {
    Json(HealthBody {
        ok: true,
        ts: Utc::now().timestamp(),
    })
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GuideChannel {
    pub id: String,
    pub name: String,
    pub lcn: Option<i32>,
}

enum ChannelField {
    Name,
    Lcn,
}

/// Pull the channel list out of a rendered XMLTV document.
pub fn parse_guide_channels(xml: &str) -> Result<Vec<GuideChannel>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut channels = Vec::new();
    let mut current: Option<GuideChannel> = None;
    let mut field: Option<ChannelField> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"channel" => {
                    let id = e
                        .try_get_attribute("id")?
                        .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
                        .transpose()?
                        .unwrap_or_default();
                    current = Some(GuideChannel {
                        id,
                        name: String::new(),
                        lcn: None,
                    });
                }
                b"display-name" => field = Some(ChannelField::Name),
                b"lcn" => field = Some(ChannelField::Lcn),
                _ => field = None,
            },
            Event::Text(t) => {
                if let (Some(channel), Some(field)) = (&mut current, &field) {
                    let text = t.unescape()?.into_owned();
                    match field {
                        ChannelField::Name => channel.name = text,
                        ChannelField::Lcn => channel.lcn = text.trim().parse().ok(),
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"channel" {
                    if let Some(channel) = current.take() {
                        channels.push(channel);
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(channels)
}

/// The lineup as the DVR sees it: read from the rendered guide, never from a
/// fresh render.
#[get("/channels")]
pub fn channels_from_guide(config: &State<ResolverConfig>) -> Option<Json<Vec<GuideChannel>>> {
    let path = Path::new(&config.out_dir).join("epg.xml");
    let xml = std::fs::read_to_string(path).ok()?;

    match parse_guide_channels(&xml) {
        Ok(channels) => Some(Json(channels)),
        Err(err) => {
            warn!("Rendered guide was unparseable: {err}");
            None
        }
    }
}

#[derive(Serialize)]
pub struct ChannelsDbEntry {
    pub channel_id: String,
    pub chno: i32,
    pub name: String,
}

#[derive(Serialize)]
pub struct ChannelsDbBody {
    pub count: usize,
    pub channels: Vec<ChannelsDbEntry>,
}

#[get("/channels_db")]
pub async fn channels_db(db: Db) -> Result<Json<ChannelsDbBody>, ApiError> {
    let channels = db.run(db::active_channels).await?;

    let channels: Vec<_> = channels
        .into_iter()
        .map(|ch| ChannelsDbEntry {
            channel_id: ch.channel_id,
            chno: ch.chno,
            name: ch.name,
        })
        .collect();

    Ok(Json(ChannelsDbBody {
        count: channels.len(),
        channels,
    }))
}
