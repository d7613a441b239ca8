pub mod m3u;
pub mod xmltv;

use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use lanecast_db::models::{DbChannel, DbEvent, DbPlanSlot};
use miette::Diagnostic;
use thiserror::Error;

use xmltv::{XmltvChannel, XmltvProgramme, format_xmltv_datetime};

#[derive(Debug, Error, Diagnostic)]
pub enum RenderError {
    #[error("error writing artifact")]
    Io(#[from] std::io::Error),

    #[error("error reading the plan to render")]
    Db(#[from] diesel::result::Error),

    #[error("rendered XMLTV was not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Write-then-rename so readers only ever see a complete artifact.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, bytes)?;
    fs::rename(tmp, path)
}

pub fn channel_entries(channels: &[DbChannel]) -> Vec<XmltvChannel> {
    channels
        .iter()
        .map(|ch| XmltvChannel {
            id: ch.channel_id.clone(),
            name: ch.name.clone(),
            lcn: ch.chno,
        })
        .collect()
}

fn event_desc(event: &DbEvent) -> Option<String> {
    let parts = [
        event.subtitle.as_deref(),
        event.summary.as_deref(),
        event.sport.as_deref(),
        event.league_name.as_deref(),
        event.network.as_deref(),
    ];

    let desc = parts
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" / ");

    (!desc.is_empty()).then_some(desc)
}

fn event_categories(event: &DbEvent) -> Vec<String> {
    let mut categories = vec!["Sports".to_string()];

    if let Some(sport) = event.sport.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        categories.push(sport.to_string());
    }

    if event.event_type == "LIVE" && !event.is_reair {
        categories.push("Live".to_string());
        categories.push("Sports Event".to_string());
    }

    categories
}

/// Turn plan slots into XMLTV programme entries. Placeholder slots render as
/// the standby title with only the generic category, so guide consumers never
/// mark them live.
pub fn programmes_for_slots(
    slots: &[DbPlanSlot],
    events_by_id: &HashMap<String, DbEvent>,
    standby_title: &str,
) -> Vec<XmltvProgramme> {
    slots
        .iter()
        .map(|slot| {
            let event = slot
                .event_id
                .as_deref()
                .and_then(|id| events_by_id.get(id));

            match event {
                Some(event) if !slot.is_placeholder() => XmltvProgramme {
                    channel_id: slot.channel_id.clone(),
                    title: event.title.clone(),
                    desc: event_desc(event),
                    categories: event_categories(event),
                    start: format_xmltv_datetime(slot.start_utc.and_utc()),
                    stop: format_xmltv_datetime(slot.end_utc.and_utc()),
                },
                _ => XmltvProgramme {
                    channel_id: slot.channel_id.clone(),
                    title: standby_title.to_string(),
                    desc: None,
                    categories: vec!["Sports".to_string()],
                    start: format_xmltv_datetime(slot.start_utc.and_utc()),
                    stop: format_xmltv_datetime(slot.end_utc.and_utc()),
                },
            }
        })
        .collect()
}
