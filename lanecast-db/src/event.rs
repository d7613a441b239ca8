use std::str::FromStr;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use strum::{Display, EnumString};

use crate::models::DbEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Live,
    Upcoming,
    Over,
    Replay,
    Studio,
    Unknown,
}

impl EventType {
    pub fn parse(s: &str) -> EventType {
        EventType::from_str(s).unwrap_or(EventType::Unknown)
    }
}

/// An upstream airing as the planner sees it. This is the domain counterpart
/// of the `events` row: `packages` is decoded from its JSON column and times
/// are restored to UTC.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub summary: Option<String>,
    pub sport: Option<String>,
    pub league_name: Option<String>,
    pub league_abbr: Option<String>,
    pub network: Option<String>,
    pub network_short: Option<String>,
    pub language: Option<String>,
    pub packages: Vec<String>,
    pub event_type: EventType,
    pub is_reair: bool,
    pub is_studio: bool,
    pub airing_id: Option<String>,
    pub simulcast_airing_id: Option<String>,
    pub image: Option<String>,
    pub start_utc: DateTime<Utc>,
    pub stop_utc: DateTime<Utc>,
}

impl From<DbEvent> for Event {
    fn from(row: DbEvent) -> Self {
        let packages = serde_json::from_str(&row.packages).unwrap_or_else(|err| {
            warn!(
                "Event {} has an unparseable packages column: {err}",
                row.event_id
            );
            Vec::new()
        });

        Event {
            event_type: EventType::parse(&row.event_type),
            packages,
            event_id: row.event_id,
            title: row.title,
            subtitle: row.subtitle,
            summary: row.summary,
            sport: row.sport,
            league_name: row.league_name,
            league_abbr: row.league_abbr,
            network: row.network,
            network_short: row.network_short,
            language: row.language,
            is_reair: row.is_reair,
            is_studio: row.is_studio,
            airing_id: row.airing_id,
            simulcast_airing_id: row.simulcast_airing_id,
            image: row.image,
            start_utc: row.start_utc.and_utc(),
            stop_utc: row.stop_utc.and_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_parses_upstream_spellings() {
        assert_eq!(EventType::parse("LIVE"), EventType::Live);
        assert_eq!(EventType::parse("live"), EventType::Live);
        assert_eq!(EventType::parse("REPLAY"), EventType::Replay);
        assert_eq!(EventType::parse("something-new"), EventType::Unknown);
        assert_eq!(EventType::Live.to_string(), "LIVE");
    }
}
