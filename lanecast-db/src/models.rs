use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewEvent<'a> {
    pub event_id: &'a str,
    pub title: &'a str,
    pub subtitle: Option<&'a str>,
    pub summary: Option<&'a str>,
    pub sport: Option<&'a str>,
    pub league_name: Option<&'a str>,
    pub league_abbr: Option<&'a str>,
    pub network: Option<&'a str>,
    pub network_short: Option<&'a str>,
    pub language: Option<&'a str>,
    pub packages: &'a str,
    pub event_type: &'a str,
    pub is_reair: bool,
    pub is_studio: bool,
    pub airing_id: Option<&'a str>,
    pub simulcast_airing_id: Option<&'a str>,
    pub image: Option<&'a str>,
    pub start_utc: NaiveDateTime,
    pub stop_utc: NaiveDateTime,
    pub first_seen_utc: NaiveDateTime,
    pub last_seen_utc: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbEvent {
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
    pub packages: String,
    pub event_type: String,
    pub is_reair: bool,
    pub is_studio: bool,
    pub airing_id: Option<String>,
    pub simulcast_airing_id: Option<String>,
    pub image: Option<String>,
    pub start_utc: NaiveDateTime,
    pub stop_utc: NaiveDateTime,
    pub first_seen_utc: NaiveDateTime,
    pub last_seen_utc: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::feeds)]
pub struct NewFeed<'a> {
    pub feed_id: &'a str,
    pub event_id: &'a str,
    pub url: &'a str,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::feeds)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbFeed {
    pub feed_id: String,
    pub event_id: String,
    pub url: String,
    pub is_primary: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::channels)]
pub struct NewChannel<'a> {
    pub channel_id: &'a str,
    pub chno: i32,
    pub name: &'a str,
    pub group_name: &'a str,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::channels)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbChannel {
    pub channel_id: String,
    pub chno: i32,
    pub name: String,
    pub group_name: String,
    pub active: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::plan_runs)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlanRun<'a> {
    pub generated_at_utc: NaiveDateTime,
    pub valid_from_utc: NaiveDateTime,
    pub valid_to_utc: NaiveDateTime,
    pub source_version: Option<&'a str>,
    pub note: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::plan_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbPlanRun {
    pub plan_id: i64,
    pub generated_at_utc: NaiveDateTime,
    pub valid_from_utc: NaiveDateTime,
    pub valid_to_utc: NaiveDateTime,
    pub source_version: Option<String>,
    pub note: Option<String>,
    pub checksum: Option<String>,
    pub committed: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::plan_slots)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewPlanSlot<'a> {
    pub plan_id: i64,
    pub channel_id: &'a str,
    pub start_utc: NaiveDateTime,
    pub end_utc: NaiveDateTime,
    pub kind: &'a str,
    pub event_id: Option<&'a str>,
    pub preferred_feed_id: Option<&'a str>,
    pub placeholder_reason: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::plan_slots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbPlanSlot {
    pub plan_id: i64,
    pub channel_id: String,
    pub start_utc: NaiveDateTime,
    pub end_utc: NaiveDateTime,
    pub kind: String,
    pub event_id: Option<String>,
    pub preferred_feed_id: Option<String>,
    pub placeholder_reason: Option<String>,
}

impl DbPlanSlot {
    pub fn is_placeholder(&self) -> bool {
        self.kind == "placeholder"
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::event_lanes)]
pub struct NewEventLane<'a> {
    pub event_id: &'a str,
    pub channel_id: &'a str,
    pub pinned_at_utc: NaiveDateTime,
    pub last_seen_utc: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::event_lanes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbEventLane {
    pub event_id: String,
    pub channel_id: String,
    pub pinned_at_utc: NaiveDateTime,
    pub last_seen_utc: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::events_filterable)]
pub struct NewFilterAudit<'a> {
    pub event_id: &'a str,
    pub is_allowed: bool,
    pub reasons: &'a str,
    pub checked_at_utc: NaiveDateTime,
}
