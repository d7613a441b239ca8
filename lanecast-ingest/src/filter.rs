use lanecast_db::Event;
use lanecast_db::config::FilterConfig;
use strum::Display;

const ESPN_PLUS_PACKAGE: &str = "ESPN_PLUS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    NetworkNotIncluded,
    NetworkExcluded,
    SportNotIncluded,
    SportExcluded,
    LeagueNotIncluded,
    LeagueExcluded,
    LanguageNotIncluded,
    LanguageExcluded,
    EventTypeNotIncluded,
    EventTypeExcluded,
    MissingEspnPlus,
    PayPerView,
    ReAir,
    NoSport,
}

#[derive(Debug)]
pub struct FilterVerdict {
    pub event_id: String,
    pub allowed: bool,
    pub reasons: Vec<RejectReason>,
}

#[derive(Debug)]
pub struct FilterOutcome {
    pub admitted: Vec<Event>,
    pub verdicts: Vec<FilterVerdict>,
}

fn norm(s: &str, case_insensitive: bool) -> String {
    let trimmed = s.trim();
    if case_insensitive {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// True if any of `values` matches any entry in `list`. An empty list never
/// matches (include lists treat empty as wildcard at the call site).
fn list_matches(list: &[String], values: &[Option<&str>], cfg: &FilterConfig) -> bool {
    list.iter().any(|entry| {
        let entry = norm(entry, cfg.case_insensitive);
        values.iter().flatten().any(|value| {
            let value = norm(value, cfg.case_insensitive);
            value == entry
        })
    })
}

/// League entries additionally match on substrings when
/// `partial_league_match` is set, in either direction, so that "NCAA" matches
/// "NCAA Division I" and "Premier League" matches "English Premier League".
fn league_matches(list: &[String], event: &Event, cfg: &FilterConfig) -> bool {
    let values = [event.league_name.as_deref(), event.league_abbr.as_deref()];
    if !cfg.partial_league_match {
        return list_matches(list, &values, cfg);
    }

    list.iter().any(|entry| {
        let entry = norm(entry, cfg.case_insensitive);
        values.iter().flatten().any(|value| {
            let value = norm(value, cfg.case_insensitive);
            value.contains(&entry) || entry.contains(&value)
        })
    })
}

/// All the reasons `event` is inadmissible under `cfg`; empty means admitted.
pub fn reasons_for(event: &Event, cfg: &FilterConfig) -> Vec<RejectReason> {
    let mut reasons = Vec::new();

    let networks = [event.network.as_deref(), event.network_short.as_deref()];
    if !cfg.networks.is_empty() && !list_matches(&cfg.networks, &networks, cfg) {
        reasons.push(RejectReason::NetworkNotIncluded);
    }
    if list_matches(&cfg.exclude_networks, &networks, cfg) {
        reasons.push(RejectReason::NetworkExcluded);
    }

    let sports = [event.sport.as_deref()];
    if !cfg.sports.is_empty() && !list_matches(&cfg.sports, &sports, cfg) {
        reasons.push(RejectReason::SportNotIncluded);
    }
    if list_matches(&cfg.exclude_sports, &sports, cfg) {
        reasons.push(RejectReason::SportExcluded);
    }

    if !cfg.leagues.is_empty() && !league_matches(&cfg.leagues, event, cfg) {
        reasons.push(RejectReason::LeagueNotIncluded);
    }
    if league_matches(&cfg.exclude_leagues, event, cfg) {
        reasons.push(RejectReason::LeagueExcluded);
    }

    let languages = [event.language.as_deref()];
    if !cfg.languages.is_empty() && !list_matches(&cfg.languages, &languages, cfg) {
        reasons.push(RejectReason::LanguageNotIncluded);
    }
    if list_matches(&cfg.exclude_languages, &languages, cfg) {
        reasons.push(RejectReason::LanguageExcluded);
    }

    let event_type = event.event_type.to_string();
    let event_types = [Some(event_type.as_str())];
    if !cfg.event_types.is_empty() && !list_matches(&cfg.event_types, &event_types, cfg) {
        reasons.push(RejectReason::EventTypeNotIncluded);
    }
    if list_matches(&cfg.exclude_event_types, &event_types, cfg) {
        reasons.push(RejectReason::EventTypeExcluded);
    }

    if cfg.require_espn_plus
        && !event
            .packages
            .iter()
            .any(|p| p.eq_ignore_ascii_case(ESPN_PLUS_PACKAGE))
    {
        reasons.push(RejectReason::MissingEspnPlus);
    }

    if cfg.exclude_ppv
        && event
            .packages
            .iter()
            .any(|p| p.to_ascii_uppercase().contains("PPV"))
    {
        reasons.push(RejectReason::PayPerView);
    }

    if cfg.exclude_reair && event.is_reair {
        reasons.push(RejectReason::ReAir);
    }

    if cfg.exclude_no_sport && event.sport.as_deref().is_none_or(|s| s.trim().is_empty()) {
        reasons.push(RejectReason::NoSport);
    }

    reasons
}

/// Partition `events` into admitted and rejected. Pure in (events, cfg);
/// per-event verdicts are independent, so the admitted set does not depend on
/// input order.
pub fn run(events: Vec<Event>, cfg: &FilterConfig) -> FilterOutcome {
    let mut admitted = Vec::with_capacity(events.len());
    let mut verdicts = Vec::with_capacity(events.len());

    for event in events {
        let reasons = reasons_for(&event, cfg);
        let allowed = reasons.is_empty();
        verdicts.push(FilterVerdict {
            event_id: event.event_id.clone(),
            allowed,
            reasons,
        });
        if allowed {
            admitted.push(event);
        }
    }

    FilterOutcome { admitted, verdicts }
}
