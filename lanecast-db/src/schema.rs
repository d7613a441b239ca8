diesel::table! {
    events (event_id) {
        event_id -> Text,
        title -> Text,
        subtitle -> Nullable<Text>,
        summary -> Nullable<Text>,
        sport -> Nullable<Text>,
        league_name -> Nullable<Text>,
        league_abbr -> Nullable<Text>,
        network -> Nullable<Text>,
        network_short -> Nullable<Text>,
        language -> Nullable<Text>,
        packages -> Text,
        event_type -> Text,
        is_reair -> Bool,
        is_studio -> Bool,
        airing_id -> Nullable<Text>,
        simulcast_airing_id -> Nullable<Text>,
        image -> Nullable<Text>,
        start_utc -> Timestamp,
        stop_utc -> Timestamp,
        first_seen_utc -> Timestamp,
        last_seen_utc -> Timestamp,
    }
}

diesel::table! {
    feeds (feed_id, event_id) {
        feed_id -> Text,
        event_id -> Text,
        url -> Text,
        is_primary -> Bool,
    }
}

diesel::table! {
    channels (channel_id) {
        channel_id -> Text,
        chno -> Integer,
        name -> Text,
        group_name -> Text,
        active -> Bool,
    }
}

diesel::table! {
    plan_runs (plan_id) {
        plan_id -> BigInt,
        generated_at_utc -> Timestamp,
        valid_from_utc -> Timestamp,
        valid_to_utc -> Timestamp,
        source_version -> Nullable<Text>,
        note -> Nullable<Text>,
        checksum -> Nullable<Text>,
        committed -> Bool,
    }
}

diesel::table! {
    plan_slots (plan_id, channel_id, start_utc) {
        plan_id -> BigInt,
        channel_id -> Text,
        start_utc -> Timestamp,
        end_utc -> Timestamp,
        kind -> Text,
        event_id -> Nullable<Text>,
        preferred_feed_id -> Nullable<Text>,
        placeholder_reason -> Nullable<Text>,
    }
}

diesel::table! {
    event_lanes (event_id) {
        event_id -> Text,
        channel_id -> Text,
        pinned_at_utc -> Timestamp,
        last_seen_utc -> Timestamp,
    }
}

diesel::table! {
    events_filterable (event_id) {
        event_id -> Text,
        is_allowed -> Bool,
        reasons -> Text,
        checked_at_utc -> Timestamp,
    }
}

diesel::joinable!(feeds -> events (event_id));
diesel::joinable!(plan_slots -> plan_runs (plan_id));
diesel::joinable!(plan_slots -> channels (channel_id));

diesel::allow_tables_to_appear_in_same_query!(
    events,
    feeds,
    channels,
    plan_runs,
    plan_slots,
    event_lanes,
    events_filterable,
);
