mod channels;
mod error;
mod files;
mod tune;
mod whatson;

pub fn routes() -> Vec<rocket::Route> {
    rocket::routes![
        channels::health,
        channels::channels_from_guide,
        channels::channels_db,
        tune::tune,
        tune::tune_debug,
        whatson::whatson,
        whatson::whatson_all,
        whatson::deeplink,
        files::epg_file,
        files::playlist_file,
        files::playlist_alias,
        files::slate,
        files::standby,
    ]
}
