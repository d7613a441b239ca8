mod api;
mod resolve;

use lanecast_db::config::ResolverConfig;
use rocket::fairing::AdHoc;
use rocket::figment::map;
use rocket::{Build, Rocket, figment, launch};
use rocket_sync_db_pools::database as sync_database;
use rocket_sync_db_pools::diesel::SqliteConnection;

#[sync_database("lanecast")]
pub struct Db(SqliteConnection);

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    let config: rocket_sync_db_pools::Config = rocket
        .figment()
        .extract_inner("databases.lanecast")
        .expect("lanecast database connection information was not found");

    tokio::task::spawn_blocking(move || {
        lanecast_db::run_migrations(&config.url).expect("Failed to apply migrations");
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

fn get_figment_with_constructed_db_url(config: &ResolverConfig) -> figment::Figment {
    rocket::Config::figment().merge((
        "databases",
        map!["lanecast" => map!["url" => config.db_path.clone()]],
    ))
}

#[launch]
fn rocket() -> _ {
    let config = ResolverConfig::config().expect("resolver configuration is invalid");

    rocket::custom(get_figment_with_constructed_db_url(&config))
        .manage(config)
        .mount("/", api::routes())
        .attach(Db::fairing())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
}
