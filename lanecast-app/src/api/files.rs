use std::path::Path;

use lanecast_db::config::ResolverConfig;
use rocket::fs::NamedFile;
use rocket::response::Redirect;
use rocket::response::content::RawHtml;
use rocket::{Responder, State, get};

// Artifacts are only ever served from disk; the worker owns regeneration
#[get("/out/epg.xml")]
pub async fn epg_file(config: &State<ResolverConfig>) -> Option<NamedFile> {
    NamedFile::open(Path::new(&config.out_dir).join("epg.xml"))
        .await
        .ok()
}

#[get("/out/playlist.m3u")]
pub async fn playlist_file(config: &State<ResolverConfig>) -> Option<NamedFile> {
    NamedFile::open(Path::new(&config.out_dir).join("playlist.m3u"))
        .await
        .ok()
}

#[get("/playlist.m3u")]
pub async fn playlist_alias(config: &State<ResolverConfig>) -> Option<NamedFile> {
    NamedFile::open(Path::new(&config.out_dir).join("playlist.m3u"))
        .await
        .ok()
}

const STANDBY_PAGE: &str = "<!doctype html>\n<html>\n<head><title>Stand By</title></head>\n\
<body style=\"background:#000;color:#fff;font-family:sans-serif;text-align:center;\">\n\
<h1>Stand By</h1>\n<p>No event is currently airing on this lane.</p>\n</body>\n</html>\n";

#[derive(Responder)]
pub enum SlateResponse {
    Redirect(Redirect),
    Html(RawHtml<&'static str>),
}

fn slate_or_page(config: &ResolverConfig) -> SlateResponse {
    match &config.slate_url {
        Some(url) => SlateResponse::Redirect(Redirect::found(url.clone())),
        None => SlateResponse::Html(RawHtml(STANDBY_PAGE)),
    }
}

#[get("/slate")]
pub fn slate(config: &State<ResolverConfig>) -> SlateResponse {
    slate_or_page(config)
}

#[get("/standby")]
pub fn standby(config: &State<ResolverConfig>) -> SlateResponse {
    slate_or_page(config)
}
