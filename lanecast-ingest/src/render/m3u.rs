use std::fmt::Write;

use lanecast_db::config::RenderConfig;
use lanecast_db::models::DbChannel;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

/// The URL a player should tune for a lane. With a capture host configured
/// the resolver URL is wrapped in a `chrome://` capture request; otherwise it
/// is the resolver's `/vc/` endpoint directly.
pub fn lane_url(channel_id: &str, cfg: &RenderConfig) -> String {
    let resolver_url = format!(
        "{}/vc/{}",
        cfg.resolver_base_url.trim_end_matches('/'),
        channel_id
    );

    match cfg.cc_host.as_deref() {
        Some(host) => format!(
            "chrome://{}:{}/stream?url={}",
            host,
            cfg.cc_port,
            utf8_percent_encode(&resolver_url, NON_ALPHANUMERIC)
        ),
        None => resolver_url,
    }
}

pub fn render(channels: &[DbChannel], cfg: &RenderConfig) -> String {
    let mut out = String::from("#EXTM3U\n");

    for channel in channels {
        // The write! targets a String and cannot fail
        let _ = writeln!(
            out,
            "#EXTINF:-1 tvg-id=\"{}\" tvg-chno=\"{}\" group-title=\"{}\",{}",
            channel.channel_id, channel.chno, cfg.m3u_group_title, channel.name
        );
        out.push_str(&lane_url(&channel.channel_id, cfg));
        out.push('\n');
    }

    out
}
