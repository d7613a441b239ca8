use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt, stream};
use log::debug;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum WatchGraphError {
    #[error("background fetch task exited abnormally")]
    JoinFailure(#[source] tokio::task::JoinError),

    #[error("error building watch-graph request")]
    RequestBuildError(#[source] reqwest::Error),

    #[error("error executing watch-graph request")]
    RequestExecuteError(#[source] reqwest::Error),

    #[error("watch-graph reported a server error")]
    UpstreamStatusError(#[source] reqwest::Error),

    #[error("error extracting response body")]
    RequestBodyError(#[source] reqwest::Error),

    #[error("error deserializing watch-graph response")]
    DeserializeError(#[source] serde_json::Error),
}

/// One playable stream attached to an airing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringFeed {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringLeague {
    pub name: Option<String>,
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringNetwork {
    pub name: Option<String>,
    pub short_name: Option<String>,
}

/// One upstream airing as the watch-graph API returns it. Field names follow
/// the upstream camelCase payload; `id` is stable across refreshes and is the
/// event identity downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airing {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub league: Option<AiringLeague>,
    #[serde(default)]
    pub network: Option<AiringNetwork>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(rename = "type", default)]
    pub airing_type: Option<String>,
    #[serde(default)]
    pub re_air: bool,
    #[serde(default)]
    pub studio: bool,
    #[serde(default)]
    pub airing_id: Option<String>,
    #[serde(default)]
    pub simulcast_airing_id: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub feeds: Vec<AiringFeed>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringPage {
    pub airings: Vec<Airing>,
    pub next_page: Option<String>,
}

pub struct WatchGraph {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
}

impl WatchGraph {
    pub fn new(base_url: impl Into<String>, page_size: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            page_size,
        }
    }

    /// Stream of airings intersecting `[from, to)`, in upstream order.
    pub fn airings(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Stream<Item = Result<Airing, WatchGraphError>> {
        self.pages(from, to).flat_map(|val| match val {
            Ok(vec) => {
                // Turn Vec<T> into a stream of Result<T, E>
                let results = vec.into_iter().map(Ok);
                stream::iter(results).left_stream()
            }
            Err(e) => {
                // Return a single error, as a stream
                stream::once(async { Err(e) }).right_stream()
            }
        })
    }

    fn pages(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Stream<Item = Result<Vec<Airing>, WatchGraphError>> {
        // For lifetimes
        let page_size = self.page_size;
        let client = self.client.clone(); // This is internally reference counted
        let url = format!("{}/airings", self.base_url.trim_end_matches('/'));

        // Use tokio::spawn to eagerly fetch the next page while the caller is
        // doing other work
        let first_url = url.clone();
        let next_page = tokio::spawn(async move {
            get_next_page(client, first_url, page_size, from, to, None)
        });

        stream::unfold(Some(next_page), move |next_page| {
            let url = url.clone();
            async move {
                let Some(next_page) = next_page else {
                    // next_page being None indicates that we've finished. We
                    // couldn't end the stream before because we hadn't
                    // produced the current page yet.
                    debug!("Stream of airing pages has finished");
                    return None;
                };

                // The double nesting is because the join can fail, and the
                // join can succeed but the underlying task produced an error.
                let (client, page) = match next_page.await {
                    Ok(fut) => match fut.await {
                        Ok(page) => page,
                        Err(err) => {
                            debug!("Stream of airing pages is yielding an error");
                            return Some((Err(err), None));
                        }
                    },
                    Err(err) => {
                        debug!("Stream of airing pages is yielding an error");
                        return Some((Err(WatchGraphError::JoinFailure(err)), None));
                    }
                };

                if let Some(next_page_token) = page.next_page {
                    if page.airings.len() >= page_size {
                        // Then there are more pages
                        let next_page_fut = tokio::spawn(async move {
                            get_next_page(client, url, page_size, from, to, Some(next_page_token))
                        });

                        debug!("Yielding a page of airings");
                        Some((Ok(page.airings), Some(next_page_fut)))
                    } else {
                        debug!("Yielding the last page of airings");
                        Some((Ok(page.airings), None))
                    }
                } else {
                    // No next page token means this was the last page
                    debug!("Yielding the last page of airings");
                    Some((Ok(page.airings), None))
                }
            }
        })
    }
}

async fn get_next_page(
    client: reqwest::Client,
    url: String,
    page_size: usize,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    page: Option<String>,
) -> Result<(reqwest::Client, AiringPage), WatchGraphError> {
    debug!("Fetching airings page {page:?} for window {from}..{to}");

    let page_size_string = page_size.to_string();

    let mut request_builder = client.get(&url).query(&[
        ("windowStart", &from.to_rfc3339()),
        ("windowEnd", &to.to_rfc3339()),
        ("count", &page_size_string),
    ]);

    if let Some(page) = page {
        request_builder = request_builder.query(&[("page", &page)]);
    }

    let request = request_builder
        .build()
        .map_err(WatchGraphError::RequestBuildError)?;

    let response = client
        .execute(request)
        .await
        .map_err(WatchGraphError::RequestExecuteError)?
        .error_for_status()
        .map_err(WatchGraphError::UpstreamStatusError)?;

    let body = response
        .text()
        .await
        .map_err(WatchGraphError::RequestBodyError)?;

    let page: AiringPage =
        serde_json::from_str(&body).map_err(WatchGraphError::DeserializeError)?;

    Ok((client, page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airing_payload_round_trips() {
        let payload = r#"{
            "airings": [{
                "id": "4f2d1c9e-0a57-4d52-9f3a-1c2b3d4e5f60:es1",
                "name": "Arsenal vs. Chelsea",
                "shortName": "ARS v CHE",
                "description": "Premier League soccer from Emirates Stadium.",
                "sport": "Soccer",
                "league": {"name": "English Premier League", "abbreviation": "EPL"},
                "network": {"name": "ESPN+", "shortName": "ESPN+"},
                "language": "en",
                "packages": ["ESPN_PLUS"],
                "type": "LIVE",
                "reAir": false,
                "airingId": "118706",
                "startTime": "2025-01-01T15:00:00Z",
                "endTime": "2025-01-01T17:00:00Z",
                "feeds": [{"id": "es1", "url": "https://example.com/es1.m3u8", "primary": true}]
            }],
            "nextPage": null
        }"#;

        let page: AiringPage = serde_json::from_str(payload).unwrap();
        assert_eq!(page.airings.len(), 1);
        assert!(page.next_page.is_none());

        let airing = &page.airings[0];
        assert_eq!(airing.name, "Arsenal vs. Chelsea");
        assert_eq!(airing.airing_type.as_deref(), Some("LIVE"));
        assert!(!airing.re_air);
        assert!(!airing.studio);
        assert_eq!(airing.packages, vec!["ESPN_PLUS"]);
        assert_eq!(
            airing.league.as_ref().unwrap().abbreviation.as_deref(),
            Some("EPL")
        );
        assert_eq!(airing.feeds[0].id, "es1");
        assert!(airing.feeds[0].primary);
        assert_eq!(
            airing.start_time,
            "2025-01-01T15:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn missing_optional_fields_default() {
        let payload = r#"{
            "id": "abc123",
            "name": "SportsCenter",
            "startTime": "2025-01-01T00:00:00Z",
            "endTime": "2025-01-01T01:00:00Z"
        }"#;

        let airing: Airing = serde_json::from_str(payload).unwrap();
        assert!(airing.sport.is_none());
        assert!(airing.packages.is_empty());
        assert!(airing.feeds.is_empty());
        assert!(airing.airing_type.is_none());
    }
}
