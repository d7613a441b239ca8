use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer, Serialize};

/// Accept both `["a", "b"]` and the env-friendly `"a,b"` spelling.
fn comma_list<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Raw::deserialize(de)? {
        Raw::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Raw::Many(v) => v,
    })
}

/// Admission rules for upstream events. Empty lists mean "no restriction".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterConfig {
    #[serde(default, deserialize_with = "comma_list")]
    pub networks: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub exclude_networks: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub sports: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub exclude_sports: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub leagues: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub exclude_leagues: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub exclude_languages: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub event_types: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub exclude_event_types: Vec<String>,
    pub partial_league_match: bool,
    pub case_insensitive: bool,
    pub require_espn_plus: bool,
    pub exclude_ppv: bool,
    pub exclude_reair: bool,
    pub exclude_no_sport: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            exclude_networks: Vec::new(),
            sports: Vec::new(),
            exclude_sports: Vec::new(),
            leagues: Vec::new(),
            exclude_leagues: Vec::new(),
            languages: Vec::new(),
            exclude_languages: Vec::new(),
            event_types: Vec::new(),
            exclude_event_types: Vec::new(),
            partial_league_match: true,
            case_insensitive: true,
            require_espn_plus: false,
            exclude_ppv: false,
            exclude_reair: false,
            exclude_no_sport: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaddingConfig {
    pub start_mins: i64,
    pub end_mins: i64,
    pub live_only: bool,
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            start_mins: 0,
            end_mins: 0,
            live_only: true,
        }
    }
}

/// Settings for the rendered M3U/XMLTV artifacts and the tune fallback.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RenderConfig {
    pub resolver_base_url: String,
    pub m3u_group_title: String,
    pub cc_host: Option<String>,
    pub cc_port: u16,
    pub slate_url: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            resolver_base_url: "http://127.0.0.1:8000".to_string(),
            m3u_group_title: "ESPN+".to_string(),
            cc_host: None,
            cc_port: 7654,
            slate_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlannerConfig {
    pub db_path: String,
    pub out_dir: String,
    pub lanes: i32,
    pub valid_hours: i64,
    pub align_mins: i64,
    pub min_gap_mins: i64,
    pub schedule_hours: i64,
    pub cycle_timeout_secs: u64,
    pub event_ttl_hours: i64,
    pub plan_keep: i64,
    pub force_replan: bool,
    pub standby_title: String,
    // Display only; stored times are always UTC.
    pub tz: String,
    pub source_base_url: String,
    pub page_size: usize,
    pub filter: FilterConfig,
    pub padding: PaddingConfig,
    pub render: RenderConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/lanecast.sqlite".to_string(),
            out_dir: "./out".to_string(),
            lanes: 8,
            valid_hours: 48,
            align_mins: 30,
            min_gap_mins: 30,
            schedule_hours: 6,
            cycle_timeout_secs: 300,
            event_ttl_hours: 72,
            plan_keep: 10,
            force_replan: false,
            standby_title: "Stand By".to_string(),
            tz: "UTC".to_string(),
            source_base_url: "https://watch.graph.api.espn.com/api".to_string(),
            page_size: 500,
            filter: FilterConfig::default(),
            padding: PaddingConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl PlannerConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Lanecast.toml"))
            .merge(Env::prefixed("VC_").split("__"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResolverConfig {
    pub db_path: String,
    pub out_dir: String,
    pub slate_url: Option<String>,
    pub deeplink_template: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/lanecast.sqlite".to_string(),
            out_dir: "./out".to_string(),
            slate_url: None,
            deeplink_template: "sportscenter://x-callback-url/showWatchStream?playID={play_id}"
                .to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Lanecast.toml"))
            .merge(Env::prefixed("VC_").split("__"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_extract() {
        Jail::expect_with(|_| {
            let config = PlannerConfig::config()?;
            assert_eq!(config, PlannerConfig::default());
            Ok(())
        });
    }

    #[test]
    fn env_overrides_with_nesting_and_comma_lists() {
        Jail::expect_with(|jail| {
            jail.set_env("VC_LANES", "4");
            jail.set_env("VC_PADDING__END_MINS", "30");
            jail.set_env("VC_FILTER__NETWORKS", "ESPN+, ESPN3");
            jail.set_env("VC_FILTER__EXCLUDE_REAIR", "true");
            jail.set_env("VC_RENDER__SLATE_URL", "http://host/slate.mp4");

            let config = PlannerConfig::config()?;
            assert_eq!(config.lanes, 4);
            assert_eq!(config.padding.end_mins, 30);
            assert_eq!(config.filter.networks, vec!["ESPN+", "ESPN3"]);
            assert!(config.filter.exclude_reair);
            assert_eq!(
                config.render.slate_url.as_deref(),
                Some("http://host/slate.mp4")
            );
            Ok(())
        });
    }

    #[test]
    fn resolver_config_reads_same_keys() {
        Jail::expect_with(|jail| {
            jail.set_env("VC_DB_PATH", "/data/x.sqlite");
            let config = ResolverConfig::config()?;
            assert_eq!(config.db_path, "/data/x.sqlite");
            assert!(
                config
                    .deeplink_template
                    .starts_with("sportscenter://x-callback-url")
            );
            Ok(())
        });
    }
}
