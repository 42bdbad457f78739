//! Runtime configuration from the process environment.
//! Defaults match a backend running locally on port 8000.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::polling::Cadence;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_SESSION_FILE: &str = "session.json";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL including the `/api` prefix, without trailing slash.
    pub api_base_url: String,
    /// JSON file holding the persisted session (tokens and user).
    pub session_file: PathBuf,
    pub http_timeout: Duration,
    pub alerts_cadence: Cadence,
    pub dashboard_cadence: Cadence,
    /// Stop watch commands after this many refreshes; `None` polls until logout.
    pub max_poll_cycles: Option<NonZeroU32>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = get("AGRI_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(format!("AGRI_API_BASE_URL must be an http(s) URL, got {}", api_base_url));
        }

        let session_file = PathBuf::from(get("AGRI_SESSION_FILE").unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string()));

        let http_timeout = match get("AGRI_HTTP_TIMEOUT_SECS") {
            Some(s) => Duration::from_secs(positive(&s, "AGRI_HTTP_TIMEOUT_SECS")?.get().into()),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let alerts_cadence = cadence(&get, "ALERTS_TICK_SECS", "ALERTS_TRIGGER_COUNT", Cadence::alerts())?;
        let dashboard_cadence = cadence(&get, "DASHBOARD_TICK_SECS", "DASHBOARD_TRIGGER_COUNT", Cadence::dashboard())?;

        let max_poll_cycles = get("POLL_MAX_CYCLES")
            .map(|s| positive(&s, "POLL_MAX_CYCLES"))
            .transpose()?;

        Ok(Config {
            api_base_url,
            session_file,
            http_timeout,
            alerts_cadence,
            dashboard_cadence,
            max_poll_cycles,
            username: get("AGRI_USERNAME"),
            password: lookup("AGRI_PASSWORD").filter(|p| !p.is_empty()),
        })
    }
}

fn positive(raw: &str, key: &str) -> Result<NonZeroU32, String> {
    raw.parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| format!("{} must be a positive integer, got {}", key, raw))
}

fn cadence(
    get: &dyn Fn(&str) -> Option<String>,
    tick_key: &str,
    trigger_key: &str,
    default: Cadence,
) -> Result<Cadence, String> {
    let tick = match get(tick_key) {
        Some(s) => Duration::from_secs(positive(&s, tick_key)?.get().into()),
        None => default.tick,
    };
    let trigger = match get(trigger_key) {
        Some(s) => positive(&s, trigger_key)?,
        None => default.trigger,
    };
    Ok(Cadence::new(tick, trigger))
}
