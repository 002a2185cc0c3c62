use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};

use crate::{
    Error, Result, BASE_URL, LOOKUP_TIMEOUT_MS, MAX_PAGES, OUTPUT_DIR, PAGE_DELAY_MS,
    PARTS_PAGE_SIZE, PARTS_TIMEOUT_MS, RETRY_ATTEMPTS, RETRY_BACKOFF_MS,
};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36 OPR/120.0.0.0";
const DEFAULT_ORIGIN: &str = "https://voters.eci.gov.in";
const DEFAULT_REFERER: &str = "https://voters.eci.gov.in/";
const DEFAULT_EXTRA_HEADERS: &[(&str, &str)] = &[
    ("accept", "*/*"),
    ("accept-language", "en-US,en;q=0.9"),
    ("applicationname", "VSP"),
    ("channelidobo", "VSP"),
    ("platform-type", "ECIWEB"),
    ("atkn_bnd", "null"),
    ("rtkn_bnd", "null"),
    ("sec-fetch-dest", "empty"),
    ("sec-fetch-mode", "cors"),
    ("sec-fetch-site", "same-site"),
];

/// Everything a run needs to know that isn't the state code.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub output_dir: PathBuf,
    /// Copy of the log written here, next to the console output.
    pub log_file: Option<PathBuf>,
    pub headers: HeaderConfig,
    pub retry: RetryPolicy,
    /// Timeout for the states/districts/assemblies lookups.
    pub lookup_timeout: Duration,
    pub parts_timeout: Duration,
    pub page_size: u32,
    /// Pause between two consecutive part pages.
    pub page_delay: Duration,
    pub max_pages: u32,
}

/// Headers sent with every request. `content-type: application/json` is always added on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderConfig {
    pub user_agent: Option<String>,
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub extra: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`
    Exponential(Duration),
}

/// One retry policy for all four endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, the first one included. Never below 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retry_statuses: Vec<u16>,
    pub retry_transport_errors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            output_dir: PathBuf::from(OUTPUT_DIR),
            log_file: None,
            headers: HeaderConfig::default(),
            retry: RetryPolicy::default(),
            lookup_timeout: Duration::from_millis(LOOKUP_TIMEOUT_MS),
            parts_timeout: Duration::from_millis(PARTS_TIMEOUT_MS),
            page_size: PARTS_PAGE_SIZE,
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            max_pages: MAX_PAGES,
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            origin: Some(DEFAULT_ORIGIN.to_string()),
            referer: Some(DEFAULT_REFERER.to_string()),
            extra: DEFAULT_EXTRA_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_ATTEMPTS,
            backoff: Backoff::Fixed(Duration::from_millis(RETRY_BACKOFF_MS)),
            retry_statuses: vec![429],
            retry_transport_errors: false,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential(base) => {
                let exp = attempt.saturating_sub(1).min(16);
                base.saturating_mul(1 << exp)
            }
        }
    }

    pub fn should_retry_status(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_attempts && self.retry_statuses.contains(&status)
    }

    pub fn should_retry_transport(&self, attempt: u32) -> bool {
        attempt < self.max_attempts && self.retry_transport_errors
    }
}

impl HeaderConfig {
    /// Builds the default header map for the HTTP client.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let named = [
            (USER_AGENT, &self.user_agent),
            (ORIGIN, &self.origin),
            (REFERER, &self.referer),
        ];
        for (name, value) in named {
            if let Some(value) = value {
                map.insert(name.clone(), header_value(name.as_str(), value)?);
            }
        }

        for (name, value) in &self.extra {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            // content-type is not negotiable.
            if header_name == CONTENT_TYPE {
                continue;
            }
            map.insert(header_name, header_value(name, value)?);
        }
        Ok(map)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Defaults overridden by `HARVEST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = lookup("HARVEST_BASE_URL") {
            config.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("HARVEST_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("HARVEST_LOG_FILE") {
            config.log_file = non_empty(v).map(PathBuf::from);
        }
        if let Some(v) = lookup("HARVEST_USER_AGENT") {
            config.headers.user_agent = non_empty(v);
        }
        if let Some(v) = lookup("HARVEST_ORIGIN") {
            config.headers.origin = non_empty(v);
        }
        if let Some(v) = lookup("HARVEST_REFERER") {
            config.headers.referer = non_empty(v);
        }
        if let Some(v) = lookup("HARVEST_EXTRA_HEADERS") {
            config.headers.extra = parse_extra_headers(&v)?;
        }
        if let Some(v) = lookup("HARVEST_PAGE_SIZE") {
            config.page_size = parse_num("HARVEST_PAGE_SIZE", &v)?;
            if config.page_size == 0 {
                return Err(Error::Config("HARVEST_PAGE_SIZE must be positive".into()));
            }
        }
        if let Some(v) = lookup("HARVEST_PAGE_DELAY_MS") {
            config.page_delay = Duration::from_millis(parse_num("HARVEST_PAGE_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("HARVEST_MAX_PAGES") {
            config.max_pages = parse_num("HARVEST_MAX_PAGES", &v)?;
        }
        if let Some(v) = lookup("HARVEST_LOOKUP_TIMEOUT_MS") {
            config.lookup_timeout =
                Duration::from_millis(parse_num("HARVEST_LOOKUP_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("HARVEST_PARTS_TIMEOUT_MS") {
            config.parts_timeout =
                Duration::from_millis(parse_num("HARVEST_PARTS_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("HARVEST_RETRY_ATTEMPTS") {
            config.retry.max_attempts = parse_num::<u32>("HARVEST_RETRY_ATTEMPTS", &v)?.max(1);
        }

        let mut base = match config.retry.backoff {
            Backoff::Fixed(d) | Backoff::Exponential(d) => d,
        };
        if let Some(v) = lookup("HARVEST_RETRY_BACKOFF_MS") {
            base = Duration::from_millis(parse_num("HARVEST_RETRY_BACKOFF_MS", &v)?);
        }
        let exponential = match lookup("HARVEST_RETRY_EXPONENTIAL") {
            Some(v) => parse_bool("HARVEST_RETRY_EXPONENTIAL", &v)?,
            None => matches!(config.retry.backoff, Backoff::Exponential(_)),
        };
        config.retry.backoff = if exponential {
            Backoff::Exponential(base)
        } else {
            Backoff::Fixed(base)
        };

        if let Some(v) = lookup("HARVEST_RETRY_STATUSES") {
            config.retry.retry_statuses = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_num("HARVEST_RETRY_STATUSES", s))
                .collect::<Result<_>>()?;
        }
        if let Some(v) = lookup("HARVEST_RETRY_TRANSPORT") {
            config.retry.retry_transport_errors = parse_bool("HARVEST_RETRY_TRANSPORT", &v)?;
        }

        Ok(config)
    }
}

fn non_empty(v: String) -> Option<String> {
    if v.trim().is_empty() {
        None
    } else {
        Some(v)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    v.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={v:?}: {e}")))
}

fn parse_bool(key: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{key}={v:?}: expected a boolean"))),
    }
}

/// `name:value;name:value`
fn parse_extra_headers(v: &str) -> Result<Vec<(String, String)>> {
    v.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once(':').ok_or_else(|| {
                Error::Config(format!("HARVEST_EXTRA_HEADERS: {pair:?} is not name:value"))
            })?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
