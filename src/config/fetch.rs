//! Retrieval of remote sources and downloads.
//!
//! `http` and `https` URLs go through a [`ureq::Agent`]; `file:` URLs are
//! read from the local filesystem.  Transport failures are retried, HTTP
//! error statuses and unsupported schemes are not.

use std::io::Read;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Attempts made before a transport failure is reported.
pub const RETRY_COUNT: u32 = 10;

/// Pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!("bootconf/", env!("CARGO_PKG_VERSION"));

/// Build an agent, with a whole-request timeout when `timeout` is non-zero.
#[must_use]
pub fn agent(timeout: Duration) -> ureq::Agent {
    if timeout.is_zero() {
        return ureq::Agent::new_with_defaults();
    }
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Fetch `url` as text with the default retry policy.
///
/// # Errors
///
/// See [`fetch_with`].
pub fn fetch(url: &str) -> Result<String, ConfigError> {
    fetch_with(&agent(Duration::ZERO), url, RETRY_COUNT, RETRY_DELAY)
}

/// Fetch `url` as text, trying at most `attempts` times.
///
/// # Errors
///
/// Returns [`ConfigError::Status`] for a non-success HTTP status,
/// [`ConfigError::Network`] for transport failures, unsupported schemes and
/// non-UTF-8 bodies, and [`ConfigError::Io`] for unreadable `file:` URLs.
pub fn fetch_with(
    agent: &ureq::Agent,
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<String, ConfigError> {
    let mut body = String::new();
    open(agent, url, attempts, delay)?
        .read_to_string(&mut body)
        .map_err(|e| ConfigError::Network {
            url: url.to_string(),
            message: format!("failed to read response body: {e}"),
        })?;
    Ok(body)
}

/// Open a reader over the content at `url`.
///
/// # Errors
///
/// See [`fetch_with`].
pub fn open(
    agent: &ureq::Agent,
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<Box<dyn Read>, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    match parsed.scheme() {
        "file" => {
            let path = local_path(&parsed);
            let file = std::fs::File::open(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Box::new(file))
        }
        "http" | "https" => Ok(Box::new(get_with_retry(agent, url, attempts, delay)?)),
        other => Err(ConfigError::Network {
            url: url.to_string(),
            message: format!("unsupported protocol scheme \"{other}\""),
        }),
    }
}

fn local_path(url: &Url) -> PathBuf {
    url.to_file_path()
        .unwrap_or_else(|()| PathBuf::from(url.path()))
}

fn get_with_retry(
    agent: &ureq::Agent,
    url: &str,
    attempts: u32,
    delay: Duration,
) -> Result<ureq::BodyReader<'static>, ConfigError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match agent.get(url).header("User-Agent", USER_AGENT).call() {
            Ok(response) => return Ok(response.into_body().into_reader()),
            Err(ureq::Error::StatusCode(status)) => {
                return Err(ConfigError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Err(e) => {
                tracing::debug!("fetching {url} failed (attempt {attempt}/{attempts}): {e}");
                last_error = e.to_string();
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }

    Err(ConfigError::Network {
        url: url.to_string(),
        message: format!("{last_error} (after {attempts} attempts)"),
    })
}
