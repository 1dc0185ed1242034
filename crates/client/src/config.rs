use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use aigc_core::error::CoreError;
use aigc_core::polling::{PollBudget, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use aigc_core::protocol::{DEFAULT_QUERY_URL, DEFAULT_SUBMIT_URL};

/// Directory generated images are written to by default.
pub const DEFAULT_OUTPUT_DIR: &str = "generated_images";
/// Default number of images downloaded at the same time.
pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;
/// Default timeout for a single submit or poll request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings for one [`Generator`](crate::Generator).
///
/// Passed explicitly; there is no process-wide instance. All fields have
/// defaults matching the public service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Submission endpoint.
    pub submit_url: String,
    /// Poll endpoint.
    pub query_url: String,
    /// Where downloaded images are written. Created on first use.
    pub output_dir: PathBuf,
    /// Attempt count and interval for status polling.
    pub poll: PollBudget,
    /// Upper bound on concurrent image downloads (at least 1).
    pub download_concurrency: usize,
    /// Timeout for a single submit or poll request, and the longest a
    /// download may go without receiving data.
    pub request_timeout: Duration,
    /// Reject submissions whose response lacks `token` or `timestamp`
    /// instead of polling with empty values.
    pub strict_credentials: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            submit_url: DEFAULT_SUBMIT_URL.to_string(),
            query_url: DEFAULT_QUERY_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            poll: PollBudget::default(),
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            strict_credentials: false,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                 |
    /// |-----------------------------|-----------------------------------------|
    /// | `AIGC_SUBMIT_URL`           | `https://image.baidu.com/aigc/generate` |
    /// | `AIGC_QUERY_URL`            | `https://image.baidu.com/aigc/query`    |
    /// | `AIGC_OUTPUT_DIR`           | `generated_images`                      |
    /// | `AIGC_MAX_POLL_ATTEMPTS`    | `30`                                    |
    /// | `AIGC_POLL_INTERVAL_SECS`   | `2`                                     |
    /// | `AIGC_DOWNLOAD_CONCURRENCY` | `4`                                     |
    /// | `AIGC_REQUEST_TIMEOUT_SECS` | `30`                                    |
    /// | `AIGC_STRICT_CREDENTIALS`   | `false`                                 |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable
    /// source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let submit_url = lookup("AIGC_SUBMIT_URL").unwrap_or(defaults.submit_url);
        let query_url = lookup("AIGC_QUERY_URL").unwrap_or(defaults.query_url);
        let output_dir = lookup("AIGC_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let max_attempts: u32 =
            parse_var(&lookup, "AIGC_MAX_POLL_ATTEMPTS")?.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let poll_interval = parse_var::<u64, _>(&lookup, "AIGC_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let download_concurrency: usize = parse_var(&lookup, "AIGC_DOWNLOAD_CONCURRENCY")?
            .unwrap_or(DEFAULT_DOWNLOAD_CONCURRENCY);
        if download_concurrency == 0 {
            return Err(CoreError::Validation(
                "AIGC_DOWNLOAD_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let request_timeout = parse_var::<u64, _>(&lookup, "AIGC_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let strict_credentials: bool =
            parse_var(&lookup, "AIGC_STRICT_CREDENTIALS")?.unwrap_or(false);

        Ok(Self {
            submit_url,
            query_url,
            output_dir,
            poll: PollBudget {
                max_attempts,
                interval: poll_interval,
            },
            download_concurrency,
            request_timeout,
            strict_credentials,
        })
    }
}

/// Parse an optional variable, reporting the variable name on failure.
fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, CoreError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            CoreError::Validation(format!("{key} has an invalid value: '{raw}'"))
        }),
    }
}
