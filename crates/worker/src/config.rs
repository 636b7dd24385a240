use std::path::PathBuf;
use std::time::Duration;

use sitewatch_vision::poll::PollConfig;

/// API revision header value the assistant endpoints expect.
pub const VISION_API_REVISION: &str = "assistants=v2";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub database_url: String,
    /// Directory image paths are resolved against.
    pub image_root: PathBuf,
    /// Directory for temporary crop files.
    pub crop_dir: PathBuf,
    pub vision_api_url: String,
    pub vision_api_key: String,
    pub classifier_assistant_id: String,
    pub validator_assistant_id: String,
    pub classifier_poll_interval: Duration,
    pub validator_poll_interval: Duration,
    /// Upper bound on polling one assistant run.
    pub vision_run_timeout: Duration,
    /// Upper bound on any single HTTP request to the assistant service.
    pub vision_request_timeout: Duration,
    pub scan_interval: Duration,
    pub queue_poll_interval: Duration,
    pub max_in_flight: usize,
}

impl PipelineConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                         | Default                     |
    /// |---------------------------------|-----------------------------|
    /// | `DATABASE_URL`                  | (required)                  |
    /// | `IMAGE_ROOT`                    | `.`                         |
    /// | `CROP_DIR`                      | `./croppedimages`           |
    /// | `VISION_API_URL`                | `https://api.openai.com/v1` |
    /// | `VISION_API_KEY`                | (required)                  |
    /// | `CLASSIFIER_ASSISTANT_ID`       | (required)                  |
    /// | `VALIDATOR_ASSISTANT_ID`        | (required)                  |
    /// | `CLASSIFIER_POLL_INTERVAL_SECS` | `5`                         |
    /// | `VALIDATOR_POLL_INTERVAL_SECS`  | `3`                         |
    /// | `VISION_RUN_TIMEOUT_SECS`       | `300`                       |
    /// | `VISION_REQUEST_TIMEOUT_SECS`   | `60`                        |
    /// | `SCAN_INTERVAL_SECS`            | `3600`                      |
    /// | `QUEUE_POLL_INTERVAL_MS`        | `1000`                      |
    /// | `PIPELINE_MAX_IN_FLIGHT`        | `4`                         |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            image_root: env.or("IMAGE_ROOT", ".").into(),
            crop_dir: env.or("CROP_DIR", "./croppedimages").into(),
            vision_api_url: env.or("VISION_API_URL", "https://api.openai.com/v1"),
            vision_api_key: env.required("VISION_API_KEY")?,
            classifier_assistant_id: env.required("CLASSIFIER_ASSISTANT_ID")?,
            validator_assistant_id: env.required("VALIDATOR_ASSISTANT_ID")?,
            classifier_poll_interval: Duration::from_secs(
                env.positive("CLASSIFIER_POLL_INTERVAL_SECS", 5)?,
            ),
            validator_poll_interval: Duration::from_secs(
                env.positive("VALIDATOR_POLL_INTERVAL_SECS", 3)?,
            ),
            vision_run_timeout: Duration::from_secs(env.positive("VISION_RUN_TIMEOUT_SECS", 300)?),
            vision_request_timeout: Duration::from_secs(
                env.positive("VISION_REQUEST_TIMEOUT_SECS", 60)?,
            ),
            scan_interval: Duration::from_secs(env.positive("SCAN_INTERVAL_SECS", 3600)?),
            queue_poll_interval: Duration::from_millis(env.positive("QUEUE_POLL_INTERVAL_MS", 1000)?),
            max_in_flight: env.positive("PIPELINE_MAX_IN_FLIGHT", 4)? as usize,
        })
    }

    pub fn classifier_poll(&self) -> PollConfig {
        PollConfig::new(self.classifier_poll_interval, self.vision_run_timeout)
    }

    pub fn validator_poll(&self) -> PollConfig {
        PollConfig::new(self.validator_poll_interval, self.vision_run_timeout)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Value of `key`, with blank values treated as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn positive(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.parse::<u64>() {
            Ok(0) => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: "must be greater than zero".into(),
            }),
            Ok(n) => Ok(n),
            Err(e) => Err(ConfigError::Invalid {
                key,
                value: raw,
                reason: e.to_string(),
            }),
        }
    }
}
