//! Worker configuration.

use std::time::Duration;

use bwatch_models::MIN_ACTION_DURATION_SECONDS;

/// Worker configuration, sourced from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bind host for the push endpoint
    pub host: String,
    /// Bind port for the push endpoint
    pub port: u16,
    /// Inference model identifier
    pub model: String,
    /// Sampling temperature for primary calls (the strict-JSON retry runs at 0)
    pub temperature: f64,
    /// In-flight inference requests per job
    pub concurrency: usize,
    /// Analysis window length in seconds
    pub chunk_seconds: f64,
    /// Overlap between adjacent windows in seconds
    pub chunk_overlap_seconds: f64,
    /// Upper bound on the effective clip frame rate sent to the model
    pub max_clip_fps: f64,
    /// Process-wide pause after a throttling signal
    pub global_rate_limit_pause: Duration,
    /// Retries for transient backend failures, per call
    pub max_transient_retries: u32,
    /// Fixed wait between transient retries
    pub transient_retry_interval: Duration,
    /// Hard wall-time cap on a single inference call
    pub call_timeout: Duration,
    /// Deadline for uploaded media to report ACTIVE
    pub file_ready_timeout: Duration,
    /// Interval between media readiness polls
    pub file_poll_interval: Duration,
    /// Maximum gap bridged when merging same-key spans
    pub merge_gap_seconds: f64,
    /// Context added around a span for validation clips
    pub validation_margin_seconds: f64,
    /// Minimum emitted span length
    pub min_action_duration_seconds: f64,
    /// Optional bearer token on the push endpoint
    pub worker_api_token: Option<String>,
    /// Prefix of uploaded session videos
    pub videos_prefix: String,
    /// Prefix of session records
    pub sessions_prefix: String,
    /// Prefix of emitted analysis artifacts
    pub analysis_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.4,
            concurrency: 5,
            chunk_seconds: 30.0,
            chunk_overlap_seconds: 4.0,
            max_clip_fps: 24.0,
            global_rate_limit_pause: Duration::from_millis(300_000),
            max_transient_retries: 3,
            transient_retry_interval: Duration::from_millis(60_000),
            call_timeout: Duration::from_millis(120_000),
            file_ready_timeout: Duration::from_millis(300_000),
            file_poll_interval: Duration::from_secs(1),
            merge_gap_seconds: 2.5,
            validation_margin_seconds: 3.0,
            min_action_duration_seconds: MIN_ACTION_DURATION_SECONDS,
            worker_api_token: None,
            videos_prefix: "child-videos".to_string(),
            sessions_prefix: "sessions".to_string(),
            analysis_prefix: "analysis".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_duration_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            model: std::env::var("MODEL").unwrap_or(defaults.model),
            temperature: env_parse("TEMPERATURE", defaults.temperature),
            concurrency: env_parse("CONCURRENCY", defaults.concurrency).max(1),
            chunk_seconds: env_parse("CHUNK_SECONDS", defaults.chunk_seconds),
            chunk_overlap_seconds: env_parse(
                "CHUNK_OVERLAP_SECONDS",
                defaults.chunk_overlap_seconds,
            ),
            max_clip_fps: env_parse("MAX_CLIP_FPS", defaults.max_clip_fps),
            global_rate_limit_pause: env_duration_ms(
                "GLOBAL_RATE_LIMIT_PAUSE_MS",
                defaults.global_rate_limit_pause,
            ),
            max_transient_retries: env_parse(
                "MAX_TRANSIENT_RETRIES",
                defaults.max_transient_retries,
            ),
            transient_retry_interval: env_duration_ms(
                "TRANSIENT_RETRY_INTERVAL_MS",
                defaults.transient_retry_interval,
            ),
            call_timeout: env_duration_ms("CALL_TIMEOUT_MS", defaults.call_timeout),
            file_ready_timeout: env_duration_ms(
                "FILE_READY_TIMEOUT_MS",
                defaults.file_ready_timeout,
            ),
            file_poll_interval: defaults.file_poll_interval,
            merge_gap_seconds: env_parse("MERGE_GAP_SECONDS", defaults.merge_gap_seconds),
            validation_margin_seconds: env_parse(
                "VALIDATION_MARGIN_SECONDS",
                defaults.validation_margin_seconds,
            ),
            min_action_duration_seconds: env_parse(
                "MIN_ACTION_DURATION_SECONDS",
                defaults.min_action_duration_seconds,
            ),
            worker_api_token: std::env::var("WORKER_API_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            videos_prefix: std::env::var("VIDEOS_PREFIX").unwrap_or(defaults.videos_prefix),
            sessions_prefix: std::env::var("SESSIONS_PREFIX").unwrap_or(defaults.sessions_prefix),
            analysis_prefix: std::env::var("ANALYSIS_PREFIX").unwrap_or(defaults.analysis_prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_platform_settings() {
        let config = WorkerConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.chunk_seconds, 30.0);
        assert_eq!(config.chunk_overlap_seconds, 4.0);
        assert_eq!(config.global_rate_limit_pause, Duration::from_secs(300));
        assert_eq!(config.call_timeout, Duration::from_secs(120));
        assert_eq!(config.merge_gap_seconds, 2.5);
        assert_eq!(config.min_action_duration_seconds, 0.8);
    }
}
