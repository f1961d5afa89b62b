//! Configuration for the Docent backend.
//!
//! Configuration is loaded from environment variables via figment and parsed
//! into a single value object. Duration-valued options accept both numeric
//! values (seconds) and duration strings with units. Production deployments
//! are validated before any listener opens; unsafe values terminate startup.

use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::warn;

/// Sentinel development secret that must never reach production.
const DEV_SECRET_SENTINEL: &str = "dev-secret-change-me";

/// Minimum secret key length in bytes (256 bits).
const MIN_SECRET_KEY_LEN: usize = 32;

/// Main application configuration.
#[derive(Deserialize)]
pub struct Config {
    /// Log level for this application's target specifically.
    ///
    /// Valid values are: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Port for the web server (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Storage connection string. Required in every mode.
    pub database_url: String,
    /// Maximum connections in the store's pool.
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    /// Integration-test mode: lenient defaults, seeded fixtures, short
    /// rate-limit windows, mail disabled. Never enable in production.
    #[serde(default)]
    pub integration_test_mode: bool,
    /// Secret key for the deployment. Required in production, at least
    /// 256 bits. May be absent only in test mode.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Comma-separated CORS origin allowlist. Required in production.
    #[serde(default)]
    pub cors_origins: Option<String>,
    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Grace window after a refresh during which the old token still
    /// authenticates. Clamped to at least 60 seconds.
    #[serde(default = "default_refresh_grace")]
    pub session_refresh_grace_seconds: u64,
    /// Verification token lifetime in seconds.
    #[serde(default = "default_verification_ttl")]
    pub verification_ttl_seconds: u64,
    /// Whether verification mail is dispatched.
    #[serde(default = "default_email_enabled")]
    pub email_enabled: bool,
    /// Graceful shutdown timeout.
    #[serde(
        default = "default_shutdown_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub shutdown_timeout: Duration,
    /// End-to-end per-request timeout.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub request_timeout: Duration,
    /// Base URL of the retriever-generator collaborator.
    #[serde(default = "default_generator_base_url")]
    pub generator_base_url: String,
    /// Per-action rate limit overrides (`RATE_LIMIT__CHAT__MAX_REQUESTS`...).
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_max_connections() -> u32 {
    20
}

/// Default session lifetime of 24 hours
fn default_session_ttl() -> u64 {
    86400
}

/// Default refresh grace of 5 minutes
fn default_refresh_grace() -> u64 {
    300
}

/// Default verification token lifetime of 10 minutes
fn default_verification_ttl() -> u64 {
    600
}

fn default_email_enabled() -> bool {
    true
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_generator_base_url() -> String {
    "http://localhost:8001".to_string()
}

/// Rate-limited actions. Every gated handler names one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    Chat,
    Save,
    Personalize,
}

impl RateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RateAction::Chat => "chat",
            RateAction::Save => "save",
            RateAction::Personalize => "personalize",
        }
    }
}

/// Resolved (max, window) pair for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_requests: u32,
    pub window_seconds: u64,
}

/// Per-action rate limit overrides. Unset fields fall back to the
/// mode-dependent defaults in [`Config::rate_policy`].
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub chat: RateOverride,
    #[serde(default)]
    pub save: RateOverride,
    #[serde(default)]
    pub personalize: RateOverride,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct RateOverride {
    #[serde(default)]
    pub max_requests: Option<u32>,
    #[serde(default)]
    pub window_seconds: Option<u64>,
}

/// Production per-action defaults: (max requests, window seconds).
fn production_default(action: RateAction) -> (u32, u64) {
    match action {
        RateAction::Chat => (10, 60),
        RateAction::Save => (5, 60),
        RateAction::Personalize => (3, 60),
    }
}

impl Config {
    /// Resolve the rate policy for an action.
    ///
    /// Explicit overrides win; otherwise production defaults apply, and test
    /// mode halves the maximum and shrinks the window to 10 seconds so
    /// end-to-end suites can exercise denial within seconds.
    pub fn rate_policy(&self, action: RateAction) -> RatePolicy {
        let overrides = match action {
            RateAction::Chat => &self.rate_limit.chat,
            RateAction::Save => &self.rate_limit.save,
            RateAction::Personalize => &self.rate_limit.personalize,
        };

        let (prod_max, prod_window) = production_default(action);
        let (default_max, default_window) = if self.integration_test_mode {
            ((prod_max / 2).max(1), 10)
        } else {
            (prod_max, prod_window)
        };

        RatePolicy {
            max_requests: overrides.max_requests.unwrap_or(default_max),
            window_seconds: overrides.window_seconds.unwrap_or(default_window),
        }
    }

    /// Session refresh grace, clamped to the contract floor of 60 seconds
    /// and never exceeding the session lifetime.
    pub fn refresh_grace_seconds(&self) -> u64 {
        self.session_refresh_grace_seconds
            .max(60)
            .min(self.session_ttl_seconds)
    }

    /// The parsed CORS allowlist.
    pub fn cors_allowlist(&self) -> Vec<String> {
        self.cors_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Validate deployment parameters. Errors terminate startup before any
    /// listener opens; warnings are logged and tolerated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.integration_test_mode {
            return Ok(());
        }

        match self.secret_key.as_deref() {
            None | Some("") => return Err(ConfigError::MissingSecretKey),
            Some(DEV_SECRET_SENTINEL) => return Err(ConfigError::DefaultSecretKey),
            Some(key) if key.len() < MIN_SECRET_KEY_LEN => {
                return Err(ConfigError::WeakSecretKey { length: key.len() });
            }
            Some(_) => {}
        }

        let origins = self.cors_allowlist();
        if origins.is_empty() {
            return Err(ConfigError::MissingCorsOrigins);
        }
        if origins.iter().any(|o| o == "*") {
            return Err(ConfigError::WildcardCorsOrigin);
        }
        for origin in origins.iter().filter(|o| o.starts_with("http://")) {
            warn!(origin = %origin, "plain_http_cors_origin");
        }

        if self.database_url.starts_with("sqlite:") {
            warn!("sqlite_database_in_production");
        }

        Ok(())
    }
}

/// Fatal configuration problems, reported before serving begins.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SECRET_KEY is required in production")]
    MissingSecretKey,
    #[error("SECRET_KEY still holds the development default; generate a real secret")]
    DefaultSecretKey,
    #[error("SECRET_KEY is {length} bytes; at least {MIN_SECRET_KEY_LEN} are required")]
    WeakSecretKey { length: usize },
    #[error("CORS_ORIGINS is required in production")]
    MissingCorsOrigins,
    #[error("CORS_ORIGINS must be an explicit allowlist, never '*'")]
    WildcardCorsOrigin,
}

/// Parser behind the duration-valued options (`SHUTDOWN_TIMEOUT`,
/// `REQUEST_TIMEOUT`). A bare number means seconds; an `ms`, `s`, or `m`
/// suffix picks the unit, whitespace before the unit is tolerated, and
/// several terms sum ("1m 30s" is 90 seconds). Fractions, exponents, and
/// infinities are rejected.
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[TimeUnit::Second, TimeUnit::MilliSecond, TimeUnit::Minute])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Deserialize a duration from either a plain integer (seconds — the shape
/// deployments writing `SHUTDOWN_TIMEOUT=10` use) or a suffixed string
/// handled by [`DURATION_PARSER`].
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Visitor;

    struct SecondsOrUnits;

    impl<'de> Visitor<'de> for SecondsOrUnits {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("seconds as an integer, or a string like \"30s\" or \"2m\"")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            let parsed = DURATION_PARSER.parse(value).map_err(|e| {
                serde::de::Error::custom(format!(
                    "'{value}' is not a duration ({e}); try \"10\", \"750ms\", \"30s\", or \"2m\""
                ))
            })?;
            parsed
                .try_into()
                .map_err(|e| serde::de::Error::custom(format!("duration out of range: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| serde::de::Error::custom("duration must not be negative"))
        }
    }

    deserializer.deserialize_any(SecondsOrUnits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(test_mode: bool) -> Config {
        Config {
            log_level: default_log_level(),
            port: default_port(),
            database_url: "sqlite:docent.db".to_owned(),
            db_max_connections: default_db_max_connections(),
            integration_test_mode: test_mode,
            secret_key: None,
            cors_origins: None,
            session_ttl_seconds: default_session_ttl(),
            session_refresh_grace_seconds: default_refresh_grace(),
            verification_ttl_seconds: default_verification_ttl(),
            email_enabled: default_email_enabled(),
            shutdown_timeout: default_shutdown_timeout(),
            request_timeout: default_request_timeout(),
            generator_base_url: default_generator_base_url(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    #[test]
    fn production_requires_secret_key() {
        let config = base_config(false);
        assert_eq!(config.validate(), Err(ConfigError::MissingSecretKey));
    }

    #[test]
    fn production_rejects_dev_sentinel() {
        let mut config = base_config(false);
        config.secret_key = Some(DEV_SECRET_SENTINEL.to_owned());
        assert_eq!(config.validate(), Err(ConfigError::DefaultSecretKey));
    }

    #[test]
    fn production_rejects_short_secret() {
        let mut config = base_config(false);
        config.secret_key = Some("tooshort".to_owned());
        assert_eq!(
            config.validate(),
            Err(ConfigError::WeakSecretKey { length: 8 })
        );
    }

    #[test]
    fn production_requires_cors_allowlist() {
        let mut config = base_config(false);
        config.secret_key = Some("0123456789abcdef0123456789abcdef".to_owned());
        assert_eq!(config.validate(), Err(ConfigError::MissingCorsOrigins));

        config.cors_origins = Some("*".to_owned());
        assert_eq!(config.validate(), Err(ConfigError::WildcardCorsOrigin));

        config.cors_origins = Some("https://example.com".to_owned());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_mode_is_lenient() {
        let config = base_config(true);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rate_policy_production_defaults() {
        let config = base_config(false);
        let chat = config.rate_policy(RateAction::Chat);
        assert_eq!(chat.max_requests, 10);
        assert_eq!(chat.window_seconds, 60);
        let save = config.rate_policy(RateAction::Save);
        assert_eq!(save.max_requests, 5);
        let personalize = config.rate_policy(RateAction::Personalize);
        assert_eq!(personalize.max_requests, 3);
    }

    #[test]
    fn rate_policy_test_mode_halves_and_shrinks() {
        let config = base_config(true);
        let save = config.rate_policy(RateAction::Save);
        assert_eq!(save.max_requests, 2);
        assert_eq!(save.window_seconds, 10);
    }

    #[test]
    fn rate_policy_overrides_win() {
        let mut config = base_config(true);
        config.rate_limit.chat.max_requests = Some(42);
        config.rate_limit.chat.window_seconds = Some(5);
        let chat = config.rate_policy(RateAction::Chat);
        assert_eq!(chat.max_requests, 42);
        assert_eq!(chat.window_seconds, 5);
    }

    #[test]
    fn refresh_grace_is_clamped() {
        let mut config = base_config(false);
        config.session_refresh_grace_seconds = 5;
        assert_eq!(config.refresh_grace_seconds(), 60);

        config.session_ttl_seconds = 120;
        config.session_refresh_grace_seconds = 600;
        assert_eq!(config.refresh_grace_seconds(), 120);
    }

    #[test]
    fn durations_accept_seconds_and_unit_strings() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "deserialize_duration")]
            value: Duration,
        }

        let parse = |v: serde_json::Value| serde_json::from_value::<Probe>(v);

        assert_eq!(parse(serde_json::json!({"value": 10})).unwrap().value,
            Duration::from_secs(10));
        assert_eq!(parse(serde_json::json!({"value": "750ms"})).unwrap().value,
            Duration::from_millis(750));
        assert_eq!(parse(serde_json::json!({"value": "1m 30s"})).unwrap().value,
            Duration::from_secs(90));
        assert!(parse(serde_json::json!({"value": -5})).is_err());
        assert!(parse(serde_json::json!({"value": "soon"})).is_err());
    }

    #[test]
    fn cors_allowlist_splits_and_trims() {
        let mut config = base_config(false);
        config.cors_origins = Some("https://a.com, https://b.com ,".to_owned());
        assert_eq!(
            config.cors_allowlist(),
            vec!["https://a.com".to_owned(), "https://b.com".to_owned()]
        );
    }
}
