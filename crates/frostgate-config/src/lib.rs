// frostgate-config/src/lib.rs
// ============================================================================
// Module: Config & Identity
// Description: Resolves auth mode, API key(s), DB path, and feature flags
//              from environment variables with explicit precedence.
// Purpose: Produce one immutable configuration value at startup so no
//          request-handling code re-reads or re-freezes global state.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! FrostGate resolves all configuration once, at process startup, from
//! explicit `FG_*` environment variables (see the specification's §4.1 and
//! §6). The result is one immutable [`FrostgateConfig`] threaded through
//! request state — there is no global mutable "auth enabled" flag
//! re-frozen per request, which the specification calls out as an
//! antipattern in its ancestor implementation.
//!
//! Resolution is expressed against an injectable lookup function rather than
//! reading `std::env` directly, so the precedence rules in [`resolve_from`]
//! can be exercised deterministically in tests without mutating real process
//! environment (which is not safe to do from parallel tests).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

const DEFAULT_API_KEY: &str = "supersecret";
const DEFAULT_CLOCK_STALE_MS: i64 = 300_000;
const DEFAULT_SERVICE: &str = "frostgate-core";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 60;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;
const PROD_DB_PATH: &str = "/var/lib/frostgate/state/frostgate.db";
const DEFAULT_STATE_DIR: &str = "state";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal configuration errors. All are raised at startup, before the HTTP
/// listener binds; none are recoverable mid-process.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration value was present but could not be parsed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// The resolved database path drifted to the production location while
    /// running under a non-production environment (anti-drift guard).
    #[error(
        "non-prod drift: FG_ENV={env} resolved db_path to a production path ({path}); set \
         FG_SQLITE_PATH explicitly"
    )]
    NonProdDrift {
        /// The `FG_ENV` value in effect.
        env: String,
        /// The production-looking path that was resolved.
        path: String,
    },
}

// ============================================================================
// SECTION: Feature Flags
// ============================================================================

/// Optional surfaces gated by feature flags; each mirrors an `FG_*_ENABLED`
/// environment variable. When a flag is off, its surface must 404 rather
/// than mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Gates `POST /dev/seed` and `/dev/emit` (C9).
    pub dev_events_enabled: bool,
    /// Gates the mission envelope surface (declared by contract only).
    pub mission_envelope_enabled: bool,
    /// Gates the ring router surface (declared by contract only).
    pub ring_router_enabled: bool,
    /// Gates the ROE engine surface (declared by contract only).
    pub roe_engine_enabled: bool,
    /// Gates the forensics surface (declared by contract only).
    pub forensics_enabled: bool,
    /// Gates the governance surface (declared by contract only).
    pub governance_enabled: bool,
}

// ============================================================================
// SECTION: Rate Limit Config
// ============================================================================

/// Tuning for the in-process per-tenant-per-route rate limiter (C2 §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
        }
    }
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Fully resolved, immutable FrostGate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FrostgateConfig {
    /// Service name reported by `/health` and audit events.
    pub service: String,
    /// Raw `FG_ENV` value, lowercased; `"prod"`/`"test"`/anything else.
    pub env: String,
    /// Whether authentication is enforced on scoped routes.
    pub auth_enabled: bool,
    /// The global API key.
    pub api_key: String,
    /// Resolved SQLite database path.
    pub db_path: PathBuf,
    /// Clock staleness threshold in milliseconds (C6).
    pub clock_stale_ms: i64,
    /// HTTP listener bind address.
    pub bind_addr: String,
    /// Rate limiter tuning.
    pub rate_limit: RateLimitConfig,
    /// Feature flags gating optional surfaces.
    pub features: FeatureFlags,
}

impl FrostgateConfig {
    /// Returns true when `env == "prod"`.
    #[must_use]
    pub fn is_prod(&self) -> bool {
        self.env == "prod"
    }

    /// Returns true when `env == "test"`.
    #[must_use]
    pub fn is_test(&self) -> bool {
        self.env == "test"
    }
}

/// Caller-supplied overrides applied before any environment variable is
/// consulted; used for embedded/test construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOverrides {
    /// Explicit auth-enabled override (embedded use per §4.1).
    pub auth_enabled: Option<bool>,
}

/// Soft warnings produced during resolution; never fatal, but worth logging
/// (see `frostgate_server::audit`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    /// Set when `FG_API_KEY` was unset and the dev-only default was used.
    pub api_key_defaulted: bool,
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves configuration from the real process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when a configured value is malformed or the
/// anti-drift guard trips.
pub fn from_env(
    overrides: ConfigOverrides,
) -> Result<(FrostgateConfig, ConfigWarnings), ConfigError> {
    resolve_from(|key| std::env::var(key).ok(), overrides)
}

/// Resolves configuration against an injectable lookup function, enabling
/// deterministic tests without touching real process environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when a configured value is malformed or the
/// anti-drift guard trips.
pub fn resolve_from<F>(
    lookup: F,
    overrides: ConfigOverrides,
) -> Result<(FrostgateConfig, ConfigWarnings), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = lookup("FG_ENV").map(|v| v.to_ascii_lowercase()).unwrap_or_default();

    let auth_enabled = resolve_auth_enabled(&lookup, overrides)?;

    let mut warnings = ConfigWarnings::default();
    let api_key = match lookup("FG_API_KEY").filter(|v| !v.is_empty()) {
        Some(key) => key,
        None => {
            warnings.api_key_defaulted = true;
            DEFAULT_API_KEY.to_string()
        }
    };

    let db_path = resolve_db_path(&lookup, &env)?;

    let clock_stale_ms = match lookup("FG_CLOCK_STALE_MS") {
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid(format!("FG_CLOCK_STALE_MS not an integer: {raw}")))?,
        None => DEFAULT_CLOCK_STALE_MS,
    };

    let service = lookup("FG_SERVICE").filter(|v| !v.is_empty()).unwrap_or_else(|| DEFAULT_SERVICE.to_string());
    let bind_addr =
        lookup("FG_BIND_ADDR").filter(|v| !v.is_empty()).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

    let rate_limit = resolve_rate_limit(&lookup)?;
    let features = resolve_feature_flags(&lookup);

    let config = FrostgateConfig {
        service,
        env,
        auth_enabled,
        api_key,
        db_path,
        clock_stale_ms,
        bind_addr,
        rate_limit,
        features,
    };

    Ok((config, warnings))
}

fn resolve_auth_enabled<F>(lookup: &F, overrides: ConfigOverrides) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(explicit) = overrides.auth_enabled {
        return Ok(explicit);
    }
    if let Some(raw) = lookup("FG_AUTH_ENABLED") {
        return parse_bool(&raw, "FG_AUTH_ENABLED");
    }
    Ok(lookup("FG_API_KEY").is_some_and(|v| !v.is_empty()))
}

fn resolve_db_path<F>(lookup: &F, env: &str) -> Result<PathBuf, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(explicit) = lookup("FG_SQLITE_PATH").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(explicit));
    }

    let resolved = if env == "prod" {
        PathBuf::from(PROD_DB_PATH)
    } else {
        let state_dir = lookup("FG_STATE_DIR")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STATE_DIR), PathBuf::from);
        state_dir.join("frostgate.db")
    };

    if env == "test" && looks_like_prod_path(&resolved) {
        return Err(ConfigError::NonProdDrift {
            env: env.to_string(),
            path: resolved.display().to_string(),
        });
    }

    Ok(resolved)
}

fn looks_like_prod_path(path: &Path) -> bool {
    path.starts_with("/var/lib")
}

fn resolve_rate_limit<F>(lookup: &F) -> Result<RateLimitConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let max_requests = match lookup("FG_RATE_LIMIT_MAX_REQUESTS") {
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            ConfigError::Invalid(format!("FG_RATE_LIMIT_MAX_REQUESTS not an integer: {raw}"))
        })?,
        None => DEFAULT_RATE_LIMIT_MAX_REQUESTS,
    };
    let window_ms = match lookup("FG_RATE_LIMIT_WINDOW_MS") {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!("FG_RATE_LIMIT_WINDOW_MS not an integer: {raw}"))
        })?,
        None => DEFAULT_RATE_LIMIT_WINDOW_MS,
    };
    Ok(RateLimitConfig { max_requests, window_ms })
}

fn resolve_feature_flags<F>(lookup: &F) -> FeatureFlags
where
    F: Fn(&str) -> Option<String>,
{
    FeatureFlags {
        dev_events_enabled: flag(lookup, "FG_DEV_EVENTS_ENABLED"),
        mission_envelope_enabled: flag(lookup, "FG_MISSION_ENVELOPE_ENABLED"),
        ring_router_enabled: flag(lookup, "FG_RING_ROUTER_ENABLED"),
        roe_engine_enabled: flag(lookup, "FG_ROE_ENGINE_ENABLED"),
        forensics_enabled: flag(lookup, "FG_FORENSICS_ENABLED"),
        governance_enabled: flag(lookup, "FG_GOVERNANCE_ENABLED"),
    }
}

fn flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).is_some_and(|raw| parse_bool(&raw, key).unwrap_or(false))
}

fn parse_bool(raw: &str, key: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::Invalid(format!("{key} not a boolean: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(map: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| map.get(key).map(|v| (*v).to_string())
    }

    #[test]
    fn defaults_to_dev_state_dir_and_disabled_auth() {
        let map = HashMap::new();
        let (config, warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert!(!config.auth_enabled);
        assert!(warnings.api_key_defaulted);
        assert_eq!(config.api_key, DEFAULT_API_KEY);
        assert_eq!(config.db_path, PathBuf::from("state/frostgate.db"));
    }

    #[test]
    fn api_key_presence_implies_auth_enabled() {
        let mut map = HashMap::new();
        map.insert("FG_API_KEY", "mysecret");
        let (config, warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert!(config.auth_enabled);
        assert!(!warnings.api_key_defaulted);
        assert_eq!(config.api_key, "mysecret");
    }

    #[test]
    fn explicit_auth_enabled_env_var_wins_over_api_key_presence() {
        let mut map = HashMap::new();
        map.insert("FG_API_KEY", "mysecret");
        map.insert("FG_AUTH_ENABLED", "false");
        let (config, _warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert!(!config.auth_enabled);
    }

    #[test]
    fn explicit_override_wins_over_everything() {
        let mut map = HashMap::new();
        map.insert("FG_AUTH_ENABLED", "true");
        let overrides = ConfigOverrides { auth_enabled: Some(false) };
        let (config, _warnings) = resolve_from(lookup_from(&map), overrides).expect("resolve");
        assert!(!config.auth_enabled);
    }

    #[test]
    fn prod_env_resolves_to_var_lib_path() {
        let mut map = HashMap::new();
        map.insert("FG_ENV", "prod");
        let (config, _warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert_eq!(config.db_path, PathBuf::from(PROD_DB_PATH));
    }

    #[test]
    fn explicit_sqlite_path_overrides_env_derived_default() {
        let mut map = HashMap::new();
        map.insert("FG_ENV", "prod");
        map.insert("FG_SQLITE_PATH", "/tmp/custom.db");
        let (config, _warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert_eq!(config.db_path, PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_env_anti_drift_guard_trips_on_prod_like_default() {
        // Simulates a regression where the non-prod branch incorrectly
        // resolves under /var/lib; the guard must fail closed rather than
        // silently writing into a production path during tests.
        let mut map = HashMap::new();
        map.insert("FG_ENV", "test");
        map.insert("FG_STATE_DIR", "/var/lib/frostgate/state");
        let result = resolve_from(lookup_from(&map), ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::NonProdDrift { .. })));
    }

    #[test]
    fn rejects_non_boolean_auth_enabled() {
        let mut map = HashMap::new();
        map.insert("FG_AUTH_ENABLED", "maybe");
        let result = resolve_from(lookup_from(&map), ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn feature_flags_default_off() {
        let map = HashMap::new();
        let (config, _warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn feature_flag_parses_on() {
        let mut map = HashMap::new();
        map.insert("FG_DEV_EVENTS_ENABLED", "1");
        let (config, _warnings) =
            resolve_from(lookup_from(&map), ConfigOverrides::default()).expect("resolve");
        assert!(config.features.dev_events_enabled);
    }
}
