//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! service. All types derive Serde traits for deserialization from
//! config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the click-redirect service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admission gate (bot filter) settings.
    pub admission: AdmissionConfig,

    /// Circuit breaker tuning for postback networks.
    pub breaker: BreakerTuning,

    /// Postback forwarding settings and network table.
    pub postback: PostbackConfig,

    /// Redirect destinations with selection weights.
    pub products: Vec<ProductConfig>,

    /// Static geo lookup table.
    pub geo: GeoConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Admission gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Whether the gate starts enabled (toggleable at runtime).
    pub enabled: bool,

    /// Secret that bypasses every check (query param `bypass` or
    /// `X-Bypass-Key` header). Empty disables the bypass.
    pub bypass_key: String,

    /// ISO country codes allowed through the geo check. Empty skips
    /// the check entirely.
    pub allow_countries: Vec<String>,

    /// Lower-cased substrings denied in the User-Agent.
    pub blacklist_ua: Vec<String>,

    /// Literal IP string prefixes to deny (not CIDR).
    pub blacklist_ip_prefix: Vec<String>,

    /// Referrer hosts to deny (exact or subdomain suffix match).
    pub blacklist_referrer: Vec<String>,

    /// Regex patterns matched against the referrer host.
    pub blacklist_referrer_regex: Vec<String>,

    /// Sliding-window rate limit.
    pub rate_limit: RateLimitConfig,

    /// Deny clients whose User-Agent does not look mobile.
    pub mobile_only: bool,

    /// Also emit an event for allowed requests.
    pub log_allowed: bool,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bypass_key: String::new(),
            allow_countries: Vec::new(),
            blacklist_ua: Vec::new(),
            blacklist_ip_prefix: Vec::new(),
            blacklist_referrer: Vec::new(),
            blacklist_referrer_regex: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            mobile_only: false,
            log_allowed: false,
        }
    }
}

/// Sliding-window rate limit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per IP inside the window.
    pub max: usize,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Interval of the background sweep that prunes idle IPs.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: 30,
            window_secs: 60,
            sweep_interval_secs: 300,
        }
    }
}

/// Circuit breaker tuning, shared by all postback networks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerTuning {
    /// Consecutive failures before the breaker opens.
    pub max_failures: u32,

    /// Seconds the breaker stays open before a trial call.
    pub reset_timeout_secs: u64,
}

impl Default for BreakerTuning {
    fn default() -> Self {
        Self {
            max_failures: 3,
            reset_timeout_secs: 30,
        }
    }
}

/// Postback forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostbackConfig {
    /// Timeout for each outbound postback request in seconds.
    pub request_timeout_secs: u64,

    /// Ad networks postbacks can be forwarded to.
    pub networks: Vec<NetworkConfig>,
}

impl Default for PostbackConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            networks: Vec::new(),
        }
    }
}

/// One ad network's postback endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NetworkConfig {
    /// Registry key, e.g. "propeller".
    pub name: String,

    /// URL template with `{key}` placeholders.
    pub postback_url: String,

    /// Static parameters (account/tracker ids) merged under the
    /// per-postback parameters.
    pub params: HashMap<String, String>,
}

/// A redirect destination.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProductConfig {
    /// Unique identifier, selectable via the `product` query param.
    pub id: String,

    /// Display name used in events.
    pub name: String,

    /// Destination URL template.
    pub url: String,

    /// Selection weight. Weights need not sum to 100.
    pub percentage: f64,
}

/// Static geo table configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeoConfig {
    pub entries: Vec<GeoEntryConfig>,
}

/// One geo table row, matched by literal IP prefix.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeoEntryConfig {
    pub ip_prefix: String,
    /// ISO country code, e.g. "ID".
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
