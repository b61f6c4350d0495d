//! Bot/fraud admission gate.
//!
//! # Responsibilities
//! - Classify every inbound click as Allow or Deny with a reason
//! - Run the checks in a fixed order with short-circuit semantics
//! - Emit a structured block event for every deny
//!
//! # Check order
//! bypass key → referrer blacklist → UA blacklist → rate limit →
//! IP-prefix blacklist → geo allow-list → mobile-only

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;
use url::Url;

use crate::admission::rate_limit::RateLimiter;
use crate::config::schema::AdmissionConfig;
use crate::geo::GeoResolver;
use crate::http::request::ClientRequest;
use crate::observability::events::{Event, EventSink};
use crate::observability::metrics;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    BadReferrer,
    SuspiciousUa,
    RateLimitExceeded,
    BlacklistedIpPrefix,
    GeoUnknown,
    GeoNotAllowed,
    NonMobileDevice,
}

impl DenyReason {
    /// Stable reason string carried in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::BadReferrer => "bad_referrer",
            DenyReason::SuspiciousUa => "suspicious_ua",
            DenyReason::RateLimitExceeded => "rate_limit_exceeded",
            DenyReason::BlacklistedIpPrefix => "blacklisted_ip_prefix",
            DenyReason::GeoUnknown => "geo_unknown",
            DenyReason::GeoNotAllowed => "geo_not_allowed",
            DenyReason::NonMobileDevice => "non_mobile_device",
        }
    }
}

/// The ordered admission pipeline.
pub struct AdmissionGate {
    cfg: AdmissionConfig,
    referrer_regexes: Vec<Regex>,
    rate_limiter: Arc<RateLimiter>,
    geo: Option<Arc<dyn GeoResolver>>,
    events: Arc<dyn EventSink>,
    enabled: AtomicBool,
}

impl AdmissionGate {
    /// Build the gate. Invalid referrer regexes are skipped with a warning.
    pub fn new(
        cfg: AdmissionConfig,
        rate_limiter: Arc<RateLimiter>,
        geo: Option<Arc<dyn GeoResolver>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let referrer_regexes = cfg
            .blacklist_referrer_regex
            .iter()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid referrer regex");
                    None
                }
            })
            .collect();
        let enabled = AtomicBool::new(cfg.enabled);

        Self {
            cfg,
            referrer_regexes,
            rate_limiter,
            geo,
            events,
            enabled,
        }
    }

    /// Whether the gate currently runs its checks.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enable or disable the gate at runtime. Returns the new state.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.store(enabled, Ordering::Relaxed);
        enabled
    }

    /// Flip the gate's enabled flag. Returns the new state.
    pub fn toggle(&self) -> bool {
        // fetch_xor flips atomically and yields the previous value.
        !self.enabled.fetch_xor(true, Ordering::Relaxed)
    }

    /// Run the pipeline. First matching rule wins.
    pub fn evaluate(&self, req: &ClientRequest) -> Decision {
        if !self.is_enabled() {
            return Decision::Allow;
        }

        // 1. Bypass key skips every other check.
        if let Some(method) = self.bypass_method(req) {
            self.events.emit(
                Event::new("bypass_request")
                    .field("method", method)
                    .field("ip", req.ip.as_str()),
            );
            metrics::record_admission("bypass");
            return Decision::Allow;
        }

        let ua = req.user_agent.to_lowercase();
        let referrer = req.referrer.to_lowercase();

        // 2. Referrer blacklist.
        if let Some(host) = referrer_host(&referrer) {
            if let Some(matched) = self.bad_referrer(&host) {
                return self.deny(
                    req,
                    DenyReason::BadReferrer,
                    Event::new("block_request")
                        .field("referrer_host", host.as_str())
                        .field("matched", matched),
                );
            }
        }

        // 3. User-Agent blacklist.
        for bad in &self.cfg.blacklist_ua {
            if !bad.is_empty() && ua.contains(bad.to_lowercase().as_str()) {
                return self.deny(
                    req,
                    DenyReason::SuspiciousUa,
                    Event::new("block_request").field("matched_ua", bad.as_str()),
                );
            }
        }

        // 4. Rate limit.
        if self.rate_limiter.too_many(&req.ip) {
            return self.deny(req, DenyReason::RateLimitExceeded, Event::new("block_request"));
        }

        // 5. IP prefix blacklist (literal string prefix, not CIDR).
        for prefix in &self.cfg.blacklist_ip_prefix {
            if !prefix.is_empty() && req.ip.starts_with(prefix.as_str()) {
                return self.deny(
                    req,
                    DenyReason::BlacklistedIpPrefix,
                    Event::new("block_request").field("ip_prefix", prefix.as_str()),
                );
            }
        }

        // 6. Geo allow-list. Skipped without a list, without a resolver,
        //    or for loopback clients.
        if !self.cfg.allow_countries.is_empty() && !is_loopback(&req.ip) {
            if let Some(geo) = &self.geo {
                match geo.country_code(&req.ip) {
                    None => {
                        return self.deny(req, DenyReason::GeoUnknown, Event::new("block_request"));
                    }
                    Some(code) => {
                        let allowed = self
                            .cfg
                            .allow_countries
                            .iter()
                            .any(|c| c.trim().eq_ignore_ascii_case(&code));
                        if !allowed {
                            return self.deny(
                                req,
                                DenyReason::GeoNotAllowed,
                                Event::new("block_request").field("country_code", code),
                            );
                        }
                    }
                }
            }
        }

        // 7. Mobile-only heuristic.
        if self.cfg.mobile_only && !is_mobile_ua(&ua) {
            return self.deny(req, DenyReason::NonMobileDevice, Event::new("block_request"));
        }

        if self.cfg.log_allowed {
            self.events.emit(
                Event::new("allow_request")
                    .field("ip", req.ip.as_str())
                    .field("user_agent", req.user_agent.as_str()),
            );
        }
        metrics::record_admission("allow");
        Decision::Allow
    }

    fn bypass_method(&self, req: &ClientRequest) -> Option<&'static str> {
        if self.cfg.bypass_key.is_empty() {
            return None;
        }
        if req.query.get("bypass") == Some(&self.cfg.bypass_key) {
            return Some("query_param");
        }
        if req.bypass_header.as_deref() == Some(self.cfg.bypass_key.as_str()) {
            return Some("header");
        }
        None
    }

    /// Returns the blacklist entry or pattern that matched, if any.
    fn bad_referrer(&self, host: &str) -> Option<String> {
        let host = host.trim();
        for entry in &self.cfg.blacklist_referrer {
            let entry = entry.trim().to_lowercase();
            let entry = entry.trim_start_matches('.');
            if entry.is_empty() {
                continue;
            }
            if host == entry || host.ends_with(&format!(".{entry}")) {
                return Some(entry.to_string());
            }
        }
        self.referrer_regexes
            .iter()
            .find(|re| re.is_match(host))
            .map(|re| re.as_str().to_string())
    }

    fn deny(&self, req: &ClientRequest, reason: DenyReason, event: Event) -> Decision {
        let event = event
            .field("reason", reason.as_str())
            .field("ip", req.ip.as_str())
            .field("user_agent", req.user_agent.as_str())
            .field("referrer", req.referrer.as_str())
            .field("url", req.url.as_str());
        self.events.emit(event);
        metrics::record_admission(reason.as_str());
        Decision::Deny(reason)
    }
}

/// Extract the lower-cased host from a referrer URL, if it has one.
fn referrer_host(referrer: &str) -> Option<String> {
    if referrer.is_empty() {
        return None;
    }
    Url::parse(referrer)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn is_loopback(ip: &str) -> bool {
    if ip == "localhost" {
        return true;
    }
    ip.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

fn is_mobile_ua(ua: &str) -> bool {
    const INDICATORS: [&str; 4] = ["android", "iphone", "ipad", "ipod"];
    INDICATORS.iter().any(|m| ua.contains(m)) || ua.contains(" mobile ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::geo::CityRecord;
    use crate::observability::events::MemorySink;

    struct FakeGeo {
        code: Option<&'static str>,
    }

    impl GeoResolver for FakeGeo {
        fn country_code(&self, _ip: &str) -> Option<String> {
            self.code.map(str::to_string)
        }

        fn city_record(&self, _ip: &str) -> Option<CityRecord> {
            None
        }
    }

    fn request(ip: &str, ua: &str, referrer: &str) -> ClientRequest {
        ClientRequest {
            ip: ip.to_string(),
            user_agent: ua.to_string(),
            referrer: referrer.to_string(),
            url: "/".to_string(),
            query: HashMap::new(),
            bypass_header: None,
        }
    }

    fn gate_with(cfg: AdmissionConfig, geo: Option<Arc<dyn GeoResolver>>) -> (AdmissionGate, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let limiter = Arc::new(RateLimiter::new(
            cfg.rate_limit.max,
            Duration::from_secs(cfg.rate_limit.window_secs),
        ));
        let gate = AdmissionGate::new(cfg, limiter, geo, sink.clone());
        (gate, sink)
    }

    #[test]
    fn test_clean_request_allowed() {
        let (gate, _) = gate_with(AdmissionConfig::default(), None);
        let decision = gate.evaluate(&request("1.2.3.4", "Mozilla/5.0 (Android)", ""));
        assert_eq!(decision, Decision::Allow);
    }

    #[test]
    fn test_referrer_blacklist_exact_and_suffix() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_referrer = vec!["popcash.net".into()];
        let (gate, sink) = gate_with(cfg, None);

        let deny = gate.evaluate(&request("1.2.3.4", "ua", "https://popcash.net/landing"));
        assert_eq!(deny, Decision::Deny(DenyReason::BadReferrer));

        let deny = gate.evaluate(&request("1.2.3.4", "ua", "https://p.popcash.net/x"));
        assert_eq!(deny, Decision::Deny(DenyReason::BadReferrer));

        let ok = gate.evaluate(&request("1.2.3.4", "ua", "https://notpopcash.net/"));
        assert_eq!(ok, Decision::Allow);

        assert_eq!(sink.kinds().iter().filter(|k| *k == "block_request").count(), 2);
    }

    #[test]
    fn test_referrer_regex() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_referrer_regex = vec!["^ads?[0-9]*\\.".into(), "[invalid".into()];
        let (gate, _) = gate_with(cfg, None);

        let deny = gate.evaluate(&request("1.2.3.4", "ua", "https://ad7.example.com/"));
        assert_eq!(deny, Decision::Deny(DenyReason::BadReferrer));
    }

    #[test]
    fn test_ua_blacklist_case_insensitive() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_ua = vec!["bot".into()];
        let (gate, sink) = gate_with(cfg, None);

        let deny = gate.evaluate(&request("1.2.3.4", "GoogleBOT/2.1", ""));
        assert_eq!(deny, Decision::Deny(DenyReason::SuspiciousUa));

        let event = &sink.events.lock().unwrap()[0];
        assert_eq!(
            event.fields.get("reason"),
            Some(&crate::observability::events::EventValue::from("suspicious_ua"))
        );
    }

    #[test]
    fn test_rate_limit_denies_past_max() {
        let mut cfg = AdmissionConfig::default();
        cfg.rate_limit.max = 2;
        let (gate, _) = gate_with(cfg, None);

        let req = request("9.9.9.9", "ua", "");
        assert_eq!(gate.evaluate(&req), Decision::Allow);
        assert_eq!(gate.evaluate(&req), Decision::Allow);
        assert_eq!(gate.evaluate(&req), Decision::Deny(DenyReason::RateLimitExceeded));
    }

    #[test]
    fn test_ip_prefix_is_literal_not_cidr() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_ip_prefix = vec!["34.".into()];
        let (gate, _) = gate_with(cfg, None);

        let deny = gate.evaluate(&request("34.1.2.3", "ua", ""));
        assert_eq!(deny, Decision::Deny(DenyReason::BlacklistedIpPrefix));

        let ok = gate.evaluate(&request("134.1.2.3", "ua", ""));
        assert_eq!(ok, Decision::Allow);
    }

    #[test]
    fn test_geo_allow_list() {
        let mut cfg = AdmissionConfig::default();
        cfg.allow_countries = vec!["id".into()];

        let (gate, _) = gate_with(cfg.clone(), Some(Arc::new(FakeGeo { code: Some("ID") })));
        assert_eq!(gate.evaluate(&request("1.2.3.4", "ua", "")), Decision::Allow);

        let (gate, _) = gate_with(cfg.clone(), Some(Arc::new(FakeGeo { code: Some("US") })));
        assert_eq!(
            gate.evaluate(&request("1.2.3.4", "ua", "")),
            Decision::Deny(DenyReason::GeoNotAllowed)
        );

        let (gate, _) = gate_with(cfg, Some(Arc::new(FakeGeo { code: None })));
        assert_eq!(
            gate.evaluate(&request("1.2.3.4", "ua", "")),
            Decision::Deny(DenyReason::GeoUnknown)
        );
    }

    #[test]
    fn test_geo_skipped_for_loopback_and_missing_resolver() {
        let mut cfg = AdmissionConfig::default();
        cfg.allow_countries = vec!["ID".into()];

        let (gate, _) = gate_with(cfg.clone(), Some(Arc::new(FakeGeo { code: Some("US") })));
        assert_eq!(gate.evaluate(&request("127.0.0.1", "ua", "")), Decision::Allow);

        let (gate, _) = gate_with(cfg, None);
        assert_eq!(gate.evaluate(&request("1.2.3.4", "ua", "")), Decision::Allow);
    }

    #[test]
    fn test_mobile_only() {
        let mut cfg = AdmissionConfig::default();
        cfg.mobile_only = true;
        let (gate, _) = gate_with(cfg, None);

        assert_eq!(
            gate.evaluate(&request("1.2.3.4", "Mozilla/5.0 (Linux; Android 14)", "")),
            Decision::Allow
        );
        assert_eq!(
            gate.evaluate(&request("1.2.3.5", "Mozilla/5.0 (Windows NT 10.0)", "")),
            Decision::Deny(DenyReason::NonMobileDevice)
        );
    }

    #[test]
    fn test_bypass_key_skips_all_checks() {
        let mut cfg = AdmissionConfig::default();
        cfg.bypass_key = "a9f7x2kq".into();
        cfg.blacklist_ua = vec!["bot".into()];
        cfg.rate_limit.max = 1;
        let (gate, sink) = gate_with(cfg, None);

        let mut req = request("1.2.3.4", "somebot", "");
        req.query.insert("bypass".into(), "a9f7x2kq".into());
        assert_eq!(gate.evaluate(&req), Decision::Allow);
        assert_eq!(gate.evaluate(&req), Decision::Allow);

        let mut req = request("1.2.3.4", "somebot", "");
        req.bypass_header = Some("a9f7x2kq".into());
        assert_eq!(gate.evaluate(&req), Decision::Allow);

        assert_eq!(sink.kinds(), vec!["bypass_request"; 3]);
    }

    #[test]
    fn test_wrong_bypass_key_still_checked() {
        let mut cfg = AdmissionConfig::default();
        cfg.bypass_key = "right".into();
        cfg.blacklist_ua = vec!["bot".into()];
        let (gate, _) = gate_with(cfg, None);

        let mut req = request("1.2.3.4", "somebot", "");
        req.query.insert("bypass".into(), "wrong".into());
        assert_eq!(req.query.len(), 1);
        assert_eq!(gate.evaluate(&req), Decision::Deny(DenyReason::SuspiciousUa));
    }

    #[test]
    fn test_toggle_disables_checks() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_ua = vec!["bot".into()];
        let (gate, _) = gate_with(cfg, None);

        assert!(gate.is_enabled());
        assert!(!gate.toggle());
        assert_eq!(gate.evaluate(&request("1.2.3.4", "somebot", "")), Decision::Allow);

        assert!(gate.toggle());
        assert_eq!(
            gate.evaluate(&request("1.2.3.4", "somebot", "")),
            Decision::Deny(DenyReason::SuspiciousUa)
        );
    }

    #[test]
    fn test_check_order_referrer_before_ua() {
        let mut cfg = AdmissionConfig::default();
        cfg.blacklist_referrer = vec!["popcash.net".into()];
        cfg.blacklist_ua = vec!["bot".into()];
        let (gate, _) = gate_with(cfg, None);

        let deny = gate.evaluate(&request("1.2.3.4", "somebot", "https://popcash.net/"));
        assert_eq!(deny, Decision::Deny(DenyReason::BadReferrer));
    }
}
