//! Geo lookup boundary.
//!
//! # Responsibilities
//! - Resolve a client IP to a country code (admission gate)
//! - Resolve a client IP to a city record (redirect event enrichment)
//!
//! # Design Decisions
//! - Lookups are total: an unavailable table or unparseable IP yields
//!   `None`, never an error
//! - The trait is the seam; the shipped table is in-memory, a MaxMind
//!   reader can implement the same trait without touching callers
//! - In-memory only, no I/O on the request path

use std::net::IpAddr;

use serde::Serialize;

use crate::config::schema::GeoEntryConfig;

/// A resolved city-level record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CityRecord {
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

/// Resolves client IPs to geographic information.
pub trait GeoResolver: Send + Sync {
    /// ISO country code for the IP, or `None` when unknown.
    fn country_code(&self, ip: &str) -> Option<String>;

    /// Full city record for the IP, or `None` when unknown.
    fn city_record(&self, ip: &str) -> Option<CityRecord>;
}

/// Geo resolver backed by a static table of literal IP prefixes.
///
/// Entries are matched longest-prefix-first against the dotted string
/// representation of the client IP.
pub struct StaticGeoTable {
    entries: Vec<(String, CityRecord)>,
}

impl StaticGeoTable {
    /// Build the table from configuration, longest prefixes first.
    pub fn from_config(entries: &[GeoEntryConfig]) -> Self {
        let mut entries: Vec<(String, CityRecord)> = entries
            .iter()
            .filter(|e| !e.ip_prefix.is_empty())
            .map(|e| {
                (
                    e.ip_prefix.clone(),
                    CityRecord {
                        country: e.country.clone(),
                        region: e.region.clone(),
                        city: e.city.clone(),
                        latitude: e.latitude,
                        longitude: e.longitude,
                        timezone: e.timezone.clone(),
                    },
                )
            })
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    fn lookup(&self, ip: &str) -> Option<&CityRecord> {
        // Reject garbage before prefix matching.
        ip.parse::<IpAddr>().ok()?;
        self.entries
            .iter()
            .find(|(prefix, _)| ip.starts_with(prefix.as_str()))
            .map(|(_, record)| record)
    }
}

impl GeoResolver for StaticGeoTable {
    fn country_code(&self, ip: &str) -> Option<String> {
        self.lookup(ip)
            .filter(|r| !r.country.is_empty())
            .map(|r| r.country.clone())
    }

    fn city_record(&self, ip: &str) -> Option<CityRecord> {
        self.lookup(ip).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StaticGeoTable {
        StaticGeoTable::from_config(&[
            GeoEntryConfig {
                ip_prefix: "103.".into(),
                country: "ID".into(),
                city: "Jakarta".into(),
                timezone: "Asia/Jakarta".into(),
                ..Default::default()
            },
            GeoEntryConfig {
                ip_prefix: "103.10.".into(),
                country: "MY".into(),
                ..Default::default()
            },
        ])
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        assert_eq!(table.country_code("103.10.0.1").as_deref(), Some("MY"));
        assert_eq!(table.country_code("103.20.0.1").as_deref(), Some("ID"));
    }

    #[test]
    fn test_unknown_ip_is_none() {
        let table = table();
        assert!(table.country_code("8.8.8.8").is_none());
        assert!(table.city_record("8.8.8.8").is_none());
    }

    #[test]
    fn test_unparseable_ip_is_none() {
        let table = table();
        assert!(table.country_code("103.not-an-ip").is_none());
    }

    #[test]
    fn test_city_record_fields() {
        let record = table().city_record("103.20.0.1").unwrap();
        assert_eq!(record.city, "Jakarta");
        assert_eq!(record.timezone, "Asia/Jakarta");
    }
}
