//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check uniqueness (product ids, network names)
//! - Validate value ranges (limits > 0, weights not negative)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("product `{0}` has a negative percentage")]
    NegativeWeight(String),

    #[error("duplicate product id `{0}`")]
    DuplicateProduct(String),

    #[error("product `{0}` has an empty url")]
    EmptyProductUrl(String),

    #[error("network `{0}` has an empty postback_url")]
    EmptyPostbackUrl(String),

    #[error("duplicate network `{0}`")]
    DuplicateNetwork(String),

    #[error("network with an empty name")]
    EmptyNetworkName,

    #[error("admission.rate_limit.max must be greater than zero")]
    ZeroRateLimitMax,

    #[error("admission.rate_limit.window_secs must be greater than zero")]
    ZeroRateLimitWindow,

    #[error("breaker.max_failures must be greater than zero")]
    ZeroMaxFailures,
}

/// Validate the configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut product_ids = HashSet::new();
    for product in &config.products {
        if product.percentage < 0.0 {
            errors.push(ValidationError::NegativeWeight(product.id.clone()));
        }
        if product.url.is_empty() {
            errors.push(ValidationError::EmptyProductUrl(product.id.clone()));
        }
        if !product_ids.insert(product.id.clone()) {
            errors.push(ValidationError::DuplicateProduct(product.id.clone()));
        }
    }

    let mut network_names = HashSet::new();
    for network in &config.postback.networks {
        if network.name.is_empty() {
            errors.push(ValidationError::EmptyNetworkName);
            continue;
        }
        if network.postback_url.is_empty() {
            errors.push(ValidationError::EmptyPostbackUrl(network.name.clone()));
        }
        if !network_names.insert(network.name.clone()) {
            errors.push(ValidationError::DuplicateNetwork(network.name.clone()));
        }
    }

    if config.admission.rate_limit.max == 0 {
        errors.push(ValidationError::ZeroRateLimitMax);
    }
    if config.admission.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroRateLimitWindow);
    }
    if config.breaker.max_failures == 0 {
        errors.push(ValidationError::ZeroMaxFailures);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{NetworkConfig, ProductConfig};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.admission.rate_limit.max = 0;
        config.breaker.max_failures = 0;
        config.products.push(ProductConfig {
            id: "p1".into(),
            name: "P1".into(),
            url: String::new(),
            percentage: -1.0,
        });

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroRateLimitMax));
        assert!(errors.contains(&ValidationError::ZeroMaxFailures));
        assert!(errors.contains(&ValidationError::NegativeWeight("p1".into())));
        assert!(errors.contains(&ValidationError::EmptyProductUrl("p1".into())));
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let mut config = AppConfig::default();
        for _ in 0..2 {
            config.postback.networks.push(NetworkConfig {
                name: "propeller".into(),
                postback_url: "https://example.com/pb".into(),
                params: Default::default(),
            });
        }
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::DuplicateNetwork("propeller".into())]);
    }
}
