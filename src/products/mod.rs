//! Redirect destination catalog.
//!
//! # Responsibilities
//! - Hold the configured products (landing pages) and their weights
//! - Pick a destination per click, honoring an explicit override
//!
//! # Design Decisions
//! - Weighted selection over raw percentages; weights need not sum
//!   to 100, they are treated as relative shares
//! - A non-positive total weight degrades to "always the first
//!   product" rather than an error

use rand::Rng;

use crate::config::schema::ProductConfig;

/// The configured set of redirect destinations.
pub struct ProductCatalog {
    products: Vec<ProductConfig>,
}

impl ProductCatalog {
    pub fn new(products: Vec<ProductConfig>) -> Self {
        Self { products }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Lookup by the `product` query param override.
    pub fn by_id(&self, id: &str) -> Option<&ProductConfig> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Weighted random pick across all products.
    pub fn pick(&self) -> Option<&ProductConfig> {
        if self.products.is_empty() {
            return None;
        }
        let total: f64 = self.products.iter().map(|p| p.percentage.max(0.0)).sum();
        if total <= 0.0 {
            return self.products.first();
        }

        let mut roll = rand::thread_rng().gen_range(0.0..total);
        for product in &self.products {
            let weight = product.percentage.max(0.0);
            if roll < weight {
                return Some(product);
            }
            roll -= weight;
        }
        // Float rounding can leave a sliver past the last weight.
        self.products.last()
    }
}
