//! Merchant Directory: who carries a product, at what price, how far away.

use std::sync::Arc;

use async_trait::async_trait;
use common::MerchantId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::money::Money;
use crate::order::ProductId;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Merchant directory unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid merchant directory seed: {0}")]
    InvalidSeed(String),
}

/// A merchant able to supply a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCandidate {
    pub merchant_id: MerchantId,
    #[serde(rename = "effective_price_cents")]
    pub effective_price: Money,
    pub distance_km: Decimal,
    pub available_stock: u32,
}

/// External lookup of candidate merchants.
#[async_trait]
pub trait MerchantDirectory: Send + Sync {
    /// Merchants carrying `product_id`, optionally narrowed to a service
    /// area. Eligibility (stock, distance, exclusions) is decided by the
    /// caller.
    async fn candidates(
        &self,
        product_id: &ProductId,
        area: Option<&str>,
    ) -> Result<Vec<MerchantCandidate>, DirectoryError>;
}

/// One seeded directory row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub product_id: ProductId,
    /// None serves every area.
    #[serde(default)]
    pub area: Option<String>,
    #[serde(flatten)]
    pub candidate: MerchantCandidate,
}

impl DirectoryListing {
    fn serves(&self, product_id: &ProductId, area: Option<&str>) -> bool {
        if &self.product_id != product_id {
            return false;
        }
        match (self.area.as_deref(), area) {
            (Some(listed), Some(wanted)) => listed.eq_ignore_ascii_case(wanted),
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    listings: Vec<DirectoryListing>,
    fail: bool,
}

/// Directory held in process memory, for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMerchantDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryMerchantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads listings from a JSON array of [`DirectoryListing`].
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let listings: Vec<DirectoryListing> =
            serde_json::from_str(json).map_err(|e| DirectoryError::InvalidSeed(e.to_string()))?;
        Ok(Self {
            state: Arc::new(RwLock::new(DirectoryState {
                listings,
                fail: false,
            })),
        })
    }

    pub async fn insert(&self, listing: DirectoryListing) {
        self.state.write().await.listings.push(listing);
    }

    pub async fn add(
        &self,
        product_id: impl Into<ProductId>,
        area: Option<&str>,
        candidate: MerchantCandidate,
    ) {
        self.insert(DirectoryListing {
            product_id: product_id.into(),
            area: area.map(str::to_string),
            candidate,
        })
        .await;
    }

    /// Makes every following lookup fail (or succeed again).
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }
}

#[async_trait]
impl MerchantDirectory for InMemoryMerchantDirectory {
    async fn candidates(
        &self,
        product_id: &ProductId,
        area: Option<&str>,
    ) -> Result<Vec<MerchantCandidate>, DirectoryError> {
        let state = self.state.read().await;

        if state.fail {
            return Err(DirectoryError::Unavailable(
                "directory backend unreachable".to_string(),
            ));
        }

        Ok(state
            .listings
            .iter()
            .filter(|listing| listing.serves(product_id, area))
            .map(|listing| listing.candidate.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"[
        {"product_id": "p-1", "area": "north", "merchant_id": "m-1",
         "effective_price_cents": 1000, "distance_km": "2.5", "available_stock": 4},
        {"product_id": "p-1", "merchant_id": "m-2",
         "effective_price_cents": 950, "distance_km": 12, "available_stock": 1},
        {"product_id": "p-2", "area": "south", "merchant_id": "m-3",
         "effective_price_cents": 500, "distance_km": "1", "available_stock": 9}
    ]"#;

    #[tokio::test]
    async fn seeded_lookup_by_product_and_area() {
        let directory = InMemoryMerchantDirectory::from_json(SEED).unwrap();

        let north = directory
            .candidates(&ProductId::new("p-1"), Some("NORTH"))
            .await
            .unwrap();
        assert_eq!(north.len(), 2);
        assert_eq!(north[0].distance_km, Decimal::new(25, 1));

        let south = directory
            .candidates(&ProductId::new("p-1"), Some("south"))
            .await
            .unwrap();
        assert_eq!(south.len(), 1);
        assert_eq!(south[0].merchant_id, MerchantId::new("m-2"));

        let anywhere = directory
            .candidates(&ProductId::new("p-2"), None)
            .await
            .unwrap();
        assert_eq!(anywhere.len(), 1);
    }

    #[tokio::test]
    async fn unknown_product_has_no_candidates() {
        let directory = InMemoryMerchantDirectory::from_json(SEED).unwrap();
        let none = directory
            .candidates(&ProductId::new("p-404"), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn failing_directory_reports_unavailable() {
        let directory = InMemoryMerchantDirectory::new();
        directory.set_fail(true).await;

        let result = directory.candidates(&ProductId::new("p-1"), None).await;
        assert!(matches!(result, Err(DirectoryError::Unavailable(_))));
    }

    #[tokio::test]
    async fn panicking_writer_does_not_drop_later_listings() {
        let directory = InMemoryMerchantDirectory::new();
        let state = Arc::clone(&directory.state);
        let crashed = tokio::spawn(async move {
            let _guard = state.write().await;
            panic!("writer crashed while holding the lock");
        })
        .await;
        assert!(crashed.is_err());

        directory
            .add(
                "p-1",
                None,
                MerchantCandidate {
                    merchant_id: MerchantId::new("m-1"),
                    effective_price: Money::from_minor(100),
                    distance_km: Decimal::ONE,
                    available_stock: 1,
                },
            )
            .await;
        directory.set_fail(true).await;
        directory.set_fail(false).await;

        let found = directory
            .candidates(&ProductId::new("p-1"), None)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn malformed_seed_is_rejected() {
        let result = InMemoryMerchantDirectory::from_json(r#"[{"product_id": "p-1"}]"#);
        assert!(matches!(result, Err(DirectoryError::InvalidSeed(_))));
    }
}
