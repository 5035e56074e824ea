//! Provider API client
//!
//! Typed async client for the hardware vendor's REST API: catalog listing,
//! per-SKU availability, price lookup and the cart/checkout order flow.
//!
//! The [`ProviderApi`] trait is the seam between the engine and the wire:
//! production code uses [`HttpProviderClient`], tests substitute fakes.

pub mod client;
pub mod config;
pub mod error;
pub mod signing;
pub mod types;

pub use client::HttpProviderClient;
pub use config::{ProviderConfig, Region};
pub use error::{ProviderError, ProviderResult};
pub use types::{
    CatalogPlan, FacilityAvailability, OrderReceipt, PriceQuote, SkuAvailability,
};

use async_trait::async_trait;

/// Vendor API surface consumed by the monitoring engine
///
/// One implementation per transport; all methods are rate-limited by the
/// caller, not here.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Full public catalog of orderable SKUs
    async fn list_catalog(&self) -> ProviderResult<Vec<CatalogPlan>>;

    /// Availability listing; `sku = None` returns every SKU/facility pair
    async fn availabilities(&self, sku: Option<&str>) -> ProviderResult<Vec<SkuAvailability>>;

    /// Price lookup for one SKU/facility/option-set
    async fn price(
        &self,
        sku: &str,
        facility: &str,
        options: &[String],
    ) -> ProviderResult<PriceQuote>;

    /// Place an order: cart → item → configuration → options → checkout
    async fn place_order(
        &self,
        sku: &str,
        facility: &str,
        options: &[String],
    ) -> ProviderResult<OrderReceipt>;
}
