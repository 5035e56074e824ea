//! Provider wire types
//!
//! Shapes mirror the vendor's responses; unknown fields are ignored on
//! deserialization. Field names follow the vendor's camelCase convention.

use serde::{Deserialize, Serialize};

/// One orderable plan from the public catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPlan {
    pub plan_code: String,
    pub name: String,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub bandwidth: Option<String>,
}

/// Availability of one SKU configuration across facilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuAvailability {
    pub plan_code: String,
    /// Fully-qualified configuration name (plan + memory + storage)
    #[serde(default)]
    pub fqn: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub storage: Option<String>,
    #[serde(default)]
    pub datacenters: Vec<FacilityAvailability>,
}

/// Per-facility raw availability value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityAvailability {
    pub datacenter: String,
    pub availability: String,
}

/// Price lookup result. Prices stay as provider-formatted strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub plan_code: String,
    #[serde(default)]
    pub facility: Option<String>,
    pub monthly_price: String,
    #[serde(default)]
    pub setup_fee: Option<String>,
    pub currency: String,
}

/// Successful checkout receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    pub order_url: String,
}

// ===== Cart flow intermediates (internal to the client) =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartCreated {
    pub cart_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CartItem {
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckoutResult {
    #[serde(default)]
    pub order_id: Option<serde_json::Value>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Error body the provider returns on 4xx
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProviderErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
