//! HTTP provider client
//!
//! 签名 HTTP 客户端。订单流程（购物车 → 商品 → 配置 → 选项 → 结账）被
//! 折叠为一次 [`ProviderApi::place_order`] 调用。

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::signing;
use crate::types::{
    CartCreated, CartItem, CatalogPlan, CheckoutResult, OrderReceipt, PriceQuote,
    ProviderErrorBody, SkuAvailability,
};
use crate::ProviderApi;

/// Facility prefixes grouped by ordering region
const EU_FACILITIES: &[&str] = &["gra", "rbx", "sbg", "eri", "lim", "waw", "par", "fra", "lon"];
const CA_FACILITIES: &[&str] = &["bhs"];
const US_FACILITIES: &[&str] = &["vin", "hil"];
const APAC_FACILITIES: &[&str] = &["syd", "sgp"];

/// Infer the ordering region configuration value from a facility code
pub fn facility_region(facility: &str) -> Option<&'static str> {
    let f = facility.to_ascii_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| f.starts_with(p));
    if starts(EU_FACILITIES) {
        Some("europe")
    } else if starts(CA_FACILITIES) {
        Some("canada")
    } else if starts(US_FACILITIES) {
        Some("usa")
    } else if starts(APAC_FACILITIES) {
        Some("apac")
    } else {
        None
    }
}

/// Option codes that are licenses/OS add-ons, never hardware. Excluded
/// from cart option items.
fn is_hardware_option(code: &str) -> bool {
    let c = code.to_ascii_lowercase();
    const SKIP: &[&str] = &[
        "windows-server",
        "sql-server",
        "cpanel-license",
        "plesk-",
        "-license-",
        "os-",
        "control-panel",
        "panel",
        "license",
        "security",
    ];
    !SKIP.iter().any(|s| c.contains(s))
}

/// Signed HTTP client for the vendor REST API
pub struct HttpProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpProviderClient {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Send a signed request and decode the JSON response
    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ProviderResult<T> {
        let url = self.url(path);
        let body_str = match body {
            Some(b) => serde_json::to_string(b)
                .map_err(|e| ProviderError::Decode(e.to_string()))?,
            None => String::new(),
        };
        let timestamp = chrono::Utc::now().timestamp();
        let signature = signing::sign(
            &self.config.app_secret,
            &self.config.consumer_key,
            method.as_str(),
            &url,
            &body_str,
            timestamp,
        );

        let mut req = self
            .http
            .request(method, &url)
            .header("X-App-Key", &self.config.app_key)
            .header("X-Consumer-Key", &self.config.consumer_key)
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature);
        if !body_str.is_empty() {
            req = req
                .header("Content-Type", "application/json")
                .body(body_str);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| ProviderError::Decode(e.to_string()));
        }
        Err(Self::classify_failure(status, resp).await)
    }

    /// Map a non-2xx response to the error taxonomy
    async fn classify_failure(status: StatusCode, resp: reqwest::Response) -> ProviderError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return ProviderError::Throttled { retry_after_secs };
        }
        if status.is_server_error() {
            return ProviderError::Server(status.as_u16());
        }
        // 4xx: try to extract the provider's error code/message
        let body: ProviderErrorBody = resp.json().await.unwrap_or(ProviderErrorBody {
            error_code: None,
            message: None,
        });
        ProviderError::Rejected {
            status: status.as_u16(),
            code: body.error_code.unwrap_or_else(|| status.as_u16().to_string()),
            message: body.message.unwrap_or_else(|| "request rejected".into()),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        self.call::<(), T>(Method::GET, path, None).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ProviderResult<T> {
        self.call(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl ProviderApi for HttpProviderClient {
    async fn list_catalog(&self) -> ProviderResult<Vec<CatalogPlan>> {
        self.get("/dedicated/server/catalog").await
    }

    async fn availabilities(&self, sku: Option<&str>) -> ProviderResult<Vec<SkuAvailability>> {
        let path = match sku {
            Some(code) => format!(
                "/dedicated/server/availabilities?planCode={}",
                urlencode(code)
            ),
            None => "/dedicated/server/availabilities".to_string(),
        };
        self.get(&path).await
    }

    async fn price(
        &self,
        sku: &str,
        facility: &str,
        options: &[String],
    ) -> ProviderResult<PriceQuote> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PriceRequest<'a> {
            facility: &'a str,
            options: &'a [String],
        }
        self.post(
            &format!("/dedicated/server/{}/price", urlencode(sku)),
            &PriceRequest { facility, options },
        )
        .await
    }

    /// Full order flow. Any step failing aborts the cart; the provider
    /// garbage-collects unassigned carts, so no cleanup call is made.
    async fn place_order(
        &self,
        sku: &str,
        facility: &str,
        options: &[String],
    ) -> ProviderResult<OrderReceipt> {
        // 1. Create cart
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CartRequest<'a> {
            subsidiary: &'a str,
        }
        let cart: CartCreated = self
            .post(
                "/order/cart",
                &CartRequest {
                    subsidiary: self.config.region.subsidiary(),
                },
            )
            .await?;
        tracing::debug!(cart_id = %cart.cart_id, sku, facility, "Cart created");

        // 2. Add the base item
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ItemRequest<'a> {
            plan_code: &'a str,
            pricing_mode: &'a str,
            duration: &'a str,
            quantity: u32,
        }
        let item: CartItem = self
            .post(
                &format!("/order/cart/{}/item", cart.cart_id),
                &ItemRequest {
                    plan_code: sku,
                    pricing_mode: "default",
                    duration: "P1M",
                    quantity: 1,
                },
            )
            .await?;

        // 3. Required configuration: facility, OS, region
        #[derive(Serialize)]
        struct ConfigRequest<'a> {
            label: &'a str,
            value: &'a str,
        }
        let config_path = format!(
            "/order/cart/{}/item/{}/configuration",
            cart.cart_id, item.item_id
        );
        let mut configurations = vec![("dedicated_datacenter", facility), ("dedicated_os", "none_64.en")];
        if let Some(region) = facility_region(facility) {
            configurations.push(("region", region));
        } else {
            tracing::warn!(facility, "Cannot infer ordering region for facility");
        }
        for (label, value) in configurations {
            let _: serde_json::Value = self
                .post(&config_path, &ConfigRequest { label, value })
                .await?;
        }

        // 4. Hardware option items (licenses/OS add-ons are skipped)
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct OptionRequest<'a> {
            item_id: i64,
            plan_code: &'a str,
            duration: &'a str,
            pricing_mode: &'a str,
            quantity: u32,
        }
        for option in options.iter().filter(|o| is_hardware_option(o)) {
            let result: ProviderResult<serde_json::Value> = self
                .post(
                    &format!("/order/cart/{}/option", cart.cart_id),
                    &OptionRequest {
                        item_id: item.item_id,
                        plan_code: option,
                        duration: "P1M",
                        pricing_mode: "default",
                        quantity: 1,
                    },
                )
                .await;
            // A missing option must not lose the stock window; the base
            // server is still worth ordering.
            if let Err(e) = result {
                if e.is_retryable() {
                    return Err(e);
                }
                tracing::warn!(option = %option, error = %e, "Option not added, continuing order");
            }
        }

        // 5. Assign cart, then checkout
        let _: serde_json::Value = self
            .post(
                &format!("/order/cart/{}/assign", cart.cart_id),
                &serde_json::json!({}),
            )
            .await?;

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CheckoutRequest {
            auto_pay_with_preferred_payment_method: bool,
            waive_retractation_period: bool,
        }
        let checkout: CheckoutResult = self
            .post(
                &format!("/order/cart/{}/checkout", cart.cart_id),
                &CheckoutRequest {
                    auto_pay_with_preferred_payment_method: false,
                    waive_retractation_period: true,
                },
            )
            .await?;

        let order_id = checkout
            .order_id
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_default();
        Ok(OrderReceipt {
            order_id,
            order_url: checkout.url.unwrap_or_default(),
        })
    }
}

/// Minimal percent-encoding for path/query segments (SKU codes are
/// alphanumeric plus `-`/`.`, so this only has to be safe, not complete)
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
