//! Provider client configuration

/// API region, selects the provider endpoint the credentials belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// Europe (default)
    #[default]
    Eu,
    /// Canada
    Ca,
    /// United States
    Us,
}

impl Region {
    /// Parse the `PROVIDER_REGION` env value; unknown values fall back to EU
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "ca" | "canada" => Region::Ca,
            "us" | "usa" => Region::Us,
            _ => Region::Eu,
        }
    }

    /// Default API base URL for this region
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Eu => "https://eu.api.dedicated-catalog.net/v1",
            Region::Ca => "https://ca.api.dedicated-catalog.net/v1",
            Region::Us => "https://us.api.dedicated-catalog.net/v1",
        }
    }

    /// Ordering subsidiary sent when creating a cart
    pub fn subsidiary(&self) -> &'static str {
        match self {
            Region::Eu => "IE",
            Region::Ca => "CA",
            Region::Us => "US",
        }
    }
}

/// Credentials and endpoint selection for the provider API
///
/// Treated as opaque by the engine: no validation beyond presence.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub region: Region,
    /// Explicit base URL; overrides the region default when set
    pub endpoint: Option<String>,
    pub app_key: String,
    pub app_secret: String,
    pub consumer_key: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl ProviderConfig {
    pub fn base_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.region.base_url())
    }

    /// True when all three credentials are present
    pub fn is_configured(&self) -> bool {
        !self.app_key.is_empty() && !self.app_secret.is_empty() && !self.consumer_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_overrides_region() {
        let cfg = ProviderConfig {
            region: Region::Eu,
            endpoint: Some("http://localhost:9999/v1".into()),
            app_key: String::new(),
            app_secret: String::new(),
            consumer_key: String::new(),
            request_timeout_ms: 30_000,
        };
        assert_eq!(cfg.base_url(), "http://localhost:9999/v1");
    }

    #[test]
    fn region_parse_is_lossy() {
        assert_eq!(Region::from_str_lossy("ca"), Region::Ca);
        assert_eq!(Region::from_str_lossy("USA"), Region::Us);
        assert_eq!(Region::from_str_lossy("mars"), Region::Eu);
    }
}
