//! Live availability handler
//!
//! 直连 Provider 查询（走全局令牌桶），不读轮询索引：操作员点进
//! 详情页时要的是当下的数据，不是上个轮询周期的。

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use provider_client::SkuAvailability;
use serde::{Deserialize, Serialize};
use shared::models::StockStatus;
use tokio_util::sync::CancellationToken;

use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    /// 逗号分隔的配置选项代码，用于筛选具体配置 (FQN)
    #[serde(default)]
    options: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityStatus {
    pub facility_code: String,
    pub status: StockStatus,
    pub raw_status: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub sku_code: String,
    /// 匹配到的配置数（按选项过滤后）
    pub configurations: usize,
    pub facilities: Vec<FacilityStatus>,
    pub checked_at: chrono::DateTime<Utc>,
}

/// GET /api/availability/{sku} - 单 SKU 实时可用性
pub async fn by_sku(
    State(state): State<ServerState>,
    Path(sku): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    let options: Vec<String> = query
        .options
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let listings = state
        .engine
        .sku_availability(&sku, &CancellationToken::new())
        .await?;

    let matched: Vec<&SkuAvailability> = listings
        .iter()
        .filter(|l| listing_matches_options(l, &options))
        .collect();

    // Collapse matched configurations per facility; purchasable wins
    let mut facilities: Vec<FacilityStatus> = Vec::new();
    for listing in &matched {
        for dc in &listing.datacenters {
            let status = StockStatus::from_provider(&dc.availability);
            match facilities.iter_mut().find(|f| f.facility_code == dc.datacenter) {
                Some(existing) => {
                    if status.is_available() && !existing.status.is_available() {
                        existing.status = status;
                        existing.raw_status = dc.availability.clone();
                    }
                }
                None => facilities.push(FacilityStatus {
                    facility_code: dc.datacenter.clone(),
                    status,
                    raw_status: dc.availability.clone(),
                }),
            }
        }
    }
    facilities.sort_by(|a, b| a.facility_code.cmp(&b.facility_code));

    Ok(Json(AvailabilityResponse {
        sku_code: sku,
        configurations: matched.len(),
        facilities,
        checked_at: Utc::now(),
    }))
}

/// Does a configuration listing satisfy every requested option?
///
/// Memory options match on their first two segments (`ram-64g-ecc-2400`
/// and `ram-64g-ecc-2933` both count as `ram-64g`), storage options match
/// by prefix. An option matching neither field fails the listing.
pub fn listing_matches_options(listing: &SkuAvailability, options: &[String]) -> bool {
    options.iter().all(|opt| {
        let memory_hit = listing
            .memory
            .as_deref()
            .is_some_and(|m| two_segments(m) == two_segments(opt));
        let storage_hit = listing
            .storage
            .as_deref()
            .is_some_and(|s| s.starts_with(opt.as_str()) || opt.starts_with(s));
        memory_hit || storage_hit
    })
}

fn two_segments(code: &str) -> String {
    code.split('-').take(2).collect::<Vec<_>>().join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(memory: &str, storage: &str) -> SkuAvailability {
        SkuAvailability {
            plan_code: "25skle01".into(),
            fqn: Some(format!("25skle01.{memory}.{storage}")),
            memory: Some(memory.into()),
            storage: Some(storage.into()),
            datacenters: vec![],
        }
    }

    #[test]
    fn no_options_matches_everything() {
        assert!(listing_matches_options(
            &listing("ram-64g-ecc-2400", "softraid-2x4000sa"),
            &[]
        ));
    }

    #[test]
    fn memory_matches_on_two_segments() {
        let l = listing("ram-64g-ecc-2400", "softraid-2x4000sa");
        assert!(listing_matches_options(&l, &["ram-64g".into()]));
        assert!(listing_matches_options(&l, &["ram-64g-ecc-2933".into()]));
        assert!(!listing_matches_options(&l, &["ram-32g".into()]));
    }

    #[test]
    fn storage_matches_by_prefix() {
        let l = listing("ram-64g-ecc-2400", "softraid-2x4000sa");
        assert!(listing_matches_options(&l, &["softraid-2x4000sa".into()]));
        assert!(!listing_matches_options(&l, &["hybridsoftraid".into()]));
    }

    #[test]
    fn all_options_must_match() {
        let l = listing("ram-64g-ecc-2400", "softraid-2x4000sa");
        assert!(listing_matches_options(
            &l,
            &["ram-64g".into(), "softraid-2x4000sa".into()]
        ));
        assert!(!listing_matches_options(
            &l,
            &["ram-64g".into(), "ssd-2x960nvme".into()]
        ));
    }
}
