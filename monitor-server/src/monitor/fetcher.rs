//! Snapshot fetcher
//!
//! Pulls the full availability listing from the provider and flattens it
//! into the index's (SKU, facility) map. One provider configuration (FQN)
//! can repeat a plan code; the flattened key keeps the plan code since
//! that is what subscriptions and tasks address.

use super::index::Snapshot;
use chrono::Utc;
use provider_client::{ProviderApi, ProviderResult, SkuAvailability};
use shared::models::{AvailabilityRecord, StockStatus};

pub async fn fetch_snapshot(provider: &dyn ProviderApi) -> ProviderResult<Snapshot> {
    let listings = provider.availabilities(None).await?;
    Ok(build_snapshot(listings))
}

pub fn build_snapshot(listings: Vec<SkuAvailability>) -> Snapshot {
    let observed_at = Utc::now();
    let mut snapshot = Snapshot::new();
    for listing in listings {
        for dc in listing.datacenters {
            let status = StockStatus::from_provider(&dc.availability);
            let key = (listing.plan_code.clone(), dc.datacenter.clone());
            let record = AvailabilityRecord {
                sku_code: listing.plan_code.clone(),
                facility_code: dc.datacenter,
                status,
                raw_status: dc.availability,
                observed_at,
            };
            // Several configurations of one plan can report the same
            // facility; any purchasable configuration wins.
            match snapshot.get(&key) {
                Some(existing) if existing.status.is_available() => {}
                _ => {
                    snapshot.insert(key, record);
                }
            }
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_client::FacilityAvailability;

    fn listing(plan: &str, pairs: &[(&str, &str)]) -> SkuAvailability {
        SkuAvailability {
            plan_code: plan.into(),
            fqn: None,
            memory: None,
            storage: None,
            datacenters: pairs
                .iter()
                .map(|(dc, avail)| FacilityAvailability {
                    datacenter: dc.to_string(),
                    availability: avail.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn flattens_listings_per_facility() {
        let snap = build_snapshot(vec![listing(
            "25skle01",
            &[("gra", "available"), ("rbx", "unavailable")],
        )]);
        assert_eq!(snap.len(), 2);
        let gra = &snap[&("25skle01".to_string(), "gra".to_string())];
        assert_eq!(gra.status, StockStatus::Available);
        assert_eq!(gra.raw_status, "available");
    }

    #[test]
    fn purchasable_configuration_wins_duplicate_key() {
        let snap = build_snapshot(vec![
            listing("25skle01", &[("gra", "unavailable")]),
            listing("25skle01", &[("gra", "1H-low")]),
            listing("25skle01", &[("gra", "unavailable")]),
        ]);
        assert_eq!(snap.len(), 1);
        let gra = &snap[&("25skle01".to_string(), "gra".to_string())];
        assert!(gra.status.is_available());
    }
}
