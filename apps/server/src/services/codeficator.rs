//! CATOTTG lookups: hierarchy navigation, address search and nearest settlement.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::db::{CodeficatorRepository, Filter, OrderBy};
use crate::models::{
    AddressSearchQuery, AllAddressParts, Codeficator, CodeficatorAddress, CodeficatorCategory,
    CodeficatorName,
};
use crate::{Error, Result};

const ADDRESS_SEARCH_LIMIT: i64 = 100;
const DESCENDANTS_CACHE_SIZE: usize = 1024;
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Half-widths (degrees) of the boxes tried when looking for the nearest entry.
const NEAREST_SEARCH_BOXES: &[f64] = &[0.1, 0.5, 2.0, 10.0];

pub struct CodeficatorService {
    repo: CodeficatorRepository,
    descendants: Mutex<LruCache<i64, Arc<Vec<i64>>>>,
}

impl CodeficatorService {
    pub fn new(repo: CodeficatorRepository) -> Self {
        let capacity = NonZeroUsize::new(DESCENDANTS_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            repo,
            descendants: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<i64, Arc<Vec<i64>>>> {
        self.descendants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn children_filter(parent_id: Option<i64>) -> Filter {
        match parent_id {
            Some(id) => Filter::eq("ca.parent_id", id),
            None => Filter::in_names("ca.category", CodeficatorCategory::LEVEL1),
        }
    }

    /// Children of `parent_id`, or regions and special-status cities.
    pub async fn get_children_by_parent_id(&self, parent_id: Option<i64>) -> Result<Vec<Codeficator>> {
        let order = OrderBy::new().asc("ca.sort_order").asc("ca.name");
        self.repo
            .get(
                crate::db::Page::unbounded(),
                Self::children_filter(parent_id),
                &order,
            )
            .await
    }

    pub async fn get_children_names(&self, parent_id: Option<i64>) -> Result<Vec<CodeficatorName>> {
        self.repo.names(Self::children_filter(parent_id)).await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Codeficator>> {
        self.repo.get_by_id(id).await
    }

    pub async fn get_all_address_parts(&self, id: i64) -> Result<Option<AllAddressParts>> {
        let chain = self.repo.ancestors(id).await?;
        if chain.is_empty() {
            return Ok(None);
        }
        Ok(Some(AllAddressParts::new(chain)))
    }

    /// Settlements whose name starts with `query.name`, plus districts of
    /// matching cities.
    pub async fn get_full_addresses_by_part_of_name(
        &self,
        query: &AddressSearchQuery,
    ) -> Result<Vec<CodeficatorAddress>> {
        let name = query.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "Name of the settlement must not be empty".to_string(),
            ));
        }

        let requested: Vec<CodeficatorCategory> = if query.categories.is_empty() {
            let mut all = CodeficatorCategory::SETTLEMENTS.to_vec();
            all.push(CodeficatorCategory::B);
            all
        } else {
            query.categories.clone()
        };
        let settlement_categories: Vec<CodeficatorCategory> = requested
            .iter()
            .copied()
            .filter(|c| *c != CodeficatorCategory::B)
            .collect();

        let settlements = if settlement_categories.is_empty() {
            Filter::False
        } else {
            Filter::in_names("e.category", &settlement_categories)
                .and(Filter::starts_with("e.name", name))
        };
        let districts = if requested.contains(&CodeficatorCategory::B) {
            Filter::eq("e.category", CodeficatorCategory::B.as_str())
                .and(Filter::starts_with("m.name", name))
        } else {
            Filter::False
        };

        self.repo
            .addresses(settlements, districts, ADDRESS_SEARCH_LIMIT)
            .await
    }

    /// Closest entry by great-circle distance, optionally of one category.
    pub async fn get_nearest_by_coordinates(
        &self,
        lat: f64,
        lon: f64,
        category: Option<CodeficatorCategory>,
    ) -> Result<Option<Codeficator>> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidArgument(format!(
                "Coordinates out of range: {lat}, {lon}"
            )));
        }
        let categories = match category {
            Some(c) => Filter::eq("ca.category", c.as_str()),
            None => Filter::in_names("ca.category", CodeficatorCategory::SETTLEMENTS),
        };

        for &half_width in NEAREST_SEARCH_BOXES {
            let bbox = Filter::all([
                Filter::gte("ca.latitude", lat - half_width),
                Filter::lte("ca.latitude", lat + half_width),
                Filter::gte("ca.longitude", lon - half_width),
                Filter::lte("ca.longitude", lon + half_width),
            ]);
            let candidates = self.repo.get_by_filter(categories.clone().and(bbox)).await?;
            if let Some(nearest) = nearest(candidates, lat, lon) {
                return Ok(Some(nearest));
            }
        }
        Ok(None)
    }

    /// Ids of `id` and every entry below it. Unknown ids yield an empty list.
    pub async fn all_children_ids(&self, id: i64) -> Result<Arc<Vec<i64>>> {
        if let Some(ids) = self.cache().get(&id) {
            return Ok(ids.clone());
        }
        let ids = Arc::new(self.repo.descendant_ids(id).await?);
        self.cache().put(id, ids.clone());
        Ok(ids)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

fn nearest(candidates: Vec<Codeficator>, lat: f64, lon: f64) -> Option<Codeficator> {
    candidates.into_iter().min_by(|a, b| {
        let da = haversine_km(lat, lon, a.latitude, a.longitude);
        let db = haversine_km(lat, lon, b.latitude, b.longitude);
        da.total_cmp(&db)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, name: &str, latitude: f64, longitude: f64) -> Codeficator {
        Codeficator {
            id,
            parent_id: None,
            category: CodeficatorCategory::M,
            name: name.to_string(),
            latitude,
            longitude,
            sort_order: 0,
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Kyiv to Lviv is roughly 468 km.
        let d = haversine_km(50.4501, 30.5234, 49.8397, 24.0297);
        assert!((d - 468.0).abs() < 5.0, "distance was {d}");
        assert_eq!(haversine_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn nearest_picks_smallest_great_circle_distance() {
        let candidates = vec![
            entry(1, "Far", 51.0, 31.0),
            entry(2, "Near", 50.46, 30.52),
            entry(3, "Middle", 50.6, 30.6),
        ];
        assert_eq!(nearest(candidates, 50.45, 30.52).map(|c| c.id), Some(2));
        assert_eq!(nearest(Vec::new(), 0.0, 0.0), None);
    }
}
