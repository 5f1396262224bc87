use serde::{Deserialize, Serialize};

use super::{comma_separated, CodeficatorCategory};

/// One entry of the CATOTTG administrative hierarchy.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Codeficator {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub category: CodeficatorCategory,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeficatorName {
    pub id: i64,
    pub full_name: String,
}

/// A settlement (or city district) with the names of every level above it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeficatorAddress {
    pub id: i64,
    pub category: CodeficatorCategory,
    pub settlement: String,
    pub territorial_community: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub city_district: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip)]
    pub sort_order: i32,
}

impl CodeficatorAddress {
    /// Human readable address, most specific part first.
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(5);
        if let Some(city_district) = &self.city_district {
            parts.push(city_district);
        }
        parts.push(&self.settlement);
        for part in [&self.territorial_community, &self.district, &self.region]
            .into_iter()
            .flatten()
        {
            parts.push(part);
        }
        parts.join(", ")
    }
}

/// An entry together with every level above it, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllAddressParts {
    pub address_parts: Vec<Codeficator>,
    pub full_address: String,
}

impl AllAddressParts {
    pub fn new(address_parts: Vec<Codeficator>) -> Self {
        let full_address = address_parts
            .iter()
            .map(|part| part.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            address_parts,
            full_address,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSearchQuery {
    pub name: String,
    #[serde(default, deserialize_with = "comma_separated")]
    pub categories: Vec<CodeficatorCategory>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenQuery {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestQuery {
    pub lat: f64,
    pub lon: f64,
    pub category: Option<CodeficatorCategory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_lists_parts_from_most_specific() {
        let address = CodeficatorAddress {
            id: 1,
            category: CodeficatorCategory::B,
            settlement: "Київ".to_string(),
            territorial_community: None,
            district: None,
            region: None,
            city_district: Some("Шевченківський".to_string()),
            latitude: 0.0,
            longitude: 0.0,
            sort_order: 0,
        };
        assert_eq!(address.full_name(), "Шевченківський, Київ");

        let village = CodeficatorAddress {
            category: CodeficatorCategory::C,
            settlement: "Бузова".to_string(),
            territorial_community: Some("Дмитрівська".to_string()),
            district: Some("Бучанський".to_string()),
            region: Some("Київська".to_string()),
            city_district: None,
            ..address
        };
        assert_eq!(
            village.full_name(),
            "Бузова, Дмитрівська, Бучанський, Київська"
        );
    }
}
