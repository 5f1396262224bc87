use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::{SearchIndex, WorkshopDocument};
use crate::config::SearchConfig;
use crate::{Error, Result};

/// Elasticsearch index reached over its REST API.
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
    credentials: Option<(String, Option<String>)>,
}

impl ElasticsearchIndex {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build search client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    fn post(&self, action: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}/{action}",
            self.base_url,
            urlencoding::encode(&self.index)
        );
        let request = self.client.post(url);
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(Error::ExternalService(format!(
                "Search index {action} failed with {status}: {body}"
            )));
        }
        Ok(body)
    }
}

/// NDJSON body of a `_bulk` request indexing every document by id.
pub(crate) fn bulk_body(documents: &[WorkshopDocument]) -> Result<String> {
    let mut body = String::new();
    for document in documents {
        let action = json!({ "index": { "_id": document.id } });
        let source = serde_json::to_string(document)
            .map_err(|e| Error::Internal(format!("Failed to encode search document: {e}")))?;
        body.push_str(&action.to_string());
        body.push('\n');
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// First item-level failure reported in a `_bulk` response.
fn bulk_error(response: &Value) -> Option<String> {
    if !response["errors"].as_bool().unwrap_or(false) {
        return None;
    }
    let items = response["items"].as_array()?;
    items
        .iter()
        .filter_map(|item| item.as_object()?.values().next())
        .find_map(|result| {
            let error = result.get("error")?;
            Some(format!(
                "{}: {}",
                result["_id"].as_str().unwrap_or("?"),
                error["reason"].as_str().unwrap_or("unknown error")
            ))
        })
        .or_else(|| Some("bulk request reported errors".to_string()))
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn index_all(&self, documents: &[WorkshopDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let body = bulk_body(documents)?;
        let request = self
            .post("_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body);
        let response = self.send(request, "bulk index").await?;
        if let Some(error) = bulk_error(&response) {
            return Err(Error::ExternalService(format!(
                "Search index rejected documents: {error}"
            )));
        }
        tracing::debug!(count = documents.len(), index = %self.index, "Indexed workshops");
        Ok(())
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let request = self
            .post("_delete_by_query")
            .json(&json!({ "query": { "ids": { "values": ids } } }));
        let response = self.send(request, "delete").await?;
        tracing::debug!(
            requested = ids.len(),
            deleted = response["deleted"].as_u64().unwrap_or(0),
            index = %self.index,
            "Deleted workshops from index"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkshopStatus;
    use crate::search::GeoPoint;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn document(title: &str) -> WorkshopDocument {
        WorkshopDocument {
            id: Uuid::new_v4(),
            title: title.to_string(),
            short_title: None,
            provider_id: Uuid::new_v4(),
            provider_title: "Art school".to_string(),
            provider_ownership: "Private".to_string(),
            price: Decimal::new(15000, 2),
            is_free: false,
            min_age: 6,
            max_age: 12,
            available_seats: Some(10),
            taken_seats: 2,
            competitive_selection: false,
            city: "Kyiv".to_string(),
            street: "Khreshchatyk".to_string(),
            building_number: "1".to_string(),
            catottg_id: 31737,
            location: GeoPoint {
                lat: 50.45,
                lon: 30.52,
            },
            status: WorkshopStatus::Open,
            is_blocked: false,
            institution_id: None,
            created_time: Utc::now(),
        }
    }

    #[test]
    fn bulk_body_pairs_action_and_source_lines() {
        let docs = vec![document("Painting"), document("Chess")];
        let body = bulk_body(&docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_id"], docs[0].id.to_string());
        let source: Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(source["title"], "Chess");
        assert_eq!(source["location"]["lat"], 50.45);
    }

    #[test]
    fn bulk_errors_surface_first_reason() {
        let ok = json!({ "errors": false, "items": [] });
        assert_eq!(bulk_error(&ok), None);

        let failed = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400,
                             "error": { "reason": "mapper_parsing_exception" } } }
            ]
        });
        assert_eq!(
            bulk_error(&failed).as_deref(),
            Some("b: mapper_parsing_exception")
        );
    }
}
