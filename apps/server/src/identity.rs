//! Client for the external identity server that owns admin accounts.
//!
//! Admin create/update/delete/block requests are forwarded with the caller's
//! bearer token. The server answers every call with the same envelope
//! ([`IdentityResponse`]); a non-successful envelope is an expected outcome and
//! is turned into a typed error by the admin service, while transport failures
//! surface as [`Error::ExternalService`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::IdentityConfig;
use crate::models::{AdminInput, AdminKind};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityResponse {
    pub is_success: bool,
    pub http_status_code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl IdentityResponse {
    pub fn success(result: Option<serde_json::Value>) -> Self {
        Self {
            is_success: true,
            http_status_code: 200,
            message: None,
            result,
        }
    }

    /// User id assigned by the identity server on create.
    pub fn created_user_id(&self) -> Option<String> {
        let result = self.result.as_ref()?;
        result
            .get("userId")
            .or_else(|| result.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn create_admin(
        &self,
        kind: AdminKind,
        input: &AdminInput,
        token: &str,
    ) -> Result<IdentityResponse>;

    async fn update_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        input: &AdminInput,
        token: &str,
    ) -> Result<IdentityResponse>;

    async fn delete_admin(&self, kind: AdminKind, user_id: &str, token: &str)
        -> Result<IdentityResponse>;

    async fn block_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        is_blocked: bool,
        token: &str,
    ) -> Result<IdentityResponse>;
}

pub struct HttpIdentityClient {
    client: reqwest::Client,
    authority: String,
}

impl HttpIdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build identity client: {e}")))?;
        Ok(Self {
            client,
            authority: config.authority.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, kind: AdminKind, action: &str) -> String {
        format!(
            "{}/api/v1/{}/{action}",
            self.authority,
            kind.identity_segment()
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder, token: &str) -> Result<IdentityResponse> {
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        match response.json::<IdentityResponse>().await {
            Ok(envelope) => Ok(envelope),
            // Some failures come back without the envelope.
            Err(_) if !status.is_success() => Ok(IdentityResponse {
                is_success: false,
                http_status_code: status.as_u16(),
                message: status.canonical_reason().map(str::to_string),
                result: None,
            }),
            Err(e) => Err(Error::ExternalService(format!(
                "Identity server returned an unreadable response: {e}"
            ))),
        }
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn create_admin(
        &self,
        kind: AdminKind,
        input: &AdminInput,
        token: &str,
    ) -> Result<IdentityResponse> {
        tracing::debug!(?kind, email = %input.email, "Creating admin on identity server");
        let request = self.client.post(self.url(kind, "create")).json(input);
        self.send(request, token).await
    }

    async fn update_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        input: &AdminInput,
        token: &str,
    ) -> Result<IdentityResponse> {
        let url = self.url(kind, &format!("update/{}", urlencoding::encode(user_id)));
        self.send(self.client.put(url).json(input), token).await
    }

    async fn delete_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        token: &str,
    ) -> Result<IdentityResponse> {
        let url = self.url(kind, &format!("delete/{}", urlencoding::encode(user_id)));
        self.send(self.client.delete(url), token).await
    }

    async fn block_admin(
        &self,
        kind: AdminKind,
        user_id: &str,
        is_blocked: bool,
        token: &str,
    ) -> Result<IdentityResponse> {
        let url = self.url(
            kind,
            &format!(
                "block/{}?isBlocked={is_blocked}",
                urlencoding::encode(user_id)
            ),
        );
        self.send(self.client.put(url), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_camel_case() {
        let response: IdentityResponse = serde_json::from_value(serde_json::json!({
            "isSuccess": false,
            "httpStatusCode": 400,
            "message": "Email already taken"
        }))
        .unwrap();
        assert!(!response.is_success);
        assert_eq!(response.http_status_code, 400);
        assert_eq!(response.created_user_id(), None);
    }

    #[test]
    fn created_user_id_reads_result() {
        let response =
            IdentityResponse::success(Some(serde_json::json!({ "userId": "abc-123" })));
        assert_eq!(response.created_user_id().as_deref(), Some("abc-123"));
    }

    #[test]
    fn urls_follow_admin_kind_segments() {
        let client = HttpIdentityClient::new(&IdentityConfig {
            authority: "http://identity:5443/".to_string(),
            request_timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(
            client.url(AdminKind::Region, "create"),
            "http://identity:5443/api/v1/regionadmin/create"
        );
    }
}
