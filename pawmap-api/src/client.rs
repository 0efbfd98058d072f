//! Backend REST client
//!
//! [`ApiClient`] is the seam the sync core fetches through; [`HttpApiClient`]
//! is the `reqwest` implementation talking to the real backend.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::envelope::{ApiEnvelope, MutationAck, Page};
use crate::error::{ApiError, Result};
use crate::geo::{Position, SearchRadius};
use crate::models::{decode_entity, Entity, EntityCategory, EntityId};

/// Protection / adoption application workflow actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationAction {
    /// Owner accepts a protection request
    Accept { protection_id: i64 },
    /// Owner rejects a protection request
    Reject { protection_id: i64 },
    /// Applicant withdraws a pending request
    Cancel { protection_id: i64 },
    /// Apply to protect or adopt an animal
    Apply {
        target: ApplyTarget,
        message: Option<String>,
    },
}

/// What an application targets; facilities cannot be applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyTarget {
    Pet(EntityId),
    ShelterAnimal(EntityId),
}

#[derive(Debug, Serialize)]
struct ApplyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Client for the pet rescue backend
#[async_trait]
pub trait ApiClient: Debug + Send + Sync {
    /// Entities of `category` around `center` within `radius`
    async fn fetch_map(
        &self,
        category: EntityCategory,
        center: Position,
        radius: SearchRadius,
    ) -> Result<Vec<Entity>>;

    /// One page of the non-map list view
    async fn fetch_page(&self, category: EntityCategory, page: u32, size: u32)
        -> Result<Page<Entity>>;

    /// Run an application workflow action
    async fn apply_action(&self, action: &ApplicationAction) -> Result<MutationAck>;
}

/// HTTP-based client
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    base_url: String,
    http: reqwest::Client,
    auth_token: Option<String>,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_http_client(base_url, auth_token, http))
    }

    pub fn with_http_client(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        http: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http,
            auth_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.auth_token {
            req.bearer_auth(token)
        } else {
            req
        }
    }

    fn action_request(&self, action: &ApplicationAction) -> reqwest::RequestBuilder {
        let base = &self.base_url;
        match action {
            ApplicationAction::Accept { protection_id } => self
                .http
                .patch(format!("{base}/api/v1/protections/{protection_id}/accept")),
            ApplicationAction::Reject { protection_id } => self
                .http
                .patch(format!("{base}/api/v1/protections/{protection_id}/reject")),
            ApplicationAction::Cancel { protection_id } => self
                .http
                .patch(format!("{base}/api/v1/protections/{protection_id}/cancel")),
            ApplicationAction::Apply { target, message } => {
                let url = match target {
                    ApplyTarget::Pet(id) => format!("{base}/api/v1/pets/{id}/apply"),
                    ApplyTarget::ShelterAnimal(id) => format!("{base}/api/v1/shelters/{id}/apply"),
                };
                self.http.post(url).json(&ApplyRequest {
                    message: message.as_deref(),
                })
            }
        }
    }

    /// Send, check the HTTP status and parse the body as JSON
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T> {
        let resp = self.add_auth(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status));
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn fetch_map(
        &self,
        category: EntityCategory,
        center: Position,
        radius: SearchRadius,
    ) -> Result<Vec<Entity>> {
        let url = format!("{}/api/v1/{}/map", self.base_url, category.path());
        tracing::debug!(
            %url,
            latitude = center.latitude(),
            longitude = center.longitude(),
            radius_km = radius.km(),
            "Fetching map entities"
        );

        let req = self.http.get(&url).query(&[
            ("latitude", center.latitude().to_string()),
            ("longitude", center.longitude().to_string()),
            ("radius", radius.km().to_string()),
        ]);

        // One bad record should not blank the whole map
        let envelope: ApiEnvelope<Vec<serde_json::Value>> = self.send_json(req).await?;
        let entities = envelope
            .into_data()?
            .into_iter()
            .filter_map(|value| match decode_entity(category, value) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(error = %e, %category, "Skipping undecodable map record");
                    None
                }
            })
            .collect();
        Ok(entities)
    }

    async fn fetch_page(
        &self,
        category: EntityCategory,
        page: u32,
        size: u32,
    ) -> Result<Page<Entity>> {
        let url = format!("{}/api/v1/{}", self.base_url, category.path());
        tracing::debug!(%url, page, size, "Fetching list page");

        let req = self
            .http
            .get(&url)
            .query(&[("page", page.to_string()), ("size", size.to_string())]);

        let envelope: ApiEnvelope<Page<serde_json::Value>> = self.send_json(req).await?;
        envelope
            .into_data()?
            .try_map(|value| decode_entity(category, value))
    }

    async fn apply_action(&self, action: &ApplicationAction) -> Result<MutationAck> {
        tracing::debug!(?action, "Submitting application action");

        let ack: MutationAck = self.send_json(self.action_request(action)).await?;
        if !ack.is_success() {
            return Err(ApiError::ResultCode {
                code: ack.result_code,
                message: ack.message.unwrap_or_default(),
            });
        }
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn seoul() -> Position {
        Position::new(37.5665, 126.978).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpApiClient::with_http_client(
            "http://localhost:8080/",
            None,
            reqwest::Client::new(),
        );
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_fetch_map_sends_query_and_decodes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/pets/map"))
            .and(query_param("latitude", "37.5665"))
            .and(query_param("longitude", "126.978"))
            .and(query_param("radius", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": 200,
                "data": [
                    {"id": 1, "latitude": 37.56, "longitude": 126.97, "status": "MISSING", "breed": "Poodle"},
                    {"id": 2, "latitude": 37.57, "longitude": 126.98, "status": "SIGHTED"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let entities = client
            .fetch_map(EntityCategory::Pets, seoul(), SearchRadius::default())
            .await
            .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].status, EntityStatus::Missing);
        assert_eq!(entities[1].status, EntityStatus::Sighted);
    }

    #[tokio::test]
    async fn test_fetch_map_skips_invalid_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pets/map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": 200,
                "data": [
                    {"id": 1, "latitude": 37.56, "longitude": 126.97, "status": "MISSING"},
                    {"id": 2, "latitude": 137.0, "longitude": 126.98, "status": "MISSING"},
                    {"id": 3, "status": "SIGHTED"},
                    {"id": 4, "latitude": 37.57, "longitude": 126.98, "status": "SIGHTED"}
                ]
            })))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let entities = client
            .fetch_map(EntityCategory::Pets, seoul(), SearchRadius::default())
            .await
            .unwrap();

        let ids: Vec<EntityId> = entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![EntityId(1), EntityId(4)]);
    }

    #[tokio::test]
    async fn test_fetch_map_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/shelters/map"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let err = client
            .fetch_map(EntityCategory::Shelters, seoul(), SearchRadius::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::HttpStatus(s) if s.as_u16() == 502));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_map_rejected_result_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/facilities/map"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": "400",
                "message": "radius out of range"
            })))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let err = client
            .fetch_map(EntityCategory::Facilities, seoul(), SearchRadius::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ResultCode { code: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_page_decodes_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pets"))
            .and(query_param("page", "1"))
            .and(query_param("size", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": 200,
                "data": {
                    "content": [{"id": 7, "latitude": 37.0, "longitude": 127.0}],
                    "totalPages": 2,
                    "totalElements": 3,
                    "size": 2,
                    "number": 1,
                    "first": false,
                    "last": true
                }
            })))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let page = client.fetch_page(EntityCategory::Pets, 1, 2).await.unwrap();

        assert_eq!(page.content.len(), 1);
        assert_eq!(page.content[0].id, EntityId(7));
        assert!(page.last);
    }

    #[tokio::test]
    async fn test_accept_uses_patch_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/protections/42/accept"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": 200,
                "message": "accepted"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), Some("secret".to_string())).unwrap();
        let ack = client
            .apply_action(&ApplicationAction::Accept { protection_id: 42 })
            .await
            .unwrap();

        assert_eq!(ack.message.as_deref(), Some("accepted"));
    }

    #[tokio::test]
    async fn test_apply_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/shelters/9/apply"))
            .and(body_json(json!({"message": "I have a yard"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultCode": 201})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let ack = client
            .apply_action(&ApplicationAction::Apply {
                target: ApplyTarget::ShelterAnimal(EntityId(9)),
                message: Some("I have a yard".to_string()),
            })
            .await
            .unwrap();

        assert!(ack.is_success());
    }

    #[tokio::test]
    async fn test_rejected_mutation_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/protections/5/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultCode": 409,
                "message": "already accepted"
            })))
            .mount(&server)
            .await;

        let client = HttpApiClient::new(server.uri(), None).unwrap();
        let err = client
            .apply_action(&ApplicationAction::Cancel { protection_id: 5 })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ResultCode { code: 409, .. }));
    }
}
