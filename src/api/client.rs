use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::api::models::{
    BidDto, BidId, BidItem, ConversationDto, ConversationId, MessageDto, NewBid, OutgoingMessage,
    ProjectId, ProjectListing, UserId,
};
use crate::api::service::{BidService, ChatService, DiscoveryService};
use crate::error::{ClientError, Result};

/// REST client for the marketplace backend.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_api: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_api = Url::parse(&Self::base_api(base_url))?;
        if base_api.cannot_be_a_base() {
            return Err(ClientError::Config(format!("`{base_url}` cannot be used as an API base")));
        }
        Ok(Self {
            http: HttpClient::new(),
            base_api,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn from_settings(settings: &crate::app::Settings) -> Result<Self> {
        if settings.api_base_url.trim().is_empty() {
            return Err(ClientError::Config(
                "no API URL configured, run `tradeboard login` first".into(),
            ));
        }
        Self::new(&settings.api_base_url, settings.token.clone())
    }

    fn base_api(base_url: &str) -> String {
        let normalized = crate::utils::normalize_url(base_url);
        let trimmed = normalized.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    fn with_auth(mut req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_api.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("`{}` cannot be used as an API base", self.base_api)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        log::debug!("{} {}", method, url);
        Ok(Self::with_auth(self.http.request(method, url), self.token.as_deref()))
    }

    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>> {
        let resp = self.request(Method::GET, segments)?.send().await?;
        let value = read_json(resp).await?;
        Ok(serde_json::from_value(list_payload(value))?)
    }

    async fn call<T: DeserializeOwned>(&self, method: Method, segments: &[&str]) -> Result<T> {
        let resp = self.request(method, segments)?.send().await?;
        let value = read_json(resp).await?;
        Ok(serde_json::from_value(object_payload(value))?)
    }

    async fn call_with<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let resp = self.request(method, segments)?.json(body).send().await?;
        let value = read_json(resp).await?;
        Ok(serde_json::from_value(object_payload(value))?)
    }

    async fn call_ignoring_body(&self, method: Method, segments: &[&str]) -> Result<()> {
        let resp = self.request(method, segments)?.send().await?;
        read_json(resp).await.map(|_| ())
    }

    /// Reach the backend health endpoint, returning the HTTP status.
    pub async fn ping(&self) -> Result<u16> {
        let resp = self.request(Method::GET, &["health"])?.send().await?;
        Ok(resp.status().as_u16())
    }

    /// Exchange credentials for a bearer token.
    pub async fn obtain_token(&self, email: &str, password: &str) -> Result<String> {
        let body = json!({ "email": email, "password": password });
        let resp = self.request(Method::POST, &["auth", "login"])?.json(&body).send().await?;
        let json = object_payload(read_json(resp).await?);
        for key in ["token", "accessToken", "access_token"] {
            if let Some(tok) = json.get(key).and_then(|v| v.as_str()) {
                return Ok(tok.to_string());
            }
        }
        Err(ClientError::Invalid("token not found in login response".into()))
    }
}

async fn read_json(resp: Response) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(&text).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request rejected").to_string()
            }),
        });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Pull the backend's human-readable reason out of an error body.
fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let candidates = [
        json.get("message"),
        json.get("error"),
        json.get("error").and_then(|e| e.get("message")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}

/// Lists come bare or wrapped in `data` / `items` / `results`.
fn list_payload(json: Value) -> Value {
    if json.is_array() {
        return json;
    }
    if let Value::Object(mut map) = json {
        for key in ["data", "items", "results"] {
            if map.get(key).is_some_and(Value::is_array) {
                return map.remove(key).unwrap_or(Value::Null);
            }
        }
        return Value::Object(map);
    }
    json
}

fn object_payload(json: Value) -> Value {
    match json {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl ChatService for ApiClient {
    async fn get_conversations(&self) -> Result<Vec<ConversationDto>> {
        self.get_list(&["chat", "conversations"]).await
    }

    async fn get_messages(&self, conversation: &ConversationId) -> Result<Vec<MessageDto>> {
        self.get_list(&["chat", "conversations", conversation.as_str(), "messages"])
            .await
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        message: &OutgoingMessage,
    ) -> Result<MessageDto> {
        self.call_with(
            Method::POST,
            &["chat", "conversations", conversation.as_str(), "messages"],
            message,
        )
        .await
    }

    async fn mark_read(&self, conversation: &ConversationId) -> Result<()> {
        self.call_ignoring_body(
            Method::POST,
            &["chat", "conversations", conversation.as_str(), "read"],
        )
        .await
    }

    async fn start_direct(&self, user: &UserId) -> Result<ConversationDto> {
        self.call_with(Method::POST, &["chat", "direct"], &json!({ "userId": user }))
            .await
    }

    async fn create_group(&self, title: &str, members: &[UserId]) -> Result<ConversationDto> {
        let body = json!({ "title": title, "memberIds": members });
        self.call_with(Method::POST, &["chat", "groups"], &body).await
    }

    async fn ensure_project_conversation(&self, project: &ProjectId) -> Result<ConversationDto> {
        self.call(
            Method::POST,
            &["chat", "projects", project.as_str(), "conversation"],
        )
        .await
    }
}

#[async_trait]
impl BidService for ApiClient {
    async fn get_my_bids(&self) -> Result<Vec<BidDto>> {
        self.get_list(&["bids", "mine"]).await
    }

    async fn get_bid_detail(&self, bid: &BidId) -> Result<BidDto> {
        self.call(Method::GET, &["bids", bid.as_str()]).await
    }

    async fn create_bid(&self, bid: &NewBid) -> Result<BidDto> {
        self.call_with(Method::POST, &["bids"], bid).await
    }

    async fn update_bid_items(&self, bid: &BidId, items: &[BidItem]) -> Result<BidDto> {
        self.call_with(Method::PUT, &["bids", bid.as_str(), "items"], &json!({ "items": items }))
            .await
    }

    async fn finalize_bid_submission(&self, bid: &BidId) -> Result<BidDto> {
        self.call(Method::POST, &["bids", bid.as_str(), "submit"]).await
    }

    async fn withdraw_bid(&self, bid: &BidId) -> Result<BidDto> {
        self.call(Method::POST, &["bids", bid.as_str(), "withdraw"]).await
    }

    async fn delete_bid(&self, bid: &BidId) -> Result<()> {
        self.call_ignoring_body(Method::DELETE, &["bids", bid.as_str()])
            .await
    }
}

#[async_trait]
impl DiscoveryService for ApiClient {
    async fn get_project_discovery(&self) -> Result<Vec<ProjectListing>> {
        self.get_list(&["projects", "discovery"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_api_appends_api_segment_once() {
        assert_eq!(ApiClient::base_api("example.com"), "https://example.com/api");
        assert_eq!(ApiClient::base_api("http://localhost:4000/api/"), "http://localhost:4000/api");
    }

    #[test]
    fn endpoint_escapes_identifier_segments() {
        let client = ApiClient::new("https://api.example.com", None).unwrap();
        let url = client.endpoint(&["bids", "a/b c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/bids/a%2Fb%20c");
    }

    #[test]
    fn blank_token_is_dropped() {
        let client = ApiClient::new("https://api.example.com", Some("  ".into())).unwrap();
        assert!(client.token.is_none());
    }

    #[test]
    fn error_message_prefers_backend_text() {
        assert_eq!(
            error_message(r#"{"message":"Bid already finalized"}"#).as_deref(),
            Some("Bid already finalized")
        );
        assert_eq!(
            error_message(r#"{"error":{"message":"Forbidden"}}"#).as_deref(),
            Some("Forbidden")
        );
        assert_eq!(error_message("<html>oops</html>"), None);
    }

    #[test]
    fn list_payload_unwraps_envelopes() {
        assert_eq!(list_payload(json!([1, 2])), json!([1, 2]));
        assert_eq!(list_payload(json!({"data": [1]})), json!([1]));
        assert_eq!(list_payload(json!({"total": 1, "items": [3]})), json!([3]));
        assert_eq!(list_payload(json!({"data": null})), json!({"data": null}));
    }

    #[test]
    fn object_payload_unwraps_data() {
        assert_eq!(object_payload(json!({"data": {"id": 1}})), json!({"id": 1}));
        assert_eq!(object_payload(json!({"id": 1})), json!({"id": 1}));
    }
}
