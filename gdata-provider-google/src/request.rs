//! Authenticated requests against the remote API.
//!
//! HTTP execution sits behind [`HttpTransport`] and credentials behind
//! [`TokenProvider`]; [`ApiClient`] glues the two together, adds the bearer
//! header and retries once when the token turns out to be stale.

use std::sync::Arc;

use async_trait::async_trait;
use gdata_core::{GdataError, GdataResult};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: &str) -> Self {
        ApiRequest {
            method,
            url: url.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        ApiRequest::new(Method::Get, url)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// URL with the query string attached.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.url, query)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Decode a response body.
///
/// 2xx responses with an empty body are a successful no-content result;
/// non-empty 2xx bodies must be JSON. Any other status becomes an
/// [`GdataError::Http`] carrying the remote's error message when it sent one.
pub fn decode_body(url: &str, response: &ApiResponse) -> GdataResult<Option<Value>> {
    if !response.is_success() {
        return Err(GdataError::Http {
            status: response.status,
            url: url.to_string(),
            message: error_message(&response.body),
        });
    }
    if response.body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|e| GdataError::Decode(e.to_string()))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &ApiRequest) -> GdataResult<ApiResponse>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> GdataResult<ApiResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GdataError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| GdataError::Transport(e.to_string()))?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Source of bearer tokens, keyed by session id.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self, session_id: &str) -> GdataResult<String>;

    /// Forget the current token after the remote rejected it.
    async fn invalidate(&self, session_id: &str) -> GdataResult<()>;
}

/// Hands out one fixed token for every session.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: &str) -> Self {
        StaticTokenProvider {
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _session_id: &str) -> GdataResult<String> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self, _session_id: &str) -> GdataResult<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<dyn TokenProvider>) -> Self {
        ApiClient { transport, tokens }
    }

    /// Send an authorized request and return the raw response, whatever its
    /// status. A 401 invalidates the session token and the request is sent
    /// once more with a fresh one.
    pub async fn send(&self, session_id: &str, request: ApiRequest) -> GdataResult<ApiResponse> {
        let response = self.send_once(session_id, &request).await?;
        if response.status != 401 {
            return Ok(response);
        }

        warn!(session = session_id, url = %request.url, "Access token rejected, retrying once");
        self.tokens.invalidate(session_id).await?;
        let response = self.send_once(session_id, &request).await?;
        if response.status == 401 {
            return Err(GdataError::Auth(format!(
                "{} rejected the credentials of session {}",
                request.url, session_id
            )));
        }
        Ok(response)
    }

    async fn send_once(&self, session_id: &str, request: &ApiRequest) -> GdataResult<ApiResponse> {
        let token = self.tokens.access_token(session_id).await?;
        let authorized = request
            .clone()
            .with_header("Authorization", format!("Bearer {}", token));

        debug!(method = request.method.as_str(), url = %authorized.full_url(), "Sending request");
        let response = self.transport.execute(&authorized).await?;
        debug!(status = response.status, "Received response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        statuses: Mutex<Vec<u16>>,
        seen: Mutex<Vec<ApiRequest>>,
    }

    #[async_trait]
    impl HttpTransport for Scripted {
        async fn execute(&self, request: &ApiRequest) -> GdataResult<ApiResponse> {
            self.seen.lock().unwrap().push(request.clone());
            let status = self.statuses.lock().unwrap().remove(0);
            Ok(ApiResponse {
                status,
                headers: Vec::new(),
                body: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct CountingTokens {
        invalidated: Mutex<usize>,
    }

    #[async_trait]
    impl TokenProvider for CountingTokens {
        async fn access_token(&self, _session_id: &str) -> GdataResult<String> {
            Ok(format!("token{}", *self.invalidated.lock().unwrap()))
        }

        async fn invalidate(&self, _session_id: &str) -> GdataResult<()> {
            *self.invalidated.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn unauthorized_is_retried_once_with_a_fresh_token() {
        let transport = Arc::new(Scripted {
            statuses: Mutex::new(vec![401, 200]),
            seen: Mutex::new(Vec::new()),
        });
        let tokens = Arc::new(CountingTokens::default());
        let client = ApiClient::new(transport.clone(), tokens.clone());

        let response = client
            .send("sessionId", ApiRequest::get("https://example.com/x"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].header("authorization"), Some("Bearer token0"));
        assert_eq!(seen[1].header("authorization"), Some("Bearer token1"));
        assert_eq!(*tokens.invalidated.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_unauthorized_is_an_auth_error() {
        let transport = Arc::new(Scripted {
            statuses: Mutex::new(vec![401, 401]),
            seen: Mutex::new(Vec::new()),
        });
        let client = ApiClient::new(transport, Arc::new(CountingTokens::default()));

        let err = client
            .send("sessionId", ApiRequest::get("https://example.com/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GdataError::Auth(_)));
    }

    #[test]
    fn empty_success_is_no_content() {
        let response = ApiResponse {
            status: 204,
            headers: vec![("Content-Length".into(), "0".into())],
            body: String::new(),
        };
        assert_eq!(decode_body("u", &response).unwrap(), None);
    }

    #[test]
    fn non_json_success_is_a_decode_error() {
        let response = ApiResponse {
            status: 200,
            headers: Vec::new(),
            body: "blergh".into(),
        };
        let err = decode_body("u", &response).unwrap_err();
        assert!(err.to_string().contains("invalid json response"));
    }

    #[test]
    fn error_status_carries_remote_message() {
        let response = ApiResponse {
            status: 403,
            headers: Vec::new(),
            body: r#"{"error":{"code":403,"message":"Forbidden"}}"#.into(),
        };
        match decode_body("https://example.com/x", &response) {
            Err(GdataError::Http { status, message, .. }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn full_url_encodes_query() {
        let request = ApiRequest::get("https://example.com/events")
            .with_query("syncToken", "a+b=")
            .with_query("sendUpdates", "all");
        assert_eq!(
            request.full_url(),
            "https://example.com/events?syncToken=a%2Bb%3D&sendUpdates=all"
        );
    }
}
