use async_trait::async_trait;
use reqwest::{header, redirect, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::GitLabConfig;

/// Bytes of a non-success response body kept for the error message.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Remote { status: StatusCode, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// A single authenticated GET returning JSON. Every remote call of an
/// aggregation cycle goes through this.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<JsonValue, FetchError>;
}

/// GET `url` and decode the body into `T`.
pub async fn fetch_json<T: DeserializeOwned>(
    fetcher: &dyn Fetcher,
    url: &str,
) -> Result<T, FetchError> {
    let value = fetcher.get(url).await?;
    serde_json::from_value(value).map_err(|e| FetchError::Decode(e.to_string()))
}

#[derive(Clone)]
pub struct GitlabRestClient {
    client: Client,
    token: String,
}

impl GitlabRestClient {
    pub fn new(token: String, timeout: u64, skip_invalid_certs: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .danger_accept_invalid_certs(skip_invalid_certs)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { client, token })
    }

    pub fn from_config(cfg: &GitLabConfig) -> Result<Self, FetchError> {
        Self::new(cfg.token.clone(), cfg.timeout_seconds, cfg.skip_invalid_certs)
    }
}

#[async_trait]
impl Fetcher for GitlabRestClient {
    async fn get(&self, url: &str) -> Result<JsonValue, FetchError> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(FetchError::Remote { status, body });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Read at most `ERROR_BODY_LIMIT` bytes of an error response.
async fn error_body(mut resp: Response) -> String {
    let mut buf = Vec::new();
    while buf.len() < ERROR_BODY_LIMIT {
        match resp.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            _ => break,
        }
    }
    buf.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Which identity filter a merge request listing uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Assignee,
    Reviewer,
    Author,
}

impl Role {
    fn param(self) -> &'static str {
        match self {
            Role::Assignee => "assignee_username",
            Role::Reviewer => "reviewer_username",
            Role::Author => "author_username",
        }
    }
}

/// URL shaping for the three REST queries the dashboard issues.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
    per_page: u32,
}

impl Endpoints {
    pub fn new(base_url: &str, per_page: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            per_page,
        }
    }

    pub fn merge_requests(&self, role: Role, username: &str) -> String {
        format!(
            "{}/api/v4/merge_requests?scope=all&state=opened&{}={}&per_page={}&include=head_pipeline",
            self.base_url,
            role.param(),
            urlencoding::encode(username),
            self.per_page
        )
    }

    pub fn merge_request_pipelines(&self, project_id: u64, iid: u64) -> String {
        format!(
            "{}/api/v4/projects/{}/merge_requests/{}/pipelines?per_page=1",
            self.base_url, project_id, iid
        )
    }

    pub fn todos(&self) -> String {
        format!(
            "{}/api/v4/todos?state=pending&per_page={}",
            self.base_url, self.per_page
        )
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode as AxumStatus},
        response::IntoResponse,
        routing::get,
        Router,
    };
    use serde::Deserialize;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo_headers(headers: HeaderMap) -> impl IntoResponse {
        let token = headers
            .get("private-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let accept = headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        axum::Json(serde_json::json!([{ "token": token, "accept": accept }]))
    }

    #[derive(Debug, Deserialize)]
    struct Echo {
        token: String,
        accept: String,
    }

    fn client() -> GitlabRestClient {
        GitlabRestClient::new("secret".to_string(), 10, false).unwrap()
    }

    #[tokio::test]
    async fn sends_token_and_accept_header() {
        let base = serve(Router::new().route("/echo", get(echo_headers))).await;
        let client = client();

        let echoed: Vec<Echo> = fetch_json(&client, &format!("{}/echo", base)).await.unwrap();

        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].token, "secret");
        assert_eq!(echoed[0].accept, "application/json");
    }

    #[tokio::test]
    async fn non_success_status_is_remote_error() {
        let app = Router::new().route(
            "/down",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = serve(app).await;

        let err = client().get(&format!("{}/down", base)).await.unwrap_err();

        match err {
            FetchError::Remote { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn large_error_body_is_truncated() {
        let app = Router::new().route(
            "/huge",
            get(|| async { (AxumStatus::BAD_GATEWAY, "x".repeat(100_000)) }),
        );
        let base = serve(app).await;

        let err = client().get(&format!("{}/huge", base)).await.unwrap_err();

        match err {
            FetchError::Remote { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body.len(), ERROR_BODY_LIMIT);
                assert!(body.chars().all(|c| c == 'x'));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_is_not_followed() {
        let app = Router::new().route(
            "/moved",
            get(|| async { axum::response::Redirect::temporary("/elsewhere") }),
        );
        let base = serve(app).await;

        let err = client().get(&format!("{}/moved", base)).await.unwrap_err();

        assert!(matches!(err, FetchError::Remote { status, .. } if status.as_u16() == 307));
    }

    #[tokio::test]
    async fn invalid_json_is_decode_error() {
        let app = Router::new().route("/html", get(|| async { "<html>login</html>" }));
        let base = serve(app).await;

        let err = client().get(&format!("{}/html", base)).await.unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn wrong_shape_is_decode_error() {
        let app = Router::new().route(
            "/object",
            get(|| async { axum::Json(serde_json::json!({ "message": "401 Unauthorized" })) }),
        );
        let base = serve(app).await;

        let err = fetch_json::<Vec<Echo>>(&client(), &format!("{}/object", base))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client().get(&format!("http://{}/x", addr)).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[test]
    fn endpoint_urls() {
        let endpoints = Endpoints::new("https://gitlab.example.com/", 100);

        assert_eq!(
            endpoints.merge_requests(Role::Reviewer, "alice"),
            "https://gitlab.example.com/api/v4/merge_requests?scope=all&state=opened&reviewer_username=alice&per_page=100&include=head_pipeline"
        );
        assert_eq!(
            endpoints.merge_request_pipelines(7, 12),
            "https://gitlab.example.com/api/v4/projects/7/merge_requests/12/pipelines?per_page=1"
        );
        assert_eq!(
            endpoints.todos(),
            "https://gitlab.example.com/api/v4/todos?state=pending&per_page=100"
        );
    }

    #[test]
    fn usernames_are_percent_encoded() {
        let endpoints = Endpoints::new("https://gitlab.com", 20);

        let url = endpoints.merge_requests(Role::Author, "a b&c");

        assert!(url.contains("author_username=a%20b%26c&per_page=20"));
    }
}
