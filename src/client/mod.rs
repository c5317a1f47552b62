use std::sync::Arc;

use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::session::CredentialStore;

pub mod models;

use models::{
    ApiMessage, Document, DocumentListItem, SummaryDetail, TokenResponse, UploadReceipt, User,
};

/// Policy invoked whenever a response reports the session as unauthorized.
/// By the time it runs, the persisted credential has already been removed.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// Failure surface of the remote API adapter.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The service rejected the bearer credential; local teardown has run.
    #[error("request was rejected as unauthorized")]
    Unauthorized,
    #[error("requested resource does not exist")]
    NotFound,
    /// Any other non-success response, with the service's `detail` when parseable.
    #[error("request failed with status {status}")]
    Api { status: u16, detail: Option<String> },
    #[error("failed to decode response payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Server-supplied failure detail, when the response carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Client for the remote summarization API.
///
/// Every request reads the bearer token from the shared credential store at
/// call time and every response passes through the same unauthorized /
/// not-found / error-detail interception, so callers never special-case
/// authentication failure.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    credentials: CredentialStore,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, credentials: CredentialStore) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            credentials,
            on_unauthorized: None,
        }
    }

    pub fn with_unauthorized_hook(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let response = self
            .request(Method::POST, "/auth/jwt/login")
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, ApiError> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "first_name": first_name,
            "last_name": last_name,
        });
        let response = self
            .request(Method::POST, "/auth/register")
            .json(&payload)
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let response = self.request(Method::GET, "/users/me").send().await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn upload_pdf(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ApiError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime::APPLICATION_PDF.as_ref())?;
        let form = Form::new().part("file", part);

        let response = self
            .request(Method::POST, "/pdf/upload")
            .multipart(form)
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn list_documents(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<DocumentListItem>, ApiError> {
        let response = self
            .request(Method::GET, "/pdf/documents")
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn get_document(&self, id: i64) -> Result<Document, ApiError> {
        let response = self
            .request(Method::GET, &format!("/pdf/documents/{id}"))
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn delete_document(&self, id: i64) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &format!("/pdf/documents/{id}"))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    pub async fn list_summaries(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<SummaryDetail>, ApiError> {
        let response = self
            .request(Method::GET, "/summaries")
            .query(&[("skip", skip), ("limit", limit)])
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn get_summary(&self, id: i64) -> Result<SummaryDetail, ApiError> {
        let response = self
            .request(Method::GET, &format!("/summaries/{id}"))
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    pub async fn resend_email(&self, summary_id: i64) -> Result<ApiMessage, ApiError> {
        let response = self
            .request(Method::POST, &format!("/summaries/{summary_id}/resend-email"))
            .send()
            .await?;
        Self::parse(self.check(response).await?).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{}", self.base_url, path));
        // Read at call time so a login or teardown between requests is always
        // reflected; no token is ever captured at construction.
        if let Some(token) = self.credentials.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Err(err) = self.credentials.clear() {
                warn!(?err, "failed to remove persisted credential during teardown");
            }
            if let Some(hook) = &self.on_unauthorized {
                hook();
            }
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        Ok(response)
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Extracts the `detail` field the service attaches to error responses.
/// Handles both the plain-string form and the `{code, reason}` object form.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Object(map) => map
            .get("reason")
            .and_then(|reason| reason.as_str())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Json, Router, http::StatusCode, routing::get};
    use tempfile::tempdir;

    use super::*;

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("stub server");
        });
        format!("http://{addr}")
    }

    #[test]
    fn error_detail_reads_string_form() {
        assert_eq!(
            error_detail(r#"{"detail": "Only PDF files are allowed"}"#),
            Some("Only PDF files are allowed".to_string())
        );
    }

    #[test]
    fn error_detail_reads_reason_object_form() {
        let body = r#"{"detail": {"code": "REGISTER_INVALID_PASSWORD", "reason": "密码太短"}}"#;
        assert_eq!(error_detail(body), Some("密码太短".to_string()));
    }

    #[test]
    fn error_detail_ignores_unexpected_shapes() {
        assert_eq!(error_detail(r#"{"detail": [1, 2]}"#), None);
        assert_eq!(error_detail("not json"), None);
        assert_eq!(error_detail(r#"{"other": "x"}"#), None);
    }

    #[tokio::test]
    async fn unauthorized_response_clears_credential_and_fires_hook() {
        let dir = tempdir().expect("temp dir");
        let credentials = CredentialStore::open(dir.path().join("token"));
        credentials.store("stale-token").expect("seed token");

        let stub = Router::new().route(
            "/users/me",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(serde_json::json!({"detail": "Unauthorized"}))) }),
        );
        let base_url = spawn_stub(stub).await;

        let fired = Arc::new(AtomicUsize::new(0));
        let hook_fired = Arc::clone(&fired);
        let client = ApiClient::new(base_url, credentials.clone()).with_unauthorized_hook(
            Arc::new(move || {
                hook_fired.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let err = client.current_user().await.expect_err("401 must error");
        assert!(matches!(err, ApiError::Unauthorized));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(credentials.token(), None);
        assert!(!dir.path().join("token").exists());
    }

    #[tokio::test]
    async fn non_success_response_carries_server_detail() {
        let dir = tempdir().expect("temp dir");
        let credentials = CredentialStore::open(dir.path().join("token"));

        let stub = Router::new().route(
            "/pdf/documents",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"detail": "skip must be non-negative"})),
                )
            }),
        );
        let base_url = spawn_stub(stub).await;
        let client = ApiClient::new(base_url, credentials);

        let err = client.list_documents(-1, 20).await.expect_err("400 must error");
        assert_eq!(err.detail(), Some("skip must be non-negative"));
    }
}
