use axum::{
    Form,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::{
    client::models::User,
    web::{
        AppState,
        templates::{self, AuthPageLayout},
    },
};

/// Admission gate for every protected page.
///
/// No token redirects to the login entry point. A held token whose identity
/// is still being resolved renders the blocking loading page; otherwise the
/// identity is resolved in-line and the gate re-evaluates, so a token
/// invalidated by the self-healing path redirects on the same request.
pub async fn require_user(state: &AppState) -> Result<User, Response> {
    let session = state.session();
    let snapshot = session.snapshot();

    if snapshot.token.is_none() {
        return Err(Redirect::to("/login").into_response());
    }

    if let Some(user) = snapshot.user {
        return Ok(user);
    }

    if snapshot.is_loading {
        return Err(Html(templates::render_loading_page()).into_response());
    }

    session.fetch_user().await;

    let snapshot = session.snapshot();
    match (snapshot.token.is_some(), snapshot.user) {
        (true, Some(user)) => Ok(user),
        _ => Err(Redirect::to("/login").into_response()),
    }
}

#[derive(Default, Deserialize)]
pub struct AuthQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

pub async fn login_page(
    State(state): State<AppState>,
    Query(params): Query<AuthQuery>,
) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&state) {
        return redirect.into_response();
    }

    let flash_html = match params.status.as_deref() {
        Some("registered") => templates::flash_success("注册成功，请登录。"),
        Some("logged_out") => templates::flash_success("已退出登录。"),
        _ => String::new(),
    };

    render_login_page(flash_html).into_response()
}

pub async fn process_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let session = state.session();

    if session.login(form.email.trim(), &form.password).await {
        return Redirect::to("/upload").into_response();
    }

    let message = session
        .snapshot()
        .error
        .unwrap_or_else(|| "登录失败。".to_string());
    session.clear_error();

    render_login_page(templates::flash_error(&message)).into_response()
}

pub async fn register_page(State(state): State<AppState>) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&state) {
        return redirect.into_response();
    }

    render_register_page(String::new()).into_response()
}

pub async fn process_register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    let session = state.session();
    let first_name = non_empty(&form.first_name);
    let last_name = non_empty(&form.last_name);

    if session
        .register(form.email.trim(), &form.password, first_name, last_name)
        .await
    {
        return Redirect::to("/login?status=registered").into_response();
    }

    let message = session
        .snapshot()
        .error
        .unwrap_or_else(|| "注册失败。".to_string());
    session.clear_error();

    render_register_page(templates::flash_error(&message)).into_response()
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.session().logout();
    Redirect::to("/login?status=logged_out")
}

fn redirect_if_authenticated(state: &AppState) -> Option<Redirect> {
    let snapshot = state.session().snapshot();
    if snapshot.token.is_some() && snapshot.user.is_some() {
        Some(Redirect::to("/upload"))
    } else {
        None
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn render_login_page(flash_html: String) -> Html<String> {
    let form_html = r#"<form method="post" action="/login">
                <label for="email">邮箱</label>
                <input id="email" name="email" type="email" required>
                <label for="password">密码</label>
                <input id="password" name="password" type="password" required>
                <button type="submit">登录</button>
            </form>"#
        .to_string();

    Html(templates::render_auth_page(AuthPageLayout {
        meta_title: "登录 | PDF 摘要助手",
        heading: "PDF 摘要助手",
        description: "登录后即可上传 PDF 并获取 AI 生成的摘要。",
        flash_html,
        form_html,
        switch_html: r#"还没有账号？<a href="/register">注册</a>"#,
    }))
}

fn render_register_page(flash_html: String) -> Html<String> {
    let form_html = r#"<form method="post" action="/register">
                <label for="email">邮箱</label>
                <input id="email" name="email" type="email" required>
                <label for="password">密码</label>
                <input id="password" name="password" type="password" required>
                <label for="first_name">名</label>
                <input id="first_name" name="first_name">
                <label for="last_name">姓</label>
                <input id="last_name" name="last_name">
                <button type="submit">注册</button>
            </form>"#
        .to_string();

    Html(templates::render_auth_page(AuthPageLayout {
        meta_title: "注册 | PDF 摘要助手",
        heading: "注册账号",
        description: "创建账号后需要重新登录。",
        flash_html,
        form_html,
        switch_html: r#"已有账号？<a href="/login">登录</a>"#,
    }))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::http::StatusCode;
    use tempfile::tempdir;
    use uuid::Uuid;

    use super::*;
    use crate::config::AppConfig;

    fn test_state(credential_path: PathBuf) -> AppState {
        AppState::new(AppConfig {
            api_base_url: "http://127.0.0.1:1".to_string(),
            port: 0,
            credential_path,
        })
    }

    fn test_user() -> User {
        User {
            id: Uuid::nil(),
            email: "a@b.com".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn guard_redirects_without_a_token() {
        let dir = tempdir().expect("temp dir");
        let state = test_state(dir.path().join("token"));

        let response = require_user(&state)
            .await
            .expect_err("fresh session must be rejected");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|value| value.to_str().ok()),
            Some("/login")
        );
    }

    #[tokio::test]
    async fn guard_admits_a_resolved_session() {
        let dir = tempdir().expect("temp dir");
        let state = test_state(dir.path().join("token"));
        state.session().seed_for_tests("tok1", Some(test_user()));

        let user = require_user(&state).await.expect("session must be admitted");
        assert_eq!(user.email, "a@b.com");
    }
}
