use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};

use crate::web::{AppState, auth, documents, summaries, upload};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route(
            "/register",
            get(auth::register_page).post(auth::process_register),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/upload",
            get(upload::upload_page)
                .post(upload::upload_submit)
                .layer(DefaultBodyLimit::max(upload::UPLOAD_BODY_LIMIT)),
        )
        .route("/documents", get(documents::dashboard))
        .route("/documents/:id", get(documents::document_detail))
        .route("/documents/:id/delete", post(documents::delete_document))
        .route("/documents/:id/resend", post(documents::resend_email))
        .route("/summaries", get(summaries::summary_list))
        .route("/summaries/:id", get(summaries::summary_detail))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn landing(State(state): State<AppState>) -> Redirect {
    if state.session().snapshot().token.is_some() {
        Redirect::to("/upload")
    } else {
        Redirect::to("/login")
    }
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
