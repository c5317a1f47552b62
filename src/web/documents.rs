use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    client::{
        ApiError,
        models::{Document, DocumentListItem, DocumentStatus},
    },
    web::{
        AppState, auth,
        templates::{self, PageLayout},
    },
};

const PAGE_SIZE: i64 = 20;

#[derive(Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct DetailQuery {
    pub sent: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct ResendForm {
    pub summary_id: i64,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_user(&state).await?;
    let user_label = templates::escape_html(&user.display_name());
    let skip = params.skip.unwrap_or(0).max(0);

    let flash_html = compose_list_flash(&params);

    let documents = match state.api().list_documents(skip, PAGE_SIZE).await {
        Ok(documents) => documents,
        Err(ApiError::Unauthorized) => return Err(Redirect::to("/login").into_response()),
        Err(err) => {
            error!(?err, "failed to load document listing");
            let body_html = r#"                <div class="empty-state"><p>无法加载文档列表，请稍后重试。</p></div>
"#
            .to_string();
            return Ok(Html(templates::render_page(PageLayout {
                meta_title: "文档列表 | PDF 摘要助手",
                heading: "文档列表",
                user_label: &user_label,
                flash_html: templates::flash_error("加载失败。"),
                body_html,
            })));
        }
    };

    let body_html = render_listing_body(&documents, skip);

    Ok(Html(templates::render_page(PageLayout {
        meta_title: "文档列表 | PDF 摘要助手",
        heading: "文档列表",
        user_label: &user_label,
        flash_html,
        body_html,
    })))
}

pub async fn document_detail(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
    Query(params): Query<DetailQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_user(&state).await?;
    let user_label = templates::escape_html(&user.display_name());

    let document = match state.api().get_document(document_id).await {
        Ok(document) => document,
        Err(ApiError::Unauthorized) => return Err(Redirect::to("/login").into_response()),
        Err(ApiError::NotFound) => {
            return Ok(render_unavailable_page(&user_label, "未找到该文档，可能已被删除。"));
        }
        Err(err) => {
            error!(?err, document_id, "failed to load document");
            return Ok(render_unavailable_page(&user_label, "无法加载文档，请稍后重试。"));
        }
    };

    let flash_html = compose_detail_flash(&params);
    let body_html = render_document_body(&document);

    Ok(Html(templates::render_page(PageLayout {
        meta_title: "文档详情 | PDF 摘要助手",
        heading: "文档详情",
        user_label: &user_label,
        flash_html,
        body_html,
    })))
}

pub async fn resend_email(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
    Form(form): Form<ResendForm>,
) -> Response {
    if let Err(response) = auth::require_user(&state).await {
        return response;
    }

    // One resend per summary in flight at a time.
    if !state.begin_resend(form.summary_id) {
        let target = format!("/documents/{document_id}?error=resend_busy");
        return Redirect::to(&target).into_response();
    }

    let result = state.api().resend_email(form.summary_id).await;
    state.finish_resend(form.summary_id);

    match result {
        Ok(ack) => {
            info!(summary_id = form.summary_id, message = %ack.message, "summary email resent");
            let target = format!("/documents/{document_id}?sent=1");
            Redirect::to(&target).into_response()
        }
        Err(ApiError::Unauthorized) => Redirect::to("/login").into_response(),
        Err(err) => {
            error!(?err, summary_id = form.summary_id, "failed to resend summary email");
            let target = format!("/documents/{document_id}?error=resend_failed");
            Redirect::to(&target).into_response()
        }
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<i64>,
) -> Response {
    if let Err(response) = auth::require_user(&state).await {
        return response;
    }

    match state.api().delete_document(document_id).await {
        Ok(()) => Redirect::to("/documents?status=deleted").into_response(),
        Err(ApiError::Unauthorized) => Redirect::to("/login").into_response(),
        Err(ApiError::NotFound) => Redirect::to("/documents?error=missing").into_response(),
        Err(err) => {
            error!(?err, document_id, "failed to delete document");
            Redirect::to("/documents?error=delete_failed").into_response()
        }
    }
}

fn compose_list_flash(params: &ListQuery) -> String {
    if let Some(status) = params.status.as_deref() {
        return match status {
            "uploaded" => templates::flash_success("PDF 上传成功，已开始处理。"),
            "deleted" => templates::flash_success("文档已删除。"),
            _ => String::new(),
        };
    }

    if let Some(error) = params.error.as_deref() {
        let message = match error {
            "missing" => "未找到该文档，可能已被删除。",
            "delete_failed" => "删除失败，请稍后重试。",
            _ => "发生未知错误，请稍后重试。",
        };
        return templates::flash_error(message);
    }

    String::new()
}

fn compose_detail_flash(params: &DetailQuery) -> String {
    if params.sent.is_some() {
        return templates::flash_success("摘要邮件已重新发送。");
    }

    if let Some(error) = params.error.as_deref() {
        let message = match error {
            "resend_busy" => "邮件正在发送中，请稍候再试。",
            "resend_failed" => "邮件发送失败，请稍后重试。",
            _ => "发生未知错误，请稍后重试。",
        };
        return templates::flash_error(message);
    }

    String::new()
}

fn status_tag(status: &DocumentStatus) -> String {
    format!(
        r#"<span class="status-tag {class}">{label}</span>"#,
        class = status.as_str(),
        label = templates::escape_html(status.label_zh()),
    )
}

fn render_listing_body(documents: &[DocumentListItem], skip: i64) -> String {
    if documents.is_empty() && skip == 0 {
        return r#"                <div class="empty-state">
                    <p>还没有上传过文档。</p>
                    <p><a href="/upload">上传第一个 PDF →</a></p>
                </div>
"#
        .to_string();
    }

    let rows = documents
        .iter()
        .map(|document| {
            let summary_cell = if document.has_summary {
                format!(r#"<a href="/documents/{}">查看摘要</a>"#, document.id)
            } else {
                format!(r#"<a href="/documents/{}">查看状态</a>"#, document.id)
            };

            format!(
                r#"<tr><td>{name}</td><td>{status}</td><td>{pages}</td><td>{size}</td><td>{created}</td><td>{summary}</td><td><form method="post" action="/documents/{id}/delete"><button type="submit" class="danger">删除</button></form></td></tr>"#,
                name = templates::escape_html(&document.original_filename),
                status = status_tag(&document.status),
                pages = document
                    .page_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                size = templates::format_file_size(document.file_size),
                created = templates::format_datetime(document.created_at),
                summary = summary_cell,
                id = document.id,
            )
        })
        .collect::<String>();

    let mut pagination = String::new();
    if skip > 0 {
        let prev = (skip - PAGE_SIZE).max(0);
        pagination.push_str(&format!(r#"<a href="/documents?skip={prev}">← 上一页</a>"#));
    }
    if documents.len() as i64 == PAGE_SIZE {
        let next = skip + PAGE_SIZE;
        pagination.push_str(&format!(r#"<a href="/documents?skip={next}">下一页 →</a>"#));
    }
    let pagination_html = if pagination.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="pagination">{pagination}</div>"#)
    };

    format!(
        r#"                <section class="panel">
                    <h2>我的文档</h2>
                    <p class="note">处理中的文档请稍后刷新查看最新状态。</p>
                    <table>
                        <thead><tr><th>文件名</th><th>状态</th><th>页数</th><th>大小</th><th>上传时间</th><th>摘要</th><th>操作</th></tr></thead>
                        <tbody>{rows}</tbody>
                    </table>
                    {pagination_html}
                </section>
"#,
    )
}

/// Renders the lifecycle-dependent portion of the detail view. A `failed`
/// document never shows summary fields, even when a partial summary is
/// present on the wire.
fn render_document_body(document: &Document) -> String {
    let meta_html = format!(
        r#"<div class="meta-grid">
                        <div class="meta-card"><p class="meta-label">状态</p><p class="meta-value">{status}</p></div>
                        <div class="meta-card"><p class="meta-label">页数</p><p class="meta-value">{pages}</p></div>
                        <div class="meta-card"><p class="meta-label">大小</p><p class="meta-value">{size}</p></div>
                        <div class="meta-card"><p class="meta-label">上传时间</p><p class="meta-value">{created}</p></div>
                    </div>"#,
        status = status_tag(&document.status),
        pages = document
            .page_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".to_string()),
        size = templates::format_file_size(document.file_size),
        created = templates::format_datetime(document.created_at),
    );

    let outcome_html = match (&document.status, &document.summary) {
        (DocumentStatus::Failed, _) => r#"<div class="empty-state">
                        <p><strong>摘要生成失败。</strong></p>
                        <p class="note">该文档处理失败，请重新上传 PDF。</p>
                        <p><a href="/upload">重新上传 →</a></p>
                    </div>"#
            .to_string(),
        (_, Some(summary)) => {
            let email_html = if summary.email_sent {
                let sent_at = summary
                    .email_sent_at
                    .map(templates::format_datetime)
                    .unwrap_or_else(|| "时间未知".to_string());
                format!(r#"<p class="note">摘要邮件已于 {sent_at} 发送。</p>"#)
            } else {
                r#"<p class="note">摘要邮件尚未发送。</p>"#.to_string()
            };

            format!(
                r#"<h2>摘要</h2>
                    <div class="meta-grid">
                        <div class="meta-card"><p class="meta-label">字数</p><p class="meta-value">{words}</p></div>
                        <div class="meta-card"><p class="meta-label">处理耗时</p><p class="meta-value">{duration}</p></div>
                    </div>
                    <div class="summary-content">{content}</div>
                    {email_html}
                    <form method="post" action="/documents/{id}/resend">
                        <input type="hidden" name="summary_id" value="{summary_id}">
                        <button type="submit">重新发送邮件</button>
                    </form>"#,
                words = summary
                    .word_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                duration = summary
                    .processing_time
                    .map(|seconds| format!("{seconds:.1} 秒"))
                    .unwrap_or_else(|| "-".to_string()),
                content = templates::escape_html(&summary.content),
                email_html = email_html,
                id = document.id,
                summary_id = summary.id,
            )
        }
        _ => r#"<div class="empty-state">
                        <p><strong>摘要生成中…</strong></p>
                        <p class="note">摘要尚未就绪，请稍后刷新页面查看。</p>
                    </div>"#
            .to_string(),
    };

    format!(
        r#"                <a class="back-link" href="/documents">← 返回文档列表</a>
                <section class="panel">
                    <h2>{name}</h2>
                    {meta_html}
                    {outcome_html}
                </section>
"#,
        name = templates::escape_html(&document.original_filename),
    )
}

fn render_unavailable_page(user_label: &str, message: &str) -> Html<String> {
    let body_html = format!(
        r#"                <div class="empty-state">
                    <p><strong>{message}</strong></p>
                    <p><a href="/documents">返回文档列表 →</a></p>
                </div>
"#,
        message = templates::escape_html(message),
    );

    Html(templates::render_page(PageLayout {
        meta_title: "文档详情 | PDF 摘要助手",
        heading: "文档详情",
        user_label,
        flash_html: String::new(),
        body_html,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::client::models::Summary;

    fn timestamp() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .expect("valid datetime")
    }

    fn summary() -> Summary {
        Summary {
            id: 3,
            content: "本文提出了一种新的方法。".to_string(),
            word_count: Some(120),
            processing_time: Some(4.2),
            email_sent: true,
            email_sent_at: Some(timestamp()),
            created_at: timestamp(),
        }
    }

    fn document(status: DocumentStatus, summary: Option<Summary>) -> Document {
        Document {
            id: 7,
            original_filename: "thesis.pdf".to_string(),
            file_size: 5 * 1024 * 1024,
            page_count: Some(12),
            status,
            created_at: timestamp(),
            summary,
        }
    }

    #[test]
    fn completed_document_renders_summary_and_resend() {
        let body = render_document_body(&document(DocumentStatus::Completed, Some(summary())));

        assert!(body.contains("本文提出了一种新的方法。"));
        assert!(body.contains("120"));
        assert!(body.contains("4.2 秒"));
        assert!(body.contains("重新发送邮件"));
        assert!(body.contains(r#"name="summary_id" value="3""#));
        assert!(body.contains("摘要邮件已于 2024-05-01 08:30 发送。"));
    }

    #[test]
    fn failed_document_hides_summary_fields() {
        let body = render_document_body(&document(DocumentStatus::Failed, Some(summary())));

        assert!(body.contains("摘要生成失败"));
        assert!(body.contains("请重新上传"));
        assert!(!body.contains("本文提出了一种新的方法。"));
        assert!(!body.contains("重新发送邮件"));
    }

    #[test]
    fn processing_document_advises_a_later_visit() {
        let body = render_document_body(&document(DocumentStatus::Processing, None));

        assert!(body.contains("摘要生成中"));
        assert!(body.contains("请稍后刷新页面查看"));
        assert!(!body.contains("重新发送邮件"));
    }

    #[test]
    fn listing_links_every_document_and_paginates() {
        let items = vec![DocumentListItem {
            id: 7,
            original_filename: "thesis.pdf".to_string(),
            file_size: 1024,
            page_count: None,
            status: DocumentStatus::Pending,
            created_at: timestamp(),
            has_summary: false,
        }];

        let body = render_listing_body(&items, 20);
        assert!(body.contains(r#"href="/documents/7""#));
        assert!(body.contains("status-tag pending"));
        assert!(body.contains(r#"href="/documents?skip=0""#));
        // A short page means there is no next page to offer.
        assert!(!body.contains("下一页"));
    }

    #[test]
    fn empty_first_page_invites_an_upload() {
        let body = render_listing_body(&[], 0);
        assert!(body.contains("还没有上传过文档"));
        assert!(body.contains(r#"href="/upload""#));
    }
}
