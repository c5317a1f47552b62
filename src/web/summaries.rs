use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::error;

use crate::{
    client::{ApiError, models::SummaryDetail},
    web::{
        AppState, auth,
        templates::{self, PageLayout},
    },
};

const PAGE_SIZE: i64 = 20;

#[derive(Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
}

pub async fn summary_list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Html<String>, Response> {
    let user = auth::require_user(&state).await?;
    let user_label = templates::escape_html(&user.display_name());
    let skip = params.skip.unwrap_or(0).max(0);

    let summaries = match state.api().list_summaries(skip, PAGE_SIZE).await {
        Ok(summaries) => summaries,
        Err(ApiError::Unauthorized) => return Err(Redirect::to("/login").into_response()),
        Err(err) => {
            error!(?err, "failed to load summary listing");
            let body_html = r#"                <div class="empty-state"><p>无法加载摘要列表，请稍后重试。</p></div>
"#
            .to_string();
            return Ok(Html(templates::render_page(PageLayout {
                meta_title: "摘要列表 | PDF 摘要助手",
                heading: "摘要列表",
                user_label: &user_label,
                flash_html: templates::flash_error("加载失败。"),
                body_html,
            })));
        }
    };

    Ok(Html(templates::render_page(PageLayout {
        meta_title: "摘要列表 | PDF 摘要助手",
        heading: "摘要列表",
        user_label: &user_label,
        flash_html: String::new(),
        body_html: render_listing_body(&summaries, skip),
    })))
}

pub async fn summary_detail(
    State(state): State<AppState>,
    Path(summary_id): Path<i64>,
) -> Result<Html<String>, Response> {
    let user = auth::require_user(&state).await?;
    let user_label = templates::escape_html(&user.display_name());

    let detail = match state.api().get_summary(summary_id).await {
        Ok(detail) => detail,
        Err(ApiError::Unauthorized) => return Err(Redirect::to("/login").into_response()),
        Err(ApiError::NotFound) => {
            return Ok(render_unavailable_page(&user_label, "未找到该摘要。"));
        }
        Err(err) => {
            error!(?err, summary_id, "failed to load summary");
            return Ok(render_unavailable_page(&user_label, "无法加载摘要，请稍后重试。"));
        }
    };

    Ok(Html(templates::render_page(PageLayout {
        meta_title: "摘要详情 | PDF 摘要助手",
        heading: "摘要详情",
        user_label: &user_label,
        flash_html: String::new(),
        body_html: render_detail_body(&detail),
    })))
}

fn render_listing_body(summaries: &[SummaryDetail], skip: i64) -> String {
    if summaries.is_empty() && skip == 0 {
        return r#"                <div class="empty-state">
                    <p>还没有生成任何摘要。</p>
                    <p><a href="/upload">上传一个 PDF →</a></p>
                </div>
"#
        .to_string();
    }

    let rows = summaries
        .iter()
        .map(|detail| {
            let email_state = if detail.summary.email_sent {
                "已发送"
            } else {
                "未发送"
            };

            format!(
                r#"<tr><td>{name}</td><td>{words}</td><td>{email_state}</td><td>{created}</td><td><a href="/summaries/{id}">查看</a></td></tr>"#,
                name = templates::escape_html(&detail.pdf_document.original_filename),
                words = detail
                    .summary
                    .word_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                email_state = email_state,
                created = templates::format_datetime(detail.summary.created_at),
                id = detail.summary.id,
            )
        })
        .collect::<String>();

    let mut pagination = String::new();
    if skip > 0 {
        let prev = (skip - PAGE_SIZE).max(0);
        pagination.push_str(&format!(r#"<a href="/summaries?skip={prev}">← 上一页</a>"#));
    }
    if summaries.len() as i64 == PAGE_SIZE {
        let next = skip + PAGE_SIZE;
        pagination.push_str(&format!(r#"<a href="/summaries?skip={next}">下一页 →</a>"#));
    }
    let pagination_html = if pagination.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="pagination">{pagination}</div>"#)
    };

    format!(
        r#"                <section class="panel">
                    <h2>已生成的摘要</h2>
                    <table>
                        <thead><tr><th>文件名</th><th>字数</th><th>邮件</th><th>生成时间</th><th></th></tr></thead>
                        <tbody>{rows}</tbody>
                    </table>
                    {pagination_html}
                </section>
"#,
    )
}

fn render_detail_body(detail: &SummaryDetail) -> String {
    let summary = &detail.summary;

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
        r#"                <a class="back-link" href="/summaries">← 返回摘要列表</a>
                <section class="panel">
                    <h2>{name}</h2>
                    <div class="meta-grid">
                        <div class="meta-card"><p class="meta-label">字数</p><p class="meta-value">{words}</p></div>
                        <div class="meta-card"><p class="meta-label">处理耗时</p><p class="meta-value">{duration}</p></div>
                        <div class="meta-card"><p class="meta-label">生成时间</p><p class="meta-value">{created}</p></div>
                    </div>
                    <div class="summary-content">{content}</div>
                    {email_html}
                </section>
"#,
        name = templates::escape_html(&detail.pdf_document.original_filename),
        words = summary
            .word_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".to_string()),
        duration = summary
            .processing_time
            .map(|seconds| format!("{seconds:.1} 秒"))
            .unwrap_or_else(|| "-".to_string()),
        created = templates::format_datetime(summary.created_at),
        content = templates::escape_html(&summary.content),
        email_html = email_html,
    )
}

fn render_unavailable_page(user_label: &str, message: &str) -> Html<String> {
    let body_html = format!(
        r#"                <div class="empty-state">
                    <p><strong>{message}</strong></p>
                    <p><a href="/summaries">返回摘要列表 →</a></p>
                </div>
"#,
        message = templates::escape_html(message),
    );

    Html(templates::render_page(PageLayout {
        meta_title: "摘要详情 | PDF 摘要助手",
        heading: "摘要详情",
        user_label,
        flash_html: String::new(),
        body_html,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::client::models::{Summary, SummarySource};

    fn detail(email_sent: bool) -> SummaryDetail {
        let timestamp = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 0))
            .expect("valid datetime");

        SummaryDetail {
            summary: Summary {
                id: 3,
                content: "摘要正文。".to_string(),
                word_count: Some(88),
                processing_time: None,
                email_sent,
                email_sent_at: None,
                created_at: timestamp,
            },
            pdf_document: SummarySource {
                original_filename: "thesis.pdf".to_string(),
            },
        }
    }

    #[test]
    fn detail_reports_unsent_email() {
        let body = render_detail_body(&detail(false));
        assert!(body.contains("摘要正文。"));
        assert!(body.contains("摘要邮件尚未发送。"));
    }

    #[test]
    fn sent_email_without_timestamp_says_unknown() {
        let body = render_detail_body(&detail(true));
        assert!(body.contains("时间未知"));
    }

    #[test]
    fn listing_links_to_the_summary() {
        let body = render_listing_body(&[detail(false)], 0);
        assert!(body.contains(r#"href="/summaries/3""#));
        assert!(body.contains("thesis.pdf"));
        assert!(body.contains("未发送"));
    }
}
