use axum::{
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tracing::{error, info};

use crate::{
    client::ApiError,
    web::{
        AppState, auth,
        templates::{self, PageLayout},
    },
};

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Request-body cap for the upload route, held above the validation limit so
/// the 10 MiB rule is what rejects oversized files, not the transport.
pub const UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Local rejection of an upload candidate; never reaches the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    WrongType,
    TooLarge,
}

impl UploadRejection {
    pub fn message_zh(&self) -> &'static str {
        match self {
            UploadRejection::WrongType => "仅支持上传 PDF 文件。",
            UploadRejection::TooLarge => "文件大小不能超过 10MB。",
        }
    }
}

/// Checks run in order, short-circuiting on the first failure: the filename
/// must end in `.pdf` (case-insensitive) before the size is ever considered.
pub fn validate_candidate(file_name: &str, size: u64) -> Result<(), UploadRejection> {
    if !file_name.to_ascii_lowercase().ends_with(".pdf") {
        return Err(UploadRejection::WrongType);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Uploading,
    Succeeded,
    Failed,
}

/// One upload interaction. Lives for the duration of a single submission and
/// is discarded afterwards; upload state never leaks into the session.
#[derive(Debug)]
pub struct UploadAttempt {
    file_name: String,
    size: u64,
    phase: UploadPhase,
}

impl UploadAttempt {
    /// Validates the candidate and opens an attempt in the `Idle` phase.
    /// A rejected candidate never produces an attempt.
    pub fn begin(file_name: &str, size: u64) -> Result<Self, UploadRejection> {
        validate_candidate(file_name, size)?;
        Ok(Self {
            file_name: file_name.to_string(),
            size,
            phase: UploadPhase::Idle,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn start(&mut self) {
        self.phase = UploadPhase::Uploading;
    }

    pub fn succeed(&mut self) {
        self.phase = UploadPhase::Succeeded;
    }

    pub fn fail(&mut self) {
        self.phase = UploadPhase::Failed;
    }

    /// Returns the attempt to `Idle` after a failure so the user may retry.
    pub fn reset(&mut self) {
        self.phase = UploadPhase::Idle;
    }
}

pub async fn upload_page(State(state): State<AppState>) -> Result<Html<String>, Response> {
    let user = auth::require_user(&state).await?;
    Ok(render_upload_page(&user.display_name(), String::new()))
}

pub async fn upload_submit(State(state): State<AppState>, multipart: Multipart) -> Response {
    let user = match auth::require_user(&state).await {
        Ok(user) => user,
        Err(response) => return response,
    };
    let user_label = user.display_name();

    let (file_name, bytes) = match read_first_file(multipart).await {
        Ok(Some(file)) => file,
        Ok(None) => {
            return render_upload_page(&user_label, templates::flash_error("请选择要上传的 PDF 文件。"))
                .into_response();
        }
        Err(message) => {
            return render_upload_page(&user_label, templates::flash_error(message)).into_response();
        }
    };

    let mut attempt = match UploadAttempt::begin(&file_name, bytes.len() as u64) {
        Ok(attempt) => attempt,
        Err(rejection) => {
            return render_upload_page(&user_label, templates::flash_error(rejection.message_zh()))
                .into_response();
        }
    };

    attempt.start();

    match state.api().upload_pdf(attempt.file_name(), bytes).await {
        Ok(receipt) => {
            attempt.succeed();
            info!(
                document_id = receipt.document_id,
                task_id = %receipt.task_id,
                file_name = %attempt.file_name(),
                message = %receipt.message,
                "upload accepted"
            );
            Redirect::to("/documents?status=uploaded").into_response()
        }
        Err(ApiError::Unauthorized) => Redirect::to("/login").into_response(),
        Err(err) => {
            error!(?err, file_name = %attempt.file_name(), "upload failed");
            let message = err
                .detail()
                .map(str::to_string)
                .unwrap_or_else(|| "PDF 上传失败，请稍后重试。".to_string());
            attempt.fail();
            attempt.reset();
            render_upload_page(&user_label, templates::flash_error(&message)).into_response()
        }
    }
}

/// Pulls the first file field out of the form; later file fields of a
/// multi-file selection are ignored.
async fn read_first_file(mut multipart: Multipart) -> Result<Option<(String, Vec<u8>)>, &'static str> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(err) => {
                error!(?err, "failed to parse upload form");
                return Err("解析上传表单失败，请重试。");
            }
        };

        if field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(?err, "failed to read upload body");
                return Err("读取上传内容失败，请重试。");
            }
        };

        return Ok(Some((file_name, bytes.to_vec())));
    }
}

fn render_upload_page(user_label: &str, flash_html: String) -> Html<String> {
    let body_html = r#"                <section class="panel">
                    <h2>上传 PDF</h2>
                    <p class="note">上传 PDF 文档，系统将自动生成摘要并通过邮件发送给您。</p>
                    <form method="post" action="/upload" enctype="multipart/form-data">
                        <label for="file">选择文件</label>
                        <input id="file" name="file" type="file" accept=".pdf" required>
                        <p class="note">单个文件不超过 10MB，仅支持 PDF 格式。</p>
                        <button type="submit">开始上传</button>
                    </form>
                </section>
                <section class="panel">
                    <h2>处理流程</h2>
                    <ol class="note">
                        <li>上传 PDF 文档（不超过 10MB）</li>
                        <li>系统提取并分析文本内容</li>
                        <li>自动生成结构化摘要</li>
                        <li>摘要通过邮件送达，并可在文档列表中查看</li>
                    </ol>
                </section>
"#
    .to_string();

    Html(templates::render_page(PageLayout {
        meta_title: "上传 PDF | PDF 摘要助手",
        heading: "上传 PDF",
        user_label: &templates::escape_html(user_label),
        flash_html,
        body_html,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn type_is_checked_before_size() {
        assert_eq!(
            validate_candidate("report.txt", 20 * MIB),
            Err(UploadRejection::WrongType)
        );
        assert_eq!(
            validate_candidate("report.pdf", 11 * MIB),
            Err(UploadRejection::TooLarge)
        );
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(validate_candidate("REPORT.PDF", MIB), Ok(()));
        assert_eq!(validate_candidate("Thesis.Pdf", MIB), Ok(()));
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert_eq!(validate_candidate("thesis.pdf", 10 * MIB), Ok(()));
        assert_eq!(
            validate_candidate("thesis.pdf", 10 * MIB + 1),
            Err(UploadRejection::TooLarge)
        );
    }

    #[test]
    fn oversized_candidate_never_becomes_an_attempt() {
        let rejected = UploadAttempt::begin("thesis.pdf", 12 * MIB);
        assert_eq!(rejected.expect_err("must be rejected"), UploadRejection::TooLarge);
    }

    #[test]
    fn attempt_walks_through_the_upload_phases() {
        let mut attempt = UploadAttempt::begin("thesis.pdf", 5 * MIB).expect("valid candidate");
        assert_eq!(attempt.phase(), UploadPhase::Idle);
        assert_eq!(attempt.size(), 5 * MIB);

        attempt.start();
        assert_eq!(attempt.phase(), UploadPhase::Uploading);

        attempt.succeed();
        assert_eq!(attempt.phase(), UploadPhase::Succeeded);
    }

    #[test]
    fn failed_attempt_resets_to_idle_for_retry() {
        let mut attempt = UploadAttempt::begin("thesis.pdf", MIB).expect("valid candidate");
        attempt.start();
        attempt.fail();
        assert_eq!(attempt.phase(), UploadPhase::Failed);

        attempt.reset();
        assert_eq!(attempt.phase(), UploadPhase::Idle);
    }
}
