use chrono::{Datelike, NaiveDateTime, Utc};

const PAGE_BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.75rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.5rem; }
        .nav-links { display: flex; flex-wrap: wrap; gap: 0.75rem; align-items: center; }
        .nav-links a { display: inline-flex; align-items: center; color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.95rem; border-radius: 999px; border: 1px solid #bfdbfe; transition: background 0.15s ease, border 0.15s ease; }
        .nav-links a:hover { background: #bfdbfe; border-color: #93c5fd; }
        .nav-links span { color: #475569; font-size: 0.9rem; }
        .logout-form { display: inline; }
        .logout-form button { padding: 0.45rem 1rem; border: none; border-radius: 999px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; transition: background 0.15s ease; }
        .logout-form button:hover { background: #1d4ed8; }
        main { padding: 2rem 1.5rem; max-width: 960px; margin: 0 auto; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 2rem; }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-bottom: 0.5rem; font-weight: 600; color: #0f172a; }
        input[type="file"] { width: 100%; padding: 0.75rem; border-radius: 8px; border: 1px dashed #cbd5f5; background: #f8fafc; box-sizing: border-box; }
        button { padding: 0.85rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; transition: background 0.15s ease; }
        button:hover { background: #1d4ed8; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        button.danger { background: #dc2626; padding: 0.45rem 0.9rem; font-size: 0.85rem; }
        button.danger:hover { background: #b91c1c; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; overflow: hidden; }
        th, td { padding: 0.75rem 1rem; border-bottom: 1px solid #e2e8f0; text-align: left; font-size: 0.95rem; }
        th { background: #f1f5f9; color: #0f172a; font-weight: 600; }
        td a { color: #2563eb; text-decoration: none; font-weight: 600; }
        td a:hover { text-decoration: underline; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .status-tag { display: inline-flex; align-items: center; gap: 0.4rem; padding: 0.25rem 0.75rem; border-radius: 999px; font-size: 0.85rem; font-weight: 600; }
        .status-tag.pending { background: #fef3c7; color: #92400e; }
        .status-tag.processing { background: #e0f2fe; color: #1d4ed8; }
        .status-tag.completed { background: #dcfce7; color: #166534; }
        .status-tag.failed { background: #fee2e2; color: #b91c1c; }
        .meta-grid { display: grid; gap: 1rem; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); margin-bottom: 1.5rem; }
        .meta-card { background: #f1f5f9; border-radius: 10px; padding: 1rem; }
        .meta-card .meta-label { color: #64748b; font-size: 0.85rem; margin: 0 0 0.35rem; }
        .meta-card .meta-value { font-size: 1.1rem; font-weight: 600; margin: 0; }
        .summary-content { background: #f8fafc; border-radius: 10px; padding: 1.25rem; white-space: pre-wrap; line-height: 1.7; }
        .back-link { display: inline-flex; align-items: center; gap: 0.4rem; color: #1d4ed8; text-decoration: none; font-weight: 600; margin-bottom: 1rem; }
        .back-link:hover { text-decoration: underline; }
        .pagination { display: flex; gap: 1rem; margin-top: 1.5rem; }
        .pagination a { color: #2563eb; text-decoration: none; font-weight: 600; }
        .empty-state { text-align: center; padding: 3rem 1rem; color: #475569; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            header { padding: 1.25rem 1rem; }
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
            table { font-size: 0.9rem; }
            th, td { padding: 0.5rem; }
        }
"#;

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub user_label: &'a str,
    pub flash_html: String,
    pub body_html: String,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        heading,
        user_label,
        flash_html,
        body_html,
    } = layout;

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{heading}</h1>
            <div class="nav-links">
                <a href="/upload">上传 PDF</a>
                <a href="/documents">文档列表</a>
                <a href="/summaries">摘要列表</a>
                <span>当前登录：<strong>{user_label}</strong></span>
                <form class="logout-form" method="post" action="/logout">
                    <button type="submit">退出登录</button>
                </form>
            </div>
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        meta_title = meta_title,
        heading = heading,
        user_label = user_label,
        flash_html = flash_html,
        body_html = body_html,
        styles = PAGE_BASE_STYLES,
        footer = footer,
    )
}

pub struct AuthPageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub description: &'a str,
    pub flash_html: String,
    pub form_html: String,
    pub switch_html: &'a str,
}

pub fn render_auth_page(layout: AuthPageLayout<'_>) -> String {
    let AuthPageLayout {
        meta_title,
        heading,
        description,
        flash_html,
        form_html,
        switch_html,
    } = layout;

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
        :root {{ color-scheme: light; }}
        body {{ font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; gap: 1.5rem; }}
        main {{ width: 100%; max-width: 480px; display: flex; flex-direction: column; align-items: center; gap: 1.5rem; }}
        .panel {{ background: #ffffff; padding: 2.5rem 2.25rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); width: 100%; border: 1px solid #e2e8f0; box-sizing: border-box; }}
        h1 {{ margin: 0 0 1rem; font-size: 1.8rem; text-align: center; }}
        p.description {{ margin: 0 0 1.75rem; color: #475569; text-align: center; font-size: 0.95rem; }}
        label {{ display: block; margin-top: 1.2rem; font-weight: 600; letter-spacing: 0.01em; color: #0f172a; }}
        input {{ width: 100%; padding: 0.85rem; margin-top: 0.65rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; font-size: 1rem; box-sizing: border-box; }}
        input:focus {{ outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.15); }}
        button {{ margin-top: 2rem; width: 100%; padding: 0.95rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; transition: background 0.15s ease; }}
        button:hover {{ background: #1d4ed8; }}
        .flash {{ padding: 0.85rem 1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; border: 1px solid transparent; }}
        .flash.success {{ background: #ecfdf3; border-color: #bbf7d0; color: #166534; }}
        .flash.error {{ background: #fef2f2; border-color: #fecaca; color: #b91c1c; }}
        .switch {{ margin-top: 1.5rem; text-align: center; font-size: 0.95rem; color: #475569; }}
        .switch a {{ color: #2563eb; text-decoration: none; font-weight: 600; }}
        .switch a:hover {{ text-decoration: underline; }}
        .app-footer {{ margin-top: 2.5rem; text-align: center; font-size: 0.85rem; color: #64748b; }}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            <h1>{heading}</h1>
            <p class="description">{description}</p>
            {flash_html}
            {form_html}
            <p class="switch">{switch_html}</p>
        </section>
        {footer}
    </main>
</body>
</html>"#,
        meta_title = meta_title,
        heading = heading,
        description = description,
        flash_html = flash_html,
        form_html = form_html,
        switch_html = switch_html,
        footer = footer,
    )
}

/// Blocking page shown while the identity fetch for a held token is still in
/// flight; refreshes itself until the guard can re-evaluate.
pub fn render_loading_page() -> String {
    r#"<!DOCTYPE html>
<html lang="zh-CN">
<head>
    <meta charset="UTF-8">
    <title>正在加载 | PDF 摘要助手</title>
    <meta http-equiv="refresh" content="1">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body { font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; gap: 1.25rem; }
        .spinner { width: 3rem; height: 3rem; border: 4px solid #e2e8f0; border-bottom-color: #2563eb; border-radius: 50%; animation: spin 0.9s linear infinite; }
        @keyframes spin { to { transform: rotate(360deg); } }
        p { color: #475569; }
    </style>
</head>
<body>
    <div class="spinner"></div>
    <p>正在确认登录状态，请稍候…</p>
</body>
</html>"#
        .to_string()
}

pub fn flash_success(message: &str) -> String {
    format!(r#"<div class="flash success">{}</div>"#, escape_html(message))
}

pub fn flash_error(message: &str) -> String {
    format!(r#"<div class="flash error">{}</div>"#, escape_html(message))
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© 2025-{year} PDF 摘要助手，仅限内部使用</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn format_datetime(value: NaiveDateTime) -> String {
    value.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_file_size(bytes: i64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;

    let bytes = bytes.max(0) as f64;
    if bytes >= MIB {
        format!("{:.1} MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes / KIB)
    } else {
        format!("{bytes:.0} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html(r#"<b>"x" & 'y'</b>"#),
            "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn format_file_size_picks_sensible_units() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn format_datetime_is_minute_precision() {
        let value = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(8, 30, 59))
            .expect("valid datetime");
        assert_eq!(format_datetime(value), "2024-05-01 08:30");
    }
}
