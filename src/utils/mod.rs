use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub mod markdown;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid html tag regex"));

/// 从标题生成 URL 友好的别名
pub fn slugify(text: &str) -> String {
    slug::slugify(text)
}

/// 生成不与已有别名冲突的别名，冲突时追加 -2、-3 ...
pub fn unique_slug<F>(title: &str, requested: &str, exists: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = if requested.trim().is_empty() {
        slugify(title)
    } else {
        slugify(requested)
    };
    let base = if base.is_empty() { "untitled".to_string() } else { base };

    if !exists(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// HTML 转义
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 去掉 HTML 标签
pub fn strip_html(html: &str) -> String {
    TAG_RE.replace_all(html, "").trim().to_string()
}

/// 截取摘要，不截断字符
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let plain = strip_html(text);
    if plain.chars().count() <= max_chars {
        return plain;
    }
    let cut: String = plain.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// 简单的邮箱格式检查
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// 解析可以放进链接的网址，只接受 http 与 https
pub fn parse_web_url(text: &str) -> Result<Url, String> {
    let url = Url::parse(text.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("不支持的协议 {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_slug_appends_counter() {
        let taken = ["hello-world", "hello-world-2"];
        let slug = unique_slug("Hello World", "", |s| taken.contains(&s));
        assert_eq!(slug, "hello-world-3");
        assert_eq!(unique_slug("x", "Custom Slug", |_| false), "custom-slug");
        assert_eq!(unique_slug("!!!", "", |_| false), "untitled");
    }

    #[test]
    fn escape_and_strip() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
        assert_eq!(strip_html("<p>Hello <b>there</b></p>"), "Hello there");
        assert_eq!(excerpt("<p>abcdef</p>", 3), "abc...");
    }

    #[test]
    fn email_check() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
    }

    #[test]
    fn web_url_check() {
        assert!(parse_web_url("https://example.com/blog").is_ok());
        assert!(parse_web_url(" http://example.com ").is_ok());
        assert!(parse_web_url("javascript:alert(1)").is_err());
        assert!(parse_web_url("data:text/html,hi").is_err());
        assert!(parse_web_url("example.com").is_err());
    }
}
