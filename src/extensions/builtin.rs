// 内置扩展
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{Extension, ExtensionEvent, Serving, ServingLocation};
use crate::models::{ExtensionParameter, ExtensionSettings};

/// 把评论中的 BBCode 转换为 HTML
pub struct BBCodeExtension;

const BBCODE_TAGS: [(&str, &str, &str); 5] = [
    ("b", "<strong>", "</strong>"),
    ("i", "<em>", "</em>"),
    ("u", "<span style=\"text-decoration:underline\">", "</span>"),
    ("quote", "<blockquote>", "</blockquote>"),
    ("code", "<pre><code>", "</code></pre>"),
];

impl Extension for BBCodeExtension {
    fn name(&self) -> &str {
        "BBCode"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Converts BBCode to XHTML in the comments"
    }

    fn on_serving(&self, serving: &mut Serving, _settings: &[ExtensionSettings]) -> Result<()> {
        if serving.location != ServingLocation::Comment {
            return Ok(());
        }
        let mut body = serving.body.clone();
        for (tag, open, close) in BBCODE_TAGS {
            body = replace_pair(&body, tag, open, close);
        }
        serving.body = body;
        Ok(())
    }
}

/// 只替换成对出现的标签，落单的标签原样保留
fn replace_pair(input: &str, tag: &str, open: &str, close: &str) -> String {
    let open_tag = format!("[{}]", tag);
    let close_tag = format!("[/{}]", tag);
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(&open_tag) {
        let after_open = &rest[start + open_tag.len()..];
        match after_open.find(&close_tag) {
            Some(end) => {
                output.push_str(&rest[..start]);
                output.push_str(open);
                output.push_str(&after_open[..end]);
                output.push_str(close);
                rest = &after_open[end + close_tag.len()..];
            }
            None => break,
        }
    }
    output.push_str(rest);
    output
}

/// 裸链接，已在属性或标签内的链接不匹配
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[\s(>])((?:https?://|www\.)[^\s<>"']+)"#).expect("valid url regex")
});

/// 把评论中的裸链接转换为超链接
pub struct ResolveLinksExtension;

impl ResolveLinksExtension {
    fn resolve(body: &str) -> String {
        URL_RE
            .replace_all(body, |caps: &regex::Captures<'_>| {
                let url = caps[2].trim_end_matches(['.', ',', ')', ';', ':']);
                let tail = &caps[2][url.len()..];
                let href = if url.starts_with("www.") {
                    format!("http://{}", url)
                } else {
                    url.to_string()
                };
                format!(
                    "{}<a href=\"{}\" rel=\"nofollow\">{}</a>{}",
                    &caps[1], href, url, tail
                )
            })
            .into_owned()
    }
}

impl Extension for ResolveLinksExtension {
    fn name(&self) -> &str {
        "ResolveLinks"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Auto resolves URLs in the comments and turns them into links"
    }

    fn default_priority(&self) -> i32 {
        // 在 BBCode 之后执行
        10
    }

    fn on_serving(&self, serving: &mut Serving, _settings: &[ExtensionSettings]) -> Result<()> {
        if serving.location == ServingLocation::Comment {
            serving.body = Self::resolve(&serving.body);
        }
        Ok(())
    }
}

/// 按屏蔽词过滤评论
pub struct CommentFilterExtension;

/// 屏蔽词表
pub const FILTERS_SETTINGS: &str = "filters";
/// 匹配后的处理方式
pub const ACTION_SETTINGS: &str = "action";

impl CommentFilterExtension {
    fn blocked_words(settings: &[ExtensionSettings]) -> Vec<String> {
        settings
            .iter()
            .find(|s| s.name == FILTERS_SETTINGS)
            .and_then(|s| s.parameter("word"))
            .map(|p| {
                p.values
                    .iter()
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn rejects(settings: &[ExtensionSettings]) -> bool {
        settings
            .iter()
            .find(|s| s.name == ACTION_SETTINGS)
            .and_then(|s| s.value("mode"))
            .map(|mode| mode.eq_ignore_ascii_case("reject"))
            .unwrap_or(false)
    }
}

impl Extension for CommentFilterExtension {
    fn name(&self) -> &str {
        "CommentFilter"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Marks comments containing blocked words as spam"
    }

    fn default_priority(&self) -> i32 {
        -10
    }

    fn default_settings(&self) -> Vec<ExtensionSettings> {
        let mut filters = ExtensionSettings::new(FILTERS_SETTINGS);
        filters.help = "Comments containing any of these words are filtered".to_string();
        filters.is_scalar = false;
        let mut word = ExtensionParameter::new("word", "Blocked word");
        word.key_field = true;
        word.required = true;
        filters.parameters.push(word);

        let mut action = ExtensionSettings::new(ACTION_SETTINGS);
        let mut mode = ExtensionParameter::new("mode", "spam or reject");
        mode.values = vec!["spam".to_string()];
        action.parameters.push(mode);

        vec![filters, action]
    }

    fn on_event(&self, event: &mut ExtensionEvent<'_>, settings: &[ExtensionSettings]) -> Result<()> {
        let ExtensionEvent::CommentAdding(args) = event else {
            return Ok(());
        };

        let words = Self::blocked_words(settings);
        let text = format!("{} {} {}", args.comment.author, args.comment.website, args.comment.content)
            .to_lowercase();
        let Some(hit) = words.iter().find(|w| text.contains(w.as_str())) else {
            return Ok(());
        };

        debug!("评论包含屏蔽词: {}", hit);
        if Self::rejects(settings) {
            args.cancel = true;
        } else {
            args.comment.is_spam = true;
            args.comment.is_approved = false;
            args.comment.moderated_by = self.name().to_string();
        }
        args.reason = Some(format!("blocked word: {}", hit));
        Ok(())
    }
}

/// 文章列表中按 [more] 截断正文
pub struct BreakPostExtension;

/// 截断标记
pub const MORE_MARKER: &str = "[more]";

impl Extension for BreakPostExtension {
    fn name(&self) -> &str {
        "BreakPost"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn description(&self) -> &str {
        "Breaks a post where [more] is found in the body and adds a link to the full post"
    }

    fn on_serving(&self, serving: &mut Serving, _settings: &[ExtensionSettings]) -> Result<()> {
        match serving.location {
            ServingLocation::PostList => {
                if let Some(index) = serving.body.find(MORE_MARKER) {
                    let excerpt = serving.body[..index].trim_end().to_string();
                    serving.body = format!(
                        "{}<p><a class=\"more\" href=\"{}#continue\">Read more</a></p>",
                        excerpt, serving.url
                    );
                }
            }
            ServingLocation::Post => {
                serving.body = serving
                    .body
                    .replacen(MORE_MARKER, "<span id=\"continue\"></span>", 1);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::CommentAdding;
    use crate::models::Comment;
    use uuid::Uuid;

    fn comment_serving(body: &str) -> Serving {
        Serving::new(ServingLocation::Comment, body, "/post/x")
    }

    #[test]
    fn bbcode_replaces_only_closed_tags() {
        let mut serving = comment_serving("[b]bold[/b] and [i]open");
        BBCodeExtension.on_serving(&mut serving, &[]).unwrap();
        assert_eq!(serving.body, "<strong>bold</strong> and [i]open");
    }

    #[test]
    fn bbcode_leaves_posts_alone() {
        let mut serving = Serving::new(ServingLocation::Post, "[b]x[/b]", "/post/x");
        BBCodeExtension.on_serving(&mut serving, &[]).unwrap();
        assert_eq!(serving.body, "[b]x[/b]");
    }

    #[test]
    fn resolve_links_wraps_bare_urls() {
        let ext = ResolveLinksExtension;
        let mut serving = comment_serving("see http://example.com/a. or www.rust-lang.org");
        ext.on_serving(&mut serving, &[]).unwrap();
        assert_eq!(
            serving.body,
            "see <a href=\"http://example.com/a\" rel=\"nofollow\">http://example.com/a</a>. or \
             <a href=\"http://www.rust-lang.org\" rel=\"nofollow\">www.rust-lang.org</a>"
        );
    }

    #[test]
    fn resolve_links_skips_existing_anchors() {
        let ext = ResolveLinksExtension;
        let html = "<a href=\"http://example.com\">x</a>";
        let mut serving = comment_serving(html);
        ext.on_serving(&mut serving, &[]).unwrap();
        assert_eq!(serving.body, html);
    }

    fn filter_settings(mode: &str) -> Vec<ExtensionSettings> {
        let mut settings = CommentFilterExtension.default_settings();
        settings[0].parameters[0].values = vec!["casino".to_string()];
        settings[1].parameters[0].values = vec![mode.to_string()];
        settings
    }

    #[test]
    fn comment_filter_marks_spam() {
        let mut args = CommentAdding::new(Comment::new(Uuid::new_v4(), "bob", "Visit my CASINO"));
        CommentFilterExtension
            .on_event(&mut ExtensionEvent::CommentAdding(&mut args), &filter_settings("spam"))
            .unwrap();
        assert!(args.comment.is_spam);
        assert!(!args.cancel);
    }

    #[test]
    fn comment_filter_can_reject() {
        let mut args = CommentAdding::new(Comment::new(Uuid::new_v4(), "bob", "casino"));
        CommentFilterExtension
            .on_event(&mut ExtensionEvent::CommentAdding(&mut args), &filter_settings("reject"))
            .unwrap();
        assert!(args.cancel);
        assert!(args.reason.is_some());
    }

    #[test]
    fn break_post_cuts_listing_at_marker() {
        let mut serving = Serving::new(ServingLocation::PostList, "<p>intro</p>[more]<p>rest</p>", "/post/a");
        BreakPostExtension.on_serving(&mut serving, &[]).unwrap();
        assert!(serving.body.starts_with("<p>intro</p><p><a class=\"more\" href=\"/post/a#continue\">"));
        assert!(!serving.body.contains("rest"));

        let mut full = Serving::new(ServingLocation::Post, "a[more]b", "/post/a");
        BreakPostExtension.on_serving(&mut full, &[]).unwrap();
        assert_eq!(full.body, "a<span id=\"continue\"></span>b");
    }
}
