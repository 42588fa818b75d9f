// 前台 HTML 片段：分类、标签云、最近文章、归档、日历、分页、页面列表、友情链接
use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use uuid::Uuid;

use crate::core::blogroll::FeedEntry;
use crate::models::{BlogRollItem, Category, Page, Post};
use crate::utils::{escape_html, excerpt};

/// 生成博客内的链接，`base` 为博客的虚拟路径（主博客为空）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBuilder {
    base: String,
}

impl UrlBuilder {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn home(&self) -> String {
        format!("{}/", self.base)
    }

    pub fn post(&self, slug: &str) -> String {
        format!("{}/post/{}", self.base, slug)
    }

    pub fn page(&self, slug: &str) -> String {
        format!("{}/page/{}", self.base, slug)
    }

    pub fn category(&self, id: Uuid) -> String {
        format!("{}/category/{}", self.base, id)
    }

    pub fn tag(&self, tag: &str) -> String {
        format!("{}/tag/{}", self.base, url_segment(tag))
    }

    pub fn month(&self, year: i32, month: u32) -> String {
        format!("{}/archive/{}/{:02}", self.base, year, month)
    }

    pub fn day(&self, year: i32, month: u32, day: u32) -> String {
        format!("{}/archive/{}/{:02}/{:02}", self.base, year, month, day)
    }

    pub fn rss(&self) -> String {
        format!("{}/feed/rss", self.base)
    }

    pub fn atom(&self) -> String {
        format!("{}/feed/atom", self.base)
    }
}

/// 对路径片段做百分号编码
fn url_segment(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// 分类列表，子分类嵌套显示
pub fn category_list(categories: &[Category], posts: &[Post], show_counts: bool, urls: &UrlBuilder) -> String {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for post in posts {
        for id in &post.categories {
            *counts.entry(*id).or_default() += 1;
        }
    }
    let mut sorted: Vec<&Category> = categories.iter().collect();
    sorted.sort_by_key(|c| c.title.to_lowercase());

    // 父分类不存在的按顶级处理
    let parent_of = |c: &Category| c.parent_id.filter(|p| categories.iter().any(|x| x.id == *p));

    let mut html = String::new();
    render_categories(None, &sorted, &parent_of, &counts, show_counts, urls, 0, &mut html);
    html
}

#[allow(clippy::too_many_arguments)]
fn render_categories<F>(
    parent: Option<Uuid>,
    all: &[&Category],
    parent_of: &F,
    counts: &HashMap<Uuid, usize>,
    show_counts: bool,
    urls: &UrlBuilder,
    depth: usize,
    html: &mut String,
) where
    F: Fn(&Category) -> Option<Uuid>,
{
    let children: Vec<&&Category> = all.iter().filter(|c| parent_of(**c) == parent).collect();
    if children.is_empty() || depth > all.len() {
        return;
    }
    html.push_str("<ul>");
    for category in children {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            urls.category(category.id),
            escape_html(&category.title)
        ));
        if show_counts {
            html.push_str(&format!(" ({})", counts.get(&category.id).copied().unwrap_or(0)));
        }
        render_categories(Some(category.id), all, parent_of, counts, show_counts, urls, depth + 1, html);
        html.push_str("</li>");
    }
    html.push_str("</ul>");
}

/// 标签云的权重等级
fn tag_weight(count: usize, max: usize) -> &'static str {
    let weight = count as f64 / max.max(1) as f64 * 100.0;
    if weight >= 99.0 {
        "biggest"
    } else if weight >= 70.0 {
        "big"
    } else if weight >= 40.0 {
        "medium"
    } else if weight >= 20.0 {
        "small"
    } else {
        "smallest"
    }
}

/// 标签云，只显示出现次数不少于 `min_count` 的标签
pub fn tag_cloud(posts: &[Post], min_count: usize, urls: &UrlBuilder) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for post in posts {
        for tag in &post.tags {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
    }
    counts.retain(|_, count| *count >= min_count.max(1));
    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return String::new();
    }

    let mut html = String::from("<ul class=\"tags\">");
    for (tag, count) in counts {
        html.push_str(&format!(
            "<li><a href=\"{}\" class=\"{}\" title=\"{}\">{}</a></li>",
            urls.tag(tag),
            tag_weight(count, max),
            count,
            escape_html(tag)
        ));
    }
    html.push_str("</ul>");
    html
}

/// 最近发布的文章
pub fn recent_posts(posts: &[Post], count: usize, urls: &UrlBuilder) -> String {
    let mut recent: Vec<&Post> = posts.iter().collect();
    recent.sort_by(|a, b| b.date_created.cmp(&a.date_created));
    if recent.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>");
    for post in recent.into_iter().take(count) {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>",
            urls.post(&post.slug),
            escape_html(&post.title)
        ));
    }
    html.push_str("</ul>");
    html
}

/// 最近的已审核评论
pub fn recent_comments(posts: &[Post], count: usize, urls: &UrlBuilder) -> String {
    let mut comments: Vec<_> = posts
        .iter()
        .flat_map(|p| p.approved_comments().map(move |c| (p, c)))
        .collect();
    comments.sort_by(|a, b| b.1.date_created.cmp(&a.1.date_created));
    if comments.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>");
    for (post, comment) in comments.into_iter().take(count) {
        html.push_str(&format!(
            "<li><span class=\"author\">{}</span> on <a href=\"{}#id_{}\">{}</a>: {}</li>",
            escape_html(&comment.author),
            urls.post(&post.slug),
            comment.id,
            escape_html(&post.title),
            escape_html(&excerpt(&comment.content, 60))
        ));
    }
    html.push_str("</ul>");
    html
}

/// 按月归档，最近的月份在前
pub fn month_list(posts: &[Post], urls: &UrlBuilder) -> String {
    let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for post in posts {
        *months
            .entry((post.date_created.year(), post.date_created.month()))
            .or_default() += 1;
    }
    if months.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>");
    for ((year, month), count) in months.into_iter().rev() {
        let label = NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", year, month));
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a> ({})</li>",
            urls.month(year, month),
            label,
            count
        ));
    }
    html.push_str("</ul>");
    html
}

/// 月历，有文章的日期链接到当天的归档
pub fn calendar(posts: &[Post], year: i32, month: u32, urls: &UrlBuilder) -> String {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(first) => first,
        None => return String::new(),
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let days = next.map_or(31, |n| (n - first).num_days()) as u32;
    let prev = first - Duration::days(1);

    let mut with_posts = [false; 32];
    for post in posts {
        let d = post.date_created.date_naive();
        if d.year() == year && d.month() == month {
            with_posts[d.day() as usize] = true;
        }
    }

    let mut html = String::from("<table class=\"calendar\"><caption>");
    html.push_str(&format!(
        "<a href=\"{}\">&lt;</a> {} ",
        urls.month(prev.year(), prev.month()),
        first.format("%B %Y")
    ));
    if let Some(next) = next {
        html.push_str(&format!("<a href=\"{}\">&gt;</a>", urls.month(next.year(), next.month())));
    }
    html.push_str("</caption><tr>");
    for name in ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"] {
        html.push_str(&format!("<th>{}</th>", name));
    }
    html.push_str("</tr><tr>");

    let offset = first.weekday().num_days_from_sunday();
    for _ in 0..offset {
        html.push_str("<td></td>");
    }
    for day in 1..=days {
        if day > 1 && (offset + day - 1) % 7 == 0 {
            html.push_str("</tr><tr>");
        }
        if with_posts[day as usize] {
            html.push_str(&format!(
                "<td class=\"has-posts\"><a href=\"{}\">{}</a></td>",
                urls.day(year, month, day),
                day
            ));
        } else {
            html.push_str(&format!("<td>{}</td>", day));
        }
    }
    let trailing = (7 - (offset + days) % 7) % 7;
    for _ in 0..trailing {
        html.push_str("<td></td>");
    }
    html.push_str("</tr></table>");
    html
}

/// 分页导航，`base_url` 为第一页的地址
pub fn pager(current: usize, total_pages: usize, base_url: &str) -> String {
    if total_pages <= 1 {
        return String::new();
    }
    let link = |n: usize| {
        if n == 1 {
            base_url.to_string()
        } else {
            let sep = if base_url.contains('?') { '&' } else { '?' };
            format!("{}{}page={}", base_url, sep, n)
        }
    };

    let mut html = String::from("<div class=\"pager\">");
    if current > 1 {
        html.push_str(&format!("<a class=\"prev\" href=\"{}\">&laquo; Newer</a>", link(current - 1)));
    }
    for n in 1..=total_pages {
        if n == current {
            html.push_str(&format!("<span class=\"current\">{}</span>", n));
        } else {
            html.push_str(&format!("<a href=\"{}\">{}</a>", link(n), n));
        }
    }
    if current < total_pages {
        html.push_str(&format!("<a class=\"next\" href=\"{}\">Older &raquo;</a>", link(current + 1)));
    }
    html.push_str("</div>");
    html
}

/// 页面列表，只包含可公开访问且 `show_in_list` 的页面
pub fn page_list(pages: &[Page], urls: &UrlBuilder) -> String {
    let mut visible: Vec<&Page> = pages
        .iter()
        .filter(|p| p.is_visible_to_public() && p.show_in_list)
        .collect();
    visible.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.title.cmp(&b.title)));

    fn branch(parent: Option<Uuid>, all: &[&Page], urls: &UrlBuilder, depth: usize) -> String {
        let children: Vec<&&Page> = all
            .iter()
            .filter(|p| {
                p.parent_id == parent
                    // 父页面不可见时挂到顶层
                    || (parent.is_none() && p.parent_id.map_or(false, |id| !all.iter().any(|x| x.id == id)))
            })
            .collect();
        if children.is_empty() || depth > all.len() {
            return String::new();
        }
        let mut html = String::from("<ul>");
        for page in children {
            html.push_str(&format!(
                "<li><a href=\"{}\">{}</a>{}</li>",
                urls.page(&page.slug),
                escape_html(&page.title),
                branch(Some(page.id), all, urls, depth + 1)
            ));
        }
        html.push_str("</ul>");
        html
    }

    branch(None, &visible, urls, 0)
}

/// 友情链接，附带每个订阅的最新条目
pub fn blogroll(items: &[BlogRollItem], feeds: &HashMap<Uuid, Vec<FeedEntry>>, visible: usize) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul class=\"blogroll\">");
    for item in items {
        let rel = if item.xfn.trim().is_empty() {
            String::new()
        } else {
            format!(" rel=\"{}\"", escape_html(item.xfn.trim()))
        };
        html.push_str(&format!(
            "<li><a href=\"{}\" title=\"{}\"{}>{}</a>",
            escape_html(&item.blog_url),
            escape_html(&item.description),
            rel,
            escape_html(&item.title)
        ));
        if let Some(entries) = feeds.get(&item.id).filter(|e| !e.is_empty()) {
            html.push_str("<ul>");
            for entry in entries.iter().take(visible) {
                html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>",
                    escape_html(&entry.link),
                    escape_html(&entry.title)
                ));
            }
            html.push_str("</ul>");
        }
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    html
}

/// 文本框，内容原样输出
pub fn text_box(content: &str) -> String {
    format!("<div class=\"content\">{}</div>", content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post(title: &str, tags: &[&str], y: i32, m: u32, d: u32) -> Post {
        let mut post = Post::new(title, "admin");
        post.slug = crate::utils::slugify(title);
        post.is_published = true;
        post.tags = tags.iter().map(|t| t.to_string()).collect();
        post.date_created = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        post
    }

    #[test]
    fn urls_respect_virtual_path() {
        let urls = UrlBuilder::new("/team/");
        assert_eq!(urls.home(), "/team/");
        assert_eq!(urls.post("hello"), "/team/post/hello");
        assert_eq!(urls.tag("rust lang"), "/team/tag/rust%20lang");
        assert_eq!(UrlBuilder::new("").month(2024, 3), "/archive/2024/03");
    }

    #[test]
    fn tag_cloud_weights_and_minimum() {
        let posts = vec![
            post("a", &["rust", "web"], 2024, 1, 1),
            post("b", &["rust"], 2024, 1, 2),
            post("c", &["rust", "misc"], 2024, 1, 3),
        ];
        let urls = UrlBuilder::default();
        let html = tag_cloud(&posts, 1, &urls);
        assert!(html.contains("class=\"biggest\" title=\"3\">rust"));
        assert!(html.contains("class=\"small\"") || html.contains("class=\"medium\""));

        let only_popular = tag_cloud(&posts, 2, &urls);
        assert!(only_popular.contains("rust"));
        assert!(!only_popular.contains("web"));
    }

    #[test]
    fn category_list_nests_children_with_counts() {
        let parent = Category::new("Programming");
        let mut child = Category::new("Rust");
        child.parent_id = Some(parent.id);
        let mut p = post("a", &[], 2024, 1, 1);
        p.categories = vec![child.id];

        let html = category_list(&[child.clone(), parent.clone()], &[p], true, &UrlBuilder::default());
        let outer = html.find("Programming").unwrap();
        let inner = html.find("Rust").unwrap();
        assert!(outer < inner);
        assert!(html.contains("Rust</a> (1)"));
        assert!(html.contains("Programming</a> (0)<ul>"));
    }

    #[test]
    fn month_list_newest_first() {
        let posts = vec![post("a", &[], 2023, 12, 5), post("b", &[], 2024, 2, 1), post("c", &[], 2024, 2, 9)];
        let html = month_list(&posts, &UrlBuilder::default());
        let feb = html.find("February 2024").unwrap();
        let dec = html.find("December 2023").unwrap();
        assert!(feb < dec);
        assert!(html.contains("/archive/2024/02\">February 2024</a> (2)"));
    }

    #[test]
    fn calendar_links_days_with_posts() {
        let posts = vec![post("a", &[], 2024, 2, 14)];
        let html = calendar(&posts, 2024, 2, &UrlBuilder::default());
        assert!(html.contains("<a href=\"/archive/2024/02/14\">14</a>"));
        assert!(html.contains("<td>29</td>"));
        assert!(!html.contains("<td>30</td>"));
        // 2024-02-01 是星期四
        assert!(html.contains("</tr><tr><td></td><td></td><td></td><td></td><td>1</td>"));
    }

    #[test]
    fn pager_builds_query_links() {
        assert_eq!(pager(1, 1, "/"), "");
        let html = pager(2, 3, "/");
        assert!(html.contains("href=\"/\">&laquo; Newer"));
        assert!(html.contains("<span class=\"current\">2</span>"));
        assert!(html.contains("href=\"/?page=3\">Older"));
        assert!(pager(1, 2, "/?q=x").contains("/?q=x&page=2"));
    }

    #[test]
    fn page_list_hides_unlisted_pages() {
        let mut about = Page::new("About");
        about.slug = "about".into();
        about.is_published = true;
        let mut team = Page::new("Team");
        team.slug = "team".into();
        team.is_published = true;
        team.parent_id = Some(about.id);
        let mut hidden = Page::new("Hidden");
        hidden.is_published = true;
        hidden.show_in_list = false;

        let html = page_list(&[about, team, hidden], &UrlBuilder::default());
        assert!(html.contains("About</a><ul><li><a href=\"/page/team\">Team"));
        assert!(!html.contains("Hidden"));
    }

    #[test]
    fn blogroll_shows_feed_entries() {
        let item = BlogRollItem {
            id: Uuid::new_v4(),
            title: "Friend".into(),
            description: "a friend".into(),
            blog_url: "http://friend.example".into(),
            feed_url: "http://friend.example/rss".into(),
            xfn: "friend".into(),
            sort_index: 0,
        };
        let mut feeds = HashMap::new();
        feeds.insert(
            item.id,
            vec![FeedEntry {
                title: "Hello".into(),
                link: "http://friend.example/hello".into(),
                published: None,
            }],
        );
        let html = blogroll(&[item], &feeds, 3);
        assert!(html.contains("rel=\"friend\">Friend</a><ul><li><a href=\"http://friend.example/hello\">Hello"));
    }
}
