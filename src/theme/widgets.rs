use chrono::{Datelike, Utc};
use tracing::debug;

use super::controls::{self, UrlBuilder};
use crate::core::store::BlogInstance;
use crate::models::{lookup, Post, WidgetEntry, WidgetKind};
use crate::utils::escape_html;

/// 渲染一个小部件区域，每个小部件按实例修订号缓存
pub fn render_zone(instance: &BlogInstance, zone: &str, urls: &UrlBuilder) -> String {
    let widgets = instance
        .widget_zones
        .read()
        .iter()
        .find(|z| z.name.eq_ignore_ascii_case(zone))
        .map(|z| z.widgets.clone())
        .unwrap_or_default();

    let mut html = String::new();
    for widget in &widgets {
        html.push_str(&instance.cached_fragment(widget.id, || {
            debug!("渲染小部件: {} ({})", widget.title, widget.kind);
            render_widget(instance, widget, urls)
        }));
    }
    html
}

/// 渲染单个小部件
pub fn render_widget(instance: &BlogInstance, widget: &WidgetEntry, urls: &UrlBuilder) -> String {
    let posts: Vec<Post> = instance
        .posts
        .read()
        .iter()
        .filter(|p| p.is_visible_to_public())
        .cloned()
        .collect();
    let settings = instance.settings.read().clone();
    let count = |default: usize| {
        lookup(&widget.settings, "count")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    };

    let body = match widget.kind {
        WidgetKind::CategoryList => {
            let show_counts = lookup(&widget.settings, "showcount").map_or(true, |v| v.trim() != "false");
            controls::category_list(&instance.categories.read(), &posts, show_counts, urls)
        }
        WidgetKind::TagCloud => {
            let min_count = lookup(&widget.settings, "mincount")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(1);
            controls::tag_cloud(&posts, min_count, urls)
        }
        WidgetKind::RecentPosts => controls::recent_posts(&posts, count(settings.number_of_recent_posts), urls),
        WidgetKind::RecentComments => {
            controls::recent_comments(&posts, count(settings.number_of_recent_comments), urls)
        }
        WidgetKind::MonthList => controls::month_list(&posts, urls),
        WidgetKind::Calendar => {
            let today = Utc::now();
            controls::calendar(&posts, today.year(), today.month(), urls)
        }
        WidgetKind::PageList => controls::page_list(&instance.pages.read(), urls),
        WidgetKind::BlogRoll => controls::blogroll(
            &instance.blogroll.read(),
            &instance.blogroll_feeds.read(),
            settings.blogroll_visible_posts,
        ),
        WidgetKind::TextBox => controls::text_box(lookup(&widget.settings, "content").unwrap_or("")),
    };

    let mut html = format!("<div class=\"widget {}\" id=\"widget{}\">", widget.kind.css_class(), widget.id);
    if widget.show_title {
        html.push_str(&format!("<h4>{}</h4>", escape_html(&widget.title)));
    }
    html.push_str(&body);
    html.push_str("</div>");
    html
}
