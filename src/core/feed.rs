use anyhow::Result;
use atom_syndication::{Entry, Feed, Link, Text};
use chrono::{FixedOffset, Utc};
use rss::{Channel, Guid, Item};
use uuid::Uuid;

use super::store::BlogInstance;
use crate::extensions::{Serving, ServingLocation};
use crate::models::Post;
use crate::theme::UrlBuilder;
use crate::utils::markdown;

/// 订阅源中最新的公开文章，可按分类筛选
fn feed_posts(instance: &BlogInstance, category: Option<Uuid>) -> Vec<Post> {
    let limit = instance.settings.read().posts_per_feed.max(1);
    let mut posts: Vec<Post> = instance
        .posts
        .read()
        .iter()
        .filter(|p| p.is_visible_to_public())
        .filter(|p| category.map_or(true, |id| p.categories.contains(&id)))
        .cloned()
        .collect();
    posts.sort_by(|a, b| b.date_created.cmp(&a.date_created));
    posts.truncate(limit);
    posts
}

/// 绝对地址，`site_url` 为站点根地址
fn absolute(site_url: &str, path: &str) -> String {
    format!("{}{}", site_url.trim_end_matches('/'), path)
}

fn feed_body(instance: &BlogInstance, post: &Post, link: &str) -> String {
    let mut serving = Serving::new(ServingLocation::Feed, markdown::render(&post.content), link);
    instance.serve(&mut serving);
    serving.body
}

/// 生成 RSS 2.0
pub fn rss(instance: &BlogInstance, site_url: &str, category: Option<Uuid>) -> Result<String> {
    let settings = instance.settings.read().clone();
    let urls = UrlBuilder::new(&instance.blog().normalized_virtual_path());
    let category_names = instance.categories.read().clone();

    let mut channel = Channel::default();
    channel.set_title(settings.name.clone());
    channel.set_link(absolute(site_url, &urls.home()));
    channel.set_description(settings.description.clone());
    channel.set_language(Some(settings.language.clone()));
    channel.set_generator(Some(concat!("rust-blogengine ", env!("CARGO_PKG_VERSION")).to_string()));
    channel.set_last_build_date(Some(Utc::now().to_rfc2822()));

    for post in feed_posts(instance, category) {
        let link = absolute(site_url, &urls.post(&post.slug));
        let mut item = Item::default();
        item.set_title(post.title.clone());
        item.set_link(link.clone());
        item.set_guid(Guid {
            value: link.clone(),
            permalink: true,
        });
        item.set_author(post.author.clone());
        item.set_pub_date(post.date_created.to_rfc2822());
        item.set_description(feed_body(instance, &post, &link));
        item.set_categories(
            post.categories
                .iter()
                .filter_map(|id| category_names.iter().find(|c| c.id == *id))
                .map(|c| rss::Category {
                    name: c.title.clone(),
                    domain: None,
                })
                .collect::<Vec<_>>(),
        );
        channel.items.push(item);
    }

    Ok(channel.to_string())
}

/// 生成 Atom
pub fn atom(instance: &BlogInstance, site_url: &str, category: Option<Uuid>) -> Result<String> {
    let settings = instance.settings.read().clone();
    let urls = UrlBuilder::new(&instance.blog().normalized_virtual_path());
    let utc = FixedOffset::east_opt(0).ok_or_else(|| anyhow::anyhow!("无效的时区偏移"))?;
    let posts = feed_posts(instance, category);

    let mut feed = Feed::default();
    feed.set_title(settings.name.clone());
    feed.set_id(absolute(site_url, &urls.home()));
    if !settings.description.is_empty() {
        feed.set_subtitle(Text::plain(settings.description.clone()));
    }
    feed.set_lang(Some(settings.language.clone()));
    let updated = posts.first().map(|p| p.date_modified).unwrap_or_else(Utc::now);
    feed.set_updated(updated.with_timezone(&utc));

    let mut self_link = Link::default();
    self_link.set_href(absolute(site_url, &urls.atom()));
    self_link.set_rel("self".to_string());
    feed.set_links(vec![self_link]);

    for post in posts {
        let post_url = absolute(site_url, &urls.post(&post.slug));
        let mut entry = Entry::default();
        entry.set_id(post_url.clone());
        entry.set_title(Text::plain(post.title.clone()));

        let mut link = Link::default();
        link.set_href(post_url.clone());
        link.set_rel("alternate".to_string());
        entry.set_links(vec![link]);

        entry.set_updated(post.date_modified.with_timezone(&utc));
        entry.set_published(Some(post.date_created.with_timezone(&utc)));
        entry.set_summary(Some(Text::html(feed_body(instance, &post, &post_url))));
        feed.entries.push(entry);
    }

    Ok(feed.to_string())
}
