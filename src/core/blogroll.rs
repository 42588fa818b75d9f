//! 友情链接订阅抓取
//!
//! 后台任务按每个博客的 `blogroll_update_minutes` 抓取友情链接的订阅源，
//! 只保留最新的 `blogroll_visible_posts` 条。抓取失败时保留上一次的结果。

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use atom_syndication::Feed;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use rss::Channel;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::{BlogInstance, Site};
use crate::models::config::BlogRollConfig;

/// 调度检查间隔
const TICK: Duration = Duration::from_secs(60);

/// 订阅源中的一条
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

/// 解析 RSS 或 Atom 订阅，按发布时间倒序保留前 `limit` 条
pub fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<FeedEntry>> {
    let mut entries = match Channel::read_from(Cursor::new(body)) {
        Ok(channel) => channel
            .items()
            .iter()
            .map(|item| FeedEntry {
                title: item.title().unwrap_or_default().trim().to_string(),
                link: item.link().unwrap_or_default().trim().to_string(),
                published: item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                    .map(|d| d.with_timezone(&Utc)),
            })
            .collect::<Vec<_>>(),
        Err(rss_error) => {
            let feed = Feed::read_from(Cursor::new(body))
                .map_err(|atom_error| anyhow!("无法解析订阅: {}; {}", rss_error, atom_error))?;
            feed.entries()
                .iter()
                .map(|entry| FeedEntry {
                    title: entry.title().value.trim().to_string(),
                    link: entry
                        .links()
                        .iter()
                        .find(|l| l.rel() == "alternate")
                        .or_else(|| entry.links().first())
                        .map(|l| l.href().to_string())
                        .unwrap_or_default(),
                    published: Some(
                        entry
                            .published()
                            .copied()
                            .unwrap_or_else(|| *entry.updated())
                            .with_timezone(&Utc),
                    ),
                })
                .collect()
        }
    };

    entries.retain(|e| !e.title.is_empty() || !e.link.is_empty());
    entries.sort_by(|a, b| b.published.cmp(&a.published));
    entries.truncate(limit);
    Ok(entries)
}

/// 友情链接抓取器
pub struct BlogRollFetcher {
    site: Arc<Site>,
    client: Client,
    /// 每个博客上次刷新的时间
    refreshed: Mutex<HashMap<Uuid, Instant>>,
}

impl BlogRollFetcher {
    pub fn new(site: Arc<Site>, config: &BlogRollConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .context("创建 HTTP 客户端失败")?;
        Ok(Self {
            site,
            client,
            refreshed: Mutex::new(HashMap::new()),
        })
    }

    /// 在后台定期刷新已加载的博客
    pub fn spawn(self) -> JoinHandle<()> {
        info!("友情链接抓取任务已启动");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            loop {
                ticker.tick().await;
                self.refresh_due().await;
            }
        })
    }

    /// 刷新所有到期的博客
    pub async fn refresh_due(&self) {
        for instance in self.site.loaded_instances() {
            let period = Duration::from_secs(instance.settings.read().blogroll_update_minutes.max(1) * 60);
            let due = self
                .refreshed
                .lock()
                .get(&instance.id())
                .map_or(true, |last| last.elapsed() >= period);
            if due {
                self.refresh(&instance).await;
                self.refreshed.lock().insert(instance.id(), Instant::now());
            }
        }
    }

    /// 抓取一个博客的全部友情链接订阅，返回成功的数量
    pub async fn refresh(&self, instance: &BlogInstance) -> usize {
        let items = instance.blogroll.read().clone();
        let limit = instance.settings.read().blogroll_visible_posts;
        let mut updated = 0;

        for item in items.iter().filter(|i| !i.feed_url.trim().is_empty()) {
            match self.fetch(&item.feed_url, limit).await {
                Ok(entries) => {
                    debug!("友情链接 {} 获取到 {} 条", item.title, entries.len());
                    instance.blogroll_feeds.write().insert(item.id, entries);
                    updated += 1;
                }
                Err(e) => warn!("抓取友情链接 {} 失败: {:#}", item.feed_url, e),
            }
        }
        if updated > 0 {
            instance.touch();
        }
        updated
    }

    async fn fetch(&self, url: &str, limit: usize) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("请求失败: {}", url))?
            .error_for_status()?;
        let body = response.bytes().await?;
        parse_feed(&body, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Friend</title><link>http://friend.example</link><description>d</description>
<item><title>Older</title><link>http://friend.example/1</link><pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate></item>
<item><title>Newest</title><link>http://friend.example/3</link><pubDate>Wed, 03 Jan 2024 10:00:00 +0000</pubDate></item>
<item><title>Middle</title><link>http://friend.example/2</link><pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate></item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom friend</title><id>urn:x</id><updated>2024-01-02T00:00:00Z</updated>
<entry><title>Only entry</title><id>urn:x:1</id><updated>2024-01-02T00:00:00Z</updated><link rel="alternate" href="http://atom.example/1"/></entry>
</feed>"#;

    #[test]
    fn keeps_newest_rss_items() {
        let entries = parse_feed(RSS.as_bytes(), 2).unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest", "Middle"]);
        assert_eq!(entries[0].link, "http://friend.example/3");
    }

    #[test]
    fn falls_back_to_atom() {
        let entries = parse_feed(ATOM.as_bytes(), 5).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "http://atom.example/1");
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_feed(b"not a feed", 3).is_err());
    }
}
