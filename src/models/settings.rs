use serde::{Deserialize, Serialize};

use super::types::{default_true, ModerationType};

/// 单个博客的设置，保存在 settings.xml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "settings")]
pub struct BlogSettings {
    /// 博客标题
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 使用的主题
    #[serde(default = "default_theme")]
    pub theme: String,
    /// 每页文章数
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
    /// 订阅源中的文章数
    #[serde(default = "default_posts_per_feed")]
    pub posts_per_feed: usize,
    /// 是否启用评论
    #[serde(default = "default_true")]
    pub enable_comments: bool,
    /// 评论审核模式
    #[serde(default = "default_moderation")]
    pub moderation: ModerationType,
    /// 文章发布多少天后关闭评论，0 表示永不关闭
    #[serde(default)]
    pub days_comments_are_enabled: u32,
    #[serde(default = "default_true")]
    pub enable_rating: bool,
    #[serde(default = "default_recent")]
    pub number_of_recent_posts: usize,
    #[serde(default = "default_recent")]
    pub number_of_recent_comments: usize,
    /// 友情链接每个订阅显示的条目数
    #[serde(default = "default_blogroll_visible")]
    pub blogroll_visible_posts: usize,
    /// 友情链接刷新间隔（分钟）
    #[serde(default = "default_blogroll_minutes")]
    pub blogroll_update_minutes: u64,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub show_description_in_post_list: bool,
}

impl Default for BlogSettings {
    fn default() -> Self {
        Self {
            name: "My Blog".to_string(),
            description: String::new(),
            theme: default_theme(),
            posts_per_page: default_posts_per_page(),
            posts_per_feed: default_posts_per_feed(),
            enable_comments: true,
            moderation: default_moderation(),
            days_comments_are_enabled: 0,
            enable_rating: true,
            number_of_recent_posts: default_recent(),
            number_of_recent_comments: default_recent(),
            blogroll_visible_posts: default_blogroll_visible(),
            blogroll_update_minutes: default_blogroll_minutes(),
            language: default_language(),
            show_description_in_post_list: false,
        }
    }
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_posts_per_page() -> usize {
    10
}

fn default_posts_per_feed() -> usize {
    20
}

fn default_moderation() -> ModerationType {
    ModerationType::Auto
}

fn default_recent() -> usize {
    5
}

fn default_blogroll_visible() -> usize {
    3
}

fn default_blogroll_minutes() -> u64 {
    60
}

fn default_language() -> String {
    "en".to_string()
}
