//! 仓储层与 API 之间传递的数据对象

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    AuthorProfile, Blog, BlogRollItem, Category, Comment, Page, PackageType, Post,
};

/// 文章引用的分类：按 ID 或标题指定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
}

/// 文章列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub author: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    pub is_published: bool,
    pub has_comments_enabled: bool,
    pub categories: Vec<CategoryRef>,
    pub tags: Vec<String>,
    pub comment_count: usize,
    pub pending_count: usize,
}

impl PostItem {
    pub fn from_post(post: &Post, categories: &[Category]) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            author: post.author.clone(),
            date_created: post.date_created,
            date_modified: post.date_modified,
            is_published: post.is_published,
            has_comments_enabled: post.has_comments_enabled,
            categories: category_refs(&post.categories, categories),
            tags: post.tags.clone(),
            comment_count: post.approved_comments().count(),
            pending_count: post.pending_comments().count(),
        }
    }
}

/// 文章详情，同时作为新增和更新的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    /// 为空时使用当前用户
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default = "crate::models::types::default_true")]
    pub has_comments_enabled: bool,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PostDetail {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            slug: String::new(),
            description: String::new(),
            content: content.to_string(),
            author: String::new(),
            date_created: None,
            is_published: false,
            has_comments_enabled: true,
            categories: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn from_post(post: &Post, categories: &[Category]) -> Self {
        Self {
            id: Some(post.id),
            title: post.title.clone(),
            slug: post.slug.clone(),
            description: post.description.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            date_created: Some(post.date_created),
            is_published: post.is_published,
            has_comments_enabled: post.has_comments_enabled,
            categories: category_refs(&post.categories, categories),
            tags: post.tags.clone(),
        }
    }
}

fn category_refs(ids: &[Uuid], categories: &[Category]) -> Vec<CategoryRef> {
    ids.iter()
        .filter_map(|id| categories.iter().find(|c| c.id == *id))
        .map(|c| CategoryRef {
            id: Some(c.id),
            title: c.title.clone(),
        })
        .collect()
}

/// 页面列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageItem {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub is_published: bool,
    pub is_front_page: bool,
    pub show_in_list: bool,
    pub sort_order: i32,
    pub date_created: DateTime<Utc>,
    /// 是否有子页面
    pub has_children: bool,
}

impl PageItem {
    pub fn from_page(page: &Page, all: &[Page]) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            parent_id: page.parent_id,
            is_published: page.is_published,
            is_front_page: page.is_front_page,
            show_in_list: page.show_in_list,
            sort_order: page.sort_order,
            date_created: page.date_created,
            has_children: all
                .iter()
                .any(|p| p.parent_id == Some(page.id) && !p.is_deleted),
        }
    }
}

/// 页面详情，同时作为新增和更新的输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDetail {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub is_front_page: bool,
    #[serde(default = "crate::models::types::default_true")]
    pub show_in_list: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl PageDetail {
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            slug: String::new(),
            description: String::new(),
            keywords: String::new(),
            content: content.to_string(),
            parent_id: None,
            is_published: false,
            is_front_page: false,
            show_in_list: true,
            sort_order: 0,
        }
    }

    pub fn from_page(page: &Page) -> Self {
        Self {
            id: Some(page.id),
            title: page.title.clone(),
            slug: page.slug.clone(),
            description: page.description.clone(),
            keywords: page.keywords.clone(),
            content: page.content.clone(),
            parent_id: page.parent_id,
            is_published: page.is_published,
            is_front_page: page.is_front_page,
            show_in_list: page.show_in_list,
            sort_order: page.sort_order,
        }
    }
}

/// 评论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentItem {
    pub id: Uuid,
    pub post_id: Uuid,
    pub post_title: String,
    pub parent_id: Option<Uuid>,
    pub author: String,
    pub email: String,
    pub website: String,
    pub content: String,
    pub ip: String,
    pub date_created: DateTime<Utc>,
    pub is_approved: bool,
    pub is_spam: bool,
    pub is_deleted: bool,
    pub moderated_by: String,
}

impl CommentItem {
    pub fn from_comment(comment: &Comment, post_title: &str) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            post_title: post_title.to_string(),
            parent_id: comment.parent_id,
            author: comment.author.clone(),
            email: comment.email.clone(),
            website: comment.website.clone(),
            content: comment.content.clone(),
            ip: comment.ip.clone(),
            date_created: comment.date_created,
            is_approved: comment.is_approved,
            is_spam: comment.is_spam,
            is_deleted: comment.is_deleted,
            moderated_by: comment.moderated_by.clone(),
        }
    }
}

/// 新评论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub post_id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    pub content: String,
    #[serde(default)]
    pub ip: String,
}

/// 评论操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "content", rename_all = "camelCase")]
pub enum CommentAction {
    Approve,
    Unapprove,
    Spam,
    NotSpam,
    /// 修改评论内容
    Edit(String),
}

/// 分类及其文章数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub count: usize,
}

impl CategoryItem {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            description: String::new(),
            parent_id: None,
            count: 0,
        }
    }

    pub fn from_category(category: &Category, count: usize) -> Self {
        Self {
            id: Some(category.id),
            title: category.title.clone(),
            description: category.description.clone(),
            parent_id: category.parent_id,
            count,
        }
    }
}

/// 标签及其文章数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagItem {
    pub name: String,
    pub count: usize,
}

/// 作者资料
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileItem {
    pub display_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub photo_url: String,
    pub about_me: String,
    pub company: String,
    pub city: String,
    pub region: String,
    pub country: String,
    pub phone_main: String,
    pub phone_mobile: String,
    pub phone_fax: String,
    pub is_private: bool,
}

impl ProfileItem {
    pub fn from_profile(profile: &AuthorProfile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            first_name: profile.first_name.clone(),
            middle_name: profile.middle_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.clone(),
            birthday: profile.birthday,
            photo_url: profile.photo_url.clone(),
            about_me: profile.about_me.clone(),
            company: profile.company.clone(),
            city: profile.city.clone(),
            region: profile.region.clone(),
            country: profile.country.clone(),
            phone_main: profile.phone_main.clone(),
            phone_mobile: profile.phone_mobile.clone(),
            phone_fax: profile.phone_fax.clone(),
            is_private: profile.is_private,
        }
    }

    /// 写回作者资料，用户名不变
    pub fn apply_to(&self, profile: &mut AuthorProfile) {
        profile.display_name = self.display_name.clone();
        profile.first_name = self.first_name.clone();
        profile.middle_name = self.middle_name.clone();
        profile.last_name = self.last_name.clone();
        profile.email = self.email.clone();
        profile.birthday = self.birthday;
        profile.photo_url = self.photo_url.clone();
        profile.about_me = self.about_me.clone();
        profile.company = self.company.clone();
        profile.city = self.city.clone();
        profile.region = self.region.clone();
        profile.country = self.country.clone();
        profile.phone_main = self.phone_main.clone();
        profile.phone_mobile = self.phone_mobile.clone();
        profile.phone_fax = self.phone_fax.clone();
        profile.is_private = self.is_private;
    }
}

/// 用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserItem {
    pub user_name: String,
    pub email: String,
    pub date_created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub roles: Vec<String>,
    pub profile: Option<ProfileItem>,
}

/// 新用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub user_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// 用户更新，未给出的部分保持不变
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
    pub profile: Option<ProfileItem>,
}

/// 角色
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleItem {
    pub name: String,
    pub is_system: bool,
    pub users: Vec<String>,
}

/// 博客
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogItem {
    pub id: Uuid,
    pub name: String,
    pub hostname: String,
    pub virtual_path: String,
    pub storage_container_name: String,
    pub is_primary: bool,
    pub is_active: bool,
    pub is_site_aggregation: bool,
}

impl From<&Blog> for BlogItem {
    fn from(blog: &Blog) -> Self {
        Self {
            id: blog.id,
            name: blog.name.clone(),
            hostname: blog.hostname.clone(),
            virtual_path: blog.virtual_path.clone(),
            storage_container_name: blog.storage_container_name.clone(),
            is_primary: blog.is_primary,
            is_active: blog.is_active,
            is_site_aggregation: blog.is_site_aggregation,
        }
    }
}

/// 新博客或博客更新
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogDetail {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub virtual_path: String,
    #[serde(default)]
    pub storage_container_name: String,
    #[serde(default = "crate::models::types::default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_site_aggregation: bool,
    /// 复制设置、角色和用户的模板博客，默认使用主博客
    #[serde(default)]
    pub template_id: Option<Uuid>,
}

impl BlogDetail {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            hostname: String::new(),
            virtual_path: String::new(),
            storage_container_name: String::new(),
            is_active: true,
            is_site_aggregation: false,
            template_id: None,
        }
    }
}

/// 回收站中的条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrashKind {
    Post,
    Page,
    Comment,
}

impl std::str::FromStr for TrashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "post" => Ok(TrashKind::Post),
            "page" => Ok(TrashKind::Page),
            "comment" => Ok(TrashKind::Comment),
            other => Err(format!("未知的回收站类型: {}", other)),
        }
    }
}

/// 回收站条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashItem {
    pub kind: TrashKind,
    pub id: Uuid,
    pub title: String,
    pub date_created: DateTime<Utc>,
}

/// 仪表盘
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardItem {
    pub published_posts: usize,
    pub draft_posts: usize,
    pub pages: usize,
    pub approved_comments: usize,
    pub pending_comments: usize,
    pub spam_comments: usize,
    pub users: usize,
    pub trash: usize,
    pub recent_drafts: Vec<PostItem>,
    pub recent_comments: Vec<CommentItem>,
}

/// 友情链接
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRollDetail {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub blog_url: String,
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub xfn: String,
    #[serde(default)]
    pub sort_index: i32,
}

impl From<&BlogRollItem> for BlogRollDetail {
    fn from(item: &BlogRollItem) -> Self {
        Self {
            id: Some(item.id),
            title: item.title.clone(),
            description: item.description.clone(),
            blog_url: item.blog_url.clone(),
            feed_url: item.feed_url.clone(),
            xfn: item.xfn.clone(),
            sort_index: item.sort_index,
        }
    }
}

/// 扩展包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageItem {
    pub id: String,
    pub package_type: PackageType,
    pub title: String,
    pub description: String,
    pub version: String,
    pub installed: bool,
    pub installed_version: Option<String>,
    /// 已安装版本低于可用版本
    pub update_available: bool,
}

/// 扩展状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionItem {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub enabled: bool,
    pub priority: i32,
    pub settings: Vec<String>,
}

/// 小部件可选类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetKindItem {
    pub kind: String,
    pub title: String,
}
