use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 博客实例（多博客托管中的一个租户）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "blog")]
pub struct Blog {
    pub id: Uuid,
    /// 博客名称
    pub name: String,
    /// 绑定的主机名，为空表示不按主机名匹配
    #[serde(default)]
    pub hostname: String,
    /// 虚拟路径前缀，例如 "/team"
    #[serde(default)]
    pub virtual_path: String,
    /// 存储目录名
    pub storage_container_name: String,
    /// 是否为主博客
    #[serde(default)]
    pub is_primary: bool,
    /// 是否启用
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// 是否已删除
    #[serde(default)]
    pub is_deleted: bool,
    /// 是否聚合所有博客的内容
    #[serde(default)]
    pub is_site_aggregation: bool,
}

impl Blog {
    /// 创建新的博客实例描述
    pub fn new(name: &str, storage_container_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            hostname: String::new(),
            virtual_path: String::new(),
            storage_container_name: storage_container_name.to_string(),
            is_primary: false,
            is_active: true,
            is_deleted: false,
            is_site_aggregation: false,
        }
    }

    /// 规范化后的虚拟路径（以 / 开头、不以 / 结尾，主路径为空字符串）
    pub fn normalized_virtual_path(&self) -> String {
        let trimmed = self.virtual_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed.to_lowercase())
        }
    }
}

/// 博客文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "post")]
pub struct Post {
    pub id: Uuid,
    /// 文章标题
    pub title: String,
    /// URL 别名
    pub slug: String,
    /// 文章描述
    #[serde(default)]
    pub description: String,
    /// 文章内容
    #[serde(default)]
    pub content: String,
    /// 作者用户名
    pub author: String,
    /// 创建时间
    pub date_created: DateTime<Utc>,
    /// 最后修改时间
    pub date_modified: DateTime<Utc>,
    /// 是否已发布
    #[serde(default)]
    pub is_published: bool,
    /// 是否已删除（回收站）
    #[serde(default)]
    pub is_deleted: bool,
    /// 是否允许评论
    #[serde(default = "default_true")]
    pub has_comments_enabled: bool,
    /// 文章分类 ID
    #[serde(rename = "category", default)]
    pub categories: Vec<Uuid>,
    /// 文章标签（小写、去重）
    #[serde(rename = "tag", default)]
    pub tags: Vec<String>,
    /// 评分人数
    #[serde(default)]
    pub raters: u32,
    /// 平均评分
    #[serde(default)]
    pub rating: f32,
    /// 文章评论
    #[serde(rename = "comment", default)]
    pub comments: Vec<Comment>,
}

impl Post {
    /// 创建新文章
    pub fn new(title: &str, author: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: String::new(),
            description: String::new(),
            content: String::new(),
            author: author.to_string(),
            date_created: now,
            date_modified: now,
            is_published: false,
            is_deleted: false,
            has_comments_enabled: true,
            categories: Vec::new(),
            tags: Vec::new(),
            raters: 0,
            rating: 0.0,
            comments: Vec::new(),
        }
    }

    /// 对公众可见：已发布、未删除且发布时间已到
    pub fn is_visible_to_public(&self) -> bool {
        self.is_published && !self.is_deleted && self.date_created <= Utc::now()
    }

    /// 已审核且未删除的评论
    pub fn approved_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| c.is_approved && !c.is_spam && !c.is_deleted)
    }

    /// 待审核评论
    pub fn pending_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| !c.is_approved && !c.is_spam && !c.is_deleted)
    }

    /// 垃圾评论
    pub fn spam_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|c| c.is_spam && !c.is_deleted)
    }
}

/// 评论，保存在所属文章的文件中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "comment")]
pub struct Comment {
    pub id: Uuid,
    /// 回复的父评论
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub post_id: Uuid,
    pub author: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    pub content: String,
    #[serde(default)]
    pub ip: String,
    pub date_created: DateTime<Utc>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_spam: bool,
    #[serde(default)]
    pub is_deleted: bool,
    /// 审核人（用户名或扩展名）
    #[serde(default)]
    pub moderated_by: String,
}

impl Comment {
    /// 创建新评论
    pub fn new(post_id: Uuid, author: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            post_id,
            author: author.to_string(),
            email: String::new(),
            website: String::new(),
            content: content.to_string(),
            ip: String::new(),
            date_created: Utc::now(),
            is_approved: false,
            is_spam: false,
            is_deleted: false,
            moderated_by: String::new(),
        }
    }
}

/// 独立页面
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "page")]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    /// 父页面
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_published: bool,
    /// 是否为首页
    #[serde(default)]
    pub is_front_page: bool,
    /// 是否显示在页面列表中
    #[serde(default = "default_true")]
    pub show_in_list: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Page {
    /// 创建新页面
    pub fn new(title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            slug: String::new(),
            description: String::new(),
            keywords: String::new(),
            content: String::new(),
            author: String::new(),
            date_created: now,
            date_modified: now,
            parent_id: None,
            is_published: false,
            is_front_page: false,
            show_in_list: true,
            sort_order: 0,
            is_deleted: false,
        }
    }

    /// 对公众可见
    pub fn is_visible_to_public(&self) -> bool {
        self.is_published && !self.is_deleted
    }
}

/// 分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "category")]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 父分类
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl Category {
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            parent_id: None,
        }
    }
}

/// 作者资料，每个用户一个文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "profile")]
pub struct AuthorProfile {
    pub user_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub about_me: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone_main: String,
    #[serde(default)]
    pub phone_mobile: String,
    #[serde(default)]
    pub phone_fax: String,
    #[serde(default)]
    pub is_private: bool,
}

impl AuthorProfile {
    pub fn new(user_name: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            display_name: user_name.to_string(),
            ..Default::default()
        }
    }
}

/// 角色及其成员
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "role")]
pub struct Role {
    pub name: String,
    #[serde(rename = "user", default)]
    pub users: Vec<String>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            users: Vec::new(),
        }
    }

    /// 用户是否属于该角色（用户名大小写不敏感）
    pub fn has_user(&self, user_name: &str) -> bool {
        self.users.iter().any(|u| u.eq_ignore_ascii_case(user_name))
    }
}

/// 博客用户（成员）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "user")]
pub struct BlogUser {
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub date_created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

/// 自定义字段的归属类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CustomFieldType {
    Post,
    Page,
    Profile,
    Theme,
}

impl fmt::Display for CustomFieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustomFieldType::Post => "POST",
            CustomFieldType::Page => "PAGE",
            CustomFieldType::Profile => "PROFILE",
            CustomFieldType::Theme => "THEME",
        };
        f.write_str(s)
    }
}

impl FromStr for CustomFieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(CustomFieldType::Post),
            "PAGE" => Ok(CustomFieldType::Page),
            "PROFILE" => Ok(CustomFieldType::Profile),
            "THEME" => Ok(CustomFieldType::Theme),
            other => Err(format!("未知的自定义字段类型: {}", other)),
        }
    }
}

impl From<CustomFieldType> for String {
    fn from(value: CustomFieldType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CustomFieldType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 自定义字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "field")]
pub struct CustomField {
    pub custom_type: CustomFieldType,
    pub object_id: String,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub attribute: String,
}

/// 友情链接条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "item")]
pub struct BlogRollItem {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub blog_url: String,
    #[serde(default)]
    pub feed_url: String,
    /// XFN 关系标记
    #[serde(default)]
    pub xfn: String,
    #[serde(default)]
    pub sort_index: i32,
}

/// 评论审核模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ModerationType {
    /// 自动审核，除非被扩展判定为垃圾评论
    Auto,
    /// 需要人工审核
    Manual,
    /// 不审核，全部通过
    Disabled,
}

impl fmt::Display for ModerationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModerationType::Auto => "Auto",
            ModerationType::Manual => "Manual",
            ModerationType::Disabled => "Disabled",
        };
        f.write_str(s)
    }
}

impl FromStr for ModerationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ModerationType::Auto),
            "manual" => Ok(ModerationType::Manual),
            "disabled" => Ok(ModerationType::Disabled),
            other => Err(format!("未知的审核模式: {}", other)),
        }
    }
}

impl From<ModerationType> for String {
    fn from(value: ModerationType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ModerationType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 键值对，用于 XML 中的设置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "setting")]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// 查找键值对列表中的值
pub fn lookup<'a>(values: &'a [KeyValue], key: &str) -> Option<&'a str> {
    values
        .iter()
        .find(|kv| kv.key.eq_ignore_ascii_case(key))
        .map(|kv| kv.value.as_str())
}

pub(crate) fn default_true() -> bool {
    true
}
