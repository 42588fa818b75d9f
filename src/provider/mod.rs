//! 可插拔的持久化后端
//!
//! 提供者按实体类型实现"全部加载 / 插入 / 更新 / 删除"。文章、页面和作者资料每个实体一个文件，
//! 其余实体共享一个文件，每次写入都整体重写。

use anyhow::Result;

use crate::models::{
    AuthorProfile, Blog, BlogRollItem, BlogSettings, BlogUser, Category, CustomField,
    InstalledPackage, ManagedExtension, Page, Post, Role, WidgetZone,
};
use crate::security::RightEntry;

mod xml;

pub use xml::XmlBlogProvider;

/// 持久化提供者
pub trait BlogProvider: Send + Sync {
    /// 提供者名称
    fn name(&self) -> &str;

    // 博客列表（全站共享）
    fn load_blogs(&self) -> Result<Vec<Blog>>;
    fn save_blogs(&self, blogs: &[Blog]) -> Result<()>;
    /// 为博客准备存储目录；给定模板时复制模板博客的共享文件
    fn setup_blog_storage(&self, blog: &Blog, template: Option<&Blog>) -> Result<()>;
    /// 删除博客的全部存储
    fn delete_blog_storage(&self, blog: &Blog) -> Result<()>;

    // 文章（每篇一个文件，评论嵌套其中）
    fn load_posts(&self, blog: &Blog) -> Result<Vec<Post>>;
    fn insert_post(&self, blog: &Blog, post: &Post) -> Result<()>;
    fn update_post(&self, blog: &Blog, post: &Post) -> Result<()>;
    fn delete_post(&self, blog: &Blog, post: &Post) -> Result<()>;

    // 页面（每个一个文件）
    fn load_pages(&self, blog: &Blog) -> Result<Vec<Page>>;
    fn insert_page(&self, blog: &Blog, page: &Page) -> Result<()>;
    fn update_page(&self, blog: &Blog, page: &Page) -> Result<()>;
    fn delete_page(&self, blog: &Blog, page: &Page) -> Result<()>;

    // 作者资料（每个用户一个文件）
    fn load_profiles(&self, blog: &Blog) -> Result<Vec<AuthorProfile>>;
    fn insert_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()>;
    fn update_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()>;
    fn delete_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()>;

    // 共享文件
    fn load_categories(&self, blog: &Blog) -> Result<Vec<Category>>;
    fn save_categories(&self, blog: &Blog, categories: &[Category]) -> Result<()>;
    fn load_roles(&self, blog: &Blog) -> Result<Vec<Role>>;
    fn save_roles(&self, blog: &Blog, roles: &[Role]) -> Result<()>;
    fn load_rights(&self, blog: &Blog) -> Result<Vec<RightEntry>>;
    fn save_rights(&self, blog: &Blog, rights: &[RightEntry]) -> Result<()>;
    fn load_users(&self, blog: &Blog) -> Result<Vec<BlogUser>>;
    fn save_users(&self, blog: &Blog, users: &[BlogUser]) -> Result<()>;
    fn load_custom_fields(&self, blog: &Blog) -> Result<Vec<CustomField>>;
    fn save_custom_fields(&self, blog: &Blog, fields: &[CustomField]) -> Result<()>;
    fn load_blogroll(&self, blog: &Blog) -> Result<Vec<BlogRollItem>>;
    fn save_blogroll(&self, blog: &Blog, items: &[BlogRollItem]) -> Result<()>;
    fn load_extensions(&self, blog: &Blog) -> Result<Vec<ManagedExtension>>;
    fn save_extensions(&self, blog: &Blog, extensions: &[ManagedExtension]) -> Result<()>;
    fn load_widget_zones(&self, blog: &Blog) -> Result<Vec<WidgetZone>>;
    fn save_widget_zones(&self, blog: &Blog, zones: &[WidgetZone]) -> Result<()>;
    fn load_packages(&self, blog: &Blog) -> Result<Vec<InstalledPackage>>;
    fn save_packages(&self, blog: &Blog, packages: &[InstalledPackage]) -> Result<()>;

    /// 加载设置，不存在时返回 None
    fn load_settings(&self, blog: &Blog) -> Result<Option<BlogSettings>>;
    fn save_settings(&self, blog: &Blog, settings: &BlogSettings) -> Result<()>;
}
