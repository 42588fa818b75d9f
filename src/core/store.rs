//! 站点与博客实例的内存状态
//!
//! `Site` 持有博客列表，并在第一次访问时加载对应的 `BlogInstance`。
//! 每个实例保存一个博客的全部集合，修改后通过 `persist_*` 显式写回提供者。
//! 每次内容写入都会递增实例的修订号，小部件缓存以修订号判断是否失效。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::blogroll::FeedEntry;
use super::error::{RepositoryError, RepositoryResult};
use crate::extensions::{ExtensionEvent, ExtensionManager, Serving};
use crate::models::{
    AuthorProfile, Blog, BlogRollItem, BlogSettings, BlogUser, Category, CustomField,
    InstalledPackage, ManagedExtension, Page, Post, Role, WidgetEntry, WidgetKind, WidgetZone,
};
use crate::provider::BlogProvider;
use crate::security::{Principal, Right, RightsTable, SYSTEM_ROLES};

/// 默认的侧边栏小部件区域
pub const DEFAULT_WIDGET_ZONE: &str = "sidebar";

/// 主博客的默认存储目录
pub const PRIMARY_CONTAINER: &str = "primary";

/// 打开站点的选项
#[derive(Debug, Clone, Default)]
pub struct SiteOptions {
    /// 没有任何博客时创建的主博客名称
    pub title: String,
    /// 主题目录，用于校验主题设置
    pub themes_dir: Option<PathBuf>,
}

/// 站点：所有博客及其实例
pub struct Site {
    provider: Arc<dyn BlogProvider>,
    extensions: Arc<ExtensionManager>,
    options: SiteOptions,
    blogs: RwLock<Vec<Blog>>,
    instances: RwLock<HashMap<Uuid, Arc<BlogInstance>>>,
}

impl Site {
    /// 打开站点，没有博客时创建主博客
    pub fn open(
        provider: Arc<dyn BlogProvider>,
        extensions: Arc<ExtensionManager>,
        options: SiteOptions,
    ) -> Result<Self> {
        let mut blogs = provider.load_blogs().context("加载博客列表失败")?;

        if blogs.is_empty() {
            let title = if options.title.is_empty() {
                "My Blog"
            } else {
                options.title.as_str()
            };
            let mut primary = Blog::new(title, PRIMARY_CONTAINER);
            primary.is_primary = true;
            provider.setup_blog_storage(&primary, None)?;
            blogs.push(primary);
            provider.save_blogs(&blogs)?;
            info!("已创建主博客: {}", title);
        } else if !blogs.iter().any(|b| b.is_primary) {
            // 没有主博客时提升第一个博客
            warn!("博客列表中没有主博客，使用 {} 作为主博客", blogs[0].name);
            blogs[0].is_primary = true;
            provider.save_blogs(&blogs)?;
        }

        debug!("已加载 {} 个博客", blogs.len());
        Ok(Self {
            provider,
            extensions,
            options,
            blogs: RwLock::new(blogs),
            instances: RwLock::new(HashMap::new()),
        })
    }

    pub fn provider(&self) -> &Arc<dyn BlogProvider> {
        &self.provider
    }

    pub fn extensions(&self) -> &Arc<ExtensionManager> {
        &self.extensions
    }

    pub fn themes_dir(&self) -> Option<&Path> {
        self.options.themes_dir.as_deref()
    }

    /// 全部博客
    pub fn blogs(&self) -> Vec<Blog> {
        self.blogs.read().clone()
    }

    pub fn blog(&self, id: Uuid) -> Option<Blog> {
        self.blogs.read().iter().find(|b| b.id == id).cloned()
    }

    /// 主博客
    pub fn primary(&self) -> Result<Blog> {
        self.blogs
            .read()
            .iter()
            .find(|b| b.is_primary)
            .cloned()
            .ok_or_else(|| anyhow!("没有主博客"))
    }

    /// 获取博客实例，第一次访问时从提供者加载
    pub fn instance(&self, id: Uuid) -> Result<Arc<BlogInstance>> {
        if let Some(instance) = self.instances.read().get(&id) {
            return Ok(instance.clone());
        }

        let blog = self.blog(id).ok_or_else(|| anyhow!("博客不存在: {}", id))?;
        let loaded = Arc::new(BlogInstance::load(
            blog,
            self.provider.clone(),
            self.extensions.clone(),
            self.options.themes_dir.clone(),
        )?);

        let mut instances = self.instances.write();
        Ok(instances.entry(id).or_insert(loaded).clone())
    }

    pub fn primary_instance(&self) -> Result<Arc<BlogInstance>> {
        self.instance(self.primary()?.id)
    }

    /// 已加载的实例
    pub fn loaded_instances(&self) -> Vec<Arc<BlogInstance>> {
        self.instances.read().values().cloned().collect()
    }

    /// 按主机名和路径解析博客，返回博客和去掉虚拟路径后的剩余路径
    pub fn resolve(&self, host: &str, path: &str) -> Option<(Blog, String)> {
        let host = host.split(':').next().unwrap_or("").trim().to_lowercase();
        let lower_path = path.to_lowercase();
        let blogs = self.blogs.read();

        let mut best: Option<(&Blog, (bool, usize))> = None;
        for blog in blogs.iter().filter(|b| b.is_active && !b.is_deleted) {
            let host_match = !blog.hostname.is_empty();
            if host_match && !blog.hostname.eq_ignore_ascii_case(&host) {
                continue;
            }
            let prefix = blog.normalized_virtual_path();
            let path_match = prefix.is_empty()
                || lower_path == prefix
                || lower_path.starts_with(&format!("{}/", prefix));
            if !path_match {
                continue;
            }
            let score = (host_match, prefix.len());
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((blog, score));
            }
        }

        let blog = match best {
            Some((blog, _)) => blog.clone(),
            None => blogs.iter().find(|b| b.is_primary)?.clone(),
        };
        let prefix_len = blog.normalized_virtual_path().len();
        let rest = if path.len() >= prefix_len && lower_path.starts_with(&blog.normalized_virtual_path()) {
            &path[prefix_len..]
        } else {
            path
        };
        let rest = if rest.is_empty() { "/" } else { rest };
        Some((blog, rest.to_string()))
    }

    /// 新增博客并准备存储
    pub fn insert_blog(&self, blog: Blog, template: Option<&Blog>) -> Result<()> {
        let mut blogs = self.blogs.write();
        if blogs
            .iter()
            .any(|b| b.storage_container_name.eq_ignore_ascii_case(&blog.storage_container_name))
        {
            bail!("存储目录已被使用: {}", blog.storage_container_name);
        }
        self.provider.setup_blog_storage(&blog, template)?;
        blogs.push(blog);
        self.provider.save_blogs(&blogs)
    }

    /// 更新博客描述
    pub fn update_blog(&self, blog: Blog) -> Result<()> {
        let mut blogs = self.blogs.write();
        let slot = blogs
            .iter_mut()
            .find(|b| b.id == blog.id)
            .ok_or_else(|| anyhow!("博客不存在: {}", blog.id))?;
        *slot = blog.clone();
        self.provider.save_blogs(&blogs)?;
        drop(blogs);

        if let Some(instance) = self.instances.read().get(&blog.id) {
            *instance.blog.write() = blog;
        }
        Ok(())
    }

    /// 删除博客及其存储
    pub fn delete_blog(&self, id: Uuid) -> Result<()> {
        let mut blogs = self.blogs.write();
        let index = blogs
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| anyhow!("博客不存在: {}", id))?;
        if blogs[index].is_primary {
            bail!("不能删除主博客");
        }
        let blog = blogs.remove(index);
        self.provider.save_blogs(&blogs)?;
        self.provider.delete_blog_storage(&blog)?;
        self.instances.write().remove(&id);
        info!("已删除博客: {}", blog.name);
        Ok(())
    }

    /// 所有启用的博客中对公众可见的文章，用于聚合博客；各博客并行加载
    pub fn aggregated_posts(&self) -> Result<Vec<(Blog, Post)>> {
        let blogs: Vec<Blog> = self
            .blogs()
            .into_iter()
            .filter(|b| b.is_active && !b.is_deleted)
            .collect();
        let mut posts: Vec<(Blog, Post)> = blogs
            .par_iter()
            .map(|blog| -> Result<Vec<(Blog, Post)>> {
                let instance = self.instance(blog.id)?;
                let visible = instance
                    .posts
                    .read()
                    .iter()
                    .filter(|p| p.is_visible_to_public())
                    .map(|p| (blog.clone(), p.clone()))
                    .collect();
                Ok(visible)
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        posts.sort_by(|a, b| b.1.date_created.cmp(&a.1.date_created));
        Ok(posts)
    }
}

/// 一个博客的内存状态
pub struct BlogInstance {
    pub blog: RwLock<Blog>,
    provider: Arc<dyn BlogProvider>,
    extensions: Arc<ExtensionManager>,
    themes_dir: Option<PathBuf>,

    pub settings: RwLock<BlogSettings>,
    pub posts: RwLock<Vec<Post>>,
    pub pages: RwLock<Vec<Page>>,
    pub profiles: RwLock<Vec<AuthorProfile>>,
    pub categories: RwLock<Vec<Category>>,
    pub roles: RwLock<Vec<Role>>,
    pub rights: RwLock<RightsTable>,
    pub users: RwLock<Vec<BlogUser>>,
    pub custom_fields: RwLock<Vec<CustomField>>,
    pub blogroll: RwLock<Vec<BlogRollItem>>,
    pub extension_state: RwLock<Vec<ManagedExtension>>,
    pub widget_zones: RwLock<Vec<WidgetZone>>,
    pub packages: RwLock<Vec<InstalledPackage>>,

    /// 友情链接抓取结果，按条目 ID 保存
    pub blogroll_feeds: RwLock<HashMap<Uuid, Vec<FeedEntry>>>,
    revision: AtomicU64,
    fragments: Mutex<HashMap<Uuid, (u64, String)>>,
}

impl BlogInstance {
    /// 从提供者加载博客，并补齐缺失的默认数据
    pub fn load(
        blog: Blog,
        provider: Arc<dyn BlogProvider>,
        extensions: Arc<ExtensionManager>,
        themes_dir: Option<PathBuf>,
    ) -> Result<Self> {
        info!("加载博客: {} ({})", blog.name, blog.storage_container_name);

        let settings = match provider.load_settings(&blog)? {
            Some(settings) => settings,
            None => {
                let settings = BlogSettings {
                    name: blog.name.clone(),
                    ..BlogSettings::default()
                };
                provider.save_settings(&blog, &settings)?;
                settings
            }
        };

        let mut roles = provider.load_roles(&blog)?;
        let mut roles_changed = false;
        for name in SYSTEM_ROLES {
            if !roles.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
                roles.push(Role::new(name));
                roles_changed = true;
            }
        }
        if roles_changed {
            provider.save_roles(&blog, &roles)?;
        }

        let entries = provider.load_rights(&blog)?;
        let rights = if entries.is_empty() {
            let table = RightsTable::defaults();
            provider.save_rights(&blog, &table.to_entries())?;
            table
        } else {
            RightsTable::from_entries(entries)
        };

        let mut zones = provider.load_widget_zones(&blog)?;
        if zones.is_empty() {
            zones.push(default_sidebar());
            provider.save_widget_zones(&blog, &zones)?;
        }

        let mut extension_state = provider.load_extensions(&blog)?;
        if extensions.sync_state(&mut extension_state) {
            provider.save_extensions(&blog, &extension_state)?;
        }

        let instance = Self {
            posts: RwLock::new(provider.load_posts(&blog)?),
            pages: RwLock::new(provider.load_pages(&blog)?),
            profiles: RwLock::new(provider.load_profiles(&blog)?),
            categories: RwLock::new(provider.load_categories(&blog)?),
            users: RwLock::new(provider.load_users(&blog)?),
            custom_fields: RwLock::new(provider.load_custom_fields(&blog)?),
            blogroll: RwLock::new(provider.load_blogroll(&blog)?),
            packages: RwLock::new(provider.load_packages(&blog)?),
            settings: RwLock::new(settings),
            roles: RwLock::new(roles),
            rights: RwLock::new(rights),
            widget_zones: RwLock::new(zones),
            extension_state: RwLock::new(extension_state),
            blogroll_feeds: RwLock::new(HashMap::new()),
            revision: AtomicU64::new(0),
            fragments: Mutex::new(HashMap::new()),
            blog: RwLock::new(blog),
            provider,
            extensions,
            themes_dir,
        };
        debug!(
            "博客已加载: {} 篇文章, {} 个页面",
            instance.posts.read().len(),
            instance.pages.read().len()
        );
        Ok(instance)
    }

    /// 当前博客描述的副本
    pub fn blog(&self) -> Blog {
        self.blog.read().clone()
    }

    pub fn id(&self) -> Uuid {
        self.blog.read().id
    }

    pub fn is_primary(&self) -> bool {
        self.blog.read().is_primary
    }

    pub fn provider(&self) -> &Arc<dyn BlogProvider> {
        &self.provider
    }

    pub fn extensions(&self) -> &Arc<ExtensionManager> {
        &self.extensions
    }

    pub fn themes_dir(&self) -> Option<&Path> {
        self.themes_dir.as_deref()
    }

    /// 调用者是否拥有权限
    pub fn can(&self, principal: &Principal, right: Right) -> bool {
        self.rights.read().is_authorized(principal, right)
    }

    /// 要求调用者拥有权限
    pub fn require(&self, principal: &Principal, right: Right) -> RepositoryResult<()> {
        if self.can(principal, right) {
            Ok(())
        } else {
            debug!("拒绝访问: {:?} 缺少 {}", principal.name(), right);
            Err(RepositoryError::Unauthorized(right))
        }
    }

    /// 用户所属的角色名称
    pub fn roles_of(&self, user_name: &str) -> Vec<String> {
        self.roles
            .read()
            .iter()
            .filter(|r| r.has_user(user_name))
            .map(|r| r.name.clone())
            .collect()
    }

    /// 为已登录用户构造调用者身份
    pub fn principal_for(&self, user_name: &str) -> Principal {
        Principal::user(user_name, self.roles_of(user_name))
    }

    /// 分发扩展事件
    pub fn raise(&self, event: &mut ExtensionEvent<'_>) {
        let state = self.extension_state.read().clone();
        self.extensions.raise(&state, event);
    }

    /// 交给扩展处理即将输出的内容
    pub fn serve(&self, serving: &mut Serving) {
        let state = self.extension_state.read().clone();
        self.extensions.serve(&state, serving);
    }

    /// 当前修订号
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// 内容发生变化
    pub fn touch(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// 读取或生成缓存的 HTML 片段
    pub fn cached_fragment<F>(&self, key: Uuid, render: F) -> String
    where
        F: FnOnce() -> String,
    {
        let revision = self.revision();
        if let Some((cached_revision, html)) = self.fragments.lock().get(&key) {
            if *cached_revision == revision {
                return html.clone();
            }
        }
        let html = render();
        self.fragments.lock().insert(key, (revision, html.clone()));
        html
    }

    // 以下方法把内存中的集合写回提供者

    pub fn persist_post(&self, post: &Post, is_new: bool) -> Result<()> {
        let blog = self.blog();
        if is_new {
            self.provider.insert_post(&blog, post)?;
        } else {
            self.provider.update_post(&blog, post)?;
        }
        self.touch();
        Ok(())
    }

    pub fn delete_post_file(&self, post: &Post) -> Result<()> {
        self.provider.delete_post(&self.blog(), post)?;
        self.touch();
        Ok(())
    }

    pub fn persist_page(&self, page: &Page, is_new: bool) -> Result<()> {
        let blog = self.blog();
        if is_new {
            self.provider.insert_page(&blog, page)?;
        } else {
            self.provider.update_page(&blog, page)?;
        }
        self.touch();
        Ok(())
    }

    pub fn delete_page_file(&self, page: &Page) -> Result<()> {
        self.provider.delete_page(&self.blog(), page)?;
        self.touch();
        Ok(())
    }

    pub fn persist_profile(&self, profile: &AuthorProfile, is_new: bool) -> Result<()> {
        let blog = self.blog();
        if is_new {
            self.provider.insert_profile(&blog, profile)
        } else {
            self.provider.update_profile(&blog, profile)
        }
    }

    pub fn delete_profile_file(&self, profile: &AuthorProfile) -> Result<()> {
        self.provider.delete_profile(&self.blog(), profile)
    }

    pub fn persist_categories(&self) -> Result<()> {
        let categories = self.categories.read().clone();
        self.provider.save_categories(&self.blog(), &categories)?;
        self.touch();
        Ok(())
    }

    pub fn persist_roles(&self) -> Result<()> {
        let roles = self.roles.read().clone();
        self.provider.save_roles(&self.blog(), &roles)
    }

    pub fn persist_rights(&self) -> Result<()> {
        let entries = self.rights.read().to_entries();
        self.provider.save_rights(&self.blog(), &entries)
    }

    pub fn persist_users(&self) -> Result<()> {
        let users = self.users.read().clone();
        self.provider.save_users(&self.blog(), &users)
    }

    pub fn persist_custom_fields(&self) -> Result<()> {
        let fields = self.custom_fields.read().clone();
        self.provider.save_custom_fields(&self.blog(), &fields)
    }

    pub fn persist_blogroll(&self) -> Result<()> {
        let items = self.blogroll.read().clone();
        self.provider.save_blogroll(&self.blog(), &items)?;
        self.touch();
        Ok(())
    }

    pub fn persist_extensions(&self) -> Result<()> {
        let state = self.extension_state.read().clone();
        self.provider.save_extensions(&self.blog(), &state)?;
        self.touch();
        Ok(())
    }

    pub fn persist_widget_zones(&self) -> Result<()> {
        let zones = self.widget_zones.read().clone();
        self.provider.save_widget_zones(&self.blog(), &zones)?;
        self.touch();
        Ok(())
    }

    pub fn persist_packages(&self) -> Result<()> {
        let packages = self.packages.read().clone();
        self.provider.save_packages(&self.blog(), &packages)
    }

    pub fn persist_settings(&self) -> Result<()> {
        let settings = self.settings.read().clone();
        self.provider.save_settings(&self.blog(), &settings)?;
        self.touch();
        Ok(())
    }
}

/// 新博客的默认侧边栏
fn default_sidebar() -> WidgetZone {
    let mut zone = WidgetZone::new(DEFAULT_WIDGET_ZONE);
    for kind in [
        WidgetKind::PageList,
        WidgetKind::RecentPosts,
        WidgetKind::CategoryList,
        WidgetKind::TagCloud,
        WidgetKind::MonthList,
    ] {
        zone.widgets.push(WidgetEntry::new(kind, kind.default_title()));
    }
    zone
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::XmlBlogProvider;
    use tempfile::TempDir;

    fn open_site(dir: &TempDir) -> Site {
        let provider = Arc::new(XmlBlogProvider::new(dir.path()));
        Site::open(provider, Arc::new(ExtensionManager::with_builtins()), SiteOptions::default()).unwrap()
    }

    #[test]
    fn first_open_creates_primary_blog_with_defaults() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let primary = site.primary().unwrap();
        assert!(primary.is_primary);

        let instance = site.instance(primary.id).unwrap();
        assert_eq!(instance.roles.read().len(), 3);
        assert_eq!(instance.widget_zones.read()[0].name, DEFAULT_WIDGET_ZONE);
        assert!(!instance.extension_state.read().is_empty());
        assert!(dir.path().join("blogs.xml").exists());
    }

    #[test]
    fn resolve_prefers_virtual_path_then_falls_back_to_primary() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let mut team = Blog::new("Team", "team");
        team.virtual_path = "/Team/".to_string();
        site.insert_blog(team.clone(), None).unwrap();

        let (blog, rest) = site.resolve("localhost:4000", "/team/post/hello").unwrap();
        assert_eq!(blog.id, team.id);
        assert_eq!(rest, "/post/hello");

        let (blog, rest) = site.resolve("localhost", "/teams").unwrap();
        assert!(blog.is_primary);
        assert_eq!(rest, "/teams");

        let (blog, rest) = site.resolve("localhost", "/team").unwrap();
        assert_eq!(blog.id, team.id);
        assert_eq!(rest, "/");
    }

    #[test]
    fn inactive_blogs_are_not_resolved() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let mut other = Blog::new("Other", "other");
        other.hostname = "other.example.com".to_string();
        other.is_active = false;
        site.insert_blog(other, None).unwrap();

        let (blog, _) = site.resolve("other.example.com", "/").unwrap();
        assert!(blog.is_primary);
    }

    #[test]
    fn fragment_cache_is_invalidated_by_touch() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let instance = site.primary_instance().unwrap();
        let key = Uuid::new_v4();

        assert_eq!(instance.cached_fragment(key, || "a".to_string()), "a");
        assert_eq!(instance.cached_fragment(key, || "b".to_string()), "a");
        instance.touch();
        assert_eq!(instance.cached_fragment(key, || "b".to_string()), "b");
    }

    #[test]
    fn primary_blog_cannot_be_deleted() {
        let dir = TempDir::new().unwrap();
        let site = open_site(&dir);
        let primary = site.primary().unwrap();
        assert!(site.delete_blog(primary.id).is_err());
    }
}
