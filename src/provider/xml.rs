use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use quick_xml::events::{BytesCData, Event};
use quick_xml::{Reader, Writer};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::BlogProvider;
use crate::models::{
    AuthorProfile, Blog, BlogRollItem, BlogSettings, BlogUser, Category, CustomField,
    InstalledPackage, ManagedExtension, Page, Post, Role, WidgetZone,
};
use crate::security::RightEntry;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// 复制模板博客时带上的共享文件
const TEMPLATE_FILES: [&str; 8] = [
    "settings.xml",
    "rights.xml",
    "roles.xml",
    "users.xml",
    "extensions.xml",
    "widgetzones.xml",
    "blogroll.xml",
    "packages.xml",
];

/// 共享文件的根元素包装
macro_rules! list_document {
    ($doc:ident, $root:literal, $item:literal, $ty:ty) => {
        #[derive(Serialize, Deserialize)]
        #[serde(rename = $root)]
        struct $doc {
            #[serde(rename = $item, default)]
            items: Vec<$ty>,
        }
    };
}

list_document!(BlogsDocument, "blogs", "blog", Blog);
list_document!(CategoriesDocument, "categories", "category", Category);
list_document!(RolesDocument, "roles", "role", Role);
list_document!(RightsDocument, "rights", "right", RightEntry);
list_document!(UsersDocument, "users", "user", BlogUser);
list_document!(CustomFieldsDocument, "customfields", "field", CustomField);
list_document!(BlogRollDocument, "blogroll", "item", BlogRollItem);
list_document!(ExtensionsDocument, "extensions", "extension", ManagedExtension);
list_document!(WidgetZonesDocument, "widgetzones", "zone", WidgetZone);
list_document!(PackagesDocument, "packages", "package", InstalledPackage);

/// 基于 XML 文件的持久化提供者
pub struct XmlBlogProvider {
    /// 数据根目录
    data_dir: PathBuf,
    /// 进程内写锁，所有写入与删除串行执行
    write_lock: Mutex<()>,
}

impl XmlBlogProvider {
    /// 创建新的 XML 提供者
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        info!("创建 XML 存储提供者，数据目录: {}", data_dir.display());
        Self {
            data_dir,
            write_lock: Mutex::new(()),
        }
    }

    /// 数据根目录
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 博客的存储目录
    pub fn blog_folder(&self, blog: &Blog) -> Result<PathBuf> {
        let container = checked_file_name(&blog.storage_container_name)?;
        Ok(self.data_dir.join("blogs").join(container))
    }

    fn blog_file(&self, blog: &Blog, file: &str) -> Result<PathBuf> {
        Ok(self.blog_folder(blog)?.join(file))
    }

    fn entity_file(&self, blog: &Blog, folder: &str, name: &str) -> Result<PathBuf> {
        let name = checked_file_name(name)?;
        Ok(self
            .blog_folder(blog)?
            .join(folder)
            .join(format!("{}.xml", name)))
    }

    fn write_document<T: Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        let body = quick_xml::se::to_string(document)
            .map_err(anyhow::Error::from)
            .and_then(|xml| preserve_edge_whitespace(&xml))
            .with_context(|| format!("序列化 XML 失败: {}", path.display()))?;

        let _guard = self.write_lock.lock();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }

        // 先写临时文件再重命名，读者不会看到写了一半的文件
        let tmp = path.with_extension("xml.tmp");
        fs::write(&tmp, format!("{}{}", XML_DECLARATION, body))
            .with_context(|| format!("写入文件失败: {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("替换文件失败: {}", path.display()))?;
        debug!("已写入 {}", path.display());
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let _guard = self.write_lock.lock();
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("删除文件失败: {}", path.display()))?;
            debug!("已删除 {}", path.display());
        }
        Ok(())
    }

    /// 读取共享文件，不存在时返回空列表
    fn read_list<D, T>(&self, path: &Path, items: impl FnOnce(D) -> Vec<T>) -> Result<Vec<T>>
    where
        D: DeserializeOwned,
    {
        match read_document::<D>(path)? {
            Some(document) => Ok(items(document)),
            None => Ok(Vec::new()),
        }
    }

    /// 并行读取目录下的所有实体文件，损坏的文件记录警告后跳过
    fn read_folder<T>(&self, folder: &Path) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        if !folder.exists() {
            return Ok(Vec::new());
        }

        let files: Vec<PathBuf> = WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    warn!("读取目录条目失败: {}", e);
                    None
                }
            })
            .filter(|path| path.extension().map_or(false, |ext| ext == "xml"))
            .collect();

        let items = files
            .par_iter()
            .filter_map(|path| match read_document::<T>(path) {
                Ok(Some(item)) => Some(item),
                Ok(None) => None,
                Err(e) => {
                    warn!("跳过无法解析的文件 {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();
        Ok(items)
    }
}

/// 读取并反序列化单个 XML 文件
fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
    let document = quick_xml::de::from_str(&content)
        .with_context(|| format!("解析 XML 失败: {}", path.display()))?;
    Ok(Some(document))
}

/// 反序列化时文本首尾的空白会被裁掉，CDATA 不会。
/// 首尾带空白的文本改写为 CDATA 段，`]]>` 拆到相邻的段里。
fn preserve_edge_whitespace(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Text(text) => {
                let raw = text.unescape()?.into_owned();
                if raw.trim().len() == raw.len() {
                    writer.write_event(Event::Text(text))?;
                    continue;
                }
                let parts: Vec<&str> = raw.split("]]>").collect();
                let last = parts.len() - 1;
                for (i, part) in parts.iter().enumerate() {
                    let mut chunk = String::with_capacity(part.len() + 3);
                    if i > 0 {
                        chunk.push('>');
                    }
                    chunk.push_str(part);
                    if i < last {
                        chunk.push_str("]]");
                    }
                    writer.write_event(Event::CData(BytesCData::new(chunk)))?;
                }
            }
            event => writer.write_event(event)?,
        }
    }
    Ok(String::from_utf8(writer.into_inner())?)
}

/// 文件名只能是单个路径段
fn checked_file_name(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(name)
    } else {
        Err(anyhow!("非法的存储名称: {:?}", name))
    }
}

impl BlogProvider for XmlBlogProvider {
    fn name(&self) -> &str {
        "XmlBlogProvider"
    }

    fn load_blogs(&self) -> Result<Vec<Blog>> {
        self.read_list(&self.data_dir.join("blogs.xml"), |d: BlogsDocument| d.items)
    }

    fn save_blogs(&self, blogs: &[Blog]) -> Result<()> {
        let document = BlogsDocument {
            items: blogs.to_vec(),
        };
        self.write_document(&self.data_dir.join("blogs.xml"), &document)
    }

    fn setup_blog_storage(&self, blog: &Blog, template: Option<&Blog>) -> Result<()> {
        let folder = self.blog_folder(blog)?;
        info!("准备博客存储目录: {}", folder.display());
        for sub in ["posts", "pages", "profiles"] {
            fs::create_dir_all(folder.join(sub))
                .with_context(|| format!("创建目录失败: {}", folder.join(sub).display()))?;
        }

        if let Some(template) = template {
            let source = self.blog_folder(template)?;
            let _guard = self.write_lock.lock();
            for file in TEMPLATE_FILES {
                let from = source.join(file);
                if from.exists() {
                    fs::copy(&from, folder.join(file))
                        .with_context(|| format!("复制模板文件失败: {}", from.display()))?;
                }
            }
            let profiles = source.join("profiles");
            if profiles.exists() {
                for entry in WalkDir::new(&profiles).min_depth(1).max_depth(1) {
                    let entry = entry?;
                    fs::copy(entry.path(), folder.join("profiles").join(entry.file_name()))?;
                }
            }
        }
        Ok(())
    }

    fn delete_blog_storage(&self, blog: &Blog) -> Result<()> {
        let folder = self.blog_folder(blog)?;
        let _guard = self.write_lock.lock();
        if folder.exists() {
            info!("删除博客存储目录: {}", folder.display());
            fs::remove_dir_all(&folder)
                .with_context(|| format!("删除目录失败: {}", folder.display()))?;
        }
        Ok(())
    }

    fn load_posts(&self, blog: &Blog) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.read_folder(&self.blog_folder(blog)?.join("posts"))?;
        posts.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        debug!("博客 {} 加载了 {} 篇文章", blog.name, posts.len());
        Ok(posts)
    }

    fn insert_post(&self, blog: &Blog, post: &Post) -> Result<()> {
        self.write_document(&self.entity_file(blog, "posts", &post.id.to_string())?, post)
    }

    fn update_post(&self, blog: &Blog, post: &Post) -> Result<()> {
        self.insert_post(blog, post)
    }

    fn delete_post(&self, blog: &Blog, post: &Post) -> Result<()> {
        self.remove_file(&self.entity_file(blog, "posts", &post.id.to_string())?)
    }

    fn load_pages(&self, blog: &Blog) -> Result<Vec<Page>> {
        let mut pages: Vec<Page> = self.read_folder(&self.blog_folder(blog)?.join("pages"))?;
        pages.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.title.cmp(&b.title)));
        Ok(pages)
    }

    fn insert_page(&self, blog: &Blog, page: &Page) -> Result<()> {
        self.write_document(&self.entity_file(blog, "pages", &page.id.to_string())?, page)
    }

    fn update_page(&self, blog: &Blog, page: &Page) -> Result<()> {
        self.insert_page(blog, page)
    }

    fn delete_page(&self, blog: &Blog, page: &Page) -> Result<()> {
        self.remove_file(&self.entity_file(blog, "pages", &page.id.to_string())?)
    }

    fn load_profiles(&self, blog: &Blog) -> Result<Vec<AuthorProfile>> {
        self.read_folder(&self.blog_folder(blog)?.join("profiles"))
    }

    fn insert_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()> {
        let path = self.entity_file(blog, "profiles", &profile.user_name.to_lowercase())?;
        self.write_document(&path, profile)
    }

    fn update_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()> {
        self.insert_profile(blog, profile)
    }

    fn delete_profile(&self, blog: &Blog, profile: &AuthorProfile) -> Result<()> {
        let path = self.entity_file(blog, "profiles", &profile.user_name.to_lowercase())?;
        self.remove_file(&path)
    }

    fn load_categories(&self, blog: &Blog) -> Result<Vec<Category>> {
        self.read_list(&self.blog_file(blog, "categories.xml")?, |d: CategoriesDocument| d.items)
    }

    fn save_categories(&self, blog: &Blog, categories: &[Category]) -> Result<()> {
        let document = CategoriesDocument {
            items: categories.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "categories.xml")?, &document)
    }

    fn load_roles(&self, blog: &Blog) -> Result<Vec<Role>> {
        self.read_list(&self.blog_file(blog, "roles.xml")?, |d: RolesDocument| d.items)
    }

    fn save_roles(&self, blog: &Blog, roles: &[Role]) -> Result<()> {
        let document = RolesDocument {
            items: roles.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "roles.xml")?, &document)
    }

    fn load_rights(&self, blog: &Blog) -> Result<Vec<RightEntry>> {
        self.read_list(&self.blog_file(blog, "rights.xml")?, |d: RightsDocument| d.items)
    }

    fn save_rights(&self, blog: &Blog, rights: &[RightEntry]) -> Result<()> {
        let document = RightsDocument {
            items: rights.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "rights.xml")?, &document)
    }

    fn load_users(&self, blog: &Blog) -> Result<Vec<BlogUser>> {
        self.read_list(&self.blog_file(blog, "users.xml")?, |d: UsersDocument| d.items)
    }

    fn save_users(&self, blog: &Blog, users: &[BlogUser]) -> Result<()> {
        let document = UsersDocument {
            items: users.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "users.xml")?, &document)
    }

    fn load_custom_fields(&self, blog: &Blog) -> Result<Vec<CustomField>> {
        self.read_list(&self.blog_file(blog, "customfields.xml")?, |d: CustomFieldsDocument| {
            d.items
        })
    }

    fn save_custom_fields(&self, blog: &Blog, fields: &[CustomField]) -> Result<()> {
        let document = CustomFieldsDocument {
            items: fields.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "customfields.xml")?, &document)
    }

    fn load_blogroll(&self, blog: &Blog) -> Result<Vec<BlogRollItem>> {
        let mut items =
            self.read_list(&self.blog_file(blog, "blogroll.xml")?, |d: BlogRollDocument| d.items)?;
        items.sort_by_key(|item| item.sort_index);
        Ok(items)
    }

    fn save_blogroll(&self, blog: &Blog, items: &[BlogRollItem]) -> Result<()> {
        let document = BlogRollDocument {
            items: items.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "blogroll.xml")?, &document)
    }

    fn load_extensions(&self, blog: &Blog) -> Result<Vec<ManagedExtension>> {
        self.read_list(&self.blog_file(blog, "extensions.xml")?, |d: ExtensionsDocument| d.items)
    }

    fn save_extensions(&self, blog: &Blog, extensions: &[ManagedExtension]) -> Result<()> {
        let document = ExtensionsDocument {
            items: extensions.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "extensions.xml")?, &document)
    }

    fn load_widget_zones(&self, blog: &Blog) -> Result<Vec<WidgetZone>> {
        self.read_list(&self.blog_file(blog, "widgetzones.xml")?, |d: WidgetZonesDocument| {
            d.items
        })
    }

    fn save_widget_zones(&self, blog: &Blog, zones: &[WidgetZone]) -> Result<()> {
        let document = WidgetZonesDocument {
            items: zones.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "widgetzones.xml")?, &document)
    }

    fn load_packages(&self, blog: &Blog) -> Result<Vec<InstalledPackage>> {
        self.read_list(&self.blog_file(blog, "packages.xml")?, |d: PackagesDocument| d.items)
    }

    fn save_packages(&self, blog: &Blog, packages: &[InstalledPackage]) -> Result<()> {
        let document = PackagesDocument {
            items: packages.to_vec(),
        };
        self.write_document(&self.blog_file(blog, "packages.xml")?, &document)
    }

    fn load_settings(&self, blog: &Blog) -> Result<Option<BlogSettings>> {
        read_document(&self.blog_file(blog, "settings.xml")?)
    }

    fn save_settings(&self, blog: &Blog, settings: &BlogSettings) -> Result<()> {
        self.write_document(&self.blog_file(blog, "settings.xml")?, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Comment;
    use tempfile::TempDir;

    fn provider() -> (TempDir, XmlBlogProvider, Blog) {
        let dir = TempDir::new().unwrap();
        let provider = XmlBlogProvider::new(dir.path());
        let mut blog = Blog::new("Primary", "primary");
        blog.is_primary = true;
        provider.setup_blog_storage(&blog, None).unwrap();
        (dir, provider, blog)
    }

    #[test]
    fn post_file_keeps_comments_categories_and_tags() {
        let (_dir, provider, blog) = provider();
        let mut post = Post::new("Hello <world> & friends", "admin");
        post.slug = "hello-world".to_string();
        post.content = "line one\nline two".to_string();
        post.tags = vec!["rust".to_string(), "xml".to_string()];
        post.categories = vec![uuid::Uuid::new_v4()];
        let mut comment = Comment::new(post.id, "reader", "nice");
        comment.is_approved = true;
        post.comments.push(comment);

        provider.insert_post(&blog, &post).unwrap();
        let loaded = provider.load_posts(&blog).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, post.title);
        assert_eq!(loaded[0].content, post.content);
        assert_eq!(loaded[0].tags, post.tags);
        assert_eq!(loaded[0].categories, post.categories);
        assert_eq!(loaded[0].comments.len(), 1);
        assert!(loaded[0].comments[0].is_approved);

        provider.delete_post(&blog, &post).unwrap();
        assert!(provider.load_posts(&blog).unwrap().is_empty());
    }

    #[test]
    fn text_keeps_leading_and_trailing_whitespace() {
        let (_dir, provider, blog) = provider();
        let mut post = Post::new("Indented", "admin");
        post.content = "    let x = 1; // code block\n\n".to_string();
        post.description = "  tricky ]]> text ".to_string();
        post.comments.push(Comment::new(post.id, "reader", "\n> quoted\n"));
        provider.insert_post(&blog, &post).unwrap();

        let loaded = provider.load_posts(&blog).unwrap();
        assert_eq!(loaded[0].content, post.content);
        assert_eq!(loaded[0].description, post.description);
        assert_eq!(loaded[0].comments[0].content, "\n> quoted\n");

        let raw = fs::read_to_string(
            provider
                .blog_folder(&blog)
                .unwrap()
                .join("posts")
                .join(format!("{}.xml", post.id)),
        )
        .unwrap();
        assert!(raw.contains("<![CDATA[    let x = 1;"));
    }

    #[test]
    fn corrupt_post_file_is_skipped() {
        let (_dir, provider, blog) = provider();
        let post = Post::new("Survivor", "admin");
        provider.insert_post(&blog, &post).unwrap();
        let broken = provider.blog_folder(&blog).unwrap().join("posts").join("broken.xml");
        fs::write(broken, "<post><title>no end").unwrap();

        let loaded = provider.load_posts(&blog).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].title, "Survivor");
    }

    #[test]
    fn missing_shared_files_load_empty() {
        let (_dir, provider, blog) = provider();
        assert!(provider.load_categories(&blog).unwrap().is_empty());
        assert!(provider.load_roles(&blog).unwrap().is_empty());
        assert!(provider.load_settings(&blog).unwrap().is_none());
    }

    #[test]
    fn rejects_path_like_storage_names() {
        let (_dir, provider, _blog) = provider();
        let evil = Blog::new("Evil", "../outside");
        assert!(provider.blog_folder(&evil).is_err());
    }
}
