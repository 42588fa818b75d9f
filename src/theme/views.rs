//! 前台页面：文章列表、文章、独立页面
//!
//! 视图只展示公开内容。文章正文先渲染为 HTML，再交给已启用的扩展处理。

use chrono::{Datelike, Utc};
use serde::Serialize;
use tera::Context;
use uuid::Uuid;

use super::controls::{pager, UrlBuilder};
use super::renderer::ThemeRenderer;
use super::widgets::render_zone;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::store::{BlogInstance, Site, DEFAULT_WIDGET_ZONE};
use crate::extensions::{Serving, ServingLocation, MORE_MARKER};
use crate::models::{Blog, Category, Comment, Page, Post};
use crate::repositories::{PageRepository, PostRepository};
use crate::security::{Principal, Right};
use crate::utils::{escape_html, markdown};

/// 主题静态资源的地址，所有博客共用
pub const THEMES_URL: &str = "/themes";

/// 文章列表的筛选方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    All,
    Category(Uuid),
    Tag(String),
    Archive { year: i32, month: u32, day: Option<u32> },
}

#[derive(Debug, Clone, Serialize)]
struct LinkView {
    title: String,
    url: String,
}

#[derive(Debug, Clone, Serialize)]
struct PostView {
    id: Uuid,
    title: String,
    url: String,
    author: String,
    description: String,
    date_created: chrono::DateTime<Utc>,
    content: String,
    categories: Vec<LinkView>,
    tags: Vec<LinkView>,
    comment_count: usize,
    blog_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CommentView {
    id: Uuid,
    parent_id: Option<Uuid>,
    author: String,
    website: String,
    date_created: chrono::DateTime<Utc>,
    is_approved: bool,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct PageView {
    id: Uuid,
    title: String,
    url: String,
    description: String,
    keywords: String,
    content: String,
}

/// 一个博客的前台
pub struct FrontEnd<'a> {
    site: &'a Site,
    instance: &'a BlogInstance,
    principal: &'a Principal,
    renderer: &'a ThemeRenderer,
    urls: UrlBuilder,
}

impl<'a> FrontEnd<'a> {
    pub fn new(
        site: &'a Site,
        instance: &'a BlogInstance,
        principal: &'a Principal,
        renderer: &'a ThemeRenderer,
    ) -> Self {
        let urls = UrlBuilder::new(&instance.blog().normalized_virtual_path());
        Self {
            site,
            instance,
            principal,
            renderer,
            urls,
        }
    }

    /// 公共上下文：博客信息、链接和侧边栏
    fn context(&self) -> Context {
        let settings = self.instance.settings.read().clone();
        let mut context = Context::new();
        context.insert(
            "blog",
            &serde_json::json!({
                "name": settings.name,
                "description": settings.description,
                "language": settings.language,
                "theme": self.renderer.name(),
            }),
        );
        context.insert(
            "urls",
            &serde_json::json!({
                "home": self.urls.home(),
                "rss": self.urls.rss(),
                "atom": self.urls.atom(),
                "themes": THEMES_URL,
            }),
        );
        context.insert("now", &Utc::now());
        context.insert("sidebar", &render_zone(self.instance, DEFAULT_WIDGET_ZONE, &self.urls));
        context
    }

    /// 首页：设置了首页页面时显示该页面，否则显示文章列表
    pub fn home(&self, page: usize) -> RepositoryResult<String> {
        if page <= 1 {
            if let Some(front) = PageRepository::new(self.instance, self.principal).front_page()? {
                return self.render_page(&front);
            }
        }
        self.index(&Listing::All, page)
    }

    /// 文章列表
    pub fn index(&self, listing: &Listing, page: usize) -> RepositoryResult<String> {
        self.instance.require(self.principal, Right::ViewPublicPosts)?;
        let categories = self.instance.categories.read().clone();
        let (heading, base_url) = self.describe(listing, &categories)?;

        let mut posts = self.listed_posts()?;
        posts.retain(|(_, post)| matches_listing(post, listing));

        let settings = self.instance.settings.read().clone();
        let per_page = settings.posts_per_page.max(1);
        let total_pages = (posts.len() + per_page - 1) / per_page;
        let page = page.max(1);
        if page > 1 && page > total_pages {
            return Err(RepositoryError::not_found(format!("第 {} 页", page)));
        }

        let views: Vec<PostView> = posts
            .iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .map(|(blog, post)| self.post_view(blog.as_ref(), post, &categories, ServingLocation::PostList))
            .collect();

        let mut context = self.context();
        context.insert("heading", &heading);
        context.insert("posts", &views);
        context.insert("show_description", &settings.show_description_in_post_list);
        context.insert("pager", &pager(page, total_pages, &base_url));
        Ok(self.renderer.render("index.html", &context)?)
    }

    /// 单篇文章及其评论
    pub fn post(&self, slug: &str) -> RepositoryResult<String> {
        let post = PostRepository::new(self.instance, self.principal).get_by_slug(slug)?;
        let categories = self.instance.categories.read().clone();
        let view = self.post_view(None, &post, &categories, ServingLocation::Post);

        let moderator = self.instance.can(self.principal, Right::ViewUnmoderatedComments);
        let mut comments: Vec<&Comment> = if moderator {
            post.comments.iter().filter(|c| !c.is_deleted && !c.is_spam).collect()
        } else if self.instance.can(self.principal, Right::ViewPublicComments) {
            post.approved_comments().collect()
        } else {
            Vec::new()
        };
        comments.sort_by(|a, b| a.date_created.cmp(&b.date_created));
        let comments: Vec<CommentView> = comments.into_iter().map(|c| self.comment_view(c, &view.url)).collect();

        let mut context = self.context();
        context.insert("post", &view);
        context.insert("comments", &comments);
        context.insert("comments_open", &self.comments_open(&post));
        Ok(self.renderer.render("post.html", &context)?)
    }

    /// 独立页面
    pub fn page(&self, slug: &str) -> RepositoryResult<String> {
        let page = PageRepository::new(self.instance, self.principal).get_by_slug(slug)?;
        self.render_page(&page)
    }

    fn render_page(&self, page: &Page) -> RepositoryResult<String> {
        let url = self.urls.page(&page.slug);
        let mut serving = Serving::new(ServingLocation::Page, markdown::render(&page.content), url.clone());
        self.instance.serve(&mut serving);

        let view = PageView {
            id: page.id,
            title: page.title.clone(),
            url,
            description: page.description.clone(),
            keywords: page.keywords.clone(),
            content: serving.body,
        };
        let mut context = self.context();
        context.insert("page", &view);
        Ok(self.renderer.render("page.html", &context)?)
    }

    /// 列表中的文章，聚合博客包含所有博客的文章
    fn listed_posts(&self) -> RepositoryResult<Vec<(Option<Blog>, Post)>> {
        if self.instance.blog().is_site_aggregation {
            let own = self.instance.id();
            return Ok(self
                .site
                .aggregated_posts()?
                .into_iter()
                .map(|(blog, post)| (if blog.id == own { None } else { Some(blog) }, post))
                .collect());
        }
        let mut posts: Vec<(Option<Blog>, Post)> = self
            .instance
            .posts
            .read()
            .iter()
            .filter(|p| p.is_visible_to_public())
            .map(|p| (None, p.clone()))
            .collect();
        posts.sort_by(|a, b| b.1.date_created.cmp(&a.1.date_created));
        Ok(posts)
    }

    /// 列表标题和第一页的地址
    fn describe(&self, listing: &Listing, categories: &[Category]) -> RepositoryResult<(Option<String>, String)> {
        Ok(match listing {
            Listing::All => (None, self.urls.home()),
            Listing::Category(id) => {
                let category = categories
                    .iter()
                    .find(|c| c.id == *id)
                    .ok_or_else(|| RepositoryError::not_found(format!("分类 {}", id)))?;
                (Some(format!("Category: {}", category.title)), self.urls.category(*id))
            }
            Listing::Tag(tag) => (Some(format!("Tag: {}", tag)), self.urls.tag(tag)),
            Listing::Archive { year, month, day } => match day {
                Some(day) => (
                    Some(format!("Archive: {}-{:02}-{:02}", year, month, day)),
                    self.urls.day(*year, *month, *day),
                ),
                None => (
                    Some(format!("Archive: {}-{:02}", year, month)),
                    self.urls.month(*year, *month),
                ),
            },
        })
    }

    fn post_view(&self, blog: Option<&Blog>, post: &Post, categories: &[Category], location: ServingLocation) -> PostView {
        // 其他博客的文章链接到其所属博客
        let urls = match blog {
            Some(blog) => UrlBuilder::new(&blog.normalized_virtual_path()),
            None => self.urls.clone(),
        };
        let url = urls.post(&post.slug);
        let html = markdown::render(&post.content).replace(&format!("<p>{}</p>", MORE_MARKER), MORE_MARKER);
        let mut serving = Serving::new(location, html, url.clone());
        self.instance.serve(&mut serving);

        PostView {
            id: post.id,
            title: post.title.clone(),
            url,
            author: post.author.clone(),
            description: post.description.clone(),
            date_created: post.date_created,
            content: serving.body,
            categories: if blog.is_some() {
                Vec::new()
            } else {
                post.categories
                    .iter()
                    .filter_map(|id| categories.iter().find(|c| c.id == *id))
                    .map(|c| LinkView {
                        title: c.title.clone(),
                        url: urls.category(c.id),
                    })
                    .collect()
            },
            tags: post
                .tags
                .iter()
                .map(|t| LinkView {
                    title: t.clone(),
                    url: urls.tag(t),
                })
                .collect(),
            comment_count: post.approved_comments().count(),
            blog_name: blog.map(|b| b.name.clone()),
        }
    }

    fn comment_view(&self, comment: &Comment, post_url: &str) -> CommentView {
        let mut serving = Serving::new(ServingLocation::Comment, escape_html(&comment.content), post_url);
        self.instance.serve(&mut serving);
        CommentView {
            id: comment.id,
            parent_id: comment.parent_id,
            author: comment.author.clone(),
            website: comment.website.clone(),
            date_created: comment.date_created,
            is_approved: comment.is_approved,
            content: serving.body.replace('\n', "<br>"),
        }
    }

    /// 文章是否仍接受评论
    fn comments_open(&self, post: &Post) -> bool {
        let settings = self.instance.settings.read();
        if !settings.enable_comments || !post.has_comments_enabled {
            return false;
        }
        if !self.instance.can(self.principal, Right::CreateComments) {
            return false;
        }
        settings.days_comments_are_enabled == 0
            || (Utc::now() - post.date_created).num_days() < i64::from(settings.days_comments_are_enabled)
    }
}

fn matches_listing(post: &Post, listing: &Listing) -> bool {
    match listing {
        Listing::All => true,
        Listing::Category(id) => post.categories.contains(id),
        Listing::Tag(tag) => post.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
        Listing::Archive { year, month, day } => {
            let date = post.date_created;
            date.year() == *year && date.month() == *month && day.map_or(true, |d| date.day() == d)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn archive_listing_matches_month_and_day() {
        let mut post = Post::new("t", "a");
        post.date_created = Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap();
        assert!(matches_listing(&post, &Listing::Archive { year: 2024, month: 3, day: None }));
        assert!(matches_listing(&post, &Listing::Archive { year: 2024, month: 3, day: Some(9) }));
        assert!(!matches_listing(&post, &Listing::Archive { year: 2024, month: 3, day: Some(10) }));
        assert!(!matches_listing(&post, &Listing::Archive { year: 2023, month: 3, day: None }));
    }

    #[test]
    fn tag_listing_ignores_case() {
        let mut post = Post::new("t", "a");
        post.tags = vec!["rust".into()];
        assert!(matches_listing(&post, &Listing::Tag("Rust".into())));
        assert!(!matches_listing(&post, &Listing::Category(Uuid::new_v4())));
    }
}
