use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::dto::{CategoryRef, PostDetail, PostItem};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, Filter, Filterable, ListQuery};
use crate::core::store::BlogInstance;
use crate::extensions::ExtensionEvent;
use crate::models::{Category, Post};
use crate::security::{Principal, Right};
use crate::utils;

/// 文章仓储
pub struct PostRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> PostRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    /// 当前调用者可以看到的文章
    fn visible_items(&self) -> RepositoryResult<Vec<PostItem>> {
        let drafts = self.instance.can(self.principal, Right::ViewUnpublishedPosts);
        if !drafts {
            self.instance.require(self.principal, Right::ViewPublicPosts)?;
        }
        let categories = self.instance.categories.read();
        Ok(self
            .instance
            .posts
            .read()
            .iter()
            .filter(|p| !p.is_deleted)
            .filter(|p| drafts || p.is_visible_to_public())
            .map(|p| PostItem::from_post(p, &categories))
            .collect())
    }

    /// 查询文章列表
    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<PostItem>> {
        let items = self.visible_items()?;
        Ok(query::apply(items, query, "DateCreated desc")?)
    }

    /// 统计匹配的文章数
    pub fn count(&self, filter: &str) -> RepositoryResult<usize> {
        let filter = Filter::parse(filter)?;
        filter.check_fields(PostItem::fields())?;
        let mut count = 0;
        for item in self.visible_items()? {
            if filter.matches(&item)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// 可见文章的完整记录
    fn visible_post(&self, matches: impl Fn(&Post) -> bool) -> RepositoryResult<Post> {
        let drafts = self.instance.can(self.principal, Right::ViewUnpublishedPosts);
        if !drafts {
            self.instance.require(self.principal, Right::ViewPublicPosts)?;
        }
        self.instance
            .posts
            .read()
            .iter()
            .find(|p| matches(p) && !p.is_deleted && (drafts || p.is_visible_to_public()))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("文章"))
    }

    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<PostDetail> {
        let post = self.visible_post(|p| p.id == id)?;
        let categories = self.instance.categories.read();
        Ok(PostDetail::from_post(&post, &categories))
    }

    /// 按别名获取文章（前台展示用）
    pub fn get_by_slug(&self, slug: &str) -> RepositoryResult<Post> {
        self.visible_post(|p| p.slug.eq_ignore_ascii_case(slug))
    }

    fn is_own(&self, author: &str) -> bool {
        self.principal.is_self(author)
    }

    fn publish_right(&self, author: &str) -> Right {
        if self.is_own(author) {
            Right::PublishOwnPosts
        } else {
            Right::PublishOtherUsersPosts
        }
    }

    /// 新增文章
    pub fn add(&self, detail: &PostDetail) -> RepositoryResult<PostDetail> {
        self.instance.require(self.principal, Right::CreateNewPosts)?;
        validate(detail)?;

        let author = if detail.author.trim().is_empty() {
            self.principal.name().unwrap_or_default().to_string()
        } else {
            detail.author.trim().to_string()
        };
        if !self.is_own(&author) {
            self.instance.require(self.principal, Right::EditOtherUsersPosts)?;
        }

        let mut post = Post::new(detail.title.trim(), &author);
        if let Some(date) = detail.date_created {
            post.date_created = date;
        }
        self.apply_detail(&mut post, detail)?;

        self.instance.raise(&mut ExtensionEvent::PostSaving(&mut post));
        {
            let mut posts = self.instance.posts.write();
            posts.push(post.clone());
            posts.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        }
        self.instance.persist_post(&post, true)?;
        self.instance.raise(&mut ExtensionEvent::PostSaved(&post));

        info!("新增文章: {} ({})", post.title, post.slug);
        let categories = self.instance.categories.read();
        Ok(PostDetail::from_post(&post, &categories))
    }

    /// 更新文章
    pub fn update(&self, detail: &PostDetail) -> RepositoryResult<PostDetail> {
        let id = detail
            .id
            .ok_or_else(|| RepositoryError::validation("缺少文章 ID"))?;
        validate(detail)?;

        let mut post = self.existing(id)?;
        let right = if self.is_own(&post.author) {
            Right::EditOwnPosts
        } else {
            Right::EditOtherUsersPosts
        };
        self.instance.require(self.principal, right)?;

        post.title = detail.title.trim().to_string();
        if let Some(date) = detail.date_created {
            post.date_created = date;
        }
        if !detail.author.trim().is_empty() && !detail.author.eq_ignore_ascii_case(&post.author) {
            self.instance.require(self.principal, Right::EditOtherUsersPosts)?;
            post.author = detail.author.trim().to_string();
        }
        post.date_modified = Utc::now();
        self.apply_detail(&mut post, detail)?;

        self.instance.raise(&mut ExtensionEvent::PostSaving(&mut post));
        self.replace(&post)?;
        self.instance.raise(&mut ExtensionEvent::PostSaved(&post));

        debug!("更新文章: {}", post.title);
        let categories = self.instance.categories.read();
        Ok(PostDetail::from_post(&post, &categories))
    }

    /// 发布或撤回文章
    pub fn set_published(&self, id: Uuid, published: bool) -> RepositoryResult<()> {
        let mut post = self.existing(id)?;
        self.instance
            .require(self.principal, self.publish_right(&post.author))?;
        if post.is_published == published {
            return Ok(());
        }
        post.is_published = published;
        post.date_modified = Utc::now();
        self.replace(&post)?;
        self.instance.raise(&mut ExtensionEvent::PostSaved(&post));
        Ok(())
    }

    /// 移入回收站
    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        let mut post = self.existing(id)?;
        let right = if self.is_own(&post.author) {
            Right::DeleteOwnPosts
        } else {
            Right::DeleteOtherUsersPosts
        };
        self.instance.require(self.principal, right)?;

        post.is_deleted = true;
        post.date_modified = Utc::now();
        self.replace(&post)?;
        info!("文章已移入回收站: {}", post.title);
        Ok(())
    }

    /// 未删除的文章
    fn existing(&self, id: Uuid) -> RepositoryResult<Post> {
        self.instance
            .posts
            .read()
            .iter()
            .find(|p| p.id == id && !p.is_deleted)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("文章 {}", id)))
    }

    fn replace(&self, post: &Post) -> RepositoryResult<()> {
        {
            let mut posts = self.instance.posts.write();
            if let Some(slot) = posts.iter_mut().find(|p| p.id == post.id) {
                *slot = post.clone();
            }
            posts.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        }
        self.instance.persist_post(post, false)?;
        Ok(())
    }

    /// 把输入写入文章：别名、内容、分类、标签和发布状态
    fn apply_detail(&self, post: &mut Post, detail: &PostDetail) -> RepositoryResult<()> {
        let id = post.id;
        post.slug = {
            let posts = self.instance.posts.read();
            utils::unique_slug(&detail.title, &detail.slug, |candidate| {
                posts
                    .iter()
                    .any(|p| p.id != id && p.slug.eq_ignore_ascii_case(candidate))
            })
        };
        post.description = detail.description.clone();
        post.content = detail.content.clone();
        post.has_comments_enabled = detail.has_comments_enabled;
        post.categories = self.resolve_categories(&detail.categories)?;
        post.tags = normalize_tags(&detail.tags);

        let may_publish = self.instance.can(self.principal, self.publish_right(&post.author));
        if detail.is_published && !may_publish {
            debug!("{:?} 没有发布权限，文章保存为草稿", self.principal.name());
        }
        post.is_published = detail.is_published && may_publish;
        Ok(())
    }

    /// 把分类引用解析为 ID，不存在的分类按标题自动创建
    ///
    /// 全部引用解析成功后才写入新分类，失败时分类列表保持不变。
    fn resolve_categories(&self, refs: &[CategoryRef]) -> RepositoryResult<Vec<Uuid>> {
        let mut ids = Vec::new();
        let mut pending: Vec<Category> = Vec::new();
        {
            let mut categories = self.instance.categories.write();
            for r in refs {
                let title = r.title.trim();
                let by_title = |c: &&Category| !title.is_empty() && c.title.eq_ignore_ascii_case(title);
                let found = r
                    .id
                    .and_then(|id| categories.iter().find(|c| c.id == id))
                    .or_else(|| categories.iter().find(by_title))
                    .or_else(|| pending.iter().find(by_title))
                    .map(|c| c.id);

                let id = match found {
                    Some(id) => id,
                    None if !title.is_empty() => {
                        let category = Category::new(title);
                        let id = category.id;
                        pending.push(category);
                        id
                    }
                    None => return Err(RepositoryError::not_found("分类")),
                };
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            for category in &pending {
                info!("自动创建分类: {}", category.title);
            }
            categories.extend(pending.iter().cloned());
        }
        if !pending.is_empty() {
            self.instance.persist_categories()?;
        }
        Ok(ids)
    }
}

fn validate(detail: &PostDetail) -> RepositoryResult<()> {
    if detail.title.trim().is_empty() {
        return Err(RepositoryError::validation("文章标题不能为空"));
    }
    Ok(())
}

/// 标签转小写、去掉空白并去重
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}
