use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::dto::{CommentAction, CommentItem, NewComment};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::extensions::{CommentAdding, ExtensionEvent};
use crate::models::{Comment, ModerationType, Post};
use crate::security::{Principal, Right};
use crate::utils;

/// 评论仓储，评论保存在所属文章中
pub struct CommentsRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> CommentsRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    /// 当前调用者可以看到的全部评论
    fn visible_items(&self) -> RepositoryResult<Vec<CommentItem>> {
        self.instance.require(self.principal, Right::ViewPublicComments)?;
        let unmoderated = self.instance.can(self.principal, Right::ViewUnmoderatedComments);
        let drafts = self.instance.can(self.principal, Right::ViewUnpublishedPosts);

        let posts = self.instance.posts.read();
        Ok(posts
            .iter()
            .filter(|p| !p.is_deleted && (drafts || p.is_visible_to_public()))
            .flat_map(|p| {
                p.comments
                    .iter()
                    .filter(move |c| unmoderated || (c.is_approved && !c.is_spam && !c.is_deleted))
                    .map(move |c| CommentItem::from_comment(c, &p.title))
            })
            .collect())
    }

    /// 查询评论（跨文章展开）
    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<CommentItem>> {
        let items = self.visible_items()?;
        Ok(query::apply(items, query, "DateCreated desc")?)
    }

    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<CommentItem> {
        self.visible_items()?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| RepositoryError::not_found(format!("评论 {}", id)))
    }

    /// 添加评论
    pub fn add(&self, new: &NewComment) -> RepositoryResult<CommentItem> {
        self.instance.require(self.principal, Right::CreateComments)?;
        let settings = self.instance.settings.read().clone();
        if !settings.enable_comments {
            return Err(RepositoryError::forbidden("本博客已关闭评论"));
        }

        let author = new.author.trim();
        let content = new.content.trim();
        if author.is_empty() || content.is_empty() {
            return Err(RepositoryError::validation("评论作者和内容不能为空"));
        }
        if !new.email.trim().is_empty() && !utils::is_valid_email(&new.email) {
            return Err(RepositoryError::validation("邮箱格式不正确"));
        }
        if !new.website.trim().is_empty() {
            utils::parse_web_url(&new.website)
                .map_err(|e| RepositoryError::validation(format!("网站地址无效: {}", e)))?;
        }

        let post = self.commentable_post(new.post_id, settings.days_comments_are_enabled)?;
        if let Some(parent) = new.parent_id {
            if !post.comments.iter().any(|c| c.id == parent && !c.is_deleted) {
                return Err(RepositoryError::validation("回复的评论不属于该文章"));
            }
        }

        let mut comment = Comment::new(post.id, author, content);
        comment.parent_id = new.parent_id;
        comment.email = new.email.trim().to_string();
        comment.website = new.website.trim().to_string();
        comment.ip = new.ip.clone();

        let moderator = self.principal.name().unwrap_or("Auto").to_string();
        match settings.moderation {
            ModerationType::Disabled | ModerationType::Auto => {
                comment.is_approved = true;
                comment.moderated_by = "Auto".to_string();
            }
            ModerationType::Manual => {
                if self.instance.can(self.principal, Right::ModerateComments) {
                    comment.is_approved = true;
                    comment.moderated_by = moderator;
                }
            }
        }

        let mut args = CommentAdding::new(comment);
        self.instance.raise(&mut ExtensionEvent::CommentAdding(&mut args));
        if args.cancel {
            let reason = args.reason.unwrap_or_else(|| "评论被拒绝".to_string());
            info!("评论被扩展拒绝: {}", reason);
            return Err(RepositoryError::forbidden(reason));
        }
        let mut comment = args.comment;
        if settings.moderation == ModerationType::Disabled {
            // 不审核时忽略扩展的垃圾评论标记
            comment.is_spam = false;
            comment.is_approved = true;
        } else if comment.is_spam {
            comment.is_approved = false;
        }

        let updated = self.modify_post(post.id, |p| {
            p.comments.push(comment.clone());
            Ok(())
        })?;
        self.instance
            .raise(&mut ExtensionEvent::CommentAdded(&comment));
        debug!("新评论: {} -> {}", comment.author, updated.title);
        Ok(CommentItem::from_comment(&comment, &updated.title))
    }

    /// 可以评论的文章
    fn commentable_post(&self, post_id: Uuid, days: u32) -> RepositoryResult<Post> {
        let post = self
            .instance
            .posts
            .read()
            .iter()
            .find(|p| p.id == post_id && p.is_visible_to_public())
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("文章 {}", post_id)))?;
        if !post.has_comments_enabled {
            return Err(RepositoryError::forbidden("该文章已关闭评论"));
        }
        if days > 0 && post.date_created + Duration::days(i64::from(days)) < Utc::now() {
            return Err(RepositoryError::forbidden("该文章的评论期限已过"));
        }
        Ok(post)
    }

    /// 审核或修改评论
    pub fn update(&self, id: Uuid, action: &CommentAction) -> RepositoryResult<CommentItem> {
        self.instance.require(self.principal, Right::ModerateComments)?;
        let moderator = self.principal.name().unwrap_or_default().to_string();
        let post_id = self.post_of(id)?;

        let mut result = None;
        let post = self.modify_post(post_id, |p| {
            let comment = p
                .comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| RepositoryError::not_found(format!("评论 {}", id)))?;
            match action {
                CommentAction::Approve | CommentAction::NotSpam => {
                    comment.is_approved = true;
                    comment.is_spam = false;
                }
                CommentAction::Unapprove => comment.is_approved = false,
                CommentAction::Spam => {
                    comment.is_spam = true;
                    comment.is_approved = false;
                }
                CommentAction::Edit(content) => {
                    if content.trim().is_empty() {
                        return Err(RepositoryError::validation("评论内容不能为空"));
                    }
                    comment.content = content.trim().to_string();
                }
            }
            if !matches!(action, CommentAction::Edit(_)) {
                comment.moderated_by = moderator.clone();
            }
            result = Some(comment.clone());
            Ok(())
        })?;

        let comment = result.ok_or_else(|| RepositoryError::not_found(format!("评论 {}", id)))?;
        Ok(CommentItem::from_comment(&comment, &post.title))
    }

    /// 移入回收站
    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ModerateComments)?;
        let post_id = self.post_of(id)?;
        self.modify_post(post_id, |p| {
            if let Some(c) = p.comments.iter_mut().find(|c| c.id == id) {
                c.is_deleted = true;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// 永久删除全部垃圾评论，返回删除数量
    pub fn purge_spam(&self) -> RepositoryResult<usize> {
        self.instance.require(self.principal, Right::ModerateComments)?;
        let affected: Vec<Uuid> = self
            .instance
            .posts
            .read()
            .iter()
            .filter(|p| p.comments.iter().any(|c| c.is_spam))
            .map(|p| p.id)
            .collect();

        let mut purged = 0;
        for post_id in affected {
            self.modify_post(post_id, |p| {
                let before = p.comments.len();
                p.comments.retain(|c| !c.is_spam);
                purged += before - p.comments.len();
                Ok(())
            })?;
        }
        info!("已清除 {} 条垃圾评论", purged);
        Ok(purged)
    }

    fn post_of(&self, comment_id: Uuid) -> RepositoryResult<Uuid> {
        self.instance
            .posts
            .read()
            .iter()
            .find(|p| p.comments.iter().any(|c| c.id == comment_id))
            .map(|p| p.id)
            .ok_or_else(|| RepositoryError::not_found(format!("评论 {}", comment_id)))
    }

    /// 修改文章并写回
    fn modify_post<F>(&self, post_id: Uuid, change: F) -> RepositoryResult<Post>
    where
        F: FnOnce(&mut Post) -> RepositoryResult<()>,
    {
        let post = {
            let mut posts = self.instance.posts.write();
            let post = posts
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or_else(|| RepositoryError::not_found(format!("文章 {}", post_id)))?;
            change(post)?;
            post.clone()
        };
        self.instance.persist_post(&post, false)?;
        Ok(post)
    }
}
