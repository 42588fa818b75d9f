use tracing::info;
use uuid::Uuid;

use crate::core::dto::{TrashItem, TrashKind};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::{Page, Post};
use crate::security::{Principal, Right};
use crate::utils;

/// 回收站：已软删除的文章、页面和评论
pub struct TrashRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> TrashRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    fn items(&self) -> Vec<TrashItem> {
        let mut items = Vec::new();
        for post in self.instance.posts.read().iter() {
            if post.is_deleted {
                items.push(TrashItem {
                    kind: TrashKind::Post,
                    id: post.id,
                    title: post.title.clone(),
                    date_created: post.date_created,
                });
            }
            for comment in post.comments.iter().filter(|c| c.is_deleted) {
                items.push(TrashItem {
                    kind: TrashKind::Comment,
                    id: comment.id,
                    title: format!("{}: {}", comment.author, utils::excerpt(&comment.content, 40)),
                    date_created: comment.date_created,
                });
            }
        }
        for page in self.instance.pages.read().iter().filter(|p| p.is_deleted) {
            items.push(TrashItem {
                kind: TrashKind::Page,
                id: page.id,
                title: page.title.clone(),
                date_created: page.date_created,
            });
        }
        items
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<TrashItem>> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        Ok(query::apply(self.items(), query, "DateCreated desc")?)
    }

    /// 回收站条目数
    pub fn count(&self) -> usize {
        self.items().len()
    }

    fn authorize(&self, kind: TrashKind, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        let right = match kind {
            TrashKind::Post => {
                let own = self
                    .instance
                    .posts
                    .read()
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| self.principal.is_self(&p.author))
                    .unwrap_or(false);
                if own {
                    Right::DeleteOwnPosts
                } else {
                    Right::DeleteOtherUsersPosts
                }
            }
            TrashKind::Page => Right::DeletePages,
            TrashKind::Comment => Right::ModerateComments,
        };
        self.instance.require(self.principal, right)
    }

    /// 从回收站恢复
    pub fn restore(&self, kind: TrashKind, id: Uuid) -> RepositoryResult<()> {
        self.authorize(kind, id)?;
        match kind {
            TrashKind::Post => {
                let post = self.edit_post(|p| p.id == id && p.is_deleted, |p| {
                    p.is_deleted = false;
                    Ok(())
                })?;
                info!("已恢复文章: {}", post.title);
            }
            TrashKind::Page => {
                let page = {
                    let mut pages = self.instance.pages.write();
                    let page = pages
                        .iter_mut()
                        .find(|p| p.id == id && p.is_deleted)
                        .ok_or_else(|| RepositoryError::not_found(format!("回收站中的页面 {}", id)))?;
                    page.is_deleted = false;
                    page.clone()
                };
                self.instance.persist_page(&page, false)?;
                info!("已恢复页面: {}", page.title);
            }
            TrashKind::Comment => {
                self.edit_post(
                    |p| p.comments.iter().any(|c| c.id == id && c.is_deleted),
                    |p| {
                        if let Some(c) = p.comments.iter_mut().find(|c| c.id == id) {
                            c.is_deleted = false;
                        }
                        Ok(())
                    },
                )?;
            }
        }
        Ok(())
    }

    /// 永久删除
    pub fn purge(&self, kind: TrashKind, id: Uuid) -> RepositoryResult<()> {
        self.authorize(kind, id)?;
        match kind {
            TrashKind::Post => {
                let post = {
                    let mut posts = self.instance.posts.write();
                    let index = posts
                        .iter()
                        .position(|p| p.id == id && p.is_deleted)
                        .ok_or_else(|| RepositoryError::not_found(format!("回收站中的文章 {}", id)))?;
                    posts.remove(index)
                };
                self.instance.delete_post_file(&post)?;
                info!("已永久删除文章: {}", post.title);
            }
            TrashKind::Page => {
                let (page, orphans) = {
                    let mut pages = self.instance.pages.write();
                    let index = pages
                        .iter()
                        .position(|p| p.id == id && p.is_deleted)
                        .ok_or_else(|| RepositoryError::not_found(format!("回收站中的页面 {}", id)))?;
                    let page = pages.remove(index);
                    let orphans: Vec<Page> = pages
                        .iter_mut()
                        .filter(|p| p.parent_id == Some(id))
                        .map(|p| {
                            p.parent_id = page.parent_id;
                            p.clone()
                        })
                        .collect();
                    (page, orphans)
                };
                self.instance.delete_page_file(&page)?;
                for orphan in &orphans {
                    self.instance.persist_page(orphan, false)?;
                }
                info!("已永久删除页面: {}", page.title);
            }
            TrashKind::Comment => {
                self.edit_post(
                    |p| p.comments.iter().any(|c| c.id == id && c.is_deleted),
                    |p| {
                        let parent = p.comments.iter().find(|c| c.id == id).and_then(|c| c.parent_id);
                        p.comments.retain(|c| c.id != id);
                        for reply in p.comments.iter_mut().filter(|c| c.parent_id == Some(id)) {
                            reply.parent_id = parent;
                        }
                        Ok(())
                    },
                )?;
            }
        }
        Ok(())
    }

    /// 清空回收站，返回删除的条目数
    pub fn purge_all(&self) -> RepositoryResult<usize> {
        self.instance.require(self.principal, Right::AccessAdminPages)?;
        let items = self.items();
        // 先删评论，所属文章可能随后整体删除
        let mut ordered: Vec<&TrashItem> = items.iter().filter(|i| i.kind == TrashKind::Comment).collect();
        ordered.extend(items.iter().filter(|i| i.kind != TrashKind::Comment));

        let mut purged = 0;
        for item in ordered {
            self.purge(item.kind, item.id)?;
            purged += 1;
        }
        info!("回收站已清空: {} 项", purged);
        Ok(purged)
    }

    fn edit_post<P, F>(&self, select: P, change: F) -> RepositoryResult<Post>
    where
        P: Fn(&Post) -> bool,
        F: FnOnce(&mut Post) -> RepositoryResult<()>,
    {
        let post = {
            let mut posts = self.instance.posts.write();
            let post = posts
                .iter_mut()
                .find(|p| select(p))
                .ok_or_else(|| RepositoryError::not_found("回收站中的条目"))?;
            change(post)?;
            post.clone()
        };
        self.instance.persist_post(&post, false)?;
        Ok(post)
    }
}
