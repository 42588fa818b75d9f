use std::collections::BTreeMap;

use tracing::info;

use crate::core::dto::TagItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::Post;
use crate::security::{Principal, Right};

/// 标签仓储，标签只存在于文章中
pub struct TagRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> TagRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    /// 标签及其文章数
    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<TagItem>> {
        self.instance.require(self.principal, Right::ViewPublicPosts)?;
        let drafts = self.instance.can(self.principal, Right::ViewUnpublishedPosts);

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for post in self
            .instance
            .posts
            .read()
            .iter()
            .filter(|p| !p.is_deleted && (drafts || p.is_visible_to_public()))
        {
            for tag in &post.tags {
                *counts.entry(tag.clone()).or_default() += 1;
            }
        }
        let items = counts
            .into_iter()
            .map(|(name, count)| TagItem { name, count })
            .collect();
        Ok(query::apply(items, query, "Name")?)
    }

    /// 重命名标签，与已有标签重名时合并
    pub fn update(&self, old: &str, new: &str) -> RepositoryResult<usize> {
        self.instance.require(self.principal, Right::EditOtherUsersPosts)?;
        let old = old.trim().to_lowercase();
        let new = new.trim().to_lowercase();
        if new.is_empty() {
            return Err(RepositoryError::validation("标签不能为空"));
        }
        let changed = self.rewrite(&old, |tags| {
            let mut renamed = Vec::with_capacity(tags.len());
            for tag in tags.iter() {
                let tag = if *tag == old { new.clone() } else { tag.clone() };
                if !renamed.contains(&tag) {
                    renamed.push(tag);
                }
            }
            *tags = renamed;
        })?;
        info!("标签 {} 重命名为 {}，影响 {} 篇文章", old, new, changed);
        Ok(changed)
    }

    /// 从所有文章中移除标签
    pub fn remove(&self, tag: &str) -> RepositoryResult<usize> {
        self.instance.require(self.principal, Right::EditOtherUsersPosts)?;
        let tag = tag.trim().to_lowercase();
        let changed = self.rewrite(&tag, |tags| tags.retain(|t| *t != tag))?;
        info!("删除标签 {}，影响 {} 篇文章", tag, changed);
        Ok(changed)
    }

    fn rewrite<F>(&self, tag: &str, edit: F) -> RepositoryResult<usize>
    where
        F: Fn(&mut Vec<String>),
    {
        let changed: Vec<Post> = {
            let mut posts = self.instance.posts.write();
            posts
                .iter_mut()
                .filter(|p| p.tags.iter().any(|t| t == tag))
                .map(|p| {
                    edit(&mut p.tags);
                    p.clone()
                })
                .collect()
        };
        if changed.is_empty() {
            return Err(RepositoryError::not_found(format!("标签 {}", tag)));
        }
        for post in &changed {
            self.instance.persist_post(post, false)?;
        }
        Ok(changed.len())
    }
}
