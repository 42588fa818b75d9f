use tracing::info;
use uuid::Uuid;

use crate::core::dto::BlogRollDetail;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::BlogRollItem;
use crate::security::{Principal, Right};
use crate::utils;

/// 友情链接仓储
pub struct BlogRollRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> BlogRollRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<BlogRollDetail>> {
        self.instance.require(self.principal, Right::ViewPublicPosts)?;
        let items = self.instance.blogroll.read().clone();
        let items = query::apply(items, query, "SortIndex, Title")?;
        Ok(items.iter().map(BlogRollDetail::from).collect())
    }

    pub fn add(&self, detail: &BlogRollDetail) -> RepositoryResult<BlogRollDetail> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        validate(detail)?;
        let item = BlogRollItem {
            id: Uuid::new_v4(),
            title: detail.title.trim().to_string(),
            description: detail.description.clone(),
            blog_url: detail.blog_url.trim().to_string(),
            feed_url: detail.feed_url.trim().to_string(),
            xfn: detail.xfn.clone(),
            sort_index: detail.sort_index,
        };
        {
            let mut items = self.instance.blogroll.write();
            items.push(item.clone());
            items.sort_by_key(|i| i.sort_index);
        }
        self.instance.persist_blogroll()?;
        info!("新增友情链接: {}", item.title);
        Ok(BlogRollDetail::from(&item))
    }

    pub fn update(&self, detail: &BlogRollDetail) -> RepositoryResult<BlogRollDetail> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        validate(detail)?;
        let id = detail
            .id
            .ok_or_else(|| RepositoryError::validation("缺少友情链接 ID"))?;
        let (item, feed_changed) = {
            let mut items = self.instance.blogroll.write();
            let slot = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| RepositoryError::not_found(format!("友情链接 {}", id)))?;
            let feed_changed = slot.feed_url != detail.feed_url.trim();
            slot.title = detail.title.trim().to_string();
            slot.description = detail.description.clone();
            slot.blog_url = detail.blog_url.trim().to_string();
            slot.feed_url = detail.feed_url.trim().to_string();
            slot.xfn = detail.xfn.clone();
            slot.sort_index = detail.sort_index;
            let item = slot.clone();
            items.sort_by_key(|i| i.sort_index);
            (item, feed_changed)
        };
        if feed_changed {
            self.instance.blogroll_feeds.write().remove(&id);
        }
        self.instance.persist_blogroll()?;
        Ok(BlogRollDetail::from(&item))
    }

    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        {
            let mut items = self.instance.blogroll.write();
            let before = items.len();
            items.retain(|i| i.id != id);
            if items.len() == before {
                return Err(RepositoryError::not_found(format!("友情链接 {}", id)));
            }
        }
        self.instance.blogroll_feeds.write().remove(&id);
        self.instance.persist_blogroll()?;
        Ok(())
    }
}

fn validate(detail: &BlogRollDetail) -> RepositoryResult<()> {
    if detail.title.trim().is_empty() {
        return Err(RepositoryError::validation("友情链接标题不能为空"));
    }
    utils::parse_web_url(&detail.blog_url)
        .map_err(|e| RepositoryError::validation(format!("博客地址无效: {}", e)))?;
    if !detail.feed_url.trim().is_empty() {
        utils::parse_web_url(&detail.feed_url)
            .map_err(|e| RepositoryError::validation(format!("订阅地址无效: {}", e)))?;
    }
    Ok(())
}
