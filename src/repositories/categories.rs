use tracing::info;
use uuid::Uuid;

use crate::core::dto::CategoryItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::{Category, Post};
use crate::security::{Principal, Right};

/// 分类仓储
pub struct CategoryRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    /// 全部分类及当前调用者可见的文章数
    fn items(&self) -> RepositoryResult<Vec<CategoryItem>> {
        self.instance.require(self.principal, Right::ViewPublicPosts)?;
        let drafts = self.instance.can(self.principal, Right::ViewUnpublishedPosts);
        let posts = self.instance.posts.read();
        let visible: Vec<&Post> = posts
            .iter()
            .filter(|p| !p.is_deleted && (drafts || p.is_visible_to_public()))
            .collect();

        Ok(self
            .instance
            .categories
            .read()
            .iter()
            .map(|c| {
                let count = visible.iter().filter(|p| p.categories.contains(&c.id)).count();
                CategoryItem::from_category(c, count)
            })
            .collect())
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<CategoryItem>> {
        Ok(query::apply(self.items()?, query, "Title")?)
    }

    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<CategoryItem> {
        self.items()?
            .into_iter()
            .find(|c| c.id == Some(id))
            .ok_or_else(|| RepositoryError::not_found(format!("分类 {}", id)))
    }

    pub fn add(&self, item: &CategoryItem) -> RepositoryResult<CategoryItem> {
        self.instance.require(self.principal, Right::ManageCategories)?;
        let mut category = Category::new(item.title.trim());
        category.description = item.description.clone();
        self.check(&category.title, category.id, item.parent_id)?;
        category.parent_id = item.parent_id;

        self.instance.categories.write().push(category.clone());
        self.instance.persist_categories()?;
        info!("新增分类: {}", category.title);
        Ok(CategoryItem::from_category(&category, 0))
    }

    pub fn update(&self, item: &CategoryItem) -> RepositoryResult<CategoryItem> {
        self.instance.require(self.principal, Right::ManageCategories)?;
        let id = item
            .id
            .ok_or_else(|| RepositoryError::validation("缺少分类 ID"))?;
        self.check(item.title.trim(), id, item.parent_id)?;

        let updated = {
            let mut categories = self.instance.categories.write();
            let category = categories
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| RepositoryError::not_found(format!("分类 {}", id)))?;
            category.title = item.title.trim().to_string();
            category.description = item.description.clone();
            category.parent_id = item.parent_id;
            category.clone()
        };
        self.instance.persist_categories()?;
        self.find_by_id(updated.id)
    }

    /// 删除分类：从所有文章中移除，子分类挂到被删分类的父分类下
    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ManageCategories)?;
        let removed = {
            let mut categories = self.instance.categories.write();
            let index = categories
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| RepositoryError::not_found(format!("分类 {}", id)))?;
            let removed = categories.remove(index);
            for child in categories.iter_mut().filter(|c| c.parent_id == Some(id)) {
                child.parent_id = removed.parent_id;
            }
            removed
        };
        self.instance.persist_categories()?;

        let changed: Vec<Post> = {
            let mut posts = self.instance.posts.write();
            posts
                .iter_mut()
                .filter(|p| p.categories.contains(&id))
                .map(|p| {
                    p.categories.retain(|c| *c != id);
                    p.clone()
                })
                .collect()
        };
        for post in &changed {
            self.instance.persist_post(post, false)?;
        }
        info!("删除分类: {}（影响 {} 篇文章）", removed.title, changed.len());
        Ok(())
    }

    /// 标题唯一且父分类合法
    fn check(&self, title: &str, id: Uuid, parent: Option<Uuid>) -> RepositoryResult<()> {
        if title.is_empty() {
            return Err(RepositoryError::validation("分类标题不能为空"));
        }
        let categories = self.instance.categories.read();
        if categories
            .iter()
            .any(|c| c.id != id && c.title.eq_ignore_ascii_case(title))
        {
            return Err(RepositoryError::conflict(format!("分类已存在: {}", title)));
        }
        if let Some(parent) = parent {
            if !categories.iter().any(|c| c.id == parent) {
                return Err(RepositoryError::not_found("父分类"));
            }
            let mut cursor = Some(parent);
            for _ in 0..=categories.len() {
                match cursor {
                    Some(current) if current == id => {
                        return Err(RepositoryError::validation("父分类不能是分类本身或其子分类"))
                    }
                    Some(current) => {
                        cursor = categories
                            .iter()
                            .find(|c| c.id == current)
                            .and_then(|c| c.parent_id)
                    }
                    None => break,
                }
            }
        }
        Ok(())
    }
}
