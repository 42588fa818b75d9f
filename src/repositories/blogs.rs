use tracing::info;
use uuid::Uuid;

use crate::core::dto::{BlogDetail, BlogItem};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::{BlogInstance, Site};
use crate::models::Blog;
use crate::security::{Principal, Right};
use crate::utils;

/// 博客仓储，只能在主博客中使用
pub struct BlogRepository<'a> {
    site: &'a Site,
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> BlogRepository<'a> {
    pub fn new(site: &'a Site, instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self {
            site,
            instance,
            principal,
        }
    }

    fn authorize(&self) -> RepositoryResult<()> {
        if !self.instance.is_primary() {
            return Err(RepositoryError::forbidden("只能在主博客中管理博客"));
        }
        self.instance.require(self.principal, Right::ManageBlogs)
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<BlogItem>> {
        self.authorize()?;
        let blogs = query::apply(self.site.blogs(), query, "Name")?;
        Ok(blogs.iter().map(BlogItem::from).collect())
    }

    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<BlogItem> {
        self.authorize()?;
        self.site
            .blog(id)
            .map(|b| BlogItem::from(&b))
            .ok_or_else(|| RepositoryError::not_found(format!("博客 {}", id)))
    }

    /// 新建博客，复制模板博客（默认主博客）的设置、权限、角色和用户
    pub fn add(&self, detail: &BlogDetail) -> RepositoryResult<BlogItem> {
        self.authorize()?;
        let name = detail.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::validation("博客名称不能为空"));
        }

        let container = if detail.storage_container_name.trim().is_empty() {
            utils::slugify(name)
        } else {
            detail.storage_container_name.trim().to_lowercase()
        };
        if container.is_empty()
            || !container
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RepositoryError::validation(format!("存储目录名无效: {}", container)));
        }

        let mut blog = Blog::new(name, &container);
        blog.hostname = detail.hostname.trim().to_lowercase();
        blog.virtual_path = detail.virtual_path.trim().to_string();
        blog.is_active = detail.is_active;
        blog.is_site_aggregation = detail.is_site_aggregation;
        self.check_unique(&blog)?;

        let template = match detail.template_id {
            Some(id) => self
                .site
                .blog(id)
                .ok_or_else(|| RepositoryError::not_found(format!("模板博客 {}", id)))?,
            None => self.site.primary()?,
        };
        self.site.insert_blog(blog.clone(), Some(&template))?;

        // 模板的设置带着模板的名称
        let instance = self.site.instance(blog.id)?;
        instance.settings.write().name = blog.name.clone();
        instance.persist_settings()?;

        info!("新增博客: {}（模板: {}）", blog.name, template.name);
        Ok(BlogItem::from(&blog))
    }

    pub fn update(&self, detail: &BlogDetail) -> RepositoryResult<BlogItem> {
        self.authorize()?;
        let id = detail
            .id
            .ok_or_else(|| RepositoryError::validation("缺少博客 ID"))?;
        let mut blog = self
            .site
            .blog(id)
            .ok_or_else(|| RepositoryError::not_found(format!("博客 {}", id)))?;
        if detail.name.trim().is_empty() {
            return Err(RepositoryError::validation("博客名称不能为空"));
        }
        if blog.is_primary && !detail.is_active {
            return Err(RepositoryError::forbidden("主博客不能停用"));
        }

        blog.name = detail.name.trim().to_string();
        blog.hostname = detail.hostname.trim().to_lowercase();
        blog.virtual_path = detail.virtual_path.trim().to_string();
        blog.is_active = detail.is_active;
        blog.is_site_aggregation = detail.is_site_aggregation;
        self.check_unique(&blog)?;

        self.site.update_blog(blog.clone())?;
        Ok(BlogItem::from(&blog))
    }

    /// 删除博客及其存储，主博客不可删除
    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        self.authorize()?;
        let blog = self
            .site
            .blog(id)
            .ok_or_else(|| RepositoryError::not_found(format!("博客 {}", id)))?;
        if blog.is_primary {
            return Err(RepositoryError::forbidden("主博客不可删除"));
        }
        self.site.delete_blog(id)?;
        Ok(())
    }

    /// 存储目录唯一，同一主机名下的虚拟路径唯一
    fn check_unique(&self, blog: &Blog) -> RepositoryResult<()> {
        let path = blog.normalized_virtual_path();
        for other in self.site.blogs().iter().filter(|b| b.id != blog.id) {
            if other
                .storage_container_name
                .eq_ignore_ascii_case(&blog.storage_container_name)
            {
                return Err(RepositoryError::conflict(format!(
                    "存储目录已被使用: {}",
                    blog.storage_container_name
                )));
            }
            if other.hostname.eq_ignore_ascii_case(&blog.hostname)
                && other.normalized_virtual_path() == path
            {
                return Err(RepositoryError::conflict(format!(
                    "主机名和虚拟路径已被使用: {}{}",
                    blog.hostname, path
                )));
            }
        }
        Ok(())
    }
}
