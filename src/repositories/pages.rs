use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::core::dto::{PageDetail, PageItem};
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::extensions::ExtensionEvent;
use crate::models::Page;
use crate::security::{Principal, Right};
use crate::utils;

/// 页面仓储
pub struct PageRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> PageRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    fn show_unpublished(&self) -> RepositoryResult<bool> {
        let unpublished = self.instance.can(self.principal, Right::ViewUnpublishedPages);
        if !unpublished {
            self.instance.require(self.principal, Right::ViewPublicPages)?;
        }
        Ok(unpublished)
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<PageItem>> {
        let unpublished = self.show_unpublished()?;
        let items: Vec<PageItem> = {
            let pages = self.instance.pages.read();
            pages
                .iter()
                .filter(|p| !p.is_deleted && (unpublished || p.is_visible_to_public()))
                .map(|p| PageItem::from_page(p, &pages))
                .collect()
        };
        Ok(query::apply(items, query, "SortOrder, Title")?)
    }

    fn visible(&self, matches: impl Fn(&Page) -> bool) -> RepositoryResult<Page> {
        let unpublished = self.show_unpublished()?;
        self.instance
            .pages
            .read()
            .iter()
            .find(|p| matches(p) && !p.is_deleted && (unpublished || p.is_visible_to_public()))
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("页面"))
    }

    pub fn find_by_id(&self, id: Uuid) -> RepositoryResult<PageDetail> {
        self.visible(|p| p.id == id).map(|p| PageDetail::from_page(&p))
    }

    /// 按别名获取页面（前台展示用）
    pub fn get_by_slug(&self, slug: &str) -> RepositoryResult<Page> {
        self.visible(|p| p.slug.eq_ignore_ascii_case(slug))
    }

    /// 首页
    pub fn front_page(&self) -> RepositoryResult<Option<Page>> {
        match self.visible(|p| p.is_front_page) {
            Ok(page) => Ok(Some(page)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn add(&self, detail: &PageDetail) -> RepositoryResult<PageDetail> {
        self.instance.require(self.principal, Right::CreateNewPages)?;
        validate(detail)?;

        let mut page = Page::new(detail.title.trim());
        page.author = self.principal.name().unwrap_or_default().to_string();
        self.apply_detail(&mut page, detail)?;
        {
            let mut pages = self.instance.pages.write();
            pages.push(page.clone());
        }
        self.instance.persist_page(&page, true)?;
        self.after_save(&page)?;

        info!("新增页面: {} ({})", page.title, page.slug);
        Ok(PageDetail::from_page(&page))
    }

    pub fn update(&self, detail: &PageDetail) -> RepositoryResult<PageDetail> {
        self.instance.require(self.principal, Right::EditPages)?;
        let id = detail
            .id
            .ok_or_else(|| RepositoryError::validation("缺少页面 ID"))?;
        validate(detail)?;

        let mut page = self.existing(id)?;
        page.title = detail.title.trim().to_string();
        page.date_modified = Utc::now();
        self.apply_detail(&mut page, detail)?;
        self.replace(&page)?;
        self.after_save(&page)?;
        Ok(PageDetail::from_page(&page))
    }

    /// 移入回收站
    pub fn remove(&self, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::DeletePages)?;
        let mut page = self.existing(id)?;
        page.is_deleted = true;
        page.is_front_page = false;
        page.date_modified = Utc::now();
        self.replace(&page)?;
        info!("页面已移入回收站: {}", page.title);
        Ok(())
    }

    fn existing(&self, id: Uuid) -> RepositoryResult<Page> {
        self.instance
            .pages
            .read()
            .iter()
            .find(|p| p.id == id && !p.is_deleted)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("页面 {}", id)))
    }

    fn replace(&self, page: &Page) -> RepositoryResult<()> {
        {
            let mut pages = self.instance.pages.write();
            if let Some(slot) = pages.iter_mut().find(|p| p.id == page.id) {
                *slot = page.clone();
            }
        }
        self.instance.persist_page(page, false)?;
        Ok(())
    }

    fn apply_detail(&self, page: &mut Page, detail: &PageDetail) -> RepositoryResult<()> {
        if let Some(parent) = detail.parent_id {
            self.check_parent(page.id, parent)?;
        }

        let id = page.id;
        page.slug = {
            let pages = self.instance.pages.read();
            utils::unique_slug(&detail.title, &detail.slug, |candidate| {
                pages
                    .iter()
                    .any(|p| p.id != id && p.slug.eq_ignore_ascii_case(candidate))
            })
        };
        page.description = detail.description.clone();
        page.keywords = detail.keywords.clone();
        page.content = detail.content.clone();
        page.parent_id = detail.parent_id;
        page.show_in_list = detail.show_in_list;
        page.sort_order = detail.sort_order;
        page.is_front_page = detail.is_front_page;
        page.is_published = detail.is_published
            && self.instance.can(self.principal, Right::PublishPages);
        Ok(())
    }

    /// 父页面不能是自己或自己的后代
    fn check_parent(&self, id: Uuid, parent: Uuid) -> RepositoryResult<()> {
        let pages = self.instance.pages.read();
        if !pages.iter().any(|p| p.id == parent && !p.is_deleted) {
            return Err(RepositoryError::not_found("父页面"));
        }
        let mut current = Some(parent);
        // 层级深度不会超过页面总数
        for _ in 0..=pages.len() {
            let Some(cursor) = current else {
                return Ok(());
            };
            if cursor == id {
                return Err(RepositoryError::validation("父页面不能是页面本身或其子页面"));
            }
            current = pages.iter().find(|p| p.id == cursor).and_then(|p| p.parent_id);
        }
        Err(RepositoryError::validation("页面层级存在循环"))
    }

    /// 设置首页时取消其他页面的首页标记
    fn after_save(&self, page: &Page) -> RepositoryResult<()> {
        if page.is_front_page {
            let cleared: Vec<Page> = {
                let mut pages = self.instance.pages.write();
                pages
                    .iter_mut()
                    .filter(|p| p.id != page.id && p.is_front_page)
                    .map(|p| {
                        p.is_front_page = false;
                        p.clone()
                    })
                    .collect()
            };
            for other in &cleared {
                self.instance.persist_page(other, false)?;
            }
        }
        self.instance.raise(&mut ExtensionEvent::PageSaved(page));
        Ok(())
    }
}

fn validate(detail: &PageDetail) -> RepositoryResult<()> {
    if detail.title.trim().is_empty() {
        return Err(RepositoryError::validation("页面标题不能为空"));
    }
    Ok(())
}
