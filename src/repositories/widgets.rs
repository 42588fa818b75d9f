use tracing::info;
use uuid::Uuid;

use crate::core::dto::WidgetKindItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::store::BlogInstance;
use crate::models::{WidgetEntry, WidgetKind, WidgetZone};
use crate::security::{Principal, Right};

/// 小部件区域仓储
pub struct WidgetsRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> WidgetsRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn zones(&self) -> RepositoryResult<Vec<WidgetZone>> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        Ok(self.instance.widget_zones.read().clone())
    }

    /// 可添加的小部件类型
    pub fn available(&self) -> RepositoryResult<Vec<WidgetKindItem>> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        Ok(WidgetKind::ALL
            .iter()
            .map(|kind| WidgetKindItem {
                kind: kind.to_string(),
                title: kind.default_title().to_string(),
            })
            .collect())
    }

    /// 添加小部件，区域不存在时创建
    pub fn add(&self, zone: &str, kind: WidgetKind, title: &str) -> RepositoryResult<WidgetEntry> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        let zone = zone.trim();
        if zone.is_empty() {
            return Err(RepositoryError::validation("区域名不能为空"));
        }
        let title = if title.trim().is_empty() {
            kind.default_title()
        } else {
            title.trim()
        };
        let widget = WidgetEntry::new(kind, title);
        {
            let mut zones = self.instance.widget_zones.write();
            match zones.iter_mut().find(|z| z.name.eq_ignore_ascii_case(zone)) {
                Some(existing) => existing.widgets.push(widget.clone()),
                None => {
                    let mut created = WidgetZone::new(zone);
                    created.widgets.push(widget.clone());
                    zones.push(created);
                }
            }
        }
        self.instance.persist_widget_zones()?;
        info!("区域 {} 新增小部件: {}", zone, widget.title);
        Ok(widget)
    }

    pub fn update(&self, zone: &str, widget: &WidgetEntry) -> RepositoryResult<WidgetEntry> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        let updated = self.edit_zone(zone, |z| {
            let slot = z
                .widgets
                .iter_mut()
                .find(|w| w.id == widget.id)
                .ok_or_else(|| RepositoryError::not_found(format!("小部件 {}", widget.id)))?;
            if slot.kind != widget.kind {
                return Err(RepositoryError::validation("不能修改小部件类型"));
            }
            slot.title = widget.title.clone();
            slot.show_title = widget.show_title;
            slot.settings = widget.settings.clone();
            Ok(slot.clone())
        })?;
        Ok(updated)
    }

    pub fn remove(&self, zone: &str, id: Uuid) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        self.edit_zone(zone, |z| {
            let before = z.widgets.len();
            z.widgets.retain(|w| w.id != id);
            if z.widgets.len() == before {
                return Err(RepositoryError::not_found(format!("小部件 {}", id)));
            }
            Ok(())
        })
    }

    /// 调整小部件在区域中的位置，超出范围时放到末尾
    pub fn move_widget(&self, zone: &str, id: Uuid, index: usize) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ManageWidgets)?;
        self.edit_zone(zone, |z| {
            let from = z
                .widgets
                .iter()
                .position(|w| w.id == id)
                .ok_or_else(|| RepositoryError::not_found(format!("小部件 {}", id)))?;
            let widget = z.widgets.remove(from);
            let to = index.min(z.widgets.len());
            z.widgets.insert(to, widget);
            Ok(())
        })
    }

    fn edit_zone<T, F>(&self, zone: &str, change: F) -> RepositoryResult<T>
    where
        F: FnOnce(&mut WidgetZone) -> RepositoryResult<T>,
    {
        let result = {
            let mut zones = self.instance.widget_zones.write();
            let target = zones
                .iter_mut()
                .find(|z| z.name.eq_ignore_ascii_case(zone))
                .ok_or_else(|| RepositoryError::not_found(format!("小部件区域 {}", zone)))?;
            change(target)?
        };
        self.instance.persist_widget_zones()?;
        Ok(result)
    }
}
