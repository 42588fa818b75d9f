use tracing::info;

use crate::core::dto::ExtensionItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::store::BlogInstance;
use crate::extensions::{validate_settings, ExtensionError};
use crate::models::{ExtensionSettings, ManagedExtension};
use crate::security::{Principal, Right};

/// 扩展管理仓储，所有操作需要 ManageExtensions
pub struct ExtensionRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> ExtensionRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    /// 已注册的扩展及其在本博客中的状态
    pub fn list(&self) -> RepositoryResult<Vec<ExtensionItem>> {
        self.instance.require(self.principal, Right::ManageExtensions)?;
        let registered = self.instance.extensions().names();
        let mut items: Vec<ExtensionItem> = self
            .instance
            .extension_state
            .read()
            .iter()
            .filter(|m| registered.iter().any(|n| n.eq_ignore_ascii_case(&m.name)))
            .map(to_item)
            .collect();
        items.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> RepositoryResult<ExtensionItem> {
        let item = self.edit(name, |m| {
            m.enabled = enabled;
            Ok(())
        })?;
        info!("扩展 {} 已{}", item.name, if enabled { "启用" } else { "停用" });
        Ok(item)
    }

    pub fn set_priority(&self, name: &str, priority: i32) -> RepositoryResult<ExtensionItem> {
        self.edit(name, |m| {
            m.priority = priority;
            Ok(())
        })
    }

    /// 获取一组设置
    pub fn settings(&self, name: &str, settings: &str) -> RepositoryResult<ExtensionSettings> {
        self.instance.require(self.principal, Right::ManageExtensions)?;
        let state = self.instance.extension_state.read();
        let managed = state
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ExtensionError::NotFound(name.to_string()))?;
        managed.settings(settings).cloned().ok_or_else(|| {
            ExtensionError::SettingsNotFound {
                extension: managed.name.clone(),
                settings: settings.to_string(),
            }
            .into()
        })
    }

    /// 校验并保存一组设置
    pub fn save_settings(&self, name: &str, updated: &ExtensionSettings) -> RepositoryResult<ExtensionSettings> {
        let mut saved = None;
        self.edit(name, |m| {
            let slot = m
                .settings
                .iter_mut()
                .find(|s| s.name.eq_ignore_ascii_case(&updated.name))
                .ok_or_else(|| ExtensionError::SettingsNotFound {
                    extension: name.to_string(),
                    settings: updated.name.clone(),
                })?;
            let merged = validate_settings(name, slot, updated)?;
            *slot = merged.clone();
            saved = Some(merged);
            Ok(())
        })?;
        info!("扩展 {} 的设置 {} 已保存", name, updated.name);
        saved.ok_or_else(|| RepositoryError::not_found(format!("扩展设置 {}", updated.name)))
    }

    fn edit<F>(&self, name: &str, change: F) -> RepositoryResult<ExtensionItem>
    where
        F: FnOnce(&mut ManagedExtension) -> RepositoryResult<()>,
    {
        self.instance.require(self.principal, Right::ManageExtensions)?;
        if self.instance.extensions().get(name).is_none() {
            return Err(ExtensionError::NotFound(name.to_string()).into());
        }
        let item = {
            let mut state = self.instance.extension_state.write();
            let managed = state
                .iter_mut()
                .find(|m| m.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| ExtensionError::NotFound(name.to_string()))?;
            change(managed)?;
            to_item(managed)
        };
        self.instance.persist_extensions()?;
        Ok(item)
    }
}

fn to_item(managed: &ManagedExtension) -> ExtensionItem {
    ExtensionItem {
        name: managed.name.clone(),
        version: managed.version.clone(),
        description: managed.description.clone(),
        author: managed.author.clone(),
        enabled: managed.enabled,
        priority: managed.priority,
        settings: managed.settings.iter().map(|s| s.name.clone()).collect(),
    }
}
