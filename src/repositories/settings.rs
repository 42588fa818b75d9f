use tracing::info;

use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::store::BlogInstance;
use crate::models::BlogSettings;
use crate::security::{Principal, Right};
use crate::theme::DEFAULT_THEME;

/// 博客设置仓储
pub struct SettingsRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn get(&self) -> RepositoryResult<BlogSettings> {
        self.instance
            .require(self.principal, Right::AccessAdminSettingsPages)?;
        Ok(self.instance.settings.read().clone())
    }

    pub fn update(&self, settings: &BlogSettings) -> RepositoryResult<BlogSettings> {
        self.instance
            .require(self.principal, Right::AccessAdminSettingsPages)?;
        if settings.name.trim().is_empty() {
            return Err(RepositoryError::validation("博客名称不能为空"));
        }
        if settings.posts_per_page == 0 {
            return Err(RepositoryError::validation("每页文章数至少为 1"));
        }
        if settings.posts_per_feed == 0 {
            return Err(RepositoryError::validation("订阅文章数至少为 1"));
        }
        if settings.theme != DEFAULT_THEME {
            if let Some(dir) = self.instance.themes_dir() {
                if !dir.join(&settings.theme).is_dir() {
                    return Err(RepositoryError::validation(format!(
                        "主题不存在: {}",
                        settings.theme
                    )));
                }
            }
        }

        *self.instance.settings.write() = settings.clone();
        self.instance.persist_settings()?;
        info!("博客设置已更新: {}", settings.name);
        Ok(settings.clone())
    }
}
