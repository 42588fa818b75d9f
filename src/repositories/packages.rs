use std::fs;
use std::path::Path;

use chrono::Utc;
use semver::Version;
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::dto::PackageItem;
use crate::core::error::{RepositoryError, RepositoryResult};
use crate::core::query::{self, ListQuery};
use crate::core::store::BlogInstance;
use crate::models::{InstalledPackage, PackageType, WidgetKind};
use crate::security::{Principal, Right};
use crate::theme::DEFAULT_THEME;

/// 主题目录中的可选描述文件
const THEME_MANIFEST: &str = "theme.yml";

#[derive(Debug, Default, Deserialize)]
struct ThemeManifest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: Option<String>,
}

/// 本地扩展包仓储：扩展、主题和小部件
pub struct PackageRepository<'a> {
    instance: &'a BlogInstance,
    principal: &'a Principal,
}

impl<'a> PackageRepository<'a> {
    pub fn new(instance: &'a BlogInstance, principal: &'a Principal) -> Self {
        Self { instance, principal }
    }

    pub fn find(&self, query: &ListQuery) -> RepositoryResult<Vec<PackageItem>> {
        self.instance.require(self.principal, Right::ManagePackages)?;
        Ok(query::apply(self.available(), query, "PackageType, Title")?)
    }

    /// 安装（或升级）扩展包
    pub fn install(&self, id: &str) -> RepositoryResult<PackageItem> {
        self.instance.require(self.principal, Right::ManagePackages)?;
        let package = self.package(id)?;

        {
            let mut installed = self.instance.packages.write();
            installed.retain(|p| !p.package_id.eq_ignore_ascii_case(&package.id));
            installed.push(InstalledPackage {
                package_id: package.id.clone(),
                package_type: package.package_type,
                version: package.version.clone(),
                installed_on: Utc::now(),
            });
        }
        if package.package_type == PackageType::Extension {
            self.set_extension_enabled(&package.title, true)?;
        }
        self.instance.persist_packages()?;
        info!("已安装 {}: {} {}", package.package_type, package.title, package.version);
        self.package(id)
    }

    pub fn uninstall(&self, id: &str) -> RepositoryResult<()> {
        self.instance.require(self.principal, Right::ManagePackages)?;
        let package = self.package(id)?;
        if !package.installed {
            return Err(RepositoryError::not_found(format!("已安装的扩展包 {}", id)));
        }

        match package.package_type {
            PackageType::Theme => {
                if self.instance.settings.read().theme.eq_ignore_ascii_case(&package.title) {
                    return Err(RepositoryError::conflict("不能卸载正在使用的主题"));
                }
            }
            PackageType::Extension => self.set_extension_enabled(&package.title, false)?,
            PackageType::Widget => {
                let kind: WidgetKind = package.title.parse().map_err(RepositoryError::Validation)?;
                let removed = {
                    let mut zones = self.instance.widget_zones.write();
                    let mut removed = 0;
                    for zone in zones.iter_mut() {
                        let before = zone.widgets.len();
                        zone.widgets.retain(|w| w.kind != kind);
                        removed += before - zone.widgets.len();
                    }
                    removed
                };
                if removed > 0 {
                    self.instance.persist_widget_zones()?;
                }
            }
        }

        self.instance
            .packages
            .write()
            .retain(|p| !p.package_id.eq_ignore_ascii_case(&package.id));
        self.instance.persist_packages()?;
        info!("已卸载 {}: {}", package.package_type, package.title);
        Ok(())
    }

    fn package(&self, id: &str) -> RepositoryResult<PackageItem> {
        self.available()
            .into_iter()
            .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
            .ok_or_else(|| RepositoryError::not_found(format!("扩展包 {}", id)))
    }

    fn set_extension_enabled(&self, name: &str, enabled: bool) -> RepositoryResult<()> {
        let changed = {
            let mut state = self.instance.extension_state.write();
            match state.iter_mut().find(|m| m.name.eq_ignore_ascii_case(name)) {
                Some(managed) if managed.enabled != enabled => {
                    managed.enabled = enabled;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.instance.persist_extensions()?;
        }
        Ok(())
    }

    /// 本地可用的全部扩展包，附带安装状态
    fn available(&self) -> Vec<PackageItem> {
        let mut items = Vec::new();
        let extensions = self.instance.extensions();
        for name in extensions.names() {
            if let Some(extension) = extensions.get(&name) {
                items.push(candidate(
                    PackageType::Extension,
                    &name,
                    extension.description(),
                    extension.version(),
                ));
            }
        }

        items.push(candidate(
            PackageType::Theme,
            DEFAULT_THEME,
            "内置默认主题",
            env!("CARGO_PKG_VERSION"),
        ));
        if let Some(dir) = self.instance.themes_dir() {
            items.extend(scan_themes(dir));
        }

        for kind in WidgetKind::ALL {
            items.push(candidate(
                PackageType::Widget,
                &kind.to_string(),
                kind.default_title(),
                env!("CARGO_PKG_VERSION"),
            ));
        }

        let installed = self.instance.packages.read();
        for item in items.iter_mut() {
            if let Some(record) = installed.iter().find(|p| p.package_id.eq_ignore_ascii_case(&item.id)) {
                item.installed = true;
                item.update_available = is_newer(&item.version, &record.version);
                item.installed_version = Some(record.version.clone());
            }
        }
        items
    }
}

fn candidate(package_type: PackageType, name: &str, description: &str, version: &str) -> PackageItem {
    PackageItem {
        id: package_id(package_type, name),
        package_type,
        title: name.to_string(),
        description: description.to_string(),
        version: version.to_string(),
        installed: false,
        installed_version: None,
        update_available: false,
    }
}

/// 扩展包 ID，形如 `theme:default`
pub fn package_id(package_type: PackageType, name: &str) -> String {
    format!("{}:{}", package_type.to_string().to_lowercase(), name)
}

fn scan_themes(dir: &Path) -> Vec<PackageItem> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("无法读取主题目录 {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut themes = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.eq_ignore_ascii_case(DEFAULT_THEME) {
            continue;
        }
        let manifest = read_manifest(&path.join(THEME_MANIFEST));
        let mut item = candidate(
            PackageType::Theme,
            &name,
            &manifest.description,
            manifest.version.as_deref().unwrap_or("1.0.0"),
        );
        if let Some(title) = manifest.title {
            item.description = format!("{} {}", title, item.description).trim().to_string();
        }
        themes.push(item);
    }
    themes
}

fn read_manifest(path: &Path) -> ThemeManifest {
    if !path.exists() {
        return ThemeManifest::default();
    }
    match fs::read_to_string(path).map(|s| serde_yaml::from_str::<ThemeManifest>(&s)) {
        Ok(Ok(manifest)) => manifest,
        Ok(Err(e)) => {
            warn!("主题描述文件 {:?} 格式错误: {}", path, e);
            ThemeManifest::default()
        }
        Err(e) => {
            warn!("无法读取主题描述文件 {:?}: {}", path, e);
            ThemeManifest::default()
        }
    }
}

/// 宽松解析版本号，`1.2` 视为 `1.2.0`
fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim().trim_start_matches('v');
    let parts = version.split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0", version),
        2 => format!("{}.0", version),
        _ => version.to_string(),
    };
    Version::parse(&padded).ok()
}

/// `available` 是否比 `installed` 新
fn is_newer(available: &str, installed: &str) -> bool {
    match (parse_version(available), parse_version(installed)) {
        (Some(a), Some(i)) => a > i,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_versions_are_padded() {
        assert_eq!(parse_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_version("v3"), Some(Version::new(3, 0, 0)));
        assert!(parse_version("abc").is_none());
    }

    #[test]
    fn compares_versions_semantically() {
        assert!(is_newer("1.10.0", "1.9"));
        assert!(!is_newer("1.0", "1.0.0"));
        assert!(!is_newer("garbage", "1.0"));
    }

    #[test]
    fn ids_are_prefixed_with_type() {
        assert_eq!(package_id(PackageType::Theme, "dark"), "theme:dark");
        assert_eq!(package_id(PackageType::Widget, "TagCloud"), "widget:TagCloud");
    }
}
