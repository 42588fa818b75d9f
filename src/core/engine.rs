use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::blogroll::BlogRollFetcher;
use super::dto::NewUser;
use super::server::{AppState, Server};
use super::store::{Site, SiteOptions};
use crate::extensions::ExtensionManager;
use crate::models::Config;
use crate::provider::XmlBlogProvider;
use crate::repositories::UsersRepository;
use crate::security::{Principal, ADMINISTRATORS};

/// 站点引擎：加载配置，打开数据目录中的所有博客
pub struct Engine {
    /// 站点目录
    pub base_dir: PathBuf,
    /// 站点配置
    pub config: Config,
    site: Arc<Site>,
}

impl Engine {
    /// 打开站点目录
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        info!("工作目录: {}", base_dir.display());
        let config = Config::load(&base_dir)?;

        let data_dir = config.data_path(&base_dir);
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("创建数据目录失败: {}", data_dir.display()))?;

        let themes_dir = config.themes_path(&base_dir);
        let options = SiteOptions {
            title: config.title.clone(),
            themes_dir: themes_dir.is_dir().then_some(themes_dir),
        };

        let provider = Arc::new(XmlBlogProvider::new(data_dir));
        let extensions = Arc::new(ExtensionManager::with_builtins());
        let site = Site::open(provider, extensions, options)?;

        Ok(Self {
            base_dir,
            config,
            site: Arc::new(site),
        })
    }

    /// 初始化新站点：写入配置、创建主题目录和主博客的管理员
    pub fn init(base_dir: &Path, title: &str, admin: &str, password: &str, email: &str) -> Result<Self> {
        let config_path = base_dir.join("_config.yml");
        if config_path.exists() {
            bail!("站点已存在: {}", config_path.display());
        }
        fs::create_dir_all(base_dir)?;

        let config = Config {
            title: title.to_string(),
            ..Config::default()
        };
        config.save(&config_path)?;
        fs::create_dir_all(config.themes_path(base_dir))?;

        let engine = Self::new(base_dir.to_path_buf())?;
        let instance = engine.site.primary_instance()?;
        let system = Principal::System;
        UsersRepository::new(&instance, &system).add(&NewUser {
            user_name: admin.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            roles: vec![ADMINISTRATORS.to_string()],
        })?;

        info!("{}", format!("已初始化站点: {}", base_dir.display()).green());
        Ok(engine)
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    /// 服务器共享状态
    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.site.clone(),
            &self.config.url,
            self.config.session_ttl_minutes,
        ))
    }

    /// 启动服务器和友情链接抓取任务
    pub async fn server(&self, port: Option<u16>) -> Result<()> {
        // 预先加载全部博客，尽早暴露存储错误
        for blog in self.site.blogs().iter().filter(|b| b.is_active && !b.is_deleted) {
            self.site.instance(blog.id)?;
        }

        if self.config.blogroll.enabled {
            match BlogRollFetcher::new(self.site.clone(), &self.config.blogroll) {
                Ok(fetcher) => {
                    fetcher.spawn();
                }
                Err(e) => warn!("友情链接抓取未启动: {:#}", e),
            }
        }

        Server::new(self.state(), port.unwrap_or(self.config.port)).start().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_config_and_admin() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::init(dir.path(), "Notes", "admin", "secret1", "admin@example.com").unwrap();
        assert!(dir.path().join("_config.yml").exists());
        assert!(dir.path().join("themes").is_dir());

        let instance = engine.site().primary_instance().unwrap();
        assert_eq!(instance.settings.read().name, "Notes");
        assert_eq!(instance.roles_of("admin"), vec![ADMINISTRATORS.to_string()]);

        assert!(Engine::init(dir.path(), "Again", "admin", "secret1", "").is_err());
    }

    #[test]
    fn reopening_keeps_blogs() {
        let dir = TempDir::new().unwrap();
        let first = Engine::init(dir.path(), "Notes", "admin", "secret1", "admin@example.com").unwrap();
        let id = first.site().primary().unwrap().id;
        drop(first);

        let engine = Engine::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(engine.site().primary().unwrap().id, id);
        assert_eq!(engine.config.title, "Notes");
    }
}
