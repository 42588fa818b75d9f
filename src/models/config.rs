use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};

use super::types::default_true;

/// 站点级配置，保存在站点目录下的 _config.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 站点标题（新建主博客时使用）
    #[serde(default = "default_title")]
    pub title: String,
    /// 对外访问的 URL
    #[serde(default = "default_url")]
    pub url: String,
    /// 数据目录，相对于站点目录
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 主题目录，相对于站点目录
    #[serde(default = "default_themes_dir")]
    pub themes_dir: String,
    /// 服务器端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 登录会话有效期（分钟）
    #[serde(default = "default_session_ttl")]
    pub session_ttl_minutes: i64,
    /// 友情链接抓取配置
    #[serde(default)]
    pub blogroll: BlogRollConfig,
}

/// 友情链接抓取配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogRollConfig {
    /// 是否启用后台抓取
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 单次请求超时（秒）
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BlogRollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: default_title(),
            url: default_url(),
            data_dir: default_data_dir(),
            themes_dir: default_themes_dir(),
            port: default_port(),
            session_ttl_minutes: default_session_ttl(),
            blogroll: BlogRollConfig::default(),
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    /// 加载站点目录下的配置，文件不存在时使用默认值
    pub fn load(site_dir: &Path) -> Result<Self> {
        let path = site_dir.join("_config.yml");
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    /// 数据目录的绝对路径
    pub fn data_path(&self, site_dir: &Path) -> PathBuf {
        site_dir.join(&self.data_dir)
    }

    /// 主题目录的绝对路径
    pub fn themes_path(&self, site_dir: &Path) -> PathBuf {
        site_dir.join(&self.themes_dir)
    }
}

fn default_title() -> String {
    "My Blog".to_string()
}

fn default_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_themes_dir() -> String {
    "themes".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_session_ttl() -> i64 {
    120
}

fn default_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("rust-blogengine/", env!("CARGO_PKG_VERSION")).to_string()
}
