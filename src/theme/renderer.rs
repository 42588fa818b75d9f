use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use super::DEFAULT_THEME;
use crate::utils::markdown;

/// 内置模板
const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    ("layout.html", include_str!("templates/layout.html")),
    ("index.html", include_str!("templates/index.html")),
    ("post.html", include_str!("templates/post.html")),
    ("page.html", include_str!("templates/page.html")),
];

/// 主题渲染器
pub struct ThemeRenderer {
    /// 主题名称
    name: String,
    /// 模板引擎
    tera: Tera,
}

impl ThemeRenderer {
    /// 加载主题：先载入内置模板，再用 `<themes_dir>/<theme>/layout/*.html` 覆盖
    pub fn load(themes_dir: Option<&Path>, theme: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(BUILTIN_TEMPLATES.to_vec())
            .context("加载内置模板失败")?;

        if let Some(layout_dir) = themes_dir.map(|d| d.join(theme).join("layout")) {
            if layout_dir.is_dir() {
                let overrides = read_templates(&layout_dir)?;
                debug!("主题 {} 覆盖 {} 个模板", theme, overrides.len());
                tera.add_raw_templates(overrides)
                    .with_context(|| format!("加载主题模板失败: {}", layout_dir.display()))?;
            } else if theme != DEFAULT_THEME {
                return Err(anyhow!("主题目录不存在: {}", layout_dir.display()));
            }
        }

        Self::register_filters(&mut tera);
        Ok(Self {
            name: theme.to_string(),
            tera,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 注册模板过滤器
    fn register_filters(tera: &mut Tera) {
        tera.register_filter("date_format", Self::date_format_filter);
        tera.register_filter("markdown", Self::markdown_filter);
    }

    /// 渲染模板
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            error!("模板渲染失败: {} ({:?})", template, e);
            anyhow!("模板渲染失败: {}: {}", template, e)
        })
    }

    /// 检查模板是否存在
    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    fn date_format_filter(value: &tera::Value, args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        if let Some(date) = value.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
            let format = args.get("format").and_then(|f| f.as_str()).unwrap_or("%Y-%m-%d");
            Ok(tera::Value::String(date.format(format).to_string()))
        } else {
            Ok(value.clone())
        }
    }

    fn markdown_filter(value: &tera::Value, _args: &HashMap<String, tera::Value>) -> tera::Result<tera::Value> {
        match value.as_str() {
            Some(text) => Ok(tera::Value::String(markdown::render(text))),
            None => Ok(value.clone()),
        }
    }
}

/// 读取目录下所有 html 模板，模板名为相对路径
fn read_templates(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut templates = Vec::new();
    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "html"))
    {
        let name = entry
            .path()
            .strip_prefix(dir)?
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(entry.path())
            .with_context(|| format!("读取模板失败: {}", entry.path().display()))?;
        templates.push((name, content));
    }
    Ok(templates)
}

/// 按主题名缓存渲染器
pub struct ThemeCache {
    themes_dir: Option<PathBuf>,
    renderers: RwLock<HashMap<String, Arc<ThemeRenderer>>>,
}

impl ThemeCache {
    pub fn new(themes_dir: Option<PathBuf>) -> Self {
        Self {
            themes_dir,
            renderers: RwLock::new(HashMap::new()),
        }
    }

    /// 获取主题渲染器，首次使用时加载
    pub fn get(&self, theme: &str) -> Result<Arc<ThemeRenderer>> {
        if let Some(renderer) = self.renderers.read().get(theme) {
            return Ok(renderer.clone());
        }
        let renderer = Arc::new(ThemeRenderer::load(self.themes_dir.as_deref(), theme)?);
        info!("已加载主题: {}", theme);
        self.renderers.write().insert(theme.to_string(), renderer.clone());
        Ok(renderer)
    }

    /// 丢弃缓存的渲染器，下次使用时重新加载模板
    pub fn clear(&self) {
        self.renderers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_templates_are_available() {
        let renderer = ThemeRenderer::load(None, DEFAULT_THEME).unwrap();
        assert!(renderer.has_template("layout.html"));
        assert!(renderer.has_template("post.html"));
    }

    #[test]
    fn theme_overrides_builtin_template() {
        let dir = TempDir::new().unwrap();
        let layout = dir.path().join("dark").join("layout");
        fs::create_dir_all(&layout).unwrap();
        fs::write(layout.join("page.html"), "<b>{{ page.title }}</b>").unwrap();

        let renderer = ThemeRenderer::load(Some(dir.path()), "dark").unwrap();
        let mut context = TeraContext::new();
        context.insert("page", &serde_json::json!({ "title": "About" }));
        assert_eq!(renderer.render("page.html", &context).unwrap(), "<b>About</b>");
    }

    #[test]
    fn missing_theme_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(ThemeRenderer::load(Some(dir.path()), "nope").is_err());
        assert!(ThemeRenderer::load(Some(dir.path()), DEFAULT_THEME).is_ok());
    }

    #[test]
    fn date_filter_formats_rfc3339() {
        let value = tera::Value::String("2024-02-14T10:30:00Z".into());
        let mut args = HashMap::new();
        args.insert("format".to_string(), tera::Value::String("%d.%m.%Y".into()));
        let formatted = ThemeRenderer::date_format_filter(&value, &args).unwrap();
        assert_eq!(formatted, tera::Value::String("14.02.2024".into()));
    }
}
