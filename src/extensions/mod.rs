// 扩展系统：注册扩展实现，按博客保存启用状态、优先级和设置
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::models::{Comment, ExtensionSettings, ManagedExtension, Page, Post};

mod builtin;
mod error;

pub use builtin::{
    BBCodeExtension, BreakPostExtension, CommentFilterExtension, ResolveLinksExtension, MORE_MARKER,
};
pub use error::*;

/// 内容展示的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingLocation {
    /// 文章正文页
    Post,
    /// 文章列表（首页、分类、标签）
    PostList,
    /// 独立页面
    Page,
    /// 评论
    Comment,
    /// 订阅源
    Feed,
}

/// 即将输出的内容，扩展可以就地修改
#[derive(Debug, Clone)]
pub struct Serving {
    pub location: ServingLocation,
    /// 内容（HTML）
    pub body: String,
    /// 内容所属实体的链接
    pub url: String,
}

impl Serving {
    pub fn new(location: ServingLocation, body: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            location,
            body: body.into(),
            url: url.into(),
        }
    }
}

/// 评论添加前的事件参数
#[derive(Debug, Clone)]
pub struct CommentAdding {
    pub comment: Comment,
    /// 置为 true 时拒绝该评论
    pub cancel: bool,
    /// 拒绝或标记的原因
    pub reason: Option<String>,
}

impl CommentAdding {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            cancel: false,
            reason: None,
        }
    }
}

/// 扩展事件
#[derive(Debug)]
pub enum ExtensionEvent<'a> {
    PostSaving(&'a mut Post),
    PostSaved(&'a Post),
    PageSaved(&'a Page),
    CommentAdding(&'a mut CommentAdding),
    CommentAdded(&'a Comment),
    UserCreated(&'a str),
}

impl ExtensionEvent<'_> {
    pub fn hook(&self) -> ExtensionHook {
        match self {
            ExtensionEvent::PostSaving(_) => ExtensionHook::PostSaving,
            ExtensionEvent::PostSaved(_) => ExtensionHook::PostSaved,
            ExtensionEvent::PageSaved(_) => ExtensionHook::PageSaved,
            ExtensionEvent::CommentAdding(_) => ExtensionHook::CommentAdding,
            ExtensionEvent::CommentAdded(_) => ExtensionHook::CommentAdded,
            ExtensionEvent::UserCreated(_) => ExtensionHook::UserCreated,
        }
    }
}

/// 扩展特征，所有扩展必须实现此特征
pub trait Extension: Send + Sync {
    /// 获取扩展名称
    fn name(&self) -> &str;

    /// 获取扩展版本
    fn version(&self) -> &str;

    /// 获取扩展描述
    fn description(&self) -> &str;

    /// 获取扩展作者
    fn author(&self) -> &str {
        "rust-blogengine"
    }

    /// 默认优先级
    fn default_priority(&self) -> i32 {
        0
    }

    /// 默认设置
    fn default_settings(&self) -> Vec<ExtensionSettings> {
        Vec::new()
    }

    /// 处理事件
    fn on_event(&self, _event: &mut ExtensionEvent<'_>, _settings: &[ExtensionSettings]) -> Result<()> {
        Ok(())
    }

    /// 处理即将输出的内容
    fn on_serving(&self, _serving: &mut Serving, _settings: &[ExtensionSettings]) -> Result<()> {
        Ok(())
    }
}

/// 扩展管理器，负责注册扩展并分发事件
pub struct ExtensionManager {
    /// 已注册的扩展
    extensions: RwLock<BTreeMap<String, Arc<dyn Extension>>>,
}

impl Default for ExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionManager {
    /// 创建空的扩展管理器
    pub fn new() -> Self {
        Self {
            extensions: RwLock::new(BTreeMap::new()),
        }
    }

    /// 创建并注册内置扩展
    pub fn with_builtins() -> Self {
        let manager = Self::new();
        manager.register(Arc::new(BBCodeExtension));
        manager.register(Arc::new(ResolveLinksExtension));
        manager.register(Arc::new(CommentFilterExtension));
        manager.register(Arc::new(BreakPostExtension));
        manager
    }

    /// 注册扩展
    pub fn register(&self, extension: Arc<dyn Extension>) {
        let name = extension.name().to_string();
        info!("注册扩展: {} v{}", name, extension.version());
        self.extensions.write().insert(name, extension);
    }

    /// 按名称获取扩展
    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        let extensions = self.extensions.read();
        extensions
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, ext)| ext.clone())
    }

    /// 所有已注册扩展的名称
    pub fn names(&self) -> Vec<String> {
        self.extensions.read().keys().cloned().collect()
    }

    /// 为已注册但尚未记录的扩展补充默认状态，返回是否有变化
    pub fn sync_state(&self, state: &mut Vec<ManagedExtension>) -> bool {
        let extensions = self.extensions.read();
        let mut changed = false;

        for (name, extension) in extensions.iter() {
            match state.iter_mut().find(|m| m.name.eq_ignore_ascii_case(name)) {
                Some(managed) => {
                    // 新版本可能增加了设置组
                    for defaults in extension.default_settings() {
                        if managed.settings(&defaults.name).is_none() {
                            managed.settings.push(defaults);
                            changed = true;
                        }
                    }
                    if managed.version != extension.version() {
                        managed.version = extension.version().to_string();
                        changed = true;
                    }
                }
                None => {
                    debug!("为扩展 {} 创建默认状态", name);
                    state.push(ManagedExtension {
                        name: name.clone(),
                        version: extension.version().to_string(),
                        description: extension.description().to_string(),
                        author: extension.author().to_string(),
                        enabled: true,
                        priority: extension.default_priority(),
                        settings: extension.default_settings(),
                    });
                    changed = true;
                }
            }
        }
        changed
    }

    /// 按优先级排列的已启用扩展
    fn enabled<'s>(
        &self,
        state: &'s [ManagedExtension],
    ) -> Vec<(Arc<dyn Extension>, &'s ManagedExtension)> {
        let mut enabled: Vec<_> = state
            .iter()
            .filter(|m| m.enabled)
            .filter_map(|m| self.get(&m.name).map(|ext| (ext, m)))
            .collect();
        enabled.sort_by_key(|(_, m)| m.priority);
        enabled
    }

    /// 分发事件，单个扩展失败只记录日志
    pub fn raise(&self, state: &[ManagedExtension], event: &mut ExtensionEvent<'_>) {
        let hook = event.hook();
        for (extension, managed) in self.enabled(state) {
            if let Err(e) = extension.on_event(event, &managed.settings) {
                let error = ExtensionError::EventError {
                    extension_name: managed.name.clone(),
                    event: format!("{:?}", hook),
                    message: e.to_string(),
                };
                warn!("{}", error);
            }
            // 已取消的评论不再交给后续扩展
            if let ExtensionEvent::CommentAdding(args) = event {
                if args.cancel {
                    break;
                }
            }
        }
    }

    /// 依次交给已启用的扩展处理输出内容
    pub fn serve(&self, state: &[ManagedExtension], serving: &mut Serving) {
        for (extension, managed) in self.enabled(state) {
            if let Err(e) = extension.on_serving(serving, &managed.settings) {
                warn!("扩展 {} 处理内容失败: {}", managed.name, e);
            }
        }
    }
}

/// 校验并合并一组新的设置值
pub fn validate_settings(
    extension: &str,
    current: &ExtensionSettings,
    updated: &ExtensionSettings,
) -> Result<ExtensionSettings, ExtensionError> {
    let mut merged = current.clone();

    for parameter in &updated.parameters {
        if current.parameter(&parameter.name).is_none() {
            return Err(ExtensionError::UnknownParameter {
                extension: extension.to_string(),
                parameter: parameter.name.clone(),
            });
        }
    }

    for target in merged.parameters.iter_mut() {
        if let Some(source) = updated.parameter(&target.name) {
            target.values = source.values.clone();
        }
        let empty = target.values.is_empty() || target.values.iter().any(|v| v.trim().is_empty());
        if target.required && empty && (current.is_scalar || !target.values.is_empty()) {
            return Err(ExtensionError::RequiredParameter {
                extension: extension.to_string(),
                parameter: target.name.clone(),
            });
        }
    }

    if !merged.is_scalar {
        let rows = merged.row_count();
        if merged.parameters.iter().any(|p| p.values.len() != rows) {
            return Err(ExtensionError::RaggedTable(merged.name.clone()));
        }
    } else {
        for parameter in merged.parameters.iter_mut() {
            parameter.values.truncate(1);
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtensionParameter;

    struct Recorder;

    impl Extension for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn version(&self) -> &str {
            "1.0"
        }

        fn description(&self) -> &str {
            "rejects every comment"
        }

        fn on_event(&self, event: &mut ExtensionEvent<'_>, _settings: &[ExtensionSettings]) -> Result<()> {
            if let ExtensionEvent::CommentAdding(args) = event {
                args.cancel = true;
                args.reason = Some("recorder".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn sync_adds_missing_extensions_once() {
        let manager = ExtensionManager::with_builtins();
        let mut state = Vec::new();
        assert!(manager.sync_state(&mut state));
        assert_eq!(state.len(), manager.names().len());
        assert!(!manager.sync_state(&mut state));
    }

    #[test]
    fn disabled_extensions_do_not_receive_events() {
        let manager = ExtensionManager::new();
        manager.register(Arc::new(Recorder));
        let mut state = Vec::new();
        manager.sync_state(&mut state);

        let post = Post::new("t", "a");
        let mut args = CommentAdding::new(Comment::new(post.id, "x", "y"));
        manager.raise(&state, &mut ExtensionEvent::CommentAdding(&mut args));
        assert!(args.cancel);

        state[0].enabled = false;
        let mut args = CommentAdding::new(Comment::new(post.id, "x", "y"));
        manager.raise(&state, &mut ExtensionEvent::CommentAdding(&mut args));
        assert!(!args.cancel);
    }

    #[test]
    fn required_scalar_parameter_must_be_filled() {
        let mut current = ExtensionSettings::new("main");
        let mut p = ExtensionParameter::new("apikey", "API key");
        p.required = true;
        p.values = vec!["old".to_string()];
        current.parameters.push(p);

        let mut updated = ExtensionSettings::new("main");
        let mut blank = ExtensionParameter::new("apikey", "");
        blank.values = vec![String::new()];
        updated.parameters.push(blank);
        assert!(matches!(
            validate_settings("x", &current, &updated),
            Err(ExtensionError::RequiredParameter { .. })
        ));

        updated.parameters[0].values = vec!["new".to_string()];
        let merged = validate_settings("x", &current, &updated).unwrap();
        assert_eq!(merged.value("apikey"), Some("new"));
    }
}
