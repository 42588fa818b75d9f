use thiserror::Error;

/// 扩展错误类型
#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("扩展不存在: {0}")]
    NotFound(String),

    #[error("扩展设置不存在: {extension} - {settings}")]
    SettingsNotFound {
        extension: String,
        settings: String,
    },

    #[error("必填参数为空: {extension} - {parameter}")]
    RequiredParameter {
        extension: String,
        parameter: String,
    },

    #[error("参数不存在: {extension} - {parameter}")]
    UnknownParameter {
        extension: String,
        parameter: String,
    },

    #[error("表格设置的列长度不一致: {0}")]
    RaggedTable(String),

    #[error("执行事件失败: 扩展 {extension_name} 在处理 {event} 时出错: {message}")]
    EventError {
        extension_name: String,
        event: String,
        message: String,
    },
}

/// 扩展事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionHook {
    /// 文章保存前
    PostSaving,
    /// 文章保存后
    PostSaved,
    /// 页面保存后
    PageSaved,
    /// 评论添加前（可取消）
    CommentAdding,
    /// 评论添加后
    CommentAdded,
    /// 新建用户
    UserCreated,
}
