use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::types::{default_true, KeyValue};

/// 扩展设置中的一个参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "parameter")]
pub struct ExtensionParameter {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    /// 表格型设置中作为主键的列
    #[serde(default)]
    pub key_field: bool,
    /// 标量设置只有一个值，表格型设置每行一个值
    #[serde(rename = "value", default)]
    pub values: Vec<String>,
}

impl ExtensionParameter {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required: false,
            key_field: false,
            values: Vec::new(),
        }
    }

    /// 标量参数的值
    pub fn scalar(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }
}

/// 一组扩展设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "settings")]
pub struct ExtensionSettings {
    pub name: String,
    #[serde(default)]
    pub help: String,
    /// 是否为标量设置（否则为表格）
    #[serde(default = "default_true")]
    pub is_scalar: bool,
    #[serde(rename = "parameter", default)]
    pub parameters: Vec<ExtensionParameter>,
}

impl ExtensionSettings {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            help: String::new(),
            is_scalar: true,
            parameters: Vec::new(),
        }
    }

    /// 获取参数
    pub fn parameter(&self, name: &str) -> Option<&ExtensionParameter> {
        self.parameters.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// 标量参数的值
    pub fn value(&self, name: &str) -> Option<&str> {
        self.parameter(name).map(ExtensionParameter::scalar)
    }

    /// 表格型设置的行数
    pub fn row_count(&self) -> usize {
        self.parameters.iter().map(|p| p.values.len()).max().unwrap_or(0)
    }
}

/// 某个博客中扩展的状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "extension")]
pub struct ManagedExtension {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 执行优先级，数值小的先执行
    #[serde(default)]
    pub priority: i32,
    #[serde(rename = "settings", default)]
    pub settings: Vec<ExtensionSettings>,
}

impl ManagedExtension {
    /// 按名称查找设置
    pub fn settings(&self, name: &str) -> Option<&ExtensionSettings> {
        self.settings.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// 小部件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WidgetKind {
    CategoryList,
    TagCloud,
    RecentPosts,
    RecentComments,
    MonthList,
    Calendar,
    PageList,
    BlogRoll,
    TextBox,
}

impl WidgetKind {
    /// 全部可用的小部件
    pub const ALL: [WidgetKind; 9] = [
        WidgetKind::CategoryList,
        WidgetKind::TagCloud,
        WidgetKind::RecentPosts,
        WidgetKind::RecentComments,
        WidgetKind::MonthList,
        WidgetKind::Calendar,
        WidgetKind::PageList,
        WidgetKind::BlogRoll,
        WidgetKind::TextBox,
    ];

    /// CSS 类名
    pub fn css_class(&self) -> &'static str {
        match self {
            WidgetKind::CategoryList => "category-list",
            WidgetKind::TagCloud => "tag-cloud",
            WidgetKind::RecentPosts => "recent-posts",
            WidgetKind::RecentComments => "recent-comments",
            WidgetKind::MonthList => "month-list",
            WidgetKind::Calendar => "calendar",
            WidgetKind::PageList => "page-list",
            WidgetKind::BlogRoll => "blogroll",
            WidgetKind::TextBox => "text-box",
        }
    }

    /// 默认标题
    pub fn default_title(&self) -> &'static str {
        match self {
            WidgetKind::CategoryList => "Categories",
            WidgetKind::TagCloud => "Tags",
            WidgetKind::RecentPosts => "Recent posts",
            WidgetKind::RecentComments => "Recent comments",
            WidgetKind::MonthList => "Archive",
            WidgetKind::Calendar => "Calendar",
            WidgetKind::PageList => "Pages",
            WidgetKind::BlogRoll => "Blogroll",
            WidgetKind::TextBox => "Text",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WidgetKind::CategoryList => "CategoryList",
            WidgetKind::TagCloud => "TagCloud",
            WidgetKind::RecentPosts => "RecentPosts",
            WidgetKind::RecentComments => "RecentComments",
            WidgetKind::MonthList => "MonthList",
            WidgetKind::Calendar => "Calendar",
            WidgetKind::PageList => "PageList",
            WidgetKind::BlogRoll => "BlogRoll",
            WidgetKind::TextBox => "TextBox",
        };
        f.write_str(s)
    }
}

impl FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("未知的小部件类型: {}", s))
    }
}

impl From<WidgetKind> for String {
    fn from(value: WidgetKind) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for WidgetKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 小部件区域中的一个小部件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "widget")]
pub struct WidgetEntry {
    pub id: Uuid,
    pub kind: WidgetKind,
    pub title: String,
    #[serde(default = "default_true")]
    pub show_title: bool,
    #[serde(rename = "setting", default)]
    pub settings: Vec<KeyValue>,
}

impl WidgetEntry {
    pub fn new(kind: WidgetKind, title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.to_string(),
            show_title: true,
            settings: Vec::new(),
        }
    }
}

/// 小部件区域
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "zone")]
pub struct WidgetZone {
    pub name: String,
    #[serde(rename = "widget", default)]
    pub widgets: Vec<WidgetEntry>,
}

impl WidgetZone {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            widgets: Vec::new(),
        }
    }
}

/// 扩展包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PackageType {
    Extension,
    Theme,
    Widget,
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageType::Extension => "Extension",
            PackageType::Theme => "Theme",
            PackageType::Widget => "Widget",
        };
        f.write_str(s)
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "extension" => Ok(PackageType::Extension),
            "theme" => Ok(PackageType::Theme),
            "widget" => Ok(PackageType::Widget),
            other => Err(format!("未知的扩展包类型: {}", other)),
        }
    }
}

impl From<PackageType> for String {
    fn from(value: PackageType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PackageType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// 已安装的扩展包记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "package")]
pub struct InstalledPackage {
    pub package_id: String,
    pub package_type: PackageType,
    #[serde(default)]
    pub version: String,
    pub installed_on: DateTime<Utc>,
}
