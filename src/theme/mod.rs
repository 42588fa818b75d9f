// 主题：模板渲染、前台控件、小部件区域和页面视图
pub mod controls;
mod renderer;
mod views;
mod widgets;

pub use controls::UrlBuilder;
pub use renderer::{ThemeCache, ThemeRenderer};
pub use views::{FrontEnd, Listing, THEMES_URL};
pub use widgets::{render_widget, render_zone};

/// 内置默认主题
pub const DEFAULT_THEME: &str = "default";
