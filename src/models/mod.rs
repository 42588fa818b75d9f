pub mod config;
pub mod extension;
pub mod settings;
pub mod types;

pub use config::Config;
pub use extension::{
    ExtensionParameter, ExtensionSettings, InstalledPackage, ManagedExtension, PackageType,
    WidgetEntry, WidgetKind, WidgetZone,
};
pub use settings::BlogSettings;
pub use types::{
    AuthorProfile, Blog, BlogRollItem, BlogUser, Category, Comment, CustomField, CustomFieldType,
    KeyValue, ModerationType, Page, Post, Role, lookup,
};
