// 仓储层：按博客实例和调用者权限访问各类实体
mod blogroll;
mod blogs;
mod categories;
mod comments;
mod custom_fields;
mod dashboard;
mod extensions;
mod packages;
mod pages;
mod posts;
mod roles;
mod settings;
mod tags;
mod trash;
mod users;
mod widgets;

pub use blogroll::BlogRollRepository;
pub use blogs::BlogRepository;
pub use categories::CategoryRepository;
pub use comments::CommentsRepository;
pub use custom_fields::CustomFieldRepository;
pub use dashboard::DashboardRepository;
pub use extensions::ExtensionRepository;
pub use packages::{package_id, PackageRepository};
pub use pages::PageRepository;
pub use posts::{normalize_tags, PostRepository};
pub use roles::RolesRepository;
pub use settings::SettingsRepository;
pub use tags::TagRepository;
pub use trash::TrashRepository;
pub use users::UsersRepository;
pub use widgets::WidgetsRepository;
