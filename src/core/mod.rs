pub mod api;
pub mod blogroll;
pub mod dto;
pub mod engine;
pub mod error;
pub mod feed;
pub mod fields;
pub mod query;
pub mod server;
pub mod store;

pub use engine::Engine;
pub use error::{RepositoryError, RepositoryResult};
pub use server::Server;
pub use store::{BlogInstance, Site, SiteOptions};
