pub mod cli;
pub mod core;
pub mod extensions;
pub mod models;
pub mod provider;
pub mod repositories;
pub mod security;
pub mod theme;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{BlogInstance, Engine, RepositoryError, Site};
pub use crate::models::{Blog, Category, Comment, Page, Post};
pub use crate::security::{Principal, Right};
