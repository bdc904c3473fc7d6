//! Application services layer.

pub mod cache_admin;
pub mod error;
pub mod feedback;
pub mod likes;
pub mod listing;
pub mod post_cache;
pub mod posts;
pub mod reader;
pub mod repos;
pub mod resolver;
pub mod tasks;
