//! Tutorium: tutorial delivery with a resilient read-through cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
