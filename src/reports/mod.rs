//! Report domain: model, persistence, projection, and the store API.

pub mod cache;
pub mod gateway;
pub mod hooks;
pub mod model;
pub mod pagination;
pub mod store;
pub mod summary;
pub mod tokens;
