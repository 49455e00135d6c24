//! API 处理器

pub mod cache;
pub mod detection;
pub mod health;
pub mod history;
pub mod languages;
pub mod translation;

pub use cache::*;
pub use detection::*;
pub use health::*;
pub use history::*;
pub use languages::*;
pub use translation::*;
