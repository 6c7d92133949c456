//! Shared time and URL helpers for gitlink crates.

pub mod time_utils;
pub mod url_utils;

pub use time_utils::*;
pub use url_utils::*;
