//! Built-in font source providers.

pub mod config;
pub mod dir;
pub mod google;
pub mod http;

pub use config::ConfigProvider;
pub use dir::DirProvider;
pub use google::GoogleProvider;
pub use http::HttpProvider;
