//! Network addressing.

pub mod url;

pub use url::{Url, UrlBuilder};
