//! sharedclasses - Shared class cache helpers
//!
//! Class loaders share loaded class bytes through a persistent cache.
//! Each loader obtains helpers from a [`HelperFactory`]; the helpers
//! address cache entries by token, by source URL or by classpath position
//! and refuse to serve entries whose source has changed.

pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod filter;
pub mod freshness;
pub mod helper;
pub mod loader;
pub mod registry;
pub mod source;
pub mod store;

pub use error::{SharedClassError, SharedClassResult};
pub use factory::HelperFactory;
pub use helper::{ClasspathHelper, Helper, HelperKind, Lookup, TokenHelper, UrlHelper};
pub use loader::{ClassLoader, LoaderId};
pub use registry::HelperMode;
pub use source::SourceUrl;
