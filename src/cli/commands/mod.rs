//! CLI command implementations

pub mod config;
pub mod find;
pub mod store;

pub use config::execute as config;
pub use find::{execute as find, token as token_find};
pub use store::{execute as store, token as token_store};

use crate::config::Config;
use crate::error::{SharedClassError, SharedClassResult};
use crate::factory::HelperFactory;
use crate::source::{self, SourceUrl};
use std::fs;
use std::path::Path;

/// Open the configured store; every CLI invocation acts as one class loader
fn open(config: &Config) -> SharedClassResult<HelperFactory> {
    HelperFactory::from_config(config)
}

fn classpath_arg(classpath: &str) -> SharedClassResult<Vec<SourceUrl>> {
    let urls = source::parse_classpath(classpath)?;
    if urls.is_empty() {
        return Err(SharedClassError::InvalidArgument(
            "classpath must name at least one entry".to_string(),
        ));
    }
    Ok(urls)
}

fn read_bytes(path: &Path) -> SharedClassResult<Vec<u8>> {
    fs::read(path)
        .map_err(|e| SharedClassError::io(format!("reading class bytes from {}", path.display()), e))
}

fn write_bytes(path: &Path, bytes: &[u8]) -> SharedClassResult<()> {
    fs::write(path, bytes)
        .map_err(|e| SharedClassError::io(format!("writing class bytes to {}", path.display()), e))
}
