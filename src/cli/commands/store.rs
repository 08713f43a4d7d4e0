//! Store commands - put class bytes into the shared cache

use super::{classpath_arg, open, read_bytes};
use crate::cli::args::{StoreArgs, TokenStoreArgs};
use crate::config::Config;
use crate::error::{SharedClassError, SharedClassResult};
use crate::source::SourceUrl;
use console::style;
use tracing::debug;

/// Execute the store command
pub fn execute(args: StoreArgs, config: &Config) -> SharedClassResult<()> {
    let origin = SourceUrl::parse(&args.from)?;
    let bytes = match &args.input {
        Some(path) => read_bytes(path)?,
        None => {
            let path = origin
                .class_location(&args.class)
                .filter(|p| p.is_file())
                .ok_or_else(|| {
                    SharedClassError::InvalidArgument(format!(
                        "no class file for {} under {}; pass --input",
                        args.class, origin
                    ))
                })?;
            debug!("Reading {} from {}", args.class, path.display());
            read_bytes(&path)?
        }
    };

    let factory = open(config)?;
    let loader = factory.new_loader("cli");
    let filter = config.filter()?;

    match &args.classpath {
        Some(classpath) => {
            let classpath = classpath_arg(classpath)?;
            let helper = match filter {
                Some(f) => factory.get_url_classpath_helper_with_filter(&loader, &classpath, f)?,
                None => factory.get_url_classpath_helper(&loader, &classpath)?,
            };
            helper.store(&args.class, &bytes, &origin)?;
        }
        None => {
            let helper = match filter {
                Some(f) => factory.get_url_helper_with_filter(&loader, f)?,
                None => factory.get_url_helper(&loader)?,
            };
            helper.store(&origin, &args.class, &bytes)?;
        }
    }

    println!(
        "{} {} ({} bytes) from {}",
        style("stored").green(),
        args.class,
        bytes.len(),
        origin
    );
    Ok(())
}

/// Execute the token-store command
pub fn token(args: TokenStoreArgs, config: &Config) -> SharedClassResult<()> {
    let bytes = read_bytes(&args.input)?;

    let factory = open(config)?;
    let loader = factory.new_loader("cli");
    let helper = match config.filter()? {
        Some(f) => factory.get_token_helper_with_filter(&loader, f)?,
        None => factory.get_token_helper(&loader)?,
    };
    helper.store(&args.class, &args.token, &bytes)?;

    println!(
        "{} {} ({} bytes) under token {}",
        style("stored").green(),
        args.class,
        bytes.len(),
        args.token
    );
    Ok(())
}
