//! Find commands - look class bytes up in the shared cache

use super::{classpath_arg, open, write_bytes};
use crate::cli::args::{FindArgs, TokenFindArgs};
use crate::config::Config;
use crate::error::{SharedClassError, SharedClassResult};
use crate::helper::Lookup;
use crate::source::SourceUrl;
use console::style;
use std::path::Path;

/// Execute the find command
pub fn execute(args: FindArgs, config: &Config) -> SharedClassResult<()> {
    let factory = open(config)?;
    let loader = factory.new_loader("cli");
    let filter = config.filter()?;

    if let Some(classpath) = &args.classpath {
        let classpath = classpath_arg(classpath)?;
        let helper = match filter {
            Some(f) => factory.get_url_classpath_helper_with_filter(&loader, &classpath, f)?,
            None => factory.get_url_classpath_helper(&loader, &classpath)?,
        };
        return match helper.find_with_index(&args.class)? {
            Some(hit) => {
                let detail = format!("from {} (index {})", classpath[hit.index], hit.index);
                report_hit(&args.class, &hit.bytes, &detail, args.out.as_deref())
            }
            None => {
                report_miss(&args.class, "miss");
                Ok(())
            }
        };
    }

    let url = args
        .url
        .as_deref()
        .ok_or_else(|| SharedClassError::InvalidArgument("--url or --classpath is required".into()))?;
    let url = SourceUrl::parse(url)?;
    let helper = match filter {
        Some(f) => factory.get_url_helper_with_filter(&loader, f)?,
        None => factory.get_url_helper(&loader)?,
    };
    match helper.find(&url, &args.class)? {
        Lookup::Hit(bytes) => {
            report_hit(&args.class, &bytes, &format!("from {}", url), args.out.as_deref())
        }
        Lookup::Stale => {
            report_miss(&args.class, "stale");
            Ok(())
        }
        Lookup::Miss => {
            report_miss(&args.class, "miss");
            Ok(())
        }
    }
}

/// Execute the token-find command
pub fn token(args: TokenFindArgs, config: &Config) -> SharedClassResult<()> {
    let factory = open(config)?;
    let loader = factory.new_loader("cli");
    let helper = match config.filter()? {
        Some(f) => factory.get_token_helper_with_filter(&loader, f)?,
        None => factory.get_token_helper(&loader)?,
    };

    match helper.find(&args.class, &args.token)? {
        Some(bytes) => report_hit(
            &args.class,
            &bytes,
            &format!("under token {}", args.token),
            args.out.as_deref(),
        ),
        None => {
            report_miss(&args.class, "miss");
            Ok(())
        }
    }
}

fn report_hit(class: &str, bytes: &[u8], detail: &str, out: Option<&Path>) -> SharedClassResult<()> {
    if let Some(path) = out {
        write_bytes(path, bytes)?;
    }
    println!(
        "{} {} ({} bytes) {}",
        style("hit").green(),
        class,
        bytes.len(),
        detail
    );
    Ok(())
}

fn report_miss(class: &str, outcome: &str) {
    println!("{} {}", style(outcome).yellow(), class);
}
