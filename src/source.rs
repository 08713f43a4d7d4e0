//! Source URLs that classes are loaded from
//!
//! Only local `file:` URLs can back cached classes: either an archive
//! (`.jar`/`.zip`, optionally in `jar:file:...!/` form) or a directory of
//! class files. Anything else parses but is not cacheable.

use crate::error::{SharedClassError, SharedClassResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// What a source URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A jar or zip archive holding many classes
    Archive,
    /// A directory laid out by package
    Directory,
    /// A URL that cannot be cached against
    Unsupported,
}

/// A normalized classpath entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceUrl {
    url: Url,
}

impl SourceUrl {
    /// Parse a URL string, accepting `jar:file:...!/` wrappers and plain paths
    pub fn parse(input: &str) -> SharedClassResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SharedClassError::InvalidArgument(
                "classpath URL must not be empty".to_string(),
            ));
        }

        // jar:file:/lib/a.jar!/com/Foo.class names the archive before `!/`
        let unwrapped = match trimmed.strip_prefix("jar:") {
            Some(inner) => inner.split("!/").next().unwrap_or(inner),
            None => trimmed,
        };

        let url = match Url::parse(unwrapped) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Self::url_from_path(Path::new(unwrapped))?
            }
            Err(e) => {
                return Err(SharedClassError::UnsupportedUrl {
                    url: trimmed.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(Self {
            url: Self::normalize(url),
        })
    }

    /// Build a URL for a local path
    pub fn from_path(path: &Path) -> SharedClassResult<Self> {
        Ok(Self {
            url: Self::url_from_path(path)?,
        })
    }

    fn url_from_path(path: &Path) -> SharedClassResult<Url> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| SharedClassError::io("getting current directory", e))?
                .join(path)
        };
        let result = if absolute.is_dir() {
            Url::from_directory_path(&absolute)
        } else {
            Url::from_file_path(&absolute)
        };
        result.map_err(|()| SharedClassError::UnsupportedUrl {
            url: path.display().to_string(),
            reason: "not an absolute local path".to_string(),
        })
    }

    /// Give existing local directories a trailing slash, the form
    /// `Url::from_directory_path` produces
    fn normalize(mut url: Url) -> Url {
        if url.scheme() != "file" || url.path().ends_with('/') {
            return url;
        }
        let is_dir = url.to_file_path().is_ok_and(|p| p.is_dir());
        if is_dir {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    /// The classification used for storage and freshness checks
    pub fn kind(&self) -> SourceKind {
        if self.url.scheme() != "file" {
            return SourceKind::Unsupported;
        }
        let path = self.url.path().to_ascii_lowercase();
        if path.ends_with(".jar") || path.ends_with(".zip") {
            SourceKind::Archive
        } else if path.ends_with('/') {
            SourceKind::Directory
        } else {
            match self.to_path() {
                Some(p) if p.is_dir() => SourceKind::Directory,
                _ => SourceKind::Unsupported,
            }
        }
    }

    /// Local filesystem path, for `file:` URLs
    pub fn to_path(&self) -> Option<PathBuf> {
        if self.url.scheme() != "file" {
            return None;
        }
        self.url.to_file_path().ok()
    }

    /// Location of a class inside this source
    ///
    /// For archives this is the archive itself; for directories it is the
    /// `.class` file derived from the binary class name.
    pub fn class_location(&self, class_name: &str) -> Option<PathBuf> {
        let base = self.to_path()?;
        match self.kind() {
            SourceKind::Archive => Some(base),
            SourceKind::Directory => {
                let relative = format!("{}.class", class_name.replace('.', "/"));
                Some(base.join(relative))
            }
            SourceKind::Unsupported => None,
        }
    }

    /// Fail unless classes may be stored against this URL
    pub fn ensure_cacheable(&self) -> SharedClassResult<()> {
        match self.kind() {
            SourceKind::Archive | SourceKind::Directory => Ok(()),
            SourceKind::Unsupported => Err(SharedClassError::UnsupportedUrl {
                url: self.to_string(),
                reason: "only file: jar/zip archives and directories are cacheable".to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl TryFrom<String> for SourceUrl {
    type Error = SharedClassError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SourceUrl> for String {
    fn from(value: SourceUrl) -> Self {
        value.url.into()
    }
}

/// Parse a platform path-separated classpath (`a.jar:b.jar` on Unix)
pub fn parse_classpath(classpath: &str) -> SharedClassResult<Vec<SourceUrl>> {
    std::env::split_paths(classpath)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| SourceUrl::parse(&p.to_string_lossy()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn parse_file_jar() {
        let url = SourceUrl::parse("file:///opt/lib/a.jar").unwrap();
        assert_eq!(url.kind(), SourceKind::Archive);
        assert_eq!(url.to_path(), Some(PathBuf::from("/opt/lib/a.jar")));
    }

    #[test]
    fn parse_jar_wrapper() {
        let url = SourceUrl::parse("jar:file:///opt/lib/b.zip!/").unwrap();
        assert_eq!(url.kind(), SourceKind::Archive);
        assert_eq!(url.as_str(), "file:///opt/lib/b.zip");
    }

    #[test]
    fn jar_entry_url_names_the_archive() {
        let url = SourceUrl::parse("jar:file:///opt/lib/a.jar!/com/example/Foo.class").unwrap();
        assert_eq!(url.as_str(), "file:///opt/lib/a.jar");
        assert_eq!(url.kind(), SourceKind::Archive);
    }

    #[test]
    fn directory_spellings_are_equal() {
        let dir = TempDir::new().unwrap();
        let from_path = SourceUrl::from_path(dir.path()).unwrap();
        let bare = from_path.as_str().trim_end_matches('/').to_string();

        let parsed = SourceUrl::parse(&bare).unwrap();
        assert_eq!(parsed, from_path);
        assert!(parsed.as_str().ends_with('/'));
        assert_eq!(SourceUrl::parse(&dir.path().to_string_lossy()).unwrap(), from_path);
    }

    #[test]
    fn remote_urls_are_unsupported() {
        let url = SourceUrl::parse("https://example.com/lib.jar").unwrap();
        assert_eq!(url.kind(), SourceKind::Unsupported);
        assert!(url.ensure_cacheable().is_err());
        assert!(url.class_location("a.B").is_none());
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(
            SourceUrl::parse("  "),
            Err(SharedClassError::InvalidArgument(_))
        ));
    }

    #[test]
    fn directory_class_location() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("com/example")).unwrap();
        let url = SourceUrl::from_path(dir.path()).unwrap();

        assert_eq!(url.kind(), SourceKind::Directory);
        assert_eq!(
            url.class_location("com.example.Foo"),
            Some(dir.path().join("com/example/Foo.class"))
        );
    }

    #[test]
    fn plain_path_parses_as_file_url() {
        let dir = TempDir::new().unwrap();
        let jar = dir.path().join("lib.jar");
        fs::write(&jar, b"PK").unwrap();

        let url = SourceUrl::parse(&jar.to_string_lossy()).unwrap();
        assert!(url.as_str().starts_with("file://"));
        assert_eq!(url.kind(), SourceKind::Archive);
    }

    #[cfg(unix)]
    #[test]
    fn classpath_string_splits() {
        let cp = parse_classpath("/a/one.jar:/b/two.jar").unwrap();
        assert_eq!(cp.len(), 2);
        assert!(cp[1].as_str().ends_with("two.jar"));
    }

    #[test]
    fn serde_as_string() {
        let url = SourceUrl::parse("file:///x/y.jar").unwrap();
        let json = serde_json::to_string(&url).unwrap();
        assert_eq!(json, "\"file:///x/y.jar\"");
        let back: SourceUrl = serde_json::from_str(&json).unwrap();
        assert_eq!(back, url);
    }
}
