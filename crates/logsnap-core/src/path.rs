//! Project-relative path normalization.

use std::borrow::Cow;
use std::path::{Path, MAIN_SEPARATOR};

/// Strips a known root prefix from source paths so that snapshots taken on
/// different machines point at the same files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathNormalizer
{
    /// Root with a trailing separator, `None` when paths are kept verbatim.
    prefix: Option<String>,
}

impl PathNormalizer
{
    /// Strip `root` from every path below it.
    pub fn new(root: &Path) -> Self
    {
        let mut prefix = root.to_string_lossy().into_owned();
        if prefix.is_empty() {
            return Self::disabled();
        }
        if !prefix.ends_with(MAIN_SEPARATOR) && !prefix.ends_with('/') {
            prefix.push(MAIN_SEPARATOR);
        }
        Self { prefix: Some(prefix) }
    }

    /// Keep paths as reported.
    #[must_use]
    pub const fn disabled() -> Self
    {
        Self { prefix: None }
    }

    /// Use the process working directory as root, or keep paths verbatim when
    /// it cannot be determined.
    #[must_use]
    pub fn from_current_dir() -> Self
    {
        std::env::current_dir().map_or_else(|_| Self::disabled(), |cwd| Self::new(&cwd))
    }

    /// The root prefix, if any.
    #[must_use]
    pub fn root(&self) -> Option<&str>
    {
        self.prefix.as_deref()
    }

    /// Path relative to the root; paths outside the root are returned unchanged.
    #[must_use]
    pub fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str>
    {
        match &self.prefix {
            Some(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(relative) => Cow::Borrowed(relative),
                None => Cow::Borrowed(path),
            },
            None => Cow::Borrowed(path),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_strips_root()
    {
        let normalizer = PathNormalizer::new(Path::new("/app"));
        assert_eq!(normalizer.normalize("/app/src/a.php"), "src/a.php");
        assert_eq!(normalizer.root(), Some("/app/"));
    }

    #[test]
    fn test_trailing_separator_is_not_doubled()
    {
        let normalizer = PathNormalizer::new(Path::new("/app/"));
        assert_eq!(normalizer.normalize("/app/a.php"), "a.php");
    }

    #[test]
    fn test_outside_root_is_unchanged()
    {
        let normalizer = PathNormalizer::new(Path::new("/app"));
        assert_eq!(normalizer.normalize("/application/a.php"), "/application/a.php");
        assert_eq!(normalizer.normalize("logsnap://debug-eval"), "logsnap://debug-eval");
    }

    #[test]
    fn test_disabled_keeps_paths()
    {
        assert_eq!(PathNormalizer::disabled().normalize("/app/a.php"), "/app/a.php");
        assert_eq!(PathNormalizer::new(Path::new("")), PathNormalizer::disabled());
    }
}
