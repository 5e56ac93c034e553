//! Protected path policy.
//!
//! Paths matching this policy are never written by a scaffold merge, whether
//! or not they exist in the target.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<ProtectedPathSet> = OnceCell::new();

/// A single protected path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `dir/` - the directory and everything below it
    Prefix(PathBuf),
    /// `path/to/file` - exactly this relative path
    Exact(PathBuf),
}

impl PathPattern {
    /// Parse a pattern. A trailing `/` marks a directory prefix.
    pub fn parse(pattern: &str) -> Option<Self> {
        let trimmed = pattern.trim();
        let is_prefix = trimmed.ends_with('/') || trimmed.ends_with('\\');
        let path = normalize(Path::new(trimmed));
        if path.as_os_str().is_empty() {
            return None;
        }
        Some(if is_prefix { Self::Prefix(path) } else { Self::Exact(path) })
    }

    fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix),
            Self::Exact(exact) => path == exact,
        }
    }
}

/// Immutable set of protected path patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPathSet {
    patterns: Vec<PathPattern>,
}

impl ProtectedPathSet {
    /// Patterns protected in every project.
    pub const DEFAULT_PATTERNS: &'static [&'static str] =
        &[".cursor/", ".git/", "tasks/", ".prdflow/", ".prdflow.toml", ".env"];

    /// Build a set from explicit patterns only.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|p| {
                let parsed = PathPattern::parse(p.as_ref());
                if parsed.is_none() {
                    tracing::warn!(pattern = p.as_ref(), "ignoring empty protected path pattern");
                }
                parsed
            })
            .collect();
        Self { patterns }
    }

    /// The default patterns plus `extra`.
    pub fn with_defaults<S: AsRef<str>>(extra: &[S]) -> Self {
        Self::new(
            Self::DEFAULT_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .chain(extra.iter().map(|p| p.as_ref().to_string())),
        )
    }

    /// Whether a target-relative path is protected.
    pub fn is_protected(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.patterns.iter().any(|p| p.matches(&path))
    }

    /// Patterns in this set.
    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    /// Install the process-wide policy. Fails if one is already installed.
    pub fn install(set: Self) -> Result<(), Self> {
        GLOBAL.set(set)
    }

    /// The process-wide policy; the defaults if nothing was installed.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::with_defaults::<&str>(&[]))
    }
}

impl Default for ProtectedPathSet {
    fn default() -> Self {
        Self::with_defaults::<&str>(&[])
    }
}

/// Keep only normal components, so `./tasks/x` and `tasks/x` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
