//! Project type detection.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Skeleton flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    /// Node.js / TypeScript project
    Node,
    /// Rust/Cargo project
    Rust,
    /// Generic project
    Generic,
}

impl ProjectType {
    /// Names accepted by `--template`.
    pub const NAMES: &'static [&'static str] = &["node", "rust", "generic"];

    /// Get display name for the project type.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Node => "Node.js/TypeScript",
            Self::Rust => "Rust/Cargo",
            Self::Generic => "Generic",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "node" | "nodejs" | "typescript" | "ts" => Ok(Self::Node),
            "rust" | "cargo" => Ok(Self::Rust),
            "generic" => Ok(Self::Generic),
            other => Err(format!(
                "unknown template '{other}' (expected one of: {})",
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Picks a skeleton matching what already exists in a directory.
pub struct ProjectDetector<'a> {
    path: &'a Path,
}

impl<'a> ProjectDetector<'a> {
    /// Create a new detector for the given path.
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// Detect the project type.
    pub fn detect(&self) -> ProjectType {
        if self.path.join("Cargo.toml").exists() {
            return ProjectType::Rust;
        }

        if self.path.join("package.json").exists() || self.path.join("tsconfig.json").exists() {
            return ProjectType::Node;
        }

        ProjectType::Generic
    }
}
