//! Skeleton sources.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::templates::skeleton_files;
use super::ProjectType;

/// Something that can write a project skeleton into a directory.
pub trait Scaffold {
    /// Human-readable name, for logs and reports.
    fn name(&self) -> String;

    /// Write the full skeleton under `dest`.
    fn generate(&self, dest: &Path) -> io::Result<()>;
}

/// Skeleton held in memory as a list of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateScaffold {
    name: String,
    files: Vec<(PathBuf, String)>,
}

impl TemplateScaffold {
    /// Create an empty scaffold.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), files: Vec::new() }
    }

    /// Built-in skeleton for a project type.
    pub fn builtin(project_type: ProjectType) -> Self {
        skeleton_files(project_type).into_iter().fold(
            Self::new(project_type.display_name()),
            |scaffold, (path, contents)| scaffold.with_file(path, contents),
        )
    }

    /// Add a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    /// Files in this scaffold.
    pub fn files(&self) -> &[(PathBuf, String)] {
        &self.files
    }
}

impl Scaffold for TemplateScaffold {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn generate(&self, dest: &Path) -> io::Result<()> {
        for (relative, contents) in &self.files {
            let path = dest.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents)?;
        }
        Ok(())
    }
}

/// Skeleton copied from an existing template directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScaffold {
    source: PathBuf,
}

impl DirectoryScaffold {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self { source: source.into() }
    }
}

impl Scaffold for DirectoryScaffold {
    fn name(&self) -> String {
        self.source.display().to_string()
    }

    fn generate(&self, dest: &Path) -> io::Result<()> {
        if !self.source.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("template directory {} does not exist", self.source.display()),
            ));
        }

        for entry in WalkDir::new(&self.source).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(&self.source)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let path = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&path)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &path)?;
            }
        }
        Ok(())
    }
}
