//! Versioned artifact persistence.
//!
//! Every save writes a new immutable body file; a per-slug manifest records
//! version, approval status, timestamp and checksum of each body.
//!
//! ```text
//! tasks/
//!   login-form-prd.v1.md
//!   login-form-prd.v2.md
//!   login-form-tasks.v1.md
//!   login-form.manifest.json
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::documents::{ApprovalStatus, ArtifactKind, RequirementsDocument, TaskList};
use super::error::{WorkflowError, WorkflowResult};
use crate::core::atomic::write_atomic;

const MANIFEST_SUFFIX: &str = ".manifest.json";

/// Location of a saved artifact version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub slug: String,
    pub version: u32,
    pub path: PathBuf,
}

/// One recorded version of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Version number
    pub version: u32,

    /// Approval status
    pub status: ApprovalStatus,

    /// Body file name, relative to the artifacts directory
    pub file: String,

    /// Hex sha256 of the body
    pub sha256: String,

    /// RFC 3339 creation time
    pub created_at: String,

    /// For task lists: the PRD version they were derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<u32>,
}

/// Ledger of every version saved for one slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub slug: String,
    pub title: String,
    pub requirements: Vec<VersionRecord>,
    pub tasks: Vec<VersionRecord>,
}

impl Manifest {
    fn records(&self, kind: ArtifactKind) -> &[VersionRecord] {
        match kind {
            ArtifactKind::Requirements => &self.requirements,
            ArtifactKind::TaskList => &self.tasks,
        }
    }

    fn records_mut(&mut self, kind: ArtifactKind) -> &mut Vec<VersionRecord> {
        match kind {
            ArtifactKind::Requirements => &mut self.requirements,
            ArtifactKind::TaskList => &mut self.tasks,
        }
    }

    /// Latest record of a kind.
    pub fn latest(&self, kind: ArtifactKind) -> Option<&VersionRecord> {
        self.records(kind).iter().max_by_key(|r| r.version)
    }

    /// Record of a specific version.
    pub fn find(&self, kind: ArtifactKind, version: u32) -> Option<&VersionRecord> {
        self.records(kind).iter().find(|r| r.version == version)
    }
}

/// Persists requirements documents and task lists under one directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Create a store rooted at the artifacts directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Artifacts directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name of one artifact version.
    pub fn file_name(kind: ArtifactKind, slug: &str, version: u32) -> String {
        format!("{slug}-{}.v{version}.md", kind.suffix())
    }

    fn manifest_path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}{MANIFEST_SUFFIX}"))
    }

    /// Save a PRD as a new version. Sets `doc.version` and resets it to pending.
    pub fn save_requirements(&self, doc: &mut RequirementsDocument) -> WorkflowResult<ArtifactRef> {
        let artifact = self.write_version(
            ArtifactKind::Requirements,
            &doc.slug,
            &doc.title,
            None,
            |_| doc.body.clone(),
        )?;
        doc.version = artifact.version;
        doc.status = ApprovalStatus::Pending;
        Ok(artifact)
    }

    /// Save a task list as a new version. Sets `list.version` and resets it to pending.
    pub fn save_task_list(&self, list: &mut TaskList) -> WorkflowResult<ArtifactRef> {
        let mut draft = list.clone();
        let artifact = self.write_version(
            ArtifactKind::TaskList,
            &list.slug,
            &list.title,
            Some(list.prd_version),
            |version| {
                draft.version = version;
                draft.to_markdown()
            },
        )?;
        list.version = artifact.version;
        list.status = ApprovalStatus::Pending;
        Ok(artifact)
    }

    fn write_version(
        &self,
        kind: ArtifactKind,
        slug: &str,
        title: &str,
        derived_from: Option<u32>,
        render: impl FnOnce(u32) -> String,
    ) -> WorkflowResult<ArtifactRef> {
        fs::create_dir_all(&self.root).map_err(WorkflowError::persistence(&self.root))?;

        let mut manifest = self.read_manifest(slug)?.unwrap_or_else(|| Manifest {
            slug: slug.to_string(),
            ..Manifest::default()
        });

        // Skip past body files the manifest does not know about
        let mut version = manifest.latest(kind).map_or(1, |r| r.version + 1);
        while self.root.join(Self::file_name(kind, slug, version)).exists() {
            version += 1;
        }

        let file = Self::file_name(kind, slug, version);
        let path = self.root.join(&file);
        let body = render(version);

        let mut handle = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(WorkflowError::persistence(&path))?;
        handle.write_all(body.as_bytes()).map_err(WorkflowError::persistence(&path))?;
        handle.sync_all().map_err(WorkflowError::persistence(&path))?;

        let record = VersionRecord {
            version,
            status: ApprovalStatus::Pending,
            file,
            sha256: checksum(body.as_bytes()),
            created_at: chrono::Utc::now().to_rfc3339(),
            derived_from,
        };
        manifest.title = title.to_string();
        manifest.records_mut(kind).push(record);
        self.write_manifest(&manifest)?;

        tracing::info!(%kind, slug, version, path = %path.display(), "saved artifact");
        Ok(ArtifactRef { kind, slug: slug.to_string(), version, path })
    }

    /// Latest saved version of a kind, if any.
    pub fn latest_version(&self, kind: ArtifactKind, slug: &str) -> WorkflowResult<Option<u32>> {
        Ok(self.read_manifest(slug)?.and_then(|m| m.latest(kind).map(|r| r.version)))
    }

    /// Load the latest PRD for a slug.
    pub fn load_requirements(&self, slug: &str) -> WorkflowResult<RequirementsDocument> {
        let (record, body) = self.read_body(ArtifactKind::Requirements, slug, None)?;
        Ok(RequirementsDocument::from_body(slug, record.version, record.status, body))
    }

    /// Load a specific PRD version.
    pub fn load_requirements_version(
        &self,
        slug: &str,
        version: u32,
    ) -> WorkflowResult<RequirementsDocument> {
        let (record, body) = self.read_body(ArtifactKind::Requirements, slug, Some(version))?;
        Ok(RequirementsDocument::from_body(slug, record.version, record.status, body))
    }

    /// Load the latest task list for a slug.
    pub fn load_task_list(&self, slug: &str) -> WorkflowResult<TaskList> {
        self.load_task_list_inner(slug, None)
    }

    /// Load a specific task list version.
    pub fn load_task_list_version(&self, slug: &str, version: u32) -> WorkflowResult<TaskList> {
        self.load_task_list_inner(slug, Some(version))
    }

    fn load_task_list_inner(&self, slug: &str, version: Option<u32>) -> WorkflowResult<TaskList> {
        let (record, body) = self.read_body(ArtifactKind::TaskList, slug, version)?;
        let mut list =
            TaskList::parse(&body).map_err(|e| WorkflowError::corrupt(self.root.join(&record.file), e))?;
        list.version = record.version;
        list.status = record.status;
        Ok(list)
    }

    fn read_body(
        &self,
        kind: ArtifactKind,
        slug: &str,
        version: Option<u32>,
    ) -> WorkflowResult<(VersionRecord, String)> {
        let not_found = || WorkflowError::NotFound { kind, slug: slug.to_string() };
        let manifest = self.read_manifest(slug)?.ok_or_else(not_found)?;
        let record = match version {
            Some(v) => manifest.find(kind, v),
            None => manifest.latest(kind),
        }
        .ok_or_else(not_found)?
        .clone();

        let path = self.root.join(&record.file);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(WorkflowError::corrupt(&path, "body file is missing"));
            }
            Err(err) => return Err(WorkflowError::corrupt(&path, err)),
        };

        if checksum(body.as_bytes()) != record.sha256 {
            return Err(WorkflowError::corrupt(&path, "checksum does not match manifest"));
        }

        Ok((record, body))
    }

    /// Mark a version approved. Approving an approved version is a no-op.
    pub fn mark_approved(&self, kind: ArtifactKind, slug: &str, version: u32) -> WorkflowResult<()> {
        let mut manifest = self
            .read_manifest(slug)?
            .ok_or_else(|| WorkflowError::NotFound { kind, slug: slug.to_string() })?;

        let record = manifest
            .records_mut(kind)
            .iter_mut()
            .find(|r| r.version == version)
            .ok_or_else(|| WorkflowError::NotFound { kind, slug: slug.to_string() })?;

        if record.status == ApprovalStatus::Approved {
            return Ok(());
        }
        record.status = ApprovalStatus::Approved;
        self.write_manifest(&manifest)?;

        tracing::info!(%kind, slug, version, "artifact approved");
        Ok(())
    }

    /// Every recorded version for a slug.
    pub fn history(&self, slug: &str) -> WorkflowResult<Manifest> {
        self.read_manifest(slug)?.ok_or_else(|| WorkflowError::NotFound {
            kind: ArtifactKind::Requirements,
            slug: slug.to_string(),
        })
    }

    /// Whether the PRD has moved past the version the list was derived from.
    pub fn is_stale(&self, list: &TaskList) -> WorkflowResult<bool> {
        let latest = self.latest_version(ArtifactKind::Requirements, &list.slug)?;
        Ok(latest != Some(list.prd_version))
    }

    /// All slugs with a manifest, sorted.
    pub fn slugs(&self) -> WorkflowResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(WorkflowError::persistence(&self.root)(err)),
        };

        let mut slugs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name().to_str().and_then(|n| n.strip_suffix(MANIFEST_SUFFIX)).map(str::to_string)
            })
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    fn read_manifest(&self, slug: &str) -> WorkflowResult<Option<Manifest>> {
        let path = self.manifest_path(slug);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(WorkflowError::persistence(&path)(err)),
        };
        serde_json::from_slice(&content).map(Some).map_err(|e| WorkflowError::corrupt(&path, e))
    }

    fn write_manifest(&self, manifest: &Manifest) -> WorkflowResult<()> {
        let path = self.manifest_path(&manifest.slug);
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|e| WorkflowError::persistence(&path)(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        write_atomic(&path, &content).map_err(WorkflowError::persistence(&path))
    }
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
