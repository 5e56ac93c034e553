//! Workflow document structures.
//!
//! Defines the artifacts that move through the approval-gated workflow:
//! the feature request, the requirements document (PRD) and the task list.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches a task line such as `- [x] 2.1 Add tests`.
static TASK_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^- \[([ x~])\] (\d+)\.(\d+) (.+)$").expect("task line pattern is valid")
});

/// Matches `**Derived from:** login-form v3`.
static DERIVED_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*\*Derived from:\*\* (\S+) v(\d+)$").expect("derived-from pattern is valid")
});

/// The two artifact kinds persisted per feature slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Requirements,
    TaskList,
}

impl ArtifactKind {
    /// Filename suffix shared by every version of this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Requirements => "prd",
            Self::TaskList => "tasks",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requirements => write!(f, "requirements document"),
            Self::TaskList => write!(f, "task list"),
        }
    }
}

/// Approval status of a persisted artifact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
        }
    }
}

/// A request to build a feature, as submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRequest {
    /// Feature name; the slug derives from it
    pub title: String,

    /// Free-form description
    pub description: String,

    /// Existing source files the feature touches
    pub references: Vec<PathBuf>,
}

impl FeatureRequest {
    /// Create a request with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), description: String::new(), references: Vec::new() }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a reference to an existing source file.
    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.references.push(path.into());
        self
    }

    /// Slug derived from the title.
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

/// Requirements document (PRD) for one feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementsDocument {
    /// Feature slug
    pub slug: String,

    /// Feature title
    pub title: String,

    /// Markdown body
    pub body: String,

    /// Version; 0 until the document store assigns one
    pub version: u32,

    /// Approval status
    pub status: ApprovalStatus,
}

impl RequirementsDocument {
    /// Create an unsaved draft.
    pub fn draft(slug: impl Into<String>, title: impl Into<String>, body: String) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            body,
            version: 0,
            status: ApprovalStatus::Pending,
        }
    }

    /// Rebuild a document from a stored body. The title comes from the first H1.
    pub fn from_body(slug: &str, version: u32, status: ApprovalStatus, body: String) -> Self {
        let title = body
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix("# "))
            .map(|title| title.trim_start_matches("PRD:").trim().to_string())
            .unwrap_or_else(|| slug.to_string());

        Self { slug: slug.to_string(), title, body, version, status }
    }

    /// Whether this version has been approved.
    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    /// Items listed under the "Functional Requirements" section.
    pub fn functional_requirements(&self) -> Vec<String> {
        section_items(&self.body, "functional requirements")
    }

    /// Paths listed under the "Relevant Files" section.
    pub fn relevant_files(&self) -> Vec<String> {
        section_items(&self.body, "relevant files")
            .into_iter()
            .map(|item| item.trim_matches('`').to_string())
            .collect()
    }
}

/// Hierarchical task identifier (`major.minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    pub major: u32,
    pub minor: u32,
}

impl TaskId {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) =
            s.trim().split_once('.').ok_or_else(|| format!("invalid task id '{s}'"))?;
        let major = major.parse().map_err(|_| format!("invalid task id '{s}'"))?;
        let minor = minor.parse().map_err(|_| format!("invalid task id '{s}'"))?;
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for TaskId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    fn marker(self) -> char {
        match self {
            Self::Pending => ' ',
            Self::InProgress => '~',
            Self::Done => 'x',
        }
    }

    fn from_marker(marker: &str) -> Self {
        match marker {
            "x" => Self::Done,
            "~" => Self::InProgress,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A single unit of implementation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
}

impl TaskItem {
    pub fn new(id: TaskId, description: impl Into<String>) -> Self {
        Self { id, description: description.into(), status: TaskStatus::Pending }
    }
}

/// A parent heading grouping the tasks that share its major number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSection {
    pub number: u32,
    pub title: String,
}

/// Tasks produced by a renderer before they are bound to a PRD version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskBreakdown {
    pub relevant_files: Vec<String>,
    pub sections: Vec<TaskSection>,
    pub items: Vec<TaskItem>,
}

/// Task list derived from an approved requirements document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    /// Feature slug, shared with the originating PRD
    pub slug: String,

    /// Feature title
    pub title: String,

    /// PRD version this list was derived from
    pub prd_version: u32,

    /// Version; 0 until the document store assigns one
    pub version: u32,

    /// Approval status
    pub status: ApprovalStatus,

    /// Files expected to change
    pub relevant_files: Vec<String>,

    /// Parent headings
    pub sections: Vec<TaskSection>,

    /// Tasks in execution order
    pub items: Vec<TaskItem>,
}

impl TaskList {
    /// Bind a breakdown to the PRD it came from.
    ///
    /// Returns `None` unless the PRD is approved.
    pub fn derive(prd: &RequirementsDocument, breakdown: TaskBreakdown) -> Option<Self> {
        if !prd.is_approved() {
            return None;
        }

        Some(Self {
            slug: prd.slug.clone(),
            title: prd.title.clone(),
            prd_version: prd.version,
            version: 0,
            status: ApprovalStatus::Pending,
            relevant_files: breakdown.relevant_files,
            sections: breakdown.sections,
            items: breakdown.items,
        })
    }

    /// Whether this list has been approved.
    pub fn is_approved(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }

    /// Look up a task.
    pub fn get(&self, id: TaskId) -> Option<&TaskItem> {
        self.items.iter().find(|t| t.id == id)
    }

    /// Look up a task mutably.
    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskItem> {
        self.items.iter_mut().find(|t| t.id == id)
    }

    /// Whether any task is still pending.
    pub fn has_pending(&self) -> bool {
        self.items.iter().any(|t| t.status == TaskStatus::Pending)
    }

    /// Get pending tasks.
    pub fn pending_tasks(&self) -> Vec<&TaskItem> {
        self.items.iter().filter(|t| t.status == TaskStatus::Pending).collect()
    }

    /// The next task to work on.
    pub fn next_task(&self) -> Option<&TaskItem> {
        self.items
            .iter()
            .find(|t| t.status == TaskStatus::InProgress)
            .or_else(|| self.items.iter().find(|t| t.status == TaskStatus::Pending))
    }

    /// Count of `(done, total)` tasks.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.items.iter().filter(|t| t.status == TaskStatus::Done).count();
        (done, self.items.len())
    }

    /// Convert to markdown format.
    pub fn to_markdown(&self) -> String {
        let mut md = format!("# Tasks: {}\n\n", self.title);
        md.push_str(&format!("**Derived from:** {} v{}\n\n", self.slug, self.prd_version));

        if !self.relevant_files.is_empty() {
            md.push_str("## Relevant Files\n\n");
            for file in &self.relevant_files {
                md.push_str(&format!("- `{file}`\n"));
            }
            md.push('\n');
        }

        md.push_str("## Tasks\n\n");
        for section in &self.sections {
            let items: Vec<&TaskItem> =
                self.items.iter().filter(|t| t.id.major == section.number).collect();
            let marker = if !items.is_empty() && items.iter().all(|t| t.status == TaskStatus::Done)
            {
                'x'
            } else {
                ' '
            };
            md.push_str(&format!("- [{marker}] {}.0 {}\n", section.number, section.title));
            for item in items {
                md.push_str(&format!(
                    "  - [{}] {} {}\n",
                    item.status.marker(),
                    item.id,
                    item.description
                ));
            }
        }

        // Tasks whose major number has no heading still need to round-trip
        for item in self.items.iter().filter(|t| !self.sections.iter().any(|s| s.number == t.id.major))
        {
            md.push_str(&format!("- [{}] {} {}\n", item.status.marker(), item.id, item.description));
        }

        md
    }

    /// Parse from markdown content.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut list = Self {
            slug: String::new(),
            title: String::new(),
            prd_version: 0,
            version: 0,
            status: ApprovalStatus::Pending,
            relevant_files: Vec::new(),
            sections: Vec::new(),
            items: Vec::new(),
        };

        let mut current_section = "";

        for line in content.lines() {
            let line = line.trim();

            if line.starts_with("# ") && list.title.is_empty() {
                list.title = line.trim_start_matches("# ").trim_start_matches("Tasks:").trim().to_string();
                continue;
            }

            if let Some(caps) = DERIVED_FROM.captures(line) {
                list.slug = caps[1].to_string();
                list.prd_version = caps[2].parse()?;
                continue;
            }

            if line.starts_with("## ") {
                current_section = line.trim_start_matches("## ").trim();
                continue;
            }

            if line.is_empty() {
                continue;
            }

            match current_section.to_lowercase().as_str() {
                "relevant files" => {
                    if let Some(item) = parse_list_item(line) {
                        list.relevant_files.push(item.trim_matches('`').to_string());
                    }
                }
                "tasks" => {
                    let Some(caps) = TASK_LINE.captures(line) else {
                        continue;
                    };
                    let major: u32 = caps[2].parse()?;
                    let minor: u32 = caps[3].parse()?;
                    let text = caps[4].trim().to_string();
                    if minor == 0 {
                        list.sections.push(TaskSection { number: major, title: text });
                    } else {
                        list.items.push(TaskItem {
                            id: TaskId::new(major, minor),
                            description: text,
                            status: TaskStatus::from_marker(&caps[1]),
                        });
                    }
                }
                _ => {}
            }
        }

        if list.slug.is_empty() {
            anyhow::bail!("task list is missing its **Derived from:** line");
        }

        Ok(list)
    }
}

// Helper functions

/// Items of the `## <name>` section (case-insensitive).
fn section_items(content: &str, name: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut in_section = false;

    for line in content.lines() {
        let line = line.trim();
        if let Some(heading) = line.strip_prefix("## ") {
            in_section = heading.trim().eq_ignore_ascii_case(name);
            continue;
        }
        if in_section {
            if let Some(item) = parse_list_item(line) {
                items.push(item);
            }
        }
    }

    items
}

fn parse_list_item(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with("- ") {
        Some(line.trim_start_matches("- ").trim_start_matches("[ ] ").to_string())
    } else if line.starts_with("* ") {
        Some(line.trim_start_matches("* ").trim_start_matches("[ ] ").to_string())
    } else if line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains(". ") {
        line.split_once(". ").map(|(_, rest)| rest.to_string())
    } else {
        None
    }
}

/// Normalize a feature name into a filesystem-safe slug.
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
