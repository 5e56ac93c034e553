//! Document rendering policy.
//!
//! Turns a feature request into a PRD body and an approved PRD into a task
//! breakdown. The content is template text; the workflow only needs the
//! structure (functional requirements, relevant files) to derive tasks.

use super::documents::{
    FeatureRequest, RequirementsDocument, TaskBreakdown, TaskId, TaskItem, TaskSection,
};

/// Produces artifact bodies for the workflow.
pub trait DocumentRenderer {
    /// Render the markdown body of a PRD.
    fn render_requirements(&self, request: &FeatureRequest) -> String;

    /// Break an approved PRD down into tasks.
    fn derive_tasks(&self, requirements: &RequirementsDocument) -> TaskBreakdown;
}

/// Default markdown renderer.
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    /// Project conventions copied into every PRD
    conventions: Option<String>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a conventions text into the "Technical Considerations" section.
    pub fn with_conventions(mut self, conventions: impl Into<String>) -> Self {
        self.conventions = Some(conventions.into());
        self
    }
}

impl DocumentRenderer for TemplateRenderer {
    fn render_requirements(&self, request: &FeatureRequest) -> String {
        let title = request.title.trim();
        let description = request.description.trim();

        let mut requirements = split_requirements(description);
        if requirements.is_empty() {
            requirements.push(format!("The system provides {title}"));
        }

        let mut md = format!("# PRD: {title}\n\n");

        md.push_str("## Introduction\n\n");
        if description.is_empty() {
            md.push_str(&format!("This document describes the \"{title}\" feature.\n\n"));
        } else {
            md.push_str(description);
            md.push_str("\n\n");
        }

        md.push_str("## Goals\n\n");
        md.push_str(&format!("- Ship {title} as described in the functional requirements\n\n"));

        md.push_str("## User Stories\n\n");
        md.push_str(&format!("- As a user, I want {title} so that I can rely on it\n\n"));

        md.push_str("## Functional Requirements\n\n");
        for (i, req) in requirements.iter().enumerate() {
            md.push_str(&format!("{}. {req}\n", i + 1));
        }
        md.push('\n');

        md.push_str("## Non-Goals\n\n");
        md.push_str("- Anything not listed under Functional Requirements\n\n");

        if !request.references.is_empty() {
            md.push_str("## Relevant Files\n\n");
            for path in &request.references {
                md.push_str(&format!("- `{}`\n", path.display()));
            }
            md.push('\n');
        }

        if let Some(conventions) = &self.conventions {
            md.push_str("## Technical Considerations\n\n");
            md.push_str(conventions.trim());
            md.push_str("\n\n");
        }

        md.push_str("## Open Questions\n\n");
        md.push_str("- None recorded\n");

        md
    }

    fn derive_tasks(&self, requirements: &RequirementsDocument) -> TaskBreakdown {
        let mut functional = requirements.functional_requirements();
        if functional.is_empty() {
            functional.push(requirements.title.clone());
        }

        let mut breakdown = TaskBreakdown {
            relevant_files: requirements.relevant_files(),
            ..TaskBreakdown::default()
        };

        for (i, req) in functional.iter().enumerate() {
            let major = (i + 1) as u32;
            breakdown.sections.push(TaskSection { number: major, title: req.clone() });
            breakdown.items.push(TaskItem::new(TaskId::new(major, 1), format!("Implement: {req}")));
            breakdown
                .items
                .push(TaskItem::new(TaskId::new(major, 2), format!("Add tests covering: {req}")));
        }

        breakdown
    }
}

/// Split a description into one requirement per sentence or line.
fn split_requirements(description: &str) -> Vec<String> {
    description
        .split(['.', ';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::documents::{ApprovalStatus, TaskStatus};

    #[test]
    fn test_render_requirements_sections() {
        let request = FeatureRequest::new("Login Form")
            .with_description("Users sign in with email. Passwords are hashed.")
            .with_reference("src/auth.ts");

        let body = TemplateRenderer::new().render_requirements(&request);
        assert!(body.starts_with("# PRD: Login Form"));
        assert!(body.contains("1. Users sign in with email\n2. Passwords are hashed\n"));
        assert!(body.contains("- `src/auth.ts`"));
        assert!(!body.contains("Technical Considerations"));
    }

    #[test]
    fn test_render_without_description() {
        let body = TemplateRenderer::new().render_requirements(&FeatureRequest::new("Dark Mode"));
        assert!(body.contains("1. The system provides Dark Mode"));
    }

    #[test]
    fn test_conventions_are_included() {
        let renderer = TemplateRenderer::new().with_conventions("Prefer small modules.\n");
        let body = renderer.render_requirements(&FeatureRequest::new("Search"));
        assert!(body.contains("## Technical Considerations\n\nPrefer small modules.\n"));
    }

    #[test]
    fn test_derive_tasks_from_requirements() {
        let renderer = TemplateRenderer::new();
        let request = FeatureRequest::new("Login Form")
            .with_description("Users sign in with email; Sessions expire")
            .with_reference("src/auth.ts");
        let body = renderer.render_requirements(&request);
        let prd = RequirementsDocument::from_body("login-form", 1, ApprovalStatus::Approved, body);

        let breakdown = renderer.derive_tasks(&prd);
        assert_eq!(breakdown.sections.len(), 2);
        assert_eq!(breakdown.items.len(), 4);
        assert_eq!(breakdown.items[0].id, TaskId::new(1, 1));
        assert_eq!(breakdown.items[3].id, TaskId::new(2, 2));
        assert_eq!(breakdown.items[2].description, "Implement: Sessions expire");
        assert!(breakdown.items.iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(breakdown.relevant_files, vec!["src/auth.ts"]);
    }
}
