//! Approval-gated workflow state machine.
//!
//! ```text
//! Idle -> DraftingRequirements -> AwaitingRequirementsApproval
//!      -> DraftingTasks -> AwaitingTaskListApproval <-> Implementing(id)
//!      -> Idle (all tasks done)
//! ```
//!
//! Every operation takes the session explicitly. A rejected operation leaves
//! the session exactly as it was.

use tracing::{debug, info};

use super::documents::{
    ApprovalStatus, ArtifactKind, FeatureRequest, RequirementsDocument, TaskId, TaskItem,
    TaskList, TaskStatus,
};
use super::error::{PendingApproval, WorkflowError, WorkflowResult};
use super::render::{DocumentRenderer, TemplateRenderer};
use super::session::{ActiveDocument, Phase, WorkflowSession};
use super::store::DocumentStore;

/// Drives a [`WorkflowSession`] through the feature lifecycle.
pub struct WorkflowMachine<'a, R = TemplateRenderer> {
    store: &'a DocumentStore,
    renderer: R,
}

impl<'a> WorkflowMachine<'a, TemplateRenderer> {
    /// Create a machine with the default renderer.
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store, renderer: TemplateRenderer::new() }
    }
}

impl<'a, R: DocumentRenderer> WorkflowMachine<'a, R> {
    /// Create a machine with a custom renderer.
    pub fn with_renderer(store: &'a DocumentStore, renderer: R) -> Self {
        Self { store, renderer }
    }

    /// Document store backing this machine.
    pub fn store(&self) -> &DocumentStore {
        self.store
    }

    /// Turn a feature request into a new PRD version awaiting approval.
    pub fn submit_feature_request(
        &self,
        session: &mut WorkflowSession,
        request: &FeatureRequest,
    ) -> WorkflowResult<RequirementsDocument> {
        if session.phase != Phase::Idle {
            return Err(reject(session, format!("submit feature request '{}'", request.title)));
        }

        let slug = request.slug();
        if slug.is_empty() {
            return Err(reject(
                session,
                format!("submit feature request '{}' (title has no letters or digits)", request.title),
            ));
        }

        transition(session, Phase::DraftingRequirements);
        let body = self.renderer.render_requirements(request);
        let mut doc = RequirementsDocument::draft(slug, request.title.trim(), body);

        if let Err(err) = self.store.save_requirements(&mut doc) {
            session.phase = Phase::Idle;
            return Err(err);
        }

        session.requirements = Some(ActiveDocument { slug: doc.slug.clone(), version: doc.version });
        session.task_list = None;
        transition(session, Phase::AwaitingRequirementsApproval);
        Ok(doc)
    }

    /// Approve the pending PRD and derive its task list.
    pub fn approve_requirements(
        &self,
        session: &mut WorkflowSession,
        slug: &str,
        version: u32,
    ) -> WorkflowResult<TaskList> {
        let pending = match (&session.phase, &session.requirements) {
            (Phase::AwaitingRequirementsApproval, Some(active)) => {
                PendingApproval { slug: active.slug.clone(), version: active.version }
            }
            _ => {
                return Err(mismatch(session, ArtifactKind::Requirements, slug, version, None, None))
            }
        };
        self.check_pending(session, ArtifactKind::Requirements, slug, version, pending)?;

        self.store.mark_approved(ArtifactKind::Requirements, slug, version)?;
        let prd = self.store.load_requirements_version(slug, version)?;

        transition(session, Phase::DraftingTasks);
        let breakdown = self.renderer.derive_tasks(&prd);
        let Some(mut list) = TaskList::derive(&prd, breakdown) else {
            session.phase = Phase::AwaitingRequirementsApproval;
            return Err(reject(session, format!("derive tasks from unapproved {slug} v{version}")));
        };

        if let Err(err) = self.store.save_task_list(&mut list) {
            session.phase = Phase::AwaitingRequirementsApproval;
            return Err(err);
        }

        session.task_list = Some(list.clone());
        transition(session, Phase::AwaitingTaskListApproval);
        Ok(list)
    }

    /// Approve the pending task list. Implementation still waits for `start_task`.
    pub fn approve_task_list(
        &self,
        session: &mut WorkflowSession,
        slug: &str,
        version: u32,
    ) -> WorkflowResult<()> {
        let pending = match (&session.phase, &session.task_list) {
            (Phase::AwaitingTaskListApproval, Some(list)) if !list.is_approved() => {
                PendingApproval { slug: list.slug.clone(), version: list.version }
            }
            _ => return Err(mismatch(session, ArtifactKind::TaskList, slug, version, None, None)),
        };
        self.check_pending(session, ArtifactKind::TaskList, slug, version, pending)?;

        self.store.mark_approved(ArtifactKind::TaskList, slug, version)?;
        if let Some(list) = session.task_list.as_mut() {
            list.status = ApprovalStatus::Approved;
        }
        info!(slug, version, "task list approved; waiting for a task to start");
        Ok(())
    }

    /// Begin implementing a pending task from the approved list.
    pub fn start_task(&self, session: &mut WorkflowSession, id: TaskId) -> WorkflowResult<TaskItem> {
        match session.phase {
            Phase::AwaitingTaskListApproval => {}
            Phase::Implementing(current) => {
                debug!(%current, requested = %id, "rejected task start");
                return Err(WorkflowError::TaskAlreadyInProgress { current, requested: id });
            }
            _ => return Err(reject(session, format!("start task {id}"))),
        }

        let approved = session.task_list.as_ref().is_some_and(TaskList::is_approved);
        if !approved {
            return Err(reject(session, format!("start task {id} before the task list is approved")));
        }

        let status = match session.task_list.as_ref().and_then(|list| list.get(id)) {
            Some(task) => task.status,
            None => {
                debug!(%id, "rejected unknown task");
                return Err(WorkflowError::UnknownTask { id });
            }
        };
        if status != TaskStatus::Pending {
            return Err(reject(session, format!("start task {id} (status {status})")));
        }

        let task = session
            .task_list
            .as_mut()
            .and_then(|list| list.get_mut(id))
            .ok_or(WorkflowError::UnknownTask { id })?;
        task.status = TaskStatus::InProgress;
        let started = task.clone();

        transition(session, Phase::Implementing(id));
        Ok(started)
    }

    /// Finish the task in progress. Returns the phase the session moved to.
    pub fn complete_task(&self, session: &mut WorkflowSession, id: TaskId) -> WorkflowResult<Phase> {
        if session.phase != Phase::Implementing(id) {
            return Err(reject(session, format!("complete task {id}")));
        }

        let Some(list) = session.task_list.as_mut() else {
            return Err(reject(session, format!("complete task {id} without a task list")));
        };
        let Some(task) = list.get_mut(id) else {
            return Err(WorkflowError::UnknownTask { id });
        };
        task.status = TaskStatus::Done;

        if list.has_pending() {
            let (done, total) = list.progress();
            info!(%id, done, total, "task complete");
            transition(session, Phase::AwaitingTaskListApproval);
        } else {
            info!(%id, slug = %list.slug, "all tasks complete");
            session.requirements = None;
            session.task_list = None;
            transition(session, Phase::Idle);
        }

        Ok(session.phase)
    }

    /// The approval must name the pending version, and the store must not
    /// hold a newer one written outside this session.
    fn check_pending(
        &self,
        session: &WorkflowSession,
        kind: ArtifactKind,
        slug: &str,
        version: u32,
        pending: PendingApproval,
    ) -> WorkflowResult<()> {
        let latest = self
            .store
            .latest_version(kind, &pending.slug)?
            .filter(|&latest| latest != pending.version);

        if pending.slug != slug || pending.version != version || latest.is_some() {
            return Err(mismatch(session, kind, slug, version, Some(pending), latest));
        }
        Ok(())
    }

    /// Drop the active feature and return to `Idle`. Stored artifacts are kept.
    pub fn abandon(&self, session: &mut WorkflowSession) {
        if session.phase != Phase::Idle {
            info!(from = %session.phase, "session abandoned");
        }
        *session = WorkflowSession::new();
    }
}

fn transition(session: &mut WorkflowSession, to: Phase) {
    info!(from = %session.phase, %to, "workflow transition");
    session.phase = to;
}

fn reject(session: &WorkflowSession, action: String) -> WorkflowError {
    debug!(phase = %session.phase, %action, "rejected transition");
    WorkflowError::InvalidTransition { phase: session.phase, action }
}

fn mismatch(
    session: &WorkflowSession,
    kind: ArtifactKind,
    slug: &str,
    version: u32,
    pending: Option<PendingApproval>,
    latest: Option<u32>,
) -> WorkflowError {
    debug!(phase = %session.phase, %kind, slug, version, ?latest, "rejected approval");
    WorkflowError::ApprovalVersionMismatch {
        phase: session.phase,
        kind,
        slug: slug.to_string(),
        version,
        pending,
        latest,
    }
}
