//! prdflow - approval-gated feature workflow for your repository.
//!
//! Feature requests become versioned PRDs, approved PRDs become task lists,
//! and approved task lists are implemented one task at a time.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prdflow::core::Config;
use prdflow::init::{resolve_scaffold, InitError, InitMode, ProtectedPathSet, SafeInitializer};
use prdflow::workflow::{
    slugify, ArtifactKind, DocumentStore, FeatureRequest, Phase, SessionLock, TaskId, TaskStatus,
    TemplateRenderer, WorkflowMachine, WorkflowResult, WorkflowSession, SESSION_FILE,
};

/// Exit status for a staging area that could not be removed
const EXIT_STAGING_RESIDUE: u8 = 3;

/// Exit status for any other failure
const EXIT_FAILURE: u8 = 1;

/// Approval-gated feature workflow
#[derive(Parser)]
#[command(name = "prdflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Use this config file instead of the project/user config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a feature request and draft its PRD
    Request {
        /// Feature title
        title: String,

        /// Longer description of the feature
        #[arg(short, long)]
        description: Option<String>,

        /// Files relevant to the feature
        #[arg(short, long = "reference")]
        references: Vec<PathBuf>,
    },

    /// Approve the pending PRD and derive its task list
    ApprovePrd {
        /// Feature slug
        slug: String,

        /// PRD version being approved
        #[arg(id = "artifact_version", value_name = "VERSION")]
        version: u32,
    },

    /// Approve the pending task list
    ApproveTasks {
        /// Feature slug
        slug: String,

        /// Task list version being approved
        #[arg(id = "artifact_version", value_name = "VERSION")]
        version: u32,
    },

    /// Start implementing a task
    Start {
        /// Task id, e.g. 1.2
        id: TaskId,
    },

    /// Mark the task in progress as done
    Done {
        /// Task id, e.g. 1.2
        id: TaskId,
    },

    /// Show the current phase and task progress
    Status,

    /// Print a stored PRD or task list
    Show {
        /// Feature slug
        slug: String,

        /// Show the task list instead of the PRD
        #[arg(short, long)]
        tasks: bool,

        /// Version to show (defaults to latest)
        #[arg(id = "artifact_version", long = "version", value_name = "VERSION")]
        version: Option<u32>,
    },

    /// List every stored version for a feature
    History {
        /// Feature slug
        slug: String,
    },

    /// Drop the active feature and return to idle
    Abandon,

    /// Remove a stale session lock
    Unlock,

    /// Scaffold a project layout without touching protected files
    Init {
        /// Target directory (defaults to the project directory)
        path: Option<PathBuf>,

        /// Built-in template (node, rust, generic)
        #[arg(short, long, conflicts_with = "from")]
        template: Option<String>,

        /// Copy the skeleton from a template directory
        #[arg(long)]
        from: Option<PathBuf>,

        /// Show what would change without writing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

/// Process exit status for a failed command.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<InitError>() {
        Some(init_err) if init_err.is_unrecoverable() => EXIT_STAGING_RESIDUE,
        _ => EXIT_FAILURE,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            return Ok(());
        }
        Commands::Config { path: true } => {
            if let Some(path) = Config::config_dir() {
                println!("{}", path.join("config.toml").display());
            }
            return Ok(());
        }
        _ => {}
    }

    let project = Project::open(&cli.project, cli.config.as_deref())?;

    match cli.command {
        Commands::Request { title, description, references } => {
            cmd_request(&project, title, description, references)
        }
        Commands::ApprovePrd { slug, version } => cmd_approve_prd(&project, &slug, version),
        Commands::ApproveTasks { slug, version } => cmd_approve_tasks(&project, &slug, version),
        Commands::Start { id } => cmd_start(&project, id),
        Commands::Done { id } => cmd_done(&project, id),
        Commands::Status => cmd_status(&project),
        Commands::Show { slug, tasks, version } => cmd_show(&project, &slug, tasks, version),
        Commands::History { slug } => cmd_history(&project, &slug),
        Commands::Abandon => cmd_abandon(&project),
        Commands::Unlock => cmd_unlock(&project),
        Commands::Init { path, template, from, dry_run } => {
            cmd_init(&project, path, template.as_deref(), from.as_deref(), dry_run)
        }
        Commands::Config { .. } => cmd_config(&project),
        Commands::Completions { .. } => Ok(()),
    }
}

/// A project directory and its resolved configuration.
struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    fn open(root: &Path, config: Option<&Path>) -> Result<Self> {
        let config = Config::load(root, config)?;
        if ProtectedPathSet::install(config.protected_paths()).is_err() {
            tracing::debug!("protected path policy already installed");
        }
        Ok(Self { root: root.to_path_buf(), config })
    }

    fn store(&self) -> DocumentStore {
        DocumentStore::new(self.config.artifacts_path(&self.root))
    }

    fn state_dir(&self) -> PathBuf {
        self.config.state_path(&self.root)
    }

    fn session_path(&self) -> PathBuf {
        self.state_dir().join(SESSION_FILE)
    }

    fn renderer(&self) -> Result<TemplateRenderer> {
        let renderer = TemplateRenderer::new();
        Ok(match self.config.conventions_text(&self.root)? {
            Some(conventions) => renderer.with_conventions(conventions),
            None => renderer,
        })
    }

    fn artifact_path(&self, kind: ArtifactKind, slug: &str, version: u32) -> PathBuf {
        self.config
            .artifacts_path(&self.root)
            .join(DocumentStore::file_name(kind, slug, version))
    }

    /// Run one operation under the session lock, saving the session if it succeeds.
    fn with_session<T>(
        &self,
        op: impl FnOnce(&WorkflowMachine<'_>, &mut WorkflowSession) -> WorkflowResult<T>,
    ) -> Result<T> {
        let lock = SessionLock::acquire(&self.state_dir())?;
        let session_path = self.session_path();
        let mut session = WorkflowSession::load(&session_path)?;

        let store = self.store();
        let machine = WorkflowMachine::with_renderer(&store, self.renderer()?);
        let value = op(&machine, &mut session)?;

        session.save(&session_path)?;
        lock.release()?;
        Ok(value)
    }
}

/// Submit a feature request.
fn cmd_request(
    project: &Project,
    title: String,
    description: Option<String>,
    references: Vec<PathBuf>,
) -> Result<()> {
    if slugify(&title).is_empty() {
        anyhow::bail!("feature title '{title}' must contain at least one letter or digit");
    }

    let mut request = FeatureRequest::new(title);
    if let Some(description) = description {
        request = request.with_description(description);
    }
    let request = references.into_iter().fold(request, FeatureRequest::with_reference);

    let doc = project.with_session(|machine, session| machine.submit_feature_request(session, &request))?;

    println!("Drafted PRD {} v{}", doc.slug, doc.version);
    println!("  {}", project.artifact_path(ArtifactKind::Requirements, &doc.slug, doc.version).display());
    println!("\nReview it, then run: prdflow approve-prd {} {}", doc.slug, doc.version);
    Ok(())
}

/// Approve the pending PRD.
fn cmd_approve_prd(project: &Project, slug: &str, version: u32) -> Result<()> {
    let list =
        project.with_session(|machine, session| machine.approve_requirements(session, slug, version))?;

    println!("Approved PRD {slug} v{version}");
    println!("Drafted task list v{} with {} tasks", list.version, list.items.len());
    println!("  {}", project.artifact_path(ArtifactKind::TaskList, slug, list.version).display());
    println!("\nReview it, then run: prdflow approve-tasks {slug} {}", list.version);
    Ok(())
}

/// Approve the pending task list.
fn cmd_approve_tasks(project: &Project, slug: &str, version: u32) -> Result<()> {
    let next = project.with_session(|machine, session| {
        machine.approve_task_list(session, slug, version)?;
        Ok(session.task_list.as_ref().and_then(|list| list.next_task()).map(|task| task.id))
    })?;

    println!("Approved task list {slug} v{version}");
    if let Some(id) = next {
        println!("\nStart with: prdflow start {id}");
    }
    Ok(())
}

/// Start a task.
fn cmd_start(project: &Project, id: TaskId) -> Result<()> {
    let task = project.with_session(|machine, session| machine.start_task(session, id))?;
    println!("Started {} {}", task.id, task.description);
    println!("\nWhen finished, run: prdflow done {}", task.id);
    Ok(())
}

/// Finish the task in progress.
fn cmd_done(project: &Project, id: TaskId) -> Result<()> {
    let (phase, next) = project.with_session(|machine, session| {
        let phase = machine.complete_task(session, id)?;
        let next = session.task_list.as_ref().and_then(|list| list.next_task()).map(|task| task.id);
        Ok((phase, next))
    })?;

    println!("Completed {id}");
    match (phase, next) {
        (Phase::Idle, _) => println!("\nAll tasks complete. Ready for the next feature request."),
        (_, Some(next)) => println!("\nNext: prdflow start {next}"),
        _ => {}
    }
    Ok(())
}

/// Show the session state.
fn cmd_status(project: &Project) -> Result<()> {
    let session = WorkflowSession::load(&project.session_path())?;
    println!("Phase: {}", session.phase);

    if let Some(prd) = &session.requirements {
        println!("PRD:   {} v{}", prd.slug, prd.version);
    }

    if let Some(list) = &session.task_list {
        let (done, total) = list.progress();
        println!("Tasks: {} v{} ({}) - {done}/{total} done", list.slug, list.version, list.status);

        if project.store().is_stale(list)? {
            println!("  warning: the PRD has a newer version than v{}", list.prd_version);
        }

        for task in &list.items {
            let marker = match task.status {
                TaskStatus::Pending => ' ',
                TaskStatus::InProgress => '~',
                TaskStatus::Done => 'x',
            };
            println!("  [{marker}] {} {}", task.id, task.description);
        }
    }

    Ok(())
}

/// Print a stored artifact.
fn cmd_show(project: &Project, slug: &str, tasks: bool, version: Option<u32>) -> Result<()> {
    let store = project.store();

    if tasks {
        let list = match version {
            Some(v) => store.load_task_list_version(slug, v)?,
            None => store.load_task_list(slug)?,
        };
        print!("{}", list.to_markdown());
    } else {
        let doc = match version {
            Some(v) => store.load_requirements_version(slug, v)?,
            None => store.load_requirements(slug)?,
        };
        print!("{}", doc.body);
    }

    Ok(())
}

/// List stored versions.
fn cmd_history(project: &Project, slug: &str) -> Result<()> {
    let manifest = project.store().history(slug)?;
    println!("{} ({})", manifest.title, manifest.slug);

    for (label, records) in [("prd", &manifest.requirements), ("tasks", &manifest.tasks)] {
        for record in records {
            let derived = record.derived_from.map(|v| format!(" from prd v{v}")).unwrap_or_default();
            println!(
                "  {label:<5} v{:<3} {:<8} {}  {}{derived}",
                record.version, record.status, record.created_at, record.file
            );
        }
    }

    Ok(())
}

/// Abandon the active feature.
fn cmd_abandon(project: &Project) -> Result<()> {
    project.with_session(|machine, session| {
        machine.abandon(session);
        Ok(())
    })?;
    println!("Session reset to Idle. Stored documents were kept.");
    Ok(())
}

/// Remove a stale lock.
fn cmd_unlock(project: &Project) -> Result<()> {
    if SessionLock::force_remove(&project.state_dir())? {
        println!("Removed stale session lock");
    } else {
        println!("No session lock found");
    }
    Ok(())
}

/// Scaffold a project.
fn cmd_init(
    project: &Project,
    path: Option<PathBuf>,
    template: Option<&str>,
    from: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let target = path.unwrap_or_else(|| project.root.clone());
    let scaffold = resolve_scaffold(&target, template, from).map_err(anyhow::Error::msg)?;

    let mut options = project.config.init_options();
    options.dry_run = dry_run;
    options.staging_root = options.staging_root.map(|root| project.root.join(root));

    let report = match SafeInitializer::new(ProtectedPathSet::global())
        .with_options(options)
        .initialize(scaffold.as_ref(), &target)
    {
        Ok(report) => report,
        Err(err) => {
            if let InitError::StagingCleanupFailure { merge_error: Some(earlier), .. } = &err {
                eprintln!("error: {earlier}");
            }
            return Err(err).with_context(|| format!("Failed to initialize {}", target.display()));
        }
    };

    let prefix = if report.mode == InitMode::DryRun { "[DRY RUN] Would create" } else { "Created" };
    for path in &report.copied {
        println!("{prefix} {}", path.display());
    }
    let prefix = if report.mode == InitMode::DryRun { "[DRY RUN] Would update" } else { "Updated" };
    for path in &report.overwritten {
        println!("{prefix} {}", path.display());
    }
    for conflict in &report.conflicts {
        let note = if conflict.exists_in_target { "kept existing" } else { "protected" };
        println!("Skipped {} ({note})", conflict.path.display());
    }

    println!(
        "\n{} file(s) written, {} unchanged, {} skipped into {}",
        report.written(),
        report.unchanged.len(),
        report.conflicts.len(),
        report.target.display()
    );
    if report.mode == InitMode::DryRun {
        println!("[DRY RUN] No files were written.");
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(project: &Project) -> Result<()> {
    let toml = toml::to_string_pretty(&project.config)?;
    println!("{toml}");
    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "prdflow", &mut io::stdout());
}
