//! `auc`: the thin CLI adapter around `aurelia_compiler`'s workspace facade,
//! the reference adapter that calls into the library and formats its output
//! for the terminal (§6 "External interfaces").

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use aurelia_compiler::diagnostics::format::format_for_surface;
use aurelia_compiler::diagnostics::policy::DiagnosticPolicy;
use aurelia_compiler::diagnostics::{Severity, Surface};
use aurelia_compiler::pipeline::InMemoryCache;
use aurelia_compiler::project::{self, ClassFact};
use aurelia_compiler::provenance::Uri;
use aurelia_compiler::workspace::{Workspace, WorkspaceOptions};

#[derive(Parser)]
#[command(name = "auc", version, about = "Aurelia template compiler CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a single template and print its diagnostics.
    Compile {
        /// Path to the `.html` template to compile.
        template: PathBuf,
        /// Path to a JSON file holding the project's pre-extracted class
        /// facts (an array of `ClassFact`); omit to compile against an
        /// empty resource catalog.
        #[arg(long)]
        facts: Option<PathBuf>,
        /// Path to a JSON-encoded `DiagnosticPolicy` override.
        #[arg(long)]
        policy: Option<PathBuf>,
        #[arg(long, default_value = "unknown")]
        root_vm_type: String,
        #[arg(long, value_enum, default_value = "cli")]
        surface: SurfaceArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SurfaceArg {
    Cli,
    Lsp,
    Aot,
    Debug,
}

impl From<SurfaceArg> for Surface {
    fn from(value: SurfaceArg) -> Self {
        match value {
            SurfaceArg::Cli => Surface::Cli,
            SurfaceArg::Lsp => Surface::Lsp,
            SurfaceArg::Aot => Surface::Aot,
            SurfaceArg::Debug => Surface::Debug,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compile { template, facts, policy, root_vm_type, surface } => compile(template, facts, policy, root_vm_type, surface.into()),
    }
}

fn compile(template: PathBuf, facts: Option<PathBuf>, policy: Option<PathBuf>, root_vm_type: String, surface: Surface) -> Result<ExitCode> {
    let text = std::fs::read_to_string(&template).with_context(|| format!("reading template `{}`", template.display()))?;

    let semantics = match &facts {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading facts file `{}`", path.display()))?;
            let facts: Vec<ClassFact> = serde_json::from_str(&raw).with_context(|| format!("parsing facts file `{}` as a JSON array of class facts", path.display()))?;
            project::discover(&facts)
        }
        None => project::discover(&[]),
    };

    let diagnostic_policy = match &policy {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading policy file `{}`", path.display()))?;
            serde_json::from_str::<DiagnosticPolicy>(&raw).with_context(|| format!("parsing policy file `{}`", path.display()))?
        }
        None => DiagnosticPolicy::default(),
    };

    let mut options = WorkspaceOptions::default();
    options.root_vm_type = root_vm_type;
    options.requested_surfaces = vec![surface];
    options.diagnostic_policy = diagnostic_policy;

    let cache = Arc::new(InMemoryCache::new());
    let mut workspace = Workspace::with_cache(semantics, options, cache);

    let uri = Uri(template.display().to_string());
    workspace.open_document(uri.clone(), text);

    let (routed, debug_all) = workspace.diagnostics(&uri)?;
    let rendered = routed.for_surface(surface);
    for diagnostic in rendered {
        println!("{}", format_for_surface(diagnostic, surface));
    }

    let has_errors = debug_all.iter().any(|d| d.severity == Severity::Error);
    Ok(if has_errors { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
