use std::env;
use std::process::ExitCode;
use std::time::Duration;

use anstream::eprintln;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use futures::stream::{FuturesOrdered, StreamExt};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{info, info_span, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod checks;
mod discovery;
mod models;
mod parser;
mod policy;
mod regex_safety;
mod remote;
mod report;
mod violation;

use checks::WorkflowCtx;
use models::Workflow;
use remote::RemoteVerifier;
use report::Report;
use violation::Violation;

/// Scans GitHub Actions workflows and composite actions against a corpus of
/// declarative policies.
#[derive(Parser, Debug)]
#[command(about, version)]
struct App {
    /// The repository being validated.
    #[arg(long, env = "PS_WORKSPACE_ROOT")]
    workspace: Option<Utf8PathBuf>,

    /// Where the policy files live, if different from the workspace.
    #[arg(long, env = "PS_PLATFORM_ROOT")]
    platform_root: Option<Utf8PathBuf>,

    /// Overrides the root policy file (`configs/ci/policies/validate-ci.yml`).
    #[arg(long, env = "PS_VALIDATE_CI_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Overrides the JSON report output path.
    #[arg(long, env = "PS_VALIDATE_CI_REPORT")]
    report: Option<Utf8PathBuf>,

    /// Disables remote SHA verification against the upstream ref registry.
    #[arg(long)]
    no_verify_remote: bool,

    /// Suppresses the per-file "scanning" log lines.
    #[arg(long)]
    quiet: bool,

    /// Restricts the scan to files changed in the PR base..head range.
    #[arg(long)]
    pr_only: bool,

    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Disables the indicatif progress bar over file discovery.
    #[arg(long)]
    no_progress: bool,

    /// The human summary format. The JSON report file is always written
    /// regardless of this setting.
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

#[derive(Debug, Default, Copy, Clone, ValueEnum)]
enum OutputFormat {
    #[default]
    Plain,
    Json,
}

fn env_truthy(name: &str) -> bool {
    matches!(
        env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("True") | Some("TRUE")
    )
}

fn init_tracing(verbose: &clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn resolve_workspace(app: &App) -> Result<Utf8PathBuf> {
    if let Some(workspace) = &app.workspace {
        return Ok(workspace.clone());
    }
    let cwd = env::current_dir().context("could not determine current directory")?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|p| anyhow::anyhow!("current directory {p:?} is not valid UTF-8"))
}

/// A discovered file, tagged with whether it's a workflow (checked against
/// the per-workflow rule families) or a composite action (the lighter
/// composite-action scan).
enum Discovered {
    Workflow(Utf8PathBuf),
    Composite(Utf8PathBuf),
}

fn relative_to(root: &Utf8Path, path: &Utf8Path) -> String {
    path.strip_prefix(root).unwrap_or(path).to_string()
}

async fn scan_file(
    kind: &Discovered,
    workspace_root: &Utf8Path,
    policies: &policy::PolicySet,
    verifier: Option<&RemoteVerifier>,
    verify_remote_enabled: bool,
    quiet: bool,
) -> Result<Vec<Violation>> {
    let (path, relative_path, is_workflow) = match kind {
        Discovered::Workflow(p) => (p, relative_to(workspace_root, p), true),
        Discovered::Composite(p) => (p, relative_to(workspace_root, p), false),
    };

    let span = info_span!("scan", path = %relative_path);
    let _guard = span.enter();
    if !quiet {
        info!("scanning {relative_path}");
    }

    let text = std::fs::read_to_string(path.as_std_path())
        .with_context(|| format!("failed to read {relative_path}"))?;

    if is_workflow {
        let parsed = parser::parse_workflow(&text);
        for warning in &parsed.warnings {
            warn!("{relative_path}: {warning:?}");
        }

        let key = Workflow::key_of(path);
        let ctx = WorkflowCtx {
            relative_path: &relative_path,
            key: &key,
            workspace_root,
        };
        Ok(checks::check_workflow(&ctx, &parsed.workflow, policies, verifier, verify_remote_enabled).await)
    } else {
        let ctx = WorkflowCtx {
            relative_path: &relative_path,
            key: "",
            workspace_root,
        };
        Ok(checks::check_composite_action(&ctx, &text, policies, verifier, verify_remote_enabled).await)
    }
}

async fn run_scan(
    app: &App,
    workspace: &Utf8Path,
    platform_root: &Utf8Path,
    policies: &policy::PolicySet,
) -> Result<Vec<Violation>> {
    let ci_strict = env::var("CI").ok().as_deref() == Some("1");
    let verify_remote_disabled_by_env = matches!(
        env::var("PS_VALIDATE_CI_VERIFY_REMOTE").ok().as_deref(),
        Some("0") | Some("false") | Some("False") | Some("FALSE")
    );
    let verify_remote_enabled = !(app.no_verify_remote || verify_remote_disabled_by_env);

    let quiet = app.quiet || env_truthy("PS_VALIDATE_CI_QUIET");
    let pr_only = app.pr_only || env_truthy("PS_VALIDATE_CI_PR_ONLY");

    let mut workflows = discovery::discover_workflows(workspace);
    let mut composite_actions = discovery::discover_composite_actions(platform_root);

    if workflows.is_empty() {
        if ci_strict {
            anyhow::bail!("no workflow files found under .github/workflows/");
        }
        info!("no workflow files found under .github/workflows/; continuing");
    }

    if pr_only {
        let base = env::var("PS_PR_BASE_SHA").ok();
        let head = env::var("PS_PR_HEAD_SHA").ok();
        match (base, head) {
            (Some(base), Some(head)) => match discovery::pr_diff_paths(workspace, &base, &head) {
                Some(changed) => {
                    workflows = discovery::filter_by_diff(workspace, workflows, &changed);
                    composite_actions = discovery::filter_by_diff(platform_root, composite_actions, &changed);
                }
                None => {
                    warn!("PR-only mode: could not resolve {base}..{head}; falling back to a full scan");
                }
            },
            _ => {
                warn!("PR-only mode: PS_PR_BASE_SHA/PS_PR_HEAD_SHA not both set; falling back to a full scan");
            }
        }
    }

    let token = if ci_strict {
        env::var("GH_TOKEN").ok().or_else(|| env::var("GITHUB_TOKEN").ok())
    } else {
        None
    };

    let api_base = env::var("PS_VALIDATE_CI_GITHUB_API_BASE").unwrap_or_else(|_| "https://api.github.com".to_string());
    let cache_dir = workspace.join(".cache").join("validate-ci").join("http");
    let verifier = RemoteVerifier::new(api_base, token, ci_strict, &cache_dir);

    let files: Vec<Discovered> = workflows
        .into_iter()
        .map(Discovered::Workflow)
        .chain(composite_actions.into_iter().map(Discovered::Composite))
        .collect();

    let bar = ProgressBar::new(files.len() as u64);
    if quiet || app.no_progress {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(ProgressStyle::with_template("[{elapsed_precise}] {msg} {bar:!30.cyan/blue}").unwrap());
    }

    // Per-file parsing runs concurrently; `FuturesOrdered` still drains the
    // results in discovery order, so violations are reported the same way a
    // purely sequential scan would report them.
    let mut completion_stream = FuturesOrdered::new();
    for file in &files {
        completion_stream.push_back(scan_file(file, workspace, policies, Some(&verifier), verify_remote_enabled, quiet));
    }

    let mut violations = Vec::new();
    while let Some(result) = completion_stream.next().await {
        violations.extend(result?);
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(violations)
}

fn report_path(app: &App, workspace: &Utf8Path) -> Utf8PathBuf {
    app.report
        .clone()
        .unwrap_or_else(|| workspace.join("reports").join("validate-ci").join("validate-ci.json"))
}

fn run() -> Result<ExitCode> {
    let app = App::parse();
    init_tracing(&app.verbose);

    let workspace = resolve_workspace(&app)?;
    let platform_root = app.platform_root.clone().unwrap_or_else(|| workspace.clone());

    let policies = match policy::load_all(&platform_root, app.config.as_deref()) {
        Ok(policies) => policies,
        Err(err) => {
            eprintln!("{}", format!("ERROR: {err}").red());
            return Ok(ExitCode::FAILURE);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let violations = match runtime.block_on(run_scan(&app, &workspace, &platform_root, &policies)) {
        Ok(violations) => violations,
        Err(err) => {
            eprintln!("{}", format!("ERROR: {err:?}").red());
            return Ok(ExitCode::FAILURE);
        }
    };

    let threshold = policies.root.enforcement.score_fail_threshold;
    let report = Report::compute(violations, threshold);
    report.write_to(&report_path(&app, &workspace));

    match app.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), &report).context("failed to write JSON summary")?;
        }
        OutputFormat::Plain => {
            if report.failed() {
                report.print_failure_summary();
            } else {
                report.print_success_summary();
            }
        }
    }

    Ok(if report.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!("{}", format!("ERROR: {err:?}").red());
            ExitCode::FAILURE
        }
    }
}
