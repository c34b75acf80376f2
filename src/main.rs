use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use covgate::client::HttpService;
use covgate::context::ChangeRef;
use covgate::discovery::{CandidateProbe, ProjectKeyDiscovery};
use covgate::model::FilterOptions;
use covgate::render;
use covgate::report::{generate_report, CancelToken};

/// covgate — quality gate, coverage and issue reports for a change.
#[derive(Parser)]
#[command(name = "covgate", version, about)]
struct Cli {
    /// Base URL of the quality-analysis server.
    #[arg(long, global = true, default_value = "http://localhost:9000")]
    server: String,

    /// API token. Falls back to the COVGATE_TOKEN environment variable;
    /// anonymous access is attempted when neither is set.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a quality report for a branch or pull request.
    Report {
        /// Branch name to report on.
        #[arg(long, conflicts_with = "pr")]
        branch: Option<String>,

        /// Pull request id to report on.
        #[arg(long)]
        pr: Option<String>,

        /// Project key. When omitted, discovered from --workspace/--repo.
        #[arg(long)]
        project_key: Option<String>,

        /// Workspace (organization) used for project key discovery.
        #[arg(long, default_value = "")]
        workspace: String,

        /// Repository name used for project key discovery.
        #[arg(long, default_value = "")]
        repo: String,

        /// Skip the coverage section.
        #[arg(long)]
        no_coverage: bool,

        /// Skip the issues section.
        #[arg(long)]
        no_issues: bool,

        /// Only list files below this coverage percentage.
        #[arg(long)]
        coverage_threshold: Option<f64>,

        /// Page size for file fetches and maximum files shown.
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Use new-code metrics even for branch pipelines.
        #[arg(long)]
        new_code_only: bool,

        /// Comma-separated severity allow-list (BLOCKER..INFO).
        #[arg(long)]
        severity: Option<String>,

        /// Sort the file list worst-coverage-first.
        #[arg(long)]
        worst_first: bool,

        /// Show every uncovered line, ignoring the per-file budget.
        #[arg(long)]
        show_all_lines: bool,

        /// Uncovered lines shown per file (new lines always shown).
        #[arg(long, default_value_t = 10)]
        lines_per_file: usize,

        /// Only show uncovered lines introduced by the change.
        #[arg(long)]
        new_lines_only: bool,

        /// Skip files with fewer uncovered lines than this.
        #[arg(long)]
        min_uncovered: Option<u32>,

        /// Skip files with more uncovered lines than this.
        #[arg(long)]
        max_uncovered: Option<u32>,

        /// Glob matched against file paths or basenames.
        #[arg(long)]
        file_pattern: Option<String>,

        /// Skip per-file line detail entirely.
        #[arg(long)]
        no_line_details: bool,

        /// Truncate displayed code lines to this many characters.
        #[arg(long, default_value_t = 120)]
        truncate: usize,

        /// Verbose debug logging (includes dropped per-file fetches).
        #[arg(long)]
        debug: bool,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            branch,
            pr,
            project_key,
            workspace,
            repo,
            no_coverage,
            no_issues,
            coverage_threshold,
            limit,
            new_code_only,
            severity,
            worst_first,
            show_all_lines,
            lines_per_file,
            new_lines_only,
            min_uncovered,
            max_uncovered,
            file_pattern,
            no_line_details,
            truncate,
            debug,
            format,
        } => {
            init_logging(debug);

            let token = cli
                .token
                .or_else(|| std::env::var("COVGATE_TOKEN").ok())
                .filter(|t| !t.is_empty());
            let svc = HttpService::new(&cli.server, token);

            let change = match (branch, pr) {
                (_, Some(id)) => ChangeRef::PullRequest(id),
                (Some(name), None) => ChangeRef::Branch(name),
                (None, None) => anyhow::bail!("either --branch or --pr is required"),
            };

            let key = match project_key {
                Some(key) => key,
                None => {
                    if repo.is_empty() {
                        anyhow::bail!(
                            "either --project-key or --workspace/--repo is required"
                        );
                    }
                    CandidateProbe::new(&svc)
                        .discover(&workspace, &repo, None)
                        .context("project key discovery failed")?
                }
            };

            let opts = FilterOptions {
                include_coverage: !no_coverage,
                include_issues: !no_issues,
                coverage_threshold,
                limit,
                new_code_only,
                severity_filter: severity
                    .map(|s| s.split(',').map(|p| p.trim().to_uppercase()).collect())
                    .unwrap_or_default(),
                show_worst_first: worst_first,
                show_all_lines,
                lines_per_file,
                new_lines_only,
                min_uncovered_lines: min_uncovered,
                max_uncovered_lines: max_uncovered,
                file_pattern,
                no_line_details,
                truncate_lines: truncate,
                debug,
            };

            let cancel = CancelToken::new();
            let report = generate_report(&svc, &key, &change, &opts, &cancel)
                .context("report generation failed")?;

            match format {
                OutputFormat::Text => print!("{}", render::render_text(&report)),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Ok(())
        }
    }
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
