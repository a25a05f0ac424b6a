use anyhow::{Context, Result, bail};
use clap::Parser;
use console::style;
use phaserun::context::{Project, RunConfig, RunMode};
use phaserun::orchestrator::Orchestrator;
use phaserun::phase::{Phase, load_phases_or_default};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phaserun")]
#[command(version, about = "Phased test-execution orchestrator")]
struct Cli {
    /// Balanced mode: moderate parallelism for quick feedback (4 workers)
    #[arg(long, conflicts_with_all = ["thorough", "serial"])]
    fast: bool,

    /// Thorough mode: full suite at low parallelism (2 workers)
    #[arg(long, conflicts_with = "serial")]
    thorough: bool,

    /// Serial mode: one task at a time (the default)
    #[arg(long)]
    serial: bool,

    /// Stop dispatching new work after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Pass test-runner output through instead of capturing it
    #[arg(short, long)]
    verbose: bool,

    /// Run only the admin project
    #[arg(long, conflicts_with = "only_front")]
    only_admin: bool,

    /// Run only the front project
    #[arg(long)]
    only_front: bool,

    /// Override the mode's parallelism ceiling
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Comma-separated project list (admin,front)
    #[arg(long, value_delimiter = ',')]
    projects: Option<Vec<String>>,

    /// Load the phase plan from a JSON file instead of the built-in plan
    #[arg(long)]
    phases_file: Option<PathBuf>,

    /// Repository root the test suites and package scripts live in
    #[arg(long)]
    project_dir: Option<PathBuf>,

    /// Directory the report artifacts are written to
    #[arg(long, default_value = "test-results")]
    report_dir: PathBuf,

    /// Print the phase plan and exit without running
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.fast {
            RunMode::Balanced
        } else if self.thorough {
            RunMode::Thorough
        } else {
            RunMode::Serial
        }
    }

    fn projects(&self) -> Result<Vec<Project>> {
        if self.only_admin {
            return Ok(vec![Project::Admin]);
        }
        if self.only_front {
            return Ok(vec![Project::Front]);
        }
        let Some(names) = &self.projects else {
            return Ok(Project::all());
        };
        let mut projects = Vec::new();
        for name in names {
            let Some(project) = Project::parse(name) else {
                bail!("Unknown project '{name}' (expected: admin, front)");
            };
            if !projects.contains(&project) {
                projects.push(project);
            }
        }
        if projects.is_empty() {
            bail!("No projects selected");
        }
        Ok(projects)
    }

    fn config(&self) -> Result<RunConfig> {
        let project_dir = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        let mut config = RunConfig::default()
            .with_mode(self.mode())
            .with_fail_fast(self.fail_fast);
        if let Some(max) = self.max_parallel {
            config = config.with_max_parallel(max);
        }
        config.projects = self.projects()?;
        config.verbose = self.verbose;
        config.project_dir = project_dir;
        config.report_dir = self.report_dir.clone();
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_plan(phases: &[Phase]) {
    println!("{}", style("Phase plan").bold());
    for phase in phases {
        let deps = if phase.depends_on.is_empty() {
            String::new()
        } else {
            format!(" (after {})", phase.depends_on.join(", "))
        };
        println!(
            "  {}. {} {} {:?}{}",
            phase.order,
            style(&phase.id).yellow(),
            phase.name,
            phase.success_criteria,
            deps
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let phases = load_phases_or_default(cli.phases_file.as_deref())?;
    if cli.list {
        print_plan(&phases);
        return Ok(());
    }

    let config = cli.config()?;
    // Task and phase failures are reported in the summary, not the exit
    // code; only an error propagated out of the run exits non-zero.
    Orchestrator::new(config, phases)?.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_flags_map_to_run_modes() {
        let cli = Cli::try_parse_from(["phaserun", "--fast"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Balanced);
        let cli = Cli::try_parse_from(["phaserun", "--thorough"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Thorough);
        let cli = Cli::try_parse_from(["phaserun"]).unwrap();
        assert_eq!(cli.mode(), RunMode::Serial);
    }

    #[test]
    fn mode_flags_conflict() {
        assert!(Cli::try_parse_from(["phaserun", "--fast", "--serial"]).is_err());
        assert!(Cli::try_parse_from(["phaserun", "--fast", "--thorough"]).is_err());
    }

    #[test]
    fn project_selection() {
        let cli = Cli::try_parse_from(["phaserun", "--only-admin"]).unwrap();
        assert_eq!(cli.projects().unwrap(), vec![Project::Admin]);

        let cli = Cli::try_parse_from(["phaserun", "--projects", "front,admin"]).unwrap();
        assert_eq!(
            cli.projects().unwrap(),
            vec![Project::Front, Project::Admin]
        );

        let cli = Cli::try_parse_from(["phaserun", "--projects", "mobile"]).unwrap();
        assert!(cli.projects().is_err());
    }

    #[test]
    fn max_parallel_overrides_mode_ceiling() {
        let cli = Cli::try_parse_from(["phaserun", "--fast", "--max-parallel", "8"]).unwrap();
        let config = cli.config().unwrap();
        assert_eq!(config.max_parallel, 8);

        let cli = Cli::try_parse_from(["phaserun", "--fast"]).unwrap();
        assert_eq!(cli.config().unwrap().max_parallel, 4);
    }
}
