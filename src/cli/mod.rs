use crate::application::{Application, LifecycleState};
use crate::refill::{next_request, RequestAmount};
use crate::registry::{load_application, ApplicationFile, Registry};
use crate::stats::Statistics;
use crate::units::format_from_bytes;
use crate::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "datacap-planner")]
#[command(version, about = "A governance planner for datacap allocation programs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Named registry profile from config
    #[arg(long, global = true)]
    pub profile: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StateFilterArg {
    Submitted,
    ReadyToSign,
    StartSignDatacap,
    Granted,
    TotalDatacapReached,
    Error,
    All,
}

impl StateFilterArg {
    fn to_filter(self) -> Option<LifecycleState> {
        match self {
            Self::Submitted => Some(LifecycleState::Submitted),
            Self::ReadyToSign => Some(LifecycleState::ReadyToSign),
            Self::StartSignDatacap => Some(LifecycleState::StartSignDatacap),
            Self::Granted => Some(LifecycleState::Granted),
            Self::TotalDatacapReached => Some(LifecycleState::TotalDatacapReached),
            Self::Error => Some(LifecycleState::Error),
            Self::All => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the suggested next datacap request for one application
    Refill {
        /// Path to the application JSON record
        application: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(long)]
        json: bool,
    },

    /// Show one application in detail
    Show {
        /// Path to the application JSON record
        application: PathBuf,

        /// Output as JSON (machine-readable)
        #[arg(long)]
        json: bool,
    },

    /// Scan a registry checkout and list applications with suggested refills
    Scan {
        /// Registry directory to scan
        path: Option<PathBuf>,

        /// Maximum walk depth
        #[arg(short, long)]
        depth: Option<usize>,

        /// Filter by lifecycle state
        #[arg(long, value_enum, default_value = "all")]
        state: StateFilterArg,

        /// Only show applications with a nonzero suggested refill
        #[arg(long)]
        refills_due: bool,

        /// Respect .gitignore files (skips gitignored directories)
        #[arg(long)]
        gitignore: bool,

        /// Output scan results as JSON (machine-readable)
        #[arg(long)]
        json: bool,
    },

    /// Show statistics about a registry checkout
    Stats {
        /// Registry directory to scan
        path: Option<PathBuf>,

        /// Maximum walk depth
        #[arg(short, long)]
        depth: Option<usize>,

        /// Number of top applicants to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Days without an update before an application counts as stale
        #[arg(long)]
        stale_days: Option<i64>,

        /// Respect .gitignore files (skips gitignored directories)
        #[arg(long)]
        gitignore: bool,

        /// Export as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch interactive TUI dashboard
    Tui {
        /// Registry directory to scan
        path: Option<PathBuf>,

        /// Maximum walk depth
        #[arg(short, long)]
        depth: Option<usize>,

        /// Respect .gitignore files (skips gitignored directories)
        #[arg(long)]
        gitignore: bool,
    },

    /// Generate default config file
    InitConfig {
        /// Output path for config file
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config = if let Some(config_path) = &self.config {
            Config::load(config_path)?
        } else {
            Config::load_or_default(Config::default_path())?
        };
        let profile = self.profile.clone();

        match self.command {
            Commands::Refill { application, json } => {
                run_refill(application, json)?;
            }
            Commands::Show { application, json } => {
                run_show(application, json)?;
            }
            Commands::Scan {
                path,
                depth,
                state,
                refills_due,
                gitignore,
                json,
            } => {
                run_scan(
                    path,
                    profile.as_deref(),
                    depth,
                    state,
                    refills_due,
                    gitignore,
                    json,
                    &config,
                )?;
            }
            Commands::Stats {
                path,
                depth,
                top,
                stale_days,
                gitignore,
                json,
            } => {
                run_stats(
                    path,
                    profile.as_deref(),
                    depth,
                    top,
                    stale_days,
                    gitignore,
                    json,
                    &config,
                )?;
            }
            Commands::Tui {
                path,
                depth,
                gitignore,
            } => {
                run_tui(path, profile.as_deref(), depth, gitignore, &config)?;
            }
            Commands::InitConfig { path } => {
                init_config(path)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ResolvedRegistryInput {
    roots: Vec<PathBuf>,
    depth: Option<usize>,
    stale_days: Option<i64>,
    gitignore: Option<bool>,
}

impl ResolvedRegistryInput {
    fn from_path(path: PathBuf) -> Self {
        Self {
            roots: vec![path],
            depth: None,
            stale_days: None,
            gitignore: None,
        }
    }

    fn from_profile(profile: &crate::config::RegistryProfile) -> Self {
        Self {
            roots: profile.paths.clone(),
            depth: profile.depth,
            stale_days: profile.stale_days,
            gitignore: profile.gitignore,
        }
    }
}

fn resolve_registry_input(
    path: Option<PathBuf>,
    profile: Option<&str>,
    config: &Config,
) -> Result<ResolvedRegistryInput> {
    match (path, profile) {
        (Some(_), Some(_)) => anyhow::bail!("Use either [PATH] or --profile, not both"),
        (None, Some(name)) => {
            let p = config
                .registry_profiles
                .get(name)
                .with_context(|| format!("Profile `{}` not found", name))?;
            if p.paths.is_empty() {
                anyhow::bail!("Profile `{}` has no paths", name);
            }
            Ok(ResolvedRegistryInput::from_profile(p))
        }
        (Some(path), None) => Ok(ResolvedRegistryInput::from_path(path)),
        (None, None) => Ok(ResolvedRegistryInput::from_path(PathBuf::from("."))),
    }
}

fn scan_applications_for_roots(
    roots: &[PathBuf],
    depth: Option<usize>,
    gitignore: bool,
    config: &Config,
) -> Result<Vec<ApplicationFile>> {
    let mut all = Vec::new();
    for root in roots {
        let mut registry = Registry::new(root)
            .exclude_dirs(&config.exclude_dirs)
            .respect_gitignore(gitignore);
        if let Some(depth) = depth {
            registry = registry.max_depth(depth);
        }
        let mut applications = registry.scan()?;
        all.append(&mut applications);
    }
    Ok(all)
}

fn run_refill(application_path: PathBuf, json_output: bool) -> Result<()> {
    let application = load_application(&application_path)?;
    let suggested = next_request(&application).with_context(|| {
        format!(
            "Invalid capacity field on record: {}",
            application_path.display()
        )
    })?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&suggested)?);
        return Ok(());
    }

    print_suggestion(&application, &suggested);
    Ok(())
}

fn print_suggestion(application: &Application, suggested: &RequestAmount) {
    println!(
        "{} {} ({})",
        "Applicant:".bold(),
        application.client.name,
        application.lifecycle.state.display_name().bright_black()
    );
    println!(
        "  Entitlement: {} requested, {} weekly",
        application.datacap.total_requested_amount.yellow(),
        application.datacap.weekly_allocation.yellow()
    );
    println!(
        "  Tranches recorded: {}",
        application.request_count().to_string().bright_white()
    );

    if suggested.is_zero() {
        println!("  {}", "No further allocation due.".yellow().bold());
    } else {
        println!(
            "  Suggested next request: {}",
            suggested.to_string().green().bold()
        );
    }
}

fn run_show(application_path: PathBuf, json_output: bool) -> Result<()> {
    let application = load_application(&application_path)?;
    let suggested = next_request(&application).ok();

    if json_output {
        #[derive(Serialize)]
        struct ShowOutput {
            application: Application,
            suggested_next: Option<RequestAmount>,
        }
        let out = ShowOutput {
            application,
            suggested_next: suggested,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let client = &application.client;
    println!("{} {}", "Application".bright_cyan().bold(), application.id);
    println!("  Client: {} ({})", client.name.bold(), client.region);
    println!("  Industry: {}", client.industry);
    println!("  Website: {}", client.website);
    println!(
        "  State: {} {}",
        application.lifecycle.state.display_name().bold(),
        if application.lifecycle.active {
            "[ACTIVE]".green()
        } else {
            "[INACTIVE]".bright_black()
        }
    );
    println!("  Address: {}", application.lifecycle.on_chain_address);
    println!("  Multisig: {}", application.lifecycle.multisig_address);
    println!(
        "  Datacap: {} total, {} weekly, {} replicas{}",
        application.datacap.total_requested_amount.yellow(),
        application.datacap.weekly_allocation.yellow(),
        application.datacap.replicas,
        if application.datacap_reached().unwrap_or(false) {
            " [TOTAL DATACAP REACHED]".yellow().to_string()
        } else {
            String::new()
        }
    );

    if !application.allocation_requests.is_empty() {
        println!("\n{}", "Allocation Requests".bright_green().bold());

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(vec![
            Cell::new("ID"),
            Cell::new("Type"),
            Cell::new("Amount"),
            Cell::new("Active"),
            Cell::new("Signers"),
            Cell::new("Updated"),
        ]));

        for request in &application.allocation_requests {
            table.add_row(Row::new(vec![
                Cell::new(&request.id),
                Cell::new(&format!("{:?}", request.request_type)),
                Cell::new(request.allocation_amount.as_deref().unwrap_or("-")),
                Cell::new(if request.active { "yes" } else { "no" }),
                Cell::new(&request.signers.len().to_string()),
                Cell::new(&request.updated_at),
            ]));
        }

        table.printstd();
    }

    println!();
    match suggested {
        Some(suggested) if !suggested.is_zero() => {
            println!(
                "{} {}",
                "Suggested next request:".bold(),
                suggested.to_string().green().bold()
            );
        }
        Some(_) => {
            println!("{}", "No further allocation due.".yellow().bold());
        }
        None => {
            println!(
                "{}",
                "Record has malformed capacity fields; no suggestion.".red()
            );
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct ScanRow {
    path: String,
    name: String,
    state: String,
    request_count: usize,
    requested_bytes: Option<u64>,
    granted_bytes: Option<u64>,
    suggested_next: Option<RequestAmount>,
    invalid: bool,
}

impl ScanRow {
    fn from_file(file: &ApplicationFile) -> Self {
        let app = &file.application;
        let requested = app.total_requested_bytes().ok();
        let granted = app.total_granted_bytes().ok();
        let suggested = next_request(app).ok();
        let invalid = requested.is_none() || granted.is_none() || suggested.is_none();

        Self {
            path: file.path.display().to_string(),
            name: file.label(),
            state: app.lifecycle.state.as_str().to_string(),
            request_count: app.request_count(),
            requested_bytes: requested,
            granted_bytes: granted,
            suggested_next: suggested,
            invalid,
        }
    }

    fn refill_due(&self) -> bool {
        self.suggested_next.as_ref().map_or(false, |s| !s.is_zero())
    }
}

fn run_scan(
    path: Option<PathBuf>,
    profile: Option<&str>,
    depth: Option<usize>,
    state: StateFilterArg,
    refills_due: bool,
    gitignore: bool,
    json_output: bool,
    config: &Config,
) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let resolved = resolve_registry_input(path, profile, config)?;
    let depth = depth.or(resolved.depth).or(config.default_depth);
    let gitignore = gitignore || resolved.gitignore.unwrap_or(false);
    let state_filter = state.to_filter();

    let keep = |row: &ScanRow, app_state: LifecycleState| {
        state_filter.map_or(true, |s| s == app_state) && (!refills_due || row.refill_due())
    };

    if json_output || resolved.roots.len() > 1 {
        let applications =
            scan_applications_for_roots(&resolved.roots, depth, gitignore, config)?;
        let rows: Vec<ScanRow> = applications
            .iter()
            .filter_map(|file| {
                let row = ScanRow::from_file(file);
                keep(&row, file.application.lifecycle.state).then_some(row)
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "Scanning registry for applications...".cyan().bold());
    let root = resolved.roots[0].clone();

    let mut registry = Registry::new(&root)
        .exclude_dirs(&config.exclude_dirs)
        .respect_gitignore(gitignore);
    if let Some(depth) = depth {
        registry = registry.max_depth(depth);
    }

    let (total_count, rx) = registry.scan_with_streaming()?;
    if total_count == 0 {
        println!("{}", "No application records found.".yellow());
        return Ok(());
    }

    println!("Found {} candidate files, parsing...\n", total_count);

    let pb = ProgressBar::new(total_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut shown = 0usize;
    let mut due = 0usize;
    let mut invalid = 0usize;
    for file in rx.iter() {
        pb.inc(1);
        let row = ScanRow::from_file(&file);
        if !keep(&row, file.application.lifecycle.state) {
            continue;
        }

        shown += 1;
        pb.set_message(row.name.clone());

        if row.invalid {
            invalid += 1;
            pb.println(format!(
                "  {} {} {} {}",
                "✗".red(),
                row.name.bold(),
                row.path.bright_black(),
                "[INVALID CAPACITY FIELDS]".red()
            ));
            continue;
        }

        let suggested = row.suggested_next.clone().unwrap_or_else(RequestAmount::zero);
        if row.refill_due() {
            due += 1;
        }
        pb.println(format!(
            "  {} {} {} {} / {} granted, {} tranches, next: {}",
            "✓".green(),
            row.state.bright_cyan(),
            row.name.bold(),
            format_from_bytes(row.granted_bytes.unwrap_or(0), true).yellow(),
            format_from_bytes(row.requested_bytes.unwrap_or(0), true).yellow(),
            row.request_count,
            if suggested.is_zero() {
                "none due".yellow().to_string()
            } else {
                suggested.to_string().green().bold().to_string()
            }
        ));
    }
    pb.finish_and_clear();

    if shown == 0 {
        println!("\n{}", "No applications match the filter criteria.".yellow());
        return Ok(());
    }

    println!(
        "\n{} {} applications shown, {} with a refill due",
        "✓".green().bold(),
        shown.to_string().green().bold(),
        due.to_string().green().bold()
    );
    if invalid > 0 {
        println!(
            "{} {} records had malformed capacity fields",
            "!".red().bold(),
            invalid.to_string().red()
        );
    }
    Ok(())
}

fn run_stats(
    path: Option<PathBuf>,
    profile: Option<&str>,
    depth: Option<usize>,
    top_n: usize,
    stale_days: Option<i64>,
    gitignore: bool,
    json_output: bool,
    config: &Config,
) -> Result<()> {
    println!("{}", "Scanning registry for applications...".cyan().bold());
    let resolved = resolve_registry_input(path, profile, config)?;
    let depth = depth.or(resolved.depth).or(config.default_depth);
    let gitignore = gitignore || resolved.gitignore.unwrap_or(false);
    let stale_days = stale_days.or(resolved.stale_days).unwrap_or(config.stale_days);

    let applications = scan_applications_for_roots(&resolved.roots, depth, gitignore, config)?;

    if applications.is_empty() {
        println!("{}", "No application records found.".yellow());
        return Ok(());
    }

    let stats = Statistics::from_applications(&applications, stale_days);

    if json_output {
        match stats.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error generating JSON: {}", e),
        }
    } else {
        stats.display_terminal(top_n);
    }

    Ok(())
}

fn run_tui(
    path: Option<PathBuf>,
    profile: Option<&str>,
    depth: Option<usize>,
    gitignore: bool,
    config: &Config,
) -> Result<()> {
    let resolved = resolve_registry_input(path, profile, config)?;
    let depth = depth.or(resolved.depth).or(config.default_depth);
    let gitignore = gitignore || resolved.gitignore.unwrap_or(false);

    let applications = scan_applications_for_roots(&resolved.roots, depth, gitignore, config)?;

    if applications.is_empty() {
        println!("{}", "No application records found.".yellow());
        return Ok(());
    }

    crate::tui::run(applications)
}

fn init_config(path: Option<PathBuf>) -> Result<()> {
    let config_path = path.unwrap_or_else(|| {
        Config::ensure_config_dir().unwrap_or_else(|_| PathBuf::from("config.toml"))
    });

    let config = Config::default();
    config.save(&config_path)?;

    println!(
        "{} {}",
        "Config file created:".green().bold(),
        config_path.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_path_and_profile_together() {
        let config = Config::default();
        let result = resolve_registry_input(
            Some(PathBuf::from("/registry")),
            Some("main"),
            &config,
        );
        assert!(result.is_err());
    }

    #[test]
    fn resolve_defaults_to_current_dir() {
        let config = Config::default();
        let resolved = resolve_registry_input(None, None, &config).unwrap();
        assert_eq!(resolved.roots, vec![PathBuf::from(".")]);
    }

    #[test]
    fn resolve_uses_profile_paths() {
        let mut config = Config::default();
        config.registry_profiles.insert(
            String::from("main"),
            crate::config::RegistryProfile {
                paths: vec![PathBuf::from("/registries/a")],
                depth: Some(2),
                ..Default::default()
            },
        );

        let resolved = resolve_registry_input(None, Some("main"), &config).unwrap();
        assert_eq!(resolved.roots, vec![PathBuf::from("/registries/a")]);
        assert_eq!(resolved.depth, Some(2));
    }

    #[test]
    fn resolve_rejects_unknown_profile() {
        let config = Config::default();
        assert!(resolve_registry_input(None, Some("missing"), &config).is_err());
    }
}
