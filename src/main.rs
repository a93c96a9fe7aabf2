/*!
 * Fusion CLI - Command Line Interface
 *
 * Runs the sync orchestrator against a Fusion dashboard API and exposes the
 * one-shot health, snapshot, admin and cache operations next to it.
 */

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use fusion::{
    cache::is_fresh,
    cli_style::{
        admin_state_table, format_duration, health_table, kpi_table, print_error,
        print_info, print_success, print_warning, section_header, stats_table, status_line,
        status_table, Icons, Theme,
    },
    config::{CacheBackendKind, FusionConfig, LogLevel},
    error::{FusionError, Result, EXIT_PARTIAL, EXIT_SUCCESS},
    logging,
    sync::{build_deps, SyncOrchestrator, SyncSettings},
    LocalCacheStore,
};
use fusion_connect::{
    AdminClient, ApiClient, ConnectError, HealthClass, HealthProber, HealthReport, HealthSource,
    Scenario, SnapshotFetcher, SnapshotSource,
};
use fusion_core_entities::Kpis;
use std::path::PathBuf;

/// Window for the "recent events" KPI
const KPI_WINDOW_MINUTES: i64 = 60;

#[derive(Parser)]
#[command(name = "fusion")]
#[command(version, about = "Keep dashboard data fresh: cache, snapshots, health and live updates", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'C', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// API base URL (overrides the config file)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    api_url: Option<String>,

    /// Log level
    #[arg(long = "log-level", value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Write JSON logs to this file instead of stderr
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    /// Verbose logging (debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync orchestrator and print a status line on every change
    Watch {
        /// Print the full status table instead of one line per change
        #[arg(long)]
        table: bool,
    },

    /// Probe the health endpoint once
    Health,

    /// Fetch one full snapshot and print the KPI summary
    Snapshot {
        /// Also store the result in the local cache
        #[arg(long)]
        save: bool,
    },

    /// Switch the simulator scenario
    Scenario {
        #[arg(value_enum)]
        scenario: ScenarioArg,
    },

    /// Wipe all simulated data on the server
    Reset,

    /// Show the simulator scenario, rates and cooldown
    AdminState,

    /// Inspect or clear the local cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show what is cached and whether it is still fresh
    Show,
    /// Remove all cached collections
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ScenarioArg {
    Normal,
    Stress,
    Incident,
}

impl From<ScenarioArg> for Scenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Normal => Scenario::Normal,
            ScenarioArg::Stress => Scenario::Stress,
            ScenarioArg::Incident => Scenario::Incident,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            print_error(&e.to_string(), suggestion_for(&e));
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| FusionError::Other(format!("Failed to start async runtime: {}", e)))?;
    runtime.block_on(dispatch(cli.command, config))
}

/// Config file first, then command-line overrides, then validation
fn load_config(cli: &Cli) -> Result<FusionConfig> {
    let mut config = match cli.config {
        Some(ref path) => FusionConfig::load(path)?,
        None => FusionConfig::default(),
    };

    if let Some(ref url) = cli.api_url {
        config.api.base_url = url.clone();
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    if let Some(ref file) = cli.log_file {
        config.logging.file = Some(file.clone());
    }
    if cli.verbose {
        config.logging.verbose = true;
    }

    config.validate()?;
    Ok(config)
}

async fn dispatch(command: Commands, config: FusionConfig) -> Result<i32> {
    match command {
        Commands::Watch { table } => watch(&config, table).await,
        Commands::Health => health(&config).await,
        Commands::Snapshot { save } => snapshot(&config, save).await,
        Commands::Scenario { scenario } => set_scenario(&config, scenario.into()).await,
        Commands::Reset => reset(&config).await,
        Commands::AdminState => admin_state(&config).await,
        Commands::Cache { command } => handle_cache_command(command, &config),
        Commands::Config { command } => handle_config_command(command, &config),
    }
}

fn api_client(config: &FusionConfig) -> Result<ApiClient> {
    Ok(ApiClient::new(
        &config.api.base_url,
        config.api.request_timeout(),
    )?)
}

fn kpi_window() -> chrono::Duration {
    chrono::Duration::minutes(KPI_WINDOW_MINUTES)
}

// ============================================================================
// WATCH
// ============================================================================

async fn watch(config: &FusionConfig, table: bool) -> Result<i32> {
    let silence = config.sync.channel_silence();
    let orchestrator = SyncOrchestrator::start(SyncSettings::from(config), build_deps(config)?);
    let mut views = orchestrator.subscribe();

    println!(
        "{} {} {}",
        Theme::header(format!("{} Fusion sync", Icons::SATELLITE)),
        Icons::ARROW_RIGHT,
        Theme::primary(&config.api.base_url)
    );
    println!("{}", Theme::muted("Press Ctrl-C to stop"));

    let mut last_error: Option<DateTime<Utc>> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                let now = Utc::now();

                if let Some(latest) = view.status.errors.front() {
                    if last_error != Some(latest.at) {
                        last_error = Some(latest.at);
                        print_warning(&format!("{}: {}", latest.context, latest.message));
                    }
                }

                if table {
                    println!("{}", status_table(&view, now, silence));
                    println!("{}", kpi_table(&view.kpis(now, kpi_window())));
                } else {
                    println!("{}", status_line(&view, now, silence));
                }
            }
        }
    }

    let view = orchestrator.view();
    orchestrator.shutdown().await;

    section_header("Session Summary");
    println!("{}", status_table(&view, Utc::now(), silence));
    Ok(EXIT_SUCCESS)
}

// ============================================================================
// ONE-SHOT COMMANDS
// ============================================================================

async fn health(config: &FusionConfig) -> Result<i32> {
    let prober = HealthProber::new(api_client(config)?);
    let report = match prober.probe().await {
        Ok(report) => report,
        Err(e) => HealthReport::degraded(e.to_string()),
    };

    println!("{}", health_table(&report));
    Ok(match report.classify() {
        HealthClass::Healthy => EXIT_SUCCESS,
        HealthClass::Degraded => EXIT_PARTIAL,
    })
}

async fn snapshot(config: &FusionConfig, save: bool) -> Result<i32> {
    let fetcher = SnapshotFetcher::new(api_client(config)?, config.api.limits);
    let snapshot = fetcher.fetch_all().await?;

    let kpis = Kpis::compute(
        &snapshot.events,
        &snapshot.assets,
        &snapshot.alerts,
        Utc::now(),
        kpi_window(),
    );
    section_header("Snapshot");
    println!("{}", kpi_table(&kpis));

    if save {
        let store = LocalCacheStore::from_config(&config.cache);
        let meta = store.save(&snapshot)?;
        print_success(&format!(
            "Cached {} entities at {}",
            snapshot.total(),
            meta.saved_at.as_deref().unwrap_or("?")
        ));
    }
    Ok(EXIT_SUCCESS)
}

async fn set_scenario(config: &FusionConfig, scenario: Scenario) -> Result<i32> {
    let admin = AdminClient::new(api_client(config)?);
    let response = admin.set_scenario(scenario).await?;

    print_success(&format!("Scenario set to {}", Theme::primary(response.scenario)));
    println!(
        "  {} event {}s / asset {}s / alert {}s",
        Theme::muted("rates"),
        response.rates.event,
        response.rates.asset,
        response.rates.alert
    );
    print_info(&format!(
        "Admin actions locked for {}",
        format_duration(response.cooldown_sec as f64)
    ));
    Ok(EXIT_SUCCESS)
}

async fn reset(config: &FusionConfig) -> Result<i32> {
    let admin = AdminClient::new(api_client(config)?);
    let response = admin.reset().await?;

    print_success("Simulation reset");
    println!(
        "{}",
        stats_table(&[
            ("Events deleted", response.deleted.events.to_string()),
            ("Assets deleted", response.deleted.assets.to_string()),
            ("Alerts deleted", response.deleted.alerts.to_string()),
            ("Cooldown", format_duration(response.cooldown_sec as f64)),
        ])
    );
    Ok(EXIT_SUCCESS)
}

async fn admin_state(config: &FusionConfig) -> Result<i32> {
    let admin = AdminClient::new(api_client(config)?);
    let state = admin.state().await?;

    section_header("Simulator");
    println!("{}", admin_state_table(&state));
    Ok(EXIT_SUCCESS)
}

// ============================================================================
// LOCAL COMMANDS
// ============================================================================

fn handle_cache_command(command: CacheCommands, config: &FusionConfig) -> Result<i32> {
    let store = LocalCacheStore::from_config(&config.cache);
    let location = match config.cache.backend {
        CacheBackendKind::File => config.cache.resolved_dir().display().to_string(),
        CacheBackendKind::Memory => "memory".to_string(),
    };

    match command {
        CacheCommands::Show => {
            section_header("Local Cache");
            let Some(cached) = store.load() else {
                print_info(&format!("No cache under {}", location));
                return Ok(EXIT_SUCCESS);
            };

            let fresh = is_fresh(Some(&cached.meta), config.cache.ttl());
            let age = cached
                .meta
                .saved_time()
                .and_then(|saved| (Utc::now() - saved).to_std().ok())
                .map(|d| format!("{} ago", format_duration(d.as_secs_f64())))
                .unwrap_or_else(|| "-".to_string());

            println!(
                "{}",
                stats_table(&[
                    ("Location", location),
                    ("Key", store.key("meta")),
                    (
                        "Saved at",
                        cached.meta.saved_at.clone().unwrap_or_else(|| "-".to_string())
                    ),
                    ("Age", age),
                    (
                        "Fresh",
                        if fresh {
                            format!("{} yes", Icons::SUCCESS)
                        } else {
                            format!("{} no", Icons::WARNING)
                        }
                    ),
                    ("Contents", cached.snapshot.summary()),
                ])
            );
            Ok(EXIT_SUCCESS)
        }
        CacheCommands::Clear => {
            store.clear()?;
            print_success(&format!("Cache cleared ({})", location));
            Ok(EXIT_SUCCESS)
        }
    }
}

fn handle_config_command(command: ConfigCommands, config: &FusionConfig) -> Result<i32> {
    match command {
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| FusionError::Config(format!("Cannot serialize config: {}", e)))?;
            println!("{}", rendered);
            Ok(EXIT_SUCCESS)
        }
        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                return Err(FusionError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            FusionConfig::default().to_file(&path)?;
            print_success(&format!("Wrote default config to {}", path.display()));
            Ok(EXIT_SUCCESS)
        }
    }
}

fn suggestion_for(error: &FusionError) -> Option<&'static str> {
    match error {
        FusionError::Config(_) => Some("Check the config file or run `fusion config init <FILE>`"),
        FusionError::Connect(ConnectError::CooldownActive { .. } | ConnectError::Busy) => {
            Some("Admin actions are rate limited; see `fusion admin-state`")
        }
        FusionError::Connect(e) if e.is_transient() => {
            Some("Is the API running? Try `fusion health` or pass --api-url")
        }
        _ => None,
    }
}
