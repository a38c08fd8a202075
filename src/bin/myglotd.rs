//! myglotd - MySQL status collector daemon.
//!
//! Runs a collection every interval and prints each sample as one JSON line
//! on stdout. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use myglot::collector::mock::MockConnector;
use myglot::collector::{
    CollectMode, DriverCapability, MySqlCollector, RunOutcome, SampleMap, SqlxConnector,
};
use myglot::config::RawConfig;

/// MySQL status collector daemon.
#[derive(Parser)]
#[command(name = "myglotd", about = "MySQL status collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "60")]
    interval: u64,

    /// JSON file with the MySQLServer section. Flags and environment
    /// variables take precedence over values from the file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Server host.
    #[arg(long, env = "MYSQL_SERVER")]
    host: Option<String>,

    /// Server port (default: 3306).
    #[arg(long, env = "MYSQL_PORT")]
    port: Option<String>,

    /// User name.
    #[arg(long, env = "MYSQL_USER")]
    user: Option<String>,

    /// Password.
    #[arg(long, env = "MYSQL_PASS", hide_env_values = true)]
    password: Option<String>,

    /// Collect replication lag ("true" to enable).
    #[arg(long, env = "MYSQL_SLAVE")]
    slave: Option<String>,

    /// Keep metrics of healthy groups when a group fails.
    #[arg(long)]
    partial: bool,

    /// Connect timeout in seconds.
    #[arg(long, default_value = "5")]
    connect_timeout: u64,

    /// Query timeout in seconds.
    #[arg(long, default_value = "10")]
    query_timeout: u64,

    /// Run a single collection and exit. Exit code is non-zero on failure.
    #[arg(long)]
    once: bool,

    /// Collect from a built-in fake server (mysql57, mysql80, legacy, replica).
    #[arg(long, value_name = "SCENARIO")]
    mock: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn raw_config(&self) -> RawConfig {
        RawConfig {
            mysql_server: self.host.clone(),
            mysql_port: self.port.clone(),
            mysql_user: self.user.clone(),
            mysql_pass: self.password.clone(),
            mysql_slave: self.slave.clone(),
        }
    }
}

/// One line of output.
#[derive(Serialize)]
struct Report<'a> {
    collected_at: String,
    metrics: &'a SampleMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_groups: Vec<&'static str>,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["myglotd", "myglot"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(sample: &SampleMap, failed_groups: Vec<&'static str>) {
    let report = Report {
        collected_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        metrics: sample,
        failed_groups,
    };
    match serde_json::to_string(&report) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("Failed to serialize sample: {}", e),
    }
}

/// Runs one cycle and reports it. Returns false if the run failed.
fn collect_once(collector: &mut MySqlCollector, raw: &RawConfig, run: u64) -> bool {
    match collector.run(raw) {
        Ok(RunOutcome::Collected(sample)) => {
            info!("Run #{}: {} metrics", run, sample.len());
            print_report(&sample, Vec::new());
            true
        }
        Ok(RunOutcome::Partial { sample, failures }) => {
            let groups: Vec<&'static str> = failures.iter().map(|f| f.group).collect();
            warn!(
                "Run #{}: {} metrics, failed groups: {}",
                run,
                sample.len(),
                groups.join(", ")
            );
            print_report(&sample, groups);
            true
        }
        Ok(RunOutcome::Skipped) => {
            warn!("Run #{}: MySQL not configured, nothing collected", run);
            true
        }
        Err(e) => {
            error!("Run #{}: {}", run, e);
            false
        }
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("myglotd {} starting", env!("CARGO_PKG_VERSION"));

    let mut raw = args.raw_config();
    if let Some(ref path) = args.config {
        match RawConfig::from_json_file(path) {
            Ok(file) => {
                info!("Config: loaded {}", path.display());
                raw = raw.or(file);
            }
            Err(e) => {
                error!("Config {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
    }

    let driver = match args.mock.as_deref() {
        Some(name) => match MockConnector::scenario(name) {
            Some(mock) => {
                info!("Driver: mock scenario '{}'", name);
                DriverCapability::available(mock)
            }
            None => {
                error!("Unknown mock scenario '{}'", name);
                std::process::exit(2);
            }
        },
        None => SqlxConnector::capability(
            Duration::from_secs(args.connect_timeout),
            Duration::from_secs(args.query_timeout),
        ),
    };

    let mode = if args.partial {
        CollectMode::Partial
    } else {
        CollectMode::AllOrNothing
    };
    let mut collector = MySqlCollector::new(driver).with_mode(mode);

    if args.once {
        let ok = collect_once(&mut collector, &raw, 1);
        std::process::exit(if ok { 0 } else { 1 });
    }

    info!(
        "Config: interval={}s, mode={:?}",
        args.interval,
        collector.mode()
    );

    let interval = Duration::from_secs(args.interval);

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    let mut run_count: u64 = 0;
    while running.load(Ordering::SeqCst) {
        run_count += 1;
        // Runs are sequential; the previous connection is closed before the next starts.
        collect_once(&mut collector, &raw, run_count);

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        debug!("Woke up for run #{}", run_count + 1);
    }

    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_raw() -> RawConfig {
        RawConfig {
            mysql_server: Some("localhost".to_string()),
            mysql_user: Some("monitor".to_string()),
            mysql_pass: Some("secret".to_string()),
            ..RawConfig::default()
        }
    }

    #[test]
    fn args_map_to_raw_config() {
        let args = Args::parse_from([
            "myglotd", "--host", "db", "--user", "u", "--password", "p", "--slave", "true",
        ]);
        let raw = args.raw_config();
        assert_eq!(raw.mysql_server.as_deref(), Some("db"));
        assert_eq!(raw.mysql_slave.as_deref(), Some("true"));
        assert_eq!(args.interval, 60);
    }

    #[test]
    fn connection_flags_read_mysql_env() {
        use clap::CommandFactory;

        let cmd = Args::command();
        let env_of = |id: &str| {
            cmd.get_arguments()
                .find(|a| a.get_id() == id)
                .and_then(|a| a.get_env())
                .and_then(|e| e.to_str())
                .map(str::to_string)
        };
        assert_eq!(env_of("host").as_deref(), Some("MYSQL_SERVER"));
        assert_eq!(env_of("port").as_deref(), Some("MYSQL_PORT"));
        assert_eq!(env_of("user").as_deref(), Some("MYSQL_USER"));
        assert_eq!(env_of("password").as_deref(), Some("MYSQL_PASS"));
        assert_eq!(env_of("slave").as_deref(), Some("MYSQL_SLAVE"));
    }

    #[test]
    fn collect_once_reports_success_and_failure() {
        let mut ok = MySqlCollector::new(DriverCapability::available(MockConnector::mysql80()));
        assert!(collect_once(&mut ok, &mock_raw(), 1));

        let refused = MockConnector::mysql80().refuse_connections("connection refused");
        let mut failing = MySqlCollector::new(DriverCapability::available(refused));
        assert!(!collect_once(&mut failing, &mock_raw(), 1));
    }

    #[test]
    fn skipped_run_is_not_a_failure() {
        let mut c = MySqlCollector::new(DriverCapability::available(MockConnector::mysql80()));
        assert!(collect_once(&mut c, &RawConfig::default(), 1));
    }
}
