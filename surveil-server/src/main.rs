//! surveil: CLI + server for surveillance ingest and conflict detection.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use surveil_core::config::{self, Config};
use surveil_core::decode::{decode_burst, SurveillanceRecord};
use surveil_core::encode::encode_record;
use surveil_core::tracker::{Track, TrackStore};
use surveil_core::types::{hex_decode, hex_encode};

mod engine;
mod resolution;
mod scheduler;
mod web;

use engine::Engine;
use scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "surveil", version, about = "Surveillance decoder, tracker and conflict detector")]
struct Cli {
    /// Config file (defaults to ~/.surveil/config.toml)
    #[arg(long, global = true, env = "SURVEIL_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingest API, detection scheduler and conflict stream
    Serve {
        /// Override the configured listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Decode hex data blocks from a file and print records and tracks
    Decode {
        /// Path to file containing hex data blocks (one per line, "-" for stdin)
        file: PathBuf,

        /// Print every decoded record and its re-encoding instead of tables
        #[arg(short, long)]
        raw: bool,
    },

    /// Load and validate the configuration, then print a summary
    CheckConfig {
        /// Write the default configuration first if no file exists yet
        #[arg(long)]
        write_defaults: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(cli.config, host, port),
        Commands::Decode { file, raw } => cmd_decode(cli.config.as_deref(), file, raw),
        Commands::CheckConfig { write_defaults } => cmd_check_config(cli.config.as_deref(), write_defaults),
    }
}

fn load_or_exit(path: Option<&Path>) -> Config {
    config::load_config(path).unwrap_or_else(|e| {
        eprintln!("Error loading configuration: {e}");
        std::process::exit(1);
    })
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

fn cmd_serve(config_path: Option<PathBuf>, host: Option<String>, port: Option<u16>) {
    let mut config = load_or_exit(config_path.as_deref());
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Error starting runtime: {e}");
        std::process::exit(1);
    });
    runtime.block_on(run_server(config, config_path));
}

async fn run_server(config: Config, config_path: Option<PathBuf>) {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = match Engine::from_config(config) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let scheduler = Scheduler::spawn(Arc::clone(&engine));
    let reload = tokio::spawn(reload_on_hangup(Arc::clone(&engine), config_path));

    if let Err(e) = web::serve(Arc::clone(&engine), &addr, shutdown_signal()).await {
        error!(addr = %addr, error = %e, "server failed");
    }

    reload.abort();
    scheduler.stop().await;
    engine.clear();
    info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutdown requested");
}

/// Re-read and apply the config file on SIGHUP. A file that fails to load
/// or validate leaves the running configuration in place.
#[cfg(unix)]
async fn reload_on_hangup(engine: Arc<Engine>, path: Option<PathBuf>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "config reload on SIGHUP unavailable");
            return;
        }
    };
    while hangup.recv().await.is_some() {
        match config::load_config(path.as_deref()).and_then(|c| engine.apply_config(c)) {
            Ok(()) => info!("configuration reloaded"),
            Err(e) => error!(error = %e, "configuration reload failed, keeping previous"),
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(_engine: Arc<Engine>, _path: Option<PathBuf>) {}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Result of decoding a capture file.
struct DecodeSummary {
    lines: u64,
    bad_lines: u64,
    records: Vec<SurveillanceRecord>,
    errors: u64,
    tracks: Vec<Track>,
}

/// Split `"hex"` or `"hex;timestamp"`, falling back to `default_ts`.
fn parse_line(line: &str, default_ts: f64) -> Option<(&str, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(match line.split_once(';') {
        Some((h, t)) => (h.trim(), t.trim().parse::<f64>().unwrap_or(default_ts)),
        None => (line, default_ts),
    })
}

fn decode_lines(reader: impl BufRead, store: &mut TrackStore) -> DecodeSummary {
    let mut summary = DecodeSummary {
        lines: 0,
        bad_lines: 0,
        records: Vec::new(),
        errors: 0,
        tracks: Vec::new(),
    };
    let mut timestamp = 0.0f64;
    let mut last_ts = 0.0f64;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };
        let Some((hex, ts)) = parse_line(&line, timestamp) else {
            continue;
        };
        // Auto-increment for files without timestamps
        timestamp = ts + 1.0;
        last_ts = last_ts.max(ts);
        summary.lines += 1;

        let Some(bytes) = hex_decode(hex) else {
            warn!(line = summary.lines, "not a hex data block, skipped");
            summary.bad_lines += 1;
            continue;
        };

        let decoded = decode_burst(&bytes, ts);
        for err in &decoded.errors {
            warn!(line = summary.lines, error = %err, "decode error");
        }
        summary.errors += decoded.errors.len() as u64;
        for record in decoded.records {
            store.apply(&record);
            summary.records.push(record);
        }
    }

    // Tracks still live at the end of the capture
    summary.tracks = store.snapshot(last_ts);
    summary
}

fn cmd_decode(config_path: Option<&Path>, file: PathBuf, raw: bool) {
    let config = load_or_exit(config_path);

    let reader: Box<dyn BufRead> = if file.to_str() == Some("-") {
        Box::new(io::stdin().lock())
    } else {
        let f = std::fs::File::open(&file).unwrap_or_else(|e| {
            eprintln!("Error opening {}: {e}", file.display());
            std::process::exit(1);
        });
        Box::new(io::BufReader::new(f))
    };

    let mut store = TrackStore::new(config.site_registry(), config.tracks.stale_after_secs);
    let summary = decode_lines(reader, &mut store);

    if raw {
        for record in &summary.records {
            let json = serde_json::to_string(record).unwrap_or_default();
            println!("{json}");
            println!("  re-encoded: {}", hex_encode(&encode_record(record)));
        }
        return;
    }

    println!();
    println!(
        "Lines: {} read, {} not hex; records: {} decoded, {} errors; tracks: {}",
        summary.lines,
        summary.bad_lines,
        summary.records.len(),
        summary.errors,
        summary.tracks.len()
    );

    if !summary.records.is_empty() {
        println!();
        let mut table = Table::new();
        table.set_header(vec!["#", "Cat", "Source", "Time", "Fields"]);
        for (i, rec) in summary.records.iter().enumerate() {
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(format!("{:03}", rec.category)),
                Cell::new(rec.source.map(|s| s.to_string()).unwrap_or("-".into())),
                Cell::new(format!("{:.1}", rec.timestamp)),
                Cell::new(rec.field_ids().join(" ")),
            ]);
        }
        println!("{table}");
    }

    if !summary.tracks.is_empty() {
        println!();
        print_tracks(&summary.tracks);
    }
}

fn print_tracks(tracks: &[Track]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Track", "Callsign", "Mode 3/A", "Alt (ft)", "Speed", "Hdg", "Lat", "Lon", "Status",
        "Quality", "Msgs",
    ]);

    for t in tracks {
        table.add_row(vec![
            Cell::new(t.key.as_str()),
            Cell::new(t.callsign.as_deref().unwrap_or("-")),
            Cell::new(t.mode3a.as_deref().unwrap_or("-")),
            Cell::new(
                t.altitude_ft
                    .map(|a| format!("{a:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.ground_speed_kt
                    .map(|s| format!("{s:.0}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                t.heading_deg
                    .map(|h| format!("{h:.1}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(t.lat.map(|l| format!("{l:.4}")).unwrap_or("-".into())),
            Cell::new(t.lon.map(|l| format!("{l:.4}")).unwrap_or("-".into())),
            Cell::new(format!("{:?}", t.status)),
            Cell::new(format!("{:.2}", t.quality)),
            Cell::new(t.message_count),
        ]);
    }

    println!("{table}");
}

// ---------------------------------------------------------------------------
// check-config
// ---------------------------------------------------------------------------

fn cmd_check_config(config_path: Option<&Path>, write_defaults: bool) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::config_file);
    if write_defaults {
        match config::write_defaults(Some(&path)) {
            Ok(Some(written)) => println!("Wrote default configuration to {}", written.display()),
            Ok(None) => println!("{} already exists, left unchanged", path.display()),
            Err(e) => {
                eprintln!("Error writing configuration: {e}");
                std::process::exit(1);
            }
        }
    }
    let config = load_or_exit(Some(&path));

    println!();
    if path.exists() {
        println!("Config: {} (valid)", path.display());
    } else {
        println!("Config: {} not found, using defaults", path.display());
    }
    println!();
    println!(
        "  Separation:  {} NM horizontal, {} ft vertical, low altitude {} ft",
        config.separation.horizontal_nm, config.separation.vertical_ft, config.separation.low_altitude_ft
    );
    println!(
        "  Detection:   every {} ms, horizon {} s, step {} s",
        config.detection.interval_ms, config.detection.horizon_secs, config.detection.step_secs
    );
    println!(
        "  Alerts:      critical {}/{}s, high {}/{}s, medium {}/{}s",
        config.alerts.critical.separation_nm,
        config.alerts.critical.time_secs,
        config.alerts.high.separation_nm,
        config.alerts.high.time_secs,
        config.alerts.medium.separation_nm,
        config.alerts.medium.time_secs
    );
    println!("  Stale after: {} s", config.tracks.stale_after_secs);
    println!(
        "  Resolution:  {}",
        config.resolution.url.as_deref().unwrap_or("fallback only")
    );
    println!("  Listen:      {}:{}", config.server.host, config.server.port);
    println!("  Sites:       {}", config.sites.len());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use surveil_core::encode::{block, TargetReport};
    use surveil_core::types::DataSource;

    fn capture_line(n: u16, lat: f64) -> String {
        let rec = TargetReport {
            source: DataSource::new(5, 6),
            track_number: Some(n),
            callsign: Some(format!("TST{n}")),
            position: Some((lat, 8.5)),
            flight_level: Some(240.0),
            ..Default::default()
        }
        .to_cat021();
        hex_encode(&block(21, &[rec]).unwrap())
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("  ", 3.0), None);
        assert_eq!(parse_line("# comment", 3.0), None);
        assert_eq!(parse_line("1500", 3.0), Some(("1500", 3.0)));
        assert_eq!(parse_line("1500;12.5", 3.0), Some(("1500", 12.5)));
        assert_eq!(parse_line("1500;bad", 3.0), Some(("1500", 3.0)));
    }

    #[test]
    fn test_decode_lines_builds_tracks() {
        let text = format!(
            "# capture\n{}\nzz-not-hex\n{};30\n{};31\n",
            capture_line(1, 47.0),
            capture_line(1, 47.01),
            capture_line(2, 47.5),
        );
        let mut store = TrackStore::default();
        let summary = decode_lines(io::Cursor::new(text), &mut store);

        assert_eq!(summary.lines, 4);
        assert_eq!(summary.bad_lines, 1);
        assert_eq!(summary.records.len(), 3);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.tracks.len(), 2);
        let first = &summary.tracks[0];
        assert_eq!(first.key.as_str(), "TN:5/6:1");
        assert_eq!(first.message_count, 2);
        assert_eq!(first.callsign.as_deref(), Some("TST1"));
        assert!(first.velocity.is_some());
    }

    #[test]
    fn test_decode_lines_reports_block_errors() {
        // Declared length exceeds the data
        let text = "150020FF\n".to_string();
        let mut store = TrackStore::default();
        let summary = decode_lines(io::Cursor::new(text), &mut store);
        assert_eq!(summary.records.len(), 0);
        assert_eq!(summary.errors, 1);
    }
}
