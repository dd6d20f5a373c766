//! bandgate-ctl — command-line interface for the bandgate status API.

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 5080;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    admission:         AdmissionInfo,
    tracked_clients:   usize,
    registry_capacity: usize,
    qos_entries:       usize,
}

#[derive(Deserialize)]
struct AdmissionInfo {
    committed_kbps: f64,
    ceiling_kbps:   f64,
    active:         usize,
    admitted_total: u64,
    rejected_total: u64,
}

#[derive(Deserialize)]
struct ClientsResponse {
    clients: Vec<ClientInfo>,
}

#[derive(Deserialize)]
struct ClientInfo {
    ip:                  String,
    last_rtt_secs:       f64,
    last_bandwidth_kbps: f64,
    request_count:       u64,
    last_connection:     Option<u64>,
    last_seen_secs:      Option<u64>,
}

#[derive(Deserialize)]
struct QosResponse {
    default_rate_kbps: f64,
    entries:           Vec<QosEntryInfo>,
}

#[derive(Deserialize)]
struct QosEntryInfo {
    ip:   String,
    rate: f64,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to bandgated at {} (is it running?)", url))?
        .json::<T>()
        .await
        .context("failed to parse response")
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;
    let a = &resp.admission;

    println!("═══════════════════════════════════════");
    println!("  bandgate Server Status");
    println!("═══════════════════════════════════════");
    println!("  Committed        : {:.2} / {:.2} kB/s ({})", a.committed_kbps, a.ceiling_kbps, utilization(a.committed_kbps, a.ceiling_kbps));
    println!("  Active transfers : {}", a.active);
    println!("  Admitted (total) : {}", a.admitted_total);
    println!("  Rejected (total) : {}", a.rejected_total);
    println!("  Tracked clients  : {} / {}", resp.tracked_clients, resp.registry_capacity);
    println!("  QoS entries      : {}", resp.qos_entries);

    Ok(())
}

async fn cmd_clients(port: u16) -> Result<()> {
    let resp: ClientsResponse = get_json(&format!("{}/clients", base_url(port))).await?;

    if resp.clients.is_empty() {
        println!("No client history yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Client History ({})", resp.clients.len());
    println!("═══════════════════════════════════════");

    for c in &resp.clients {
        println!("  ┌─ {}", c.ip);
        println!("  │  rtt       : {:.3}s", c.last_rtt_secs);
        println!("  │  bandwidth : {:.2} kB/s", c.last_bandwidth_kbps);
        println!("  │  requests  : {}", c.request_count);
        if let Some(conn) = c.last_connection {
            println!("  │  last conn : #{}", conn);
        }
        match c.last_seen_secs {
            Some(secs) => println!("  └─ last seen : {}s ago", secs),
            None       => println!("  └─ last seen : never"),
        }
    }

    Ok(())
}

async fn cmd_qos(port: u16) -> Result<()> {
    let resp: QosResponse = get_json(&format!("{}/qos", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  QoS Policy ({} entries)", resp.entries.len());
    println!("═══════════════════════════════════════");
    println!("  default : {:.2} kB/s", resp.default_rate_kbps);
    for e in &resp.entries {
        println!("  {:<15} : {:.2} kB/s", e.ip, e.rate);
    }

    Ok(())
}

fn utilization(committed: f64, ceiling: f64) -> String {
    if ceiling > 0.0 {
        format!("{:.1}%", committed / ceiling * 100.0)
    } else {
        "n/a".to_string()
    }
}

fn print_usage() {
    println!("Usage: bandgate-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status        Show committed bandwidth and admission counters");
    println!("  clients       List per-client request history");
    println!("  qos           Show the loaded QoS policy");
    println!();
    println!("Options:");
    println!("  --port <port>   Status API port (default: {})", DEFAULT_PORT);
}

/// Split out `--port`; everything else is the command.
fn parse_args(args: &[String]) -> Result<(u16, Vec<&str>)> {
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }
    Ok((port, remaining))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (port, remaining) = parse_args(&args)?;

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["clients"]                    => cmd_clients(port).await,
        ["qos"]                        => cmd_qos(port).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
