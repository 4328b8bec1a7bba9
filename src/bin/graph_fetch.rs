//! graph-fetch: stream node ids from stdin through combined batch calls.
//!
//! Usage:
//!   graph-fetch [--edge <path>] [--config <file>]  < ids.txt
//!
//! Writes one `id<TAB>json` line per fetched node to stdout. Logs go to
//! stderr and are controlled with `RUST_LOG`.

use anyhow::{bail, Context};
use graph_batch_fetch::{Credential, FetchConfig, Fetcher, StreamOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const KEYRING_SERVICE: &str = "graph-fetch";
const TOKEN_ENV: &str = "GRAPH_ACCESS_TOKEN";

struct Args {
    edge: String,
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args().skip(1))? {
        Some(args) => args,
        None => return Ok(()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => FetchConfig::from_file(path)?,
        None => FetchConfig::default(),
    }
    .with_env_overrides()?;

    let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
    let credential =
        Credential::from_env(TOKEN_ENV).or(Credential::from_keyring(KEYRING_SERVICE, user));
    let fetcher = Fetcher::new(config, credential)?;

    let stdin = io::stdin();
    let stream = fetcher.stream(stdin.lock().lines(), StreamOptions::new(args.edge.as_str()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut write_err: Option<io::Error> = None;
    let summary = stream.run(|id, node| {
        if write_err.is_none() {
            if let Err(e) = writeln!(out, "{}\t{}", id, node) {
                write_err = Some(e);
            }
        }
    })?;
    if let Some(e) = write_err {
        return Err(e).context("writing results to stdout");
    }
    out.flush().context("flushing stdout")?;

    tracing::info!(
        edge = args.edge.as_str(),
        produced = summary.produced,
        results = summary.results,
        flushes = summary.flushes,
        dropped = summary.dropped_sub_responses,
        attempted = summary.client.attempted,
        server_errors = summary.client.server_errors,
        timed_out = summary.client.timed_out,
        "done"
    );
    Ok(())
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        edge: "/".to_string(),
        config: None,
    };
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--edge" => {
                args.edge = argv.next().context("--edge needs a path")?;
            }
            "--config" => {
                args.config = Some(argv.next().context("--config needs a file")?.into());
            }
            "--version" | "-V" => {
                println!("graph-fetch {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    if !args.edge.starts_with('/') {
        bail!("--edge must start with '/', got {}", args.edge);
    }
    Ok(Some(args))
}

fn print_usage() {
    println!(
        r#"graph-fetch — fetch nodes in combined batch calls

USAGE:
    graph-fetch [--edge <path>] [--config <file>] < ids.txt

OPTIONS:
    --edge <path>       Target edge (default "/")
    --config <file>     YAML configuration file
    -V, --version       Show version information
    -h, --help          Show this help message

ENVIRONMENT:
    GRAPH_ACCESS_TOKEN          Access token (falls back to the OS keyring)
    GRAPH_FETCH_BASE_URL        Override the API host
    GRAPH_FETCH_TIMEOUT_SECS    Override the default call timeout
    GRAPH_FETCH_MAX_RETRIES     Override the retry limit
    RUST_LOG                    Log filter (default "warn")"#
    );
}
