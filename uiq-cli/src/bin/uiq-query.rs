//! Standalone CLI tool for running one query against one or more tree files.
//!
//! Trees are queried in parallel; the output is a JSON array with one entry
//! per `--tree`, in argument order.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use uiq_core::batch::query_trees;
use uiq_core::request::{QueryRequest, QueryResponse};
use uiq_core::Tree;

#[derive(Parser)]
#[command(name = "uiq-query", about = "Query JSON element trees by role, name, text or test id")]
struct Args {
    /// Tree file(s) to query (`-` for stdin, at most once)
    #[arg(long, required = true)]
    tree: Vec<String>,

    /// Query as JSON, or `@path` to read it from a file
    #[arg(long)]
    request: String,

    /// JSON config file (`ConfigureOptions`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct TreeResult<'a> {
    tree: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<QueryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_request(raw: &str) -> Result<QueryRequest, String> {
    let json = match raw.strip_prefix('@') {
        Some(path) => uiq_cli::read_source(path).map_err(|e| format!("{path}: {e}"))?,
        None => raw.to_owned(),
    };
    serde_json::from_str(&json).map_err(|e| format!("invalid request: {e}"))
}

fn main() -> ExitCode {
    let args = Args::parse();
    uiq_cli::init_logging(args.verbose);

    let prepared = (|| -> Result<_, String> {
        let request = parse_request(&args.request)?;
        let config = uiq_cli::load_config(args.config.as_deref())?;
        let trees = args
            .tree
            .iter()
            .map(|path| uiq_cli::load_tree(path))
            .collect::<Result<Vec<Arc<Tree>>, String>>()?;
        Ok((request, config, trees))
    })();
    let (request, config, trees) = match prepared {
        Ok(p) => p,
        Err(e) => {
            eprintln!("uiq-query: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::debug!("running {:?} query against {} tree(s)", request.by, trees.len());
    let results = query_trees(&trees, &request, &config);
    let failed = results.iter().any(|r| r.is_err());

    let report: Vec<TreeResult<'_>> = args
        .tree
        .iter()
        .zip(results)
        .map(|(tree, result)| match result {
            Ok(response) => TreeResult {
                tree,
                result: Some(response),
                error: None,
            },
            Err(e) => TreeResult {
                tree,
                result: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    match uiq_cli::to_json(&report, args.compact) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("uiq-query: {e}");
            return ExitCode::FAILURE;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
