//! JSON-RPC IPC worker holding loaded element trees.
//!
//! Reads line-delimited JSON requests from stdin, dispatches to uiq_core,
//! writes JSON responses to stdout.  Trees stay loaded between requests and
//! are addressed by the name given to `load_tree` (default `"default"`).

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uiq_core::config::{self, ConfigureOptions};
use uiq_core::format::{all_props, render_tree};
use uiq_core::request::QueryRequest;
use uiq_core::{Queries, Tree};

const DEFAULT_TREE: &str = "default";

#[derive(Parser)]
#[command(name = "uiq-worker", about = "uiq IPC worker process")]
struct Args {
    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize)]
struct Request {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct Response {
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Default)]
struct Worker {
    trees: HashMap<String, Arc<Tree>>,
}

fn tree_name(params: &Value) -> String {
    params
        .get("tree")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_TREE)
        .to_owned()
}

impl Worker {
    fn tree(&self, params: &Value) -> Result<&Arc<Tree>, String> {
        let name = tree_name(params);
        self.trees
            .get(&name)
            .ok_or_else(|| format!("no tree loaded under {name:?}"))
    }

    fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, String> {
        match method {
            "load_tree" => {
                let spec = params.get("root").ok_or("missing params.root")?;
                let tree = Tree::from_json(&spec.to_string()).map_err(|e| e.to_string())?;
                let name = tree_name(params);
                if let Some(previous) = self.trees.insert(name.clone(), tree) {
                    previous.unmount();
                }
                log::debug!("loaded tree {name:?}");
                Ok(Value::String(name))
            }
            "unload_tree" => {
                let name = tree_name(params);
                let tree = self
                    .trees
                    .remove(&name)
                    .ok_or_else(|| format!("no tree loaded under {name:?}"))?;
                tree.unmount();
                Ok(Value::Bool(true))
            }
            "configure" => {
                let options: ConfigureOptions =
                    serde_json::from_value(params.clone()).map_err(|e| e.to_string())?;
                config::configure(options);
                Ok(Value::Bool(true))
            }
            "reset_config" => {
                config::reset_to_defaults();
                Ok(Value::Bool(true))
            }
            "query" => {
                let request: QueryRequest = params
                    .get("request")
                    .cloned()
                    .ok_or("missing params.request")
                    .and_then(|v| serde_json::from_value(v).map_err(|_| "invalid params.request"))?;
                let queries = Queries::new(self.tree(params)?);
                let response = request.execute(&queries).map_err(|e| e.to_string())?;
                serde_json::to_value(response).map_err(|e| e.to_string())
            }
            "debug" => {
                let tree = self.tree(params)?;
                let all = params.get("all_props").and_then(|v| v.as_bool()).unwrap_or(false);
                let map_props = all.then(all_props);
                Ok(Value::String(render_tree(
                    &[tree.container().clone()],
                    map_props.as_ref(),
                )))
            }
            "to_json" => {
                let tree = self.tree(params)?;
                serde_json::to_value(tree.to_json()).map_err(|e| e.to_string())
            }
            "ping" => Ok(Value::String("pong".to_owned())),
            _ => Err(format!("unknown method: {method}")),
        }
    }
}

/// Serialise `resp` as one line on `out`.
fn write_response(out: &mut impl Write, resp: &Response) {
    let line = serde_json::to_string(resp).unwrap_or_else(|e| {
        log::error!("uiq-worker: response {} not serialisable: {e}", resp.id);
        format!(r#"{{"id":{},"error":"response serialization failed"}}"#, resp.id)
    });
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

impl Response {
    fn from_result(id: u64, result: Result<Value, String>) -> Self {
        match result {
            Ok(value) => Response {
                id,
                result: Some(value),
                error: None,
            },
            Err(error) => Response {
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

fn main() {
    let args = Args::parse();
    uiq_cli::init_logging(args.verbose);
    let mut stdout = io::stdout();
    let mut worker = Worker::default();

    log::info!("uiq-worker: ready");

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log::error!("uiq-worker: stdin read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        // Unparseable requests have no id to echo; answer under id 0.
        let resp = match serde_json::from_str::<Request>(&line) {
            Ok(req) => Response::from_result(req.id, worker.dispatch(&req.method, &req.params)),
            Err(e) => Response::from_result(0, Err(format!("invalid JSON: {e}"))),
        };
        write_response(&mut stdout, &resp);
    }
}
