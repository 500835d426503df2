//! Standalone CLI tool for printing a UI element tree file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use uiq_core::format::{all_props, render_tree};

#[derive(Parser)]
#[command(name = "uiq-tree", about = "Render a JSON element tree as diagnostic markup or host-only JSON")]
struct Args {
    /// Tree file (`-` for stdin)
    #[arg(default_value = "-")]
    tree: String,

    /// Emit host-only JSON instead of markup
    #[arg(long)]
    json: bool,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Print every data prop, not just the diagnostic subset
    #[arg(long)]
    all_props: bool,

    /// Check that every text string sits inside a host text node
    #[arg(long)]
    validate: bool,

    /// JSON config file (`ConfigureOptions`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> Result<String, String> {
    let tree = uiq_cli::load_tree(&args.tree)?;

    if args.validate {
        let config = uiq_cli::load_config(args.config.as_deref())?;
        let hosts = uiq_core::config::resolve_host_component_names(&config).map_err(|e| e.to_string())?;
        tree.validate_text_leaves(&hosts.text).map_err(|e| e.to_string())?;
        log::debug!("text leaves validated against <{}>", hosts.text);
    }

    if args.json {
        return uiq_cli::to_json(&tree.to_json(), args.compact);
    }

    let map_props = args.all_props.then(all_props);
    Ok(render_tree(&[tree.container().clone()], map_props.as_ref()))
}

fn main() -> ExitCode {
    let args = Args::parse();
    uiq_cli::init_logging(args.verbose);

    match run(&args) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("uiq-tree: {e}");
            ExitCode::FAILURE
        }
    }
}
