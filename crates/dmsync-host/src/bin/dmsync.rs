//! dmsync: run DM-script fragments with synchronized variables.
//!
//! Scripts run in the in-process host. Exposed values are given as JSON,
//! requested variables are printed as JSON afterwards.
//!
//! # Usage
//!
//! ```bash
//! # Expose two numbers and read their sum back
//! dmsync -s a=10 -s b=20 -e "number c = a + b;" -r c:integer
//!
//! # Write the generated script instead of running it
//! dmsync analysis.s -s 'names=["x","y"]' --debug-file out.s
//!
//! # Read a group with typed members
//! dmsync cfg.s -r 'cfg:{"name":"text","shape":["int","int"]}'
//! ```

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use dmsync_host::ScriptHost;
use dmsync_runtime::{ScriptSource, SyncOptions, SyncSession, TypeDef, TypeSpecifier, Value};
use env_logger::Env;
use log::{debug, error, info};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

/// Run DM-script fragments with variables synchronized from and to JSON.
#[derive(Parser, Debug)]
#[command(name = "dmsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script files or inline script text, run in the given order
    #[arg(value_name = "SCRIPT")]
    scripts: Vec<String>,

    /// Inline script fragment, run after the files
    #[arg(short, long, value_name = "TEXT")]
    eval: Vec<String>,

    /// Expose a value to the script, e.g. `count=3` or `names=["a","b"]`
    #[arg(short, long = "set", value_name = "NAME=JSON")]
    set: Vec<SetArg>,

    /// Read a variable back, e.g. `total:integer`, `items:TagList` or
    /// `cfg:{"n":"int"}`
    #[arg(short, long = "read", value_name = "NAME:TYPE")]
    read: Vec<ReadArg>,

    /// Write the generated script to this file instead of running it
    #[arg(long, value_name = "PATH")]
    debug_file: Option<PathBuf>,

    /// Options file (TOML)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone)]
struct SetArg {
    name: String,
    value: Value,
}

impl FromStr for SetArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (name, json) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NAME=JSON, got {s:?}"))?;
        let json: serde_json::Value =
            serde_json::from_str(json).with_context(|| format!("invalid JSON for {name}"))?;
        let value = Value::from_json(json).with_context(|| format!("cannot expose {name}"))?;
        Ok(Self {
            name: name.trim().to_string(),
            value,
        })
    }
}

#[derive(Debug, Clone)]
struct ReadArg {
    name: String,
    ty: TypeDef,
}

impl FromStr for ReadArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (name, ty) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected NAME:TYPE, got {s:?}"))?;
        let ty = TypeDef::parse(ty)?;
        if ty.root() == TypeSpecifier::Any {
            bail!("{name} needs a concrete type");
        }
        Ok(Self {
            name: name.trim().to_string(),
            ty,
        })
    }
}

/// Positional arguments name files when they exist and are script text
/// otherwise.
fn script_sources(inputs: &[String]) -> Vec<ScriptSource> {
    inputs
        .iter()
        .filter_map(|input| {
            let source = ScriptSource::guess(input);
            match &source {
                Some(ScriptSource::Text(_)) => {
                    debug!("{input:?} is not a file, running it as script text")
                }
                Some(ScriptSource::File(_)) => {}
                None => debug!("skipping blank script argument"),
            }
            source
        })
        .collect()
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut options = match &args.config {
        Some(path) => SyncOptions::load(path)
            .with_context(|| format!("failed to read options from {}", path.display()))?,
        None => SyncOptions::default(),
    };
    if let Some(path) = &args.debug_file {
        options = options.with_debug_file(path);
    }
    let debug = options.debug;

    let mut session = SyncSession::new().options(options);
    for source in script_sources(&args.scripts) {
        session = session.script(source);
    }
    for text in args.eval {
        session = session.script(ScriptSource::Text(text));
    }
    for set in args.set {
        session = session.expose(set.name, set.value);
    }
    for read in args.read {
        session = session.read(read.name, read.ty);
    }

    let host = ScriptHost::new();
    let guard = session.run(&host).context("synchronization failed")?;
    let run_tag = guard.run_tag().clone();

    let output = host.take_output();
    if !output.is_empty() {
        println!("{output}");
    }

    let mut variables = serde_json::Map::new();
    for (name, value) in guard.iter() {
        variables.insert(name.to_string(), value.to_json()?);
    }
    let missing: Vec<String> = guard.missing().into_iter().map(str::to_string).collect();
    let report = guard.release();
    report
        .into_result()
        .with_context(|| format!("cleanup after {run_tag} was incomplete"))?;

    if debug {
        info!("script was written, not executed; all variables are missing");
    }
    let summary = serde_json::json!({
        "variables": variables,
        "missing": missing,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        process::exit(1);
    }
}
