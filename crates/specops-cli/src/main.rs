//! `specops` command-line harness
//!
//! Loads a specification, then either lists it, prints synthesized requests
//! as JSON lines, or replays recorded traffic and prints the drift report.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use specops_core::{AssessmentSession, SessionConfig};
use specops_model::{ObservedRequest, Specification, SynthesisStrategy};
use specops_normalizer::FormatHint;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("specops")
        .version(specops_core::VERSION)
        .about("Reconcile a REST API specification with observed traffic")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Session configuration (TOML)"),
        )
        .subcommand(
            Command::new("inspect")
                .about("List path templates and operations")
                .arg(spec_arg()),
        )
        .subcommand(
            Command::new("synthesize")
                .about("Print synthesized requests as JSON lines")
                .arg(spec_arg())
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .default_value("valid")
                        .value_parser(value_parser!(SynthesisStrategy))
                        .help("valid, boundary or malformed"),
                )
                .arg(
                    Arg::new("operation")
                        .long("operation")
                        .help("Only this operationId"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Seed for malformed case selection"),
                )
                .arg(
                    Arg::new("cap")
                        .long("cap")
                        .value_parser(value_parser!(usize))
                        .help("Maximum malformed requests per operation"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Feed recorded traffic through a session and print the drift report")
                .arg(spec_arg())
                .arg(
                    Arg::new("traffic")
                        .long("traffic")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("One JSON request record per line"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn spec_arg() -> Arg {
    Arg::new("spec")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("OpenAPI 3.x or Swagger 2.0 document (JSON or YAML)")
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(&cli().get_matches()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SessionConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    match matches.subcommand() {
        Some(("inspect", args)) => {
            let session = open_session(args, config)?;
            print!("{}", describe(session.specification()));
            Ok(ExitCode::SUCCESS)
        }
        Some(("synthesize", args)) => synthesize(args, config),
        Some(("replay", args)) => replay(args, config),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn open_session(args: &ArgMatches, config: SessionConfig) -> Result<AssessmentSession> {
    let path = args.get_one::<PathBuf>("spec").context("missing specification path")?;
    let document = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(FormatHint::Auto, FormatHint::from_extension);
    AssessmentSession::from_document(&document, hint, config)
        .with_context(|| format!("loading specification {}", path.display()))
}

fn describe(spec: &Specification) -> String {
    let mut out = format!(
        "{} {} ({}, {} operations)\n",
        spec.info.title,
        spec.info.version,
        spec.version,
        spec.operation_count()
    );
    for server in &spec.servers {
        out.push_str(&format!("server {}\n", server.resolved_url()));
    }
    for template in &spec.templates {
        out.push_str(&format!("{}\n", template.path));
        for op in &template.operations {
            out.push_str(&format!("  {:<7} {}\n", op.method.as_str(), op.operation_id));
        }
    }
    out
}

fn synthesize(args: &ArgMatches, mut config: SessionConfig) -> Result<ExitCode> {
    if let Some(seed) = args.get_one::<u64>("seed") {
        config.synthesis.seed = *seed;
    }
    if let Some(cap) = args.get_one::<usize>("cap") {
        config.synthesis.malformed_cap = *cap;
    }
    let strategy = args
        .get_one::<SynthesisStrategy>("strategy")
        .copied()
        .unwrap_or(SynthesisStrategy::Valid);
    let session = open_session(args, config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if let Some(operation_id) = args.get_one::<String>("operation") {
        for request in session.synthesize_named(operation_id, strategy)? {
            writeln!(out, "{}", serde_json::to_string(&request)?)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let batch = session.synthesize_all(strategy);
    for request in &batch.requests {
        writeln!(out, "{}", serde_json::to_string(request)?)?;
    }
    for failure in &batch.failures {
        tracing::warn!("Skipped {}: {}", failure.operation_id, failure.error);
    }
    Ok(if batch.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn replay(args: &ArgMatches, config: SessionConfig) -> Result<ExitCode> {
    let session = open_session(args, config)?;
    let path = args.get_one::<PathBuf>("traffic").context("missing traffic path")?;
    let requests = read_traffic(path)?;
    let matched = session.observe_all(&requests)?;
    tracing::info!("Replayed {} requests, {} matched", requests.len(), matched);

    let report = session.drift_report();
    if args.get_flag("json") {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(ExitCode::SUCCESS)
}

/// Read JSON-lines traffic, skipping blank lines
fn read_traffic(path: &Path) -> Result<Vec<ObservedRequest>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut requests = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let request = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid request record", path.display(), index + 1))?;
        requests.push(request);
    }
    Ok(requests)
}
