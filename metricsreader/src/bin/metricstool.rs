use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use metricsreader::{
    FailurePolicy, GraphiteReader, Pnp4NagiosReader, Targets,
    config::{self, Backend, Config},
    frame::Frame,
    graphite::{Expansion, Format, RenderOptions},
    pnp4nagios::XportOptions,
};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("Command {command} needs a {needed} backend, configuration names {configured}")]
    WrongBackend {
        command: &'static str,
        needed: &'static str,
        configured: &'static str,
    },
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Reader(#[from] metricsreader::Error),
    #[error(transparent)]
    Frame(#[from] metricsreader::frame::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[clap(version, about = "Read Graphite and PNP4Nagios metrics as CSV", long_about = None)]
struct Cli {
    /// Path to the YAML configuration naming the backend
    #[clap(long)]
    config: PathBuf,

    /// Drop a failing target instead of aborting
    #[clap(long)]
    skip_failed: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read Graphite targets through the render API
    Render(RenderArgs),
    /// Walk the Graphite metric tree, one line per node
    Walk(WalkArgs),
    /// List the Graphite nodes matching a query
    Find(FindArgs),
    /// Expand a Graphite query into metric paths
    Expand(ExpandArgs),
    /// List every metric of the Graphite host
    Index,
    /// Read a PNP4Nagios service of one or more hosts
    Xport(XportArgs),
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Targets to read
    #[clap(required = true)]
    targets: Vec<String>,
    /// Start of the time range
    #[clap(long)]
    from: Option<String>,
    /// End of the time range
    #[clap(long)]
    until: Option<String>,
    /// Request CSV instead of JSON from the host
    #[clap(long)]
    csv: bool,
    /// Keep the flat series names
    #[clap(long)]
    flat: bool,
    /// Keep label components shared by every series
    #[clap(long)]
    keep_redundant: bool,
}

#[derive(Args, Debug)]
struct WalkArgs {
    /// Path to start below, the root if absent
    top: Option<String>,
    /// Start of the time range
    #[clap(long)]
    from: Option<String>,
    /// End of the time range
    #[clap(long)]
    until: Option<String>,
}

#[derive(Args, Debug)]
struct FindArgs {
    /// Query to match
    query: String,
    /// Start of the time range
    #[clap(long)]
    from: Option<String>,
    /// End of the time range
    #[clap(long)]
    until: Option<String>,
}

#[derive(Args, Debug)]
struct ExpandArgs {
    /// Query to expand
    query: String,
    /// Group the paths by the expression that matched them
    #[clap(long)]
    group_by_expr: bool,
    /// Only return paths that hold data
    #[clap(long)]
    leaves_only: bool,
}

#[derive(Args, Debug)]
struct XportArgs {
    /// Service to read
    service: String,
    /// Hosts to read the service of
    #[clap(required = true)]
    hosts: Vec<String>,
    /// Start of the time range
    #[clap(long)]
    start: Option<String>,
    /// End of the time range
    #[clap(long)]
    end: Option<String>,
    /// Time range preset from the PNP4Nagios configuration
    #[clap(long)]
    view: Option<u32>,
    /// Keep the flat series names
    #[clap(long)]
    flat: bool,
}

fn backend_name(backend: &Backend) -> &'static str {
    match backend {
        Backend::Graphite(_) => "graphite",
        Backend::Pnp4nagios(_) => "pnp4nagios",
    }
}

fn graphite(backend: &Backend, command: &'static str) -> Result<GraphiteReader, Error> {
    match backend {
        Backend::Graphite(client) => Ok(GraphiteReader::new(client)?),
        Backend::Pnp4nagios(_) => Err(Error::WrongBackend {
            command,
            needed: "graphite",
            configured: backend_name(backend),
        }),
    }
}

fn pnp4nagios(backend: &Backend, command: &'static str) -> Result<Pnp4NagiosReader, Error> {
    match backend {
        Backend::Pnp4nagios(client) => Ok(Pnp4NagiosReader::new(client)?),
        Backend::Graphite(_) => Err(Error::WrongBackend {
            command,
            needed: "pnp4nagios",
            configured: backend_name(backend),
        }),
    }
}

fn targets(mut names: Vec<String>) -> Targets {
    if names.len() == 1 {
        names.pop().map_or(Targets::Many(Vec::new()), Targets::Single)
    } else {
        Targets::Many(names)
    }
}

fn failure_policy(skip_failed: bool) -> FailurePolicy {
    if skip_failed {
        FailurePolicy::Skip
    } else {
        FailurePolicy::Abort
    }
}

fn write_frame(frame: &Frame) -> Result<(), Error> {
    debug!(rows = frame.len(), columns = frame.width(), "writing frame");
    frame.write_csv(io::stdout().lock())?;
    Ok(())
}

fn run(cli: Cli) -> Result<(), Error> {
    let Config { backend } = Config::from_path(&cli.config)?;
    let on_error = failure_policy(cli.skip_failed);
    let stdout = io::stdout();

    match cli.command {
        Command::Render(args) => {
            let reader = graphite(&backend, "render")?;
            let options = RenderOptions {
                start: args.from,
                end: args.until,
                format: if args.csv { Format::Csv } else { Format::Json },
                create_multiindex: !args.flat,
                remove_redundant_indices: !args.keep_redundant,
                on_error,
            };
            let frame = reader.read(&targets(args.targets), &options)?;
            write_frame(&frame)?;
        }
        Command::Walk(args) => {
            let reader = graphite(&backend, "walk")?;
            let mut out = stdout.lock();
            for step in reader.walk(
                args.top.as_deref(),
                args.from.as_deref(),
                args.until.as_deref(),
            ) {
                let step = step?;
                writeln!(
                    out,
                    "{}\t[{}]\t[{}]",
                    step.path,
                    step.nodes.join(", "),
                    step.leaves.join(", ")
                )?;
            }
        }
        Command::Find(args) => {
            let reader = graphite(&backend, "find")?;
            let nodes = reader.metrics().find(
                &args.query,
                args.from.as_deref(),
                args.until.as_deref(),
            )?;
            let mut writer = csv::Writer::from_writer(stdout.lock());
            writer.write_record(["id", "leaf", "allow_children"])?;
            for node in nodes {
                writer.write_record([
                    node.id,
                    node.leaf.to_string(),
                    node.allow_children.to_string(),
                ])?;
            }
            writer.flush()?;
        }
        Command::Expand(args) => {
            let reader = graphite(&backend, "expand")?;
            let expansion = reader.metrics().expand(
                &args.query,
                args.group_by_expr,
                args.leaves_only,
            )?;
            let mut out = stdout.lock();
            match expansion {
                Expansion::Paths(paths) => {
                    for path in paths {
                        writeln!(out, "{path}")?;
                    }
                }
                Expansion::Grouped(groups) => {
                    for (expr, paths) in groups {
                        for path in paths {
                            writeln!(out, "{expr}\t{path}")?;
                        }
                    }
                }
            }
        }
        Command::Index => {
            let reader = graphite(&backend, "index")?;
            let mut out = stdout.lock();
            for metric in reader.metrics().index()? {
                writeln!(out, "{metric}")?;
            }
        }
        Command::Xport(args) => {
            let reader = pnp4nagios(&backend, "xport")?;
            let options = XportOptions {
                start: args.start,
                end: args.end,
                view: args.view,
                create_multiindex: !args.flat,
                on_error,
            };
            let frame = reader.read(&targets(args.hosts), &args.service, &options)?;
            write_frame(&frame)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .finish()
        .init();

    let cli = Cli::parse();
    info!("Starting metricstool {}", env!("CARGO_PKG_VERSION"));

    run(cli).inspect_err(|err| error!("metricstool failed: {err}"))
}
