use std::process::ExitCode;
use std::time::Instant;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use kafka_sandbox::config::{Properties, Resolver, Settings};
use kafka_sandbox::plugin::{KAFKA, Kafka};
use kafka_sandbox::process::{Readiness, Script};
use kafka_sandbox::{Blueprint, BuildError, Mode, Project, as_overhead};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum BrokerStop {
    /// ZooKeeper's stop script, as the task has always done.
    Zookeeper,
    /// The broker's own stop script.
    Kafka,
}

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Set a property, e.g. `-D kafka.version=2.4.0`.
    #[arg(short = 'D', value_name = "KEY=VALUE", value_parser = parse_property, global = true)]
    properties: Vec<(String, String)>,

    /// Working directory for the archive and the extracted installation.
    #[arg(long, global = true)]
    work_dir: Option<Utf8PathBuf>,

    /// Download the archive from this URL instead of the Apache mirror.
    #[arg(long, global = true)]
    download_url: Option<String>,

    /// Script used by kafkaBrokerStop.
    #[arg(long, value_enum, default_value = "zookeeper", global = true)]
    broker_stop: BrokerStop,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run tasks and everything they depend on.
    Run {
        #[arg(required = true)]
        tasks: Vec<String>,

        /// Keep running tasks that don't depend on a failed one.
        #[arg(long = "continue")]
        keep_going: bool,

        /// Print the tasks that would run, without running them.
        #[arg(long)]
        dry_run: bool,
    },
    /// List the available tasks.
    Tasks,
    /// Print the task graph as a Mermaid diagram.
    Graph,
}

fn parse_property(pair: &str) -> Result<(String, String), String> {
    Properties::parse_pair(pair).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = kafka_sandbox::init_logging() {
        eprintln!("couldn't initialize logging: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(BuildError::Failed { report, .. }) = e.downcast_ref::<BuildError>() {
                eprint!("{}", report.render_summary());
            }
            eprintln!("{} {:#}", style("FAILURE:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut blueprint = Blueprint::new();
    blueprint.apply(&KAFKA);
    let project = blueprint.finish()?;

    let (keep_going, dry_run, tasks) = match args.command {
        Command::Tasks => {
            print_tasks(&project);
            return Ok(());
        }
        Command::Graph => {
            print!("{project}");
            return Ok(());
        }
        Command::Run {
            tasks,
            keep_going,
            dry_run,
        } => (keep_going, dry_run, tasks),
    };

    let targets: Vec<&str> = tasks.iter().map(String::as_str).collect();

    if dry_run {
        for name in project.plan(&targets)? {
            println!(":{name} SKIPPED");
        }
        return Ok(());
    }

    let properties = args.properties.into_iter().collect();
    let resolver = Resolver::system(properties);

    let mut settings = Settings::resolve(&resolver)?;
    if let Some(work_dir) = args.work_dir {
        settings = settings.with_work_dir(work_dir);
    }
    if let Some(url) = args.download_url {
        settings = settings.with_download_url(url);
    }

    let broker_stop = match args.broker_stop {
        BrokerStop::Zookeeper => Script::ZOOKEEPER_STOP,
        BrokerStop::Kafka => Script::BROKER_STOP,
    };

    let kafka = Kafka::new(settings)
        .with_readiness(Readiness::resolve(&resolver)?)
        .with_broker_stop(broker_stop);

    let mode = if keep_going {
        Mode::Continue
    } else {
        Mode::FailFast
    };

    let s = Instant::now();
    let report = project.execute(&kafka, &targets, mode)?;

    eprint!("{}", report.render_summary());
    eprintln!("{} {}", style("BUILD SUCCESSFUL").green().bold(), as_overhead(s));

    Ok(())
}

fn print_tasks(project: &Project<Kafka>) {
    let mut groups: Vec<&str> = project.tasks().filter_map(|t| t.group()).collect();
    groups.sort_unstable();
    groups.dedup();

    for group in groups {
        println!("{}", style(format!("{group} tasks")).bold());
        println!("{}", "-".repeat(group.len() + 6));

        for task in project.tasks().filter(|t| t.group() == Some(group)) {
            match task.description() {
                Some(description) => println!("{} - {}", style(task.name()).cyan(), description),
                None => println!("{}", style(task.name()).cyan()),
            }
        }

        println!();
    }
}
