use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use gateway::{
    FileSessionGateway, GatewayConfigError, HttpGatewayConfig, HttpSessionGateway,
    SessionGateway,
};
use services::playback::PlaybackSnapshot;
use services::{Clock, PlaybackConfig, PlaybackHandle, PlaybackRunner, PlaybackStatus};
use sim_core::model::{HotspotWidget, SequenceItem, SimulationId, Speaker};
use sim_core::policy::{Interaction, InteractionKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSimulationId { raw: String },
    NoSource,
    Gateway(GatewayConfigError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSimulationId { raw } => {
                write!(f, "invalid --simulation value: {raw}")
            }
            ArgsError::NoSource => write!(f, "either --scenario or --gateway is required"),
            ArgsError::Gateway(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- play [--scenario <path> | --gateway <url>] [--simulation <id>]");
    eprintln!();
    eprintln!("Defaults for play:");
    eprintln!("  --simulation 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  SIM_SCENARIO, SIM_GATEWAY_URL, SIM_API_KEY, SIM_SIMULATION_ID, RUST_LOG");
}

fn print_commands() {
    println!("commands: click | toggle | select <option> | submit <text> | pause | end | restart | quit");
}

enum Source {
    Scenario(PathBuf),
    Remote(HttpGatewayConfig),
}

struct Args {
    source: Source,
    simulation_id: SimulationId,
}

impl Args {
    fn parse_play(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut scenario = std::env::var("SIM_SCENARIO")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let mut gateway_url: Option<String> = None;
        let mut simulation_id = std::env::var("SIM_SIMULATION_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| SimulationId::new(1), SimulationId::new);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scenario" => {
                    scenario = Some(PathBuf::from(require_value(args, "--scenario")?));
                    gateway_url = None;
                }
                "--gateway" => {
                    gateway_url = Some(require_value(args, "--gateway")?);
                    scenario = None;
                }
                "--simulation" => {
                    let value = require_value(args, "--simulation")?;
                    let parsed: SimulationId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSimulationId { raw: value.clone() })?;
                    simulation_id = parsed;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let source = match (scenario, gateway_url) {
            (_, Some(url)) => Source::Remote(
                HttpGatewayConfig::new(&url, std::env::var("SIM_API_KEY").ok())
                    .map_err(ArgsError::Gateway)?,
            ),
            (Some(path), None) => Source::Scenario(path),
            (None, None) => Source::Remote(
                HttpGatewayConfig::from_env()
                    .map_err(ArgsError::Gateway)?
                    .ok_or(ArgsError::NoSource)?,
            ),
        };

        Ok(Self {
            source,
            simulation_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Click,
    Toggle,
    Select(String),
    Submit(String),
    Pause,
    End,
    Restart,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match word {
        "click" => Ok(Input::Click),
        "toggle" => Ok(Input::Toggle),
        "select" if !rest.is_empty() => Ok(Input::Select(rest.to_string())),
        "select" => Err("select needs an option".into()),
        "submit" => Ok(Input::Submit(rest.to_string())),
        "pause" | "resume" => Ok(Input::Pause),
        "end" => Ok(Input::End),
        "restart" => Ok(Input::Restart),
        "help" | "?" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        other => Err(format!("unknown command: {other}")),
    }
}

async fn dispatch(handle: &PlaybackHandle, input: Input) -> Result<(), Box<dyn std::error::Error>> {
    let item = handle.snapshot().state.position;
    let interact = |kind| handle.interact(Interaction::new(item, kind));
    match input {
        Input::Click => interact(InteractionKind::Click).await?,
        Input::Toggle => interact(InteractionKind::Toggle).await?,
        Input::Select(option) => interact(InteractionKind::Select(option)).await?,
        Input::Submit(text) => interact(InteractionKind::Submit(text)).await?,
        Input::Pause => handle.toggle_pause().await?,
        Input::End => handle.end().await?,
        Input::Restart => {
            handle.restart().await?;
            handle.start().await?;
        }
        Input::Help => print_commands(),
        Input::Quit => {}
    }
    Ok(())
}

fn describe_item(item: &SequenceItem) -> String {
    match item {
        SequenceItem::Message(message) => match message.speaker {
            Speaker::Customer => format!("customer: \"{}\"", message.text),
            Speaker::Trainee => format!("your turn (hint: \"{}\")", message.text),
        },
        SequenceItem::Hotspot(hotspot) => match &hotspot.widget {
            HotspotWidget::Dropdown { options, .. } => {
                format!("dropdown [{}]", options.join(" | "))
            }
            HotspotWidget::TextField { placeholder, .. } => {
                format!("text field ({})", placeholder.as_deref().unwrap_or("type a reply"))
            }
            widget => match widget.label() {
                Some(label) => format!("{:?}: {label}", widget.kind()),
                None => format!("{:?}", widget.kind()),
            },
        },
    }
}

fn describe(snapshot: &PlaybackSnapshot) -> String {
    let state = &snapshot.state;
    match state.status {
        PlaybackStatus::Playing | PlaybackStatus::Paused => {
            let progress = snapshot.progress;
            let item = if state.end_of_content {
                "end of content, type `end` to finish".to_string()
            } else {
                snapshot
                    .current_item
                    .as_ref()
                    .map_or_else(String::new, describe_item)
            };
            format!(
                "[{}] {} ({}/{}) {}s  {item}",
                state.status, state.position, progress.reached, progress.total, state.elapsed_seconds
            )
        }
        PlaybackStatus::Errored => format!(
            "[errored] {}",
            state
                .failure
                .as_ref()
                .map_or("unknown failure", |f| f.message.as_str())
        ),
        status => format!("[{status}]"),
    }
}

fn print_result(snapshot: &PlaybackSnapshot) {
    let Some(result) = &snapshot.result else {
        return;
    };
    for (metric, score) in result.scores() {
        println!("  {metric}: {score:.1}");
    }
    println!("  duration: {}s", result.duration_seconds());
    println!("  {}", if result.passed() { "PASS" } else { "FAIL" });
}

async fn print_snapshots(mut snapshots: watch::Receiver<PlaybackSnapshot>) {
    let mut last = None;
    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        let state = &snapshot.state;
        // Tick-only updates are not worth a line.
        let key = (state.status, state.position, state.end_of_content, state.pending_interaction.clone());
        if last.as_ref() == Some(&key) {
            continue;
        }
        last = Some(key);
        println!("{}", describe(&snapshot));
        if state.status == PlaybackStatus::Completed {
            print_result(&snapshot);
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let subcommand = argv.first().cloned();
    match subcommand.as_deref() {
        None => {}
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some("play") => {
            argv.remove(0);
        }
        Some(first) if first.starts_with("--") => {}
        Some(first) => {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "unknown subcommand",
            )
            .into());
        }
    }

    let mut iter = argv.into_iter();
    let args = Args::parse_play(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let gateway: Arc<dyn SessionGateway> = match args.source {
        Source::Scenario(path) => {
            tracing::info!(path = %path.display(), "playing scenario file");
            Arc::new(FileSessionGateway::new(path))
        }
        Source::Remote(config) => {
            tracing::info!(url = %config.base_url, "playing against remote gateway");
            Arc::new(HttpSessionGateway::new(config))
        }
    };

    let (runner, handle) = PlaybackRunner::new(
        args.simulation_id,
        gateway,
        &Clock::default_clock(),
        PlaybackConfig::default(),
    );
    let task = runner.spawn();
    let printer = tokio::spawn(print_snapshots(handle.snapshots()));

    print_commands();
    handle.start().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Ok(Input::Quit) => break,
            Ok(input) => dispatch(&handle, input).await?,
            Err(message) => eprintln!("{message}"),
        }
    }

    handle.shutdown().await?;
    task.await?;
    printer.abort();
    Ok(())
}

fn init_tracing() {
    // stdout belongs to the player.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(parse_input("click"), Ok(Input::Click));
        assert_eq!(
            parse_input("select  Refund policy "),
            Ok(Input::Select("Refund policy".into()))
        );
        assert_eq!(
            parse_input("submit Hello there"),
            Ok(Input::Submit("Hello there".into()))
        );
        assert_eq!(parse_input("submit"), Ok(Input::Submit(String::new())));
        assert!(parse_input("select").is_err());
        assert!(parse_input("dance").is_err());
    }

    #[test]
    fn simulation_flag_overrides_default() {
        let mut args = ["--scenario", "demo.json", "--simulation", "42"]
            .into_iter()
            .map(String::from);
        let parsed = Args::parse_play(&mut args).unwrap();
        assert_eq!(parsed.simulation_id, SimulationId::new(42));
        assert!(matches!(parsed.source, Source::Scenario(path) if path == PathBuf::from("demo.json")));
    }

    #[test]
    fn bad_simulation_id_is_rejected() {
        let mut args = ["--scenario", "demo.json", "--simulation", "abc"]
            .into_iter()
            .map(String::from);
        assert!(matches!(
            Args::parse_play(&mut args),
            Err(ArgsError::InvalidSimulationId { .. })
        ));
    }
}
