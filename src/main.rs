use clap::{Parser, Subcommand};
use serialdev_harness::config::{Config, ConfigLoader};
use serialdev_harness::logging::init_logging;
use serialdev_harness::scenarios::RS485_EXPECTED;
use serialdev_harness::{
    create_backend, BackendKind, BuiltinScenario, DeviceEnumerator, HarnessResult, HarnessRunner,
    PipePair, ScenarioReport, Status,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

/// Exit status automake-style test drivers read as "skipped".
const EXIT_SKIPPED: u8 = 77;

#[derive(Parser, Debug)]
#[command(
    name = "serialdev-harness",
    version,
    about = "Conformance checks for a pair of linked serial devices.",
    long_about = "Opens two serialdev endpoints wired to each other, verifies byte-exact data transfer and RS-485 configuration, and always closes both endpoints. Exits 0 on success, 1 on failure and 77 when the test environment is unavailable."
)]
struct Args {
    /// Configuration file, instead of the standard search path.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device backend: serialsim or loopback.
    #[arg(short, long, global = true)]
    backend: Option<BackendKind>,

    /// Linked device pair, as <dev-a>:<dev-b>.
    #[arg(long, global = true, value_name = "A:B")]
    pipe_devs: Option<PipePair>,

    /// Transfer timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Require the simulation backend for every scenario.
    #[arg(long, global = true)]
    require_simulation: bool,

    /// Print one JSON report per scenario instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in scenarios.
    List,
    /// Run built-in scenarios (all of them when none are named).
    Run { scenarios: Vec<BuiltinScenario> },
    /// Send a payload from IO1 and require it unchanged at IO2.
    Transfer {
        io1: String,
        io2: String,
        /// Data to send; defaults to the configured payload.
        #[arg(long)]
        payload: Option<String>,
        /// Also send the payload back from IO2 to IO1.
        #[arg(long)]
        both_ways: bool,
    },
    /// Require the RS-485 state IO1 advertises, read through IO2, to match.
    Rs485 {
        io1: String,
        io2: String,
        #[arg(long, default_value = RS485_EXPECTED)]
        expect: String,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
}

fn load_config(args: &Args) -> Result<ConfigLoader, String> {
    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path),
        None => ConfigLoader::load(),
    }
    .map_err(|e| e.to_string())?;

    let config = loader.config_mut();
    if let Some(backend) = args.backend {
        config.devices.backend = backend;
    }
    if let Some(pair) = &args.pipe_devs {
        config.devices.pipe_devs = Some(pair.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.harness.read_timeout_ms = timeout_ms;
        config.harness.poll_interval_ms = config.harness.poll_interval_ms.min(timeout_ms);
    }
    if args.require_simulation {
        config.devices.require_simulation = true;
    }
    config.validate().map_err(|e| e.to_string())?;

    Ok(loader)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let loader = match load_config(&args) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&loader.config().logging);

    match &args.command {
        Command::List => {
            for scenario in BuiltinScenario::ALL {
                let note = if scenario.requires_simulation() {
                    " (needs simulation backend)"
                } else {
                    ""
                };
                println!("{:<20} {}{}", scenario.name(), scenario.title(), note);
            }
            ExitCode::SUCCESS
        }
        Command::ShowConfig => match loader.to_toml() {
            Ok(text) => {
                if let Some(path) = loader.config_path.as_deref().map(Path::display) {
                    println!("# loaded from {path}");
                }
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        Command::Run { scenarios } => run_builtin(loader.config(), scenarios, args.json),
        Command::Transfer {
            io1,
            io2,
            payload,
            both_ways,
        } => {
            let config = loader.config();
            let runner = HarnessRunner::new(create_backend(config)).with_config(&config.harness);
            let payload = payload.as_deref().unwrap_or(&config.harness.payload);
            let name = if *both_ways { "exchange" } else { "transfer" };
            if !args.json {
                println!("Test {name}:\n  io1={io1}\n  io2={io2}");
            }

            let started = Instant::now();
            let result = if *both_ways {
                runner.exchange(io1, io2, payload.as_bytes())
            } else {
                runner.transfer(io1, io2, payload.as_bytes())
            };
            finish(&[report(name, result, started)], args.json)
        }
        Command::Rs485 { io1, io2, expect } => {
            let config = loader.config();
            let runner = HarnessRunner::new(create_backend(config)).with_config(&config.harness);
            if !args.json {
                println!("Test rs485:\n  io1={io1}\n  io2={io2}");
            }

            let started = Instant::now();
            let result = runner.rs485(io1, io2, expect);
            finish(&[report("rs485", result, started)], args.json)
        }
    }
}

fn run_builtin(config: &Config, selected: &[BuiltinScenario], json: bool) -> ExitCode {
    let backend = create_backend(config);
    let enumerator = DeviceEnumerator::new(backend.clone())
        .with_pipe_pair(config.devices.pipe_devs.clone());
    let runner = HarnessRunner::new(backend).with_config(&config.harness);

    let selected = if selected.is_empty() {
        BuiltinScenario::ALL.to_vec()
    } else {
        selected.to_vec()
    };

    let mut reports = Vec::with_capacity(selected.len());
    for scenario in selected {
        if !json {
            println!("Test {}", scenario.title());
        }

        let started = Instant::now();
        let built = scenario.build(
            &enumerator,
            config.devices.require_simulation,
            config.harness.payload.as_bytes(),
        );
        let outcome = match built {
            Ok(prepared) => {
                if !json {
                    println!(
                        "{}:\n  io1={}\n  io2={}",
                        prepared.name, prepared.io1, prepared.io2
                    );
                }
                runner.run_reported(&prepared)
            }
            Err(e) => report(scenario.name(), Err(e), started),
        };

        print_report(&outcome, json);
        reports.push(outcome);
    }

    exit_code(&reports)
}

fn report(name: &str, result: HarnessResult<()>, started: Instant) -> ScenarioReport {
    ScenarioReport::from_result(name, &result, started.elapsed())
}

fn finish(reports: &[ScenarioReport], json: bool) -> ExitCode {
    for outcome in reports {
        print_report(outcome, json);
    }
    exit_code(reports)
}

fn print_report(outcome: &ScenarioReport, json: bool) {
    if json {
        match serde_json::to_string(outcome) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("Failed to encode report: {e}"),
        }
        return;
    }

    let message = outcome.message.as_deref().unwrap_or_default();
    match outcome.status {
        Status::Passed => println!("  Success!"),
        Status::Skipped => println!("  Skipped: {message}"),
        Status::Failed => eprintln!("  Failed: {message}"),
    }
}

fn exit_code(reports: &[ScenarioReport]) -> ExitCode {
    if reports.iter().any(|r| r.status == Status::Failed) {
        ExitCode::FAILURE
    } else if !reports.is_empty() && reports.iter().all(|r| r.status == Status::Skipped) {
        ExitCode::from(EXIT_SKIPPED)
    } else {
        ExitCode::SUCCESS
    }
}
