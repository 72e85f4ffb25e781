//! Test recorder CLI

use std::path::Path;
use std::process;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use test_recorder::cassette::{Cassette, RecordMode};
use test_recorder::recording::{Recorder, RequestBody};
use test_recorder::settings::{Settings, HOME_ENV};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    if let Err(e) = run(&args[1], &args[2..]) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("test-recorder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: test-recorder <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  recording-name [NAME]    Show or set the recording name");
    eprintln!("  cassettes-path [PATH]    Show or set the cassettes directory");
    eprintln!("  show <RECORDING>         Show a recorded incoming request");
    eprintln!();
    eprintln!("Settings are stored under ${HOME_ENV} (default: ./.test_recorder).");
}

fn run(command: &str, args: &[String]) -> anyhow::Result<()> {
    let settings = Settings::from_env();

    match (command, args) {
        ("recording-name", []) => println!("{}", settings.recording_name()?),
        ("recording-name", [name]) => {
            settings
                .set_recording_name(name)
                .context("failed to store recording name")?;
            println!("Recording name set to '{name}'");
        }
        ("cassettes-path", []) => println!("{}", settings.cassettes_path()?.display()),
        ("cassettes-path", [path]) => {
            settings
                .set_cassettes_path(path)
                .context("failed to store cassettes path")?;
            println!("Cassettes path set to {path}");
        }
        ("show", [recording]) => show(&settings.cassettes_path()?, recording)?,
        _ => {
            print_usage();
            bail!("unknown command or wrong arguments: {command}");
        }
    }

    Ok(())
}

fn show(cassettes_path: &Path, recording: &str) -> anyhow::Result<()> {
    let recorder = Recorder::new(recording, cassettes_path, RecordMode::None);

    let request = recorder
        .load_incoming_interaction()
        .with_context(|| format!("cannot load incoming recording '{recording}'"))?;
    println!("{} {}", request.method, request.uri);
    for (name, value) in &request.headers {
        println!("  {name}: {value}");
    }

    match recorder.load_incoming_request_body()? {
        RequestBody::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        RequestBody::Raw(body) if body.is_empty() => {}
        RequestBody::Raw(body) => println!("{}", String::from_utf8_lossy(&body)),
    }

    let outgoing = Cassette::load(recorder.outgoing_cassette_path(), RecordMode::None)?;
    println!();
    println!("{} outgoing interactions", outgoing.len());
    for request in outgoing.requests() {
        println!("  {} {}", request.method, request.uri);
    }

    Ok(())
}
