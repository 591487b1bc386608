use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use logsnap_core::sink::{decode_payload, DirectorySink};
use logsnap_core::{Agent, AgentConfig, LogsnapResult, SinkConfig};
use logsnap_protocol::Envelope;
use logsnap_utils::{info, init_logging, init_logging_for_agent, warn};

mod capture;

use capture::Capture;

/// Replay captured requests through the logsnap pipeline and inspect payloads.
#[derive(Parser, Debug)]
#[command(name = "logsnap")]
#[command(version)]
#[command(about = "Replay captured requests through the logsnap pipeline and inspect payloads", long_about = None)]
struct Cli
{
    /// Log to a file only, as an embedded agent does
    #[arg(long, global = true, default_value_t = false)]
    agent_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Run a recorded request through the pipeline and deliver its payloads
    Replay
    {
        /// Capture file (JSON)
        capture: PathBuf,
        /// Agent configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write payloads into this directory instead of the configured sink
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Decode a delivered payload and print it
    Inspect
    {
        /// Payload file (JSON or deflate+base64)
        payload: PathBuf,
        /// Print the decoded envelope as pretty JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main()
{
    let cli = Cli::parse();

    // Reads RUST_LOG, LOGSNAP_LOG_FORMAT and LOGSNAP_LOG_FILE
    let logging = if cli.agent_log {
        init_logging_for_agent(None).map(|(path, guard)| {
            eprintln!("Logging to {}", path.display());
            guard
        })
    } else {
        init_logging()
    };
    let guard = match logging {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let result = run_command(cli);
    // process::exit skips destructors; flush queued log lines first
    drop(guard);

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> LogsnapResult<()>
{
    match cli.command {
        Commands::Replay { capture, config, out } => replay(&capture, config.as_deref(), out),
        Commands::Inspect { payload, json } => inspect(&payload, json),
    }
}

fn replay(path: &Path, config: Option<&Path>, out: Option<PathBuf>) -> LogsnapResult<()>
{
    let mut config = AgentConfig::load(config)?;
    config.apply_env()?;

    let capture = Capture::load(path)?;
    let request = capture.request_info()?;
    let host = capture.host();
    info!(capture = %path.display(), calls = capture.calls.len(), errors = capture.errors.len(), "replaying");

    let mut agent = match out {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            config.sink = SinkConfig::Directory { path: dir.clone() };
            Agent::new(config, Arc::new(DirectorySink::new(dir)), host)
        }
        None => Agent::from_config(config, host),
    };
    print_destination(&agent.config().sink);

    agent.begin_request(request);
    let mut captured = 0;
    for call in &capture.calls {
        if agent.debug(call.to_debug_call()) {
            captured += 1;
        } else {
            warn!(file = %call.file, line = call.line, "call could not be captured");
        }
    }
    for error in &capture.errors {
        agent.report_evaluation_error(&error.breakpoint(), error.error());
    }
    let delivered = agent.end_request();

    println!("Frames captured: {captured}/{}", capture.calls.len());
    println!("Evaluation errors reported: {}", capture.errors.len());
    println!("Snapshot delivered: {}", if delivered { "yes" } else { "no" });
    Ok(())
}

fn print_destination(sink: &SinkConfig)
{
    match sink {
        SinkConfig::Directory { path } => println!("Delivering to directory: {}", path.display()),
        SinkConfig::Http { url, .. } => println!("Delivering to endpoint: {url}"),
        SinkConfig::Disabled => println!("Delivery disabled"),
    }
}

fn inspect(path: &Path, json: bool) -> LogsnapResult<()>
{
    let bytes = std::fs::read(path)?;
    let envelope = decode_payload(&bytes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    let header = envelope.header();
    println!("Event: {}", envelope.event());
    if let Some(project_id) = header.project_id {
        println!("Project: {project_id}");
    }
    if let Some(logpoint_id) = &header.logpoint_id {
        println!("Logpoint: {logpoint_id}");
    }

    match &envelope {
        Envelope::Debug { data, .. } => {
            let info = &data.snapshot_info;
            println!(
                "Request: {} {} from {} at {}",
                info.host, info.request_uri, info.client_ip, info.request_time
            );
            println!("Frames: {}", data.frames.len());
            for (i, frame) in data.frames.iter().enumerate() {
                println!("\n#{i} {}:{} ({} {})", frame.filename, frame.lineno, frame.date, frame.timestamp);
                for entry in &frame.stack {
                    println!("  at {} ({}:{})", entry.call, entry.filename, entry.lineno);
                    for line in entry.dump_readable.lines() {
                        println!("    | {line}");
                    }
                }
            }
        }
        Envelope::EvaluationError { data, .. } => {
            println!("Error: {}", data.error_message);
            if let (Some(file), Some(line)) = (&data.filename, data.lineno) {
                println!("At: {file}:{line}");
            }
        }
    }
    Ok(())
}
