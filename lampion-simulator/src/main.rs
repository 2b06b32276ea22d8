//! Lampion simulator CLI.
//!
//! Serves the Lambda Runtime API locally so a runtime client can be run
//! against it during development. Payloads passed with `--event` are
//! enqueued at startup and their outcomes printed as they resolve.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lampion_simulator::{InvocationBuilder, InvocationOutcome, Simulator};

#[derive(Parser, Debug)]
#[command(name = "lampion-simulator")]
#[command(about = "Local AWS Lambda Runtime API simulator", long_about = None)]
struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value = "9001", env = "LAMPION_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "LAMPION_HOST")]
    host: String,

    /// JSON payload to enqueue as one invocation; repeatable
    #[arg(short, long = "event")]
    event: Vec<String>,

    /// Invocation deadline in milliseconds
    #[arg(long, default_value = "30000", env = "LAMPION_DEADLINE_MS")]
    deadline_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LAMPION_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lampion_simulator={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let simulator = Simulator::bind(&args.host, args.port).await?;
    info!("Runtime API listening on {}", simulator.url());
    info!(
        "Set AWS_LAMBDA_RUNTIME_API={} for the runtime under test",
        simulator.endpoint()
    );

    let mut request_ids = Vec::new();
    for event in &args.event {
        let request_id = simulator
            .enqueue(
                InvocationBuilder::new(event.clone())
                    .deadline(Duration::from_millis(args.deadline_ms)),
            )
            .await?;
        info!(request_id = %request_id, "Enqueued invocation");
        request_ids.push(request_id);
    }

    if request_ids.is_empty() {
        info!("No events to enqueue; serving until interrupted");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let wait = Duration::from_millis(args.deadline_ms) + Duration::from_secs(1);
    for request_id in request_ids {
        match simulator.wait_for_outcome(&request_id, wait).await {
            Ok(InvocationOutcome::Response { payload }) => {
                info!(
                    request_id = %request_id,
                    response = %String::from_utf8_lossy(&payload),
                    "Invocation succeeded"
                );
            }
            Ok(InvocationOutcome::Error {
                error_type,
                payload,
            }) => {
                error!(
                    request_id = %request_id,
                    error_type = %error_type,
                    body = %String::from_utf8_lossy(&payload),
                    "Invocation failed"
                );
            }
            Err(err) => {
                error!(request_id = %request_id, %err, "No outcome recorded");
            }
        }
    }

    Ok(())
}
