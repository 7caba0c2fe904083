//! `imagen` -- submit a text prompt to the GPU cluster and wait for the image.
//!
//! Writes the prompt and a Grid Engine script, submits it with `qsub`, and
//! polls for `<images_dir>/<id>.png`. Prints the image path on success.
//! Dispatch settings come from `IMAGEN_*` environment variables (see
//! `ImagenConfig::from_env`); a `.env` file is honoured.
//!
//! | Flag     | Effect                                                  |
//! |----------|---------------------------------------------------------|
//! | `--test` | Write all job files but never contact the scheduler     |
//! | `--json` | Print a JSON report instead of the bare image path      |

mod render;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagen_dispatch::config::ImagenConfig;
use imagen_dispatch::gate::GenerationGate;
use imagen_dispatch::generation::ImageGeneration;

#[derive(Parser, Debug)]
#[command(name = "imagen", version)]
#[command(about = "Generate an image from a text prompt on the GPU cluster", long_about = None)]
struct Cli {
    /// Enabling test mode deactivates the qsub command
    #[arg(long, action)]
    test: bool,

    /// Print a JSON report instead of the image path
    #[arg(long, action)]
    json: bool,

    /// Prompt text; read from stdin when omitted
    prompt: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagen=info,imagen_dispatch=info,imagen_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ImagenConfig::from_env().context("Invalid IMAGEN_* configuration")?;
    let gate = GenerationGate::new(!cli.test);
    tracing::info!(
        generation_enabled = gate.is_enabled(),
        submit_command = %config.submit_command,
        time_step_secs = config.poll.time_step.as_secs(),
        timeout_steps = config.poll.timeout_steps,
        "Loaded dispatch configuration",
    );

    let prompt = read_prompt(&cli.prompt).await?;

    // Ctrl-C stops polling; the cluster job keeps running.
    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping");
            ctrl_c_cancel.cancel();
        }
    });

    let mut generation = ImageGeneration::from_prompt(&prompt, &config)
        .await
        .context("Failed to prepare generation request")?;
    let timeout = generation.timeout();

    tracing::info!(query_id = %generation.handle().query_id, "Starting generating the image");
    if generation.submit(&config.submitter(), &gate).await {
        generation
            .wait(&cancel, |elapsed| {
                tracing::info!("{}", render::progress_line(elapsed, timeout));
            })
            .await;
    }

    let report = generation.report();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match &report.output_path {
            Some(path) => println!("{}", path.display()),
            None => eprintln!("{}", render::failure_line(report.state)),
        }
    }

    Ok(if report.output_path.is_some() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Join the positional words, or read all of stdin when there are none.
async fn read_prompt(words: &[String]) -> anyhow::Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read prompt from stdin")?;
    Ok(text)
}
