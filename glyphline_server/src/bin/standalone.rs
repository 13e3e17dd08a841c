use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glyphline::{ChannelConfig, RecognitionPipeline};
use glyphline_server::{serve, AppState, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "glyphline_server", about = "Draw a digit, get a label from the inference engine")]
struct Cli {
    /// Inference engine executable (launched without arguments).
    #[arg(long, env = "GLYPHLINE_ENGINE", default_value = glyphline::config::DEFAULT_ENGINE_PROGRAM)]
    engine: PathBuf,

    /// Address the HTTP server binds to.
    #[arg(long, env = "GLYPHLINE_BIND", default_value = "0.0.0.0:5000")]
    bind: String,

    /// Wait after launch before checking the engine is alive.
    #[arg(long, env = "GLYPHLINE_STARTUP_GRACE_MS", default_value_t = 1000)]
    startup_grace_ms: u64,

    /// Per-request deadline; the engine is killed when it expires. 0 disables it.
    #[arg(long, env = "GLYPHLINE_REQUEST_TIMEOUT_MS", default_value_t = 0)]
    request_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let channel_cfg = ChannelConfig {
        startup_grace: Duration::from_millis(cli.startup_grace_ms),
        request_timeout: (cli.request_timeout_ms > 0).then(|| Duration::from_millis(cli.request_timeout_ms)),
        ..ChannelConfig::new(cli.engine)
    };
    let server_cfg = ServerConfig { bind_addr: cli.bind };

    // A failed startup ends the process; restarting is the operator's call.
    let pipeline = Arc::new(RecognitionPipeline::launch(channel_cfg).await?);
    let state = AppState {
        pipeline: pipeline.clone(),
    };

    serve(&server_cfg, state, async {
        let _ = tokio::signal::ctrl_c().await;
        log::info!("shutting down");
    })
    .await?;

    match Arc::try_unwrap(pipeline) {
        Ok(pipeline) => pipeline.shutdown().await?,
        Err(_) => log::warn!("requests still in flight; engine is killed on exit"),
    }
    Ok(())
}
