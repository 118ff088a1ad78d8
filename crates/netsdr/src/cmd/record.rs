use std::path::Path;
use std::time::Duration;

use netsdr_session::{ClientSession, FileSink, SessionConfig, StatsSnapshot};
use tracing::{info, warn};

use crate::cmd::{control_addr, load_config, parse_duration, runtime, RecordArgs};
use crate::exit::{session_error, sink_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: RecordArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;
    let mut config = load_config(config)?;
    config.control_addr = control_addr(&args.host);
    if let Some(bind) = args.data_bind {
        config.data_bind_addr = bind;
    }

    let sink = FileSink::with_width(&args.output, args.sample_width).map_err(|err| {
        sink_error(&format!("failed opening {}", args.output.display()), err)
    })?;

    let stats = runtime()?.block_on(record(config, sink, duration))?;
    info!(
        samples = stats.samples,
        output = %args.output.display(),
        "recording finished"
    );
    print_stats(&stats, format);
    Ok(SUCCESS)
}

async fn record(
    config: SessionConfig,
    sink: FileSink,
    duration: Option<Duration>,
) -> CliResult<StatsSnapshot> {
    let mut session = ClientSession::from_config(config, sink)
        .map_err(|err| session_error("invalid config", err))?;
    session
        .connect()
        .await
        .map_err(|err| session_error("connect failed", err))?;
    session
        .start_iq()
        .await
        .map_err(|err| session_error("start I/Q failed", err))?;
    info!(?duration, "recording");

    let waited = wait_for_stop(duration).await;

    let stopped = session.stop_iq().await;
    if let Err(err) = session.disconnect().await {
        warn!(error = %err, "disconnect failed");
    }
    waited?;
    stopped.map_err(|err| session_error("stop I/Q failed", err))?;
    Ok(session.stats())
}

async fn wait_for_stop(duration: Option<Duration>) -> CliResult<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    let signalled = match duration {
        Some(limit) => tokio::select! {
            _ = tokio::time::sleep(limit) => Ok(()),
            result = ctrl_c => result,
        },
        None => ctrl_c.await,
    };
    signalled.map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
