use std::path::Path;

use netsdr_session::{ClientSession, DiscardSink, Response, SessionConfig};
use tracing::{info, warn};

use crate::cmd::{control_addr, load_config, parse_duration, runtime, FrequencyArgs};
use crate::exit::{session_error, CliResult, FAILURE, SUCCESS};
use crate::output::{print_message, print_undecoded, OutputFormat};

pub fn run(args: FrequencyArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut config = load_config(config)?;
    config.control_addr = control_addr(&args.host);
    config.response_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));

    let response = runtime()?.block_on(tune(config, args.hz, args.channel))?;
    Ok(report(&response, args.hz, args.channel, format))
}

async fn tune(config: SessionConfig, hz: i64, channel: u8) -> CliResult<Response> {
    let mut session = ClientSession::from_config(config, DiscardSink)
        .map_err(|err| session_error("invalid config", err))?;
    session
        .connect()
        .await
        .map_err(|err| session_error("connect failed", err))?;

    let response = session
        .change_frequency(hz, channel)
        .await
        .map_err(|err| session_error("frequency change failed", err));
    if let Err(err) = session.disconnect().await {
        warn!(error = %err, "disconnect failed");
    }
    response
}

fn report(response: &Response, hz: i64, channel: u8, format: OutputFormat) -> i32 {
    if response.is_nak() {
        warn!(hz, channel, "receiver rejected frequency");
        print_undecoded(&response.raw, format);
        return FAILURE;
    }
    match &response.message {
        Some(message) => {
            info!(hz, channel, "frequency set");
            print_message(message, &response.raw, None, format);
        }
        None => print_undecoded(&response.raw, format),
    }
    SUCCESS
}
