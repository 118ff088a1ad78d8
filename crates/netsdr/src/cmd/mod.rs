use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use netsdr_frame::{ControlItemCode, MessageType};
use netsdr_session::SessionConfig;
use netsdr_transport::DEFAULT_CONTROL_PORT;

use crate::exit::{io_error, session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod frequency;
pub mod record;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode one frame given as hex.
    Decode(DecodeArgs),
    /// Encode a control item or data item and print it as hex.
    #[command(subcommand)]
    Encode(EncodeCommand),
    /// Connect to a receiver and set its frequency.
    Frequency(FrequencyArgs),
    /// Connect to a receiver, start I/Q and write samples to a file.
    Record(RecordArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(command) => encode::run(command, format),
        Command::Frequency(args) => frequency::run(args, format, config),
        Command::Record(args) => record::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex (spaces, colons and a 0x prefix are ignored).
    pub hex: String,
    /// Also split a data item body into samples of this bit depth.
    #[arg(long, value_name = "BITS")]
    pub bit_depth: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Encode a control item.
    Control(EncodeControlArgs),
    /// Encode a data item.
    Data(EncodeDataArgs),
}

#[derive(Args, Debug)]
pub struct EncodeControlArgs {
    /// Message type.
    #[arg(long = "type", value_name = "TYPE", default_value = "set")]
    pub message_type: ControlTypeArg,
    /// Control item code.
    #[arg(long)]
    pub code: CodeArg,
    /// Parameter bytes as hex.
    #[arg(long, default_value = "")]
    pub params: String,
}

#[derive(Args, Debug)]
pub struct EncodeDataArgs {
    /// Data item type.
    #[arg(long = "type", value_name = "TYPE", default_value = "data0")]
    pub message_type: DataTypeArg,
    /// Sequence number.
    #[arg(long, default_value = "1")]
    pub sequence: u16,
    /// Body bytes as hex.
    #[arg(long, default_value = "")]
    pub body: String,
}

#[derive(Args, Debug)]
pub struct FrequencyArgs {
    /// Receiver host, optionally with `:port` (default port 50000).
    pub host: String,
    /// Frequency in Hz.
    #[arg(long, allow_negative_numbers = true)]
    pub hz: i64,
    /// Receiver channel.
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u8,
    /// Maximum time to wait for each reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Receiver host, optionally with `:port` (default port 50000).
    pub host: String,
    /// File samples are appended to.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: PathBuf,
    /// Stop after this long (e.g. 10s, 500ms). Default: until ctrl-c.
    #[arg(long)]
    pub duration: Option<String>,
    /// Bytes written per sample.
    #[arg(long, default_value = "2")]
    pub sample_width: usize,
    /// Local address for the data stream (overrides the config file).
    #[arg(long, value_name = "ADDR")]
    pub data_bind: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ControlTypeArg {
    Set,
    Get,
    Range,
    Ack,
}

impl From<ControlTypeArg> for MessageType {
    fn from(arg: ControlTypeArg) -> Self {
        match arg {
            ControlTypeArg::Set => MessageType::SetControlItem,
            ControlTypeArg::Get => MessageType::CurrentControlItem,
            ControlTypeArg::Range => MessageType::ControlItemRange,
            ControlTypeArg::Ack => MessageType::Ack,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DataTypeArg {
    Data0,
    Data1,
    Data2,
    Data3,
}

impl From<DataTypeArg> for MessageType {
    fn from(arg: DataTypeArg) -> Self {
        match arg {
            DataTypeArg::Data0 => MessageType::DataItem0,
            DataTypeArg::Data1 => MessageType::DataItem1,
            DataTypeArg::Data2 => MessageType::DataItem2,
            DataTypeArg::Data3 => MessageType::DataItem3,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum CodeArg {
    ReceiverState,
    ReceiverFrequency,
    RfFilter,
    AdModes,
    IqSampleRate,
}

impl From<CodeArg> for ControlItemCode {
    fn from(arg: CodeArg) -> Self {
        match arg {
            CodeArg::ReceiverState => ControlItemCode::ReceiverState,
            CodeArg::ReceiverFrequency => ControlItemCode::ReceiverFrequency,
            CodeArg::RfFilter => ControlItemCode::RfFilter,
            CodeArg::AdModes => ControlItemCode::AdModes,
            CodeArg::IqSampleRate => ControlItemCode::IqOutputDataSampleRate,
        }
    }
}

/// Session config from `--config`, or defaults.
pub(crate) fn load_config(path: Option<&Path>) -> CliResult<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_json_file(path).map_err(|err| {
            session_error(&format!("failed loading config {}", path.display()), err)
        }),
        None => Ok(SessionConfig::default()),
    }
}

/// `host` with the default control port appended when it has none.
///
/// A bare IPv6 literal is bracketed first, so `::1` becomes `[::1]:50000`.
pub(crate) fn control_addr(host: &str) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        return format!("[{host}]:{DEFAULT_CONTROL_PORT}");
    }
    let has_port = match host.rsplit_once(':') {
        // Bracketed IPv6 literal: `[::1]:50000` has a port, `[::1]` does not.
        Some((head, port)) => !port.is_empty() && !port.contains(']') && !head.ends_with(':'),
        None => false,
    };
    if has_port {
        host.to_string()
    } else {
        format!("{host}:{DEFAULT_CONTROL_PORT}")
    }
}

pub(crate) fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed starting runtime", err))
}

/// Hex bytes, tolerating a `0x` prefix and common separators.
pub(crate) fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let input = input.trim();
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    let digits: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '_' | '\t' | '\n'))
        .collect();

    hex::decode(digits).map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        _ => Ok(Duration::from_secs(value)),
    }
}
