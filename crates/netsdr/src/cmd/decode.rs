use netsdr_frame::{decode, extract_samples};
use tracing::warn;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = parse_hex(&args.hex)?;
    let message = decode(&frame).map_err(|err| frame_error("decode failed", err))?;
    if !message.length_matches() {
        warn!(
            declared = message.declared_length,
            actual = frame.len(),
            "header length does not match frame size"
        );
    }

    let samples = match args.bit_depth {
        Some(bit_depth) if message.message_type.is_data_item() => Some(
            extract_samples(bit_depth, &message.body)
                .map_err(|err| frame_error("sample extraction failed", err))?
                .collect::<Vec<i32>>(),
        ),
        Some(_) => {
            warn!("--bit-depth ignored for control items");
            None
        }
        None => None,
    };

    print_message(&message, &frame, samples.as_deref(), format);
    Ok(SUCCESS)
}
