use netsdr_frame::{encode_control_item, encode_data_item};

use crate::cmd::{parse_hex, EncodeCommand};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(command: EncodeCommand, format: OutputFormat) -> CliResult<i32> {
    let frame = match command {
        EncodeCommand::Control(args) => {
            let params = parse_hex(&args.params)?;
            encode_control_item(args.message_type.into(), args.code.into(), &params)
        }
        EncodeCommand::Data(args) => {
            let body = parse_hex(&args.body)?;
            encode_data_item(args.message_type.into(), args.sequence, &body)
        }
    }
    .map_err(|err| frame_error("encode failed", err))?;

    print_encoded(&frame, format);
    Ok(SUCCESS)
}
