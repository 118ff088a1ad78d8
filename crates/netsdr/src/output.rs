use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netsdr_frame::Message;
use netsdr_session::StatsSnapshot;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    message_type: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u16>,
    declared_length: usize,
    size: usize,
    body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<&'a [i32]>,
    timestamp: String,
}

pub fn print_message(message: &Message, raw: &[u8], samples: Option<&[i32]>, format: OutputFormat) {
    let sequence = message
        .sequence
        .map(|sequence| sequence.to_string())
        .unwrap_or_else(|| "-".to_string());
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                message_type: message.message_type.name(),
                code: message.code.name(),
                sequence: message.sequence,
                declared_length: message.declared_length,
                size: raw.len(),
                body: hex::encode(&message.body),
                samples,
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CODE", "SEQUENCE", "LENGTH", "BODY"])
                .add_row(vec![
                    message.message_type.name().to_string(),
                    message.code.name().to_string(),
                    sequence,
                    message.declared_length.to_string(),
                    body_preview(message.body.as_ref()),
                ]);
            println!("{table}");
            if let Some(samples) = samples {
                println!("samples ({}): {}", samples.len(), samples_preview(samples));
            }
        }
        OutputFormat::Pretty => {
            println!(
                "type={} code={} sequence={} length={} size={} body={}",
                message.message_type,
                message.code,
                sequence,
                message.declared_length,
                raw.len(),
                body_preview(message.body.as_ref())
            );
            if let Some(samples) = samples {
                println!("samples={}", samples_preview(samples));
            }
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

#[derive(Serialize)]
struct EncodedOutput {
    size: usize,
    hex: String,
}

pub fn print_encoded(frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodedOutput {
            size: frame.len(),
            hex: hex::encode(frame),
        }),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", hex::encode(frame)),
        OutputFormat::Raw => print_raw(frame),
    }
}

/// Reply that did not decode; shown as bytes only.
pub fn print_undecoded(raw: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "decoded": false,
            "size": raw.len(),
            "hex": hex::encode(raw),
        })),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("undecoded reply ({} bytes): {}", raw.len(), hex::encode(raw));
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    let rows = [
        ("commands_sent", stats.commands_sent),
        ("control_received", stats.control_received),
        ("unsolicited", stats.unsolicited),
        ("data_frames", stats.data_frames),
        ("samples", stats.samples),
        ("decode_errors", stats.decode_errors),
        ("sequence_gaps", stats.sequence_gaps),
        ("sink_errors", stats.sink_errors),
    ];
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in rows {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let line: Vec<String> = rows
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW: usize = 32;
    if body.len() <= PREVIEW {
        hex::encode(body)
    } else {
        format!("{}... ({} bytes)", hex::encode(&body[..PREVIEW]), body.len())
    }
}

fn samples_preview(samples: &[i32]) -> String {
    const PREVIEW: usize = 16;
    let shown: Vec<String> = samples
        .iter()
        .take(PREVIEW)
        .map(|sample| sample.to_string())
        .collect();
    if samples.len() > PREVIEW {
        format!("{} ...", shown.join(" "))
    } else {
        shown.join(" ")
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
