use std::fmt::Write as _;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ofagent_session::ConnectionSummary;
use ofagent_wire::DescriptorRecord;
use serde::Serialize;

const HEX_ROW: usize = 16;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct DescribeOutput<'a> {
    negotiated_version: u8,
    #[serde(flatten)]
    descriptor: &'a DescriptorRecord,
}

pub fn print_descriptor(record: &DescriptorRecord, negotiated_version: u8, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DescribeOutput {
                negotiated_version,
                descriptor: record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in descriptor_rows(record) {
                table.add_row(vec![name, value]);
            }
            table.add_row(vec![
                "negotiated_version".to_string(),
                format!("{negotiated_version:#04x}"),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Switch Description:");
            for (name, value) in descriptor_rows(record) {
                println!("  {name:<22}{value}");
            }
            println!("  {:<22}{negotiated_version:#04x}", "negotiated_version");
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    xid: u32,
    version: u8,
    length: usize,
    hex: &'a str,
}

pub fn print_frame(frame: &[u8], version: u8, xid: u32, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let hex = hex_string(frame);
            let out = FrameOutput {
                xid,
                version,
                length: frame.len(),
                hex: &hex,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "BYTES"]);
            for (offset, row) in frame.chunks(HEX_ROW).enumerate() {
                table.add_row(vec![
                    format!("{:04x}", offset * HEX_ROW),
                    spaced_hex(row),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("xid={xid:#010x} version={version:#04x} length={}", frame.len());
            for (offset, row) in frame.chunks(HEX_ROW).enumerate() {
                println!("{:04x}  {}", offset * HEX_ROW, spaced_hex(row));
            }
        }
    }
}

#[derive(Serialize)]
struct ConnectionOutput {
    event: &'static str,
    negotiated_version: u8,
    messages: usize,
    described: usize,
    echoed: usize,
    ignored: usize,
    failed: usize,
}

pub fn print_connection(summary: &ConnectionSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ConnectionOutput {
                event: "connection-closed",
                negotiated_version: summary.negotiated_version,
                messages: summary.messages,
                described: summary.described,
                echoed: summary.echoed,
                ignored: summary.ignored,
                failed: summary.failed,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "connection closed: version={:#04x} messages={} described={} echoed={} ignored={} failed={}",
                summary.negotiated_version,
                summary.messages,
                summary.described,
                summary.echoed,
                summary.ignored,
                summary.failed
            );
        }
    }
}

fn descriptor_rows(record: &DescriptorRecord) -> [(&'static str, &str); 5] {
    [
        ("manufacturer", record.manufacturer.as_str()),
        ("hardware_version", record.hardware_version.as_str()),
        ("software_version", record.software_version.as_str()),
        ("serial_number", record.serial_number.as_str()),
        ("datapath_description", record.datapath_description.as_str()),
    ]
}

pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn spaced_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
