use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ofagent_wire::{
    DescriptorRecord, Segment, DEFAULT_SEGMENT_SIZE, DESC_BODY_LEN, OFP_VERSION_1_3,
};

use crate::exit::{encode_error, io_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod describe;
pub mod encode;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve description requests on a Unix socket.
    Serve(ServeArgs),
    /// Connect to an agent and print its switch description.
    Describe(DescribeArgs),
    /// Encode a description reply offline and print it.
    Encode(EncodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Describe(args) => describe::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// JSON file holding the switch description.
    #[arg(long, value_name = "FILE")]
    pub descriptor: PathBuf,
    /// Datapath id the served sessions are bound to (decimal or 0x-hex).
    #[arg(long, default_value = "1", value_parser = parse_u64)]
    pub dpid: u64,
    /// Capacity of each reply segment in bytes.
    #[arg(long, default_value_t = 65535)]
    pub segment_size: usize,
    /// Highest protocol version offered in HELLO.
    #[arg(long, default_value_t = OFP_VERSION_1_3, value_parser = parse_u8)]
    pub version: u8,
    /// Deadline for the controller's HELLO (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub hello_timeout: String,
    /// Exit after serving N connections.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Connection and reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Highest protocol version offered in HELLO.
    #[arg(long, default_value_t = OFP_VERSION_1_3, value_parser = parse_u8)]
    pub version: u8,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON file holding the switch description.
    #[arg(long, value_name = "FILE")]
    pub descriptor: PathBuf,
    /// Transaction id to echo (decimal or 0x-hex).
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    pub xid: u32,
    /// Protocol version written into the header.
    #[arg(long, default_value_t = OFP_VERSION_1_3, value_parser = parse_u8)]
    pub version: u8,
    /// Segment capacity used for encoding.
    #[arg(long, default_value_t = 65535)]
    pub segment_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Read a descriptor JSON file and check that every field fits its wire width.
pub fn load_descriptor(path: &Path) -> CliResult<DescriptorRecord> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("reading {}", path.display()), err))?;
    let record: DescriptorRecord = serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid descriptor {}: {err}", path.display()),
        )
    })?;

    let mut probe = Segment::with_capacity(DESC_BODY_LEN);
    probe.set_plen(DESC_BODY_LEN);
    record
        .encode(&mut probe)
        .map_err(|err| encode_error(&format!("invalid descriptor {}", path.display()), err))?;

    Ok(record)
}

/// Segment sizes must be non-zero and fit a 16-bit message length.
pub fn check_segment_size(size: usize) -> CliResult<()> {
    if size == 0 || size > DEFAULT_SEGMENT_SIZE {
        return Err(CliError::new(
            USAGE,
            format!("segment size must be between 1 and {DEFAULT_SEGMENT_SIZE}, got {size}"),
        ));
    }
    Ok(())
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn parse_u64(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid number '{input}': {err}"))
}

fn parse_u32(input: &str) -> Result<u32, String> {
    let value = parse_u64(input)?;
    u32::try_from(value).map_err(|_| format!("{input} does not fit in 32 bits"))
}

fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_u64(input)?;
    u8::try_from(value).map_err(|_| format!("{input} does not fit in 8 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_seconds() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_timeout_millis() {
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_timeout_invalid() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert_eq!(parse_timeout("").unwrap_err().code, USAGE);
    }

    #[test]
    fn segment_size_must_fit_a_message_length() {
        assert!(check_segment_size(64).is_ok());
        assert!(check_segment_size(65535).is_ok());
        assert_eq!(check_segment_size(0).unwrap_err().code, USAGE);
        assert_eq!(check_segment_size(65536).unwrap_err().code, USAGE);
        assert_eq!(check_segment_size(usize::MAX).unwrap_err().code, USAGE);
    }

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u64("0x1234").unwrap(), 0x1234);
        assert_eq!(parse_u64("42").unwrap(), 42);
        assert_eq!(parse_u32("0xffffffff").unwrap(), u32::MAX);
        assert!(parse_u32("0x100000000").is_err());
        assert_eq!(parse_u8("0x04").unwrap(), 4);
        assert!(parse_u8("256").is_err());
        assert!(parse_u64("zz").is_err());
    }

    #[test]
    fn descriptor_with_long_serial_is_rejected() {
        let dir = std::env::temp_dir().join(format!("ofagent-desc-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("long.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"manufacturer":"ACME","hardware_version":"","software_version":"","serial_number":"{}","datapath_description":""}}"#,
                "9".repeat(40)
            ),
        )
        .unwrap();

        let err = load_descriptor(&path).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("serial_number"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_descriptor_file_is_reported() {
        let err = load_descriptor(Path::new("/nonexistent/ofagent/desc.json")).unwrap_err();
        assert!(err.message.contains("reading"));
    }
}
