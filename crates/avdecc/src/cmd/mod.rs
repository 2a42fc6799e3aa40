use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use avdecc_frame::MacAddr;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod descriptor;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a STREAM_INPUT command frame and print it.
    Encode(EncodeArgs),
    /// Parse an AECP or ACMP frame and print its fields.
    Decode(DecodeArgs),
    /// Parse a READ_DESCRIPTOR response and print the descriptor.
    Descriptor(DescriptorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Descriptor(args) => descriptor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CommandName {
    GetStreamFormat,
    SetStreamFormat,
    GetStreamInfo,
    SetStreamInfo,
    StartStreaming,
    StopStreaming,
    GetCounters,
    ConnectRx,
    DisconnectRx,
    GetRxState,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command to build.
    #[arg(value_enum)]
    pub command: CommandName,
    /// Target entity id (listener for ACMP commands).
    #[arg(long, value_parser = parse_u64)]
    pub entity: u64,
    /// Target entity MAC address.
    #[arg(long, default_value = "00:00:00:00:00:00")]
    pub entity_mac: MacAddr,
    /// Controller entity id.
    #[arg(long, value_parser = parse_u64, default_value = "0")]
    pub controller: u64,
    /// Controller MAC address.
    #[arg(long, default_value = "00:00:00:00:00:00")]
    pub controller_mac: MacAddr,
    /// STREAM_INPUT descriptor index (listener unique id for ACMP commands).
    #[arg(long, default_value = "0")]
    pub index: u16,
    /// Stream format for set-stream-format and set-stream-info.
    #[arg(
        long,
        value_parser = parse_u64,
        required_if_eq_any([("command", "set-stream-format"), ("command", "set-stream-info")])
    )]
    pub stream_format: Option<u64>,
    /// Talker entity id for connect-rx/disconnect-rx.
    #[arg(long, value_parser = parse_u64)]
    pub talker: Option<u64>,
    /// Talker unique id for connect-rx/disconnect-rx.
    #[arg(long, default_value = "0")]
    pub talker_unique_id: u16,
    /// ACMP flags for connect-rx.
    #[arg(long, value_parser = parse_u16, default_value = "0")]
    pub flags: u16,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame as hex, starting at the Ethernet destination address.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read the raw frame bytes from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DescriptorArgs {
    /// READ_DESCRIPTOR response frame as hex.
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub hex: Option<String>,
    /// Read the raw frame bytes from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Decimal, or hex with a `0x` prefix.
pub fn parse_u64(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid number '{input}': {err}"))
}

pub fn parse_u16(input: &str) -> Result<u16, String> {
    let value = parse_u64(input)?;
    u16::try_from(value).map_err(|_| format!("'{input}' does not fit in 16 bits"))
}

/// Hex digits, ignoring whitespace, `:` and `-` separators and a `0x` prefix.
pub fn parse_hex_bytes(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(
            USAGE,
            format!("hex input has an odd number of digits ({})", digits.len()),
        ));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).unwrap_or("??");
            u8::from_str_radix(text, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte '{text}'")))
        })
        .collect()
}

/// Frame bytes from a hex argument or a file.
pub fn read_frame(hex: Option<&str>, file: Option<&PathBuf>) -> CliResult<Vec<u8>> {
    let bytes = match (hex, file) {
        (Some(hex), _) => parse_hex_bytes(hex)?,
        (None, Some(path)) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "no frame given")),
    };
    if bytes.is_empty() {
        return Err(CliError::new(DATA_INVALID, "frame is empty"));
    }
    Ok(bytes)
}
