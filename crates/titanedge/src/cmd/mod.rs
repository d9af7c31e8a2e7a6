use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use titanedge_protocol::enums::tokens;
use titanedge_protocol::{
    ConfigBatch, Envelope, MessageCatalog, WireToken, DEFAULT_MAX_PAYLOAD,
};
use titanedge_transport::CorrelationId;

use crate::exit::{io_error, protocol_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_raw, print_records, MessageRecord, OutputFormat};

pub mod decode;
pub mod input;
pub mod kinds;
pub mod loopback;
pub mod output;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List catalog message kinds and their payload fields.
    Kinds(KindsArgs),
    /// Build an input configuration batch.
    Input(InputArgs),
    /// Build an output connector configuration batch.
    Output(OutputArgs),
    /// Decode a framed envelope and validate each message.
    Decode(DecodeArgs),
    /// Send a framed envelope to a simulated element and print its replies.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Kinds(args) => kinds::run(args, format),
        Command::Input(args) => input::run(args, format),
        Command::Output(args) => output::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct KindsArgs {
    /// Print the JSON Schema for one kind instead of the listing.
    #[arg(long, value_name = "KIND")]
    pub schema: Option<String>,
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// Channel index.
    pub channel: u32,
    /// Input index within the channel.
    pub input: u32,
    /// Configuration mode (encoder, decoder).
    #[arg(long, default_value = "encoder")]
    pub mode: String,
    /// Enable or disable the input.
    #[arg(long, value_name = "BOOL")]
    pub enable: Option<bool>,
    /// Input IPv4 address.
    #[arg(long, value_name = "IPV4")]
    pub ip: Option<String>,
    /// Input type token (ip, srt, zixi, ...).
    #[arg(long = "type", value_name = "TYPE")]
    pub input_type: Option<String>,
    /// Input UDP port.
    #[arg(long, allow_negative_numbers = true)]
    pub port: Option<i64>,
    /// Network interface name.
    #[arg(long)]
    pub interface: Option<String>,
    /// Enable or disable FEC.
    #[arg(long, value_name = "BOOL")]
    pub fec: Option<bool>,
    /// Buffer duration in milliseconds.
    #[arg(long, value_name = "MS", allow_negative_numbers = true)]
    pub buffer_ms: Option<i64>,
    /// Enable or disable source-specific multicast.
    #[arg(long, value_name = "BOOL")]
    pub ssm: Option<bool>,
    /// Source-specific multicast mode (include, exclude).
    #[arg(long, value_name = "MODE")]
    pub ssm_mode: Option<String>,
    /// Enable or disable SMPTE 2022-7 redundancy.
    #[arg(long, value_name = "BOOL")]
    pub smpte: Option<bool>,
    /// SMPTE 2022-7 secondary IPv4 address.
    #[arg(long, value_name = "IPV4")]
    pub smpte_ip: Option<String>,
    /// SMPTE 2022-7 secondary port.
    #[arg(long, allow_negative_numbers = true)]
    pub smpte_port: Option<i64>,
    /// SMPTE 2022-7 secondary interface.
    #[arg(long)]
    pub smpte_interface: Option<String>,
    /// SMPTE 2022-7 skew (low, moderate, high, custom).
    #[arg(long, value_name = "SKEW")]
    pub smpte_skew: Option<String>,
    /// SMPTE 2022-7 custom skew in milliseconds.
    #[arg(long, value_name = "MS", allow_negative_numbers = true)]
    pub smpte_custom_skew_ms: Option<i64>,
    /// Enable or disable variable bitrate input.
    #[arg(long, value_name = "BOOL")]
    pub vbr: Option<bool>,
    /// Enable or disable low-latency FEC.
    #[arg(long, value_name = "BOOL")]
    pub low_latency_fec: Option<bool>,
    /// Acceleration type (disabled, rivermax).
    #[arg(long, value_name = "TYPE")]
    pub acceleration: Option<String>,
    /// Write the framed envelope to FILE instead of printing messages.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Channel index.
    pub channel: u32,
    /// Output connector index within the channel.
    pub connector: u32,
    /// Configuration mode (encoder, decoder).
    #[arg(long, default_value = "encoder")]
    pub mode: String,
    /// SDI connector type (auto_sdi, hd_sdi, 1080p_sdi, ...).
    #[arg(long = "type", value_name = "TYPE")]
    pub sdi_type: Option<String>,
    /// Connector display name.
    #[arg(long)]
    pub name: Option<String>,
    /// Enable or disable colorimetry conversion.
    #[arg(long, value_name = "BOOL")]
    pub colorimetry: Option<bool>,
    /// Colorimetry conversion target (bt709, hdr10, hlg, ...).
    #[arg(long, value_name = "CONVERSION")]
    pub conversion: Option<String>,
    /// Inverse tone mapping name (eotfScaling, hable, ...).
    #[arg(long, value_name = "IUT")]
    pub iut: Option<String>,
    /// Write the framed envelope to FILE instead of printing messages.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Maximum accepted envelope body size in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Frame file. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Sliding reply timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "1s", env = "TITANEDGE_REPLY_TIMEOUT")]
    pub timeout: String,
    /// Message kinds the simulated element rejects (comma-separated tags).
    #[arg(long, value_delimiter = ',', value_name = "KINDS")]
    pub reject: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn standard_catalog() -> CliResult<MessageCatalog> {
    MessageCatalog::standard().map_err(|err| protocol_error("catalog setup failed", err))
}

/// Parse `value` as a wire token of `T`, listing valid tokens on failure.
pub fn parse_token<T: WireToken>(flag: &str, value: &str) -> CliResult<T> {
    T::from_token(value).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!(
                "--{flag}: '{value}' is not a valid {} (expected one of: {})",
                T::NAME,
                tokens::<T>().join(", ")
            ),
        )
    })
}

/// Read a whole frame from `path`, or from stdin when `None`.
pub fn read_input(path: Option<&Path>) -> CliResult<Vec<u8>> {
    match path {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(buf)
        }
    }
}

/// Encode `batch` as one framed envelope and write or print it.
pub fn emit_batch(batch: &ConfigBatch, out: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    let catalog = standard_catalog()?;
    let envelope = catalog
        .seal(Envelope::new(CorrelationId::next()), &batch.to_messages())
        .map_err(|err| protocol_error("encode failed", err))?;
    let frame = envelope
        .to_bytes(DEFAULT_MAX_PAYLOAD)
        .map_err(|err| protocol_error("encode failed", err))?;

    if let Some(path) = out {
        fs::write(path, &frame)
            .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
        tracing::info!(
            path = %path.display(),
            messages = envelope.len(),
            bytes = frame.len(),
            "wrote frame"
        );
        return Ok(SUCCESS);
    }

    if matches!(format, OutputFormat::Raw) {
        print_raw(&frame);
        return Ok(SUCCESS);
    }

    let records: Vec<_> = envelope
        .messages
        .iter()
        .enumerate()
        .map(|(index, raw)| MessageRecord::ok(index, raw))
        .collect();
    print_records(&records, format);
    Ok(SUCCESS)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
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
        _ => Ok(Duration::from_secs(value)),
    }
}
