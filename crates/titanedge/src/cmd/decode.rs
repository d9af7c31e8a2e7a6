use titanedge_protocol::Envelope;

use crate::cmd::{read_input, standard_catalog, DecodeArgs};
use crate::exit::{protocol_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_records, MessageRecord, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = standard_catalog()?;
    let bytes = read_input(args.file.as_deref())?;
    let envelope = Envelope::from_bytes(&bytes, args.max_payload)
        .map_err(|err| protocol_error("decode failed", err))?;

    tracing::debug!(
        correlation = %envelope.correlation_id,
        messages = envelope.len(),
        "decoded envelope"
    );

    let records: Vec<_> = envelope
        .messages
        .iter()
        .zip(catalog.open(&envelope))
        .enumerate()
        .map(|(index, (raw, decoded))| match decoded {
            Ok(_) => MessageRecord::ok(index, raw),
            Err(err) => MessageRecord::rejected(index, raw, err),
        })
        .collect();
    print_records(&records, format);

    let rejected = records.iter().filter(|r| r.error.is_some()).count();
    if rejected > 0 {
        tracing::warn!(rejected, "envelope contains invalid messages");
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
