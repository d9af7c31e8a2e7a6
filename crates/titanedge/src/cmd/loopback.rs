use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use titanedge_protocol::{Envelope, Message, MessageCatalog, MessageKind, DEFAULT_MAX_PAYLOAD};
use titanedge_rpc::{
    ChannelConfig, CorrelatedChannel, Dispatcher, HandleReport, TitanEdgeClient, PROTOCOL_NAME,
    RECEIVER_PARAMETER,
};
use titanedge_transport::{
    Address, Bus, ElementInfo, ElementRef, ElementState, InMemoryBus, StaticDirectory,
};

use crate::cmd::{parse_duration, read_input, standard_catalog, LoopbackArgs};
use crate::exit::{
    protocol_error, rpc_error, transport_error, CliError, CliResult, DATA_INVALID, FAILURE,
    INTERNAL, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_records, MessageRecord, OutputFormat};

const ELEMENT_NAME: &str = "loopback";
const AGENT_ID: i32 = 100;
const ELEMENT_ID: i32 = 1;

pub fn run(args: LoopbackArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let rejects = parse_kinds(&args.reject)?;
    let catalog = Arc::new(standard_catalog()?);

    let bytes = read_input(args.file.as_deref())?;
    let envelope = Envelope::from_bytes(&bytes, DEFAULT_MAX_PAYLOAD)
        .map_err(|err| protocol_error("decode failed", err))?;
    let messages = config_messages(&catalog, &envelope)?;

    let bus = InMemoryBus::new();
    let inbox = bus
        .bind(Address::new(AGENT_ID, ELEMENT_ID, RECEIVER_PARAMETER))
        .map_err(|err| transport_error("bind failed", err))?;
    let dispatcher = simulated_element(Arc::clone(&catalog), &bus, &rejects);
    let device = thread::spawn(move || {
        let mut applied = 0usize;
        let report = dispatcher.serve(&inbox, &mut applied);
        (report, applied)
    });

    let directory = StaticDirectory::new().with_element(ElementInfo {
        agent_id: AGENT_ID,
        element_id: ELEMENT_ID,
        name: ELEMENT_NAME.to_string(),
        protocol: PROTOCOL_NAME.to_string(),
        state: ElementState::Active,
    });
    let channel = CorrelatedChannel::new(
        Arc::new(bus.clone()),
        Arc::new(directory),
        Arc::clone(&catalog),
        ChannelConfig::default().with_reply_timeout(timeout),
    );
    let client = TitanEdgeClient::connect(channel, ElementRef::name(ELEMENT_NAME))
        .map_err(|err| rpc_error("connect failed", err))?;

    let replies: Vec<Message> = client
        .request(timeout, &messages, Some(messages.len()))
        .map_err(|err| rpc_error("request failed", err))?
        .collect();

    bus.shutdown();
    let (report, applied) = device
        .join()
        .map_err(|_| CliError::new(INTERNAL, "simulated element panicked"))?;
    tracing::info!(
        sent = messages.len(),
        replies = replies.len(),
        applied,
        executed = report.executed,
        "loopback complete"
    );

    let records = reply_records(&catalog, &replies)?;
    print_records(&records, format);

    Ok(exit_code(messages.len(), &replies, report))
}

fn parse_kinds(tags: &[String]) -> CliResult<HashSet<MessageKind>> {
    tags.iter()
        .map(|tag| {
            MessageKind::from_tag(tag.trim()).ok_or_else(|| {
                CliError::new(USAGE, format!("--reject: unknown message kind: {tag}"))
            })
        })
        .collect()
}

/// Decode every message, refusing frames that carry replies or invalid entries.
fn config_messages(catalog: &MessageCatalog, envelope: &Envelope) -> CliResult<Vec<Message>> {
    let mut messages = Vec::with_capacity(envelope.len());
    for (index, decoded) in catalog.open(envelope).into_iter().enumerate() {
        let message = decoded
            .map_err(|err| CliError::new(DATA_INVALID, format!("message {index}: {err}")))?;
        if message.as_config().is_none() {
            return Err(CliError::new(
                USAGE,
                format!("message {index}: {} is a reply, not a configuration", message.kind()),
            ));
        }
        messages.push(message);
    }
    if messages.is_empty() {
        return Err(CliError::new(USAGE, "frame contains no messages"));
    }
    Ok(messages)
}

/// A dispatcher that acknowledges every configuration kind.
fn simulated_element(
    catalog: Arc<MessageCatalog>,
    bus: &InMemoryBus,
    rejects: &HashSet<MessageKind>,
) -> Dispatcher<usize> {
    let kinds = catalog.kinds();
    let mut dispatcher: Dispatcher<usize> = Dispatcher::new(catalog, Arc::new(bus.clone()));
    for kind in kinds.into_iter().filter(|kind| !kind.is_reply()) {
        let reject = rejects.contains(&kind);
        dispatcher.attach(kind, move |message, applied| {
            let Some(config) = message.as_config() else {
                return Ok(None);
            };
            if reject {
                return Ok(Some(Message::rejected(config, "rejected by loopback element")));
            }
            *applied += 1;
            Ok(Some(Message::applied(config)))
        });
    }
    dispatcher
}

fn reply_records(catalog: &MessageCatalog, replies: &[Message]) -> CliResult<Vec<MessageRecord>> {
    replies
        .iter()
        .enumerate()
        .map(|(index, reply)| {
            let raw = catalog
                .to_raw(reply)
                .map_err(|err| protocol_error("encode failed", err))?;
            Ok(MessageRecord::ok(index, &raw))
        })
        .collect()
}

fn exit_code(sent: usize, replies: &[Message], report: HandleReport) -> i32 {
    if replies.len() < sent {
        tracing::warn!(
            sent,
            received = replies.len(),
            undelivered = report.undelivered,
            "missing replies"
        );
        return TIMEOUT;
    }
    let rejected = replies
        .iter()
        .filter_map(Message::as_reply)
        .filter(|reply| !reply.is_applied())
        .count();
    if rejected > 0 {
        return FAILURE;
    }
    SUCCESS
}
