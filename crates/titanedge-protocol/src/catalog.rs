use std::collections::HashMap;
use std::fmt;

use jsonschema::Validator;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::envelope::{Envelope, RawMessage};
use crate::enums::{
    tokens, AccelerationType, ColorimetryConversion, ConfigMode, InputType, IutName, SdiType,
    SmpteSkew, SourceSpecificMulticastMode,
};
use crate::error::{ProtocolError, Result};
use crate::message::{fields, Message};

/// Strict dotted-quad IPv4: four octets 0-255, no leading zeros.
pub const IPV4_PATTERN: &str =
    r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$";

/// Stable discriminator for every message the protocol carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    EnableInput,
    SetIpAddress,
    SetInputType,
    SetIpPort,
    SetInterface,
    EnableInputFec,
    SetBufferDuration,
    EnableSourceSpecificMulticast,
    SetSourceSpecificMulticastMode,
    EnableSmpte2022_7,
    SetSmpte2022_7IpAddress,
    SetSmpte2022_7Port,
    SetSmpte2022_7Interface,
    SetSmpte2022_7Skew,
    SetSmpte2022_7CustomSkew,
    EnableInputVbr,
    EnableLowLatencyFec,
    SetAccelerationType,
    OutputConnectorType,
    OutputConnectorName,
    OutputConnectorColorimetry,
    OutputConnectorColorimetryConversion,
    OutputConnectorIut,
    ConfigApplied,
    ConfigRejected,
}

impl MessageKind {
    /// Every kind, in catalog order.
    pub const ALL: &'static [MessageKind] = &[
        Self::EnableInput,
        Self::SetIpAddress,
        Self::SetInputType,
        Self::SetIpPort,
        Self::SetInterface,
        Self::EnableInputFec,
        Self::SetBufferDuration,
        Self::EnableSourceSpecificMulticast,
        Self::SetSourceSpecificMulticastMode,
        Self::EnableSmpte2022_7,
        Self::SetSmpte2022_7IpAddress,
        Self::SetSmpte2022_7Port,
        Self::SetSmpte2022_7Interface,
        Self::SetSmpte2022_7Skew,
        Self::SetSmpte2022_7CustomSkew,
        Self::EnableInputVbr,
        Self::EnableLowLatencyFec,
        Self::SetAccelerationType,
        Self::OutputConnectorType,
        Self::OutputConnectorName,
        Self::OutputConnectorColorimetry,
        Self::OutputConnectorColorimetryConversion,
        Self::OutputConnectorIut,
        Self::ConfigApplied,
        Self::ConfigRejected,
    ];

    /// The tag written to the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnableInput => "enable_input",
            Self::SetIpAddress => "set_ip_address",
            Self::SetInputType => "set_input_type",
            Self::SetIpPort => "set_ip_port",
            Self::SetInterface => "set_interface",
            Self::EnableInputFec => "enable_input_fec",
            Self::SetBufferDuration => "set_buffer_duration",
            Self::EnableSourceSpecificMulticast => "enable_source_specific_multicast",
            Self::SetSourceSpecificMulticastMode => "set_source_specific_multicast_mode",
            Self::EnableSmpte2022_7 => "enable_smpte_2022_7",
            Self::SetSmpte2022_7IpAddress => "set_smpte_2022_7_ip_address",
            Self::SetSmpte2022_7Port => "set_smpte_2022_7_port",
            Self::SetSmpte2022_7Interface => "set_smpte_2022_7_interface",
            Self::SetSmpte2022_7Skew => "set_smpte_2022_7_skew",
            Self::SetSmpte2022_7CustomSkew => "set_smpte_2022_7_custom_skew",
            Self::EnableInputVbr => "enable_input_vbr",
            Self::EnableLowLatencyFec => "enable_low_latency_fec",
            Self::SetAccelerationType => "set_acceleration_type",
            Self::OutputConnectorType => "output_connector_type",
            Self::OutputConnectorName => "output_connector_name",
            Self::OutputConnectorColorimetry => "output_connector_colorimetry",
            Self::OutputConnectorColorimetryConversion => {
                "output_connector_colorimetry_conversion"
            }
            Self::OutputConnectorIut => "output_connector_iut",
            Self::ConfigApplied => "config_applied",
            Self::ConfigRejected => "config_rejected",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }

    /// Whether this kind is a reply rather than a configuration command.
    pub fn is_reply(self) -> bool {
        matches!(self, Self::ConfigApplied | Self::ConfigRejected)
    }

    /// The canonical payload shape for this kind.
    pub fn shape(self) -> PayloadShape {
        use fields::*;

        let ip_port = FieldType::Integer {
            min: 1,
            max: i64::from(u16::MAX),
        };
        let millis = FieldType::Integer {
            min: 0,
            max: i64::from(u32::MAX),
        };

        let field = match self {
            Self::EnableInput
            | Self::EnableInputFec
            | Self::EnableSourceSpecificMulticast
            | Self::EnableSmpte2022_7
            | Self::EnableInputVbr
            | Self::EnableLowLatencyFec
            | Self::OutputConnectorColorimetry => FieldSpec::new(IS_ENABLED, FieldType::Bool),
            Self::SetIpAddress | Self::SetSmpte2022_7IpAddress => {
                FieldSpec::new(IP_ADDRESS, FieldType::Ipv4)
            }
            Self::SetInputType => {
                FieldSpec::new(INPUT_TYPE, FieldType::Token(tokens::<InputType>()))
            }
            Self::SetIpPort | Self::SetSmpte2022_7Port => FieldSpec::new(PORT, ip_port),
            Self::SetInterface => FieldSpec::new(INTERFACE, FieldType::Text),
            Self::SetBufferDuration => FieldSpec::new(DURATION_MS, millis),
            Self::SetSourceSpecificMulticastMode => FieldSpec::new(
                SSM_MODE,
                FieldType::Token(tokens::<SourceSpecificMulticastMode>()),
            ),
            Self::SetSmpte2022_7Interface => FieldSpec::new(INTERFACE_NAME, FieldType::Text),
            Self::SetSmpte2022_7Skew => {
                FieldSpec::new(SKEW, FieldType::Token(tokens::<SmpteSkew>()))
            }
            Self::SetSmpte2022_7CustomSkew => FieldSpec::new(CUSTOM_SKEW_MS, millis),
            Self::SetAccelerationType => FieldSpec::new(
                ACCELERATION_TYPE,
                FieldType::Token(tokens::<AccelerationType>()),
            ),
            Self::OutputConnectorType => {
                FieldSpec::new(SDI_TYPE, FieldType::Token(tokens::<SdiType>()))
            }
            Self::OutputConnectorName => FieldSpec::new(NAME, FieldType::Text),
            Self::OutputConnectorColorimetryConversion => FieldSpec::new(
                CONVERSION,
                FieldType::Token(tokens::<ColorimetryConversion>()),
            ),
            Self::OutputConnectorIut => FieldSpec::new(IUT, FieldType::Token(tokens::<IutName>())),
            Self::ConfigApplied => return PayloadShape::new(vec![acknowledges_field()]),
            Self::ConfigRejected => {
                return PayloadShape::new(vec![
                    acknowledges_field(),
                    FieldSpec::new(REASON, FieldType::Text),
                ])
            }
        };

        PayloadShape::new(vec![field])
    }
}

fn acknowledges_field() -> FieldSpec {
    let config_kinds = MessageKind::ALL
        .iter()
        .filter(|kind| !kind.is_reply())
        .map(|kind| kind.as_str())
        .collect();
    FieldSpec::new(fields::ACKNOWLEDGES, FieldType::Token(config_kinds))
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of one value field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Integer { min: i64, max: i64 },
    Ipv4,
    Text,
    /// One of a closed list of tokens.
    Token(Vec<&'static str>),
}

impl FieldType {
    fn to_schema(&self) -> Value {
        match self {
            FieldType::Bool => json!({ "type": "boolean" }),
            FieldType::Integer { min, max } => {
                json!({ "type": "integer", "minimum": min, "maximum": max })
            }
            FieldType::Ipv4 => json!({ "type": "string", "pattern": IPV4_PATTERN }),
            FieldType::Text => json!({ "type": "string" }),
            FieldType::Token(tokens) => json!({ "type": "string", "enum": tokens }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Value fields of one message kind. Target fields are implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadShape {
    pub fields: Vec<FieldSpec>,
}

impl PayloadShape {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// JSON Schema for the full payload, target fields included.
    ///
    /// Every field is required and unknown properties are rejected.
    pub fn to_schema(&self) -> Value {
        let index = FieldType::Integer {
            min: 0,
            max: i64::from(u32::MAX),
        };

        let mut properties = Map::new();
        properties.insert(fields::CHANNEL_INDEX.to_string(), index.to_schema());
        properties.insert(fields::TARGET_INDEX.to_string(), index.to_schema());
        properties.insert(
            fields::MODE.to_string(),
            FieldType::Token(tokens::<ConfigMode>()).to_schema(),
        );
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.ty.to_schema());
        }

        let required: Vec<Value> = properties
            .keys()
            .map(|name| Value::String(name.clone()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

struct CatalogEntry {
    shape: PayloadShape,
    validator: Validator,
}

/// Closed registry from message kind to payload shape.
///
/// Build one at startup and share it by reference between senders and
/// receivers. Both ends must hold the same set of kinds.
pub struct MessageCatalog {
    entries: HashMap<MessageKind, CatalogEntry>,
}

impl MessageCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A catalog holding every kind with its canonical shape.
    pub fn standard() -> Result<Self> {
        Self::with_kinds(MessageKind::ALL)
    }

    /// A catalog holding `kinds` with their canonical shapes.
    pub fn with_kinds(kinds: &[MessageKind]) -> Result<Self> {
        let mut catalog = Self::new();
        for kind in kinds {
            catalog.register(*kind, kind.shape())?;
        }
        Ok(catalog)
    }

    /// Register `shape` for `kind`, replacing any previous registration.
    pub fn register(&mut self, kind: MessageKind, shape: PayloadShape) -> Result<()> {
        let schema = shape.to_schema();
        let validator =
            jsonschema::validator_for(&schema).map_err(|err| ProtocolError::SchemaCompile {
                kind: kind.as_str(),
                message: err.to_string(),
            })?;

        debug!(kind = kind.as_str(), "registered message shape");
        self.entries.insert(kind, CatalogEntry { shape, validator });
        Ok(())
    }

    pub fn contains(&self, kind: MessageKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn shape(&self, kind: MessageKind) -> Option<&PayloadShape> {
        self.entries.get(&kind).map(|entry| &entry.shape)
    }

    /// Registered kinds in catalog order.
    pub fn kinds(&self) -> Vec<MessageKind> {
        let mut kinds: Vec<MessageKind> = self.entries.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tag `message` with its kind and render its payload.
    pub fn to_raw(&self, message: &Message) -> Result<RawMessage> {
        let kind = message.kind();
        if !self.contains(kind) {
            return Err(ProtocolError::UnknownMessageKind(kind.as_str().to_string()));
        }
        Ok(RawMessage {
            kind: kind.as_str().to_string(),
            payload: Value::Object(message.to_wire()),
        })
    }

    /// Resolve the tag of `raw`, check its payload shape, and rebuild the message.
    pub fn from_raw(&self, raw: &RawMessage) -> Result<Message> {
        let kind = MessageKind::from_tag(&raw.kind)
            .ok_or_else(|| ProtocolError::UnknownMessageKind(raw.kind.clone()))?;
        let entry = self
            .entries
            .get(&kind)
            .ok_or_else(|| ProtocolError::UnknownMessageKind(raw.kind.clone()))?;

        let mut errors = entry.validator.iter_errors(&raw.payload);
        if let Some(first) = errors.next() {
            let mut message = first.to_string();
            for err in errors.take(3) {
                message.push_str("; ");
                message.push_str(&err.to_string());
            }
            return Err(ProtocolError::ShapeViolation {
                kind: kind.as_str(),
                message,
            });
        }

        let payload = raw
            .payload
            .as_object()
            .ok_or_else(|| ProtocolError::ShapeViolation {
                kind: kind.as_str(),
                message: "payload is not an object".to_string(),
            })?;

        Message::from_wire(kind, payload).map_err(|message| ProtocolError::InvalidPayload {
            kind: kind.as_str(),
            message,
        })
    }

    /// Serialize one message self-describingly (kind tag plus payload).
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        let raw = self.to_raw(message)?;
        Ok(serde_json::to_vec(&raw)?)
    }

    /// Inverse of [`MessageCatalog::encode`].
    pub fn decode(&self, bytes: &[u8]) -> Result<Message> {
        let raw: RawMessage = serde_json::from_slice(bytes)?;
        self.from_raw(&raw)
    }

    /// Append `messages` to `envelope`, in order.
    ///
    /// Fails without modifying the envelope if any message is not registered.
    pub fn seal(&self, mut envelope: Envelope, messages: &[Message]) -> Result<Envelope> {
        let raw = messages
            .iter()
            .map(|message| self.to_raw(message))
            .collect::<Result<Vec<_>>>()?;
        envelope.messages.extend(raw);
        Ok(envelope)
    }

    /// Decode every message in `envelope`. Each message succeeds or fails alone.
    pub fn open(&self, envelope: &Envelope) -> Vec<Result<Message>> {
        envelope
            .messages
            .iter()
            .map(|raw| self.from_raw(raw))
            .collect()
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{InputConfiguration, OutputConfiguration};
    use crate::enums::WireToken;

    fn catalog() -> MessageCatalog {
        MessageCatalog::standard().expect("standard catalog should compile")
    }

    fn every_config_message() -> Vec<Message> {
        let mut input = InputConfiguration::new(3, 1, ConfigMode::Decoder);
        input
            .enable_input(true)
            .set_ip_address("192.168.1.1")
            .unwrap()
            .set_input_type(InputType::Rist)
            .set_ip_port(1234)
            .unwrap()
            .set_input_interface("eth0")
            .enable_input_fec(false)
            .set_buffer_duration(250)
            .unwrap()
            .enable_source_specific_multicast(true)
            .set_source_specific_multicast_mode(SourceSpecificMulticastMode::Exclude)
            .enable_smpte_2022_7(true)
            .set_smpte_2022_7_ip_address("10.0.0.1")
            .unwrap()
            .set_smpte_2022_7_port(65535)
            .unwrap()
            .set_smpte_2022_7_interface("")
            .set_smpte_2022_7_skew(SmpteSkew::Custom)
            .set_smpte_2022_7_custom_skew(0)
            .unwrap()
            .enable_input_vbr(true)
            .enable_low_latency_fec(true)
            .set_acceleration_type(AccelerationType::Disabled);

        let mut output = OutputConfiguration::new(0, 2, ConfigMode::Encoder);
        output
            .change_type(SdiType::Sdi720p)
            .set_name("PGM out")
            .enable_colorimetry(true)
            .set_colorimetry_conversion(ColorimetryConversion::Hlg)
            .set_iut_name(IutName::Nbcu1);

        let mut messages: Vec<Message> = input
            .build()
            .unwrap()
            .into_messages()
            .into_iter()
            .map(Message::Config)
            .collect();
        messages.extend(
            output
                .build()
                .unwrap()
                .into_messages()
                .into_iter()
                .map(Message::Config),
        );
        messages
    }

    #[test]
    fn standard_catalog_registers_every_kind() {
        let catalog = catalog();
        assert_eq!(catalog.len(), MessageKind::ALL.len());
        assert_eq!(catalog.kinds(), MessageKind::ALL.to_vec());
    }

    #[test]
    fn tags_are_unique_and_resolvable() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::from_tag(kind.as_str()), Some(*kind));
        }
        let mut tags: Vec<&str> = MessageKind::ALL.iter().map(|k| k.as_str()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), MessageKind::ALL.len());
    }

    #[test]
    fn roundtrip_covers_every_config_kind() {
        let catalog = catalog();
        let messages = every_config_message();

        let mut covered: Vec<MessageKind> = messages.iter().map(Message::kind).collect();
        covered.sort_unstable();
        covered.dedup();
        assert_eq!(covered.len(), 23);

        for message in &messages {
            let bytes = catalog.encode(message).unwrap();
            assert_eq!(&catalog.decode(&bytes).unwrap(), message);
        }
    }

    #[test]
    fn roundtrip_covers_reply_kinds() {
        let catalog = catalog();
        let request = every_config_message().remove(0);
        let request = request.as_config().unwrap();

        for reply in [
            Message::applied(request),
            Message::rejected(request, "busy"),
        ] {
            let bytes = catalog.encode(&reply).unwrap();
            assert_eq!(catalog.decode(&bytes).unwrap(), reply);
        }
    }

    #[test]
    fn encoded_payload_is_self_describing() {
        let catalog = catalog();
        let message = &every_config_message()[2];
        let value: Value = serde_json::from_slice(&catalog.encode(message).unwrap()).unwrap();
        assert_eq!(value["kind"], "set_input_type");
        assert_eq!(value["payload"]["inputType"], "rist");
        assert_eq!(value["payload"]["mode"], "decoder");
    }

    #[test]
    fn unknown_tag_is_rejected_and_decoder_keeps_working() {
        let catalog = catalog();
        let bogus = br#"{"kind":"set_warp_factor","payload":{"channelIndex":0}}"#;
        let err = catalog.decode(bogus).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageKind(tag) if tag == "set_warp_factor"));

        let message = &every_config_message()[0];
        let bytes = catalog.encode(message).unwrap();
        assert_eq!(&catalog.decode(&bytes).unwrap(), message);
    }

    #[test]
    fn unregistered_kind_is_unknown_on_both_ends() {
        let partial = MessageCatalog::with_kinds(&[MessageKind::EnableInput]).unwrap();
        let full = catalog();
        let message = every_config_message()[1].clone();
        assert_eq!(message.kind(), MessageKind::SetIpAddress);

        let err = partial.encode(&message).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageKind(_)));

        let bytes = full.encode(&message).unwrap();
        let err = partial.decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageKind(_)));
    }

    #[test]
    fn shape_violations_are_reported() {
        let catalog = catalog();
        let cases = [
            r#"{"kind":"set_ip_port","payload":{"channelIndex":0,"targetIndex":0,"mode":"encoder","port":70000}}"#,
            r#"{"kind":"set_ip_address","payload":{"channelIndex":0,"targetIndex":0,"mode":"encoder","ipAddress":"999.1.1.1"}}"#,
            r#"{"kind":"enable_input","payload":{"channelIndex":0,"targetIndex":0,"mode":"encoder"}}"#,
            r#"{"kind":"enable_input","payload":{"channelIndex":0,"targetIndex":0,"mode":"encoder","isEnabled":true,"extra":1}}"#,
            r#"{"kind":"set_input_type","payload":{"channelIndex":0,"targetIndex":0,"mode":"encoder","inputType":"Ip"}}"#,
            r#"{"kind":"enable_input","payload":{"channelIndex":-1,"targetIndex":0,"mode":"encoder","isEnabled":true}}"#,
        ];
        for case in cases {
            let err = catalog.decode(case.as_bytes()).unwrap_err();
            assert!(
                matches!(err, ProtocolError::ShapeViolation { .. }),
                "{case}: {err}"
            );
        }
    }

    #[test]
    fn register_overwrites_shape() {
        let mut catalog = MessageCatalog::new();
        catalog
            .register(MessageKind::OutputConnectorName, PayloadShape::new(vec![]))
            .unwrap();
        catalog
            .register(
                MessageKind::OutputConnectorName,
                MessageKind::OutputConnectorName.shape(),
            )
            .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.shape(MessageKind::OutputConnectorName),
            Some(&MessageKind::OutputConnectorName.shape())
        );
    }

    #[test]
    fn seal_and_open_isolate_each_message() {
        let catalog = catalog();
        let messages = every_config_message();
        let mut envelope = catalog
            .seal(Envelope::new(titanedge_transport::CorrelationId(9)), &messages[..3])
            .unwrap();
        envelope.messages.insert(
            1,
            RawMessage {
                kind: "from_the_future".to_string(),
                payload: json!({}),
            },
        );

        let opened = catalog.open(&envelope);
        assert_eq!(opened.len(), 4);
        assert_eq!(opened[0].as_ref().unwrap(), &messages[0]);
        assert!(opened[1].is_err());
        assert_eq!(opened[2].as_ref().unwrap(), &messages[1]);
        assert_eq!(opened[3].as_ref().unwrap(), &messages[2]);
    }

    #[test]
    fn token_shapes_list_canonical_tokens_only() {
        let shape = MessageKind::OutputConnectorIut.shape();
        assert_eq!(
            shape.fields[0].ty,
            FieldType::Token(vec!["eotfScaling", "hable", "normative", "nbcu1"])
        );
        assert_eq!(IutName::Default.token(), "eotfScaling");
    }
}
