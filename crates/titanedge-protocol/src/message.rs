use std::net::Ipv4Addr;

use serde_json::{Map, Value};

use crate::catalog::MessageKind;
use crate::enums::{
    AccelerationType, ColorimetryConversion, ConfigMode, InputType, IutName, SdiType, SmpteSkew,
    SourceSpecificMulticastMode, WireToken,
};

/// Wire field names shared by every payload shape.
pub mod fields {
    pub const CHANNEL_INDEX: &str = "channelIndex";
    pub const TARGET_INDEX: &str = "targetIndex";
    pub const MODE: &str = "mode";

    pub const IS_ENABLED: &str = "isEnabled";
    pub const IP_ADDRESS: &str = "ipAddress";
    pub const INPUT_TYPE: &str = "inputType";
    pub const PORT: &str = "port";
    pub const INTERFACE: &str = "interface";
    pub const DURATION_MS: &str = "durationMs";
    pub const SSM_MODE: &str = "multicastMode";
    pub const INTERFACE_NAME: &str = "interfaceName";
    pub const SKEW: &str = "skew";
    pub const CUSTOM_SKEW_MS: &str = "customSkewMs";
    pub const ACCELERATION_TYPE: &str = "accelerationType";
    pub const SDI_TYPE: &str = "sdiType";
    pub const NAME: &str = "name";
    pub const CONVERSION: &str = "conversion";
    pub const IUT: &str = "iut";
    pub const ACKNOWLEDGES: &str = "acknowledges";
    pub const REASON: &str = "reason";
}

/// The (channel, connector, mode) triple a message applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub channel_index: u32,
    /// Input or output connector index within the channel.
    pub target_index: u32,
    pub mode: ConfigMode,
}

impl Target {
    pub const fn new(channel_index: u32, target_index: u32, mode: ConfigMode) -> Self {
        Self {
            channel_index,
            target_index,
            mode,
        }
    }
}

/// One scalar value in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    fn into_json(self) -> Value {
        match self {
            FieldValue::Bool(v) => Value::Bool(v),
            FieldValue::Int(v) => Value::from(v),
            FieldValue::Text(v) => Value::String(v),
        }
    }
}

/// The field mutation carried by a configuration message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    EnableInput(bool),
    SetIpAddress(Ipv4Addr),
    SetInputType(InputType),
    SetIpPort(u16),
    SetInterface(String),
    EnableInputFec(bool),
    /// Buffer duration in milliseconds.
    SetBufferDuration(u32),
    EnableSourceSpecificMulticast(bool),
    SetSourceSpecificMulticastMode(SourceSpecificMulticastMode),
    EnableSmpte2022_7(bool),
    SetSmpte2022_7IpAddress(Ipv4Addr),
    SetSmpte2022_7Port(u16),
    SetSmpte2022_7Interface(String),
    SetSmpte2022_7Skew(SmpteSkew),
    /// Custom skew in milliseconds.
    SetSmpte2022_7CustomSkew(u32),
    EnableInputVbr(bool),
    EnableLowLatencyFec(bool),
    SetAccelerationType(AccelerationType),
    OutputConnectorType(SdiType),
    OutputConnectorName(String),
    OutputConnectorColorimetry(bool),
    OutputConnectorColorimetryConversion(ColorimetryConversion),
    OutputConnectorIut(IutName),
}

impl ConfigCommand {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::EnableInput(_) => MessageKind::EnableInput,
            Self::SetIpAddress(_) => MessageKind::SetIpAddress,
            Self::SetInputType(_) => MessageKind::SetInputType,
            Self::SetIpPort(_) => MessageKind::SetIpPort,
            Self::SetInterface(_) => MessageKind::SetInterface,
            Self::EnableInputFec(_) => MessageKind::EnableInputFec,
            Self::SetBufferDuration(_) => MessageKind::SetBufferDuration,
            Self::EnableSourceSpecificMulticast(_) => MessageKind::EnableSourceSpecificMulticast,
            Self::SetSourceSpecificMulticastMode(_) => {
                MessageKind::SetSourceSpecificMulticastMode
            }
            Self::EnableSmpte2022_7(_) => MessageKind::EnableSmpte2022_7,
            Self::SetSmpte2022_7IpAddress(_) => MessageKind::SetSmpte2022_7IpAddress,
            Self::SetSmpte2022_7Port(_) => MessageKind::SetSmpte2022_7Port,
            Self::SetSmpte2022_7Interface(_) => MessageKind::SetSmpte2022_7Interface,
            Self::SetSmpte2022_7Skew(_) => MessageKind::SetSmpte2022_7Skew,
            Self::SetSmpte2022_7CustomSkew(_) => MessageKind::SetSmpte2022_7CustomSkew,
            Self::EnableInputVbr(_) => MessageKind::EnableInputVbr,
            Self::EnableLowLatencyFec(_) => MessageKind::EnableLowLatencyFec,
            Self::SetAccelerationType(_) => MessageKind::SetAccelerationType,
            Self::OutputConnectorType(_) => MessageKind::OutputConnectorType,
            Self::OutputConnectorName(_) => MessageKind::OutputConnectorName,
            Self::OutputConnectorColorimetry(_) => MessageKind::OutputConnectorColorimetry,
            Self::OutputConnectorColorimetryConversion(_) => {
                MessageKind::OutputConnectorColorimetryConversion
            }
            Self::OutputConnectorIut(_) => MessageKind::OutputConnectorIut,
        }
    }

    /// The value field rendered in the receiver's vocabulary.
    pub fn wire_value(&self) -> (&'static str, FieldValue) {
        use fields::*;
        use FieldValue::{Bool, Int, Text};

        match self {
            Self::EnableInput(v)
            | Self::EnableInputFec(v)
            | Self::EnableSourceSpecificMulticast(v)
            | Self::EnableSmpte2022_7(v)
            | Self::EnableInputVbr(v)
            | Self::EnableLowLatencyFec(v)
            | Self::OutputConnectorColorimetry(v) => (IS_ENABLED, Bool(*v)),
            Self::SetIpAddress(ip) | Self::SetSmpte2022_7IpAddress(ip) => {
                (IP_ADDRESS, Text(ip.to_string()))
            }
            Self::SetInputType(v) => (INPUT_TYPE, Text(v.token().to_string())),
            Self::SetIpPort(port) | Self::SetSmpte2022_7Port(port) => {
                (PORT, Int(i64::from(*port)))
            }
            Self::SetInterface(name) => (INTERFACE, Text(name.clone())),
            Self::SetBufferDuration(ms) => (DURATION_MS, Int(i64::from(*ms))),
            Self::SetSourceSpecificMulticastMode(v) => (SSM_MODE, Text(v.token().to_string())),
            Self::SetSmpte2022_7Interface(name) => (INTERFACE_NAME, Text(name.clone())),
            Self::SetSmpte2022_7Skew(v) => (SKEW, Text(v.token().to_string())),
            Self::SetSmpte2022_7CustomSkew(ms) => (CUSTOM_SKEW_MS, Int(i64::from(*ms))),
            Self::SetAccelerationType(v) => (ACCELERATION_TYPE, Text(v.token().to_string())),
            Self::OutputConnectorType(v) => (SDI_TYPE, Text(v.token().to_string())),
            Self::OutputConnectorName(name) => (NAME, Text(name.clone())),
            Self::OutputConnectorColorimetryConversion(v) => {
                (CONVERSION, Text(v.token().to_string()))
            }
            Self::OutputConnectorIut(v) => (IUT, Text(v.token().to_string())),
        }
    }
}

/// A single field mutation on one target.
///
/// Only builders (and the catalog, on decode) construct these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMessage {
    target: Target,
    command: ConfigCommand,
}

impl ConfigMessage {
    pub(crate) fn new(target: Target, command: ConfigCommand) -> Self {
        Self { target, command }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn channel_index(&self) -> u32 {
        self.target.channel_index
    }

    pub fn target_index(&self) -> u32 {
        self.target.target_index
    }

    pub fn mode(&self) -> ConfigMode {
        self.target.mode
    }

    pub fn command(&self) -> &ConfigCommand {
        &self.command
    }

    pub fn kind(&self) -> MessageKind {
        self.command.kind()
    }
}

/// How a receiver handled one configuration message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Applied,
    Rejected { reason: String },
}

/// Receiver acknowledgement for one configuration message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigReply {
    pub target: Target,
    /// Kind of the message being acknowledged.
    pub acknowledges: MessageKind,
    pub outcome: ReplyOutcome,
}

impl ConfigReply {
    pub fn is_applied(&self) -> bool {
        self.outcome == ReplyOutcome::Applied
    }
}

/// Any message the catalog can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Config(ConfigMessage),
    Reply(ConfigReply),
}

impl Message {
    /// Reply acknowledging that `request` was applied.
    pub fn applied(request: &ConfigMessage) -> Self {
        Message::Reply(ConfigReply {
            target: request.target,
            acknowledges: request.kind(),
            outcome: ReplyOutcome::Applied,
        })
    }

    /// Reply reporting that `request` was refused.
    pub fn rejected(request: &ConfigMessage, reason: impl Into<String>) -> Self {
        Message::Reply(ConfigReply {
            target: request.target,
            acknowledges: request.kind(),
            outcome: ReplyOutcome::Rejected {
                reason: reason.into(),
            },
        })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Config(msg) => msg.kind(),
            Message::Reply(reply) => match reply.outcome {
                ReplyOutcome::Applied => MessageKind::ConfigApplied,
                ReplyOutcome::Rejected { .. } => MessageKind::ConfigRejected,
            },
        }
    }

    pub fn target(&self) -> Target {
        match self {
            Message::Config(msg) => msg.target,
            Message::Reply(reply) => reply.target,
        }
    }

    pub fn as_config(&self) -> Option<&ConfigMessage> {
        match self {
            Message::Config(msg) => Some(msg),
            Message::Reply(_) => None,
        }
    }

    pub fn as_reply(&self) -> Option<&ConfigReply> {
        match self {
            Message::Reply(reply) => Some(reply),
            Message::Config(_) => None,
        }
    }

    /// Render target and value fields as a JSON object.
    pub(crate) fn to_wire(&self) -> Map<String, Value> {
        let target = self.target();
        let mut map = Map::new();
        map.insert(
            fields::CHANNEL_INDEX.to_string(),
            Value::from(target.channel_index),
        );
        map.insert(
            fields::TARGET_INDEX.to_string(),
            Value::from(target.target_index),
        );
        map.insert(
            fields::MODE.to_string(),
            Value::String(target.mode.token().to_string()),
        );

        match self {
            Message::Config(msg) => {
                let (name, value) = msg.command.wire_value();
                map.insert(name.to_string(), value.into_json());
            }
            Message::Reply(reply) => {
                map.insert(
                    fields::ACKNOWLEDGES.to_string(),
                    Value::String(reply.acknowledges.as_str().to_string()),
                );
                if let ReplyOutcome::Rejected { reason } = &reply.outcome {
                    map.insert(fields::REASON.to_string(), Value::String(reason.clone()));
                }
            }
        }
        map
    }

    /// Rebuild a message of `kind` from a payload that already matched its shape.
    pub(crate) fn from_wire(
        kind: MessageKind,
        payload: &Map<String, Value>,
    ) -> std::result::Result<Self, String> {
        use fields::*;
        use ConfigCommand as C;

        let values = PayloadFields(payload);
        let target = Target::new(
            values.u32(CHANNEL_INDEX)?,
            values.u32(TARGET_INDEX)?,
            values.token(MODE)?,
        );

        let command = match kind {
            MessageKind::EnableInput => C::EnableInput(values.bool(IS_ENABLED)?),
            MessageKind::SetIpAddress => C::SetIpAddress(values.ipv4(IP_ADDRESS)?),
            MessageKind::SetInputType => C::SetInputType(values.token(INPUT_TYPE)?),
            MessageKind::SetIpPort => C::SetIpPort(values.port(PORT)?),
            MessageKind::SetInterface => C::SetInterface(values.text(INTERFACE)?),
            MessageKind::EnableInputFec => C::EnableInputFec(values.bool(IS_ENABLED)?),
            MessageKind::SetBufferDuration => C::SetBufferDuration(values.u32(DURATION_MS)?),
            MessageKind::EnableSourceSpecificMulticast => {
                C::EnableSourceSpecificMulticast(values.bool(IS_ENABLED)?)
            }
            MessageKind::SetSourceSpecificMulticastMode => {
                C::SetSourceSpecificMulticastMode(values.token(SSM_MODE)?)
            }
            MessageKind::EnableSmpte2022_7 => C::EnableSmpte2022_7(values.bool(IS_ENABLED)?),
            MessageKind::SetSmpte2022_7IpAddress => {
                C::SetSmpte2022_7IpAddress(values.ipv4(IP_ADDRESS)?)
            }
            MessageKind::SetSmpte2022_7Port => C::SetSmpte2022_7Port(values.port(PORT)?),
            MessageKind::SetSmpte2022_7Interface => {
                C::SetSmpte2022_7Interface(values.text(INTERFACE_NAME)?)
            }
            MessageKind::SetSmpte2022_7Skew => C::SetSmpte2022_7Skew(values.token(SKEW)?),
            MessageKind::SetSmpte2022_7CustomSkew => {
                C::SetSmpte2022_7CustomSkew(values.u32(CUSTOM_SKEW_MS)?)
            }
            MessageKind::EnableInputVbr => C::EnableInputVbr(values.bool(IS_ENABLED)?),
            MessageKind::EnableLowLatencyFec => C::EnableLowLatencyFec(values.bool(IS_ENABLED)?),
            MessageKind::SetAccelerationType => {
                C::SetAccelerationType(values.token(ACCELERATION_TYPE)?)
            }
            MessageKind::OutputConnectorType => C::OutputConnectorType(values.token(SDI_TYPE)?),
            MessageKind::OutputConnectorName => C::OutputConnectorName(values.text(NAME)?),
            MessageKind::OutputConnectorColorimetry => {
                C::OutputConnectorColorimetry(values.bool(IS_ENABLED)?)
            }
            MessageKind::OutputConnectorColorimetryConversion => {
                C::OutputConnectorColorimetryConversion(values.token(CONVERSION)?)
            }
            MessageKind::OutputConnectorIut => C::OutputConnectorIut(values.token(IUT)?),
            MessageKind::ConfigApplied | MessageKind::ConfigRejected => {
                let acknowledges = values.text(ACKNOWLEDGES)?;
                let acknowledges = MessageKind::from_tag(&acknowledges)
                    .ok_or_else(|| format!("{ACKNOWLEDGES}: unknown kind {acknowledges:?}"))?;
                let outcome = if kind == MessageKind::ConfigApplied {
                    ReplyOutcome::Applied
                } else {
                    ReplyOutcome::Rejected {
                        reason: values.text(REASON)?,
                    }
                };
                return Ok(Message::Reply(ConfigReply {
                    target,
                    acknowledges,
                    outcome,
                }));
            }
        };

        Ok(Message::Config(ConfigMessage::new(target, command)))
    }
}

impl From<ConfigMessage> for Message {
    fn from(msg: ConfigMessage) -> Self {
        Message::Config(msg)
    }
}

struct PayloadFields<'a>(&'a Map<String, Value>);

impl PayloadFields<'_> {
    fn get(&self, name: &str) -> std::result::Result<&Value, String> {
        self.0.get(name).ok_or_else(|| format!("missing field {name}"))
    }

    fn bool(&self, name: &str) -> std::result::Result<bool, String> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| format!("{name}: expected boolean"))
    }

    fn u32(&self, name: &str) -> std::result::Result<u32, String> {
        self.get(name)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| format!("{name}: expected integer in 0..={}", u32::MAX))
    }

    fn port(&self, name: &str) -> std::result::Result<u16, String> {
        self.get(name)?
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .filter(|v| *v != 0)
            .ok_or_else(|| format!("{name}: expected port in 1..=65535"))
    }

    fn text(&self, name: &str) -> std::result::Result<String, String> {
        self.get(name)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| format!("{name}: expected string"))
    }

    fn ipv4(&self, name: &str) -> std::result::Result<Ipv4Addr, String> {
        let text = self.text(name)?;
        crate::builder::parse_strict_ipv4(&text)
            .ok_or_else(|| format!("{name}: invalid IPv4 {text:?}"))
    }

    fn token<T: WireToken>(&self, name: &str) -> std::result::Result<T, String> {
        let text = self.text(name)?;
        T::from_token(&text).ok_or_else(|| format!("{name}: undefined {} token {text:?}", T::NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new(1, 2, ConfigMode::Decoder)
    }

    #[test]
    fn enum_payloads_render_wire_tokens() {
        let cmd =
            ConfigCommand::OutputConnectorColorimetryConversion(ColorimetryConversion::SdrWcg);
        assert_eq!(
            cmd.wire_value(),
            ("conversion", FieldValue::Text("sdrWcg".to_string()))
        );

        let cmd = ConfigCommand::OutputConnectorType(SdiType::Sdi1080p);
        assert_eq!(
            cmd.wire_value(),
            ("sdiType", FieldValue::Text("1080p_sdi".to_string()))
        );
    }

    #[test]
    fn to_wire_carries_target_fields() {
        let msg = Message::Config(ConfigMessage::new(target(), ConfigCommand::SetIpPort(5000)));
        let wire = msg.to_wire();
        assert_eq!(wire["channelIndex"], 1);
        assert_eq!(wire["targetIndex"], 2);
        assert_eq!(wire["mode"], "decoder");
        assert_eq!(wire["port"], 5000);
        assert_eq!(wire.len(), 4);
    }

    #[test]
    fn from_wire_rebuilds_message() {
        let msg = Message::Config(ConfigMessage::new(
            target(),
            ConfigCommand::SetSmpte2022_7IpAddress(Ipv4Addr::new(10, 0, 0, 1)),
        ));
        let back = Message::from_wire(msg.kind(), &msg.to_wire()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn replies_reference_the_acknowledged_kind() {
        let request = ConfigMessage::new(target(), ConfigCommand::EnableInput(true));
        let applied = Message::applied(&request);
        assert_eq!(applied.kind(), MessageKind::ConfigApplied);
        assert_eq!(applied.target(), target());

        let rejected = Message::rejected(&request, "input locked");
        assert_eq!(rejected.kind(), MessageKind::ConfigRejected);
        let reply = rejected.as_reply().unwrap();
        assert_eq!(reply.acknowledges, MessageKind::EnableInput);
        assert!(!reply.is_applied());

        let wire = rejected.to_wire();
        assert_eq!(wire["acknowledges"], "enable_input");
        assert_eq!(wire["reason"], "input locked");
    }

    #[test]
    fn from_wire_rejects_undefined_token() {
        let msg = Message::Config(ConfigMessage::new(
            target(),
            ConfigCommand::SetInputType(InputType::Srt),
        ));
        let mut wire = msg.to_wire();
        wire.insert("inputType".to_string(), Value::String("carrier-pigeon".into()));
        let err = Message::from_wire(MessageKind::SetInputType, &wire).unwrap_err();
        assert!(err.contains("InputType"));
    }
}
