//! Validating builders for configuration batches.
//!
//! Every setter checks its argument, then appends exactly one message.
//! Nothing is deduplicated: calling a setter twice queues two messages, and
//! the receiver applies both in order.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::enums::{
    AccelerationType, ColorimetryConversion, ConfigMode, InputType, IutName, SdiType, SmpteSkew,
    SourceSpecificMulticastMode, WireToken,
};
use crate::error::{ArgumentError, ConfigError, StateError, ValidationError};
use crate::message::{ConfigCommand, ConfigMessage, Message, Target};

/// Default IP and SMPTE 2022-7 port.
pub const DEFAULT_IP_PORT: i64 = 1234;

/// Default input buffer duration in milliseconds.
pub const DEFAULT_BUFFER_DURATION_MS: i64 = 50;

/// Default SMPTE 2022-7 custom skew in milliseconds.
pub const DEFAULT_CUSTOM_SKEW_MS: i64 = 0;

/// Default SMPTE 2022-7 secondary address.
pub const DEFAULT_SMPTE_2022_7_IP: &str = "0.0.0.0";

/// Receives finished batches from a builder's `send`.
pub trait ConfigSink {
    fn send_batch(&self, batch: ConfigBatch) -> Result<(), ConfigError>;
}

/// Ordered, non-empty run of messages for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBatch {
    target: Target,
    messages: Vec<ConfigMessage>,
}

impl ConfigBatch {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn messages(&self) -> &[ConfigMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false`; batches are never empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<ConfigMessage> {
        self.messages
    }

    /// The batch as catalog messages, ready to seal into an envelope.
    pub fn to_messages(&self) -> Vec<Message> {
        self.messages.iter().cloned().map(Message::Config).collect()
    }
}

/// Parse a strict dotted-quad IPv4 address.
///
/// Exactly four decimal octets in 0-255, no leading zeros, no surrounding or
/// embedded whitespace.
pub fn parse_strict_ipv4(text: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if part.len() > 1 && part.starts_with('0') {
            return None;
        }
        *octet = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn check_address(text: &str) -> Result<Ipv4Addr, ValidationError> {
    parse_strict_ipv4(text).ok_or_else(|| ValidationError::InvalidAddress(text.to_string()))
}

fn check_port(port: i64) -> Result<u16, ValidationError> {
    u16::try_from(port)
        .ok()
        .filter(|port| *port != 0)
        .ok_or(ValidationError::PortOutOfRange(port))
}

fn check_duration(ms: i64) -> Result<u32, ValidationError> {
    u32::try_from(ms).map_err(|_| ValidationError::NegativeDuration(ms))
}

#[derive(Debug, Clone)]
struct Accumulator {
    target: Target,
    messages: Vec<ConfigMessage>,
}

impl Accumulator {
    fn new(target: Target) -> Self {
        Self {
            target,
            messages: Vec::new(),
        }
    }

    fn push(&mut self, command: ConfigCommand) {
        self.messages.push(ConfigMessage::new(self.target, command));
    }

    fn build(&self) -> Result<ConfigBatch, StateError> {
        if self.messages.is_empty() {
            return Err(StateError::EmptyBatch);
        }
        Ok(ConfigBatch {
            target: self.target,
            messages: self.messages.clone(),
        })
    }

    fn send(&self, sink: Option<&dyn ConfigSink>) -> Result<(), ConfigError> {
        let sink = sink.ok_or(ArgumentError::NilChannel)?;
        let batch = self.build()?;
        debug!(
            channel = self.target.channel_index,
            target = self.target.target_index,
            mode = self.target.mode.token(),
            messages = batch.len(),
            "sending configuration batch"
        );
        sink.send_batch(batch)
    }
}

/// Builder for one input of one channel.
#[derive(Debug, Clone)]
pub struct InputConfiguration {
    inner: Accumulator,
}

impl InputConfiguration {
    pub fn new(channel_index: u32, input_index: u32, mode: ConfigMode) -> Self {
        Self {
            inner: Accumulator::new(Target::new(channel_index, input_index, mode)),
        }
    }

    pub fn enable_input(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableInput(enabled));
        self
    }

    pub fn set_ip_address(&mut self, address: &str) -> Result<&mut Self, ValidationError> {
        let address = check_address(address)?;
        self.inner.push(ConfigCommand::SetIpAddress(address));
        Ok(self)
    }

    pub fn set_input_type(&mut self, input_type: InputType) -> &mut Self {
        self.inner.push(ConfigCommand::SetInputType(input_type));
        self
    }

    /// Port must be in `1..=65535`. See [`DEFAULT_IP_PORT`].
    pub fn set_ip_port(&mut self, port: i64) -> Result<&mut Self, ValidationError> {
        let port = check_port(port)?;
        self.inner.push(ConfigCommand::SetIpPort(port));
        Ok(self)
    }

    pub fn set_input_interface(&mut self, interface: &str) -> &mut Self {
        self.inner.push(ConfigCommand::SetInterface(interface.to_string()));
        self
    }

    pub fn enable_input_fec(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableInputFec(enabled));
        self
    }

    /// Duration in milliseconds, `>= 0`. See [`DEFAULT_BUFFER_DURATION_MS`].
    pub fn set_buffer_duration(&mut self, ms: i64) -> Result<&mut Self, ValidationError> {
        let ms = check_duration(ms)?;
        self.inner.push(ConfigCommand::SetBufferDuration(ms));
        Ok(self)
    }

    pub fn enable_source_specific_multicast(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableSourceSpecificMulticast(enabled));
        self
    }

    pub fn set_source_specific_multicast_mode(
        &mut self,
        mode: SourceSpecificMulticastMode,
    ) -> &mut Self {
        self.inner.push(ConfigCommand::SetSourceSpecificMulticastMode(mode));
        self
    }

    pub fn enable_smpte_2022_7(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableSmpte2022_7(enabled));
        self
    }

    /// See [`DEFAULT_SMPTE_2022_7_IP`].
    pub fn set_smpte_2022_7_ip_address(
        &mut self,
        address: &str,
    ) -> Result<&mut Self, ValidationError> {
        let address = check_address(address)?;
        self.inner.push(ConfigCommand::SetSmpte2022_7IpAddress(address));
        Ok(self)
    }

    pub fn set_smpte_2022_7_port(&mut self, port: i64) -> Result<&mut Self, ValidationError> {
        let port = check_port(port)?;
        self.inner.push(ConfigCommand::SetSmpte2022_7Port(port));
        Ok(self)
    }

    pub fn set_smpte_2022_7_interface(&mut self, interface: &str) -> &mut Self {
        self.inner.push(ConfigCommand::SetSmpte2022_7Interface(interface.to_string()));
        self
    }

    pub fn set_smpte_2022_7_skew(&mut self, skew: SmpteSkew) -> &mut Self {
        self.inner.push(ConfigCommand::SetSmpte2022_7Skew(skew));
        self
    }

    /// Skew in milliseconds, `>= 0`. Used when the skew class is `Custom`.
    pub fn set_smpte_2022_7_custom_skew(&mut self, ms: i64) -> Result<&mut Self, ValidationError> {
        let ms = check_duration(ms)?;
        self.inner.push(ConfigCommand::SetSmpte2022_7CustomSkew(ms));
        Ok(self)
    }

    pub fn enable_input_vbr(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableInputVbr(enabled));
        self
    }

    pub fn enable_low_latency_fec(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::EnableLowLatencyFec(enabled));
        self
    }

    pub fn set_acceleration_type(&mut self, acceleration: AccelerationType) -> &mut Self {
        self.inner.push(ConfigCommand::SetAccelerationType(acceleration));
        self
    }

    pub fn target(&self) -> Target {
        self.inner.target
    }

    pub fn len(&self) -> usize {
        self.inner.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.messages.is_empty()
    }

    /// Snapshot the accumulated messages. The builder stays usable.
    pub fn build(&self) -> Result<ConfigBatch, StateError> {
        self.inner.build()
    }

    /// Build, then hand the batch to `sink`.
    pub fn send(&self, sink: Option<&dyn ConfigSink>) -> Result<(), ConfigError> {
        self.inner.send(sink)
    }
}

/// Builder for one output connector of one channel.
#[derive(Debug, Clone)]
pub struct OutputConfiguration {
    inner: Accumulator,
}

impl OutputConfiguration {
    pub fn new(channel_index: u32, connector_index: u32, mode: ConfigMode) -> Self {
        Self {
            inner: Accumulator::new(Target::new(channel_index, connector_index, mode)),
        }
    }

    /// Set the connector's SDI type.
    pub fn change_type(&mut self, sdi_type: SdiType) -> &mut Self {
        self.inner.push(ConfigCommand::OutputConnectorType(sdi_type));
        self
    }

    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.inner.push(ConfigCommand::OutputConnectorName(name.to_string()));
        self
    }

    pub fn enable_colorimetry(&mut self, enabled: bool) -> &mut Self {
        self.inner.push(ConfigCommand::OutputConnectorColorimetry(enabled));
        self
    }

    /// `ColorimetryConversion::Default` is queued as `Bt709`.
    pub fn set_colorimetry_conversion(&mut self, conversion: ColorimetryConversion) -> &mut Self {
        self.inner.push(ConfigCommand::OutputConnectorColorimetryConversion(
            conversion.canonical(),
        ));
        self
    }

    /// `IutName::Default` is queued as `EotfScaling`.
    pub fn set_iut_name(&mut self, iut: IutName) -> &mut Self {
        self.inner.push(ConfigCommand::OutputConnectorIut(iut.canonical()));
        self
    }

    pub fn target(&self) -> Target {
        self.inner.target
    }

    pub fn len(&self) -> usize {
        self.inner.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.messages.is_empty()
    }

    pub fn build(&self) -> Result<ConfigBatch, StateError> {
        self.inner.build()
    }

    pub fn send(&self, sink: Option<&dyn ConfigSink>) -> Result<(), ConfigError> {
        self.inner.send(sink)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::catalog::MessageKind;

    #[derive(Default)]
    struct RecordingSink {
        batches: RefCell<Vec<ConfigBatch>>,
    }

    impl ConfigSink for RecordingSink {
        fn send_batch(&self, batch: ConfigBatch) -> Result<(), ConfigError> {
            self.batches.borrow_mut().push(batch);
            Ok(())
        }
    }

    struct FailingSink;

    impl ConfigSink for FailingSink {
        fn send_batch(&self, _batch: ConfigBatch) -> Result<(), ConfigError> {
            Err(ConfigError::Delivery("bus down".into()))
        }
    }

    fn input() -> InputConfiguration {
        InputConfiguration::new(1, 1, ConfigMode::Encoder)
    }

    fn kinds(batch: &ConfigBatch) -> Vec<MessageKind> {
        batch.messages().iter().map(ConfigMessage::kind).collect()
    }

    #[test]
    fn accepts_strict_dotted_quads() {
        for address in ["0.0.0.0", "192.168.1.1", "255.255.255.255", "10.0.0.1", "1.2.3.4"] {
            let mut config = input();
            config.set_ip_address(address).unwrap();
            assert_eq!(config.len(), 1, "{address}");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for address in [
            "999.999.999.999",
            "",
            "   ",
            "abc",
            "256.0.0.1",
            "1.2.3",
            "1.2.3.4.5",
            "01.2.3.4",
            " 1.2.3.4",
            "1.2.3.4 ",
            "1.2.3.-4",
            "1..3.4",
            "+1.2.3.4",
        ] {
            let mut config = input();
            let err = config.set_ip_address(address).unwrap_err();
            assert_eq!(err, ValidationError::InvalidAddress(address.to_string()));
            assert!(config.is_empty(), "{address:?} should not queue a message");
        }
    }

    #[test]
    fn smpte_address_uses_same_rule() {
        let mut config = input();
        config
            .set_smpte_2022_7_ip_address(DEFAULT_SMPTE_2022_7_IP)
            .unwrap();
        assert!(config.set_smpte_2022_7_ip_address("300.1.1.1").is_err());
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn port_range_is_inclusive() {
        for port in [1, DEFAULT_IP_PORT, 65535] {
            let mut config = input();
            config.set_ip_port(port).unwrap();
            config.set_smpte_2022_7_port(port).unwrap();
            assert_eq!(config.len(), 2);
        }
        for port in [0, -1, 65536, 70000, i64::MIN, i64::MAX] {
            let mut config = input();
            assert_eq!(
                config.set_ip_port(port).unwrap_err(),
                ValidationError::PortOutOfRange(port)
            );
            assert_eq!(
                config.set_smpte_2022_7_port(port).unwrap_err(),
                ValidationError::PortOutOfRange(port)
            );
            assert!(config.is_empty());
        }
    }

    #[test]
    fn durations_must_be_non_negative() {
        let mut config = input();
        config
            .set_buffer_duration(0)
            .unwrap()
            .set_buffer_duration(DEFAULT_BUFFER_DURATION_MS)
            .unwrap()
            .set_smpte_2022_7_custom_skew(DEFAULT_CUSTOM_SKEW_MS)
            .unwrap()
            .set_smpte_2022_7_custom_skew(450)
            .unwrap();
        assert_eq!(config.len(), 4);

        assert_eq!(
            config.set_buffer_duration(-1).unwrap_err(),
            ValidationError::NegativeDuration(-1)
        );
        assert_eq!(
            config.set_smpte_2022_7_custom_skew(-10).unwrap_err(),
            ValidationError::NegativeDuration(-10)
        );
        assert_eq!(config.len(), 4);
    }

    #[test]
    fn each_setter_appends_one_message_of_its_kind() {
        let cases: [(MessageKind, fn(&mut InputConfiguration)); 12] = [
            (MessageKind::EnableInput, |c| {
                c.enable_input(true);
            }),
            (MessageKind::SetInputType, |c| {
                c.set_input_type(InputType::Zixi);
            }),
            (MessageKind::SetInterface, |c| {
                c.set_input_interface("eth0");
            }),
            (MessageKind::EnableInputFec, |c| {
                c.enable_input_fec(true);
            }),
            (MessageKind::EnableSourceSpecificMulticast, |c| {
                c.enable_source_specific_multicast(false);
            }),
            (MessageKind::SetSourceSpecificMulticastMode, |c| {
                c.set_source_specific_multicast_mode(SourceSpecificMulticastMode::Include);
            }),
            (MessageKind::EnableSmpte2022_7, |c| {
                c.enable_smpte_2022_7(true);
            }),
            (MessageKind::SetSmpte2022_7Interface, |c| {
                c.set_smpte_2022_7_interface("eth1");
            }),
            (MessageKind::SetSmpte2022_7Skew, |c| {
                c.set_smpte_2022_7_skew(SmpteSkew::Moderate);
            }),
            (MessageKind::EnableInputVbr, |c| {
                c.enable_input_vbr(false);
            }),
            (MessageKind::EnableLowLatencyFec, |c| {
                c.enable_low_latency_fec(true);
            }),
            (MessageKind::SetAccelerationType, |c| {
                c.set_acceleration_type(AccelerationType::Rivermax);
            }),
        ];

        for (kind, apply) in cases {
            let mut config = input();
            apply(&mut config);
            let batch = config.build().unwrap();
            assert_eq!(kinds(&batch), vec![kind]);
            assert_eq!(batch.target(), Target::new(1, 1, ConfigMode::Encoder));
        }
    }

    #[test]
    fn reference_input_chain_yields_seventeen_messages_in_order() {
        let mut config = InputConfiguration::new(2, 0, ConfigMode::Decoder);
        config
            .enable_input(true)
            .set_ip_address("192.168.1.1")
            .unwrap()
            .set_input_type(InputType::Ip)
            .set_ip_port(1234)
            .unwrap()
            .set_input_interface("eth0")
            .enable_input_fec(true)
            .set_buffer_duration(100)
            .unwrap()
            .enable_source_specific_multicast(true)
            .set_source_specific_multicast_mode(SourceSpecificMulticastMode::Include)
            .enable_smpte_2022_7(true)
            .set_smpte_2022_7_ip_address("10.0.0.1")
            .unwrap()
            .set_smpte_2022_7_port(1234)
            .unwrap()
            .set_smpte_2022_7_interface("eth1")
            .set_smpte_2022_7_skew(SmpteSkew::High)
            .set_smpte_2022_7_custom_skew(123)
            .unwrap()
            .enable_input_vbr(true)
            .enable_low_latency_fec(true);

        let batch = config.build().unwrap();
        assert_eq!(batch.len(), 17);
        assert_eq!(
            kinds(&batch),
            vec![
                MessageKind::EnableInput,
                MessageKind::SetIpAddress,
                MessageKind::SetInputType,
                MessageKind::SetIpPort,
                MessageKind::SetInterface,
                MessageKind::EnableInputFec,
                MessageKind::SetBufferDuration,
                MessageKind::EnableSourceSpecificMulticast,
                MessageKind::SetSourceSpecificMulticastMode,
                MessageKind::EnableSmpte2022_7,
                MessageKind::SetSmpte2022_7IpAddress,
                MessageKind::SetSmpte2022_7Port,
                MessageKind::SetSmpte2022_7Interface,
                MessageKind::SetSmpte2022_7Skew,
                MessageKind::SetSmpte2022_7CustomSkew,
                MessageKind::EnableInputVbr,
                MessageKind::EnableLowLatencyFec,
            ]
        );
        assert_eq!(
            batch.messages()[1].command(),
            &ConfigCommand::SetIpAddress(Ipv4Addr::new(192, 168, 1, 1))
        );
        assert!(batch
            .messages()
            .iter()
            .all(|m| m.target() == Target::new(2, 0, ConfigMode::Decoder)));
    }

    #[test]
    fn output_chain_preserves_order() {
        let mut config = OutputConfiguration::new(1, 2, ConfigMode::Decoder);
        config
            .change_type(SdiType::HdSdi)
            .set_name("Output 1")
            .enable_colorimetry(true)
            .set_colorimetry_conversion(ColorimetryConversion::Hdr10)
            .set_iut_name(IutName::Hable);

        let batch = config.build().unwrap();
        assert_eq!(
            kinds(&batch),
            vec![
                MessageKind::OutputConnectorType,
                MessageKind::OutputConnectorName,
                MessageKind::OutputConnectorColorimetry,
                MessageKind::OutputConnectorColorimetryConversion,
                MessageKind::OutputConnectorIut,
            ]
        );
    }

    #[test]
    fn output_aliases_are_queued_canonically() {
        let mut config = OutputConfiguration::new(0, 0, ConfigMode::Encoder);
        config
            .set_colorimetry_conversion(ColorimetryConversion::Default)
            .set_iut_name(IutName::Default);

        let batch = config.build().unwrap();
        assert_eq!(
            batch.messages()[0].command(),
            &ConfigCommand::OutputConnectorColorimetryConversion(ColorimetryConversion::Bt709)
        );
        assert_eq!(
            batch.messages()[1].command(),
            &ConfigCommand::OutputConnectorIut(IutName::EotfScaling)
        );
    }

    #[test]
    fn repeated_setters_are_not_collapsed() {
        let mut config = input();
        config.enable_input(true).enable_input(false).enable_input(true);
        let batch = config.build().unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch.messages()[1].command(),
            &ConfigCommand::EnableInput(false)
        );
    }

    #[test]
    fn empty_builders_refuse_to_build() {
        assert_eq!(input().build().unwrap_err(), StateError::EmptyBatch);
        assert_eq!(
            OutputConfiguration::new(0, 0, ConfigMode::Encoder)
                .build()
                .unwrap_err(),
            StateError::EmptyBatch
        );
    }

    #[test]
    fn build_is_a_snapshot() {
        let mut config = input();
        config.enable_input(true);
        let first = config.build().unwrap();
        config.enable_input_vbr(true);
        let second = config.build().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn send_without_channel_fails_before_building() {
        let err = input().send(None).unwrap_err();
        assert!(matches!(err, ConfigError::Argument(ArgumentError::NilChannel)));

        let mut config = input();
        config.enable_input(true);
        let err = config.send(None).unwrap_err();
        assert!(matches!(err, ConfigError::Argument(ArgumentError::NilChannel)));
    }

    #[test]
    fn send_empty_batch_fails() {
        let sink = RecordingSink::default();
        let err = input().send(Some(&sink)).unwrap_err();
        assert!(matches!(err, ConfigError::State(StateError::EmptyBatch)));
        assert!(sink.batches.borrow().is_empty());
    }

    #[test]
    fn send_hands_batch_to_sink() {
        let sink = RecordingSink::default();
        let mut config = OutputConfiguration::new(4, 1, ConfigMode::Encoder);
        config.set_name("PGM");
        config.send(Some(&sink)).unwrap();

        let batches = sink.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].target(), Target::new(4, 1, ConfigMode::Encoder));
        assert_eq!(
            batches[0].to_messages()[0].kind(),
            MessageKind::OutputConnectorName
        );
    }

    #[test]
    fn sink_failures_propagate() {
        let mut config = input();
        config.enable_input(true);
        let err = config.send(Some(&FailingSink)).unwrap_err();
        assert!(matches!(err, ConfigError::Delivery(_)));
    }

    #[test]
    fn parsed_tokens_feed_typed_setters() {
        let mut config = input();
        let input_type: InputType = "hls".parse().unwrap();
        config.set_input_type(input_type);
        assert!("999".parse::<InputType>().is_err());
        assert_eq!(config.len(), 1);
    }
}
