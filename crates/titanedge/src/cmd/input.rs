use titanedge_protocol::{
    AccelerationType, ConfigError, ConfigMode, InputConfiguration, InputType, SmpteSkew,
    SourceSpecificMulticastMode, ValidationError,
};

use crate::cmd::{emit_batch, parse_token, InputArgs};
use crate::exit::{config_error, CliError, CliResult};
use crate::output::OutputFormat;

pub fn run(args: InputArgs, format: OutputFormat) -> CliResult<i32> {
    let config = configure(&args)?;
    let batch = config
        .build()
        .map_err(|err| config_error("nothing to send", err.into()))?;
    emit_batch(&batch, args.out.as_deref(), format)
}

/// Apply every flag that was given, in declaration order.
fn configure(args: &InputArgs) -> CliResult<InputConfiguration> {
    let mode = parse_token::<ConfigMode>("mode", &args.mode)?;
    let mut config = InputConfiguration::new(args.channel, args.input, mode);

    if let Some(enabled) = args.enable {
        config.enable_input(enabled);
    }
    if let Some(ip) = &args.ip {
        config.set_ip_address(ip).map_err(invalid("ip"))?;
    }
    if let Some(input_type) = &args.input_type {
        config.set_input_type(parse_token::<InputType>("type", input_type)?);
    }
    if let Some(port) = args.port {
        config.set_ip_port(port).map_err(invalid("port"))?;
    }
    if let Some(interface) = &args.interface {
        config.set_input_interface(interface);
    }
    if let Some(enabled) = args.fec {
        config.enable_input_fec(enabled);
    }
    if let Some(ms) = args.buffer_ms {
        config.set_buffer_duration(ms).map_err(invalid("buffer-ms"))?;
    }
    if let Some(enabled) = args.ssm {
        config.enable_source_specific_multicast(enabled);
    }
    if let Some(mode) = &args.ssm_mode {
        config.set_source_specific_multicast_mode(parse_token::<SourceSpecificMulticastMode>(
            "ssm-mode", mode,
        )?);
    }
    if let Some(enabled) = args.smpte {
        config.enable_smpte_2022_7(enabled);
    }
    if let Some(ip) = &args.smpte_ip {
        config
            .set_smpte_2022_7_ip_address(ip)
            .map_err(invalid("smpte-ip"))?;
    }
    if let Some(port) = args.smpte_port {
        config
            .set_smpte_2022_7_port(port)
            .map_err(invalid("smpte-port"))?;
    }
    if let Some(interface) = &args.smpte_interface {
        config.set_smpte_2022_7_interface(interface);
    }
    if let Some(skew) = &args.smpte_skew {
        config.set_smpte_2022_7_skew(parse_token::<SmpteSkew>("smpte-skew", skew)?);
    }
    if let Some(ms) = args.smpte_custom_skew_ms {
        config
            .set_smpte_2022_7_custom_skew(ms)
            .map_err(invalid("smpte-custom-skew-ms"))?;
    }
    if let Some(enabled) = args.vbr {
        config.enable_input_vbr(enabled);
    }
    if let Some(enabled) = args.low_latency_fec {
        config.enable_low_latency_fec(enabled);
    }
    if let Some(acceleration) = &args.acceleration {
        config.set_acceleration_type(parse_token::<AccelerationType>(
            "acceleration",
            acceleration,
        )?);
    }

    Ok(config)
}

fn invalid(flag: &'static str) -> impl Fn(ValidationError) -> CliError {
    move |err| config_error(&format!("--{flag}"), ConfigError::from(err))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use titanedge_protocol::MessageKind;

    use super::*;
    use crate::exit::USAGE;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: InputArgs,
    }

    fn args(extra: &[&str]) -> InputArgs {
        let mut argv = vec!["input", "1", "2"];
        argv.extend_from_slice(extra);
        Harness::parse_from(argv).args
    }

    #[test]
    fn flags_become_messages_in_order() {
        let config = configure(&args(&[
            "--enable", "true", "--ip", "239.0.0.1", "--port", "5000", "--vbr", "false",
        ]))
        .unwrap();
        let batch = config.build().unwrap();
        let kinds: Vec<_> = batch.messages().iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::EnableInput,
                MessageKind::SetIpAddress,
                MessageKind::SetIpPort,
                MessageKind::EnableInputVbr,
            ]
        );
        assert_eq!(batch.target().channel_index, 1);
        assert_eq!(batch.target().target_index, 2);
    }

    #[test]
    fn invalid_port_is_usage_error() {
        let err = configure(&args(&["--port", "-1"])).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("--port"));
    }

    #[test]
    fn no_flags_builds_nothing() {
        let config = configure(&args(&[])).unwrap();
        assert!(config.is_empty());
    }
}
