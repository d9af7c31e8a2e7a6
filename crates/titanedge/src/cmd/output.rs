use titanedge_protocol::{ColorimetryConversion, ConfigMode, IutName, OutputConfiguration, SdiType};

use crate::cmd::{emit_batch, parse_token, OutputArgs};
use crate::exit::{config_error, CliResult};
use crate::output::OutputFormat;

pub fn run(args: OutputArgs, format: OutputFormat) -> CliResult<i32> {
    let config = configure(&args)?;
    let batch = config
        .build()
        .map_err(|err| config_error("nothing to send", err.into()))?;
    emit_batch(&batch, args.out.as_deref(), format)
}

fn configure(args: &OutputArgs) -> CliResult<OutputConfiguration> {
    let mode = parse_token::<ConfigMode>("mode", &args.mode)?;
    let mut config = OutputConfiguration::new(args.channel, args.connector, mode);

    if let Some(sdi_type) = &args.sdi_type {
        config.change_type(parse_token::<SdiType>("type", sdi_type)?);
    }
    if let Some(name) = &args.name {
        config.set_name(name);
    }
    if let Some(enabled) = args.colorimetry {
        config.enable_colorimetry(enabled);
    }
    if let Some(conversion) = &args.conversion {
        config.set_colorimetry_conversion(parse_token::<ColorimetryConversion>(
            "conversion",
            conversion,
        )?);
    }
    if let Some(iut) = &args.iut {
        config.set_iut_name(parse_token::<IutName>("iut", iut)?);
    }

    Ok(config)
}
