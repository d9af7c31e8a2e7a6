use titanedge_protocol::MessageKind;

use crate::cmd::{standard_catalog, KindsArgs};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_kinds, OutputFormat};

pub fn run(args: KindsArgs, format: OutputFormat) -> CliResult<i32> {
    let catalog = standard_catalog()?;

    if let Some(tag) = &args.schema {
        let kind = MessageKind::from_tag(tag)
            .ok_or_else(|| CliError::new(USAGE, format!("unknown message kind: {tag}")))?;
        let Some(shape) = catalog.shape(kind) else {
            return Err(CliError::new(USAGE, format!("kind not registered: {tag}")));
        };
        let schema = shape.to_schema();
        println!(
            "{}",
            serde_json::to_string_pretty(&schema).unwrap_or_else(|_| schema.to_string())
        );
        return Ok(SUCCESS);
    }

    print_kinds(&catalog, format);
    Ok(SUCCESS)
}
