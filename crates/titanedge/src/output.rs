use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use titanedge_protocol::{FieldType, MessageCatalog, MessageKind, RawMessage};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One message as printed by `input`, `output`, `decode` and `loopback`.
#[derive(Debug, Serialize)]
pub struct MessageRecord {
    pub index: usize,
    pub kind: String,
    pub status: &'static str,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageRecord {
    pub fn ok(index: usize, raw: &RawMessage) -> Self {
        Self {
            index,
            kind: raw.kind.clone(),
            status: "ok",
            payload: raw.payload.clone(),
            error: None,
        }
    }

    pub fn rejected(index: usize, raw: &RawMessage, error: impl ToString) -> Self {
        Self {
            index,
            kind: raw.kind.clone(),
            status: "rejected",
            payload: raw.payload.clone(),
            error: Some(error.to_string()),
        }
    }
}

pub fn print_records(records: &[MessageRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "KIND", "STATUS", "PAYLOAD"]);
            for record in records {
                table.add_row(vec![
                    record.index.to_string(),
                    record.kind.clone(),
                    status_text(record),
                    record.payload.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                println!(
                    "#{} {} {} {}",
                    record.index,
                    record.kind,
                    status_text(record),
                    record.payload
                );
            }
        }
        OutputFormat::Raw => {
            for record in records {
                println!("{}", record.payload);
            }
        }
    }
}

#[derive(Serialize)]
struct KindOutput<'a> {
    kind: &'a str,
    reply: bool,
    fields: Vec<FieldOutput<'a>>,
}

#[derive(Serialize)]
struct FieldOutput<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: String,
}

pub fn print_kinds(catalog: &MessageCatalog, format: OutputFormat) {
    let kinds = catalog.kinds();
    match format {
        OutputFormat::Json => {
            for kind in kinds {
                let Some(shape) = catalog.shape(kind) else {
                    continue;
                };
                let out = KindOutput {
                    kind: kind.as_str(),
                    reply: kind.is_reply(),
                    fields: shape
                        .fields
                        .iter()
                        .map(|field| FieldOutput {
                            name: field.name,
                            ty: describe(&field.ty),
                        })
                        .collect(),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "FIELD", "TYPE"]);
            for kind in kinds {
                for (name, ty) in field_rows(catalog, kind) {
                    table.add_row(vec![kind.as_str().to_string(), name, ty]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for kind in kinds {
                let fields = field_rows(catalog, kind)
                    .into_iter()
                    .map(|(name, ty)| format!("{name}: {ty}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{kind} {{ {fields} }}");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn field_rows(catalog: &MessageCatalog, kind: MessageKind) -> Vec<(String, String)> {
    catalog
        .shape(kind)
        .map(|shape| {
            shape
                .fields
                .iter()
                .map(|field| (field.name.to_string(), describe(&field.ty)))
                .collect()
        })
        .unwrap_or_default()
}

fn describe(ty: &FieldType) -> String {
    match ty {
        FieldType::Bool => "bool".to_string(),
        FieldType::Integer { min, max } => format!("int {min}..={max}"),
        FieldType::Ipv4 => "ipv4".to_string(),
        FieldType::Text => "text".to_string(),
        FieldType::Token(tokens) => tokens.join("|"),
    }
}

fn status_text(record: &MessageRecord) -> String {
    match &record.error {
        Some(error) => format!("{}: {error}", record.status),
        None => record.status.to_string(),
    }
}
