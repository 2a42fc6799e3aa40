use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

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

/// One named, already formatted value of a decoded PDU or descriptor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }

    pub fn hex64(name: &'static str, value: u64) -> Self {
        Self::new(name, format!("0x{value:016x}"))
    }
}

#[derive(Serialize)]
struct FieldsOutput<'a> {
    kind: &'a str,
    fields: &'a [Field],
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    command: &'a str,
    length: usize,
    frame: String,
}

/// Print a decoded structure. `Raw` prints `name=value` lines.
pub fn print_fields(kind: &str, fields: &[Field], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FieldsOutput { kind, fields };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", kind]);
            for field in fields {
                table.add_row(vec![field.name.to_string(), field.value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{kind}");
            let width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
            for field in fields {
                println!("  {:width$}  {}", field.name, field.value);
            }
        }
        OutputFormat::Raw => {
            for field in fields {
                println!("{}={}", field.name, field.value);
            }
        }
    }
}

/// Print an encoded frame. `Raw` writes the frame bytes themselves.
pub fn print_frame(command: &str, frame: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                command,
                length: frame.len(),
                frame: to_hex(frame),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "LENGTH", "FRAME"])
                .add_row(vec![command.to_string(), frame.len().to_string(), to_hex(frame)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{command} ({} bytes)", frame.len());
            for line in frame.chunks(16) {
                println!("  {}", to_hex(line));
            }
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_unseparated() {
        assert_eq!(to_hex(&[0x22, 0xF0, 0x0A]), "22f00a");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn fields_serialize_in_order() {
        let fields = [Field::new("status", "SUCCESS"), Field::hex64("stream_id", 1)];
        let json = serde_json::to_string(&FieldsOutput {
            kind: "AEM",
            fields: &fields,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"kind":"AEM","fields":[{"name":"status","value":"SUCCESS"},{"name":"stream_id","value":"0x0000000000000001"}]}"#
        );
    }
}
