use std::io::{IsTerminal, Write};

use aces_frame::{ControllerReport, Frame, TelemetryRecord};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use crate::console::TimelineEntry;

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

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_timeline(entries: &[TimelineEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => entries.iter().for_each(print_json),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["T (ms)", "EVENT", "STATUS", "RPM", "EGT", "FLOW", "GLOW"]);
            for entry in entries {
                table.add_row(vec![
                    entry.t_ms.to_string(),
                    entry.event.clone(),
                    entry.status.to_string(),
                    entry.rpm.to_string(),
                    format!("{:.0}", entry.egt),
                    format!("{:.2}", entry.mass_flow),
                    entry.glow.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for entry in entries {
                println!(
                    "t={}ms event={} status={} rpm={} egt={:.0} flow={:.2} glow={}",
                    entry.t_ms,
                    entry.event,
                    entry.status,
                    entry.rpm,
                    entry.egt,
                    entry.mass_flow,
                    entry.glow
                );
            }
        }
    }
}

#[derive(Serialize)]
pub struct SimulationSummary {
    pub outcome: &'static str,
    pub fault: Option<&'static str>,
    pub final_state: String,
    pub simulated_ms: u64,
}

pub fn print_summary(summary: &SimulationSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        _ => println!(
            "outcome={} fault={} final_state={} simulated={}ms",
            summary.outcome,
            summary.fault.unwrap_or("none"),
            summary.final_state,
            summary.simulated_ms
        ),
    }
}

#[derive(Serialize)]
struct DecodedOutput<'a> {
    opcode: char,
    name: &'a str,
    link: &'a str,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    telemetry: Option<TelemetryOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ReportOutput>,
}

/// What an `N` frame carried, once unpacked.
#[derive(Debug, Clone, Copy)]
pub enum DecodedPayload {
    Telemetry(TelemetryRecord),
    Report(ControllerReport),
    None,
}

#[derive(Serialize)]
struct ReportOutput {
    mass_flow: f32,
    battery: f32,
    ecu_temp: f32,
}

#[derive(Serialize)]
struct TelemetryOutput {
    status: &'static str,
    status_code: u8,
    mass_flow: f32,
    hall: u16,
    egt: f32,
    battery: f32,
    glow: bool,
    ecu_temp: f32,
    esb_temp: f32,
}

impl From<&TelemetryRecord> for TelemetryOutput {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            status: record.status.name(),
            status_code: record.status.into(),
            mass_flow: record.mass_flow,
            hall: record.hall,
            egt: record.egt,
            battery: record.battery,
            glow: record.glow,
            ecu_temp: record.ecu_temp,
            esb_temp: record.esb_temp,
        }
    }
}

pub fn print_decoded(frame: &Frame, link: &str, decoded: &DecodedPayload, format: OutputFormat) {
    let out = DecodedOutput {
        opcode: char::from(frame.opcode),
        name: frame.name(),
        link,
        payload_size: frame.payload.len(),
        payload: hex::encode(&frame.payload),
        telemetry: match decoded {
            DecodedPayload::Telemetry(record) => Some(TelemetryOutput::from(record)),
            _ => None,
        },
        report: match decoded {
            DecodedPayload::Report(report) => Some(ReportOutput {
                mass_flow: report.mass_flow,
                battery: report.battery,
                ecu_temp: report.ecu_temp,
            }),
            _ => None,
        },
    };
    let fields = payload_fields(decoded);
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["opcode".to_string(), format!("{} ({})", out.opcode, out.name)])
                .add_row(vec!["link".to_string(), link.to_string()])
                .add_row(vec!["payload".to_string(), out.payload.clone()]);
            for (field, value) in fields {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "opcode={} ({}) link={} size={} payload={}",
                out.opcode, out.name, link, out.payload_size, out.payload
            );
            for (field, value) in fields {
                println!("  {field}={value}");
            }
        }
        OutputFormat::Raw => print_raw(&frame.payload),
    }
}

fn payload_fields(decoded: &DecodedPayload) -> Vec<(&'static str, String)> {
    match decoded {
        DecodedPayload::Telemetry(record) => telemetry_fields(record),
        DecodedPayload::Report(report) => vec![
            ("mass_flow", format!("{:.3}", report.mass_flow)),
            ("battery", format!("{:.2}", report.battery)),
            ("ecu_temp", format!("{:.1}", report.ecu_temp)),
        ],
        DecodedPayload::None => Vec::new(),
    }
}

fn telemetry_fields(record: &TelemetryRecord) -> Vec<(&'static str, String)> {
    vec![
        ("status", record.status.name().to_string()),
        ("mass_flow", format!("{:.3}", record.mass_flow)),
        ("hall", record.hall.to_string()),
        ("egt", format!("{:.1}", record.egt)),
        ("battery", format!("{:.2}", record.battery)),
        ("glow", record.glow.to_string()),
        ("ecu_temp", format!("{:.1}", record.ecu_temp)),
        ("esb_temp", format!("{:.1}", record.esb_temp)),
    ]
}

/// One 6-byte span and its parity byte.
#[derive(Serialize)]
pub struct ParityRow {
    pub offset: usize,
    pub span: String,
    pub parity: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carried: Option<u8>,
}

pub fn print_parity(rows: &[ParityRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => rows.iter().for_each(print_json),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["OFFSET", "SPAN", "PARITY", "CARRIED"]);
            for row in rows {
                table.add_row(vec![
                    row.offset.to_string(),
                    row.span.clone(),
                    format!("{:#04x}", row.parity),
                    row.carried
                        .map_or_else(|| "-".to_string(), |c| format!("{c:#04x}")),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!("offset={} span={} parity={:#04x}", row.offset, row.span, row.parity);
            }
        }
        OutputFormat::Raw => {
            let bytes: Vec<u8> = rows.iter().map(|row| row.parity).collect();
            print_raw(&bytes);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
