use aces_frame::{decode_frame, ControllerReport, LinkProfile, TelemetryRecord, NORMAL};
use tracing::debug;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_decoded, DecodedPayload, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let profile = LinkProfile::from(args.link);
    let frame = decode_frame(profile, &bytes).map_err(|err| frame_error("decode failed", err))?;
    debug!(opcode = frame.name(), len = frame.payload.len(), "frame decoded");

    let decoded = match (profile, frame.opcode) {
        (LinkProfile::FromSensor, NORMAL) => DecodedPayload::Telemetry(
            TelemetryRecord::unpack(&frame.payload)
                .map_err(|err| frame_error("telemetry rejected", err))?,
        ),
        (LinkProfile::FromController, NORMAL) => DecodedPayload::Report(
            ControllerReport::unpack(&frame.payload)
                .map_err(|err| frame_error("report rejected", err))?,
        ),
        _ => DecodedPayload::None,
    };

    print_decoded(&frame, profile.name(), &decoded, format);
    Ok(SUCCESS)
}
