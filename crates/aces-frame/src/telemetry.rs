//! Fixed byte layouts for the 'N' frames.
//!
//! All multi-byte fields are little-endian. Floats travel as their raw bit
//! pattern, so a record unpacks bit-exactly to what was packed.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::parity::{check_parity, put_parity_spans, SPAN_LEN};

/// Telemetry data bytes before parity.
pub const TELEMETRY_DATA_LEN: usize = 24;
/// Telemetry payload on the wire, parity included.
pub const TELEMETRY_PAYLOAD_LEN: usize = TELEMETRY_DATA_LEN + TELEMETRY_DATA_LEN / SPAN_LEN;
/// Controller report data bytes before parity.
pub const REPORT_DATA_LEN: usize = 12;
/// Controller report payload on the wire, parity included.
pub const REPORT_PAYLOAD_LEN: usize = REPORT_DATA_LEN + REPORT_DATA_LEN / SPAN_LEN;

/// Operating status carried in the first telemetry byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    ShutdownRequested = 1,
    Starting = 2,
    AdjustingThrottle = 3,
    Cooling = 5,
    Idle = 6,
    AtThrottle = 8,
    FuelNotFlowing = 9,
    IdleReached = 10,
    ParityFailure = 11,
    OverTemperature = 12,
    OverSpeed = 13,
    LinkLost = 14,
    Lockout = 15,
    StartupFailed = 16,
}

impl StatusCode {
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::ShutdownRequested => "shutdown-requested",
            StatusCode::Starting => "starting",
            StatusCode::AdjustingThrottle => "adjusting-throttle",
            StatusCode::Cooling => "cooling",
            StatusCode::Idle => "idle",
            StatusCode::AtThrottle => "at-throttle",
            StatusCode::FuelNotFlowing => "fuel-not-flowing",
            StatusCode::IdleReached => "idle-reached",
            StatusCode::ParityFailure => "parity-failure",
            StatusCode::OverTemperature => "over-temperature",
            StatusCode::OverSpeed => "over-speed",
            StatusCode::LinkLost => "link-lost",
            StatusCode::Lockout => "lockout",
            StatusCode::StartupFailed => "startup-failed",
        }
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        let code = match value {
            1 => StatusCode::ShutdownRequested,
            2 => StatusCode::Starting,
            3 => StatusCode::AdjustingThrottle,
            5 => StatusCode::Cooling,
            6 => StatusCode::Idle,
            8 => StatusCode::AtThrottle,
            9 => StatusCode::FuelNotFlowing,
            10 => StatusCode::IdleReached,
            11 => StatusCode::ParityFailure,
            12 => StatusCode::OverTemperature,
            13 => StatusCode::OverSpeed,
            14 => StatusCode::LinkLost,
            15 => StatusCode::Lockout,
            16 => StatusCode::StartupFailed,
            other => return Err(FrameError::UnknownStatus(other)),
        };
        Ok(code)
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> u8 {
        code as u8
    }
}

/// One sensor-board telemetry sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub status: StatusCode,
    /// Fuel mass flow, g/s.
    pub mass_flow: f32,
    /// Hall-effect count; the engine speed in rpm.
    pub hall: u16,
    /// Exhaust gas temperature, °C.
    pub egt: f32,
    /// Battery voltage, V.
    pub battery: f32,
    pub glow: bool,
    /// Controller ambient temperature, °C.
    pub ecu_temp: f32,
    /// Sensor board ambient temperature, °C.
    pub esb_temp: f32,
}

impl TelemetryRecord {
    /// Serialize to the 28-byte wire payload.
    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(TELEMETRY_PAYLOAD_LEN);
        buf.put_u8(self.status.into());
        buf.put_f32_le(self.mass_flow);
        buf.put_u16_le(self.hall);
        buf.put_f32_le(self.egt);
        buf.put_f32_le(self.battery);
        buf.put_u8(u8::from(self.glow));
        buf.put_f32_le(self.ecu_temp);
        buf.put_f32_le(self.esb_temp);
        debug_assert_eq!(buf.len(), TELEMETRY_DATA_LEN);

        let mut parity = BytesMut::with_capacity(TELEMETRY_DATA_LEN / SPAN_LEN);
        put_parity_spans(&buf, &mut parity);
        buf.unsplit(parity);
        buf.freeze()
    }

    /// Parse a wire payload. Length and parity are checked before any field
    /// is read.
    pub fn unpack(payload: &[u8]) -> Result<Self> {
        if payload.len() != TELEMETRY_PAYLOAD_LEN {
            return Err(FrameError::Truncated {
                expected: TELEMETRY_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        check_parity(payload, TELEMETRY_DATA_LEN)?;

        let mut data = &payload[..TELEMETRY_DATA_LEN];
        let status = StatusCode::try_from(data.get_u8())?;
        Ok(Self {
            status,
            mass_flow: data.get_f32_le(),
            hall: data.get_u16_le(),
            egt: data.get_f32_le(),
            battery: data.get_f32_le(),
            glow: data.get_u8() != 0,
            ecu_temp: data.get_f32_le(),
            esb_temp: data.get_f32_le(),
        })
    }
}

/// Controller readings sent to the sensor board in its 'N' frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerReport {
    pub mass_flow: f32,
    pub battery: f32,
    pub ecu_temp: f32,
}

impl ControllerReport {
    /// Serialize to the 14-byte wire payload.
    pub fn pack(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(REPORT_PAYLOAD_LEN);
        buf.put_f32_le(self.mass_flow);
        buf.put_f32_le(self.battery);
        buf.put_f32_le(self.ecu_temp);

        let mut parity = BytesMut::with_capacity(REPORT_DATA_LEN / SPAN_LEN);
        put_parity_spans(&buf, &mut parity);
        buf.unsplit(parity);
        buf.freeze()
    }

    pub fn unpack(payload: &[u8]) -> Result<Self> {
        if payload.len() != REPORT_PAYLOAD_LEN {
            return Err(FrameError::Truncated {
                expected: REPORT_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        check_parity(payload, REPORT_DATA_LEN)?;

        let mut data = &payload[..REPORT_DATA_LEN];
        Ok(Self {
            mass_flow: data.get_f32_le(),
            battery: data.get_f32_le(),
            ecu_temp: data.get_f32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parity::compute_parity;

    fn sample() -> TelemetryRecord {
        TelemetryRecord {
            status: StatusCode::AtThrottle,
            mass_flow: 2.375,
            hall: 41_250,
            egt: 612.5,
            battery: 11.9,
            glow: false,
            ecu_temp: 31.25,
            esb_temp: 44.0,
        }
    }

    #[test]
    fn pack_layout() {
        let packed = sample().pack();
        assert_eq!(packed.len(), TELEMETRY_PAYLOAD_LEN);
        assert_eq!(packed[0], 8);
        assert_eq!(&packed[1..5], &2.375f32.to_le_bytes());
        assert_eq!(&packed[5..7], &41_250u16.to_le_bytes());
        assert_eq!(&packed[7..11], &612.5f32.to_le_bytes());
        assert_eq!(&packed[11..15], &11.9f32.to_le_bytes());
        assert_eq!(packed[15], 0);
        assert_eq!(&packed[16..20], &31.25f32.to_le_bytes());
        assert_eq!(&packed[20..24], &44.0f32.to_le_bytes());
        for span in 0..4 {
            assert_eq!(packed[24 + span], compute_parity(&packed, span * 6).unwrap());
        }
    }

    #[test]
    fn unpack_restores_bit_patterns() {
        let mut record = sample();
        record.mass_flow = f32::from_bits(0x0000_0001);
        record.egt = -0.0;
        record.glow = true;
        let back = TelemetryRecord::unpack(&record.pack()).unwrap();
        assert_eq!(back.mass_flow.to_bits(), record.mass_flow.to_bits());
        assert_eq!(back.egt.to_bits(), (-0.0f32).to_bits());
        assert_eq!(back, record);
    }

    #[test]
    fn corrupt_byte_rejected() {
        let mut packed = sample().pack().to_vec();
        packed[9] ^= 0x10;
        assert!(matches!(
            TelemetryRecord::unpack(&packed),
            Err(FrameError::Parity { span: 1, .. })
        ));
    }

    #[test]
    fn corrupt_parity_byte_rejected() {
        let mut packed = sample().pack().to_vec();
        packed[27] ^= 0x01;
        assert!(matches!(
            TelemetryRecord::unpack(&packed),
            Err(FrameError::Parity { span: 3, .. })
        ));
    }

    #[test]
    fn popcount_preserving_corruption_passes_parity() {
        let mut packed = sample().pack().to_vec();
        // at-throttle (0b1000) becomes shutdown-requested (0b0001)
        packed[0] = StatusCode::ShutdownRequested.into();
        let back = TelemetryRecord::unpack(&packed).unwrap();
        assert_eq!(back.status, StatusCode::ShutdownRequested);
        assert_eq!(back.egt, sample().egt);
    }

    #[test]
    fn wrong_length_rejected() {
        let packed = sample().pack();
        assert!(matches!(
            TelemetryRecord::unpack(&packed[..27]),
            Err(FrameError::Truncated { expected: 28, actual: 27 })
        ));
    }

    #[test]
    fn unknown_status_rejected_after_parity() {
        let mut data = sample().pack()[..TELEMETRY_DATA_LEN].to_vec();
        data[0] = 4;
        let mut parity = Vec::new();
        put_parity_spans(&data, &mut parity);
        data.extend_from_slice(&parity);
        assert!(matches!(
            TelemetryRecord::unpack(&data),
            Err(FrameError::UnknownStatus(4))
        ));
    }

    #[test]
    fn status_codes_map_both_ways() {
        for raw in 0u8..=20 {
            if let Ok(code) = StatusCode::try_from(raw) {
                assert_eq!(u8::from(code), raw);
            }
        }
        assert!(StatusCode::try_from(7).is_err());
        assert_eq!(StatusCode::Lockout.name(), "lockout");
    }

    #[test]
    fn controller_report_layout() {
        let report = ControllerReport {
            mass_flow: 1.5,
            battery: 12.25,
            ecu_temp: 28.0,
        };
        let packed = report.pack();
        assert_eq!(packed.len(), REPORT_PAYLOAD_LEN);
        assert_eq!(&packed[4..8], &12.25f32.to_le_bytes());
        assert_eq!(ControllerReport::unpack(&packed).unwrap(), report);

        let mut bad = packed.to_vec();
        bad[0] ^= 0x80;
        assert!(ControllerReport::unpack(&bad).is_err());
    }
}
