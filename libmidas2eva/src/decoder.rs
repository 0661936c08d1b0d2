use super::constants::{CYCLE_DIGITS, KIND_DIGIT, PAYLOAD_DIGITS_START, TOF_UNIT_US};
use super::error::DecodeError;

/// The kind of an MPET event, given by the header nibble of its first word.
///
/// Gate start, gate end and out-of-gate events have a second encoding (`a`, `3`, `6`)
/// which the acquisition emits when something went wrong. Those are reported as
/// anomalies and decoded as their canonical kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Timestamp,
    GateEnd,
    InGate,
    OutOfGate,
    GateStart,
    Other(u8),
}

impl EventKind {
    /// Returns the canonical kind and whether the nibble was an anomalous encoding
    pub fn from_nibble(nibble: u8) -> (Self, bool) {
        match nibble {
            0x0 => (Self::Timestamp, false),
            0x1 => (Self::GateEnd, false),
            0x2 => (Self::InGate, false),
            0x3 => (Self::GateEnd, true),
            0x4 => (Self::OutOfGate, false),
            0x6 => (Self::OutOfGate, true),
            0x8 => (Self::GateStart, false),
            0xa => (Self::GateStart, true),
            n => (Self::Other(n), false),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Timestamp => 0x0,
            Self::GateEnd => 0x1,
            Self::InGate => 0x2,
            Self::OutOfGate => 0x4,
            Self::GateStart => 0x8,
            Self::Other(n) => *n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedEvent {
    pub kind: EventKind,
    pub cycle: u32,
    /// Time of flight in us
    pub tof: f64,
}

/// The decoded events plus every anomalous header word, in stream order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    pub events: Vec<DecodedEvent>,
    pub anomalies: Vec<String>,
}

/// Decode an MPET token stream.
///
/// Tokens come in pairs: a header word (`0x` + kind nibble + 3 digit cycle + ...) and
/// a payload word whose digits after `0x` are the time of flight in 10 ns units.
/// Each pair is decoded on its own.
pub fn decode_events<S: AsRef<str>>(tokens: &[S]) -> Result<DecodedStream, DecodeError> {
    let mut stream = DecodedStream::default();
    if tokens.is_empty() {
        log::warn!("No mdump data available to decode.");
        return Ok(stream);
    }
    if tokens.len() % 2 != 0 {
        log::warn!(
            "Event stream has an odd number of words; ignoring trailing word {}",
            tokens[tokens.len() - 1].as_ref()
        );
    }

    stream.events.reserve(tokens.len() / 2);
    for pair in tokens.chunks_exact(2) {
        let header = pair[0].as_ref();
        let payload = pair[1].as_ref();
        let (kind, anomalous) = EventKind::from_nibble(hex_value(header, KIND_DIGIT..KIND_DIGIT + 1)? as u8);
        if anomalous {
            stream.anomalies.push(header.to_string());
        }
        let cycle = hex_value(header, CYCLE_DIGITS)? as u32;
        let tof = hex_value(payload, PAYLOAD_DIGITS_START..payload.len())? as f64 * TOF_UNIT_US;
        stream.events.push(DecodedEvent { kind, cycle, tof });
    }
    Ok(stream)
}

fn hex_value(token: &str, digits: std::ops::Range<usize>) -> Result<u64, DecodeError> {
    let field = token
        .get(digits)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| DecodeError::ShortToken(token.to_string()))?;
    u64::from_str_radix(field, 16).map_err(|_| DecodeError::BadHex(token.to_string()))
}
