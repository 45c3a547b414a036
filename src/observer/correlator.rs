use std::time::{Duration, Instant};

use crate::common::crc;
use crate::common::phys::format_bytes;
use crate::decode::FrameDecodeLevel;
use crate::error::FrameAnomaly;
use crate::exception::ExceptionCode;
use crate::observer::store::RegisterStore;
use crate::observer::BusActivity;
use crate::types::{AddressRange, UnitId};

pub(crate) mod constants {
    /// a read input registers request is always this long on the wire
    pub(crate) const REQUEST_LENGTH: usize = 8;
    /// an exception response is always this long on the wire
    pub(crate) const EXCEPTION_LENGTH: usize = 5;
    /// unit id + function code + byte count preceding the response data
    pub(crate) const RESPONSE_HEADER_LENGTH: usize = 3;
    /// the shortest frame that can appear on an RTU link
    pub(crate) const MIN_FRAME_LENGTH: usize = 5;
    /// CRC trailer
    pub(crate) const CRC_LENGTH: usize = 2;
    /// the only function code this observer reconstructs
    pub(crate) const READ_INPUT_REGISTERS: u8 = 0x04;
}

/// A request seen on the wire whose matching response has not been fully
/// observed yet.
struct PendingRequest {
    unit_id: UnitId,
    range: AddressRange,
    received_at: Instant,
    /// bytes of the response accumulated so far
    response: Vec<u8>,
}

enum State {
    Idle,
    AwaitingResponse(PendingRequest),
}

/// Reconstructs request/response exchanges from a raw byte stream.
///
/// A passive observer cannot know how many bytes a response will contain
/// except by having seen the matching request, so correlation is one
/// exchange at a time and time-bounded. Requests for devices other than the
/// one currently awaited are not recognized until the slot frees up.
pub(crate) struct FrameCorrelator {
    state: State,
    request_timeout: Duration,
}

impl FrameCorrelator {
    pub(crate) fn new(request_timeout: Duration) -> Self {
        Self {
            state: State::Idle,
            request_timeout,
        }
    }

    /// Consume as much of `chunk` as possible and return the unconsumed
    /// remainder.
    ///
    /// The remainder is non-empty only when a complete frame was extracted,
    /// so back-to-back frames arriving in a single read are all processed by
    /// feeding the remainder straight back in.
    pub(crate) fn process<'a>(
        &mut self,
        chunk: &'a [u8],
        now: Instant,
        store: &mut RegisterStore,
        activity: &mut BusActivity,
        decode: FrameDecodeLevel,
    ) -> &'a [u8] {
        // a stale exchange is abandoned before looking at new bytes
        if let State::AwaitingResponse(pending) = &self.state {
            if now.duration_since(pending.received_at) > self.request_timeout {
                let unit_id = pending.unit_id;
                tracing::warn!(
                    "no response from unit {} within {:?}, dropping the exchange",
                    unit_id,
                    self.request_timeout
                );
                activity.record(FrameAnomaly::RequestTimeout(unit_id));
                self.state = State::Idle;
            }
        }

        if matches!(self.state, State::Idle) {
            self.start_frame(chunk, now, activity, decode)
        } else {
            self.continue_response(chunk, store, activity, decode)
        }
    }

    fn start_frame<'a>(
        &mut self,
        chunk: &'a [u8],
        now: Instant,
        activity: &mut BusActivity,
        decode: FrameDecodeLevel,
    ) -> &'a [u8] {
        if chunk.len() < constants::MIN_FRAME_LENGTH {
            tracing::warn!("discarding {} byte window, too short for any frame", chunk.len());
            activity.record(FrameAnomaly::ShortFrame(chunk.len()));
            return &[];
        }

        let function = chunk[1];

        if function == constants::READ_INPUT_REGISTERS && chunk.len() >= constants::REQUEST_LENGTH {
            let (request, remainder) = chunk.split_at(constants::REQUEST_LENGTH);
            self.accept_request(request, now, activity, decode);
            return remainder;
        }

        if function & 0x80 != 0 {
            // an exception with no exchange outstanding, nothing to abandon
            let unit_id = UnitId::new(chunk[0]);
            let code = ExceptionCode::from(chunk[2]);
            tracing::warn!("exception from unit {}: {}", unit_id, code);
            activity.record(FrameAnomaly::ExceptionFrame(unit_id, code));
            return &chunk[constants::EXCEPTION_LENGTH..];
        }

        // nothing recognizable starts here; the window is treated as noise
        // rather than resynchronized byte-by-byte
        tracing::warn!(
            "discarding {} bytes that do not begin a frame (function code {:#04X})",
            chunk.len(),
            function
        );
        activity.record(FrameAnomaly::UnrecognizedFrame(function, chunk.len()));
        &[]
    }

    fn accept_request(
        &mut self,
        request: &[u8],
        now: Instant,
        activity: &mut BusActivity,
        decode: FrameDecodeLevel,
    ) {
        // the CRC covers the first six bytes; a mismatch is suspicious but
        // the fields are still decoded optimistically
        if let Err(err) = crc::check(request) {
            tracing::warn!(
                "request crc mismatch: received {:#06X} computed {:#06X}",
                err.received,
                err.computed
            );
            activity.record(FrameAnomaly::BadCrc(err.received, err.computed));
        }

        let unit_id = UnitId::new(request[0]);
        if unit_id.is_rtu_reserved() {
            tracing::warn!(
                "request addresses reserved unit id {}, tracking it nevertheless",
                unit_id
            );
        }

        let range = AddressRange::new(
            u16::from_be_bytes([request[2], request[3]]),
            u16::from_be_bytes([request[4], request[5]]),
        );

        if decode.enabled() {
            tracing::info!(
                "RTU RX - request {}",
                RequestDisplay::new(decode, unit_id, range, request)
            );
        }

        activity.requests += 1;
        self.state = State::AwaitingResponse(PendingRequest {
            unit_id,
            range,
            received_at: now,
            response: Vec::new(),
        });
    }

    fn continue_response<'a>(
        &mut self,
        chunk: &'a [u8],
        store: &mut RegisterStore,
        activity: &mut BusActivity,
        decode: FrameDecodeLevel,
    ) -> &'a [u8] {
        let pending = match &mut self.state {
            State::AwaitingResponse(x) => x,
            State::Idle => return chunk,
        };

        pending.response.extend_from_slice(chunk);

        // an exception can arrive in place of the data response
        if pending.response.len() >= constants::EXCEPTION_LENGTH && pending.response[1] & 0x80 != 0
        {
            let excess = pending.response.len() - constants::EXCEPTION_LENGTH;
            let unit_id = UnitId::new(pending.response[0]);
            let code = ExceptionCode::from(pending.response[2]);
            tracing::warn!("exception from unit {} ends the exchange: {}", unit_id, code);
            activity.record(FrameAnomaly::ExceptionFrame(unit_id, code));
            self.state = State::Idle;
            return &chunk[chunk.len() - excess..];
        }

        // the declared byte count only becomes readable past the header
        if pending.response.len() <= constants::RESPONSE_HEADER_LENGTH + 1 {
            return &[];
        }

        let byte_count = pending.response[2] as usize;
        let total = byte_count + constants::RESPONSE_HEADER_LENGTH + constants::CRC_LENGTH;
        if pending.response.len() < total {
            return &[];
        }

        // bytes beyond the full response belong to the next frame
        let excess = pending.response.len() - total;
        let remainder = &chunk[chunk.len() - excess..];
        pending.response.truncate(total);

        if let Err(err) = crc::check(&pending.response) {
            // best-effort observer: warn, but store the data regardless
            tracing::warn!(
                "response crc mismatch: received {:#06X} computed {:#06X}",
                err.received,
                err.computed
            );
            activity.record(FrameAnomaly::BadCrc(err.received, err.computed));
        }

        let unit_id = UnitId::new(pending.response[0]);
        if unit_id != pending.unit_id {
            tracing::warn!(
                "response from unit {} while awaiting unit {}",
                unit_id,
                pending.unit_id
            );
        }

        let expected = 2 * pending.range.count as usize;
        if byte_count != expected {
            tracing::warn!(
                "response carries {} data bytes, the request implied {}",
                byte_count,
                expected
            );
            activity.record(FrameAnomaly::LengthMismatch(byte_count, expected));
        }

        let offset = pending.range.start as usize * 2;
        let data = &pending.response
            [constants::RESPONSE_HEADER_LENGTH..constants::RESPONSE_HEADER_LENGTH + byte_count];

        if decode.enabled() {
            tracing::info!("RTU RX - response {}", ResponseDisplay::new(decode, unit_id, data));
        }

        store.extend(unit_id, offset + byte_count + 1);
        store.write(unit_id, offset, data);

        activity.responses += 1;
        self.state = State::Idle;
        remainder
    }
}

struct RequestDisplay<'a> {
    level: FrameDecodeLevel,
    unit_id: UnitId,
    range: AddressRange,
    frame: &'a [u8],
}

impl<'a> RequestDisplay<'a> {
    fn new(level: FrameDecodeLevel, unit_id: UnitId, range: AddressRange, frame: &'a [u8]) -> Self {
        RequestDisplay {
            level,
            unit_id,
            range,
            frame,
        }
    }
}

impl std::fmt::Display for RequestDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unit: {} {}", self.unit_id, self.range)?;
        if self.level.payload_enabled() {
            format_bytes(f, self.frame)?;
        }
        Ok(())
    }
}

struct ResponseDisplay<'a> {
    level: FrameDecodeLevel,
    unit_id: UnitId,
    data: &'a [u8],
}

impl<'a> ResponseDisplay<'a> {
    fn new(level: FrameDecodeLevel, unit_id: UnitId, data: &'a [u8]) -> Self {
        ResponseDisplay {
            level,
            unit_id,
            data,
        }
    }
}

impl std::fmt::Display for ResponseDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "unit: {} (data len = {})", self.unit_id, self.data.len())?;
        if self.level.payload_enabled() {
            format_bytes(f, self.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_ID: u8 = 0x01;

    const READ_INPUT_REGISTERS_REQUEST: &[u8] = &[
        UNIT_ID, // unit id
        0x04,    // function code
        0x00, 0x00, // starting address
        0x00, 0x02, // qty of registers
        0x71, 0xCB, // crc
    ];

    const READ_INPUT_REGISTERS_RESPONSE: &[u8] = &[
        UNIT_ID, // unit id
        0x04,    // function code
        0x04,    // byte count
        0x00, 0x00, 0x00, 0x01, // register values
        0x3A, 0x44, // crc
    ];

    const SHORT_COUNT_REQUEST: &[u8] = &[
        UNIT_ID, // unit id
        0x04,    // function code
        0x00, 0x03, // starting address
        0x00, 0x01, // qty of registers
        0xC1, 0xCA, // crc
    ];

    const TWO_BYTE_RESPONSE: &[u8] = &[
        UNIT_ID, // unit id
        0x04,    // function code
        0x02,    // byte count
        0x12, 0x34, // register value
        0xB4, 0x47, // crc
    ];

    const EXCEPTION_RESPONSE: &[u8] = &[
        UNIT_ID, // unit id
        0x84,    // function code | 0x80
        0x02,    // exception code (illegal data address)
        0xC2, 0xC1, // crc
    ];

    const FLOAT_REQUEST: &[u8] = &[
        0x02, // unit id
        0x04, // function code
        0x00, 0x00, // starting address
        0x00, 0x02, // qty of registers
        0x71, 0xF8, // crc
    ];

    const FLOAT_RESPONSE: &[u8] = &[
        0x02, // unit id
        0x04, // function code
        0x04, // byte count
        0x43, 0x66, 0x80, 0x00, // 230.5 as a big-endian float
        0x5C, 0xDF, // crc
    ];

    const TIMEOUT: Duration = Duration::from_millis(100);

    fn correlator() -> FrameCorrelator {
        FrameCorrelator::new(TIMEOUT)
    }

    fn feed(
        correlator: &mut FrameCorrelator,
        store: &mut RegisterStore,
        activity: &mut BusActivity,
        bytes: &[u8],
        now: Instant,
    ) {
        let mut window = bytes;
        while !window.is_empty() {
            window = correlator.process(window, now, store, activity, FrameDecodeLevel::Nothing);
        }
    }

    #[test]
    fn correlates_a_request_with_its_response() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_RESPONSE, now);

        assert_eq!(activity.requests, 1);
        assert_eq!(activity.responses, 1);
        assert!(activity.anomalies.is_empty());
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 0), 0);
        // wire bytes 00 01 through the little-endian accessor
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0x0100);
        assert_eq!(store.allocated(UnitId::new(UNIT_ID)), 4096);
    }

    #[test]
    fn processes_back_to_back_frames_from_one_read() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        let stream = [READ_INPUT_REGISTERS_REQUEST, READ_INPUT_REGISTERS_RESPONSE].concat();
        feed(&mut correlator, &mut store, &mut activity, &stream, now);

        assert_eq!(activity.requests, 1);
        assert_eq!(activity.responses, 1);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0x0100);
    }

    #[test]
    fn split_responses_store_the_same_bytes_as_a_single_feed() {
        let response = READ_INPUT_REGISTERS_RESPONSE;

        for split in 1..response.len() {
            let mut correlator = correlator();
            let mut store = RegisterStore::new();
            let mut activity = BusActivity::default();
            let now = Instant::now();

            feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
            feed(&mut correlator, &mut store, &mut activity, &response[..split], now);
            feed(&mut correlator, &mut store, &mut activity, &response[split..], now);

            assert_eq!(activity.responses, 1, "split at {split}");
            assert_eq!(store.uint16(UnitId::new(UNIT_ID), 0), 0, "split at {split}");
            assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0x0100, "split at {split}");
        }
    }

    #[test]
    fn tracks_exchanges_for_multiple_devices_in_turn() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        let stream = [
            READ_INPUT_REGISTERS_REQUEST,
            READ_INPUT_REGISTERS_RESPONSE,
            FLOAT_REQUEST,
            FLOAT_RESPONSE,
        ]
        .concat();
        feed(&mut correlator, &mut store, &mut activity, &stream, now);

        assert_eq!(activity.requests, 2);
        assert_eq!(activity.responses, 2);
        assert_eq!(store.uint16(UnitId::new(0x01), 1), 0x0100);
        assert_eq!(store.float(UnitId::new(0x02), 0), 230.5);
    }

    #[test]
    fn request_timeout_recovers_the_correlator() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let start = Instant::now();

        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, start);

        // the next request arrives long after the response window closed
        let late = start + TIMEOUT * 2;
        feed(&mut correlator, &mut store, &mut activity, SHORT_COUNT_REQUEST, late);
        feed(&mut correlator, &mut store, &mut activity, TWO_BYTE_RESPONSE, late);

        assert!(activity
            .anomalies
            .contains(&FrameAnomaly::RequestTimeout(UnitId::new(UNIT_ID))));
        assert_eq!(activity.responses, 1);
        // the abandoned exchange wrote nothing, the new one stored register 3
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 0), 0);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 3), 0x3412);
    }

    #[test]
    fn exception_abandons_the_pending_request() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, EXCEPTION_RESPONSE, now);

        assert_eq!(activity.responses, 0);
        assert!(activity.anomalies.contains(&FrameAnomaly::ExceptionFrame(
            UnitId::new(UNIT_ID),
            ExceptionCode::IllegalDataAddress
        )));
        assert_eq!(store.allocated(UnitId::new(UNIT_ID)), 0);

        // the correlator is re-armed for the next exchange
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_RESPONSE, now);
        assert_eq!(activity.responses, 1);
    }

    #[test]
    fn exception_without_a_pending_request_is_harmless() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        feed(&mut correlator, &mut store, &mut activity, EXCEPTION_RESPONSE, now);

        assert!(activity.anomalies.contains(&FrameAnomaly::ExceptionFrame(
            UnitId::new(UNIT_ID),
            ExceptionCode::IllegalDataAddress
        )));
        assert_eq!(activity.requests, 0);
        assert_eq!(store.allocated(UnitId::new(UNIT_ID)), 0);
    }

    #[test]
    fn noise_is_discarded_without_state_changes() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        feed(&mut correlator, &mut store, &mut activity, &[0x55; 20], now);

        assert_eq!(activity.anomalies, vec![FrameAnomaly::UnrecognizedFrame(0x55, 20)]);
        assert_eq!(activity.requests, 0);

        // the discard did not poison the next exchange
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_RESPONSE, now);
        assert_eq!(activity.responses, 1);
    }

    #[test]
    fn short_window_is_discarded() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();

        feed(&mut correlator, &mut store, &mut activity, &[0x01, 0x04, 0x00], Instant::now());

        assert_eq!(activity.anomalies, vec![FrameAnomaly::ShortFrame(3)]);
    }

    #[test]
    fn bad_request_crc_is_decoded_optimistically() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        let mut request = READ_INPUT_REGISTERS_REQUEST.to_vec();
        request[6] = 0xFF;
        request[7] = 0xFF;
        feed(&mut correlator, &mut store, &mut activity, &request, now);
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_RESPONSE, now);

        assert!(activity
            .anomalies
            .iter()
            .any(|a| matches!(a, FrameAnomaly::BadCrc(0xFFFF, _))));
        // the fields were still captured and the response still correlated
        assert_eq!(activity.responses, 1);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0x0100);
    }

    #[test]
    fn bad_response_crc_still_stores_the_data() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        let mut response = READ_INPUT_REGISTERS_RESPONSE.to_vec();
        let last = response.len() - 1;
        response[last] ^= 0xFF;
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, &response, now);

        assert!(activity
            .anomalies
            .iter()
            .any(|a| matches!(a, FrameAnomaly::BadCrc(_, _))));
        assert_eq!(activity.responses, 1);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0x0100);
    }

    #[test]
    fn declared_byte_count_wins_over_the_request() {
        let mut correlator = correlator();
        let mut store = RegisterStore::new();
        let mut activity = BusActivity::default();
        let now = Instant::now();

        // the request asks for two registers but the response carries one
        feed(&mut correlator, &mut store, &mut activity, READ_INPUT_REGISTERS_REQUEST, now);
        feed(&mut correlator, &mut store, &mut activity, TWO_BYTE_RESPONSE, now);

        assert!(activity.anomalies.contains(&FrameAnomaly::LengthMismatch(2, 4)));
        assert_eq!(activity.responses, 1);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 0), 0x3412);
        assert_eq!(store.uint16(UnitId::new(UNIT_ID), 1), 0);
    }
}
