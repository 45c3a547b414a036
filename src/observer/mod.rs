pub(crate) mod correlator;
pub(crate) mod store;

use std::time::{Duration, Instant};

use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::{FrameAnomaly, OpenError};
use crate::serial::{self, SerialSettings};
use crate::types::UnitId;

use store::RegisterStore;

mod constants {
    /// upper bound on the bytes pulled off the line in one batch
    pub(crate) const READ_BUFFER_SIZE: usize = 256;
    /// a response is awaited for this many inter-frame silence periods
    pub(crate) const REQUEST_TIMEOUT_SILENCE_PERIODS: u32 = 64;
}

/// Timeouts and diagnostics for an observer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverConfig {
    /// How long a single read waits before deciding the line is idle.
    ///
    /// This doubles as the polling granularity of the observing loop.
    pub inter_frame_timeout: Duration,
    /// how long an observed request is held while awaiting its response
    pub request_timeout: Duration,
    /// diagnostic decoding of observed traffic
    pub decode: DecodeLevel,
}

impl ObserverConfig {
    /// Derive both timeouts from the link's baud rate: reads wait one
    /// inter-frame silence, and a response is awaited for 64 of them.
    pub fn from_baud_rate(baud_rate: u32) -> Self {
        let silence = serial::inter_frame_silence(baud_rate);
        Self {
            inter_frame_timeout: silence,
            request_timeout: constants::REQUEST_TIMEOUT_SILENCE_PERIODS * silence,
            decode: DecodeLevel::nothing(),
        }
    }

    /// replace the decode level
    pub fn decode_level(self, decode: DecodeLevel) -> Self {
        Self { decode, ..self }
    }
}

/// The outcome of draining one batch of bus activity.
///
/// Anomalies are carried here as well as logged, so a polling loop can react
/// to them without parsing log output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BusActivity {
    /// raw bytes pulled off the line
    pub bytes: usize,
    /// requests observed
    pub requests: usize,
    /// responses fully reconstructed and written to the register store
    pub responses: usize,
    /// anomalies noticed while draining the batch
    pub anomalies: Vec<FrameAnomaly>,
}

impl BusActivity {
    /// true when nothing at all arrived within the read timeout
    pub fn is_idle(&self) -> bool {
        self.bytes == 0
    }

    pub(crate) fn record(&mut self, anomaly: FrameAnomaly) {
        self.anomalies.push(anomaly);
    }
}

/// Passive observer of a Modbus RTU serial bus.
///
/// The observer shares an RS-485 line with a third-party master that is
/// already polling its slaves. It never transmits: it reconstructs the
/// read-input-register exchanges it can see and keeps the last observed
/// value of every register, per device. Coverage is inherently best-effort;
/// a missed or corrupted frame means a gap until the master polls again.
pub struct RtuObserver {
    path: String,
    serial_settings: SerialSettings,
    config: ObserverConfig,
    phys: Option<PhysLayer>,
    correlator: correlator::FrameCorrelator,
    store: RegisterStore,
}

impl RtuObserver {
    /// Create an observer for a serial device path. No IO happens until
    /// [`connect`](Self::connect).
    pub fn new(path: &str, serial_settings: SerialSettings, config: ObserverConfig) -> Self {
        Self {
            path: path.to_string(),
            serial_settings,
            config,
            phys: None,
            correlator: correlator::FrameCorrelator::new(config.request_timeout),
            store: RegisterStore::new(),
        }
    }

    /// Open and configure the serial port.
    ///
    /// Bytes already sitting in the OS receive buffer predate this observer
    /// and are dropped.
    pub fn connect(&mut self) -> Result<(), OpenError> {
        use tokio_serial::SerialPort;

        let stream = serial::open(&self.path, self.serial_settings)?;
        if let Err(err) = stream.clear(tokio_serial::ClearBuffer::Input) {
            tracing::warn!("unable to drain stale input: {}", err);
        }
        self.phys = Some(PhysLayer::new_serial(stream));
        tracing::info!("serial port open");
        Ok(())
    }

    /// Close the serial port. A later [`connect`](Self::connect) reopens it;
    /// observed register data is kept.
    pub fn close(&mut self) {
        if self.phys.take().is_some() {
            tracing::info!("serial port closed");
        }
    }

    /// Drain one batch of available bus activity.
    ///
    /// Performs a single read bounded by the inter-frame timeout and feeds
    /// everything that arrived through the frame correlator. An idle line is
    /// a normal condition (devices may be asleep), not an error. This method
    /// never fails: IO problems and malformed traffic are logged, reported
    /// in the returned [`BusActivity`] and otherwise absorbed.
    pub async fn read(&mut self) -> BusActivity {
        let mut activity = BusActivity::default();

        let phys = match self.phys.as_mut() {
            Some(x) => x,
            None => {
                tracing::warn!("read called while the port is closed");
                return activity;
            }
        };

        let mut buffer = [0u8; constants::READ_BUFFER_SIZE];
        let result = tokio::time::timeout(
            self.config.inter_frame_timeout,
            phys.read(&mut buffer, self.config.decode.physical),
        )
        .await;

        let count = match result {
            // silence within the timeout, the bus may simply be quiet
            Err(_) => return activity,
            Ok(Err(err)) => {
                tracing::warn!("serial read failed: {}", err);
                return activity;
            }
            Ok(Ok(0)) => return activity,
            Ok(Ok(count)) => count,
        };

        activity.bytes = count;
        let now = Instant::now();

        let mut window = &buffer[..count];
        while !window.is_empty() {
            window = self.correlator.process(
                window,
                now,
                &mut self.store,
                &mut activity,
                self.config.decode.frame,
            );
        }

        activity
    }

    /// 32-bit float at a register index, big-endian as observed on the wire
    pub fn float(&self, unit_id: UnitId, register: u16) -> f32 {
        self.store.float(unit_id, register)
    }

    /// signed 16-bit integer at a register index, little-endian as observed on the wire
    pub fn int16(&self, unit_id: UnitId, register: u16) -> i16 {
        self.store.int16(unit_id, register)
    }

    /// unsigned 16-bit integer at a register index, little-endian as observed on the wire
    pub fn uint16(&self, unit_id: UnitId, register: u16) -> u16 {
        self.store.uint16(unit_id, register)
    }

    /// signed 32-bit integer at a register index, little-endian as observed on the wire
    pub fn int32(&self, unit_id: UnitId, register: u16) -> i32 {
        self.store.int32(unit_id, register)
    }

    /// unsigned 32-bit integer at a register index, little-endian as observed on the wire
    pub fn uint32(&self, unit_id: UnitId, register: u16) -> u32 {
        self.store.uint32(unit_id, register)
    }

    /// offset-prefixed hex dump of everything observed for a device
    pub fn dump(&self, unit_id: UnitId) -> String {
        self.store.dump(unit_id)
    }

    /// direct access to the register store for external decoders
    pub fn registers(&self) -> &RegisterStore {
        &self.store
    }

    #[cfg(test)]
    fn new_mock(mock: tokio_test::io::Mock, config: ObserverConfig) -> Self {
        Self {
            path: String::new(),
            serial_settings: SerialSettings::default(),
            config,
            phys: Some(PhysLayer::new_mock(mock)),
            correlator: correlator::FrameCorrelator::new(config.request_timeout),
            store: RegisterStore::new(),
        }
    }
}
