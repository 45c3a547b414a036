//! A passive observer for Modbus RTU serial traffic.
//!
//! The observer attaches to an RS-485 bus on which a third-party master is
//! already polling its slaves (power meters, inverters) and reconstructs the
//! read-input-register traffic without ever transmitting. A monitoring
//! process gets the same register data the legitimate master collects,
//! without disturbing the master/slave relationship.
//!
//! Because the observer is not the initiator it correlates each response
//! with the most recently observed request, tolerates split and
//! back-to-back frames, and degrades by losing data rather than failing:
//! malformed or missed traffic shows up as logged anomalies and register
//! gaps, never as errors out of the read loop.
//!
//! # Example
//!
//! ```no_run
//! use rtu_snoop::{ObserverConfig, RtuObserver, SerialSettings, UnitId};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = SerialSettings::default();
//!     let config = ObserverConfig::from_baud_rate(settings.baud_rate);
//!
//!     let mut observer = RtuObserver::new("/dev/ttyUSB0", settings, config);
//!     observer.connect()?;
//!
//!     loop {
//!         let activity = observer.read().await;
//!         if activity.responses > 0 {
//!             // register map of the observed meter is up to the caller
//!             println!("voltage: {}", observer.float(UnitId::new(1), 0x0000));
//!         }
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

mod common;
mod decode;
mod error;
mod exception;
mod observer;
mod serial;
mod types;

pub use crate::decode::*;
pub use crate::error::*;
pub use crate::exception::ExceptionCode;
pub use crate::observer::store::RegisterStore;
pub use crate::observer::{BusActivity, ObserverConfig, RtuObserver};
pub use crate::serial::{
    DataBits, FlowControl, Parity, SerialSettings, StopBits, inter_frame_silence,
};
pub use crate::types::*;
