use std::time::Duration;

use crate::error::OpenError;

/// Serial port settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerialSettings {
    /// baud rate of the link
    pub baud_rate: u32,
    /// number of data bits per character
    pub data_bits: DataBits,
    /// flow control mode
    pub flow_control: FlowControl,
    /// parity setting
    pub parity: Parity,
    /// number of stop bits
    pub stop_bits: StopBits,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            flow_control: FlowControl::None,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }
}

/// Number of data bits per character
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataBits {
    /// 5 data bits
    Five,
    /// 6 data bits
    Six,
    /// 7 data bits
    Seven,
    /// 8 data bits
    Eight,
}

/// Parity checking modes.
///
/// The RTU line format also allows mark and space parity. The serial backend
/// cannot produce them, so selecting either fails when the port is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// no parity bit
    None,
    /// parity bit sets an odd number of 1 bits
    Odd,
    /// parity bit sets an even number of 1 bits
    Even,
    /// parity bit is always 1
    Mark,
    /// parity bit is always 0
    Space,
}

/// Number of stop bits.
///
/// 1.5 stop bits are part of the RTU line format for some legacy devices but
/// are not supported by the serial backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopBits {
    /// one stop bit
    One,
    /// one and a half stop bits
    OnePointFive,
    /// two stop bits
    Two,
}

/// Flow control modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowControl {
    /// no flow control
    None,
    /// flow control using XON/XOFF bytes
    Software,
    /// flow control using RTS/CTS signals
    Hardware,
}

impl std::fmt::Display for Parity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => f.write_str("no"),
            Parity::Odd => f.write_str("odd"),
            Parity::Even => f.write_str("even"),
            Parity::Mark => f.write_str("mark"),
            Parity::Space => f.write_str("space"),
        }
    }
}

impl std::fmt::Display for StopBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopBits::One => f.write_str("1"),
            StopBits::OnePointFive => f.write_str("1.5"),
            StopBits::Two => f.write_str("2"),
        }
    }
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(value: DataBits) -> Self {
        match value {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(value: FlowControl) -> Self {
        match value {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

impl TryFrom<Parity> for tokio_serial::Parity {
    type Error = OpenError;

    fn try_from(value: Parity) -> Result<Self, Self::Error> {
        match value {
            Parity::None => Ok(tokio_serial::Parity::None),
            Parity::Odd => Ok(tokio_serial::Parity::Odd),
            Parity::Even => Ok(tokio_serial::Parity::Even),
            Parity::Mark | Parity::Space => Err(OpenError::UnsupportedParity(value)),
        }
    }
}

impl TryFrom<StopBits> for tokio_serial::StopBits {
    type Error = OpenError;

    fn try_from(value: StopBits) -> Result<Self, Self::Error> {
        match value {
            StopBits::One => Ok(tokio_serial::StopBits::One),
            StopBits::Two => Ok(tokio_serial::StopBits::Two),
            StopBits::OnePointFive => Err(OpenError::UnsupportedStopBits(value)),
        }
    }
}

pub(crate) fn open(
    path: &str,
    settings: SerialSettings,
) -> Result<tokio_serial::SerialStream, OpenError> {
    use tokio_serial::SerialPortBuilderExt;

    let builder = tokio_serial::new(path, settings.baud_rate)
        .data_bits(settings.data_bits.into())
        .flow_control(settings.flow_control.into())
        .parity(settings.parity.try_into()?)
        .stop_bits(settings.stop_bits.try_into()?);

    Ok(builder.open_native_async()?)
}

// Modbus RTU uses 11-bit characters (1 start, 8 data, 1 parity or stop, 1 stop)
const NUM_BITS_IN_CHAR: u32 = 11;

/// Inter-frame silence for a given baud rate.
///
/// End of frame on an RTU link is a transmit silence of 3.5 character times.
/// A 30% margin keeps a slow master from splitting frames on us.
pub fn inter_frame_silence(baud_rate: u32) -> Duration {
    let character_time = Duration::from_secs(NUM_BITS_IN_CHAR as u64) / baud_rate.max(1);
    let silence = 35 * character_time / 10;
    13 * silence / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_silence_from_baud_rate() {
        // (11 / 9600) * 3.5 * 1.3 ~= 5.2 ms
        let silence = inter_frame_silence(9600);
        assert!(silence > Duration::from_micros(5200));
        assert!(silence < Duration::from_micros(5220));
    }

    #[test]
    fn slower_links_get_longer_silence() {
        assert!(inter_frame_silence(2400) > inter_frame_silence(9600));
        assert!(inter_frame_silence(9600) > inter_frame_silence(115_200));
    }

    #[test]
    fn tolerates_nonsense_baud_rate() {
        assert!(inter_frame_silence(0) > Duration::ZERO);
    }

    #[test]
    fn rejects_unsupported_line_settings() {
        assert!(tokio_serial::Parity::try_from(Parity::Mark).is_err());
        assert!(tokio_serial::Parity::try_from(Parity::Space).is_err());
        assert!(tokio_serial::StopBits::try_from(StopBits::OnePointFive).is_err());
        assert!(tokio_serial::StopBits::try_from(StopBits::Two).is_ok());
    }
}
