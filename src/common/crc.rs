/// precomputes the CRC table as a constant!
const CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_MODBUS);

/// Modbus RTU CRC16 over an arbitrary byte sequence
pub(crate) fn checksum(bytes: &[u8]) -> u16 {
    CRC.checksum(bytes)
}

pub(crate) struct CrcMismatch {
    pub(crate) received: u16,
    pub(crate) computed: u16,
}

/// Verify a frame against the little-endian CRC trailer in its last two bytes
pub(crate) fn check(frame: &[u8]) -> Result<(), CrcMismatch> {
    match frame {
        [body @ .., lo, hi] => {
            let received = u16::from_le_bytes([*lo, *hi]);
            let computed = checksum(body);
            if received == computed {
                Ok(())
            } else {
                Err(CrcMismatch { received, computed })
            }
        }
        // too short to carry a trailer, can never match
        _ => Err(CrcMismatch {
            received: 0,
            computed: checksum(&[]),
        }),
    }
}
