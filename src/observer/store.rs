use std::collections::BTreeMap;
use std::fmt::Write;

use crate::types::UnitId;

pub(crate) mod constants {
    /// device buffers grow in fixed increments of this many bytes
    pub(crate) const GROWTH_INCREMENT: usize = 4096;
    /// growth stops once the increment base reaches the 16-bit addressing limit
    pub(crate) const SIZE_LIMIT: usize = 0xFFFF;
}

const BYTES_PER_DUMP_LINE: usize = 16;

/// Last known value of every register observed on the bus, per device.
///
/// Each device gets a growable byte buffer. Buffers only ever grow, in
/// 4096-byte increments, and previously observed values survive growth.
/// Registers are two-byte cells: a logical register index maps to byte
/// offset `index * 2`.
///
/// Reading a device that was never observed, or a register beyond the
/// allocated buffer, yields a zero value. Callers must treat zero as "no
/// data yet", not as a reading.
#[derive(Debug, Default)]
pub struct RegisterStore {
    devices: BTreeMap<u8, Vec<u8>>,
}

impl RegisterStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grow the device buffer until it covers `required` bytes.
    ///
    /// A device seen for the first time starts from a 4096-byte floor even
    /// for a smaller requirement.
    pub(crate) fn extend(&mut self, unit_id: UnitId, required: usize) {
        let buffer = self.devices.entry(unit_id.value).or_default();
        let current = buffer.len();

        let mut target = if current == 0 {
            constants::GROWTH_INCREMENT
        } else {
            current
        };
        while required > target && target < constants::SIZE_LIMIT {
            target += constants::GROWTH_INCREMENT;
        }

        if target > current {
            // zero-filled extension, prior contents stay in place
            buffer.resize(target, 0);
        }
    }

    /// Copy response data into the device buffer, clamped to its capacity
    pub(crate) fn write(&mut self, unit_id: UnitId, offset: usize, data: &[u8]) {
        let buffer = match self.devices.get_mut(&unit_id.value) {
            Some(x) => x,
            None => return,
        };

        if offset >= buffer.len() {
            return;
        }
        let count = data.len().min(buffer.len() - offset);
        buffer[offset..offset + count].copy_from_slice(&data[..count]);
    }

    /// 32-bit float at a register index, big-endian as observed on the wire
    pub fn float(&self, unit_id: UnitId, register: u16) -> f32 {
        self.cells::<4>(unit_id, register)
            .map(f32::from_be_bytes)
            .unwrap_or(0.0)
    }

    /// signed 16-bit integer at a register index, little-endian as observed on the wire
    pub fn int16(&self, unit_id: UnitId, register: u16) -> i16 {
        self.cells::<2>(unit_id, register)
            .map(i16::from_le_bytes)
            .unwrap_or(0)
    }

    /// unsigned 16-bit integer at a register index, little-endian as observed on the wire
    pub fn uint16(&self, unit_id: UnitId, register: u16) -> u16 {
        self.cells::<2>(unit_id, register)
            .map(u16::from_le_bytes)
            .unwrap_or(0)
    }

    /// signed 32-bit integer at a register index, little-endian as observed on the wire
    pub fn int32(&self, unit_id: UnitId, register: u16) -> i32 {
        self.cells::<4>(unit_id, register)
            .map(i32::from_le_bytes)
            .unwrap_or(0)
    }

    /// unsigned 32-bit integer at a register index, little-endian as observed on the wire
    pub fn uint32(&self, unit_id: UnitId, register: u16) -> u32 {
        self.cells::<4>(unit_id, register)
            .map(u32::from_le_bytes)
            .unwrap_or(0)
    }

    /// buffer length currently allocated for a device, 0 if it was never observed
    pub fn allocated(&self, unit_id: UnitId) -> usize {
        self.devices.get(&unit_id.value).map(Vec::len).unwrap_or(0)
    }

    /// Offset-prefixed hex dump of the full register buffer for a device.
    ///
    /// Empty when the device was never observed.
    pub fn dump(&self, unit_id: UnitId) -> String {
        let mut out = String::new();
        let buffer = match self.devices.get(&unit_id.value) {
            Some(x) => x,
            None => return out,
        };

        for (line, chunk) in buffer.chunks(BYTES_PER_DUMP_LINE).enumerate() {
            let _ = write!(&mut out, "{:04X}:", line * BYTES_PER_DUMP_LINE);
            for byte in chunk {
                let _ = write!(&mut out, " {byte:02X}");
            }
            out.push('\n');
        }
        out
    }

    fn cells<const N: usize>(&self, unit_id: UnitId, register: u16) -> Option<[u8; N]> {
        let offset = register as usize * 2;
        let buffer = self.devices.get(&unit_id.value)?;
        let bytes = buffer.get(offset..offset + N)?;
        <[u8; N]>::try_from(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_ID: UnitId = UnitId::new(0x01);

    #[test]
    fn new_device_starts_from_the_growth_floor() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        assert_eq!(store.allocated(UNIT_ID), 4096);
    }

    #[test]
    fn growth_is_monotonic_and_block_aligned() {
        let mut store = RegisterStore::new();
        let mut previous = 0;
        for required in [1, 100, 4096, 4097, 9000, 20_000, 20_000, 12_000] {
            store.extend(UNIT_ID, required);
            let allocated = store.allocated(UNIT_ID);
            assert!(allocated >= previous);
            assert!(allocated >= required.min(constants::SIZE_LIMIT));
            assert_eq!(allocated % constants::GROWTH_INCREMENT, 0);
            previous = allocated;
        }
    }

    #[test]
    fn growth_preserves_prior_contents() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 0, &[0xDE, 0xAD, 0xBE, 0xEF]);
        store.extend(UNIT_ID, 10_000);
        assert_eq!(store.allocated(UNIT_ID), 12_288);
        assert_eq!(store.uint32(UNIT_ID, 0), u32::from_le_bytes([0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn growth_stops_at_the_size_limit() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 1_000_000);
        // the last increment is taken from a base just under the limit
        assert_eq!(store.allocated(UNIT_ID), 65_536);
        store.extend(UNIT_ID, 2_000_000);
        assert_eq!(store.allocated(UNIT_ID), 65_536);
    }

    #[test]
    fn unknown_device_reads_zero() {
        let store = RegisterStore::new();
        let ghost = UnitId::new(0x7F);
        assert_eq!(store.float(ghost, 0), 0.0);
        assert_eq!(store.int16(ghost, 0), 0);
        assert_eq!(store.uint16(ghost, 1234), 0);
        assert_eq!(store.int32(ghost, u16::MAX), 0);
        assert_eq!(store.uint32(ghost, 9), 0);
        assert_eq!(store.allocated(ghost), 0);
        assert!(store.dump(ghost).is_empty());
    }

    #[test]
    fn out_of_range_register_reads_zero() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 0, &[0xFF; 4096]);
        // last full cell is readable, anything past the buffer is not
        assert_eq!(store.uint16(UNIT_ID, 2047), 0xFFFF);
        assert_eq!(store.uint16(UNIT_ID, 2048), 0);
        // a four-byte read that straddles the end comes back empty too
        assert_eq!(store.uint32(UNIT_ID, 2047), 0);
    }

    #[test]
    fn floats_are_big_endian_on_the_wire() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 0, &[0x43, 0x66, 0x80, 0x00]);
        assert_eq!(store.float(UNIT_ID, 0), 230.5);
    }

    #[test]
    fn integers_are_little_endian_on_the_wire() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 0, &[0x12, 0x34, 0x00, 0x01]);
        assert_eq!(store.uint16(UNIT_ID, 0), 0x3412);
        // wire bytes 00 01 read back as 0x0100, not 1
        assert_eq!(store.uint16(UNIT_ID, 1), 0x0100);
        assert_eq!(store.uint32(UNIT_ID, 0), 0x0100_3412);
        assert_eq!(store.int16(UNIT_ID, 0), 0x3412);
    }

    #[test]
    fn writes_past_the_buffer_are_clamped() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 4094, &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(store.uint16(UNIT_ID, 2047), u16::from_le_bytes([0xAA, 0xBB]));
        assert_eq!(store.allocated(UNIT_ID), 4096);
        // an offset entirely outside the buffer is ignored
        store.write(UNIT_ID, 5000, &[0xEE]);
        assert_eq!(store.allocated(UNIT_ID), 4096);
    }

    #[test]
    fn dump_prefixes_each_line_with_the_offset() {
        let mut store = RegisterStore::new();
        store.extend(UNIT_ID, 10);
        store.write(UNIT_ID, 0, &[0x01, 0x02]);
        let dump = store.dump(UNIT_ID);
        assert!(dump.starts_with("0000: 01 02 00"));
        assert!(dump.contains("\n0010: 00"));
        assert_eq!(dump.lines().count(), 4096 / 16);
    }
}
