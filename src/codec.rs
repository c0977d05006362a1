use bilge::prelude::*;
use crc::Crc;

/// Start of a frame. Never unit-encoded.
pub const STX: u8 = 0x02;
/// End of the payload; the two units that follow carry the CRC.
pub const ETX: u8 = 0x03;

/// Payload length is bounded by what a u8 can count
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// STX: 1, Payload: 2 * MAX_PAYLOAD_SIZE, ETX: 1, CRC: 2
pub const MAX_ENCODED_SIZE: usize = encoded_len(MAX_PAYLOAD_SIZE);

/// Reflected Dallas/Maxim CRC-8 (poly 0x31, init 0). Bit for bit the same as
/// shifting right and xoring 0x8C whenever `(crc ^ byte) & 1` is set.
const CRC8: Crc<u8> = Crc::<u8>::new(&crc::CRC_8_MAXIM_DOW);

/// Bytes on the wire for a payload of `payload_len` bytes.
pub const fn encoded_len(payload_len: usize) -> usize {
    1 + 2 * payload_len + 1 + 2
}

/// One transmitted byte carrying a nibble in bits 7..4 and its complement in
/// bits 3..0. Only 16 of the 256 byte values are valid units:
/// `0F 1E 2D 3C 4B 5A 69 78 87 96 A5 B4 C3 D2 E1 F0`.
#[bitsize(8)]
#[derive(DebugBits, Clone, Copy, PartialEq, FromBits)]
pub struct Unit {
    check: u4,
    nibble: u4,
}

impl Unit {
    pub fn encode(nibble: u4) -> Unit {
        Unit::new(u4::new(!nibble.value() & 0x0F), nibble)
    }

    pub fn is_valid(&self) -> bool {
        self.nibble().value() == !self.check().value() & 0x0F
    }

    /// The carried nibble, or `None` if the complement doesn't check out.
    pub fn decode(&self) -> Option<u4> {
        self.is_valid().then(|| self.nibble())
    }

    pub fn byte(&self) -> u8 {
        self.value
    }
}

/// Split `byte` into its high and low nibble units, in wire order.
pub fn encode_byte(byte: u8) -> [u8; 2] {
    [
        Unit::encode(u4::new(byte >> 4)).byte(),
        Unit::encode(u4::new(byte & 0x0F)).byte(),
    ]
}

/// Validate a received unit and pull out its nibble.
pub fn decode_unit(unit: u8) -> Option<u4> {
    Unit::from(unit).decode()
}

pub fn join_nibbles(high: u4, low: u4) -> u8 {
    (high.value() << 4) | low.value()
}

pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Shift-and-feedback form of the checksum, kept here to pin the `crc`
    /// catalogue entry to it.
    fn crc8_bitwise(data: &[u8]) -> u8 {
        let mut crc = 0u8;
        for &b in data {
            let mut inbyte = b;
            for _ in 0..8 {
                let mix = (crc ^ inbyte) & 0x01;
                crc >>= 1;
                if mix != 0 {
                    crc ^= 0x8C;
                }
                inbyte >>= 1;
            }
        }
        crc
    }

    #[test]
    fn valid_units_are_exactly_sixteen() {
        let valid: heapless::Vec<u8, 16> = (0..=u8::MAX).filter(|b| decode_unit(*b).is_some()).collect();
        assert_eq!(
            valid.as_slice(),
            &[
                0x0F, 0x1E, 0x2D, 0x3C, 0x4B, 0x5A, 0x69, 0x78, 0x87, 0x96, 0xA5, 0xB4, 0xC3, 0xD2,
                0xE1, 0xF0
            ]
        );
    }

    #[test]
    fn markers_are_never_valid_units() {
        assert!(decode_unit(STX).is_none());
        assert!(decode_unit(ETX).is_none());
    }

    #[test]
    fn encode_byte_wire_order() {
        assert_eq!(encode_byte(0x41), [0x4B, 0x1E]);
        assert_eq!(encode_byte(0x42), [0x4B, 0x2D]);
        assert_eq!(encode_byte(0x00), [0x0F, 0x0F]);
        assert_eq!(encode_byte(0xFF), [0xF0, 0xF0]);
    }

    #[test]
    fn crc8_check_value() {
        assert_eq!(crc8(b"123456789"), 0xA1);
        assert_eq!(crc8(&[0x41, 0x42]), 0xA5);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn every_byte_round_trips() {
        for b in 0..=u8::MAX {
            let [hi, lo] = encode_byte(b);
            let hi = decode_unit(hi).unwrap();
            let lo = decode_unit(lo).unwrap();
            assert_eq!(join_nibbles(hi, lo), b);
        }
    }

    #[test]
    fn max_encoded_size() {
        assert_eq!(encoded_len(2), 8);
        assert_eq!(MAX_ENCODED_SIZE, 514);
    }

    proptest! {
        #[test]
        fn crc8_matches_bitwise(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            prop_assert_eq!(crc8(&data), crc8_bitwise(&data));
        }

        #[test]
        fn single_bit_flip_invalidates_unit(b in any::<u8>(), bit in 0u8..8) {
            for unit in encode_byte(b) {
                prop_assert!(decode_unit(unit ^ (1 << bit)).is_none());
            }
        }
    }
}
