//! Property tests for the 7-bit codec and the frame parser.

use firmata_proto::{pack16, pack_chars, unpack16, unpack_chars, FrameParser, Message};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_pack16_round_trip(value in 0u16..=32_767) {
        let (lsb, msb) = pack16(value).unwrap();
        prop_assert!(lsb < 0x80);
        prop_assert_eq!(unpack16(lsb, msb), value);
    }

    #[test]
    fn test_pack16_rejects_above_max(value in 32_768u16..) {
        prop_assert!(pack16(value).is_err());
    }

    #[test]
    fn test_string_round_trip(s in "[ -~]{0,40}") {
        let packed: Vec<u8> = pack_chars(&s)
            .flat_map(|pair| pair.unwrap())
            .collect();
        prop_assert_eq!(packed.len(), s.len() * 2);
        let decoded: String = unpack_chars(&packed).collect();
        prop_assert_eq!(decoded, s);
    }

    #[test]
    fn test_analog_report_after_noise(noise in proptest::collection::vec(0u8..0x80, 0..16), pin in 0u8..16, raw in 0u16..1024) {
        // Data bytes with no lead are dropped until the report arrives
        let mut parser = FrameParser::new();
        for byte in noise {
            prop_assert!(parser.push_byte(byte).is_err());
        }
        let (lsb, msb) = pack16(raw).unwrap();
        let mut out = None;
        for byte in [0xE0 | pin, lsb, msb] {
            if let Some(frame) = parser.push_byte(byte).unwrap() {
                out = Some(Message::try_from(frame).unwrap());
            }
        }
        prop_assert_eq!(out, Some(Message::AnalogValue { pin, raw }));
    }
}

#[cfg(feature = "std")]
mod strings {
    use firmata_proto::{pack_string, unpack_string};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_pack_string_round_trip(s in "[ -~é°µ]{0,40}") {
            let packed = pack_string(&s).unwrap();
            prop_assert_eq!(packed.len(), s.chars().count() * 2);
            prop_assert!(packed.iter().all(|b| *b < 0x80));
            prop_assert_eq!(unpack_string(&packed), s);
        }

        #[test]
        fn test_pack_string_rejects_wide_chars(prefix in "[ -~]{0,8}") {
            let s = format!("{prefix}\u{1F600}");
            prop_assert!(pack_string(&s).is_err());
        }
    }
}
