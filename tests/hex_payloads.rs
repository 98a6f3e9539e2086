//! Hex payload decoding properties and spaced-out operator input

use btserial::descriptor::CommandDescriptor;
use btserial::hexcodec::{self, HexError};
use proptest::prelude::*;

#[test]
fn empty_and_blank_input_is_rejected() {
    assert_eq!(hexcodec::decode(""), Err(HexError::Empty));
    assert_eq!(hexcodec::decode("  \t\n"), Err(HexError::Empty));
}

#[test]
fn mixed_case_and_spacing() {
    assert_eq!(
        hexcodec::decode("0d 0A\r\n ff").unwrap(),
        vec![0x0D, 0x0A, 0xFF]
    );
}

#[test]
fn bad_digit_position_counts_after_whitespace_removal() {
    assert_eq!(
        hexcodec::decode("41 4G"),
        Err(HexError::InvalidDigit { ch: 'G', index: 3 })
    );
}

proptest! {
    #[test]
    fn encoded_bytes_decode_back(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let text = hexcodec::encode(&bytes);
        prop_assert_eq!(hexcodec::decode(&text).unwrap(), bytes.clone());
        prop_assert_eq!(hexcodec::decode(&text.to_lowercase()).unwrap(), bytes);
    }

    #[test]
    fn spaced_pairs_decode_like_packed(bytes in prop::collection::vec(any::<u8>(), 1..32)) {
        let spaced = bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(hexcodec::decode(&spaced).unwrap(), bytes);
    }

    #[test]
    fn odd_digit_counts_never_decode(digits in "[0-9a-fA-F]([0-9a-fA-F]{2}){0,15}") {
        prop_assert_eq!(
            hexcodec::decode(&digits),
            Err(HexError::OddLength { len: digits.len() })
        );
    }

    #[test]
    fn hex_descriptor_payload_is_decoded_body(
        bytes in prop::collection::vec(any::<u8>(), 1..32),
        crlf in any::<bool>(),
    ) {
        let body = hexcodec::encode(&bytes);
        let cmd = CommandDescriptor::new("00:11:22:AA:BB:CC", &body, crlf, true).unwrap();
        let mut expected = bytes;
        if crlf {
            expected.extend_from_slice(b"\r\n");
        }
        prop_assert_eq!(cmd.encoded_payload().unwrap(), expected);
    }
}
