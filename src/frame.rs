//! Wire framing of the SEN55 command/response protocol.
//!
//! An outbound frame is the 2-byte big-endian command, followed by the
//! parameter words, each serialized as `[hi, lo, crc8(hi, lo)]`. A
//! response carries the same word-plus-checksum grouping without a
//! leading command, so a response of `N` data words is `3 * N` raw
//! bytes on the bus.

use heapless::Vec;

use crate::crc::crc8;
use crate::error::Error;
use crate::types::GasTuning;

/// A 16-bit command, big-endian on the wire.
pub type Cmd = [u8; 2];

const MAX_TX_WORDS: usize = 6;
/// Largest outbound frame: a command plus the six-word tuning block.
pub(crate) const MAX_TX: usize = 2 + 3 * MAX_TX_WORDS;
/// Largest response: 16 words (the 32-character device-info strings).
pub(crate) const MAX_RX: usize = 3 * 16;

/// Parameter block of an outbound command.
///
/// The word order emitted for each variant is the device's documented
/// register layout and is part of the wire contract.
pub(crate) enum Payload<'a> {
    None,
    Word(u16),
    DoubleWord(u32),
    Tuning(&'a GasTuning),
    TempComp([u16; 3]),
    Blob(&'a [u8; 8]),
}

/// A serialized outbound frame.
pub(crate) struct TxFrame {
    buf: [u8; MAX_TX],
    len: usize,
}

impl TxFrame {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn push_word(&mut self, word: u16) {
        let [hi, lo] = word.to_be_bytes();
        self.buf[self.len] = hi;
        self.buf[self.len + 1] = lo;
        self.buf[self.len + 2] = crc8([hi, lo]);
        self.len += 3;
    }
}

/// Builds the wire frame for `cmd` with the given parameter block.
pub(crate) fn encode(cmd: Cmd, payload: &Payload<'_>) -> TxFrame {
    let mut frame = TxFrame {
        buf: [0; MAX_TX],
        len: 2,
    };
    frame.buf[..2].copy_from_slice(&cmd);

    match payload {
        Payload::None => {}
        Payload::Word(value) => frame.push_word(*value),
        Payload::DoubleWord(value) => {
            frame.push_word((value >> 16) as u16);
            frame.push_word(*value as u16);
        }
        Payload::Tuning(tuning) => {
            frame.push_word(tuning.index_offset as u16);
            frame.push_word(tuning.learn_time_offset_hours as u16);
            frame.push_word(tuning.learn_time_gain_hours as u16);
            frame.push_word(tuning.gate_max_duration_min as u16);
            frame.push_word(tuning.std_initial as u16);
            frame.push_word(tuning.gain_factor as u16);
        }
        Payload::TempComp(words) => {
            for word in words {
                frame.push_word(*word);
            }
        }
        Payload::Blob(bytes) => {
            for pair in bytes.chunks_exact(2) {
                frame.push_word(u16::from_be_bytes([pair[0], pair[1]]));
            }
        }
    }

    frame
}

fn check<E>(group: &[u8]) -> Result<u16, Error<E>> {
    if crc8([group[0], group[1]]) != group[2] {
        return Err(Error::Protocol);
    }

    Ok(u16::from_be_bytes([group[0], group[1]]))
}

/// Decodes a response of exactly `N` words, validating every checksum.
pub(crate) fn decode_exact<const N: usize, E>(raw: &[u8]) -> Result<[u16; N], Error<E>> {
    if raw.len() != 3 * N {
        return Err(Error::DataLength);
    }

    let mut words = [0u16; N];
    for (slot, group) in words.iter_mut().zip(raw.chunks_exact(3)) {
        *slot = check(group)?;
    }

    Ok(words)
}

/// Decodes a zero-terminated text response.
///
/// Words are validated and appended to `out` byte-wise until a full zero
/// word is seen. That word terminates the response: whatever the device
/// padded the transfer with after it is discarded without validation.
pub(crate) fn decode_terminated<E, const CAP: usize>(
    raw: &[u8],
    out: &mut Vec<u8, CAP>,
) -> Result<(), Error<E>> {
    for group in raw.chunks_exact(3) {
        let word = check(group)?;
        if word == 0 {
            return Ok(());
        }

        let [hi, lo] = word.to_be_bytes();
        out.push(hi).map_err(|_| Error::DataLength)?;
        out.push(lo).map_err(|_| Error::DataLength)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sen55::commands;

    fn groups(words: &[u16]) -> std::vec::Vec<u8> {
        let mut bytes = std::vec::Vec::new();
        for &word in words {
            let [hi, lo] = word.to_be_bytes();
            bytes.extend_from_slice(&[hi, lo, crc8([hi, lo])]);
        }
        bytes
    }

    fn framed(cmd: Cmd, words: &[u16]) -> std::vec::Vec<u8> {
        let mut bytes = std::vec::Vec::from(cmd);
        bytes.extend_from_slice(&groups(words));
        bytes
    }

    #[test]
    fn bare_command_is_two_bytes() {
        let frame = encode(commands::START_MEASUREMENT, &Payload::None);
        assert_eq!(frame.as_bytes(), &[0x00, 0x21]);
    }

    #[test]
    fn word_payload_carries_checksum() {
        let frame = encode(commands::WARM_START_PARAMETER, &Payload::Word(0xbeef));
        assert_eq!(frame.as_bytes(), &[0x60, 0xc6, 0xbe, 0xef, 0x92]);
    }

    #[test]
    fn double_word_is_split_big_endian() {
        let frame = encode(commands::AUTO_CLEANING_INTERVAL, &Payload::DoubleWord(604_800));
        assert_eq!(
            frame.as_bytes(),
            framed(commands::AUTO_CLEANING_INTERVAL, &[0x0009, 0x3a80])
        );
    }

    #[test]
    fn tuning_words_follow_register_order() {
        let tuning = GasTuning {
            index_offset: 1,
            learn_time_offset_hours: 2,
            learn_time_gain_hours: 3,
            gate_max_duration_min: 4,
            std_initial: 5,
            gain_factor: 6,
        };
        let frame = encode(commands::NOX_TUNING_PARAMETERS, &Payload::Tuning(&tuning));
        assert_eq!(
            frame.as_bytes(),
            framed(commands::NOX_TUNING_PARAMETERS, &[1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn negative_tuning_fields_are_twos_complement() {
        let tuning = GasTuning {
            index_offset: -1,
            learn_time_offset_hours: 0,
            learn_time_gain_hours: 0,
            gate_max_duration_min: 0,
            std_initial: 0,
            gain_factor: 0,
        };
        let frame = encode(commands::VOC_TUNING_PARAMETERS, &Payload::Tuning(&tuning));
        assert_eq!(&frame.as_bytes()[2..4], &[0xff, 0xff]);
    }

    #[test]
    fn blob_payload_is_word_framed() {
        let frame = encode(
            commands::VOC_ALGORITHM_STATE,
            &Payload::Blob(&[1, 2, 3, 4, 5, 6, 7, 8]),
        );
        assert_eq!(
            frame.as_bytes(),
            framed(commands::VOC_ALGORITHM_STATE, &[0x0102, 0x0304, 0x0506, 0x0708])
        );
    }

    #[test]
    fn temp_comp_payload_is_three_words() {
        let frame = encode(
            commands::TEMPERATURE_COMPENSATION,
            &Payload::TempComp([0xfe0c, 0x03e8, 30]),
        );
        assert_eq!(
            frame.as_bytes(),
            framed(commands::TEMPERATURE_COMPENSATION, &[0xfe0c, 0x03e8, 30])
        );
    }

    #[test]
    fn decode_recovers_words() {
        let raw = groups(&[0x1234, 0xbeef]);
        assert_eq!(decode_exact::<2, ()>(&raw), Ok([0x1234, 0xbeef]));
    }

    #[test]
    fn corrupted_checksum_is_a_protocol_error() {
        let mut raw = groups(&[0x1234, 0xbeef]);
        raw[5] ^= 0x01;
        assert_eq!(decode_exact::<2, ()>(&raw), Err(Error::Protocol));
    }

    #[test]
    fn truncated_response_is_a_length_error() {
        let raw = groups(&[0x1234, 0xbeef]);
        assert_eq!(decode_exact::<2, ()>(&raw[..5]), Err(Error::DataLength));
        assert_eq!(decode_exact::<3, ()>(&raw), Err(Error::DataLength));
    }

    #[test]
    fn zero_word_terminates_and_discards_the_rest() {
        let mut raw = groups(&[0x4142, 0x4300, 0x0000]);
        // trailing pad bytes with a bad checksum must never be examined
        raw.extend_from_slice(&[0xaa, 0xbb, 0x00]);

        let mut out: Vec<u8, 32> = Vec::new();
        assert_eq!(decode_terminated::<(), 32>(&raw, &mut out), Ok(()));
        assert_eq!(&out, &[0x41, 0x42, 0x43, 0x00]);
    }

    #[test]
    fn unterminated_text_consumes_everything() {
        let raw = groups(&[0x4142, 0x4344]);
        let mut out: Vec<u8, 32> = Vec::new();
        assert_eq!(decode_terminated::<(), 32>(&raw, &mut out), Ok(()));
        assert_eq!(&out, &[0x41, 0x42, 0x43, 0x44]);
    }
}
