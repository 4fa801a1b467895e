//! Fuzz target for the log decoder.
//!
//! Tests:
//! - No panics on arbitrary input, legacy or framed
//! - Accepted input always has a well-formed length
//! - Whatever decodes re-encodes to a log that decodes to the same record

#![no_main]

use batcon::protocol::{decode, decode_auto, LogFormat, READING_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = decode_auto(data) else {
        return;
    };

    let preamble = LogFormat::detect(data).preamble().len();
    assert_eq!(
        data.len(),
        preamble + 48 + READING_LEN * record.readings.len()
    );

    if let Ok(encoded) = record.encode() {
        assert_eq!(decode(&encoded).ok(), Some(record));
    }
});
