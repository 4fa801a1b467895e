//! Fuzz target for encoding arbitrary logs.
//!
//! Tests:
//! - Every header that encodes also decodes to the same value
//! - Reading count survives the trip

#![no_main]

use arbitrary::Arbitrary;
use batcon::protocol::{decode, CapacitySummary, LogRecord, Reading, TestHeader};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct LogInput {
    fingerprint: u32,
    team_id: u16,
    battery_id: String,
    start_timestamp: u64,
    load_milliohms: u32,
    poll_interval_ms: u32,
    min_volts_milli: u32,
    log_volts_milli: u32,
    readings: Vec<(u32, u32, u32)>,
    ampere_seconds: u64,
}

fuzz_target!(|input: LogInput| {
    let record = LogRecord {
        header: TestHeader {
            fingerprint: input.fingerprint,
            team_id: input.team_id,
            battery_id: input.battery_id,
            start_timestamp: input.start_timestamp,
            load_milliohms: input.load_milliohms,
            poll_interval_ms: input.poll_interval_ms,
            min_volts_milli: input.min_volts_milli,
            log_volts_milli: input.log_volts_milli,
        },
        readings: input
            .readings
            .into_iter()
            .map(|(voltage_mv, current_ma, elapsed_ms)| Reading {
                voltage_mv,
                current_ma,
                elapsed_ms,
            })
            .collect(),
        summary: CapacitySummary::new(input.ampere_seconds),
    };

    let Ok(bytes) = record.encode() else {
        return;
    };
    let decoded = decode(&bytes).expect("encoded log must decode");
    assert_eq!(decoded.readings.len(), record.readings.len());
    assert_eq!(decoded.summary, record.summary);
    assert_eq!(decoded, record);
});
