//! Fuzzing harness for run summary and item decoding
//!
//! Pushed payloads come straight off the wire; decoding them must never panic.
//! Run with: cargo fuzz run summary_decoder

#![no_main]
use libfuzzer_sys::fuzz_target;
use syncwatch_core::{Item, RunSummary};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(summary) = RunSummary::from_json(s) {
            let _ = summary.is_finished();
            let _ = summary.report_lines();
        }
        let _ = serde_json::from_str::<Item>(s);
    }
});
