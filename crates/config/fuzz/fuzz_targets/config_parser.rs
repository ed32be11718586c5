//! Fuzzing harness for config parsing
//!
//! Arbitrary TOML must never panic parsing or validation.
//! Run with: cargo fuzz run config_parser

#![no_main]
use libfuzzer_sys::fuzz_target;
use syncwatch_config::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<Config>(s) {
            let _ = config.validate();
        }
    }
});
