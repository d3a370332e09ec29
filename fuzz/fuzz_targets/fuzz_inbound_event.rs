#![no_main]

use biocalm_core::InboundEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding must never panic, whatever the service sends.
    let _: Result<InboundEvent, _> = serde_json::from_slice(data);
});
