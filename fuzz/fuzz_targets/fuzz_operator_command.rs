#![no_main]

use biocalm::session::OperatorCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = OperatorCommand::parse(line);
    }
});
