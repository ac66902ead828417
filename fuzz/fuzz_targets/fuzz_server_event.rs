#![no_main]

use libfuzzer_sys::fuzz_target;
use somo_client::protocol::{decode_event, ServerEvent};

fuzz_target!(|data: &[u8]| {
    // Byte path, including serde_json's own UTF-8 validation.
    let _ = serde_json::from_slice::<ServerEvent>(data);

    // The path the connection loop takes for every text frame.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(event) = decode_event(s) {
            let _ = event.kind();
        }
    }
});
