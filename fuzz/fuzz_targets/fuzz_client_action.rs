#![no_main]

use libfuzzer_sys::fuzz_target;
use somo_client::protocol::{encode_action, ClientAction};

fuzz_target!(|data: &[u8]| {
    // Anything that decodes as an action must encode again.
    if let Ok(action) = serde_json::from_slice::<ClientAction>(data) {
        let encoded = encode_action(&action).unwrap_or_default();
        assert!(!encoded.is_empty(), "{} failed to encode", action.name());
    }
});
