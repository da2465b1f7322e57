#![no_main]

use libfuzzer_sys::fuzz_target;
use mediagate_protocol::{framer, CipherSuite, MessageKey, Ratchet};
use once_cell::sync::Lazy;

static KEYS: Lazy<Vec<(CipherSuite, MessageKey)>> = Lazy::new(|| {
    CipherSuite::all()
        .map(|suite| {
            let key = Ratchet::new([0x11u8; 32])
                .step(suite.hash, &[0x22u8; 32])
                .expect("ratchet step");
            (suite, key)
        })
        .collect()
});

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let (suite, key) = &KEYS[data[0] as usize % KEYS.len()];
    let sealed = &data[1..];

    let _ = framer::open(sealed, suite, key);
    let _ = framer::decrypt_padded(sealed, suite, key);
});
