#![no_main]

use libfuzzer_sys::fuzz_target;
use mediagate_protocol::agreement::KeyRequest;
use mediagate_protocol::wire;
use mediagate_protocol::{ClientHello, PeerCertificate, ServerHello};

fuzz_target!(|data: &[u8]| {
    let _ = ClientHello::parse(data);
    let _ = KeyRequest::parse(data);
    let _ = ServerHello::parse(data);
    let _ = PeerCertificate::from_pem(data);
    let _ = wire::parse_chunk_index(data, 16);
});
