#![no_main]

use libfuzzer_sys::fuzz_target;
use pgtunnel_db::TlsMode;
use pgtunnel_server::TunnelRequest;
use pgtunnel_server::request::decode_statement;

fuzz_target!(|data: &[u8]| {
    let request = TunnelRequest::from_form(data, TlsMode::Disable);
    let _ = request.descriptor.connection_string();
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = decode_statement(text);
    }
});
