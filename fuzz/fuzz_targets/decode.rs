#![no_main]

use libfuzzer_sys::fuzz_target;
use wasmint::decode_module;

// The decoder must reject malformed input with an error, never a panic.
fuzz_target!(|data: &[u8]| {
    let _ = decode_module(data);
});
