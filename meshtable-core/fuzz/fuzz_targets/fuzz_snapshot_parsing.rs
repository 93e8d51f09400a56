#![no_main]

use libfuzzer_sys::fuzz_target;
use meshtable_core::adapters::Snapshot;

fuzz_target!(|data: &[u8]| {
    // Malformed snapshot files must be rejected, never panic
    let _ = Snapshot::from_bytes(data);
});
