#![no_main]

use libfuzzer_sys::fuzz_target;
use meshtable_core::core_table::Event;

fuzz_target!(|data: &[u8]| {
    // Whatever decodes must encode back to something that decodes the same
    if let Ok(event) = Event::from_bytes(data) {
        let bytes = event.to_bytes().expect("decoded event re-encodes");
        assert_eq!(Event::from_bytes(&bytes).expect("re-encoded event decodes"), event);
    }
});
