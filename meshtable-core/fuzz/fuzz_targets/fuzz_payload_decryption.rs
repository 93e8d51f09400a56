#![no_main]

use libfuzzer_sys::fuzz_target;
use meshtable_core::adapters::GroupCipher;
use meshtable_core::core_table::{ContentCipher, PeerId};
use uuid::Uuid;

fuzz_target!(|data: &[u8]| {
    let namespace = Uuid::from_u128(1);
    let cipher = GroupCipher::new().with_secret(namespace, [7u8; 32]);

    // Forged payloads never authenticate
    assert!(cipher.decrypt(PeerId::new(Uuid::from_u128(2)), namespace, data).is_err());
});
