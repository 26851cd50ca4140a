//! Opaque license key generation.

use rand::Rng;
use rand::rngs::OsRng;

const KEY_PREFIX: &str = "LIC";
const BLOCKS: usize = 4;
const BLOCK_LEN: usize = 4;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a license key of the form `LIC-7K2M-9QXR-04ZA-PW31`.
///
/// Keys come from the OS CSPRNG: the key is the only secret gating
/// activation. The generator has no view of existing keys; uniqueness is
/// enforced by the store's unique constraint at insert time.
pub fn generate() -> String {
    let mut rng = OsRng;
    let mut key = String::with_capacity(KEY_PREFIX.len() + BLOCKS * (BLOCK_LEN + 1));
    key.push_str(KEY_PREFIX);
    for _ in 0..BLOCKS {
        key.push('-');
        for _ in 0..BLOCK_LEN {
            let idx = rng.gen_range(0..ALPHABET.len());
            key.push(ALPHABET[idx] as char);
        }
    }
    key
}
