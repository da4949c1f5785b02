//! Key computation for DAG nodes using BLAKE3

use crate::types::Key;
use blake3::Hasher;

/// Compute the Key of an encoded DAG node
///
/// Key = hash("dagnode" || encoded_len || encoded)
pub fn compute_node_key(encoded: &[u8]) -> Key {
    let mut hasher = Hasher::new();

    // Hash type discriminator
    hasher.update(b"dagnode");

    // Hash encoding length (8 bytes, big-endian for determinism)
    hasher.update(&(encoded.len() as u64).to_be_bytes());

    hasher.update(encoded);

    Key::from_bytes(*hasher.finalize().as_bytes())
}
