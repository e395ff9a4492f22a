use bytes::Bytes;
use chive_core::{Role, StaticActor};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of data as hex string
#[allow(dead_code)]
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    result.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Generate deterministic test data; same seed produces same output.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

#[allow(dead_code)]
pub fn reader() -> StaticActor {
    StaticActor::new("reader", [Role::Read])
}

#[allow(dead_code)]
pub fn activator() -> StaticActor {
    StaticActor::new("deployer", [Role::Activate])
}

#[allow(dead_code)]
pub fn writer() -> StaticActor {
    StaticActor::new("alice", [Role::Write])
}

#[allow(dead_code)]
pub fn admin() -> StaticActor {
    StaticActor::new("root", [Role::Admin])
}
