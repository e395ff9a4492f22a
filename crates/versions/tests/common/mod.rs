pub mod faults;
pub mod fixtures;
pub mod harness;

#[allow(unused_imports)]
pub use faults::FaultyBlobStore;
#[allow(unused_imports)]
pub use fixtures::{activator, admin, reader, seeded_bytes, sha256_hash, writer};
#[allow(unused_imports)]
pub use harness::TestRegistry;
