//! File identifier generation
use uuid7::uuid7;

const ID_LENGTH: usize = 40;

/// Source of collision-resistant file IDs.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// IDs derived from a fresh uuid7, hashed and hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        next_id()
    }
}

// construct a unique id then hash it so the ID reveals no creation order
pub fn next_id() -> String {
    let mut id = sha256::digest(uuid7().as_bytes().to_vec());
    id.truncate(ID_LENGTH);
    id
}
