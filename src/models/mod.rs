// Row models written to the stat database

mod network;
mod storage;

pub use network::{DEVICE_MAX_LEN, IP_MAX_LEN, MAC_MAX_LEN, NetworkMedium, NetworkStatRow};
pub use storage::{StorageClass, StorageStatRow};

/// One unit of work for the sink: everything observed in a single cycle or message.
/// Committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatBatch {
    pub network: Vec<NetworkStatRow>,
    pub storage: Vec<StorageStatRow>,
}

impl StatBatch {
    pub fn is_empty(&self) -> bool {
        self.network.is_empty() && self.storage.is_empty()
    }

    pub fn len(&self) -> usize {
        self.network.len() + self.storage.len()
    }
}

/// Truncate to at most `max` characters (not bytes), matching VARCHAR(n) semantics.
pub(crate) fn clamp_len(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
