// Storage throughput rows (Hyper-V virtual disks)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clamp_len;
use super::network::DEVICE_MAX_LEN;

/// Which virtual disk of a VM the counter belongs to: the system disk, or a disk whose
/// file name carries a `Data` label (e.g. `BspOneData.vhdx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageClass {
    System,
    Data,
}

impl StorageClass {
    pub fn from_data_label(label: Option<&str>) -> Self {
        match label {
            Some(l) if !l.is_empty() => Self::Data,
            _ => Self::System,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Data => "Data",
        }
    }

    pub fn from_db(s: &str) -> Self {
        if s == "Data" { Self::Data } else { Self::System }
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStatRow {
    pub device: String,
    pub class: StorageClass,
    pub read_rate: u64,
    pub write_rate: u64,
    pub observed_at: DateTime<Utc>,
}

impl StorageStatRow {
    pub fn new(
        device: &str,
        class: StorageClass,
        read_rate: u64,
        write_rate: u64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device: clamp_len(device, DEVICE_MAX_LEN),
            class,
            read_rate,
            write_rate,
            observed_at,
        }
    }
}
