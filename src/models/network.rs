// Network utilization rows (router feed and Hyper-V adapters)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clamp_len;

pub const IP_MAX_LEN: usize = 15;
pub const MAC_MAX_LEN: usize = 17;
pub const DEVICE_MAX_LEN: usize = 255;

/// Transport medium of a host, inferred from the router's interface name.
/// wl0 is the 5G radio, wl1 the 2.4G radio, an empty name means wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkMedium {
    #[serde(rename = "2.4G")]
    Wifi2_4G,
    #[serde(rename = "5G")]
    Wifi5G,
    Ethernet,
    Unknown,
}

impl NetworkMedium {
    /// Resolve the medium from an interface-name token. Total: unknown names map to `Unknown`.
    pub fn resolve(ifname: &str) -> Self {
        match ifname {
            "" => Self::Ethernet,
            "wl0" => Self::Wifi5G,
            "wl1" => Self::Wifi2_4G,
            _ => Self::Unknown,
        }
    }

    /// Column value stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wifi2_4G => "2.4G",
            Self::Wifi5G => "5G",
            Self::Ethernet => "Ethernet",
            Self::Unknown => "Unknown",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "2.4G" => Self::Wifi2_4G,
            "5G" => Self::Wifi5G,
            "Ethernet" => Self::Ethernet,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for NetworkMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStatRow {
    pub ip: String,
    /// Absent for Hyper-V adapters, which are identified by their mapped IP only.
    pub mac: Option<String>,
    pub medium: NetworkMedium,
    pub device: String,
    pub rx_rate: u64,
    pub tx_rate: u64,
    pub observed_at: DateTime<Utc>,
}

impl NetworkStatRow {
    /// Build a row, truncating string fields to their column widths.
    pub fn new(
        ip: &str,
        mac: Option<&str>,
        medium: NetworkMedium,
        device: &str,
        rx_rate: u64,
        tx_rate: u64,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            ip: clamp_len(ip, IP_MAX_LEN),
            mac: mac.map(|m| clamp_len(m, MAC_MAX_LEN)),
            medium,
            device: clamp_len(device, DEVICE_MAX_LEN),
            rx_rate,
            tx_rate,
            observed_at,
        }
    }

    pub fn has_traffic(&self) -> bool {
        self.rx_rate > 0 || self.tx_rate > 0
    }
}
