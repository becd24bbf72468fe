// Fold counter samples into one row per VM (network) or per VM and disk class (storage).
// One command run can report several instances for the same VM (one per adapter or
// disk), so values for the same key are summed before any row is built.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::parse::CounterSample;
use super::{HYPER_V_DEVICE, VirtualMachines};
use crate::models::{NetworkMedium, NetworkStatRow, StorageClass, StorageStatRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOp {
    BytesSent,
    BytesReceived,
}

impl NetworkOp {
    pub const ALL: [NetworkOp; 2] = [Self::BytesSent, Self::BytesReceived];

    /// Operation label as it appears in the counter path.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BytesSent => "Bytes Sent",
            Self::BytesReceived => "Bytes Received",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.label() == label)
    }

    fn add_to(&self, totals: &mut NetworkTotals, value: u64) {
        let field = match self {
            Self::BytesSent => &mut totals.tx_rate,
            Self::BytesReceived => &mut totals.rx_rate,
        };
        *field = field.saturating_add(value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    ReadBytes,
    WriteBytes,
}

impl StorageOp {
    pub const ALL: [StorageOp; 2] = [Self::ReadBytes, Self::WriteBytes];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ReadBytes => "Read Bytes",
            Self::WriteBytes => "Write Bytes",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.label() == label)
    }

    fn add_to(&self, totals: &mut StorageTotals, value: u64) {
        let field = match self {
            Self::ReadBytes => &mut totals.read_rate,
            Self::WriteBytes => &mut totals.write_rate,
        };
        *field = field.saturating_add(value);
    }
}

#[derive(Debug, Default)]
struct NetworkTotals {
    rx_rate: u64,
    tx_rate: u64,
}

#[derive(Debug, Default)]
struct StorageTotals {
    read_rate: u64,
    write_rate: u64,
}

/// One row per configured VM seen in `samples`. The row's `ip` is the VM's mapped identity.
/// VMs with no traffic in either direction produce no row.
pub fn aggregate_network(
    samples: &[CounterSample],
    vms: &VirtualMachines,
    observed_at: DateTime<Utc>,
) -> Vec<NetworkStatRow> {
    let mut totals: BTreeMap<&str, NetworkTotals> = BTreeMap::new();

    for s in samples {
        let entity = s.counter.entity.as_str();
        if !vms.contains_key(entity) {
            continue;
        }
        let Some(op) = NetworkOp::from_label(&s.counter.operation) else {
            continue;
        };
        op.add_to(totals.entry(entity).or_default(), s.value);
    }

    totals
        .into_iter()
        .filter_map(|(vm, t)| {
            let ip = vms.get(vm)?;
            let row = NetworkStatRow::new(
                ip,
                None,
                NetworkMedium::Ethernet,
                HYPER_V_DEVICE,
                t.rx_rate,
                t.tx_rate,
                observed_at,
            );
            row.has_traffic().then_some(row)
        })
        .collect()
}

/// One row per (configured VM, storage class) seen in `samples`; missing operations are 0.
pub fn aggregate_storage(
    samples: &[CounterSample],
    vms: &VirtualMachines,
    observed_at: DateTime<Utc>,
) -> Vec<StorageStatRow> {
    let mut totals: BTreeMap<(&str, StorageClass), StorageTotals> = BTreeMap::new();

    for s in samples {
        let entity = s.counter.entity.as_str();
        if !vms.contains_key(entity) {
            continue;
        }
        let Some(op) = StorageOp::from_label(&s.counter.operation) else {
            continue;
        };
        let class = StorageClass::from_data_label(s.counter.data_label.as_deref());
        op.add_to(totals.entry((entity, class)).or_default(), s.value);
    }

    totals
        .into_iter()
        .map(|((vm, class), t)| {
            StorageStatRow::new(vm, class, t.read_rate, t.write_rate, observed_at)
        })
        .collect()
}
