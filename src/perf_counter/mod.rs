// Hyper-V performance counters sampled through typeperf.
//
// A CounterDomain knows which counters to ask for (per configured VM and operation),
// how to recognise them in the output header, and how to fold matches into rows.

pub mod aggregate;
pub mod command;
pub mod parse;

pub use aggregate::{NetworkOp, StorageOp, aggregate_network, aggregate_storage};
pub use command::{CommandOutput, CommandRunner, ProcessRunner};
pub use parse::{CounterMatch, CounterSample, parse_counter_output};

use regex::Regex;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::IngestError;

/// `device` of network rows produced from Hyper-V adapters.
pub const HYPER_V_DEVICE: &str = "Hyper-V";

/// Entity -> identity map: VM name -> IP recorded on its network rows.
pub type VirtualMachines = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    Network,
    Storage,
}

impl DomainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
        }
    }
}

/// Counter paths, invocation, and match pattern for one counter domain.
#[derive(Debug, Clone)]
pub struct CounterDomain {
    pub kind: DomainKind,
    pub args: Vec<String>,
    pub pattern: Regex,
}

impl CounterDomain {
    pub fn network(program: &str, vms: &VirtualMachines) -> anyhow::Result<Self> {
        let counters = vms.keys().flat_map(|vm| {
            NetworkOp::ALL.into_iter().map(move |op| {
                format!(r"\Hyper-V Virtual Network Adapter({}_*)\{}/sec", vm, op.label())
            })
        });
        let ops = alternation(NetworkOp::ALL.into_iter().map(|op| op.label()));
        let pattern = Regex::new(&format!(
            r"Network Adapter\((?P<entity>\w+?)_.*(?P<op>{})",
            ops
        ))?;
        Ok(Self {
            kind: DomainKind::Network,
            args: command_args(program, counters),
            pattern,
        })
    }

    pub fn storage(program: &str, vms: &VirtualMachines) -> anyhow::Result<Self> {
        let counters = vms.keys().flat_map(|vm| {
            StorageOp::ALL.into_iter().map(move |op| {
                format!(r"\Hyper-V Virtual Storage Device(*{}*)\{}/sec", vm, op.label())
            })
        });
        let ops = alternation(StorageOp::ALL.into_iter().map(|op| op.label()));
        let pattern = Regex::new(&format!(
            r"Storage Device.*-(?P<entity>\w+?)(?P<data>Data.*)?\.vhdx.*(?P<op>{})",
            ops
        ))?;
        Ok(Self {
            kind: DomainKind::Storage,
            args: command_args(program, counters),
            pattern,
        })
    }

    /// Run the counter command (bounded by `timeout`) and parse its output.
    #[tracing::instrument(skip(self, runner), fields(domain = self.kind.as_str()))]
    pub async fn collect<R: CommandRunner>(
        &self,
        runner: &R,
        timeout: Duration,
    ) -> Result<Vec<CounterSample>, IngestError> {
        let output = match tokio::time::timeout(timeout, runner.run(&self.args)).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => {
                return Err(IngestError::sample(
                    format!("failed to run {}: {}", self.program(), e),
                    "",
                    "",
                ));
            }
            Err(_) => {
                return Err(IngestError::sample(
                    format!("{} timed out after {:?}", self.program(), timeout),
                    "",
                    "",
                ));
            }
        };
        if !output.success {
            return Err(IngestError::sample(
                format!("{} exited with {:?}", self.program(), output.exit_code),
                &output.stderr,
                &output.stdout,
            ));
        }
        parse_counter_output(&output.stdout, &self.pattern)
    }

    fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
}

/// `<program> -sc 1 <counters...>`: one sample of every counter.
fn command_args(program: &str, counters: impl Iterator<Item = String>) -> Vec<String> {
    let mut args = vec![program.to_string(), "-sc".to_string(), "1".to_string()];
    args.extend(counters);
    args
}

fn alternation(labels: impl Iterator<Item = &'static str>) -> String {
    labels.map(regex::escape).collect::<Vec<_>>().join("|")
}
