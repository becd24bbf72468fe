// Shared test helpers: an in-memory sink and a scripted counter command runner
#![allow(dead_code)]

use statlog::error::IngestError;
use statlog::models::StatBatch;
use statlog::perf_counter::{CommandOutput, CommandRunner};
use statlog::stat_repo::StatSink;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Keeps every committed batch. With `failing`, every commit fails and nothing is kept.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<StatBatch>>,
    pub failing: AtomicBool,
    pub attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub fn batches(&self) -> Vec<StatBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl StatSink for RecordingSink {
    async fn commit(&self, batch: &StatBatch) -> Result<(), IngestError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(IngestError::SinkCommitFailed(anyhow::anyhow!(
                "database is locked"
            )));
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub enum Script {
    Output(CommandOutput),
    SpawnError,
    Hang,
}

impl Script {
    pub fn ok(stdout: &str) -> Self {
        Script::Output(CommandOutput {
            success: true,
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    pub fn exit(code: i32, stderr: &str) -> Self {
        Script::Output(CommandOutput {
            success: false,
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        })
    }
}

/// Answers network and storage counter invocations with separate scripts.
pub struct ScriptedRunner {
    pub network: Script,
    pub storage: Script,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(network: Script, storage: Script) -> Self {
        Self {
            network,
            storage,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, args: &[String]) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(args.to_vec());
        let script = if args.iter().any(|a| a.contains("Network Adapter")) {
            self.network.clone()
        } else {
            self.storage.clone()
        };
        match script {
            Script::Output(o) => Ok(o),
            Script::SpawnError => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "typeperf not found",
            )),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(CommandOutput::default())
            }
        }
    }
}

pub const NETWORK_OUTPUT: &str = "\r\n\"(PDH-CSV 4.0)\",\"\\\\HOST\\Hyper-V Virtual Network Adapter(BspOne_Network Adapter_abc)\\Bytes Sent/sec\",\"\\\\HOST\\Hyper-V Virtual Network Adapter(BspOne_Network Adapter_def)\\Bytes Sent/sec\",\"\\\\HOST\\Hyper-V Virtual Network Adapter(BspOne_Network Adapter_abc)\\Bytes Received/sec\"\r\n\"10/19/2026 12:00:01.123\",\"100.40\",\"50.00\",\"1200.6\"\r\nExiting, please wait...\r\nThe command completed successfully.\r\n";

pub const STORAGE_OUTPUT: &str = "\r\n\"(PDH-CSV 4.0)\",\"\\\\HOST\\Hyper-V Virtual Storage Device(D:-Hyper-V-BspOne.vhdx)\\Read Bytes/sec\",\"\\\\HOST\\Hyper-V Virtual Storage Device(D:-Hyper-V-BspOne.vhdx)\\Write Bytes/sec\",\"\\\\HOST\\Hyper-V Virtual Storage Device(E:-Hyper-V-BspOneData.vhdx)\\Write Bytes/sec\"\r\n\"10/19/2026 12:00:01.456\",\"4096\",\"0\",\"8192.2\"\r\nExiting, please wait...\r\n";
