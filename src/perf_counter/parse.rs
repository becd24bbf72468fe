// typeperf CSV output -> (counter match, value) pairs.
//
// Shape (blank lines and trailer lines ignored):
//   "(PDH-CSV 4.0)","\Hyper-V Virtual Network Adapter(BspOne_nic)\Bytes Sent/sec",...
//   "10/19/2026 12:00:01.123","100.40",...
//   Exiting, please wait...
//
// The first column of both lines is the timestamp column and is skipped.

use csv::{ReaderBuilder, StringRecord};
use regex::Regex;

use crate::error::IngestError;

/// Capture groups of a counter path that matched a domain pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterMatch {
    /// Owning entity (VM name).
    pub entity: String,
    /// Storage only: the `Data...` label of a data disk, if any.
    pub data_label: Option<String>,
    /// Operation label, e.g. `Bytes Sent`.
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub counter: CounterMatch,
    pub value: u64,
}

/// Parse command stdout. Labels the pattern does not match are dropped; zero matches is `Ok(vec![])`.
pub fn parse_counter_output(stdout: &str, pattern: &Regex) -> Result<Vec<CounterSample>, IngestError> {
    let mut records = read_records(stdout)?.into_iter();

    let labels = records
        .next()
        .ok_or_else(|| IngestError::sample("no header line in counter output", "", stdout))?;
    let values = records
        .next()
        .ok_or_else(|| IngestError::sample("no value line in counter output", "", stdout))?;
    if labels.len() < 2 {
        return Err(IngestError::sample(
            "no counter columns in counter output",
            "",
            stdout,
        ));
    }

    let mut out = Vec::new();
    for (label, raw) in labels.iter().zip(values.iter()).skip(1) {
        let Some(counter) = match_counter(pattern, label) else {
            continue;
        };
        let raw = raw.trim();
        // typeperf prints a blank field when an instance vanished between listing and sampling
        if raw.is_empty() {
            tracing::debug!(counter = %label, "blank counter value, skipped");
            continue;
        }
        let value: f64 = raw.parse().map_err(|_| {
            IngestError::sample(format!("non-numeric value {:?} for {}", raw, label), "", stdout)
        })?;
        out.push(CounterSample {
            counter,
            value: round_rate(value),
        });
    }
    Ok(out)
}

/// CSV records of the quoted lines in `stdout`, all of the same width. Whitespace around the
/// `","` separators is dropped. typeperf quotes every field, so each line must then read back
/// exactly as its record written fully quoted; stray or unterminated quotes are rejected.
fn read_records(stdout: &str) -> Result<Vec<StringRecord>, IngestError> {
    let separator = Regex::new(r#""\s*,\s*""#)
        .map_err(|e| IngestError::sample(format!("separator pattern: {}", e), "", stdout))?;
    let lines: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with('"'))
        .map(|l| separator.replace_all(l, "\",\"").into_owned())
        .collect();

    let records = ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(lines.join("\n").as_bytes())
        .records()
        .collect::<Result<Vec<_>, csv::Error>>()
        .map_err(|e| {
            IngestError::sample(format!("unparsable counter output: {}", e), "", stdout)
        })?;

    let malformed = records.len() != lines.len()
        || records
            .iter()
            .zip(&lines)
            .any(|(record, line)| quoted(record) != *line);
    if malformed {
        return Err(IngestError::sample(
            "malformed quoting in counter output",
            "",
            stdout,
        ));
    }
    Ok(records)
}

fn quoted(record: &StringRecord) -> String {
    record
        .iter()
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

fn match_counter(pattern: &Regex, label: &str) -> Option<CounterMatch> {
    let caps = pattern.captures(label)?;
    Some(CounterMatch {
        entity: caps.name("entity")?.as_str().to_string(),
        data_label: caps.name("data").map(|m| m.as_str().to_string()),
        operation: caps.name("op")?.as_str().to_string(),
    })
}

/// Nearest integer, ties to even; negative and NaN readings clamp to 0.
fn round_rate(value: f64) -> u64 {
    let r = value.round_ties_even();
    if r.is_nan() || r <= 0.0 { 0 } else { r as u64 }
}
