// SPDX-License-Identifier: AGPL-3.0

//! Replay of recorded execution events
//!
//! One JSON object per line:
//!
//! ```text
//! {"event":"step","pc":12,"code_hash":"0x..","address":"0x..","code":"0x6080.."}
//! {"event":"commit","to":"0x..","data":"0xa9059cbb..","gas_used":51234}
//! ```
//!
//! `code_hash` may be omitted, in which case it is the keccak of `code`.
//! A constructor frame should record the zero hash.

use alloy_primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::Deserialize;
use solcov_hashes::code_hash;
use solcov_rig::{InstructionEvent, TestRig};
use std::collections::HashMap;
use std::io::BufRead;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ReplayEvent {
    Step {
        pc: usize,
        #[serde(default)]
        code_hash: Option<String>,
        address: String,
        code: String,
    },
    Commit {
        to: String,
        #[serde(default)]
        data: String,
        gas_used: u64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub commits: usize,
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).with_context(|| format!("invalid hex {:?}", s))
}

/// Feed every event of `reader` into `rig`, stopping at the first error.
pub fn replay<R: BufRead>(rig: &mut TestRig, reader: R) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    let mut code_cache: HashMap<String, (Vec<u8>, B256)> = HashMap::new();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed event", line_number))?;

        match event {
            ReplayEvent::Step {
                pc,
                code_hash: recorded_hash,
                address,
                code,
            } => {
                if !code_cache.contains_key(&code) {
                    let bytes = decode_hex(&code)
                        .with_context(|| format!("line {}: code", line_number))?;
                    let hash = code_hash(&bytes);
                    code_cache.insert(code.clone(), (bytes, hash));
                }
                let Some((bytes, computed_hash)) = code_cache.get(&code) else {
                    continue;
                };
                let hash = match recorded_hash {
                    Some(h) => h
                        .parse::<B256>()
                        .with_context(|| format!("line {}: code_hash", line_number))?,
                    None => *computed_hash,
                };
                let address = address
                    .parse::<Address>()
                    .with_context(|| format!("line {}: address", line_number))?;

                rig.on_instruction(&InstructionEvent {
                    pc,
                    opcode: bytes.get(pc).copied().unwrap_or(0),
                    code_hash: hash,
                    address,
                    code: bytes,
                })
                .with_context(|| format!("line {}: step at pc {}", line_number, pc))?;
                summary.steps += 1;
            }
            ReplayEvent::Commit { to, data, gas_used } => {
                let to = to
                    .parse::<Address>()
                    .with_context(|| format!("line {}: to", line_number))?;
                let data = decode_hex(&data)
                    .with_context(|| format!("line {}: data", line_number))?;
                rig.on_transaction_committed(&to, &data, gas_used);
                summary.commits += 1;
            }
        }
    }

    debug!(steps = summary.steps, commits = summary.commits, "replay finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solcov_build::CombinedOutput;
    use solcov_exceptions::CoverageError;
    use solcov_hashes::function_selector;

    const SOURCE: &str = "contract C {\n    function f() public { x = 1; }\n}\n";

    fn rig() -> TestRig {
        let output = CombinedOutput::from_json_str(
            r#"{
                "contracts": {
                    "c.sol:C": {
                        "bin": "",
                        "bin-runtime": "5b600100",
                        "srcmap": "",
                        "srcmap-runtime": "17:30:0;39:5:0;-1:-1:-1"
                    }
                },
                "sourceList": ["c.sol"],
                "sources": { "c.sol": { "AST": {
                    "name": "SourceUnit", "src": "0:50:0",
                    "children": [{
                        "name": "FunctionDefinition", "src": "17:30:0",
                        "attributes": { "isConstructor": false, "name": "f" },
                        "children": [{ "name": "ParameterList", "src": "27:2:0" }]
                    }]
                } } }
            }"#,
        )
        .unwrap();
        let mut rig = TestRig::new();
        rig.add_coverage_from_output(&output, &[("c.sol".to_string(), SOURCE.to_string())])
            .unwrap();
        rig
    }

    #[test]
    fn test_replay_steps_and_commits() {
        let mut rig = rig();
        let address = "0x00000000000000000000000000000000000000aa";
        let data = hex::encode(function_selector("f()"));
        let events = format!(
            "{{\"event\":\"step\",\"pc\":0,\"address\":\"{address}\",\"code\":\"0x5b600100\"}}\n\
             \n\
             {{\"event\":\"step\",\"pc\":1,\"address\":\"{address}\",\"code\":\"5b600100\"}}\n\
             {{\"event\":\"commit\",\"to\":\"{address}\",\"data\":\"0x{data}\",\"gas_used\":21500}}\n"
        );

        let summary = replay(&mut rig, events.as_bytes()).unwrap();
        assert_eq!(summary, ReplaySummary { steps: 2, commits: 1 });

        let contract = rig.contract("c.sol:C").unwrap();
        assert_eq!(contract.percentage_covered(), 100.0);
        let f = contract.function(&function_selector("f()")).unwrap();
        assert_eq!(f.gas_used, vec![21_500]);
    }

    #[test]
    fn test_replay_reports_line_of_bad_event() {
        let mut rig = rig();
        let err = replay(&mut rig, "{\"event\":\"jump\"}\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_replay_index_mismatch() {
        let mut rig = rig();
        let events = "{\"event\":\"step\",\"pc\":2,\"address\":\"0x00000000000000000000000000000000000000aa\",\"code\":\"5b600100\"}\n";
        let err = replay(&mut rig, events.as_bytes()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoverageError>(),
            Some(CoverageError::IndexMismatch { pc: 2, .. })
        ));
    }
}
