// SPDX-License-Identifier: AGPL-3.0

//! Execution step trace
//!
//! A trace is the ordered list of source ranges touched while running
//! transactions, with consecutive duplicates collapsed. It serialises to
//!
//! ```json
//! {"contracts":[{"name":"t.sol:T","source":"..."}],"steps":[[0,10,25]]}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::Write;

/// Contract whose source appears in the trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedContract {
    pub name: String,
    pub source: String,
}

impl TracedContract {
    /// 1-based line number of `from` and the full lines spanning `from..to`
    pub fn lines(&self, from: usize, to: usize) -> (usize, &str) {
        let bytes = self.source.as_bytes();
        let from = from.min(bytes.len());
        let to = to.clamp(from, bytes.len());

        let line_start = bytes[..from]
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        let line_end = bytes[to..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(bytes.len(), |i| to + i);
        let line_number = bytes[..line_start].iter().filter(|b| **b == b'\n').count() + 1;

        (line_number, &self.source[line_start..line_end])
    }
}

/// One executed source range, serialised as `[contract, from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize, usize)", into = "(usize, usize, usize)")]
pub struct Step {
    pub contract_index: usize,
    pub from: usize,
    pub to: usize,
}

impl From<(usize, usize, usize)> for Step {
    fn from((contract_index, from, to): (usize, usize, usize)) -> Self {
        Self {
            contract_index,
            from,
            to,
        }
    }
}

impl From<Step> for (usize, usize, usize) {
    fn from(step: Step) -> Self {
        (step.contract_index, step.from, step.to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(
        serialize_with = "serialize_contracts",
        deserialize_with = "deserialize_contracts"
    )]
    contracts: IndexMap<String, TracedContract>,
    steps: Vec<Step>,
}

fn serialize_contracts<S>(
    contracts: &IndexMap<String, TracedContract>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(contracts.values())
}

fn deserialize_contracts<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, TracedContract>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Vec::<TracedContract>::deserialize(deserializer)?;
    Ok(list.into_iter().map(|c| (c.name.clone(), c)).collect())
}

impl Trace {
    pub fn contracts(&self) -> impl Iterator<Item = &TracedContract> {
        self.contracts.values()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `"<name>:<line>\n<lines>\n"` for the most recent step, `"N/A"` if none
    pub fn last_step(&self) -> String {
        let Some(step) = self.steps.last() else {
            return "N/A".to_string();
        };
        let Some((_, contract)) = self.contracts.get_index(step.contract_index) else {
            return "N/A".to_string();
        };
        let (line, source) = contract.lines(step.from, step.to);
        format!("{}:{}\n{}\n", contract.name, line, source)
    }

    pub fn save<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer(writer, self)
    }
}

/// Accumulates steps into a [`Trace`]
#[derive(Debug, Default)]
pub struct Tracer {
    trace: Trace,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source[start..end]` of contract `name` executed.
    /// The source text is copied only the first time a contract is seen.
    pub fn executed(&mut self, name: &str, source: &str, start: usize, end: usize) {
        let contract_index = match self.trace.contracts.get_index_of(name) {
            Some(i) => i,
            None => {
                self.trace.contracts.insert(
                    name.to_string(),
                    TracedContract {
                        name: name.to_string(),
                        source: source.to_string(),
                    },
                );
                self.trace.contracts.len() - 1
            }
        };

        let step = Step {
            contract_index,
            from: start,
            to: end,
        };
        if self.trace.steps.last() == Some(&step) {
            return;
        }
        self.trace.steps.push(step);
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn reset(&mut self) {
        self.trace = Trace::default();
    }
}
