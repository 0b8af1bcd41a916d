// SPDX-License-Identifier: AGPL-3.0

//! Contract coverage model
//!
//! A [`Contract`] ties one compiled contract to its source file. It is built
//! once from the combined output, then mutated by per-instruction and
//! per-transaction callbacks.

pub mod coverage;
pub mod opcodes;

pub use coverage::{CoverageState, SourceCoverage};

use alloy_primitives::{Address, B256};
use solcov_build::{AstNode, CompiledContract};
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_hashes::{code_hash, function_selector, hex_selector, selector_of, Selector};
use solcov_srcmap::{decode, SourceMap, SourceMapEntry};
use solcov_stats::GasSummary;
use solcov_traces::Tracer;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::ops::Range;
use tracing::{debug, trace};

/// One executed instruction as seen by the execution engine
#[derive(Debug, Clone, Copy)]
pub struct InstructionEvent<'a> {
    pub pc: usize,
    pub opcode: u8,
    /// Hash of the code being executed, zero while a constructor runs
    pub code_hash: B256,
    pub address: Address,
    pub code: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeKind {
    /// Deployed code, recognised by its keccak hash
    Runtime,
    /// Creation code, recognised by prefix since constructor arguments are appended
    Constructor,
}

/// Bytecode together with its decoded source map and instruction index
#[derive(Debug, Clone)]
pub struct BytecodeMapping {
    kind: BytecodeKind,
    binary: Vec<u8>,
    code_hash: B256,
    source_map: SourceMap,
    pc_to_index: HashMap<usize, usize>,
    skip: Vec<bool>,
}

impl BytecodeMapping {
    fn build(
        kind: BytecodeKind,
        binary: Vec<u8>,
        compressed_map: &str,
        source_index: usize,
        ast: &AstNode,
        coverage: &mut SourceCoverage,
    ) -> CoverageResult<Self> {
        let source_map = decode(compressed_map)?;
        let pc_to_index = opcodes::pc_to_instruction_index(&binary);
        let mut skip = vec![false; source_map.len()];

        for (i, entry) in source_map.iter().enumerate() {
            let Some(range) = own_range(entry, source_index) else {
                continue;
            };
            coverage.check_bounds(&range)?;
            if let Some(node) = ast.find_by_range_prefix(&entry.range_prefix()) {
                if node.kind().is_scaffolding() {
                    trace!(instruction = i, node = %node.name, "skipping scaffolding");
                    skip[i] = true;
                    continue;
                }
            }
            coverage.paint_reachable(range)?;
        }

        debug!(
            contract = coverage.name(),
            ?kind,
            entries = source_map.len(),
            instructions = pc_to_index.len(),
            "mapped bytecode"
        );

        let code_hash = match kind {
            BytecodeKind::Runtime => code_hash(&binary),
            BytecodeKind::Constructor => B256::ZERO,
        };

        Ok(Self {
            kind,
            binary,
            code_hash,
            source_map,
            pc_to_index,
            skip,
        })
    }

    pub fn kind(&self) -> BytecodeKind {
        self.kind
    }

    pub fn binary(&self) -> &[u8] {
        &self.binary
    }

    pub fn code_hash(&self) -> B256 {
        self.code_hash
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    pub fn is_skipped(&self, instruction: usize) -> bool {
        self.skip.get(instruction).copied().unwrap_or(false)
    }

    /// Whether the executing code is this bytecode. Empty bytecode never matches.
    pub fn matches(&self, code_hash: &B256, code: &[u8]) -> bool {
        if self.binary.is_empty() {
            return false;
        }
        match self.kind {
            BytecodeKind::Runtime => *code_hash == self.code_hash,
            BytecodeKind::Constructor => code.starts_with(&self.binary),
        }
    }

    /// Source map entry for the instruction at `pc`, `None` when the
    /// instruction is scaffolding.
    fn entry_at(&self, contract: &str, pc: usize) -> CoverageResult<Option<&SourceMapEntry>> {
        let mismatch = || CoverageError::IndexMismatch {
            contract: contract.to_string(),
            pc,
            code_hash: self.code_hash.to_string(),
        };
        let index = *self.pc_to_index.get(&pc).ok_or_else(mismatch)?;
        if self.is_skipped(index) {
            return Ok(None);
        }
        self.source_map.get(index).map(Some).ok_or_else(mismatch)
    }
}

fn own_range(entry: &SourceMapEntry, source_index: usize) -> Option<Range<usize>> {
    if entry.belongs_to(source_index) {
        entry.range()
    } else {
        None
    }
}

/// ABI function of a contract with the gas used by each committed call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub signature: String,
    pub selector: Selector,
    pub gas_used: Vec<u64>,
}

impl Function {
    pub fn summary(&self) -> GasSummary {
        GasSummary::from_samples(&self.gas_used)
    }
}

#[derive(Debug, Clone)]
pub struct Contract {
    name: String,
    source_index: usize,
    coverage: SourceCoverage,
    runtime: BytecodeMapping,
    constructor: BytecodeMapping,
    functions: HashMap<Selector, Function>,
    observed_addresses: HashSet<Address>,
}

impl Contract {
    /// Build the model for `name` from its compiled output and the source
    /// text on disk. Fails with `StaleArtifact` when the source map points
    /// outside `source`.
    pub fn build(
        name: &str,
        source: impl Into<String>,
        source_index: usize,
        ast: &AstNode,
        compiled: &CompiledContract,
    ) -> CoverageResult<Self> {
        let mut coverage = SourceCoverage::new(name, source);

        let runtime = BytecodeMapping::build(
            BytecodeKind::Runtime,
            compiled.runtime_code(name)?,
            &compiled.srcmap_runtime,
            source_index,
            ast,
            &mut coverage,
        )?;
        let constructor = BytecodeMapping::build(
            BytecodeKind::Constructor,
            compiled.constructor_code(name)?,
            &compiled.srcmap,
            source_index,
            ast,
            &mut coverage,
        )?;

        let functions = ast
            .function_definitions()
            .into_iter()
            .filter_map(|node| node.canonical_signature())
            .map(|signature| {
                let selector = function_selector(&signature);
                trace!(%signature, selector = %hex_selector(&selector), "registered function");
                (
                    selector,
                    Function {
                        signature,
                        selector,
                        gas_used: Vec::new(),
                    },
                )
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            source_index,
            coverage,
            runtime,
            constructor,
            functions,
            observed_addresses: HashSet::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn coverage(&self) -> &SourceCoverage {
        &self.coverage
    }

    pub fn runtime(&self) -> &BytecodeMapping {
        &self.runtime
    }

    pub fn constructor(&self) -> &BytecodeMapping {
        &self.constructor
    }

    pub fn code_hash(&self) -> B256 {
        self.runtime.code_hash()
    }

    pub fn observed_addresses(&self) -> &HashSet<Address> {
        &self.observed_addresses
    }

    pub fn function(&self, selector: &Selector) -> Option<&Function> {
        self.functions.get(selector)
    }

    /// Functions ordered by signature
    pub fn functions(&self) -> Vec<&Function> {
        let mut functions: Vec<&Function> = self.functions.values().collect();
        functions.sort_by(|a, b| a.signature.cmp(&b.signature));
        functions
    }

    pub fn has_any_gas_information(&self) -> bool {
        self.functions.values().any(|f| !f.gas_used.is_empty())
    }

    pub fn percentage_covered(&self) -> f64 {
        self.coverage.percentage_covered()
    }

    pub fn render<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.coverage.render(writer)
    }

    /// Handle one executed instruction. Returns whether the executing code
    /// belongs to this contract.
    pub fn on_instruction(
        &mut self,
        event: &InstructionEvent<'_>,
        tracer: &mut Tracer,
    ) -> CoverageResult<bool> {
        let mut matched = false;

        for mapping in [&self.runtime, &self.constructor] {
            if !mapping.matches(&event.code_hash, event.code) {
                continue;
            }
            matched = true;
            self.observed_addresses.insert(event.address);

            let Some(entry) = mapping.entry_at(&self.name, event.pc)? else {
                continue;
            };
            if let Some(range) = own_range(entry, self.source_index) {
                trace!(pc = event.pc, opcode = event.opcode, ?range, "executed");
                self.coverage.paint_executed(range.clone());
                tracer.executed(&self.name, self.coverage.source(), range.start, range.end);
            }
        }

        Ok(matched)
    }

    /// Attribute the gas of a committed call to `to`. Returns whether a
    /// function of this contract was charged.
    pub fn on_transaction_committed(&mut self, to: &Address, data: &[u8], gas_used: u64) -> bool {
        if !self.observed_addresses.contains(to) {
            return false;
        }
        let Some(selector) = selector_of(data) else {
            return false;
        };
        match self.functions.get_mut(&selector) {
            Some(function) => {
                function.gas_used.push(gas_used);
                true
            }
            None => {
                debug!(
                    contract = %self.name,
                    selector = %hex_selector(&selector),
                    "transaction to unknown selector"
                );
                false
            }
        }
    }
}
