// SPDX-License-Identifier: AGPL-3.0

//! Test rig: contract registry, execution hooks and coverage reports

pub mod backend;

pub use backend::{is_successful, InterceptingBackend, Receipt, TestBackend, Transaction};
pub use solcov_contract::InstructionEvent;

use alloy_primitives::{Address, B256};
use comfy_table::{presets::ASCII_MARKDOWN, *};
use solcov_build::CombinedOutput;
use solcov_contract::Contract;
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_traces::{Trace, Tracer};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Receives every instruction the execution engine runs.
///
/// Backends must propagate the returned error: an instruction that cannot be
/// mapped back to its bytecode means the coverage data can no longer be
/// trusted.
pub trait InstructionHook {
    fn on_instruction(&mut self, event: &InstructionEvent<'_>) -> CoverageResult<()>;
}

/// Registry of instrumented contracts, keyed and iterated by `file:Name`
#[derive(Debug, Default)]
pub struct TestRig {
    contracts: BTreeMap<String, Contract>,
    tracer: Tracer,
}

impl TestRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every contract declared in `sources`, reading the compiler
    /// combined output from `combined_json`.
    pub fn add_coverage_for_contracts<P: AsRef<Path>>(
        &mut self,
        combined_json: impl AsRef<Path>,
        sources: &[P],
    ) -> CoverageResult<&mut Self> {
        let output = CombinedOutput::from_file(combined_json.as_ref())?;
        let mut loaded = Vec::with_capacity(sources.len());
        for path in sources {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)?;
            loaded.push((path.to_string_lossy().into_owned(), text));
        }
        self.add_coverage_from_output(&output, &loaded)
    }

    /// Same as [`TestRig::add_coverage_for_contracts`] with everything in
    /// memory. `sources` holds `(path, source text)` pairs.
    pub fn add_coverage_from_output(
        &mut self,
        output: &CombinedOutput,
        sources: &[(String, String)],
    ) -> CoverageResult<&mut Self> {
        for (path, text) in sources {
            let (source_index, source_name) = output
                .resolve_source(path)
                .ok_or_else(|| CoverageError::MissingSource(path.clone()))?;
            let ast = output
                .ast(source_name)
                .ok_or_else(|| CoverageError::MissingSource(source_name.to_string()))?;

            for (key, compiled) in output.contracts_in(source_name) {
                if !compiled.has_runtime_code() {
                    continue;
                }
                let contract = Contract::build(key, text.as_str(), source_index, ast, compiled)?;
                info!(
                    contract = %key,
                    source_index,
                    functions = contract.functions().len(),
                    "registered contract"
                );
                self.register(contract);
            }
        }
        Ok(self)
    }

    pub fn register(&mut self, contract: Contract) -> &mut Self {
        self.contracts.insert(contract.name().to_string(), contract);
        self
    }

    /// Registered names, sorted
    pub fn contract_names(&self) -> Vec<&str> {
        self.contracts.keys().map(String::as_str).collect()
    }

    /// Look up a contract by its full `file:Name` key, or by the bare contract
    /// name when that is unambiguous.
    pub fn contract(&self, name: &str) -> CoverageResult<&Contract> {
        if let Some(contract) = self.contracts.get(name) {
            return Ok(contract);
        }
        let suffix = format!(":{}", name);
        let mut candidates = self
            .contracts
            .iter()
            .filter(|(key, _)| key.ends_with(&suffix));
        match (candidates.next(), candidates.next()) {
            (Some((_, contract)), None) => Ok(contract),
            _ => Err(CoverageError::unknown_contract(name, self.contracts.keys())),
        }
    }

    pub fn contract_by_code_hash(&self, code_hash: &B256) -> Option<&Contract> {
        self.contracts
            .values()
            .find(|c| !c.runtime().binary().is_empty() && c.code_hash() == *code_hash)
    }

    /// Forward an executed instruction to every registered contract, in name
    /// order
    pub fn on_instruction(&mut self, event: &InstructionEvent<'_>) -> CoverageResult<()> {
        for contract in self.contracts.values_mut() {
            contract.on_instruction(event, &mut self.tracer)?;
        }
        Ok(())
    }

    /// Forward a committed transaction to every registered contract
    pub fn on_transaction_committed(&mut self, to: &Address, data: &[u8], gas_used: u64) {
        for contract in self.contracts.values_mut() {
            contract.on_transaction_committed(to, data, gas_used);
        }
    }

    pub fn coverage_of(&self, name: &str) -> CoverageResult<f64> {
        Ok(self.contract(name)?.percentage_covered())
    }

    /// Fail with `InsufficientCoverage` when `name` is below `expected`
    /// percent, printing the annotated source to stdout first.
    pub fn expect_minimum_coverage(&self, name: &str, expected: f64) -> CoverageResult<()> {
        self.report_minimum_coverage(&mut std::io::stdout(), name, expected)
    }

    pub fn report_minimum_coverage<W: Write>(
        &self,
        writer: &mut W,
        name: &str,
        expected: f64,
    ) -> CoverageResult<()> {
        let contract = self.contract(name)?;
        let actual = contract.percentage_covered();

        if actual < expected {
            writeln!(writer)?;
            writeln!(writer, "Coverage for {:?}:", name)?;
            contract.render(writer)?;
            writeln!(writer)?;
            return Err(CoverageError::InsufficientCoverage {
                name: name.to_string(),
                actual,
                expected,
            });
        }

        writeln!(writer, "\nCoverage for {:?}: {:.2}%", name, actual)?;
        Ok(())
    }

    /// Write the colored source of `name`
    pub fn print_coverage<W: Write>(&self, writer: &mut W, name: &str) -> CoverageResult<()> {
        let contract = self.contract(name)?;
        writeln!(writer, "Coverage for {:?}: {:.2}%", name, contract.percentage_covered())?;
        contract.render(writer)?;
        writeln!(writer)?;
        Ok(())
    }

    /// One table per contract that saw at least one committed call
    pub fn gas_tables(&self) -> Vec<(&str, Table)> {
        self.contracts
            .iter()
            .map(|(name, contract)| (name.as_str(), contract))
            .filter(|(_, contract)| contract.has_any_gas_information())
            .map(|(name, contract)| {
                let mut table = Table::new();
                table.load_preset(ASCII_MARKDOWN);
                table.set_header([
                    Cell::new("Function Name").add_attribute(Attribute::Bold).fg(Color::Magenta),
                    Cell::new("Min").add_attribute(Attribute::Bold).fg(Color::Green),
                    Cell::new("Med").add_attribute(Attribute::Bold).fg(Color::Yellow),
                    Cell::new("Max").add_attribute(Attribute::Bold).fg(Color::Red),
                ]);
                for function in contract.functions() {
                    let summary = function.summary();
                    table.add_row([
                        Cell::new(&function.signature).add_attribute(Attribute::Bold),
                        Cell::new(summary.min.to_string()).fg(Color::Green),
                        Cell::new(summary.median.to_string()).fg(Color::Yellow),
                        Cell::new(summary.max.to_string()).fg(Color::Red),
                    ]);
                }
                (name, table)
            })
            .collect()
    }

    pub fn print_gas_usage<W: Write>(&self, writer: &mut W) -> CoverageResult<()> {
        for (name, table) in self.gas_tables() {
            writeln!(writer, "Gas Usage for {:?}", name)?;
            writeln!(writer, "{table}")?;
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn trace(&self) -> &Trace {
        self.tracer.trace()
    }

    pub fn save_trace<W: Write>(&self, writer: W) -> CoverageResult<()> {
        Ok(self.tracer.trace().save(writer)?)
    }

    /// Source lines of the most recently executed statement
    pub fn last_executed(&self) -> String {
        self.tracer.trace().last_step()
    }

    pub fn reset_trace(&mut self) {
        self.tracer.reset();
    }
}

impl InstructionHook for TestRig {
    fn on_instruction(&mut self, event: &InstructionEvent<'_>) -> CoverageResult<()> {
        TestRig::on_instruction(self, event)
    }
}
