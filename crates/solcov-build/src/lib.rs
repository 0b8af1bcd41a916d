// SPDX-License-Identifier: AGPL-3.0

//! Compiler combined-output loading
//!
//! Reads the `solc --combined-json bin,bin-runtime,srcmap,srcmap-runtime,ast`
//! document and resolves source files to their `sourceList` index.

pub mod ast;

pub use ast::{canonical_type, AstAttributes, AstNode, NodeKind};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_logs::{warn_code, ErrorCode};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Unlinked library reference, `__` + 36 characters + `__`
static LIBRARY_PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"__.{36}__").ok());

const ZERO_ADDRESS_HEX: &str = "0000000000000000000000000000000000000000";

/// Top-level combined-output document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombinedOutput {
    #[serde(default)]
    pub contracts: HashMap<String, CompiledContract>,
    #[serde(rename = "sourceList", default)]
    pub source_list: Vec<String>,
    #[serde(default)]
    pub sources: HashMap<String, SourceArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Per-contract bytecode and source maps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompiledContract {
    /// Constructor (creation) bytecode
    #[serde(default)]
    pub bin: String,
    #[serde(rename = "bin-runtime", alias = "binRuntime", default)]
    pub bin_runtime: String,
    #[serde(default)]
    pub srcmap: String,
    #[serde(rename = "srcmap-runtime", alias = "srcmapRuntime", default)]
    pub srcmap_runtime: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceArtifact {
    #[serde(rename = "AST")]
    pub ast: AstNode,
}

impl CompiledContract {
    pub fn runtime_code(&self, contract: &str) -> CoverageResult<Vec<u8>> {
        decode_bytecode(contract, &self.bin_runtime)
    }

    pub fn constructor_code(&self, contract: &str) -> CoverageResult<Vec<u8>> {
        decode_bytecode(contract, &self.bin)
    }

    pub fn has_runtime_code(&self) -> bool {
        !strip_hex_prefix(self.bin_runtime.trim()).is_empty()
    }
}

impl CombinedOutput {
    pub fn from_json_str(json: &str) -> CoverageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> CoverageResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let output = Self::from_json_str(&json)?;
        debug!(
            path = %path.display(),
            contracts = output.contracts.len(),
            sources = output.source_list.len(),
            "loaded combined output"
        );
        Ok(output)
    }

    /// Index of `name` in `sourceList`, exact match only
    pub fn find_source_index(&self, name: &str) -> Option<usize> {
        self.source_list.iter().position(|n| n == name)
    }

    /// Resolve a source path as given on the command line to its
    /// `sourceList` entry: exact match, then path-suffix, then basename.
    pub fn resolve_source(&self, path: &str) -> Option<(usize, &str)> {
        if let Some(i) = self.find_source_index(path) {
            return Some((i, self.source_list[i].as_str()));
        }

        let suffix_match = self.source_list.iter().position(|entry| {
            path.ends_with(&format!("/{}", entry)) || entry.ends_with(&format!("/{}", path))
        });
        if let Some(i) = suffix_match {
            return Some((i, self.source_list[i].as_str()));
        }

        let base = basename(path);
        self.source_list
            .iter()
            .position(|entry| basename(entry) == base)
            .map(|i| (i, self.source_list[i].as_str()))
    }

    pub fn ast(&self, source_name: &str) -> Option<&AstNode> {
        self.sources.get(source_name).map(|s| &s.ast)
    }

    /// Contracts declared in `source_name`, ordered by key
    pub fn contracts_in(&self, source_name: &str) -> Vec<(&String, &CompiledContract)> {
        let mut contracts: Vec<_> = self
            .contracts
            .iter()
            .filter(|(key, _)| split_contract_key(key).0 == source_name)
            .collect();
        contracts.sort_by(|a, b| a.0.cmp(b.0));
        contracts
    }
}

/// `"dir/file.sol:Name"` -> `("dir/file.sol", "Name")`
pub fn split_contract_key(key: &str) -> (&str, &str) {
    key.rsplit_once(':').unwrap_or(("", key))
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Hex-decode compiler bytecode. Unlinked library placeholders are replaced
/// by the zero address first.
pub fn decode_bytecode(contract: &str, hexcode: &str) -> CoverageResult<Vec<u8>> {
    let code = strip_hex_prefix(hexcode.trim());
    if code.is_empty() {
        return Ok(Vec::new());
    }

    let patched = match LIBRARY_PLACEHOLDER.as_ref() {
        Some(re) if re.is_match(code) => {
            warn_code(
                ErrorCode::LibraryPlaceholder,
                &format!(
                    "{} contains unlinked library references, patched with the zero address",
                    contract
                ),
                false,
            );
            re.replace_all(code, ZERO_ADDRESS_HEX).into_owned()
        }
        _ => code.to_string(),
    };

    hex::decode(&patched).map_err(|source| CoverageError::Hex {
        contract: contract.to_string(),
        source,
    })
}
