// SPDX-License-Identifier: AGPL-3.0

//! Command line and `solcov.toml` configuration

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "solcov.toml";

#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[clap(
    name = "solcov",
    version,
    about = "Source coverage and gas statistics for EVM contract tests",
    disable_version_flag = true
)]
pub struct Config {
    /// Project root directory
    #[clap(long, default_value = ".")]
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Path to the config file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Compiler output produced with `solc --combined-json bin,bin-runtime,srcmap,srcmap-runtime,ast`
    #[clap(long, default_value = "build/combined.json")]
    #[serde(default = "default_combined_json")]
    pub combined_json: PathBuf,

    /// Source files to instrument
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Recorded execution events (JSON Lines) to replay
    #[clap(long)]
    #[serde(default)]
    pub replay: Option<PathBuf>,

    /// Fail when any contract is below this percentage
    #[clap(long, default_value = "0")]
    #[serde(default)]
    pub min_coverage: f64,

    /// Only report the given contract
    #[clap(long, default_value = "")]
    #[serde(default)]
    pub contract: String,

    /// Write the step trace as JSON to this file
    #[clap(long)]
    #[serde(default)]
    pub trace_output: Option<PathBuf>,

    /// Print per-function gas usage
    #[clap(long)]
    #[serde(default)]
    pub gas_report: bool,

    /// Print the source with executed and missed statements highlighted
    #[clap(long)]
    #[serde(default)]
    pub print_source: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,

    /// Print version and exit
    #[clap(long)]
    #[serde(default)]
    pub version: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_combined_json() -> PathBuf {
    PathBuf::from("build/combined.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            config: None,
            combined_json: default_combined_json(),
            sources: Vec::new(),
            replay: None,
            min_coverage: 0.0,
            contract: String::new(),
            trace_output: None,
            gas_report: false,
            print_source: false,
            verbose: 0,
            version: false,
        }
    }
}

impl Config {
    /// Load configuration from the `[global]` table of a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let parsed: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        parsed.to_config()
    }

    /// Merge with another configuration (command line overrides file config)
    pub fn merge(&mut self, other: Self) {
        if other.root != default_root() {
            self.root = other.root;
        }
        if other.config.is_some() {
            self.config = other.config;
        }
        if other.combined_json != default_combined_json() {
            self.combined_json = other.combined_json;
        }
        if !other.sources.is_empty() {
            self.sources = other.sources;
        }
        if other.replay.is_some() {
            self.replay = other.replay;
        }
        if other.min_coverage != 0.0 {
            self.min_coverage = other.min_coverage;
        }
        if !other.contract.is_empty() {
            self.contract = other.contract;
        }
        if other.trace_output.is_some() {
            self.trace_output = other.trace_output;
        }
        if other.gas_report {
            self.gas_report = true;
        }
        if other.print_source {
            self.print_source = true;
        }
        if other.verbose > 0 {
            self.verbose = other.verbose;
        }
        if other.version {
            self.version = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.min_coverage) {
            bail!(
                "--min-coverage must be between 0 and 100, got {}",
                self.min_coverage
            );
        }
        Ok(())
    }

    /// Explicit `--config`, else `<root>/solcov.toml` when it exists
    pub fn resolve_config_path(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            Some(config.clone())
        } else {
            let default_path = self.root.join(CONFIG_FILE_NAME);
            if default_path.exists() {
                Some(default_path)
            } else {
                None
            }
        }
    }

    pub fn combined_json_path(&self) -> PathBuf {
        self.rooted(&self.combined_json)
    }

    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|p| self.rooted(p)).collect()
    }

    fn rooted(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    global: HashMap<String, toml::Value>,
}

impl TomlConfig {
    fn to_config(self) -> Result<Config> {
        let mut config = Config::default();

        for (key, value) in self.global {
            let key = key.replace('-', "_");

            match key.as_str() {
                "root" => config.root = parse_toml_path(&value)?,
                "combined_json" => config.combined_json = parse_toml_path(&value)?,
                "sources" => config.sources = parse_toml_paths(&value)?,
                "replay" => config.replay = Some(parse_toml_path(&value)?),
                "min_coverage" => config.min_coverage = parse_toml_f64(&value)?,
                "contract" => config.contract = parse_toml_string(&value)?,
                "trace_output" => config.trace_output = Some(parse_toml_path(&value)?),
                "gas_report" => config.gas_report = parse_toml_bool(&value)?,
                "print_source" => config.print_source = parse_toml_bool(&value)?,
                "verbose" => config.verbose = parse_toml_u8(&value)?,
                _ => {}
            }
        }

        Ok(config)
    }
}

fn parse_toml_string(value: &toml::Value) -> Result<String> {
    value
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Expected string, got {:?}", value))
}

fn parse_toml_bool(value: &toml::Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| anyhow::anyhow!("Expected bool, got {:?}", value))
}

fn parse_toml_u8(value: &toml::Value) -> Result<u8> {
    value
        .as_integer()
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| anyhow::anyhow!("Expected u8, got {:?}", value))
}

/// Integers are accepted as well, `min-coverage = 80`
fn parse_toml_f64(value: &toml::Value) -> Result<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
        .ok_or_else(|| anyhow::anyhow!("Expected number, got {:?}", value))
}

fn parse_toml_path(value: &toml::Value) -> Result<PathBuf> {
    Ok(PathBuf::from(parse_toml_string(value)?))
}

fn parse_toml_paths(value: &toml::Value) -> Result<Vec<PathBuf>> {
    value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Expected array, got {:?}", value))?
        .iter()
        .map(parse_toml_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        toml::from_str::<TomlConfig>(toml_text)?.to_config()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.combined_json, PathBuf::from("build/combined.json"));
        assert_eq!(config.min_coverage, 0.0);
        assert!(config.sources.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_command_line() {
        let config = Config::parse_from([
            "solcov",
            "--combined-json",
            "out/combined.json",
            "--min-coverage",
            "87.5",
            "--gas-report",
            "-vv",
            "contracts/a.sol",
            "contracts/b.sol",
        ]);
        assert_eq!(config.combined_json, PathBuf::from("out/combined.json"));
        assert_eq!(config.min_coverage, 87.5);
        assert!(config.gas_report);
        assert_eq!(config.verbose, 2);
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_toml_kebab_and_snake_keys() {
        let config = parse(
            r#"
            [global]
            combined-json = "artifacts/combined.json"
            min_coverage = 90
            sources = ["a.sol"]
            print-source = true
            unknown-key = "ignored"
            "#,
        )
        .unwrap();
        assert_eq!(config.combined_json, PathBuf::from("artifacts/combined.json"));
        assert_eq!(config.min_coverage, 90.0);
        assert_eq!(config.sources, vec![PathBuf::from("a.sol")]);
        assert!(config.print_source);
    }

    #[test]
    fn test_toml_type_error() {
        assert!(parse("[global]\ngas-report = \"yes\"").is_err());
    }

    #[test]
    fn test_merge_command_line_wins() {
        let mut file = parse(
            r#"
            [global]
            min-coverage = 50.0
            contract = "a.sol:A"
            gas-report = true
            "#,
        )
        .unwrap();
        let cli = Config::parse_from(["solcov", "--min-coverage", "75", "b.sol"]);
        file.merge(cli);

        assert_eq!(file.min_coverage, 75.0);
        assert_eq!(file.contract, "a.sol:A");
        assert!(file.gas_report);
        assert_eq!(file.sources, vec![PathBuf::from("b.sol")]);
    }

    #[test]
    fn test_validate_min_coverage() {
        let mut config = Config::default();
        config.min_coverage = 100.5;
        assert!(config.validate().is_err());
        config.min_coverage = -1.0;
        assert!(config.validate().is_err());
        config.min_coverage = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_paths_are_rooted() {
        let config = Config {
            root: PathBuf::from("/project"),
            sources: vec![PathBuf::from("a.sol"), PathBuf::from("/abs/b.sol")],
            ..Config::default()
        };
        assert_eq!(
            config.combined_json_path(),
            PathBuf::from("/project/build/combined.json")
        );
        assert_eq!(
            config.source_paths(),
            vec![PathBuf::from("/project/a.sol"), PathBuf::from("/abs/b.sol")]
        );
    }

    #[test]
    fn test_resolve_config_path() {
        let config = Config {
            root: PathBuf::from("/nonexistent-solcov-root"),
            ..Config::default()
        };
        assert_eq!(config.resolve_config_path(), None);

        let config = Config {
            config: Some(PathBuf::from("custom.toml")),
            ..Config::default()
        };
        assert_eq!(config.resolve_config_path(), Some(PathBuf::from("custom.toml")));
    }
}
