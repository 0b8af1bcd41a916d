// SPDX-License-Identifier: AGPL-3.0

//! solcov - source coverage for EVM contract tests

use anyhow::{Context, Result};
use clap::Parser;
use solcov_config::Config;
use solcov_exceptions::CoverageError;
use solcov_logs::{error, error_code, init_tracing, ErrorCode};
use solcov_rig::TestRig;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use tracing::info;

mod replay;
mod report;

use report::{ContractReport, Exitcode, MainResult};

fn main() {
    match _main() {
        Ok(result) => std::process::exit(result.exitcode),
        Err(err) => {
            report_fatal(&err);
            std::process::exit(Exitcode::Fatal as i32)
        }
    }
}

/// Print the error that ended the run, with its diagnostic link when the
/// cause is a coverage error
fn report_fatal(err: &anyhow::Error) {
    let message = format!("Error: {:#}", err);
    match fatal_code(err) {
        Some(code) => error_code(code, &message, true),
        None => error(&message, true),
    }
}

fn fatal_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.downcast_ref::<CoverageError>()
        .and_then(|cause| ErrorCode::from_code(cause.code()))
}

fn load_config() -> Result<Config> {
    let cli = Config::parse();

    let mut config = match cli.resolve_config_path() {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    config.merge(cli);
    config.validate()?;
    Ok(config)
}

fn _main() -> Result<MainResult> {
    let config = load_config()?;

    if config.version {
        println!("solcov version {}", env!("CARGO_PKG_VERSION"));
        return Ok(MainResult::empty());
    }

    init_tracing(config.verbose);

    let combined_json = config.combined_json_path();
    let mut rig = TestRig::new();
    rig.add_coverage_for_contracts(&combined_json, &config.source_paths())
        .with_context(|| format!("Failed to load coverage from {:?}", combined_json))?;

    if let Some(replay_path) = &config.replay {
        let path = config.root.join(replay_path);
        let file = File::open(&path)
            .with_context(|| format!("Failed to open replay file: {:?}", path))?;
        let summary = replay::replay(&mut rig, BufReader::new(file))
            .with_context(|| format!("Failed to replay {:?}", path))?;
        info!(steps = summary.steps, commits = summary.commits, "replayed events");
    }

    let names: Vec<String> = if config.contract.is_empty() {
        rig.contract_names().into_iter().map(String::from).collect()
    } else {
        vec![rig.contract(&config.contract)?.name().to_string()]
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut reports = Vec::with_capacity(names.len());

    for name in &names {
        if config.print_source {
            rig.print_coverage(&mut out, name)?;
        }

        let coverage = rig.coverage_of(name)?;
        let passed = match rig.report_minimum_coverage(&mut out, name, config.min_coverage) {
            Ok(()) => true,
            Err(err @ CoverageError::InsufficientCoverage { .. }) => {
                out.flush()?;
                error_code(ErrorCode::InsufficientCoverage, &err.to_string(), true);
                false
            }
            Err(err) => return Err(err.into()),
        };
        reports.push(ContractReport {
            name: name.clone(),
            coverage,
            passed,
        });
    }

    if config.gas_report {
        writeln!(out)?;
        rig.print_gas_usage(&mut out)?;
    }

    if let Some(trace_path) = &config.trace_output {
        let path = config.root.join(trace_path);
        let file = File::create(&path)
            .with_context(|| format!("Failed to create trace file: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        rig.save_trace(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), "trace written");
    }

    out.flush()?;
    let result = MainResult::from_reports(reports);
    if result.total_failed() > 0 {
        error(
            &format!(
                "\n{} of {} contracts below {:.2}% coverage",
                result.total_failed(),
                result.contracts.len(),
                config.min_coverage
            ),
            true,
        );
    }

    Ok(result)
}
