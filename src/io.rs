//! Tab-separated readers and writers for runs, judgments and metadata.
//!
//! All formats are newline-delimited TSV without headers. Malformed lines
//! surface as [`EvalError::Format`] with file and line context before any
//! computation starts.

use crate::error::{EvalError, Result};
use crate::model::{Metadata, RelevanceEstimate, Run};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read a runs file: `system<TAB>query<TAB>document` per retrieved item.
///
/// Lines must be grouped contiguously by (system, query), every run must
/// retrieve the same number of documents, and the total line count must be
/// evenly divisible by both the distinct system count and the distinct query
/// count. The divisibility check is a necessary (not sufficient) proxy for a
/// complete run matrix; the constant per-run size check closes most of the
/// gap.
pub fn read_runs(path: &Path) -> Result<Vec<Run>> {
    let content = read_file(path)?;

    let mut runs: Vec<Run> = Vec::new();
    let mut seen_groups: HashSet<(String, String)> = HashSet::new();
    let mut current: Option<Run> = None;
    let mut total_lines = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 3 {
            return Err(EvalError::format(
                path,
                line_number,
                format!("expected 3 tab-separated fields, found {}", parts.len()),
            ));
        }
        let (system, query, document) = (parts[0], parts[1], parts[2]);
        total_lines += 1;

        let same_group = current
            .as_ref()
            .is_some_and(|run| run.system == system && run.query == query);
        if !same_group {
            if let Some(run) = current.take() {
                runs.push(run);
            }
            if !seen_groups.insert((system.to_string(), query.to_string())) {
                return Err(EvalError::format(
                    path,
                    line_number,
                    format!("run for system '{system}' and query '{query}' is not contiguous"),
                ));
            }
            current = Some(Run::new(system, query, Vec::new()));
        }
        if let Some(run) = current.as_mut() {
            run.documents.push(document.to_string());
        }
    }
    if let Some(run) = current.take() {
        runs.push(run);
    }

    if runs.is_empty() {
        return Err(EvalError::format(path, 1, "runs file is empty"));
    }

    // Constant per-run size.
    let run_size = runs[0].documents.len();
    if let Some(bad) = runs.iter().find(|r| r.documents.len() != run_size) {
        return Err(EvalError::format(
            path,
            total_lines,
            format!(
                "run for system '{}' and query '{}' has {} documents, expected {}",
                bad.system,
                bad.query,
                bad.documents.len(),
                run_size
            ),
        ));
    }

    // Divisibility proxy for a complete, non-ragged system x query matrix.
    let n_systems = runs
        .iter()
        .map(|r| r.system.as_str())
        .collect::<HashSet<_>>()
        .len();
    let n_queries = runs
        .iter()
        .map(|r| r.query.as_str())
        .collect::<HashSet<_>>()
        .len();
    if total_lines % n_systems != 0 || total_lines % n_queries != 0 {
        return Err(EvalError::format(
            path,
            total_lines,
            format!(
                "{total_lines} lines cannot form a complete matrix of \
                 {n_systems} systems and {n_queries} queries"
            ),
        ));
    }

    Ok(runs)
}

/// Read a judgments or estimates file:
/// `query<TAB>document<TAB>expectation[<TAB>variance]`.
///
/// Variance defaults to 0 when omitted (exact judgments).
pub fn read_estimates(path: &Path) -> Result<Vec<RelevanceEstimate>> {
    let content = read_file(path)?;

    let mut estimates = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(EvalError::format(
                path,
                line_number,
                format!("expected 3 or 4 tab-separated fields, found {}", parts.len()),
            ));
        }
        let expectation = parse_f64(parts[2], path, line_number, "expectation")?;
        let variance = if parts.len() == 4 {
            parse_f64(parts[3], path, line_number, "variance")?
        } else {
            0.0
        };
        estimates.push(RelevanceEstimate::new(
            parts[0],
            parts[1],
            expectation,
            variance,
        ));
    }
    Ok(estimates)
}

/// Read a metadata file: `document<TAB>artist<TAB>genre`.
pub fn read_metadata(path: &Path) -> Result<Vec<Metadata>> {
    let content = read_file(path)?;

    let mut metadata = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 3 {
            return Err(EvalError::format(
                path,
                line_number,
                format!("expected 3 tab-separated fields, found {}", parts.len()),
            ));
        }
        metadata.push(Metadata::new(parts[0], parts[1], parts[2]));
    }
    Ok(metadata)
}

/// Write relevance estimates as TSV, sorted by query then document.
pub fn write_estimates<W: Write>(
    writer: &mut W,
    estimates: &[RelevanceEstimate],
    digits: usize,
) -> Result<()> {
    let mut sorted: Vec<&RelevanceEstimate> = estimates.iter().collect();
    sorted.sort_by(|a, b| a.query.cmp(&b.query).then_with(|| a.document.cmp(&b.document)));

    for est in sorted {
        writeln!(
            writer,
            "{}\t{}\t{:.digits$}\t{:.digits$}",
            est.query, est.document, est.expectation, est.variance,
        )
        .map_err(|e| EvalError::io("<output>", e))?;
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(EvalError::FileNotFound(path.to_path_buf()));
    }
    fs::read_to_string(path).map_err(|e| EvalError::io(path, e))
}

fn parse_f64(field: &str, path: &Path, line: usize, name: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|_| EvalError::format(path, line, format!("{name} '{field}' is not a number")))
}
