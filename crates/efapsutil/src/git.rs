// efaps: The install-set packaging toolchain for eFaps applications.
// Copyright (C) 2024 The eFaps Team
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Provenance lookups against the local `git` repository, by calling the
//! `git` command line tool. Every failure mode degrades to the unknown
//! sentinel; history lookups never fail the caller.

use std::path::Path;
use std::process::Command;

use chrono::DateTime;
use indexmap::IndexMap;

use crate::common::Provenance;

pub fn is_in_git_repo(path: &Path) -> bool {
    let output = Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .current_dir(path)
        .status();
    match output {
        Ok(out) => out.success(),
        _ => false,
    }
}

/// Revision and author date of the most recent commit touching `rel_path`.
///
/// Returns [`Provenance::unknown`] when the path has no history, the
/// directory is not a repository, or git itself is unavailable.
pub fn latest_change(repo_root: &Path, rel_path: &str) -> Provenance {
    match query_latest(repo_root, rel_path) {
        Some(p) => p,
        None => {
            log::debug!(
                "no git history for `{}` below `{}`, using unknown revision",
                rel_path,
                repo_root.display()
            );
            Provenance::unknown()
        }
    }
}

/// Batch variant: one `-1`-limited history query per file. Per-file errors
/// degrade to the unknown sentinel and never abort the batch.
pub fn latest_changes(repo_root: &Path, rel_paths: &[String]) -> IndexMap<String, Provenance> {
    let mut result = IndexMap::with_capacity(rel_paths.len());
    for rel_path in rel_paths {
        result.insert(rel_path.clone(), latest_change(repo_root, rel_path));
    }
    result
}

fn query_latest(repo_root: &Path, rel_path: &str) -> Option<Provenance> {
    let stdout = run_stdout(Command::new("git").current_dir(repo_root).args([
        "log",
        "-1",
        "--format=%H%x09%aI",
        "--",
        rel_path,
    ]))
    .ok()?;
    let line = stdout.lines().next()?;
    let (revision, date) = line.split_once('\t')?;
    let date = DateTime::parse_from_rfc3339(date.trim()).ok()?;
    Some(Provenance::new(revision.to_owned(), date))
}

fn run_stdout(command: &mut Command) -> Result<String, std::io::Error> {
    let output = command.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!(
                "Command {:?} failed with status: {}\nstderr: {}",
                command, output.status, stderr
            ),
        ));
    }
    String::from_utf8(output.stdout).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse stdout of command {:?}: {}", command, e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_history_degrades_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let p = latest_change(dir.path(), "does/not/exist.xml");
        assert!(p.is_unknown());
    }

    #[test]
    fn batch_keeps_every_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec!["a.xml".to_owned(), "b/c.java".to_owned()];
        let result = latest_changes(dir.path(), &paths);
        assert_eq!(result.len(), 2);
        assert!(result.values().all(Provenance::is_unknown));
    }
}
