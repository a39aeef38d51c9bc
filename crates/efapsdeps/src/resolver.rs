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

use std::collections::HashSet;

use anyhow::Context;
use efapsutil::manifest::Dependency;

use crate::bundle::ResolvedApplication;
use crate::store::ArtifactStore;

/// Resolve the declared dependencies in merge precedence order.
///
/// Dependencies are processed strictly in declared order. A dependency's own
/// dependencies are resolved before it (they sit at lower precedence), so
/// the result is a post-order walk of the dependency tree. Each group/artifact
/// pair is resolved at most once; repeat visits, including cycles, are
/// skipped. Any store miss or unreadable bundle aborts the resolution.
pub fn resolve_all(
    deps: &[Dependency],
    store: &dyn ArtifactStore,
) -> anyhow::Result<Vec<ResolvedApplication>> {
    let mut visited = HashSet::new();
    let mut resolved = Vec::new();
    resolve_into(deps, store, &mut visited, &mut resolved)?;
    Ok(resolved)
}

fn resolve_into(
    deps: &[Dependency],
    store: &dyn ArtifactStore,
    visited: &mut HashSet<(String, String)>,
    resolved: &mut Vec<ResolvedApplication>,
) -> anyhow::Result<()> {
    for dep in deps {
        if !visited.insert(dep.key()) {
            log::debug!("dependency {} already resolved, skipping", dep);
            continue;
        }
        let archive = store
            .resolve(dep)
            .with_context(|| format!("could not resolve dependency {}", dep))?;
        let app = ResolvedApplication::open(&archive)
            .with_context(|| format!("could not read bundle of {}", dep))?;
        log::info!("resolved dependency {} ({})", dep, app.name);
        let nested = app.manifest.dependencies.clone();
        resolve_into(&nested, store, visited, resolved)?;
        resolved.push(app);
    }
    Ok(())
}
