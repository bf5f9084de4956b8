use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use hotgraph::loader::{Compile, LoadContext, LoadFuture};
use hotgraph::types::{Artifact, ModuleId, Version};

/// A module of the tiny test language.
///
/// ```text
/// // comments and blank lines are ignored
/// import "./dep.tiny"
/// accept "./dep.tiny"
/// export default 41
/// ```
///
/// Anything else is a syntax error. `total` is the module's own default
/// plus the totals of everything it imports, so a change anywhere below a
/// module shows up in its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TinyModule {
    pub id: ModuleId,
    pub version: Option<Version>,
    pub default: i64,
    pub total: i64,
    pub imports: Vec<ModuleId>,
}

/// Compiler for [`TinyModule`]s. Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct TinyCompiler {
    loads: Arc<Mutex<HashMap<ModuleId, usize>>>,
    accepted: Arc<Mutex<Vec<(ModuleId, Option<i64>)>>>,
}

impl TinyCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `id` was compiled.
    pub fn loads(&self, id: &ModuleId) -> usize {
        self.loads.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().values().sum()
    }

    /// `(owner, new default)` for every change taken by an `accept` line;
    /// `None` when the new version failed to load.
    pub fn accepted(&self) -> Vec<(ModuleId, Option<i64>)> {
        self.accepted.lock().unwrap().clone()
    }

    fn record_load(&self, id: &ModuleId) {
        *self.loads.lock().unwrap().entry(id.clone()).or_default() += 1;
    }
}

fn quoted(rest: &str) -> Option<&str> {
    rest.trim().strip_prefix('"')?.strip_suffix('"')
}

impl Compile for TinyCompiler {
    type Module = TinyModule;

    fn compile(&self, source: String, cx: LoadContext<TinyModule>) -> LoadFuture<'_, TinyModule> {
        Box::pin(async move {
            self.record_load(cx.id());

            let mut default = 0;
            let mut imported: Vec<TinyModule> = Vec::new();

            for (n, raw) in source.lines().enumerate() {
                let line = raw.trim();
                let lineno = n + 1;
                if line.is_empty() || line.starts_with("//") {
                    continue;
                }

                if let Some(rest) = line.strip_prefix("import ") {
                    let spec = quoted(rest)
                        .ok_or_else(|| anyhow!("line {lineno}: expected a quoted specifier"))?;
                    match cx.import(spec).await? {
                        Artifact::Module(module) => imported.push(module),
                        Artifact::LoadError(failure) => {
                            bail!("import {spec:?} failed: {}", failure.message)
                        }
                    }
                } else if let Some(rest) = line.strip_prefix("accept ") {
                    let spec = quoted(rest)
                        .ok_or_else(|| anyhow!("line {lineno}: expected a quoted specifier"))?;
                    let log = Arc::clone(&self.accepted);
                    let owner = cx.id().clone();
                    cx.hot().accept(spec, move |artifact| {
                        let value = artifact.module().map(|m| m.default);
                        log.lock().unwrap().push((owner.clone(), value));
                        Ok(())
                    })?;
                } else if let Some(rest) = line.strip_prefix("export default ") {
                    default = rest
                        .trim()
                        .parse::<i64>()
                        .map_err(|e| anyhow!("line {lineno}: bad default export: {e}"))?;
                } else {
                    bail!("line {lineno}: syntax error near {line:?}");
                }
            }

            Ok(TinyModule {
                id: cx.id().clone(),
                version: cx.version(),
                default,
                total: default + imported.iter().map(|m| m.total).sum::<i64>(),
                imports: imported.into_iter().map(|m| m.id).collect(),
            })
        })
    }
}
