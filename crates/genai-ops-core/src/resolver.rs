//! Fixpoint resolution of local values.
//!
//! Every pass evaluates the pending declarations against the current context.
//! A wholly-known result is committed at once, so later declarations in the
//! same pass already see it. The loop stops when nothing is pending, when a
//! pass resolves nothing, or when the iteration bound is reached. Whatever is
//! still pending is reported as a [`Diagnostic`], never as an error.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::cancellation::CancellationToken;
use crate::collector::{collect_declarations, Declaration, DeclarationKind, DeclarationSet, SourceFingerprint};
use crate::environment::Environment;
use crate::error::{ConfigError, ConfigResult, EvalError};
use crate::eval::{evaluate, EvaluationContext, FunctionRegistry, Namespace, Reference};
use crate::metrics::METRICS;
use crate::obs::{self, ResolutionSpan};
use crate::value::DynamicValue;

/// Default bound on fixpoint passes.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Orders the pending declarations before each pass.
///
/// Only affects how many passes a resolution takes, never its result.
pub trait SchedulingOrder: fmt::Debug + Send + Sync {
    fn sort(&self, pending: &mut [&Declaration]);
}

/// Fewest free references first, name as tie-break.
#[derive(Debug, Clone, Copy, Default)]
pub struct FewestReferencesFirst;

impl SchedulingOrder for FewestReferencesFirst {
    fn sort(&self, pending: &mut [&Declaration]) {
        pending.sort_by(|a, b| {
            a.references
                .len()
                .cmp(&b.references.len())
                .then_with(|| a.name.cmp(&b.name))
        });
    }
}

/// Plain name order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByName;

impl SchedulingOrder for ByName {
    fn sort(&self, pending: &mut [&Declaration]) {
        pending.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Why a declaration did not converge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The declaration sits on a cycle of pending local references.
    Cyclic { cycle: Vec<String> },
    /// It reads references that never became known.
    WaitingOn { references: Vec<String> },
    /// The last evaluation attempt failed.
    EvaluationFailed { message: String },
    /// The pass bound stopped the loop while progress was still being made.
    IterationLimit,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Cyclic { cycle } => {
                write!(f, "cyclic reference: {}", cycle.join(" -> "))
            }
            UnresolvedReason::WaitingOn { references } if references.is_empty() => {
                write!(f, "waiting on unresolved values")
            }
            UnresolvedReason::WaitingOn { references } => {
                write!(f, "waiting on {}", references.join(", "))
            }
            UnresolvedReason::EvaluationFailed { message } => {
                write!(f, "evaluation failed: {message}")
            }
            UnresolvedReason::IterationLimit => write!(f, "iteration limit reached"),
        }
    }
}

/// One declaration that did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub name: String,
    pub origin: PathBuf,
    pub kind: DeclarationKind,
    #[serde(flatten)]
    pub reason: UnresolvedReason,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} `{}` ({}): {}",
            self.kind,
            self.name,
            self.origin.display(),
            self.reason
        )
    }
}

/// Progress made by one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub iteration: usize,
    pub resolved: usize,
    pub pending: usize,
}

/// Outcome of resolving one declaration set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionResult {
    pub values: BTreeMap<String, DynamicValue>,
    pub unresolved: Vec<Diagnostic>,
    pub iterations: usize,
    pub passes: Vec<PassSummary>,
    pub fingerprint: Option<SourceFingerprint>,
}

impl ResolutionResult {
    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        self.values.get(name)
    }

    /// The value of `name`, or [`ConfigError::NotResolved`].
    pub fn require(&self, name: &str) -> ConfigResult<&DynamicValue> {
        self.values.get(name).ok_or_else(|| ConfigError::NotResolved {
            name: name.to_string(),
        })
    }

    /// Resolved names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Resolves declaration sets against an [`Environment`].
#[derive(Debug, Clone)]
pub struct Resolver {
    functions: FunctionRegistry,
    order: Arc<dyn SchedulingOrder>,
    max_iterations: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Built-in functions, fewest-references-first scheduling, default bound.
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::builtin(),
            order: Arc::new(FewestReferencesFirst),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_order(mut self, order: impl SchedulingOrder + 'static) -> Self {
        self.order = Arc::new(order);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Collect `dir` and resolve it.
    pub fn resolve_directory(
        &self,
        dir: &Path,
        env: &Environment,
        cancel: &CancellationToken,
    ) -> ConfigResult<ResolutionResult> {
        let _span = ResolutionSpan::enter(dir);
        let set = collect_declarations(dir, cancel)?;
        Ok(self.resolve(&set, env))
    }

    /// Resolve an already collected set.
    pub fn resolve(&self, set: &DeclarationSet, env: &Environment) -> ResolutionResult {
        let started = Instant::now();
        obs::emit_resolution_started(env, set.len());

        let mut ctx = EvaluationContext::seed(env, &set.data_sources());
        let mut values = BTreeMap::new();
        let mut errors: BTreeMap<&str, EvalError> = BTreeMap::new();
        let mut passes = Vec::new();
        let mut pending: Vec<&Declaration> = set.iter().collect();
        let mut last_resolved = 0;

        while !pending.is_empty() && passes.len() < self.max_iterations {
            let iteration = passes.len() + 1;
            self.order.sort(&mut pending);
            METRICS.inc_passes();

            let mut still_pending = Vec::with_capacity(pending.len());
            let mut resolved = 0;
            for decl in pending {
                match evaluate(&decl.expr, &ctx, &self.functions) {
                    Ok(value) if value.is_wholly_known() => {
                        errors.remove(decl.name.as_str());
                        ctx = ctx.with_local(decl.name.clone(), value.clone());
                        values.insert(decl.name.clone(), value);
                        resolved += 1;
                    }
                    Ok(_) => {
                        errors.remove(decl.name.as_str());
                        still_pending.push(decl);
                    }
                    Err(err) => {
                        errors.insert(decl.name.as_str(), err);
                        still_pending.push(decl);
                    }
                }
            }
            pending = still_pending;
            tracing::debug!(iteration, resolved, pending = pending.len(), "pass complete");
            passes.push(PassSummary {
                iteration,
                resolved,
                pending: pending.len(),
            });
            last_resolved = resolved;
            if resolved == 0 {
                break;
            }
        }

        let hit_limit = !pending.is_empty() && (passes.is_empty() || last_resolved > 0);
        pending.sort_by(|a, b| a.name.cmp(&b.name));
        let unresolved: Vec<Diagnostic> = pending
            .iter()
            .map(|decl| Diagnostic {
                name: decl.name.clone(),
                origin: decl.origin.clone(),
                kind: decl.kind,
                reason: if hit_limit {
                    UnresolvedReason::IterationLimit
                } else {
                    explain(decl, &pending, &errors, &ctx)
                },
            })
            .collect();

        for diagnostic in &unresolved {
            obs::emit_declaration_unresolved(
                &diagnostic.name,
                &diagnostic.origin,
                &diagnostic.reason,
            );
        }
        METRICS.add_resolved(values.len() as u64);
        METRICS.add_unresolved(unresolved.len() as u64);
        obs::emit_resolution_finished(
            started.elapsed().as_millis() as u64,
            passes.len(),
            values.len(),
            unresolved.len(),
        );

        ResolutionResult {
            values,
            unresolved,
            iterations: passes.len(),
            passes,
            fingerprint: set.fingerprint().cloned(),
        }
    }
}

fn explain(
    decl: &Declaration,
    pending: &[&Declaration],
    errors: &BTreeMap<&str, EvalError>,
    ctx: &EvaluationContext,
) -> UnresolvedReason {
    if let Some(err) = errors.get(decl.name.as_str()) {
        return UnresolvedReason::EvaluationFailed {
            message: err.to_string(),
        };
    }

    let graph: BTreeMap<&str, BTreeSet<&str>> = pending
        .iter()
        .map(|d| {
            let deps = d
                .local_dependencies()
                .into_iter()
                .filter(|dep| pending.iter().any(|p| p.name == *dep))
                .collect();
            (d.name.as_str(), deps)
        })
        .collect();
    if let Some(cycle) = find_cycle(&decl.name, &graph) {
        return UnresolvedReason::Cyclic { cycle };
    }

    let mut references: Vec<String> = decl
        .references
        .iter()
        .filter(|r| !is_available(r, ctx))
        .map(ToString::to_string)
        .collect();
    references.dedup();
    UnresolvedReason::WaitingOn { references }
}

/// Whether the namespace member a reference starts from exists.
fn is_available(reference: &Reference, ctx: &EvaluationContext) -> bool {
    let Some(ns) = Namespace::from_root(&reference.root) else {
        return false;
    };
    let Some(member) = reference.path.first() else {
        return true;
    };
    match ctx.lookup(ns, member) {
        None => false,
        Some(value) if ns == Namespace::Data => match reference.path.get(1) {
            Some(instance) => value.get(instance).is_some(),
            None => true,
        },
        Some(_) => true,
    }
}

/// A path `start -> ... -> start` through pending local references, if any.
fn find_cycle(start: &str, graph: &BTreeMap<&str, BTreeSet<&str>>) -> Option<Vec<String>> {
    fn visit<'a>(
        node: &'a str,
        start: &str,
        graph: &BTreeMap<&'a str, BTreeSet<&'a str>>,
        path: &mut Vec<&'a str>,
        seen: &mut HashSet<&'a str>,
    ) -> bool {
        let Some(next) = graph.get(node) else {
            return false;
        };
        for &dep in next {
            if dep == start {
                return true;
            }
            if seen.insert(dep) {
                path.push(dep);
                if visit(dep, start, graph, path, seen) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    let (&start_key, _) = graph.get_key_value(start)?;
    let mut path = vec![start_key];
    let mut seen = HashSet::from([start_key]);
    if visit(start_key, start, graph, &mut path, &mut seen) {
        path.push(start_key);
        Some(path.into_iter().map(str::to_string).collect())
    } else {
        None
    }
}
