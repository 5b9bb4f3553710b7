//! JobGraph - needs graph over pipeline jobs
//!
//! Built once per document:
//! - every `needs` entry must name a pipeline job or a passthrough job
//! - cycle detection and topological order in one iterative DFS
//!   (three-color marking, explicit stack)
//! - implicit force folded over the topological order

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{CixxError, Result};

use super::details::JobDetails;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Graph of pipeline jobs and their cache settings
#[derive(Debug)]
pub struct JobGraph {
    /// Pipeline jobs in declaration order
    jobs: Vec<(String, JobDetails)>,
    /// Job name -> position in `jobs`
    index: FxHashMap<String, usize>,
    /// Pipeline dependencies per job (passthrough needs excluded)
    dependencies: Vec<Vec<usize>>,
    /// Dependencies before dependents
    order: Vec<usize>,
    /// Whether the job or anything upstream of it is forced
    implicitly_forced: Vec<bool>,
}

impl JobGraph {
    /// Build the graph of `jobs`; `passthrough` names jobs without steps
    /// that may still appear in `needs`.
    pub fn new(jobs: Vec<(String, JobDetails)>, passthrough: &FxHashSet<String>) -> Result<Self> {
        let index: FxHashMap<String, usize> = jobs
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();

        let mut dependencies = Vec::with_capacity(jobs.len());
        for (name, details) in &jobs {
            let mut deps = Vec::with_capacity(details.needs.len());
            for need in &details.needs {
                match index.get(need) {
                    Some(&i) => deps.push(i),
                    None if passthrough.contains(need) => {}
                    None => {
                        return Err(CixxError::UnknownDependency {
                            job: name.clone(),
                            dependency: need.clone(),
                        })
                    }
                }
            }
            dependencies.push(deps);
        }

        let order = topological_order(&jobs, &dependencies)?;

        let mut implicitly_forced = vec![false; jobs.len()];
        for &i in &order {
            implicitly_forced[i] =
                jobs[i].1.force || dependencies[i].iter().any(|&d| implicitly_forced[d]);
        }

        debug!(
            jobs = jobs.len(),
            forced = implicitly_forced.iter().filter(|f| **f).count(),
            "built job graph"
        );

        Ok(Self {
            jobs,
            index,
            dependencies,
            order,
            implicitly_forced,
        })
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&JobDetails> {
        self.index.get(name).map(|&i| &self.jobs[i].1)
    }

    /// Jobs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobDetails)> {
        self.jobs.iter().map(|(name, details)| (name.as_str(), details))
    }

    /// Jobs with every dependency ahead of its dependents
    pub fn topological(&self) -> impl Iterator<Item = (&str, &JobDetails)> {
        self.order.iter().map(|&i| {
            let (name, details) = &self.jobs[i];
            (name.as_str(), details)
        })
    }

    /// Direct dependencies of `name` that are pipeline jobs, in `needs` order
    pub fn pipeline_needs(&self, name: &str) -> Vec<(&str, &JobDetails)> {
        self.index
            .get(name)
            .map(|&i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| (self.jobs[d].0.as_str(), &self.jobs[d].1))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when `name` or any job upstream of it is forced
    pub fn is_implicitly_forced(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&i| self.implicitly_forced[i])
    }
}

/// Post-order DFS over declaration order, failing on the first cycle
fn topological_order(
    jobs: &[(String, JobDetails)],
    dependencies: &[Vec<usize>],
) -> Result<Vec<usize>> {
    let mut colors = vec![Color::White; jobs.len()];
    let mut order = Vec::with_capacity(jobs.len());

    for root in 0..jobs.len() {
        if colors[root] != Color::White {
            continue;
        }

        colors[root] = Color::Gray;
        // (job, index of the next dependency to visit)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(&dep) = dependencies[node].get(next) else {
                colors[node] = Color::Black;
                order.push(node);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match colors[dep] {
                Color::White => {
                    colors[dep] = Color::Gray;
                    stack.push((dep, 0));
                }
                Color::Gray => {
                    let start = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                    let cycle: Vec<&str> = stack[start..]
                        .iter()
                        .map(|(n, _)| jobs[*n].0.as_str())
                        .collect();
                    return Err(CixxError::CycleDetected {
                        cycle: format!("{} → {}", cycle.join(" → "), jobs[dep].0),
                    });
                }
                Color::Black => {}
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(needs: &[&str], force: bool) -> JobDetails {
        JobDetails {
            needs: needs.iter().map(|s| s.to_string()).collect(),
            force,
            ..JobDetails::default()
        }
    }

    fn graph(jobs: &[(&str, JobDetails)]) -> Result<JobGraph> {
        JobGraph::new(
            jobs.iter()
                .map(|(name, details)| (name.to_string(), details.clone()))
                .collect(),
            &FxHashSet::default(),
        )
    }

    fn position(order: &[&str], name: &str) -> usize {
        order.iter().position(|n| *n == name).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════
    // TOPOLOGICAL ORDER
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn dependencies_come_first() {
        // Declared out of order on purpose: d → (b, c) → a
        let g = graph(&[
            ("d", job(&["b", "c"], false)),
            ("b", job(&["a"], false)),
            ("c", job(&["a"], false)),
            ("a", job(&[], false)),
        ])
        .unwrap();
        let order: Vec<&str> = g.topological().map(|(n, _)| n).collect();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "a") < position(&order, "b"));
        assert!(position(&order, "a") < position(&order, "c"));
        assert!(position(&order, "b") < position(&order, "d"));
        assert!(position(&order, "c") < position(&order, "d"));
    }

    #[test]
    fn declaration_order_is_kept_for_iteration() {
        let g = graph(&[("z", job(&[], false)), ("a", job(&["z"], false))]).unwrap();
        let names: Vec<&str> = g.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["z", "a"]);
    }

    // ═══════════════════════════════════════════════════════════════
    // REFERENCE AND CYCLE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn unknown_dependency_names_job_and_reference() {
        let err = graph(&[("test", job(&["biuld"], false))]).unwrap_err();
        match err {
            CixxError::UnknownDependency { job, dependency } => {
                assert_eq!(job, "test");
                assert_eq!(dependency, "biuld");
            }
            other => panic!("Expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn passthrough_dependency_is_allowed() {
        let passthrough: FxHashSet<String> = ["setup".to_string()].into_iter().collect();
        let g = JobGraph::new(vec![("build".into(), job(&["setup"], false))], &passthrough).unwrap();
        assert!(g.pipeline_needs("build").is_empty());
        assert!(!g.contains("setup"));
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let err = graph(&[
            ("a", job(&["c"], false)),
            ("b", job(&["a"], false)),
            ("c", job(&["b"], false)),
        ])
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("CIXX-031"));
        assert!(message.contains("a → c → b → a"), "{message}");
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let err = graph(&[("a", job(&["a"], false))]).unwrap_err();
        assert!(matches!(err, CixxError::CycleDetected { .. }));
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let names: Vec<String> = (0..20_000).map(|i| format!("j{i}")).collect();
        let jobs = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let needs = if i == 0 { vec![] } else { vec![names[i - 1].clone()] };
                (name.clone(), JobDetails { needs, ..JobDetails::default() })
            })
            .collect();
        let g = JobGraph::new(jobs, &FxHashSet::default()).unwrap();
        assert_eq!(g.topological().next().map(|(n, _)| n), Some("j0"));
    }

    // ═══════════════════════════════════════════════════════════════
    // IMPLICIT FORCE
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn force_propagates_downstream() {
        let g = graph(&[
            ("a", job(&[], true)),
            ("b", job(&["a"], false)),
            ("c", job(&["b"], false)),
            ("d", job(&[], false)),
        ])
        .unwrap();
        assert!(g.is_implicitly_forced("a"));
        assert!(g.is_implicitly_forced("b"));
        assert!(g.is_implicitly_forced("c"));
        assert!(!g.is_implicitly_forced("d"));
    }

    #[test]
    fn force_does_not_propagate_upstream() {
        let g = graph(&[("a", job(&[], false)), ("b", job(&["a"], true))]).unwrap();
        assert!(!g.is_implicitly_forced("a"));
        assert!(g.is_implicitly_forced("b"));
    }
}
