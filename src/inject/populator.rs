use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::PopulateError;
use crate::registry::{Descriptor, short_type_name};

use super::dependency::{Dependency, Injector};

type AnyRef = Arc<dyn Any + Send + Sync>;

/// Something a dependency can resolve to.
struct Binding {
    name: Arc<str>,
    type_id: TypeId,
    value: AnyRef,
    /// Index into the service list; `None` for roots.
    service: Option<usize>,
}

/// Resolves declared dependencies and injects them into services.
///
/// Roots are provided once by the entry point; every dependent receives a clone of
/// the same `Arc`.
#[derive(Default)]
pub struct Populator {
    roots: Vec<Binding>,
}

impl Populator {
    /// Creates a populator without roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides a root singleton, named after its type.
    pub fn provide<T: Any + Send + Sync>(&mut self, value: Arc<T>) -> &mut Self {
        self.provide_named(short_type_name::<T>(), value)
    }

    /// Provides a root singleton under an explicit name.
    pub fn provide_named<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<Arc<str>>,
        value: Arc<T>,
    ) -> &mut Self {
        self.roots.push(Binding {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            value,
            service: None,
        });
        self
    }

    /// Number of roots.
    pub fn roots(&self) -> usize {
        self.roots.len()
    }

    /// Resolves and injects every declared dependency of `services`.
    ///
    /// Nothing is injected unless every dependency of every service resolves and no
    /// cycle exists.
    pub fn populate(&self, services: &[Descriptor]) -> Result<(), PopulateError> {
        let bindings = self.bindings(services);

        let mut plans: Vec<Vec<(Dependency, usize)>> = Vec::with_capacity(services.len());
        for desc in services {
            let mut plan = Vec::new();
            for dep in desc.instance().dependencies() {
                plan.push((dep, resolve(&bindings, desc.name(), &dep)?));
            }
            plans.push(plan);
        }

        let edges: Vec<Vec<usize>> = plans
            .iter()
            .map(|plan| {
                plan.iter()
                    .filter_map(|(_, idx)| bindings[*idx].service)
                    .collect()
            })
            .collect();
        if let Some(path) = find_cycle(&edges) {
            return Err(PopulateError::Cycle {
                path: path
                    .into_iter()
                    .map(|i| services[i].name().to_string())
                    .collect(),
            });
        }

        for (desc, plan) in services.iter().zip(plans) {
            let resolved: Vec<(Dependency, AnyRef)> = plan
                .into_iter()
                .map(|(dep, idx)| (dep, Arc::clone(&bindings[idx].value)))
                .collect();
            desc.instance()
                .populate(&Injector::new(desc.name(), &resolved))?;
        }
        Ok(())
    }

    fn bindings(&self, services: &[Descriptor]) -> Vec<Binding> {
        let mut all: Vec<Binding> = self
            .roots
            .iter()
            .map(|r| Binding {
                name: Arc::clone(&r.name),
                type_id: r.type_id,
                value: Arc::clone(&r.value),
                service: None,
            })
            .collect();
        all.extend(services.iter().enumerate().map(|(i, d)| Binding {
            name: d.name_arc(),
            type_id: d.type_id(),
            value: Arc::clone(d.any()),
            service: Some(i),
        }));
        all
    }
}

fn resolve(bindings: &[Binding], service: &str, dep: &Dependency) -> Result<usize, PopulateError> {
    let matches: Vec<usize> = bindings
        .iter()
        .enumerate()
        .filter(|(_, b)| b.type_id == dep.type_id())
        .filter(|(_, b)| dep.name().is_none_or(|n| &*b.name == n))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(PopulateError::Unresolved {
            service: service.to_string(),
            dependency: dep.to_string(),
        }),
        [one] => Ok(*one),
        many => Err(PopulateError::Ambiguous {
            service: service.to_string(),
            dependency: dep.to_string(),
            candidates: many.iter().map(|i| bindings[*i].name.to_string()).collect(),
        }),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

/// Returns the first cycle found as a node path whose first and last entries are equal.
fn find_cycle(edges: &[Vec<usize>]) -> Option<Vec<usize>> {
    fn visit(
        node: usize,
        edges: &[Vec<usize>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        marks[node] = Mark::Active;
        stack.push(node);
        for &next in &edges[node] {
            match marks[next] {
                Mark::Active => {
                    let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                    let mut path = stack[start..].to_vec();
                    path.push(next);
                    return Some(path);
                }
                Mark::New => {
                    if let Some(path) = visit(next, edges, marks, stack) {
                        return Some(path);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[node] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; edges.len()];
    let mut stack = Vec::new();
    for node in 0..edges.len() {
        if marks[node] == Mark::New {
            if let Some(path) = visit(node, edges, &mut marks, &mut stack) {
                return Some(path);
            }
        }
    }
    None
}
