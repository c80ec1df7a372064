//! Dependency ordering

use crate::error::Error;
use std::collections::HashMap;
use std::fmt;

/// A dependency cycle, as the path that closed it (`a -> b -> a`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCycle {
    pub chain: Vec<String>,
}

impl fmt::Display for DependencyCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle: {}", self.chain.join(" -> "))
    }
}

impl std::error::Error for DependencyCycle {}

impl From<DependencyCycle> for Error {
    fn from(cycle: DependencyCycle) -> Self {
        Error::cycle(cycle.chain)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Topologically order `nodes` (id, dependency ids) so every id follows its
/// dependencies.
///
/// Depth-first in input order, so independent nodes keep their relative
/// order. Dependencies that are not themselves nodes are skipped.
pub fn resolve_order<'a, I, D>(nodes: I) -> Result<Vec<String>, DependencyCycle>
where
    I: IntoIterator<Item = (&'a str, D)>,
    D: IntoIterator<Item = &'a str>,
{
    let nodes: Vec<(&str, Vec<&str>)> = nodes
        .into_iter()
        .map(|(id, deps)| (id, deps.into_iter().collect()))
        .collect();
    let edges: HashMap<&str, &[&str]> = nodes.iter().map(|(id, deps)| (*id, deps.as_slice())).collect();

    let mut marks = HashMap::new();
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(nodes.len());
    for (id, _) in &nodes {
        visit(*id, &edges, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit<'a>(
    id: &'a str,
    edges: &HashMap<&'a str, &[&'a str]>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), DependencyCycle> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| *p == id).unwrap_or(0);
            let mut chain: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
            chain.push(id.to_string());
            return Err(DependencyCycle { chain });
        }
        None => {}
    }

    marks.insert(id, Mark::Visiting);
    path.push(id);
    for dep in edges.get(id).copied().unwrap_or_default() {
        if edges.contains_key(dep) {
            visit(*dep, edges, marks, path, order)?;
        }
    }
    path.pop();
    marks.insert(id, Mark::Done);
    order.push(id.to_string());
    Ok(())
}
