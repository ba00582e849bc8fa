use std::collections::{BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use crate::models::{Conflict, ConflictChain};

/// Reconstructs causal chains by walking `parent_conflict_id` links backward
/// from every conflict that has a parent. Chains are ordered root first and
/// are only reported at length two or more. The same ancestor may appear as a
/// prefix of several chains when it has multiple descendants.
///
/// Parent links are supposed to form a forest. A cycle is upstream data
/// corruption: the walk carries a visited set, logs the offending conflict,
/// and drops the cyclic chain instead of looping.
pub fn trace_chains(relationship_id: Uuid, conflicts: &[Conflict]) -> Vec<ConflictChain> {
    let scoped: Vec<&Conflict> = conflicts
        .iter()
        .filter(|c| c.relationship_id == relationship_id)
        .collect();
    let by_id: HashMap<Uuid, &Conflict> = scoped.iter().map(|c| (c.id, *c)).collect();

    let mut chains = Vec::new();

    for terminal in scoped.iter().copied().filter(|c| c.parent_conflict_id.is_some()) {
        match walk_to_root(terminal, &by_id) {
            Some(lineage) if lineage.len() >= 2 => chains.push(build_chain(lineage)),
            _ => {}
        }
    }

    chains.sort_by_key(|chain| {
        let last = &chain.conflicts[chain.conflicts.len() - 1];
        (last.started_at, last.id)
    });
    chains
}

/// Returns the lineage ordered root first, or None when a cycle was detected.
/// A parent id that resolves to no known conflict simply ends the walk.
fn walk_to_root<'a>(
    terminal: &'a Conflict,
    by_id: &HashMap<Uuid, &'a Conflict>,
) -> Option<Vec<&'a Conflict>> {
    let mut lineage = vec![terminal];
    let mut visited: HashSet<Uuid> = HashSet::from([terminal.id]);
    let mut current = terminal;

    while let Some(parent_id) = current.parent_conflict_id {
        if !visited.insert(parent_id) {
            tracing::warn!(
                conflict_id = %terminal.id,
                repeated_id = %parent_id,
                "cycle detected in conflict parent links; dropping chain"
            );
            return None;
        }
        match by_id.get(&parent_id) {
            Some(parent) => {
                lineage.push(*parent);
                current = *parent;
            }
            None => break,
        }
    }

    lineage.reverse();
    Some(lineage)
}

fn build_chain(lineage: Vec<&Conflict>) -> ConflictChain {
    let needs: BTreeSet<String> = lineage
        .iter()
        .flat_map(|c| c.unmet_needs.iter().cloned())
        .collect();

    ConflictChain {
        root_cause: lineage[0].topic.clone(),
        surface_issue: lineage[lineage.len() - 1].topic.clone(),
        unmet_needs: needs.into_iter().collect(),
        resolution_attempts: lineage.iter().filter(|c| c.is_resolved).count(),
        conflicts: lineage.into_iter().cloned().collect(),
    }
}
