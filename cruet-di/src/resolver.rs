//! Candidate selection and cycle detection for dependency resolution.

use crate::bean_registry::{BeanDefinition, BeanDefinitionRegistry};
use crate::error::BeanResolutionError;
use itertools::Itertools;
use std::any::TypeId;

/// Selects the single definition satisfying a by-type request.
///
/// Tie-breaking between multiple candidates, in order: an explicit qualifier
/// hint matching a declared qualifier wins; absent a hint, a sole candidate
/// flagged primary wins (two primaries is an error); otherwise the request
/// is ambiguous and fails naming all candidates.
pub(crate) fn select_candidate<'a>(
    registry: &'a BeanDefinitionRegistry,
    type_id: TypeId,
    qualifier: Option<&str>,
) -> Result<&'a BeanDefinition, BeanResolutionError> {
    let candidates: Vec<&BeanDefinition> = registry
        .names_for_type(type_id)
        .iter()
        .filter_map(|name| registry.definition(name))
        .collect_vec();

    if candidates.is_empty() {
        return Err(BeanResolutionError::NoCandidate(type_id));
    }

    if let Some(qualifier) = qualifier {
        let matching = candidates
            .iter()
            .copied()
            .filter(|definition| definition.qualifiers.iter().any(|q| q == qualifier))
            .collect_vec();

        return match matching.len() {
            0 => Err(BeanResolutionError::NoCandidate(type_id)),
            1 => Ok(matching[0]),
            _ => Err(BeanResolutionError::AmbiguousCandidates {
                type_id,
                candidates: matching
                    .iter()
                    .map(|definition| definition.name.clone())
                    .collect(),
            }),
        };
    }

    if candidates.len() == 1 {
        return Ok(candidates[0]);
    }

    let primaries = candidates
        .iter()
        .copied()
        .filter(|definition| definition.primary)
        .collect_vec();

    match primaries.len() {
        1 => Ok(primaries[0]),
        0 => Err(BeanResolutionError::AmbiguousCandidates {
            type_id,
            candidates: candidates
                .iter()
                .map(|definition| definition.name.clone())
                .collect(),
        }),
        _ => Err(BeanResolutionError::DuplicatePrimary {
            type_id,
            candidates: primaries
                .iter()
                .map(|definition| definition.name.clone())
                .collect(),
        }),
    }
}

/// Explicit stack of bean names being resolved by one lookup, threaded
/// through recursive construction. Re-entering a name already on the stack
/// means the dependency graph has a cycle; the error names the full ordered
/// path for diagnosability.
#[derive(Default, Debug)]
pub(crate) struct ResolutionStack {
    names: Vec<String>,
}

impl ResolutionStack {
    pub(crate) fn enter(&mut self, name: &str) -> Result<(), BeanResolutionError> {
        if self.names.iter().any(|entered| entered == name) {
            let mut path = self.names.clone();
            path.push(name.to_string());
            return Err(BeanResolutionError::DependencyCycle(path));
        }

        self.names.push(name.to_string());
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.names.pop();
    }
}
