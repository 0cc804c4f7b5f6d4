//! Conditional bean definition registration support.
//!
//! Conditions gate whether a scanned or imported definition ever becomes
//! visible to lookups. They are evaluated exactly once per definition, at
//! scan time, in declaration order, and all conditions on a definition must
//! pass for it to be registered. There is no OR combinator - compose the
//! disjunction inside a single [Condition] when such semantics are needed.

use crate::environment::Environment;
use crate::instance_provider::ErrorPtr;
use derive_more::Constructor;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;

/// A read-only facade of a [BeanDefinitionRegistry](super::BeanDefinitionRegistry)
/// safe to use in registration conditions. Conditions observe the partial
/// registry built so far - registration order matters for conditions
/// querying it.
#[cfg_attr(test, automock)]
pub trait BeanDefinitionRegistryFacade {
    /// Checks if there's a definition with the given name.
    fn contains_definition(&self, name: &str) -> bool;

    /// Checks if any definition provides the given type.
    fn is_type_registered(&self, type_id: TypeId) -> bool;
}

/// Context information for use by condition implementations: the partial
/// registry and the environment property view.
#[derive(Constructor)]
pub struct ConditionContext<'a> {
    registry: &'a dyn BeanDefinitionRegistryFacade,
    environment: &'a dyn Environment,
}

impl ConditionContext<'_> {
    pub fn registry(&self) -> &dyn BeanDefinitionRegistryFacade {
        self.registry
    }

    pub fn environment(&self) -> &dyn Environment {
        self.environment
    }
}

/// Registration condition which must pass for a definition to be registered.
/// Conditions are pure predicates - they must not mutate state. Returning an
/// error is fatal for the whole container build; returning `Ok(false)`
/// silently omits the definition.
pub trait Condition: Send + Sync {
    fn matches(&self, context: &ConditionContext) -> Result<bool, ErrorPtr>;
}

impl<F> Condition for F
where
    F: for<'a> Fn(&ConditionContext<'a>) -> Result<bool, ErrorPtr> + Send + Sync,
{
    fn matches(&self, context: &ConditionContext) -> Result<bool, ErrorPtr> {
        self(context)
    }
}

/// Condition passing when the given environment property equals the given
/// value. An absent property fails closed (evaluates to `false`, not an
/// error).
#[derive(Clone, Debug, Constructor)]
pub struct PropertyEquals {
    key: String,
    value: String,
}

impl Condition for PropertyEquals {
    fn matches(&self, context: &ConditionContext) -> Result<bool, ErrorPtr> {
        Ok(context
            .environment()
            .get_property(&self.key)
            .map(|value| value == self.value)
            .unwrap_or(false))
    }
}

/// Condition passing when a definition with the given name is already
/// present in the partial registry.
#[derive(Clone, Debug, Constructor)]
pub struct DefinitionPresent {
    name: String,
}

impl Condition for DefinitionPresent {
    fn matches(&self, context: &ConditionContext) -> Result<bool, ErrorPtr> {
        Ok(context.registry().contains_definition(&self.name))
    }
}

/// Condition passing when no definition with the given name is registered
/// yet, useful for fallback beans.
#[derive(Clone, Debug, Constructor)]
pub struct DefinitionAbsent {
    name: String,
}

impl Condition for DefinitionAbsent {
    fn matches(&self, context: &ConditionContext) -> Result<bool, ErrorPtr> {
        Ok(!context.registry().contains_definition(&self.name))
    }
}
