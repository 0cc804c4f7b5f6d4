//! Post-construction lifecycle phases for bean instances.
//!
//! Each created instance passes through the pipeline: context-aware
//! injection, pre-initialization post-processing, the init hook,
//! post-initialization post-processing. Post-processors may substitute the
//! reference they receive - the possibly substituted reference leaving the
//! pipeline is what all subsequent lookups observe, which is where proxy
//! wrapping for interception plugs in.

use crate::bean_registry::BeanDefinition;
use crate::environment::Environment;
use crate::error::LifecycleError;
use crate::factory::BeanContainer;
use crate::instance_provider::{BeanInstanceAnyPtr, ErrorPtr};
use derivative::Derivative;
#[cfg(test)]
use mockall::automock;
use std::any::{type_name, Any};
use std::sync::Arc;

/// Lifecycle states an instance moves through, in order. Mostly useful for
/// diagnostics; see [BeanContainer::lifecycle_state].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum LifecycleState {
    Defined,
    ConditionChecked,
    Instantiated,
    ContextInjected,
    PreInitialized,
    Initialized,
    PostInitialized,
    Ready,
    Destroyed,
}

pub type BeanNameAwareFn = Arc<dyn Fn(&BeanInstanceAnyPtr, &str) + Send + Sync>;
pub type ContainerAwareFn = Arc<dyn Fn(&BeanInstanceAnyPtr, &BeanContainer) + Send + Sync>;
pub type ValueResolverAwareFn =
    Arc<dyn Fn(&BeanInstanceAnyPtr, &dyn Environment) + Send + Sync>;

/// Closed set of optional context-aware callbacks a definition can declare.
/// Each present callback is invoked exactly once, right after instantiation,
/// before any post-processor sees the instance.
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct AwareCallbacks {
    /// Receives the name under which the bean was registered.
    #[derivative(Debug = "ignore")]
    pub bean_name: Option<BeanNameAwareFn>,

    /// Receives a handle to the owning container.
    #[derivative(Debug = "ignore")]
    pub container: Option<ContainerAwareFn>,

    /// Receives the environment for `${key}` placeholder resolution.
    #[derivative(Debug = "ignore")]
    pub value_resolver: Option<ValueResolverAwareFn>,
}

pub type BeanPostProcessorPtr = Arc<dyn BeanPostProcessor + Send + Sync>;

/// Hook invoked around initialization of every bean instance, able to
/// observe or substitute it. Processors run in ascending
/// [order](Self::order) (lower runs earlier).
#[cfg_attr(test, automock)]
pub trait BeanPostProcessor {
    /// Establishes the position of this processor relative to others.
    fn order(&self) -> i32 {
        0
    }

    /// Runs before the init hook. The returned instance replaces the given
    /// one for the rest of the pipeline.
    fn before_init(
        &self,
        name: &str,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        let _ = name;
        Ok(instance)
    }

    /// Runs after the init hook. The returned instance is what lookups will
    /// receive (and what singleton scopes cache).
    fn after_init(
        &self,
        name: &str,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        let _ = name;
        Ok(instance)
    }
}

/// Adapts a strongly-typed hook to the type-erased [LifecycleCallback]
/// (crate::bean_registry::LifecycleCallback) form used by definitions.
pub fn typed_hook<T, F>(
    hook: F,
) -> impl Fn(&BeanInstanceAnyPtr) -> Result<(), ErrorPtr> + Send + Sync + 'static
where
    T: Any + Send + Sync,
    F: Fn(&T) -> Result<(), ErrorPtr> + Send + Sync + 'static,
{
    move |instance| match instance.downcast_ref::<T>() {
        Some(target) => hook(target),
        None => Err(Arc::new(crate::error::BeanResolutionError::IncompatibleBean(
            type_name::<T>(),
        )) as ErrorPtr),
    }
}

/// Drives a freshly constructed instance through the initialization phases.
/// Failures abort the construction of this bean and propagate to the
/// requesting lookup.
pub(crate) fn initialize_bean(
    definition: &BeanDefinition,
    mut instance: BeanInstanceAnyPtr,
    processors: &[BeanPostProcessorPtr],
    container: &BeanContainer,
    environment: &dyn Environment,
    record: &mut dyn FnMut(LifecycleState),
) -> Result<BeanInstanceAnyPtr, LifecycleError> {
    let name = &definition.name;

    if let Some(aware) = &definition.aware.bean_name {
        aware(&instance, name);
    }
    if let Some(aware) = &definition.aware.container {
        aware(&instance, container);
    }
    if let Some(aware) = &definition.aware.value_resolver {
        aware(&instance, environment);
    }
    record(LifecycleState::ContextInjected);

    for processor in processors {
        instance = processor
            .before_init(name, instance)
            .map_err(|cause| LifecycleError::PostProcessor {
                name: name.clone(),
                cause,
            })?;
    }
    record(LifecycleState::PreInitialized);

    if let Some(init) = &definition.init {
        init(&instance).map_err(|cause| LifecycleError::InitHook {
            name: name.clone(),
            cause,
        })?;
    }
    record(LifecycleState::Initialized);

    for processor in processors {
        instance = processor
            .after_init(name, instance)
            .map_err(|cause| LifecycleError::PostProcessor {
                name: name.clone(),
                cause,
            })?;
    }
    record(LifecycleState::PostInitialized);

    Ok(instance)
}
