//! The bean container: creates and serves bean instances based on the
//! definitions discovered during the build phase.
//!
//! A [BeanContainer] is created by a [BeanContainerBuilder], which scans the
//! declared sources and imports, registers the surviving definitions and
//! eagerly instantiates non-lazy singletons. The built container is
//! immutable apart from instance caches and can be cheaply cloned and shared
//! between threads.

use crate::bean_registry::{BeanDefinition, BeanDefinitionRegistry};
use crate::environment::{Environment, SystemEnvironment};
use crate::error::{BeanResolutionError, ContainerBuildError, LifecycleError, TeardownError};
use crate::instance_provider::{
    apply_cast, BeanInstanceAnyPtr, BeanInstancePtr, BeanInstanceProvider, CastFunction,
};
use crate::lifecycle::{initialize_bean, BeanPostProcessor, BeanPostProcessorPtr, LifecycleState};
use crate::resolver::{select_candidate, ResolutionStack};
use crate::scanner::{
    BeanDescriptor, CandidateFilter, ComponentScanner, ComponentSource, Import, ImportMetadata,
};
use crate::scope::{
    run_destruction_callbacks, PrototypeScope, ScopePtr, SingletonScope, PROTOTYPE, SINGLETON,
};
use derivative::Derivative;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::any::TypeId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Name prefix addressing the factory object of a factory bean itself,
/// instead of the product the factory manages.
pub const FACTORY_BEAN_PREFIX: &str = "&";

#[derive(Derivative)]
#[derivative(Debug)]
struct ContainerInner {
    registry: BeanDefinitionRegistry,

    #[derivative(Debug = "ignore")]
    environment: Arc<dyn Environment>,

    // sorted ascending by order at build time
    #[derivative(Debug = "ignore")]
    processors: Vec<BeanPostProcessorPtr>,

    #[derivative(Debug = "ignore")]
    scopes: RwLock<FxHashMap<String, ScopePtr>>,

    #[derivative(Debug = "ignore")]
    singletons: Arc<SingletonScope>,

    states: Mutex<FxHashMap<String, LifecycleState>>,
    closed: AtomicBool,
}

/// Shareable handle to a built container. All lookups are `&self` and safe
/// to call concurrently; singleton construction is serialized per bean name.
#[derive(Clone, Debug)]
pub struct BeanContainer {
    inner: Arc<ContainerInner>,
}

impl BeanContainer {
    /// Returns the bean with the given name, cast to the requested type.
    /// For factory beans the plain name yields the product, while the
    /// [FACTORY_BEAN_PREFIX]ed form yields the factory object itself.
    pub fn get_bean<T: ?Sized + 'static>(
        &self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.with_resolution(|ctx| ctx.instance_by_name(name, TypeId::of::<T>()))
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    /// Returns the single instance for the given type: the sole candidate or
    /// the one flagged primary.
    pub fn primary_bean<T: ?Sized + 'static>(
        &self,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.with_resolution(|ctx| ctx.primary_instance(TypeId::of::<T>()))
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    /// Returns the instance for the given type whose definition declares the
    /// given qualifier.
    pub fn qualified_bean<T: ?Sized + 'static>(
        &self,
        qualifier: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.with_resolution(|ctx| ctx.qualified_instance(TypeId::of::<T>(), qualifier))
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    /// Like [primary_bean](Self::primary_bean), but an absent candidate
    /// yields `None` instead of an error. Ambiguity is still an error.
    pub fn optional_bean<T: ?Sized + 'static>(
        &self,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanResolutionError> {
        self.with_resolution(|ctx| ctx.optional_instance(TypeId::of::<T>()))?
            .map(|(instance, cast)| apply_cast::<T>(instance, cast))
            .transpose()
    }

    /// Returns all beans registered for the given type with their names, in
    /// registration order.
    pub fn beans_of_type<T: ?Sized + 'static>(
        &self,
    ) -> Result<Vec<(String, BeanInstancePtr<T>)>, BeanResolutionError> {
        let type_id = TypeId::of::<T>();
        let names = self.inner.registry.names_for_type(type_id).to_vec();

        names
            .into_iter()
            .map(|name| {
                self.with_resolution(|ctx| ctx.instance_by_name(&name, type_id))
                    .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
                    .map(|instance| (name, instance))
            })
            .try_collect()
    }

    /// Names of all definitions providing the given type, in registration
    /// order, without instantiating anything.
    pub fn bean_names_for_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        self.inner
            .registry
            .names_for_type(TypeId::of::<T>())
            .to_vec()
    }

    /// Names of all registered definitions, in registration order.
    pub fn bean_definition_names(&self) -> &[String] {
        self.inner.registry.definition_names()
    }

    /// Registers an additional scope under the given name. Definitions can
    /// refer to custom scopes before those are registered, as long as the
    /// scope exists by the time an instance is first requested.
    pub fn register_scope<N: ToString>(&self, name: N, scope: ScopePtr) {
        self.inner
            .scopes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), scope);
    }

    /// Last observed lifecycle state of the bean stored under the given
    /// name, for diagnostics. `None` for names never defined.
    pub fn lifecycle_state(&self, name: &str) -> Option<LifecycleState> {
        self.inner
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Closes the container: runs destroy hooks of tracked singletons in
    /// reverse construction order and rejects subsequent lookups. Closing is
    /// idempotent; only the first call performs teardown.
    pub fn close(&self) -> Result<(), TeardownError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing bean container");

        let constructed = self.inner.singletons.instance_names();
        {
            let mut states = self
                .inner
                .states
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for name in constructed {
                states.insert(name, LifecycleState::Destroyed);
            }
        }

        let callbacks = self.inner.singletons.drain_for_teardown();
        let result = run_destruction_callbacks(callbacks);

        if let Err(error) = &result {
            warn!(
                failures = error.failures.len(),
                "Container teardown completed with failing destroy hooks"
            );
        }

        result
    }

    fn with_resolution<R>(
        &self,
        resolve: impl FnOnce(&mut ResolutionCtx) -> Result<R, BeanResolutionError>,
    ) -> Result<R, BeanResolutionError> {
        let mut stack = ResolutionStack::default();
        let mut ctx = ResolutionCtx {
            container: self,
            stack: &mut stack,
        };

        resolve(&mut ctx)
    }

    /// Resolves the instance stored under the given name, creating it (and
    /// its dependency subtree) when its scope holds none yet.
    fn resolve_named(
        &self,
        name: &str,
        stack: &mut ResolutionStack,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BeanResolutionError::ContainerClosed);
        }

        let (base_name, wants_factory) = match name.strip_prefix(FACTORY_BEAN_PREFIX) {
            Some(base_name) => (base_name, true),
            None => (name, false),
        };

        let definition = self
            .inner
            .registry
            .definition(base_name)
            .ok_or_else(|| BeanResolutionError::NoSuchBean(name.to_string()))?;

        match (&definition.factory_product, wants_factory) {
            (None, true) => Err(BeanResolutionError::NotAFactoryBean(base_name.to_string())),
            // a plain bean, or the factory object addressed explicitly: the
            // full construction pipeline applies
            (None, false) | (Some(_), true) => {
                stack.enter(name)?;
                let scope = self.scope_for(definition)?;

                let result = {
                    let mut factory = || self.construct(definition, name, &scope, stack);
                    scope.get(name, &mut factory)
                };

                stack.exit();
                result
            }
            // the factory's product: build (or reuse) the factory object
            // first, then ask it to produce; the product only passes through
            // after-init post-processing
            (Some(product), false) => {
                let produce = product.produce.clone();

                stack.enter(name)?;
                let scope = self.scope_for(definition)?;

                let result = {
                    let mut factory = || {
                        let factory_name = [FACTORY_BEAN_PREFIX, base_name].concat();
                        let factory_instance = self.resolve_named(&factory_name, stack)?;

                        let mut instance = {
                            let mut ctx = ResolutionCtx {
                                container: self,
                                stack,
                            };
                            produce(&factory_instance, &mut ctx)?
                        };

                        for processor in &self.inner.processors {
                            instance = processor.after_init(base_name, instance).map_err(
                                |cause| LifecycleError::PostProcessor {
                                    name: base_name.to_string(),
                                    cause,
                                },
                            )?;
                        }

                        Ok(instance)
                    };

                    scope.get(name, &mut factory)
                };

                stack.exit();
                result
            }
        }
    }

    /// Runs the full construction pipeline for one instance: constructor,
    /// context-aware injection, post-processing, init hook, destruction
    /// callback registration.
    fn construct(
        &self,
        definition: &BeanDefinition,
        scope_key: &str,
        scope: &ScopePtr,
        stack: &mut ResolutionStack,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError> {
        debug!(
            name = scope_key,
            bean_type = definition.type_name,
            "Creating bean instance"
        );
        self.record_state(scope_key, LifecycleState::Instantiated);

        let instance = {
            let mut ctx = ResolutionCtx {
                container: self,
                stack,
            };
            (definition.constructor)(&mut ctx)?
        };

        let mut record = |state| self.record_state(scope_key, state);
        let instance = initialize_bean(
            definition,
            instance,
            &self.inner.processors,
            self,
            self.inner.environment.as_ref(),
            &mut record,
        )?;

        if let Some(destroy) = &definition.destroy {
            let destroy = destroy.clone();
            let target = instance.clone();
            scope.register_destruction_callback(scope_key, Box::new(move || destroy(&target)));
        }

        self.record_state(scope_key, LifecycleState::Ready);
        Ok(instance)
    }

    fn scope_for(&self, definition: &BeanDefinition) -> Result<ScopePtr, BeanResolutionError> {
        self.inner
            .scopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&definition.scope)
            .cloned()
            .ok_or_else(|| BeanResolutionError::UnrecognizedScope(definition.scope.clone()))
    }

    fn record_state(&self, name: &str, state: LifecycleState) {
        self.inner
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), state);
    }
}

/// One logical lookup in progress: a provider handed to bean constructors,
/// threading the cycle-detection stack through recursive construction.
struct ResolutionCtx<'a> {
    container: &'a BeanContainer,
    stack: &'a mut ResolutionStack,
}

impl BeanInstanceProvider for ResolutionCtx<'_> {
    fn primary_instance(
        &mut self,
        type_id: TypeId,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError> {
        let (name, cast) = {
            let definition = select_candidate(&self.container.inner.registry, type_id, None)?;
            let cast = definition
                .cast_for(type_id)
                .ok_or(BeanResolutionError::IncompatibleBean(definition.type_name))?;
            (definition.name.clone(), cast)
        };

        self.container
            .resolve_named(&name, self.stack)
            .map(|instance| (instance, cast))
    }

    fn qualified_instance(
        &mut self,
        type_id: TypeId,
        qualifier: &str,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError> {
        let (name, cast) = {
            let definition =
                select_candidate(&self.container.inner.registry, type_id, Some(qualifier))?;
            let cast = definition
                .cast_for(type_id)
                .ok_or(BeanResolutionError::IncompatibleBean(definition.type_name))?;
            (definition.name.clone(), cast)
        };

        self.container
            .resolve_named(&name, self.stack)
            .map(|instance| (instance, cast))
    }

    fn instances(
        &mut self,
        type_id: TypeId,
    ) -> Result<Vec<(BeanInstanceAnyPtr, CastFunction)>, BeanResolutionError> {
        let candidates: Vec<(String, CastFunction)> = {
            let registry = &self.container.inner.registry;
            registry
                .names_for_type(type_id)
                .iter()
                .filter_map(|name| registry.definition(name))
                .map(|definition| {
                    definition
                        .cast_for(type_id)
                        .ok_or(BeanResolutionError::IncompatibleBean(definition.type_name))
                        .map(|cast| (definition.name.clone(), cast))
                })
                .try_collect()?
        };

        candidates
            .into_iter()
            .map(|(name, cast)| {
                self.container
                    .resolve_named(&name, self.stack)
                    .map(|instance| (instance, cast))
            })
            .try_collect()
    }

    fn instance_by_name(
        &mut self,
        name: &str,
        type_id: TypeId,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError> {
        let base_name = name.strip_prefix(FACTORY_BEAN_PREFIX).unwrap_or(name);

        let cast = {
            let definition = self
                .container
                .inner
                .registry
                .definition(base_name)
                .ok_or_else(|| BeanResolutionError::NoSuchBean(name.to_string()))?;

            if base_name == name {
                definition
                    .cast_for(type_id)
                    .ok_or(BeanResolutionError::IncompatibleBean(definition.type_name))?
            } else if definition.type_id == type_id {
                // factory objects are addressed by their concrete type only
                definition.cast
            } else {
                return Err(BeanResolutionError::IncompatibleBean(definition.type_name));
            }
        };

        self.container
            .resolve_named(name, self.stack)
            .map(|instance| (instance, cast))
    }

    fn optional_instance(
        &mut self,
        type_id: TypeId,
    ) -> Result<Option<(BeanInstanceAnyPtr, CastFunction)>, BeanResolutionError> {
        match self.primary_instance(type_id) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(BeanResolutionError::NoCandidate(..)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Builder assembling a [BeanContainer]: declares sources, filters, imports,
/// post-processors and scopes, then builds the container in one atomic
/// refresh. Build failures never yield a partial container.
#[derive(Default)]
pub struct BeanContainerBuilder {
    environment: Option<Arc<dyn Environment>>,
    scanner: ComponentScanner,
    processors: Vec<BeanPostProcessorPtr>,
    scopes: FxHashMap<String, ScopePtr>,
}

impl BeanContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment used for conditions, placeholder resolution and
    /// value-resolver injection. Defaults to [SystemEnvironment].
    pub fn with_environment<E: Environment + 'static>(mut self, environment: E) -> Self {
        self.environment = Some(Arc::new(environment));
        self
    }

    pub fn with_source<S: ComponentSource + 'static>(mut self, source: S) -> Self {
        self.scanner = self.scanner.with_source(source);
        self
    }

    pub fn with_include_filter<F: CandidateFilter + 'static>(mut self, filter: F) -> Self {
        self.scanner = self.scanner.with_include_filter(filter);
        self
    }

    pub fn with_exclude_filter<F: CandidateFilter + 'static>(mut self, filter: F) -> Self {
        self.scanner = self.scanner.with_exclude_filter(filter);
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.scanner = self.scanner.with_import(import);
        self
    }

    pub fn with_import_metadata(mut self, metadata: ImportMetadata) -> Self {
        self.scanner = self.scanner.with_import_metadata(metadata);
        self
    }

    /// Shorthand for directly importing a single descriptor, bypassing
    /// filters but not conditions.
    pub fn register(self, descriptor: BeanDescriptor) -> Self {
        self.with_import(Import::Definition(descriptor))
    }

    pub fn with_post_processor<P: BeanPostProcessor + Send + Sync + 'static>(
        mut self,
        processor: P,
    ) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Registers a custom scope available to definitions by name. The
    /// [SINGLETON] and [PROTOTYPE] names are reserved.
    pub fn with_scope<N: ToString>(mut self, name: N, scope: ScopePtr) -> Self {
        self.scopes.insert(name.to_string(), scope);
        self
    }

    /// Builds the container: scans and registers definitions, then eagerly
    /// instantiates non-lazy singletons in registration order. For factory
    /// beans only the factory object is created eagerly - products stay lazy
    /// until first requested.
    pub fn build(self) -> Result<BeanContainer, ContainerBuildError> {
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(SystemEnvironment));

        let mut registry = BeanDefinitionRegistry::default();
        self.scanner.scan(&mut registry, environment.as_ref())?;

        let mut processors = self.processors;
        processors.sort_by_key(|processor| processor.order());

        let mut scopes = self.scopes;
        let singletons = Arc::new(SingletonScope::new());
        scopes.insert(SINGLETON.to_string(), singletons.clone() as ScopePtr);
        scopes.insert(PROTOTYPE.to_string(), Arc::new(PrototypeScope) as ScopePtr);

        let eager: Vec<String> = registry
            .definition_names()
            .iter()
            .filter_map(|name| registry.definition(name))
            .filter(|definition| definition.scope == SINGLETON && !definition.lazy)
            .map(|definition| match &definition.factory_product {
                Some(_) => [FACTORY_BEAN_PREFIX, &definition.name].concat(),
                None => definition.name.clone(),
            })
            .collect();

        let states = registry
            .definition_names()
            .iter()
            .map(|name| (name.clone(), LifecycleState::ConditionChecked))
            .collect();

        let definitions = registry.definition_names().len();
        let container = BeanContainer {
            inner: Arc::new(ContainerInner {
                registry,
                environment,
                processors,
                scopes: RwLock::new(scopes),
                singletons,
                states: Mutex::new(states),
                closed: AtomicBool::new(false),
            }),
        };

        for name in eager {
            debug!(%name, "Eagerly instantiating singleton");

            let mut stack = ResolutionStack::default();
            container
                .resolve_named(&name, &mut stack)
                .map_err(|cause| ContainerBuildError::EagerInit {
                    name: name.clone(),
                    cause,
                })?;
        }

        info!(definitions, "Bean container ready");
        Ok(container)
    }
}
