//! Discovery of candidate bean definitions from declared sources and
//! programmatic imports.
//!
//! A [ComponentScanner] enumerates [BeanDescriptor]s from its
//! [ComponentSource]s, filters them through include/exclude
//! [CandidateFilter]s, gates them through registration
//! [conditions](crate::bean_registry::conditional) and writes the survivors
//! into the [BeanDefinitionRegistry]. Declared [Import]s run afterwards, in
//! declaration order, so later imports observe definitions written by
//! earlier ones.

use crate::bean_registry::conditional::{Condition, ConditionContext};
use crate::bean_registry::{
    BeanCapability, BeanConstructor, BeanDefinition, BeanDefinitionRegistry, FactoryProduct,
    LifecycleCallback, ProduceFunction,
};
use crate::environment::Environment;
use crate::error::{BeanResolutionError, ContainerBuildError};
use crate::instance_provider::{
    default_cast, BeanInstanceAnyPtr, BeanInstancePtr, BeanInstanceProvider, CastFunction,
    ErrorPtr,
};
use crate::lifecycle::{BeanNameAwareFn, ContainerAwareFn, ValueResolverAwareFn};
use derivative::Derivative;
use derive_more::Constructor;
use fxhash::FxHashMap;
use std::any::{type_name, Any, TypeId};
use std::sync::Arc;
use tracing::debug;

/// Declared unit of configuration: a [BeanDefinition] in the making, along
/// with the structural metadata (markers, resource location, registration
/// conditions) the scanner needs to decide whether the definition ever
/// becomes active. Descriptors are constructed statically by configuration
/// code - the container performs no runtime introspection.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDescriptor {
    definition: BeanDefinition,
    markers: Vec<String>,
    location: Option<String>,

    #[derivative(Debug = "ignore")]
    conditions: Vec<Arc<dyn Condition>>,
}

impl BeanDescriptor {
    /// Creates a descriptor for a bean of type `T` produced by the given
    /// constructor, with defaults matching a plain singleton bean.
    pub fn new<T, N, C>(name: N, constructor: C) -> Self
    where
        T: Any + Send + Sync,
        N: ToString,
        C: Fn(&mut dyn BeanInstanceProvider) -> Result<T, BeanResolutionError>
            + Send
            + Sync
            + 'static,
    {
        let constructor: BeanConstructor = Arc::new(move |provider| {
            constructor(provider).map(|bean| BeanInstancePtr::new(bean) as BeanInstanceAnyPtr)
        });

        Self {
            definition: BeanDefinition::new(
                name,
                TypeId::of::<T>(),
                type_name::<T>(),
                constructor,
                default_cast::<T>,
            ),
            markers: vec![],
            location: None,
            conditions: vec![],
        }
    }

    pub fn with_scope<S: ToString>(mut self, scope: S) -> Self {
        self.definition.scope = scope.to_string();
        self
    }

    /// Defers instantiation of a singleton to its first lookup instead of
    /// the container refresh.
    pub fn lazy(mut self) -> Self {
        self.definition.lazy = true;
        self
    }

    /// Marks this bean as the primary candidate among multiple beans of its
    /// type.
    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    pub fn with_qualifier<Q: ToString>(mut self, qualifier: Q) -> Self {
        self.definition.qualifiers.push(qualifier.to_string());
        self
    }

    /// Declares an init hook, run exactly once after pre-initialization
    /// post-processing. See [typed_hook](crate::lifecycle::typed_hook) for
    /// adapting strongly-typed hooks.
    pub fn with_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanInstanceAnyPtr) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.definition.init = Some(Arc::new(hook) as LifecycleCallback);
        self
    }

    /// Declares a destroy hook, run when the owning scope ends.
    pub fn with_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&BeanInstanceAnyPtr) -> Result<(), ErrorPtr> + Send + Sync + 'static,
    {
        self.definition.destroy = Some(Arc::new(hook) as LifecycleCallback);
        self
    }

    /// Declares an additional capability (typically a `dyn Trait`) this bean
    /// can be retrieved as. See [bean_capability_cast](crate::bean_capability_cast)
    /// for building the cast.
    pub fn with_capability<T: ?Sized + 'static>(mut self, cast: CastFunction) -> Self {
        self.definition.capabilities.push(BeanCapability {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            cast,
        });
        self
    }

    /// Adds a registration condition. All conditions must pass, in
    /// declaration order, for the definition to be registered.
    pub fn with_condition<C: Condition + 'static>(mut self, condition: C) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Attaches a structural marker filters can match on.
    pub fn with_marker<M: ToString>(mut self, marker: M) -> Self {
        self.markers.push(marker.to_string());
        self
    }

    /// Attaches the resource location this descriptor was declared at.
    pub fn at_location<L: ToString>(mut self, location: L) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Declares a callback receiving the name the bean was registered under.
    pub fn aware_of_bean_name<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BeanInstanceAnyPtr, &str) + Send + Sync + 'static,
    {
        self.definition.aware.bean_name = Some(Arc::new(callback) as BeanNameAwareFn);
        self
    }

    /// Declares a callback receiving a handle to the owning container.
    pub fn aware_of_container<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BeanInstanceAnyPtr, &crate::factory::BeanContainer) + Send + Sync + 'static,
    {
        self.definition.aware.container = Some(Arc::new(callback) as ContainerAwareFn);
        self
    }

    /// Declares a callback receiving the environment for placeholder
    /// resolution.
    pub fn aware_of_value_resolver<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BeanInstanceAnyPtr, &dyn Environment) + Send + Sync + 'static,
    {
        self.definition.aware.value_resolver =
            Some(Arc::new(callback) as ValueResolverAwareFn);
        self
    }

    /// Turns this bean into a factory bean: the constructed instance of type
    /// `F` is only an intermediate factory, asked for the actual product of
    /// type `P` via the given function. Plain-name lookups return the
    /// product; the factory stays addressable through the raw name form.
    pub fn producing<F, P, C>(mut self, produce: C) -> Self
    where
        F: Any + Send + Sync,
        P: Any + Send + Sync,
        C: Fn(&F, &mut dyn BeanInstanceProvider) -> Result<P, BeanResolutionError>
            + Send
            + Sync
            + 'static,
    {
        let produce: ProduceFunction = Arc::new(move |factory, provider| {
            let factory = factory
                .downcast_ref::<F>()
                .ok_or(BeanResolutionError::IncompatibleBean(type_name::<F>()))?;

            produce(factory, provider)
                .map(|product| BeanInstancePtr::new(product) as BeanInstanceAnyPtr)
        });

        self.definition.factory_product = Some(FactoryProduct {
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
            cast: default_cast::<P>,
            produce,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub(crate) fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    /// Extracts the final definition, discarding scan-time metadata.
    pub fn into_definition(self) -> BeanDefinition {
        self.definition
    }
}

/// Source of candidate descriptors, e.g. one configuration module.
pub trait ComponentSource: Send + Sync {
    fn candidates(&self) -> Vec<BeanDescriptor>;
}

impl ComponentSource for Vec<BeanDescriptor> {
    fn candidates(&self) -> Vec<BeanDescriptor> {
        self.clone()
    }
}

/// Predicate over a candidate's structural metadata, used for include and
/// exclude filtering during scanning.
pub trait CandidateFilter: Send + Sync {
    fn matches(&self, candidate: &BeanDescriptor) -> bool;
}

impl<F> CandidateFilter for F
where
    F: Fn(&BeanDescriptor) -> bool + Send + Sync,
{
    fn matches(&self, candidate: &BeanDescriptor) -> bool {
        self(candidate)
    }
}

/// Filter matching candidates carrying the given marker.
#[derive(Clone, Debug, Constructor)]
pub struct MarkerFilter {
    marker: String,
}

impl CandidateFilter for MarkerFilter {
    fn matches(&self, candidate: &BeanDescriptor) -> bool {
        candidate.markers().iter().any(|marker| *marker == self.marker)
    }
}

/// Filter matching candidates declared under the given location prefix.
#[derive(Clone, Debug, Constructor)]
pub struct LocationFilter {
    prefix: String,
}

impl CandidateFilter for LocationFilter {
    fn matches(&self, candidate: &BeanDescriptor) -> bool {
        candidate
            .location()
            .map(|location| location.starts_with(&self.prefix))
            .unwrap_or(false)
    }
}

/// Metadata of the importing context, handed to selectors and registrars.
#[derive(Clone, Debug, Default, Constructor)]
pub struct ImportMetadata {
    /// Name of the importing configuration unit.
    pub importer: String,

    /// Markers declared by the importing unit.
    pub markers: Vec<String>,
}

/// Returns names of additional candidates to import, enabling conditional,
/// metadata-driven import lists. Returned names must refer to candidates
/// known to the scanner (source candidates or direct imports).
pub trait ImportSelector: Send + Sync {
    fn select(&self, metadata: &ImportMetadata) -> Vec<String>;
}

/// Registers arbitrary definitions programmatically, with full access to the
/// registry built so far - including definitions written by earlier imports
/// in the same import list.
pub trait ImportRegistrar: Send + Sync {
    fn register(
        &self,
        metadata: &ImportMetadata,
        registry: &mut BeanDefinitionRegistry,
    ) -> Result<(), ErrorPtr>;
}

/// A declared import, applied after source scanning. Imports bypass
/// include/exclude filters but direct and selector imports are still gated
/// by their descriptors' conditions.
#[derive(Clone)]
pub enum Import {
    /// Registers the descriptor as if discovered by scanning.
    Definition(BeanDescriptor),
    Selector(Arc<dyn ImportSelector>),
    Registrar(Arc<dyn ImportRegistrar>),
}

/// Discovers candidate definitions and writes them into a
/// [BeanDefinitionRegistry]. Scanning is single-threaded by contract and
/// happens once, during the container refresh; any error aborts the whole
/// build.
#[derive(Default)]
pub struct ComponentScanner {
    sources: Vec<Box<dyn ComponentSource>>,
    include_filters: Vec<Box<dyn CandidateFilter>>,
    exclude_filters: Vec<Box<dyn CandidateFilter>>,
    imports: Vec<Import>,
    import_metadata: ImportMetadata,
}

impl ComponentScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S: ComponentSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Adds an include filter. With at least one include filter present,
    /// only candidates matching some include filter are considered.
    pub fn with_include_filter<F: CandidateFilter + 'static>(mut self, filter: F) -> Self {
        self.include_filters.push(Box::new(filter));
        self
    }

    /// Adds an exclude filter. A matching exclude filter always drops the
    /// candidate, even when an include filter matched it.
    pub fn with_exclude_filter<F: CandidateFilter + 'static>(mut self, filter: F) -> Self {
        self.exclude_filters.push(Box::new(filter));
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_import_metadata(mut self, metadata: ImportMetadata) -> Self {
        self.import_metadata = metadata;
        self
    }

    /// Runs the scan: source candidates through filters and conditions,
    /// then imports in declaration order.
    pub fn scan(
        &self,
        registry: &mut BeanDefinitionRegistry,
        environment: &dyn Environment,
    ) -> Result<(), ContainerBuildError> {
        let catalog: FxHashMap<String, BeanDescriptor> = self
            .sources
            .iter()
            .flat_map(|source| source.candidates())
            .chain(self.imports.iter().filter_map(|import| match import {
                Import::Definition(descriptor) => Some(descriptor.clone()),
                _ => None,
            }))
            .map(|descriptor| (descriptor.name().to_string(), descriptor))
            .collect();

        for source in &self.sources {
            for candidate in source.candidates() {
                if !self.passes_filters(&candidate) {
                    debug!(name = candidate.name(), "Candidate dropped by filters");
                    continue;
                }

                Self::register_gated(registry, environment, candidate)?;
            }
        }

        for import in &self.imports {
            match import {
                Import::Definition(descriptor) => {
                    Self::register_gated(registry, environment, descriptor.clone())?;
                }
                Import::Selector(selector) => {
                    for name in selector.select(&self.import_metadata) {
                        let descriptor = catalog
                            .get(&name)
                            .cloned()
                            .ok_or(ContainerBuildError::UnknownImport(name))?;

                        Self::register_gated(registry, environment, descriptor)?;
                    }
                }
                Import::Registrar(registrar) => {
                    registrar
                        .register(&self.import_metadata, registry)
                        .map_err(ContainerBuildError::Registrar)?;
                }
            }
        }

        Ok(())
    }

    fn passes_filters(&self, candidate: &BeanDescriptor) -> bool {
        if !self.include_filters.is_empty()
            && !self
                .include_filters
                .iter()
                .any(|filter| filter.matches(candidate))
        {
            return false;
        }

        // exclude always wins over include
        !self
            .exclude_filters
            .iter()
            .any(|filter| filter.matches(candidate))
    }

    fn register_gated(
        registry: &mut BeanDefinitionRegistry,
        environment: &dyn Environment,
        descriptor: BeanDescriptor,
    ) -> Result<(), ContainerBuildError> {
        let passed = {
            let context = ConditionContext::new(&*registry, environment);

            let mut passed = true;
            for condition in descriptor.conditions() {
                match condition.matches(&context) {
                    Ok(true) => {}
                    Ok(false) => {
                        passed = false;
                        break;
                    }
                    Err(cause) => {
                        return Err(ContainerBuildError::ConditionEvaluation {
                            name: descriptor.name().to_string(),
                            cause,
                        })
                    }
                }
            }

            passed
        };

        if !passed {
            debug!(
                name = descriptor.name(),
                "Skipping bean definition with unmet condition"
            );
            return Ok(());
        }

        debug!(name = descriptor.name(), "Registering bean definition");
        registry.register(descriptor.into_definition())?;

        Ok(())
    }
}
