//! Functionality related to registering definitions of beans. The
//! [container](crate::factory) creates instances based on those definitions,
//! which are written by the [scanner](crate::scanner) during the refresh
//! phase or registered programmatically by import registrars.

pub mod conditional;

use crate::bean_registry::conditional::BeanDefinitionRegistryFacade;
use crate::error::{BeanRegistryError, BeanResolutionError};
use crate::instance_provider::{
    BeanInstanceAnyPtr, BeanInstanceProvider, CastFunction, ErrorPtr,
};
use crate::lifecycle::AwareCallbacks;
use crate::scope::SINGLETON;
use derivative::Derivative;
use fxhash::FxHashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Constructor for type-erased bean instances. Receives a
/// [BeanInstanceProvider] for resolving dependencies of the constructed
/// bean.
pub type BeanConstructor = Arc<
    dyn Fn(&mut dyn BeanInstanceProvider) -> Result<BeanInstanceAnyPtr, BeanResolutionError>
        + Send
        + Sync,
>;

/// Lifecycle hook invoked with the type-erased instance, e.g. an init or
/// destroy method.
pub type LifecycleCallback =
    Arc<dyn Fn(&BeanInstanceAnyPtr) -> Result<(), ErrorPtr> + Send + Sync>;

/// Second creation phase of a factory bean: asks the already-built factory
/// instance for the actual product.
pub type ProduceFunction = Arc<
    dyn Fn(
            &BeanInstanceAnyPtr,
            &mut dyn BeanInstanceProvider,
        ) -> Result<BeanInstanceAnyPtr, BeanResolutionError>
        + Send
        + Sync,
>;

/// An interface-like capability a bean declares beyond its concrete type,
/// making the bean retrievable as `dyn Trait`.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanCapability {
    pub type_id: TypeId,
    pub type_name: &'static str,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,
}

/// Metadata of the product of a factory bean. A definition carrying this
/// descriptor produces its managed value in two phases: first the factory
/// instance is built, then the factory is asked for the product. Plain-name
/// lookups return the product; the factory itself stays addressable through
/// the [FACTORY_BEAN_PREFIX](crate::factory::FACTORY_BEAN_PREFIX) name form.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct FactoryProduct {
    pub type_id: TypeId,
    pub type_name: &'static str,

    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,

    #[derivative(Debug = "ignore")]
    pub produce: ProduceFunction,
}

/// Definition for a bean registered in a [BeanDefinitionRegistry]. This is
/// the single source of truth consumed by all other parts of the container -
/// registration conditions have already been checked by the time a
/// definition exists.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDefinition {
    /// Unique name of the bean within its registry.
    pub name: String,

    /// Type of the constructed instance. For factory beans this is the type
    /// of the factory object, not the product.
    pub type_id: TypeId,
    pub type_name: &'static str,

    #[derivative(Debug = "ignore")]
    pub constructor: BeanConstructor,

    /// Cast for the concrete constructed type.
    #[derivative(Debug = "ignore")]
    pub cast: CastFunction,

    /// Additional capabilities the bean (or its factory product) can be
    /// retrieved as.
    pub capabilities: Vec<BeanCapability>,

    /// Name of the scope owning instances of this bean.
    pub scope: String,

    /// Lazy singletons are not instantiated eagerly during the container
    /// refresh.
    pub lazy: bool,

    /// With multiple beans registered for a given type, one of them can be
    /// marked as primary and returned when requesting a single instance.
    pub primary: bool,

    /// Qualifiers for explicit disambiguation between multiple candidates of
    /// one type.
    pub qualifiers: Vec<String>,

    #[derivative(Debug = "ignore")]
    pub init: Option<LifecycleCallback>,

    #[derivative(Debug = "ignore")]
    pub destroy: Option<LifecycleCallback>,

    #[derivative(Debug = "ignore")]
    pub aware: AwareCallbacks,

    /// Present for factory beans; see [FactoryProduct].
    pub factory_product: Option<FactoryProduct>,
}

impl BeanDefinition {
    /// Creates a definition with defaults matching a plain singleton bean:
    /// singleton scope, eager, not primary, no qualifiers, no hooks.
    pub fn new<T: ToString>(
        name: T,
        type_id: TypeId,
        type_name: &'static str,
        constructor: BeanConstructor,
        cast: CastFunction,
    ) -> Self {
        Self {
            name: name.to_string(),
            type_id,
            type_name,
            constructor,
            cast,
            capabilities: vec![],
            scope: SINGLETON.to_string(),
            lazy: false,
            primary: false,
            qualifiers: vec![],
            init: None,
            destroy: None,
            aware: AwareCallbacks::default(),
            factory_product: None,
        }
    }

    /// Type under which this definition is indexed for by-type lookups: the
    /// product type for factory beans, the concrete type otherwise.
    pub fn provided_type(&self) -> (TypeId, &'static str) {
        match &self.factory_product {
            Some(product) => (product.type_id, product.type_name),
            None => (self.type_id, self.type_name),
        }
    }

    /// Returns the cast converting the provided instance to the given type,
    /// if this definition can satisfy it.
    pub fn cast_for(&self, type_id: TypeId) -> Option<CastFunction> {
        let (provided, _) = self.provided_type();
        if provided == type_id {
            return Some(match &self.factory_product {
                Some(product) => product.cast,
                None => self.cast,
            });
        }

        self.capabilities
            .iter()
            .find(|capability| capability.type_id == type_id)
            .map(|capability| capability.cast)
    }
}

/// A registry of bean definitions, keyed by unique name, with a reverse
/// index from provided types to candidate names. Enumeration order equals
/// registration order, for deterministic lookups and lifecycle ordering.
/// The registry is mutated only during the scan/import phase and is
/// effectively immutable once the container is built.
#[derive(Default, Derivative, Clone)]
#[derivative(Debug)]
pub struct BeanDefinitionRegistry {
    definitions: FxHashMap<String, BeanDefinition>,
    names: Vec<String>,
    types: FxHashMap<TypeId, Vec<String>>,
}

impl BeanDefinitionRegistry {
    /// Adds a new definition, failing on duplicate names.
    pub fn register(&mut self, definition: BeanDefinition) -> Result<(), BeanRegistryError> {
        if self.definitions.contains_key(&definition.name) {
            return Err(BeanRegistryError::DuplicateBeanName(definition.name));
        }

        let name = definition.name.clone();
        let (provided_type, _) = definition.provided_type();

        self.types.entry(provided_type).or_default().push(name.clone());
        for capability in &definition.capabilities {
            self.types
                .entry(capability.type_id)
                .or_default()
                .push(name.clone());
        }

        self.names.push(name.clone());
        self.definitions.insert(name, definition);

        Ok(())
    }

    /// Returns the definition with the given name.
    pub fn definition(&self, name: &str) -> Option<&BeanDefinition> {
        self.definitions.get(name)
    }

    /// Returns the names of all candidates providing the given type, in
    /// registration order.
    pub fn names_for_type(&self, type_id: TypeId) -> &[String] {
        self.types
            .get(&type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Checks if there's a definition with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Returns all registered names in registration order.
    pub fn definition_names(&self) -> &[String] {
        &self.names
    }
}

impl BeanDefinitionRegistryFacade for BeanDefinitionRegistry {
    #[inline]
    fn contains_definition(&self, name: &str) -> bool {
        self.contains(name)
    }

    #[inline]
    fn is_type_registered(&self, type_id: TypeId) -> bool {
        !self.names_for_type(type_id).is_empty()
    }
}
