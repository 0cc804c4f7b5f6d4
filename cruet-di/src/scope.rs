//! Bean instances are owned by [Scope]s - strategies which decide when to
//! reuse or create an instance and how long each one lives. There's a global
//! one for singletons and a trivial one for prototypes, but custom scopes
//! can tie instance lifetimes to external factors, e.g. a logical thread of
//! control.
//!
//! Note: scope resolution happens at bean instantiation time, which can lead
//! to unexpected consequences if incompatible scopes are mixed together,
//! e.g. a [singleton](SINGLETON) bean can depend on a [prototype](PROTOTYPE)
//! one. The prototype instance is created fresh when the singleton is built,
//! but then lives as long as the singleton does.

use crate::error::{BeanResolutionError, TeardownError};
use crate::instance_provider::{BeanInstanceAnyPtr, ErrorPtr};
use fxhash::FxHashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Name of the [SingletonScope].
pub const SINGLETON: &str = "SINGLETON";

/// Name of the [PrototypeScope].
pub const PROTOTYPE: &str = "PROTOTYPE";

/// Name of the [ThreadScope].
pub const THREAD: &str = "THREAD";

pub type ScopePtr = Arc<dyn Scope + Send + Sync>;

/// Factory creating a missing instance on behalf of a [Scope].
pub type InstanceFactory<'a> =
    &'a mut dyn FnMut() -> Result<BeanInstanceAnyPtr, BeanResolutionError>;

/// Callback destroying an instance when its owning scope ends.
pub type DestructionCallback = Box<dyn FnOnce() -> Result<(), ErrorPtr> + Send>;

/// A scope owning bean instances. See the module documentation for
/// information on scopes.
pub trait Scope {
    /// Returns the instance stored under the given name, invoking the
    /// factory to create it when absent. Whether the created instance is
    /// retained for subsequent calls is scope-dependent.
    fn get(
        &self,
        name: &str,
        factory: InstanceFactory<'_>,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError>;

    /// Removes and returns the instance stored under the given name, along
    /// with any destruction callback registered for it (the callback is
    /// dropped unrun - the caller takes over teardown).
    fn remove(&self, name: &str) -> Option<BeanInstanceAnyPtr>;

    /// Registers a callback to run when the scope (or the current
    /// conversation within it) ends. Scopes which don't track instances are
    /// free to ignore the registration.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// Identifies the current conversation within this scope, for
    /// diagnostics, e.g. the current thread for a thread-bound scope.
    /// Scopes with a single global conversation return `None`.
    fn conversation_id(&self) -> Option<String>;
}

pub(crate) fn run_destruction_callbacks(
    callbacks: Vec<(String, DestructionCallback)>,
) -> Result<(), TeardownError> {
    let mut failures = vec![];

    // last constructed, first destroyed, so dependencies outlive dependents
    for (name, callback) in callbacks.into_iter().rev() {
        debug!(%name, "Destroying bean instance");

        if let Err(error) = callback() {
            failures.push((name, error));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(TeardownError { failures })
    }
}

#[derive(Default)]
struct SingletonState {
    instances: FxHashMap<String, BeanInstanceAnyPtr>,
    construction_guards: FxHashMap<String, Arc<Mutex<()>>>,
}

/// Scope for instances shared between beans: the first `get` for a name
/// creates the instance, all subsequent ones return it. Concurrent first
/// `get` calls for one name serialize around a per-name guard, so at most
/// one construction happens, without serializing construction of unrelated
/// beans.
#[derive(Default)]
pub struct SingletonScope {
    state: Mutex<SingletonState>,
    destruction_callbacks: Mutex<Vec<(String, DestructionCallback)>>,
}

impl SingletonScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all registered destruction callbacks, in construction order,
    /// clearing the scope. Used by the container during teardown.
    pub(crate) fn drain_for_teardown(&self) -> Vec<(String, DestructionCallback)> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.instances.clear();
        state.construction_guards.clear();

        std::mem::take(
            &mut *self
                .destruction_callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Names of instances created so far, in no particular order.
    pub fn instance_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .instances
            .keys()
            .cloned()
            .collect()
    }
}

impl Scope for SingletonScope {
    fn get(
        &self,
        name: &str,
        factory: InstanceFactory<'_>,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError> {
        let guard = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(instance) = state.instances.get(name) {
                return Ok(instance.clone());
            }

            state
                .construction_guards
                .entry(name.to_string())
                .or_default()
                .clone()
        };

        // per-name acquisition guard: concurrent first-time lookups of the
        // same name wait here, while unrelated constructions proceed
        let _construction = guard.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(instance) = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .instances
            .get(name)
        {
            return Ok(instance.clone());
        }

        let instance = factory()?;

        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .instances
            .insert(name.to_string(), instance.clone());

        Ok(instance)
    }

    fn remove(&self, name: &str) -> Option<BeanInstanceAnyPtr> {
        self.destruction_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(callback_name, _)| callback_name != name);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.construction_guards.remove(name);
        state.instances.remove(name)
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        self.destruction_callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.to_string(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// A scope which creates a new instance on each request. Instances are not
/// retained and destruction callbacks are not tracked - the caller owns
/// teardown of prototype instances.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct PrototypeScope;

impl Scope for PrototypeScope {
    #[inline]
    fn get(
        &self,
        _name: &str,
        factory: InstanceFactory<'_>,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError> {
        factory()
    }

    #[inline]
    fn remove(&self, _name: &str) -> Option<BeanInstanceAnyPtr> {
        None
    }

    #[inline]
    fn register_destruction_callback(&self, _name: &str, _callback: DestructionCallback) {}

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// Source of the identifier of the current logical thread of control, used
/// by [ThreadScope] to key its instance caches. Keying by an explicit
/// provider instead of ambient thread identity keeps the scope portable to
/// cooperative-concurrency runtimes.
pub trait ContextIdProvider: Send + Sync {
    fn current_context_id(&self) -> String;
}

/// [ContextIdProvider] returning the identity of the current OS thread.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ThreadContextIdProvider;

impl ContextIdProvider for ThreadContextIdProvider {
    fn current_context_id(&self) -> String {
        let thread = std::thread::current();
        thread
            .name()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{:?}", thread.id()))
    }
}

#[derive(Default)]
struct ContextInstances {
    instances: FxHashMap<String, BeanInstanceAnyPtr>,
    destruction_callbacks: Vec<(String, DestructionCallback)>,
}

/// A scope maintaining one instance per logical thread of control: `get`
/// creates on first access within the current context and reuses thereafter
/// within the same context, while different contexts own disjoint
/// instances.
///
/// Destruction callbacks run when [end_context](Self::end_context) is
/// explicitly invoked for a context; contexts which simply cease to exist
/// never run their callbacks. This is a weaker guarantee than the one given
/// by [SingletonScope].
pub struct ThreadScope {
    context_ids: Arc<dyn ContextIdProvider>,
    contexts: Mutex<FxHashMap<String, ContextInstances>>,
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::with_context_ids(Arc::new(ThreadContextIdProvider))
    }
}

impl ThreadScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope keyed by a custom context identity.
    pub fn with_context_ids(context_ids: Arc<dyn ContextIdProvider>) -> Self {
        Self {
            context_ids,
            contexts: Mutex::new(FxHashMap::default()),
        }
    }

    /// Ends the given logical context, dropping its instances and running
    /// their destruction callbacks in reverse construction order. Failures
    /// are collected, not short-circuited.
    pub fn end_context(&self, context_id: &str) -> Result<(), TeardownError> {
        let context = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(context_id);

        match context {
            Some(context) => run_destruction_callbacks(context.destruction_callbacks),
            None => Ok(()),
        }
    }

    /// Ends the current logical context; see [end_context](Self::end_context).
    pub fn end_current_context(&self) -> Result<(), TeardownError> {
        self.end_context(&self.context_ids.current_context_id())
    }
}

impl Scope for ThreadScope {
    fn get(
        &self,
        name: &str,
        factory: InstanceFactory<'_>,
    ) -> Result<BeanInstanceAnyPtr, BeanResolutionError> {
        let context_id = self.context_ids.current_context_id();

        if let Some(instance) = self
            .contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&context_id)
            .and_then(|context| context.instances.get(name))
        {
            return Ok(instance.clone());
        }

        // constructed outside the lock so dependencies in the same scope can
        // recurse; a concurrent call in the same context may also construct,
        // in which case the first stored instance wins
        let instance = factory()?;

        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);
        let context = contexts.entry(context_id).or_default();

        Ok(context
            .instances
            .entry(name.to_string())
            .or_insert(instance)
            .clone())
    }

    fn remove(&self, name: &str) -> Option<BeanInstanceAnyPtr> {
        let context_id = self.context_ids.current_context_id();
        let mut contexts = self.contexts.lock().unwrap_or_else(PoisonError::into_inner);

        contexts.get_mut(&context_id).and_then(|context| {
            context
                .destruction_callbacks
                .retain(|(callback_name, _)| callback_name != name);
            context.instances.remove(name)
        })
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        let context_id = self.context_ids.current_context_id();

        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(context_id)
            .or_default()
            .destruction_callbacks
            .push((name.to_string(), callback));
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.context_ids.current_context_id())
    }
}
