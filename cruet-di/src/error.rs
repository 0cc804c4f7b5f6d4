use crate::instance_provider::ErrorPtr;
use std::any::TypeId;
use thiserror::Error;

/// Errors related to registering bean definitions.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BeanRegistryError {
    #[error("Attempted to register a duplicated bean definition with name: {0}")]
    DuplicateBeanName(String),
}

/// Errors related to resolving and creating bean instances. These are local
/// to a given lookup and do not invalidate the container.
#[derive(Error, Clone, Debug)]
pub enum BeanResolutionError {
    #[error("No bean definition found for name: {0}")]
    NoSuchBean(String),
    #[error("No candidate bean found for type: {0:?}")]
    NoCandidate(TypeId),
    #[error("Multiple candidate beans found for type {type_id:?} with no primary marker or matching qualifier: {candidates:?}")]
    AmbiguousCandidates {
        type_id: TypeId,
        candidates: Vec<String>,
    },
    #[error("Multiple candidate beans for type {type_id:?} are flagged as primary: {candidates:?}")]
    DuplicatePrimary {
        type_id: TypeId,
        candidates: Vec<String>,
    },
    #[error("Dependency cycle detected: {path}", path = .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    #[error("No scope registered with name: {0}")]
    UnrecognizedScope(String),
    #[error("Bean is not produced by a factory bean: {0}")]
    NotAFactoryBean(String),
    #[error("Cannot cast bean to requested type: {0}")]
    IncompatibleBean(&'static str),
    #[error("Bean constructor failed: {0}")]
    ConstructorFailure(ErrorPtr),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("Container has been closed")]
    ContainerClosed,
}

/// Errors related to initialization-phase lifecycle hooks. A failing hook is
/// fatal for the construction of its bean.
#[derive(Error, Clone, Debug)]
pub enum LifecycleError {
    #[error("Init hook failed for bean {name}: {cause}")]
    InitHook { name: String, cause: ErrorPtr },
    #[error("Post-processor failed for bean {name}: {cause}")]
    PostProcessor { name: String, cause: ErrorPtr },
}

/// Errors which can abort the whole container build. Construction is
/// all-or-nothing: no partial container is returned when any definition
/// fails to scan, register or eagerly initialize.
#[derive(Error, Clone, Debug)]
pub enum ContainerBuildError {
    #[error(transparent)]
    Registry(#[from] BeanRegistryError),
    #[error("Condition evaluation failed for bean {name}: {cause}")]
    ConditionEvaluation { name: String, cause: ErrorPtr },
    #[error("Import selector returned an unknown candidate name: {0}")]
    UnknownImport(String),
    #[error("Import registrar failed: {0}")]
    Registrar(ErrorPtr),
    #[error("Eager initialization failed for bean {name}: {cause}")]
    EagerInit {
        name: String,
        cause: BeanResolutionError,
    },
}

/// Aggregate failure produced by container teardown. Destroy hooks are never
/// short-circuited: every tracked bean gets its hook invoked and all
/// failures are collected here, since skipping remaining teardown would leak
/// resources.
#[derive(Error, Clone, Debug)]
#[error("{count} destroy hook(s) failed during container teardown", count = .failures.len())]
pub struct TeardownError {
    /// Bean names paired with the errors their destroy hooks produced, in
    /// destruction order.
    pub failures: Vec<(String, ErrorPtr)>,
}
