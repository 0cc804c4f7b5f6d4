//! Type-erased access to bean instances. Beans are stored as
//! [BeanInstanceAnyPtr]s internally, with [CastFunction]s translating them
//! back to concrete or `dyn Trait` pointers on request.

use crate::error::BeanResolutionError;
use std::any::{type_name, Any, TypeId};
use std::error::Error;
use std::sync::Arc;

/// Pointer holding a bean instance. Instances are shared, so all users of a
/// given singleton observe the same allocation.
pub type BeanInstancePtr<T> = Arc<T>;

/// Type-erased [BeanInstancePtr].
pub type BeanInstanceAnyPtr = Arc<dyn Any + Send + Sync + 'static>;

/// Pointer to a generic error which can be used by user-provided code -
/// constructors, lifecycle hooks, conditions, advice.
pub type ErrorPtr = Arc<dyn Error + Send + Sync>;

/// Converts a type-erased instance to a `Box<dyn Any>` containing a
/// [BeanInstancePtr] to the requested type. This indirection makes it
/// possible to hand out `dyn Trait` pointers for beans registered with such
/// capabilities, since a plain downcast only ever recovers the concrete type.
pub type CastFunction =
    fn(instance: BeanInstanceAnyPtr) -> Result<Box<dyn Any>, BeanInstanceAnyPtr>;

/// [CastFunction] for the trivial case of casting to the concrete bean type.
pub fn default_cast<T: Any + Send + Sync>(
    instance: BeanInstanceAnyPtr,
) -> Result<Box<dyn Any>, BeanInstanceAnyPtr> {
    instance
        .downcast::<T>()
        .map(|p| Box::new(p) as Box<dyn Any>)
}

/// Creates a capability [CastFunction] casting a concrete bean type to one of
/// the `dyn Trait` capabilities it declares.
///
/// ```
/// use cruet_di::bean_capability_cast;
/// use cruet_di::instance_provider::CastFunction;
///
/// trait Greeter {}
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter {}
///
/// let cast: CastFunction = bean_capability_cast!(EnglishGreeter, dyn Greeter + Send + Sync);
/// ```
#[macro_export]
macro_rules! bean_capability_cast {
    ($concrete:ty, $capability:ty) => {
        |instance: $crate::instance_provider::BeanInstanceAnyPtr| {
            instance.downcast::<$concrete>().map(|p| {
                Box::new(p as $crate::instance_provider::BeanInstancePtr<$capability>)
                    as Box<dyn std::any::Any>
            })
        }
    };
}

/// Applies a [CastFunction] to a type-erased instance, recovering a typed
/// pointer.
pub fn apply_cast<T: ?Sized + 'static>(
    instance: BeanInstanceAnyPtr,
    cast: CastFunction,
) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
    cast(instance)
        .map_err(|_| BeanResolutionError::IncompatibleBean(type_name::<T>()))
        .and_then(|boxed| {
            boxed
                .downcast::<BeanInstancePtr<T>>()
                .map(|p| *p)
                .map_err(|_| BeanResolutionError::IncompatibleBean(type_name::<T>()))
        })
}

/// Generic provider for bean instances, used by bean constructors to resolve
/// their dependencies. The provider drives instantiation recursively, so
/// requesting an instance may create it, along with its whole dependency
/// subtree.
pub trait BeanInstanceProvider {
    /// Returns the primary instance for a given type. The primary bean is
    /// either the sole candidate for the type or the one explicitly flagged
    /// as primary.
    fn primary_instance(
        &mut self,
        type_id: TypeId,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError>;

    /// Returns the instance for a given type whose definition declares the
    /// given qualifier.
    fn qualified_instance(
        &mut self,
        type_id: TypeId,
        qualifier: &str,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError>;

    /// Returns instances of all beans registered for a given type, in
    /// registration order.
    fn instances(
        &mut self,
        type_id: TypeId,
    ) -> Result<Vec<(BeanInstanceAnyPtr, CastFunction)>, BeanResolutionError>;

    /// Returns an instance with the given name, castable to the given type.
    fn instance_by_name(
        &mut self,
        name: &str,
        type_id: TypeId,
    ) -> Result<(BeanInstanceAnyPtr, CastFunction), BeanResolutionError>;

    /// Like [primary_instance](Self::primary_instance), but an absent
    /// candidate yields `None` instead of an error, for optional
    /// dependencies.
    fn optional_instance(
        &mut self,
        type_id: TypeId,
    ) -> Result<Option<(BeanInstanceAnyPtr, CastFunction)>, BeanResolutionError>;
}

/// Helper trait for [BeanInstanceProvider] providing strongly-typed access.
pub trait TypedBeanInstanceProvider {
    /// Typesafe version of [BeanInstanceProvider::primary_instance].
    fn primary_instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError>;

    /// Typesafe version of [BeanInstanceProvider::qualified_instance].
    fn qualified_instance_typed<T: ?Sized + 'static>(
        &mut self,
        qualifier: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError>;

    /// Typesafe version of [BeanInstanceProvider::instances].
    fn instances_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Vec<BeanInstancePtr<T>>, BeanResolutionError>;

    /// Typesafe version of [BeanInstanceProvider::instance_by_name].
    fn instance_by_name_typed<T: ?Sized + 'static>(
        &mut self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError>;

    /// Typesafe version of [BeanInstanceProvider::optional_instance].
    fn optional_instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanResolutionError>;
}

impl<P: BeanInstanceProvider + ?Sized> TypedBeanInstanceProvider for P {
    fn primary_instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.primary_instance(TypeId::of::<T>())
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    fn qualified_instance_typed<T: ?Sized + 'static>(
        &mut self,
        qualifier: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.qualified_instance(TypeId::of::<T>(), qualifier)
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    fn instances_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Vec<BeanInstancePtr<T>>, BeanResolutionError> {
        self.instances(TypeId::of::<T>()).and_then(|instances| {
            instances
                .into_iter()
                .map(|(instance, cast)| apply_cast::<T>(instance, cast))
                .collect()
        })
    }

    fn instance_by_name_typed<T: ?Sized + 'static>(
        &mut self,
        name: &str,
    ) -> Result<BeanInstancePtr<T>, BeanResolutionError> {
        self.instance_by_name(name, TypeId::of::<T>())
            .and_then(|(instance, cast)| apply_cast::<T>(instance, cast))
    }

    fn optional_instance_typed<T: ?Sized + 'static>(
        &mut self,
    ) -> Result<Option<BeanInstancePtr<T>>, BeanResolutionError> {
        self.optional_instance(TypeId::of::<T>())
            .and_then(|instance| {
                instance
                    .map(|(instance, cast)| apply_cast::<T>(instance, cast))
                    .transpose()
            })
    }
}
