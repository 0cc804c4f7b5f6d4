//! Interception of bean method calls through explicit wrapper beans.
//!
//! There is no bytecode or vtable magic here: interception is opt-in and
//! visible in the types. A bean gets wrapped in an [AdvisedBean] by an
//! [InterceptionPostProcessor] registered for its name, and callers route
//! calls through [AdvisedBean::invoke] to have the attached [Advice] chain
//! observe them. Since singleton scopes cache the post-processed reference,
//! wrapping happens once per singleton.

use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstancePtr, ErrorPtr};
use crate::lifecycle::BeanPostProcessor;
use derivative::Derivative;
use derive_more::Constructor;
use fxhash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Description of one intercepted call, passed to advice hooks.
#[derive(Clone, Debug, Constructor)]
pub struct Invocation {
    pub bean_name: String,
    pub method: &'static str,
}

/// Cross-cutting hook observing intercepted calls. Advice must not resolve
/// beans from the container - doing so during container refresh would
/// re-enter construction.
pub trait Advice: Send + Sync {
    /// Runs before the target call.
    fn before(&self, invocation: &Invocation) {
        let _ = invocation;
    }

    /// Runs after the target call, observing its outcome.
    fn after(&self, invocation: &Invocation, result: Result<(), &ErrorPtr>) {
        let _ = (invocation, result);
    }
}

/// A bean wrapped with an ordered advice chain. `before` hooks run in
/// attachment order, `after` hooks in reverse, so the first attached advice
/// brackets the whole call.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AdvisedBean<T: ?Sized> {
    target: BeanInstancePtr<T>,
    bean_name: String,

    #[derivative(Debug = "ignore")]
    advice: Vec<Arc<dyn Advice>>,
}

impl<T: ?Sized> AdvisedBean<T> {
    pub fn new(target: BeanInstancePtr<T>, bean_name: String) -> Self {
        Self {
            target,
            bean_name,
            advice: vec![],
        }
    }

    pub fn with_advice(mut self, advice: Arc<dyn Advice>) -> Self {
        self.advice.push(advice);
        self
    }

    /// Direct access to the wrapped bean, bypassing advice.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Routes a call through the advice chain. The call outcome is returned
    /// unchanged; advice can observe a failure but not suppress it.
    pub fn invoke<R>(
        &self,
        method: &'static str,
        call: impl FnOnce(&T) -> Result<R, ErrorPtr>,
    ) -> Result<R, ErrorPtr> {
        let invocation = Invocation::new(self.bean_name.clone(), method);

        for advice in &self.advice {
            advice.before(&invocation);
        }

        let result = call(&self.target);

        let outcome = match &result {
            Ok(_) => Ok(()),
            Err(error) => Err(error),
        };
        for advice in self.advice.iter().rev() {
            advice.after(&invocation, outcome.clone());
        }

        result
    }
}

/// Substitutes a bean reference with its advised wrapper.
pub type WrapFunction =
    Arc<dyn Fn(BeanInstanceAnyPtr) -> Result<BeanInstanceAnyPtr, ErrorPtr> + Send + Sync>;

/// Post-processor applying per-name wrap functions after initialization.
/// Registered like any other post-processor; beans without a wrap entry pass
/// through untouched.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct InterceptionPostProcessor {
    order: i32,

    #[derivative(Debug = "ignore")]
    wrappers: FxHashMap<String, WrapFunction>,
}

impl InterceptionPostProcessor {
    pub fn new(order: i32) -> Self {
        Self {
            order,
            wrappers: FxHashMap::default(),
        }
    }

    /// Registers a wrap function for the bean with the given name. A typical
    /// wrap downcasts the instance, wraps it in an [AdvisedBean] and returns
    /// that wrapper as the new instance. Since wrapping changes the runtime
    /// type, the definition of an advised bean should declare the wrapper
    /// type as a capability to keep it addressable in typed lookups.
    pub fn advise<N: ToString>(mut self, name: N, wrap: WrapFunction) -> Self {
        self.wrappers.insert(name.to_string(), wrap);
        self
    }
}

impl BeanPostProcessor for InterceptionPostProcessor {
    fn order(&self) -> i32 {
        self.order
    }

    fn after_init(
        &self,
        name: &str,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        match self.wrappers.get(name) {
            Some(wrap) => {
                debug!(name, "Wrapping bean in advised proxy");
                wrap(instance)
            }
            None => Ok(instance),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstancePtr, ErrorPtr};
    use crate::lifecycle::BeanPostProcessor;
    use crate::proxy::{Advice, AdvisedBean, InterceptionPostProcessor, Invocation};
    use std::sync::{Arc, Mutex};

    struct Calculator;

    impl Calculator {
        fn div(&self, a: i32, b: i32) -> Result<i32, ErrorPtr> {
            if b == 0 {
                Err(Arc::new(std::fmt::Error) as ErrorPtr)
            } else {
                Ok(a / b)
            }
        }
    }

    #[derive(Default)]
    struct RecordingAdvice {
        events: Mutex<Vec<String>>,
    }

    impl Advice for RecordingAdvice {
        fn before(&self, invocation: &Invocation) {
            self.events
                .lock()
                .unwrap()
                .push(format!("before {}.{}", invocation.bean_name, invocation.method));
        }

        fn after(&self, invocation: &Invocation, result: Result<(), &ErrorPtr>) {
            let outcome = if result.is_ok() { "ok" } else { "err" };
            self.events
                .lock()
                .unwrap()
                .push(format!("after {}: {}", invocation.method, outcome));
        }
    }

    #[test]
    fn should_bracket_calls_with_advice() {
        let advice = Arc::new(RecordingAdvice::default());
        let advised = AdvisedBean::new(BeanInstancePtr::new(Calculator), "calc".to_string())
            .with_advice(advice.clone());

        let result = advised.invoke("div", |calc| calc.div(10, 2)).unwrap();
        assert_eq!(result, 5);

        assert!(advised.invoke("div", |calc| calc.div(1, 0)).is_err());

        assert_eq!(
            *advice.events.lock().unwrap(),
            vec![
                "before calc.div".to_string(),
                "after div: ok".to_string(),
                "before calc.div".to_string(),
                "after div: err".to_string(),
            ]
        );
    }

    #[test]
    fn should_run_after_hooks_in_reverse_order() {
        struct NamedAdvice {
            name: &'static str,
            events: Arc<Mutex<Vec<String>>>,
        }

        impl Advice for NamedAdvice {
            fn before(&self, _invocation: &Invocation) {
                self.events.lock().unwrap().push(format!("before {}", self.name));
            }

            fn after(&self, _invocation: &Invocation, _result: Result<(), &ErrorPtr>) {
                self.events.lock().unwrap().push(format!("after {}", self.name));
            }
        }

        let events = Arc::new(Mutex::new(vec![]));
        let advised = AdvisedBean::new(BeanInstancePtr::new(Calculator), "calc".to_string())
            .with_advice(Arc::new(NamedAdvice {
                name: "outer",
                events: events.clone(),
            }))
            .with_advice(Arc::new(NamedAdvice {
                name: "inner",
                events: events.clone(),
            }));

        advised.invoke("div", |calc| calc.div(4, 2)).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "before outer".to_string(),
                "before inner".to_string(),
                "after inner".to_string(),
                "after outer".to_string(),
            ]
        );
    }

    #[test]
    fn should_wrap_only_advised_beans() {
        let processor = InterceptionPostProcessor::new(100).advise("calc", {
            Arc::new(|instance: BeanInstanceAnyPtr| {
                let target = instance
                    .downcast::<Calculator>()
                    .map_err(|_| Arc::new(std::fmt::Error) as ErrorPtr)?;

                Ok(BeanInstancePtr::new(AdvisedBean::new(target, "calc".to_string()))
                    as BeanInstanceAnyPtr)
            })
        });

        let wrapped = processor
            .after_init("calc", BeanInstancePtr::new(Calculator) as BeanInstanceAnyPtr)
            .unwrap();
        assert!(wrapped.downcast_ref::<AdvisedBean<Calculator>>().is_some());

        let untouched = processor
            .after_init("other", BeanInstancePtr::new(Calculator) as BeanInstanceAnyPtr)
            .unwrap();
        assert!(untouched.downcast_ref::<Calculator>().is_some());
    }
}
