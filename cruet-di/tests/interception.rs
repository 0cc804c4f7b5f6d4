use cruet_di::factory::BeanContainerBuilder;
use cruet_di::instance_provider::{default_cast, BeanInstanceAnyPtr, BeanInstancePtr, ErrorPtr};
use cruet_di::proxy::{Advice, AdvisedBean, InterceptionPostProcessor, Invocation};
use cruet_di::scanner::BeanDescriptor;
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
struct LogAdvice {
    events: Mutex<Vec<String>>,
}

impl Advice for LogAdvice {
    fn before(&self, invocation: &Invocation) {
        self.events
            .lock()
            .unwrap()
            .push(format!("begin {}.{}", invocation.bean_name, invocation.method));
    }

    fn after(&self, invocation: &Invocation, result: Result<(), &ErrorPtr>) {
        let outcome = match result {
            Ok(()) => "ok".to_string(),
            Err(error) => format!("error: {error}"),
        };
        self.events
            .lock()
            .unwrap()
            .push(format!("end {}.{}: {outcome}", invocation.bean_name, invocation.method));
    }
}

fn advised_container(advice: Arc<LogAdvice>) -> cruet_di::factory::BeanContainer {
    let processor = InterceptionPostProcessor::new(100).advise("calculator", {
        Arc::new(move |instance: BeanInstanceAnyPtr| {
            let target = instance
                .downcast::<Calculator>()
                .map_err(|_| Arc::new(std::fmt::Error) as ErrorPtr)?;

            Ok(BeanInstancePtr::new(
                AdvisedBean::new(target, "calculator".to_string())
                    .with_advice(advice.clone() as Arc<dyn Advice>),
            ) as BeanInstanceAnyPtr)
        })
    });

    BeanContainerBuilder::new()
        .with_post_processor(processor)
        .register(
            BeanDescriptor::new::<Calculator, _, _>("calculator", |_| Ok(Calculator))
                .with_capability::<AdvisedBean<Calculator>>(
                    default_cast::<AdvisedBean<Calculator>>,
                ),
        )
        .build()
        .unwrap()
}

#[test]
fn should_observe_intercepted_calls() {
    let advice = Arc::new(LogAdvice::default());
    let container = advised_container(advice.clone());

    let calculator = container
        .get_bean::<AdvisedBean<Calculator>>("calculator")
        .unwrap();

    let result = calculator.invoke("div", |calc| calc.div(10, 2)).unwrap();
    assert_eq!(result, 5);

    assert!(calculator.invoke("div", |calc| calc.div(1, 0)).is_err());

    let events = advice.events.lock().unwrap();
    assert_eq!(events[0], "begin calculator.div");
    assert_eq!(events[1], "end calculator.div: ok");
    assert_eq!(events[2], "begin calculator.div");
    assert!(events[3].starts_with("end calculator.div: error"));
}

#[test]
fn should_wrap_singletons_once() {
    let advice = Arc::new(LogAdvice::default());
    let container = advised_container(advice);

    // the singleton scope cached the wrapped reference during eager init
    let first = container
        .get_bean::<AdvisedBean<Calculator>>("calculator")
        .unwrap();
    let second = container
        .get_bean::<AdvisedBean<Calculator>>("calculator")
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));

    // the raw concrete type is no longer addressable once wrapped
    assert!(container.get_bean::<Calculator>("calculator").is_err());
}

#[test]
fn should_bypass_advice_for_direct_target_access() {
    let advice = Arc::new(LogAdvice::default());
    let container = advised_container(advice.clone());

    let calculator = container
        .get_bean::<AdvisedBean<Calculator>>("calculator")
        .unwrap();

    assert_eq!(calculator.target().div(9, 3).unwrap(), 3);
    assert!(advice.events.lock().unwrap().is_empty());
}
