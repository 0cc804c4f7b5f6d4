// note: this example assumes you've analyzed the previous ones

use cruet_di::factory::BeanContainerBuilder;
use cruet_di::instance_provider::{default_cast, BeanInstanceAnyPtr, BeanInstancePtr, ErrorPtr};
use cruet_di::proxy::{Advice, AdvisedBean, InterceptionPostProcessor, Invocation};
use cruet_di::scanner::BeanDescriptor;
use std::sync::Arc;

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

struct LogAdvice;

impl Advice for LogAdvice {
    fn before(&self, invocation: &Invocation) {
        println!("calling {}.{}", invocation.bean_name, invocation.method);
    }

    fn after(&self, invocation: &Invocation, result: Result<(), &ErrorPtr>) {
        match result {
            Ok(()) => println!("{}.{} returned", invocation.bean_name, invocation.method),
            Err(error) => println!(
                "{}.{} failed: {error}",
                invocation.bean_name, invocation.method
            ),
        }
    }
}

fn main() {
    // the post-processor substitutes the advised wrapper for the raw bean
    // during initialization, so the singleton scope caches the wrapper
    let processor = InterceptionPostProcessor::new(100).advise(
        "calculator",
        Arc::new(|instance: BeanInstanceAnyPtr| {
            let target = instance
                .downcast::<Calculator>()
                .map_err(|_| Arc::new(std::fmt::Error) as ErrorPtr)?;

            Ok(BeanInstancePtr::new(
                AdvisedBean::new(target, "calculator".to_string())
                    .with_advice(Arc::new(LogAdvice)),
            ) as BeanInstanceAnyPtr)
        }),
    );

    let container = BeanContainerBuilder::new()
        .with_post_processor(processor)
        .register(
            BeanDescriptor::new::<Calculator, _, _>("calculator", |_| Ok(Calculator))
                // wrapping changes the runtime type, so the wrapper type is
                // declared as a capability to keep typed lookups working
                .with_capability::<AdvisedBean<Calculator>>(
                    default_cast::<AdvisedBean<Calculator>>,
                ),
        )
        .build()
        .expect("error building the container");

    let calculator = container
        .get_bean::<AdvisedBean<Calculator>>("calculator")
        .expect("error creating Calculator");

    // both calls are bracketed by the advice
    let result = calculator.invoke("div", |calc| calc.div(10, 2));
    println!("10 / 2 = {:?}", result.map_err(|error| error.to_string()));

    let result = calculator.invoke("div", |calc| calc.div(1, 0));
    println!("1 / 0 = {:?}", result.map_err(|error| error.to_string()));
}
