use cruet_di::bean_capability_cast;
use cruet_di::factory::BeanContainerBuilder;
use cruet_di::instance_provider::{BeanInstancePtr, TypedBeanInstanceProvider};
use cruet_di::scanner::BeanDescriptor;

// this is a trait we would like to use in our bean
trait Greeter: Send + Sync {
    fn greet(&self);
}

// this is a dependency implementing the above trait
struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self) {
        println!("Hello world!");
    }
}

// this is another bean, with a dependency on dyn Greeter
struct App {
    greeter: BeanInstancePtr<dyn Greeter + Send + Sync>,
}

impl App {
    fn run(&self) {
        self.greeter.greet();
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    let container = BeanContainerBuilder::new()
        // registering EnglishGreeter with a capability makes it retrievable
        // as dyn Greeter, not just as its concrete type
        .register(
            BeanDescriptor::new::<EnglishGreeter, _, _>("greeter", |_| Ok(EnglishGreeter))
                .with_capability::<dyn Greeter + Send + Sync>(bean_capability_cast!(
                    EnglishGreeter,
                    dyn Greeter + Send + Sync
                )),
        )
        // constructors receive a provider for resolving their dependencies
        .register(BeanDescriptor::new::<App, _, _>("app", |provider| {
            Ok(App {
                greeter: provider.primary_instance_typed::<dyn Greeter + Send + Sync>()?,
            })
        }))
        .build()
        .expect("error building the container");

    let app = container
        .get_bean::<App>("app")
        .expect("error creating App");

    // prints "Hello world!"
    app.run();
}
