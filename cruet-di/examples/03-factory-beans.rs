// note: this example assumes you've analyzed the previous ones

use cruet_di::factory::{BeanContainerBuilder, FACTORY_BEAN_PREFIX};
use cruet_di::scanner::BeanDescriptor;

// a factory bean constructs an intermediate factory object, which is then
// asked for the value the container actually manages
struct ConnectionFactory {
    url: String,
}

struct Connection {
    url: String,
}

fn main() {
    let container = BeanContainerBuilder::new()
        .register(
            BeanDescriptor::new::<ConnectionFactory, _, _>("connection", |_| {
                Ok(ConnectionFactory {
                    url: "db://localhost".to_string(),
                })
            })
            .producing::<ConnectionFactory, Connection, _>(|factory, _| {
                Ok(Connection {
                    url: factory.url.clone(),
                })
            }),
        )
        .build()
        .expect("error building the container");

    // a plain-name lookup yields the product...
    let connection = container
        .get_bean::<Connection>("connection")
        .expect("error creating Connection");
    println!("connected to {}", connection.url);

    // ...while the "&"-prefixed form addresses the factory object itself
    let factory_name = [FACTORY_BEAN_PREFIX, "connection"].concat();
    let factory = container
        .get_bean::<ConnectionFactory>(&factory_name)
        .expect("error retrieving the factory");
    println!("factory configured with {}", factory.url);
}
