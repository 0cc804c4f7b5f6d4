// note: this example assumes you've analyzed the previous ones

use cruet_di::factory::BeanContainerBuilder;
use cruet_di::instance_provider::ErrorPtr;
use cruet_di::lifecycle::typed_hook;
use cruet_di::scanner::BeanDescriptor;
use cruet_di::scope::PROTOTYPE;
use std::sync::Arc;

struct Connection {
    id: u32,
}

fn main() -> Result<(), ErrorPtr> {
    let container = BeanContainerBuilder::new()
        // singletons (the default scope) are created once and shared; their
        // destroy hooks run when the container is closed
        .register(
            BeanDescriptor::new::<Connection, _, _>("pool", |_| Ok(Connection { id: 0 }))
                .with_destroy(typed_hook::<Connection, _>(|connection| {
                    println!("closing pooled connection {}", connection.id);
                    Ok(())
                })),
        )
        // prototypes are created fresh on every lookup and the container
        // does not track them - teardown is the caller's responsibility
        .register(
            BeanDescriptor::new::<Connection, _, _>("transient", |_| Ok(Connection { id: 1 }))
                .with_scope(PROTOTYPE),
        )
        .build()
        .map_err(|error| Arc::new(error) as ErrorPtr)?;

    let first = container.get_bean::<Connection>("transient").unwrap();
    let second = container.get_bean::<Connection>("transient").unwrap();
    assert!(!Arc::ptr_eq(&first, &second));

    let pooled = container.get_bean::<Connection>("pool").unwrap();
    assert!(Arc::ptr_eq(
        &pooled,
        &container.get_bean::<Connection>("pool").unwrap()
    ));

    // prints "closing pooled connection 0"
    container
        .close()
        .map_err(|error| Arc::new(error) as ErrorPtr)?;
    Ok(())
}
