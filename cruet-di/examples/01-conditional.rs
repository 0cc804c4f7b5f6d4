// note: this example assumes you've analyzed the previous one

use cruet_di::bean_capability_cast;
use cruet_di::bean_registry::conditional::PropertyEquals;
use cruet_di::environment::MapEnvironment;
use cruet_di::factory::BeanContainerBuilder;
use cruet_di::scanner::BeanDescriptor;

trait OsInfo: Send + Sync {
    fn describe(&self) -> &str;
}

struct Linux;

impl OsInfo for Linux {
    fn describe(&self) -> &str {
        "running on Linux"
    }
}

struct Windows;

impl OsInfo for Windows {
    fn describe(&self) -> &str {
        "running on Windows"
    }
}

fn main() {
    // conditions are checked once, when the container is built - beans with
    // unmet conditions are silently omitted from the registry
    let container = BeanContainerBuilder::new()
        .with_environment(MapEnvironment::new().with_property("os", "linux"))
        .register(
            BeanDescriptor::new::<Linux, _, _>("linux", |_| Ok(Linux))
                .with_capability::<dyn OsInfo + Send + Sync>(bean_capability_cast!(
                    Linux,
                    dyn OsInfo + Send + Sync
                ))
                .with_condition(PropertyEquals::new("os".to_string(), "linux".to_string())),
        )
        .register(
            BeanDescriptor::new::<Windows, _, _>("windows", |_| Ok(Windows))
                .with_capability::<dyn OsInfo + Send + Sync>(bean_capability_cast!(
                    Windows,
                    dyn OsInfo + Send + Sync
                ))
                .with_condition(PropertyEquals::new(
                    "os".to_string(),
                    "windows".to_string(),
                )),
        )
        .build()
        .expect("error building the container");

    // only one candidate survived, so no primary marker is needed
    let info = container
        .primary_bean::<dyn OsInfo + Send + Sync>()
        .expect("error creating OsInfo");

    // prints "running on Linux"
    println!("{}", info.describe());
}
