use cruet_di::bean_capability_cast;
use cruet_di::bean_registry::conditional::{DefinitionPresent, PropertyEquals};
use cruet_di::bean_registry::BeanDefinitionRegistry;
use cruet_di::environment::MapEnvironment;
use cruet_di::error::{BeanResolutionError, ContainerBuildError};
use cruet_di::factory::{BeanContainerBuilder, FACTORY_BEAN_PREFIX};
use cruet_di::instance_provider::{BeanInstancePtr, ErrorPtr, TypedBeanInstanceProvider};
use cruet_di::lifecycle::BeanPostProcessor;
use cruet_di::scanner::{BeanDescriptor, Import, ImportMetadata, ImportRegistrar, ImportSelector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

trait MessageSource: std::fmt::Debug + Send + Sync {
    fn message(&self) -> String;
}

#[derive(Debug)]
struct StaticMessages(&'static str);

impl MessageSource for StaticMessages {
    fn message(&self) -> String {
        self.0.to_string()
    }
}

fn message_bean(name: &str, message: &'static str) -> BeanDescriptor {
    BeanDescriptor::new::<StaticMessages, _, _>(name, move |_| Ok(StaticMessages(message)))
        .with_capability::<dyn MessageSource + Send + Sync>(bean_capability_cast!(
            StaticMessages,
            dyn MessageSource + Send + Sync
        ))
}

#[test]
fn should_register_only_beans_with_met_conditions() {
    let container = BeanContainerBuilder::new()
        .with_environment(MapEnvironment::new().with_property("os", "windows"))
        .with_source(vec![
            message_bean("linux", "from Linux").with_condition(PropertyEquals::new(
                "os".to_string(),
                "linux".to_string(),
            )),
            message_bean("windows", "from Windows").with_condition(PropertyEquals::new(
                "os".to_string(),
                "windows".to_string(),
            )),
        ])
        .build()
        .unwrap();

    assert_eq!(container.bean_definition_names(), ["windows".to_string()]);

    let source = container
        .primary_bean::<dyn MessageSource + Send + Sync>()
        .unwrap();
    assert_eq!(source.message(), "from Windows");

    assert!(matches!(
        container.get_bean::<StaticMessages>("linux").unwrap_err(),
        BeanResolutionError::NoSuchBean(name) if name == "linux"
    ));
}

#[test]
fn should_fail_ambiguous_lookup_naming_all_candidates() {
    let container = BeanContainerBuilder::new()
        .with_source(vec![
            message_bean("first", "one"),
            message_bean("second", "two"),
        ])
        .build()
        .unwrap();

    assert!(matches!(
        container
            .primary_bean::<dyn MessageSource + Send + Sync>()
            .unwrap_err(),
        BeanResolutionError::AmbiguousCandidates { candidates, .. }
            if candidates == ["first".to_string(), "second".to_string()]
    ));
}

#[test]
fn should_break_ties_with_primary_and_qualifiers() {
    let container = BeanContainerBuilder::new()
        .with_source(vec![
            message_bean("main", "main").primary(),
            message_bean("backup", "backup").with_qualifier("backup"),
        ])
        .build()
        .unwrap();

    let primary = container
        .primary_bean::<dyn MessageSource + Send + Sync>()
        .unwrap();
    assert_eq!(primary.message(), "main");

    let qualified = container
        .qualified_bean::<dyn MessageSource + Send + Sync>("backup")
        .unwrap();
    assert_eq!(qualified.message(), "backup");

    assert!(matches!(
        container
            .qualified_bean::<dyn MessageSource + Send + Sync>("missing")
            .unwrap_err(),
        BeanResolutionError::NoCandidate(..)
    ));
}

#[test]
fn should_enumerate_beans_in_registration_order() {
    let container = BeanContainerBuilder::new()
        .with_source(vec![
            message_bean("b", "two"),
            message_bean("a", "one"),
            message_bean("c", "three"),
        ])
        .build()
        .unwrap();

    let beans = container
        .beans_of_type::<dyn MessageSource + Send + Sync>()
        .unwrap();
    let names: Vec<_> = beans.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["b", "a", "c"]);

    assert_eq!(
        container.bean_names_for_type::<dyn MessageSource + Send + Sync>(),
        ["b".to_string(), "a".to_string(), "c".to_string()]
    );
}

#[test]
fn should_return_none_for_absent_optional_bean() {
    let container = BeanContainerBuilder::new()
        .register(message_bean("messages", "hello"))
        .build()
        .unwrap();

    assert!(container
        .optional_bean::<dyn MessageSource + Send + Sync>()
        .unwrap()
        .is_some());
    assert!(container.optional_bean::<i64>().unwrap().is_none());
}

#[derive(Debug)]
struct Color;
#[derive(Debug)]
struct Pink;
#[derive(Debug)]
struct Background;

struct BackgroundRegistrar;

impl ImportRegistrar for BackgroundRegistrar {
    fn register(
        &self,
        _metadata: &ImportMetadata,
        registry: &mut BeanDefinitionRegistry,
    ) -> Result<(), ErrorPtr> {
        if registry.contains("color") && registry.contains("pink") {
            registry
                .register(
                    BeanDescriptor::new::<Background, _, _>("background", |_| Ok(Background))
                        .into_definition(),
                )
                .map_err(|error| Arc::new(error) as ErrorPtr)?;
        }

        Ok(())
    }
}

#[test]
fn should_register_background_only_with_color_and_pink_present() {
    let container = BeanContainerBuilder::new()
        .register(BeanDescriptor::new::<Color, _, _>("color", |_| Ok(Color)))
        .register(BeanDescriptor::new::<Pink, _, _>("pink", |_| Ok(Pink)))
        .with_import(Import::Registrar(Arc::new(BackgroundRegistrar)))
        .build()
        .unwrap();

    assert!(container.get_bean::<Background>("background").is_ok());

    let container = BeanContainerBuilder::new()
        .register(BeanDescriptor::new::<Color, _, _>("color", |_| Ok(Color)))
        .with_import(Import::Registrar(Arc::new(BackgroundRegistrar)))
        .build()
        .unwrap();

    assert!(matches!(
        container.get_bean::<Background>("background").unwrap_err(),
        BeanResolutionError::NoSuchBean(..)
    ));
}

struct ProfileSelector;

impl ImportSelector for ProfileSelector {
    fn select(&self, metadata: &ImportMetadata) -> Vec<String> {
        if metadata.markers.iter().any(|marker| marker == "verbose") {
            vec!["debug-messages".to_string()]
        } else {
            vec![]
        }
    }
}

#[test]
fn should_import_selected_candidates_past_filters() {
    let build = |markers: Vec<String>| {
        BeanContainerBuilder::new()
            .with_source(vec![
                message_bean("debug-messages", "debug").with_marker("optional")
            ])
            .with_exclude_filter(cruet_di::scanner::MarkerFilter::new("optional".to_string()))
            .with_import(Import::Selector(Arc::new(ProfileSelector)))
            .with_import_metadata(ImportMetadata::new("app".to_string(), markers))
            .build()
            .unwrap()
    };

    let container = build(vec!["verbose".to_string()]);
    assert!(container.get_bean::<StaticMessages>("debug-messages").is_ok());

    let container = build(vec![]);
    assert!(container
        .get_bean::<StaticMessages>("debug-messages")
        .is_err());
}

struct ConnectionFactory {
    url: String,
}

struct Connection {
    url: String,
}

fn connection_bean() -> BeanDescriptor {
    BeanDescriptor::new::<ConnectionFactory, _, _>("connection", |_| {
        Ok(ConnectionFactory {
            url: "db://local".to_string(),
        })
    })
    .producing::<ConnectionFactory, Connection, _>(|factory, _| {
        Ok(Connection {
            url: factory.url.clone(),
        })
    })
}

#[test]
fn should_address_factory_and_product_separately() {
    let container = BeanContainerBuilder::new()
        .register(connection_bean())
        .build()
        .unwrap();

    let connection = container.get_bean::<Connection>("connection").unwrap();
    assert_eq!(connection.url, "db://local");

    // the product is a cached singleton too
    let again = container.get_bean::<Connection>("connection").unwrap();
    assert!(Arc::ptr_eq(&connection, &again));

    let factory_name = [FACTORY_BEAN_PREFIX, "connection"].concat();
    let factory = container
        .get_bean::<ConnectionFactory>(&factory_name)
        .unwrap();
    let same_factory = container
        .get_bean::<ConnectionFactory>(&factory_name)
        .unwrap();
    assert!(Arc::ptr_eq(&factory, &same_factory));
}

#[test]
fn should_create_factory_products_lazily() {
    let products = Arc::new(AtomicUsize::new(0));
    let counter = products.clone();

    let container = BeanContainerBuilder::new()
        .register(
            BeanDescriptor::new::<ConnectionFactory, _, _>("connection", |_| {
                Ok(ConnectionFactory {
                    url: "db://local".to_string(),
                })
            })
            .producing::<ConnectionFactory, Connection, _>(move |factory, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Connection {
                    url: factory.url.clone(),
                })
            }),
        )
        .build()
        .unwrap();

    // only the factory object is created during the build
    assert_eq!(products.load(Ordering::SeqCst), 0);

    container.get_bean::<Connection>("connection").unwrap();
    container.get_bean::<Connection>("connection").unwrap();
    assert_eq!(products.load(Ordering::SeqCst), 1);

    // by-type lookup resolves to the product as well
    let connection = container.primary_bean::<Connection>().unwrap();
    assert_eq!(connection.url, "db://local");
    assert_eq!(products.load(Ordering::SeqCst), 1);
}

struct Greeter {
    bean_name: Mutex<String>,
    greeting: Mutex<String>,
}

#[test]
fn should_invoke_context_aware_callbacks() {
    let container = BeanContainerBuilder::new()
        .with_environment(MapEnvironment::new().with_property("user", "crix"))
        .register(
            BeanDescriptor::new::<Greeter, _, _>("greeter", |_| {
                Ok(Greeter {
                    bean_name: Mutex::new(String::new()),
                    greeting: Mutex::new(String::new()),
                })
            })
            .aware_of_bean_name(|instance, name| {
                if let Some(greeter) = instance.downcast_ref::<Greeter>() {
                    *greeter.bean_name.lock().unwrap() = name.to_string();
                }
            })
            .aware_of_value_resolver(|instance, environment| {
                if let Some(greeter) = instance.downcast_ref::<Greeter>() {
                    *greeter.greeting.lock().unwrap() =
                        environment.resolve_placeholders("hello, ${user}");
                }
            }),
        )
        .build()
        .unwrap();

    let greeter = container.get_bean::<Greeter>("greeter").unwrap();
    assert_eq!(*greeter.bean_name.lock().unwrap(), "greeter");
    assert_eq!(*greeter.greeting.lock().unwrap(), "hello, crix");
}

struct OrderedProcessor {
    label: &'static str,
    order: i32,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl BeanPostProcessor for OrderedProcessor {
    fn order(&self) -> i32 {
        self.order
    }

    fn before_init(
        &self,
        _name: &str,
        instance: cruet_di::instance_provider::BeanInstanceAnyPtr,
    ) -> Result<cruet_di::instance_provider::BeanInstanceAnyPtr, ErrorPtr> {
        self.calls.lock().unwrap().push(self.label);
        Ok(instance)
    }
}

#[test]
fn should_run_post_processors_in_ascending_order() {
    let calls = Arc::new(Mutex::new(vec![]));

    BeanContainerBuilder::new()
        .with_post_processor(OrderedProcessor {
            label: "late",
            order: 10,
            calls: calls.clone(),
        })
        .with_post_processor(OrderedProcessor {
            label: "early",
            order: -10,
            calls: calls.clone(),
        })
        .register(BeanDescriptor::new::<Color, _, _>("color", |_| Ok(Color)))
        .build()
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), ["early", "late"]);
}

#[test]
fn should_surface_constructor_failures() {
    let container = BeanContainerBuilder::new()
        .register(
            BeanDescriptor::new::<Color, _, _>("broken", |_| {
                Err(BeanResolutionError::ConstructorFailure(
                    Arc::new(std::fmt::Error) as ErrorPtr,
                ))
            })
            .lazy(),
        )
        .build()
        .unwrap();

    assert!(matches!(
        container.get_bean::<Color>("broken").unwrap_err(),
        BeanResolutionError::ConstructorFailure(..)
    ));
}

#[test]
fn should_abort_build_on_failing_eager_singleton() {
    let result = BeanContainerBuilder::new()
        .register(BeanDescriptor::new::<Color, _, _>("broken", |_| {
            Err(BeanResolutionError::ConstructorFailure(
                Arc::new(std::fmt::Error) as ErrorPtr,
            ))
        }))
        .build();

    assert!(matches!(
        result.unwrap_err(),
        ContainerBuildError::EagerInit { name, .. } if name == "broken"
    ));
}

#[test]
fn should_register_fallback_beans_in_declaration_order() {
    // "fallback" is declared after "main", so its presence condition sees it
    let container = BeanContainerBuilder::new()
        .with_source(vec![
            message_bean("main", "main"),
            message_bean("fallback", "fallback")
                .with_condition(DefinitionPresent::new("main".to_string())),
        ])
        .build()
        .unwrap();
    assert!(container.get_bean::<StaticMessages>("fallback").is_ok());

    let container = BeanContainerBuilder::new()
        .with_source(vec![message_bean("fallback", "fallback")
            .with_condition(DefinitionPresent::new("main".to_string()))])
        .build()
        .unwrap();
    assert!(container.bean_definition_names().is_empty());
}

#[test]
fn should_resolve_dependencies_by_capability() {
    struct Reporter {
        source: BeanInstancePtr<dyn MessageSource + Send + Sync>,
    }

    let container = BeanContainerBuilder::new()
        .register(message_bean("messages", "report body"))
        .register(BeanDescriptor::new::<Reporter, _, _>(
            "reporter",
            |provider| {
                Ok(Reporter {
                    source: provider
                        .primary_instance_typed::<dyn MessageSource + Send + Sync>()?,
                })
            },
        ))
        .build()
        .unwrap();

    let reporter = container.get_bean::<Reporter>("reporter").unwrap();
    assert_eq!(reporter.source.message(), "report body");
}
