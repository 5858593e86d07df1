use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, LazyLock,
    },
};

use futures::{executor::block_on, join, FutureExt};
use futures_channel::oneshot;
use wrapp_injector::{
    Constructor, DependencyEdges, DynError, Injectable, InjectError, Injector, InjectorOptions,
    Instance, Module, ModuleType, Params, Provider, ProviderMap, ProviderSet,
    SingletonResolution, Token,
};

static ANSWER: LazyLock<Token<u32>> = LazyLock::new(|| Token::named("answer"));
static LABEL: LazyLock<Token<String>> = LazyLock::new(|| Token::named("label"));
static DOUBLED: LazyLock<Token<u32>> = LazyLock::new(|| Token::named("doubled"));

fn answer_injector() -> Injector {
    let injector = Injector::new();
    injector
        .provide(&*ANSWER, Provider::value(42_u32))
        .unwrap()
        .provide(&*LABEL, Provider::value("label".to_string()))
        .unwrap();
    injector
}

/// Declares no constructor body
#[derive(Default)]
struct Plain {
    foo: Option<Arc<u32>>,
}
impl Module for Plain {
    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("foo", &*ANSWER);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Implicit(Plain::default)
    }

    fn assign(&mut self, key: &str, value: Instance) -> Result<(), DynError> {
        if key == "foo" {
            self.foo = Some(value.downcast()?);
        }
        Ok(())
    }
}

struct Parent;
impl Module for Parent {
    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("k1", &*ANSWER);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Explicit(|_| Ok(Parent))
    }
}

struct Child {
    keys: Vec<String>,
    answer: Arc<u32>,
    label: Arc<String>,
}
impl Module for Child {
    fn parent() -> Option<ModuleType> {
        Some(ModuleType::of::<Parent>())
    }

    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("k2", &*LABEL);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Explicit(|params: &mut Params| -> Result<Self, DynError> {
            let mut keys: Vec<_> = params.keys().map(str::to_string).collect();
            keys.sort();
            Ok(Child {
                keys,
                answer: params.get("k1")?,
                label: params.get("k2")?,
            })
        })
    }
}

struct Consumer {
    bar: Arc<u32>,
    foo: Arc<u32>,
}
impl Module for Consumer {
    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("bar", &*DOUBLED);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Explicit(|params: &mut Params| -> Result<Self, DynError> {
            Ok(Consumer {
                bar: params.take("bar")?,
                foo: params.take("foo")?,
            })
        })
    }
}

#[test]
fn construction_falls_back_to_field_assignment() {
    let plain = block_on(answer_injector().create::<Plain>()).unwrap();
    assert_eq!(plain.foo.as_deref(), Some(&42));
}

#[test]
fn caller_parameters_override_resolved_ones() {
    let plain = block_on(answer_injector().create_with::<Plain>(Params::new().with("foo", 99_u32)))
        .unwrap();
    assert_eq!(plain.foo.as_deref(), Some(&99));
}

#[test]
fn child_receives_parent_and_own_dependencies() {
    let child = block_on(answer_injector().create::<Child>()).unwrap();
    assert_eq!(child.keys, ["k1", "k2"]);
    assert_eq!(*child.answer, 42);
    assert_eq!(child.label.as_str(), "label");
}

/// Inherits its construction from [Parent]
#[derive(Default)]
struct Listener {
    answer: Option<Arc<u32>>,
    label: Option<Arc<String>>,
}
impl Module for Listener {
    fn parent() -> Option<ModuleType> {
        Some(ModuleType::of::<Parent>())
    }

    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("k2", &*LABEL);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Implicit(Listener::default)
    }

    fn assign(&mut self, key: &str, value: Instance) -> Result<(), DynError> {
        match key {
            "k1" => self.answer = Some(value.downcast()?),
            "k2" => self.label = Some(value.downcast()?),
            _ => {}
        }
        Ok(())
    }
}

#[test]
fn implicit_child_of_explicit_parent_receives_every_dependency() {
    let listener = block_on(answer_injector().create::<Listener>()).unwrap();
    assert_eq!(listener.answer.as_deref(), Some(&42));
    assert_eq!(listener.label.as_deref().map(String::as_str), Some("label"));
}

#[test]
fn child_edges_are_the_same_whichever_type_is_touched_first() {
    let child_first = answer_injector();
    child_first.injectable(ModuleType::of::<Child>());
    child_first.injectable(ModuleType::of::<Parent>());

    let parent_first = answer_injector();
    parent_first.injectable(ModuleType::of::<Parent>());
    parent_first.injectable(ModuleType::of::<Child>());

    let edges = |injector: &Injector| {
        injector.with_metadata(|metadata| {
            metadata
                .ensure_dependency_edges(ModuleType::of::<Child>())
                .iter()
                .map(|edge| (edge.key.clone(), edge.token))
                .collect::<Vec<_>>()
        })
    };

    let expected = vec![
        ("k1".to_string(), Injectable::from(&*ANSWER)),
        ("k2".to_string(), Injectable::from(&*LABEL)),
    ];
    assert_eq!(edges(&child_first), expected);
    assert_eq!(edges(&parent_first), expected);
}

#[test]
fn dependencies_of_dependencies_are_resolved() {
    let injector = answer_injector();
    injector
        .provide(
            &*DOUBLED,
            Provider::factory(|deps| async move {
                let answer = deps[0].downcast::<u32>()?;
                Ok::<_, InjectError>(*answer + 42)
            })
            .depends_on([Injectable::from(&*ANSWER)]),
        )
        .unwrap();

    let consumer =
        block_on(injector.create_with::<Consumer>(Params::new().with("foo", 42_u32))).unwrap();
    assert_eq!(*consumer.bar, 84);
    assert_eq!(*consumer.foo, 42);
}

#[test]
fn missing_provider_can_be_added_later() {
    let token = Token::<u32>::named("late");
    let injector = Injector::new();

    assert!(matches!(
        block_on(injector.get(&token)),
        Err(InjectError::ProviderNotFound(missing)) if missing == Injectable::from(&token)
    ));

    injector.provide(&token, Provider::value(7_u32)).unwrap();
    assert_eq!(*block_on(injector.get(&token)).unwrap(), 7);
}

#[test]
fn missing_dependency_fails_the_construction() {
    let result = block_on(Injector::new().create::<Plain>());
    assert!(matches!(result, Err(InjectError::ProviderNotFound(_))));
}

#[test]
fn values_never_consult_their_dependencies() {
    let missing = Token::<u32>::new();
    let token = Token::<u32>::new();
    let injector = Injector::new();
    injector
        .provide(
            &token,
            Provider::value(5_u32).depends_on([Injectable::from(&missing)]),
        )
        .unwrap();

    assert_eq!(*block_on(injector.get(&token)).unwrap(), 5);
}

#[derive(Debug, PartialEq)]
struct Connection(usize);

/// Factory which counts its calls and waits for `gate` before producing a value
fn gated_factory(calls: Arc<AtomicUsize>, gate: oneshot::Receiver<()>) -> Provider {
    let gate = gate.shared();
    Provider::factory(move |_| {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = gate.clone();
        async move {
            let _ = gate.await;
            Ok::<_, Infallible>(Connection(call))
        }
    })
    .singleton()
}

#[test]
fn concurrent_first_access_is_deduplicated() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();
    let token = Token::<Connection>::new();
    let injector = Injector::new();
    injector
        .provide(&token, gated_factory(calls.clone(), gate))
        .unwrap();

    let (first, second, ()) = block_on(async {
        join!(injector.get(&token), injector.get(&token), async move {
            let _ = release.send(());
        })
    });

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let third = block_on(injector.get(&token)).unwrap();
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn racing_first_access_runs_the_factory_per_caller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();
    let token = Token::<Connection>::new();
    let injector = Injector::with_options(
        InjectorOptions::default().singleton_resolution(SingletonResolution::Race),
    );
    injector
        .provide(&token, gated_factory(calls.clone(), gate))
        .unwrap();

    let (first, second, ()) = block_on(async {
        join!(injector.get(&token), injector.get(&token), async move {
            let _ = release.send(());
        })
    });

    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Later lookups are served from the cache
    let cached = block_on(injector.get(&token)).unwrap();
    assert!(Arc::ptr_eq(&cached, &first) || Arc::ptr_eq(&cached, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn replaced_provider_is_not_overwritten_by_a_stale_resolution() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();
    let token = Token::<Connection>::new();
    let injector = Injector::new();
    injector
        .provide(&token, gated_factory(calls.clone(), gate))
        .unwrap();

    let replacing = &injector;
    let (stale, ()) = block_on(async {
        join!(injector.get(&token), async move {
            replacing
                .provide(&token, Provider::value(Connection(100)))
                .unwrap();
            let _ = release.send(());
        })
    });

    assert_eq!(*stale.unwrap(), Connection(1));
    assert_eq!(*block_on(injector.get(&token)).unwrap(), Connection(100));
}

#[test]
fn abandoned_resolution_is_finished_by_the_next_caller() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let (release, gate) = oneshot::channel::<()>();
    let gate = gate.shared();
    let token = Token::<Connection>::named("flaky");
    let injector = Injector::new();
    injector
        .provide(
            &token,
            Provider::factory(move |_| {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let gate = gate.clone();
                async move {
                    let _ = gate.await;
                    match call {
                        1 => Err::<Connection, DynError>("refused".into()),
                        call => Ok(Connection(call)),
                    }
                }
            })
            .singleton(),
        )
        .unwrap();

    // Polled once and dropped, as an external timeout would
    assert!(injector.get(&token).now_or_never().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let _ = release.send(());

    // Joins the abandoned resolution, which fails
    assert!(matches!(
        block_on(injector.get(&token)),
        Err(InjectError::FactoryFailed { .. })
    ));

    // The failure was recorded, so the factory runs again
    assert_eq!(*block_on(injector.get(&token)).unwrap(), Connection(2));
    assert_eq!(*block_on(injector.get(&token)).unwrap(), Connection(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn abandoned_resolution_is_cached_once_finished() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (release, gate) = oneshot::channel();
    let token = Token::<Connection>::new();
    let injector = Injector::new();
    injector
        .provide(&token, gated_factory(calls.clone(), gate))
        .unwrap();

    assert!(injector.get(&token).now_or_never().is_none());
    let _ = release.send(());

    let first = block_on(injector.get(&token)).unwrap();
    let second = block_on(injector.get(&token)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_singleton_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let token = Token::<Connection>::new();
    let injector = Injector::new();
    injector
        .provide(
            &token,
            Provider::factory(move |_| {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    match call {
                        1 => Err::<Connection, DynError>("connection refused".into()),
                        call => Ok(Connection(call)),
                    }
                }
            })
            .singleton(),
        )
        .unwrap();

    assert!(matches!(
        block_on(injector.get(&token)),
        Err(InjectError::FactoryFailed { .. })
    ));
    assert_eq!(*block_on(injector.get(&token)).unwrap(), Connection(2));
    assert_eq!(*block_on(injector.get(&token)).unwrap(), Connection(2));
}

struct Services {
    name: String,
}
impl ProviderSet for Services {
    fn annotate(map: &mut ProviderMap<Self>) -> Result<(), InjectError> {
        map.provides("name", &*LABEL)
            .field("name", |services: &Services| services.name.clone());

        map.provides("doubled", &*DOUBLED)
            .singleton("doubled")
            .dependencies("doubled", [Injectable::from(&*ANSWER)])?
            .method("doubled", |_, deps: Vec<Instance>| async move {
                let answer = deps[0].downcast::<u32>()?;
                Ok::<_, InjectError>(*answer * 2)
            });

        map.provides("plain", ModuleType::of::<Plain>())
            .module_field("plain", |_: &Services| ModuleType::of::<Plain>());
        Ok(())
    }
}

#[test]
fn provider_object_registers_every_member() {
    let injector = Injector::new();
    injector
        .provide(&*ANSWER, Provider::value(21_u32))
        .unwrap()
        .provider(Services {
            name: "services".to_string(),
        })
        .unwrap();

    assert_eq!(block_on(injector.get(&*LABEL)).unwrap().as_str(), "services");

    let first = block_on(injector.get(&*DOUBLED)).unwrap();
    let second = block_on(injector.get(&*DOUBLED)).unwrap();
    assert_eq!(*first, 42);
    assert!(Arc::ptr_eq(&first, &second));

    let plain = block_on(injector.get_type::<Plain>()).unwrap();
    assert_eq!(plain.foo.as_deref(), Some(&21));
}

struct Unannotated;
impl ProviderSet for Unannotated {
    fn annotate(_: &mut ProviderMap<Self>) -> Result<(), InjectError> {
        Ok(())
    }
}

struct NoDependencies;
impl ProviderSet for NoDependencies {
    fn annotate(map: &mut ProviderMap<Self>) -> Result<(), InjectError> {
        map.provides("value", &*ANSWER)
            .dependencies("value", Vec::new())?;
        Ok(())
    }
}

#[test]
fn provider_objects_without_annotations_are_rejected() {
    assert!(matches!(
        Injector::new().provider(Unannotated),
        Err(InjectError::InvalidProviderObject { .. })
    ));
    assert!(matches!(
        Injector::new().provider(NoDependencies),
        Err(InjectError::EmptyDependencyList(key)) if key == "value"
    ));
}

#[test]
fn runtime_edges_reach_the_constructor() {
    let extra = Token::<String>::named("extra");
    let injector = answer_injector();
    injector
        .provide(&extra, Provider::value("extra".to_string()))
        .unwrap()
        .inject(ModuleType::of::<Plain>(), "extra", &extra);

    let edges = injector.with_metadata(|metadata| {
        metadata
            .ensure_dependency_edges(ModuleType::of::<Plain>())
            .len()
    });
    assert_eq!(edges, 2);

    let plain = block_on(injector.create::<Plain>()).unwrap();
    assert_eq!(plain.foo.as_deref(), Some(&42));
}
