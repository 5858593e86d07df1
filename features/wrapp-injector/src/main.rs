use std::sync::{Arc, LazyLock};

use tracing_subscriber::EnvFilter;
use wrapp_injector::{
    Constructor, DependencyEdges, DynError, Injectable, Injector, InjectError, Instance, Module,
    ModuleType, Params, ProviderMap, ProviderSet, Token,
};

static APP_NAME: LazyLock<Token<String>> = LazyLock::new(|| Token::named("app_name"));
static GREETING: LazyLock<Token<String>> = LazyLock::new(|| Token::named("greeting"));
static STORE: LazyLock<Token<Store>> = LazyLock::new(|| Token::named("store"));

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Injector::builder()
        .provider(AppProvider {
            app_name: "wrapp".to_string(),
        })
        .register::<Greeter>()
        .build()
        .unwrap();

    let greeter = futures::executor::block_on(app.get_type::<Greeter>()).unwrap();
    println!("{:?}", app);
    println!("{:?}", greeter);

    let handler = futures::executor::block_on(app.create::<Handler>()).unwrap();
    println!("{:?}", handler);
}

struct AppProvider {
    app_name: String,
}
impl ProviderSet for AppProvider {
    fn annotate(map: &mut ProviderMap<Self>) -> Result<(), InjectError> {
        map.provides("app_name", &*APP_NAME)
            .field("app_name", |this: &AppProvider| this.app_name.clone());

        map.provides("greeting", &*GREETING)
            .dependencies("greeting", [Injectable::from(&*APP_NAME)])?
            .method("greeting", |_, deps: Vec<Instance>| async move {
                let name = deps[0].downcast::<String>()?;
                Ok::<_, InjectError>(format!("Hello from {name}"))
            });

        map.provides("store", &*STORE)
            .singleton("store")
            .module_field("store", |_: &AppProvider| ModuleType::of::<Store>());
        Ok(())
    }
}

#[derive(Debug)]
struct Store;
impl Module for Store {
    fn constructor() -> Constructor<Self> {
        Constructor::Explicit(|_| Ok(Store))
    }
}

#[derive(Debug)]
struct Greeter {
    greeting: Arc<String>,
    store: Arc<Store>,
}
impl Module for Greeter {
    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("greeting", &*GREETING).inject("store", &*STORE);
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Explicit(|params: &mut Params| -> Result<Self, DynError> {
            Ok(Greeter {
                greeting: params.get("greeting")?,
                store: params.get("store")?,
            })
        })
    }
}

/// Has no constructor body, its fields are assigned one by one
#[derive(Debug, Default)]
struct Handler {
    greeter: Option<Arc<Greeter>>,
}
impl Module for Handler {
    fn dependencies(edges: &mut DependencyEdges) {
        edges.inject("greeter", ModuleType::of::<Greeter>());
    }

    fn constructor() -> Constructor<Self> {
        Constructor::Implicit(Handler::default)
    }

    fn assign(&mut self, key: &str, value: Instance) -> Result<(), DynError> {
        if key == "greeter" {
            self.greeter = Some(value.downcast()?);
        }
        Ok(())
    }
}
