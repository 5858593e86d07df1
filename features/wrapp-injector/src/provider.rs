use std::{any::type_name, fmt::Debug, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::{
    errors::InjectError,
    module::{Module, ModuleType},
    token::Injectable,
    types::{DynError, Instance, Provided},
};

/// Future returned by a [Factory]
pub type FactoryFuture = BoxFuture<'static, Result<Instance, DynError>>;

/// A callable producing a value from its positional, already resolved dependencies
#[derive(Clone)]
pub struct Factory(Arc<dyn Fn(Vec<Instance>) -> FactoryFuture + Send + Sync>);

impl Factory {
    /// Wraps an async function returning a concrete value
    pub fn new<F, Fut, T, E>(factory: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Provided,
        E: Into<DynError>,
    {
        Factory::from_instances(move |dependencies| {
            let produced = factory(dependencies);
            async move { produced.await.map(Instance::new) }
        })
    }

    /// Wraps an async function which already returns an [Instance]
    pub fn from_instances<F, Fut, E>(factory: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Instance, E>> + Send + 'static,
        E: Into<DynError>,
    {
        Factory(Arc::new(move |dependencies| {
            factory(dependencies)
                .map(|result| result.map_err(Into::<DynError>::into))
                .boxed()
        }))
    }

    pub fn call(&self, dependencies: Vec<Instance>) -> FactoryFuture {
        (self.0)(dependencies)
    }
}
impl Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Factory")
    }
}

/// Strategy used to satisfy an [Injectable]
#[derive(Debug, Clone)]
pub enum ProviderKind {
    /// Already resolved
    Value(Instance),
    /// Dependencies are resolved concurrently and passed in order
    Factory {
        factory: Factory,
        dependencies: Vec<Injectable>,
        singleton: bool,
    },
    /// Built by the construction protocol
    Module { module: ModuleType, singleton: bool },
}

/// A provider to register with [crate::Injector::provide]
#[derive(Debug, Clone)]
pub struct Provider {
    kind: ProviderKind,
}

impl Provider {
    pub fn value(value: impl Provided) -> Self {
        Self::instance(Instance::new(value))
    }

    pub fn instance(instance: Instance) -> Self {
        Provider {
            kind: ProviderKind::Value(instance),
        }
    }

    /// A factory without dependencies, add them with [Provider::depends_on]
    ///
    /// ```rust
    /// use wrapp_injector::{Injectable, Provider, Token};
    ///
    /// let base = Token::<u32>::new();
    /// let provider = Provider::factory(|deps| async move {
    ///     let base = deps[0].downcast::<u32>()?;
    ///     Ok::<_, wrapp_injector::InjectError>(*base + 42)
    /// })
    /// .depends_on([Injectable::from(&base)]);
    /// ```
    pub fn factory<F, Fut, T, E>(factory: F) -> Self
    where
        F: Fn(Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Provided,
        E: Into<DynError>,
    {
        Self::from_factory(Factory::new(factory))
    }

    pub fn from_factory(factory: Factory) -> Self {
        Provider {
            kind: ProviderKind::Factory {
                factory,
                dependencies: Vec::new(),
                singleton: false,
            },
        }
    }

    pub fn module<T: Module>() -> Self {
        ModuleType::of::<T>().into()
    }

    /// Sets the positional dependencies of a factory - ignored by other kinds
    pub fn depends_on(mut self, tokens: impl IntoIterator<Item = Injectable>) -> Self {
        if let ProviderKind::Factory { dependencies, .. } = &mut self.kind {
            *dependencies = tokens.into_iter().collect();
        }
        self
    }

    /// Caches the first resolved value - values are always cached
    pub fn singleton(self) -> Self {
        self.with_singleton(true)
    }

    pub fn with_singleton(mut self, enabled: bool) -> Self {
        match &mut self.kind {
            ProviderKind::Value(_) => {}
            ProviderKind::Factory { singleton, .. } | ProviderKind::Module { singleton, .. } => {
                *singleton = enabled
            }
        }
        self
    }

    pub fn is_singleton(&self) -> bool {
        match &self.kind {
            ProviderKind::Value(_) => true,
            ProviderKind::Factory { singleton, .. } | ProviderKind::Module { singleton, .. } => {
                *singleton
            }
        }
    }

    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    pub fn into_kind(self) -> ProviderKind {
        self.kind
    }
}
impl From<ModuleType> for Provider {
    fn from(module: ModuleType) -> Self {
        Provider {
            kind: ProviderKind::Module {
                module,
                singleton: false,
            },
        }
    }
}

/// An object whose members provide dependencies
///
/// The provider map is built once per type and describes, per member key, the
/// token the member provides and how the member is turned into a [Provider].
///
/// ```rust
/// use std::sync::LazyLock;
/// use wrapp_injector::{InjectError, ProviderMap, ProviderSet, Token};
///
/// static URL: LazyLock<Token<String>> = LazyLock::new(|| Token::named("url"));
///
/// struct Settings {
///     url: String,
/// }
/// impl ProviderSet for Settings {
///     fn annotate(map: &mut ProviderMap<Self>) -> Result<(), InjectError> {
///         map.provides("url", &*URL)
///             .field("url", |settings: &Settings| settings.url.clone());
///         Ok(())
///     }
/// }
/// ```
pub trait ProviderSet: Provided + Sized {
    fn annotate(map: &mut ProviderMap<Self>) -> Result<(), InjectError>;
}

type FieldFn<P> = Arc<dyn Fn(&P) -> Instance + Send + Sync>;
type MethodFn<P> = Arc<dyn Fn(Arc<P>, Vec<Instance>) -> FactoryFuture + Send + Sync>;
type ModuleFieldFn<P> = Arc<dyn Fn(&P) -> ModuleType + Send + Sync>;

/// How a member of a provider object provides its token
pub enum ProviderMember<P> {
    /// A precomputed value
    Field(FieldFn<P>),
    /// A factory bound to the provider object
    Method(MethodFn<P>),
    /// A constructible type held by the provider object
    ModuleField(ModuleFieldFn<P>),
}
impl<P> Clone for ProviderMember<P> {
    fn clone(&self) -> Self {
        match self {
            ProviderMember::Field(get) => ProviderMember::Field(get.clone()),
            ProviderMember::Method(call) => ProviderMember::Method(call.clone()),
            ProviderMember::ModuleField(get) => ProviderMember::ModuleField(get.clone()),
        }
    }
}
impl<P> Debug for ProviderMember<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProviderMember::Field(_) => "Field",
            ProviderMember::Method(_) => "Method",
            ProviderMember::ModuleField(_) => "ModuleField",
        })
    }
}

/// Annotations of one member of a provider object
pub struct ProviderEntry<P> {
    pub token: Option<Injectable>,
    pub dependencies: Option<Vec<Injectable>>,
    pub singleton: bool,
    pub member: Option<ProviderMember<P>>,
}
impl<P> Default for ProviderEntry<P> {
    fn default() -> Self {
        ProviderEntry {
            token: None,
            dependencies: None,
            singleton: false,
            member: None,
        }
    }
}
impl<P> Debug for ProviderEntry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("token", &self.token)
            .field("dependencies", &self.dependencies)
            .field("singleton", &self.singleton)
            .field("member", &self.member)
            .finish()
    }
}

impl<P: ProviderSet> ProviderEntry<P> {
    /// Turns the entry into the token it provides and a provider bound to `provider`
    pub(crate) fn bind(&self, key: &str, provider: &Arc<P>) -> Result<(Injectable, Provider), InjectError> {
        let token = self.token.ok_or_else(|| InjectError::InvalidInjectable {
            injectable: format!("{}::{key}", type_name::<P>()),
            reason: "provider member does not declare the token it provides",
        })?;

        let member = self
            .member
            .as_ref()
            .ok_or_else(|| InjectError::InvalidProviderObject {
                provider: type_name::<P>(),
                reason: format!("member '{key}' is neither a field, a method nor a module"),
            })?;

        let provider = match member {
            ProviderMember::Field(get) => Provider::instance(get(provider.as_ref())),
            ProviderMember::Method(call) => {
                let call = call.clone();
                let this = provider.clone();
                Provider::from_factory(Factory(Arc::new(move |dependencies| {
                    call(this.clone(), dependencies)
                })))
                .depends_on(self.dependencies.clone().unwrap_or_default())
                .with_singleton(self.singleton)
            }
            ProviderMember::ModuleField(get) => {
                Provider::from(get(provider.as_ref())).with_singleton(self.singleton)
            }
        };

        Ok((token, provider))
    }
}

/// Per member annotations of a [ProviderSet], in declaration order
///
/// Every annotation only touches its own field of an entry, so they can be
/// applied in any order.
pub struct ProviderMap<P> {
    entries: Vec<(String, ProviderEntry<P>)>,
}
impl<P> Default for ProviderMap<P> {
    fn default() -> Self {
        ProviderMap {
            entries: Vec::new(),
        }
    }
}
impl<P> Debug for ProviderMap<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(key, entry)| (key, entry)))
            .finish()
    }
}

impl<P: ProviderSet> ProviderMap<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&ProviderEntry<P>> {
        self.entries
            .iter()
            .find(|(entry_key, _)| entry_key == key)
            .map(|(_, entry)| entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderEntry<P>)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Gets the entry for `key`, creating an empty one if needed
    pub fn ensure_entry(&mut self, key: &str) -> &mut ProviderEntry<P> {
        let index = match self.entries.iter().position(|(entry_key, _)| entry_key == key) {
            Some(index) => index,
            None => {
                self.entries.push((key.to_string(), ProviderEntry::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    /// The member at `key` provides `token`
    pub fn provides(&mut self, key: &str, token: impl Into<Injectable>) -> &mut Self {
        self.ensure_entry(key).token = Some(token.into());
        self
    }

    /// The member at `key` is resolved at most once
    pub fn singleton(&mut self, key: &str) -> &mut Self {
        self.ensure_entry(key).singleton = true;
        self
    }

    /// Positional dependencies of the method at `key`
    pub fn dependencies(
        &mut self,
        key: &str,
        tokens: impl IntoIterator<Item = Injectable>,
    ) -> Result<&mut Self, InjectError> {
        let tokens: Vec<_> = tokens.into_iter().collect();
        if tokens.is_empty() {
            return Err(InjectError::EmptyDependencyList(key.to_string()));
        }

        self.ensure_entry(key).dependencies = Some(tokens);
        Ok(self)
    }

    /// The member at `key` is a precomputed value
    pub fn field<T, F>(&mut self, key: &str, get: F) -> &mut Self
    where
        T: Provided,
        F: Fn(&P) -> T + Send + Sync + 'static,
    {
        self.ensure_entry(key).member = Some(ProviderMember::Field(Arc::new(move |provider| {
            Instance::new(get(provider))
        })));
        self
    }

    /// The member at `key` is a factory method, called with the provider object
    pub fn method<F, Fut, T, E>(&mut self, key: &str, call: F) -> &mut Self
    where
        F: Fn(Arc<P>, Vec<Instance>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Provided,
        E: Into<DynError>,
    {
        self.ensure_entry(key).member = Some(ProviderMember::Method(Arc::new(
            move |provider, dependencies| {
                call(provider, dependencies)
                    .map(|result| result.map(Instance::new).map_err(Into::<DynError>::into))
                    .boxed()
            },
        )));
        self
    }

    /// The member at `key` holds a constructible type
    pub fn module_field<F>(&mut self, key: &str, get: F) -> &mut Self
    where
        F: Fn(&P) -> ModuleType + Send + Sync + 'static,
    {
        self.ensure_entry(key).member = Some(ProviderMember::ModuleField(Arc::new(get)));
        self
    }
}
