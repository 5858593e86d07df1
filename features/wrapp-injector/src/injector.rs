use std::{
    any::type_name,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{
    future::{try_join_all, BoxFuture},
    FutureExt, TryFutureExt,
};

use crate::{
    builder::InjectorBuilder,
    config::{InjectorOptions, SingletonResolution},
    errors::{InjectError, MetadataError},
    metadata::{MetadataStore, ProvidersSlot},
    module::{DependencyEdge, Module, ModuleType, Params},
    provider::{Provider, ProviderKind, ProviderMap, ProviderSet},
    registry::{Lookup, Registry},
    token::{Injectable, Token},
    types::{Instance, Provided, TypeInfo},
};

/// Registry of providers and the engine resolving them
///
/// Cloning is cheap, clones share the same registry. Separate injectors never share
/// anything.
///
/// ```rust
/// use wrapp_injector::{Injectable, Injector, Provider, Token};
///
/// let base = Token::<u32>::named("base");
/// let answer = Token::<u32>::named("answer");
///
/// let injector = Injector::new();
/// injector
///     .provide(&base, Provider::value(21_u32))
///     .unwrap()
///     .provide(
///         &answer,
///         Provider::factory(|deps| async move {
///             let base = deps[0].downcast::<u32>()?;
///             Ok::<_, wrapp_injector::InjectError>(*base * 2)
///         })
///         .depends_on([Injectable::from(&base)]),
///     )
///     .unwrap();
///
/// let resolved = futures::executor::block_on(injector.get(&answer)).unwrap();
/// assert_eq!(*resolved, 42);
/// ```
#[derive(Clone, Default)]
pub struct Injector(Arc<InjectorInner>);

#[derive(Default)]
struct InjectorInner {
    options: InjectorOptions,
    registry: Mutex<Registry>,
    metadata: Mutex<MetadataStore>,
}

impl Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("options", &self.0.options)
            .field("providers", &self.registry().len())
            .finish()
    }
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InjectorOptions) -> Self {
        Injector(Arc::new(InjectorInner {
            options,
            ..Default::default()
        }))
    }

    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub fn options(&self) -> InjectorOptions {
        self.0.options
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.0
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn metadata(&self) -> MutexGuard<'_, MetadataStore> {
        self.0
            .metadata
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with the metadata side-table of this injector
    pub fn with_metadata<R>(&self, f: impl FnOnce(&mut MetadataStore) -> R) -> R {
        f(&mut self.metadata())
    }
}

// Registration
impl Injector {
    /// Registers how `token` is provided, replacing any previous provider
    ///
    /// Without a provider a module type provides itself, tokens always need one.
    pub fn provide(
        &self,
        token: impl Into<Injectable>,
        provider: impl Into<Option<Provider>>,
    ) -> Result<&Self, InjectError> {
        let token = token.into();
        let provider = match (provider.into(), token) {
            (Some(provider), _) => provider,
            (None, Injectable::Module(module)) => Provider::from(module),
            (None, Injectable::Token(_)) => {
                return Err(InjectError::InvalidInjectable {
                    injectable: token.to_string(),
                    reason: "a token can not be provided without a provider",
                })
            }
        };

        tracing::debug!("Providing {token}");
        if self.registry().insert(token, provider) {
            tracing::debug!("Replaced previous provider of {token}");
        }
        Ok(self)
    }

    /// Registers every annotated member of a provider object
    pub fn provider<P: ProviderSet>(&self, provider: P) -> Result<&Self, InjectError> {
        self.provider_shared(Arc::new(provider))
    }

    /// Like [Injector::provider] for an object which is shared elsewhere
    pub fn provider_shared<P: ProviderSet>(&self, provider: Arc<P>) -> Result<&Self, InjectError> {
        let bound = {
            let mut metadata = self.metadata();
            let info = TypeInfo::of::<P>();
            if metadata.get_metadata::<ProvidersSlot<P>>(info).is_none() {
                let mut map = ProviderMap::<P>::new();
                P::annotate(&mut map)?;
                match metadata.annotate::<ProvidersSlot<P>>(info, map) {
                    Ok(()) => {}
                    Err(MetadataError::EmptyAnnotation { .. }) => {
                        return Err(InjectError::InvalidProviderObject {
                            provider: type_name::<P>(),
                            reason: "it does not annotate any member".to_string(),
                        })
                    }
                    Err(error) => return Err(error.into()),
                }
            }

            let Some(map) = metadata.get_metadata::<ProvidersSlot<P>>(info) else {
                return Err(InjectError::InvalidProviderObject {
                    provider: type_name::<P>(),
                    reason: "its provider map is missing".to_string(),
                });
            };

            map.iter()
                .map(|(key, entry)| entry.bind(key, &provider))
                .collect::<Result<Vec<_>, _>>()?
        };

        tracing::debug!(
            "Registering {} members of provider {}",
            bound.len(),
            type_name::<P>()
        );
        for (token, provider) in bound {
            self.provide(token, provider)?;
        }
        Ok(self)
    }

    /// Adds a dependency edge to `module` at runtime
    pub fn inject(
        &self,
        module: ModuleType,
        key: impl Into<String>,
        token: impl Into<Injectable>,
    ) -> &Self {
        self.metadata().inject(module, key, token.into());
        self
    }

    /// Computes the merged dependency edges of `module` now instead of on first use
    pub fn injectable(&self, module: ModuleType) -> &Self {
        let edges = self.metadata().ensure_dependency_edges(module);
        tracing::debug!("{module} declares {} dependencies", edges.len());
        self
    }

    pub fn is_provided(&self, token: impl Into<Injectable>) -> bool {
        self.registry().contains(&token.into())
    }
}

// Resolution
impl Injector {
    /// Resolves the value of `token`
    pub async fn get<T: Provided>(&self, token: &Token<T>) -> Result<Arc<T>, InjectError> {
        self.resolve_dependency(token.into()).await?.downcast()
    }

    /// Resolves the provider registered for the module type `T`
    pub async fn get_type<T: Module>(&self) -> Result<Arc<T>, InjectError> {
        self.resolve_dependency(Injectable::of::<T>())
            .await?
            .downcast()
    }

    /// Resolves `token` without knowing the type it resolves to
    pub async fn get_instance(&self, token: impl Into<Injectable>) -> Result<Instance, InjectError> {
        self.resolve_dependency(token.into()).await
    }

    /// Resolves `token` and everything it depends on
    ///
    /// Singletons are cached after their first resolution, everything else is
    /// produced anew on every call.
    pub fn resolve_dependency(&self, token: Injectable) -> BoxFuture<'static, Result<Instance, InjectError>> {
        let injector = self.clone();
        async move {
            let lookup = injector.registry().lookup(&token);
            let Some(lookup) = lookup else {
                tracing::error!("No provider registered for {token}");
                return Err(InjectError::ProviderNotFound(token));
            };

            let (kind, singleton, generation) = match lookup {
                Lookup::Ready(value) => {
                    tracing::trace!("Resolved {token} from cache");
                    return Ok(value);
                }
                Lookup::InFlight(resolution) => return resolution.await,
                Lookup::Resolve {
                    kind,
                    singleton,
                    generation,
                } => (kind, singleton, generation),
            };

            if !singleton {
                return injector.execute(token, kind).await;
            }

            match injector.0.options.singleton_resolution {
                SingletonResolution::Race => {
                    let value = injector.execute(token, kind).await?;
                    injector
                        .registry()
                        .store_resolved(&token, generation, value.clone());
                    Ok(value)
                }
                SingletonResolution::Deduplicate => {
                    // Whoever polls the shared resolution to completion records its
                    // outcome, callers may be dropped at any point
                    let start = |id| {
                        let injector = injector.clone();
                        async move {
                            let result = injector.execute(token, kind).await;
                            injector
                                .registry()
                                .finish_resolution(&token, generation, id, &result);
                            result
                        }
                        .boxed()
                        .shared()
                    };
                    let resolution = injector
                        .registry()
                        .begin_resolution(&token, generation, start);
                    resolution.await
                }
            }
        }
        .boxed()
    }

    /// Resolves every edge concurrently into one keyed bag
    pub async fn resolve_dependencies<'a>(
        &self,
        edges: impl IntoIterator<Item = &'a DependencyEdge>,
    ) -> Result<Params, InjectError> {
        let resolutions = edges.into_iter().map(|edge| {
            let key = edge.key.clone();
            self.resolve_dependency(edge.token)
                .map_ok(move |value| (key, value))
        });

        let resolved = try_join_all(resolutions).await?;
        Ok(resolved.into_iter().collect())
    }

    /// Produces a value with the strategy of a provider
    async fn execute(&self, token: Injectable, kind: ProviderKind) -> Result<Instance, InjectError> {
        match kind {
            ProviderKind::Value(value) => Ok(value),
            ProviderKind::Factory {
                factory,
                dependencies,
                ..
            } => {
                let resolved = try_join_all(
                    dependencies
                        .into_iter()
                        .map(|dependency| self.resolve_dependency(dependency)),
                )
                .await?;

                tracing::trace!("Calling factory of {token} with {} dependencies", resolved.len());
                factory
                    .call(resolved)
                    .await
                    .map_err(|error| InjectError::FactoryFailed {
                        product: token.to_string(),
                        error: Arc::new(error),
                    })
            }
            ProviderKind::Module { module, .. } => self.create_module(module, None).await,
        }
    }
}

// Construction
impl Injector {
    /// Constructs `T` with its dependencies resolved
    pub async fn create<T: Module>(&self) -> Result<Arc<T>, InjectError> {
        self.create_module(ModuleType::of::<T>(), None)
            .await?
            .downcast()
    }

    /// Constructs `T`, entries of `params` replace resolved dependencies of the same key
    pub async fn create_with<T: Module>(&self, params: Params) -> Result<Arc<T>, InjectError> {
        self.create_module(ModuleType::of::<T>(), Some(params))
            .await?
            .downcast()
    }

    /// Constructs an identity which is expected to be a module type
    pub async fn create_injectable(
        &self,
        target: &Injectable,
        params: Option<Params>,
    ) -> Result<Instance, InjectError> {
        let Some(module) = target.as_module() else {
            return Err(InjectError::ConstructTarget(*target));
        };
        self.create_module(module, params).await
    }

    pub async fn create_module(
        &self,
        module: ModuleType,
        params: Option<Params>,
    ) -> Result<Instance, InjectError> {
        let edges = self.metadata().ensure_dependency_edges(module);

        let mut resolved = if edges.is_empty() {
            Params::new()
        } else {
            self.resolve_dependencies(edges.iter()).await?
        };
        if let Some(params) = params {
            resolved.merge(params);
        }

        let instance = module
            .build(resolved)
            .map_err(|error| InjectError::ConstructionFailed {
                module: module.info().type_name,
                error: Arc::new(error),
            })?;

        tracing::debug!("Constructed instance of {module}");
        Ok(instance)
    }
}
