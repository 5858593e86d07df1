use crate::{
    config::{InjectorOptions, SingletonResolution},
    errors::InjectError,
    injector::Injector,
    module::{Module, ModuleType},
    provider::{Provider, ProviderSet},
    token::Injectable,
};

type Registration = Box<dyn FnOnce(&Injector) -> Result<(), InjectError> + Send>;

/// Declarative setup of an [Injector]
///
/// Registrations are recorded in order and applied by [InjectorBuilder::build],
/// which stops at the first one failing.
///
/// ```rust
/// use wrapp_injector::{Injector, Provider, SingletonResolution, Token};
///
/// let port = Token::<u16>::named("port");
/// let injector = Injector::builder()
///     .singleton_resolution(SingletonResolution::Deduplicate)
///     .provide(&port, Provider::value(8080_u16))
///     .build()
///     .unwrap();
///
/// assert!(injector.is_provided(&port));
/// ```
pub struct InjectorBuilder {
    options: InjectorOptions,
    registrations: Vec<Registration>,
}
impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InjectorBuilder {
    pub fn new() -> Self {
        InjectorBuilder {
            options: InjectorOptions::default(),
            registrations: Vec::new(),
        }
    }
}
impl InjectorBuilder {
    pub fn options(mut self, options: InjectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn singleton_resolution(mut self, mode: SingletonResolution) -> Self {
        self.options = self.options.singleton_resolution(mode);
        self
    }

    /// See [Injector::provide]
    pub fn provide(
        mut self,
        token: impl Into<Injectable>,
        provider: impl Into<Option<Provider>>,
    ) -> Self {
        let token = token.into();
        let provider = provider.into();
        self.registrations.push(Box::new(move |injector| {
            injector.provide(token, provider).map(|_| ())
        }));
        self
    }

    /// See [Injector::provider]
    pub fn provider<P: ProviderSet>(mut self, provider: P) -> Self {
        self.registrations.push(Box::new(move |injector| {
            injector.provider(provider).map(|_| ())
        }));
        self
    }

    /// Registers a module type: merges its dependency edges up front and lets it
    /// provide itself
    pub fn register<T: Module>(mut self) -> Self {
        self.registrations.push(Box::new(|injector| {
            let module = ModuleType::of::<T>();
            injector.injectable(module).provide(module, None).map(|_| ())
        }));
        self
    }

    pub fn build(self) -> Result<Injector, InjectError> {
        let injector = Injector::with_options(self.options);

        tracing::debug!(
            "Building injector with {} registrations",
            self.registrations.len()
        );
        for registration in self.registrations {
            registration(&injector)?;
        }

        Ok(injector)
    }
}
