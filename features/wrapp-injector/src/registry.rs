use std::collections::HashMap;

use futures::{
    future::{ready, BoxFuture, Shared},
    FutureExt,
};

use crate::{
    errors::InjectError,
    provider::{Provider, ProviderKind},
    token::Injectable,
    types::Instance,
};

/// A resolution which can be awaited by more than one caller
pub(crate) type SharedResolution = Shared<BoxFuture<'static, Result<Instance, InjectError>>>;

/// Unresolved -> Resolving -> Resolved, only walked by singletons
enum SingletonState {
    Unresolved,
    Resolving {
        id: u64,
        resolution: SharedResolution,
    },
    Resolved(Instance),
}

struct Descriptor {
    kind: ProviderKind,
    /// Changes whenever the token is provided again
    generation: u64,
    state: SingletonState,
}

/// What has to happen to resolve a token
pub(crate) enum Lookup {
    Ready(Instance),
    InFlight(SharedResolution),
    Resolve {
        kind: ProviderKind,
        singleton: bool,
        generation: u64,
    },
}

/// Providers by identity, owned by exactly one injector
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<Injectable, Descriptor>,
    generation: u64,
    resolutions: u64,
}

impl Registry {
    /// Registers `provider`, replacing any previous provider of `token`
    ///
    /// Returns true if a provider was replaced
    pub(crate) fn insert(&mut self, token: Injectable, provider: Provider) -> bool {
        self.generation += 1;
        self.entries
            .insert(
                token,
                Descriptor {
                    kind: provider.into_kind(),
                    generation: self.generation,
                    state: SingletonState::Unresolved,
                },
            )
            .is_some()
    }

    pub(crate) fn contains(&self, token: &Injectable) -> bool {
        self.entries.contains_key(token)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn lookup(&self, token: &Injectable) -> Option<Lookup> {
        let descriptor = self.entries.get(token)?;

        let (singleton, state) = match &descriptor.kind {
            ProviderKind::Value(value) => return Some(Lookup::Ready(value.clone())),
            ProviderKind::Factory { singleton, .. } | ProviderKind::Module { singleton, .. } => {
                (*singleton, &descriptor.state)
            }
        };

        Some(match state {
            SingletonState::Resolved(value) => Lookup::Ready(value.clone()),
            SingletonState::Resolving { resolution, .. } => Lookup::InFlight(resolution.clone()),
            SingletonState::Unresolved => Lookup::Resolve {
                kind: descriptor.kind.clone(),
                singleton,
                generation: descriptor.generation,
            },
        })
    }

    /// Marks a singleton as in flight with the resolution built by `start`
    ///
    /// `start` receives the id the resolution has to finish with. If someone else
    /// got there first, their resolution is returned and `start` is not called.
    pub(crate) fn begin_resolution(
        &mut self,
        token: &Injectable,
        generation: u64,
        start: impl FnOnce(u64) -> SharedResolution,
    ) -> SharedResolution {
        self.resolutions += 1;
        let id = self.resolutions;

        let Some(descriptor) = self.current(token, generation) else {
            return start(id);
        };

        match &descriptor.state {
            SingletonState::Resolved(value) => return ready(Ok(value.clone())).boxed().shared(),
            SingletonState::Resolving { resolution, .. } => return resolution.clone(),
            SingletonState::Unresolved => {}
        }

        tracing::trace!("Singleton {token} is resolving");
        let resolution = start(id);
        descriptor.state = SingletonState::Resolving {
            id,
            resolution: resolution.clone(),
        };
        resolution
    }

    /// Stores the outcome of the in flight resolution `id`
    ///
    /// Failures return the singleton to unresolved, so it is retried on the next lookup.
    /// Outcomes of any other resolution are ignored.
    pub(crate) fn finish_resolution(
        &mut self,
        token: &Injectable,
        generation: u64,
        id: u64,
        result: &Result<Instance, InjectError>,
    ) {
        let Some(descriptor) = self.current(token, generation) else {
            return;
        };

        if !matches!(descriptor.state, SingletonState::Resolving { id: current, .. } if current == id) {
            return;
        }

        descriptor.state = match result {
            Ok(value) => {
                tracing::trace!("Singleton {token} resolved");
                SingletonState::Resolved(value.clone())
            }
            Err(_) => SingletonState::Unresolved,
        };
    }

    /// Caches a singleton resolved without deduplication
    pub(crate) fn store_resolved(&mut self, token: &Injectable, generation: u64, value: Instance) {
        if let Some(descriptor) = self.current(token, generation) {
            tracing::trace!("Singleton {token} resolved");
            descriptor.state = SingletonState::Resolved(value);
        }
    }

    /// The descriptor of `token`, if it still is the registration of `generation`
    fn current(&mut self, token: &Injectable, generation: u64) -> Option<&mut Descriptor> {
        self.entries
            .get_mut(token)
            .filter(|descriptor| descriptor.generation == generation)
    }
}
