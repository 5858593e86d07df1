use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt::Debug,
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    errors::MetadataError,
    module::{DependencyEdge, DependencyEdges, ModuleType},
    provider::{ProviderEntry, ProviderMap, ProviderSet},
    token::Injectable,
    types::TypeInfo,
};

/// A kind of metadata which can be attached to a type
///
/// Each slot is its own marker type, so two kinds of metadata never share storage
pub trait Slot: 'static {
    type Data: Send + Sync + 'static;
    const NAME: &'static str;

    /// Data for which there is nothing to attach
    fn is_absent(data: &Self::Data) -> bool {
        let _ = data;
        false
    }
}

/// The merged dependency edge list of a [ModuleType]
pub struct DependenciesSlot;
impl Slot for DependenciesSlot {
    type Data = Arc<DependencyEdges>;
    const NAME: &'static str = "dependencies";
}

/// The provider map of a [ProviderSet]
pub struct ProvidersSlot<P>(PhantomData<fn() -> P>);
impl<P: ProviderSet> Slot for ProvidersSlot<P> {
    type Data = ProviderMap<P>;
    const NAME: &'static str = "providers";

    fn is_absent(data: &Self::Data) -> bool {
        data.is_empty()
    }
}

/// Side-table holding metadata per type
///
/// Lookups only ever see what was attached to the very type asked for, merging
/// metadata of ancestors is an explicit step ([MetadataStore::ensure_dependency_edges]).
#[derive(Default)]
pub struct MetadataStore {
    slots: HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>,
}
impl Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `data` to `target`, replacing what was attached before
    pub fn annotate<S: Slot>(&mut self, target: TypeInfo, data: S::Data) -> Result<(), MetadataError> {
        if S::is_absent(&data) {
            return Err(MetadataError::EmptyAnnotation {
                target: target.type_name,
                slot: S::NAME,
            });
        }

        self.slots
            .insert((target.type_id, TypeId::of::<S>()), Box::new(data));
        Ok(())
    }

    /// Data attached directly to `target`
    pub fn get_metadata<S: Slot>(&self, target: TypeInfo) -> Option<&S::Data> {
        self.slots
            .get(&(target.type_id, TypeId::of::<S>()))
            .and_then(|data| data.downcast_ref())
    }

    pub fn get_metadata_mut<S: Slot>(&mut self, target: TypeInfo) -> Option<&mut S::Data> {
        self.slots
            .get_mut(&(target.type_id, TypeId::of::<S>()))
            .and_then(|data| data.downcast_mut())
    }

    /// Returns the edge list of `module`, inherited edges first
    ///
    /// Computed once per type, from the ancestor's merged list and the type's own
    /// declarations.
    pub fn ensure_dependency_edges(&mut self, module: ModuleType) -> Arc<DependencyEdges> {
        if let Some(edges) = self.get_metadata::<DependenciesSlot>(module.info()) {
            return edges.clone();
        }

        let mut merged = match module.parent() {
            Some(parent) => self.ensure_dependency_edges(parent).as_ref().clone(),
            None => DependencyEdges::new(),
        };
        for edge in module.declared_edges().into_vec() {
            merged.push(edge);
        }

        tracing::trace!(
            "Merged {} dependencies for {}",
            merged.len(),
            module.info().type_name
        );

        let merged = Arc::new(merged);
        self.slots.insert(
            (module.info().type_id, TypeId::of::<DependenciesSlot>()),
            Box::new(merged.clone()),
        );
        merged
    }

    /// Appends one edge to the own list of `module`
    ///
    /// Types which already merged this one's edges keep their list.
    pub fn inject(&mut self, module: ModuleType, key: impl Into<String>, token: Injectable) {
        let mut edges = self.ensure_dependency_edges(module).as_ref().clone();
        edges.push(DependencyEdge {
            key: key.into(),
            token,
        });
        self.slots.insert(
            (module.info().type_id, TypeId::of::<DependenciesSlot>()),
            Box::new(Arc::new(edges)),
        );
    }

    /// Gets or creates the provider map of `P`, then gets or creates the entry for `key`
    pub fn ensure_provider_map_entry<P: ProviderSet>(
        &mut self,
        key: &str,
    ) -> Result<&mut ProviderEntry<P>, MetadataError> {
        Ok(self.ensure_provider_map::<P>()?.ensure_entry(key))
    }

    fn ensure_provider_map<P: ProviderSet>(&mut self) -> Result<&mut ProviderMap<P>, MetadataError> {
        let info = TypeInfo::of::<P>();
        if self.get_metadata::<ProvidersSlot<P>>(info).is_none() {
            self.slots.insert(
                (info.type_id, TypeId::of::<ProvidersSlot<P>>()),
                Box::new(ProviderMap::<P>::new()),
            );
        }

        self.get_metadata_mut::<ProvidersSlot<P>>(info)
            .ok_or(MetadataError::Unavailable {
                target: info.type_name,
                slot: ProvidersSlot::<P>::NAME,
            })
    }
}
