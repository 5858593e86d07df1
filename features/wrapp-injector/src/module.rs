use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
};

use crate::{
    errors::InjectError,
    token::Injectable,
    types::{DynError, Instance, Provided, TypeInfo},
};

/// A type the injector can construct itself
///
/// Dependencies are declared statically, the injector resolves them into a
/// [Params] bag and hands that bag to the type's [Constructor].
///
/// ```rust
/// use std::sync::Arc;
/// use wrapp_injector::{Constructor, DependencyEdges, DynError, Module, Params, Token};
///
/// struct Greeter {
///     name: Arc<String>,
/// }
/// impl Module for Greeter {
///     fn dependencies(edges: &mut DependencyEdges) {
///         edges.inject("name", Token::<String>::named("name"));
///     }
///
///     fn constructor() -> Constructor<Self> {
///         Constructor::Explicit(|params: &mut Params| -> Result<Self, DynError> {
///             Ok(Greeter {
///                 name: params.get("name")?,
///             })
///         })
///     }
/// }
/// ```
pub trait Module: Provided + Sized {
    /// Nearest ancestor whose dependency declarations are inherited
    fn parent() -> Option<ModuleType> {
        None
    }

    /// Declares the type's own dependencies, inherited ones are added by the injector
    fn dependencies(edges: &mut DependencyEdges) {
        let _ = edges;
    }

    fn constructor() -> Constructor<Self>;

    /// Receives every bag entry when the type has no explicit constructor of its own
    ///
    /// This includes types under an ancestor with an explicit constructor, the bag
    /// then holds the ancestor's dependencies too.
    fn assign(&mut self, key: &str, value: Instance) -> Result<(), DynError> {
        let _ = (key, value);
        Ok(())
    }
}

/// How a [Module] is instantiated
pub enum Constructor<T> {
    /// A constructor body receiving the merged parameter bag
    Explicit(fn(&mut Params) -> Result<T, DynError>),
    /// No constructor body, fields are filled through [Module::assign]
    Implicit(fn() -> T),
}

/// Type-erased handle of a [Module]
#[derive(Clone, Copy)]
pub struct ModuleType {
    info: TypeInfo,
    parent: fn() -> Option<ModuleType>,
    declare: fn(&mut DependencyEdges),
    explicit_constructor: fn() -> bool,
    build: fn(Params) -> Result<Instance, DynError>,
}

impl ModuleType {
    pub fn of<T: Module>() -> Self {
        ModuleType {
            info: TypeInfo::of::<T>(),
            parent: T::parent,
            declare: T::dependencies,
            explicit_constructor: has_explicit_constructor::<T>,
            build: build::<T>,
        }
    }

    pub fn info(&self) -> TypeInfo {
        self.info
    }

    pub fn parent(&self) -> Option<ModuleType> {
        (self.parent)()
    }

    /// The type itself followed by all its ancestors up to the inheritance root
    pub fn ancestry(&self) -> impl Iterator<Item = ModuleType> {
        std::iter::successors(Some(*self), ModuleType::parent)
    }

    /// Whether the type or any of its ancestors declares an explicit constructor
    pub fn has_constructor(&self) -> bool {
        self.ancestry().any(|module| (module.explicit_constructor)())
    }

    /// Edges declared by the type itself, without inherited ones
    pub fn declared_edges(&self) -> DependencyEdges {
        let mut edges = DependencyEdges::new();
        (self.declare)(&mut edges);
        edges
    }

    pub(crate) fn build(&self, params: Params) -> Result<Instance, DynError> {
        (self.build)(params)
    }
}
impl PartialEq for ModuleType {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}
impl Eq for ModuleType {}
impl Hash for ModuleType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.hash(state)
    }
}
impl Debug for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModuleType").field(&self.info.type_name).finish()
    }
}
impl Display for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.info, f)
    }
}

fn has_explicit_constructor<T: Module>() -> bool {
    matches!(T::constructor(), Constructor::Explicit(_))
}

fn build<T: Module>(mut params: Params) -> Result<Instance, DynError> {
    let instance = match T::constructor() {
        Constructor::Explicit(construct) => construct(&mut params)?,
        Constructor::Implicit(init) => {
            let mut instance = init();
            for (key, value) in params {
                instance.assign(&key, value)?;
            }
            instance
        }
    };

    Ok(Instance::new(instance))
}

/// Declares that constructing a type requires `token`, placed under `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub key: String,
    pub token: Injectable,
}

/// Ordered list of [DependencyEdge]s
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyEdges(Vec<DependencyEdge>);

impl DependencyEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, key: impl Into<String>, token: impl Into<Injectable>) -> &mut Self {
        self.0.push(DependencyEdge {
            key: key.into(),
            token: token.into(),
        });
        self
    }

    pub fn push(&mut self, edge: DependencyEdge) {
        self.0.push(edge);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DependencyEdge> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<DependencyEdge> {
        self.0
    }
}
impl From<Vec<DependencyEdge>> for DependencyEdges {
    fn from(edges: Vec<DependencyEdge>) -> Self {
        DependencyEdges(edges)
    }
}
impl<'a> IntoIterator for &'a DependencyEdges {
    type Item = &'a DependencyEdge;
    type IntoIter = std::slice::Iter<'a, DependencyEdge>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Keyed bag of resolved dependencies handed to a constructor
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<String, Instance>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Provided) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Provided) -> Option<Instance> {
        self.insert_instance(key, Instance::new(value))
    }

    pub fn insert_instance(&mut self, key: impl Into<String>, value: Instance) -> Option<Instance> {
        self.values.insert(key.into(), value)
    }

    pub fn get<T: Provided>(&self, key: &str) -> Result<std::sync::Arc<T>, InjectError> {
        self.instance(key)?.downcast()
    }

    pub fn instance(&self, key: &str) -> Result<&Instance, InjectError> {
        self.values
            .get(key)
            .ok_or_else(|| InjectError::MissingParameter {
                key: key.to_string(),
            })
    }

    /// Removes the entry, so it is not assigned to the instance afterwards
    pub fn take<T: Provided>(&mut self, key: &str) -> Result<std::sync::Arc<T>, InjectError> {
        let value = self
            .values
            .remove(key)
            .ok_or_else(|| InjectError::MissingParameter {
                key: key.to_string(),
            })?;
        value.downcast()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merges `other` into this bag - entries of `other` win
    pub fn merge(&mut self, other: Params) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}
impl FromIterator<(String, Instance)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Instance)>>(iter: I) -> Self {
        Params {
            values: iter.into_iter().collect(),
        }
    }
}
impl IntoIterator for Params {
    type Item = (String, Instance);
    type IntoIter = std::collections::hash_map::IntoIter<String, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
