use std::{
    any::{type_name, Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

use crate::errors::InjectError;

/// Boxed error returned by factories and constructors
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// We assume that resolution may hop between threads of an async runtime,
/// so anything handed out by the injector needs to be Send + Sync + 'static
pub trait Provided: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Provided for T {}

/// A resolved value with its concrete type erased
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

impl Instance {
    pub fn new<ExistingInstance: Provided>(instance: ExistingInstance) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<ExistingInstance: Provided>(instance: Arc<ExistingInstance>) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance,
        }
    }

    pub fn downcast<T: Provided>(&self) -> Result<Arc<T>, InjectError> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(InjectError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type: self.info.type_name,
            }),
        }
    }

    pub fn is<T: Provided>(&self) -> bool {
        self.info.type_id == TypeId::of::<T>()
    }

    /// True if both instances point to the very same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_to_the_stored_type() {
        let instance = Instance::new(42_u32);
        assert!(instance.is::<u32>());
        assert_eq!(*instance.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn downcast_to_another_type_names_both_types() {
        let instance = Instance::new("text".to_string());
        match instance.downcast::<u32>() {
            Err(InjectError::DowncastFailed {
                required_type,
                actual_type,
            }) => {
                assert_eq!(required_type, "u32");
                assert_eq!(actual_type, type_name::<String>());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn clones_share_the_allocation() {
        let instance = Instance::new(1_u8);
        assert!(instance.ptr_eq(&instance.clone()));
        assert!(!instance.ptr_eq(&Instance::new(1_u8)));
    }
}
