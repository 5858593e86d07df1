/// How concurrent first resolutions of the same singleton are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingletonResolution {
    /// The first resolution is shared with everyone asking while it is in flight,
    /// the factory or module runs at most once per successful resolution
    #[default]
    Deduplicate,
    /// Every caller finding the singleton unresolved runs the factory or module
    /// itself, the last one to finish is cached
    Race,
}

/// Options of an [crate::Injector]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InjectorOptions {
    pub singleton_resolution: SingletonResolution,
}

impl InjectorOptions {
    pub fn singleton_resolution(mut self, mode: SingletonResolution) -> Self {
        self.singleton_resolution = mode;
        self
    }
}
