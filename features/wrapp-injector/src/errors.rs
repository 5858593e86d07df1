use std::sync::Arc;

use thiserror::Error;

use crate::{token::Injectable, types::DynError};

/// Errors raised while registering or resolving dependencies
///
/// Clone, so a single failed singleton resolution can be handed to every waiter
#[derive(Error, Debug, Clone)]
pub enum InjectError {
    /// The identity can not be used the way it was requested
    #[error("Unable to use '{injectable}' as a dependency: {reason}")]
    InvalidInjectable {
        injectable: String,
        reason: &'static str,
    },
    /// No provider was registered for the requested identity
    #[error("Unable to provide dependency '{0}': provider not found")]
    ProviderNotFound(Injectable),
    /// The object handed to `provider` carries no usable provider metadata
    #[error("'{provider}' is not a valid provider object: {reason}")]
    InvalidProviderObject {
        provider: &'static str,
        reason: String,
    },
    /// `create` was called on something that is not a constructible type
    #[error("Unable to construct '{0}': target should be a module type")]
    ConstructTarget(Injectable),
    /// A dependency declaration was given zero tokens
    #[error("Dependency list for provider member '{0}' should not be empty")]
    EmptyDependencyList(String),
    /// A constructor asked for a key the parameter bag does not hold
    #[error("Parameter '{key}' is missing")]
    MissingParameter { key: String },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// A factory returned an error
    #[error("Factory for '{product}' failed - error: {error}")]
    FactoryFailed {
        product: String,
        error: Arc<DynError>,
    },
    /// A module constructor returned an error
    #[error("Constructing '{module}' failed - error: {error}")]
    ConstructionFailed {
        module: &'static str,
        error: Arc<DynError>,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Errors of the metadata side-table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Nothing to attach
    #[error("Unable to annotate '{target}': there is no data for the '{slot}' slot")]
    EmptyAnnotation {
        target: &'static str,
        slot: &'static str,
    },
    /// The slot holds data of another type than the slot declares
    #[error("Metadata '{slot}' of '{target}' is unavailable")]
    Unavailable {
        target: &'static str,
        slot: &'static str,
    },
}
