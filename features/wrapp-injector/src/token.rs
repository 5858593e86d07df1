use std::{
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::module::{Module, ModuleType};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity naming a dependency which is not a constructible type itself
///
/// The type parameter only records what the token resolves to, two tokens are
/// equal if and only if one is a copy of the other.
///
/// ```rust
/// use wrapp_injector::{Injector, Provider, Token};
///
/// let port = Token::<u16>::named("port");
/// let injector = Injector::new();
/// injector.provide(&port, Provider::value(8080_u16)).unwrap();
///
/// let resolved = futures::executor::block_on(injector.get(&port)).unwrap();
/// assert_eq!(*resolved, 8080);
/// ```
pub struct Token<T: ?Sized> {
    raw: AnyToken,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ?Sized> Token<T> {
    pub fn new() -> Self {
        Self::create(None)
    }

    /// Token carrying a name for diagnostics - the name plays no role in equality
    pub fn named(name: &'static str) -> Self {
        Self::create(Some(name))
    }

    fn create(name: Option<&'static str>) -> Self {
        Token {
            raw: AnyToken {
                id: NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed),
                name,
            },
            _marker: PhantomData,
        }
    }

    /// The token with its value type erased
    pub fn erased(&self) -> AnyToken {
        self.raw
    }
}

impl<T: ?Sized> Default for Token<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: ?Sized> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: ?Sized> Copy for Token<T> {}
impl<T: ?Sized> PartialEq for Token<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<T: ?Sized> Eq for Token<T> {}
impl<T: ?Sized> Hash for Token<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state)
    }
}
impl<T: ?Sized> Debug for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.raw, f)
    }
}
impl<T: ?Sized> Display for Token<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.raw, f)
    }
}

/// A [Token] without its value type
#[derive(Clone, Copy)]
pub struct AnyToken {
    id: u64,
    name: Option<&'static str>,
}
impl AnyToken {
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}
impl PartialEq for AnyToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for AnyToken {}
impl Hash for AnyToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}
impl Debug for AnyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
impl Display for AnyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(name) => write!(f, "Token({name})"),
            None => write!(f, "Token#{}", self.id),
        }
    }
}

/// Anything the injector can resolve: a token or a constructible type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Injectable {
    Token(AnyToken),
    Module(ModuleType),
}
impl Injectable {
    pub fn of<T: Module>() -> Self {
        Injectable::Module(ModuleType::of::<T>())
    }

    pub fn is_token(&self) -> bool {
        matches!(self, Injectable::Token(_))
    }

    pub fn as_module(&self) -> Option<ModuleType> {
        match self {
            Injectable::Module(module) => Some(*module),
            Injectable::Token(_) => None,
        }
    }
}
impl Display for Injectable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Injectable::Token(token) => Display::fmt(token, f),
            Injectable::Module(module) => Display::fmt(module, f),
        }
    }
}
impl<T: ?Sized> From<Token<T>> for Injectable {
    fn from(token: Token<T>) -> Self {
        Injectable::Token(token.raw)
    }
}
impl<T: ?Sized> From<&Token<T>> for Injectable {
    fn from(token: &Token<T>) -> Self {
        Injectable::Token(token.raw)
    }
}
impl From<AnyToken> for Injectable {
    fn from(token: AnyToken) -> Self {
        Injectable::Token(token)
    }
}
impl From<ModuleType> for Injectable {
    fn from(module: ModuleType) -> Self {
        Injectable::Module(module)
    }
}
impl From<&Injectable> for Injectable {
    fn from(injectable: &Injectable) -> Self {
        *injectable
    }
}
