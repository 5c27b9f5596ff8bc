//! Key derivation.
//!
//! Every counter record lives under
//! `{keyspace}:{algorithm}:{module}:{function}[:{suffix}]`, where the suffix is
//! produced from the call's arguments by an optional, caller-supplied key maker.

use std::fmt;

use crate::algorithms::Algorithm;

/// Builds a key suffix from a call's arguments.
pub type KeyMaker<A> = dyn Fn(&A) -> String + Send + Sync;

/// Identity of a throttled function: the module it lives in and its name.
///
/// For methods the name is `Type:method`. The name may be empty when the
/// callable has no meaningful name (closures).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionId {
    module: String,
    name: String,
}

impl FunctionId {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Identity of a method declared on `T`.
    pub fn method<T: ?Sized>(module: impl Into<String>, method: &str) -> Self {
        Self::new(module, format!("{}:{}", short_type_name::<T>(), method))
    }

    /// Identity of a callable without a name.
    pub fn anonymous(module: impl Into<String>) -> Self {
        Self::new(module, String::new())
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base key for this function under an algorithm and keyspace.
    pub fn key(&self, algorithm: Algorithm, keyspace: &str) -> String {
        format!("{}:{}:{}:{}", keyspace, algorithm, self.module, self.name)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// `std::any::type_name` without the module path or generic arguments.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Derive the counter key for one call.
pub fn derive_key<A>(
    function: &FunctionId,
    algorithm: Algorithm,
    keyspace: &str,
    key_maker: Option<&KeyMaker<A>>,
    args: &A,
) -> String {
    let key = function.key(algorithm, keyspace);
    match key_maker {
        Some(make) => format!("{}:{}", key, make(args)),
        None => key,
    }
}

/// Build a [`FunctionId`] for the calling module.
///
/// ```
/// use premier::function_id;
///
/// struct Mailer;
///
/// let plain = function_id!("send_digest");
/// let method = function_id!(Mailer, "send");
/// assert_eq!(plain.name(), "send_digest");
/// assert_eq!(method.name(), "Mailer:send");
/// ```
#[macro_export]
macro_rules! function_id {
    ($name:expr) => {
        $crate::key::FunctionId::new(module_path!(), $name)
    };
    ($ty:ty, $method:expr) => {
        $crate::key::FunctionId::method::<$ty>(module_path!(), $method)
    };
}
