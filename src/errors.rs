mod container;
mod dependency_resolver;
mod instantiate;
mod instantiator;
mod proxy;
mod registry;

pub use container::{ShutdownErrorKind, TeardownFailure};
pub use dependency_resolver::ResolveErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use instantiator::ConstructionErrorKind;
pub use proxy::ProxyErrorKind;
pub use registry::RegistrationErrorKind;

use std::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Formats `[A, B, A]` as `A -> B -> A`.
pub(crate) struct Chain<'a>(pub(crate) &'a [TypeInfo]);

impl Display for Chain<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, type_info) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{type_info}")?;
        }
        Ok(())
    }
}
