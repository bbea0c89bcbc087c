use super::{instantiator::ConstructionErrorKind, proxy::ProxyErrorKind, Chain};
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No bean found for type: {type_info}{}", qualifier_suffix(.qualifier))]
    NotFound {
        type_info: TypeInfo,
        qualifier: Option<String>,
    },
    #[error("Circular dependency detected: {}", Chain(.chain))]
    CircularDependency { chain: Vec<TypeInfo> },
    #[error("Failed to construct {type_info}: {source}")]
    Construction {
        type_info: TypeInfo,
        #[source]
        source: ConstructionErrorKind,
    },
    #[error("Container is shutting down, cannot create new instances of {type_info}")]
    ContainerClosed { type_info: TypeInfo },
    #[error("Incorrect bean type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: TypeInfo, actual: TypeInfo },
    #[error(transparent)]
    Proxy(#[from] ProxyErrorKind),
}

fn qualifier_suffix(qualifier: &Option<String>) -> String {
    qualifier
        .as_ref()
        .map(|qualifier| format!(" with qualifier: {qualifier}"))
        .unwrap_or_default()
}

impl ResolveErrorKind {
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Cycle in resolution order, first and last element are the same type.
    #[must_use]
    pub fn cycle(&self) -> Option<&[TypeInfo]> {
        match self {
            Self::CircularDependency { chain } => Some(chain),
            _ => None,
        }
    }
}
