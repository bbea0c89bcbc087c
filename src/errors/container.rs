use super::instantiate::InstantiateErrorKind;
use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
#[error("Teardown hook of {type_info} failed: {source}")]
pub struct TeardownFailure {
    pub type_info: TypeInfo,
    #[source]
    pub source: InstantiateErrorKind,
}

#[derive(thiserror::Error, Debug)]
pub enum ShutdownErrorKind {
    #[error("Errors occurred during shutdown. {count} teardown hook(s) failed")]
    Teardown {
        count: usize,
        #[source]
        first: TeardownFailure,
        rest: Vec<TeardownFailure>,
    },
}

impl ShutdownErrorKind {
    pub(crate) fn from_failures(mut failures: Vec<TeardownFailure>) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        let first = failures.remove(0);
        Some(Self::Teardown {
            count: failures.len() + 1,
            first,
            rest: failures,
        })
    }

    /// Failures in the order the hooks ran.
    #[must_use]
    pub fn failures(&self) -> Vec<&TeardownFailure> {
        match self {
            Self::Teardown { first, rest, .. } => core::iter::once(first).chain(rest).collect(),
        }
    }
}
