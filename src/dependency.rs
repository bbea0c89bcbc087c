use std::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Injection point requested by a constructor parameter, field or injection method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Dependency {
    pub type_info: TypeInfo,
    pub qualifier: Option<&'static str>,
    pub lazy: bool,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>(qualifier: Option<&'static str>) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier,
            lazy: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn lazy<T: ?Sized + 'static>(qualifier: Option<&'static str>) -> Self {
        Self {
            lazy: true,
            ..Self::of::<T>(qualifier)
        }
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.lazy {
            f.write_str("lazy ")?;
        }
        write!(f, "{}", self.type_info)?;
        if let Some(qualifier) = self.qualifier {
            write!(f, " @ {qualifier}")?;
        }
        Ok(())
    }
}
