use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use crate::{
    any::{Bean, TypeInfo},
    descriptor::Descriptor,
    scope::Scope,
};

/// Requested type with an optional qualifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub type_info: TypeInfo,
    pub qualifier: Option<String>,
}

impl Key {
    #[inline]
    #[must_use]
    pub fn new<T: ?Sized + 'static>(qualifier: Option<&str>) -> Self {
        Self::of(TypeInfo::of::<T>(), qualifier)
    }

    #[inline]
    #[must_use]
    pub fn of(type_info: TypeInfo, qualifier: Option<&str>) -> Self {
        Self {
            type_info,
            qualifier: qualifier.map(ToOwned::to_owned),
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}:{qualifier}", self.type_info),
            None => write!(f, "{}", self.type_info),
        }
    }
}

/// How to make an instance of one implementation type.
///
/// Immutable once registered. Every registry key pointing to the same registration
/// shares one `Arc<BeanDefinition>`.
pub struct BeanDefinition {
    descriptor: Arc<Descriptor>,
    scope: Scope,
    qualifier: Option<String>,
    lazy: bool,
    primary: bool,
}

impl BeanDefinition {
    #[must_use]
    pub(crate) fn new(descriptor: Arc<Descriptor>) -> Self {
        Self {
            scope: descriptor.scope(),
            qualifier: descriptor.qualifier().map(ToOwned::to_owned),
            lazy: descriptor.is_lazy(),
            primary: descriptor.is_primary(),
            descriptor,
        }
    }

    /// Same definition registered under an explicit binding name.
    #[must_use]
    pub(crate) fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn implementation(&self) -> TypeInfo {
        self.descriptor.type_info()
    }

    #[inline]
    #[must_use]
    pub const fn scope(&self) -> Scope {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    #[inline]
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    #[inline]
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    #[inline]
    #[must_use]
    pub fn implements(&self, interface: TypeInfo) -> bool {
        self.descriptor.implements(interface)
    }

    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Key of the real instance in the singleton cache, shared by every interface key of this definition.
    #[inline]
    #[must_use]
    pub(crate) fn instance_key(&self) -> Key {
        Key::of(self.implementation(), self.qualifier())
    }

    #[inline]
    #[must_use]
    pub(crate) fn cast(&self, bean: &Bean, to: TypeInfo) -> Option<Bean> {
        self.descriptor.cast(bean, to)
    }
}

impl Display for BeanDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "BeanDefinition{{implementation={}, scope={}", self.implementation(), self.scope)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ", qualifier='{qualifier}'")?;
        }
        if self.lazy {
            f.write_str(", lazy=true")?;
        }
        if self.primary {
            f.write_str(", primary=true")?;
        }
        f.write_str("}")
    }
}
