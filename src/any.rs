use std::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for TypeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Type name without module path, `dyn app::Greeter` becomes `Greeter`.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let name = self.name.strip_prefix("dyn ").unwrap_or(self.name);
        let name = name.split('<').next().unwrap_or(name);
        name.rsplit_once("::").map_or(name, |(_, name)| name)
    }
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Type-erased shared instance.
///
/// The payload is always an `Arc<T>` boxed behind `dyn Any`, which lets unsized
/// values (`Arc<dyn Trait>`) travel through the same caches as concrete ones.
#[derive(Clone)]
pub(crate) struct Bean {
    type_info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
}

impl Bean {
    #[inline]
    #[must_use]
    pub(crate) fn new<T>(value: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub(crate) fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + 'static,
    {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }
}

#[inline]
#[must_use]
pub(crate) fn addr_of<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value).cast::<()>() as usize
}
