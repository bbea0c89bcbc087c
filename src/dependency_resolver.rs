use std::sync::Arc;

use crate::{
    circular::ResolutionStack, definition::Key, dependency::Dependency, errors::ResolveErrorKind, proxy::Interface,
    Container,
};

/// State of one top-level resolution request, threaded through every nested
/// constructor, field and method injection it triggers.
pub struct ResolveContext<'a> {
    container: &'a Container,
    stack: ResolutionStack,
}

impl<'a> ResolveContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(container: &'a Container, stack: ResolutionStack) -> Self {
        Self { container, stack }
    }

    #[inline]
    #[must_use]
    pub const fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    #[must_use]
    pub const fn stack(&self) -> &ResolutionStack {
        &self.stack
    }

    #[inline]
    pub(crate) fn stack_mut(&mut self) -> &mut ResolutionStack {
        &mut self.stack
    }

    /// Resolves `T` (optionally qualified) as part of this request.
    ///
    /// # Errors
    /// Any [`ResolveErrorKind`] raised while looking up or building the bean.
    pub fn resolve<T>(&mut self, qualifier: Option<&str>) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let container = self.container;
        container.resolve_in::<T>(&Key::new::<T>(qualifier), self)
    }

    /// Deferred handle for `I`, the bean is resolved on first use.
    #[must_use]
    pub fn lazy<I>(&self, qualifier: Option<&str>) -> Arc<I>
    where
        I: ?Sized + Interface,
    {
        self.container.lazy_handle::<I>(Key::new::<I>(qualifier))
    }
}

/// Something that can be built from the container while resolving an injection point.
pub trait DependencyResolver: Sized {
    type Error: Into<ResolveErrorKind>;

    /// # Errors
    /// Returns an error if any of the requested beans can't be resolved.
    fn resolve(ctx: &mut ResolveContext<'_>) -> Result<Self, Self::Error>;

    #[must_use]
    fn dependencies() -> Vec<Dependency>;
}

/// Injection point of a single field.
///
/// Unlike [`DependencyResolver`] it's also implemented for [`crate::Lazy`] and [`crate::LazyNamed`],
/// because deferred injection is only supported for fields.
pub trait FieldResolver: Sized {
    /// # Errors
    /// Returns an error if the requested bean can't be resolved.
    fn resolve_field(ctx: &mut ResolveContext<'_>) -> Result<Self, ResolveErrorKind>;

    #[must_use]
    fn dependency() -> Dependency;
}

macro_rules! impl_dependency_resolver {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut)]
        impl<$($ty,)*> DependencyResolver for ($($ty,)*)
        where
            $( $ty: DependencyResolver, )*
        {
            type Error = ResolveErrorKind;

            #[inline]
            #[allow(unused_variables)]
            fn resolve(ctx: &mut ResolveContext<'_>) -> Result<Self, Self::Error> {
                Ok(($($ty::resolve(ctx).map_err(Into::into)?,)*))
            }

            fn dependencies() -> Vec<Dependency> {
                let mut dependencies = Vec::new();
                $( dependencies.extend($ty::dependencies()); )*
                dependencies
            }
        }
    };
}

all_the_tuples!(impl_dependency_resolver);
