use std::{fmt, marker::PhantomData, ops::Deref, sync::Arc};

use crate::{
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, FieldResolver, ResolveContext},
    errors::ResolveErrorKind,
    proxy::Interface,
};

/// Name used to pick one of several qualified beans of the same type.
///
/// Usually declared with [`crate::qualifier!`].
pub trait Qualifier: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Declares a unit struct implementing [`Qualifier`].
///
/// # Examples
/// ```rust
/// use sprout::{qualifier, Qualifier};
///
/// qualifier!(pub Email = "email");
///
/// assert_eq!(Email::NAME, "email");
/// ```
#[macro_export]
macro_rules! qualifier {
    ($(#[$meta:meta])* $vis:vis $name:ident = $value:literal) => {
        $(#[$meta])*
        $vis struct $name;

        impl $crate::Qualifier for $name {
            const NAME: &'static str = $value;
        }
    };
}

/// Unqualified bean of type `T`.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized + Send + Sync + 'static> DependencyResolver for Inject<T> {
    type Error = ResolveErrorKind;

    fn resolve(ctx: &mut ResolveContext<'_>) -> Result<Self, Self::Error> {
        ctx.resolve::<T>(None).map(Self)
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<T>(None)]
    }
}

impl<T: ?Sized + Send + Sync + 'static> FieldResolver for Inject<T> {
    fn resolve_field(ctx: &mut ResolveContext<'_>) -> Result<Self, ResolveErrorKind> {
        Self::resolve(ctx)
    }

    fn dependency() -> Dependency {
        Dependency::of::<T>(None)
    }
}

/// Bean of type `T` registered under the qualifier `Q`.
pub struct Named<T: ?Sized, Q>(pub Arc<T>, pub PhantomData<Q>);

impl<T: ?Sized + Send + Sync + 'static, Q: Qualifier> DependencyResolver for Named<T, Q> {
    type Error = ResolveErrorKind;

    fn resolve(ctx: &mut ResolveContext<'_>) -> Result<Self, Self::Error> {
        ctx.resolve::<T>(Some(Q::NAME)).map(|value| Self(value, PhantomData))
    }

    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::of::<T>(Some(Q::NAME))]
    }
}

impl<T: ?Sized + Send + Sync + 'static, Q: Qualifier> FieldResolver for Named<T, Q> {
    fn resolve_field(ctx: &mut ResolveContext<'_>) -> Result<Self, ResolveErrorKind> {
        Self::resolve(ctx)
    }

    fn dependency() -> Dependency {
        Dependency::of::<T>(Some(Q::NAME))
    }
}

/// Deferred handle to an interface bean, materialized on the first method call.
pub struct Lazy<I: ?Sized>(pub Arc<I>);

impl<I: ?Sized + Interface> FieldResolver for Lazy<I> {
    fn resolve_field(ctx: &mut ResolveContext<'_>) -> Result<Self, ResolveErrorKind> {
        Ok(Self(ctx.lazy::<I>(None)))
    }

    fn dependency() -> Dependency {
        Dependency::lazy::<I>(None)
    }
}

/// Deferred handle to an interface bean registered under the qualifier `Q`.
pub struct LazyNamed<I: ?Sized, Q>(pub Arc<I>, pub PhantomData<Q>);

impl<I: ?Sized + Interface, Q: Qualifier> FieldResolver for LazyNamed<I, Q> {
    fn resolve_field(ctx: &mut ResolveContext<'_>) -> Result<Self, ResolveErrorKind> {
        Ok(Self(ctx.lazy::<I>(Some(Q::NAME)), PhantomData))
    }

    fn dependency() -> Dependency {
        Dependency::lazy::<I>(Some(Q::NAME))
    }
}

macro_rules! impl_handle {
    ($ty:ident $(, $q:ident)?) => {
        impl<T: ?Sized $(, $q)?> $ty<T $(, $q)?> {
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> Arc<T> {
                self.0
            }
        }

        impl<T: ?Sized $(, $q)?> Deref for $ty<T $(, $q)?> {
            type Target = Arc<T>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<T: ?Sized $(, $q)?> fmt::Debug for $ty<T $(, $q)?> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&std::any::type_name::<T>()).finish()
            }
        }
    };
}

impl_handle!(Inject);
impl_handle!(Named, Q);
impl_handle!(Lazy);
impl_handle!(LazyNamed, Q);
