use tracing::debug;

use crate::{
    any::TypeInfo,
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, FieldResolver, ResolveContext},
    errors::{ConstructionErrorKind, InstantiateErrorKind, ResolveErrorKind},
};

/// Constructor of a bean, dependencies are the closure parameters.
pub trait Instantiator<Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the constructor error, it's wrapped into [`ConstructionErrorKind::Constructor`].
    fn instantiate(&self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;

    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Dependency> {
        Deps::dependencies()
    }
}

/// Injection method of a bean: receives the instance and its dependencies after construction.
pub trait Injector<T, Deps>: Send + Sync + 'static
where
    Deps: DependencyResolver,
{
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the method error, it's wrapped into [`ConstructionErrorKind::Method`].
    fn inject(&self, target: &mut T, dependencies: Deps) -> Result<(), Self::Error>;

    #[inline]
    #[must_use]
    fn dependencies() -> Vec<Dependency> {
        Deps::dependencies()
    }
}

pub(crate) type BoxedConstructor<T> = Box<dyn Fn(&mut ResolveContext<'_>) -> Result<T, ResolveErrorKind> + Send + Sync>;
pub(crate) type BoxedInjector<T> = Box<dyn Fn(&mut T, &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_constructor<Inst, Deps>(instantiator: Inst) -> BoxedConstructor<Inst::Provides>
where
    Inst: Instantiator<Deps>,
    Deps: DependencyResolver,
{
    Box::new(move |ctx| {
        let dependencies = Deps::resolve(ctx).map_err(Into::into)?;
        match instantiator.instantiate(dependencies) {
            Ok(instance) => {
                debug!("Constructed");
                Ok(instance)
            }
            Err(err) => Err(ResolveErrorKind::Construction {
                type_info: TypeInfo::of::<Inst::Provides>(),
                source: ConstructionErrorKind::Constructor(err.into()),
            }),
        }
    })
}

#[must_use]
pub(crate) fn boxed_injector<T, Inj, Deps>(name: &'static str, injector: Inj) -> BoxedInjector<T>
where
    T: 'static,
    Inj: Injector<T, Deps>,
    Deps: DependencyResolver,
{
    Box::new(move |target, ctx| {
        let dependencies = Deps::resolve(ctx).map_err(Into::into)?;
        match injector.inject(target, dependencies) {
            Ok(()) => {
                debug!(method = name, "Method injected");
                Ok(())
            }
            Err(err) => Err(ResolveErrorKind::Construction {
                type_info: TypeInfo::of::<T>(),
                source: ConstructionErrorKind::Method {
                    name,
                    source: err.into(),
                },
            }),
        }
    })
}

#[must_use]
pub(crate) fn boxed_field_setter<T, D, F>(name: &'static str, setter: F) -> BoxedInjector<T>
where
    T: 'static,
    D: FieldResolver,
    F: Fn(&mut T, D) + Send + Sync + 'static,
{
    Box::new(move |target, ctx| {
        let value = D::resolve_field(ctx)?;
        setter(target, value);
        debug!(field = name, "Field injected");
        Ok(())
    })
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> Result<Response, Err> + Send + Sync + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

macro_rules! impl_injector {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Target, Err, $($ty,)*> Injector<Target, ($($ty,)*)> for F
        where
            F: Fn(&mut Target, $($ty,)*) -> Result<(), Err> + Send + Sync + 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Error = Err;

            fn inject(&self, target: &mut Target, ($($ty,)*): ($($ty,)*)) -> Result<(), Self::Error> {
                self(target, $($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_injector);
