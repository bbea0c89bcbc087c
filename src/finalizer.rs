use tracing::debug;

use crate::{
    any::TypeInfo,
    errors::{ConstructionErrorKind, InstantiateErrorKind, ResolveErrorKind},
};

/// Post-init hook, runs once after every injection step of a new instance.
pub trait Initializer<T>: Send + Sync + 'static {
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the hook error, it fails the whole construction.
    fn initialize(&self, instance: &mut T) -> Result<(), Self::Error>;
}

/// Teardown hook, runs on container shutdown for every created singleton.
pub trait Finalizer<T>: Send + Sync + 'static {
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the hook error, it's collected into the shutdown report.
    fn finalize(&self, instance: &T) -> Result<(), Self::Error>;
}

impl<F, T, Err> Initializer<T> for F
where
    F: Fn(&mut T) -> Result<(), Err> + Send + Sync + 'static,
    Err: Into<InstantiateErrorKind>,
{
    type Error = Err;

    #[inline]
    fn initialize(&self, instance: &mut T) -> Result<(), Self::Error> {
        self(instance)
    }
}

impl<F, T, Err> Finalizer<T> for F
where
    F: Fn(&T) -> Result<(), Err> + Send + Sync + 'static,
    Err: Into<InstantiateErrorKind>,
{
    type Error = Err;

    #[inline]
    fn finalize(&self, instance: &T) -> Result<(), Self::Error> {
        self(instance)
    }
}

pub(crate) type BoxedInitializer<T> = Box<dyn Fn(&mut T) -> Result<(), ResolveErrorKind> + Send + Sync>;
pub(crate) type BoxedFinalizer<T> = Box<dyn Fn(&T) -> Result<(), InstantiateErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_initializer<T, Init>(initializer: Init) -> BoxedInitializer<T>
where
    T: 'static,
    Init: Initializer<T>,
{
    Box::new(move |instance| match initializer.initialize(instance) {
        Ok(()) => {
            debug!("Post-construct hook called");
            Ok(())
        }
        Err(err) => Err(ResolveErrorKind::Construction {
            type_info: TypeInfo::of::<T>(),
            source: ConstructionErrorKind::PostConstruct(err.into()),
        }),
    })
}

#[must_use]
pub(crate) fn boxed_finalizer<T, Fin>(finalizer: Fin) -> BoxedFinalizer<T>
where
    T: 'static,
    Fin: Finalizer<T>,
{
    Box::new(move |instance| finalizer.finalize(instance).map_err(Into::into))
}
