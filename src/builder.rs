use std::sync::Arc;
use tracing::{debug, info_span};

use crate::{
    any::TypeInfo,
    config::Config,
    container::Container,
    descriptor::{Describe, Descriptor},
    errors::RegistrationErrorKind,
    proxy::Interface,
    scan::Package,
};

type Deferred = Box<dyn FnOnce(&Container) + Send>;

enum Operation {
    Scan(Package),
    Register(Descriptor),
    Bind {
        interface: TypeInfo,
        descriptor: Descriptor,
        name: Option<String>,
    },
    Property(String, String),
    Instance(Deferred),
    Proxy(Deferred),
}

struct PendingBinding {
    interface: TypeInfo,
    descriptor: Option<Descriptor>,
    name: Option<String>,
}

/// Collects registrations and replays them on a new container in call order.
///
/// Order matters because conditions are evaluated against what was registered
/// and set before them.
///
/// # Examples
/// ```rust
/// use sprout::{upcast, Container, Describe, TypeDescriptor};
///
/// trait Cache: Send + Sync {}
///
/// struct Redis;
///
/// impl Cache for Redis {}
///
/// impl Describe for Redis {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::injectable()
///             .singleton()
///             .implements(upcast!(dyn Cache))
///             .conditional_on_property("cache.enabled")
///             .constructor(|| Ok(Redis))
///     }
/// }
///
/// let container = Container::builder()
///     .property("cache.enabled", "true")
///     .bind::<dyn Cache>()
///     .to::<Redis>()
///     .build()
///     .unwrap();
///
/// assert!(container.contains::<dyn Cache>());
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    config: Config,
    operations: Vec<Operation>,
    pending: Option<PendingBinding>,
}

impl ContainerBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn scan(self, package: Package) -> Self {
        self.push(Operation::Scan(package))
    }

    #[must_use]
    pub fn register<T: Describe>(self) -> Self {
        self.register_descriptor(Descriptor::of::<T>())
    }

    #[must_use]
    pub fn register_descriptor(self, descriptor: impl Into<Descriptor>) -> Self {
        self.push(Operation::Register(descriptor.into()))
    }

    /// Starts a binding of interface `I`, completed with [`Self::to`] and optionally [`Self::named`].
    ///
    /// A binding that never gets an implementation is dropped.
    #[must_use]
    pub fn bind<I: ?Sized + 'static>(mut self) -> Self {
        self.complete_pending();
        self.pending = Some(PendingBinding {
            interface: TypeInfo::of::<I>(),
            descriptor: None,
            name: None,
        });
        self
    }

    /// Sets the implementation of the binding started with [`Self::bind`].
    #[must_use]
    pub fn to<T: Describe>(mut self) -> Self {
        match &mut self.pending {
            Some(pending) => pending.descriptor = Some(Descriptor::of::<T>()),
            None => debug!(bean = TypeInfo::of::<T>().name, "No binding started, implementation ignored"),
        }
        self
    }

    /// Names the binding started with [`Self::bind`].
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        match &mut self.pending {
            Some(pending) => pending.name = Some(name.into()),
            None => debug!("No binding started, name ignored"),
        }
        self
    }

    /// Shorthand for `bind::<I>().to::<T>()`.
    #[must_use]
    pub fn bind_to<I: ?Sized + 'static, T: Describe>(self) -> Self {
        self.bind::<I>().to::<T>()
    }

    #[must_use]
    pub fn property(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Operation::Property(key.into(), value.into()))
    }

    #[must_use]
    pub fn instance<T>(self, instance: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.push(Operation::Instance(Box::new(move |container| container.register_instance(instance))))
    }

    /// See [`Container::register_proxy`].
    #[must_use]
    pub fn proxy<I: ?Sized + Interface>(self) -> Self {
        self.push(Operation::Proxy(Box::new(|container| container.register_proxy::<I>())))
    }

    /// Creates the container and replays every call on it in order.
    ///
    /// # Errors
    /// Returns the first registration error.
    pub fn build(mut self) -> Result<Container, RegistrationErrorKind> {
        self.complete_pending();

        let span = info_span!("build", operations = self.operations.len());
        let _guard = span.enter();

        let container = Container::with_config(self.config);
        for operation in self.operations {
            match operation {
                Operation::Scan(package) => container.scan(package)?,
                Operation::Register(descriptor) => container.register_descriptor(descriptor)?,
                Operation::Bind {
                    interface,
                    descriptor,
                    name,
                } => container.bind_descriptor(interface, descriptor, name.as_deref())?,
                Operation::Property(key, value) => container.set_property(key, value),
                Operation::Instance(register) | Operation::Proxy(register) => register(&container),
            }
        }

        debug!(definitions = container.len(), "Container built");
        Ok(container)
    }

    fn push(mut self, operation: Operation) -> Self {
        self.complete_pending();
        self.operations.push(operation);
        self
    }

    fn complete_pending(&mut self) {
        let Some(PendingBinding {
            interface,
            descriptor,
            name,
        }) = self.pending.take()
        else {
            return;
        };

        match descriptor {
            Some(descriptor) => self.operations.push(Operation::Bind {
                interface,
                descriptor,
                name,
            }),
            None => debug!(%interface, "Binding without implementation dropped"),
        }
    }
}
