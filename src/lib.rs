#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod builder;
pub(crate) mod cache;
pub(crate) mod circular;
pub(crate) mod condition;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod definition;
pub(crate) mod dependency;
pub(crate) mod dependency_resolver;
pub(crate) mod descriptor;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod properties;
pub(crate) mod proxy;
pub(crate) mod registry;
pub(crate) mod scan;
pub(crate) mod scope;

pub use any::TypeInfo;
pub use builder::ContainerBuilder;
pub use circular::ResolutionStack;
pub use condition::Condition;
pub use config::Config;
pub use container::{Container, WeakContainer};
pub use definition::{BeanDefinition, Key};
pub use dependency::Dependency;
pub use dependency_resolver::{DependencyResolver, FieldResolver, ResolveContext};
pub use descriptor::{Describe, Descriptor, TypeDescriptor};
pub use errors::{
    ConstructionErrorKind, InstantiateErrorKind, ProxyErrorKind, RegistrationErrorKind, ResolveErrorKind,
    ShutdownErrorKind, TeardownFailure,
};
pub use finalizer::{Finalizer, Initializer};
pub use inject::{Inject, Lazy, LazyNamed, Named, Qualifier};
pub use instantiator::{Injector, Instantiator};
pub use properties::Properties;
pub use proxy::{Interface, LazyProxy, ProxyFactory, ProxyFailure};
pub use scan::Package;
pub use scope::Scope;
