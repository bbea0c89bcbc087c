use parking_lot::{Mutex, RwLock};
use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};
use tracing::{debug, error, info_span, warn};

use crate::{
    any::{Bean, TypeInfo},
    builder::ContainerBuilder,
    cache::{Cache, CreationLocks, Resolved},
    circular::InProgress,
    config::Config,
    definition::{BeanDefinition, Key},
    dependency_resolver::ResolveContext,
    descriptor::{Describe, Descriptor},
    errors::{RegistrationErrorKind, ResolveErrorKind, ShutdownErrorKind, TeardownFailure},
    properties::Properties,
    proxy::{BeanSupplier, Interface, ProxyFactory, ProxyFailure},
    registry::Registry,
    scan::Package,
    scope::Scope,
};

/// Registry of bean definitions together with the instances built from them.
///
/// Cloning is cheap, every clone shares the same definitions, caches and lifecycle.
/// The container shuts itself down when the last clone is dropped.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::default()),
                cache: Mutex::new(Cache::new()),
                properties: RwLock::new(Properties::new()),
                proxies: ProxyFactory::new(),
                creation: CreationLocks::default(),
                in_progress: InProgress::default(),
                closed: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Builder replaying registrations, bindings and properties in call order.
    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.config
    }

    /// Registers `T` under its own type, its qualifier and the interfaces it implements.
    ///
    /// Registration is a no-op if one of the type's conditions doesn't match the
    /// current properties and registry.
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::NotInjectable`] if the type isn't tagged as injectable.
    /// - Returns [`RegistrationErrorKind::InvalidInjectionMethod`] if an injection method has no parameters.
    /// - Returns [`RegistrationErrorKind::AmbiguousBinding`] if another primary type already claimed one of the interfaces.
    #[inline]
    pub fn register<T: Describe>(&self) -> Result<(), RegistrationErrorKind> {
        self.register_descriptor(Descriptor::of::<T>())
    }

    /// Same as [`Self::register`] for a descriptor built by hand.
    ///
    /// # Errors
    /// See [`Self::register`].
    pub fn register_descriptor(&self, descriptor: impl Into<Descriptor>) -> Result<(), RegistrationErrorKind> {
        let descriptor = descriptor.into();
        let span = info_span!("register", bean = descriptor.type_info().name);
        let _guard = span.enter();

        if let Err(err) = descriptor.validate() {
            error!("{}", err);
            return Err(err);
        }

        let mut registry = self.inner.registry.write();
        if !self.inner.conditions_match(&descriptor, &registry) {
            return Ok(());
        }

        if let Err(err) = registry.register(BeanDefinition::new(Arc::new(descriptor))) {
            error!("{}", err);
            return Err(err);
        }
        debug!("Registered");
        Ok(())
    }

    /// Binds interface `I` to implementation `T` explicitly, without interface fan-out.
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::NotImplemented`] if `T` doesn't declare `I`.
    /// - Same validation errors as [`Self::register`].
    #[inline]
    pub fn bind<I, T>(&self) -> Result<(), RegistrationErrorKind>
    where
        I: ?Sized + 'static,
        T: Describe,
    {
        self.bind_descriptor(TypeInfo::of::<I>(), Descriptor::of::<T>(), None)
    }

    /// Binds interface `I` to implementation `T` under `name`.
    ///
    /// The bean is then available through `get_named::<I>(name)` only, the unqualified
    /// interface key is left untouched.
    ///
    /// # Errors
    /// See [`Self::bind`].
    #[inline]
    pub fn bind_named<I, T>(&self, name: &str) -> Result<(), RegistrationErrorKind>
    where
        I: ?Sized + 'static,
        T: Describe,
    {
        self.bind_descriptor(TypeInfo::of::<I>(), Descriptor::of::<T>(), Some(name))
    }

    pub(crate) fn bind_descriptor(
        &self,
        interface: TypeInfo,
        descriptor: Descriptor,
        name: Option<&str>,
    ) -> Result<(), RegistrationErrorKind> {
        let span = info_span!("bind", interface = interface.name, bean = descriptor.type_info().name, name);
        let _guard = span.enter();

        if let Err(err) = descriptor.validate() {
            error!("{}", err);
            return Err(err);
        }
        if interface != descriptor.type_info() && !descriptor.implements(interface) {
            let err = RegistrationErrorKind::NotImplemented {
                interface,
                implementation: descriptor.type_info(),
            };
            error!("{}", err);
            return Err(err);
        }

        let mut registry = self.inner.registry.write();
        if !self.inner.conditions_match(&descriptor, &registry) {
            return Ok(());
        }

        registry.bind(interface, BeanDefinition::new(Arc::new(descriptor)), name);
        Ok(())
    }

    /// Registers a pre-built value as a singleton of `T`.
    ///
    /// No construction or hooks are run for it, and it's never torn down by the container.
    pub fn register_instance<T>(&self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let span = info_span!("register_instance", bean = type_name::<T>());
        let _guard = span.enter();

        let definition = self
            .inner
            .registry
            .write()
            .insert(BeanDefinition::new(Arc::new(Descriptor::prebuilt(instance.clone()))));
        self.inner.cache.lock().replace(definition.instance_key(), Bean::new(instance));
        debug!("Instance registered");
    }

    /// Allows lazy beans to be requested as `I`, see [`crate::lazy_proxy!`].
    #[inline]
    pub fn register_proxy<I: ?Sized + Interface>(&self) {
        self.inner.proxies.register::<I>();
    }

    /// Registers every injectable entry of `package` in package order.
    ///
    /// # Errors
    /// Returns the first registration error, entries before it stay registered.
    pub fn scan(&self, package: Package) -> Result<(), RegistrationErrorKind> {
        let span = info_span!("scan", package = package.name());
        let _guard = span.enter();

        for descriptor in package {
            if !descriptor.is_injectable() {
                debug!(bean = descriptor.type_info().name, "Not injectable, skipped");
                continue;
            }
            self.register_descriptor(descriptor)?;
        }
        Ok(())
    }

    /// Gets the unqualified bean of type `T`.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if nothing is registered for `T`.
    /// - Returns [`ResolveErrorKind::CircularDependency`] if building `T` requires `T` itself.
    /// - Returns [`ResolveErrorKind::Construction`] if a constructor, injection method or post-construct hook fails.
    /// - Returns [`ResolveErrorKind::ContainerClosed`] if a new instance is needed after shutdown.
    #[inline]
    pub fn get<T>(&self) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_key::<T>(None)
    }

    /// Gets the bean of type `T` registered under `qualifier`.
    ///
    /// There is no fallback to the unqualified bean.
    ///
    /// # Errors
    /// See [`Self::get`].
    #[inline]
    pub fn get_named<T>(&self, qualifier: &str) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_key::<T>(Some(qualifier))
    }

    /// Like [`Self::get`], but `Ok(None)` if `T` isn't registered.
    ///
    /// # Errors
    /// Any error of [`Self::get`] other than `T` itself not being registered,
    /// a missing dependency of `T` is still an error.
    #[inline]
    pub fn get_optional<T>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_optional_key::<T>(None)
    }

    /// Like [`Self::get_named`], but `Ok(None)` if nothing is registered under `qualifier`.
    ///
    /// # Errors
    /// See [`Self::get_optional`].
    #[inline]
    pub fn get_optional_named<T>(&self, qualifier: &str) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get_optional_key::<T>(Some(qualifier))
    }

    /// Builds every registered implementation of `I`.
    ///
    /// Implementations that fail to build are skipped.
    #[must_use]
    pub fn get_all<I>(&self) -> Vec<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let span = info_span!("get_all", interface = type_name::<I>());
        let _guard = span.enter();

        let interface = TypeInfo::of::<I>();
        let definitions = self.inner.registry.read().implementations_of(interface);

        definitions
            .iter()
            .filter_map(|definition| {
                let mut ctx = self.context();
                let bean = match self.instance(definition, &mut ctx) {
                    Ok(bean) => bean,
                    Err(err) => {
                        warn!(bean = %definition.implementation(), error = %err, "Implementation skipped");
                        return None;
                    }
                };
                definition
                    .cast(&bean, interface)
                    .and_then(|bean| bean.downcast::<I>())
            })
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.read().contains(TypeInfo::of::<T>(), None)
    }

    #[inline]
    #[must_use]
    pub fn contains_named<T: ?Sized + 'static>(&self, qualifier: &str) -> bool {
        self.inner.registry.read().contains(TypeInfo::of::<T>(), Some(qualifier))
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NotFound`] if nothing is registered for `T`.
    pub fn scope_of<T: ?Sized + 'static>(&self) -> Result<Scope, ResolveErrorKind> {
        match self.definition::<T>() {
            Some(definition) => Ok(definition.scope()),
            None => {
                let err = ResolveErrorKind::NotFound {
                    type_info: TypeInfo::of::<T>(),
                    qualifier: None,
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn definition<T: ?Sized + 'static>(&self) -> Option<Arc<BeanDefinition>> {
        self.inner.registry.read().get(TypeInfo::of::<T>(), None)
    }

    #[inline]
    #[must_use]
    pub fn definition_named<T: ?Sized + 'static>(&self, qualifier: &str) -> Option<Arc<BeanDefinition>> {
        self.inner.registry.read().get(TypeInfo::of::<T>(), Some(qualifier))
    }

    /// Number of unqualified keys, interfaces included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn registered_types(&self) -> Vec<TypeInfo> {
        self.inner.registry.read().types()
    }

    /// Sets a property consulted by conditions of later registrations.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        debug!(%key, "Property set");
        self.inner.properties.write().insert(key, value);
    }

    #[inline]
    #[must_use]
    pub fn property(&self, key: &str) -> Option<String> {
        self.inner.properties.read().get(key).map(ToOwned::to_owned)
    }

    #[inline]
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.inner.properties.read().contains(key)
    }

    /// Runs teardown hooks of created singletons, most recent first, and closes the container.
    ///
    /// Every hook runs even if an earlier one fails. After shutdown creating new
    /// instances fails with [`ResolveErrorKind::ContainerClosed`].
    /// Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns [`ShutdownErrorKind::Teardown`] with every failed hook.
    pub fn shutdown(&self) -> Result<(), ShutdownErrorKind> {
        let span = info_span!("shutdown");
        let _guard = span.enter();

        if self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("Already shut down");
            return Ok(());
        }
        self.inner.teardown()
    }

    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_closed()
    }

    /// Drops cached singletons and proxies without running teardown hooks.
    pub fn clear_singletons(&self) {
        let resolved = self.inner.cache.lock().clear();
        debug!(dropped = resolved.len(), "Singletons cleared");
    }

    /// Drops every definition and cached instance, properties are kept.
    pub fn clear(&self) {
        self.inner.registry.write().clear();
        self.inner.creation.clear();
        let resolved = self.inner.cache.lock().clear();
        debug!(dropped = resolved.len(), "Container cleared");
    }

    /// Whether `handle` is a lazy proxy created by this container.
    #[inline]
    #[must_use]
    pub fn is_lazy_proxy<I: ?Sized>(&self, handle: &Arc<I>) -> bool {
        self.inner.proxies.is_lazy_proxy(handle)
    }

    /// `Some(materialized)` for proxies of this container, `None` for real instances.
    #[inline]
    #[must_use]
    pub fn is_proxy_initialized<I: ?Sized>(&self, handle: &Arc<I>) -> Option<bool> {
        self.inner.proxies.is_initialized(handle)
    }

    #[inline]
    #[must_use]
    pub fn proxies(&self) -> &ProxyFactory {
        &self.inner.proxies
    }

    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Container {
    fn get_key<T>(&self, qualifier: Option<&str>) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let span = info_span!("get", bean = type_name::<T>(), qualifier);
        let _guard = span.enter();

        let mut ctx = self.context();
        self.resolve_in::<T>(&Key::new::<T>(qualifier), &mut ctx)
    }

    /// Context of a new request, seeded with the types this thread is already building.
    fn context(&self) -> ResolveContext<'_> {
        ResolveContext::new(self, self.inner.in_progress.current())
    }

    fn get_optional_key<T>(&self, qualifier: Option<&str>) -> Result<Option<Arc<T>>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !self.inner.registry.read().contains(TypeInfo::of::<T>(), qualifier) {
            debug!(bean = type_name::<T>(), qualifier, "Optional bean not registered");
            return Ok(None);
        }
        self.get_key::<T>(qualifier).map(Some)
    }

    /// Resolves `key` as part of the request `ctx` belongs to.
    pub(crate) fn resolve_in<T>(&self, key: &Key, ctx: &mut ResolveContext<'_>) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let bean = self.resolve_bean(key, ctx, true)?;
        Self::downcast::<T>(&bean)
    }

    /// Proxy of `I` resolving `key` with a request of its own on the first method call.
    pub(crate) fn lazy_handle<I>(&self, key: Key) -> Arc<I>
    where
        I: ?Sized + Interface,
    {
        let container = self.downgrade();
        self.inner.proxies.create::<I, _>(move || {
            let container = container.upgrade().ok_or(ResolveErrorKind::ContainerClosed { type_info: key.type_info })?;
            let mut ctx = container.context();
            let bean = container.resolve_bean(&key, &mut ctx, false)?;
            Self::downcast::<I>(&bean)
        })
    }

    fn downcast<T>(bean: &Bean) -> Result<Arc<T>, ResolveErrorKind>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        bean.downcast::<T>().ok_or_else(|| {
            let err = ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<T>(),
                actual: bean.type_info(),
            };
            error!("{}", err);
            err
        })
    }

    /// Bean of the requested key's type, a lazy proxy if `allow_lazy` and the definition asks for one.
    fn resolve_bean(&self, key: &Key, ctx: &mut ResolveContext<'_>, allow_lazy: bool) -> Result<Bean, ResolveErrorKind> {
        let Some(definition) = self.inner.registry.read().get(key.type_info, key.qualifier.as_deref()) else {
            let err = ResolveErrorKind::NotFound {
                type_info: key.type_info,
                qualifier: key.qualifier.clone(),
            };
            error!("{}", err);
            return Err(err);
        };

        if allow_lazy && definition.is_lazy() && key.type_info != definition.implementation() && self.inner.config.lazy_proxies {
            return self.lazy_bean(key, &definition);
        }

        let bean = self.instance(&definition, ctx)?;
        match definition.cast(&bean, key.type_info) {
            Some(bean) => Ok(bean),
            None => {
                let err = ResolveErrorKind::IncorrectType {
                    expected: key.type_info,
                    actual: bean.type_info(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Real instance of the definition's implementation type.
    fn instance(&self, definition: &Arc<BeanDefinition>, ctx: &mut ResolveContext<'_>) -> Result<Bean, ResolveErrorKind> {
        if !definition.is_singleton() {
            return self.create_bean(definition, ctx);
        }

        let key = definition.instance_key();
        if let Some(bean) = self.inner.cache.lock().get(&key) {
            debug!(%key, "Found in cache");
            return Ok(bean);
        }
        debug!(%key, "Not found in cache");

        let lock = self.inner.creation.get(&key);
        let _creation = lock.lock();
        if let Some(bean) = self.inner.cache.lock().get(&key) {
            debug!(%key, "Found in cache after waiting for creation");
            return Ok(bean);
        }

        let bean = self.create_bean(definition, ctx)?;

        let mut cache = self.inner.cache.lock();
        let bean = cache.insert(key, bean);
        debug!("Cached");
        if definition.descriptor().has_teardown() {
            cache.push_resolved(Resolved {
                definition: definition.clone(),
                bean: bean.clone(),
            });
            debug!("Pushed to resolved set");
        }
        Ok(bean)
    }

    fn create_bean(&self, definition: &BeanDefinition, ctx: &mut ResolveContext<'_>) -> Result<Bean, ResolveErrorKind> {
        let type_info = definition.implementation();
        // Registered instances are handed out again after shutdown, nothing is built for them.
        if self.inner.is_closed() && !definition.descriptor().lifecycle().is_prebuilt() {
            let err = ResolveErrorKind::ContainerClosed { type_info };
            error!("{}", err);
            return Err(err);
        }

        if let Err(err) = ctx.stack_mut().push(type_info) {
            error!("{}", err);
            return Err(err);
        }
        let construction = self.inner.in_progress.enter(type_info);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| Self::run_lifecycle(definition, ctx)));
        drop(construction);
        ctx.stack_mut().pop(type_info);

        // A lazy proxy used by a hook or an injection method can only fail by panicking.
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => match payload.downcast::<ProxyFailure>() {
                Ok(failure) => Err((*failure).into_error()),
                Err(payload) => panic::resume_unwind(payload),
            },
        };

        if let Err(err) = &result {
            if matches!(err, ResolveErrorKind::Construction { type_info: failed, .. } if *failed == type_info) {
                error!("{}", err);
            }
        }
        result
    }

    fn run_lifecycle(definition: &BeanDefinition, ctx: &mut ResolveContext<'_>) -> Result<Bean, ResolveErrorKind> {
        let lifecycle = definition.descriptor().lifecycle();

        let mut instance = lifecycle.construct(ctx)?;
        lifecycle.inject_fields(&mut instance, ctx)?;
        lifecycle.inject_methods(&mut instance, ctx)?;
        lifecycle.post_construct(&mut instance)?;

        let bean = lifecycle.seal(instance)?;
        debug!(bean = %definition.implementation(), "Ready");
        Ok(bean)
    }

    fn lazy_bean(&self, key: &Key, definition: &Arc<BeanDefinition>) -> Result<Bean, ResolveErrorKind> {
        if definition.is_singleton() {
            let cache = self.inner.cache.lock();
            if let Some(proxy) = cache.get_proxy(key) {
                debug!(%key, "Proxy found in cache");
                return Ok(proxy);
            }
            if let Some(bean) = cache.get(&definition.instance_key()).and_then(|bean| definition.cast(&bean, key.type_info)) {
                debug!(%key, "Already built, proxy skipped");
                return Ok(bean);
            }
        }

        if self.inner.is_closed() {
            let err = ResolveErrorKind::ContainerClosed {
                type_info: definition.implementation(),
            };
            error!("{}", err);
            return Err(err);
        }

        let container = self.downgrade();
        let target = key.clone();
        let supplier: BeanSupplier = Box::new(move || {
            let container = container
                .upgrade()
                .ok_or(ResolveErrorKind::ContainerClosed { type_info: target.type_info })?;
            let mut ctx = container.context();
            container.resolve_bean(&target, &mut ctx, false)
        });
        let proxy = self.inner.proxies.create_erased(key.type_info, supplier)?;
        debug!(%key, "Lazy proxy created");

        if definition.is_singleton() {
            return Ok(self.inner.cache.lock().insert_proxy(key.clone(), proxy));
        }
        Ok(proxy)
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.len())
            .field("singletons", &self.inner.cache.lock().len())
            .field("closed", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

/// Handle that doesn't keep the container alive, used by lazy proxies.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

pub(crate) struct ContainerInner {
    registry: RwLock<Registry>,
    cache: Mutex<Cache>,
    properties: RwLock<Properties>,
    proxies: ProxyFactory,
    creation: CreationLocks,
    in_progress: InProgress,
    closed: AtomicBool,
    config: Config,
}

impl ContainerInner {
    #[inline]
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn conditions_match(&self, descriptor: &Descriptor, registry: &Registry) -> bool {
        let properties = self.properties.read();
        match descriptor
            .conditions()
            .iter()
            .find(|condition| !condition.matches(&properties, registry))
        {
            Some(condition) => {
                debug!(%condition, "Condition not matched, registration skipped");
                false
            }
            None => true,
        }
    }

    fn teardown(&self) -> Result<(), ShutdownErrorKind> {
        let mut resolved_set = self.cache.lock().clear();
        let mut failures = Vec::new();

        while let Some(Resolved { definition, bean }) = resolved_set.pop() {
            let type_info = definition.implementation();
            match definition.descriptor().lifecycle().teardown(&bean) {
                Ok(()) => debug!(bean = %type_info, "Teardown hook called"),
                Err(source) => {
                    warn!(bean = %type_info, error = %source, "Teardown hook failed");
                    failures.push(TeardownFailure { type_info, source });
                }
            }
        }

        match ShutdownErrorKind::from_failures(failures) {
            Some(err) => {
                error!("{}", err);
                Err(err)
            }
            None => {
                debug!("Container shut down");
                Ok(())
            }
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.teardown();
            debug!("Container closed on drop");
        }
    }
}
