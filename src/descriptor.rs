use std::{
    any::Any,
    collections::BTreeMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

use crate::{
    any::{Bean, TypeInfo},
    condition::Condition,
    dependency::Dependency,
    dependency_resolver::{DependencyResolver, FieldResolver, ResolveContext},
    errors::{ConstructionErrorKind, InstantiateErrorKind, RegistrationErrorKind, ResolveErrorKind},
    finalizer::{boxed_finalizer, boxed_initializer, BoxedFinalizer, BoxedInitializer, Finalizer, Initializer},
    instantiator::{boxed_constructor, boxed_field_setter, boxed_injector, BoxedConstructor, BoxedInjector, Injector, Instantiator},
    scope::Scope,
};

/// Types that describe how the container builds them.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use sprout::{upcast, Container, Describe, Inject, TypeDescriptor};
///
/// trait Repo: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
///
/// struct MemoryRepo;
///
/// impl Repo for MemoryRepo {
///     fn name(&self) -> &'static str {
///         "memory"
///     }
/// }
///
/// impl Describe for MemoryRepo {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::injectable()
///             .singleton()
///             .implements(upcast!(dyn Repo))
///             .constructor(|| Ok(MemoryRepo))
///     }
/// }
///
/// struct Service {
///     repo: Arc<dyn Repo>,
/// }
///
/// impl Describe for Service {
///     fn describe() -> TypeDescriptor<Self> {
///         TypeDescriptor::injectable().constructor(|Inject(repo): Inject<dyn Repo>| Ok(Service { repo }))
///     }
/// }
///
/// let container = Container::new();
/// container.register::<MemoryRepo>().unwrap();
/// container.register::<Service>().unwrap();
///
/// assert_eq!(container.get::<Service>().unwrap().repo.name(), "memory");
/// ```
pub trait Describe: Sized + Send + Sync + 'static {
    #[must_use]
    fn describe() -> TypeDescriptor<Self>;
}

/// Writes the upcast closure for [`TypeDescriptor::implements`].
///
/// `upcast!(dyn Repo)` expands to `|this| this as Arc<dyn Repo>`.
#[macro_export]
macro_rules! upcast {
    ($($interface:tt)+) => {
        |this| this as ::std::sync::Arc<$($interface)+>
    };
}

struct ConstructorEntry<T> {
    tagged: bool,
    dependencies: Vec<Dependency>,
    construct: BoxedConstructor<T>,
}

struct InjectionPoint<T> {
    dependencies: Vec<Dependency>,
    inject: BoxedInjector<T>,
}

pub(crate) type Upcast = Arc<dyn Fn(&Bean) -> Option<Bean> + Send + Sync>;

/// Metadata and injection points of `T`.
///
/// Built fluently and consumed by the container through [`Describe`] or [`TypeDescriptor::into_descriptor`].
/// Field and method injection run in declaration order.
pub struct TypeDescriptor<T> {
    injectable: bool,
    scope: Scope,
    qualifier: Option<String>,
    primary: bool,
    lazy: bool,
    constructors: Vec<ConstructorEntry<T>>,
    fields: Vec<InjectionPoint<T>>,
    methods: Vec<InjectionPoint<T>>,
    post_construct: Option<BoxedInitializer<T>>,
    pre_destroy: Option<BoxedFinalizer<T>>,
    interfaces: BTreeMap<TypeInfo, Upcast>,
    conditions: Vec<Condition>,
    invalid_method: Option<&'static str>,
}

impl<T: Send + Sync + 'static> Default for TypeDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> TypeDescriptor<T> {
    /// Descriptor without the injectable tag, registering it fails with [`RegistrationErrorKind::NotInjectable`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            injectable: false,
            scope: Scope::default(),
            qualifier: None,
            primary: false,
            lazy: false,
            constructors: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            post_construct: None,
            pre_destroy: None,
            interfaces: BTreeMap::new(),
            conditions: Vec::new(),
            invalid_method: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn injectable() -> Self {
        Self {
            injectable: true,
            ..Self::new()
        }
    }

    #[inline]
    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.scope(Scope::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    #[inline]
    #[must_use]
    pub fn named(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Requests through an interface return a [`crate::LazyProxy`] instead of a built instance.
    #[inline]
    #[must_use]
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Declares that `T` can be requested as `I`.
    #[must_use]
    pub fn implements<I, F>(mut self, upcast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let upcast: Upcast = Arc::new(move |bean: &Bean| bean.downcast::<T>().map(|this| Bean::new(upcast(this))));
        self.interfaces.insert(TypeInfo::of::<I>(), upcast);
        self
    }

    /// Adds a constructor, its parameters are resolved from the container.
    ///
    /// With several constructors the one added with [`Self::inject_constructor`] is used,
    /// otherwise the one without parameters.
    #[must_use]
    pub fn constructor<Inst, Deps>(self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        self.add_constructor(false, instantiator)
    }

    /// Adds a constructor explicitly tagged for injection.
    #[must_use]
    pub fn inject_constructor<Inst, Deps>(self, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        self.add_constructor(true, instantiator)
    }

    /// Adds a constructor without parameters based on [`Default`].
    #[must_use]
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.add_constructor(false, || Ok::<_, InstantiateErrorKind>(T::default()))
    }

    fn add_constructor<Inst, Deps>(mut self, tagged: bool, instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        self.constructors.push(ConstructorEntry {
            tagged,
            dependencies: Inst::dependencies(),
            construct: boxed_constructor(instantiator),
        });
        self
    }

    /// Adds an injected field, the setter receives the resolved value.
    #[must_use]
    pub fn field<D, F>(mut self, name: &'static str, setter: F) -> Self
    where
        D: FieldResolver,
        F: Fn(&mut T, D) + Send + Sync + 'static,
    {
        self.fields.push(InjectionPoint {
            dependencies: vec![D::dependency()],
            inject: boxed_field_setter(name, setter),
        });
        self
    }

    /// Adds an injection method, called after field injection with resolved parameters.
    ///
    /// A method without parameters makes the registration fail with
    /// [`RegistrationErrorKind::InvalidInjectionMethod`], use [`Self::post_construct`] for those.
    #[must_use]
    pub fn method<Inj, Deps>(mut self, name: &'static str, injector: Inj) -> Self
    where
        Inj: Injector<T, Deps, Error = InstantiateErrorKind>,
        Deps: DependencyResolver,
    {
        let dependencies = Inj::dependencies();
        if dependencies.is_empty() && self.invalid_method.is_none() {
            self.invalid_method = Some(name);
        }
        self.methods.push(InjectionPoint {
            dependencies,
            inject: boxed_injector(name, injector),
        });
        self
    }

    #[must_use]
    pub fn post_construct<Init>(mut self, initializer: Init) -> Self
    where
        Init: Initializer<T, Error = InstantiateErrorKind>,
    {
        self.post_construct = Some(boxed_initializer(initializer));
        self
    }

    #[must_use]
    pub fn pre_destroy<Fin>(mut self, finalizer: Fin) -> Self
    where
        Fin: Finalizer<T, Error = InstantiateErrorKind>,
    {
        self.pre_destroy = Some(boxed_finalizer(finalizer));
        self
    }

    #[inline]
    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Registered only if the property is set to anything but `"false"`.
    #[inline]
    #[must_use]
    pub fn conditional_on_property(self, name: impl Into<String>) -> Self {
        self.condition(Condition::OnProperty {
            name: name.into(),
            having_value: None,
            match_if_missing: false,
        })
    }

    /// Registered only if the property equals `value`.
    #[inline]
    #[must_use]
    pub fn conditional_on_property_value(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.condition(Condition::OnProperty {
            name: name.into(),
            having_value: Some(value.into()),
            match_if_missing: false,
        })
    }

    /// Registered if the property is missing or set to anything but `"false"`.
    #[inline]
    #[must_use]
    pub fn conditional_on_property_or_missing(self, name: impl Into<String>) -> Self {
        self.condition(Condition::OnProperty {
            name: name.into(),
            having_value: None,
            match_if_missing: true,
        })
    }

    #[inline]
    #[must_use]
    pub fn conditional_on_bean<B: ?Sized + 'static>(self) -> Self {
        self.condition(Condition::OnBean(TypeInfo::of::<B>()))
    }

    #[inline]
    #[must_use]
    pub fn conditional_on_missing_bean<B: ?Sized + 'static>(self) -> Self {
        self.condition(Condition::OnMissingBean(TypeInfo::of::<B>()))
    }

    #[must_use]
    pub fn into_descriptor(self) -> Descriptor {
        let mut dependencies = Vec::new();
        for constructor in &self.constructors {
            dependencies.extend(constructor.dependencies.iter().cloned());
        }
        for point in self.fields.iter().chain(&self.methods) {
            dependencies.extend(point.dependencies.iter().cloned());
        }

        Descriptor {
            type_info: TypeInfo::of::<T>(),
            injectable: self.injectable,
            scope: self.scope,
            qualifier: self.qualifier,
            primary: self.primary,
            lazy: self.lazy,
            interfaces: self.interfaces,
            conditions: self.conditions,
            dependencies,
            invalid_method: self.invalid_method,
            lifecycle: Box::new(Steps {
                constructors: self.constructors,
                fields: self.fields,
                methods: self.methods,
                post_construct: self.post_construct,
                pre_destroy: self.pre_destroy,
            }),
        }
    }
}

impl<T: Send + Sync + 'static> From<TypeDescriptor<T>> for Descriptor {
    fn from(descriptor: TypeDescriptor<T>) -> Self {
        descriptor.into_descriptor()
    }
}

pub(crate) type Instance = Box<dyn Any + Send + Sync>;

/// Construction steps of one type behind a type-erased interface.
///
/// The container drives them in order: construct, inject fields, inject methods, post-construct, seal.
pub(crate) trait Lifecycle: Send + Sync {
    fn construct(&self, ctx: &mut ResolveContext<'_>) -> Result<Instance, ResolveErrorKind>;

    fn inject_fields(&self, instance: &mut Instance, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind>;

    fn inject_methods(&self, instance: &mut Instance, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind>;

    fn post_construct(&self, instance: &mut Instance) -> Result<(), ResolveErrorKind>;

    fn seal(&self, instance: Instance) -> Result<Bean, ResolveErrorKind>;

    fn has_teardown(&self) -> bool;

    fn teardown(&self, bean: &Bean) -> Result<(), InstantiateErrorKind>;

    /// Hands out a value built by the caller instead of building one.
    fn is_prebuilt(&self) -> bool {
        false
    }
}

struct Steps<T> {
    constructors: Vec<ConstructorEntry<T>>,
    fields: Vec<InjectionPoint<T>>,
    methods: Vec<InjectionPoint<T>>,
    post_construct: Option<BoxedInitializer<T>>,
    pre_destroy: Option<BoxedFinalizer<T>>,
}

impl<T: Send + Sync + 'static> Steps<T> {
    fn select_constructor(&self) -> Option<&ConstructorEntry<T>> {
        if let Some(tagged) = self.constructors.iter().find(|constructor| constructor.tagged) {
            return Some(tagged);
        }
        if let [sole] = self.constructors.as_slice() {
            return Some(sole);
        }
        self.constructors
            .iter()
            .find(|constructor| constructor.dependencies.is_empty())
    }

    fn instance(instance: &mut Instance) -> Result<&mut T, ResolveErrorKind> {
        let actual = TypeInfo::of::<Instance>();
        instance.downcast_mut::<T>().ok_or(ResolveErrorKind::IncorrectType {
            expected: TypeInfo::of::<T>(),
            actual,
        })
    }

    fn inject_all(points: &[InjectionPoint<T>], instance: &mut Instance, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> {
        let instance = Self::instance(instance)?;
        for point in points {
            (point.inject)(instance, ctx)?;
        }
        Ok(())
    }
}

impl<T: Send + Sync + 'static> Lifecycle for Steps<T> {
    fn construct(&self, ctx: &mut ResolveContext<'_>) -> Result<Instance, ResolveErrorKind> {
        let Some(constructor) = self.select_constructor() else {
            return Err(ResolveErrorKind::Construction {
                type_info: TypeInfo::of::<T>(),
                source: ConstructionErrorKind::NoSuitableConstructor,
            });
        };
        (constructor.construct)(ctx).map(|instance| Box::new(instance) as Instance)
    }

    fn inject_fields(&self, instance: &mut Instance, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> {
        Self::inject_all(&self.fields, instance, ctx)
    }

    fn inject_methods(&self, instance: &mut Instance, ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> {
        Self::inject_all(&self.methods, instance, ctx)
    }

    fn post_construct(&self, instance: &mut Instance) -> Result<(), ResolveErrorKind> {
        match &self.post_construct {
            Some(initializer) => initializer(Self::instance(instance)?),
            None => Ok(()),
        }
    }

    fn seal(&self, instance: Instance) -> Result<Bean, ResolveErrorKind> {
        match instance.downcast::<T>() {
            Ok(instance) => Ok(Bean::new(Arc::<T>::from(instance))),
            Err(_) => Err(ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<T>(),
                actual: TypeInfo::of::<Instance>(),
            }),
        }
    }

    fn has_teardown(&self) -> bool {
        self.pre_destroy.is_some()
    }

    fn teardown(&self, bean: &Bean) -> Result<(), InstantiateErrorKind> {
        let Some(finalizer) = &self.pre_destroy else {
            return Ok(());
        };
        match bean.downcast::<T>() {
            Some(instance) => finalizer(instance.as_ref()),
            None => Err(anyhow::anyhow!("teardown expected {}, got {}", TypeInfo::of::<T>(), bean.type_info()).into()),
        }
    }
}

/// Pre-built value, "constructing" it hands out the same shared instance.
struct Prebuilt<T: ?Sized>(Arc<T>);

impl<T: ?Sized + Send + Sync + 'static> Lifecycle for Prebuilt<T> {
    fn construct(&self, _ctx: &mut ResolveContext<'_>) -> Result<Instance, ResolveErrorKind> {
        Ok(Box::new(self.0.clone()))
    }

    fn inject_fields(&self, _instance: &mut Instance, _ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> {
        Ok(())
    }

    fn inject_methods(&self, _instance: &mut Instance, _ctx: &mut ResolveContext<'_>) -> Result<(), ResolveErrorKind> {
        Ok(())
    }

    fn post_construct(&self, _instance: &mut Instance) -> Result<(), ResolveErrorKind> {
        Ok(())
    }

    fn seal(&self, instance: Instance) -> Result<Bean, ResolveErrorKind> {
        match instance.downcast::<Arc<T>>() {
            Ok(instance) => Ok(Bean::new(*instance)),
            Err(_) => Err(ResolveErrorKind::IncorrectType {
                expected: TypeInfo::of::<T>(),
                actual: TypeInfo::of::<Instance>(),
            }),
        }
    }

    fn has_teardown(&self) -> bool {
        false
    }

    fn teardown(&self, _bean: &Bean) -> Result<(), InstantiateErrorKind> {
        Ok(())
    }

    fn is_prebuilt(&self) -> bool {
        true
    }
}

/// Type-erased [`TypeDescriptor`].
pub struct Descriptor {
    type_info: TypeInfo,
    injectable: bool,
    scope: Scope,
    qualifier: Option<String>,
    primary: bool,
    lazy: bool,
    interfaces: BTreeMap<TypeInfo, Upcast>,
    conditions: Vec<Condition>,
    dependencies: Vec<Dependency>,
    invalid_method: Option<&'static str>,
    lifecycle: Box<dyn Lifecycle>,
}

impl Descriptor {
    #[must_use]
    pub fn of<T: Describe>() -> Self {
        T::describe().into_descriptor()
    }

    /// Descriptor of a pre-built singleton.
    #[must_use]
    pub(crate) fn prebuilt<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            injectable: true,
            scope: Scope::Singleton,
            qualifier: None,
            primary: false,
            lazy: false,
            interfaces: BTreeMap::new(),
            conditions: Vec::new(),
            dependencies: Vec::new(),
            invalid_method: None,
            lifecycle: Box::new(Prebuilt(instance)),
        }
    }

    #[inline]
    #[must_use]
    pub const fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub const fn is_injectable(&self) -> bool {
        self.injectable
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
    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    #[inline]
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    #[inline]
    #[must_use]
    pub fn implements(&self, interface: TypeInfo) -> bool {
        self.interfaces.contains_key(&interface)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.interfaces.keys().copied()
    }

    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Every injection point in declaration order: constructors, fields, methods.
    #[inline]
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    #[inline]
    #[must_use]
    pub fn has_teardown(&self) -> bool {
        self.lifecycle.has_teardown()
    }

    /// Checks the descriptor can be registered at all.
    ///
    /// # Errors
    /// - [`RegistrationErrorKind::NotInjectable`] without the injectable tag.
    /// - [`RegistrationErrorKind::InvalidInjectionMethod`] for an injection method without parameters.
    pub fn validate(&self) -> Result<(), RegistrationErrorKind> {
        if !self.injectable {
            return Err(RegistrationErrorKind::NotInjectable {
                type_info: self.type_info,
            });
        }
        if let Some(name) = self.invalid_method {
            return Err(RegistrationErrorKind::InvalidInjectionMethod {
                type_info: self.type_info,
                name,
            });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn lifecycle(&self) -> &dyn Lifecycle {
        self.lifecycle.as_ref()
    }

    /// Converts an instance of this type into a bean of `interface`.
    #[must_use]
    pub(crate) fn cast(&self, bean: &Bean, interface: TypeInfo) -> Option<Bean> {
        if interface == self.type_info {
            return Some(bean.clone());
        }
        self.interfaces.get(&interface).and_then(|upcast| upcast(bean))
    }
}

impl Debug for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("type", &self.type_info.name)
            .field("injectable", &self.injectable)
            .field("scope", &self.scope)
            .field("qualifier", &self.qualifier)
            .field("primary", &self.primary)
            .field("lazy", &self.lazy)
            .field("interfaces", &self.interfaces.keys().map(|info| info.name).collect::<Vec<_>>())
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}
