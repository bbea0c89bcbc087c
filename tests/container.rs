use sprout::{
    upcast, ConstructionErrorKind, Container, Describe, Inject, InstantiateErrorKind, Named, RegistrationErrorKind,
    ResolveErrorKind, Scope, TypeDescriptor, TypeInfo,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
};
use tracing_test::traced_test;

sprout::qualifier!(Redis = "redis");

trait Cache: Send + Sync {
    fn name(&self) -> &'static str;
}

macro_rules! cache {
    ($ty:ident, $name:literal $(, $tag:ident)*) => {
        struct $ty;

        impl Cache for $ty {
            fn name(&self) -> &'static str {
                $name
            }
        }

        impl Describe for $ty {
            fn describe() -> TypeDescriptor<Self> {
                TypeDescriptor::injectable()
                    .singleton()
                    $( .$tag() )*
                    .implements(upcast!(dyn Cache))
                    .constructor(|| Ok($ty))
            }
        }
    };
}

cache!(MemoryCache, "memory");
cache!(DiskCache, "disk");
cache!(PrimaryCache, "primary", primary);
cache!(OtherPrimaryCache, "other-primary", primary);

struct RedisCache;

impl Cache for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }
}

impl Describe for RedisCache {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .singleton()
            .named("redis")
            .implements(upcast!(dyn Cache))
            .constructor(|| Ok(RedisCache))
    }
}

static SHARED_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Shared;

impl Describe for Shared {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().singleton().constructor(|| {
            SHARED_BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Shared)
        })
    }
}

static REQUEST_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Request;

impl Describe for Request {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().prototype().constructor(|| {
            REQUEST_BUILDS.fetch_add(1, Ordering::SeqCst);
            Ok(Request)
        })
    }
}

#[test]
#[traced_test]
fn test_singleton_built_once_under_concurrency() {
    let container = Container::new();
    container.register::<Shared>().unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get::<Shared>().unwrap()
            })
        })
        .collect();
    let instances: Vec<_> = threads.into_iter().map(|thread| thread.join().unwrap()).collect();

    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &instances[0])));
    assert!(Arc::ptr_eq(&container.get::<Shared>().unwrap(), &instances[0]));
    assert_eq!(SHARED_BUILDS.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_prototype_built_per_request() {
    let container = Container::new();
    container.register::<Request>().unwrap();

    let instances: Vec<_> = (0..5).map(|_| container.get::<Request>().unwrap()).collect();

    for (index, instance) in instances.iter().enumerate() {
        for other in &instances[index + 1..] {
            assert!(!Arc::ptr_eq(instance, other));
        }
    }
    assert_eq!(REQUEST_BUILDS.load(Ordering::SeqCst), 5);
    assert_eq!(container.scope_of::<Request>().unwrap(), Scope::Prototype);
}

struct A(#[allow(dead_code)] Arc<B>);
struct B(#[allow(dead_code)] Arc<A>);

impl Describe for A {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().constructor(|Inject(b): Inject<B>| Ok(A(b)))
    }
}

impl Describe for B {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().constructor(|Inject(a): Inject<A>| Ok(B(a)))
    }
}

#[test]
#[traced_test]
fn test_two_type_cycle() {
    let container = Container::new();
    container.register::<A>().unwrap();
    container.register::<B>().unwrap();

    let err = container.get::<A>().err().unwrap();

    assert_eq!(
        err.cycle(),
        Some([TypeInfo::of::<A>(), TypeInfo::of::<B>(), TypeInfo::of::<A>()].as_slice())
    );
    assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");

    // The stack is unwound, the next request reports the same cycle.
    let err = container.get::<B>().err().unwrap();
    assert_eq!(
        err.cycle(),
        Some([TypeInfo::of::<B>(), TypeInfo::of::<A>(), TypeInfo::of::<B>()].as_slice())
    );
}

struct Entry(#[allow(dead_code)] Arc<X>);
struct X(#[allow(dead_code)] Arc<Y>);
struct Y(#[allow(dead_code)] Arc<Z>);

#[derive(Default)]
struct Z {
    x: Option<Arc<X>>,
}

impl Describe for Entry {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().constructor(|Inject(x): Inject<X>| Ok(Entry(x)))
    }
}

impl Describe for X {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().singleton().constructor(|Inject(y): Inject<Y>| Ok(X(y)))
    }
}

impl Describe for Y {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable().constructor(|Inject(z): Inject<Z>| Ok(Y(z)))
    }
}

impl Describe for Z {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .default_constructor()
            .field("x", |this: &mut Z, Inject(x): Inject<X>| this.x = Some(x))
    }
}

#[test]
#[traced_test]
fn test_cycle_through_field_reports_closing_suffix() {
    let container = Container::new();
    container.register::<Entry>().unwrap();
    container.register::<X>().unwrap();
    container.register::<Y>().unwrap();
    container.register::<Z>().unwrap();

    let err = container.get::<Entry>().err().unwrap();

    assert_eq!(
        err.cycle(),
        Some([TypeInfo::of::<X>(), TypeInfo::of::<Y>(), TypeInfo::of::<Z>(), TypeInfo::of::<X>()].as_slice())
    );
    assert!(Z::default().x.is_none());
}

#[test]
#[traced_test]
fn test_not_found() {
    let container = Container::new();
    container.register::<RedisCache>().unwrap();

    let err = container.get::<MemoryCache>().err().unwrap();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "No bean found for type: MemoryCache");

    let err = container.get_named::<dyn Cache>("memcached").err().unwrap();
    assert_eq!(err.to_string(), "No bean found for type: Cache with qualifier: memcached");

    assert!(container.get_optional_named::<dyn Cache>("memcached").unwrap().is_none());
}

#[test]
#[traced_test]
fn test_qualified_lookup_does_not_fall_back() {
    let container = Container::new();
    container.register::<MemoryCache>().unwrap();

    assert!(container.get::<dyn Cache>().is_ok());
    assert!(container.get_named::<dyn Cache>("redis").is_err());

    container.register::<RedisCache>().unwrap();

    assert_eq!(container.get_named::<dyn Cache>("redis").unwrap().name(), "redis");
    assert_eq!(container.get_named::<RedisCache>("redis").unwrap().name(), "redis");
    assert_eq!(container.get::<dyn Cache>().unwrap().name(), "memory");
    assert_eq!(container.definition_named::<dyn Cache>("redis").unwrap().qualifier(), Some("redis"));
}

#[test]
#[traced_test]
fn test_primary_overrides_only_earlier_registrations() {
    let container = Container::new();
    container.register::<MemoryCache>().unwrap();
    container.register::<PrimaryCache>().unwrap();
    container.register::<DiskCache>().unwrap();

    assert_eq!(container.get::<dyn Cache>().unwrap().name(), "primary");
    assert_eq!(container.get::<DiskCache>().unwrap().name(), "disk");

    let container = Container::new();
    container.register::<MemoryCache>().unwrap();
    container.register::<DiskCache>().unwrap();

    assert_eq!(container.get::<dyn Cache>().unwrap().name(), "memory");
}

#[test]
#[traced_test]
fn test_second_primary_fails_at_registration() {
    let container = Container::new();
    container.register::<PrimaryCache>().unwrap();

    let err = container.register::<OtherPrimaryCache>().unwrap_err();

    assert!(matches!(
        err,
        RegistrationErrorKind::AmbiguousBinding { interface, .. } if interface == TypeInfo::of::<dyn Cache>()
    ));
    assert!(!container.contains::<OtherPrimaryCache>());
    assert_eq!(container.get::<dyn Cache>().unwrap().name(), "primary");
}

#[test]
#[traced_test]
fn test_explicit_bindings() {
    let container = Container::new();
    container.bind::<dyn Cache, DiskCache>().unwrap();
    container.bind_named::<dyn Cache, MemoryCache>("fast").unwrap();

    assert_eq!(container.get::<dyn Cache>().unwrap().name(), "disk");
    assert_eq!(container.get_named::<dyn Cache>("fast").unwrap().name(), "memory");
    assert!(container.contains_named::<dyn Cache>("fast"));

    let err = container.bind::<dyn Cache, Shared>().unwrap_err();
    assert!(matches!(err, RegistrationErrorKind::NotImplemented { .. }));
}

struct Failing;

impl Cache for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }
}

impl Describe for Failing {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .implements(upcast!(dyn Cache))
            .constructor(|| Err(InstantiateErrorKind::from(anyhow::anyhow!("unreachable host"))))
    }
}

#[test]
#[traced_test]
fn test_get_all_skips_failures() {
    let container = Container::new();
    container.register::<MemoryCache>().unwrap();
    container.register::<DiskCache>().unwrap();
    container.register::<Failing>().unwrap();
    container.register::<RedisCache>().unwrap();

    let mut names: Vec<_> = container.get_all::<dyn Cache>().iter().map(|cache| cache.name()).collect();
    names.sort_unstable();

    assert_eq!(names, ["disk", "memory", "redis"]);
}

struct Hidden;

impl Describe for Hidden {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::new().constructor(|| Ok(Hidden))
    }
}

struct Plugin;

impl Describe for Plugin {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .constructor(|| Ok(Plugin))
            .method("init", |_: &mut Plugin| Ok(()))
    }
}

#[test]
#[traced_test]
fn test_registration_validation() {
    let container = Container::new();

    assert!(matches!(
        container.register::<Hidden>(),
        Err(RegistrationErrorKind::NotInjectable { .. })
    ));
    assert!(matches!(
        container.register::<Plugin>(),
        Err(RegistrationErrorKind::InvalidInjectionMethod { name: "init", .. })
    ));
    assert!(container.is_empty());
}

struct Pool {
    size: usize,
    cache: Option<Arc<dyn Cache>>,
}

impl Describe for Pool {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .constructor(|| Ok(Pool { size: 1, cache: None }))
            .inject_constructor(|Named(cache, _): Named<dyn Cache, Redis>| {
                Ok(Pool {
                    size: 8,
                    cache: Some(cache),
                })
            })
    }
}

struct Workers(usize);

impl Describe for Workers {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .constructor(|Inject(_): Inject<dyn Cache>| Ok(Workers(2)))
            .constructor(|| Ok(Workers(1)))
    }
}

struct Ambiguous;

impl Describe for Ambiguous {
    fn describe() -> TypeDescriptor<Self> {
        TypeDescriptor::injectable()
            .constructor(|Inject(_): Inject<dyn Cache>| Ok(Ambiguous))
            .constructor(|Inject(_): Inject<Shared>| Ok(Ambiguous))
    }
}

#[test]
#[traced_test]
fn test_constructor_selection() {
    let container = Container::new();
    container.register::<RedisCache>().unwrap();
    container.register::<Pool>().unwrap();
    container.register::<Workers>().unwrap();
    container.register::<Ambiguous>().unwrap();

    let pool = container.get::<Pool>().unwrap();
    assert_eq!(pool.size, 8);
    assert_eq!(pool.cache.as_ref().map(|cache| cache.name()), Some("redis"));

    assert_eq!(container.get::<Workers>().unwrap().0, 1);

    let err = container.get::<Ambiguous>().err().unwrap();
    assert!(matches!(
        err,
        ResolveErrorKind::Construction {
            source: ConstructionErrorKind::NoSuitableConstructor,
            ..
        }
    ));
}

#[test]
#[traced_test]
fn test_introspection() {
    let container = Container::new();
    container.register::<MemoryCache>().unwrap();
    container.register::<Request>().unwrap();

    assert_eq!(container.len(), 3);
    assert!(container.registered_types().contains(&TypeInfo::of::<dyn Cache>()));
    assert_eq!(container.scope_of::<dyn Cache>().unwrap(), Scope::Singleton);
    assert!(container.scope_of::<Shared>().unwrap_err().is_not_found());
    assert_eq!(
        container.definition::<dyn Cache>().unwrap().to_string(),
        "BeanDefinition{implementation=MemoryCache, scope=singleton}"
    );
}
