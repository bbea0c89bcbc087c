use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    fmt::{self, Debug, Display, Formatter},
    panic,
    sync::{Arc, OnceLock, Weak},
};
use tracing::{debug, error};

use crate::{
    any::{addr_of, Bean, TypeInfo},
    errors::{ProxyErrorKind, ResolveErrorKind},
};

/// Trait object type that can be stood in for by a [`LazyProxy`].
///
/// Implemented by [`crate::lazy_proxy!`] together with the delegating
/// `impl Trait for LazyProxy<dyn Trait>`.
pub trait Interface: Send + Sync + 'static {
    #[must_use]
    fn from_proxy(proxy: Arc<LazyProxy<Self>>) -> Arc<Self>;
}

type Supplier<I> = Box<dyn Fn() -> Result<Arc<I>, ResolveErrorKind> + Send + Sync>;

/// Stand-in for a bean that isn't built until its first method call.
///
/// The supplier runs at most once: concurrent first calls are serialized and
/// every caller observes the same target. A failed supplier leaves the proxy
/// uninitialized, so the next call tries again.
pub struct LazyProxy<I: ?Sized> {
    supplier: Supplier<I>,
    target: OnceLock<Arc<I>>,
    lock: Mutex<()>,
}

impl<I: ?Sized + Send + Sync + 'static> LazyProxy<I> {
    #[must_use]
    pub fn new<F>(supplier: F) -> Self
    where
        F: Fn() -> Result<Arc<I>, ResolveErrorKind> + Send + Sync + 'static,
    {
        Self {
            supplier: Box::new(supplier),
            target: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }

    /// Returns the target, building it on the first call.
    ///
    /// # Errors
    /// Returns the supplier error, the proxy stays uninitialized.
    pub fn try_target(&self) -> Result<&Arc<I>, ResolveErrorKind> {
        if let Some(target) = self.target.get() {
            return Ok(target);
        }

        let _guard = self.lock.lock();
        if let Some(target) = self.target.get() {
            return Ok(target);
        }

        let target = (self.supplier)()?;
        debug!(interface = TypeInfo::of::<I>().name, "Lazy proxy materialized");
        Ok(self.target.get_or_init(|| target))
    }

    /// Returns the target, building it on the first call.
    ///
    /// Used by the methods generated with [`crate::lazy_proxy!`].
    ///
    /// # Panics
    /// Panics with a [`ProxyFailure`] payload if the supplier fails, there is no way to report
    /// the error through the proxied trait. A container catches the payload when the proxy is
    /// used while building a bean and returns the error from the resolution request instead.
    #[must_use]
    pub fn target(&self) -> &Arc<I> {
        match self.try_target() {
            Ok(target) => target,
            Err(err) => {
                error!(interface = TypeInfo::of::<I>().name, "Failed to initialize lazy proxy: {}", err);
                panic::panic_any(ProxyFailure(err));
            }
        }
    }
}

impl<I: ?Sized> Display for LazyProxy<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.target.get().is_some() {
            f.write_str("LazyProxy[initialized]")
        } else {
            f.write_str("LazyProxy[not initialized]")
        }
    }
}

impl<I: ?Sized> Debug for LazyProxy<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyProxy")
            .field("interface", &std::any::type_name::<I>())
            .field("initialized", &self.target.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Panic payload of a lazy proxy whose target couldn't be built.
#[derive(Debug)]
pub struct ProxyFailure(pub ResolveErrorKind);

impl ProxyFailure {
    #[inline]
    #[must_use]
    pub fn into_error(self) -> ResolveErrorKind {
        self.0
    }
}

impl Display for ProxyFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to initialize lazy proxy: {}", self.0)
    }
}

/// Type-erased view of a tracked proxy.
trait ProxyState: Send + Sync {
    fn is_initialized(&self) -> bool;
}

impl<I: ?Sized + Send + Sync + 'static> ProxyState for LazyProxy<I> {
    fn is_initialized(&self) -> bool {
        LazyProxy::is_initialized(self)
    }
}

pub(crate) type BeanSupplier = Box<dyn Fn() -> Result<Bean, ResolveErrorKind> + Send + Sync>;

type ProxyConstructor = Arc<dyn Fn(&ProxyFactory, BeanSupplier) -> Bean + Send + Sync>;

/// Creates lazy proxies and remembers which handles are proxies.
///
/// Proxies of bean definitions can be created only for interfaces registered
/// with [`ProxyFactory::register`], since the concrete proxy type is generated per trait.
#[derive(Default)]
pub struct ProxyFactory {
    constructors: RwLock<BTreeMap<TypeInfo, ProxyConstructor>>,
    tracked: Mutex<BTreeMap<usize, Weak<dyn ProxyState>>>,
}

impl ProxyFactory {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows proxies of `I` to be created for lazy bean definitions.
    pub fn register<I: ?Sized + Interface>(&self) {
        let constructor: ProxyConstructor = Arc::new(|factory: &ProxyFactory, supplier: BeanSupplier| {
            let handle = factory.create::<I, _>(move || {
                let bean = supplier()?;
                bean.downcast::<I>().ok_or_else(|| ResolveErrorKind::IncorrectType {
                    expected: TypeInfo::of::<I>(),
                    actual: bean.type_info(),
                })
            });
            Bean::new(handle)
        });
        self.constructors.write().insert(TypeInfo::of::<I>(), constructor);
        debug!(interface = TypeInfo::of::<I>().name, "Proxy interface registered");
    }

    #[inline]
    #[must_use]
    pub fn supports(&self, interface: TypeInfo) -> bool {
        self.constructors.read().contains_key(&interface)
    }

    /// Wraps `supplier` into a lazy proxy of `I`, the supplier isn't called here.
    #[must_use]
    pub fn create<I, F>(&self, supplier: F) -> Arc<I>
    where
        I: ?Sized + Interface,
        F: Fn() -> Result<Arc<I>, ResolveErrorKind> + Send + Sync + 'static,
    {
        let proxy = Arc::new(LazyProxy::new(supplier));
        let state: Arc<dyn ProxyState> = proxy.clone();
        let addr = addr_of(&proxy);

        let mut tracked = self.tracked.lock();
        tracked.retain(|_, state| state.strong_count() > 0);
        tracked.insert(addr, Arc::downgrade(&state));
        drop(tracked);

        I::from_proxy(proxy)
    }

    pub(crate) fn create_erased(&self, interface: TypeInfo, supplier: BeanSupplier) -> Result<Bean, ProxyErrorKind> {
        let Some(constructor) = self.constructors.read().get(&interface).cloned() else {
            let err = ProxyErrorKind::NotAnInterface { type_info: interface };
            error!("{}", err);
            return Err(err);
        };
        Ok(constructor(self, supplier))
    }

    /// Whether `handle` points to a proxy created by this factory.
    #[must_use]
    pub fn is_lazy_proxy<I: ?Sized>(&self, handle: &Arc<I>) -> bool {
        self.state(handle).is_some()
    }

    /// `Some(initialized)` for proxies of this factory, `None` for anything else.
    #[must_use]
    pub fn is_initialized<I: ?Sized>(&self, handle: &Arc<I>) -> Option<bool> {
        self.state(handle).map(|state| state.is_initialized())
    }

    fn state<I: ?Sized>(&self, handle: &Arc<I>) -> Option<Arc<dyn ProxyState>> {
        self.tracked.lock().get(&addr_of(handle)).and_then(Weak::upgrade)
    }
}

/// Implements a trait for `LazyProxy<dyn Trait>` by forwarding every method to the
/// proxy target, and marks `dyn Trait` as an [`Interface`].
///
/// Only `&self` methods are supported, the trait must have `Send + Sync` supertraits.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use sprout::{lazy_proxy, LazyProxy};
///
/// trait Greeter: Send + Sync {
///     fn greet(&self, name: &str) -> String;
/// }
///
/// lazy_proxy!(Greeter {
///     fn greet(&self, name: &str) -> String;
/// });
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self, name: &str) -> String {
///         format!("Hello, {name}")
///     }
/// }
///
/// let proxy = LazyProxy::<dyn Greeter>::new(|| Ok(Arc::new(English) as Arc<dyn Greeter>));
/// assert!(!proxy.is_initialized());
/// assert_eq!(proxy.greet("Bob"), "Hello, Bob");
/// assert!(proxy.is_initialized());
/// ```
#[macro_export]
macro_rules! lazy_proxy {
    ($trait:ident {
        $( fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)* $(,)?) $(-> $ret:ty)?; )*
    }) => {
        impl $trait for $crate::LazyProxy<dyn $trait> {
            $(
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                    $trait::$method(&**self.target(), $($arg),*)
                }
            )*
        }

        impl $crate::Interface for dyn $trait {
            fn from_proxy(proxy: ::std::sync::Arc<$crate::LazyProxy<Self>>) -> ::std::sync::Arc<Self> {
                proxy
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::{LazyProxy, ProxyFactory};
    use crate::{any::TypeInfo, errors::ResolveErrorKind};

    use std::{
        sync::{
            atomic::{AtomicU8, Ordering},
            Arc, Barrier,
        },
        thread,
    };
    use tracing_test::traced_test;

    trait Counter: Send + Sync {
        fn value(&self) -> u8;
        fn add(&self, left: u8, right: u8) -> u8;
    }

    lazy_proxy!(Counter {
        fn value(&self) -> u8;
        fn add(&self, left: u8, right: u8) -> u8;
    });

    struct Fixed(u8);

    impl Counter for Fixed {
        fn value(&self) -> u8 {
            self.0
        }

        fn add(&self, left: u8, right: u8) -> u8 {
            self.0 + left + right
        }
    }

    fn counting_supplier(calls: Arc<AtomicU8>) -> impl Fn() -> Result<Arc<dyn Counter>, ResolveErrorKind> + Send + Sync {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Fixed(7)) as Arc<dyn Counter>)
        }
    }

    #[test]
    #[traced_test]
    fn test_supplier_deferred_until_first_call() {
        let calls = Arc::new(AtomicU8::new(0));
        let proxy = LazyProxy::<dyn Counter>::new(counting_supplier(calls.clone()));

        assert_eq!(proxy.to_string(), "LazyProxy[not initialized]");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(proxy.value(), 7);
        assert_eq!(proxy.add(1, 2), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(proxy.to_string(), "LazyProxy[initialized]");
    }

    #[test]
    #[traced_test]
    fn test_failed_supplier_is_retried() {
        let calls = Arc::new(AtomicU8::new(0));
        let proxy = LazyProxy::<dyn Counter>::new({
            let calls = calls.clone();
            move || {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(ResolveErrorKind::NotFound {
                        type_info: TypeInfo::of::<dyn Counter>(),
                        qualifier: None,
                    });
                }
                Ok(Arc::new(Fixed(1)) as Arc<dyn Counter>)
            }
        });

        assert!(proxy.try_target().is_err());
        assert!(!proxy.is_initialized());
        assert_eq!(proxy.value(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_concurrent_first_call_builds_once() {
        let calls = Arc::new(AtomicU8::new(0));
        let factory = ProxyFactory::new();
        let handle: Arc<dyn Counter> = factory.create(counting_supplier(calls.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    handle.value()
                })
            })
            .collect();

        for thread in threads {
            assert_eq!(thread.join().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.is_initialized(&handle), Some(true));
    }

    #[test]
    #[traced_test]
    fn test_factory_introspection() {
        let factory = ProxyFactory::new();
        let calls = Arc::new(AtomicU8::new(0));
        let proxy: Arc<dyn Counter> = factory.create(counting_supplier(calls.clone()));
        let plain: Arc<dyn Counter> = Arc::new(Fixed(3));

        assert!(factory.is_lazy_proxy(&proxy));
        assert!(!factory.is_lazy_proxy(&plain));
        assert_eq!(factory.is_initialized(&proxy), Some(false));
        assert_eq!(factory.is_initialized(&plain), None);

        let same = proxy.clone();
        assert!(Arc::ptr_eq(&same, &proxy));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[traced_test]
    fn test_erased_creation_requires_registration() {
        let factory = ProxyFactory::new();
        let supplier = || -> super::BeanSupplier { Box::new(|| Ok(crate::any::Bean::new(Arc::new(Fixed(5)) as Arc<dyn Counter>))) };

        assert!(factory.create_erased(TypeInfo::of::<dyn Counter>(), supplier()).is_err());

        factory.register::<dyn Counter>();
        let bean = factory.create_erased(TypeInfo::of::<dyn Counter>(), supplier()).unwrap();
        let handle = bean.downcast::<dyn Counter>().unwrap();

        assert_eq!(factory.is_initialized(&handle), Some(false));
        assert_eq!(handle.value(), 5);
        assert_eq!(factory.is_initialized(&handle), Some(true));
    }
}
