use parking_lot::{Mutex, ReentrantMutex};
use std::{collections::BTreeMap, collections::VecDeque, mem, sync::Arc};

use crate::{any::Bean, definition::BeanDefinition, definition::Key};

/// Singleton instances, lazy proxies and the creation ledger used for teardown.
#[derive(Default)]
pub(crate) struct Cache {
    singletons: BTreeMap<Key, Bean>,
    proxies: BTreeMap<Key, Bean>,
    resolved: ResolvedSet,
}

impl Cache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, key: &Key) -> Option<Bean> {
        self.singletons.get(key).cloned()
    }

    /// Keeps the first instance if another thread stored one in the meantime.
    pub(crate) fn insert(&mut self, key: Key, bean: Bean) -> Bean {
        self.singletons.entry(key).or_insert(bean).clone()
    }

    /// Overwrites whatever was cached under `key`.
    #[inline]
    pub(crate) fn replace(&mut self, key: Key, bean: Bean) {
        self.singletons.insert(key, bean);
    }

    #[inline]
    #[must_use]
    pub(crate) fn get_proxy(&self, key: &Key) -> Option<Bean> {
        self.proxies.get(key).cloned()
    }

    pub(crate) fn insert_proxy(&mut self, key: Key, proxy: Bean) -> Bean {
        self.proxies.entry(key).or_insert(proxy).clone()
    }

    #[inline]
    pub(crate) fn push_resolved(&mut self, resolved: Resolved) {
        self.resolved.push(resolved);
    }

    #[inline]
    #[must_use]
    pub(crate) fn take_resolved_set(&mut self) -> ResolvedSet {
        mem::take(&mut self.resolved)
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.singletons.len()
    }

    /// Drops cached instances and proxies, returning the ledger for teardown.
    #[must_use]
    pub(crate) fn clear(&mut self) -> ResolvedSet {
        self.singletons.clear();
        self.proxies.clear();
        self.take_resolved_set()
    }
}

/// One lock per singleton key, held while that singleton is built.
///
/// Reentrant, so a thread coming back to a key it is building reaches the cycle check
/// instead of blocking on itself. Unrelated singletons never wait for each other.
#[derive(Default)]
pub(crate) struct CreationLocks {
    locks: Mutex<BTreeMap<Key, Arc<ReentrantMutex<()>>>>,
}

impl CreationLocks {
    pub(crate) fn get(&self, key: &Key) -> Arc<ReentrantMutex<()>> {
        self.locks
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(ReentrantMutex::new(())))
            .clone()
    }

    #[inline]
    pub(crate) fn clear(&self) {
        self.locks.lock().clear();
    }
}

/// Singleton created by the container, in creation order.
pub(crate) struct Resolved {
    pub(crate) definition: Arc<BeanDefinition>,
    pub(crate) bean: Bean,
}

#[derive(Default)]
pub(crate) struct ResolvedSet(pub(crate) VecDeque<Resolved>);

impl ResolvedSet {
    #[inline]
    pub(crate) fn push(&mut self, resolved: Resolved) {
        self.0.push_back(resolved);
    }

    /// Most recently created first.
    #[inline]
    pub(crate) fn pop(&mut self) -> Option<Resolved> {
        self.0.pop_back()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}
