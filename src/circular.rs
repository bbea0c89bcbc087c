use parking_lot::Mutex;
use std::{
    collections::HashMap,
    thread::{self, ThreadId},
};
use tracing::debug;

use crate::{any::TypeInfo, errors::ResolveErrorKind};

/// Implementation types currently under construction in one resolution call chain.
///
/// Every top-level request gets its own stack, so unrelated requests never observe
/// each other's entries. A request started on a thread that is already building beans
/// of the same container (a lazy proxy materialized from a hook, for example) starts
/// with the types that thread is building.
#[derive(Debug, Default, Clone)]
pub struct ResolutionStack {
    entries: Vec<TypeInfo>,
}

impl ResolutionStack {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Marks `type_info` as under construction.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::CircularDependency`] with the chain from the first
    /// occurrence of `type_info` to the repeated request when it's already on the stack.
    /// The stack is left untouched in this case.
    pub fn push(&mut self, type_info: TypeInfo) -> Result<(), ResolveErrorKind> {
        if let Some(position) = self.entries.iter().position(|entry| *entry == type_info) {
            let mut chain = self.entries[position..].to_vec();
            chain.push(type_info);
            return Err(ResolveErrorKind::CircularDependency { chain });
        }

        self.entries.push(type_info);
        debug!(depth = self.entries.len(), "Construction started");
        Ok(())
    }

    /// Removes the most recent entry, it must be `type_info`.
    pub fn pop(&mut self, type_info: TypeInfo) {
        let popped = self.entries.pop();
        debug_assert_eq!(popped, Some(type_info), "resolution stack is unbalanced");
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: TypeInfo) -> bool {
        self.entries.contains(&type_info)
    }

    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Types under construction by each thread, shared by all requests of one container.
#[derive(Debug, Default)]
pub(crate) struct InProgress {
    threads: Mutex<HashMap<ThreadId, Vec<TypeInfo>>>,
}

impl InProgress {
    /// Stack seeded with the types the current thread is building.
    pub(crate) fn current(&self) -> ResolutionStack {
        let entries = self.threads.lock().get(&thread::current().id()).cloned().unwrap_or_default();
        ResolutionStack { entries }
    }

    /// Marks `type_info` as built by the current thread until the guard is dropped.
    pub(crate) fn enter(&self, type_info: TypeInfo) -> Construction<'_> {
        let thread = thread::current().id();
        self.threads.lock().entry(thread).or_default().push(type_info);
        Construction {
            in_progress: self,
            thread,
        }
    }
}

pub(crate) struct Construction<'a> {
    in_progress: &'a InProgress,
    thread: ThreadId,
}

impl Drop for Construction<'_> {
    fn drop(&mut self) {
        let mut threads = self.in_progress.threads.lock();
        if let Some(entries) = threads.get_mut(&self.thread) {
            entries.pop();
            if entries.is_empty() {
                threads.remove(&self.thread);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InProgress, ResolutionStack};
    use crate::{any::TypeInfo, errors::ResolveErrorKind};

    struct X;
    struct Y;
    struct Z;
    struct W;

    #[test]
    fn test_cycle_chain_is_minimal_suffix() {
        let mut stack = ResolutionStack::new();
        stack.push(TypeInfo::of::<W>()).unwrap();
        stack.push(TypeInfo::of::<X>()).unwrap();
        stack.push(TypeInfo::of::<Y>()).unwrap();
        stack.push(TypeInfo::of::<Z>()).unwrap();

        let err = stack.push(TypeInfo::of::<X>()).unwrap_err();
        let ResolveErrorKind::CircularDependency { chain } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(
            chain,
            [
                TypeInfo::of::<X>(),
                TypeInfo::of::<Y>(),
                TypeInfo::of::<Z>(),
                TypeInfo::of::<X>()
            ]
        );
        assert_eq!(stack.depth(), 4);
    }

    #[test]
    fn test_push_pop() {
        let mut stack = ResolutionStack::new();
        stack.push(TypeInfo::of::<X>()).unwrap();
        assert!(stack.contains(TypeInfo::of::<X>()));

        stack.pop(TypeInfo::of::<X>());
        assert!(stack.is_empty());

        stack.push(TypeInfo::of::<X>()).unwrap();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_in_progress_seeds_nested_requests() {
        let in_progress = InProgress::default();
        assert!(in_progress.current().is_empty());

        let outer = in_progress.enter(TypeInfo::of::<X>());
        {
            let _inner = in_progress.enter(TypeInfo::of::<Y>());

            let mut stack = in_progress.current();
            assert_eq!(stack.depth(), 2);
            let err = stack.push(TypeInfo::of::<X>()).unwrap_err();
            assert!(matches!(err, ResolveErrorKind::CircularDependency { chain } if chain.len() == 3));

            let other = std::thread::scope(|scope| scope.spawn(|| in_progress.current().depth()).join().unwrap());
            assert_eq!(other, 0);
        }
        assert_eq!(in_progress.current().depth(), 1);

        drop(outer);
        assert!(in_progress.current().is_empty());
    }
}
