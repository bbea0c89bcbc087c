use std::vec;

use crate::descriptor::{Describe, Descriptor};

/// Types discovered in one package, in discovery order.
///
/// Registering a package treats every entry independently, entries without
/// the injectable tag are skipped.
#[derive(Debug, Default)]
pub struct Package {
    name: String,
    descriptors: Vec<Descriptor>,
}

impl Package {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with<T: Describe>(self) -> Self {
        self.add(Descriptor::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn add(mut self, descriptor: impl Into<Descriptor>) -> Self {
        self.descriptors.push(descriptor.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }
}

impl IntoIterator for Package {
    type Item = Descriptor;
    type IntoIter = vec::IntoIter<Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.into_iter()
    }
}
