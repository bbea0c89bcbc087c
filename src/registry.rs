use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use crate::{
    any::TypeInfo,
    definition::{BeanDefinition, Key},
    errors::RegistrationErrorKind,
};

/// Bean definitions by requested type and by `(type, qualifier)`.
#[derive(Default)]
pub(crate) struct Registry {
    definitions: BTreeMap<TypeInfo, Arc<BeanDefinition>>,
    named: BTreeMap<Key, Arc<BeanDefinition>>,
}

impl Registry {
    #[must_use]
    pub(crate) fn get(&self, type_info: TypeInfo, qualifier: Option<&str>) -> Option<Arc<BeanDefinition>> {
        match qualifier {
            None => self.definitions.get(&type_info).cloned(),
            Some(qualifier) => self.named.get(&Key::of(type_info, Some(qualifier))).cloned(),
        }
    }

    #[must_use]
    pub(crate) fn contains(&self, type_info: TypeInfo, qualifier: Option<&str>) -> bool {
        match qualifier {
            None => self.definitions.contains_key(&type_info),
            Some(qualifier) => self.named.contains_key(&Key::of(type_info, Some(qualifier))),
        }
    }

    /// Registers a definition under its own type, its qualifier and every interface it declares.
    ///
    /// An interface already bound keeps its definition unless the new one is primary.
    /// Two primary definitions of different types for one interface are rejected
    /// before anything is stored.
    pub(crate) fn register(&mut self, definition: BeanDefinition) -> Result<(), RegistrationErrorKind> {
        let implementation = definition.implementation();
        let interfaces: Vec<_> = definition
            .descriptor()
            .interfaces()
            .filter(|interface| *interface != implementation)
            .collect();

        if definition.is_primary() {
            for interface in &interfaces {
                if let Some(existing) = self.definitions.get(interface) {
                    if existing.is_primary() && existing.implementation() != implementation {
                        return Err(RegistrationErrorKind::AmbiguousBinding {
                            interface: *interface,
                            existing: existing.implementation(),
                            candidate: implementation,
                        });
                    }
                }
            }
        }

        let definition = Arc::new(definition);
        self.definitions.insert(implementation, definition.clone());
        if let Some(qualifier) = definition.qualifier() {
            self.named.insert(Key::of(implementation, Some(qualifier)), definition.clone());
        }

        for interface in interfaces {
            if let Some(qualifier) = definition.qualifier() {
                self.named.insert(Key::of(interface, Some(qualifier)), definition.clone());
            }

            match self.definitions.get(&interface) {
                None => {
                    self.definitions.insert(interface, definition.clone());
                    debug!(%interface, "Interface bound");
                }
                Some(existing) if definition.is_primary() => {
                    debug!(%interface, previous = %existing.implementation(), "Interface bound to primary bean");
                    self.definitions.insert(interface, definition.clone());
                }
                Some(existing) => {
                    debug!(%interface, bound = %existing.implementation(), "Interface already bound, skipped");
                }
            }
        }
        Ok(())
    }

    /// Explicit interface binding, no fan-out and no primary rules.
    ///
    /// Unnamed bindings claim the interface key, named ones only `(interface, name)`.
    /// Both also claim the implementation key.
    pub(crate) fn bind(&mut self, interface: TypeInfo, definition: BeanDefinition, name: Option<&str>) {
        let implementation = definition.implementation();
        match name {
            None => {
                let definition = Arc::new(definition);
                if let Some(qualifier) = definition.qualifier() {
                    self.named.insert(Key::of(interface, Some(qualifier)), definition.clone());
                }
                self.definitions.insert(interface, definition.clone());
                self.definitions.insert(implementation, definition);
            }
            Some(name) => {
                let definition = Arc::new(definition.with_qualifier(name));
                self.named.insert(Key::of(interface, Some(name)), definition.clone());
                self.definitions.insert(implementation, definition);
            }
        }
        debug!(%interface, %implementation, name, "Interface bound explicitly");
    }

    /// Stores a definition under its own type only.
    pub(crate) fn insert(&mut self, definition: BeanDefinition) -> Arc<BeanDefinition> {
        let definition = Arc::new(definition);
        self.definitions.insert(definition.implementation(), definition.clone());
        definition
    }

    /// Definitions stored under their own implementation type that declare `interface`.
    #[must_use]
    pub(crate) fn implementations_of(&self, interface: TypeInfo) -> Vec<Arc<BeanDefinition>> {
        self.definitions
            .iter()
            .filter(|(type_info, definition)| {
                **type_info != interface && **type_info == definition.implementation() && definition.implements(interface)
            })
            .map(|(_, definition)| definition.clone())
            .collect()
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub(crate) fn types(&self) -> Vec<TypeInfo> {
        self.definitions.keys().copied().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.definitions.clear();
        self.named.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{
        any::TypeInfo,
        definition::BeanDefinition,
        descriptor::{Describe, Descriptor, TypeDescriptor},
        errors::RegistrationErrorKind,
        upcast,
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    trait Notifier: Send + Sync {}

    macro_rules! notifier {
        ($name:ident $(, $tag:ident)*) => {
            struct $name;

            impl Notifier for $name {}

            impl Describe for $name {
                fn describe() -> TypeDescriptor<Self> {
                    TypeDescriptor::injectable()
                        $( .$tag() )*
                        .implements(upcast!(dyn Notifier))
                        .constructor(|| Ok($name))
                }
            }
        };
    }

    notifier!(Email, primary);
    notifier!(Sms);
    notifier!(Push);
    notifier!(Pager, primary);

    fn definition<T: Describe>() -> BeanDefinition {
        BeanDefinition::new(Arc::new(Descriptor::of::<T>()))
    }

    fn bound(registry: &Registry) -> Option<TypeInfo> {
        registry
            .get(TypeInfo::of::<dyn Notifier>(), None)
            .map(|definition| definition.implementation())
    }

    #[test]
    #[traced_test]
    fn test_first_registration_wins() {
        let mut registry = Registry::default();
        registry.register(definition::<Sms>()).unwrap();
        registry.register(definition::<Push>()).unwrap();

        assert_eq!(bound(&registry), Some(TypeInfo::of::<Sms>()));
        assert!(registry.contains(TypeInfo::of::<Push>(), None));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    #[traced_test]
    fn test_primary_overrides_earlier_and_keeps_later() {
        let mut registry = Registry::default();
        registry.register(definition::<Sms>()).unwrap();
        registry.register(definition::<Email>()).unwrap();
        registry.register(definition::<Push>()).unwrap();

        assert_eq!(bound(&registry), Some(TypeInfo::of::<Email>()));
    }

    #[test]
    #[traced_test]
    fn test_second_primary_is_ambiguous() {
        let mut registry = Registry::default();
        registry.register(definition::<Email>()).unwrap();

        let err = registry.register(definition::<Pager>()).unwrap_err();

        assert!(matches!(err, RegistrationErrorKind::AmbiguousBinding { .. }));
        assert!(!registry.contains(TypeInfo::of::<Pager>(), None));
        assert_eq!(bound(&registry), Some(TypeInfo::of::<Email>()));

        registry.register(definition::<Email>()).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_shared_definition_between_keys() {
        let mut registry = Registry::default();
        registry.register(definition::<Sms>()).unwrap();

        let by_interface = registry.get(TypeInfo::of::<dyn Notifier>(), None).unwrap();
        let by_type = registry.get(TypeInfo::of::<Sms>(), None).unwrap();

        assert!(Arc::ptr_eq(&by_interface, &by_type));
    }

    #[test]
    #[traced_test]
    fn test_named_bind() {
        let mut registry = Registry::default();
        registry.bind(TypeInfo::of::<dyn Notifier>(), definition::<Email>(), Some("email"));
        registry.bind(TypeInfo::of::<dyn Notifier>(), definition::<Sms>(), Some("sms"));

        assert!(registry.contains(TypeInfo::of::<dyn Notifier>(), Some("email")));
        assert!(registry.contains(TypeInfo::of::<dyn Notifier>(), Some("sms")));
        assert!(!registry.contains(TypeInfo::of::<dyn Notifier>(), Some("push")));
        assert!(!registry.contains(TypeInfo::of::<dyn Notifier>(), None));
        assert_eq!(registry.implementations_of(TypeInfo::of::<dyn Notifier>()).len(), 2);
    }
}
