use std::fmt::{self, Display, Formatter};

/// Instance reuse policy of a bean definition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Scope {
    /// One shared instance per container, created on first request.
    Singleton,
    /// New instance on every request.
    #[default]
    Prototype,
}

impl Scope {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Prototype => "prototype",
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::Scope;

    #[test]
    fn test_default_is_prototype() {
        assert_eq!(Scope::default(), Scope::Prototype);
        assert!(!Scope::default().is_singleton());
        assert!(Scope::Singleton.is_singleton());
        assert_eq!(Scope::Singleton.to_string(), "singleton");
    }
}
