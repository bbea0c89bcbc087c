use std::fmt::{self, Display, Formatter};

use crate::{any::TypeInfo, properties::Properties, registry::Registry};

/// Predicate deciding at registration time whether a type is registered at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Matches when the property is set and isn't `"false"`,
    /// or equals `having_value` exactly when one is given.
    /// A missing property matches only with `match_if_missing`.
    OnProperty {
        name: String,
        having_value: Option<String>,
        match_if_missing: bool,
    },
    /// Matches when an unqualified bean of the type is registered.
    OnBean(TypeInfo),
    /// Matches when no unqualified bean of the type is registered.
    OnMissingBean(TypeInfo),
}

impl Condition {
    #[must_use]
    pub(crate) fn matches(&self, properties: &Properties, registry: &Registry) -> bool {
        match self {
            Self::OnProperty {
                name,
                having_value,
                match_if_missing,
            } => match (properties.get(name), having_value) {
                (None, _) => *match_if_missing,
                (Some(value), Some(expected)) => value == expected,
                (Some(value), None) => value != "false",
            },
            Self::OnBean(type_info) => registry.contains(*type_info, None),
            Self::OnMissingBean(type_info) => !registry.contains(*type_info, None),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnProperty {
                name,
                having_value: Some(value),
                ..
            } => write!(f, "property `{name}` = `{value}`"),
            Self::OnProperty { name, .. } => write!(f, "property `{name}`"),
            Self::OnBean(type_info) => write!(f, "bean {type_info} present"),
            Self::OnMissingBean(type_info) => write!(f, "bean {type_info} missing"),
        }
    }
}
