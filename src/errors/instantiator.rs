use super::instantiate::InstantiateErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum ConstructionErrorKind {
    #[error("No suitable constructor found")]
    NoSuitableConstructor,
    #[error("Constructor failed")]
    Constructor(#[source] InstantiateErrorKind),
    #[error("Injection method `{name}` failed")]
    Method {
        name: &'static str,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Post-construct hook failed")]
    PostConstruct(#[source] InstantiateErrorKind),
}
