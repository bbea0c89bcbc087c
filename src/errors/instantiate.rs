/// Error returned by user-provided constructors, injection methods and lifecycle hooks.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
