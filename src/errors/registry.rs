use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum RegistrationErrorKind {
    #[error("Type {type_info} is not injectable")]
    NotInjectable { type_info: TypeInfo },
    #[error("Multiple primary beans found for {interface}: {existing} and {candidate}")]
    AmbiguousBinding {
        interface: TypeInfo,
        existing: TypeInfo,
        candidate: TypeInfo,
    },
    #[error("{implementation} does not implement {interface}")]
    NotImplemented { interface: TypeInfo, implementation: TypeInfo },
    #[error("Injection method `{name}` of {type_info} must take at least one parameter")]
    InvalidInjectionMethod { type_info: TypeInfo, name: &'static str },
}
