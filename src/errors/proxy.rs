use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug)]
pub enum ProxyErrorKind {
    #[error("Cannot create lazy proxy for {type_info}: not a proxy interface of this container")]
    NotAnInterface { type_info: TypeInfo },
}
