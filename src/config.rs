/// Container-wide settings
/// ## Fields
/// - `lazy_proxies`:
///   If `true`, a lazy bean requested through one of its interfaces is returned as a deferred proxy.
///
///   If `false`, lazy definitions are built eagerly like any other bean.
///   Fields declared as [`crate::Lazy`] still receive a proxy.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub lazy_proxies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { lazy_proxies: true }
    }
}
