//! Request classes.

use std::fmt;

/// The handling category of an intercepted request.
///
/// Classification is a pure function of the request and the configuration;
/// see the classifier in the `shellcache` crate for the precedence rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Part of the precached application shell. Served cache-first.
    AppShell,
    /// Any other same-origin resource. Served network-first.
    RuntimeAsset,
    /// Same-origin dynamic data. Always fetched from the network.
    ApiCall,
    /// Another origin. Not handled by the coordinator at all.
    CrossOrigin,
}

impl RequestClass {
    /// All classes.
    pub const ALL: [RequestClass; 4] = [
        RequestClass::AppShell,
        RequestClass::RuntimeAsset,
        RequestClass::ApiCall,
        RequestClass::CrossOrigin,
    ];

    /// Returns the class name used in logs and metrics labels.
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestClass::AppShell => "app_shell",
            RequestClass::RuntimeAsset => "runtime_asset",
            RequestClass::ApiCall => "api_call",
            RequestClass::CrossOrigin => "cross_origin",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
