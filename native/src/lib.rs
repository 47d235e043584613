// @fileoverview Keychain items as plain Rust values
//
// Search, read, and write keychain items through the platform credential
// service. Requests are built from attribute maps; the platform does all
// matching, storage, and access control.

pub mod attributes;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod item;
pub mod keychain;
pub mod logging;
pub mod memory;
pub mod search;
pub mod service;
pub mod status;

pub use attributes::{AttrKey, AttrValue, Attributes, ItemClass, MatchLimit, Protocol};
pub use config::{BlankPasswordPolicy, KeychainConfig};
pub use error::{KeychainError, Result};
pub use item::{Item, ItemState};
pub use keychain::Keychain;
pub use memory::MemoryKeychain;
pub use search::{ReturnType, SearchBuilder};
pub use service::{CredentialService, SearchResult};
pub use status::{OSStatus, Outcome};

#[cfg(target_os = "macos")]
pub use keychain::security_framework::SecurityFrameworkService;

/// Get platform information
pub fn platform_info() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Target triple and UNIX timestamp recorded at build time
pub fn build_info() -> (&'static str, &'static str) {
    (env!("BUILD_TARGET"), env!("BUILD_TIMESTAMP"))
}

/// Check if the system keychain can be used on this platform
pub fn is_secure_storage_available() -> bool {
    keychain::is_available()
}
