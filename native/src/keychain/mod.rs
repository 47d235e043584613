// @fileoverview Keychain-level search operations
//
// A `Keychain` pairs a credential service with the configuration that
// shapes every request. It answers existence checks and hands out `Item`s
// for whatever matches a filter.

#[cfg(target_os = "macos")]
pub mod security_framework;

use crate::attributes::{Attributes, MatchLimit};
use crate::config::KeychainConfig;
use crate::error::{KeychainError, Result};
use crate::item::Item;
use crate::memory::MemoryKeychain;
use crate::search::{filter_for_update, ReturnType, SearchBuilder};
use crate::service::{CredentialService, SearchResult};
use crate::status::{decode, OSStatus, Outcome};
use std::fmt;
use std::sync::Arc;

/// Handle to a credential service plus the configuration used against it
///
/// Cloning is cheap; clones share the same service.
#[derive(Clone)]
pub struct Keychain {
    service: Arc<dyn CredentialService>,
    config: Arc<KeychainConfig>,
}

impl fmt::Debug for Keychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keychain")
            .field("service", &self.service.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Keychain {
    pub fn new(service: impl CredentialService + 'static) -> Self {
        Self::with_config(service, KeychainConfig::default())
    }

    pub fn with_config(service: impl CredentialService + 'static, config: KeychainConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    /// A keychain held entirely in this process
    pub fn in_memory() -> Self {
        Self::new(MemoryKeychain::new())
    }

    /// The user's default keychain through the Security framework
    #[cfg(target_os = "macos")]
    pub fn system() -> Result<Self> {
        Self::system_with_config(KeychainConfig::default())
    }

    #[cfg(target_os = "macos")]
    pub fn system_with_config(config: KeychainConfig) -> Result<Self> {
        if !is_available() {
            return Err(KeychainError::Config(
                "failed to access the default keychain".to_string(),
            ));
        }
        Ok(Self::with_config(
            self::security_framework::SecurityFrameworkService::new(),
            config,
        ))
    }

    pub fn config(&self) -> &KeychainConfig {
        &self.config
    }

    pub fn service(&self) -> &dyn CredentialService {
        self.service.as_ref()
    }

    /// Request builder seeded with the configured defaults
    pub fn search(&self) -> SearchBuilder {
        SearchBuilder::new(self.config.search_defaults())
    }

    /// True if at least one item matches `filter`
    ///
    /// Only metadata is requested, so no authorization prompt is shown.
    /// Return-type keys in `filter` are ignored.
    pub fn exists(&self, filter: &Attributes) -> Result<bool> {
        let request = self.search().limit(MatchLimit::One).build(filter);
        Ok(self.find(&request, "Checking item existence")?.is_some())
    }

    /// The first item matching `filter`, if any
    pub fn item(&self, filter: &Attributes) -> Result<Option<Item>> {
        Ok(self.items_limited(filter, MatchLimit::One, "Fetching item")?
            .into_iter()
            .next())
    }

    /// Every item matching `filter`; empty when nothing matches
    pub fn items(&self, filter: &Attributes) -> Result<Vec<Item>> {
        self.items_limited(filter, MatchLimit::All, "Fetching items")
    }

    /// Match filter for an update, carrying the same matching options as a search
    pub(crate) fn update_filter(&self, attributes: &Attributes) -> Attributes {
        filter_for_update(&self.config.search_defaults().merged(attributes))
    }

    /// A new, unsynced item seeded with the default class and `attributes`
    pub fn new_item(&self, attributes: Attributes) -> Item {
        Item::new(self.clone(), attributes)
    }

    fn items_limited(
        &self,
        filter: &Attributes,
        limit: MatchLimit,
        context: &str,
    ) -> Result<Vec<Item>> {
        let request = self
            .search()
            .limit(limit)
            .returning(ReturnType::Attributes)
            .build(filter);

        let results = self.find(&request, context)?.unwrap_or_default();
        Ok(results
            .into_iter()
            .filter_map(SearchResult::into_attributes)
            .map(|attributes| Item::from_platform(self.clone(), attributes))
            .collect())
    }

    /// Run a search; `None` when nothing matched
    pub(crate) fn find(
        &self,
        request: &Attributes,
        context: &str,
    ) -> Result<Option<Vec<SearchResult>>> {
        log::debug!("{}: searching the {} keychain", context, self.service.name());
        let (status, results) = self.service.find(request);
        match decode(status, results) {
            Outcome::Found(results) => Ok(Some(results)),
            Outcome::NotFound => Ok(None),
            Outcome::Unexpected(code) => Err(self.failure(context, code)),
        }
    }

    /// Turn a write status into a result; anything but success fails
    pub(crate) fn check(&self, status: OSStatus, context: &str) -> Result<()> {
        match decode(status, ()) {
            Outcome::Found(()) => Ok(()),
            Outcome::NotFound | Outcome::Unexpected(_) => Err(self.failure(context, status)),
        }
    }

    pub(crate) fn failure(&self, context: &str, code: OSStatus) -> KeychainError {
        log::warn!("{} failed with status {}", context, code);
        KeychainError::operation_failed(Some(context), code, self.service.as_ref())
    }
}

/// Check if the system keychain backend is usable on this host
pub fn is_available() -> bool {
    #[cfg(target_os = "macos")]
    {
        ::security_framework::os::macos::keychain::SecKeychain::default().is_ok()
    }

    #[cfg(not(target_os = "macos"))]
    {
        false
    }
}
