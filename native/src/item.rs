// @fileoverview A single keychain item
//
// Methods only need the user's explicit authorization when they touch the
// password data; metadata does not. When it is needed the OS presents an
// allow / deny / always-allow prompt, and the calling thread blocks until
// the user answers. "Always allow" is remembered by the OS for the calling
// executable, which for an interpreter or test runner covers every future
// caller too.
//
// An item never caches its password. Every read goes to the keychain and
// every write is sent immediately.

use crate::attributes::{AttrKey, AttrValue, Attributes};
use crate::config::BlankPasswordPolicy;
use crate::dispatch::{self, Accessor};
use crate::error::{KeychainError, Result};
use crate::keychain::Keychain;
use crate::search::{attributes_for_insert, normalize, ReturnType};
use crate::service::SearchResult;
use crate::status::ERR_SEC_ITEM_NOT_FOUND;
use std::collections::BTreeMap;

/// Where an item stands relative to the keychain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Never matched against the keychain
    Unsynced,
    /// Attributes equal the last values read from the keychain
    Synced,
    /// Local changes not yet written back
    Dirty,
}

/// In-memory view of one keychain entry
#[derive(Debug, Clone)]
pub struct Item {
    keychain: Keychain,
    attributes: Attributes,
    /// Attributes as last read from the keychain
    synced: Option<Attributes>,
    /// Per-key "differs from the synced value" flags
    dirty: BTreeMap<AttrKey, bool>,
}

impl Item {
    /// Seed a new item with the configured default class plus `attributes`
    pub fn new(keychain: Keychain, attributes: Attributes) -> Self {
        let defaults = Attributes::new().with(AttrKey::Class, keychain.config().default_class);
        let mut item = Self {
            keychain,
            attributes: Attributes::new(),
            synced: None,
            dirty: BTreeMap::new(),
        };
        item.set_attributes(defaults.merged(&attributes));
        item
    }

    pub(crate) fn from_platform(keychain: Keychain, attributes: Attributes) -> Self {
        Self {
            keychain,
            synced: Some(attributes.clone()),
            attributes,
            dirty: BTreeMap::new(),
        }
    }

    pub fn keychain(&self) -> &Keychain {
        &self.keychain
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Replace every attribute, tracking which keys changed
    pub fn set_attributes(&mut self, attributes: Attributes) {
        let old = std::mem::replace(&mut self.attributes, attributes);
        let touched: Vec<AttrKey> = old.keys().chain(self.attributes.keys()).cloned().collect();
        for key in touched {
            self.mark(&key);
        }
    }

    pub fn get(&self, key: &AttrKey) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn insert(&mut self, key: AttrKey, value: impl Into<AttrValue>) -> Option<AttrValue> {
        let previous = self.attributes.insert(key.clone(), value);
        self.mark(&key);
        previous
    }

    pub fn remove(&mut self, key: &AttrKey) -> Option<AttrValue> {
        let previous = self.attributes.remove(key);
        self.mark(key);
        previous
    }

    fn mark(&mut self, key: &AttrKey) {
        let baseline = self.synced.as_ref().and_then(|synced| synced.get(key));
        let changed = self.attributes.get(key) != baseline;
        self.dirty.insert(key.clone(), changed);
    }

    pub fn state(&self) -> ItemState {
        if self.synced.is_none() {
            ItemState::Unsynced
        } else if self.dirty.values().any(|changed| *changed) {
            ItemState::Dirty
        } else {
            ItemState::Synced
        }
    }

    /// Keys whose value differs from the last synced value
    pub fn changed_keys(&self) -> Vec<&AttrKey> {
        self.dirty
            .iter()
            .filter(|(_, changed)| **changed)
            .map(|(key, _)| key)
            .collect()
    }

    /// Current values of every changed key still present locally
    pub fn unsaved_changes(&self) -> Attributes {
        self.changed_keys()
            .into_iter()
            .filter_map(|key| Some((key.clone(), self.attributes.get(key)?.clone())))
            .collect()
    }

    /// Read an attribute by accessor name (`account`, `is_invisible`, ...)
    ///
    /// `password` reads the secret from the keychain.
    pub fn read(&self, name: &str) -> Result<Option<AttrValue>> {
        let resolved = dispatch::resolve(name)
            .ok_or_else(|| KeychainError::UnknownAttribute(name.to_string()))?;
        match resolved.accessor {
            Accessor::Password => Ok(Some(AttrValue::String(self.password()?))),
            Accessor::Attribute(key) => Ok(self.get(&key).cloned()),
        }
    }

    /// Write an attribute by accessor name; `None` removes it
    ///
    /// `password` writes the secret to the keychain; `None` stores an empty
    /// password.
    pub fn write(&mut self, name: &str, value: Option<AttrValue>) -> Result<()> {
        let resolved = dispatch::resolve(name)
            .ok_or_else(|| KeychainError::UnknownAttribute(name.to_string()))?;
        match (resolved.accessor, value) {
            (Accessor::Password, None) => {
                self.set_password(None)?;
            }
            (Accessor::Password, Some(AttrValue::String(password))) => {
                self.set_password(Some(password.as_str()))?;
            }
            (Accessor::Password, Some(other)) => {
                return Err(KeychainError::InvalidPasswordValue(other.kind()));
            }
            (Accessor::Attribute(key), Some(value)) => {
                self.insert(key, value);
            }
            (Accessor::Attribute(key), None) => {
                self.remove(&key);
            }
        }
        Ok(())
    }

    pub fn account(&self) -> Option<&str> {
        self.get(&AttrKey::Account).and_then(AttrValue::as_str)
    }

    pub fn set_account(&mut self, account: impl Into<String>) {
        self.insert(AttrKey::Account, account.into());
    }

    pub fn server(&self) -> Option<&str> {
        self.get(&AttrKey::Server).and_then(AttrValue::as_str)
    }

    pub fn set_server(&mut self, server: impl Into<String>) {
        self.insert(AttrKey::Server, server.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.get(&AttrKey::Comment).and_then(AttrValue::as_str)
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.insert(AttrKey::Comment, comment.into());
    }

    pub fn label(&self) -> Option<&str> {
        self.get(&AttrKey::Label).and_then(AttrValue::as_str)
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.insert(AttrKey::Label, label.into());
    }

    pub fn is_invisible(&self) -> bool {
        self.get(&AttrKey::IsInvisible)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    pub fn set_invisible(&mut self, invisible: bool) {
        self.insert(AttrKey::IsInvisible, invisible);
    }

    // The modification date moves on every write, so it never narrows a match
    fn match_filter(&self) -> Attributes {
        let mut filter = self.attributes.clone();
        filter.remove(&AttrKey::ModificationDate);
        filter
    }

    /// True if any keychain item matches this item's attributes
    pub fn exists(&self) -> Result<bool> {
        let request = self.keychain.search().build(&self.match_filter());
        Ok(self
            .keychain
            .find(&request, "Checking keychain item existence")?
            .is_some())
    }

    /// The password of the first matching item
    ///
    /// Blocks while the OS asks the user for permission, if it does. A
    /// missing item is an error. Blank passwords follow the configured
    /// [`BlankPasswordPolicy`].
    pub fn password(&self) -> Result<String> {
        const CONTEXT: &str = "Getting password";

        let request = self
            .keychain
            .search()
            .returning(ReturnType::Data)
            .build(&self.match_filter());
        log::debug!("reading password data; the system may prompt for access");

        let data = self
            .keychain
            .find(&request, CONTEXT)?
            .and_then(|results| results.into_iter().find_map(SearchResult::into_data))
            .ok_or_else(|| self.keychain.failure(CONTEXT, ERR_SEC_ITEM_NOT_FOUND))?;

        if data.is_empty()
            && self.keychain.config().blank_password == BlankPasswordPolicy::NotFound
        {
            return Err(self.keychain.failure(CONTEXT, ERR_SEC_ITEM_NOT_FOUND));
        }
        Ok(String::from_utf8(data)?)
    }

    /// Store a password, adding the item to the keychain if it is missing
    ///
    /// `None` stores an empty password. Returns the value written.
    pub fn set_password(&self, password: Option<&str>) -> Result<String> {
        const CONTEXT: &str = "Updating password";

        let password = password.unwrap_or_default().to_string();
        let secret = Attributes::new().with(AttrKey::ValueData, password.as_bytes().to_vec());

        let status = if self.exists()? {
            log::debug!("updating password of existing keychain item");
            let filter = self.keychain.update_filter(&self.match_filter());
            self.keychain.service().update(&filter, &secret)
        } else {
            log::debug!("adding keychain item with password");
            let attributes = attributes_for_insert(&self.attributes).merged(&secret);
            self.keychain.service().insert(&attributes)
        };
        self.keychain.check(status, CONTEXT)?;
        Ok(password)
    }

    /// Change attributes of the stored item, then reload
    ///
    /// The item must already exist; nothing is created.
    pub fn update(&mut self, new_attributes: &Attributes) -> Result<&Attributes> {
        let filter = self.keychain.update_filter(&self.match_filter());
        let changes = normalize(new_attributes);

        let status = self.keychain.service().update(&filter, &changes);
        self.keychain.check(status, "Updating keychain item")?;

        self.absorb(&changes);
        self.reload()
    }

    // Fold changes the keychain accepted into both local views, so the
    // following reload can still find the item
    fn absorb(&mut self, changes: &Attributes) {
        let mut visible = changes.clone();
        visible.retain(|key, _| key.is_item_attribute());
        self.attributes.extend_from(&visible);
        if let Some(synced) = self.synced.as_mut() {
            synced.extend_from(&visible);
        }
    }

    /// Every attribute the keychain holds for the first matching item
    ///
    /// Local state is left alone.
    pub fn metadata(&self) -> Result<Attributes> {
        self.fetch_metadata(&self.match_filter())
    }

    fn fetch_metadata(&self, filter: &Attributes) -> Result<Attributes> {
        const CONTEXT: &str = "Getting metadata";

        let request = self.keychain.search().build(filter);
        self.keychain
            .find(&request, CONTEXT)?
            .and_then(|results| {
                results
                    .into_iter()
                    .find_map(SearchResult::into_attributes)
            })
            .ok_or_else(|| self.keychain.failure(CONTEXT, ERR_SEC_ITEM_NOT_FOUND))
    }

    /// Replace local attributes with the keychain's
    ///
    /// A synced item is looked up by its last synced attributes, so unsaved
    /// local changes never prevent the match; they are discarded.
    pub fn reload(&mut self) -> Result<&Attributes> {
        let mut filter = self.synced.clone().unwrap_or_else(|| self.attributes.clone());
        filter.remove(&AttrKey::ModificationDate);
        let metadata = self.fetch_metadata(&filter)?;
        let discarded = self.changed_keys().len();
        if discarded > 0 {
            log::debug!("reload discards {} unsaved attribute change(s)", discarded);
        }

        self.synced = Some(metadata.clone());
        self.attributes = metadata;
        self.dirty.clear();
        Ok(&self.attributes)
    }

    /// Write unsaved attribute changes to the keychain, then reload
    ///
    /// Removed attributes are not propagated; the keychain keeps them.
    pub fn save(&mut self) -> Result<&Attributes> {
        const CONTEXT: &str = "Saving keychain item";

        let mut changes = self.unsaved_changes();
        changes.remove(&AttrKey::Class);

        let status = match &self.synced {
            Some(_) if changes.is_empty() => return Ok(&self.attributes),
            Some(snapshot) => {
                let mut filter = self.keychain.update_filter(snapshot);
                filter.remove(&AttrKey::ModificationDate);
                self.keychain.service().update(&filter, &changes)
            }
            None if self.exists()? => {
                let filter = self.keychain.update_filter(&self.match_filter());
                self.keychain.service().update(&filter, &changes)
            }
            None => self
                .keychain
                .service()
                .insert(&attributes_for_insert(&self.attributes)),
        };
        self.keychain.check(status, CONTEXT)?;
        self.absorb(&changes);
        self.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ItemClass;
    use crate::config::KeychainConfig;
    use crate::memory::MemoryKeychain;

    fn example_org(keychain: &Keychain) -> Item {
        keychain.new_item(Attributes::new().with(AttrKey::Server, "example.org"))
    }

    #[test]
    fn test_new_item_has_default_class() {
        let item = Keychain::in_memory().new_item(Attributes::new());
        assert_eq!(item.get(&AttrKey::Class), Some(&ItemClass::InternetPassword.into()));
        assert_eq!(item.state(), ItemState::Unsynced);
    }

    #[test]
    fn test_caller_class_wins() {
        let item = Keychain::in_memory()
            .new_item(Attributes::new().with(AttrKey::Class, ItemClass::GenericPassword));
        assert_eq!(item.attributes().item_class(), Some("genp"));
    }

    #[test]
    fn test_index_access() {
        let mut item = Keychain::in_memory().new_item(Attributes::new());
        item.insert(AttrKey::Custom("test".into()), "test");
        assert_eq!(
            item.attributes().get(&AttrKey::Custom("test".into())),
            Some(&"test".into())
        );
    }

    #[test]
    fn test_password_round_trip() {
        let keychain = Keychain::in_memory();
        let item = example_org(&keychain);

        assert_eq!(item.set_password(Some("secret1")).unwrap(), "secret1");
        assert_eq!(item.password().unwrap(), "secret1");
        assert_eq!(item.set_password(Some("secret2")).unwrap(), "secret2");
        assert_eq!(item.password().unwrap(), "secret2");
        assert!(!item.attributes().values().any(|value| value.as_bytes()
            == Some("secret2".as_bytes())));
    }

    #[test]
    fn test_password_none_is_empty() {
        let keychain = Keychain::in_memory();
        let item = example_org(&keychain);

        assert_eq!(item.set_password(None).unwrap(), "");
        assert_eq!(item.password().unwrap(), "");
    }

    #[test]
    fn test_blank_password_policy() {
        let config = KeychainConfig {
            blank_password: BlankPasswordPolicy::NotFound,
            ..KeychainConfig::default()
        };
        let keychain = Keychain::with_config(MemoryKeychain::new(), config);
        let item = example_org(&keychain);

        item.set_password(Some("")).unwrap();
        assert!(item.password().unwrap_err().is_not_found());
    }

    #[test]
    fn test_password_missing_is_error() {
        let item = example_org(&Keychain::in_memory());
        let err = item.password().unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("Getting password. [Error code: -25300]"));
    }

    #[test]
    fn test_password_must_be_utf8() {
        let keychain = Keychain::in_memory();
        let status = keychain.service().insert(
            &Attributes::new()
                .with(AttrKey::Class, ItemClass::InternetPassword)
                .with(AttrKey::Server, "example.org")
                .with(AttrKey::ValueData, vec![0xff, 0xfe]),
        );
        assert_eq!(status, 0);

        let err = example_org(&keychain).password().unwrap_err();
        assert!(matches!(err, KeychainError::PasswordEncoding(_)));
    }

    fn case_insensitive_keychain() -> Keychain {
        let config = KeychainConfig {
            case_insensitive: true,
            ..KeychainConfig::default()
        };
        let keychain = Keychain::with_config(MemoryKeychain::new(), config);
        let status = keychain.service().insert(
            &Attributes::new()
                .with(AttrKey::Class, ItemClass::InternetPassword)
                .with(AttrKey::Server, "example.org")
                .with(AttrKey::ValueData, b"pw".to_vec()),
        );
        assert_eq!(status, 0);
        keychain
    }

    #[test]
    fn test_case_insensitive_writes() {
        let keychain = case_insensitive_keychain();
        let mut item = keychain.new_item(Attributes::new().with(AttrKey::Server, "EXAMPLE.org"));
        assert!(item.exists().unwrap());
        assert_eq!(item.password().unwrap(), "pw");

        item.set_password(Some("pw2")).unwrap();
        assert_eq!(item.password().unwrap(), "pw2");

        item.update(&Attributes::new().with(AttrKey::Comment, "bread"))
            .unwrap();
        assert_eq!(item.comment(), Some("bread"));
        assert_eq!(item.server(), Some("example.org"));
    }

    #[test]
    fn test_case_insensitive_save() {
        let keychain = case_insensitive_keychain();
        let mut item = keychain.new_item(Attributes::new().with(AttrKey::Server, "Example.Org"));
        item.set_comment("toast");

        item.save().unwrap();
        assert_eq!(item.state(), ItemState::Synced);
        assert_eq!(item.comment(), Some("toast"));

        item.set_label("breakfast");
        item.save().unwrap();
        assert_eq!(item.metadata().unwrap().get(&AttrKey::Label), Some(&"breakfast".into()));
        assert_eq!(item.password().unwrap(), "pw");
    }

    #[test]
    fn test_password_does_not_touch_attributes() {
        let keychain = Keychain::in_memory();
        let item = example_org(&keychain);
        item.set_password(Some("hunter2")).unwrap();
        let before = item.attributes().clone();

        assert_eq!(item.password().unwrap(), item.password().unwrap());
        assert_eq!(item.attributes(), &before);
    }

    #[test]
    fn test_dispatch_matches_keyed_access() {
        let keychain = Keychain::in_memory();
        let mut by_name = keychain.new_item(Attributes::new());
        let mut by_key = keychain.new_item(Attributes::new());

        assert_eq!(by_name.read("account").unwrap(), None);
        assert_eq!(by_name.read("account").unwrap(), by_key.get(&AttrKey::Account).cloned());

        by_name.write("account=", Some("alice".into())).unwrap();
        by_key.insert(AttrKey::Account, "alice");

        assert_eq!(by_name.attributes(), by_key.attributes());
        assert_eq!(by_name.read("account").unwrap(), Some("alice".into()));
        assert_eq!(by_name.account(), Some("alice"));
    }

    #[test]
    fn test_dispatch_password_goes_to_keychain() {
        let keychain = Keychain::in_memory();
        let mut item = example_org(&keychain);

        item.write("password=", Some("hunter2".into())).unwrap();
        assert_eq!(item.read("password").unwrap(), Some("hunter2".into()));
        assert!(!item.attributes().contains_key(&AttrKey::ValueData));

        let err = item.write("password", Some(AttrValue::Integer(1))).unwrap_err();
        assert!(matches!(err, KeychainError::InvalidPasswordValue("integer")));
    }

    #[test]
    fn test_dispatch_unknown_name() {
        let mut item = Keychain::in_memory().new_item(Attributes::new());
        assert!(matches!(
            item.read("colour"),
            Err(KeychainError::UnknownAttribute(name)) if name == "colour"
        ));
        assert!(item.write("colour=", Some("red".into())).is_err());
        assert_eq!(item.attributes().len(), 1);
    }

    #[test]
    fn test_predicate_accessors() {
        let mut item = Keychain::in_memory().new_item(Attributes::new());
        assert!(!item.is_invisible());

        item.write("is_invisible=", Some(true.into())).unwrap();
        assert!(item.is_invisible());
        assert_eq!(item.read("invisible?").unwrap(), Some(AttrValue::Bool(true)));
    }

    #[test]
    fn test_reload_missing_item() {
        let mut item = example_org(&Keychain::in_memory());
        assert!(item.reload().unwrap_err().is_not_found());
        assert!(item.metadata().is_err());
    }

    #[test]
    fn test_reload_replaces_attributes_and_discards_edits() {
        let keychain = Keychain::in_memory();
        let mut item = example_org(&keychain);
        item.set_password(Some("pw")).unwrap();

        let metadata = item.metadata().unwrap();
        assert_ne!(item.attributes(), &metadata);

        item.reload().unwrap();
        assert_eq!(item.attributes(), &metadata);
        assert_eq!(item.state(), ItemState::Synced);

        item.set_comment("local only");
        assert_eq!(item.state(), ItemState::Dirty);
        item.reload().unwrap();
        assert_eq!(item.comment(), None);
        assert_eq!(item.state(), ItemState::Synced);
    }

    #[test]
    fn test_dirty_tracking_uses_value_equality() {
        let keychain = Keychain::in_memory();
        let mut item = example_org(&keychain);
        item.set_password(Some("pw")).unwrap();
        item.reload().unwrap();

        item.set_server("example.org");
        assert_eq!(item.state(), ItemState::Synced);

        item.set_account("alice");
        assert_eq!(item.changed_keys(), vec![&AttrKey::Account]);
        assert_eq!(
            item.unsaved_changes(),
            Attributes::new().with(AttrKey::Account, "alice")
        );

        item.remove(&AttrKey::Account);
        assert_eq!(item.state(), ItemState::Synced);
    }

    #[test]
    fn test_update() {
        let keychain = Keychain::in_memory();
        let mut item = example_org(&keychain);
        item.set_password(Some("pw")).unwrap();

        let updated = item
            .update(&Attributes::new().with(AttrKey::Comment, "bread"))
            .unwrap()
            .clone();
        assert_eq!(updated.get(&AttrKey::Comment), Some(&"bread".into()));
        assert_eq!(item.comment(), Some("bread"));
        assert_eq!(item.metadata().unwrap().get(&AttrKey::Comment), Some(&"bread".into()));

        item.update(&Attributes::new().with(AttrKey::Comment, "toast"))
            .unwrap();
        assert_eq!(item.comment(), Some("toast"));
        assert_eq!(item.password().unwrap(), "pw");
    }

    #[test]
    fn test_update_missing_item() {
        let mut item = example_org(&Keychain::in_memory());
        let err = item
            .update(&Attributes::new().with(AttrKey::Comment, "different test"))
            .unwrap_err();

        assert!(err.to_string().starts_with("Updating keychain item."));
        assert!(!item.exists().unwrap());
    }

    #[test]
    fn test_save_inserts_then_updates() {
        let keychain = Keychain::in_memory();
        let mut item = example_org(&keychain);
        item.set_account("alice");

        item.save().unwrap();
        assert_eq!(item.state(), ItemState::Synced);
        assert!(item.exists().unwrap());

        item.set_account("bob");
        item.set_comment("renamed");
        item.save().unwrap();

        let stored = keychain
            .item(&Attributes::new().with(AttrKey::Server, "example.org"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.account(), Some("bob"));
        assert_eq!(stored.comment(), Some("renamed"));
    }
}
