// @fileoverview In-process credential service
//
// Behaves like the platform keychain as far as the facade can observe:
// the same status codes, class validation, duplicate detection, and
// creation/modification dates. Used by the test suites and on hosts without
// a system keychain backend.

use crate::attributes::{AttrKey, AttrValue, Attributes, ItemClass, MatchLimit};
use crate::search::ReturnType;
use crate::service::{CredentialService, SearchResult};
use crate::status::{
    default_message, OSStatus, ERR_SEC_ALLOCATE, ERR_SEC_DUPLICATE_ITEM, ERR_SEC_ITEM_NOT_FOUND,
    ERR_SEC_PARAM, ERR_SEC_SUCCESS,
};
use chrono::Utc;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredItem {
    id: u64,
    attributes: Attributes,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    items: Vec<StoredItem>,
}

/// A keychain that lives in memory
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    store: Mutex<Store>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.store.lock().map(|store| store.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Attributes that identify an item within its class
fn primary_keys(class: ItemClass) -> &'static [AttrKey] {
    match class {
        ItemClass::InternetPassword => &[
            AttrKey::Account,
            AttrKey::SecurityDomain,
            AttrKey::Server,
            AttrKey::Protocol,
            AttrKey::AuthenticationType,
            AttrKey::Port,
            AttrKey::Path,
        ],
        ItemClass::GenericPassword => &[AttrKey::Account, AttrKey::Service],
        ItemClass::Certificate | ItemClass::Key | ItemClass::Identity => &[AttrKey::Label],
    }
}

fn request_class(request: &Attributes) -> Option<ItemClass> {
    request.item_class().and_then(ItemClass::from_raw)
}

fn values_match(expected: &AttrValue, actual: &AttrValue, case_insensitive: bool) -> bool {
    match (expected, actual) {
        (AttrValue::String(a), AttrValue::String(b)) if case_insensitive => a.eq_ignore_ascii_case(b),
        // Flags come back from the framework as 0/1 numbers
        (AttrValue::Bool(flag), AttrValue::Integer(n))
        | (AttrValue::Integer(n), AttrValue::Bool(flag)) => (*n != 0) == *flag,
        (a, b) => a == b,
    }
}

fn matches(filter: &Attributes, item: &StoredItem) -> bool {
    let case_insensitive = filter
        .get(&AttrKey::MatchCaseInsensitive)
        .and_then(AttrValue::as_bool)
        .unwrap_or(false);

    filter
        .iter()
        .filter(|(key, _)| key.is_item_attribute())
        .all(|(key, expected)| match item.attributes.get(key) {
            Some(actual) => values_match(expected, actual, case_insensitive),
            None => false,
        })
}

fn split_secret(attributes: &Attributes) -> (Attributes, Option<Vec<u8>>) {
    let secret = attributes
        .get(&AttrKey::ValueData)
        .and_then(AttrValue::as_bytes)
        .map(<[u8]>::to_vec);
    let mut stored = attributes.clone();
    stored.retain(|key, _| key.is_item_attribute());
    (stored, secret)
}

impl CredentialService for MemoryKeychain {
    fn find(&self, request: &Attributes) -> (OSStatus, Vec<SearchResult>) {
        if request_class(request).is_none() {
            return (ERR_SEC_PARAM, Vec::new());
        }
        let return_type = match ReturnType::requested_by(request) {
            Some(return_type) => return_type,
            None => return (ERR_SEC_PARAM, Vec::new()),
        };
        let limit = MatchLimit::from_value(request.get(&AttrKey::MatchLimit));

        let store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => return (ERR_SEC_ALLOCATE, Vec::new()),
        };
        let mut matched = store.items.iter().filter(|item| matches(request, item));
        let matched: Vec<&StoredItem> = match limit {
            MatchLimit::One => matched.next().into_iter().collect(),
            MatchLimit::All => matched.collect(),
        };
        if matched.is_empty() {
            return (ERR_SEC_ITEM_NOT_FOUND, Vec::new());
        }

        let results = matched
            .into_iter()
            .map(|item| match return_type {
                ReturnType::Attributes => SearchResult::Attributes(item.attributes.clone()),
                ReturnType::Data => SearchResult::Data(item.data.clone()),
                ReturnType::Ref | ReturnType::PersistentRef => {
                    SearchResult::PersistentRef(item.id.to_be_bytes().to_vec())
                }
            })
            .collect();
        (ERR_SEC_SUCCESS, results)
    }

    fn insert(&self, attributes: &Attributes) -> OSStatus {
        let class = match request_class(attributes) {
            Some(class) => class,
            None => return ERR_SEC_PARAM,
        };
        let (mut stored, secret) = split_secret(attributes);

        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => return ERR_SEC_ALLOCATE,
        };
        let duplicate = store.items.iter().any(|item| {
            item.attributes.item_class() == Some(class.raw())
                && primary_keys(class)
                    .iter()
                    .all(|key| item.attributes.get(key) == stored.get(key))
        });
        if duplicate {
            return ERR_SEC_DUPLICATE_ITEM;
        }

        let now = Utc::now();
        stored.insert(AttrKey::CreationDate, now);
        stored.insert(AttrKey::ModificationDate, now);

        store.next_id += 1;
        let id = store.next_id;
        store.items.push(StoredItem {
            id,
            attributes: stored,
            data: secret.unwrap_or_default(),
        });
        ERR_SEC_SUCCESS
    }

    fn update(&self, filter: &Attributes, changes: &Attributes) -> OSStatus {
        if request_class(filter).is_none() || changes.contains_key(&AttrKey::Class) {
            return ERR_SEC_PARAM;
        }
        let (changed_attributes, secret) = split_secret(changes);

        let mut store = match self.store.lock() {
            Ok(store) => store,
            Err(_) => return ERR_SEC_ALLOCATE,
        };
        let now = Utc::now();
        let mut updated = 0;
        for item in store.items.iter_mut().filter(|item| matches(filter, item)) {
            item.attributes.extend_from(&changed_attributes);
            item.attributes.insert(AttrKey::ModificationDate, now);
            if let Some(secret) = &secret {
                item.data = secret.clone();
            }
            updated += 1;
        }

        if updated == 0 {
            ERR_SEC_ITEM_NOT_FOUND
        } else {
            ERR_SEC_SUCCESS
        }
    }

    fn message_for(&self, status: OSStatus) -> String {
        default_message(status).to_string()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
