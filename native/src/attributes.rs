// @fileoverview Keychain attribute keys, values, and the ordered attribute map
//
// Keys mirror the namespaced constants of the Security framework. Every
// well-known key carries both its constant name (`kSecAttrAccount`) and the
// raw string the framework actually puts on the wire (`acct`).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;
use std::fmt;

/// A namespaced keychain dictionary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttrKey {
    // Item class
    Class,

    // Item attributes
    AccessGroup,
    Account,
    AuthenticationType,
    Comment,
    CreationDate,
    Creator,
    Description,
    Generic,
    IsInvisible,
    IsNegative,
    Label,
    ModificationDate,
    Path,
    Port,
    Protocol,
    SecurityDomain,
    Server,
    Service,
    Type,

    // Value keys
    ValueData,

    // Search keys
    MatchLimit,
    MatchCaseInsensitive,

    // Return-type keys
    ReturnAttributes,
    ReturnData,
    ReturnRef,
    ReturnPersistentRef,

    /// Caller-defined key with no platform constant
    Custom(String),
}

impl AttrKey {
    /// Every well-known key, in declaration order
    pub const KNOWN: [AttrKey; 27] = [
        AttrKey::Class,
        AttrKey::AccessGroup,
        AttrKey::Account,
        AttrKey::AuthenticationType,
        AttrKey::Comment,
        AttrKey::CreationDate,
        AttrKey::Creator,
        AttrKey::Description,
        AttrKey::Generic,
        AttrKey::IsInvisible,
        AttrKey::IsNegative,
        AttrKey::Label,
        AttrKey::ModificationDate,
        AttrKey::Path,
        AttrKey::Port,
        AttrKey::Protocol,
        AttrKey::SecurityDomain,
        AttrKey::Server,
        AttrKey::Service,
        AttrKey::Type,
        AttrKey::ValueData,
        AttrKey::MatchLimit,
        AttrKey::MatchCaseInsensitive,
        AttrKey::ReturnAttributes,
        AttrKey::ReturnData,
        AttrKey::ReturnRef,
        AttrKey::ReturnPersistentRef,
    ];

    /// Name of the Security framework constant for this key
    pub fn constant_name(&self) -> &str {
        match self {
            AttrKey::Custom(name) => name,
            known => known.names().0,
        }
    }

    /// The string value of the constant as the framework defines it
    pub fn raw(&self) -> &str {
        match self {
            AttrKey::Custom(name) => name,
            known => known.names().1,
        }
    }

    /// Constant name with a static lifetime; `None` for custom keys
    pub fn known_constant_name(&self) -> Option<&'static str> {
        match self {
            AttrKey::Custom(_) => None,
            known => Some(known.names().0),
        }
    }

    // (constant name, raw value)
    fn names(&self) -> (&'static str, &'static str) {
        match self {
            AttrKey::Class => ("kSecClass", "class"),
            AttrKey::AccessGroup => ("kSecAttrAccessGroup", "agrp"),
            AttrKey::Account => ("kSecAttrAccount", "acct"),
            AttrKey::AuthenticationType => ("kSecAttrAuthenticationType", "atyp"),
            AttrKey::Comment => ("kSecAttrComment", "icmt"),
            AttrKey::CreationDate => ("kSecAttrCreationDate", "cdat"),
            AttrKey::Creator => ("kSecAttrCreator", "crtr"),
            AttrKey::Description => ("kSecAttrDescription", "desc"),
            AttrKey::Generic => ("kSecAttrGeneric", "gena"),
            AttrKey::IsInvisible => ("kSecAttrIsInvisible", "invi"),
            AttrKey::IsNegative => ("kSecAttrIsNegative", "nega"),
            AttrKey::Label => ("kSecAttrLabel", "labl"),
            AttrKey::ModificationDate => ("kSecAttrModificationDate", "mdat"),
            AttrKey::Path => ("kSecAttrPath", "path"),
            AttrKey::Port => ("kSecAttrPort", "port"),
            AttrKey::Protocol => ("kSecAttrProtocol", "ptcl"),
            AttrKey::SecurityDomain => ("kSecAttrSecurityDomain", "sdmn"),
            AttrKey::Server => ("kSecAttrServer", "srvr"),
            AttrKey::Service => ("kSecAttrService", "svce"),
            AttrKey::Type => ("kSecAttrType", "type"),
            AttrKey::ValueData => ("kSecValueData", "v_Data"),
            AttrKey::MatchLimit => ("kSecMatchLimit", "m_Limit"),
            AttrKey::MatchCaseInsensitive => ("kSecMatchCaseInsensitive", "m_CaseInsensitive"),
            AttrKey::ReturnAttributes => ("kSecReturnAttributes", "r_Attributes"),
            AttrKey::ReturnData => ("kSecReturnData", "r_Data"),
            AttrKey::ReturnRef => ("kSecReturnRef", "r_Ref"),
            AttrKey::ReturnPersistentRef => ("kSecReturnPersistentRef", "r_PersistentRef"),
            AttrKey::Custom(_) => ("", ""),
        }
    }

    /// Look up a well-known key by its constant name
    pub fn from_constant_name(name: &str) -> Option<AttrKey> {
        BY_CONSTANT_NAME.get(name).cloned()
    }

    /// Look up a key by its raw wire value; unknown values become custom keys
    pub fn from_raw(raw: &str) -> AttrKey {
        BY_RAW
            .get(raw)
            .cloned()
            .unwrap_or_else(|| AttrKey::Custom(raw.to_string()))
    }

    /// Keys that select the shape of a search result
    pub fn is_return_type(&self) -> bool {
        matches!(
            self,
            AttrKey::ReturnAttributes
                | AttrKey::ReturnData
                | AttrKey::ReturnRef
                | AttrKey::ReturnPersistentRef
        )
    }

    /// Keys that modify a search rather than describe an item
    pub fn is_search_control(&self) -> bool {
        matches!(self, AttrKey::MatchLimit | AttrKey::MatchCaseInsensitive) || self.is_return_type()
    }

    /// Keys describing an item, as opposed to its secret or search controls
    pub fn is_item_attribute(&self) -> bool {
        !self.is_search_control() && *self != AttrKey::ValueData
    }
}

static BY_CONSTANT_NAME: Lazy<HashMap<&'static str, AttrKey>> = Lazy::new(|| {
    AttrKey::KNOWN
        .iter()
        .map(|key| (key.names().0, key.clone()))
        .collect()
});

static BY_RAW: Lazy<HashMap<&'static str, AttrKey>> = Lazy::new(|| {
    AttrKey::KNOWN
        .iter()
        .map(|key| (key.names().1, key.clone()))
        .collect()
});

impl fmt::Display for AttrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.constant_name())
    }
}

impl From<&str> for AttrKey {
    fn from(name: &str) -> Self {
        AttrKey::from_constant_name(name).unwrap_or_else(|| AttrKey::Custom(name.to_string()))
    }
}

impl Serialize for AttrKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.constant_name())
    }
}

impl<'de> Deserialize<'de> for AttrKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(AttrKey::from(name.as_str()))
    }
}

/// A keychain attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    String(String),
    Integer(i64),
    Bool(bool),
    Data(Vec<u8>),
    Date(DateTime<Utc>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            // The framework reports some flags as 0/1 numbers
            AttrValue::Integer(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AttrValue::Data(bytes) => Some(bytes),
            AttrValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::String(_) => "string",
            AttrValue::Integer(_) => "integer",
            AttrValue::Bool(_) => "bool",
            AttrValue::Data(_) => "data",
            AttrValue::Date(_) => "date",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Integer(value)
    }
}

impl From<u16> for AttrValue {
    fn from(value: u16) -> Self {
        AttrValue::Integer(i64::from(value))
    }
}

impl From<Vec<u8>> for AttrValue {
    fn from(value: Vec<u8>) -> Self {
        AttrValue::Data(value)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttrValue::Date(value)
    }
}

/// Keychain item classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    #[default]
    InternetPassword,
    GenericPassword,
    Certificate,
    Key,
    Identity,
}

impl ItemClass {
    pub const ALL: [ItemClass; 5] = [
        ItemClass::InternetPassword,
        ItemClass::GenericPassword,
        ItemClass::Certificate,
        ItemClass::Key,
        ItemClass::Identity,
    ];

    pub fn raw(self) -> &'static str {
        match self {
            ItemClass::InternetPassword => "inet",
            ItemClass::GenericPassword => "genp",
            ItemClass::Certificate => "cert",
            ItemClass::Key => "keys",
            ItemClass::Identity => "idnt",
        }
    }

    pub fn from_raw(raw: &str) -> Option<ItemClass> {
        ItemClass::ALL.into_iter().find(|class| class.raw() == raw)
    }
}

impl From<ItemClass> for AttrValue {
    fn from(class: ItemClass) -> Self {
        AttrValue::String(class.raw().to_string())
    }
}

/// Internet protocols recognised by the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ftp,
    Http,
    Https,
    Imap,
    Imaps,
    Irc,
    Ircs,
    Ldap,
    Pop3,
    Smtp,
    Ssh,
}

impl Protocol {
    pub fn raw(self) -> &'static str {
        match self {
            Protocol::Ftp => "ftp ",
            Protocol::Http => "http",
            Protocol::Https => "htps",
            Protocol::Imap => "imap",
            Protocol::Imaps => "imps",
            Protocol::Irc => "irc ",
            Protocol::Ircs => "ircs",
            Protocol::Ldap => "ldap",
            Protocol::Pop3 => "pop3",
            Protocol::Smtp => "smtp",
            Protocol::Ssh => "ssh ",
        }
    }
}

impl From<Protocol> for AttrValue {
    fn from(protocol: Protocol) -> Self {
        AttrValue::String(protocol.raw().to_string())
    }
}

/// Whether a search returns at most one result or every match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLimit {
    One,
    All,
}

impl MatchLimit {
    pub fn raw(self) -> &'static str {
        match self {
            MatchLimit::One => "m_LimitOne",
            MatchLimit::All => "m_LimitAll",
        }
    }

    /// Interpret a request value; anything but "all" limits to one result
    pub fn from_value(value: Option<&AttrValue>) -> MatchLimit {
        match value {
            Some(AttrValue::String(s)) if s == MatchLimit::All.raw() => MatchLimit::All,
            Some(AttrValue::Integer(n)) if *n > 1 => MatchLimit::All,
            _ => MatchLimit::One,
        }
    }
}

impl From<MatchLimit> for AttrValue {
    fn from(limit: MatchLimit) -> Self {
        AttrValue::String(limit.raw().to_string())
    }
}

/// Ordered map of attribute keys to values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<AttrKey, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: AttrKey, value: impl Into<AttrValue>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn get(&self, key: &AttrKey) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: AttrKey, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(key, value.into())
    }

    pub fn remove(&mut self, key: &AttrKey) -> Option<AttrValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &AttrKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AttrKey, AttrValue> {
        self.0.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, AttrKey, AttrValue> {
        self.0.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, AttrKey, AttrValue> {
        self.0.values()
    }

    /// Copy every entry of `other` into `self`, `other` winning on conflicts
    pub fn extend_from(&mut self, other: &Attributes) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// A new map holding `self` overlaid with `other`; neither input changes
    pub fn merged(&self, other: &Attributes) -> Attributes {
        let mut merged = self.clone();
        merged.extend_from(other);
        merged
    }

    /// Keep only the entries matching `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&AttrKey, &AttrValue) -> bool) {
        self.0.retain(|key, value| keep(key, value));
    }

    pub fn item_class(&self) -> Option<&str> {
        self.get(&AttrKey::Class).and_then(AttrValue::as_str)
    }
}

impl FromIterator<(AttrKey, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (AttrKey, AttrValue)>>(iter: I) -> Self {
        Attributes(iter.into_iter().collect())
    }
}

impl IntoIterator for Attributes {
    type Item = (AttrKey, AttrValue);
    type IntoIter = btree_map::IntoIter<AttrKey, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a AttrKey, &'a AttrValue);
    type IntoIter = btree_map::Iter<'a, AttrKey, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
