// @fileoverview Name-based attribute accessors
//
// Maps idiomatic accessor names (`account`, `account=`, `is_invisible`,
// `invisible?`) onto namespaced attribute keys through an explicit table.
// Names that do not resolve are reported to the caller, never guessed.

use crate::attributes::AttrKey;
use once_cell::sync::Lazy;
use std::collections::HashMap;

const ATTR_PREFIX: &str = "kSecAttr";
const PASSWORD: &str = "password";

/// Item attribute keys by constant name; search controls are not accessors
static ATTRIBUTE_TABLE: Lazy<HashMap<&'static str, AttrKey>> = Lazy::new(|| {
    AttrKey::KNOWN
        .iter()
        .filter(|key| key.is_item_attribute())
        .filter_map(|key| Some((key.known_constant_name()?, key.clone())))
        .collect()
});

/// What an accessor name resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    Attribute(AttrKey),
    /// The secret; always read and written through the platform
    Password,
}

/// A resolved accessor token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub accessor: Accessor,
    /// The token ended in `=`
    pub setter: bool,
}

/// Upper camel case of a snake_case name; camel case passes through
///
/// Returns `None` for the empty string.
pub fn camelize(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;

    let mut camel = String::with_capacity(name.len());
    camel.extend(first.to_uppercase());
    while let Some(c) = chars.next() {
        if c == '_' {
            match chars.next() {
                Some(next) => camel.extend(next.to_uppercase()),
                None => camel.push('_'),
            }
        } else {
            camel.push(c);
        }
    }
    Some(camel)
}

/// Resolve an accessor token to an attribute key or the password
pub fn resolve(token: &str) -> Option<Resolved> {
    let (name, setter) = match token.strip_suffix('=') {
        Some(name) => (name, true),
        None => (token, false),
    };
    let name = name.strip_suffix('?').unwrap_or(name);

    if name == PASSWORD {
        return Some(Resolved {
            accessor: Accessor::Password,
            setter,
        });
    }

    let camel = camelize(name)?;
    let exact = format!("{}{}", ATTR_PREFIX, camel);
    let predicate = format!("{}Is{}", ATTR_PREFIX, camel);

    [exact, predicate]
        .iter()
        .find_map(|candidate| ATTRIBUTE_TABLE.get(candidate.as_str()))
        .map(|key| Resolved {
            accessor: Accessor::Attribute(key.clone()),
            setter,
        })
}

/// Resolve a token that must name a stored attribute
pub fn attribute_key(token: &str) -> Option<AttrKey> {
    match resolve(token)?.accessor {
        Accessor::Attribute(key) => Some(key),
        Accessor::Password => None,
    }
}

/// Rewrite custom keys that spell out an accessor name into the well-known key
pub fn normalize_key(key: &AttrKey) -> AttrKey {
    match key {
        AttrKey::Custom(name) => attribute_key(name).unwrap_or_else(|| key.clone()),
        known => known.clone(),
    }
}
