// @fileoverview The credential-service boundary
//
// Everything that actually stores, matches, or protects credentials sits
// behind this trait. The facade only builds request dictionaries and
// interprets the status codes that come back.

use crate::attributes::Attributes;
use crate::status::OSStatus;

/// One entry of a search reply, shaped by the request's return-type flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Attributes(Attributes),
    Data(Vec<u8>),
    PersistentRef(Vec<u8>),
}

impl SearchResult {
    pub fn into_attributes(self) -> Option<Attributes> {
        match self {
            SearchResult::Attributes(attributes) => Some(attributes),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<Vec<u8>> {
        match self {
            SearchResult::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// A platform keychain, reached through its three item calls
///
/// Calls are synchronous. Implementations must serialize access internally
/// if they hold mutable state, since one service may back many items.
pub trait CredentialService: Send + Sync {
    /// Match items against `request`; at most one result unless the request
    /// asks for every match
    fn find(&self, request: &Attributes) -> (OSStatus, Vec<SearchResult>);

    /// Add a new item; `kSecValueData` carries the secret, if any
    fn insert(&self, attributes: &Attributes) -> OSStatus;

    /// Apply `changes` to every item matching `filter`
    fn update(&self, filter: &Attributes, changes: &Attributes) -> OSStatus;

    /// Human-readable text for a status code
    fn message_for(&self, status: OSStatus) -> String;

    /// Short backend name for logs and platform info
    fn name(&self) -> &'static str {
        "unknown"
    }
}
