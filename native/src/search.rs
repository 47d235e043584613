// @fileoverview Search-dictionary construction
//
// Turns defaults, caller filters, and per-operation overrides into the exact
// request handed to the credential service. A request always carries exactly
// one return-type flag and exactly one match limit.

use crate::attributes::{AttrKey, AttrValue, Attributes, MatchLimit};
use crate::dispatch::normalize_key;

/// Shape of the results a search should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Attributes,
    Data,
    Ref,
    PersistentRef,
}

impl ReturnType {
    pub const ALL: [ReturnType; 4] = [
        ReturnType::Attributes,
        ReturnType::Data,
        ReturnType::Ref,
        ReturnType::PersistentRef,
    ];

    pub fn key(self) -> AttrKey {
        match self {
            ReturnType::Attributes => AttrKey::ReturnAttributes,
            ReturnType::Data => AttrKey::ReturnData,
            ReturnType::Ref => AttrKey::ReturnRef,
            ReturnType::PersistentRef => AttrKey::ReturnPersistentRef,
        }
    }

    /// The return type a request asks for, if it asks for exactly one
    pub fn requested_by(request: &Attributes) -> Option<ReturnType> {
        let mut requested = ReturnType::ALL.into_iter().filter(|return_type| {
            request
                .get(&return_type.key())
                .and_then(AttrValue::as_bool)
                .unwrap_or(false)
        });
        match (requested.next(), requested.next()) {
            (Some(return_type), None) => Some(return_type),
            _ => None,
        }
    }
}

/// Rewrite accessor-style custom keys into their well-known keys
pub fn normalize(attributes: &Attributes) -> Attributes {
    attributes
        .iter()
        .map(|(key, value)| (normalize_key(key), value.clone()))
        .collect()
}

/// Build a request dictionary
///
/// Merge order is `base_defaults`, then `user_filters`, then
/// `enforced_overrides`. Caller-supplied return-type keys are dropped and
/// `return_type` is set. `user_filters` is only read.
pub fn build(
    base_defaults: &Attributes,
    enforced_overrides: &Attributes,
    user_filters: &Attributes,
    return_type: ReturnType,
) -> Attributes {
    let mut request = normalize(base_defaults);
    request.extend_from(&normalize(user_filters));
    request.extend_from(enforced_overrides);

    request.retain(|key, _| !key.is_return_type());
    request.insert(return_type.key(), true);
    request
}

/// The match filter for an update call
///
/// Return-type keys, the match limit, and the secret are dropped. Matching
/// options such as case insensitivity are kept so the update finds the same
/// items a search would.
pub fn filter_for_update(attributes: &Attributes) -> Attributes {
    let mut filter = normalize(attributes);
    filter.retain(|key, _| {
        !key.is_return_type() && *key != AttrKey::MatchLimit && *key != AttrKey::ValueData
    });
    filter
}

/// Attributes for an insert call: item attributes only
pub fn attributes_for_insert(attributes: &Attributes) -> Attributes {
    let mut attributes = normalize(attributes);
    attributes.retain(|key, _| key.is_item_attribute());
    attributes
}

/// Typed wrapper around [`build`] for the common case
#[derive(Debug, Clone)]
pub struct SearchBuilder {
    defaults: Attributes,
    limit: MatchLimit,
    return_type: ReturnType,
}

impl SearchBuilder {
    pub fn new(defaults: Attributes) -> Self {
        Self {
            defaults,
            limit: MatchLimit::One,
            return_type: ReturnType::Attributes,
        }
    }

    pub fn limit(mut self, limit: MatchLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn returning(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn build(&self, filters: &Attributes) -> Attributes {
        let enforced = Attributes::new().with(AttrKey::MatchLimit, self.limit);
        build(&self.defaults, &enforced, filters, self.return_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ItemClass;

    fn defaults() -> Attributes {
        Attributes::new().with(AttrKey::Class, ItemClass::InternetPassword)
    }

    #[test]
    fn test_caller_values_win_over_defaults() {
        let filters = Attributes::new().with(AttrKey::Class, ItemClass::GenericPassword);
        let request = SearchBuilder::new(defaults()).build(&filters);

        assert_eq!(request.item_class(), Some("genp"));
    }

    #[test]
    fn test_match_limit_cannot_be_overridden() {
        let filters = Attributes::new().with(AttrKey::MatchLimit, MatchLimit::All);
        let request = SearchBuilder::new(defaults()).build(&filters);

        assert_eq!(
            MatchLimit::from_value(request.get(&AttrKey::MatchLimit)),
            MatchLimit::One
        );
    }

    #[test]
    fn test_conflicting_return_types_are_replaced() {
        let filters = Attributes::new()
            .with(AttrKey::ReturnData, true)
            .with(AttrKey::ReturnRef, true)
            .with(AttrKey::ReturnPersistentRef, false)
            .with(AttrKey::Server, "example.org");
        let request = SearchBuilder::new(defaults()).build(&filters);

        assert_eq!(ReturnType::requested_by(&request), Some(ReturnType::Attributes));
        assert_eq!(request.keys().filter(|key| key.is_return_type()).count(), 1);
        assert_eq!(filters.len(), 4);
    }

    #[test]
    fn test_user_filters_are_not_mutated() {
        let filters = Attributes::new()
            .with(AttrKey::Server, "example.org")
            .with(AttrKey::Custom("account".into()), "alice");
        let before = filters.clone();

        let _ = SearchBuilder::new(defaults())
            .returning(ReturnType::Data)
            .build(&filters);

        assert_eq!(filters, before);
    }

    #[test]
    fn test_accessor_style_keys_are_normalized() {
        let filters = Attributes::new().with(AttrKey::Custom("account".into()), "alice");
        let request = SearchBuilder::new(defaults()).build(&filters);

        assert_eq!(request.get(&AttrKey::Account), Some(&AttrValue::from("alice")));
        assert!(!request.contains_key(&AttrKey::Custom("account".into())));
    }

    #[test]
    fn test_filter_for_update_drops_controls() {
        let attributes = defaults()
            .with(AttrKey::Server, "example.org")
            .with(AttrKey::MatchLimit, MatchLimit::One)
            .with(AttrKey::ReturnAttributes, true)
            .with(AttrKey::ValueData, b"secret".to_vec());

        let filter = filter_for_update(&attributes);

        assert_eq!(filter.len(), 2);
        assert!(filter.contains_key(&AttrKey::Server));
        assert!(filter.contains_key(&AttrKey::Class));
    }

    #[test]
    fn test_filter_for_update_keeps_case_insensitivity() {
        let attributes = defaults()
            .with(AttrKey::Server, "EXAMPLE.org")
            .with(AttrKey::MatchCaseInsensitive, true)
            .with(AttrKey::ReturnData, true);

        let filter = filter_for_update(&attributes);
        assert_eq!(filter.get(&AttrKey::MatchCaseInsensitive), Some(&AttrValue::Bool(true)));
        assert!(!filter.contains_key(&AttrKey::ReturnData));

        let inserted = attributes_for_insert(&attributes);
        assert_eq!(inserted.len(), 2);
        assert!(!inserted.contains_key(&AttrKey::MatchCaseInsensitive));
    }
}
