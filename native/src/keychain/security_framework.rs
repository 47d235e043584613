// @fileoverview Security framework backend
//
// Translates attribute maps into CFDictionary requests for
// SecItemCopyMatching, SecItemAdd, and SecItemUpdate, and translates the
// replies back. Keys travel as their raw constant strings.

use crate::attributes::{AttrKey, AttrValue, Attributes};
use crate::search::ReturnType;
use crate::service::{CredentialService, SearchResult};
use crate::status::{default_message, OSStatus, ERR_SEC_SUCCESS};
use chrono::{TimeZone, Utc};
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFGetTypeID, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::data::CFData;
use core_foundation::date::CFDate;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use security_framework_sys::keychain_item::{SecItemAdd, SecItemCopyMatching, SecItemUpdate};
use std::ptr;

/// Seconds between the Unix epoch and 2001-01-01, the CFAbsoluteTime origin
const CF_ABSOLUTE_TIME_OFFSET: f64 = 978_307_200.0;

/// The login keychain search list, reached through the SecItem API
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityFrameworkService;

impl SecurityFrameworkService {
    pub fn new() -> Self {
        Self
    }
}

fn to_cf_value(value: &AttrValue) -> CFType {
    match value {
        AttrValue::String(s) => CFString::new(s).as_CFType(),
        AttrValue::Integer(n) => CFNumber::from(*n).as_CFType(),
        AttrValue::Bool(b) => CFBoolean::from(*b).as_CFType(),
        AttrValue::Data(bytes) => CFData::from_buffer(bytes).as_CFType(),
        AttrValue::Date(date) => {
            let unix = date.timestamp() as f64 + f64::from(date.timestamp_subsec_nanos()) / 1e9;
            CFDate::new(unix - CF_ABSOLUTE_TIME_OFFSET).as_CFType()
        }
    }
}

fn to_cf_dictionary(attributes: &Attributes) -> CFDictionary<CFString, CFType> {
    let pairs: Vec<(CFString, CFType)> = attributes
        .iter()
        .filter(|(key, _)| {
            let known = !matches!(key, AttrKey::Custom(_));
            if !known {
                log::debug!("dropping custom key `{}` from keychain request", key);
            }
            known
        })
        .map(|(key, value)| (CFString::new(key.raw()), to_cf_value(value)))
        .collect();
    CFDictionary::from_CFType_pairs(&pairs)
}

fn from_cf_value(value: &CFType) -> Option<AttrValue> {
    if let Some(s) = value.downcast::<CFString>() {
        return Some(AttrValue::String(s.to_string()));
    }
    if let Some(b) = value.downcast::<CFBoolean>() {
        return Some(AttrValue::Bool(b.into()));
    }
    if let Some(n) = value.downcast::<CFNumber>() {
        // Whole-valued floats are accepted; other floats have no attribute form
        let whole = || {
            n.to_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e18)
                .map(|f| f as i64)
        };
        return n.to_i64().or_else(whole).map(AttrValue::Integer);
    }
    if let Some(data) = value.downcast::<CFData>() {
        return Some(AttrValue::Data(data.bytes().to_vec()));
    }
    if let Some(date) = value.downcast::<CFDate>() {
        let unix = date.abs_time() + CF_ABSOLUTE_TIME_OFFSET;
        let secs = unix.floor();
        let nanos = ((unix - secs) * 1e9) as u32;
        return Utc.timestamp_opt(secs as i64, nanos).single().map(AttrValue::Date);
    }
    None
}

fn from_cf_dictionary(dictionary: &CFDictionary) -> Attributes {
    let (keys, values) = dictionary.get_keys_and_values();
    keys.into_iter()
        .zip(values)
        .filter_map(|(key, value)| {
            if unsafe { CFGetTypeID(key) } != CFString::type_id() {
                return None;
            }
            let key = unsafe { CFString::wrap_under_get_rule(key as CFStringRef) };
            let key = AttrKey::from_raw(&key.to_string());
            let value = unsafe { CFType::wrap_under_get_rule(value) };
            match from_cf_value(&value) {
                Some(value) => Some((key, value)),
                None => {
                    log::debug!("dropping attribute `{}` with an unsupported value", key);
                    None
                }
            }
        })
        .collect()
}

fn to_search_result(value: &CFType, return_type: Option<ReturnType>) -> Option<SearchResult> {
    if value.type_of() == CFDictionary::<CFString, CFType>::type_id() {
        let dictionary: CFDictionary =
            unsafe { CFDictionary::wrap_under_get_rule(value.as_CFTypeRef() as CFDictionaryRef) };
        return Some(SearchResult::Attributes(from_cf_dictionary(&dictionary)));
    }
    let data = value.downcast::<CFData>()?.bytes().to_vec();
    match return_type {
        Some(ReturnType::PersistentRef) => Some(SearchResult::PersistentRef(data)),
        _ => Some(SearchResult::Data(data)),
    }
}

impl CredentialService for SecurityFrameworkService {
    fn find(&self, request: &Attributes) -> (OSStatus, Vec<SearchResult>) {
        let query = to_cf_dictionary(request);
        let return_type = ReturnType::requested_by(request);

        // May block on an authorization prompt when secret data is requested
        let mut result: CFTypeRef = ptr::null();
        let status = unsafe { SecItemCopyMatching(query.as_concrete_TypeRef(), &mut result) };
        if status != ERR_SEC_SUCCESS || result.is_null() {
            return (status, Vec::new());
        }

        let result = unsafe { CFType::wrap_under_create_rule(result) };
        let results = if result.type_of() == CFArray::<CFType>::type_id() {
            let array: CFArray<CFType> =
                unsafe { CFArray::wrap_under_get_rule(result.as_CFTypeRef() as CFArrayRef) };
            array
                .iter()
                .filter_map(|entry| to_search_result(&entry, return_type))
                .collect()
        } else {
            to_search_result(&result, return_type).into_iter().collect()
        };
        (status, results)
    }

    fn insert(&self, attributes: &Attributes) -> OSStatus {
        let attributes = to_cf_dictionary(attributes);
        unsafe { SecItemAdd(attributes.as_concrete_TypeRef(), ptr::null_mut()) }
    }

    fn update(&self, filter: &Attributes, changes: &Attributes) -> OSStatus {
        let query = to_cf_dictionary(filter);
        let changes = to_cf_dictionary(changes);
        unsafe { SecItemUpdate(query.as_concrete_TypeRef(), changes.as_concrete_TypeRef()) }
    }

    fn message_for(&self, status: OSStatus) -> String {
        security_framework::base::Error::from_code(status)
            .message()
            .unwrap_or_else(|| default_message(status).to_string())
    }

    fn name(&self) -> &'static str {
        "security-framework"
    }
}
