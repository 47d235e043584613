// @fileoverview Security framework result codes and their classification
//
// Every platform call answers with an `OSStatus`. Callers only care whether
// it succeeded, found nothing, or failed in some other way.

/// Result code returned by Security framework calls
pub type OSStatus = i32;

pub const ERR_SEC_SUCCESS: OSStatus = 0;
pub const ERR_SEC_UNIMPLEMENTED: OSStatus = -4;
pub const ERR_SEC_PARAM: OSStatus = -50;
pub const ERR_SEC_ALLOCATE: OSStatus = -108;
pub const ERR_SEC_USER_CANCELED: OSStatus = -128;
pub const ERR_SEC_AUTH_FAILED: OSStatus = -25293;
pub const ERR_SEC_DUPLICATE_ITEM: OSStatus = -25299;
pub const ERR_SEC_ITEM_NOT_FOUND: OSStatus = -25300;
pub const ERR_SEC_INTERACTION_NOT_ALLOWED: OSStatus = -25308;
pub const ERR_SEC_DECODE: OSStatus = -26275;

/// Classified outcome of a platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
    Unexpected(OSStatus),
}

impl<T> Outcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Found(value) => Outcome::Found(f(value)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Unexpected(code) => Outcome::Unexpected(code),
        }
    }
}

/// Classify a status together with whatever value the call produced
pub fn decode<T>(status: OSStatus, value: T) -> Outcome<T> {
    match status {
        ERR_SEC_SUCCESS => Outcome::Found(value),
        ERR_SEC_ITEM_NOT_FOUND => Outcome::NotFound,
        other => Outcome::Unexpected(other),
    }
}

/// Messages for the codes this crate deals with, matching the wording of
/// `SecCopyErrorMessageString`
pub fn default_message(status: OSStatus) -> &'static str {
    match status {
        ERR_SEC_SUCCESS => "No error.",
        ERR_SEC_UNIMPLEMENTED => "Function or operation not implemented.",
        ERR_SEC_PARAM => "One or more parameters passed to a function were not valid.",
        ERR_SEC_ALLOCATE => "Failed to allocate memory.",
        ERR_SEC_USER_CANCELED => "User canceled the operation.",
        ERR_SEC_AUTH_FAILED => "The user name or passphrase you entered is not correct.",
        ERR_SEC_DUPLICATE_ITEM => "The specified item already exists in the keychain.",
        ERR_SEC_ITEM_NOT_FOUND => "The specified item could not be found in the keychain.",
        ERR_SEC_INTERACTION_NOT_ALLOWED => "User interaction is not allowed.",
        ERR_SEC_DECODE => "Unable to decode the provided data.",
        _ => "Unknown error.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_classifies_codes() {
        assert_eq!(decode(ERR_SEC_SUCCESS, 7), Outcome::Found(7));
        assert_eq!(decode(ERR_SEC_ITEM_NOT_FOUND, 7), Outcome::NotFound);
        assert_eq!(decode(ERR_SEC_PARAM, 7), Outcome::Unexpected(ERR_SEC_PARAM));
    }

    #[test]
    fn test_outcome_map() {
        assert_eq!(decode(0, 2).map(|n| n * 2), Outcome::Found(4));
        assert_eq!(decode(ERR_SEC_ITEM_NOT_FOUND, 2).map(|n| n * 2), Outcome::NotFound);
    }

    #[test]
    fn test_default_message() {
        assert!(default_message(ERR_SEC_UNIMPLEMENTED).contains("not implemented"));
        assert_eq!(default_message(12345), "Unknown error.");
    }
}
