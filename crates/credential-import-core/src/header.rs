//! Header classification.
//!
//! Two header shapes are accepted:
//!
//! | Shape | Columns |
//! |-------|---------|
//! | short-form | exactly `username`, `password` |
//! | long-form | `username`, `private_type`, `private_data`, `realm_key`, `realm_value`, optionally `host`, `port`, `protocol` (all three or none), `service_name`, `status` |
//!
//! Column order never matters. Unknown or repeated columns make the header
//! [`Unrecognized`](HeaderShape::Unrecognized).

use std::collections::HashSet;

use serde::Serialize;

pub const USERNAME: &str = "username";
pub const PASSWORD: &str = "password";
pub const PRIVATE_TYPE: &str = "private_type";
pub const PRIVATE_DATA: &str = "private_data";
pub const REALM_KEY: &str = "realm_key";
pub const REALM_VALUE: &str = "realm_value";
pub const HOST: &str = "host";
pub const PORT: &str = "port";
pub const PROTOCOL: &str = "protocol";
pub const SERVICE_NAME: &str = "service_name";
pub const STATUS: &str = "status";

pub const SHORT_FORM_COLUMNS: [&str; 2] = [USERNAME, PASSWORD];

pub const LONG_FORM_REQUIRED: [&str; 5] =
    [USERNAME, PRIVATE_TYPE, PRIVATE_DATA, REALM_KEY, REALM_VALUE];

/// Columns that bind a row to a service. All three or none.
pub const SERVICE_BINDING: [&str; 3] = [HOST, PORT, PROTOCOL];

pub const LONG_FORM_OPTIONAL: [&str; 5] = [HOST, PORT, PROTOCOL, SERVICE_NAME, STATUS];

/// Which header shape the first row matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderShape {
    ShortForm,
    LongForm { service_binding: bool },
    Unrecognized,
}

impl HeaderShape {
    pub fn is_recognized(self) -> bool {
        self != HeaderShape::Unrecognized
    }

    /// Whether rows may carry host/port/protocol.
    pub fn has_service_columns(self) -> bool {
        matches!(
            self,
            HeaderShape::LongForm {
                service_binding: true
            }
        )
    }
}

/// Classify a header row.
pub fn classify<S: AsRef<str>>(columns: &[S]) -> HeaderShape {
    let mut seen = HashSet::new();
    for c in columns {
        if !seen.insert(c.as_ref()) {
            return HeaderShape::Unrecognized;
        }
    }

    if seen.len() == SHORT_FORM_COLUMNS.len() && SHORT_FORM_COLUMNS.iter().all(|c| seen.contains(c))
    {
        return HeaderShape::ShortForm;
    }

    if !LONG_FORM_REQUIRED.iter().all(|c| seen.contains(c)) {
        return HeaderShape::Unrecognized;
    }
    let all_known = seen
        .iter()
        .all(|c| LONG_FORM_REQUIRED.contains(c) || LONG_FORM_OPTIONAL.contains(c));
    if !all_known {
        return HeaderShape::Unrecognized;
    }

    let bound = SERVICE_BINDING.iter().filter(|c| seen.contains(*c)).count();
    match bound {
        0 => HeaderShape::LongForm {
            service_binding: false,
        },
        n if n == SERVICE_BINDING.len() => HeaderShape::LongForm {
            service_binding: true,
        },
        _ => HeaderShape::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form() {
        assert_eq!(classify(&["username", "password"]), HeaderShape::ShortForm);
        assert_eq!(classify(&["password", "username"]), HeaderShape::ShortForm);
    }

    #[test]
    fn test_short_form_rejects_extras_and_typos() {
        assert_eq!(
            classify(&["username", "password", "notes"]),
            HeaderShape::Unrecognized
        );
        assert_eq!(classify(&["user", "pass"]), HeaderShape::Unrecognized);
        assert_eq!(classify(&["username"]), HeaderShape::Unrecognized);
    }

    #[test]
    fn test_long_form_without_services() {
        let shape = classify(&LONG_FORM_REQUIRED);
        assert_eq!(
            shape,
            HeaderShape::LongForm {
                service_binding: false
            }
        );
        assert!(!shape.has_service_columns());
    }

    #[test]
    fn test_long_form_with_services() {
        let mut cols = LONG_FORM_REQUIRED.to_vec();
        cols.extend(["host", "port", "protocol", "service_name", "status"]);
        assert!(classify(&cols).has_service_columns());
    }

    #[test]
    fn test_long_form_partial_service_binding_rejected() {
        let mut cols = LONG_FORM_REQUIRED.to_vec();
        cols.extend(["host", "port"]);
        assert_eq!(classify(&cols), HeaderShape::Unrecognized);
    }

    #[test]
    fn test_long_form_missing_required() {
        assert_eq!(
            classify(&["username", "private_type", "private_data", "realm_key"]),
            HeaderShape::Unrecognized
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        assert_eq!(
            classify(&["username", "password", "password"]),
            HeaderShape::Unrecognized
        );
    }

    #[test]
    fn test_unknown_long_form_column_rejected() {
        let mut cols = LONG_FORM_REQUIRED.to_vec();
        cols.push("comment");
        assert_eq!(classify(&cols), HeaderShape::Unrecognized);
    }
}
