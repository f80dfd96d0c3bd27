//! Two-tier input validation.
//!
//! 1. **Structural pass** (import-wide): the input must be parseable CSV,
//!    have a recognized header and at least one data row. Any failure here
//!    is reported on the `input` field and stops validation.
//! 2. **Semantic pass** (per row): private credential types must be
//!    supported. A short-form file declares one type for every row, checked
//!    once against the `private_credential_type` field; a long-form file
//!    declares it per row, and an unsupported row type is reported against
//!    that row.
//!
//! Both kinds of failure are errors and block the import. Softer row
//! problems (no username, half a realm, an unusable service binding) are
//! collected as [`RowIssue`]s: the row is skipped on import and the rest of
//! the file still goes through.
//!
//! Values that take part in a uniqueness key (username, private data, realm
//! key and value, host address) are kept byte-exact, surrounding whitespace
//! included. Only parsed columns (type, port, protocol, status) and the
//! descriptive service name are trimmed.
//!
//! [`validate`] never touches a store and returns everything it found as a
//! [`ValidationReport`] value.

use std::fmt;
use std::io::{Read, Seek};

use serde::{Serialize, Serializer};

use crate::error::ReadError;
use crate::header::{self, classify, HeaderShape};
use crate::models::{LoginStatus, PrivateKind, Protocol};
use crate::reader::{Row, TabularReader};

/// Where a validation error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Input,
    PrivateCredentialType,
    /// A single data row, by line number.
    Row(u64),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Input => f.write_str("input"),
            Field::PrivateCredentialType => f.write_str("private_credential_type"),
            Field::Row(line) => write!(f, "row {}", line),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Validation error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyInput,
    IncorrectHeaders,
    MalformedInput,
    UnsupportedPrivateType,
}

impl ErrorKind {
    /// Stable message key, suitable for lookup in a translation table.
    pub fn key(self) -> &'static str {
        match self {
            ErrorKind::EmptyInput => "empty_csv",
            ErrorKind::IncorrectHeaders => "incorrect_csv_headers",
            ErrorKind::MalformedInput => "malformed_csv",
            ErrorKind::UnsupportedPrivateType => "invalid_type",
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: Field,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidationError {
    /// `field.key`, e.g. `input.malformed_csv`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.field, self.kind.key())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.key(), detail),
            None => f.write_str(&self.key()),
        }
    }
}

/// A row that will be skipped on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowIssue {
    pub line: u64,
    pub reason: String,
}

impl RowIssue {
    fn new(line: u64, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Everything `validate` found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Header shape, when a header row was read.
    pub shape: Option<HeaderShape>,
    /// Number of data rows.
    pub rows: usize,
    pub errors: Vec<ValidationError>,
    pub row_issues: Vec<RowIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error kinds reported on one field.
    pub fn errors_on(&self, field: Field) -> Vec<ErrorKind> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.kind)
            .collect()
    }

    pub fn has_error(&self, field: Field, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.field == field && e.kind == kind)
    }

    pub fn error_keys(&self) -> Vec<String> {
        self.errors.iter().map(ValidationError::key).collect()
    }

    fn push(&mut self, field: Field, kind: ErrorKind, detail: Option<String>) {
        self.errors.push(ValidationError {
            field,
            kind,
            detail,
        });
    }
}

/// Service binding parsed from a long-form row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBinding {
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
    pub name: Option<String>,
    pub status: LoginStatus,
}

/// A row that passed every check, ready for the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRow {
    pub line: u64,
    pub username: String,
    pub private_kind: PrivateKind,
    pub private_data: String,
    pub realm: Option<(String, String)>,
    pub service: Option<ServiceBinding>,
}

/// Why a row could not become a [`CredentialRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowProblem {
    /// Fatal to the whole run.
    UnsupportedType { line: u64, tag: String },
    /// Only this row is skipped.
    Issue(RowIssue),
}

/// Resolve the single private type a short-form file declares.
pub fn short_form_kind(private_credential_type: Option<&str>) -> Result<PrivateKind, String> {
    let tag = private_credential_type
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| "no private credential type declared for a short-form import".to_string())?;
    match PrivateKind::from_tag(tag) {
        Some(kind) if kind.allowed_in_short_form() => Ok(kind),
        Some(_) => Err(format!("'{}' cannot be used for short-form imports", tag)),
        None => Err(format!("'{}' is not a supported private credential type", tag)),
    }
}

/// Turn a raw row into a [`CredentialRow`].
///
/// `declared` is the short-form private type and is ignored for long-form
/// rows. `default_status` applies to service-bound rows without a `status`.
pub fn parse_row(
    shape: HeaderShape,
    declared: Option<PrivateKind>,
    default_status: LoginStatus,
    row: &Row,
) -> Result<CredentialRow, RowProblem> {
    let line = row.line();
    let issue = |reason: String| RowProblem::Issue(RowIssue::new(line, reason));

    let (private_kind, private_data) = match shape {
        HeaderShape::ShortForm => {
            let kind = declared.ok_or_else(|| RowProblem::UnsupportedType {
                line,
                tag: String::new(),
            })?;
            (kind, row.get(header::PASSWORD).unwrap_or_default())
        }
        HeaderShape::LongForm { .. } => {
            let tag = row.get(header::PRIVATE_TYPE).unwrap_or_default().trim();
            let kind = PrivateKind::from_tag(tag).ok_or_else(|| RowProblem::UnsupportedType {
                line,
                tag: tag.to_string(),
            })?;
            (kind, row.get(header::PRIVATE_DATA).unwrap_or_default())
        }
        HeaderShape::Unrecognized => {
            return Err(issue("header shape not recognized".to_string()));
        }
    };

    let username = row
        .value(header::USERNAME)
        .ok_or_else(|| issue("username is blank".to_string()))?;

    let has_data = !private_data.trim().is_empty();
    if private_kind.requires_data() && !has_data {
        return Err(issue(format!("{} data is blank", private_kind)));
    }
    if !private_kind.requires_data() && has_data {
        return Err(issue("blank private type carries data".to_string()));
    }

    let realm = match (row.value(header::REALM_KEY), row.value(header::REALM_VALUE)) {
        (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
        (None, None) => None,
        (Some(_), None) => return Err(issue("realm_key without realm_value".to_string())),
        (None, Some(_)) => return Err(issue("realm_value without realm_key".to_string())),
    };

    let service = if shape.has_service_columns() {
        parse_service(row, default_status).map_err(issue)?
    } else {
        None
    };

    Ok(CredentialRow {
        line,
        username: username.to_string(),
        private_kind,
        private_data: private_data.to_string(),
        realm,
        service,
    })
}

fn parse_service(row: &Row, default_status: LoginStatus) -> Result<Option<ServiceBinding>, String> {
    let address = match row.value(header::HOST) {
        Some(a) => a.to_string(),
        None => {
            if row.value(header::PORT).is_some() || row.value(header::PROTOCOL).is_some() {
                return Err("port or protocol given without host".to_string());
            }
            return Ok(None);
        }
    };

    let port_raw = row.value(header::PORT).unwrap_or_default().trim();
    let port = match port_raw.parse::<u16>() {
        Ok(p) if p != 0 => p,
        _ => return Err(format!("invalid port '{}'", port_raw)),
    };

    let protocol = row
        .value(header::PROTOCOL)
        .unwrap_or_default()
        .trim()
        .parse::<Protocol>()?;

    let status = match row.value(header::STATUS) {
        Some(s) => s.parse::<LoginStatus>()?,
        None => default_status,
    };

    Ok(Some(ServiceBinding {
        address,
        port,
        protocol,
        name: row.value(header::SERVICE_NAME).map(|n| n.trim().to_string()),
        status,
    }))
}

/// Validate the whole input without side effects.
///
/// The stream must be at offset 0 on entry and is rewound before returning.
///
/// # Errors
///
/// [`ReadError::StreamPosition`] when the stream was not rewound after an
/// earlier read, or an I/O error. Everything else is reported in the
/// returned [`ValidationReport`].
pub fn validate<R: Read + Seek>(
    reader: &mut TabularReader<R>,
    private_credential_type: Option<&str>,
) -> Result<ValidationReport, ReadError> {
    let mut report = ValidationReport::default();

    let shape = structural_pass(reader, &mut report)?;
    reader.rewind()?;

    let shape = match shape {
        Some(shape) => shape,
        None => return Ok(report),
    };

    let declared = match shape {
        HeaderShape::ShortForm => match short_form_kind(private_credential_type) {
            Ok(kind) => Some(kind),
            Err(detail) => {
                report.push(
                    Field::PrivateCredentialType,
                    ErrorKind::UnsupportedPrivateType,
                    Some(detail),
                );
                return Ok(report);
            }
        },
        _ => None,
    };

    for row in reader.rows()? {
        let row = row?;
        match parse_row(shape, declared, LoginStatus::default(), &row) {
            Ok(_) => {}
            Err(RowProblem::UnsupportedType { line, tag }) => report.push(
                Field::Row(line),
                ErrorKind::UnsupportedPrivateType,
                Some(format!("'{}' is not a supported private credential type", tag)),
            ),
            Err(RowProblem::Issue(issue)) => report.row_issues.push(issue),
        }
    }
    reader.rewind()?;

    Ok(report)
}

/// Returns the header shape when the input is structurally sound.
fn structural_pass<R: Read + Seek>(
    reader: &mut TabularReader<R>,
    report: &mut ValidationReport,
) -> Result<Option<HeaderShape>, ReadError> {
    let mut rows = match reader.rows() {
        Ok(rows) => rows,
        Err(ReadError::Malformed { line, reason }) => {
            report.push(
                Field::Input,
                ErrorKind::MalformedInput,
                Some(format!("line {}: {}", line, reason)),
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let columns = match rows.header() {
        Some(h) => h.to_vec(),
        None => {
            report.push(Field::Input, ErrorKind::EmptyInput, None);
            return Ok(None);
        }
    };

    let mut count = 0;
    for row in &mut rows {
        match row {
            Ok(_) => count += 1,
            Err(ReadError::Malformed { line, reason }) => {
                report.push(
                    Field::Input,
                    ErrorKind::MalformedInput,
                    Some(format!("line {}: {}", line, reason)),
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
    }

    let shape = classify(&columns);
    report.shape = Some(shape);
    if !shape.is_recognized() {
        report.push(
            Field::Input,
            ErrorKind::IncorrectHeaders,
            Some(format!("found columns: {}", columns.join(", "))),
        );
        return Ok(None);
    }
    if count == 0 {
        report.push(Field::Input, ErrorKind::EmptyInput, None);
        return Ok(None);
    }

    report.rows = count;
    Ok(Some(shape))
}
