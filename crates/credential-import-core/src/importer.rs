//! Import orchestration.
//!
//! [`CoreImporter`] drives one run over one input:
//!
//! ```text
//! Pending ──validate──▶ Validated ──import──▶ Importing ──▶ Completed
//!    │                                            │
//!    └──────────────────▶ Failed ◀────────────────┘
//! ```
//!
//! `import` always validates first and writes nothing if validation reports
//! an error. Rows are then processed one at a time, in file order, because a
//! later row may reuse records created by an earlier one. For every row the
//! public, private, realm and core are resolved in that order; rows with a
//! service binding also resolve a host and a service and get a fresh login.
//!
//! A store failure ends the run. Records created before the failure are
//! kept; callers that need all-or-nothing semantics must wrap the run in a
//! transaction of their own.

use std::io::{self, Read, Seek};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ImportError;
use crate::header::HeaderShape;
use crate::models::{Attributes, EntityCounts, LoginStatus, PrivateKind};
use crate::reader::TabularReader;
use crate::resolve::DedupResolver;
use crate::store::CredentialStore;
use crate::validate::{
    self, parse_row, short_form_kind, CredentialRow, ErrorKind, Field, RowIssue, RowProblem,
    ValidationError, ValidationReport,
};

/// Caller-supplied settings for one run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Private type of every row in a short-form file. Ignored for
    /// long-form files.
    pub private_credential_type: Option<String>,
    /// Recorded on every created core.
    pub origin: Option<String>,
    /// Status for logins whose row has no `status` value.
    pub default_login_status: LoginStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Pending,
    Validated,
    Importing,
    Completed,
    Failed,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Records created by this run, per kind.
    pub created: EntityCounts,
    pub rows_imported: usize,
    pub rows_skipped: Vec<RowIssue>,
}

pub struct CoreImporter<R> {
    reader: TabularReader<R>,
    store: Arc<dyn CredentialStore>,
    options: ImportOptions,
    state: ImportState,
}

impl<R: Read + Seek> CoreImporter<R> {
    pub fn new(input: R, store: Arc<dyn CredentialStore>, options: ImportOptions) -> Self {
        Self {
            reader: TabularReader::new(input),
            store,
            options,
            state: ImportState::Pending,
        }
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn reader_mut(&mut self) -> &mut TabularReader<R> {
        &mut self.reader
    }

    /// Seek the input back to its start. Required between runs.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.reader.rewind()
    }

    /// Validate the input without writing anything.
    ///
    /// # Errors
    ///
    /// [`ImportError::Read`] when the input was not rewound after a previous
    /// read, or on I/O failure.
    pub fn validate(&mut self) -> Result<ValidationReport, ImportError> {
        let private_type = self.options.private_credential_type.as_deref();
        match validate::validate(&mut self.reader, private_type) {
            Ok(report) => {
                self.state = if report.is_valid() {
                    ImportState::Validated
                } else {
                    ImportState::Failed
                };
                Ok(report)
            }
            Err(e) => {
                self.state = ImportState::Failed;
                Err(e.into())
            }
        }
    }

    /// Validate, then create every record the input calls for.
    ///
    /// The input is left at its end; call [`rewind`](Self::rewind) before
    /// running again.
    pub async fn import(&mut self) -> Result<ImportSummary, ImportError> {
        let report = self.validate()?;
        let shape = match report.shape {
            Some(shape) if report.is_valid() && shape.is_recognized() => shape,
            _ => {
                self.state = ImportState::Failed;
                return Err(ImportError::Invalid(report));
            }
        };
        let declared = match shape {
            HeaderShape::ShortForm => {
                short_form_kind(self.options.private_credential_type.as_deref()).ok()
            }
            _ => None,
        };

        info!(rows = report.rows, shape = ?shape, "importing credentials");
        self.state = ImportState::Importing;

        let store = Arc::clone(&self.store);
        let mut resolver = DedupResolver::new(store.as_ref());
        let mut summary = ImportSummary::default();

        let result = import_rows(
            &mut self.reader,
            &mut resolver,
            shape,
            declared,
            &self.options,
            &mut summary,
        )
        .await;

        match result {
            Ok(()) => {
                summary.created = resolver.into_created();
                self.state = ImportState::Completed;
                info!(
                    imported = summary.rows_imported,
                    skipped = summary.rows_skipped.len(),
                    created = summary.created.total(),
                    "import completed"
                );
                Ok(summary)
            }
            Err(e) => {
                self.state = ImportState::Failed;
                Err(e)
            }
        }
    }
}

async fn import_rows<R: Read + Seek>(
    reader: &mut TabularReader<R>,
    resolver: &mut DedupResolver<'_>,
    shape: HeaderShape,
    declared: Option<PrivateKind>,
    options: &ImportOptions,
    summary: &mut ImportSummary,
) -> Result<(), ImportError> {
    for row in reader.rows()? {
        let row = row?;
        let parsed = match parse_row(shape, declared, options.default_login_status, &row) {
            Ok(parsed) => parsed,
            Err(RowProblem::Issue(issue)) => {
                warn!(line = issue.line, reason = %issue.reason, "skipping row");
                summary.rows_skipped.push(issue);
                continue;
            }
            Err(RowProblem::UnsupportedType { line, tag }) => {
                return Err(ImportError::Invalid(ValidationReport {
                    shape: Some(shape),
                    errors: vec![ValidationError {
                        field: Field::Row(line),
                        kind: ErrorKind::UnsupportedPrivateType,
                        detail: Some(format!("'{}' is not a supported private credential type", tag)),
                    }],
                    ..ValidationReport::default()
                }));
            }
        };

        if let Err(cause) = import_row(resolver, &parsed, options.origin.as_deref()).await {
            return Err(ImportError::Store {
                line: parsed.line,
                created: resolver.created().clone(),
                cause,
            });
        }
        summary.rows_imported += 1;
    }
    Ok(())
}

async fn import_row(
    resolver: &mut DedupResolver<'_>,
    row: &CredentialRow,
    origin: Option<&str>,
) -> anyhow::Result<()> {
    let (public, _) = resolver
        .resolve_or_create(&Attributes::Public {
            username: row.username.clone(),
        })
        .await?;

    let (private, _) = resolver
        .resolve_or_create(&Attributes::Private {
            kind: row.private_kind,
            data: row.private_data.clone(),
        })
        .await?;

    let realm = match &row.realm {
        Some((key, value)) => {
            let (handle, _) = resolver
                .resolve_or_create(&Attributes::Realm {
                    key: key.clone(),
                    value: value.clone(),
                })
                .await?;
            Some(handle)
        }
        None => None,
    };

    let (core, _) = resolver
        .resolve_or_create(&Attributes::Core {
            public,
            private,
            realm,
            origin: origin.map(str::to_string),
        })
        .await?;

    if let Some(binding) = &row.service {
        let (host, _) = resolver
            .resolve_or_create(&Attributes::Host {
                address: binding.address.clone(),
            })
            .await?;
        let (service, _) = resolver
            .resolve_or_create(&Attributes::Service {
                host,
                port: binding.port,
                protocol: binding.protocol,
                name: binding.name.clone(),
            })
            .await?;
        resolver
            .create(&Attributes::Login {
                core,
                service,
                status: binding.status,
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReadError;
    use crate::models::{EntityKey, EntityKind, Handle};
    use crate::store::memory::InMemoryStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::io::{BufRead, BufReader, Cursor};

    const SHORT_FORM: &str = "username,password\nalice,s3cret\nbob,hunter2\n";

    // 3 usernames, 3 secrets, 2 realms
    const LONG_FORM: &str = "\
username,private_type,private_data,realm_key,realm_value
alice,password,alpha,domain,CORP
bob,ntlm_hash,aad3b435b51404eeaad3b435b51404ee:31d6cfe0d16ae931b73c59d7e0c089c0,domain,CORP
carol,password,gamma,domain,LAB
";

    const WITH_SERVICES: &str = "\
username,private_type,private_data,realm_key,realm_value,host,port,protocol,service_name
alice,password,alpha,,,10.0.0.1,22,tcp,ssh
bob,password,beta,,,10.0.0.2,445,tcp,smb
carol,password,gamma,,,,,,
";

    fn importer(
        text: &str,
        store: Arc<InMemoryStore>,
        private_type: Option<&str>,
    ) -> CoreImporter<Cursor<Vec<u8>>> {
        CoreImporter::new(
            Cursor::new(text.as_bytes().to_vec()),
            store,
            ImportOptions {
                private_credential_type: private_type.map(str::to_string),
                origin: Some("test.csv".to_string()),
                default_login_status: LoginStatus::Untried,
            },
        )
    }

    async fn count(store: &InMemoryStore, kind: EntityKind) -> u64 {
        store.count(kind).await.unwrap()
    }

    #[tokio::test]
    async fn test_short_form_all_new() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(SHORT_FORM, store.clone(), Some("password"));

        let summary = imp.import().await.unwrap();
        assert_eq!(imp.state(), ImportState::Completed);
        assert_eq!(summary.rows_imported, 2);
        assert_eq!(count(&store, EntityKind::Public).await, 2);
        assert_eq!(count(&store, EntityKind::Private).await, 2);
        assert_eq!(count(&store, EntityKind::Core).await, 2);
        assert_eq!(count(&store, EntityKind::Realm).await, 0);

        for (_, attrs) in store.records(EntityKind::Private) {
            match attrs {
                Attributes::Private { kind, .. } => assert_eq!(kind, PrivateKind::Password),
                other => panic!("unexpected record {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_short_form_shared_password_creates_one_private() {
        let store = Arc::new(InMemoryStore::new());
        let text = "username,password\nalice,same\nbob,same\n";
        let summary = importer(text, store.clone(), Some("password"))
            .import()
            .await
            .unwrap();
        assert_eq!(summary.created.private, 1);
        assert_eq!(summary.created.core, 2);
    }

    #[tokio::test]
    async fn test_long_form_all_new() {
        let store = Arc::new(InMemoryStore::new());
        let summary = importer(LONG_FORM, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(count(&store, EntityKind::Public).await, 3);
        assert_eq!(count(&store, EntityKind::Private).await, 3);
        assert_eq!(count(&store, EntityKind::Realm).await, 2);
        assert_eq!(count(&store, EntityKind::Core).await, 3);
        assert_eq!(count(&store, EntityKind::Login).await, 0);
        assert_eq!(summary.created.total(), 11);
    }

    #[tokio::test]
    async fn test_long_form_existing_public_reused() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create(&Attributes::Public {
                username: "alice".to_string(),
            })
            .await
            .unwrap();

        let summary = importer(LONG_FORM, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(summary.created.public, 2);
        assert_eq!(count(&store, EntityKind::Public).await, 3);
        assert_eq!(count(&store, EntityKind::Core).await, 3);
    }

    #[tokio::test]
    async fn test_long_form_existing_private_and_realm_reused() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create(&Attributes::Private {
                kind: PrivateKind::Password,
                data: "alpha".to_string(),
            })
            .await
            .unwrap();
        store
            .create(&Attributes::Realm {
                key: "domain".to_string(),
                value: "CORP".to_string(),
            })
            .await
            .unwrap();

        importer(LONG_FORM, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(count(&store, EntityKind::Private).await, 3);
        assert_eq!(count(&store, EntityKind::Realm).await, 2);
    }

    #[tokio::test]
    async fn test_service_rows_create_logins_hosts_services() {
        let store = Arc::new(InMemoryStore::new());
        let summary = importer(WITH_SERVICES, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(count(&store, EntityKind::Login).await, 2);
        assert_eq!(count(&store, EntityKind::Host).await, 2);
        assert_eq!(count(&store, EntityKind::Service).await, 2);
        assert_eq!(count(&store, EntityKind::Core).await, 3);
        assert_eq!(summary.rows_imported, 3);

        for (_, attrs) in store.records(EntityKind::Core) {
            match attrs {
                Attributes::Core { origin, realm, .. } => {
                    assert_eq!(origin.as_deref(), Some("test.csv"));
                    assert_eq!(realm, None);
                }
                other => panic!("unexpected record {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_reimport_dedups_everything_but_logins() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(WITH_SERVICES, store.clone(), None);

        let first = imp.import().await.unwrap();
        assert_eq!(first.created.core, 3);
        assert_eq!(first.created.login, 2);

        imp.rewind().unwrap();
        let second = imp.import().await.unwrap();
        assert_eq!(second.created.public, 0);
        assert_eq!(second.created.private, 0);
        assert_eq!(second.created.realm, 0);
        assert_eq!(second.created.core, 0);
        assert_eq!(second.created.host, 0);
        assert_eq!(second.created.service, 0);
        assert_eq!(second.created.login, 2);
        assert_eq!(count(&store, EntityKind::Login).await, 4);
    }

    #[tokio::test]
    async fn test_second_import_without_rewind_fails() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(SHORT_FORM, store.clone(), Some("password"));
        imp.import().await.unwrap();

        let err = imp.import().await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::Read(ReadError::StreamPosition { .. })
        ));
        assert_eq!(count(&store, EntityKind::Public).await, 2);
    }

    #[test]
    fn test_validate_after_partial_read_fails() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(LONG_FORM, store, None);
        let mut line = String::new();
        BufReader::new(imp.reader_mut().get_mut())
            .read_line(&mut line)
            .unwrap();

        assert!(matches!(
            imp.validate(),
            Err(ImportError::Read(ReadError::StreamPosition { .. }))
        ));
        assert_eq!(imp.state(), ImportState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let text = "username,private_type,private_data,realm_key,realm_value\n\
                    alice,password,alpha,,\n\
                    bob,Widget,beta,,\n";
        let mut imp = importer(text, store.clone(), None);

        match imp.import().await {
            Err(ImportError::Invalid(report)) => {
                assert!(report.has_error(Field::Row(3), ErrorKind::UnsupportedPrivateType));
            }
            other => panic!("expected invalid input, got {:?}", other),
        }
        assert_eq!(imp.state(), ImportState::Failed);
        assert_eq!(count(&store, EntityKind::Public).await, 0);
    }

    #[tokio::test]
    async fn test_short_form_unsupported_type_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(SHORT_FORM, store.clone(), Some("ssh_key"));
        let err = imp.import().await.unwrap_err();
        match err {
            ImportError::Invalid(report) => assert_eq!(
                report.errors_on(Field::PrivateCredentialType),
                vec![ErrorKind::UnsupportedPrivateType]
            ),
            other => panic!("expected invalid input, got {:?}", other),
        }
        assert_eq!(count(&store, EntityKind::Public).await, 0);
    }

    #[tokio::test]
    async fn test_row_issues_skip_only_that_row() {
        let store = Arc::new(InMemoryStore::new());
        let text = "username,private_type,private_data,realm_key,realm_value\n\
                    alice,password,alpha,domain,\n\
                    bob,password,beta,,\n";
        let summary = importer(text, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(summary.rows_imported, 1);
        assert_eq!(summary.rows_skipped.len(), 1);
        assert_eq!(summary.rows_skipped[0].line, 2);
        assert_eq!(count(&store, EntityKind::Public).await, 1);
    }

    #[tokio::test]
    async fn test_broken_quoting_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let text = "username,password\nalice,pa\"ss\nbob,\"unterminated\ncarol,x\n";
        let mut imp = importer(text, store.clone(), Some("password"));

        match imp.import().await {
            Err(ImportError::Invalid(report)) => {
                assert!(report.has_error(Field::Input, ErrorKind::MalformedInput));
            }
            other => panic!("expected invalid input, got {:?}", other),
        }
        for kind in EntityKind::ALL {
            assert_eq!(count(&store, kind).await, 0, "{} written", kind);
        }
    }

    #[tokio::test]
    async fn test_skipped_service_row_creates_no_service_records() {
        let store = Arc::new(InMemoryStore::new());
        let text = "\
username,private_type,private_data,realm_key,realm_value,host,port,protocol,service_name
alice,password,alpha,,,10.0.0.1,22,sctp,ssh
bob,password,beta,,,,,,
";
        let summary = importer(text, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(summary.rows_imported, 1);
        assert_eq!(summary.rows_skipped.len(), 1);
        assert_eq!(summary.rows_skipped[0].line, 2);
        assert_eq!(count(&store, EntityKind::Host).await, 0);
        assert_eq!(count(&store, EntityKind::Service).await, 0);
        assert_eq!(count(&store, EntityKind::Login).await, 0);
        assert_eq!(count(&store, EntityKind::Core).await, 1);
    }

    #[tokio::test]
    async fn test_same_credentials_with_and_without_realm_are_distinct_cores() {
        let store = Arc::new(InMemoryStore::new());
        let text = "username,private_type,private_data,realm_key,realm_value\n\
                    alice,password,alpha,,\n\
                    alice,password,alpha,domain,CORP\n\
                    alice,password,alpha,,\n";
        let summary = importer(text, store.clone(), None)
            .import()
            .await
            .unwrap();
        assert_eq!(summary.created.public, 1);
        assert_eq!(summary.created.private, 1);
        assert_eq!(summary.created.core, 2);
    }

    /// Fails every create of one kind.
    struct RejectingStore {
        inner: InMemoryStore,
        reject: EntityKind,
    }

    #[async_trait]
    impl CredentialStore for RejectingStore {
        async fn find_by_key(&self, key: &EntityKey) -> Result<Option<Handle>> {
            self.inner.find_by_key(key).await
        }

        async fn create(&self, attributes: &Attributes) -> Result<Handle> {
            if attributes.kind() == self.reject {
                bail!("constraint violation");
            }
            self.inner.create(attributes).await
        }

        async fn count(&self, kind: EntityKind) -> Result<u64> {
            self.inner.count(kind).await
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_fatal_and_keeps_partial_records() {
        let store = Arc::new(RejectingStore {
            inner: InMemoryStore::new(),
            reject: EntityKind::Core,
        });
        let mut imp = CoreImporter::new(
            Cursor::new(LONG_FORM.as_bytes().to_vec()),
            store.clone(),
            ImportOptions::default(),
        );

        match imp.import().await {
            Err(ImportError::Store { line, created, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(created.public, 1);
                assert_eq!(created.private, 1);
                assert_eq!(created.realm, 1);
                assert_eq!(created.core, 0);
            }
            other => panic!("expected store failure, got {:?}", other),
        }
        assert_eq!(imp.state(), ImportState::Failed);
        assert_eq!(store.count(EntityKind::Public).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let store = Arc::new(InMemoryStore::new());
        let mut imp = importer(SHORT_FORM, store, Some("password"));
        assert_eq!(imp.state(), ImportState::Pending);
        imp.validate().unwrap();
        assert_eq!(imp.state(), ImportState::Validated);
        imp.import().await.unwrap();
        assert_eq!(imp.state(), ImportState::Completed);
    }
}
