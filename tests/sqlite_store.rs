//! SQLite store tests.
//!
//! Run the core importer against a real database file to check that the
//! schema constraints and lookups agree with the in-memory dedup rules.

use std::io::Cursor;
use std::sync::Arc;

use credential_import::config::{Config, DbConfig, ImportConfig};
use credential_import::sqlite_store::SqliteStore;
use credential_import::{db, migrate};
use credential_import_core::models::{
    Attributes, EntityKey, EntityKind, Handle, LoginStatus, PrivateKind, Protocol,
};
use credential_import_core::store::CredentialStore;
use credential_import_core::{CoreImporter, ImportOptions};
use tempfile::TempDir;

async fn setup_store() -> (TempDir, Arc<SqliteStore>) {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("data/credentials.sqlite"),
        },
        import: ImportConfig::default(),
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, Arc::new(SqliteStore::new(pool)))
}

async fn public(store: &SqliteStore, username: &str) -> Handle {
    store
        .create(&Attributes::Public {
            username: username.to_string(),
        })
        .await
        .unwrap()
}

async fn private(store: &SqliteStore, data: &str) -> Handle {
    store
        .create(&Attributes::Private {
            kind: PrivateKind::Password,
            data: data.to_string(),
        })
        .await
        .unwrap()
}

fn options() -> ImportOptions {
    ImportOptions {
        private_credential_type: None,
        origin: Some("services.csv".to_string()),
        default_login_status: LoginStatus::Untried,
    }
}

#[tokio::test]
async fn test_find_by_key_round_trip() {
    let (_tmp, store) = setup_store().await;

    let alice = public(&store, "alice").await;
    let found = store
        .find_by_key(&EntityKey::Public {
            username: "alice".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(found, Some(alice));

    let missing = store
        .find_by_key(&EntityKey::Public {
            username: "mallory".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn test_usernames_are_case_sensitive() {
    let (_tmp, store) = setup_store().await;

    let lower = public(&store, "admin").await;
    let upper = public(&store, "Admin").await;
    assert_ne!(lower, upper);
    assert_eq!(store.count(EntityKind::Public).await.unwrap(), 2);
}

#[tokio::test]
async fn test_duplicate_public_rejected() {
    let (_tmp, store) = setup_store().await;

    public(&store, "alice").await;
    let err = store
        .create(&Attributes::Public {
            username: "alice".to_string(),
        })
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_core_without_realm_is_unique() {
    let (_tmp, store) = setup_store().await;

    let p = public(&store, "alice").await;
    let s = private(&store, "s3cret").await;
    let core = Attributes::Core {
        public: p.clone(),
        private: s.clone(),
        realm: None,
        origin: None,
    };
    let first = store.create(&core).await.unwrap();
    assert!(store.create(&core).await.is_err());

    let found = store
        .find_by_key(&EntityKey::Core {
            public: p,
            private: s,
            realm: None,
        })
        .await
        .unwrap();
    assert_eq!(found, Some(first));
}

#[tokio::test]
async fn test_core_realm_distinguishes_records() {
    let (_tmp, store) = setup_store().await;

    let p = public(&store, "alice").await;
    let s = private(&store, "s3cret").await;
    let realm = store
        .create(&Attributes::Realm {
            key: "domain".to_string(),
            value: "CORP".to_string(),
        })
        .await
        .unwrap();

    store
        .create(&Attributes::Core {
            public: p.clone(),
            private: s.clone(),
            realm: None,
            origin: None,
        })
        .await
        .unwrap();
    store
        .create(&Attributes::Core {
            public: p,
            private: s,
            realm: Some(realm),
            origin: None,
        })
        .await
        .unwrap();

    assert_eq!(store.count(EntityKind::Core).await.unwrap(), 2);
}

#[tokio::test]
async fn test_service_key_includes_protocol() {
    let (_tmp, store) = setup_store().await;

    let host = store
        .create(&Attributes::Host {
            address: "10.0.0.1".to_string(),
        })
        .await
        .unwrap();
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        store
            .create(&Attributes::Service {
                host: host.clone(),
                port: 53,
                protocol,
                name: Some("dns".to_string()),
            })
            .await
            .unwrap();
    }

    let udp = store
        .find_by_key(&EntityKey::Service {
            host,
            port: 53,
            protocol: Protocol::Udp,
        })
        .await
        .unwrap();
    assert!(udp.is_some());
    assert_eq!(store.count(EntityKind::Service).await.unwrap(), 2);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let (_tmp, store) = setup_store().await;

    let missing = Handle::from("no-such-core".to_string());
    let host = store
        .create(&Attributes::Host {
            address: "10.0.0.1".to_string(),
        })
        .await
        .unwrap();
    let service = store
        .create(&Attributes::Service {
            host,
            port: 22,
            protocol: Protocol::Tcp,
            name: None,
        })
        .await
        .unwrap();

    let login = store
        .create(&Attributes::Login {
            core: missing,
            service,
            status: LoginStatus::Untried,
        })
        .await;
    assert!(login.is_err());
    assert_eq!(store.count(EntityKind::Login).await.unwrap(), 0);
}

#[tokio::test]
async fn test_import_with_services_into_sqlite() {
    let (_tmp, store) = setup_store().await;
    let text = "\
username,private_type,private_data,realm_key,realm_value,host,port,protocol,service_name
alice,password,alpha,,,10.0.0.1,22,tcp,ssh
bob,password,beta,,,10.0.0.2,445,tcp,smb
carol,password,gamma,,,,,,
";

    let mut importer = CoreImporter::new(
        Cursor::new(text.as_bytes().to_vec()),
        store.clone(),
        options(),
    );
    let summary = importer.import().await.unwrap();
    assert_eq!(summary.rows_imported, 3);
    assert_eq!(summary.created.core, 3);
    assert_eq!(summary.created.host, 2);
    assert_eq!(summary.created.service, 2);
    assert_eq!(summary.created.login, 2);

    let origin: String = sqlx::query_scalar("SELECT origin FROM cores LIMIT 1")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(origin, "services.csv");

    // A second run reuses every deduplicated record.
    let mut again = CoreImporter::new(
        Cursor::new(text.as_bytes().to_vec()),
        store.clone(),
        options(),
    );
    let summary = again.import().await.unwrap();
    assert_eq!(summary.created.core, 0);
    assert_eq!(summary.created.service, 0);
    assert_eq!(summary.created.login, 2);
    assert_eq!(store.count(EntityKind::Login).await.unwrap(), 4);
}
