//! Core data models for credential import.
//!
//! These types describe the records that flow from a CSV row through the
//! dedup resolver into a [`CredentialStore`](crate::store::CredentialStore):
//! public identities, private secrets, realms, cores, hosts, services and
//! logins.
//!
//! Every record kind except [`Login`](EntityKind::Login) has a uniqueness
//! key ([`EntityKey`]). The key is what the resolver and the store compare;
//! any extra fields on [`Attributes`] are carried along on creation only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(String);

impl Handle {
    /// Generate a fresh random handle.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Handle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of private credential kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateKind {
    Password,
    NtlmHash,
    NonreplayableHash,
    SshKey,
    Blank,
}

/// Tag table for [`PrivateKind`]. The only way a string becomes a kind.
const PRIVATE_KIND_TAGS: &[(&str, PrivateKind)] = &[
    ("password", PrivateKind::Password),
    ("ntlm_hash", PrivateKind::NtlmHash),
    ("nonreplayable_hash", PrivateKind::NonreplayableHash),
    ("ssh_key", PrivateKind::SshKey),
    ("blank", PrivateKind::Blank),
];

impl PrivateKind {
    /// Look up a kind by its tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        PRIVATE_KIND_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, kind)| *kind)
    }

    pub fn tag(self) -> &'static str {
        PRIVATE_KIND_TAGS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(t, _)| *t)
            .unwrap_or("unknown")
    }

    /// Whether a short-form file may declare this kind for all of its rows.
    pub fn allowed_in_short_form(self) -> bool {
        matches!(
            self,
            PrivateKind::Password | PrivateKind::NtlmHash | PrivateKind::NonreplayableHash
        )
    }

    /// Whether a secret of this kind must carry data.
    pub fn requires_data(self) -> bool {
        self != PrivateKind::Blank
    }
}

impl fmt::Display for PrivateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Transport protocol of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation status recorded on a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoginStatus {
    #[default]
    Untried,
    Successful,
    UnableToConnect,
    IncorrectLogin,
    DeniedAccess,
    LockedOut,
    NoAuthRequired,
}

const LOGIN_STATUS_NAMES: &[(&str, LoginStatus)] = &[
    ("Untried", LoginStatus::Untried),
    ("Successful", LoginStatus::Successful),
    ("Unable to Connect", LoginStatus::UnableToConnect),
    ("Incorrect", LoginStatus::IncorrectLogin),
    ("Denied Access", LoginStatus::DeniedAccess),
    ("Locked Out", LoginStatus::LockedOut),
    ("No Auth Required", LoginStatus::NoAuthRequired),
];

impl LoginStatus {
    pub fn as_str(self) -> &'static str {
        LOGIN_STATUS_NAMES
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(name, _)| *name)
            .unwrap_or("Untried")
    }
}

impl FromStr for LoginStatus {
    type Err = String;

    /// Parses the display name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LOGIN_STATUS_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, status)| *status)
            .ok_or_else(|| format!("unknown login status '{}'", s))
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of records the importer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Public,
    Private,
    Realm,
    Core,
    Host,
    Service,
    Login,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Public,
        EntityKind::Private,
        EntityKind::Realm,
        EntityKind::Core,
        EntityKind::Host,
        EntityKind::Service,
        EntityKind::Login,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Public => "public",
            EntityKind::Private => "private",
            EntityKind::Realm => "realm",
            EntityKind::Core => "core",
            EntityKind::Host => "host",
            EntityKind::Service => "service",
            EntityKind::Login => "login",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniqueness key of a deduplicated record.
///
/// Two candidates are the same record exactly when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Public {
        username: String,
    },
    Private {
        kind: PrivateKind,
        data: String,
    },
    Realm {
        key: String,
        value: String,
    },
    /// `realm: None` is a distinct value, not a wildcard.
    Core {
        public: Handle,
        private: Handle,
        realm: Option<Handle>,
    },
    Host {
        address: String,
    },
    Service {
        host: Handle,
        port: u16,
        protocol: Protocol,
    },
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Public { .. } => EntityKind::Public,
            EntityKey::Private { .. } => EntityKind::Private,
            EntityKey::Realm { .. } => EntityKind::Realm,
            EntityKey::Core { .. } => EntityKind::Core,
            EntityKey::Host { .. } => EntityKind::Host,
            EntityKey::Service { .. } => EntityKind::Service,
        }
    }
}

/// Full attribute set for creating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    Public {
        username: String,
    },
    Private {
        kind: PrivateKind,
        data: String,
    },
    Realm {
        key: String,
        value: String,
    },
    Core {
        public: Handle,
        private: Handle,
        realm: Option<Handle>,
        origin: Option<String>,
    },
    Host {
        address: String,
    },
    Service {
        host: Handle,
        port: u16,
        protocol: Protocol,
        name: Option<String>,
    },
    Login {
        core: Handle,
        service: Handle,
        status: LoginStatus,
    },
}

impl Attributes {
    pub fn kind(&self) -> EntityKind {
        match self {
            Attributes::Public { .. } => EntityKind::Public,
            Attributes::Private { .. } => EntityKind::Private,
            Attributes::Realm { .. } => EntityKind::Realm,
            Attributes::Core { .. } => EntityKind::Core,
            Attributes::Host { .. } => EntityKind::Host,
            Attributes::Service { .. } => EntityKind::Service,
            Attributes::Login { .. } => EntityKind::Login,
        }
    }

    /// Uniqueness key of the record, or `None` for logins.
    pub fn key(&self) -> Option<EntityKey> {
        match self {
            Attributes::Public { username } => Some(EntityKey::Public {
                username: username.clone(),
            }),
            Attributes::Private { kind, data } => Some(EntityKey::Private {
                kind: *kind,
                data: data.clone(),
            }),
            Attributes::Realm { key, value } => Some(EntityKey::Realm {
                key: key.clone(),
                value: value.clone(),
            }),
            Attributes::Core {
                public,
                private,
                realm,
                ..
            } => Some(EntityKey::Core {
                public: public.clone(),
                private: private.clone(),
                realm: realm.clone(),
            }),
            Attributes::Host { address } => Some(EntityKey::Host {
                address: address.clone(),
            }),
            Attributes::Service {
                host,
                port,
                protocol,
                ..
            } => Some(EntityKey::Service {
                host: host.clone(),
                port: *port,
                protocol: *protocol,
            }),
            Attributes::Login { .. } => None,
        }
    }
}

/// Per-kind record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub public: u64,
    pub private: u64,
    pub realm: u64,
    pub core: u64,
    pub host: u64,
    pub service: u64,
    pub login: u64,
}

impl EntityCounts {
    pub fn get(&self, kind: EntityKind) -> u64 {
        match kind {
            EntityKind::Public => self.public,
            EntityKind::Private => self.private,
            EntityKind::Realm => self.realm,
            EntityKind::Core => self.core,
            EntityKind::Host => self.host,
            EntityKind::Service => self.service,
            EntityKind::Login => self.login,
        }
    }

    pub fn record(&mut self, kind: EntityKind) {
        let slot = match kind {
            EntityKind::Public => &mut self.public,
            EntityKind::Private => &mut self.private,
            EntityKind::Realm => &mut self.realm,
            EntityKind::Core => &mut self.core,
            EntityKind::Host => &mut self.host,
            EntityKind::Service => &mut self.service,
            EntityKind::Login => &mut self.login,
        };
        *slot += 1;
    }

    pub fn total(&self) -> u64 {
        EntityKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}
