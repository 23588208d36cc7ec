use std::fmt;

/// The kind of record a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Person,
    Visit,
    Service,
    Encounter,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Person => "person",
            EntityKind::Visit => "visit",
            EntityKind::Service => "service",
            EntityKind::Encounter => "encounter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpostError {
    #[error("no {entity} found with id {id}")]
    NotFound { entity: EntityKind, id: String },
    #[error("visit already exists for this patient {person_id}")]
    Conflict { person_id: i64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] checkpost_types::TimeError),
    #[error("invalid text: {0}")]
    Text(#[from] checkpost_types::TextError),

    #[error("failed to read record snapshot: {0}")]
    StoreRead(std::io::Error),
    #[error("failed to write record snapshot: {0}")]
    StoreWrite(std::io::Error),
    #[error("failed to serialize record snapshot: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("record snapshot schema mismatch: {0}")]
    SnapshotSchema(String),
    #[error("record store lock poisoned")]
    StorePoisoned,
}

impl CheckpostError {
    pub fn not_found(entity: EntityKind, id: impl fmt::Display) -> Self {
        CheckpostError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for errors caused by the request rather than by the store.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            CheckpostError::NotFound { .. }
                | CheckpostError::Conflict { .. }
                | CheckpostError::InvalidInput(_)
                | CheckpostError::InvalidTimestamp(_)
                | CheckpostError::Text(_)
        )
    }
}

pub type CheckpostResult<T> = std::result::Result<T, CheckpostError>;
