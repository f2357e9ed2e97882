use crate::error::{NavError, Result};
use crate::model::NodeKey;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOp {
    CreateDossier,
    CreateDocument,
    CreateVersion,
    DeleteVersion,
    RestoreVersion,
    DeleteEntity,
    RestoreEntity,
}

impl WriteOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            WriteOp::CreateDossier => "create_dossier",
            WriteOp::CreateDocument => "create_document",
            WriteOp::CreateVersion => "create_version",
            WriteOp::DeleteVersion => "delete_version",
            WriteOp::RestoreVersion => "restore_version",
            WriteOp::DeleteEntity => "delete_entity",
            WriteOp::RestoreEntity => "restore_entity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteKey {
    pub op: WriteOp,
    pub target: NodeKey,
}

impl fmt::Display for WriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.op.as_str(), self.target)
    }
}

/// Set of writes currently running. Holding a token blocks a second identical
/// write; dropping it releases the slot.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<WriteKey>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, op: WriteOp, target: NodeKey) -> Result<InFlightToken> {
        let key = WriteKey { op, target };
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key) {
            return Err(NavError::Busy(key.to_string()));
        }
        Ok(InFlightToken {
            key,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_running(&self, op: WriteOp, target: NodeKey) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&WriteKey { op, target })
    }
}

#[derive(Debug)]
pub struct InFlightToken {
    key: WriteKey,
    active: Arc<Mutex<HashSet<WriteKey>>>,
}

impl InFlightToken {
    pub fn key(&self) -> WriteKey {
        self.key
    }
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms_protocol::NodeKind;

    #[test]
    fn second_identical_write_is_busy_until_release() {
        let in_flight = InFlight::new();
        let document = NodeKey::new(7, NodeKind::Document);
        let token = in_flight.acquire(WriteOp::CreateVersion, document).unwrap();
        assert!(matches!(
            in_flight.acquire(WriteOp::CreateVersion, document),
            Err(NavError::Busy(_))
        ));
        // other operations on the same target are independent
        let other = in_flight.acquire(WriteOp::DeleteVersion, document).unwrap();
        drop(token);
        assert!(!in_flight.is_running(WriteOp::CreateVersion, document));
        assert!(in_flight.acquire(WriteOp::CreateVersion, document).is_ok());
        assert_eq!(other.key().op, WriteOp::DeleteVersion);
    }
}
