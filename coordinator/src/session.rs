use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::CoordinatorError;

/// The state of one prover within a session.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Work dispatched, no verdict yet.
    Assigned,
    /// Submitted a proof that passed verification.
    ProofValid,
    /// Submitted a proof that failed, or reported its own failure.
    ProofInvalid,
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParticipantStatus::Assigned => write!(f, "assigned"),
            ParticipantStatus::ProofValid => write!(f, "proof_valid"),
            ParticipantStatus::ProofInvalid => write!(f, "proof_invalid"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub name: String,
    pub status: ParticipantStatus,
}

/// Verdict for one participant, sent from the message router to the
/// session collector.
pub type FinishSignal = (String, ParticipantStatus);

/// Coordinator-side record of one in-flight dispatch of a task.
#[derive(Debug)]
pub struct Session {
    id: u64,
    started_at: DateTime<Utc>,
    participants: Mutex<HashMap<String, Participant>>,
    finish_tx: mpsc::Sender<FinishSignal>,
}

impl Session {
    pub fn new(
        id: u64,
        identity: String,
        name: String,
        finish_tx: mpsc::Sender<FinishSignal>,
    ) -> Self {
        let mut participants = HashMap::new();
        participants.insert(
            identity,
            Participant {
                name,
                status: ParticipantStatus::Assigned,
            },
        );
        Self {
            id,
            started_at: Utc::now(),
            participants: Mutex::new(participants),
            finish_tx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whole seconds elapsed since the session started.
    pub fn elapsed_secs(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    pub fn participant_status(&self, identity: &str) -> Option<ParticipantStatus> {
        self.participants
            .lock()
            .unwrap()
            .get(identity)
            .map(|participant| participant.status)
    }

    /// Record a verdict for a participant. A participant leaves `Assigned`
    /// at most once; later writes are ignored.
    pub fn set_participant_status(&self, identity: &str, status: ParticipantStatus) {
        let mut participants = self.participants.lock().unwrap();
        match participants.get_mut(identity) {
            Some(participant) if participant.status == ParticipantStatus::Assigned => {
                participant.status = status;
            }
            Some(participant) => {
                warn!(
                    id = self.id,
                    prover = identity,
                    current = %participant.status,
                    "ignoring repeated verdict for participant"
                );
            }
            None => {
                warn!(id = self.id, prover = identity, "verdict for unknown participant");
            }
        }
    }

    /// Deliver a verdict to the collector. Returns false when the bounded
    /// buffer is full.
    pub fn finish(&self, identity: String, status: ParticipantStatus) -> bool {
        self.finish_tx.try_send((identity, status)).is_ok()
    }

    /// Identities whose proofs verified.
    pub fn proof_valid_identities(&self) -> Vec<String> {
        self.participants
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, participant)| participant.status == ParticipantStatus::ProofValid)
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    pub fn snapshot(&self) -> SessionInfo {
        let participants = self
            .participants
            .lock()
            .unwrap()
            .iter()
            .map(|(identity, participant)| ParticipantInfo {
                identity: identity.clone(),
                name: participant.name.clone(),
                status: participant.status,
            })
            .collect();
        SessionInfo {
            id: self.id,
            started_at: self.started_at,
            participants,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantInfo {
    pub identity: String,
    pub name: String,
    pub status: ParticipantStatus,
}

/// Read-only view of a live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub participants: Vec<ParticipantInfo>,
}

/// Snapshot of a session that ended in failure, kept for operator
/// introspection only.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSessionInfo {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub participants: Vec<ParticipantInfo>,
    pub error: String,
}

impl FailedSessionInfo {
    pub fn new(session: &Session, error: &str) -> Self {
        let info = session.snapshot();
        Self {
            id: info.id,
            started_at: info.started_at,
            finished_at: Utc::now(),
            participants: info.participants,
            error: error.to_string(),
        }
    }
}

/// Bounded history of failed sessions.
///
/// The first error recorded for a session wins; once full, the oldest
/// snapshot is evicted. Guarded by its own mutex, never held across an
/// await, so both the router (under the table read lock) and the collector
/// (under the write lock) can record.
#[derive(Debug)]
pub struct FailedSessionLog {
    cap: usize,
    entries: Mutex<HashMap<u64, FailedSessionInfo>>,
}

impl FailedSessionLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, session: &Session, error: &str) {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&session.id()) {
            return;
        }
        if entries.len() >= self.cap {
            if let Some(oldest) = entries
                .values()
                .min_by_key(|info| (info.finished_at, info.id))
                .map(|info| info.id)
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(session.id(), FailedSessionInfo::new(session, error));
    }

    pub fn snapshot(&self) -> Vec<FailedSessionInfo> {
        let entries = self.entries.lock().unwrap();
        let mut infos: Vec<FailedSessionInfo> = entries.values().cloned().collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory map of active sessions; the single source of truth for
/// session state.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<u64, Arc<Session>>,
}

impl SessionTable {
    pub fn insert(&mut self, session: Arc<Session>) -> Result<(), CoordinatorError> {
        let id = session.id();
        if self.sessions.contains_key(&id) {
            return Err(CoordinatorError::DuplicateSession(id));
        }
        self.sessions.insert(id, session);
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&Arc<Session>> {
        self.sessions.get(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Arc<Session>> {
        self.sessions.remove(&id)
    }

    /// True iff some session lists this identity with status `Assigned`.
    pub fn is_identity_busy(&self, identity: &str) -> bool {
        self.sessions.values().any(|session| {
            session.participant_status(identity) == Some(ParticipantStatus::Assigned)
        })
    }

    pub fn infos(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> =
            self.sessions.values().map(|session| session.snapshot()).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: u64, identity: &str) -> (Arc<Session>, mpsc::Receiver<FinishSignal>) {
        let (tx, rx) = mpsc::channel(crate::FINISH_SIGNAL_CAPACITY);
        (
            Arc::new(Session::new(id, identity.to_string(), "p".to_string(), tx)),
            rx,
        )
    }

    #[test]
    fn test_insert_rejects_duplicate_id() {
        let mut table = SessionTable::default();
        let (s1, _rx1) = session(1, "aa");
        let (s2, _rx2) = session(1, "bb");

        table.insert(s1).unwrap();
        assert!(matches!(
            table.insert(s2),
            Err(CoordinatorError::DuplicateSession(1))
        ));
    }

    #[test]
    fn test_participant_leaves_assigned_once() {
        let (s, _rx) = session(1, "aa");
        s.set_participant_status("aa", ParticipantStatus::ProofInvalid);
        s.set_participant_status("aa", ParticipantStatus::ProofValid);
        assert_eq!(
            s.participant_status("aa"),
            Some(ParticipantStatus::ProofInvalid)
        );
    }

    #[test]
    fn test_is_identity_busy() {
        let mut table = SessionTable::default();
        let (s, _rx) = session(1, "aa");
        table.insert(s.clone()).unwrap();

        assert!(table.is_identity_busy("aa"));
        assert!(!table.is_identity_busy("bb"));

        s.set_participant_status("aa", ParticipantStatus::ProofValid);
        assert!(!table.is_identity_busy("aa"));
    }

    #[test]
    fn test_failed_session_log_caps_and_keeps_first_error() {
        let log = FailedSessionLog::new(2);
        let (s1, _rx1) = session(1, "aa");
        let (s2, _rx2) = session(2, "aa");
        let (s3, _rx3) = session(3, "aa");

        log.record(&s1, "first");
        log.record(&s1, "second");
        assert_eq!(log.snapshot()[0].error, "first");

        log.record(&s2, "e2");
        log.record(&s3, "e3");
        assert_eq!(log.len(), 2);
        // the oldest snapshot was evicted
        assert_eq!(
            log.snapshot().iter().map(|info| info.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn test_finish_signal_capacity() {
        let (s, _rx) = session(1, "aa");
        for _ in 0..crate::FINISH_SIGNAL_CAPACITY {
            assert!(s.finish("aa".to_string(), ParticipantStatus::ProofValid));
        }
        // the buffer is bounded; overflow must not block the caller
        assert!(!s.finish("aa".to_string(), ParticipantStatus::ProofValid));
    }
}
