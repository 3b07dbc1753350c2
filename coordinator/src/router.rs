use tracing::{info, warn};

use zkpool_lib::{Frame, MessageType, ProofStatus, ProofSubmission, TaskStatus};
use zkpool_taskdb::{TaskStoreError, TaskStoreResult};

use crate::{metrics, Coordinator, CoordinatorError, ParticipantStatus, Session};

impl Coordinator {
    /// Decode an inbound frame and route it.
    ///
    /// `Register` and `BlockTrace` only ever travel coordinator -> prover;
    /// receiving one here is a protocol violation.
    pub async fn handle_message(
        &self,
        from: &str,
        frame: Frame,
    ) -> Result<(), CoordinatorError> {
        let message_type = MessageType::try_from(frame.message_type)
            .map_err(|_| CoordinatorError::UnknownMessageType(frame.message_type))?;
        match message_type {
            MessageType::Error => {
                // Reserved for future failure accounting.
                let detail = String::from_utf8_lossy(&frame.payload).into_owned();
                warn!(prover = %from, %detail, "prover reported an error");
                Ok(())
            }
            MessageType::Register | MessageType::BlockTrace => {
                Err(CoordinatorError::ProtocolViolation(message_type))
            }
            MessageType::Proof => {
                let submission: ProofSubmission = frame.decode_payload()?;
                self.handle_proof(from, submission).await
            }
        }
    }

    /// Handle one proof submission.
    ///
    /// The session table read lock is held for the entire handler,
    /// including the finish-signal send at the end: the collector takes the
    /// write lock to tear a session down, so a submission in flight can
    /// never be delivered to a destroyed channel.
    pub async fn handle_proof(
        &self,
        from: &str,
        submission: ProofSubmission,
    ) -> Result<(), CoordinatorError> {
        let table = self.sessions.read().await;
        let session = table
            .get(submission.id)
            .ok_or(CoordinatorError::NoSuchSession(submission.id))?
            .clone();
        let proof_time_sec = session.elapsed_secs();

        match session.participant_status(from) {
            None => {
                return Err(CoordinatorError::NotAParticipant {
                    id: submission.id,
                    identity: from.to_string(),
                })
            }
            Some(ParticipantStatus::ProofValid) => {
                // Idempotent re-delivery; a second success must not touch
                // any state.
                warn!(id = submission.id, prover = %from, "duplicate proof submission ignored");
                return Ok(());
            }
            Some(_) => {}
        }

        let mut success = false;
        let mut store_error: Option<TaskStoreError> = None;

        if submission.status == ProofStatus::Error {
            let reason = submission
                .error
                .clone()
                .unwrap_or_else(|| "prover reported failure".to_string());
            info!(id = submission.id, prover = %from, %reason, "prover reported proof failure");
            match self.store.set_status(submission.id, TaskStatus::Failed).await {
                Ok(()) => self.failed_sessions.record(&session, &reason),
                Err(err) => store_error = Some(err),
            }
        } else {
            match self
                .settle_submission(&session, &submission, proof_time_sec)
                .await
            {
                Ok(valid) => success = valid,
                Err(err) => store_error = Some(err),
            }
        }

        if store_error.is_some() {
            // Best-effort rollback so the dispatcher can hand the task out
            // again on a later tick.
            if let Err(err) = self
                .store
                .set_status(submission.id, TaskStatus::Unassigned)
                .await
            {
                warn!(id = submission.id, %err, "rollback to unassigned failed");
            }
        }

        let verdict = if success && store_error.is_none() {
            ParticipantStatus::ProofValid
        } else {
            ParticipantStatus::ProofInvalid
        };
        if !session.finish(from.to_string(), verdict) {
            warn!(id = submission.id, "finish signal buffer full; verdict dropped");
        }
        metrics::observe_proof_received(match verdict {
            ParticipantStatus::ProofValid => "valid",
            _ => "invalid",
        });

        match store_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Persist a successful submission and verify it.
    ///
    /// Returns whether the proof verified; verifier *errors* are recorded
    /// and count as invalid, unlike a clean negative verdict. Every store
    /// error propagates so the caller can roll the task back.
    async fn settle_submission(
        &self,
        session: &Session,
        submission: &ProofSubmission,
        proof_time_sec: u64,
    ) -> TaskStoreResult<bool> {
        self.store
            .set_proof(
                submission.id,
                &submission.proof,
                &submission.final_pair,
                proof_time_sec,
            )
            .await?;
        self.store
            .set_status(submission.id, TaskStatus::Proved)
            .await?;

        let success = match &self.verifier {
            None => true,
            Some(verifier) => {
                // Re-fetch so the verifier sees exactly what was persisted.
                let task = self
                    .store
                    .fetch_by_id(submission.id)
                    .await?
                    .ok_or(TaskStoreError::NotFound(submission.id))?;
                match verifier.verify(&task, &submission.proof).await {
                    Ok(valid) => valid,
                    Err(err) => {
                        // TODO: return the error and leave the task
                        // assigned for retry instead of failing it.
                        warn!(id = submission.id, %err, "proof verification errored");
                        self.failed_sessions.record(session, &err.to_string());
                        false
                    }
                }
            }
        };

        let final_status = if success {
            TaskStatus::Verified
        } else {
            TaskStatus::Failed
        };
        self.store.set_status(submission.id, final_status).await?;
        Ok(success)
    }
}
