// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The send loop: one queued record per tick, fanned out to every member.

use pollgate_core::{ChatId, DeliveryMapping, PollgateError, Record, RecordId, RecordStatus};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::Coordinator;

/// What a single send tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No chat is subscribed.
    NoMembers,
    /// Nothing is queued.
    Idle,
    /// The record expired or was already answered and left the queue.
    Retired(RecordId),
    /// The record was offered to members; `delivered` polls went out.
    Offered { id: RecordId, delivered: usize },
}

impl Coordinator {
    pub(crate) async fn run_send_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.send_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => {
                    debug!("send loop stopping");
                    break;
                }
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "send tick failed");
            }
        }
    }

    /// Runs one send cycle.
    ///
    /// Takes the head of the request queue, sends its poll to every member that
    /// has not received it yet, records a delivery mapping for each poll that
    /// went out, and puts the id back at the tail. A chat whose send fails loses
    /// its session.
    pub async fn tick(&self) -> Result<TickOutcome, PollgateError> {
        let members = self.sessions.members().await?;
        if members.is_empty() {
            return Ok(TickOutcome::NoMembers);
        }

        let queue = self.service.queue().clone();
        let Some(id) = queue.checkout() else {
            return Ok(TickOutcome::Idle);
        };

        let record = match self.service.get(&id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                debug!(request_id = %id, "record expired, dropping from queue");
                queue.complete(&id);
                return Ok(TickOutcome::Retired(id));
            }
            Err(e) => {
                queue.release(&id);
                return Err(e);
            }
        };
        if record.is_done() {
            return self.retire_answered(id).await;
        }

        let mut delivered = 0;
        for chat_id in members {
            match self.offer(&record, chat_id).await {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(request_id = %id, chat_id = %chat_id, error = %e, "delivery failed")
                }
            }
        }

        let settled = if delivered > 0 {
            self.settle_after_delivery(&id).await
        } else {
            Ok(())
        };
        queue.release(&id);
        settled?;
        Ok(TickOutcome::Offered { id, delivered })
    }

    /// Drops an answered record from the queue once no delivery of it is left.
    ///
    /// Deliveries normally go when the answer is handled; whatever survived a
    /// failed withdrawal there is withdrawn and stopped here. If that fails
    /// too, the id goes back to the queue for the next round.
    async fn retire_answered(&self, id: RecordId) -> Result<TickOutcome, PollgateError> {
        let queue = self.service.queue();
        let leftovers = match self.index.withdraw_all(&id).await {
            Ok(leftovers) => leftovers,
            Err(e) => {
                queue.release(&id);
                return Err(e);
            }
        };
        queue.complete(&id);
        if !leftovers.is_empty() {
            info!(request_id = %id, polls = leftovers.len(), "stopping leftover polls of answered record");
        }
        for mapping in leftovers {
            self.stop_quietly(mapping.chat_id, mapping.message_id).await;
        }
        Ok(TickOutcome::Retired(id))
    }

    /// Sends the record's poll to one chat unless it already has it.
    ///
    /// Returns whether a new delivery was recorded.
    async fn offer(&self, record: &Record, chat_id: ChatId) -> Result<bool, PollgateError> {
        if self.index.has_delivered(&record.id, chat_id).await? {
            return Ok(false);
        }
        // Mappings are withdrawn once the record is answered; do not resend then.
        if self.service.get(&record.id).await?.is_done() {
            return Ok(false);
        }

        let sent = match self
            .transport
            .send_poll(chat_id, &record.task.message, &record.task.buttons)
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                warn!(chat_id = %chat_id, error = %e, "send_poll failed, revoking session");
                self.sessions.revoke(chat_id).await?;
                return Ok(false);
            }
        };

        let mapping = DeliveryMapping {
            request_id: record.id.clone(),
            chat_id,
            poll_id: sent.poll_id.clone(),
            message_id: sent.message_id,
            delivered_at: chrono::Utc::now(),
        };
        match self.index.record_delivery(&mapping).await {
            Ok(()) => {
                debug!(request_id = %record.id, chat_id = %chat_id, poll_id = %sent.poll_id, "poll delivered");
                Ok(true)
            }
            Err(e) => {
                // The poll is out but unmapped, so an answer to it could not be resolved.
                self.stop_quietly(chat_id, sent.message_id).await;
                if e.is_already_recorded() {
                    info!(request_id = %record.id, chat_id = %chat_id, "delivery already done");
                    return Ok(false);
                }
                Err(e)
            }
        }
    }

    /// Moves a freshly delivered record to `Delivering`, or, if an answer
    /// resolved it while polls were going out, withdraws the new polls.
    async fn settle_after_delivery(&self, id: &RecordId) -> Result<(), PollgateError> {
        let gate = self.write_gate.lock().await;
        let mut record = match self.service.get(id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };

        match record.status {
            RecordStatus::Pending => {
                record.mark_delivering();
                self.service.save(&record).await
            }
            RecordStatus::Delivering => Ok(()),
            RecordStatus::Done => {
                let stragglers = self.index.withdraw_all(id).await?;
                self.service.queue().complete(id);
                drop(gate);
                for mapping in stragglers {
                    self.stop_quietly(mapping.chat_id, mapping.message_id).await;
                }
                Ok(())
            }
        }
    }

    /// Best-effort `stop_poll`.
    pub(crate) async fn stop_quietly(&self, chat_id: ChatId, message_id: i32) {
        if let Err(e) = self.transport.stop_poll(chat_id, message_id).await {
            warn!(chat_id = %chat_id, message_id, error = %e, "failed to stop poll");
        }
    }
}

#[cfg(test)]
mod tests {
    use pollgate_test_utils::TestHarness;

    use super::*;

    fn coordinator(h: &TestHarness) -> Coordinator {
        Coordinator::new(h.transport.clone(), &h.backend, h.service.clone(), &h.config)
    }

    async fn harness(members: &[i64]) -> TestHarness {
        TestHarness::builder()
            .with_members(members)
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn no_members_skips_tick() {
        let h = harness(&[]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);

        assert_eq!(c.tick().await.unwrap(), TickOutcome::NoMembers);
        assert!(h.transport.sent_polls().await.is_empty());
        assert!(h.service.queue().contains(&record.id));
    }

    #[tokio::test]
    async fn empty_queue_is_idle() {
        let h = harness(&[1]).await;
        assert_eq!(coordinator(&h).tick().await.unwrap(), TickOutcome::Idle);
    }

    #[tokio::test]
    async fn delivers_to_every_member_and_marks_delivering() {
        let h = harness(&[1, 2]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();

        let outcome = coordinator(&h).tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Offered {
                id: record.id.clone(),
                delivered: 2
            }
        );

        let polls = h.transport.sent_polls().await;
        assert_eq!(polls.len(), 2);
        assert_eq!(polls[0].question, "Pick");
        assert_eq!(polls[0].options, vec!["A".to_string(), "B".to_string()]);

        for chat in [1, 2] {
            assert!(h.backend.index.has_delivered(&record.id, ChatId(chat)).await.unwrap());
        }
        let stored = h.record(&record.id).await.unwrap();
        assert_eq!(stored.status, RecordStatus::Delivering);
        assert!(stored.updated_at >= record.updated_at);
        assert!(h.service.queue().contains(&record.id));
    }

    #[tokio::test]
    async fn repeated_ticks_deliver_at_most_once_per_chat() {
        let h = harness(&[1, 2]).await;
        h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);

        for _ in 0..5 {
            c.tick().await.unwrap();
        }
        assert_eq!(h.transport.polls_to(ChatId(1)).await.len(), 1);
        assert_eq!(h.transport.polls_to(ChatId(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn late_member_gets_existing_record() {
        let h = harness(&[1]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);
        c.tick().await.unwrap();

        h.admit(2).await.unwrap();
        assert_eq!(
            c.tick().await.unwrap(),
            TickOutcome::Offered {
                id: record.id,
                delivered: 1
            }
        );
        assert_eq!(h.transport.polls_to(ChatId(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_send_revokes_session_without_mapping() {
        let h = harness(&[1, 2]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        h.transport.fail_chat(ChatId(2)).await;

        coordinator(&h).tick().await.unwrap();

        assert_eq!(h.members().await.unwrap(), vec![ChatId(1)]);
        assert!(!h.backend.index.has_delivered(&record.id, ChatId(2)).await.unwrap());
        assert!(h.backend.index.has_delivered(&record.id, ChatId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn all_sends_failing_leaves_record_pending() {
        let h = harness(&[1]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        h.transport.fail_chat(ChatId(1)).await;

        coordinator(&h).tick().await.unwrap();

        assert_eq!(h.record(&record.id).await.unwrap().status, RecordStatus::Pending);
        assert!(h.members().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn done_record_leaves_queue_without_sending() {
        let h = harness(&[1]).await;
        let mut record = h.submit("Pick", &["A", "B"]).await.unwrap();
        record.resolve(0).unwrap();
        h.service.save(&record).await.unwrap();

        let outcome = coordinator(&h).tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Retired(record.id.clone()));
        assert!(!h.service.queue().contains(&record.id));
        assert!(h.transport.sent_polls().await.is_empty());
    }

    #[tokio::test]
    async fn expired_record_leaves_queue() {
        let h = harness(&[1]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        h.backend.store.delete(&record.id).await.unwrap();
        h.service.invalidate(&record.id).await;

        let outcome = coordinator(&h).tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::Retired(record.id.clone()));
        assert!(!h.service.queue().contains(&record.id));
    }

    #[tokio::test]
    async fn ticks_rotate_through_pending_records() {
        let h = harness(&[1, 2]).await;
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(h.submit(&format!("Q{i}"), &["A", "B"]).await.unwrap().id);
        }
        let c = coordinator(&h);
        for _ in 0..ids.len() {
            c.tick().await.unwrap();
        }

        for id in &ids {
            for chat in [1, 2] {
                assert!(h.backend.index.has_delivered(id, ChatId(chat)).await.unwrap());
            }
        }
        assert_eq!(h.transport.sent_polls().await.len(), 8);
    }

    #[tokio::test]
    async fn answer_during_fan_out_withdraws_new_polls() {
        let h = harness(&[1]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);
        c.tick().await.unwrap();

        // The answer loop resolves and withdraws while a poll to chat 2 is in flight.
        let mut done = h.record(&record.id).await.unwrap();
        done.resolve(1).unwrap();
        h.service.save(&done).await.unwrap();
        h.backend.index.withdraw_all(&record.id).await.unwrap();
        let late = DeliveryMapping {
            request_id: record.id.clone(),
            chat_id: ChatId(2),
            poll_id: "late-poll".into(),
            message_id: 77,
            delivered_at: chrono::Utc::now(),
        };
        h.backend.index.record_delivery(&late).await.unwrap();

        c.settle_after_delivery(&record.id).await.unwrap();

        assert_eq!(h.transport.stop_calls().await, vec![(ChatId(2), 77)]);
        assert!(!h.backend.index.has_delivered(&record.id, ChatId(2)).await.unwrap());
        assert_eq!(h.record(&record.id).await.unwrap().status, RecordStatus::Done);
        assert!(!h.service.queue().contains(&record.id));
    }

    #[tokio::test]
    async fn offer_skips_answered_record() {
        let h = harness(&[1]).await;
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let mut done = record.clone();
        done.resolve(0).unwrap();
        h.service.save(&done).await.unwrap();

        assert!(!coordinator(&h).offer(&record, ChatId(1)).await.unwrap());
        assert!(h.transport.sent_polls().await.is_empty());
    }

    #[tokio::test]
    async fn failed_settle_keeps_record_in_rotation() {
        let h = TestHarness::builder()
            .with_faults()
            .with_members(&[1])
            .build()
            .await
            .unwrap();
        let record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);

        h.faults().fail_next_puts(1);
        assert!(c.tick().await.is_err());
        assert_eq!(h.service.queue().len(), 1);

        h.admit(2).await.unwrap();
        assert_eq!(
            c.tick().await.unwrap(),
            TickOutcome::Offered {
                id: record.id.clone(),
                delivered: 1
            }
        );
        assert_eq!(h.transport.polls_to(ChatId(1)).await.len(), 1);
        assert_eq!(h.transport.polls_to(ChatId(2)).await.len(), 1);
        assert_eq!(h.record(&record.id).await.unwrap().status, RecordStatus::Delivering);
    }

    #[tokio::test]
    async fn answered_record_with_leftover_mappings_is_cleaned_up() {
        let h = harness(&[1, 2]).await;
        let mut record = h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);
        c.tick().await.unwrap();
        let c2 = h.transport.polls_to(ChatId(2)).await.remove(0);

        // Resolved, but the mappings were never withdrawn.
        record = h.record(&record.id).await.unwrap();
        record.resolve(0).unwrap();
        h.service.save(&record).await.unwrap();

        assert_eq!(c.tick().await.unwrap(), TickOutcome::Retired(record.id.clone()));
        assert!(h.transport.stop_calls().await.contains(&(ChatId(2), c2.message_id)));
        for chat in [1, 2] {
            assert!(!h.backend.index.has_delivered(&record.id, ChatId(chat)).await.unwrap());
        }
        assert!(!h.service.queue().contains(&record.id));
    }

    #[tokio::test]
    async fn send_loop_stops_on_cancel() {
        let h = harness(&[1]).await;
        h.submit("Pick", &["A", "B"]).await.unwrap();
        let c = coordinator(&h);
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let c = c.clone();
            let cancel = cancel.clone();
            async move { c.run_send_loop(cancel).await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(h.transport.polls_to(ChatId(1)).await.len(), 1);
    }
}
