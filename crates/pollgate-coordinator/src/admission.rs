// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat admission: allow-listed users subscribe their chat by messaging the bot.

use pollgate_core::{ChatMessage, PollgateError, Sender};
use tracing::{info, warn};

use crate::Coordinator;

/// Reply sent when a chat is admitted.
pub const ACCESS_GRANTED: &str = "You have access granted";

/// Checks whether a sender is on the allow-list.
///
/// Entries match the numeric user id or the username, with or without a
/// leading `@`, case-insensitively. An empty list authorizes nobody.
pub fn is_authorized(sender: &Sender, allowed_users: &[String]) -> bool {
    if allowed_users.is_empty() {
        return false;
    }

    let user_id_str = sender.id.to_string();

    for allowed in allowed_users {
        if *allowed == user_id_str {
            return true;
        }
        if let Some(ref username) = sender.username {
            let allowed_clean = allowed.strip_prefix('@').unwrap_or(allowed);
            if username.eq_ignore_ascii_case(allowed_clean) {
                return true;
            }
        }
    }

    false
}

/// Text of the rejection reply.
pub fn access_denied(sender: Option<&Sender>) -> String {
    match sender {
        Some(s) => format!("User {} does not have access", s.id),
        None => "User unknown does not have access".to_string(),
    }
}

impl Coordinator {
    /// Admits the message's chat if its sender is allow-listed, and replies either way.
    ///
    /// Returns whether the chat is now a member.
    pub async fn handle_chat_message(&self, msg: &ChatMessage) -> Result<bool, PollgateError> {
        let authorized = msg
            .sender
            .as_ref()
            .is_some_and(|s| is_authorized(s, &self.allowed_users));

        let admitted = if authorized {
            match self.sessions.admit(msg.chat_id).await {
                Ok(new) => {
                    info!(chat_id = %msg.chat_id, new, "chat admitted");
                    true
                }
                Err(e) => {
                    warn!(chat_id = %msg.chat_id, error = %e, "could not store session");
                    false
                }
            }
        } else {
            info!(
                chat_id = %msg.chat_id,
                sender_id = msg.sender.as_ref().map(|s| s.id),
                "access denied"
            );
            false
        };

        let reply = if admitted {
            ACCESS_GRANTED.to_string()
        } else {
            access_denied(msg.sender.as_ref())
        };
        self.transport.send_message(msg.chat_id, &reply).await?;
        Ok(admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollgate_core::ChatId;
    use pollgate_test_utils::TestHarness;
    use tracing_test::traced_test;

    fn sender(id: u64, username: Option<&str>) -> Sender {
        Sender {
            id,
            username: username.map(String::from),
        }
    }

    #[test]
    fn authorized_by_id() {
        assert!(is_authorized(&sender(12345, None), &["12345".into()]));
    }

    #[test]
    fn authorized_by_username() {
        let s = sender(12345, Some("testuser"));
        assert!(is_authorized(&s, &["testuser".into()]));
        assert!(is_authorized(&s, &["@testuser".into()]));
    }

    #[test]
    fn authorized_by_username_case_insensitive() {
        assert!(is_authorized(&sender(12345, Some("TestUser")), &["@testuser".into()]));
    }

    #[test]
    fn not_authorized_wrong_user() {
        assert!(!is_authorized(&sender(12345, Some("testuser")), &["99999".into()]));
    }

    #[test]
    fn empty_allow_list_rejects_everyone() {
        assert!(!is_authorized(&sender(12345, Some("testuser")), &[]));
    }

    #[test]
    fn username_entry_does_not_match_missing_username() {
        assert!(!is_authorized(&sender(12345, None), &["@testuser".into()]));
    }

    #[tokio::test]
    async fn allowed_sender_is_admitted_and_greeted() {
        let h = TestHarness::builder()
            .with_allowed_users(&["@alice"])
            .build()
            .await
            .unwrap();
        let c = Coordinator::new(h.transport.clone(), &h.backend, h.service.clone(), &h.config);

        let msg = ChatMessage {
            chat_id: ChatId(10),
            sender: Some(sender(42, Some("Alice"))),
            text: Some("/start".into()),
        };
        assert!(c.handle_chat_message(&msg).await.unwrap());
        assert_eq!(h.members().await.unwrap(), vec![ChatId(10)]);
        assert_eq!(
            h.transport.sent_messages().await,
            vec![(ChatId(10), ACCESS_GRANTED.to_string())]
        );

        // A second greeting keeps the chat subscribed once.
        assert!(c.handle_chat_message(&msg).await.unwrap());
        assert_eq!(h.members().await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn stranger_is_rejected() {
        let h = TestHarness::builder()
            .with_allowed_users(&["12345"])
            .build()
            .await
            .unwrap();
        let c = Coordinator::new(h.transport.clone(), &h.backend, h.service.clone(), &h.config);

        let msg = ChatMessage {
            chat_id: ChatId(11),
            sender: Some(sender(777, None)),
            text: Some("hi".into()),
        };
        assert!(!c.handle_chat_message(&msg).await.unwrap());
        assert!(h.members().await.unwrap().is_empty());
        assert_eq!(
            h.transport.sent_messages().await,
            vec![(ChatId(11), "User 777 does not have access".to_string())]
        );
        assert!(logs_contain("access denied"));
    }

    #[test]
    fn denial_without_sender() {
        assert_eq!(access_denied(None), "User unknown does not have access");
    }
}
