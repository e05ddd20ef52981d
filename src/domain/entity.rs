use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ThreadId = i64;
pub type MessageId = i64;
pub type ParticipantId = i64;
pub type UserId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub subject: String,
    pub company_id: Option<i64>,
    pub moderator: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewThread {
    pub subject: String,
    pub company_id: Option<i64>,
    pub moderator: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub to_user_id: Option<UserId>,
    pub body: String,
    pub attachment: Option<String>,
    pub file_attachment: Option<String>,
    pub file_name: Option<String>,
    pub system_message: bool,
    pub first_message: bool,
    pub deleted_for_all: bool,
    pub parent_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Direct messages (`to_user_id` set) are only visible to their addressee.
    pub fn is_visible_to(&self, user_id: UserId) -> bool {
        self.to_user_id.map_or(true, |to| to == user_id)
    }
}

/// Fields supplied by the caller when posting a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMessage {
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub body: String,
    pub to_user_id: Option<UserId>,
    pub attachment: Option<String>,
    pub file_attachment: Option<String>,
    pub file_name: Option<String>,
    pub system_message: bool,
    pub first_message: bool,
    pub parent_id: Option<MessageId>,
}

impl NewMessage {
    pub fn text(thread_id: ThreadId, user_id: UserId, body: &str) -> Self {
        Self {
            thread_id,
            user_id,
            body: body.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub moderator: bool,
    pub last_read: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The single unread rule: anything stamped after `last_read` is unread,
    /// and everything is unread when the participant never read the thread.
    pub fn has_unread_since(&self, at: &DateTime<Utc>) -> bool {
        self.last_read.map_or(true, |read| *at > read)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub thread_id: ThreadId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A thread together with the fields derived for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    #[serde(flatten)]
    pub thread: Thread,
    pub last_message_text: String,
    pub last_message_timestamp: DateTime<Utc>,
    pub last_message_at: String,
    pub unread_messages: usize,
    pub participants_string: String,
    pub participants_id: Vec<UserId>,
    /// 1 when the viewer can see at least one message, else 0.
    pub qtd_messages: u8,
    pub is_group: bool,
    pub is_emoji: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn participant(last_read: Option<DateTime<Utc>>) -> Participant {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Participant {
            id: 1,
            thread_id: 1,
            user_id: 7,
            moderator: false,
            last_read,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[test]
    fn never_read_means_everything_unread() {
        let p = participant(None);
        let at = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        assert!(p.has_unread_since(&at));
    }

    #[test]
    fn unread_is_strictly_after_last_read() {
        let read = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let p = participant(Some(read));
        assert!(!p.has_unread_since(&read));
        assert!(!p.has_unread_since(&(read - chrono::Duration::seconds(1))));
        assert!(p.has_unread_since(&(read + chrono::Duration::seconds(1))));
    }

    #[test]
    fn direct_message_visibility() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let mut msg = Message {
            id: 1,
            thread_id: 1,
            user_id: 1,
            to_user_id: None,
            body: "hi".into(),
            attachment: None,
            file_attachment: None,
            file_name: None,
            system_message: false,
            first_message: false,
            deleted_for_all: false,
            parent_id: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        };
        assert!(msg.is_visible_to(2));
        msg.to_user_id = Some(3);
        assert!(!msg.is_visible_to(2));
        assert!(msg.is_visible_to(3));
    }
}
