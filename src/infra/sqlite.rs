use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;

use crate::domain::entity::{
    Group, Message, MessageId, NewMessage, NewThread, Participant, ParticipantId, Thread,
    ThreadId, UserId,
};
use crate::domain::error::DomainError;
use crate::domain::repository::{MessageRepository, ParticipantRepository, ThreadRepository};
use crate::infra::config::{MessengerConfig, SqlDialect, TableNames, UserModel};

const MIGRATION_V1: &str = include_str!("migrations/v001.sql");
const MIGRATION_V2: &str = include_str!("migrations/v002.sql");

const THREAD_COLUMNS: &str =
    "t.id, t.subject, t.company_id, t.moderator, t.created_at, t.updated_at, t.deleted_at";

const MESSAGE_COLUMNS: &str = "m.id, m.thread_id, m.user_id, m.to_user_id, m.body, m.attachment, \
     m.file_attachment, m.file_name, m.system_message, m.first_message, m.deleted_for_all, \
     m.parent_id, m.created_at, m.updated_at, m.deleted_at";

const PARTICIPANT_COLUMNS: &str =
    "p.id, p.thread_id, p.user_id, p.moderator, p.last_read, p.created_at, p.updated_at, p.deleted_at";

pub struct Database {
    conn: Connection,
    config: MessengerConfig,
}

impl Database {
    pub fn open(path: &Path, config: &MessengerConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let conn = Connection::open(path)
            .map_err(|e| DomainError::Database(format!("failed to open database: {}", e)))?;

        Self::configure(&conn)?;
        let mut db = Self {
            conn,
            config: config.clone(),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory(config: &MessengerConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::Database(format!("failed to open in-memory database: {}", e))
        })?;

        Self::configure(&conn)?;
        let mut db = Self {
            conn,
            config: config.clone(),
        };
        db.migrate()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| DomainError::Database(format!("failed to configure database: {}", e)))
    }

    fn current_version(&self) -> Result<i64, DomainError> {
        let has_table: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| {
                DomainError::Database(format!("failed to check schema_version table: {}", e))
            })?;

        if !has_table {
            return Ok(0);
        }

        let version: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
                row.get(0)
            })
            .map_err(|e| DomainError::Database(format!("failed to read schema version: {}", e)))?;

        Ok(version)
    }

    fn migrate(&mut self) -> Result<(), DomainError> {
        let version = self.current_version()?;

        if version < 1 {
            self.conn
                .execute_batch(&render_migration(MIGRATION_V1, &self.config.tables))
                .map_err(|e| DomainError::Database(format!("migration v1 failed: {}", e)))?;
            tracing::debug!("applied schema migration v1");
        }

        if version < 2 {
            self.conn
                .execute_batch(&render_migration(MIGRATION_V2, &self.config.tables))
                .map_err(|e| DomainError::Database(format!("migration v2 failed: {}", e)))?;
            tracing::debug!("applied schema migration v2");
        }

        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    pub fn threads(&self) -> SqliteThreadRepository<'_> {
        SqliteThreadRepository::new(&self.conn, &self.config.tables)
    }

    pub fn messages(&self) -> SqliteMessageRepository<'_> {
        SqliteMessageRepository::new(&self.conn, &self.config.tables)
    }

    pub fn participants(&self) -> SqliteParticipantRepository<'_> {
        SqliteParticipantRepository::new(&self.conn, &self.config.tables, &self.config.users)
    }
}

fn render_migration(sql: &str, tables: &TableNames) -> String {
    sql.replace("{threads}", &tables.threads)
        .replace("{messages}", &tables.messages)
        .replace("{participants}", &tables.participants)
        .replace("{deleted_messages}", &tables.deleted_messages)
        .replace("{deleted_threads}", &tables.deleted_threads)
        .replace("{groups}", &tables.groups)
}

fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|ndt| ndt.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_optional_datetime(s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

/// Fixed-width so that SQL text comparison orders timestamps correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// The instant as it will read back from the database.
fn stored(dt: &DateTime<Utc>) -> DateTime<Utc> {
    dt.duration_trunc(Duration::microseconds(1)).unwrap_or(*dt)
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn row_to_thread(row: &rusqlite::Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        subject: row.get(1)?,
        company_id: row.get(2)?,
        moderator: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(5)?)?,
        deleted_at: parse_optional_datetime(row.get(6)?)?,
    })
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        user_id: row.get(2)?,
        to_user_id: row.get(3)?,
        body: row.get(4)?,
        attachment: row.get(5)?,
        file_attachment: row.get(6)?,
        file_name: row.get(7)?,
        system_message: row.get(8)?,
        first_message: row.get(9)?,
        deleted_for_all: row.get(10)?,
        parent_id: row.get(11)?,
        created_at: parse_datetime(&row.get::<_, String>(12)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(13)?)?,
        deleted_at: parse_optional_datetime(row.get(14)?)?,
    })
}

fn row_to_participant(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        user_id: row.get(2)?,
        moderator: row.get(3)?,
        last_read: parse_optional_datetime(row.get(4)?)?,
        created_at: parse_datetime(&row.get::<_, String>(5)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(6)?)?,
        deleted_at: parse_optional_datetime(row.get(7)?)?,
    })
}

// --- Thread Repository ---

pub struct SqliteThreadRepository<'a> {
    conn: &'a Connection,
    tables: &'a TableNames,
}

impl<'a> SqliteThreadRepository<'a> {
    pub fn new(conn: &'a Connection, tables: &'a TableNames) -> Self {
        Self { conn, tables }
    }

    fn query_threads(&self, sql: &str, args: Vec<Value>) -> Result<Vec<Thread>, DomainError> {
        let mut stmt = self.conn.prepare(sql)?;
        let threads = stmt
            .query_map(params_from_iter(args), row_to_thread)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(threads)
    }
}

impl<'a> ThreadRepository for SqliteThreadRepository<'a> {
    fn create(&self, thread: &NewThread, now: &DateTime<Utc>) -> Result<Thread, DomainError> {
        let stamp = format_datetime(now);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (subject, company_id, moderator, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
                    self.tables.threads
                ),
                params![thread.subject, thread.company_id, thread.moderator, stamp],
            )
            .map_err(|e| DomainError::Database(format!("failed to create thread: {}", e)))?;

        Ok(Thread {
            id: self.conn.last_insert_rowid(),
            subject: thread.subject.clone(),
            company_id: thread.company_id,
            moderator: thread.moderator,
            created_at: stored(now),
            updated_at: stored(now),
            deleted_at: None,
        })
    }

    fn find_by_id(&self, id: ThreadId) -> Result<Option<Thread>, DomainError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} t WHERE t.id = ?1 AND t.deleted_at IS NULL",
            THREAD_COLUMNS, self.tables.threads
        ))?;

        let result = stmt.query_row(params![id], row_to_thread);

        match result {
            Ok(thread) => Ok(Some(thread)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_latest(&self) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t WHERE t.deleted_at IS NULL ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads
            ),
            vec![],
        )
    }

    fn find_by_subject(&self, pattern: &str) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t WHERE t.subject LIKE ?1 AND t.deleted_at IS NULL ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads
            ),
            vec![Value::Text(pattern.to_string())],
        )
    }

    fn touch(&self, id: ThreadId, now: &DateTime<Utc>) -> Result<(), DomainError> {
        let affected = self.conn.execute(
            &format!(
                "UPDATE {} SET updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                self.tables.threads
            ),
            params![format_datetime(now), id],
        )?;

        if affected == 0 {
            return Err(DomainError::ThreadNotFound(id));
        }
        Ok(())
    }

    fn soft_delete(&self, id: ThreadId, now: &DateTime<Utc>) -> Result<(), DomainError> {
        let affected = self.conn.execute(
            &format!(
                "UPDATE {} SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                self.tables.threads
            ),
            params![format_datetime(now), id],
        )?;

        if affected == 0 {
            return Err(DomainError::ThreadNotFound(id));
        }
        Ok(())
    }

    fn for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t
                 JOIN {} p ON p.thread_id = t.id
                 WHERE p.user_id = ?1 AND p.deleted_at IS NULL AND t.deleted_at IS NULL
                 ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads, self.tables.participants
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn visible_for_user(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t
                 JOIN {} p ON p.thread_id = t.id
                 WHERE p.user_id = ?1 AND p.deleted_at IS NULL AND t.deleted_at IS NULL
                   AND NOT EXISTS (
                       SELECT 1 FROM {} d WHERE d.thread_id = t.id AND d.user_id = ?1
                   )
                 ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads, self.tables.participants, self.tables.deleted_threads
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn for_user_with_new_messages(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t
                 JOIN {} p ON p.thread_id = t.id
                 WHERE p.user_id = ?1 AND p.deleted_at IS NULL AND t.deleted_at IS NULL
                   AND (p.last_read IS NULL OR t.updated_at > p.last_read)
                 ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads, self.tables.participants
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn between(&self, user_ids: &[UserId]) -> Result<Vec<Thread>, DomainError> {
        let mut ids = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Every active participant must be in the set and every member of the set must participate.
        let sql = format!(
            "SELECT {} FROM {} t
             WHERE t.deleted_at IS NULL AND t.id IN (
                 SELECT p.thread_id FROM {} p
                 WHERE p.deleted_at IS NULL
                 GROUP BY p.thread_id
                 HAVING COUNT(*) = ?1
                    AND SUM(CASE WHEN p.user_id IN ({}) THEN 1 ELSE 0 END) = ?1
             )
             ORDER BY t.updated_at DESC, t.id DESC",
            THREAD_COLUMNS,
            self.tables.threads,
            self.tables.participants,
            placeholders(2, ids.len())
        );

        let mut args = vec![Value::Integer(ids.len() as i64)];
        args.extend(ids.into_iter().map(Value::Integer));
        self.query_threads(&sql, args)
    }

    fn participated_by(&self, user_id: UserId) -> Result<Vec<Thread>, DomainError> {
        self.query_threads(
            &format!(
                "SELECT {} FROM {} t
                 JOIN {} p ON p.thread_id = t.id
                 WHERE p.user_id = ?1 AND t.deleted_at IS NULL
                 ORDER BY t.updated_at DESC, t.id DESC",
                THREAD_COLUMNS, self.tables.threads, self.tables.participants
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn hide_for_user(&self, id: ThreadId, user_id: UserId) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (thread_id, user_id) VALUES (?1, ?2)",
                self.tables.deleted_threads
            ),
            params![id, user_id],
        )?;
        Ok(())
    }

    fn unhide_for_user(&self, id: ThreadId, user_id: UserId) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE thread_id = ?1 AND user_id = ?2",
                self.tables.deleted_threads
            ),
            params![id, user_id],
        )?;
        Ok(())
    }

    fn is_hidden_for(&self, id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        let hidden: bool = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) > 0 FROM {} WHERE thread_id = ?1 AND user_id = ?2",
                self.tables.deleted_threads
            ),
            params![id, user_id],
            |row| row.get(0),
        )?;
        Ok(hidden)
    }

    fn create_group(&self, id: ThreadId, name: &str, now: &DateTime<Utc>) -> Result<Group, DomainError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (thread_id, name, created_at) VALUES (?1, ?2, ?3)",
                    self.tables.groups
                ),
                params![id, name, format_datetime(now)],
            )
            .map_err(|e| DomainError::Database(format!("failed to create group: {}", e)))?;

        Ok(Group {
            id: self.conn.last_insert_rowid(),
            thread_id: id,
            name: name.to_string(),
            created_at: stored(now),
        })
    }

    fn find_group(&self, id: ThreadId) -> Result<Option<Group>, DomainError> {
        let group = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, thread_id, name, created_at FROM {} WHERE thread_id = ?1",
                    self.tables.groups
                ),
                params![id],
                |row| {
                    Ok(Group {
                        id: row.get(0)?,
                        thread_id: row.get(1)?,
                        name: row.get(2)?,
                        created_at: parse_datetime(&row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?;
        Ok(group)
    }
}

// --- Message Repository ---

pub struct SqliteMessageRepository<'a> {
    conn: &'a Connection,
    tables: &'a TableNames,
}

impl<'a> SqliteMessageRepository<'a> {
    pub fn new(conn: &'a Connection, tables: &'a TableNames) -> Self {
        Self { conn, tables }
    }

    fn query_messages(&self, sql: &str, args: Vec<Value>) -> Result<Vec<Message>, DomainError> {
        let mut stmt = self.conn.prepare(sql)?;
        let messages = stmt
            .query_map(params_from_iter(args), row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn query_one(&self, sql: &str, args: Vec<Value>) -> Result<Option<Message>, DomainError> {
        let message = self
            .conn
            .query_row(sql, params_from_iter(args), row_to_message)
            .optional()?;
        Ok(message)
    }

    /// Shared by the listing and the count of a user's unread messages.
    fn unread_clause(&self) -> String {
        format!(
            "FROM {messages} m
             JOIN {threads} t ON t.id = m.thread_id
             JOIN {participants} p ON p.thread_id = m.thread_id AND p.user_id = ?1
             WHERE m.user_id != ?1
               AND m.deleted_at IS NULL
               AND t.deleted_at IS NULL
               AND p.deleted_at IS NULL
               AND (m.to_user_id IS NULL OR m.to_user_id = ?1)
               AND (p.last_read IS NULL OR p.last_read < m.created_at)",
            messages = self.tables.messages,
            threads = self.tables.threads,
            participants = self.tables.participants,
        )
    }
}

impl<'a> MessageRepository for SqliteMessageRepository<'a> {
    fn insert(&self, message: &NewMessage, now: &DateTime<Utc>) -> Result<Message, DomainError> {
        let stamp = format_datetime(now);
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (thread_id, user_id, to_user_id, body, attachment, file_attachment, file_name,
                                     system_message, first_message, deleted_for_all, parent_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)",
                    self.tables.messages
                ),
                params![
                    message.thread_id,
                    message.user_id,
                    message.to_user_id,
                    message.body,
                    message.attachment,
                    message.file_attachment,
                    message.file_name,
                    message.system_message,
                    message.first_message,
                    message.parent_id,
                    stamp,
                ],
            )
            .map_err(|e| DomainError::Database(format!("failed to insert message: {}", e)))?;

        Ok(Message {
            id: self.conn.last_insert_rowid(),
            thread_id: message.thread_id,
            user_id: message.user_id,
            to_user_id: message.to_user_id,
            body: message.body.clone(),
            attachment: message.attachment.clone(),
            file_attachment: message.file_attachment.clone(),
            file_name: message.file_name.clone(),
            system_message: message.system_message,
            first_message: message.first_message,
            deleted_for_all: false,
            parent_id: message.parent_id,
            created_at: stored(now),
            updated_at: stored(now),
            deleted_at: None,
        })
    }

    fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} m WHERE m.id = ?1 AND m.deleted_at IS NULL",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(id)],
        )
    }

    fn find_with_trashed(&self, id: MessageId) -> Result<Option<Message>, DomainError> {
        self.query_one(
            &format!("SELECT {} FROM {} m WHERE m.id = ?1", MESSAGE_COLUMNS, self.tables.messages),
            vec![Value::Integer(id)],
        )
    }

    fn find_by_thread(&self, thread_id: ThreadId, viewer: UserId) -> Result<Vec<Message>, DomainError> {
        self.query_messages(
            &format!(
                "SELECT {} FROM {} m
                 WHERE m.thread_id = ?1 AND m.deleted_at IS NULL
                   AND (m.to_user_id IS NULL OR m.to_user_id = ?2)
                 ORDER BY m.created_at ASC, m.id ASC",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(thread_id), Value::Integer(viewer)],
        )
    }

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Message>, DomainError> {
        self.query_messages(
            &format!(
                "SELECT {} FROM {} m WHERE m.user_id = ?1 AND m.deleted_at IS NULL
                 ORDER BY m.created_at ASC, m.id ASC",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn latest_undeleted(&self, thread_id: ThreadId, viewer: UserId) -> Result<Option<Message>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} m
                 WHERE m.thread_id = ?1 AND m.deleted_at IS NULL AND m.deleted_for_all = 0
                   AND (m.to_user_id IS NULL OR m.to_user_id = ?2)
                   AND NOT EXISTS (SELECT 1 FROM {} d WHERE d.message_id = m.id AND d.user_id = ?2)
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT 1",
                MESSAGE_COLUMNS, self.tables.messages, self.tables.deleted_messages
            ),
            vec![Value::Integer(thread_id), Value::Integer(viewer)],
        )
    }

    fn oldest_with_trashed(&self, thread_id: ThreadId) -> Result<Option<Message>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} m WHERE m.thread_id = ?1 ORDER BY m.created_at ASC, m.id ASC LIMIT 1",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(thread_id)],
        )
    }

    fn first_message(&self, thread_id: ThreadId) -> Result<Option<Message>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} m
                 WHERE m.thread_id = ?1 AND m.first_message = 1 AND m.deleted_at IS NULL
                 ORDER BY m.created_at ASC, m.id ASC LIMIT 1",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(thread_id)],
        )
    }

    fn replies_to(&self, parent_id: MessageId) -> Result<Vec<Message>, DomainError> {
        self.query_messages(
            &format!(
                "SELECT {} FROM {} m WHERE m.parent_id = ?1 AND m.deleted_at IS NULL
                 ORDER BY m.created_at ASC, m.id ASC",
                MESSAGE_COLUMNS, self.tables.messages
            ),
            vec![Value::Integer(parent_id)],
        )
    }

    fn unread_for_user(&self, user_id: UserId) -> Result<Vec<Message>, DomainError> {
        self.query_messages(
            &format!(
                "SELECT {} {} ORDER BY m.created_at ASC, m.id ASC",
                MESSAGE_COLUMNS,
                self.unread_clause()
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn count_unread_for_user(&self, user_id: UserId) -> Result<usize, DomainError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {}", self.unread_clause()),
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn update_body(&self, id: MessageId, body: &str, now: &DateTime<Utc>) -> Result<(), DomainError> {
        let affected = self.conn.execute(
            &format!(
                "UPDATE {} SET body = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
                self.tables.messages
            ),
            params![body, format_datetime(now), id],
        )?;

        if affected == 0 {
            return Err(DomainError::MessageNotFound(id));
        }
        Ok(())
    }

    fn soft_delete(&self, id: MessageId, now: &DateTime<Utc>) -> Result<(), DomainError> {
        let affected = self.conn.execute(
            &format!(
                "UPDATE {} SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                self.tables.messages
            ),
            params![format_datetime(now), id],
        )?;

        if affected == 0 {
            return Err(DomainError::MessageNotFound(id));
        }
        Ok(())
    }

    fn mark_deleted_for_all(&self, id: MessageId, body: &str, now: &DateTime<Utc>) -> Result<(), DomainError> {
        let affected = self.conn.execute(
            &format!(
                "UPDATE {} SET deleted_for_all = 1, body = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
                self.tables.messages
            ),
            params![body, format_datetime(now), id],
        )?;

        if affected == 0 {
            return Err(DomainError::MessageNotFound(id));
        }
        Ok(())
    }

    fn hide_for_user(&self, id: MessageId, user_id: UserId) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (message_id, user_id) VALUES (?1, ?2)",
                self.tables.deleted_messages
            ),
            params![id, user_id],
        )?;
        Ok(())
    }

    fn is_hidden_for(&self, id: MessageId, user_id: UserId) -> Result<bool, DomainError> {
        let hidden: bool = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) > 0 FROM {} WHERE message_id = ?1 AND user_id = ?2",
                self.tables.deleted_messages
            ),
            params![id, user_id],
            |row| row.get(0),
        )?;
        Ok(hidden)
    }
}

// --- Participant Repository ---

pub struct SqliteParticipantRepository<'a> {
    conn: &'a Connection,
    tables: &'a TableNames,
    users: &'a UserModel,
}

impl<'a> SqliteParticipantRepository<'a> {
    pub fn new(conn: &'a Connection, tables: &'a TableNames, users: &'a UserModel) -> Self {
        Self { conn, tables, users }
    }

    fn query_participants(&self, sql: &str, args: Vec<Value>) -> Result<Vec<Participant>, DomainError> {
        let mut stmt = self.conn.prepare(sql)?;
        let participants = stmt
            .query_map(params_from_iter(args), row_to_participant)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    fn query_one(&self, sql: &str, args: Vec<Value>) -> Result<Option<Participant>, DomainError> {
        let participant = self
            .conn
            .query_row(sql, params_from_iter(args), row_to_participant)
            .optional()?;
        Ok(participant)
    }
}

impl<'a> ParticipantRepository for SqliteParticipantRepository<'a> {
    fn find(&self, thread_id: ThreadId, user_id: UserId) -> Result<Option<Participant>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} p WHERE p.thread_id = ?1 AND p.user_id = ?2 AND p.deleted_at IS NULL",
                PARTICIPANT_COLUMNS, self.tables.participants
            ),
            vec![Value::Integer(thread_id), Value::Integer(user_id)],
        )
    }

    fn find_with_trashed(&self, thread_id: ThreadId, user_id: UserId) -> Result<Option<Participant>, DomainError> {
        self.query_one(
            &format!(
                "SELECT {} FROM {} p WHERE p.thread_id = ?1 AND p.user_id = ?2",
                PARTICIPANT_COLUMNS, self.tables.participants
            ),
            vec![Value::Integer(thread_id), Value::Integer(user_id)],
        )
    }

    fn find_by_thread(&self, thread_id: ThreadId) -> Result<Vec<Participant>, DomainError> {
        self.query_participants(
            &format!(
                "SELECT {} FROM {} p WHERE p.thread_id = ?1 AND p.deleted_at IS NULL ORDER BY p.id",
                PARTICIPANT_COLUMNS, self.tables.participants
            ),
            vec![Value::Integer(thread_id)],
        )
    }

    fn find_by_thread_except(&self, thread_id: ThreadId, user_id: UserId) -> Result<Vec<Participant>, DomainError> {
        self.query_participants(
            &format!(
                "SELECT {} FROM {} p
                 WHERE p.thread_id = ?1 AND p.user_id != ?2 AND p.deleted_at IS NULL
                 ORDER BY p.id",
                PARTICIPANT_COLUMNS, self.tables.participants
            ),
            vec![Value::Integer(thread_id), Value::Integer(user_id)],
        )
    }

    fn find_by_user(&self, user_id: UserId) -> Result<Vec<Participant>, DomainError> {
        self.query_participants(
            &format!(
                "SELECT {} FROM {} p WHERE p.user_id = ?1 AND p.deleted_at IS NULL ORDER BY p.id",
                PARTICIPANT_COLUMNS, self.tables.participants
            ),
            vec![Value::Integer(user_id)],
        )
    }

    fn exists(&self, thread_id: ThreadId, user_id: UserId) -> Result<bool, DomainError> {
        let exists: bool = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) > 0 FROM {} WHERE thread_id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
                self.tables.participants
            ),
            params![thread_id, user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert(&self, thread_id: ThreadId, user_id: UserId, now: &DateTime<Utc>) -> Result<Participant, DomainError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (thread_id, user_id, moderator, created_at, updated_at) VALUES (?1, ?2, 0, ?3, ?3)",
                    self.tables.participants
                ),
                params![thread_id, user_id, format_datetime(now)],
            )
            .map_err(|e| DomainError::Database(format!("failed to insert participant: {}", e)))?;

        Ok(Participant {
            id: self.conn.last_insert_rowid(),
            thread_id,
            user_id,
            moderator: false,
            last_read: None,
            created_at: stored(now),
            updated_at: stored(now),
            deleted_at: None,
        })
    }

    fn restore(&self, id: ParticipantId, now: &DateTime<Utc>) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
                self.tables.participants
            ),
            params![format_datetime(now), id],
        )?;
        Ok(())
    }

    fn restore_all(&self, thread_id: ThreadId, now: &DateTime<Utc>) -> Result<usize, DomainError> {
        Ok(self.conn.execute(
            &format!(
                "UPDATE {} SET deleted_at = NULL, updated_at = ?1 WHERE thread_id = ?2 AND deleted_at IS NOT NULL",
                self.tables.participants
            ),
            params![format_datetime(now), thread_id],
        )?)
    }

    fn soft_delete_users(&self, thread_id: ThreadId, user_ids: &[UserId], now: &DateTime<Utc>) -> Result<usize, DomainError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE {} SET deleted_at = ?1, updated_at = ?1
             WHERE thread_id = ?2 AND deleted_at IS NULL AND user_id IN ({})",
            self.tables.participants,
            placeholders(3, user_ids.len())
        );

        let mut args = vec![Value::Text(format_datetime(now)), Value::Integer(thread_id)];
        args.extend(user_ids.iter().copied().map(Value::Integer));
        Ok(self.conn.execute(&sql, params_from_iter(args))?)
    }

    fn set_moderator(&self, id: ParticipantId, moderator: bool, now: &DateTime<Utc>) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET moderator = ?1, updated_at = ?2 WHERE id = ?3",
                self.tables.participants
            ),
            params![moderator, format_datetime(now), id],
        )?;
        Ok(())
    }

    fn set_last_read(&self, id: ParticipantId, at: &DateTime<Utc>) -> Result<(), DomainError> {
        self.conn.execute(
            &format!(
                "UPDATE {} SET last_read = ?1, updated_at = ?1 WHERE id = ?2",
                self.tables.participants
            ),
            params![format_datetime(at), id],
        )?;
        Ok(())
    }

    fn user_ids_with_trashed(&self, thread_id: ThreadId) -> Result<Vec<UserId>, DomainError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT user_id FROM {} WHERE thread_id = ?1 ORDER BY id",
            self.tables.participants
        ))?;
        let ids = stmt
            .query_map(params![thread_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn display_names(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<Vec<String>, DomainError> {
        let users = &self.users.table;
        let pk = &self.users.primary_key;
        let mut sql = format!(
            "SELECT {} FROM {} JOIN {} p ON {}.{} = p.user_id WHERE p.thread_id = ?1",
            SqlDialect::Sqlite.name_expr(users, &self.users.name_columns),
            users,
            self.tables.participants,
            users,
            pk
        );
        let mut args = vec![Value::Integer(thread_id)];
        if let Some(user_id) = exclude {
            sql.push_str(&format!(" AND {}.{} != ?2", users, pk));
            args.push(Value::Integer(user_id));
        }
        sql.push_str(" ORDER BY p.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map(params_from_iter(args), |row| row.get::<_, Option<String>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.into_iter().map(Option::unwrap_or_default).collect())
    }

    fn user_ids_except(&self, thread_id: ThreadId, exclude: Option<UserId>) -> Result<Vec<UserId>, DomainError> {
        let users = &self.users.table;
        let pk = &self.users.primary_key;
        let mut sql = format!(
            "SELECT p.user_id FROM {} JOIN {} p ON {}.{} = p.user_id WHERE p.thread_id = ?1",
            users, self.tables.participants, users, pk
        );
        let mut args = vec![Value::Integer(thread_id)];
        if let Some(user_id) = exclude {
            sql.push_str(" AND p.user_id != ?2");
            args.push(Value::Integer(user_id));
        }
        sql.push_str(" ORDER BY p.id");

        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(args), |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
