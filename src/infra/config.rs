use std::path::Path;

use serde::Deserialize;

use crate::domain::error::DomainError;

pub const CONFIG_ENV: &str = "MESSENGER_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MessengerConfig {
    pub tables: TableNames,
    pub users: UserModel,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub threads: String,
    pub messages: String,
    pub participants: String,
    pub deleted_messages: String,
    pub deleted_threads: String,
    pub groups: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            threads: "messenger_threads".to_string(),
            messages: "messenger_messages".to_string(),
            participants: "messenger_participants".to_string(),
            deleted_messages: "messenger_deleted_messages".to_string(),
            deleted_threads: "messenger_deleted_threads".to_string(),
            groups: "messenger_groups".to_string(),
        }
    }
}

/// The host application's user table. Read-only from this crate's side.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub table: String,
    pub primary_key: String,
    pub name_columns: Vec<String>,
}

impl Default for UserModel {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            primary_key: "id".to_string(),
            name_columns: vec!["name".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub deleted_message_body: String,
    /// Offset used to decide what "today" means. Server local time when unset.
    pub utc_offset_seconds: Option<i32>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            deleted_message_body: "This message was deleted".to_string(),
            utc_offset_seconds: None,
        }
    }
}

impl MessengerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, DomainError> {
        let config: MessengerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DomainError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reads the file named by `MESSENGER_CONFIG`, or returns the defaults.
    pub fn load() -> Result<Self, DomainError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let t = &self.tables;
        for name in [
            &t.threads,
            &t.messages,
            &t.participants,
            &t.deleted_messages,
            &t.deleted_threads,
            &t.groups,
            &self.users.table,
            &self.users.primary_key,
        ] {
            check_identifier(name)?;
        }

        if self.users.name_columns.is_empty() {
            return Err(DomainError::Config("users.name_columns must not be empty".to_string()));
        }
        for column in &self.users.name_columns {
            check_identifier(column)?;
        }

        if let Some(secs) = self.display.utc_offset_seconds {
            if secs.abs() >= 86_400 {
                return Err(DomainError::Config(format!(
                    "display.utc_offset_seconds out of range: {}",
                    secs
                )));
            }
        }
        Ok(())
    }
}

fn check_identifier(name: &str) -> Result<(), DomainError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::Config(format!("not a valid SQL identifier: '{}'", name)))
    }
}

/// Drivers differ in how they glue name columns together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Sqlite,
    Postgres,
    SqlServer,
    MySql,
}

impl SqlDialect {
    /// Expression yielding `col1 || ' ' || col2 ...` (or the driver's equivalent) aliased as `name`.
    pub fn name_expr(&self, table: &str, columns: &[String]) -> String {
        let qualified: Vec<String> = columns.iter().map(|c| format!("{}.{}", table, c)).collect();
        match self {
            SqlDialect::Sqlite | SqlDialect::Postgres => {
                format!("({}) AS name", qualified.join(" || ' ' || "))
            }
            SqlDialect::SqlServer => format!("({}) AS name", qualified.join(" + ' ' + ")),
            SqlDialect::MySql => format!("concat({}) AS name", qualified.join(", ' ', ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_table_names() {
        let config = MessengerConfig::default();
        assert_eq!(config.tables.threads, "messenger_threads");
        assert_eq!(config.tables.participants, "messenger_participants");
        assert_eq!(config.users.name_columns, vec!["name".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = MessengerConfig::from_toml_str(
            r#"
            [tables]
            threads = "chat_threads"

            [users]
            table = "employees"
            name_columns = ["first_name", "last_name"]

            [display]
            utc_offset_seconds = -10800
            "#,
        )
        .unwrap();

        assert_eq!(config.tables.threads, "chat_threads");
        assert_eq!(config.tables.messages, "messenger_messages");
        assert_eq!(config.users.table, "employees");
        assert_eq!(config.users.primary_key, "id");
        assert_eq!(config.display.utc_offset_seconds, Some(-10800));
        assert_eq!(config.display.deleted_message_body, "This message was deleted");
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let err = MessengerConfig::from_toml_str(
            r#"
            [tables]
            threads = "threads; DROP TABLE users"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn rejects_empty_name_columns() {
        let err = MessengerConfig::from_toml_str("[users]\nname_columns = []\n").unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = MessengerConfig::from_toml_str("[tables\n").unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messenger.toml");
        std::fs::write(&path, "[display]\ndeleted_message_body = \"removed\"\n").unwrap();

        let config = MessengerConfig::from_file(&path).unwrap();
        assert_eq!(config.display.deleted_message_body, "removed");

        let missing = MessengerConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(DomainError::Config(_))));
    }

    #[test]
    fn load_follows_env_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messenger.toml");
        std::fs::write(&path, "[users]\ntable = \"employees\"\n").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        let loaded = MessengerConfig::load();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(loaded.unwrap().users.table, "employees");
        assert_eq!(MessengerConfig::load().unwrap(), MessengerConfig::default());
    }

    #[test]
    fn dialect_name_expressions() {
        let cols = vec!["first_name".to_string(), "last_name".to_string()];
        assert_eq!(
            SqlDialect::Sqlite.name_expr("users", &cols),
            "(users.first_name || ' ' || users.last_name) AS name"
        );
        assert_eq!(
            SqlDialect::SqlServer.name_expr("users", &cols),
            "(users.first_name + ' ' + users.last_name) AS name"
        );
        assert_eq!(
            SqlDialect::MySql.name_expr("users", &cols),
            "concat(users.first_name, ' ', users.last_name) AS name"
        );
        assert_eq!(
            SqlDialect::Postgres.name_expr("users", &["name".to_string()]),
            "(users.name) AS name"
        );
    }
}
