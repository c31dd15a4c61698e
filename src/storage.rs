use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

/// Flat string key-value store holding user preferences.
///
/// No schema is enforced here; typed parsing and validation live in
/// [`crate::prefs`]. Writes are independent, there are no transactions.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn entries(&self) -> Vec<(String, String)>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }

    fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        entries
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", &5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM prefs WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("storage: query preference")
    }

    fn list(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key, value FROM prefs ORDER BY key ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl PreferenceStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.read(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "preference read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO prefs (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )
        .with_context(|| format!("storage: write preference {key}"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM prefs WHERE key = ?1", params![key])
            .with_context(|| format!("storage: delete preference {key}"))?;
        Ok(())
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.list().unwrap_or_else(|err| {
            warn!(error = %err, "preference listing failed");
            Vec::new()
        })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let migrations = migrations();
    for (idx, sql) in migrations.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS prefs (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("yt-optimize").join("prefs.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let store = SqliteStore::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn sqlite_set_overwrites_and_remove_clears() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(Options {
            path: Some(dir.path().join("prefs.db")),
        })
        .unwrap();

        assert_eq!(store.get("yt-default-quality"), None);
        store.set("yt-default-quality", "hd720").unwrap();
        store.set("yt-default-quality", "hd1440").unwrap();
        assert_eq!(store.get("yt-default-quality").as_deref(), Some("hd1440"));

        store.remove("yt-default-quality").unwrap();
        assert_eq!(store.get("yt-default-quality"), None);
    }

    #[test]
    fn sqlite_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.db");
        let store = SqliteStore::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        store.set("yt-default-speed", "1.5").unwrap();
        store.close().unwrap();

        let reopened = SqliteStore::open(Options { path: Some(path) }).unwrap();
        assert_eq!(reopened.get("yt-default-speed").as_deref(), Some("1.5"));
        assert_eq!(
            reopened.entries(),
            vec![("yt-default-speed".to_string(), "1.5".to_string())]
        );
    }

    #[test]
    fn memory_entries_are_sorted() {
        let store = MemoryStore::with_entries([("b", "2"), ("a", "1")]);
        assert_eq!(
            store.entries(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }
}
