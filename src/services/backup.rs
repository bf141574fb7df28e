//! Backup service
//!
//! Writes JSON snapshots of every table to the backup directory and
//! restores them. File names are `backup_YYYYMMDD_HHMMSS_mmm.json`, with a
//! `_N` suffix when two backups land in the same millisecond.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::database::repositories::BackupRepository;
use crate::utils::errors::{ShopError, Result};

const BACKUP_FORMAT_VERSION: u32 = 1;
const MAX_NAME_ATTEMPTS: u32 = 100;

/// On-disk snapshot layout
#[derive(Debug, Serialize, Deserialize)]
pub struct BackupFile {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub tables: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Clone)]
pub struct BackupService {
    backup_repository: BackupRepository,
    directory: PathBuf,
}

impl BackupService {
    pub fn new(backup_repository: BackupRepository, directory: impl Into<PathBuf>) -> Self {
        Self {
            backup_repository,
            directory: directory.into(),
        }
    }

    pub async fn create_backup(&self) -> Result<BackupInfo> {
        let tables: BTreeMap<String, serde_json::Value> =
            self.backup_repository.dump_tables().await?.into_iter().collect();

        let now = Utc::now();
        let snapshot = BackupFile {
            version: BACKUP_FORMAT_VERSION,
            created_at: now,
            tables,
        };

        fs::create_dir_all(&self.directory).await?;
        let body = serde_json::to_vec_pretty(&snapshot)?;
        let name = self.write_new_file(now, &body).await?;

        info!(backup = %name, size = body.len(), "Backup created");
        Ok(BackupInfo {
            name,
            size_bytes: body.len() as u64,
        })
    }

    /// Backups on disk, newest first
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();

        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_valid_backup_name(&name) {
                continue;
            }
            let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            backups.push(BackupInfo { name, size_bytes });
        }

        // timestamped names sort chronologically
        backups.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(backups)
    }

    pub async fn delete_backup(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).await?;
        warn!(backup = %name, "Backup deleted");
        Ok(())
    }

    /// Replace the database contents with a snapshot; returns rows restored
    pub async fn restore_backup(&self, name: &str) -> Result<u64> {
        let path = self.resolve(name)?;
        let body = fs::read(&path).await?;
        let snapshot: BackupFile = serde_json::from_slice(&body)?;

        if snapshot.version != BACKUP_FORMAT_VERSION {
            return Err(ShopError::InvalidInput(format!(
                "unsupported backup version {}",
                snapshot.version
            )));
        }

        let tables: Vec<(String, serde_json::Value)> = snapshot.tables.into_iter().collect();
        let restored = self.backup_repository.restore_tables(&tables).await?;

        warn!(backup = %name, rows = restored, "Database restored from backup");
        Ok(restored)
    }

    /// Write under a name no earlier backup uses; existing files are never replaced
    async fn write_new_file(&self, at: DateTime<Utc>, body: &[u8]) -> Result<String> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = backup_file_name_with_suffix(at, attempt);
            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.directory.join(&name))
                .await;

            match opened {
                Ok(mut file) => {
                    file.write_all(body).await?;
                    file.flush().await?;
                    return Ok(name);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free backup name for {}", backup_file_name(at)),
        )
        .into())
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_backup_name(name) {
            return Err(ShopError::InvalidInput(format!("invalid backup name: {}", name)));
        }
        Ok(self.directory.join(name))
    }
}

pub fn backup_file_name(at: DateTime<Utc>) -> String {
    backup_file_name_with_suffix(at, 0)
}

fn backup_file_name_with_suffix(at: DateTime<Utc>, suffix: u32) -> String {
    let stamp = at.format("%Y%m%d_%H%M%S_%3f");
    match suffix {
        0 => format!("backup_{}.json", stamp),
        n => format!("backup_{}_{}.json", stamp, n),
    }
}

/// Only plain `backup_*.json` names inside the backup directory
pub fn is_valid_backup_name(name: &str) -> bool {
    name.starts_with("backup_")
        && name.ends_with(".json")
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn service(dir: &std::path::Path) -> BackupService {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/hiddyshop_test")
            .unwrap();
        BackupService::new(BackupRepository::new(pool), dir)
    }

    #[test]
    fn test_backup_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 5, 9).unwrap() + chrono::Duration::milliseconds(42);
        assert_eq!(backup_file_name(at), "backup_20240601_080509_042.json");
        assert_eq!(backup_file_name_with_suffix(at, 2), "backup_20240601_080509_042_2.json");
    }

    #[tokio::test]
    async fn test_same_instant_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backups = service(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 5, 9).unwrap();

        let first = backups.write_new_file(at, b"first").await.unwrap();
        let second = backups.write_new_file(at, b"second").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(dir.path().join(&first)).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.path().join(&second)).unwrap(), b"second");

        // the later one lists first
        let listed = backups.list_backups().await.unwrap();
        assert_eq!(listed[0].name, second);
        assert_eq!(listed[1].name, first);
    }

    #[test]
    fn test_backup_name_validation() {
        assert!(is_valid_backup_name("backup_20240601_080509.json"));
        assert!(!is_valid_backup_name("../backup_x.json"));
        assert!(!is_valid_backup_name("backup_../../etc.json"));
        assert!(!is_valid_backup_name("backup_x.json/evil"));
        assert!(!is_valid_backup_name("notes.txt"));
    }

    #[tokio::test]
    async fn test_list_and_delete_backups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("backup_20240101_000000.json"), "{}").unwrap();
        std::fs::write(dir.path().join("backup_20240301_000000.json"), "{}").unwrap();
        std::fs::write(dir.path().join("readme.md"), "x").unwrap();

        let backups = service(dir.path());
        let listed = backups.list_backups().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["backup_20240301_000000.json", "backup_20240101_000000.json"]);

        backups.delete_backup("backup_20240101_000000.json").await.unwrap();
        assert_eq!(backups.list_backups().await.unwrap().len(), 1);

        assert!(backups.delete_backup("../readme.md").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backups = service(&dir.path().join("absent"));
        assert!(backups.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"version": 99, "created_at": "2024-01-01T00:00:00Z", "tables": {}}"#;
        std::fs::write(dir.path().join("backup_20240101_000000.json"), body).unwrap();

        let backups = service(dir.path());
        assert!(matches!(
            backups.restore_backup("backup_20240101_000000.json").await,
            Err(ShopError::InvalidInput(_))
        ));
    }
}
