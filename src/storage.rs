use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::models::{SettingsFile, StickersFile};

const DATA_FILE: &str = "stickers.json";
const SETTINGS_FILE: &str = "settings.json";
const BACKUP_DIR: &str = "backups";
const BACKUP_LIMIT: usize = 5;

pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.root.join(BACKUP_DIR))?;
        Ok(())
    }

    pub fn stickers_path(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    /// `None` when nothing has been saved yet.
    pub fn load_stickers(&self) -> Result<Option<StickersFile>, StorageError> {
        self.load_optional(self.stickers_path())
    }

    /// `None` when nothing has been saved yet.
    pub fn load_settings(&self) -> Result<Option<SettingsFile>, StorageError> {
        self.load_optional(self.root.join(SETTINGS_FILE))
    }

    pub fn save_stickers(&self, data: &StickersFile, with_backup: bool) -> Result<(), StorageError> {
        if with_backup {
            return self.write_with_backup(DATA_FILE, data);
        }
        self.write_atomic(self.root.join(DATA_FILE), data)
    }

    pub fn save_settings(&self, data: &SettingsFile) -> Result<(), StorageError> {
        self.write_atomic(self.root.join(SETTINGS_FILE), data)
    }

    fn load_optional<T: DeserializeOwned>(&self, path: PathBuf) -> Result<Option<T>, StorageError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(Some(serde_json::from_str(&buf)?))
    }

    fn write_with_backup<T: Serialize>(
        &self,
        filename: &str,
        data: &T,
    ) -> Result<(), StorageError> {
        let path = self.root.join(filename);
        if path.exists() {
            self.create_backup(&path)?;
        }
        self.write_atomic(path, data)
    }

    fn write_atomic<T: Serialize>(&self, path: PathBuf, data: &T) -> Result<(), StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(())
    }

    pub fn create_backup(&self, path: &Path) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(self.root.join(BACKUP_DIR))?;
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f").to_string();
        let backup_path = self
            .root
            .join(BACKUP_DIR)
            .join(format!("stickers-{timestamp}.json"));
        fs::copy(path, &backup_path)?;
        self.trim_backups()?;
        Ok(backup_path)
    }

    pub fn list_backups(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = fs::read_dir(self.root.join(BACKUP_DIR))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    // Backup names embed a sortable timestamp, so name order is age order.
    fn trim_backups(&self) -> Result<(), StorageError> {
        let names = self.list_backups()?;
        let to_remove = names.len().saturating_sub(BACKUP_LIMIT);
        for name in names.into_iter().take(to_remove) {
            let _ = fs::remove_file(self.root.join(BACKUP_DIR).join(name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Settings, Sticker};

    fn stickers_file(ids: &[&str]) -> StickersFile {
        StickersFile {
            schema_version: 1,
            stickers: ids.iter().map(|id| Sticker::new(*id, "", 1)).collect(),
        }
    }

    #[test]
    fn missing_files_load_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(storage.load_stickers().unwrap().is_none());
        assert!(storage.load_settings().unwrap().is_none());
    }

    #[test]
    fn save_and_load_stickers_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.ensure_dirs().unwrap();

        storage.save_stickers(&stickers_file(&["a", "b"]), false).unwrap();
        let loaded = storage.load_stickers().unwrap().unwrap();
        assert_eq!(loaded.stickers.len(), 2);
        assert!(!dir.path().join("stickers.tmp").exists());

        let mut settings = Settings::default();
        settings.language = "ja".to_string();
        storage
            .save_settings(&SettingsFile {
                schema_version: 1,
                settings,
            })
            .unwrap();
        let loaded = storage.load_settings().unwrap().unwrap();
        assert_eq!(loaded.settings.language, "ja");
    }

    #[test]
    fn corrupt_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DATA_FILE), "{not json").unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        assert!(matches!(storage.load_stickers(), Err(StorageError::Json(_))));
    }

    #[test]
    fn backup_copies_previous_file_before_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.ensure_dirs().unwrap();

        storage.save_stickers(&stickers_file(&["a"]), true).unwrap();
        assert!(storage.list_backups().unwrap().is_empty());

        storage.save_stickers(&stickers_file(&["a", "b"]), true).unwrap();
        let backups = storage.list_backups().unwrap();
        assert_eq!(backups.len(), 1);
        let raw = fs::read_to_string(dir.path().join(BACKUP_DIR).join(&backups[0])).unwrap();
        let previous: StickersFile = serde_json::from_str(&raw).unwrap();
        assert_eq!(previous.stickers.len(), 1);
    }

    #[test]
    fn backups_are_trimmed_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        storage.ensure_dirs().unwrap();
        for index in 0..BACKUP_LIMIT + 3 {
            fs::write(
                dir.path().join(BACKUP_DIR).join(format!("stickers-2020{index:02}.json")),
                "{}",
            )
            .unwrap();
        }
        storage.trim_backups().unwrap();
        let names = storage.list_backups().unwrap();
        assert_eq!(names.len(), BACKUP_LIMIT);
        assert_eq!(names[0], "stickers-202003.json");
    }
}
