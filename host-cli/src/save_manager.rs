//! # SaveManager 模块
//!
//! 基于文件的快照存储，每个键一个 JSON 文件。
//!
//! ## 文件布局
//!
//! ```text
//! saves/
//! ├── autosave.json
//! ├── slot_1.json
//! └── ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use story_engine::{PersistError, SessionSnapshot, SnapshotStore};
use tracing::{debug, info};

/// 文件快照存储
pub struct FileSnapshotStore {
    saves_dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(saves_dir: impl AsRef<Path>) -> Self {
        Self {
            saves_dir: saves_dir.as_ref().to_path_buf(),
        }
    }

    /// 确保存档目录存在
    pub fn ensure_dir(&self) -> Result<(), PersistError> {
        if !self.saves_dir.exists() {
            fs::create_dir_all(&self.saves_dir)
                .map_err(|e| PersistError::Storage(format!("无法创建存档目录: {}", e)))?;
        }
        Ok(())
    }

    /// 键对应的文件路径
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.saves_dir.join(format!("{key}.json"))
    }

    /// 列出所有已保存的键
    pub fn list_keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.saves_dir) else {
            return Vec::new();
        };

        let mut keys: Vec<String> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            })
            .collect();
        keys.sort();
        keys
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn put(&mut self, key: &str, snapshot: &SessionSnapshot) -> Result<(), PersistError> {
        self.ensure_dir()?;
        let path = self.key_path(key);
        let json = snapshot.to_json()?;

        // 先写临时文件再改名
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| PersistError::Storage(format!("无法写入存档文件: {}", e)))?;
        fs::rename(&tmp, &path).map_err(|e| PersistError::Storage(format!("无法替换存档文件: {}", e)))?;

        debug!(path = %path.display(), "快照写入成功");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<SessionSnapshot>, PersistError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .map_err(|e| PersistError::Storage(format!("无法读取存档文件: {}", e)))?;
        let snapshot = SessionSnapshot::from_json(&json)?;

        info!(path = %path.display(), "快照读取成功");
        Ok(Some(snapshot))
    }

    fn delete(&mut self, key: &str) -> Result<(), PersistError> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| PersistError::Storage(format!("无法删除存档文件: {}", e)))?;
            info!(path = %path.display(), "快照删除成功");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_engine::Paragraph;

    fn sample() -> SessionSnapshot {
        SessionSnapshot::new(
            r#"{"node":"intro"}"#,
            vec![Paragraph::with_tags("Ночь.", ["mood:tense"])],
        )
    }

    #[test]
    fn test_put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::new(dir.path().join("saves"));

        store.put("autosave", &sample()).unwrap();
        assert!(store.key_path("autosave").exists());
        assert_eq!(store.get("autosave").unwrap(), Some(sample()));
        // 没有残留的临时文件
        assert_eq!(store.list_keys(), vec!["autosave"]);
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert_eq!(store.get("slot_9").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        fs::write(store.key_path("autosave"), "{ broken").unwrap();
        assert!(matches!(
            store.get("autosave"),
            Err(PersistError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSnapshotStore::new(dir.path());
        for key in ["slot_3", "autosave", "slot_1"] {
            store.put(key, &sample()).unwrap();
        }
        assert_eq!(store.list_keys(), vec!["autosave", "slot_1", "slot_3"]);

        store.delete("slot_1").unwrap();
        store.delete("slot_1").unwrap();
        assert_eq!(store.list_keys(), vec!["autosave", "slot_3"]);
    }
}
