//! JSON 설정 파일
//!
//! `AgoraConfig` 계층 하나가 디렉토리 하나입니다:
//! 글로벌 `~/.config/agora/`, 프로젝트 `<root>/.agora/`.

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// 프로젝트 계층 디렉토리 이름
pub const PROJECT_DIR: &str = ".agora";

/// 설정 계층 디렉토리
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonStore {
    base_dir: PathBuf,
}

fn config_err(action: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Config(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl JsonStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn global() -> Result<Self> {
        dirs::config_dir()
            .map(|dir| Self::new(dir.join("agora")))
            .ok_or_else(|| Error::Config("No platform config directory".to_string()))
    }

    pub fn project(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(PROJECT_DIR))
    }

    pub fn current_project() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| config_err("resolve", Path::new("."), e))?;
        Ok(Self::project(cwd))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.base_dir.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.file_path(filename).is_file()
    }

    /// 파일이 없거나 비어 있으면 `None`
    pub fn load_optional<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(config_err("read", &path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| config_err("parse", &path, e))
    }

    pub fn load<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        self.load_optional(filename)?.ok_or_else(|| {
            Error::NotFound(format!("{} has no content", self.file_path(filename).display()))
        })
    }

    /// 계층 병합용 원시 값
    pub fn load_value(&self, filename: &str) -> Result<Option<Value>> {
        self.load_optional(filename)
    }

    /// 임시 파일에 쓴 뒤 rename (중간에 실패해도 기존 파일 유지)
    pub fn save<T: Serialize>(&self, filename: &str, data: &T) -> Result<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| config_err("create", &self.base_dir, e))?;

        let path = self.file_path(filename);
        let staging = self.file_path(&format!(".{}.tmp", filename));
        let content =
            serde_json::to_string_pretty(data).map_err(|e| config_err("serialize", &path, e))?;

        fs::write(&staging, content).map_err(|e| config_err("write", &staging, e))?;
        fs::rename(&staging, &path).map_err(|e| config_err("replace", &path, e))
    }

    /// 삭제했으면 true
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let path = self.file_path(filename);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(config_err("remove", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_project_layer_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::project(temp.path());
        assert!(store.base_dir().ends_with(PROJECT_DIR));
        assert!(store.load_value("config.json").unwrap().is_none());

        store
            .save("config.json", &json!({ "logging": { "level": "debug" } }))
            .unwrap();
        assert!(!store.exists(".config.json.tmp"));

        let value = store.load_value("config.json").unwrap().unwrap();
        assert_eq!(value["logging"]["level"], "debug");

        assert!(store.remove("config.json").unwrap());
        assert!(!store.remove("config.json").unwrap());
    }

    #[test]
    fn test_empty_and_broken_files() {
        let temp = TempDir::new().unwrap();
        let store = JsonStore::new(temp.path());

        std::fs::write(store.file_path("empty.json"), "  \n").unwrap();
        assert!(store.load_value("empty.json").unwrap().is_none());
        assert!(matches!(
            store.load::<Value>("empty.json"),
            Err(Error::NotFound(_))
        ));

        std::fs::write(store.file_path("config.json"), "{ not json").unwrap();
        assert!(matches!(
            store.load_value("config.json"),
            Err(Error::Config(_))
        ));
    }
}
