use std::cell::RefCell;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GenerateError, Result};
use crate::provider::ProviderKind;

pub const HISTORY_LIMIT: usize = 50;

/// A single persisted JSON value.
pub trait KeyValueStore {
    fn load(&self) -> Result<Value>;

    fn save(&self, value: &Value) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn load(&self) -> Result<Value> {
        (**self).load()
    }

    fn save(&self, value: &Value) -> Result<()> {
        (**self).save(value)
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self) -> Result<Value> {
        if !self.path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|err| {
            GenerateError::Store(format!("failed to read {}: {err}", self.path.display()))
        })?;
        if contents.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        match serde_json::from_str(&contents) {
            Ok(value) => Ok(value),
            Err(json_err) => json5::from_str(&contents).map_err(|_| {
                GenerateError::Store(format!("{} is not valid JSON: {json_err}", self.path.display()))
            }),
        }
    }

    fn save(&self, value: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                GenerateError::Store(format!("failed to create {}: {err}", parent.display()))
            })?;
        }
        let text = serde_json::to_string_pretty(value)
            .map_err(|err| GenerateError::Store(err.to_string()))?;
        std::fs::write(&self.path, text).map_err(|err| {
            GenerateError::Store(format!("failed to write {}: {err}", self.path.display()))
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    value: RefCell<Option<Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self) -> Result<Value> {
        Ok(self
            .value
            .borrow()
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    fn save(&self, value: &Value) -> Result<()> {
        *self.value.borrow_mut() = Some(value.clone());
        Ok(())
    }
}

/// API keys keyed by provider id.
pub struct CredentialStore<S> {
    store: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get(&self, kind: ProviderKind) -> Result<Option<String>> {
        let value = self.store.load()?;
        Ok(value
            .get(kind.id())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string))
    }

    pub fn set(&self, kind: ProviderKind, key: &str) -> Result<()> {
        let mut value = self.store.load()?;
        if !value.is_object() {
            value = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut value {
            map.insert(kind.id().to_string(), Value::String(key.trim().to_string()));
        }
        self.store.save(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub timestamp: String,
    pub width: u32,
    pub height: u32,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub colors: String,
}

impl HistoryEntry {
    /// Stamp an entry with the current UTC time.
    pub fn now(
        prompt: impl Into<String>,
        width: u32,
        height: u32,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            width,
            height,
            provider: provider.into(),
            model: model.into(),
            style: String::new(),
            colors: String::new(),
        }
    }
}

/// Recent prompts, newest first.
pub struct HistoryLog<S> {
    store: S,
    limit: usize,
}

impl<S: KeyValueStore> HistoryLog<S> {
    pub fn new(store: S) -> Self {
        Self::with_limit(store, HISTORY_LIMIT)
    }

    pub fn with_limit(store: S, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
        }
    }

    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        match self.store.load()? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            // A fresh store loads as an empty object.
            _ => Ok(Vec::new()),
        }
    }

    pub fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(0, entry);
        entries.truncate(self.limit);
        let value = serde_json::to_value(&entries).map_err(|err| GenerateError::Store(err.to_string()))?;
        self.store.save(&value)
    }
}
