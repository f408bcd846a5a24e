use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::fingerprint::hash::Signature;
use crate::types::SignatureStorageMode;

/// Relative path (from the config directory) to the signature file.
pub const SIGNATURE_FILE_PATH: &str = ".fleetdag/signatures";

/// Record of the last successful signature per task identifier.
pub trait SignatureStore: Send + Sync {
    fn load(&self, task: &str) -> Result<Option<Signature>>;
    fn save(&mut self, task: &str, signature: &Signature) -> Result<()>;
    /// Remove signatures for tasks that are not in `active_tasks`.
    fn prune(&mut self, active_tasks: &[&str]) -> Result<()>;
}

/// The store shared by every task of every instance in one run.
///
/// Critical sections are short and synchronous; the lock is never held
/// across an `.await`.
pub type SharedSignatureStore = Arc<Mutex<Box<dyn SignatureStore>>>;

/// Open the store selected by `[config].signature_storage_mode`.
pub fn open_store(mode: SignatureStorageMode, root: &Path) -> SharedSignatureStore {
    let store: Box<dyn SignatureStore> = match mode {
        SignatureStorageMode::File => Box::new(FileSignatureStore::new(root.join(SIGNATURE_FILE_PATH))),
        SignatureStorageMode::Memory => Box::new(MemorySignatureStore::new()),
    };
    Arc::new(Mutex::new(store))
}

/// Stores signatures as `"<task-id> <hex>"` lines in a single file.
pub struct FileSignatureStore {
    path: PathBuf,
}

impl FileSignatureStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SignatureStore for FileSignatureStore {
    fn load(&self, task: &str) -> Result<Option<Signature>> {
        let map = load_all(&self.path)?;
        Ok(map.get(task).cloned())
    }

    fn save(&mut self, task: &str, signature: &Signature) -> Result<()> {
        let mut map = load_all(&self.path)?;
        map.insert(task.to_string(), signature.clone());
        save_all(&self.path, &map)?;
        debug!(task = %task, signature = %signature, "stored task signature (file)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let mut map = load_all(&self.path)?;
        let initial_len = map.len();
        map.retain(|k, _| active_tasks.contains(&k.as_str()));

        if map.len() < initial_len {
            save_all(&self.path, &map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale task signatures (file)"
            );
        }
        Ok(())
    }
}

/// Stores signatures in memory only.
#[derive(Default)]
pub struct MemorySignatureStore {
    map: BTreeMap<String, Signature>,
}

impl MemorySignatureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignatureStore for MemorySignatureStore {
    fn load(&self, task: &str) -> Result<Option<Signature>> {
        Ok(self.map.get(task).cloned())
    }

    fn save(&mut self, task: &str, signature: &Signature) -> Result<()> {
        self.map.insert(task.to_string(), signature.clone());
        debug!(task = %task, signature = %signature, "stored task signature (memory)");
        Ok(())
    }

    fn prune(&mut self, active_tasks: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active_tasks.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale task signatures (memory)"
            );
        }
        Ok(())
    }
}

fn load_all(path: &Path) -> Result<BTreeMap<String, Signature>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let file = File::open(path).with_context(|| format!("opening signature file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = BTreeMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((name, sig)) = trimmed.split_once(char::is_whitespace) {
            map.insert(name.to_string(), Signature::from_hex(sig.trim()));
        }
    }

    Ok(map)
}

/// Write to a sibling temp file and rename, so an interrupted run never
/// leaves a truncated record behind.
fn save_all(path: &Path, map: &BTreeMap<String, Signature>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating signature directory at {:?}", parent))?;
    }

    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("creating signature file at {:?}", tmp))?;
        let mut writer = BufWriter::new(file);
        for (name, sig) in map {
            writeln!(writer, "{} {}", name, sig)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replacing signature file at {:?}", path))?;
    Ok(())
}
