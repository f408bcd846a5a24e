use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use blake3::Hasher;
use tracing::debug;

use crate::errors::{FleetdagError, Result};

/// Deterministic blake3 digest over a task's tracked inputs, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(String);

impl Signature {
    fn from_hasher(hasher: Hasher) -> Self {
        Signature(hasher.finalize().to_hex().to_string())
    }

    /// Wrap a hex digest read back from a signature store.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Signature(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn fingerprint_error(path: &Path, source: std::io::Error) -> FleetdagError {
    FleetdagError::Fingerprint {
        path: path.to_path_buf(),
        source,
    }
}

/// Content hash of a single file.
pub fn file_signature(path: &Path) -> Result<Signature> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path).map_err(|e| fingerprint_error(path, e))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| fingerprint_error(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Signature::from_hasher(hasher))
}

/// Recursive hash of a directory tree.
///
/// At each level entries are visited in byte-wise order of their names and
/// contribute `"<entry-name>:<child-signature>\n"`, where the child signature
/// is the directory signature for subdirectories and the content hash for
/// files. The result is independent of the absolute location of the tree.
pub fn dir_signature(path: &Path) -> Result<Signature> {
    let mut names: Vec<std::ffi::OsString> = fs::read_dir(path)
        .map_err(|e| fingerprint_error(path, e))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<_>>()
        .map_err(|e| fingerprint_error(path, e))?;
    names.sort_by(|a, b| a.as_encoded_bytes().cmp(b.as_encoded_bytes()));

    let mut hasher = Hasher::new();
    for name in names {
        let child = path.join(&name);
        let meta = fs::metadata(&child).map_err(|e| fingerprint_error(&child, e))?;
        let child_sig = if meta.is_dir() {
            dir_signature(&child)?
        } else {
            file_signature(&child)?
        };
        hasher.update(name.as_encoded_bytes());
        hasher.update(b":");
        hasher.update(child_sig.as_str().as_bytes());
        hasher.update(b"\n");
    }

    let sig = Signature::from_hasher(hasher);
    debug!(path = ?path, signature = %sig, "computed directory signature");
    Ok(sig)
}

/// Hash of an ordered tuple of scalar parameters.
///
/// Each element is length-prefixed so `("ab", "c")` and `("a", "bc")`
/// differ.
pub fn params_signature<S: AsRef<str>>(params: &[S]) -> Signature {
    let mut hasher = Hasher::new();
    for p in params {
        let p = p.as_ref();
        hasher.update(&(p.len() as u64).to_le_bytes());
        hasher.update(p.as_bytes());
    }
    Signature::from_hasher(hasher)
}

/// One tracked input of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintInput {
    File(PathBuf),
    Dir(PathBuf),
    Params(Vec<String>),
}

impl FingerprintInput {
    pub fn params<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FingerprintInput::Params(values.into_iter().map(Into::into).collect())
    }

    fn kind(&self) -> &'static str {
        match self {
            FingerprintInput::File(_) => "file",
            FingerprintInput::Dir(_) => "dir",
            FingerprintInput::Params(_) => "params",
        }
    }

    pub fn signature(&self) -> Result<Signature> {
        match self {
            FingerprintInput::File(path) => file_signature(path),
            FingerprintInput::Dir(path) => dir_signature(path),
            FingerprintInput::Params(values) => Ok(params_signature(values)),
        }
    }
}

/// Combine the signatures of all `inputs`, in order, into one signature.
///
/// Any unreadable input is an error; it is never treated as "no change".
pub fn fingerprint(inputs: &[FingerprintInput]) -> Result<Signature> {
    let mut hasher = Hasher::new();
    for input in inputs {
        let sig = input.signature()?;
        hasher.update(input.kind().as_bytes());
        hasher.update(b":");
        hasher.update(sig.as_str().as_bytes());
        hasher.update(b"\n");
    }
    Ok(Signature::from_hasher(hasher))
}
