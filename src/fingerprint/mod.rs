// src/fingerprint/mod.rs

//! Change detection.
//!
//! - [`hash`] computes blake3 signatures over files, directory trees and
//!   parameter tuples.
//! - [`store`] records the last successful signature per task so a repeat
//!   run can skip work whose inputs have not changed.

pub mod hash;
pub mod store;

pub use hash::{
    dir_signature, file_signature, fingerprint, params_signature, FingerprintInput, Signature,
};
pub use store::{
    open_store, FileSignatureStore, MemorySignatureStore, SharedSignatureStore, SignatureStore,
    SIGNATURE_FILE_PATH,
};
