//! Index snapshots.
//!
//! The whole index (documents and their embeddings) is written to one binary
//! file so a restart does not re-embed everything. A snapshot written by a
//! different embedder is still usable: its documents are re-embedded on load.

use crate::error::{AppError, Result};
use crate::index::{Document, InMemoryIndex, StoredDocument};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Snapshot format version. Increment when the format changes.
const SNAPSHOT_VERSION: u32 = 1;

/// Magic bytes to identify snapshot files.
const SNAPSHOT_MAGIC: &[u8; 8] = b"DOCINDEX";

#[derive(Serialize, Deserialize)]
struct SnapshotHeader {
    fingerprint: String,
    dim: usize,
    documents: Vec<Document>,
}

pub struct IndexSnapshot {
    /// Embedder fingerprint the vectors were produced with
    pub fingerprint: String,
    pub dim: usize,
    pub documents: Vec<StoredDocument>,
}

fn io_err(context: &str) -> impl Fn(std::io::Error) -> AppError + '_ {
    move |e| AppError::PersistenceError(format!("{}: {}", context, e))
}

impl IndexSnapshot {
    pub fn capture(index: &InMemoryIndex) -> Result<Self> {
        Ok(Self {
            fingerprint: index.embedder().fingerprint(),
            dim: index.embedder().dim(),
            documents: index.export()?,
        })
    }

    /// Save snapshot to a binary file, replacing any previous one.
    ///
    /// File format:
    /// - 8 bytes: magic "DOCINDEX"
    /// - 4 bytes: version (u32 LE)
    /// - 32 bytes: SHA-256 of everything after the header-length field
    /// - 8 bytes: header length (u64 LE)
    /// - N bytes: JSON header (fingerprint, dim, documents)
    /// - M bytes: embeddings (f32 LE); per document the summary row then one row per chunk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err("Failed to create snapshot directory"))?;
        }

        let header = SnapshotHeader {
            fingerprint: self.fingerprint.clone(),
            dim: self.dim,
            documents: self.documents.iter().map(|d| d.document.clone()).collect(),
        };
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| AppError::PersistenceError(format!("Failed to encode header: {}", e)))?;

        let mut embedding_bytes = Vec::new();
        for stored in &self.documents {
            if stored.summary_embedding.len() != self.dim || stored.chunk_embeddings.ncols() != self.dim
            {
                return Err(AppError::PersistenceError(format!(
                    "Document {} has embeddings of the wrong dimension",
                    stored.document.document_id
                )));
            }
            for &val in stored
                .summary_embedding
                .iter()
                .chain(stored.chunk_embeddings.iter())
            {
                embedding_bytes.extend_from_slice(&val.to_le_bytes());
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(&header_bytes);
        hasher.update(&embedding_bytes);
        let checksum: [u8; 32] = hasher.finalize().into();

        let tmp_path = path.with_extension("tmp");
        let file = File::create(&tmp_path).map_err(io_err("Failed to create snapshot file"))?;
        let mut writer = BufWriter::new(file);
        let write_all = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
            writer.write_all(SNAPSHOT_MAGIC)?;
            writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
            writer.write_all(&checksum)?;
            writer.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
            writer.write_all(&header_bytes)?;
            writer.write_all(&embedding_bytes)?;
            writer.flush()
        };
        write_all(&mut writer).map_err(io_err("Failed to write snapshot"))?;
        drop(writer);

        fs::rename(&tmp_path, path).map_err(io_err("Failed to move snapshot into place"))?;

        tracing::info!(
            path = %path.display(),
            documents = self.documents.len(),
            dim = self.dim,
            size_bytes = 8 + 4 + 32 + 8 + header_bytes.len() + embedding_bytes.len(),
            "Index snapshot saved"
        );

        Ok(())
    }

    /// Load a snapshot.
    ///
    /// Returns None if the file doesn't exist or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Snapshot file does not exist");
            return Ok(None);
        }

        let file = File::open(path).map_err(io_err("Failed to open snapshot"))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != SNAPSHOT_MAGIC {
            tracing::warn!(path = %path.display(), "Invalid snapshot magic, ignoring");
            return Ok(None);
        }

        let mut version_bytes = [0u8; 4];
        if reader.read_exact(&mut version_bytes).is_err() {
            tracing::warn!(path = %path.display(), "Truncated snapshot version, ignoring");
            return Ok(None);
        }
        let version = u32::from_le_bytes(version_bytes);
        if version != SNAPSHOT_VERSION {
            tracing::warn!(
                path = %path.display(),
                snapshot_version = version,
                expected_version = SNAPSHOT_VERSION,
                "Snapshot version mismatch, ignoring"
            );
            return Ok(None);
        }

        let mut checksum = [0u8; 32];
        let mut header_len_bytes = [0u8; 8];
        if reader.read_exact(&mut checksum).is_err()
            || reader.read_exact(&mut header_len_bytes).is_err()
        {
            tracing::warn!(path = %path.display(), "Truncated snapshot header, ignoring");
            return Ok(None);
        }
        let header_len = u64::from_le_bytes(header_len_bytes) as usize;

        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(io_err("Failed to read snapshot body"))?;

        let actual: [u8; 32] = Sha256::digest(&body).into();
        if actual != checksum || header_len > body.len() {
            tracing::warn!(path = %path.display(), "Snapshot checksum mismatch, ignoring");
            return Ok(None);
        }

        let (header_bytes, embedding_bytes) = body.split_at(header_len);
        let header: SnapshotHeader = serde_json::from_slice(header_bytes)
            .map_err(|e| AppError::PersistenceError(format!("Failed to decode header: {}", e)))?;

        let rows: usize = header.documents.iter().map(|d| 1 + d.chunks.len()).sum();
        if embedding_bytes.len() != rows * header.dim * 4 {
            return Err(AppError::PersistenceError(format!(
                "Snapshot holds {} embedding bytes, expected {}",
                embedding_bytes.len(),
                rows * header.dim * 4
            )));
        }

        let mut floats = embedding_bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]));

        let mut documents = Vec::with_capacity(header.documents.len());
        for document in header.documents {
            let summary: Vec<f32> = floats.by_ref().take(header.dim).collect();
            let chunk_data: Vec<f32> = floats
                .by_ref()
                .take(document.chunks.len() * header.dim)
                .collect();
            let chunk_embeddings =
                Array2::from_shape_vec((document.chunks.len(), header.dim), chunk_data).map_err(
                    |e| AppError::PersistenceError(format!("Failed to reshape embeddings: {}", e)),
                )?;
            documents.push(StoredDocument {
                document,
                summary_embedding: Array1::from_vec(summary),
                chunk_embeddings,
            });
        }

        tracing::info!(
            path = %path.display(),
            documents = documents.len(),
            dim = header.dim,
            "Index snapshot loaded"
        );

        Ok(Some(Self {
            fingerprint: header.fingerprint,
            dim: header.dim,
            documents,
        }))
    }

    /// Insert the snapshot's documents into `index`. Documents are re-embedded
    /// when the snapshot came from a different embedder.
    pub fn restore_into(self, index: &InMemoryIndex) -> Result<usize> {
        let reuse = self.fingerprint == index.embedder().fingerprint();
        if !reuse {
            tracing::info!(
                snapshot = %self.fingerprint,
                current = %index.embedder().fingerprint(),
                "Embedder changed, re-embedding snapshot documents"
            );
        }

        let count = self.documents.len();
        for stored in self.documents {
            let stored = if reuse {
                stored
            } else {
                index.embed_document(stored.document)?
            };
            index.insert(stored)?;
        }
        Ok(count)
    }
}

/// Write the current index to `path`.
pub fn save_index(path: &Path, index: &InMemoryIndex) -> Result<()> {
    IndexSnapshot::capture(index)?.save(path)
}

/// Restore a snapshot from `path` into `index`, returning the number of documents.
pub fn load_index(path: &Path, index: &InMemoryIndex) -> Result<usize> {
    match IndexSnapshot::load(path)? {
        Some(snapshot) => snapshot.restore_into(index),
        None => {
            tracing::info!("No usable snapshot found, starting with an empty index");
            Ok(0)
        }
    }
}
