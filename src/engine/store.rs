use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bson::document::Document;
use crate::catalog::dataset::{Dataset, Handle};
use crate::catalog::index::{Index, IndexConfig};
use crate::catalog::namespace::Namespace;
use crate::core::error::{Error, ErrorKind, Result};

/// Persistence collaborator. `load` runs once at engine creation; `store`
/// runs at the end of every successful mutation, before the new snapshot is
/// published. A `store` failure prevents publication.
pub trait Store: Send {
    fn load(&self) -> Result<Dataset>;
    fn store(&self, dataset: &Dataset) -> Result<()>;
}

/// The purely in-memory store: loads an empty dataset and discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStore;

impl Store for MemoryStore {
    fn load(&self) -> Result<Dataset> {
        Ok(Dataset::new())
    }

    fn store(&self, _dataset: &Dataset) -> Result<()> {
        Ok(())
    }
}

const MAGIC: &[u8; 4] = b"MDB1";

/// Serialized form of one namespace: documents plus index definitions.
/// Index occupancy is not persisted; it is rebuilt on load so the shared
/// document identities line up again.
#[derive(Serialize, Deserialize)]
struct NamespaceImage {
    db: String,
    coll: String,
    indexes: Vec<(String, IndexConfig)>,
    documents: Vec<Document>,
}

#[derive(Serialize, Deserialize)]
struct DatasetImage {
    namespaces: Vec<NamespaceImage>,
}

/// Single-file persistence: a magic tag, a CRC32 of the payload, and the
/// bincode-encoded dataset image, written to a temp file and renamed into
/// place so a torn write never clobbers the previous image.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }
}

impl Store for FileStore {
    fn load(&self) -> Result<Dataset> {
        if !self.path.exists() {
            return Ok(Dataset::new());
        }
        let data = fs::read(&self.path)?;
        if data.len() < 8 || &data[..4] != MAGIC {
            return Err(Error::new(
                ErrorKind::Store,
                format!("{} is not a dataset image", self.path.display()),
            ));
        }
        let checksum = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let payload = &data[8..];
        if crc32fast::hash(payload) != checksum {
            return Err(Error::new(
                ErrorKind::Store,
                format!("checksum mismatch in {}", self.path.display()),
            ));
        }
        let image: DatasetImage = bincode::deserialize(payload)?;

        let mut dataset = Dataset::new();
        for ns_image in image.namespaces {
            let mut ns = Namespace::empty();
            for (name, config) in ns_image.indexes {
                ns.indexes.insert(name, Index::from_config(config));
            }
            for doc in ns_image.documents {
                let doc = Arc::new(doc);
                for (name, index) in ns.indexes.iter_mut() {
                    if !index.add(&doc)? {
                        return Err(Error::new(
                            ErrorKind::Store,
                            format!("stored image violates unique index {:?}", name),
                        ));
                    }
                }
                ns.docs.add(doc)?;
            }
            dataset
                .namespaces
                .insert(Handle::new(ns_image.db, ns_image.coll), Arc::new(ns));
        }
        Ok(dataset)
    }

    fn store(&self, dataset: &Dataset) -> Result<()> {
        let image = DatasetImage {
            namespaces: dataset
                .namespaces
                .iter()
                .map(|(handle, ns)| NamespaceImage {
                    db: handle.db.clone(),
                    coll: handle.coll.clone(),
                    indexes: ns
                        .indexes()
                        .iter()
                        .map(|(name, index)| (name.clone(), index.config().clone()))
                        .collect(),
                    documents: ns.docs().list().iter().map(|d| (**d).clone()).collect(),
                })
                .collect(),
        };
        let payload = bincode::serialize(&image)?;

        let mut out = Vec::with_capacity(payload.len() + 8);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        out.extend_from_slice(&payload);

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
