//! Patch record sinks for the process command.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tilepress_core::{EditPatch, RecordStore, StoreError};

/// One output element: the patch plus the asset it applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRecord {
    pub asset_id: String,
    #[serde(flatten)]
    pub patch: EditPatch,
}

/// Streams each patch as one JSON line the moment it is applied.
pub struct JsonlStore {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonlStore {
    /// Stream to `path`, or to stdout when no path is given.
    pub fn for_output(path: Option<&Path>) -> anyhow::Result<Self> {
        let writer: Box<dyn Write + Send> = match path {
            Some(path) => Box::new(BufWriter::new(File::create(path)?)),
            None => Box::new(std::io::stdout()),
        };
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.guard().flush()?;
        Ok(())
    }

    fn guard(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonlStore {
    async fn apply_patch(&self, asset_id: &str, patch: EditPatch) -> Result<(), StoreError> {
        let record = PatchRecord {
            asset_id: asset_id.to_string(),
            patch,
        };
        let line = serde_json::to_string(&record).map_err(|e| StoreError::new(e.to_string()))?;
        let mut writer = self.guard();
        writeln!(writer, "{line}")?;
        Ok(())
    }
}

/// Collects patches in arrival order for single-document JSON output.
#[derive(Default)]
pub struct CollectingStore {
    records: Mutex<Vec<PatchRecord>>,
}

impl CollectingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything collected so far.
    pub fn take_records(&self) -> Vec<PatchRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[async_trait::async_trait]
impl RecordStore for CollectingStore {
    async fn apply_patch(&self, asset_id: &str, patch: EditPatch) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(PatchRecord {
                asset_id: asset_id.to_string(),
                patch,
            });
        Ok(())
    }
}
