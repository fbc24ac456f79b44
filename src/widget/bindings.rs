use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BINDINGS_TMP_EXTENSION: &str = "json.tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct BindingsRecord {
    widgets: BTreeMap<i64, i64>,
}

/// Widget instance id → note id, persisted as JSON next to the app state.
#[derive(Debug)]
pub struct WidgetBindings {
    path: PathBuf,
    widgets: BTreeMap<i64, i64>,
}

impl WidgetBindings {
    /// Loads the bindings file, treating a missing file as no bindings.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let widgets = match fs::read(&path) {
            Ok(raw) => {
                let record: BindingsRecord = serde_json::from_slice(&raw)
                    .with_context(|| format!("parsing widget bindings {}", path.display()))?;
                record.widgets
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("reading widget bindings {}", path.display()))
            }
        };
        Ok(Self { path, widgets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn note_for(&self, widget_id: i64) -> Option<i64> {
        self.widgets.get(&widget_id).copied()
    }

    pub fn widget_ids(&self) -> Vec<i64> {
        self.widgets.keys().copied().collect()
    }

    pub fn bind(&mut self, widget_id: i64, note_id: i64) -> Result<()> {
        self.widgets.insert(widget_id, note_id);
        self.persist()
    }

    /// Returns whether a binding was removed.
    pub fn unbind(&mut self, widget_id: i64) -> Result<bool> {
        if self.widgets.remove(&widget_id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        let record = BindingsRecord {
            widgets: self.widgets.clone(),
        };
        let json = serde_json::to_vec_pretty(&record).context("serialising widget bindings")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("ensuring state dir {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension(BINDINGS_TMP_EXTENSION);
        fs::write(&tmp_path, &json).with_context(|| {
            format!("writing temporary widget bindings {}", tmp_path.display())
        })?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("atomically persisting widget bindings {}", self.path.display())
        })?;
        Ok(())
    }
}
