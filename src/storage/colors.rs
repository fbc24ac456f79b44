use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockWriteGuard};

use super::Category;

/// Category name → color lookup kept in step with the `categories` table.
///
/// Writers take [`CategoryColors::write`] before committing a category change
/// and apply the change through the guard right after the commit, so readers
/// never observe a color map that disagrees with committed rows.
#[derive(Debug, Default)]
pub struct CategoryColors {
    inner: RwLock<IndexMap<String, u32>>,
}

impl CategoryColors {
    pub fn from_categories(categories: &[Category]) -> Self {
        let map = categories
            .iter()
            .map(|category| (category.name.clone(), category.color))
            .collect::<IndexMap<_, _>>();
        Self {
            inner: RwLock::new(map),
        }
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.inner.read().get(name).copied()
    }

    pub(crate) fn write(&self) -> ColorsWriteGuard<'_> {
        ColorsWriteGuard {
            map: self.inner.write(),
        }
    }
}

pub(crate) struct ColorsWriteGuard<'a> {
    map: RwLockWriteGuard<'a, IndexMap<String, u32>>,
}

impl ColorsWriteGuard<'_> {
    pub fn insert(&mut self, name: &str, color: u32) {
        self.map.insert(name.to_string(), color);
    }

    pub fn rename(&mut self, from: &str, to: &str, color: u32) {
        self.map.shift_remove(from);
        self.insert(to, color);
    }

    pub fn remove(&mut self, name: &str) {
        self.map.shift_remove(name);
    }
}
