use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Interning table mapping strings to dense indices, in first-seen order.
///
/// Safe for concurrent use: lookups share a read lock, and a miss upgrades to
/// the write lock and re-checks before appending, so two callers racing on
/// the same new string still agree on one index.
#[derive(Debug, Default)]
pub struct StringTable {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    indices: HashMap<String, i64>,
    strings: Vec<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with `strings`, duplicates collapsed.
    pub fn with_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = Self::new();
        for s in strings {
            table.intern(s.as_ref());
        }
        table
    }

    /// Index of `s`, if it has been interned.
    pub fn lookup(&self, s: &str) -> Option<i64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.indices.get(s).copied()
    }

    /// Index of `s`, appending it if necessary.
    pub fn intern(&self, s: &str) -> i64 {
        if let Some(idx) = self.lookup(s) {
            return idx;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Inserted by someone else between the read and the write lock.
        if let Some(&idx) = inner.indices.get(s) {
            return idx;
        }
        let idx = inner.strings.len() as i64;
        inner.strings.push(s.to_owned());
        inner.indices.insert(s.to_owned(), idx);
        idx
    }

    pub fn get(&self, index: i64) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        usize::try_from(index).ok().and_then(|i| inner.strings.get(i).cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Strings in index order.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).strings.clone()
    }
}
