// src/directory.rs
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::AppError;
use crate::model::{ConsolidatedRecord, DirectoryEntry, ProjectId};
use crate::normalizer::normalize_manager_name;

// --- Directory store contract ---

/// Global project → manager mapping. Entries are only ever added; an existing
/// project id is never overwritten unless the whole directory is rebuilt.
pub trait DirectoryStore {
    /// Returns `true` when the entry was new.
    fn insert_if_absent(&mut self, entry: &DirectoryEntry) -> Result<bool, AppError>;
    fn clear(&mut self) -> Result<(), AppError>;
    fn entries(&self) -> Result<Vec<DirectoryEntry>, AppError>;
}

/// Adds a batch to a directory store. With `rebuild` the store is emptied first.
pub fn load_directory<S: DirectoryStore + ?Sized>(
    store: &mut S,
    entries: &[DirectoryEntry],
    rebuild: bool,
) -> Result<usize, AppError> {
    if rebuild {
        info!("Rebuilding directory from {} entries", entries.len());
        store.clear()?;
    }
    let mut added = 0;
    for entry in entries {
        if store.insert_if_absent(entry)? {
            added += 1;
        } else {
            debug!("Directory already has project {}, keeping existing entry", entry.project_id);
        }
    }
    Ok(added)
}

// --- Resolver ---

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerContact {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Lookup index over a directory snapshot.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    by_project: HashMap<ProjectId, DirectoryEntry>,
    email_by_name: HashMap<String, String>,
}

impl DirectoryIndex {
    /// Builds the index. The first entry for a project id wins.
    ///
    /// When several entries with an email share a normalized manager name, the
    /// lexicographically greatest email is kept, so name matches are deterministic.
    pub fn new(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let mut by_project = HashMap::new();
        let mut email_by_name: HashMap<String, String> = HashMap::new();

        for entry in entries {
            if let (Some(name), Some(email)) = (&entry.manager_name, &entry.manager_email) {
                let key = normalize_manager_name(name);
                if !key.is_empty() {
                    email_by_name
                        .entry(key)
                        .and_modify(|existing| {
                            if email > existing {
                                *existing = email.clone();
                            }
                        })
                        .or_insert_with(|| email.clone());
                }
            }
            by_project.entry(entry.project_id.clone()).or_insert(entry);
        }

        Self {
            by_project,
            email_by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.by_project.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_project.is_empty()
    }

    pub fn contains(&self, project_id: &str) -> bool {
        self.by_project.contains_key(project_id)
    }

    /// Exact match on the normalized project id.
    pub fn resolve(&self, project_id: &str) -> ManagerContact {
        self.by_project
            .get(project_id)
            .map(|e| ManagerContact {
                name: e.manager_name.clone(),
                email: e.manager_email.clone(),
            })
            .unwrap_or_default()
    }

    /// Case-insensitive, trimmed match against directory entries that carry an email.
    pub fn email_for_name(&self, name: &str) -> Option<&str> {
        self.email_by_name
            .get(&normalize_manager_name(name))
            .map(String::as_str)
    }
}

/// Fills `manager_email` on records that lack one, matching by manager name.
/// Records that already have an email are never touched. Returns the number filled.
pub fn backfill_emails(records: &mut [ConsolidatedRecord], directory: &DirectoryIndex) -> usize {
    let mut filled = 0;
    for record in records.iter_mut().filter(|r| r.manager_email.is_none()) {
        let Some(name) = record.manager_name.as_deref() else {
            continue;
        };
        if let Some(email) = directory.email_for_name(name) {
            debug!(
                "Backfilled email for {}/{} via manager name '{}'",
                record.employee_id,
                record.project_id.as_deref().unwrap_or("-"),
                name
            );
            record.manager_email = Some(email.to_string());
            filled += 1;
        }
    }
    filled
}
