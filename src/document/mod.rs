//! Document shapes exchanged with the remote CouchDB-style store
//! (spec.md §3/§6), and the [`Entry`] tagged variant spec.md §9 asks for
//! ("model as a tagged variant `Entry::File(FileDoc) | Entry::Folder
//! (FolderDoc)` with a shared capability set").

pub mod store;
pub mod timestamp;

use serde::{Deserialize, Serialize};

pub use store::DocumentStore;

/// `binary: { file: { id, rev } }` on a [`FileDoc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryRef {
    pub file: BinaryRefInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryRefInner {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub name: String,
    /// Normalized path of the *parent* folder (empty string for root).
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    pub size: u64,
    #[serde(rename = "creationDate")]
    pub creation_date: String,
    #[serde(rename = "lastModification")]
    pub last_modification: String,
    pub binary: BinaryRef,
    #[serde(default)]
    pub storage: Vec<String>,
}

impl FileDoc {
    pub fn new(parent_path: &str, name: &str, binary_id: &str) -> Self {
        let now = timestamp::now_iso8601();
        Self {
            id: None,
            rev: None,
            doc_type: "File".to_string(),
            name: name.to_string(),
            path: parent_path.to_string(),
            mime: guess_mime(name),
            size: 0,
            creation_date: now.clone(),
            last_modification: now,
            binary: BinaryRef { file: BinaryRefInner { id: binary_id.to_string(), rev: None } },
            storage: Vec::new(),
        }
    }

    pub fn full_path(&self) -> String {
        crate::path::join(&self.path, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "creationDate")]
    pub creation_date: String,
    #[serde(rename = "lastModification")]
    pub last_modification: String,
}

impl FolderDoc {
    pub fn new(parent_path: &str, name: &str) -> Self {
        let now = timestamp::now_iso8601();
        Self {
            id: None,
            rev: None,
            doc_type: "Folder".to_string(),
            name: name.to_string(),
            path: parent_path.to_string(),
            creation_date: now.clone(),
            last_modification: now,
        }
    }

    pub fn full_path(&self) -> String {
        crate::path::join(&self.path, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "docType")]
    pub doc_type: String,
}

impl Default for BinaryDoc {
    fn default() -> Self {
        Self { id: None, rev: None, doc_type: "Binary".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiskSpace {
    #[serde(rename = "totalDiskSpace")]
    pub total_disk_space: u64,
    #[serde(rename = "freeDiskSpace")]
    pub free_disk_space: u64,
    #[serde(rename = "usedDiskSpace")]
    pub used_disk_space: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "docType")]
    pub doc_type: String,
    pub login: String,
    pub url: String,
    pub password: String,
    /// Absent until a successful remote `disk-space` fetch memoizes one
    /// (spec.md §7's `statfs` fallback chain); distinguishes "never
    /// fetched" from "fetched and genuinely zero".
    #[serde(rename = "diskSpace", default, skip_serializing_if = "Option::is_none")]
    pub disk_space: Option<DiskSpace>,
}

/// The shared capability set spec.md §9 asks the File/Folder polymorphism
/// to expose: `{parent_path, name, last_modification_ts}`.
#[derive(Debug, Clone)]
pub enum Entry {
    File(FileDoc),
    Folder(FolderDoc),
}

impl Entry {
    pub fn parent_path(&self) -> &str {
        match self {
            Entry::File(f) => &f.path,
            Entry::Folder(d) => &d.path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => &f.name,
            Entry::Folder(d) => &d.name,
        }
    }

    pub fn last_modification(&self) -> &str {
        match self {
            Entry::File(f) => &f.last_modification,
            Entry::Folder(d) => &d.last_modification,
        }
    }

    pub fn full_path(&self) -> String {
        crate::path::join(self.parent_path(), self.name())
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Folder(_))
    }
}

/// Guesses a MIME type from a filename's extension; unset when unknown,
/// per spec.md §4.5 mknod step 2.
pub fn guess_mime(name: &str) -> Option<String> {
    let guess = mime_guess::from_path(name).first();
    guess.map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guess_mime_known_extension() {
        assert_eq!(guess_mime("report.pdf").as_deref(), Some("application/pdf"));
    }

    #[test]
    fn guess_mime_unknown_extension_is_none() {
        assert_eq!(guess_mime("README"), None);
    }

    #[test]
    fn entry_capability_set_dispatches_by_tag() {
        let file = Entry::File(FileDoc::new("/A", "test.sh", "bin1"));
        assert_eq!(file.parent_path(), "/A");
        assert_eq!(file.name(), "test.sh");
        assert!(!file.is_dir());

        let folder = Entry::Folder(FolderDoc::new("", "A"));
        assert_eq!(folder.parent_path(), "");
        assert!(folder.is_dir());
    }
}
