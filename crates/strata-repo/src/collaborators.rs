//! Collaborator interfaces the core consumes but does not implement.
//!
//! Network transport, working-directory I/O, and credential acquisition
//! live outside the core; these traits are the whole surface the core sees.
//! None of them may block back into the core: a transport resolves its
//! credentials (or fails) before returning.

use bstr::{BStr, BString};
use strata_hash::ObjectId;
use strata_object::{EntryMode, ObjectKind};
use strata_ref::RefName;

/// Errors a workspace implementation may report.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("workspace path not found: {0}")]
    NotFound(BString),

    #[error("workspace I/O failed on {path}: {reason}")]
    Io { path: BString, reason: String },
}

/// A tracked file as the object store knows it, for change listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub path: BString,
    pub id: ObjectId,
    pub mode: EntryMode,
}

/// One entry of a workspace status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceStatus {
    /// Present in the workspace, absent from the tracked set.
    Added(BString),
    /// Tracked, but missing from the workspace.
    Removed(BString),
    /// Present on both sides with different content.
    Modified(BString),
}

impl WorkspaceStatus {
    pub fn path(&self) -> &BStr {
        match self {
            Self::Added(p) | Self::Removed(p) | Self::Modified(p) => p.as_ref(),
        }
    }
}

/// The working-directory collaborator: reads and writes tracked files.
pub trait Workspace {
    /// Read a file's bytes. `Ok(None)` if the path does not exist.
    fn read_file(&self, path: &BStr) -> Result<Option<Vec<u8>>, WorkspaceError>;

    /// Create or replace a file.
    fn write_file(&mut self, path: &BStr, data: &[u8], mode: EntryMode)
        -> Result<(), WorkspaceError>;

    /// Remove a file. Removing an absent path is fine.
    fn remove(&mut self, path: &BStr) -> Result<(), WorkspaceError>;

    /// All file paths currently present, sorted.
    fn paths(&self) -> Result<Vec<BString>, WorkspaceError>;

    /// Compare the workspace against a tracked file set.
    ///
    /// The default implementation re-hashes workspace content; an
    /// implementation with cheaper change information may override it.
    fn list_changed(
        &self,
        tracked: &[TrackedFile],
    ) -> Result<Vec<WorkspaceStatus>, WorkspaceError> {
        let mut out = Vec::new();
        let present = self.paths()?;

        for file in tracked {
            match self.read_file(file.path.as_ref())? {
                None => out.push(WorkspaceStatus::Removed(file.path.clone())),
                Some(data) => {
                    let actual = strata_hash::hash_object(ObjectKind::Blob.as_str(), &data);
                    if actual != file.id {
                        out.push(WorkspaceStatus::Modified(file.path.clone()));
                    }
                }
            }
        }
        for path in present {
            if !tracked.iter().any(|f| f.path == path) {
                out.push(WorkspaceStatus::Added(path));
            }
        }

        out.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(out)
    }
}

/// In-memory workspace for tests and embedders without a real directory.
#[derive(Debug, Default, Clone)]
pub struct MemoryWorkspace {
    files: std::collections::BTreeMap<BString, (Vec<u8>, EntryMode)>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through the trait.
    pub fn seed(&mut self, path: impl Into<BString>, data: &[u8]) {
        self.files
            .insert(path.into(), (data.to_vec(), EntryMode::Regular));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Workspace for MemoryWorkspace {
    fn read_file(&self, path: &BStr) -> Result<Option<Vec<u8>>, WorkspaceError> {
        Ok(self.files.get(path).map(|(data, _)| data.clone()))
    }

    fn write_file(
        &mut self,
        path: &BStr,
        data: &[u8],
        mode: EntryMode,
    ) -> Result<(), WorkspaceError> {
        self.files.insert(path.into(), (data.to_vec(), mode));
        Ok(())
    }

    fn remove(&mut self, path: &BStr) -> Result<(), WorkspaceError> {
        self.files.remove(path);
        Ok(())
    }

    fn paths(&self) -> Result<Vec<BString>, WorkspaceError> {
        Ok(self.files.keys().cloned().collect())
    }
}

/// Errors surfaced by transport implementations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("transport protocol error: {0}")]
    Protocol(String),

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// A remote reference as advertised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAdvertisement {
    pub name: RefName,
    pub target: ObjectId,
}

/// Raw object bytes received from (or handed to) a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedObject {
    pub kind: ObjectKind,
    pub payload: Vec<u8>,
}

/// Per-ref outcome of a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    Accepted { name: RefName },
    Rejected { name: RefName, reason: String },
}

/// The network collaborator.
///
/// A transport is fully authenticated before any method returns; it never
/// calls back into the core.
pub trait Transport {
    /// Fetch: advertise matching refs and stream their objects.
    fn fetch(
        &mut self,
        refspecs: &[String],
    ) -> Result<(Vec<RefAdvertisement>, Vec<ReceivedObject>), TransportError>;

    /// Push objects and ref updates; one status per requested ref.
    fn push(
        &mut self,
        refspecs: &[String],
        objects: Vec<ReceivedObject>,
    ) -> Result<Vec<PushStatus>, TransportError>;
}

/// Authentication methods a transport may accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Token,
}

/// A credential produced by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    UserPass { username: String, password: String },
    Token(String),
}

/// Errors from credential acquisition.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The provider chose not to supply a credential.
    #[error("credential request declined")]
    Declined,

    #[error("credential acquisition failed: {0}")]
    Failed(String),
}

/// The credential collaborator, consumed by transport implementations.
/// A declined acquisition surfaces from the transport as
/// [`TransportError::AuthenticationFailed`].
pub trait CredentialProvider {
    fn acquire(
        &self,
        url: &str,
        username_hint: Option<&str>,
        allowed: &[AuthMethod],
    ) -> Result<Credential, CredentialError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bstr::BStr;

    #[test]
    fn memory_workspace_roundtrip() {
        let mut ws = MemoryWorkspace::new();
        ws.write_file(BStr::new("a.txt"), b"alpha", EntryMode::Regular)
            .unwrap();
        assert_eq!(ws.read_file(BStr::new("a.txt")).unwrap().unwrap(), b"alpha");
        assert!(ws.read_file(BStr::new("missing")).unwrap().is_none());
        ws.remove(BStr::new("a.txt")).unwrap();
        assert!(ws.is_empty());
    }

    #[test]
    fn list_changed_classifies() {
        let mut ws = MemoryWorkspace::new();
        ws.seed("kept.txt", b"same");
        ws.seed("edited.txt", b"new content");
        ws.seed("untracked.txt", b"brand new");

        let tracked = vec![
            TrackedFile {
                path: "kept.txt".into(),
                id: strata_hash::hash_object("blob", b"same"),
                mode: EntryMode::Regular,
            },
            TrackedFile {
                path: "edited.txt".into(),
                id: strata_hash::hash_object("blob", b"old content"),
                mode: EntryMode::Regular,
            },
            TrackedFile {
                path: "deleted.txt".into(),
                id: strata_hash::hash_object("blob", b"gone"),
                mode: EntryMode::Regular,
            },
        ];

        let changes = ws.list_changed(&tracked).unwrap();
        assert_eq!(
            changes,
            vec![
                WorkspaceStatus::Removed("deleted.txt".into()),
                WorkspaceStatus::Modified("edited.txt".into()),
                WorkspaceStatus::Added("untracked.txt".into()),
            ]
        );
    }
}
