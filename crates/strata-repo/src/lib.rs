//! The repository context.
//!
//! A [`Repository`] is an explicit value owning an object store and a
//! reference store; it is passed by reference into every operation. There
//! is no process-wide repository state and no ambient "last error" slot —
//! everything flows through arguments and `Result`s.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/objects/...      loose objects and objects/pack/
//! <root>/refs/...         loose references
//! <root>/packed-refs      bulk reference overflow
//! <root>/logs/...         reflogs
//! <root>/HEAD             symbolic reference to the current branch
//! ```

pub mod collaborators;
mod remote;

pub use collaborators::{
    AuthMethod, Credential, CredentialError, CredentialProvider, MemoryWorkspace, PushStatus,
    ReceivedObject, RefAdvertisement, TrackedFile, Transport, TransportError, Workspace,
    WorkspaceError, WorkspaceStatus,
};
pub use remote::FetchSummary;

use std::path::{Path, PathBuf};

use strata_hash::ObjectId;
use strata_object::{Commit, Object, ObjectKind, Signature, Tag};
use strata_odb::ObjectStore;
use strata_ref::{RefName, RefStore, Reference};

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a strata repository: {0}")]
    NotARepository(PathBuf),

    #[error("HEAD is unborn and the commit has parents")]
    UnbornHeadWithParents,

    #[error("commit parent {0} does not exist")]
    MissingParent(ObjectId),

    #[error("commit tree {0} does not exist")]
    MissingTree(ObjectId),

    #[error(transparent)]
    Odb(#[from] strata_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] strata_ref::RefError),

    #[error(transparent)]
    Object(#[from] strata_object::ObjectError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The default branch a fresh repository's HEAD points at.
pub const DEFAULT_BRANCH: &str = "main";

/// An open repository: object store plus reference store.
pub struct Repository {
    root: PathBuf,
    objects: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Create a fresh repository at `root` and point HEAD at the default
    /// branch (which is unborn until the first commit).
    pub fn init(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("objects"))?;
        std::fs::create_dir_all(root.join("refs"))?;
        std::fs::create_dir_all(root.join("logs"))?;

        let refs = RefStore::open(&root);
        refs.set_symbolic(
            &RefName::new("HEAD")?,
            &RefName::branch(DEFAULT_BRANCH)?,
        )?;

        let objects = ObjectStore::open(root.join("objects"))?;
        Ok(Self {
            root,
            objects,
            refs,
        })
    }

    /// Open an existing repository.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RepoError> {
        let root = root.as_ref().to_path_buf();
        if !root.join("objects").is_dir() || !root.join("HEAD").is_file() {
            return Err(RepoError::NotARepository(root));
        }
        let objects = ObjectStore::open(root.join("objects"))?;
        let refs = RefStore::open(&root);
        Ok(Self {
            root,
            objects,
            refs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Hash a payload without storing it.
    pub fn hash(&self, kind: ObjectKind, payload: &[u8]) -> ObjectId {
        ObjectStore::hash(kind, payload)
    }

    /// Read HEAD itself (usually symbolic).
    pub fn head(&self) -> Result<Reference, RepoError> {
        Ok(self.refs.read(&RefName::new("HEAD")?)?)
    }

    /// The commit id HEAD resolves to, or `None` on an unborn branch.
    pub fn head_id(&self) -> Result<Option<ObjectId>, RepoError> {
        match self.refs.resolve(&RefName::new("HEAD")?) {
            Ok(id) => Ok(Some(id)),
            Err(strata_ref::RefError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The branch HEAD points at, if HEAD is symbolic.
    pub fn current_branch(&self) -> Result<Option<RefName>, RepoError> {
        Ok(self.head()?.symbolic_target().cloned())
    }

    /// Re-point HEAD at a branch.
    pub fn set_head(&self, branch: &RefName) -> Result<(), RepoError> {
        Ok(self.refs.set_symbolic(&RefName::new("HEAD")?, branch)?)
    }

    /// Create a branch at `target`.
    pub fn create_branch(
        &self,
        short: &str,
        target: ObjectId,
        force: bool,
        committer: &Signature,
    ) -> Result<RefName, RepoError> {
        let name = RefName::branch(short)?;
        self.refs.create(
            &name,
            target,
            force,
            committer,
            &format!("branch: created from {}", target.to_hex()),
        )?;
        Ok(name)
    }

    /// Write a commit object and advance the current branch to it.
    ///
    /// The tree and all parents must already exist in the object store.
    /// The branch moves by compare-and-swap against the commit's first
    /// parent, so a racing commit on the same branch loses cleanly; a root
    /// commit creates the unborn branch instead.
    pub fn commit(
        &self,
        tree: ObjectId,
        parents: Vec<ObjectId>,
        author: Signature,
        committer: Signature,
        message: &str,
    ) -> Result<ObjectId, RepoError> {
        if !self.objects.exists(&tree) {
            return Err(RepoError::MissingTree(tree));
        }
        for parent in &parents {
            if !self.objects.exists(parent) {
                return Err(RepoError::MissingParent(*parent));
            }
        }

        let commit = Commit {
            tree,
            parents: parents.clone(),
            author,
            committer: committer.clone(),
            signature: None,
            message: message.into(),
        };
        let id = self.objects.put_object(&Object::Commit(commit))?;

        let reflog_message = format!("commit: {}", first_line(message));
        match self.head()?.symbolic_target() {
            Some(branch) => match parents.first() {
                Some(first_parent) if self.refs.exists(branch) => {
                    self.refs
                        .update(branch, first_parent, id, &committer, &reflog_message)?;
                }
                Some(_) => return Err(RepoError::UnbornHeadWithParents),
                None => {
                    self.refs
                        .create(branch, id, false, &committer, &reflog_message)?;
                }
            },
            None => {
                // Detached HEAD: no branch involved, HEAD itself holds an id.
                let head = RefName::new("HEAD")?;
                match parents.first() {
                    Some(first_parent) => self.refs.update(
                        &head,
                        first_parent,
                        id,
                        &committer,
                        &reflog_message,
                    )?,
                    None => self
                        .refs
                        .create(&head, id, true, &committer, &reflog_message)?,
                }
            }
        }

        Ok(id)
    }

    /// Create an annotated tag object plus its `refs/tags/` reference.
    pub fn create_tag(
        &self,
        short: &str,
        target: ObjectId,
        tagger: Signature,
        message: &str,
        force: bool,
    ) -> Result<ObjectId, RepoError> {
        let header = self.objects.read_header(&target)?;
        let tag = Tag {
            target,
            target_kind: header.kind,
            name: short.into(),
            tagger: tagger.clone(),
            message: message.into(),
        };
        let id = self.objects.put_object(&Object::Tag(tag))?;
        self.refs.create(
            &RefName::tag(short)?,
            id,
            force,
            &tagger,
            &format!("tag: {short}"),
        )?;
        Ok(id)
    }

    /// Create a lightweight tag reference pointing straight at `target`.
    pub fn create_lightweight_tag(
        &self,
        short: &str,
        target: ObjectId,
        committer: &Signature,
        force: bool,
    ) -> Result<RefName, RepoError> {
        let name = RefName::tag(short)?;
        self.refs
            .create(&name, target, force, committer, &format!("tag: {short}"))?;
        Ok(name)
    }
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_object::{EntryMode, Timestamp, Tree, TreeEntry};

    fn sig() -> Signature {
        Signature::new("Repo User", "user@example.com", Timestamp::new(1700000000, 0)).unwrap()
    }

    fn write_tree(repo: &Repository, file_content: &[u8]) -> ObjectId {
        let blob = repo.objects().put(ObjectKind::Blob, file_content).unwrap();
        let tree: Tree = [TreeEntry::new(EntryMode::Regular, "file.txt", blob)]
            .into_iter()
            .collect();
        repo.objects().put_object(&Object::Tree(tree)).unwrap()
    }

    #[test]
    fn init_points_head_at_unborn_main() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert_eq!(
            repo.current_branch().unwrap().unwrap().as_str(),
            "refs/heads/main"
        );
        assert!(repo.head_id().unwrap().is_none());
    }

    #[test]
    fn open_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(RepoError::NotARepository(_))
        ));
    }

    #[test]
    fn first_commit_creates_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree = write_tree(&repo, b"v1\n");

        let id = repo
            .commit(tree, vec![], sig(), sig(), "initial commit")
            .unwrap();
        assert_eq!(repo.head_id().unwrap(), Some(id));

        let commit = repo.objects().get_commit(&id).unwrap();
        assert!(commit.is_root());
        assert_eq!(commit.tree, tree);
    }

    #[test]
    fn second_commit_advances_branch() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = repo
            .commit(write_tree(&repo, b"v1\n"), vec![], sig(), sig(), "one")
            .unwrap();
        let second = repo
            .commit(write_tree(&repo, b"v2\n"), vec![first], sig(), sig(), "two")
            .unwrap();

        assert_eq!(repo.head_id().unwrap(), Some(second));
        let log = repo
            .refs()
            .reflog(&RefName::branch("main").unwrap())
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].old_id, first);
        assert_eq!(log[0].new_id, second);
    }

    #[test]
    fn commit_requires_existing_tree_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ghost = ObjectId::from_bytes(&[0xAB; 32]).unwrap();

        assert!(matches!(
            repo.commit(ghost, vec![], sig(), sig(), "bad tree"),
            Err(RepoError::MissingTree(_))
        ));

        let tree = write_tree(&repo, b"ok\n");
        assert!(matches!(
            repo.commit(tree, vec![ghost], sig(), sig(), "bad parent"),
            Err(RepoError::MissingParent(_))
        ));
    }

    #[test]
    fn commit_with_parents_on_unborn_head_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree = write_tree(&repo, b"x\n");
        // Parent existence is checked first, so use a stored object's id.
        let stored = repo.objects().put(ObjectKind::Blob, b"stand-in").unwrap();
        assert!(matches!(
            repo.commit(tree, vec![stored], sig(), sig(), "no base"),
            Err(RepoError::UnbornHeadWithParents)
        ));
    }

    #[test]
    fn branches_and_tags() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let commit = repo
            .commit(write_tree(&repo, b"v1\n"), vec![], sig(), sig(), "one")
            .unwrap();

        repo.create_branch("topic", commit, false, &sig()).unwrap();
        assert_eq!(
            repo.refs()
                .resolve(&RefName::branch("topic").unwrap())
                .unwrap(),
            commit
        );

        let tag_id = repo
            .create_tag("v1.0", commit, sig(), "first release", false)
            .unwrap();
        let (peeled, kind) = repo.objects().peel(&tag_id).unwrap();
        assert_eq!(peeled, commit);
        assert_eq!(kind, ObjectKind::Commit);
    }

    #[test]
    fn switching_branch_moves_head() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let commit = repo
            .commit(write_tree(&repo, b"v1\n"), vec![], sig(), sig(), "one")
            .unwrap();
        let topic = repo.create_branch("topic", commit, false, &sig()).unwrap();

        repo.set_head(&topic).unwrap();
        assert_eq!(repo.current_branch().unwrap(), Some(topic));
        assert_eq!(repo.head_id().unwrap(), Some(commit));
    }
}
