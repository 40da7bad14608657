//! Fetch/push glue over the transport collaborator.
//!
//! The transport delivers raw object bytes and ref advertisements; this
//! module ingests the objects through the validating `put` path and moves
//! remote-tracking references. Everything network-shaped stays on the
//! other side of the trait.

use strata_hash::ObjectId;
use strata_object::Signature;
use strata_ref::RefName;

use crate::collaborators::{PushStatus, ReceivedObject, Transport};
use crate::{RepoError, Repository};

/// What a fetch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    /// Objects received and stored (duplicates collapse by id).
    pub objects_received: usize,
    /// Remote-tracking refs created or moved.
    pub refs_updated: Vec<RefName>,
}

impl Repository {
    /// Fetch from a transport and update `refs/remotes/<remote>/...`.
    ///
    /// Received objects go through the validating store path, so a
    /// malformed object aborts the fetch before any ref moves. Tracking
    /// refs are force-updated: they mirror the remote, and history
    /// policing happens at merge time, not here.
    pub fn fetch(
        &self,
        transport: &mut dyn Transport,
        refspecs: &[String],
        remote: &str,
        committer: &Signature,
    ) -> Result<FetchSummary, RepoError> {
        let (advertisements, objects) = transport.fetch(refspecs)?;

        let mut stored = std::collections::HashSet::new();
        for ReceivedObject { kind, payload } in objects {
            stored.insert(self.objects().put(kind, &payload)?);
        }

        let mut refs_updated = Vec::new();
        for ad in advertisements {
            if !self.objects().exists(&ad.target) {
                return Err(RepoError::Odb(strata_odb::OdbError::NotFound(ad.target)));
            }
            let tracking = RefName::new(format!(
                "refs/remotes/{remote}/{}",
                ad.name.shorthand()
            ))?;
            let already = self.refs().exists(&tracking)
                && self.refs().resolve(&tracking)? == ad.target;
            if already {
                continue;
            }
            self.refs().create(
                &tracking,
                ad.target,
                true,
                committer,
                &format!("fetch: {}", ad.name),
            )?;
            refs_updated.push(tracking);
        }

        Ok(FetchSummary {
            objects_received: stored.len(),
            refs_updated,
        })
    }

    /// Push the given objects and refspecs through a transport.
    ///
    /// The caller names the object ids to send (typically gathered by a
    /// reachability walk); this reads them out of the store and forwards
    /// the transport's per-ref verdicts unchanged.
    pub fn push(
        &self,
        transport: &mut dyn Transport,
        refspecs: &[String],
        ids: &[ObjectId],
    ) -> Result<Vec<PushStatus>, RepoError> {
        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            let (kind, payload) = self.objects().get(id)?;
            objects.push(ReceivedObject { kind, payload });
        }
        Ok(transport.push(refspecs, objects)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{RefAdvertisement, TransportError};
    use strata_object::{ObjectKind, Timestamp};

    fn sig() -> Signature {
        Signature::new("Fetcher", "fetch@example.com", Timestamp::new(1700000000, 0)).unwrap()
    }

    /// Transport serving a fixed set of objects and refs.
    struct StaticTransport {
        refs: Vec<RefAdvertisement>,
        objects: Vec<ReceivedObject>,
        pushed: Vec<ReceivedObject>,
    }

    impl Transport for StaticTransport {
        fn fetch(
            &mut self,
            _refspecs: &[String],
        ) -> Result<(Vec<RefAdvertisement>, Vec<ReceivedObject>), TransportError> {
            Ok((self.refs.clone(), self.objects.clone()))
        }

        fn push(
            &mut self,
            refspecs: &[String],
            objects: Vec<ReceivedObject>,
        ) -> Result<Vec<PushStatus>, TransportError> {
            self.pushed = objects;
            refspecs
                .iter()
                .map(|spec| {
                    Ok(PushStatus::Accepted {
                        name: RefName::new(spec.clone())
                            .map_err(|e| TransportError::Protocol(e.to_string()))?,
                    })
                })
                .collect()
        }
    }

    /// Transport whose credential acquisition was declined.
    struct UnauthorizedTransport;

    impl Transport for UnauthorizedTransport {
        fn fetch(
            &mut self,
            _refspecs: &[String],
        ) -> Result<(Vec<RefAdvertisement>, Vec<ReceivedObject>), TransportError> {
            Err(TransportError::AuthenticationFailed(
                "credential request declined".into(),
            ))
        }

        fn push(
            &mut self,
            _refspecs: &[String],
            _objects: Vec<ReceivedObject>,
        ) -> Result<Vec<PushStatus>, TransportError> {
            Err(TransportError::AuthenticationFailed(
                "credential request declined".into(),
            ))
        }
    }

    #[test]
    fn fetch_stores_objects_and_tracks_refs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let payload = b"remote blob".to_vec();
        let id = strata_hash::hash_object("blob", &payload);
        let mut transport = StaticTransport {
            refs: vec![RefAdvertisement {
                name: RefName::branch("main").unwrap(),
                target: id,
            }],
            objects: vec![ReceivedObject {
                kind: ObjectKind::Blob,
                payload,
            }],
            pushed: Vec::new(),
        };

        let summary = repo
            .fetch(&mut transport, &[String::from("refs/heads/*")], "origin", &sig())
            .unwrap();

        assert_eq!(summary.objects_received, 1);
        assert_eq!(summary.refs_updated.len(), 1);
        assert!(repo.objects().exists(&id));
        assert_eq!(
            repo.refs()
                .resolve(&RefName::new("refs/remotes/origin/main").unwrap())
                .unwrap(),
            id
        );
    }

    #[test]
    fn fetch_is_idempotent_on_tracking_refs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let payload = b"stable".to_vec();
        let mut transport = StaticTransport {
            refs: vec![RefAdvertisement {
                name: RefName::branch("main").unwrap(),
                target: strata_hash::hash_object("blob", &payload),
            }],
            objects: vec![ReceivedObject {
                kind: ObjectKind::Blob,
                payload,
            }],
            pushed: Vec::new(),
        };

        repo.fetch(&mut transport, &[], "origin", &sig()).unwrap();
        let second = repo.fetch(&mut transport, &[], "origin", &sig()).unwrap();
        assert!(second.refs_updated.is_empty());
    }

    #[test]
    fn fetch_rejects_malformed_objects_before_moving_refs() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let mut transport = StaticTransport {
            refs: vec![RefAdvertisement {
                name: RefName::branch("main").unwrap(),
                target: ObjectId::from_bytes(&[7; 32]).unwrap(),
            }],
            objects: vec![ReceivedObject {
                kind: ObjectKind::Tree,
                payload: b"not a tree".to_vec(),
            }],
            pushed: Vec::new(),
        };

        assert!(repo.fetch(&mut transport, &[], "origin", &sig()).is_err());
        assert!(!repo
            .refs()
            .exists(&RefName::new("refs/remotes/origin/main").unwrap()));
    }

    #[test]
    fn fetch_rejects_dangling_advertisement() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let mut transport = StaticTransport {
            refs: vec![RefAdvertisement {
                name: RefName::branch("main").unwrap(),
                target: ObjectId::from_bytes(&[9; 32]).unwrap(),
            }],
            objects: Vec::new(),
            pushed: Vec::new(),
        };

        assert!(repo.fetch(&mut transport, &[], "origin", &sig()).is_err());
    }

    #[test]
    fn push_forwards_objects_and_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = repo.objects().put(ObjectKind::Blob, b"to send").unwrap();

        let mut transport = StaticTransport {
            refs: Vec::new(),
            objects: Vec::new(),
            pushed: Vec::new(),
        };
        let statuses = repo
            .push(&mut transport, &[String::from("refs/heads/main")], &[id])
            .unwrap();

        assert_eq!(statuses.len(), 1);
        assert!(matches!(statuses[0], PushStatus::Accepted { .. }));
        assert_eq!(transport.pushed.len(), 1);
        assert_eq!(transport.pushed[0].payload, b"to send");
    }

    #[test]
    fn authentication_failure_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        let err = repo
            .fetch(&mut UnauthorizedTransport, &[], "origin", &sig())
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Transport(TransportError::AuthenticationFailed(_))
        ));
    }
}
