//! The walk iterator.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use bstr::BString;
use strata_hash::ObjectId;
use strata_object::Commit;
use strata_repo::Repository;

use crate::path_filter::entry_at_path;
use crate::{RevWalkError, Sort};

/// Heap entry for time-ordered traversal.
struct QueueEntry {
    id: ObjectId,
    commit_time: i64,
    /// Tie-break so equal timestamps emit in insertion order.
    insertion: u64,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: newest first; earlier insertion wins ties.
        self.commit_time
            .cmp(&other.commit_time)
            .then_with(|| other.insertion.cmp(&self.insertion))
    }
}

/// Pending state of a Kahn-style topological traversal.
struct TopoState {
    /// Children not yet emitted, per commit.
    pending_children: HashMap<ObjectId, u32>,
    /// Commits whose children have all been emitted.
    ready: VecDeque<ObjectId>,
    /// Commit dates, for ordering the ready queue.
    dates: HashMap<ObjectId, i64>,
}

/// Lazy, restartable traversal of commits reachable from the pushed set.
///
/// A fresh walk recomputes from scratch; a partially consumed walk is
/// simply dropped.
pub struct Walk<'a> {
    repo: &'a Repository,
    sort: Sort,
    limit: Option<usize>,
    path_filter: Option<BString>,
    queue: BinaryHeap<QueueEntry>,
    seen: HashSet<ObjectId>,
    hidden: HashSet<ObjectId>,
    insertion: u64,
    emitted: usize,
    topo: Option<TopoState>,
    reversed: Option<Vec<ObjectId>>,
}

impl<'a> Walk<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            sort: Sort::default(),
            limit: None,
            path_filter: None,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            hidden: HashSet::new(),
            insertion: 0,
            emitted: 0,
            topo: None,
            reversed: None,
        }
    }

    /// Set the sort mode. Flags combine; an empty set means `TIME`.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Cap the number of emitted commits. `None` is unbounded.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Only emit commits where `path` differs from every parent.
    pub fn path_filter(mut self, path: impl Into<BString>) -> Self {
        self.path_filter = Some(path.into());
        self
    }

    /// Add a starting commit.
    pub fn push(&mut self, id: ObjectId) -> Result<(), RevWalkError> {
        if !self.seen.insert(id) {
            return Ok(());
        }
        let commit = self.read_commit(&id)?;
        self.enqueue(id, commit.committer.when.seconds);
        Ok(())
    }

    /// Exclude a commit and its entire ancestry from the walk.
    pub fn hide(&mut self, id: ObjectId) -> Result<(), RevWalkError> {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.hidden.insert(current) {
                continue;
            }
            let commit = self.read_commit(&current)?;
            for parent in &commit.parents {
                if !self.hidden.contains(parent) {
                    stack.push(*parent);
                }
            }
        }
        Ok(())
    }

    /// Push the repository's HEAD, if born.
    pub fn push_head(&mut self) -> Result<(), RevWalkError> {
        if let Some(id) = self.repo.head_id()? {
            self.push(id)?;
        }
        Ok(())
    }

    // --- internals ---

    fn enqueue(&mut self, id: ObjectId, commit_time: i64) {
        let entry = QueueEntry {
            id,
            commit_time,
            insertion: self.insertion,
        };
        self.insertion += 1;
        self.queue.push(entry);
    }

    fn read_commit(&self, id: &ObjectId) -> Result<Commit, RevWalkError> {
        match self.repo.objects().get_commit(id) {
            Ok(c) => Ok(c),
            Err(strata_odb::OdbError::NotFound(id)) => Err(RevWalkError::CommitNotFound(id)),
            Err(strata_odb::OdbError::UnexpectedKind { id, .. }) => {
                Err(RevWalkError::NotACommit(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pop the next commit by committer date, enqueueing parents.
    fn next_by_time(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        while let Some(entry) = self.queue.pop() {
            if self.hidden.contains(&entry.id) {
                continue;
            }
            let commit = self.read_commit(&entry.id)?;
            for parent in &commit.parents {
                if self.seen.insert(*parent) && !self.hidden.contains(parent) {
                    let parent_commit = self.read_commit(parent)?;
                    self.enqueue(*parent, parent_commit.committer.when.seconds);
                }
            }
            return Ok(Some(entry.id));
        }
        Ok(None)
    }

    /// Discover the reachable subgraph and count unemitted children.
    fn prepare_topo(&mut self) -> Result<(), RevWalkError> {
        if self.topo.is_some() {
            return Ok(());
        }

        let mut pending_children: HashMap<ObjectId, u32> = HashMap::new();
        let mut dates: HashMap<ObjectId, i64> = HashMap::new();
        let mut discovered: HashSet<ObjectId> = HashSet::new();
        let mut frontier: VecDeque<ObjectId> = VecDeque::new();

        while let Some(entry) = self.queue.pop() {
            if discovered.insert(entry.id) {
                frontier.push_back(entry.id);
            }
        }

        while let Some(id) = frontier.pop_front() {
            if self.hidden.contains(&id) {
                continue;
            }
            let commit = self.read_commit(&id)?;
            dates.insert(id, commit.committer.when.seconds);
            pending_children.entry(id).or_insert(0);

            for parent in &commit.parents {
                if self.hidden.contains(parent) {
                    continue;
                }
                *pending_children.entry(*parent).or_insert(0) += 1;
                if discovered.insert(*parent) {
                    frontier.push_back(*parent);
                }
            }
        }

        // Tips (no unemitted children) start the ready queue, newest first.
        let mut tips: Vec<ObjectId> = pending_children
            .iter()
            .filter(|(id, &n)| n == 0 && !self.hidden.contains(id))
            .map(|(id, _)| *id)
            .collect();
        tips.sort_by_key(|id| std::cmp::Reverse(dates.get(id).copied().unwrap_or(0)));

        self.topo = Some(TopoState {
            pending_children,
            ready: tips.into_iter().collect(),
            dates,
        });
        Ok(())
    }

    /// Pop the next commit in topological order.
    fn next_topological(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        self.prepare_topo()?;

        let Some(id) = self.topo.as_mut().and_then(|s| s.ready.pop_front()) else {
            return Ok(None);
        };

        let commit = self.read_commit(&id)?;
        let parents: Vec<ObjectId> = commit
            .parents
            .iter()
            .filter(|p| !self.hidden.contains(*p))
            .copied()
            .collect();

        let state = self.topo.as_mut().expect("prepared above");
        let mut released: Vec<(ObjectId, i64)> = Vec::new();
        for parent in parents {
            if let Some(n) = state.pending_children.get_mut(&parent) {
                *n = n.saturating_sub(1);
                if *n == 0 {
                    let date = state.dates.get(&parent).copied().unwrap_or(0);
                    released.push((parent, date));
                }
            }
        }
        released.sort_by_key(|(_, date)| std::cmp::Reverse(*date));
        for (parent, _) in released {
            state.ready.push_back(parent);
        }

        Ok(Some(id))
    }

    fn next_unfiltered(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        if self.sort.contains(Sort::REVERSE) {
            // Collect the forward order once, then drain from the back.
            if self.reversed.is_none() {
                let mut buffer = Vec::new();
                while let Some(id) = self.next_in_base_order()? {
                    buffer.push(id);
                }
                self.reversed = Some(buffer);
            }
            Ok(self.reversed.as_mut().and_then(|b| b.pop()))
        } else {
            self.next_in_base_order()
        }
    }

    fn next_in_base_order(&mut self) -> Result<Option<ObjectId>, RevWalkError> {
        if self.sort.contains(Sort::TOPOLOGICAL) {
            self.next_topological()
        } else {
            self.next_by_time()
        }
    }

    /// Does `path` differ between this commit and every parent?
    ///
    /// Root commits compare against the empty tree. One parent carrying the
    /// identical content is enough to hide the commit — that is what keeps
    /// merge commits that didn't touch the path out of the output.
    fn touches_path(&self, commit: &Commit, path: &BString) -> Result<bool, RevWalkError> {
        let own = entry_at_path(self.repo, &commit.tree, path.as_ref())?;

        if commit.parents.is_empty() {
            return Ok(own.is_some());
        }
        for parent in &commit.parents {
            let parent_commit = self.read_commit(parent)?;
            let theirs = entry_at_path(self.repo, &parent_commit.tree, path.as_ref())?;
            if theirs == own {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<ObjectId, RevWalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(limit) = self.limit {
                if self.emitted >= limit {
                    return None;
                }
            }

            let id = match self.next_unfiltered() {
                Ok(Some(id)) => id,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            if let Some(path) = self.path_filter.clone() {
                let commit = match self.read_commit(&id) {
                    Ok(c) => c,
                    Err(e) => return Some(Err(e)),
                };
                match self.touches_path(&commit, &path) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }

            self.emitted += 1;
            return Some(Ok(id));
        }
    }
}
