//! Ordering guarantees of the revision walk.

use strata_hash::ObjectId;
use strata_object::{Commit, EntryMode, Object, ObjectKind, Signature, Timestamp, Tree, TreeEntry};
use strata_repo::Repository;
use strata_revwalk::{Sort, Walk};

fn sig(seconds: i64) -> Signature {
    Signature::new("Walker", "walk@example.com", Timestamp::new(seconds, 0)).unwrap()
}

/// Store a commit whose tree holds the given files, at the given time.
fn commit_with_files(
    repo: &Repository,
    files: &[(&str, &[u8])],
    parents: Vec<ObjectId>,
    seconds: i64,
) -> ObjectId {
    let mut tree = Tree::new();
    for (path, content) in files {
        let blob = repo.objects().put(ObjectKind::Blob, content).unwrap();
        tree.insert(TreeEntry::new(EntryMode::Regular, *path, blob));
    }
    let tree_id = repo.objects().put_object(&Object::Tree(tree)).unwrap();
    let commit = Commit {
        tree: tree_id,
        parents,
        author: sig(seconds),
        committer: sig(seconds),
        signature: None,
        message: format!("at {seconds}").into(),
    };
    repo.objects().put_object(&Object::Commit(commit)).unwrap()
}

fn ids(walk: Walk<'_>) -> Vec<ObjectId> {
    walk.map(|r| r.unwrap()).collect()
}

#[test]
fn linear_chain_topological() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 100);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 200);
    let c = commit_with_files(&repo, &[("f", b"3")], vec![b], 300);

    let mut walk = Walk::new(&repo).sort(Sort::TOPOLOGICAL);
    walk.push(c).unwrap();
    assert_eq!(ids(walk), vec![c, b, a]);
}

#[test]
fn linear_chain_time_order() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 100);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 200);
    let c = commit_with_files(&repo, &[("f", b"3")], vec![b], 300);

    let mut walk = Walk::new(&repo).sort(Sort::TIME);
    walk.push(c).unwrap();
    assert_eq!(ids(walk), vec![c, b, a]);
}

#[test]
fn reverse_flips_order() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 100);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 200);
    let c = commit_with_files(&repo, &[("f", b"3")], vec![b], 300);

    let mut walk = Walk::new(&repo).sort(Sort::TOPOLOGICAL | Sort::REVERSE);
    walk.push(c).unwrap();
    assert_eq!(ids(walk), vec![a, b, c]);
}

#[test]
fn topological_beats_skewed_clocks() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    // The child predates its parent on the wall clock.
    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 500);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 100);

    let mut walk = Walk::new(&repo).sort(Sort::TOPOLOGICAL);
    walk.push(b).unwrap();
    assert_eq!(ids(walk), vec![b, a]);
}

#[test]
fn merge_emits_before_both_parents_in_topo_order() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let root = commit_with_files(&repo, &[("f", b"0")], vec![], 100);
    let left = commit_with_files(&repo, &[("f", b"l")], vec![root], 200);
    let right = commit_with_files(&repo, &[("f", b"r")], vec![root], 250);
    let merge = commit_with_files(&repo, &[("f", b"m")], vec![left, right], 300);

    let mut walk = Walk::new(&repo).sort(Sort::TOPOLOGICAL);
    walk.push(merge).unwrap();
    let order = ids(walk);

    assert_eq!(order.len(), 4);
    assert_eq!(order[0], merge);
    assert_eq!(order[3], root);
    let pos = |id| order.iter().position(|&x| x == id).unwrap();
    assert!(pos(merge) < pos(left));
    assert!(pos(merge) < pos(right));
    assert!(pos(left) < pos(root));
    assert!(pos(right) < pos(root));
}

#[test]
fn shared_ancestry_visited_once() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let root = commit_with_files(&repo, &[("f", b"0")], vec![], 100);
    let left = commit_with_files(&repo, &[("f", b"l")], vec![root], 200);
    let right = commit_with_files(&repo, &[("f", b"r")], vec![root], 300);

    let mut walk = Walk::new(&repo);
    walk.push(left).unwrap();
    walk.push(right).unwrap();
    let order = ids(walk);
    assert_eq!(order.len(), 3, "root must appear exactly once");
}

#[test]
fn limit_caps_output() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let mut tip = commit_with_files(&repo, &[("f", b"0")], vec![], 100);
    for i in 1..10 {
        tip = commit_with_files(&repo, &[("f", format!("{i}").as_bytes())], vec![tip], 100 + i);
    }

    let mut walk = Walk::new(&repo).limit(Some(3));
    walk.push(tip).unwrap();
    assert_eq!(ids(walk).len(), 3);

    let mut unbounded = Walk::new(&repo).limit(None);
    unbounded.push(tip).unwrap();
    assert_eq!(ids(unbounded).len(), 10);
}

#[test]
fn hide_excludes_whole_ancestry() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 100);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 200);
    let c = commit_with_files(&repo, &[("f", b"3")], vec![b], 300);

    let mut walk = Walk::new(&repo);
    walk.push(c).unwrap();
    walk.hide(b).unwrap();
    assert_eq!(ids(walk), vec![c]);
}

#[test]
fn walk_is_lazy_and_restartable() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("f", b"1")], vec![], 100);
    let b = commit_with_files(&repo, &[("f", b"2")], vec![a], 200);

    // Pull one item and drop the walk; nothing to clean up.
    let mut walk = Walk::new(&repo);
    walk.push(b).unwrap();
    assert_eq!(walk.next().unwrap().unwrap(), b);
    drop(walk);

    // A fresh walk recomputes from scratch.
    let mut walk = Walk::new(&repo);
    walk.push(b).unwrap();
    assert_eq!(ids(walk), vec![b, a]);
}

#[test]
fn path_filter_emits_only_touching_commits() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    // A lacks the path, B introduces it, C only touches an unrelated file.
    let a = commit_with_files(&repo, &[("other", b"x")], vec![], 100);
    let b = commit_with_files(&repo, &[("other", b"x"), ("tracked", b"v1")], vec![a], 200);
    let c = commit_with_files(&repo, &[("other", b"y"), ("tracked", b"v1")], vec![b], 300);

    let mut walk = Walk::new(&repo).path_filter("tracked");
    walk.push(c).unwrap();
    assert_eq!(ids(walk), vec![b]);
}

#[test]
fn path_filter_includes_root_that_introduces_path() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let a = commit_with_files(&repo, &[("tracked", b"v1")], vec![], 100);
    let b = commit_with_files(&repo, &[("tracked", b"v2")], vec![a], 200);

    let mut walk = Walk::new(&repo).path_filter("tracked");
    walk.push(b).unwrap();
    assert_eq!(ids(walk), vec![b, a]);
}

#[test]
fn path_filter_hides_merge_matching_one_parent() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let root = commit_with_files(&repo, &[("tracked", b"v1"), ("side", b"0")], vec![], 100);
    // Left edits the tracked path, right edits something else.
    let left = commit_with_files(&repo, &[("tracked", b"v2"), ("side", b"0")], vec![root], 200);
    let right = commit_with_files(&repo, &[("tracked", b"v1"), ("side", b"1")], vec![root], 250);
    // The merge takes left's tracked content: identical to one parent,
    // so the merge itself didn't touch the path.
    let merge = commit_with_files(
        &repo,
        &[("tracked", b"v2"), ("side", b"1")],
        vec![left, right],
        300,
    );

    let mut walk = Walk::new(&repo).sort(Sort::TOPOLOGICAL).path_filter("tracked");
    walk.push(merge).unwrap();
    assert_eq!(ids(walk), vec![left, root]);
}
