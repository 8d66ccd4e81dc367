use crate::domain::CommitRecord;
use crate::error::{ReleaseError, Result};
use crate::git::{ArtifactSet, ReleaseRecord, RepositoryGateway, TagRef};
use chrono::{TimeZone, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Cred, CredentialType, Direction, FetchOptions, Index, IndexEntry,
    IndexTime, Oid, PushOptions, RemoteCallbacks, Repository, Signature, Sort,
};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Notes ref that holds published release notes.
pub const RELEASE_NOTES_REF: &str = "refs/notes/releases";

/// Repository gateway backed by a local clone and one configured remote.
///
/// Tags and release notes are pushed to the remote as they are created, so a
/// release is visible as soon as [RepositoryGateway::create_tag] returns.
/// Release notes are stored as a git note on the tagged commit.
pub struct Git2Gateway {
    repo: Mutex<Repository>,
    remote: String,
}

impl Git2Gateway {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P, remote: impl Into<String>) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Ok(Git2Gateway::from_git2(repo, remote))
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Repository, remote: impl Into<String>) -> Self {
        Git2Gateway {
            repo: Mutex::new(repo),
            remote: remote.into(),
        }
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_remote(&self, repo: &Repository) -> bool {
        repo.find_remote(&self.remote).is_ok()
    }

    fn push(&self, repo: &Repository, refspecs: &[String]) -> Result<()> {
        let mut remote = repo.find_remote(&self.remote).map_err(|e| {
            ReleaseError::remote(format!("Cannot find remote '{}': {}", self.remote, e))
        })?;

        let mut callbacks = remote_callbacks();
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "Remote rejected {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let specs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        remote
            .push(&specs, Some(&mut options))
            .map_err(|e| match e.class() {
                git2::ErrorClass::Net => {
                    ReleaseError::remote(format!("Network error during push: {}", e))
                }
                _ => ReleaseError::remote(format!("Push to '{}' failed: {}", self.remote, e)),
            })?;

        debug!(remote = %self.remote, refspecs = ?refspecs, "pushed");
        Ok(())
    }

    /// Ask the remote directly for a tag that is not present locally.
    fn remote_tag_target(&self, repo: &Repository, tag: &str) -> Result<Option<String>> {
        let mut remote = match repo.find_remote(&self.remote) {
            Ok(remote) => remote,
            Err(_) => return Ok(None),
        };

        let connection = remote
            .connect_auth(Direction::Fetch, Some(remote_callbacks()), None)
            .map_err(|e| {
                ReleaseError::remote(format!("Cannot connect to '{}': {}", self.remote, e))
            })?;

        let plain = format!("refs/tags/{}", tag);
        let peeled = format!("{}^{{}}", plain);
        let mut found = None;
        for head in connection.list()? {
            if head.name() == peeled {
                return Ok(Some(head.oid().to_string()));
            }
            if head.name() == plain {
                found = Some(head.oid().to_string());
            }
        }
        Ok(found)
    }
}

/// Credential callbacks: SSH keys from ~/.ssh, then the SSH agent, then
/// whatever libgit2 finds by default.
fn remote_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed_types| {
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            if let Some(home) = dirs::home_dir() {
                for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                    let path = home.join(".ssh").join(key);
                    if path.exists() {
                        if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                            return Ok(cred);
                        }
                    }
                }
            }

            if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                return Ok(cred);
            }
        }

        Cred::default()
    });
    callbacks
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(sig) => Ok(sig.to_owned()),
        Err(_) => Ok(Signature::now("git-release", "git-release@localhost")?),
    }
}

fn branch_commit<'r>(repo: &'r Repository, branch: &str) -> Result<Commit<'r>> {
    let branch_ref = repo.find_branch(branch, BranchType::Local).map_err(|e| {
        ReleaseError::HistoryUnavailable(format!("Cannot find branch '{}': {}", branch, e))
    })?;
    Ok(branch_ref.into_reference().peel_to_commit()?)
}

fn local_tag_commit(repo: &Repository, tag: &str) -> Result<Option<Oid>> {
    match repo.find_reference(&format!("refs/tags/{}", tag)) {
        Ok(reference) => {
            let commit = reference
                .peel_to_commit()
                .map_err(|e| ReleaseError::tag(format!("Cannot peel tag '{}': {}", tag, e)))?;
            Ok(Some(commit.id()))
        }
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(ReleaseError::tag(format!("Cannot find tag '{}': {}", tag, e))),
    }
}

fn head_is_branch(repo: &Repository, branch: &str) -> bool {
    match repo.head() {
        Ok(head) => head.is_branch() && head.shorthand() == Some(branch),
        Err(_) => false,
    }
}

/// Fast-forward `branch` to its remote-tracking counterpart when possible.
/// Diverged or missing branches are left alone.
fn fast_forward(repo: &Repository, branch: &str, remote: &str) -> Result<()> {
    let tracking = format!("refs/remotes/{}/{}", remote, branch);
    let remote_oid = match repo.find_reference(&tracking).ok().and_then(|r| r.target()) {
        Some(oid) => oid,
        None => return Ok(()),
    };

    let local = match repo.find_branch(branch, BranchType::Local) {
        Ok(local) => local,
        Err(_) => {
            let commit = repo.find_commit(remote_oid)?;
            repo.branch(branch, &commit, false)?;
            return Ok(());
        }
    };

    let mut local_ref = local.into_reference();
    let local_oid = match local_ref.target() {
        Some(oid) => oid,
        None => return Ok(()),
    };

    if local_oid == remote_oid || !repo.graph_descendant_of(remote_oid, local_oid)? {
        return Ok(());
    }

    if !repo.is_bare() && head_is_branch(repo, branch) {
        let target = repo.find_object(remote_oid, None)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
    }
    local_ref.set_target(remote_oid, &format!("fast-forward from {}", tracking))?;
    debug!(branch, from = %local_oid, to = %remote_oid, "fast-forwarded");
    Ok(())
}

fn index_entry(path: &Path, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: size as u32,
        id: Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: path.to_string_lossy().replace('\\', "/").into_bytes(),
    }
}

impl RepositoryGateway for Git2Gateway {
    fn fetch(&self, branch: &str) -> Result<()> {
        let repo = self.repo();
        let mut remote = match repo.find_remote(&self.remote) {
            Ok(remote) => remote,
            Err(_) => {
                warn!(remote = %self.remote, "remote not configured, using local history");
                return Ok(());
            }
        };

        let mut options = FetchOptions::new();
        options.remote_callbacks(remote_callbacks());

        let heads = format!("+refs/heads/*:refs/remotes/{}/*", self.remote);
        let refspecs = [heads.as_str(), "+refs/tags/*:refs/tags/*", "+refs/notes/*:refs/notes/*"];
        remote
            .fetch(&refspecs, Some(&mut options), None)
            .map_err(|e| {
                ReleaseError::HistoryUnavailable(format!(
                    "Failed to fetch from remote '{}': {}",
                    self.remote, e
                ))
            })?;

        info!(remote = %self.remote, "fetched");
        fast_forward(&repo, branch, &self.remote)
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        let repo = self.repo();
        let head = branch_commit(&repo, branch)?.id();
        Ok(head.to_string())
    }

    fn list_tags(&self, branch: &str) -> Result<Vec<TagRef>> {
        let repo = self.repo();
        let head = branch_commit(&repo, branch)?.id();

        let mut tags = Vec::new();
        for name in repo.tag_names(None)?.iter().flatten() {
            let Some(target) = local_tag_commit(&repo, name)? else {
                continue;
            };
            if target == head || repo.graph_descendant_of(head, target)? {
                tags.push(TagRef {
                    name: name.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Ok(tags)
    }

    fn list_commits_since(&self, branch: &str, since_tag: Option<&str>) -> Result<Vec<CommitRecord>> {
        let repo = self.repo();
        let collect = || -> Result<Vec<CommitRecord>> {
            let head = branch_commit(&repo, branch)?.id();

            let mut revwalk = repo.revwalk()?;
            revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
            revwalk.push(head)?;

            if let Some(tag) = since_tag {
                let stop = local_tag_commit(&repo, tag)?.ok_or_else(|| {
                    ReleaseError::HistoryUnavailable(format!("Tag not found: {}", tag))
                })?;
                revwalk.hide(stop)?;
            }

            let mut commits = Vec::new();
            for oid in revwalk {
                let commit = repo.find_commit(oid?)?;
                let timestamp = Utc
                    .timestamp_opt(commit.time().seconds(), 0)
                    .single()
                    .unwrap_or_default();
                let message = String::from_utf8_lossy(commit.message_bytes()).into_owned();
                commits.push(CommitRecord::new(commit.id().to_string(), timestamp, message));
            }
            Ok(commits)
        };

        collect().map_err(ReleaseError::history_unavailable)
    }

    fn tag_target(&self, tag: &str) -> Result<Option<String>> {
        let repo = self.repo();
        if let Some(oid) = local_tag_commit(&repo, tag)? {
            return Ok(Some(oid.to_string()));
        }
        self.remote_tag_target(&repo, tag)
    }

    fn create_tag(&self, record: &ReleaseRecord) -> Result<()> {
        let repo = self.repo();

        if let Some(existing) = local_tag_commit(&repo, &record.tag)? {
            return Err(ReleaseError::TagConflict {
                tag: record.tag.clone(),
                target: existing.to_string(),
            });
        }

        let target = Oid::from_str(&record.target)
            .and_then(|oid| repo.find_commit(oid))
            .map_err(|e| ReleaseError::tag(format!("Cannot find commit {}: {}", record.target, e)))?;
        let sig = signature(&repo)?;
        repo.tag(
            &record.tag,
            target.as_object(),
            &sig,
            &format!("Release {}", record.version),
            false,
        )
        .map_err(|e| ReleaseError::tag(format!("Cannot create tag: {}", e)))?;

        if !self.has_remote(&repo) {
            warn!(tag = %record.tag, "no remote configured, tag created locally only");
            return Ok(());
        }

        let refspec = format!("refs/tags/{0}:refs/tags/{0}", record.tag);
        if let Err(err) = self.push(&repo, &[refspec]) {
            // Leave no local tag behind so a rerun starts clean
            if let Err(e) = repo.tag_delete(&record.tag) {
                warn!(tag = %record.tag, error = %e, "could not remove local tag");
            }
            return Err(err);
        }
        Ok(())
    }

    fn publish_release(&self, record: &ReleaseRecord) -> Result<()> {
        let repo = self.repo();
        let target = Oid::from_str(&record.target)?;
        let sig = signature(&repo)?;

        repo.note(&sig, &sig, Some(RELEASE_NOTES_REF), target, &record.notes, true)?;

        if self.has_remote(&repo) {
            self.push(&repo, &[format!("{0}:{0}", RELEASE_NOTES_REF)])?;
        }
        Ok(())
    }

    fn push_artifacts(&self, branch: &str, files: &ArtifactSet, message: &str) -> Result<String> {
        let repo = self.repo();
        let parent = branch_commit(&repo, branch)?;

        let mut index = Index::new()?;
        index.read_tree(&parent.tree()?)?;
        for (path, content) in files {
            index.add_frombuffer(&index_entry(path, content.len()), content.as_bytes())?;
        }
        let tree_id = index.write_tree_to(&repo)?;
        let tree = repo.find_tree(tree_id)?;

        let sig = signature(&repo)?;
        let branch_ref = format!("refs/heads/{}", branch);
        let commit = repo.commit(Some(&branch_ref), &sig, &sig, message, &tree, &[&parent])?;
        info!(%commit, branch, files = files.len(), "release commit created");

        // Keep the checkout in step with the branch it tracks
        if let (Some(workdir), true) = (repo.workdir(), head_is_branch(&repo, branch)) {
            let mut work_index = repo.index()?;
            for (path, content) in files {
                let full = workdir.join(path);
                if let Some(dir) = full.parent() {
                    fs::create_dir_all(dir)?;
                }
                fs::write(&full, content)?;
                work_index.add_path(path)?;
            }
            work_index.write()?;
        }

        if self.has_remote(&repo) {
            self.push(&repo, &[format!("{0}:{0}", branch_ref)])?;
        } else {
            warn!(branch, "no remote configured, release commit kept locally");
        }

        Ok(commit.to_string())
    }

    fn read_file(&self, branch: &str, path: &Path) -> Result<Option<String>> {
        let repo = self.repo();
        let tree = branch_commit(&repo, branch)?.tree()?;

        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let blob = repo.find_blob(entry.id())?;
        let content = String::from_utf8_lossy(blob.content()).into_owned();
        Ok(Some(content))
    }
}
