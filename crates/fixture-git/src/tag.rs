//! Tag recreation: delete a tag everywhere, then create and publish it again
//! at a new target.

use git2::Oid;

use crate::absence;
use crate::error::TagLocus;
use crate::push::{self, RefUpdate, Refspec};
use crate::remote::REMOTE_NAME;
use crate::repository::RepositoryHandle;
use crate::stage::Identity;
use crate::{Error, Result};

/// Message carried by every recreated tag.
pub const TAG_MESSAGE: &str = "create tag";

/// An annotated tag as published by [`recreate_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    /// Commit the tag points at
    pub target: Oid,
    pub tagger: Identity,
    pub message: String,
}

impl TagRef {
    pub fn refname(&self) -> String {
        format!("refs/tags/{}", self.name)
    }
}

/// Point tag `name` at `target`, locally and on the remote.
///
/// Local tags are refreshed from the remote first. Any existing tag of
/// that name is then deleted in both places, so the remote ends with
/// exactly one `name` whatever it held before. A tag that is already gone
/// is not an error.
pub fn recreate_tag(
    handle: &RepositoryHandle,
    name: &str,
    target: Oid,
    tagger: &Identity,
) -> Result<TagRef> {
    let refname = format!("refs/tags/{name}");
    if !git2::Reference::is_valid_name(&refname) {
        return Err(Error::InvalidRefName {
            name: name.to_string(),
        });
    }
    let repo = handle.repo();

    // (d) pushes every local tag, so start from the remote's tags.
    handle.fetch().map_err(|e| Error::TagDelete {
        name: name.to_string(),
        locus: TagLocus::Remote,
        source: Box::new(e),
    })?;

    // (a) local
    let deleted = absence::optional(repo.tag_delete(name)).map_err(|e| Error::TagDelete {
        name: name.to_string(),
        locus: TagLocus::Local,
        source: Box::new(Error::Git(e)),
    })?;
    if deleted.is_none() {
        tracing::debug!(tag = %name, "no local tag to delete");
    }

    // (b) remote
    delete_remote_tag(handle, name, &refname).map_err(|e| Error::TagDelete {
        name: name.to_string(),
        locus: TagLocus::Remote,
        source: Box::new(e),
    })?;

    // (c) create
    let signature = tagger.signature()?;
    let object = repo
        .find_object(target, None)
        .map_err(|source| Error::TagCreate {
            name: name.to_string(),
            source,
        })?;
    let tag_id = repo
        .tag(name, &object, &signature, TAG_MESSAGE, false)
        .map_err(|source| Error::TagCreate {
            name: name.to_string(),
            source,
        })?;
    tracing::debug!(tag = %name, tag_id = %tag_id, target = %target, "created annotated tag");

    // (d) publish
    push::push(handle, &[Refspec::all_tags()], false).map_err(|e| Error::TagPublish {
        name: name.to_string(),
        source: Box::new(e),
    })?;

    tracing::info!(tag = %name, target = %target, "tag recreated");
    Ok(TagRef {
        name: name.to_string(),
        target,
        tagger: tagger.clone(),
        message: TAG_MESSAGE.to_string(),
    })
}

fn delete_remote_tag(handle: &RepositoryHandle, name: &str, refname: &str) -> Result<()> {
    let advertised = handle.list_remote_refs()?;
    if !advertised.contains(refname) {
        tracing::debug!(tag = %name, "remote does not have tag, skipping delete");
        return Ok(());
    }

    let report = push::push(handle, &[Refspec::delete(refname)], true)?;
    if report.get(refname) == Some(RefUpdate::AlreadyAbsent) {
        tracing::warn!(tag = %name, "remote tag vanished before delete");
    }
    Ok(())
}

/// Commit at the tip of `branch`, preferring the local branch over the
/// remote-tracking one.
pub fn resolve_branch_tip(handle: &RepositoryHandle, branch: &str) -> Result<Oid> {
    let repo = handle.repo();
    for refname in [
        format!("refs/heads/{branch}"),
        format!("refs/remotes/{REMOTE_NAME}/{branch}"),
    ] {
        let found = absence::optional(repo.find_reference(&refname)).map_err(|source| {
            Error::ReferenceResolution {
                name: refname.clone(),
                source,
            }
        })?;
        if let Some(reference) = found {
            return Ok(reference.peel_to_commit()?.id());
        }
    }
    Err(Error::RefNotFound {
        name: branch.to_string(),
    })
}

/// Local tag names, sorted.
pub fn list_tags(handle: &RepositoryHandle) -> Result<Vec<String>> {
    let names = handle.repo().tag_names(None)?;
    let mut tags: Vec<String> = names.iter().flatten().map(str::to_string).collect();
    tags.sort();
    Ok(tags)
}
