//! Recursive materialization of a remote folder into an in-memory tree.
//!
//! The listing API only returns the direct children of one folder, one page at
//! a time. [`TreeMaterializer`] walks it depth-first and assembles a nested
//! name → node mapping.
//!
//! Folder IDs are trusted to form a tree (the provider does not allow moving a
//! folder into its own descendant), so there is no cycle detection. Against an
//! untrusted server a cyclic listing would recurse until the stack or the
//! caller's cancellation token stops it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{collect_pages, ListQuery, PanClient, MAX_PAGE_SIZE};
use crate::error::{PanError, Result};
use crate::models::{File, FileList};

/// Folder ID of the drive root.
pub const ROOT_ID: i64 = 0;

/// Source of folder listings.
#[async_trait]
pub trait DirectoryLister: Send + Sync {
    /// Fetch one page of a folder. An empty folder is reported as
    /// [`PanError::EmptyDirectory`].
    async fn list_files(&self, query: &ListQuery) -> Result<FileList>;
}

#[async_trait]
impl DirectoryLister for PanClient {
    async fn list_files(&self, query: &ListQuery) -> Result<FileList> {
        PanClient::list_files(self, query).await
    }
}

/// Children of a folder by name.
pub type DirectoryTree = BTreeMap<String, TreeNode>;

/// A materialized entry: a file (or a folder with nothing in it) or a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TreeNode {
    File(File),
    Directory(DirectoryTree),
}

impl TreeNode {
    /// Number of leaf entries below this node.
    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::File(_) => 1,
            TreeNode::Directory(children) => children.values().map(TreeNode::leaf_count).sum(),
        }
    }

    fn write_indented(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        match self {
            TreeNode::File(file) => writeln!(f, "{}{}", "  ".repeat(depth), file),
            TreeNode::Directory(children) => {
                for (name, child) in children {
                    match child {
                        TreeNode::File(file) if file.is_dir() => {
                            writeln!(f, "{}{}/ (empty)", "  ".repeat(depth), name)?
                        }
                        TreeNode::File(file) => writeln!(
                            f,
                            "{}{} ({})",
                            "  ".repeat(depth),
                            name,
                            file.display_size()
                        )?,
                        TreeNode::Directory(_) => {
                            writeln!(f, "{}{}/", "  ".repeat(depth), name)?;
                            child.write_indented(f, depth + 1)?;
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for TreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Where a walk starts.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeRoot {
    Id(i64),
    File(File),
}

impl From<i64> for TreeRoot {
    fn from(id: i64) -> Self {
        TreeRoot::Id(id)
    }
}

impl From<File> for TreeRoot {
    fn from(file: File) -> Self {
        TreeRoot::File(file)
    }
}

/// Knobs for a tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    /// Entries requested per listing call.
    pub page_size: u32,
    /// Keep requesting pages until the folder's `total` is reached. When off,
    /// only the first page of every folder is used.
    pub follow_pages: bool,
    /// Listing requests in flight at once across the whole walk. Sibling
    /// folders are expanded in parallel up to the same bound.
    pub concurrency: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            follow_pages: true,
            concurrency: 1,
        }
    }
}

/// Builds [`TreeNode`]s from a [`DirectoryLister`].
pub struct TreeMaterializer<'a, L: DirectoryLister + ?Sized> {
    lister: &'a L,
    options: TreeOptions,
    permits: Semaphore,
}

impl<'a, L: DirectoryLister + ?Sized> TreeMaterializer<'a, L> {
    pub fn new(lister: &'a L) -> Self {
        Self::with_options(lister, TreeOptions::default())
    }

    pub fn with_options(lister: &'a L, options: TreeOptions) -> Self {
        let permits = Semaphore::new(options.concurrency.max(1));
        Self {
            lister,
            options,
            permits,
        }
    }

    /// Materialize everything below `root`.
    ///
    /// A plain file is returned as is. A folder becomes a
    /// [`TreeNode::Directory`], empty when the folder has no entries. Any
    /// listing failure other than "empty" aborts the whole walk.
    pub async fn materialize(&self, root: impl Into<TreeRoot>) -> Result<TreeNode> {
        self.materialize_with_cancel(root, &CancellationToken::new()).await
    }

    /// Like [`materialize`](Self::materialize), aborting with
    /// [`PanError::Cancelled`] once `cancel` fires.
    pub async fn materialize_with_cancel(
        &self,
        root: impl Into<TreeRoot>,
        cancel: &CancellationToken,
    ) -> Result<TreeNode> {
        let dir_id = match root.into() {
            TreeRoot::File(file) if !file.is_dir() => return Ok(TreeNode::File(file)),
            TreeRoot::File(file) => file.id,
            TreeRoot::Id(id) => id,
        };

        Ok(TreeNode::Directory(self.expand(dir_id, cancel).await?))
    }

    fn expand<'s>(
        &'s self,
        dir_id: i64,
        cancel: &'s CancellationToken,
    ) -> BoxFuture<'s, Result<DirectoryTree>> {
        async move {
            let entries = match self.list_dir(dir_id, cancel).await {
                Ok(entries) => entries,
                Err(PanError::EmptyDirectory) => return Ok(DirectoryTree::new()),
                Err(e) => return Err(e),
            };

            debug!(dir_id, count = entries.len(), "Expanding folder");

            // `buffered` yields in input order, so later duplicates still win.
            let children: Vec<(String, TreeNode)> = stream::iter(
                entries
                    .into_iter()
                    .map(|entry| self.expand_entry(entry, cancel)),
            )
            .buffered(self.options.concurrency.max(1))
            .try_collect()
            .await?;

            let mut tree = DirectoryTree::new();
            for (name, node) in children {
                tree.insert(name, node);
            }
            Ok(tree)
        }
        .boxed()
    }

    async fn expand_entry(
        &self,
        entry: File,
        cancel: &CancellationToken,
    ) -> Result<(String, TreeNode)> {
        if !entry.is_dir() {
            return Ok((entry.name.clone(), TreeNode::File(entry)));
        }

        let subtree = self.expand(entry.id, cancel).await?;
        let name = entry.name.clone();
        let node = if subtree.is_empty() {
            TreeNode::File(entry)
        } else {
            TreeNode::Directory(subtree)
        };
        Ok((name, node))
    }

    /// All entries of one folder, following pages when configured to.
    async fn list_dir(&self, dir_id: i64, cancel: &CancellationToken) -> Result<Vec<File>> {
        let query = ListQuery::children_of(dir_id).limit(self.options.page_size);
        let list = collect_pages(query, self.options.follow_pages, |query| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(PanError::Cancelled),
                result = self.list_page(&query) => result,
            }
        })
        .await?;
        Ok(list.entries)
    }

    /// One listing call, holding a permit so the whole walk stays within
    /// `concurrency` requests. The permit is released before recursing.
    async fn list_page(&self, query: &ListQuery) -> Result<FileList> {
        // The semaphore is never closed while `self` is alive.
        let _permit = self.permits.acquire().await.map_err(|_| PanError::Cancelled)?;
        self.lister.list_files(query).await
    }
}
