pub mod rest;

use crate::bib::hash::compute_identity_hash;
use crate::bib::model::Post;
use anyhow::Result;

/// One block of account posts. Records the service returned but that could
/// not be decoded are counted, not kept, so paging still sees the real page
/// length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub unreadable: usize,
}

impl PostPage {
    pub fn len(&self) -> usize {
        self.posts.len() + self.unreadable
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The remote bibliography account, as far as a sync run needs it.
pub trait AccountService {
    fn fetch_posts(&self, user: &str, offset: usize, limit: usize) -> Result<PostPage>;
    /// Returns the identifier the service assigned, or `None` when it
    /// accepted the request but did not store the post.
    fn create_post(&self, post: &Post) -> Result<Option<String>>;
    fn update_post(&self, post: &Post) -> Result<()>;
    fn delete_posts(&self, user: &str, hashes: &[String]) -> Result<()>;
}

/// Page through every post of `user`. A short page ends the loop; an empty
/// page ends it immediately, since some servers keep returning duplicate
/// pages past the end of the collection.
pub fn fetch_all_posts(
    service: &dyn AccountService,
    user: &str,
    page_size: usize,
) -> Result<Vec<Post>> {
    let mut posts = Vec::new();
    let mut unreadable = 0usize;
    let mut offset = 0usize;
    loop {
        let page = service.fetch_posts(user, offset, page_size)?;
        let count = page.len();
        tracing::debug!(offset, count, "fetched account page");
        if page.is_empty() {
            break;
        }
        unreadable += page.unreadable;
        posts.extend(page.posts);
        if count < page_size {
            break;
        }
        offset += page_size;
    }

    if unreadable > 0 {
        tracing::warn!(user, unreadable, "skipped account posts that could not be read");
    }
    for post in &mut posts {
        if post.resource.intra_hash.trim().is_empty() {
            post.resource.intra_hash = compute_identity_hash(&post.resource);
        }
    }
    Ok(posts)
}
