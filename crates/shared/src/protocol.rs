use serde::{Deserialize, Serialize};

use crate::domain::Post;

/// Envelope returned by a post search: the retained page plus its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub posts: Vec<Post>,
    pub total: usize,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            total: 0,
        }
    }
}
