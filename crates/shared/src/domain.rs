use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(PostId);

/// One record from the remote `/users` collection. Extra fields in the wire
/// payload are ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub website: String,
}

/// One record from the remote `/posts` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub body: String,
}

impl User {
    /// Case-insensitive substring match over every displayed field.
    /// An empty needle matches everything.
    pub fn matches(&self, needle: &str) -> bool {
        let haystack = format!(
            "{} {} {} {} {}",
            self.name, self.username, self.email, self.phone, self.website
        )
        .to_lowercase();
        haystack.contains(&needle.to_lowercase())
    }
}

impl Post {
    /// Title-only match, used when filtering the post table.
    pub fn matches_title(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Title-or-body match, used by the abortable search path.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }
}
