pub mod mattermost;

pub use mattermost::{Post, PostList, User};
