use crate::error::ContractError;
use crate::models::{Post, PostList};

/// Turns a server post list into chronological (oldest first) order.
///
/// `order` is trusted to be the server's newest-first ordering; it is reversed,
/// not re-sorted by `create_at`. Any entry of `order` without a post fails the
/// whole list.
pub fn chronological(list: PostList) -> Result<Vec<Post>, ContractError> {
    let PostList { order, posts } = list;

    let mut newest_first = Vec::with_capacity(order.len());
    for id in order {
        let Some(post) = posts.get(&id) else {
            return Err(ContractError::DanglingPost { id });
        };
        newest_first.push(Post {
            id,
            ..post.clone()
        });
    }

    newest_first.reverse();
    Ok(newest_first)
}
