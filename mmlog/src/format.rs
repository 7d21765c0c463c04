use std::{borrow::Cow, collections::HashMap};

use chrono::{DateTime, Local};

use crate::error::ContractError;
use crate::models::{Post, User};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
pub const AUTHOR_WIDTH: usize = 21;
pub const UNKNOWN_USER: &str = "(username unknown)";

/// How the author column is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorStyle {
    #[default]
    Username,
    FullName,
}

pub fn local_timestamp(post: &Post) -> Result<DateTime<Local>, ContractError> {
    DateTime::from_timestamp_millis(post.create_at)
        .map(|utc| utc.with_timezone(&Local))
        .ok_or_else(|| ContractError::InvalidTimestamp {
            id: post.id.clone(),
            create_at: post.create_at,
        })
}

fn author<'a>(post: &Post, users: &'a HashMap<String, User>, style: AuthorStyle) -> Cow<'a, str> {
    match (users.get(&post.user_id), style) {
        (Some(user), AuthorStyle::Username) => user.username.as_str().into(),
        (Some(user), AuthorStyle::FullName) => user.display_name().into(),
        (None, _) => UNKNOWN_USER.into(),
    }
}

/// Renders one transcript line: timestamp, padded author, two spaces, then
/// the message verbatim.
pub fn format_post(
    post: &Post,
    users: &HashMap<String, User>,
    style: AuthorStyle,
) -> Result<String, ContractError> {
    let timestamp = local_timestamp(post)?;

    Ok(format!(
        "{} {:<width$}  {}",
        timestamp.format(TIMESTAMP_FORMAT),
        author(post, users, style),
        post.message,
        width = AUTHOR_WIDTH
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> HashMap<String, User> {
        HashMap::from([(
            "u1".to_string(),
            User {
                id: "u1".to_string(),
                username: "alice".to_string(),
                first_name: Some("Alice".to_string()),
                last_name: Some("Liddell".to_string()),
                nickname: None,
                email: None,
            },
        )])
    }

    fn post(user_id: &str, create_at: i64, message: &str) -> Post {
        Post {
            id: "p1".to_string(),
            user_id: user_id.to_string(),
            create_at,
            message: message.to_string(),
        }
    }

    fn expected_timestamp(millis: i64) -> String {
        DateTime::from_timestamp_millis(millis)
            .unwrap()
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }

    #[test]
    fn test_line_layout() {
        let line = format_post(&post("u1", 1_700_000_000_123, "hello"), &users(), AuthorStyle::Username)
            .unwrap();

        assert_eq!(
            line,
            format!("{} alice{}hello", expected_timestamp(1_700_000_000_123), " ".repeat(18))
        );
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(line.find(' '), Some(10));
        assert_eq!(&line[19..23], ".123");
        assert_eq!(&line[24..24 + AUTHOR_WIDTH + 2], format!("{:<21}  ", "alice"));
    }

    #[test]
    fn test_millis_are_zero_padded() {
        let line = format_post(&post("u1", 1005, "x"), &users(), AuthorStyle::Username).unwrap();
        assert!(line.starts_with(&expected_timestamp(1005)));
        assert_eq!(&line[19..23], ".005");
    }

    #[test]
    fn test_unknown_user_is_substituted() {
        let line = format_post(&post("ghost", 1000, "boo"), &users(), AuthorStyle::Username).unwrap();
        assert!(line.contains(&format!("(username unknown){}boo", " ".repeat(5))), "{line}");

        let line = format_post(&post("ghost", 1000, "boo"), &HashMap::new(), AuthorStyle::FullName).unwrap();
        assert!(line.contains(UNKNOWN_USER));
    }

    #[test]
    fn test_long_author_is_not_truncated() {
        let mut users = users();
        users.get_mut("u1").unwrap().username = "a.very.long.username.indeed".to_string();

        let line = format_post(&post("u1", 1000, "hi"), &users, AuthorStyle::Username).unwrap();
        assert!(line.ends_with(" a.very.long.username.indeed  hi"), "{line}");
    }

    #[test]
    fn test_message_passes_through_verbatim() {
        let message = "line one\nline two\t<b>&amp;</b>";
        let line = format_post(&post("u1", 1000, message), &users(), AuthorStyle::Username).unwrap();
        assert!(line.ends_with(message));
    }

    #[test]
    fn test_full_name_style() {
        let line = format_post(&post("u1", 1000, "hi"), &users(), AuthorStyle::FullName).unwrap();
        assert!(line.contains(&format!(" {:<21}  hi", "Alice Liddell")), "{line}");
    }

    #[test]
    fn test_out_of_range_timestamp() {
        let err = format_post(&post("u1", i64::MAX, "hi"), &users(), AuthorStyle::Username).unwrap_err();
        assert_eq!(
            err,
            ContractError::InvalidTimestamp {
                id: "p1".to_string(),
                create_at: i64::MAX
            }
        );
    }
}
