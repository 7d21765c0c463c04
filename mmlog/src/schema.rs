//! Structural checks on raw server responses.
//!
//! Every response is checked here before any of its fields are trusted. The
//! validators only inspect; decoding into the typed models happens afterwards
//! and may assume the checked shape holds.

use anyhow::Context;
use serde_json::{Map, Value};

use crate::error::ContractError;
use crate::models::{PostList, User};

const USER_LIST: &str = "user list";
const POST_LIST: &str = "post list";

fn mismatch(shape: &'static str, path: impl Into<String>, expected: &'static str) -> ContractError {
    ContractError::Schema {
        shape,
        path: path.into(),
        expected,
    }
}

fn require_object<'a>(
    shape: &'static str,
    value: &'a Value,
    path: &str,
) -> Result<&'a Map<String, Value>, ContractError> {
    value.as_object().ok_or_else(|| mismatch(shape, path, "an object"))
}

fn require_string(
    shape: &'static str,
    object: &Map<String, Value>,
    parent: &str,
    field: &str,
) -> Result<(), ContractError> {
    match object.get(field) {
        Some(Value::String(_)) => Ok(()),
        _ => Err(mismatch(shape, join(parent, field), "a string")),
    }
}

fn join(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}

/// A user list is an array of objects, each with string `id` and `username`.
pub fn validate_user_list(value: &Value) -> Result<(), ContractError> {
    let users = value
        .as_array()
        .ok_or_else(|| mismatch(USER_LIST, "$", "an array"))?;

    for (index, user) in users.iter().enumerate() {
        let path = format!("[{index}]");
        let user = require_object(USER_LIST, user, &path)?;
        require_string(USER_LIST, user, &path, "id")?;
        require_string(USER_LIST, user, &path, "username")?;
    }

    Ok(())
}

/// A post list has an `order` array of strings and a `posts` object whose
/// values each carry a string `user_id` and an `i64` `create_at`. `id` and
/// `message`, if present, are strings or null.
pub fn validate_post_list(value: &Value) -> Result<(), ContractError> {
    let root = require_object(POST_LIST, value, "$")?;

    let order = root
        .get("order")
        .and_then(Value::as_array)
        .ok_or_else(|| mismatch(POST_LIST, "order", "an array"))?;
    if let Some(index) = order.iter().position(|id| !id.is_string()) {
        return Err(mismatch(POST_LIST, format!("order[{index}]"), "a string"));
    }

    let posts = root
        .get("posts")
        .and_then(Value::as_object)
        .ok_or_else(|| mismatch(POST_LIST, "posts", "an object"))?;

    for (id, post) in posts {
        let path = format!("posts.{id}");
        let post = require_object(POST_LIST, post, &path)?;
        require_string(POST_LIST, post, &path, "user_id")?;
        if post.get("create_at").and_then(Value::as_i64).is_none() {
            return Err(mismatch(POST_LIST, join(&path, "create_at"), "an integer"));
        }
        for field in ["id", "message"] {
            if !matches!(post.get(field), None | Some(Value::Null | Value::String(_))) {
                return Err(mismatch(POST_LIST, join(&path, field), "a string"));
            }
        }
    }

    Ok(())
}

/// Validates, then decodes, a user list.
pub fn user_list(value: Value) -> anyhow::Result<Vec<User>> {
    validate_user_list(&value)?;
    serde_json::from_value(value).context("decoding user list")
}

/// Validates, then decodes, a post list.
pub fn post_list(value: Value) -> anyhow::Result<PostList> {
    validate_post_list(&value)?;
    serde_json::from_value(value).context("decoding post list")
}

/// Extracts the string `id` of a team or channel lookup response.
pub fn string_id(value: &Value, resource: &'static str) -> Result<String, ContractError> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ContractError::MalformedResponse {
            resource,
            field: "id",
        })
}
