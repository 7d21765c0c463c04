/// A well-formed response that breaks what the server promised to send.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("unexpected {shape} response: expected {expected} at `{path}`")]
    Schema {
        shape: &'static str,
        path: String,
        expected: &'static str,
    },

    #[error("malformed {resource} response: missing string field `{field}`")]
    MalformedResponse {
        resource: &'static str,
        field: &'static str,
    },

    #[error("post `{id}` is listed in `order` but missing from `posts`")]
    DanglingPost { id: String },

    #[error("post `{id}` has an unrepresentable create_at {create_at}")]
    InvalidTimestamp { id: String, create_at: i64 },
}
