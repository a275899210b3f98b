use thiserror::Error;

/// Errors returned by the statistics API client.
#[derive(Debug, Error)]
pub enum GibddError {
    /// Network or TLS failure from the underlying HTTP client, or a non-2xx
    /// HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response envelope carried no `data` field.
    #[error("response envelope has no 'data' field")]
    MissingData,

    /// The response body (or the JSON-encoded document nested inside it)
    /// could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
