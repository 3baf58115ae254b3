use serde_json::Value;

/// One parsed line of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamFragment {
    /// Text delta carried in `message.content`, if non-empty
    pub delta: Option<String>,
    /// Whether the server flagged this as the last fragment
    pub done: bool,
}

impl StreamFragment {
    /// Parse one NDJSON line.
    ///
    /// Any valid JSON value is accepted; values without a string
    /// `message.content` simply carry no delta.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(line)?;

        let delta = value
            .pointer("/message/content")
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
            .map(str::to_string);
        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);

        Ok(Self { delta, done })
    }
}
