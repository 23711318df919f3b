use serde::de::DeserializeOwned;

/// A deserialization failure located by its JSON path (`types.X.struct[0].type`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("at JSON path {path} → {message}")]
pub struct JsonPathError {
    pub path: String,
    pub message: String,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, JsonPathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| JsonPathError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[derive(Debug, serde::Deserialize)]
    struct Entry {
        #[allow(dead_code)]
        name: String,
    }

    #[test]
    fn reports_the_failing_path() {
        let src = r#"{ "a": { "name": "ok" }, "b": { "name": 3 } }"#;
        let err = from_str_with_path::<IndexMap<String, Entry>>(src).unwrap_err();
        assert_eq!(err.path, "b.name");
        assert!(err.message.contains("expected a string"), "{}", err.message);
    }
}
