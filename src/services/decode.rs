use crate::core::error::{GenerationError, GenerationResult};
use serde::de::DeserializeOwned;

/// Removes one fenced code block wrapper (```` ```json ... ``` ````) if present.
pub fn strip_code_blocks(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (language tag) on the opening fence line.
    let body = match rest.find('\n') {
        Some(pos) if is_info_string(&rest[..pos]) => &rest[pos + 1..],
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn is_info_string(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Post-decode checks for shapes serde alone cannot enforce.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

impl Validate for Vec<String> {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Decodes model output into `T`, tolerating a fenced wrapper.
///
/// Raw text is logged at debug level on failure and kept out of the error.
pub fn decode_json<T>(text: &str) -> GenerationResult<T>
where
    T: DeserializeOwned + Validate,
{
    let clean = strip_code_blocks(text);
    if clean.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let value: T = serde_json::from_str(clean).map_err(|e| {
        log::debug!("Undecodable model response: {}", text);
        GenerationError::ResponseDecode {
            message: e.to_string(),
        }
    })?;

    value.validate().map_err(|message| {
        log::debug!("Model response failed validation: {}", text);
        GenerationError::ResponseDecode { message }
    })?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("json"), "json");
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("  ```json  \n  {}  \n  ```  "), "{}");
        assert_eq!(strip_code_blocks("```json[1, 2]```"), "[1, 2]");
        assert_eq!(strip_code_blocks("```JSON\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_blocks("```[1,\n2]\n```"), "[1,\n2]");
    }

    #[test]
    fn test_fenced_and_bare_decode_identically() {
        let bare = r#"["sunrise over mountains", "quiet library"]"#;
        let fenced = format!("```json\n{}\n```", bare);
        let a: Vec<String> = decode_json(bare).unwrap();
        let b: Vec<String> = decode_json(&fenced).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_is_empty_response() {
        for blank in ["", "   ", "\n\t\n", "```json\n```", "```\n  \n```"] {
            let err = decode_json::<Vec<String>>(blank).unwrap_err();
            assert!(matches!(err, GenerationError::EmptyResponse));
        }
    }

    #[test]
    fn test_malformed_is_decode_error_with_parser_message() {
        let err = decode_json::<Vec<String>>("[\"unterminated").unwrap_err();
        match err {
            GenerationError::ResponseDecode { message } => {
                assert!(message.contains("EOF"), "{}", message);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let err = decode_json::<Vec<String>>(r#"{"titles": []}"#).unwrap_err();
        assert!(err.is_decode());
    }
}
