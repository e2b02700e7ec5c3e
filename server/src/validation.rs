use crate::error::ApiError;

/// Maximum text length for synthesis requests, in characters
const MAX_TEXT_LENGTH: usize = 5000;
/// Maximum length of a voice or model identifier
const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_PAGE_SIZE: u32 = 100;

/// Language hints accepted by the realtime models.
pub const LANGUAGE_TYPES: &[&str] = &[
    "Auto",
    "Chinese",
    "English",
    "German",
    "Italian",
    "Portuguese",
    "Spanish",
    "Japanese",
    "Korean",
    "French",
    "Russian",
];

/// Validate synthesis text (expected already trimmed).
pub fn validate_synthesis_text(text: &str) -> Result<(), ApiError> {
    if text.is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_language_type(language_type: &str) -> Result<(), ApiError> {
    if LANGUAGE_TYPES.contains(&language_type) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!(
            "Invalid language_type: {}. Expected one of: {}",
            language_type,
            LANGUAGE_TYPES.join(", ")
        )))
    }
}

/// Validate a voice or model identifier. `kind` names the field in the error message.
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::InvalidInput(format!("{} cannot be empty", kind)));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "{} too long (max {} characters)",
            kind, MAX_IDENTIFIER_LENGTH
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ApiError::InvalidInput(format!(
            "Invalid {}: {}. Only letters, digits, '-', '_' and '.' are allowed",
            kind, value
        )));
    }
    Ok(())
}

pub fn validate_page_size(page_size: u32) -> Result<(), ApiError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ApiError::InvalidInput(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_synthesis_text() {
        assert!(validate_synthesis_text("Hello").is_ok());
        assert!(validate_synthesis_text("").is_err());
        assert!(validate_synthesis_text(&"a".repeat(6000)).is_err());
    }

    #[test]
    fn test_text_length_counts_characters() {
        // 5000 CJK characters are 15000 bytes but still within the limit.
        assert!(validate_synthesis_text(&"你".repeat(5000)).is_ok());
        assert!(validate_synthesis_text(&"你".repeat(5001)).is_err());
    }

    #[test]
    fn test_validate_language_type() {
        assert!(validate_language_type("Auto").is_ok());
        assert!(validate_language_type("Chinese").is_ok());
        let result = validate_language_type("chinese");
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("Invalid language_type"));
        } else {
            panic!("lowercase language type should be rejected");
        }
        assert!(validate_language_type("en_US").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("voice", "Cherry").is_ok());
        assert!(validate_identifier("voice", "qwen-tts-vc-custom_voice-v1.2").is_ok());
        assert!(validate_identifier("voice", "").is_err());
        assert!(validate_identifier("voice", "a b").is_err());
        assert!(validate_identifier("model", "../etc/passwd").is_err());
        assert!(validate_identifier("model", &"m".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_page_size() {
        assert!(validate_page_size(1).is_ok());
        assert!(validate_page_size(100).is_ok());
        assert!(validate_page_size(0).is_err());
        assert!(validate_page_size(101).is_err());
    }
}
