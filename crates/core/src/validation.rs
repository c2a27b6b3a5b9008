//! Local validation applied before anything reaches the module-content
//! service.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum length of a module code.
pub const MAX_MODULE_CODE_LEN: usize = 32;

/// Maximum length of a module title.
pub const MAX_TITLE_LEN: usize = 200;

/// Letters, digits, hyphen and underscore; must start with a letter or digit.
const MODULE_CODE_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_-]*$";

static MODULE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MODULE_CODE_PATTERN).expect("valid regex"));

/// Validate a module code chosen by the instructor.
pub fn validate_module_code(code: &str) -> Result<(), CoreError> {
    if code.is_empty() {
        return Err(CoreError::Validation(
            "Module code must not be empty".to_string(),
        ));
    }
    if code.len() > MAX_MODULE_CODE_LEN {
        return Err(CoreError::Validation(format!(
            "Module code must be at most {MAX_MODULE_CODE_LEN} characters, got {}",
            code.len()
        )));
    }
    if !MODULE_CODE_RE.is_match(code) {
        return Err(CoreError::Validation(format!(
            "Invalid module code '{code}'. Use letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

/// Validate a module title.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Module title must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::Validation(format!(
            "Module title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

/// Reject whitespace-only text for a named field.
pub fn require_text(field: &str, text: &str) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_code_accepts_common_forms() {
        assert!(validate_module_code("101").is_ok());
        assert!(validate_module_code("PBL-204").is_ok());
        assert!(validate_module_code("intro_to_plutus").is_ok());
    }

    #[test]
    fn module_code_rejects_bad_forms() {
        assert!(validate_module_code("").is_err());
        assert!(validate_module_code("-101").is_err());
        assert!(validate_module_code("10 1").is_err());
        assert!(validate_module_code("101/2").is_err());
        assert!(validate_module_code(&"a".repeat(33)).is_err());
    }

    #[test]
    fn module_code_error_names_the_code() {
        let msg = validate_module_code("bad code").unwrap_err().to_string();
        assert!(msg.contains("bad code"));
    }

    #[test]
    fn title_must_have_visible_characters() {
        assert!(validate_title("Smart Contracts 101").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(201)).is_err());
    }

    #[test]
    fn require_text_names_the_field() {
        let msg = require_text("SLT text", " \n").unwrap_err().to_string();
        assert!(msg.contains("SLT text"));
        assert!(require_text("SLT text", "I can deploy a validator").is_ok());
    }
}
