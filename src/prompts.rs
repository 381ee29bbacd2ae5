//! Instruction templates for the caption service.
//!
//! Callers can override the default via
//! [`crate::config::PoseConfig::instruction_template`]; the constants here are
//! used only when no override is provided.

/// Placeholder replaced with the subject label (the user's query, or the
/// image's resolved name when captioning a whole document).
pub const LABEL_PLACEHOLDER: &str = "{label}";

/// Default instruction for describing a single pose.
pub const DEFAULT_INSTRUCTION: &str =
    "You are an expert in understanding yoga poses. Please provide a description for the yoga pose: {label}";

/// Instruction used when captioning every image of a document.
pub const SUMMARY_INSTRUCTION: &str = "Please give a summary of the image provided: {label}";

/// Fill `{label}` in `template`. Templates without the placeholder are sent
/// unchanged.
pub fn instruction_for(template: &str, label: &str) -> String {
    template.replace(LABEL_PLACEHOLDER, label.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_instruction_names_the_pose() {
        assert_eq!(
            instruction_for(DEFAULT_INSTRUCTION, "warrior"),
            "You are an expert in understanding yoga poses. Please provide a description for the yoga pose: warrior"
        );
    }

    #[test]
    fn label_is_trimmed() {
        assert_eq!(
            instruction_for(SUMMARY_INSTRUCTION, "  Image 3 "),
            "Please give a summary of the image provided: Image 3"
        );
    }

    #[test]
    fn template_without_placeholder_is_verbatim() {
        assert_eq!(instruction_for("Describe this.", "tree"), "Describe this.");
    }
}
