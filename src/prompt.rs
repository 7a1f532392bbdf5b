use crate::i18n::Locale;
use crate::protocol::{Gender, SpeakerProfile};

const PERSONA: &str = "You are a patient, warm tutor who helps older adults learn to use \
their smartphone. Speak slowly and clearly, in short sentences, one step at a time. \
Avoid technical jargon; when a technical word is unavoidable, explain it simply. \
Be encouraging and never make the person feel rushed.";

/// Build the system instruction for one turn
///
/// Output depends only on the arguments, so identical profiles always
/// produce identical instructions.
pub fn system_instruction(locale: Locale, profile: &SpeakerProfile, context: Option<&str>) -> String {
    let mut lines = vec![
        PERSONA.to_string(),
        format!("Always answer in {}.", locale.language_name()),
    ];

    if let Some(name) = profile.name.as_deref() {
        lines.push(format!(
            "The person you are talking to is called {}. Address them by name now and then.",
            name
        ));
    }

    match profile.gender {
        Some(Gender::Female) => lines.push(
            "The person is a woman: use feminine grammatical agreement when addressing her."
                .to_string(),
        ),
        Some(Gender::Male) => lines.push(
            "The person is a man: use masculine grammatical agreement when addressing him."
                .to_string(),
        ),
        None => {}
    }

    if let Some(context) = context {
        lines.push(format!("Conversation so far:\n{}", context));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_encodes_profile() {
        let profile = SpeakerProfile {
            name: Some("Rosa".to_string()),
            gender: Some(Gender::Female),
        };
        let text = system_instruction(Locale::Es, &profile, Some("Learning WhatsApp"));

        assert!(text.contains("called Rosa"));
        assert!(text.contains("feminine"));
        assert!(text.contains("Spanish"));
        assert!(text.ends_with("Learning WhatsApp"));
    }

    #[test]
    fn test_instruction_is_deterministic() {
        let profile = SpeakerProfile {
            name: Some("Luis".to_string()),
            gender: Some(Gender::Male),
        };
        assert_eq!(
            system_instruction(Locale::En, &profile, None),
            system_instruction(Locale::En, &profile, None)
        );
    }

    #[test]
    fn test_empty_profile_has_no_personal_lines() {
        let text = system_instruction(Locale::En, &SpeakerProfile::default(), None);
        assert!(!text.contains("called"));
        assert!(!text.contains("grammatical"));
        assert!(!text.contains("Conversation so far"));
    }
}
