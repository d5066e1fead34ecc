use super::request::SummaryRequest;

/// Placeholder replaced with the request language in any template.
pub const LANGUAGE_PLACEHOLDER: &str = "{language}";

pub const DEFAULT_TEMPLATE: &str = "\
You are a precise assistant that summarizes text. Respond in {language}.

Structure the answer in exactly three sections:

1. Summary: one sentence that captures the main point.
2. Key points: a bulleted list of the most important facts or arguments.
3. Action items: a bulleted list of concrete next steps for the reader, or \"None\" if there are none.

Do not add information that is not in the text.";

/// Instruction text for `request`: the custom prompt when one is set,
/// otherwise [`DEFAULT_TEMPLATE`], with every `{language}` substituted.
pub fn build(request: &SummaryRequest) -> String {
    let template = request
        .custom_prompt
        .as_deref()
        .filter(|prompt| !prompt.trim().is_empty())
        .unwrap_or(DEFAULT_TEMPLATE);
    template.replace(LANGUAGE_PLACEHOLDER, &request.language)
}

/// Single prompt for engines without a separate system channel.
pub fn compose_local_prompt(request: &SummaryRequest) -> String {
    format!("{}\n\n{}", build(request), request.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_substitutes_language() {
        let request = SummaryRequest::new("body", "m").with_language("fr");
        let prompt = build(&request);
        assert!(prompt.contains("Respond in fr."));
        assert!(!prompt.contains(LANGUAGE_PLACEHOLDER));
        assert!(prompt.contains("Action items"));
    }

    #[test]
    fn custom_prompt_is_used_verbatim_with_every_placeholder_replaced() {
        let request = SummaryRequest::new("body", "m")
            .with_language("de")
            .with_custom_prompt(Some("TL;DR in {language}. Only {language}!".into()));
        assert_eq!(build(&request), "TL;DR in de. Only de!");
    }

    #[test]
    fn blank_custom_prompt_falls_back_to_default() {
        let request = SummaryRequest::new("body", "m").with_custom_prompt(Some("  ".into()));
        assert_eq!(build(&request), DEFAULT_TEMPLATE.replace("{language}", "en"));
    }

    #[test]
    fn build_is_deterministic() {
        let request = SummaryRequest::new("body", "m").with_language("ja");
        assert_eq!(build(&request), build(&request));
    }

    #[test]
    fn local_prompt_appends_content() {
        let request = SummaryRequest::new("the article", "m")
            .with_custom_prompt(Some("Summarize:".into()));
        assert_eq!(compose_local_prompt(&request), "Summarize:\n\nthe article");
    }
}
