use super::Config;

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Some(provider) = non_empty_var("GISTLINE_PROVIDER") {
            self.provider = provider;
        }

        if let Some(model) = non_empty_var("GISTLINE_MODEL") {
            self.model = Some(model);
        }

        if let Some(language) = non_empty_var("GISTLINE_LANGUAGE") {
            self.language = language;
        }

        if let Some(key) = non_empty_var("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }

        if let Some(key) = non_empty_var("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }

        if let Some(key) = non_empty_var("GEMINI_API_KEY").or_else(|| non_empty_var("GOOGLE_API_KEY"))
        {
            self.providers.gemini.api_key = Some(key);
        }

        if let Some(url) = non_empty_var("GISTLINE_OLLAMA_URL") {
            self.on_device.base_url = Some(url);
        }
    }
}
