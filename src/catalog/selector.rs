use crate::providers::{ON_DEVICE_MODEL, ProviderId};

/// Name fragments that mark the cheaper tier of a model family, best first.
const LOW_COST_KEYWORDS: [&str; 5] = ["mini", "haiku", "flash", "lite", "small"];

/// Choose a default model from `models` for `provider`.
///
/// Order: the fixed on-device identifier; the first entry of the provider's
/// preference list present in `models`; the first model naming a low-cost
/// tier; `models[0]`. Returns an empty string only when `models` is empty.
pub fn pick(models: &[String], provider: ProviderId) -> String {
    if provider == ProviderId::OnDevice {
        return ON_DEVICE_MODEL.to_string();
    }

    let preferred = provider
        .descriptor()
        .preferred_models
        .iter()
        .find(|wanted| models.iter().any(|m| m.as_str() == **wanted));
    if let Some(model) = preferred {
        return (*model).to_string();
    }

    LOW_COST_KEYWORDS
        .iter()
        .find_map(|keyword| models.iter().find(|m| m.contains(*keyword)))
        .or_else(|| models.first())
        .cloned()
        .unwrap_or_default()
}
