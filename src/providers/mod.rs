pub mod anthropic;
mod anthropic_types;
pub mod channel;
pub mod decoder;
pub mod descriptor;
pub mod gateway;
pub mod gemini;
mod gemini_types;
pub mod http_client;
pub mod local;
pub mod openai;
mod openai_types;
pub mod prompt;
pub mod request;
pub mod scrub;
pub mod streaming;
pub mod traits;

pub use channel::{SummaryEvent, SummaryReceiver, spawn_summary};
pub use decoder::{Decoder, TextFragment};
pub use descriptor::{ON_DEVICE_MODEL, ProviderDescriptor, ProviderId};
pub use gateway::ProviderGateway;
pub use local::{Availability, LocalEngine, LocalSession, OllamaEngine, OnDeviceProvider};
pub use request::SummaryRequest;
pub use scrub::{api_error, sanitize_api_error, scrub_secret_patterns};
pub use streaming::{FragmentStream, collect_text};
pub use traits::Provider;
