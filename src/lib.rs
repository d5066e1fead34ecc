#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod providers;
pub mod storage;

pub use catalog::{ModelCatalog, ModelSource};
pub use config::Config;
pub use error::{GistError, ProviderError, Result};
pub use providers::{
    Availability, FragmentStream, Provider, ProviderGateway, ProviderId, SummaryEvent,
    SummaryRequest, TextFragment, spawn_summary,
};
