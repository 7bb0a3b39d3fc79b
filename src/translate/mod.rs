//! On-demand article translation through pluggable backends.
//!
//! [`provider`] defines the backend trait and the name-keyed registry;
//! [`openai`], [`deepl`], and [`google`] implement it with their own wire
//! formats. [`service`] holds the orchestrator that checks the translation
//! cache before dispatching and writes results through afterwards.

pub mod deepl;
pub mod google;
pub mod openai;
pub mod provider;
pub mod service;

pub use deepl::DeepLProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;
pub use provider::{ProviderError, ProviderRegistry, TranslationProvider};
pub use service::{detect_language, TranslateError, Translator};
