pub mod http;
pub mod provider;
pub mod scripted;
pub mod types;

pub use http::HttpCapabilityProvider;
pub use provider::{CapabilityProvider, EventStream};
pub use scripted::{RecordedRun, Script, ScriptedProvider};
pub use types::{bound_history, HistoryMessage, Prompt, ProviderEvent, RawProviderEvent, Role};
