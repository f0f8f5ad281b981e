pub mod ai;
pub mod ai_types;
pub mod dictionary;
pub mod encoding;
pub mod export;
pub mod numfmt;
pub mod pipeline;
pub mod prompts;
pub mod qa;
pub mod reconcile;
pub mod session;
pub mod settings;
pub mod store;
pub mod structured;
