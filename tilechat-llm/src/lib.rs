//! Model transport for Tilechat.
//!
//! This crate exposes the [`traits::ChatTransport`] seam the chat UI sends
//! through and the [`gemini::GeminiClient`] that implements it over the
//! Gemini `generateContent` REST endpoint.
//!
//! # Examples
//! ```no_run
//! use tilechat_common::{ChatMessage, Result};
//! use tilechat_config::ChatConfigLoader;
//! use tilechat_llm::connect;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! # let cfg = ChatConfigLoader::new().with_yaml_str("gemini:\n  api_key: k").load().unwrap();
//! let transport = connect(&cfg.gemini)?;
//! let reply = transport
//!     .send(&ChatMessage::user(Some("Which grout for a shower?".into()), vec![]))
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```
pub mod gemini;
pub mod traits;

use gemini::GeminiClient;
use std::sync::Arc;
use tilechat_config::GeminiConfig;
pub use traits::ChatTransport;

/// Build the configured transport behind the trait object the UI holds.
pub fn connect(
    config: &GeminiConfig,
) -> tilechat_common::Result<Arc<dyn ChatTransport + Send + Sync + 'static>> {
    let client = GeminiClient::new(config)?;
    tracing::info!(model = %client.model_name(), "Gemini transport ready");
    Ok(Arc::new(client))
}
