//! Repair agent seam.
//!
//! A [`RepairAgent`] takes the raw (possibly broken) notebook text and the
//! strict-validation diagnostic and proposes a corrected document.

use async_trait::async_trait;

use crate::error::AgentError;

/// External service that proposes a corrected notebook.
#[async_trait]
pub trait RepairAgent: Send + Sync {
    /// Return corrected notebook text for `raw`, given why it failed.
    ///
    /// Implementations must not retry internally.
    async fn propose_fix(&self, raw: &str, diagnostic: &str) -> Result<String, AgentError>;
}

/// Build the instruction prompt sent to the repair service.
pub fn build_prompt(raw: &str, diagnostic: &str) -> String {
    format!(
        "You are repairing a Jupyter notebook (.ipynb) file that fails validation.\n\
         \n\
         Validation error:\n\
         {diagnostic}\n\
         \n\
         Rules:\n\
         1. Fix only structural problems: JSON syntax and nbformat v4 schema conformance.\n\
         2. Preserve the code and markdown content of every cell unless that content is the cause of the error.\n\
         3. Respond with a single JSON object containing the whole corrected notebook. \
         Do not add explanations, prose, or markdown code fences.\n\
         \n\
         Notebook content:\n\
         {raw}\n"
    )
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ```` fence, if present.
pub fn strip_code_fences(response: &str) -> &str {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
