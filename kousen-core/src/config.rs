// File: kousen-core/src/config.rs
//! Bot settings read from a JSON file, e.g.
//!
//! ```json
//! { "prefix": ["!", "k!"], "case_insensitive_commands": true, "owners": [1234] }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;
use crate::bot::BotBuilder;
use crate::getters::PrefixArg;
use kousen_common::traits::GatewayClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// A string or a list of strings. Checked when building.
    pub prefix: Option<Value>,
    /// Unset means "only when no prefix is given".
    pub mention_prefix: Option<bool>,
    pub default_parser: String,
    pub case_insensitive_commands: bool,
    pub case_insensitive_prefixes: bool,
    pub ignore_bots: bool,
    pub owners: Vec<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            mention_prefix: None,
            default_parser: " ".to_string(),
            case_insensitive_commands: false,
            case_insensitive_prefixes: false,
            ignore_bots: true,
            owners: Vec::new(),
        }
    }
}

impl BotConfig {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read bot config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }

    /// A builder carrying every setting. Fails on a malformed prefix value.
    pub fn into_builder(self, client: Arc<dyn GatewayClient>) -> Result<BotBuilder, Error> {
        let mut builder = BotBuilder::new(client)
            .default_parser(self.default_parser)
            .case_insensitive_commands(self.case_insensitive_commands)
            .case_insensitive_prefixes(self.case_insensitive_prefixes)
            .ignore_bots(self.ignore_bots)
            .owners(self.owners);

        if let Some(prefix) = self.prefix {
            builder = builder.prefix(PrefixArg::try_from(prefix)?);
        }
        if let Some(enabled) = self.mention_prefix {
            builder = builder.mention_prefix(enabled);
        }
        Ok(builder)
    }
}
