use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::params;
use crate::error::ContractError;

/// Lifecycle state of a plugin, shown by configuration surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    Ready {
        text: Option<String>,
    },
    SetupRequired {
        /// Reference to the action that completes setup, e.g. a settings activity.
        setup_action: String,
        message: Option<String>,
    },
}

impl PluginState {
    pub fn ready() -> Self {
        PluginState::Ready { text: None }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PluginState::Ready { .. })
    }

    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        match self {
            PluginState::Ready { text } => {
                values.insert(params::STATE.to_string(), "ready".to_string());
                if let Some(text) = text {
                    values.insert(params::STATE_TEXT.to_string(), text.clone());
                }
            }
            PluginState::SetupRequired {
                setup_action,
                message,
            } => {
                values.insert(params::STATE.to_string(), "setup_required".to_string());
                values.insert(params::SETUP_ACTION.to_string(), setup_action.clone());
                if let Some(message) = message {
                    values.insert(params::STATE_TEXT.to_string(), message.clone());
                }
            }
        }
        values
    }

    pub fn from_params(values: &BTreeMap<String, String>) -> Result<Self, ContractError> {
        let text = values.get(params::STATE_TEXT).cloned();
        match values.get(params::STATE).map(String::as_str) {
            Some("ready") => Ok(PluginState::Ready { text }),
            Some("setup_required") => {
                let setup_action = values
                    .get(params::SETUP_ACTION)
                    .cloned()
                    .ok_or(ContractError::MissingParam(params::SETUP_ACTION))?;
                Ok(PluginState::SetupRequired {
                    setup_action,
                    message: text,
                })
            }
            Some(other) => Err(ContractError::InvalidValue {
                column: params::STATE,
                detail: other.to_string(),
            }),
            None => Err(ContractError::MissingParam(params::STATE)),
        }
    }
}
