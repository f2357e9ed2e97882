use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Answer of the billing collaborator for a prospective operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub can_afford: bool,
    #[serde(default)]
    pub current_balance: f64,
    #[serde(default)]
    pub required_amount: f64,
}

impl BalanceCheck {
    pub const fn affordable(current_balance: f64, required_amount: f64) -> Self {
        Self {
            can_afford: true,
            current_balance,
            required_amount,
        }
    }

    pub const fn insufficient(current_balance: f64, required_amount: f64) -> Self {
        Self {
            can_afford: false,
            current_balance,
            required_amount,
        }
    }
}
