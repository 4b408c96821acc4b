//! Failure diagnosis model.
//!
//! A diagnosis classifies one failing test into a root cause, and each root
//! cause maps to exactly one recovery action:
//!   implementation_bug -> reimplement
//!   glue_bug           -> reglue
//!   contract_bug       -> update_contract
//!   design_bug         -> redesign

use serde::{Deserialize, Serialize};

/// What is actually wrong, as judged from a failing test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    /// A component does not meet its own contract.
    ImplementationBug,
    /// Components are individually correct; the wiring between them is not.
    GlueBug,
    /// The contract itself specifies the wrong behavior.
    ContractBug,
    /// The decomposition cannot satisfy the requirements at all.
    DesignBug,
}

impl RootCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImplementationBug => "implementation_bug",
            Self::GlueBug => "glue_bug",
            Self::ContractBug => "contract_bug",
            Self::DesignBug => "design_bug",
        }
    }
}

/// What to do about a diagnosed root cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Rebuild the component against its unchanged contract.
    Reimplement,
    /// Regenerate the integration layer only.
    Reglue,
    /// Amend the contract, then rebuild downstream artifacts.
    UpdateContract,
    /// Start the decomposition over; not recoverable in place.
    Redesign,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reimplement => "reimplement",
            Self::Reglue => "reglue",
            Self::UpdateContract => "update_contract",
            Self::Redesign => "redesign",
        }
    }
}

/// The verdict for one failing test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub failing_test: String,
    pub root_cause: RootCause,
    pub component_id: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggested_fix: String,
}

impl Diagnosis {
    /// The single recovery action this root cause calls for.
    pub const fn recovery_action(&self) -> RecoveryAction {
        match self.root_cause {
            RootCause::ImplementationBug => RecoveryAction::Reimplement,
            RootCause::GlueBug => RecoveryAction::Reglue,
            RootCause::ContractBug => RecoveryAction::UpdateContract,
            RootCause::DesignBug => RecoveryAction::Redesign,
        }
    }
}
