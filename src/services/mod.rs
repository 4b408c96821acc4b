//! Pipeline services: scheduling, agent-driven phases, and the gates and
//! trackers that sit between them.

pub mod budget;
pub mod decomposition;
pub mod diagnoser;
pub mod implementer;
pub mod integrator;
pub mod resolution;
pub mod scheduler;
pub mod validator;
pub mod wavefront;

pub use budget::{BudgetTracker, PricingTable};
pub use scheduler::{detect_systemic_failure, Scheduler, SystemicPattern};
pub use validator::ContractValidator;
pub use wavefront::{ComponentPhase, WavefrontScheduler};
