//! Deterministic simulation harness for Reckon protocol testing.
//!
//! - [`SimEnv`]: seeded `Environment` for reproducible pending draws and
//!   catalogs
//! - [`run_sim_server`]: the server frame loop on a turmoil listener
//! - [`model`]: reference session for model-based testing
//! - [`SessionDriver`]: applies model operations to a real connection
//!
//! # Model-Based Testing
//!
//! Operations are applied to both the model and the real session, and their
//! outcomes and states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
pub mod model;
mod sim_env;
mod sim_server;

pub use driver::{DRIVER_USERNAME, SessionDriver};
pub use model::{ModelSession, Operation, Outcome};
pub use sim_env::SimEnv;
pub use sim_server::{SIM_PORT, run_sim_server};
