//! Nucleus is a safety kernel that turns untrusted requests into audited,
//! deterministic side effects. Nothing executes unless a contract-valid
//! Plan exists, an explicit RuntimeContext authorizes it, and a
//! deny-by-default policy admits every step. Every run is traced to an
//! append-only JSONL audit log.
//!
//! The pipeline: Intent -> Planner -> Plan -> ContractStore -> PolicyEngine
//! -> Executor -> Tools, with the TraceSink recording each transition.

pub mod contracts;
pub mod kernel;
pub mod logging;
pub mod paths;
pub mod plugins;
pub mod tools;
pub mod trace;
pub mod types;
