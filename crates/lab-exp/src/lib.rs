#![deny(missing_docs)]
//! Parameter sweep expansion and sequential run orchestration.

pub mod config;
pub mod driver;
pub mod naming;
pub mod provenance;
pub mod range;
pub mod rundir;
pub mod runner;
pub mod sweep;

pub use config::{Configuration, ParamValue, ParameterSpec, RangeSpec, VcsSpec, EXP_INFO_FILE};
pub use driver::{execute_plan, plan_sweep, run_sweep, SweepOptions, SweepPlan, SweepReport};
pub use naming::{classify, plan_run_names, run_name, sweep_name, timestamp, ParamClasses};
pub use provenance::{GitCli, Vcs};
pub use range::expand;
pub use rundir::{ExpInfoHeader, ExpInfoWriter, SweepLayout};
pub use runner::{
    build_invocation, execute, Invocation, NoProgress, ProgressReporter, RunOutcome, RunProgress,
    RunRecord, RunStart,
};
pub use sweep::{combinations, expand_axes, Assignment, ParameterAxis};
