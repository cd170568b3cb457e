//! Contracts shared across realm boundaries
//!
//! Both entry points are located by qualified name in a realm and invoked
//! through these single-method traits, so the launcher never names the
//! concrete setup or payload types.

use super::Launch;
use super::{payload, setup};
use crate::error::Result;
use runner_common::{RUN_OPTIONS_TYPE, RunError, RunOptions};
use runner_realm::{ContractBinding, Linker, MethodSignature};

/// Entry point of the setup realm.
pub const SETUP_APP_TYPE: &str = "pipeline.runner.setup.App";

/// Entry point of the payload realm.
pub const PAYLOAD_RUNNER_TYPE: &str = "pipeline.runner.payload.Runner";

/// Definition checker of the payload realm.
pub const PAYLOAD_LINTER_TYPE: &str = "pipeline.runner.payload.Linter";

/// Type name of [`Launch`] as the platform realm exposes it.
pub const LAUNCH_TYPE: &str = "pipeline.runner.bootstrap.Launch";

pub trait SetupApp {
    /// Drive one run and return the process exit status.
    fn run(&mut self, launch: &Launch) -> Result<i32>;
}

pub trait PipelineRunner {
    /// Run the pipeline and return the build status.
    fn run(&mut self, options: &RunOptions) -> std::result::Result<i32, RunError>;
}

pub trait PipelineLinter {
    /// Check the pipeline definition without running it. Returns 0 when it
    /// is clean.
    fn lint(&mut self, options: &RunOptions) -> std::result::Result<i32, RunError>;
}

pub fn setup_binding() -> ContractBinding {
    ContractBinding::new(SETUP_APP_TYPE, MethodSignature::new("run", [LAUNCH_TYPE]))
}

pub fn runner_binding() -> ContractBinding {
    ContractBinding::new(
        PAYLOAD_RUNNER_TYPE,
        MethodSignature::new("run", [RUN_OPTIONS_TYPE]),
    )
}

pub fn linter_binding() -> ContractBinding {
    ContractBinding::new(
        PAYLOAD_LINTER_TYPE,
        MethodSignature::new("lint", [RUN_OPTIONS_TYPE]),
    )
}

/// Setup-layer implementations linked into this binary.
pub fn setup_linker() -> Linker<dyn SetupApp> {
    let binding = setup_binding();
    Linker::new().link(binding.type_name, binding.method, || {
        Box::new(setup::App::default()) as Box<dyn SetupApp>
    })
}

/// Payload runners linked into this binary.
pub fn runner_linker() -> Linker<dyn PipelineRunner> {
    let binding = runner_binding();
    Linker::new().link(binding.type_name, binding.method, || {
        Box::new(payload::Runner::default()) as Box<dyn PipelineRunner>
    })
}

pub fn linter_linker() -> Linker<dyn PipelineLinter> {
    let binding = linter_binding();
    Linker::new().link(binding.type_name, binding.method, || {
        Box::new(payload::Linter::default()) as Box<dyn PipelineLinter>
    })
}
