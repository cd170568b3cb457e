//! Setup layer
//!
//! Runs inside the setup realm: prepares the run home and extension modules,
//! boots the host, then locates and runs the payload runner.

use super::boot::BootLayout;
use super::contract::{self, PipelineLinter, PipelineRunner, SetupApp};
use super::host::HostEngine;
use super::plugins;
use super::{Launch, LaunchMode};
use crate::error::{Error, Result};
use crate::home::RunHome;
use runner_common::RunError;
use runner_realm::{DispatchError, Dispatcher, FallbackRealm, RealmBuilder, Resolver};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct App;

impl SetupApp for App {
    fn run(&mut self, launch: &Launch) -> Result<i32> {
        let settings = &launch.settings;
        let layout = &launch.layout;

        let home = RunHome::prepare(settings.run_home.as_deref())?;
        if let Some(hooks) = &settings.init_hooks {
            home.install_init_hooks(hooks)?;
        }
        let plugins_dir =
            plugins::prepare(&settings.plugins, &home, settings.cache_dir.as_deref())?;

        let fallback = Arc::new(
            FallbackRealm::new(launch.realms.setup.clone())
                .with_label("setup+extensions")
                .with_policy(layout.fallback_policy),
        );

        let engine = HostEngine::boot(
            launch.realms.host.clone(),
            home.path(),
            &plugins_dir,
            layout.extension_scanner(),
            |registry| {
                fallback.bind(registry)?;
                Ok(())
            },
        )?;

        let options = settings.options.clone();
        let result = match settings.mode {
            LaunchMode::Run => {
                let linker = contract::runner_linker();
                let binding = contract::runner_binding();
                let realm = payload_resolver(layout, &fallback, &engine, &binding.type_name)?;
                Dispatcher::<dyn PipelineRunner>::new(&linker).dispatch(
                    realm.as_ref(),
                    &binding,
                    |runner| runner.run(&options),
                )
            }
            LaunchMode::Lint => {
                let linker = contract::linter_linker();
                let binding = contract::linter_binding();
                let realm = payload_resolver(layout, &fallback, &engine, &binding.type_name)?;
                Dispatcher::<dyn PipelineLinter>::new(&linker).dispatch(
                    realm.as_ref(),
                    &binding,
                    |linter| linter.lint(&options),
                )
            }
        };
        let status = payload_status(layout, result)?;

        info!(
            "Payload finished with status {} (host started at {})",
            status,
            engine.started_at().format("%H:%M:%S")
        );
        Ok(status)
    }
}

/// The fallback realm when it already knows `type_name` (bundled or
/// plugin-provided), otherwise a payload realm on top of the extension
/// registry.
fn payload_resolver(
    layout: &BootLayout,
    fallback: &Arc<FallbackRealm>,
    engine: &HostEngine,
    type_name: &str,
) -> Result<Arc<dyn Resolver>> {
    if fallback.resolve(type_name).is_ok() {
        info!("{} resolves through {}", type_name, fallback.label());
        return Ok(fallback.clone() as Arc<dyn Resolver>);
    }

    debug!("{} not visible to {}, building payload realm", type_name, fallback.label());
    let mut builder = RealmBuilder::new(
        "payload",
        Some(engine.registry().clone() as Arc<dyn Resolver>),
    )
    .with_scanner(layout.module_scanner());
    for dir in layout.payload_dirs() {
        builder = builder.collect(dir)?;
    }
    let payload = Arc::new(builder.make()?);
    Ok(payload as Arc<dyn Resolver>)
}

fn payload_status(
    layout: &BootLayout,
    result: std::result::Result<i32, DispatchError<RunError>>,
) -> Result<i32> {
    result.map_err(|err| match err {
        DispatchError::TargetNotFound(not_found) => {
            Error::from((*not_found).with_context(layout.payload_dirs()))
        }
        DispatchError::Invocation(err) => Error::Run(err),
    })
}
