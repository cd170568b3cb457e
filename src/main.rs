//! Pipeline runner 主程序
//!
//! 解析命令行、加载配置、初始化日志，然后引导分层 Realm 并运行流水线

mod cli;

use clap::Parser;
use cli::{Cli, Commands, HomeArgs, LayoutArgs};
use pipeline_runner::launcher::{
    self, BootLayout, BootRealms, LaunchMode, LaunchSettings, environment,
};
use pipeline_runner::observability::{ObservabilityGuard, init_observability};
use pipeline_runner::{Error, Result};
use runner_common::config::fatal_problems;
use runner_common::{DEFAULT_CONFIG_FILE, RunOptions, RunnerConfig};
use runner_realm::ArchiveScanner;
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};

macro_rules! bootstrap_info {
    ($($arg:tt)*) => {
        println!($($arg)*);
    };
}

macro_rules! bootstrap_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(cli::expand_legacy_flags(std::env::args_os()));

    match ApplicationLauncher::dispatch(&cli) {
        Ok(status) => ExitCode::from((status & 0xff) as u8),
        Err(e) => {
            bootstrap_error!("pipeline-runner: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Application launcher utilities
struct ApplicationLauncher;

impl ApplicationLauncher {
    fn dispatch(cli: &Cli) -> Result<i32> {
        match &cli.command {
            Some(Commands::Version) => {
                bootstrap_info!("pipeline-runner {}", env!("CARGO_PKG_VERSION"));
                Ok(0)
            }
            Some(Commands::Check { config_file }) => {
                Self::test_config_file(config_file.as_deref().unwrap_or(cli.config.as_path()))
            }
            Some(Commands::Inspect { layout }) => Self::inspect(&cli.config, layout),
            Some(Commands::Assemble {
                home,
                plugins,
                search,
            }) => {
                let config = Self::load_config(&cli.config)?;
                let _guard = Self::init_logging(&config)?;
                let scanner = ArchiveScanner::new(&config.layout.extension_module_extensions);
                let report = environment::assemble(home, plugins, search, &scanner)?;
                bootstrap_info!("{}", serde_json::to_string_pretty(&report)?);
                Ok(0)
            }
            Some(Commands::Lint(args)) => Self::launch(
                &cli.config,
                &args.layout,
                &args.home,
                LaunchMode::Lint,
                args.to_options(),
            ),
            Some(Commands::Run(args)) => Self::launch(
                &cli.config,
                &args.layout,
                &args.home,
                LaunchMode::Run,
                args.to_options()?,
            ),
            None => Self::launch(
                &cli.config,
                &cli.run.layout,
                &cli.run.home,
                LaunchMode::Run,
                cli.run.to_options()?,
            ),
        }
    }

    /// A missing default config file means built-in defaults; a missing
    /// explicitly named one is an error.
    fn load_config(path: &Path) -> Result<RunnerConfig> {
        let explicit = path != Path::new(DEFAULT_CONFIG_FILE);
        Ok(RunnerConfig::load(path, explicit)?)
    }

    fn load_validated(path: &Path, overrides: &LayoutArgs) -> Result<RunnerConfig> {
        let mut config = Self::load_config(path)?;
        overrides.apply(&mut config.layout);

        if let Err(problems) = config.validate() {
            let fatal = fatal_problems(&problems);
            if !fatal.is_empty() {
                let message = fatal
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(Error::config_validation(message));
            }
            for warning in &problems {
                warn!("{}", warning);
            }
        }
        Ok(config)
    }

    fn init_logging(config: &RunnerConfig) -> Result<ObservabilityGuard> {
        init_observability(config)
    }

    fn launch(
        config_path: &Path,
        overrides: &LayoutArgs,
        home: &HomeArgs,
        mode: LaunchMode,
        options: RunOptions,
    ) -> Result<i32> {
        let config = Self::load_validated(config_path, overrides)?;
        let _guard = Self::init_logging(&config)?;

        let layout = BootLayout::from_config(&config.layout)?;
        let settings = LaunchSettings {
            plugins: config.layout.plugins.clone(),
            cache_dir: config.layout.cache_dir(),
            run_home: home.run_home.clone(),
            init_hooks: home.with_init_hooks.clone(),
            mode,
            options,
        };

        let status = launcher::run(layout, settings)?;
        info!("Run finished with status {}", status);
        Ok(status)
    }

    fn inspect(config_path: &Path, overrides: &LayoutArgs) -> Result<i32> {
        let config = Self::load_validated(config_path, overrides)?;
        let _guard = Self::init_logging(&config)?;

        let layout = BootLayout::from_config(&config.layout)?;
        let realms = BootRealms::build(&layout)?;
        let view = serde_json::json!({
            "layout": layout,
            "platform": realms.platform.as_ref(),
            "realms": realms.snapshots(),
        });
        bootstrap_info!("{}", serde_json::to_string_pretty(&view)?);
        Ok(0)
    }

    /// 测试配置文件是否有效
    fn test_config_file(config_path: &Path) -> Result<i32> {
        let config = RunnerConfig::from_file(config_path)?;
        bootstrap_info!("✅ 配置文件解析成功: {:?}", config_path);

        match config.validate() {
            Ok(()) => {
                bootstrap_info!("✅ 配置验证通过");
                Ok(0)
            }
            Err(problems) => {
                for (i, problem) in problems.iter().enumerate() {
                    if problem.starts_with("Warning:") {
                        bootstrap_info!("  {}. ⚠️  {}", i + 1, problem);
                    } else {
                        bootstrap_error!("  {}. ❌ {}", i + 1, problem);
                    }
                }
                if fatal_problems(&problems).is_empty() {
                    bootstrap_info!("✅ 配置验证通过（存在警告）");
                    Ok(0)
                } else {
                    bootstrap_error!("❌ 配置验证失败");
                    Ok(1)
                }
            }
        }
    }
}
