use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

const SETUP_APP: &str = "pipeline.runner.setup.App";
const PAYLOAD_RUNNER: &str = "pipeline.runner.payload.Runner";
const PAYLOAD_LINTER: &str = "pipeline.runner.payload.Linter";

fn write_archive(path: PathBuf, manifest: &str) -> PathBuf {
    fs::create_dir_all(path.parent().expect("archive parent")).expect("create archive dir");
    fs::write(&path, format!("Manifest-Version: 1.0\n{manifest}\n")).expect("write archive");
    path
}

/// Minimal installation: host, app repository, setup and payload archives,
/// an extension module directory and a pipeline definition.
struct Installation {
    root: PathBuf,
}

impl Installation {
    fn new(root: &Path) -> Self {
        write_archive(
            root.join("host/WEB-INF/lib/host-core.jar"),
            "Export-Types: hudson.model.Hudson",
        );
        fs::create_dir_all(root.join("repo/org/example")).expect("create repo");
        write_archive(
            root.join("repo/org/example/shared.jar"),
            "Export-Types: org.example.Shared",
        );
        write_archive(
            root.join("lib/setup/setup.jar"),
            &format!("Export-Types: {SETUP_APP}"),
        );
        write_archive(
            root.join("lib/payload/payload.jar"),
            &format!("Export-Types: {PAYLOAD_RUNNER}, {PAYLOAD_LINTER}"),
        );
        write_archive(
            root.join("plugins/workflow-job.jpi"),
            "Short-Name: workflow-job\n\
             Export-Types: org.jenkinsci.plugins.workflow.job.WorkflowJob",
        );
        fs::create_dir_all(root.join("job")).expect("create job dir");
        fs::write(root.join("job/Jenkinsfile"), "pipeline { agent any }\n")
            .expect("write Jenkinsfile");

        Self {
            root: root.to_path_buf(),
        }
    }

    fn path(&self, rel: &str) -> String {
        self.root.join(rel).display().to_string()
    }

    fn layout_args(&self) -> Vec<String> {
        vec![
            "-w".into(),
            self.path("host"),
            "--app-repo".into(),
            self.path("repo"),
            "--lib-path".into(),
            self.path("lib"),
            "-p".into(),
            self.path("plugins"),
        ]
    }

    fn run(&self, extra: &[&str]) -> Output {
        self.invoke(None, extra)
    }

    fn lint(&self, extra: &[&str]) -> Output {
        self.invoke(Some("lint"), extra)
    }

    fn invoke(&self, command: Option<&str>, extra: &[&str]) -> Output {
        let mut args: Vec<String> = command.into_iter().map(str::to_string).collect();
        args.extend(self.layout_args());
        args.extend(["-f".to_string(), self.path("job")]);
        args.extend(extra.iter().map(|s| s.to_string()));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_runner(&args, Some(&self.root))
    }
}

fn run_runner(args: &[&str], current_dir: Option<&Path>) -> Output {
    let mut cmd = Command::new(PathBuf::from(env!("CARGO_BIN_EXE_pipeline-runner")));
    cmd.args(args).env("RUST_LOG", "info");
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }
    cmd.output().expect("run pipeline-runner command")
}

#[test]
fn version_subcommand_prints_package_version() {
    let output = run_runner(&["version"], None);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")), "stdout: {stdout}");
}

#[test]
fn check_command_accepts_valid_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config = temp.path().join("runner.toml");
    fs::write(
        &config,
        format!(
            "[layout]\nhost_dir = \"{}\"\n\n[observability]\nfilter_level = \"debug\"\n",
            temp.path().display()
        ),
    )
    .expect("write config");

    let output = run_runner(&["check", config.to_str().expect("utf8 path")], None);
    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_command_fails_for_validation_errors() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config = temp.path().join("runner.toml");
    fs::write(&config, "[observability]\nfilter_level = \"loud\"\n").expect("write config");

    let output = run_runner(&["check", config.to_str().expect("utf8 path")], None);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "command should fail");
    assert!(stderr.contains("Invalid filter level"), "unexpected stderr: {stderr}");
}

#[test]
fn run_mode_fails_for_missing_explicit_config() {
    let temp = tempfile::tempdir().expect("temp dir");
    let missing = temp.path().join("missing.toml");
    let output = run_runner(
        &["--config", missing.to_str().expect("utf8 path"), "-w", "/nonexistent"],
        Some(temp.path()),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "run mode should fail");
    assert!(
        stderr.contains("Configuration file not found"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn run_mode_requires_host_dir() {
    let temp = tempfile::tempdir().expect("temp dir");
    let output = run_runner(&["-f", "Jenkinsfile"], Some(temp.path()));
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("layout.host_dir"), "unexpected stderr: {stderr}");
}

#[test]
fn full_run_reaches_the_payload_runner() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());

    let output = install.run(&["-n", "folder/job", "-b", "7", "-a", "TARGET=prod"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Started folder/job #7"), "stdout: {stdout}");
    assert!(stdout.contains("TARGET=prod"), "stdout: {stdout}");
}

#[test]
fn runner_from_an_extension_module_resolves_through_the_fallback() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_dir_all(temp.path().join("lib/payload")).expect("remove payload dir");
    write_archive(
        temp.path().join("plugins/runner.jpi"),
        &format!("Short-Name: runner\nExport-Types: {PAYLOAD_RUNNER}"),
    );

    let output = install.run(&["-n", "from-plugin"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");
    assert!(stdout.contains("Started from-plugin #1"), "stdout: {stdout}");
    assert!(
        stderr.contains(&format!("{PAYLOAD_RUNNER} resolves through setup+extensions")),
        "stderr: {stderr}"
    );
}

#[test]
fn relative_app_repo_is_reported_as_absolute() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_file(temp.path().join("lib/setup/setup.jar")).expect("remove setup archive");

    let output = run_runner(
        &[
            "-w",
            "host",
            "--app-repo",
            "repo",
            "--lib-path",
            "lib",
            "-p",
            "plugins",
            "-f",
            "job",
        ],
        Some(temp.path()),
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains(&install.path("repo")), "stderr: {stderr}");
}

#[test]
fn init_hooks_are_copied_into_the_run_home() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::create_dir_all(temp.path().join("hooks")).expect("create hooks dir");
    fs::write(temp.path().join("hooks/init.groovy"), "println 'init'\n").expect("write hook");
    fs::create_dir_all(temp.path().join("home")).expect("create home");

    let output = install.run(&[
        "--run-home",
        &install.path("home"),
        "--with-init-hooks",
        &install.path("hooks"),
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(temp.path().join("home/init.groovy.d/init.groovy").is_file());
}

#[test]
fn empty_init_hooks_directory_is_fatal() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::create_dir_all(temp.path().join("hooks")).expect("create hooks dir");

    let output = install.run(&["--with-init-hooks", &install.path("hooks")]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("does not contain any hook"), "stderr: {stderr}");
}

#[test]
fn lint_accepts_a_well_formed_definition() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());

    let output = install.lint(&[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("Linting..."), "stdout: {stdout}");
    assert!(stdout.contains("Done"), "stdout: {stdout}");
    assert!(!stdout.contains("Started"), "stdout: {stdout}");
}

#[test]
fn lint_reports_problems_with_status_1() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::write(temp.path().join("job/Jenkinsfile"), "pipeline {\n  agent any\n")
        .expect("write Jenkinsfile");

    let output = install.lint(&[]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stdout.contains("WorkflowScript: 1: '{' is never closed"),
        "stdout: {stdout}"
    );
}

#[test]
fn lint_without_a_linter_names_the_payload_directories() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    write_archive(
        temp.path().join("lib/payload/payload.jar"),
        &format!("Export-Types: {PAYLOAD_RUNNER}"),
    );

    let output = install.lint(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains(PAYLOAD_LINTER), "stderr: {stderr}");
    assert!(stderr.contains(&install.path("lib/payload")), "stderr: {stderr}");
}

#[test]
fn invalid_job_name_exits_with_status_255() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());

    let output = install.run(&["-n", "bad:name"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(255));
    assert!(stderr.contains("invalid job name"), "stderr: {stderr}");
}

#[test]
fn missing_definition_is_reported() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_file(temp.path().join("job/Jenkinsfile")).expect("remove Jenkinsfile");

    let output = install.run(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("Jenkinsfile"), "stderr: {stderr}");
}

#[test]
fn missing_setup_entry_point_names_the_searched_directories() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_file(temp.path().join("lib/setup/setup.jar")).expect("remove setup archive");

    let output = install.run(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains(SETUP_APP), "stderr: {stderr}");
    assert!(stderr.contains(&install.path("repo")), "stderr: {stderr}");
}

#[test]
fn missing_setup_directory_is_fatal() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_dir_all(temp.path().join("lib/setup")).expect("remove setup dir");

    let output = install.run(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("setup"), "stderr: {stderr}");
}

#[test]
fn missing_payload_runner_names_the_payload_directories() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    fs::remove_file(temp.path().join("lib/payload/payload.jar")).expect("remove payload archive");

    let output = install.run(&[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains(PAYLOAD_RUNNER), "stderr: {stderr}");
    assert!(stderr.contains(&install.path("lib/payload")), "stderr: {stderr}");
}

#[test]
fn inspect_keeps_payload_out_of_the_setup_realm() {
    let temp = tempfile::tempdir().expect("temp dir");
    let install = Installation::new(temp.path());
    // Bundled payload inside the app repository must be excluded as well.
    write_archive(
        temp.path()
            .join("repo/io/jenkins/jenkinsfile-runner/payload/bundled.jar"),
        &format!("Export-Types: {PAYLOAD_RUNNER}"),
    );

    let mut args = vec!["inspect".to_string()];
    args.extend(install.layout_args());
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = run_runner(&args, Some(temp.path()));
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let view: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let realms = view["realms"].as_array().expect("realms");
    assert_eq!(realms[0]["label"], "host");
    assert_eq!(realms[1]["label"], "setup");

    let setup_exports: Vec<&str> = realms[1]["exports"]
        .as_array()
        .expect("exports")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(setup_exports.contains(&SETUP_APP));
    assert!(!setup_exports.contains(&PAYLOAD_RUNNER));
}

#[test]
fn assemble_installs_batch_and_dependencies() {
    let temp = tempfile::tempdir().expect("temp dir");
    let batch = write_archive(
        temp.path().join("batch/pipeline.hpi"),
        "Short-Name: pipeline\nPlugin-Dependencies: scm-api:2.6",
    );
    write_archive(
        temp.path().join("search/scm-api/scm-api-2.6.hpi"),
        "Short-Name: scm-api\nPlugin-Version: 2.6",
    );
    let home = temp.path().join("home");

    let output = run_runner(
        &[
            "assemble",
            "--home",
            home.to_str().expect("utf8 path"),
            "--plugin",
            batch.to_str().expect("utf8 path"),
            "--search",
            temp.path().join("search").to_str().expect("utf8 path"),
        ],
        Some(temp.path()),
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(home.join("plugins/pipeline.jpl").is_file());
    assert!(home.join("plugins/scm-api.jpi").is_file());
}
