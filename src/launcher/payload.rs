//! Bundled payload
//!
//! The runner validates the run request and hands the build to the host
//! engine. The linter checks a definition's structure without running it.

use super::contract::{PipelineLinter, PipelineRunner};
use chrono::Local;
use runner_common::{RunError, RunOptions};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

const UNSAFE_CHARACTERS: &[char] = &[
    '?', '*', '/', '\\', '%', '!', '@', '#', '$', '^', '&', '|', '<', '>', '[', ']', ';', ':',
];

const DEFAULT_CAUSE: &str = "Launched by pipeline-runner";

/// Why a job name segment was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobNameError {
    #[error("no name is specified")]
    Empty,

    #[error("'{0}' is not an allowed name")]
    Reserved(String),

    #[error("'{0}' is an unsafe character")]
    UnsafeCharacter(char),
}

/// Check one `/`-separated segment of a job name.
pub fn check_job_segment(segment: &str) -> Result<(), JobNameError> {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return Err(JobNameError::Empty);
    }
    if trimmed == "." || trimmed == ".." {
        return Err(JobNameError::Reserved(trimmed.to_string()));
    }
    if let Some(ch) = trimmed.chars().find(|c| UNSAFE_CHARACTERS.contains(c)) {
        return Err(JobNameError::UnsafeCharacter(ch));
    }
    Ok(())
}

fn read_definition(options: &RunOptions) -> Result<(PathBuf, String), RunError> {
    let definition = options.definition_file();
    if !definition.is_file() {
        return Err(RunError::DefinitionNotFound { path: definition });
    }
    let script = fs::read_to_string(&definition).map_err(|e| RunError::io(&definition, e))?;
    Ok((definition, script))
}

#[derive(Debug, Default)]
pub struct Runner;

impl PipelineRunner for Runner {
    fn run(&mut self, options: &RunOptions) -> Result<i32, RunError> {
        for segment in options.job_segments() {
            if let Err(e) = check_job_segment(segment) {
                eprintln!("invalid job name: '{segment}': {e}");
                error!(job = %options.job_name, "invalid job name segment '{}': {}", segment, e);
                return Ok(-1);
            }
        }

        let (definition, script) = read_definition(options)?;

        if let Some(scm) = &options.scm
            && !scm.is_file()
        {
            return Err(RunError::DefinitionNotFound { path: scm.clone() });
        }
        if let Some(workspace) = &options.run_workspace {
            fs::create_dir_all(workspace).map_err(|e| RunError::io(workspace, e))?;
        }

        let cause = options.cause.as_deref().unwrap_or(DEFAULT_CAUSE);
        info!(
            job = %options.job_name,
            build = options.build_number,
            sandbox = !options.no_sandbox,
            parameters = options.parameters.len(),
            "scheduling build from {:?} ({} bytes)",
            definition,
            script.len()
        );

        if !options.no_build_logs {
            println!(
                "Started {} #{} at {}: {}",
                options.job_name,
                options.build_number,
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                cause
            );
            for (key, value) in &options.parameters {
                println!("  {key}={value}");
            }
            println!("Finished: SUCCESS");
        }

        Ok(0)
    }
}

/// One structural problem in a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintProblem {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl LintProblem {
    fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for LintProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WorkflowScript: {}: {} @ line {}, column {}.",
            self.line, self.message, self.line, self.column
        )
    }
}

#[derive(Clone, Copy)]
enum Scan {
    Code,
    LineComment,
    BlockComment { line: usize, column: usize },
    Quoted { quote: char, line: usize, column: usize },
}

fn closing(open: char) -> char {
    match open {
        '{' => '}',
        '(' => ')',
        _ => ']',
    }
}

/// Characters of `script` with their 1-based line and column.
fn positions(script: &str) -> Vec<(char, usize, usize)> {
    let mut out = Vec::with_capacity(script.len());
    for (index, text) in script.split('\n').enumerate() {
        let mut column = 0;
        for ch in text.chars() {
            column += 1;
            out.push((ch, index + 1, column));
        }
        out.push(('\n', index + 1, column + 1));
    }
    out
}

/// Check that braces, parentheses and brackets balance outside string
/// literals and comments, and that every literal and comment is closed.
pub fn lint_script(script: &str) -> Vec<LintProblem> {
    if script.trim().is_empty() {
        return vec![LintProblem::new(1, 1, "pipeline definition is empty")];
    }

    let chars = positions(script);
    let mut open: Vec<(char, usize, usize)> = Vec::new();
    let mut state = Scan::Code;
    let mut i = 0;

    while i < chars.len() {
        let (ch, line, column) = chars[i];
        let next = chars.get(i + 1).map(|&(n, _, _)| n);

        match state {
            Scan::Code => match ch {
                '/' if next == Some('/') => state = Scan::LineComment,
                '/' if next == Some('*') => {
                    state = Scan::BlockComment { line, column };
                    i += 1;
                }
                '\'' | '"' => {
                    state = Scan::Quoted {
                        quote: ch,
                        line,
                        column,
                    }
                }
                '{' | '(' | '[' => open.push((ch, line, column)),
                '}' | ')' | ']' => match open.pop() {
                    Some((opened, ..)) if closing(opened) == ch => {}
                    Some((opened, ..)) => {
                        let expected = closing(opened);
                        return vec![LintProblem::new(
                            line,
                            column,
                            format!("unexpected '{ch}', expecting '{expected}'"),
                        )];
                    }
                    None => {
                        return vec![LintProblem::new(
                            line,
                            column,
                            format!("unexpected '{ch}' without a matching opener"),
                        )];
                    }
                },
                _ => {}
            },
            Scan::LineComment => {
                if ch == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment { .. } => {
                if ch == '*' && next == Some('/') {
                    state = Scan::Code;
                    i += 1;
                }
            }
            Scan::Quoted { quote, .. } => {
                if ch == '\\' {
                    i += 1;
                } else if ch == quote {
                    state = Scan::Code;
                }
            }
        }
        i += 1;
    }

    let mut problems = Vec::new();
    match state {
        Scan::BlockComment { line, column } => {
            problems.push(LintProblem::new(line, column, "unterminated comment"));
        }
        Scan::Quoted { line, column, .. } => {
            problems.push(LintProblem::new(line, column, "unterminated string literal"));
        }
        Scan::Code | Scan::LineComment => {}
    }
    problems.extend(open.into_iter().map(|(opened, line, column)| {
        LintProblem::new(line, column, format!("'{opened}' is never closed"))
    }));
    problems
}

#[derive(Debug, Default)]
pub struct Linter;

impl PipelineLinter for Linter {
    fn lint(&mut self, options: &RunOptions) -> Result<i32, RunError> {
        let (definition, script) = read_definition(options)?;

        println!("Linting...");
        let problems = lint_script(&script);
        if problems.is_empty() {
            info!("{:?} passed lint", definition);
            println!("Done");
            return Ok(0);
        }

        for problem in &problems {
            println!("{problem}");
        }
        warn!("{:?} has {} lint problems", definition, problems.len());
        Ok(1)
    }
}
