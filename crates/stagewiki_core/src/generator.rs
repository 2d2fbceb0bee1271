use std::path::PathBuf;
use std::process::Command;

use serde::Serialize;

use crate::error::{PipelineError, Result};

pub const DEFAULT_GENERATOR_PROGRAM: &str = "cargo";
pub const DEFAULT_GENERATOR_ARGS: [&str; 2] = ["run", "--"];

/// How to reach the external stage-data generator. Category arguments are
/// appended after `prefix_args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for GeneratorCommand {
    fn default() -> Self {
        Self {
            program: DEFAULT_GENERATOR_PROGRAM.to_string(),
            prefix_args: DEFAULT_GENERATOR_ARGS
                .iter()
                .map(|arg| (*arg).to_string())
                .collect(),
            working_dir: None,
        }
    }
}

impl GeneratorCommand {
    pub fn display(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.prefix_args.iter().cloned());
        parts.extend(args.iter().map(|arg| {
            if arg.contains(' ') {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratorOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl GeneratorOutput {
    /// A failed exit or any diagnostic text is reported, never fatal: the
    /// operator reviews the article before publishing anyway.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.success {
            warnings.push(match self.code {
                Some(code) => format!("generator exited with status {code}"),
                None => "generator was terminated by a signal".to_string(),
            });
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            warnings.push(format!("generator diagnostics: {stderr}"));
        }
        warnings
    }
}

pub fn run_generator(command: &GeneratorCommand, args: &[String]) -> Result<GeneratorOutput> {
    tracing::info!(command = %command.display(args), "running stage-data generator");

    let mut process = Command::new(&command.program);
    process.args(&command.prefix_args);
    process.args(args);
    if let Some(dir) = &command.working_dir {
        process.current_dir(dir);
    }

    let output = process
        .output()
        .map_err(|source| PipelineError::GeneratorSpawn {
            program: command.program.clone(),
            source,
        })?;

    let generated = GeneratorOutput {
        stdout: normalize_newlines(&String::from_utf8_lossy(&output.stdout)),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code(),
        success: output.status.success(),
    };
    for warning in generated.warnings() {
        tracing::warn!("{warning}");
    }
    Ok(generated)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_selector_arguments() {
        let command = GeneratorCommand::default();
        let args = vec!["stage".to_string(), "s 1 0".to_string()];
        assert_eq!(command.display(&args), "cargo run -- stage \"s 1 0\"");
    }

    #[test]
    fn clean_run_has_no_warnings() {
        let output = GeneratorOutput {
            stdout: "{{Stage Info}}".to_string(),
            stderr: String::new(),
            code: Some(0),
            success: true,
        };
        assert!(output.warnings().is_empty());
    }

    #[test]
    fn failed_run_reports_status_and_stderr() {
        let output = GeneratorOutput {
            stdout: String::new(),
            stderr: "  thread 'main' panicked\n".to_string(),
            code: Some(101),
            success: false,
        };
        assert_eq!(
            output.warnings(),
            vec![
                "generator exited with status 101".to_string(),
                "generator diagnostics: thread 'main' panicked".to_string(),
            ]
        );
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let command = GeneratorCommand {
            program: "stagewiki-generator-that-does-not-exist".to_string(),
            prefix_args: Vec::new(),
            working_dir: None,
        };
        let error = run_generator(&command, &[]).expect_err("must fail");
        assert!(matches!(error, PipelineError::GeneratorSpawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn keeps_stdout_when_generator_fails() {
        let command = GeneratorCommand {
            program: "sh".to_string(),
            prefix_args: vec!["-c".to_string()],
            working_dir: None,
        };
        let script = "printf '{{Stage Info}}\\r\\n'; echo oops >&2; exit 3".to_string();
        let output = run_generator(&command, &[script]).expect("run");
        assert_eq!(output.stdout, "{{Stage Info}}\n");
        assert_eq!(output.code, Some(3));
        assert!(!output.success);
        assert_eq!(output.warnings().len(), 2);
    }
}
