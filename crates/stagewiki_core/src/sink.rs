use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

#[derive(Debug, Clone, Default)]
pub struct SinkOptions {
    pub echo: bool,
    pub output_path: Option<PathBuf>,
    /// Program plus arguments that read the article on stdin.
    pub clipboard: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub echoed: bool,
    pub written_to: Option<PathBuf>,
    pub copied_with: Option<String>,
}

pub fn deliver<W: Write>(text: &str, options: &SinkOptions, out: &mut W) -> Result<DeliveryReport> {
    let mut report = DeliveryReport::default();

    if let Some(path) = &options.output_path {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        report.written_to = Some(path.clone());
    }

    if let Some(command) = &options.clipboard {
        copy_with(command, text)?;
        report.copied_with = command.first().cloned();
    }

    if options.echo {
        writeln!(out, "{text}").context("failed to write article to stdout")?;
        report.echoed = true;
    }

    Ok(report)
}

fn copy_with(command: &[String], text: &str) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("clipboard command is empty");
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to execute clipboard command {program}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .with_context(|| format!("failed to pipe article into {program}"))?;
    }
    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {program}"))?;
    if !status.success() {
        bail!("clipboard command {program} exited with {status}");
    }
    tracing::info!(program = program.as_str(), "article copied to clipboard");
    Ok(())
}

/// First clipboard tool found on PATH, in platform preference order.
pub fn detect_clipboard_command() -> Option<Vec<String>> {
    let candidates: &[&[&str]] = if cfg!(windows) {
        &[&["clip.exe"]]
    } else if cfg!(target_os = "macos") {
        &[&["pbcopy"]]
    } else {
        &[
            &["wl-copy"],
            &["xclip", "-selection", "clipboard"],
            &["xsel", "--clipboard", "--input"],
        ]
    };
    let path_var = env::var("PATH").ok()?;
    for candidate in candidates {
        let Some(program) = candidate.first() else {
            continue;
        };
        if find_on_path(&path_var, program).is_some() {
            return Some(candidate.iter().map(|part| (*part).to_string()).collect());
        }
    }
    None
}

fn find_on_path(path_var: &str, program: &str) -> Option<PathBuf> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    path_var
        .split(separator)
        .map(|part| PathBuf::from(strip_wrapping_quotes(part.trim())))
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

fn strip_wrapping_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
