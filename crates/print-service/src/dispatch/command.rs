//! External print commands described by templates such as
//! `lp -d {printer} -n {copies} {file}`.
//!
//! Templates are split into arguments before substitution, so a printer name
//! or path containing spaces always stays a single argument.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::debug;

use super::{DispatchError, DispatchRequest, DispatchStrategy, DispatchTier};

/// Upper bound for any spooler or viewer invocation
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, DispatchError> {
        let mut words = split_command_line(template)
            .ok_or_else(|| DispatchError::InvalidCommand(template.to_string()))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| DispatchError::InvalidCommand(template.to_string()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with placeholders filled in
    pub fn expand(&self, request: &DispatchRequest<'_>) -> Vec<String> {
        let file = request.file.to_string_lossy();
        let copies = request.copies.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{printer}", request.printer)
                    .replace("{file}", &file)
                    .replace("{copies}", &copies)
            })
            .collect()
    }

    /// Whether the program can be found
    pub fn is_installed(&self) -> bool {
        find_program(&self.program).is_some()
    }

    pub async fn run(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError> {
        let args = self.expand(request);
        debug!("Running {} {:?}", self.program, args);

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            command.creation_flags(0x0800_0000);
        }

        let output = tokio::time::timeout(COMMAND_TIMEOUT, command.output())
            .await
            .map_err(|_| DispatchError::CommandTimedOut {
                program: self.program.clone(),
                timeout: COMMAND_TIMEOUT,
            })?
            .map_err(|source| DispatchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DispatchError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(())
    }
}

/// Whitespace-separated words; double quotes group, `\"` escapes a quote.
///
/// Returns `None` for an unterminated quote.
pub fn split_command_line(input: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return None;
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

/// Resolve `program` the way the OS would when spawning it
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.exists().then_some(candidate);
    }

    let path = std::env::var_os("PATH")?;
    let extensions: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd", ".bat"]
    } else {
        &[""]
    };

    std::env::split_paths(&path).find_map(|dir| {
        extensions.iter().find_map(|ext| {
            let full = dir.join(format!("{}{}", program, ext));
            full.is_file().then_some(full)
        })
    })
}

/// A tier implemented by one external command
pub struct CommandStrategy {
    tier: DispatchTier,
    template: CommandTemplate,
}

impl CommandStrategy {
    pub fn new(tier: DispatchTier, template: CommandTemplate) -> Self {
        Self { tier, template }
    }
}

#[async_trait]
impl DispatchStrategy for CommandStrategy {
    fn tier(&self) -> DispatchTier {
        self.tier
    }

    fn is_supported(&self, _printer: &str) -> bool {
        self.template.is_installed()
    }

    async fn send(&self, request: &DispatchRequest<'_>) -> Result<(), DispatchError> {
        self.template.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line(r#"lp -d {printer}  -o raw {file}"#).unwrap(),
            vec!["lp", "-d", "{printer}", "-o", "raw", "{file}"]
        );
        assert_eq!(
            split_command_line(r#""C:\Program Files\Viewer\viewer.exe" /t {file} "#).unwrap(),
            vec![r"C:\Program Files\Viewer\viewer.exe", "/t", "{file}"]
        );
        assert_eq!(split_command_line(r#"echo "" \"x\""#).unwrap(), vec!["echo", "", "\"x\""]);
        assert!(split_command_line(r#"lp "unterminated"#).is_none());
    }

    #[test]
    fn test_expand_keeps_values_as_single_arguments() {
        let template = CommandTemplate::parse("lp -d {printer} -n {copies} {file}").unwrap();
        let request = DispatchRequest {
            printer: "Kantor Depan",
            file: Path::new("/tmp/my docs/print-job-1.pdf"),
            copies: 2,
        };

        assert_eq!(template.program(), "lp");
        assert_eq!(
            template.expand(&request),
            vec!["-d", "Kantor Depan", "-n", "2", "/tmp/my docs/print-job-1.pdf"]
        );
    }

    #[test]
    fn test_parse_rejects_empty_template() {
        assert!(CommandTemplate::parse("   ").is_err());
    }

    #[test]
    fn test_missing_program_is_not_installed() {
        let template = CommandTemplate::parse("definitely-not-a-print-tool-42 {file}").unwrap();
        assert!(!template.is_installed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_substitutes_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("job.bin");
        let target = dir.path().join("printer-port");
        std::fs::write(&source, b"data").unwrap();

        let copy = CommandTemplate::parse("cp {file} {printer}").unwrap();
        assert!(copy.is_installed());
        let target_name = target.to_string_lossy().to_string();
        copy.run(&DispatchRequest {
            printer: &target_name,
            file: &source,
            copies: 1,
        })
        .await
        .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"data");

        let failing = CommandTemplate::parse(r#"sh -c "echo out of paper >&2; exit 3""#).unwrap();
        let err = failing
            .run(&DispatchRequest {
                printer: "POS-58",
                file: &source,
                copies: 1,
            })
            .await
            .unwrap_err();
        match err {
            DispatchError::CommandFailed { stderr, .. } => assert_eq!(stderr, "out of paper"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
