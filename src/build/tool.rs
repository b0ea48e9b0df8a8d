//! External tool invocation.
//!
//! Tools are spawned with a fixed argument vector. Their stdout is copied to
//! the build log line by line. Stderr is split into structured data lines
//! (starting with `#`), which are returned to the caller, and diagnostics,
//! which are logged. Exit code 0 means success.
//!
//! Outputs are written to a temporary sibling first and renamed into place
//! only after the tool succeeded, so an interrupted run never leaves a
//! partial file at the final path.

use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::process::{Command, Stdio};
use std::thread;

/// Error while running an external tool.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The executable could not be started
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },
    /// The process exited unsuccessfully
    #[error("{tool} exited with {}", code.map(|c| format!("code {}", c)).unwrap_or_else(|| "a signal".to_string()))]
    Failed { tool: String, code: Option<i32> },
    /// The process reported success but did not write its output
    #[error("{tool} did not produce {}", path.display())]
    MissingOutput { tool: String, path: PathBuf },
    /// IO error while talking to the process or committing its output
    #[error("IO error running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: io::Error,
    },
    /// The command template names no executable
    #[error("Empty command template")]
    EmptyTemplate,
}

/// One classified stderr line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StderrLine {
    /// Structured data for the caller (text after the `#`)
    Data(String),
    /// Human-readable diagnostic
    Diagnostic(String),
}

/// Classify a stderr line. Blank lines yield nothing.
pub fn classify_line(line: &str) -> Option<StderrLine> {
    if let Some(data) = line.strip_prefix('#') {
        return Some(StderrLine::Data(data.trim_end().to_string()));
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(StderrLine::Diagnostic(trimmed.to_string()))
    }
}

/// What a successful tool run reported on stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Structured data lines, without the leading `#`
    pub data: Vec<String>,
    /// Diagnostic lines (already logged)
    pub diagnostics: Vec<String>,
}

/// A fully specified tool invocation.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new(), current_dir: None, envs: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Short name used in log lines and errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Run to completion. Nonzero exit is an error; there is no timeout.
    pub fn run(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();
        tracing::debug!(tool = %tool, args = ?self.args, "spawning");

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let mut child =
            command.spawn().map_err(|source| ToolError::Spawn { tool: tool.clone(), source })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut output = ToolOutput::default();
        let streamed: io::Result<()> = thread::scope(|scope| {
            let stdout_thread = scope.spawn(|| match stdout {
                Some(out) => for_each_line(out, |line| {
                    tracing::info!(tool = %tool, "{}", line);
                }),
                None => Ok(()),
            });

            if let Some(err) = stderr {
                for_each_line(err, |line| match classify_line(line) {
                    Some(StderrLine::Data(data)) => output.data.push(data),
                    Some(StderrLine::Diagnostic(message)) => {
                        tracing::warn!(tool = %tool, "{}", message);
                        output.diagnostics.push(message);
                    }
                    None => {}
                })?;
            }

            stdout_thread.join().unwrap_or(Ok(()))
        });
        streamed.map_err(|source| ToolError::Io { tool: tool.clone(), source })?;

        let status = child.wait().map_err(|source| ToolError::Io { tool: tool.clone(), source })?;
        if status.success() {
            Ok(output)
        } else {
            Err(ToolError::Failed { tool, code: status.code() })
        }
    }
}

/// Feed every line of `reader` to `f`, decoding lossily.
fn for_each_line<R: Read>(reader: R, mut f: impl FnMut(&str)) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        f(line.trim_end_matches(['\n', '\r']));
    }
}

/// A shell-style encoder command such as `ffmpeg -nostdin -i {in} {out}`.
///
/// The executable ends at the first space after its last path separator, so
/// executables inside directories with spaces are supported. Arguments are
/// split on spaces. `{in}`, `{out}` and caller-supplied `{key}` placeholders
/// are substituted anywhere inside an argument; unknown placeholders are
/// passed through literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    pub fn parse(template: &str) -> Result<Self, ToolError> {
        let template = template.trim();
        let program_region = template.find('{').map_or(template, |i| &template[..i]);
        let dir_end = program_region.rfind(['/', '\\', MAIN_SEPARATOR]).map_or(0, |i| i + 1);

        let (program, rest) = match template[dir_end..].find(' ') {
            Some(space) => template.split_at(dir_end + space),
            None => (template, ""),
        };
        if program.is_empty() {
            return Err(ToolError::EmptyTemplate);
        }

        let args = rest.split(' ').filter(|p| !p.is_empty()).map(str::to_string).collect();
        Ok(Self { program: program.to_string(), args })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Executable path, if it points at an existing file.
    pub fn program_path(&self) -> Option<PathBuf> {
        let path = PathBuf::from(&self.program);
        path.is_file().then_some(path)
    }

    /// Substitute placeholders and produce an invocation.
    pub fn render(&self, input: &Path, output: &Path, named: &[(&str, &str)]) -> ToolInvocation {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let args = self.args.iter().map(|part| {
            let mut part = part.clone();
            for (key, value) in named {
                part = part.replace(&format!("{{{}}}", key), value);
            }
            part.replace("{in}", &input).replace("{out}", &output)
        });
        ToolInvocation::new(&self.program).args(args.collect::<Vec<_>>())
    }
}

/// Temporary sibling of `path` that keeps its extension (`a.ogg` -> `a.temp.ogg`).
pub fn temp_path(path: &Path) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}.temp.{}", stem, ext.to_string_lossy()),
        None => format!("{}.temp", stem),
    };
    path.with_file_name(name)
}

/// Move a finished temporary file to its final path.
pub fn commit(temp: &Path, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(temp, path)
}

/// Run a template writing to a temporary sibling of `output`, then commit.
///
/// On failure the temporary file is removed and the final path is left
/// untouched.
pub fn run_committed(
    template: &CommandTemplate,
    input: &Path,
    output: &Path,
    named: &[(&str, &str)],
) -> Result<ToolOutput, ToolError> {
    let temp = temp_path(output);
    if let Some(parent) = temp.parent() {
        fs::create_dir_all(parent).map_err(|source| ToolError::Io {
            tool: template.program().to_string(),
            source,
        })?;
    }

    let invocation = template.render(input, &temp, named);
    let tool = invocation.tool_name();
    let result = invocation.run();
    if result.is_err() {
        let _ = fs::remove_file(&temp);
        return result;
    }
    if !temp.exists() {
        return Err(ToolError::MissingOutput { tool, path: output.to_path_buf() });
    }
    commit(&temp, output).map_err(|source| ToolError::Io { tool, source })?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("#file:s.glsl"), Some(StderrLine::Data("file:s.glsl".to_string())));
        assert_eq!(
            classify_line("  error: bad token "),
            Some(StderrLine::Diagnostic("error: bad token".to_string()))
        );
        assert_eq!(classify_line("   "), None);
        assert_eq!(
            classify_line(" #not data"),
            Some(StderrLine::Diagnostic("#not data".to_string()))
        );
    }

    #[test]
    fn test_template_parse() {
        let t = CommandTemplate::parse("/usr/bin/ffmpeg -nostdin -i {in} {out}").unwrap();
        assert_eq!(t.program(), "/usr/bin/ffmpeg");
        assert_eq!(t.args, vec!["-nostdin", "-i", "{in}", "{out}"]);

        let spaced = CommandTemplate::parse("/opt/My Tools/oggenc {in} -o {out}").unwrap();
        assert_eq!(spaced.program(), "/opt/My Tools/oggenc");
        assert_eq!(spaced.args, vec!["{in}", "-o", "{out}"]);

        let bare = CommandTemplate::parse("lame").unwrap();
        assert_eq!(bare.program(), "lame");
        assert!(bare.args.is_empty());

        assert!(matches!(CommandTemplate::parse("  "), Err(ToolError::EmptyTemplate)));
    }

    #[test]
    fn test_template_render() {
        let t = CommandTemplate::parse("conv from={in} to={out} -q {quality} {unknown}").unwrap();
        let inv = t.render(Path::new("a.png"), Path::new("a.k"), &[("quality", "5")]);
        let args: Vec<String> =
            inv.arguments().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, vec!["from=a.png", "to=a.k", "-q", "5", "{unknown}"]);
        assert_eq!(inv.tool_name(), "conv");
    }

    #[test]
    fn test_temp_path() {
        assert_eq!(temp_path(Path::new("/o/b.ogg")), PathBuf::from("/o/b.temp.ogg"));
        assert_eq!(temp_path(Path::new("/o/blob")), PathBuf::from("/o/blob.temp"));
    }

    #[test]
    fn test_spawn_missing_executable() {
        let result = ToolInvocation::new("/definitely/not/a/tool").run();
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use tempfile::TempDir;

        #[test]
        fn test_run_collects_data_lines() {
            let inv = ToolInvocation::new("/bin/sh")
                .arg("-c")
                .arg("echo hello; echo '#file:a.out' >&2; echo 'warning: x' >&2");
            let output = inv.run().unwrap();
            assert_eq!(output.data, vec!["file:a.out".to_string()]);
            assert_eq!(output.diagnostics, vec!["warning: x".to_string()]);
        }

        #[test]
        fn test_run_nonzero_exit() {
            let result = ToolInvocation::new("/bin/sh").arg("-c").arg("exit 3").run();
            assert!(matches!(result, Err(ToolError::Failed { code: Some(3), .. })));
        }

        #[test]
        fn test_run_committed_success_and_failure() {
            let temp = TempDir::new().unwrap();
            let input = temp.path().join("in.wav");
            fs::write(&input, b"pcm").unwrap();
            let output = temp.path().join("out/in.ogg");

            let copy = CommandTemplate::parse("/bin/cp {in} {out}").unwrap();
            run_committed(&copy, &input, &output, &[]).unwrap();
            assert_eq!(fs::read(&output).unwrap(), b"pcm");
            assert!(!temp_path(&output).exists());

            let failing = CommandTemplate::parse("/bin/sh -c false").unwrap();
            let other = temp.path().join("out/other.ogg");
            assert!(run_committed(&failing, &input, &other, &[]).is_err());
            assert!(!other.exists());
            assert!(!temp_path(&other).exists());
        }

        #[test]
        fn test_run_committed_missing_output() {
            let temp = TempDir::new().unwrap();
            let input = temp.path().join("in.wav");
            fs::write(&input, b"pcm").unwrap();
            let noop = CommandTemplate::parse("/bin/true {in} {out}").unwrap();
            let result = run_committed(&noop, &input, &temp.path().join("x.ogg"), &[]);
            assert!(matches!(result, Err(ToolError::MissingOutput { .. })));
        }
    }
}
