//! Rendering Mermaid sources with mermaid-cli.
//!
//! The transformer only talks to the [`Renderer`] trait; [`MermaidCli`] is
//! the implementation that runs the external `mmdc` binary.

use crate::config::{Config, LOCAL_PUPPETEER_CONFIG};
use crate::error::FilterError;
use crate::format::ImageFormat;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// One source-to-image conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Mermaid source, relative to the renderer's working directory
    pub source: PathBuf,
    /// Image to produce, relative to the renderer's working directory
    pub dest: PathBuf,
    pub format: ImageFormat,
}

pub trait Renderer {
    /// Produce `request.dest` from `request.source`, blocking until done.
    fn render(&self, request: &RenderRequest) -> Result<(), FilterError>;
}

/// Captured result of a renderer process.
#[derive(Debug, Clone)]
struct ToolOutput {
    stdout: String,
    stderr: String,
    /// `None` when the process was terminated by a signal
    exit_code: Option<i32>,
    success: bool,
}

/// Runs mermaid-cli (`mmdc`) as a subprocess.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    bin: String,
    mermaid_config: Option<PathBuf>,
    puppeteer_config: Option<PathBuf>,
    pdf_fit: bool,
    work_dir: PathBuf,
}

impl MermaidCli {
    pub fn new(config: &Config, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: config.mermaid_bin.clone(),
            mermaid_config: config.mermaid_config.clone(),
            puppeteer_config: config.puppeteer_config.clone(),
            pdf_fit: config.pdf_fit,
            work_dir: work_dir.into(),
        }
    }

    /// Arguments passed to the binary for `request`, in mermaid-cli order.
    pub fn args(&self, request: &RenderRequest) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            path_arg(&request.source),
            "-o".to_string(),
            path_arg(&request.dest),
            "-q".to_string(),
        ];

        if request.format == ImageFormat::Pdf && self.pdf_fit {
            args.push("--pdfFit".to_string());
        }
        if let Some(config) = &self.mermaid_config {
            args.push("-c".to_string());
            args.push(path_arg(config));
        }
        if let Some(puppeteer) = &self.puppeteer_config {
            args.push("-p".to_string());
            args.push(path_arg(puppeteer));
        }
        if self.work_dir.join(LOCAL_PUPPETEER_CONFIG).is_file() {
            args.push("-p".to_string());
            args.push(LOCAL_PUPPETEER_CONFIG.to_string());
        }

        args
    }

    /// Spawn the binary and wait for it, capturing both output streams.
    fn execute(&self, args: &[String]) -> Result<ToolOutput, FilterError> {
        let mut child = Command::new(&self.bin)
            .args(args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FilterError::RendererUnavailable {
                bin: self.bin.clone(),
                source,
            })?;

        let stdout_handle = child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_pipe_to_string(stdout)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || read_pipe_to_string(stderr)));

        let status = child.wait().map_err(|e| FilterError::io(&self.bin, e))?;

        Ok(ToolOutput {
            stdout: join_reader(stdout_handle),
            stderr: join_reader(stderr_handle),
            exit_code: status.code(),
            success: status.success(),
        })
    }
}

impl Renderer for MermaidCli {
    fn render(&self, request: &RenderRequest) -> Result<(), FilterError> {
        let args = self.args(request);
        let output = self.execute(&args)?;

        if !output.stdout.trim().is_empty() {
            log::debug!("{} stdout: {}", self.bin, output.stdout.trim());
        }

        if output.success {
            Ok(())
        } else {
            Err(FilterError::RenderFailed {
                command: std::iter::once(self.bin.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" "),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn read_pipe_to_string<R: Read>(mut pipe: R) -> std::io::Result<String> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).to_string())
}

fn join_reader(handle: Option<thread::JoinHandle<std::io::Result<String>>>) -> String {
    match handle.map(|h| h.join()) {
        Some(Ok(Ok(text))) => text,
        Some(Ok(Err(e))) => {
            log::debug!("Failed to read renderer output: {e}");
            String::new()
        }
        Some(Err(_)) => {
            log::debug!("Renderer output reader thread panicked");
            String::new()
        }
        None => String::new(),
    }
}
