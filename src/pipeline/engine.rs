//! External rendering engines: headless Chromium for HTML→PDF and
//! LibreOffice for office documents.
//!
//! Both sit behind traits so callers (and tests) can inject their own. The
//! process-backed implementations acquire a private [`EngineSession`] per
//! call: a temp directory holding the engine profile and its output, removed
//! when the session drops. The engine is spawned as the leader of its own
//! process group and bounded by a timeout; when the call ends the whole group
//! is killed, so neither a hung engine nor the helpers it forked outlive the
//! call that started it.

use crate::error::StrategyError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Paper and margins used when printing HTML.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub print_background: bool,
}

impl PageLayout {
    /// A4 with 20 mm margins on every side, backgrounds printed.
    pub const A4_PRINT: PageLayout = PageLayout {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_mm: 20.0,
        print_background: true,
    };

    /// CSS that pins the printed page geometry.
    pub fn page_css(&self) -> String {
        let mut css = format!(
            "@page {{ size: {}mm {}mm; margin: {}mm; }}",
            self.width_mm, self.height_mm, self.margin_mm
        );
        if self.print_background {
            css.push_str(" html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }");
        }
        css
    }
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::A4_PRINT
    }
}

/// Renders an HTML document to PDF bytes.
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    fn name(&self) -> &str;

    async fn render_pdf(&self, html: &str, layout: &PageLayout) -> Result<Vec<u8>, StrategyError>;
}

/// Converts an office document on disk to PDF bytes.
#[async_trait]
pub trait OfficeRenderer: Send + Sync {
    fn name(&self) -> &str;

    async fn convert_to_pdf(&self, input: &Path) -> Result<Vec<u8>, StrategyError>;
}

// ── Sessions ─────────────────────────────────────────────────────────────────

/// Private working directory for one engine call.
pub struct EngineSession {
    dir: TempDir,
}

impl EngineSession {
    pub fn acquire(engine: &str) -> Result<Self, StrategyError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("docconv-{engine}-"))
            .tempdir()
            .map_err(|e| StrategyError::EngineUnavailable {
                engine: engine.to_string(),
                detail: format!("cannot create session directory: {e}"),
            })?;
        debug!("{} session: {}", engine, dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_url(&self, name: &str) -> String {
        format!("file://{}", self.path().join(name).display())
    }
}

/// Kills every process in an engine's process group when dropped.
struct ProcessGroupGuard {
    #[cfg_attr(not(unix), allow(dead_code))]
    pgid: Option<u32>,
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                Ok(()) => debug!("Killed engine process group {}", pgid),
                Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill engine process group {}: {}", pgid, e),
            }
        }
    }
}

/// Run `cmd` to completion within `timeout`, classifying failures.
async fn run_engine(engine: &str, mut cmd: Command, timeout: Duration) -> Result<(), StrategyError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| StrategyError::EngineUnavailable {
        engine: engine.to_string(),
        detail: e.to_string(),
    })?;
    let _group = ProcessGroupGuard { pgid: child.id() };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| StrategyError::EngineFailed {
            engine: engine.to_string(),
            detail: e.to_string(),
        })?,
        Err(_) => {
            warn!("{} exceeded {}s, killing its process group", engine, timeout.as_secs());
            return Err(StrategyError::EngineTimeout {
                engine: engine.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        return Err(StrategyError::EngineFailed {
            engine: engine.to_string(),
            detail: format!("{}: {}", output.status, stderr_tail(&output.stderr)),
        });
    }
    Ok(())
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}

/// Read an engine's output file and check it is a PDF.
async fn read_pdf_output(engine: &str, path: &Path) -> Result<Vec<u8>, StrategyError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StrategyError::EngineFailed {
            engine: engine.to_string(),
            detail: format!("no output at {}: {e}", path.display()),
        })?;
    if !bytes.starts_with(b"%PDF") {
        return Err(StrategyError::EngineFailed {
            engine: engine.to_string(),
            detail: "output is not a PDF".into(),
        });
    }
    Ok(bytes)
}

/// Insert a `<style>` block at the start of `<head>`, or before everything.
pub fn inject_css(html: &str, css: &str) -> String {
    let style = format!("<style>{css}</style>");
    if let Some(at) = head_content_start(html) {
        return format!("{}{}{}", &html[..at], style, &html[at..]);
    }
    format!("{style}{html}")
}

/// Byte offset just past the opening `<head>` tag, if there is one.
///
/// `<header>` and other tags that merely start with `head` do not count.
fn head_content_start(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(found) = lower[from..].find("<head") {
        let start = from + found;
        let after = start + "<head".len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() || *c == b'/' => {
                return lower[after..].find('>').map(|end| after + end + 1);
            }
            _ => from = after,
        }
    }
    None
}

// ── Chromium ─────────────────────────────────────────────────────────────────

/// Headless Chromium printing through `--print-to-pdf`.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    binary: PathBuf,
    timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl HtmlRenderer for ChromiumRenderer {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn render_pdf(&self, html: &str, layout: &PageLayout) -> Result<Vec<u8>, StrategyError> {
        let session = EngineSession::acquire(self.name())?;
        let page = session.path().join("page.html");
        let out = session.path().join("page.pdf");

        tokio::fs::write(&page, inject_css(html, &layout.page_css()))
            .await
            .map_err(|e| StrategyError::Io {
                path: page.clone(),
                source: e,
            })?;

        // Virtual time lets pending loads settle before the page is printed.
        let budget_ms = self.timeout.as_millis().min(30_000);
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-pdf-header-footer")
            .arg("--run-all-compositor-stages-before-draw")
            .arg(format!("--virtual-time-budget={budget_ms}"))
            .arg(format!("--user-data-dir={}", session.path().join("profile").display()))
            .arg(format!("--print-to-pdf={}", out.display()))
            .arg(session.file_url("page.html"));

        info!("Printing HTML to PDF with {}", self.binary.display());
        run_engine(self.name(), cmd, self.timeout).await?;
        read_pdf_output(self.name(), &out).await
    }
}

// ── LibreOffice ──────────────────────────────────────────────────────────────

/// LibreOffice in headless `--convert-to pdf` mode.
#[derive(Debug, Clone)]
pub struct LibreOfficeRenderer {
    binary: PathBuf,
    timeout: Duration,
}

impl LibreOfficeRenderer {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

#[async_trait]
impl OfficeRenderer for LibreOfficeRenderer {
    fn name(&self) -> &str {
        "libreoffice"
    }

    async fn convert_to_pdf(&self, input: &Path) -> Result<Vec<u8>, StrategyError> {
        let session = EngineSession::acquire(self.name())?;
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());
        let out = session.path().join(format!("{stem}.pdf"));

        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg(format!("-env:UserInstallation={}", session.file_url("profile")))
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(session.path())
            .arg(input);

        info!("Converting {} with {}", input.display(), self.binary.display());
        run_engine(self.name(), cmd, self.timeout).await?;
        read_pdf_output(self.name(), &out).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_css_is_a4_with_margins() {
        let css = PageLayout::A4_PRINT.page_css();
        assert!(css.contains("size: 210mm 297mm"));
        assert!(css.contains("margin: 20mm"));
        assert!(css.contains("print-color-adjust: exact"));
    }

    #[test]
    fn inject_css_into_head() {
        let html = "<html><HEAD lang=x><title>t</title></HEAD><body></body></html>";
        let out = inject_css(html, "p{}");
        assert_eq!(
            out,
            "<html><HEAD lang=x><style>p{}</style><title>t</title></HEAD><body></body></html>"
        );
        assert_eq!(inject_css("<p>x</p>", "a{}"), "<style>a{}</style><p>x</p>");
    }

    #[test]
    fn inject_css_ignores_header_elements() {
        let html = "<body><header>Top</header><p>x</p></body>";
        assert_eq!(inject_css(html, "a{}"), format!("<style>a{{}}</style>{html}"));

        let both = "<html><header>h</header><head><title>t</title></head></html>";
        assert_eq!(
            inject_css(both, "a{}"),
            "<html><header>h</header><head><style>a{}</style><title>t</title></head></html>"
        );
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        assert_eq!(stderr_tail(b"a\n\nb\nc\nd\n"), "b | c | d");
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let r = ChromiumRenderer::new("/nonexistent/chromium-binary", Duration::from_secs(5));
        let err = r.render_pdf("<p>x</p>", &PageLayout::A4_PRINT).await.unwrap_err();
        assert!(matches!(err, StrategyError::EngineUnavailable { .. }), "got {err}");
    }

    #[tokio::test]
    async fn libreoffice_missing_binary_is_unavailable() {
        let r = LibreOfficeRenderer::new("/nonexistent/soffice", Duration::from_secs(5));
        let err = r.convert_to_pdf(Path::new("/tmp/x.docx")).await.unwrap_err();
        assert!(matches!(err, StrategyError::EngineUnavailable { .. }));
    }

    /// Whether `pid` names a live, non-zombie process.
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.trim_start().chars().next())
                .is_some_and(|state| state != 'Z' && state != 'X'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timed_out_engine_is_killed_with_its_helpers() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let tmp = TempDir::new().unwrap();
        let pid_file = tmp.path().join("helper.pid");
        let script = tmp.path().join("slow-engine.sh");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nsleep 30 &\necho $! > '{}'\nsleep 30\n",
                pid_file.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let renderer = ChromiumRenderer::new(&script, Duration::from_secs(1));
        let started = Instant::now();
        let err = renderer
            .render_pdf("<p>x</p>", &PageLayout::A4_PRINT)
            .await
            .unwrap_err();
        assert!(
            matches!(err, StrategyError::EngineTimeout { secs: 1, .. }),
            "got {err}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));

        let helper: u32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(3);
        while is_running(helper) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!is_running(helper), "helper process {helper} outlived the engine");
    }

    #[test]
    fn session_dir_removed_on_drop() {
        let session = EngineSession::acquire("test").unwrap();
        let path = session.path().to_path_buf();
        assert!(path.is_dir());
        drop(session);
        assert!(!path.exists());
    }
}
