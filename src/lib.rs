//! htmlcapture
//!
//! Renders local HTML documents to PNG screenshots or A4 PDF documents by
//! driving a headless Chrome instance over the Chrome DevTools Protocol.
//!
//! # Features
//!
//! - **CDP Backend**: Uses headless Chrome through the `headless_chrome` crate
//! - **Renderer Trait**: The browser capability sits behind [`Renderer`] so the
//!   conversion flow can run against any backend
//! - **Readiness Waits**: Captures after `document.readyState` settles (and an
//!   optional selector appears) rather than only after a blind delay
//!
//! # Example
//!
//! ```no_run
//! use htmlcapture::{ConversionRequest, OutputFormat, RenderConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut request = ConversionRequest::new("report.html", "report.pdf");
//! request.format = OutputFormat::Pdf;
//!
//! let written = htmlcapture::convert(&request, &RenderConfig::default())?;
//! println!("wrote {}", written.display());
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod cdp;

pub mod convert;
pub use convert::{convert, convert_with, file_url};

/// Default viewport width in CSS pixels
pub const DEFAULT_WIDTH: u32 = 1200;
/// Default viewport height in CSS pixels
pub const DEFAULT_HEIGHT: u32 = 900;
/// Default settle delay in seconds
pub const DEFAULT_WAIT_SECS: u64 = 2;

const IDLE_SLACK: Duration = Duration::from_secs(30);

/// Browser-level configuration
///
/// These knobs control how the browser process is launched and how long
/// page loads may take. They are independent of any single conversion.
///
/// # Examples
///
/// ```
/// let cfg = htmlcapture::RenderConfig::default();
/// assert_eq!(cfg.timeout_ms, 30_000);
/// assert!(cfg.sandbox);
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Timeout for navigation and readiness waits in milliseconds
    pub timeout_ms: u64,
    /// Explicit browser binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the Chrome sandbox enabled
    pub sandbox: bool,
    /// How long the browser may sit without CDP traffic before it is
    /// considered dead; must cover the settle delay
    pub idle_timeout: Duration,
}

impl RenderConfig {
    /// Idle timeout that survives a conversion settling for `wait`
    ///
    /// The browser sees no CDP traffic while the converter sleeps, so the
    /// configured idle timeout is raised to cover the sleep plus a full
    /// navigation timeout and some slack.
    pub fn idle_timeout_for(&self, wait: Duration) -> Duration {
        let needed = wait
            .saturating_add(Duration::from_millis(self.timeout_ms))
            .saturating_add(IDLE_SLACK);
        self.idle_timeout.max(needed)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            chrome_path: None,
            sandbox: true,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Output formats the converter can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full-page PNG screenshot
    Png,
    /// Paginated PDF document
    #[default]
    Pdf,
}

impl OutputFormat {
    /// File extension (without the dot) for this format
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Paper dimensions and uniform page margin in inches, used for PDF export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width_in: f64,
    pub height_in: f64,
    pub margin_in: f64,
}

impl PaperSize {
    /// ISO A4 (210mm x 297mm), edge to edge
    pub const A4: PaperSize = PaperSize {
        width_in: 8.27,
        height_in: 11.7,
        margin_in: 0.0,
    };
}

/// A single HTML-to-file conversion
///
/// Built once from user input, consumed by [`convert`], then discarded.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// HTML document to render (relative paths resolve against the cwd)
    pub input_path: PathBuf,
    /// File to write
    pub output_path: PathBuf,
    /// Output format
    pub format: OutputFormat,
    /// Viewport used for layout
    pub viewport: Viewport,
    /// Fixed settle delay applied after the page reports ready
    pub wait: Duration,
    /// Optional CSS selector that must exist before capture
    pub ready_selector: Option<String>,
}

impl ConversionRequest {
    /// Create a request with default format, viewport and wait
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input.into(),
            output_path: output.into(),
            format: OutputFormat::default(),
            viewport: Viewport::default(),
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            ready_selector: None,
        }
    }
}

/// Append the format's extension to `path` unless it already carries it.
///
/// The comparison ignores case. An existing, different extension is kept:
/// `shot.jpg` becomes `shot.jpg.png`.
pub fn normalize_output_path(path: &Path, format: OutputFormat) -> PathBuf {
    let ext = format.extension();
    let matches = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false);

    if matches {
        return path.to_path_buf();
    }

    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Core trait for browser backends
///
/// A renderer owns one browser process and one page. Dropping it must release
/// the browser, so error paths that never reach [`Renderer::close`] still tear
/// the process down.
pub trait Renderer {
    /// Launch a browser with a single page sized to `viewport`
    fn new(config: &RenderConfig, viewport: Viewport) -> Result<Self>
    where
        Self: Sized;

    /// Navigate to a URL and wait for the navigation to finish
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Block until the document is fully loaded and, when given, until
    /// `selector` matches an element
    fn wait_until_ready(&mut self, selector: Option<&str>) -> Result<()>;

    /// Export the current page as a PDF on the given paper size
    fn render_pdf(&self, paper: PaperSize) -> Result<Vec<u8>>;

    /// Capture the whole document (not just the viewport) as a PNG
    fn render_png(&self) -> Result<Vec<u8>>;

    /// Close the browser and clean up resources
    fn close(self) -> Result<()>;
}

/// Launch the default (CDP) renderer
pub fn new_renderer(config: &RenderConfig, viewport: Viewport) -> Result<impl Renderer> {
    cdp::CdpRenderer::new(config, viewport)
}
