//! Chrome DevTools Protocol renderer

use crate::{Error, PaperSize, RenderConfig, Renderer, Result, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Print options for `paper`; margins apply to all four edges
fn pdf_options(paper: PaperSize) -> PrintToPdfOptions {
    PrintToPdfOptions {
        paper_width: Some(paper.width_in),
        paper_height: Some(paper.height_in),
        margin_top: Some(paper.margin_in),
        margin_bottom: Some(paper.margin_in),
        margin_left: Some(paper.margin_in),
        margin_right: Some(paper.margin_in),
        ..Default::default()
    }
}

/// CDP-based renderer (uses the `headless_chrome` crate)
///
/// Launches a headless Chrome instance and drives a single tab. The browser
/// process is killed when the renderer is dropped.
pub struct CdpRenderer {
    browser: Browser,
    tab: Arc<Tab>,
    timeout: Duration,
}

impl CdpRenderer {
    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Document scroll size in CSS pixels, never smaller than the viewport
    fn document_size(&self) -> Result<(f64, f64)> {
        let eval = self
            .tab
            .evaluate(
                r#"JSON.stringify([
                    Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0, window.innerWidth),
                    Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0, window.innerHeight)
                ])"#,
                false,
            )
            .map_err(|e| Error::RenderError(format!("Failed to measure page: {}", e)))?;

        let raw = eval
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::RenderError("No value returned from page measurement".into()))?;

        let (width, height): (f64, f64) = serde_json::from_str(raw)
            .map_err(|e| Error::RenderError(format!("Unexpected page measurement '{}': {}", raw, e)))?;

        Ok((width, height))
    }
}

impl Renderer for CdpRenderer {
    fn new(config: &RenderConfig, viewport: Viewport) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        tab.set_default_timeout(timeout);

        debug!(
            "Launched headless browser with a {}x{} viewport",
            viewport.width, viewport.height
        );

        Ok(Self { browser, tab, timeout })
    }

    fn load_url(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        debug!("Navigated to {}", url);
        Ok(())
    }

    fn wait_until_ready(&mut self, selector: Option<&str>) -> Result<()> {
        let started = Instant::now();

        loop {
            let state = self
                .tab
                .evaluate("document.readyState", false)
                .map_err(|e| Error::LoadError(format!("Failed to read document state: {}", e)))?;

            if state.value.as_ref().and_then(|v| v.as_str()) == Some("complete") {
                break;
            }
            if started.elapsed() >= self.timeout {
                return Err(Error::Timeout(self.timeout_ms()));
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }

        if let Some(selector) = selector {
            let remaining = self.timeout.saturating_sub(started.elapsed());
            self.tab
                .wait_for_element_with_custom_timeout(selector, remaining)
                .map_err(|e| {
                    debug!("Selector '{}' never appeared: {}", selector, e);
                    Error::Timeout(self.timeout_ms())
                })?;
        }

        debug!("Page ready after {:?}", started.elapsed());
        Ok(())
    }

    fn render_pdf(&self, paper: PaperSize) -> Result<Vec<u8>> {
        self.tab
            .print_to_pdf(Some(pdf_options(paper)))
            .map_err(|e| Error::RenderError(format!("PDF export failed: {}", e)))
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        let (width, height) = self.document_size()?;
        debug!("Capturing full page at {}x{}", width, height);

        // captureBeyondViewport lets the clip extend past the window
        let shot = self
            .tab
            .call_method(Page::CaptureScreenshot {
                format: Some(Page::CaptureScreenshotFormatOption::Png),
                quality: None,
                clip: Some(Page::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                    scale: 1.0,
                }),
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: None,
            })
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        base64::engine::general_purpose::STANDARD
            .decode(shot.data)
            .map_err(|e| Error::RenderError(format!("Screenshot payload was not base64: {}", e)))
    }

    fn close(self) -> Result<()> {
        // Drop the tab before the browser so the child process is
        // terminated promptly.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}
