//! The conversion flow: resolve the input, drive a renderer, write the output

use crate::{ConversionRequest, Error, OutputFormat, PaperSize, RenderConfig, Renderer, Result, Viewport};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use url::Url;

/// Build a `file://` URL for `input`, resolving relative paths against the
/// current directory.
///
/// Fails with [`Error::InputNotFound`] when the path is not an existing file.
pub fn file_url(input: &Path) -> Result<Url> {
    let abs = if input.is_absolute() {
        input.to_path_buf()
    } else {
        std::env::current_dir()?.join(input)
    };

    if !abs.is_file() {
        return Err(Error::InputNotFound(abs));
    }

    Url::from_file_path(&abs)
        .map_err(|_| Error::ConfigError(format!("Cannot build a file URL for {}", abs.display())))
}

/// Convert `request` using the default CDP renderer.
///
/// The browser's idle timeout is raised to cover `request.wait`. Returns the
/// path that was written.
pub fn convert(request: &ConversionRequest, config: &RenderConfig) -> Result<PathBuf> {
    let config = RenderConfig {
        idle_timeout: config.idle_timeout_for(request.wait),
        ..config.clone()
    };
    convert_with(request, |viewport| crate::new_renderer(&config, viewport))
}

/// Convert `request` with a renderer produced by `launch`.
///
/// `launch` is only called once the input has been resolved, so a missing
/// input never starts a browser. The renderer is owned by this call and is
/// dropped (releasing the browser) on every exit path.
pub fn convert_with<R, F>(request: &ConversionRequest, launch: F) -> Result<PathBuf>
where
    R: Renderer,
    F: FnOnce(Viewport) -> Result<R>,
{
    if request.viewport.width == 0 || request.viewport.height == 0 {
        return Err(Error::ConfigError(format!(
            "Viewport must be positive, got {}x{}",
            request.viewport.width, request.viewport.height
        )));
    }

    let url = file_url(&request.input_path)?;
    debug!("Resolved {} to {}", request.input_path.display(), url);

    let mut renderer = launch(request.viewport)?;
    let bytes = capture(&mut renderer, url.as_str(), request)?;

    if bytes.is_empty() {
        return Err(Error::RenderError("Browser returned an empty document".into()));
    }

    std::fs::write(&request.output_path, &bytes)?;
    info!(
        "Wrote {} bytes of {} to {}",
        bytes.len(),
        request.format,
        request.output_path.display()
    );

    if let Err(e) = renderer.close() {
        warn!("Failed to close browser cleanly: {}", e);
    }

    Ok(request.output_path.clone())
}

fn capture<R: Renderer>(renderer: &mut R, url: &str, request: &ConversionRequest) -> Result<Vec<u8>> {
    renderer.load_url(url)?;
    renderer.wait_until_ready(request.ready_selector.as_deref())?;

    // Settle time for client-side scripts that keep mutating after load
    if !request.wait.is_zero() {
        debug!("Settling for {:?} before capture", request.wait);
        std::thread::sleep(request.wait);
    }

    match request.format {
        OutputFormat::Pdf => renderer.render_pdf(PaperSize::A4),
        OutputFormat::Png => renderer.render_png(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Default)]
    struct Probe {
        calls: RefCell<Vec<String>>,
        launches: Cell<u32>,
        released: Cell<bool>,
        viewport: Cell<Option<Viewport>>,
    }

    struct MockRenderer {
        probe: Rc<Probe>,
        fail_on: Option<&'static str>,
    }

    impl MockRenderer {
        fn step(&self, name: &'static str) -> Result<()> {
            self.probe.calls.borrow_mut().push(name.to_string());
            if self.fail_on == Some(name) {
                return Err(Error::RenderError(format!("{} failed", name)));
            }
            Ok(())
        }
    }

    impl Drop for MockRenderer {
        fn drop(&mut self) {
            self.probe.released.set(true);
        }
    }

    impl Renderer for MockRenderer {
        fn new(_config: &RenderConfig, _viewport: Viewport) -> Result<Self> {
            Ok(Self { probe: Rc::new(Probe::default()), fail_on: None })
        }

        fn load_url(&mut self, url: &str) -> Result<()> {
            assert!(url.starts_with("file://"), "unexpected url {}", url);
            self.step("load")
        }

        fn wait_until_ready(&mut self, selector: Option<&str>) -> Result<()> {
            if let Some(sel) = selector {
                self.probe.calls.borrow_mut().push(format!("selector:{}", sel));
            }
            self.step("ready")
        }

        fn render_pdf(&self, paper: PaperSize) -> Result<Vec<u8>> {
            assert_eq!(paper, PaperSize::A4);
            assert_eq!(paper.margin_in, 0.0);
            self.step("pdf")?;
            Ok(b"%PDF-1.4 mock".to_vec())
        }

        fn render_png(&self) -> Result<Vec<u8>> {
            self.step("png")?;
            Ok(b"\x89PNG\r\n\x1a\nmock".to_vec())
        }

        fn close(self) -> Result<()> {
            self.probe.calls.borrow_mut().push("close".to_string());
            Ok(())
        }
    }

    fn launcher(
        probe: &Rc<Probe>,
        fail_on: Option<&'static str>,
    ) -> impl FnOnce(Viewport) -> Result<MockRenderer> {
        let probe = probe.clone();
        move |viewport| {
            probe.launches.set(probe.launches.get() + 1);
            probe.viewport.set(Some(viewport));
            Ok(MockRenderer { probe, fail_on })
        }
    }

    fn fixture(dir: &Path) -> PathBuf {
        let input = dir.join("page.html");
        std::fs::write(&input, "<html><body><h1>hi</h1></body></html>").unwrap();
        input
    }

    fn request(dir: &Path, format: OutputFormat) -> ConversionRequest {
        let mut req = ConversionRequest::new(fixture(dir), dir.join(format!("out.{}", format)));
        req.format = format;
        req.wait = Duration::ZERO;
        req
    }

    #[test]
    fn file_url_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let input = fixture(dir.path());
        let url = file_url(&input).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/page.html"));
    }

    #[test]
    fn file_url_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_url(&dir.path().join("nope.html")).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn file_url_rejects_directory_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_url(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn pdf_conversion_writes_output_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), OutputFormat::Pdf);
        let probe = Rc::new(Probe::default());

        let written = convert_with(&req, launcher(&probe, None)).unwrap();

        assert_eq!(written, req.output_path);
        assert!(std::fs::read(&written).unwrap().starts_with(b"%PDF"));
        assert_eq!(*probe.calls.borrow(), vec!["load", "ready", "pdf", "close"]);
        assert!(probe.released.get());
    }

    #[test]
    fn png_conversion_uses_full_page_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), OutputFormat::Png);
        req.viewport = Viewport { width: 800, height: 600 };
        let probe = Rc::new(Probe::default());

        convert_with(&req, launcher(&probe, None)).unwrap();

        assert!(std::fs::read(&req.output_path).unwrap().starts_with(b"\x89PNG"));
        assert_eq!(*probe.calls.borrow(), vec!["load", "ready", "png", "close"]);
        assert_eq!(probe.viewport.get(), Some(Viewport { width: 800, height: 600 }));
    }

    #[test]
    fn ready_selector_is_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), OutputFormat::Pdf);
        req.ready_selector = Some("#chart".into());
        let probe = Rc::new(Probe::default());

        convert_with(&req, launcher(&probe, None)).unwrap();

        assert!(probe.calls.borrow().contains(&"selector:#chart".to_string()));
    }

    #[test]
    fn missing_input_never_launches() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), OutputFormat::Pdf);
        req.input_path = dir.path().join("missing.html");
        let probe = Rc::new(Probe::default());

        let err = convert_with(&req, launcher(&probe, None)).unwrap_err();

        assert!(matches!(err, Error::InputNotFound(_)));
        assert_eq!(probe.launches.get(), 0);
        assert!(!req.output_path.exists());
    }

    #[test]
    fn load_failure_releases_browser_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), OutputFormat::Png);
        let probe = Rc::new(Probe::default());

        assert!(convert_with(&req, launcher(&probe, Some("load"))).is_err());

        assert_eq!(*probe.calls.borrow(), vec!["load"]);
        assert!(probe.released.get());
        assert!(!req.output_path.exists());
    }

    #[test]
    fn export_failure_releases_browser_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), OutputFormat::Pdf);
        let probe = Rc::new(Probe::default());

        assert!(convert_with(&req, launcher(&probe, Some("pdf"))).is_err());

        assert!(!probe.calls.borrow().contains(&"close".to_string()));
        assert!(probe.released.get());
        assert!(!req.output_path.exists());
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), OutputFormat::Png);
        req.viewport.width = 0;
        let probe = Rc::new(Probe::default());

        let err = convert_with(&req, launcher(&probe, None)).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
        assert_eq!(probe.launches.get(), 0);
    }
}
