use anyhow::Context;
use clap::Parser;
use htmlcapture::{
    normalize_output_path, ConversionRequest, OutputFormat, RenderConfig, Viewport,
    DEFAULT_HEIGHT, DEFAULT_WAIT_SECS, DEFAULT_WIDTH,
};
use log::debug;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

const FAILURE_MESSAGE: &str = "Conversion failed. Please make sure you have Chrome installed.";

/// Convert HTML files to PNG or PDF using headless Chrome.
#[derive(Parser, Debug)]
#[command(name = "htmlcapture", version, about = "Convert HTML files to PNG or PDF")]
struct Cli {
    /// Input HTML file path
    #[arg(short, long)]
    input: PathBuf,

    /// Output file path (PNG or PDF)
    #[arg(short, long)]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pdf)]
    format: OutputFormat,

    /// Viewport width
    #[arg(short, long, default_value_t = DEFAULT_WIDTH,
          value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Viewport height (also accepted as -ht)
    #[arg(long, visible_alias = "ht", default_value_t = DEFAULT_HEIGHT,
          value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Wait time in seconds for JavaScript rendering
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS)]
    wait: u64,

    /// CSS selector that must exist before the page is captured
    #[arg(long, value_name = "SELECTOR")]
    wait_for: Option<String>,

    /// Navigation and readiness timeout in seconds
    #[arg(long, env = "HTMLCAPTURE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Chrome/Chromium binary to launch instead of the auto-detected one
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Disable the Chrome sandbox (needed when running as root in containers)
    #[arg(long, env = "HTMLCAPTURE_NO_SANDBOX")]
    no_sandbox: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,

    /// Only report failures
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Rewrite the two-letter `-ht` short flag (`-ht`, `-ht=N`, `-htN`) into
/// `--height`, since clap short flags are single characters.
fn expand_height_short<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(s) = arg.to_str() else {
                return arg;
            };
            if s == "--" {
                passthrough = true;
                return arg;
            }
            match s.strip_prefix("-ht") {
                Some("") => OsString::from("--height"),
                Some(rest) => {
                    let value = rest.strip_prefix('=').unwrap_or(rest);
                    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                        OsString::from(format!("--height={}", value))
                    } else {
                        arg
                    }
                }
                None => arg,
            }
        })
        .collect()
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn build_request(cli: &Cli) -> ConversionRequest {
    let format = cli.format;
    ConversionRequest {
        input_path: cli.input.clone(),
        output_path: normalize_output_path(&cli.output, format),
        format,
        viewport: Viewport {
            width: cli.width,
            height: cli.height,
        },
        wait: Duration::from_secs(cli.wait),
        ready_selector: cli.wait_for.clone(),
    }
}

fn build_config(cli: &Cli) -> RenderConfig {
    RenderConfig {
        timeout_ms: cli.timeout.saturating_mul(1000),
        chrome_path: cli.chrome_path.clone(),
        sandbox: !cli.no_sandbox,
        ..Default::default()
    }
}

fn run(cli: &Cli) -> anyhow::Result<PathBuf> {
    let request = build_request(cli);
    let config = build_config(cli);

    if !cli.quiet {
        println!(
            "Converting {} to {}...",
            request.input_path.display(),
            request.format.extension().to_uppercase()
        );
    }

    htmlcapture::convert(&request, &config)
        .with_context(|| format!("converting {}", request.input_path.display()))
}

fn main() {
    let cli = Cli::parse_from(expand_height_short(std::env::args_os()));
    init_logging(&cli);

    match run(&cli) {
        Ok(path) => {
            if !cli.quiet {
                println!("Successfully converted to {}", path.display());
            }
        }
        Err(e) => {
            debug!("{:#}", e);
            println!("{}", FAILURE_MESSAGE);
            std::process::exit(1);
        }
    }
}
