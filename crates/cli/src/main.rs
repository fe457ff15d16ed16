mod echo;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use linkharvest_core::{
    BrowserConfig, Diagnostics, Extraction, ExtractionConfig, LinkExtractor, extract_with_browser, fetch_file,
    fetch_stdin,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::echo::{print_banner, print_diagnostics, print_error, print_info, print_step, print_success};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for extracted links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

/// Extract every link from a web page
#[derive(Parser, Debug)]
#[command(name = "linkharvest")]
#[command(version)]
#[command(about = "Extract every link from a web page", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT", required_unless_present = "completions")]
    input: Option<String>,

    /// Page URL for resolving links in file or stdin input
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Request same-domain filtering (applies together with --no-external)
    #[arg(long)]
    filter_domain: bool,

    /// Drop links to other hosts (applies together with --filter-domain)
    #[arg(long)]
    no_external: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    timeout: u64,

    /// Render the page in a headless browser before extracting
    #[arg(long)]
    browser: bool,

    /// Seconds to wait for links to settle in the browser
    #[arg(long, default_value = "15", value_name = "SECS")]
    wait_time: u64,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completion script
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

/// JSON output document
#[derive(Serialize)]
struct Report<'a> {
    links: &'a [String],
    count: usize,
    diagnostics: &'a Diagnostics,
}

enum Input<'a> {
    Url(&'a str),
    Stdin,
    File(&'a str),
}

impl<'a> Input<'a> {
    fn classify(input: &'a str) -> Self {
        if input == "-" {
            Self::Stdin
        } else if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input)
        } else {
            Self::File(input)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "linkharvest_core=debug" } else { "linkharvest_core=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn render(links: &[String], diagnostics: &Diagnostics, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(links.iter().map(|link| format!("{link}\n")).collect()),
        OutputFormat::Json => {
            let report = Report { links, count: links.len(), diagnostics };
            let mut json = serde_json::to_string_pretty(&report).context("Failed to serialize output")?;
            json.push('\n');
            Ok(json)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "linkharvest", &mut io::stdout());
        return Ok(());
    }

    init_tracing(args.verbose);

    if args.verbose {
        print_banner();
        print_info("Debug logging enabled");
        eprintln!();
    }

    let Some(raw_input) = args.input.as_deref() else {
        bail!("INPUT is required");
    };

    let config = ExtractionConfig::builder()
        .filter_domain(args.filter_domain)
        .include_external(!args.no_external)
        .timeout(args.timeout)
        .build();

    let started = Instant::now();

    let extraction: Extraction = match Input::classify(raw_input) {
        Input::Url(url) if args.browser => {
            if args.verbose {
                print_step(1, 2, &format!("Rendering {} in a headless browser", url.bright_white().underline()));
            }
            let browser_config = BrowserConfig::for_timeouts(args.timeout, args.wait_time);
            extract_with_browser(url, &config, &browser_config).await
        }
        Input::Url(url) => {
            if args.verbose {
                print_step(1, 2, &format!("Fetching {}", url.bright_white().underline()));
            }
            let extractor = LinkExtractor::new().context("Failed to initialize HTTP client")?;
            extractor.extract(url, &config).await
        }
        local => {
            if args.browser {
                bail!("--browser requires a URL input");
            }
            let base_url = args
                .base_url
                .as_deref()
                .context("--base-url is required when reading from a file or stdin")?;

            let html = match local {
                Input::File(path) => {
                    if args.verbose {
                        print_step(1, 2, &format!("Reading from file {}", path.bright_white()));
                    }
                    fetch_file(path).with_context(|| format!("Failed to read file: {}", path))?
                }
                _ => {
                    if args.verbose {
                        print_step(1, 2, "Reading from stdin");
                    }
                    fetch_stdin().context("Failed to read from stdin")?
                }
            };

            let extractor = LinkExtractor::new().context("Failed to initialize HTTP client")?;
            extractor
                .extract_from_html(&html, base_url, &config)
                .context("Failed to extract links")?
        }
    };

    let (links, diagnostics) = extraction.into_sorted();

    if args.verbose {
        print_diagnostics(&diagnostics, started.elapsed());
        print_step(2, 2, "Writing output");
    }

    let output = render(&links, &diagnostics, args.format)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            print_success(&format!("{} links written to {}", links.len(), path.display().bright_white()));
        }
        None => {
            print!("{}", output);
        }
    }

    if let Some(error) = diagnostics.error {
        print_error(&error);
        bail!("extraction failed: {error}");
    }

    Ok(())
}
