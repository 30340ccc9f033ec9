use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use log::info;
use returns_dashboard::api::ReturnsClient;
use returns_dashboard::config::{self, ClientConfig};
use returns_dashboard::export::ReportExporter;
use returns_dashboard::html::{render_report, RenderOptions};
use returns_dashboard::locale::Language;
use returns_dashboard::logo;
use returns_dashboard::model::{
    ReportData, ReturnFilters, ReturnId, ReturnStatus, SelectedSections, DEFAULT_PAGE_SIZE,
};
use returns_dashboard::raster::{CaptureOptions, ChromeRasterizer};
use returns_dashboard::returns::{ListOptions, RecommendationsFeed, ReturnsList};

type CliResult = Result<(), Box<dyn Error>>;

/// Exports dashboard reports and works with the returns backend.
///
/// Logging is controlled through `RUST_LOG` (default `info`).
#[derive(Parser)]
#[command(author, version, about = "Returns dashboard reports and API client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a report to an A4 PDF through a headless browser.
    Export(ExportArgs),

    /// Write the report HTML document without rasterizing it.
    #[command(name = "render-html", aliases = ["render_html", "html"])]
    RenderHtml(RenderHtmlArgs),

    /// List returns matching the given filters.
    List(ListArgs),

    /// Move a return to a new status.
    #[command(name = "update-status", aliases = ["update_status"])]
    UpdateStatus(UpdateStatusArgs),

    /// Show AI recommendations derived from return patterns.
    Recommendations(RecommendationsArgs),
}

#[derive(Args)]
struct ReportArgs {
    /// JSON file with the report data.
    #[arg(long)]
    data: PathBuf,

    /// Comma separated sections to include.
    #[arg(long, default_value = "summary")]
    sections: String,

    /// Report language; `ar` renders right to left.
    #[arg(long, default_value = "en")]
    language: String,

    /// Logo path, web style paths resolve under the asset root.
    #[arg(long, default_value = logo::DEFAULT_LOGO_PATH)]
    logo: String,

    /// Render without a logo.
    #[arg(long)]
    no_logo: bool,

    /// Directory that web style asset paths resolve against [default: $REPORT_ASSET_ROOT or public].
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// Report date as YYYY-MM-DD instead of today.
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl ReportArgs {
    fn load(&self) -> Result<(ReportData, SelectedSections, Language), Box<dyn Error>> {
        let raw = fs::read_to_string(&self.data)
            .map_err(|err| format!("Failed to read {}: {err}", self.data.display()))?;
        let data: ReportData = serde_json::from_str(&raw)?;
        Ok((
            data,
            SelectedSections::from_list(&self.sections),
            Language::new(self.language.as_str()),
        ))
    }

    fn logo_path(&self) -> Option<String> {
        (!self.no_logo).then(|| self.logo.clone())
    }

    fn asset_root(&self) -> PathBuf {
        self.asset_root
            .clone()
            .unwrap_or_else(config::asset_root_from_env)
    }
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    report: ReportArgs,

    /// Directory the PDF is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Milliseconds to wait before capturing.
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,

    /// Chrome or Chromium executable [default: $REPORT_CHROME_PATH, then PATH].
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// Extra argument passed to the browser, e.g. `--no-sandbox`. Repeatable.
    #[arg(long = "chrome-arg", allow_hyphen_values = true)]
    chrome_args: Vec<String>,

    /// Device pixel ratio of the capture.
    #[arg(long, default_value_t = 2.0)]
    scale: f64,
}

#[derive(Args)]
struct RenderHtmlArgs {
    #[command(flatten)]
    report: ReportArgs,

    /// Output HTML file.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct ApiArgs {
    /// Base URL of the returns backend [default: $RETURNS_API_BASE_URL or http://localhost:8000].
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token sent with every request [default: $RETURNS_API_TOKEN].
    #[arg(long)]
    token: Option<String>,

    /// Request timeout in seconds [default: $RETURNS_API_TIMEOUT_SECS or 30].
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl ApiArgs {
    fn client(&self) -> Result<ReturnsClient, Box<dyn Error>> {
        let mut config = ClientConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config = ClientConfig::new(base_url.as_str())
                .with_token(config.token.clone())
                .with_timeout(config.timeout);
        }
        if let Some(token) = &self.token {
            config = config.with_token(Some(token.clone()));
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        info!("Using returns backend at {}", config.base_url);
        Ok(ReturnsClient::new(config)?)
    }
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    api: ApiArgs,

    #[arg(long)]
    status: Option<ReturnStatus>,

    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    facility_id: Option<String>,

    #[arg(long)]
    start_date: Option<String>,

    #[arg(long)]
    end_date: Option<String>,

    #[arg(long)]
    reason: Option<String>,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    limit: u32,

    /// 1-indexed page number.
    #[arg(long, default_value_t = 1)]
    page: u32,
}

#[derive(Args)]
struct UpdateStatusArgs {
    #[command(flatten)]
    api: ApiArgs,

    /// Return id, numeric or text.
    id: ReturnId,

    status: ReturnStatus,

    /// Reviewer notes stored with the change.
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct RecommendationsArgs {
    #[command(flatten)]
    api: ApiArgs,

    /// Ask the backend to regenerate the recommendations.
    #[arg(long)]
    force_refresh: bool,

    #[arg(long, default_value = "en")]
    language: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export(args) => export(args),
        Commands::RenderHtml(args) => render_html(args),
        Commands::List(args) => list(args),
        Commands::UpdateStatus(args) => update_status(args),
        Commands::Recommendations(args) => recommendations(args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}

fn export(args: ExportArgs) -> CliResult {
    let (data, sections, language) = args.report.load()?;
    let rasterizer = match &args.chrome {
        Some(path) => ChromeRasterizer::new(path),
        None => ChromeRasterizer::discover()?,
    };
    let rasterizer = args
        .chrome_args
        .iter()
        .fold(rasterizer, |rasterizer, arg| rasterizer.with_arg(arg));
    info!("Rendering with {}", rasterizer.executable().display());

    let capture = CaptureOptions {
        scale: args.scale,
        ..CaptureOptions::default()
    };
    let mut exporter = ReportExporter::new(rasterizer)
        .with_logo_path(args.report.logo_path())
        .with_asset_root(args.report.asset_root())
        .with_settle_delay(Duration::from_millis(args.settle_ms))
        .with_capture_options(capture);
    if let Some(date) = args.report.date {
        exporter = exporter.with_date(date);
    }

    let (path, report) = exporter.export_to_dir(&args.out_dir, &data, &sections, &language)?;
    if report.truncated {
        println!("Warning: report was cut off after {} pages", report.page_count);
    }
    println!(
        "Generated {} ({} pages, {} bytes)",
        path.display(),
        report.page_count,
        report.bytes.len()
    );
    Ok(())
}

fn render_html(args: RenderHtmlArgs) -> CliResult {
    let (data, sections, language) = args.report.load()?;
    let date = args
        .report
        .date
        .unwrap_or_else(|| Local::now().date_naive());

    let logo = args.report.logo_path().and_then(|path| {
        logo::load_logo(&path, &args.report.asset_root())
            .map_err(|err| log::warn!("Could not load logo, continuing without it: {err}"))
            .ok()
    });

    let options = RenderOptions::new(language, date).with_logo(logo);
    let html = render_report(&data, &sections, &options);
    fs::write(&args.out, html)
        .map_err(|err| format!("Failed to write {}: {err}", args.out.display()))?;
    println!("Generated {}", args.out.display());
    Ok(())
}

fn list(args: ListArgs) -> CliResult {
    let client = args.api.client()?;
    let filters = ReturnFilters {
        facility_id: args.facility_id,
        start_date: args.start_date,
        end_date: args.end_date,
        status: args.status,
        search: args.search,
        reason: args.reason,
        limit: Some(args.limit),
        offset: Some(0),
    }
    .for_page(args.page);

    let list = ReturnsList::new(&client, filters, ListOptions { auto_load: true });
    if let Some(message) = list.error() {
        return Err(message.into());
    }

    for record in list.returns() {
        println!(
            "{:>6}  {:<14} {:<12} {:<10} {:>10.2}  {}",
            record.id,
            record.return_number,
            record.date.as_deref().unwrap_or("-"),
            record.display_status(),
            record.total_value,
            record.customer.as_deref().unwrap_or("-"),
        );
    }

    let pagination = list.pagination();
    let insights = list.insights();
    println!(
        "Page {} of {} ({} returns). Page value {:.2}, {} pending.",
        pagination.page,
        pagination.total_pages,
        pagination.total,
        insights.total_value,
        insights.pending_count
    );
    Ok(())
}

fn update_status(args: UpdateStatusArgs) -> CliResult {
    let client = args.api.client()?;
    let updated = client.update_return_status(&args.id, args.status, args.notes.as_deref())?;
    info!("Return {} moved to {}", args.id, args.status);
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}

fn recommendations(args: RecommendationsArgs) -> CliResult {
    let client = args.api.client()?;
    let language = Language::new(args.language.as_str());

    let mut feed = RecommendationsFeed::new(&client);
    if !feed.fetch(args.force_refresh) {
        let message = feed.error().unwrap_or("Failed to fetch recommendations");
        return Err(message.into());
    }

    if feed.recommendations().is_empty() {
        println!("{}", language.pick("لا توجد توصيات", "No recommendations"));
    }
    for recommendation in feed.recommendations() {
        println!(
            "[{}] {}",
            recommendation.priority,
            recommendation.localized_title(language.is_arabic())
        );
        println!("    {}", recommendation.localized_description(language.is_arabic()));
        if let Some(savings) = recommendation.positive_savings() {
            println!(
                "    {} {}",
                language.pick("التوفير المتوقع:", "Expected savings:"),
                language.format_number(savings)
            );
        }
    }
    Ok(())
}
