//! # Invoice Designer CLI
//!
//! Command-line interface for rendering invoices and running the designer
//! server.
//!
//! ## Usage
//!
//! ```bash
//! # Export a PDF with selectable text
//! invoice-designer render --data invoice.json --settings acme.json
//!
//! # Export a pixel-exact PDF of the preview
//! invoice-designer render --data invoice.json --strategy raster
//!
//! # HTML preview with drag handles
//! invoice-designer render --data invoice.json --format html --edit
//!
//! # Suggest theme colors from a logo
//! invoice-designer palette logo.png
//!
//! # Run the HTTP server
//! invoice-designer serve --listen 0.0.0.0:8080 --data-dir ./data
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use log::{LevelFilter, info};
use std::path::{Path, PathBuf};

use invoice_designer::{
    InvoiceError,
    document::{InvoiceData, InvoiceSettings, validate_settings},
    export::{self, ExportStrategy},
    layout,
    palette::{self, ThemeChoice},
    render::{
        logo::{BlobStore, ExecutionContext, LoadedLogo, LogoResolver},
        raster::{self, RasterRenderer},
        screen::{RenderMode, ScreenRenderer},
    },
    server::{self, ServerConfig},
};

/// Invoice Designer - invoice layout and PDF export
#[derive(Parser, Debug)]
#[command(name = "invoice-designer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug detail (drag, layout and logo loading)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pdf,
    Html,
    Png,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render an invoice to a file
    Render {
        /// Invoice data JSON
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        /// Tenant settings JSON (defaults when omitted)
        #[arg(long, value_name = "FILE")]
        settings: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "pdf")]
        format: OutputFormat,

        /// PDF strategy
        #[arg(long, value_enum, default_value = "vector")]
        strategy: ExportStrategy,

        /// Mark blocks as draggable in HTML output
        #[arg(long)]
        edit: bool,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Directory relative logo paths are resolved against
        #[arg(long, default_value = ".")]
        asset_root: PathBuf,
    },

    /// Extract a palette from a logo and suggest a theme
    Palette {
        /// Logo image file
        logo: PathBuf,

        /// Which theme suggestion to show
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Run the designer HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, env = "INVOICE_LISTEN", default_value = "127.0.0.1:8080")]
        listen: String,

        /// Settings, logo and layout cache directory
        #[arg(long, env = "INVOICE_DATA_DIR", default_value = "data")]
        data_dir: PathBuf,

        /// Fetch relative logo paths from this origin instead of the data directory
        #[arg(long, env = "INVOICE_PUBLIC_ORIGIN")]
        public_origin: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), InvoiceError> {
    match command {
        Commands::Render {
            data,
            settings,
            format,
            strategy,
            edit,
            out,
            asset_root,
        } => {
            let data: InvoiceData = read_json(&data).await?;
            data.check()?;
            let settings: InvoiceSettings = match settings {
                Some(path) => read_json(&path).await?,
                None => InvoiceSettings::default(),
            };
            if let Err(errors) = validate_settings(&settings) {
                for e in &errors {
                    log::warn!("{}: {}", e.field, e.message);
                }
                return Err(errors.into_iter().next().map(InvoiceError::from).unwrap_or_else(
                    || InvoiceError::Render("settings failed validation".to_string()),
                ));
            }

            let logo = load_logo(&settings, asset_root).await;
            let path = match format {
                OutputFormat::Pdf => {
                    export::export_to_dir(strategy, settings, data, logo, &out).await?
                }
                OutputFormat::Html => {
                    let layout = layout::layout(&settings, &data, logo.as_ref().map(LoadedLogo::size));
                    let mode = if edit { RenderMode::Edit } else { RenderMode::View };
                    let html = ScreenRenderer::new(mode).render_html(&settings, &layout);
                    let name = sibling_name(&data, "html");
                    export::write_atomic(&out, &name, html.as_bytes()).await?
                }
                OutputFormat::Png => {
                    let name = sibling_name(&data, "png");
                    let png = tokio::task::spawn_blocking(move || {
                        let layout =
                            layout::layout(&settings, &data, logo.as_ref().map(LoadedLogo::size));
                        let bitmap =
                            RasterRenderer::default().render_stacked(&settings, &layout, logo.as_ref());
                        raster::encode_png(&bitmap)
                    })
                    .await
                    .map_err(|e| InvoiceError::Render(format!("Task error: {}", e)))??;
                    export::write_atomic(&out, &name, &png).await?
                }
            };
            println!("Saved to {}", path.display());
        }

        Commands::Palette { logo, index } => {
            let bytes = tokio::fs::read(&logo).await?;
            let colors = palette::extract_palette_from_bytes(&bytes);
            println!("Palette:");
            for hex in palette::to_hex_list(&colors) {
                println!("  {}", hex);
            }
            if let Some(ThemeChoice {
                primary,
                secondary,
                accent,
            }) = ThemeChoice::cycle(&colors, index)
            {
                println!("\nTheme {}:", index);
                println!("  primary:   {}", primary);
                println!("  secondary: {}", secondary);
                println!("  accent:    {}", accent);
            }
        }

        Commands::Serve {
            listen,
            data_dir,
            public_origin,
        } => {
            let config = ServerConfig {
                listen_addr: listen,
                data_dir,
                public_origin,
            };
            info!("Starting server on {}", config.listen_addr);
            server::serve(config).await?;
        }
    }

    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InvoiceError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn load_logo(settings: &InvoiceSettings, asset_root: PathBuf) -> Option<LoadedLogo> {
    let reference = settings.logo()?;
    let resolver = LogoResolver::new(ExecutionContext::Server { asset_root }, BlobStore::new());
    resolver.load(reference).await
}

/// `{invoiceNumber}.{ext}`, sanitized like the PDF name.
fn sibling_name(data: &InvoiceData, ext: &str) -> String {
    let pdf = export::export_file_name(&data.invoice_number);
    let stem = pdf.strip_suffix(".pdf").unwrap_or(&pdf);
    format!("{}.{}", stem, ext)
}
