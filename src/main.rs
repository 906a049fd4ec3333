use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "dankdrafts",
    version,
    about = "Meme templates, text overlays and JPEG export"
)]
struct Cli {
    /// Serve the site on ADDR (default: [server].addr from settings)
    #[arg(long = "serve", value_name = "ADDR", num_args = 0..=1, default_missing_value = "")]
    serve: Option<String>,

    /// Print every template as id, name and nominal size
    #[arg(long = "list-templates")]
    list_templates: bool,

    /// Print sitemap.xml
    #[arg(long = "sitemap")]
    sitemap: bool,

    /// Export a meme for the template with this id
    #[arg(long = "export", value_name = "ID")]
    export: Option<String>,

    /// JSON array of overlay drafts used with --export
    #[arg(long = "overlays", value_name = "FILE", requires = "export")]
    overlays: Option<PathBuf>,

    /// Width in CSS pixels of the container the overlays were placed in
    #[arg(long = "container-width", value_name = "W", requires = "export")]
    container_width: Option<f32>,

    /// Output file or directory (default: current directory)
    #[arg(long = "out", value_name = "PATH", requires = "export")]
    out: Option<PathBuf>,

    /// Additional settings file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dankdrafts::logging::init(cli.verbose)?;

    if let Some(addr) = cli.serve {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let settings = dankdrafts::settings::load_settings(settings_path)?;
        let addr = if addr.trim().is_empty() {
            settings.server_addr.clone()
        } else {
            addr
        };
        return dankdrafts::server::run_server(settings, addr).await;
    }

    let export = match cli.export {
        Some(template_id) => {
            let overlays_path = cli
                .overlays
                .ok_or_else(|| anyhow!("--overlays is required with --export"))?;
            let container_width = cli
                .container_width
                .ok_or_else(|| anyhow!("--container-width is required with --export"))?;
            Some(dankdrafts::ExportRequest {
                template_id,
                overlays_path,
                container_width,
                out: cli.out,
            })
        }
        None => None,
    };

    let output = dankdrafts::run(dankdrafts::Config {
        settings_path: cli.read_settings,
        list_templates: cli.list_templates,
        sitemap: cli.sitemap,
        export,
    })
    .await?;
    println!("{}", output);
    Ok(())
}
