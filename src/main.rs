use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thumbforge::{
    compositor::Color,
    discovery::{EndpointDiscovery, GenerationClient, HttpGateway, LocalGateway},
    logger::{self, LoggerConfig},
    provider::ReqwestTransport,
    Config, Control, CosmicTextEngine, FitMode, GenerationEndpoint, ImageSize, ProviderClient, Studio,
    StudioError, TextAlign,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Parser)]
#[command(name = "thumbforge", version, about = "Video thumbnail composer")]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the generation endpoint over HTTP
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Render a thumbnail and write it as PNG
    Compose(ComposeArgs),
    /// Report which generation endpoint a deployment exposes
    Discover {
        #[arg(long)]
        base_url: String,
    },
}

#[derive(Debug, Args)]
struct ComposeArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    subtitle: Option<String>,
    #[arg(long)]
    title_size: Option<u32>,
    #[arg(long)]
    subtitle_size: Option<u32>,
    #[arg(long)]
    stroke: Option<u32>,
    #[arg(long)]
    no_shadow: bool,
    #[arg(long)]
    align: Option<TextAlign>,
    #[arg(long)]
    fit: Option<FitMode>,
    #[arg(long)]
    primary: Option<Color>,
    #[arg(long)]
    secondary: Option<Color>,
    #[arg(long)]
    text_color: Option<Color>,
    /// Background image file
    #[arg(long, conflicts_with_all = ["youtube", "ai"])]
    background: Option<PathBuf>,
    /// YouTube URL or video id to take the background from
    #[arg(long, conflicts_with = "ai")]
    youtube: Option<String>,
    /// Prompt for an AI-generated background
    #[arg(long)]
    ai: Option<String>,
    #[arg(long, default_value = "1024x1024")]
    size: String,
    /// Deployment to call for generation; defaults to an in-process endpoint
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    logo: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

impl ComposeArgs {
    fn controls(&self) -> Vec<Control> {
        let mut controls = Vec::new();
        if let Some(title) = &self.title {
            controls.push(Control::Title(title.clone()));
        }
        if let Some(subtitle) = &self.subtitle {
            controls.push(Control::Subtitle(subtitle.clone()));
        }
        if let Some(px) = self.title_size {
            controls.push(Control::TitleSize(px));
        }
        if let Some(px) = self.subtitle_size {
            controls.push(Control::SubtitleSize(px));
        }
        if let Some(px) = self.stroke {
            controls.push(Control::StrokeWidth(px));
        }
        if self.no_shadow {
            controls.push(Control::Shadow(false));
        }
        if let Some(align) = self.align {
            controls.push(Control::Align(align));
        }
        if let Some(fit) = self.fit {
            controls.push(Control::Fit(fit));
        }
        if let Some(c) = self.primary {
            controls.push(Control::PrimaryColor(c));
        }
        if let Some(c) = self.secondary {
            controls.push(Control::SecondaryColor(c));
        }
        if let Some(c) = self.text_color {
            controls.push(Control::TextColor(c));
        }
        controls
    }
}

fn generation_client(config: &Config, base_url: Option<&str>) -> thumbforge::Result<GenerationClient> {
    let discovery = match base_url {
        Some(url) => EndpointDiscovery::new(Arc::new(HttpGateway::new(url, PROBE_TIMEOUT))),
        None => {
            let provider = ProviderClient::new(config.provider.clone(), config.retry.clone())?;
            EndpointDiscovery::new(Arc::new(LocalGateway::new(GenerationEndpoint::new(provider))))
        }
    };
    Ok(GenerationClient::new(discovery))
}

async fn compose(config: &Config, args: ComposeArgs) -> thumbforge::Result<()> {
    let mut studio = Studio::new(Arc::new(CosmicTextEngine::new()));
    for control in args.controls() {
        studio.apply(control);
    }

    if let Some(path) = &args.background {
        studio.load_background_bytes(&std::fs::read(path)?)?;
    }
    if let Some(path) = &args.logo {
        studio.load_logo_bytes(&std::fs::read(path)?)?;
    }
    if let Some(input) = &args.youtube {
        let transport = ReqwestTransport::new().map_err(|e| StudioError::ConfigError(e.to_string()))?;
        studio = studio.with_downloader(Arc::new(transport), config.retry.download_timeout);
        studio.load_youtube(input).await?;
    }
    if let Some(prompt) = &args.ai {
        let size = ImageSize::parse(&args.size).unwrap_or_default();
        let client = generation_client(config, args.base_url.as_deref())?;
        studio = studio.with_generator(Arc::new(client));
        let outcome = studio.generate_background(prompt, size).await?;
        log::info!("{}", outcome.notice());
    }

    let path = studio.export_to(&args.out)?;
    println!("{}", path.display());
    Ok(())
}

async fn discover(base_url: &str) {
    let discovery = EndpointDiscovery::new(Arc::new(HttpGateway::new(base_url, PROBE_TIMEOUT)));
    match discovery.discover().await {
        Some(endpoint) => println!("AI function is reachable:\n{}{}", base_url.trim_end_matches('/'), endpoint),
        None => println!("No AI function endpoint was found (404)."),
    }
}

#[cfg(feature = "server")]
async fn serve(config: Config) -> thumbforge::Result<()> {
    thumbforge::server::run(config).await
}

#[cfg(not(feature = "server"))]
async fn serve(_config: Config) -> thumbforge::Result<()> {
    Err(StudioError::ConfigError(
        "built without the `server` feature".to_string(),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::from_env();

    let mut log_config = LoggerConfig::from_env();
    if cli.json_logs {
        log_config = log_config.with_json_output(true);
    }
    logger::init_with_config(log_config)?;

    match cli.command {
        Command::Serve { port } => {
            let config = match port {
                Some(port) => {
                    let server = config.server.clone().with_port(port);
                    config.with_server(server)
                }
                None => config,
            };
            logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &config);
            serve(config).await?;
        }
        Command::Compose(args) => compose(&config, args).await?,
        Command::Discover { base_url } => discover(&base_url).await,
    }
    Ok(())
}
