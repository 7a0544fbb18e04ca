use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use isl_video::sign_video::media;
use isl_video::{Pacing, Settings, Translator};

#[derive(Parser, Debug)]
#[command(name = "isl-video", version, about = "Render English text as an Indian Sign Language video")]
struct Cli {
    /// TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Asset store root (overrides config and ISL_ASSETS_DIR).
    #[arg(long, global = true)]
    assets: Option<PathBuf>,

    /// Output directory (overrides config and ISL_OUTPUT_DIR).
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Frame rate of concatenated videos.
    #[arg(long, global = true)]
    output_fps: Option<u32>,

    /// How clips with other frame rates are re-timed.
    #[arg(long, global = true, value_enum)]
    pacing: Option<PacingChoice>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the assembly plan for TEXT as JSON.
    Plan { text: String },
    /// Render TEXT to an MP4 and print its path.
    Generate {
        text: String,

        /// Session the result is recorded under.
        #[arg(long)]
        session: Option<String>,
    },
    /// Print metadata of an image or video.
    Probe { path: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PacingChoice {
    PreserveDuration,
    PreserveFrameCount,
}

impl From<PacingChoice> for Pacing {
    fn from(choice: PacingChoice) -> Self {
        match choice {
            PacingChoice::PreserveDuration => Pacing::PreserveDuration,
            PacingChoice::PreserveFrameCount => Pacing::PreserveFrameCount,
        }
    }
}

fn settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    }
    .with_env();

    if let Some(assets) = &cli.assets {
        settings.assets_root = assets.clone();
    }
    if let Some(output) = &cli.output {
        settings.output_dir = output.clone();
    }
    if let Some(fps) = cli.output_fps {
        settings.output_fps = fps;
    }
    if let Some(pacing) = cli.pacing {
        settings.pacing = pacing.into();
    }
    settings.validate()?;
    Ok(settings)
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match &cli.cmd {
        Command::Plan { text } => {
            let translator = Translator::new(&settings(&cli)?);
            match translator.plan(text) {
                Ok(plan) => println!("{}", serde_json::to_string_pretty(&plan)?),
                Err(e) if e.is_user_facing() => {
                    eprintln!("{e}");
                    return Ok(ExitCode::from(2));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Generate { text, session } => {
            let translator = Translator::new(&settings(&cli)?);
            match translator.translate(text, session.as_deref()) {
                Ok(publication) => {
                    for skipped in &publication.skipped {
                        eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
                    }
                    println!("{}", publication.path.display());
                }
                Err(e) if e.is_user_facing() => {
                    eprintln!("{e}");
                    return Ok(ExitCode::from(2));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Probe { path } => {
            let asset = media::probe(path)
                .with_context(|| format!("failed to probe '{}'", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&asset)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
