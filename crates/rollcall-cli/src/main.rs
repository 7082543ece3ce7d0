mod config;
mod drive;
mod render;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use config::Config;
use rollcall_client::{load_image, HttpBackend};
use rollcall_core::{spawn_session, DisplayModel, RegistrationForm, SessionHandle};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rollcall", about = "Student face enrollment and group recognition client")]
struct Cli {
    /// Server root URL (overrides ROLLCALL_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a student and upload five face images
    Enroll {
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_no: String,
        #[arg(long)]
        class: String,
        /// Candidate images, tried in order; a rejected image is replaced by the next one
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Resubmissions of the same image after a server or network error
        #[arg(long, default_value_t = 2)]
        retries: u32,
        /// Print the results view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recognize the enrolled students in a group photo
    Recognize {
        photo: PathBuf,
        /// Restrict matching to one class or division
        #[arg(long)]
        division: Option<String>,
        #[arg(long, default_value_t = 2)]
        retries: u32,
        #[arg(long)]
        json: bool,
    },
    /// Check images locally without contacting the server
    Check {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

fn connect(config: &Config) -> Result<SessionHandle> {
    let backend = HttpBackend::new(&config.server_url, config.request_timeout())?;
    tracing::info!(server = %config.server_url, "using face backend");
    Ok(spawn_session(Arc::new(backend), config.timing()))
}

fn print_results(model: &DisplayModel, json: bool) -> Result<()> {
    if json {
        println!("{}", render::render_json(model)?);
    } else {
        println!("{}", render::render_text(model));
    }
    Ok(())
}

fn check(images: &[PathBuf]) -> Result<()> {
    let mut failed = 0usize;
    for path in images {
        match load_image(path) {
            Ok(p) => println!(
                "{}: {:?} {}x{} ({} bytes)",
                path.display(),
                p.format,
                p.width,
                p.height,
                p.payload.data.len()
            ),
            Err(e) => {
                failed += 1;
                println!("{}: {e}", path.display());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} images failed preflight", images.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    match cli.command {
        Commands::Enroll {
            name,
            roll_no,
            class,
            images,
            retries,
            json,
        } => {
            let session = connect(&config)?;
            let form = RegistrationForm::new(name, roll_no, class);
            let model = drive::enroll(&session, form, images, retries).await?;
            print_results(&model, json)?;
        }
        Commands::Recognize {
            photo,
            division,
            retries,
            json,
        } => {
            let session = connect(&config)?;
            let model = drive::recognize(&session, photo, division, retries).await?;
            print_results(&model, json)?;
        }
        Commands::Check { images } => check(&images)?,
    }

    Ok(())
}
