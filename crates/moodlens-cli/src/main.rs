use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodlens_core::overlay::label_text;
use moodlens_core::FaceDetection;
use moodlens_engine::{spawn_engine, EngineConfig, EngineHandle, ModelLoader, Status, V4lProvider};
use moodlens_hw::Camera;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "moodlens", about = "Live face-emotion classifier")]
struct Cli {
    /// V4L2 device path (overrides MOODLENS_CAMERA_DEVICE)
    #[arg(long, global = true)]
    camera: Option<String>,
    /// Directory holding the classifier, labels and cascade files
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify faces from the camera until interrupted
    Run {
        /// Print results and status changes as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Classify faces in a still image
    Classify {
        /// Image file (JPEG, PNG, ...)
        image: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(camera) = cli.camera {
        config.camera_device = camera;
    }
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    match cli.command {
        Commands::Run { json } => run_live(config, json).await,
        Commands::Classify { image, json } => classify(&config, &image, json),
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

async fn run_live(config: EngineConfig, json: bool) -> Result<()> {
    tracing::info!(
        device = %config.camera_device,
        model_dir = %config.model_dir.display(),
        "starting live session"
    );

    let engine = spawn_engine(
        Arc::new(ModelLoader::from_config(&config)),
        Box::new(V4lProvider::new(config.camera_device.clone())),
        config.engine_settings(),
    )?;

    if let Err(e) = engine.start().await {
        eprintln!("start failed: {e}");
    }

    let mut status = engine.subscribe_status();
    let mut results = engine.subscribe_results();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_labels: Vec<String> = Vec::new();

    print_status(&status.borrow_and_update().clone(), json)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                print_status(&current, json)?;
            }
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let faces = results.borrow_and_update().clone();
                let labels: Vec<String> = faces.iter().map(|f| f.result.label.clone()).collect();
                if labels != last_labels {
                    print_results(&faces, json)?;
                    last_labels = labels;
                }
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_command(&engine, line.trim()).await? {
                        break;
                    }
                }
                None => stdin_open = false,
            },
        }
    }

    engine.stop().await?;
    tracing::info!("live session ended");
    Ok(())
}

/// Returns `false` when the session should end.
async fn handle_command(engine: &EngineHandle, command: &str) -> Result<bool> {
    match command {
        "start" => {
            if let Err(e) = engine.start().await {
                eprintln!("start failed: {e}");
            }
        }
        "stop" => engine.stop().await?,
        "reload" => engine.reload().await?,
        "status" => println!("{}", engine.status()),
        "quit" | "exit" => return Ok(false),
        "" => {}
        other => eprintln!("unknown command: {other} (start, stop, reload, status, quit)"),
    }
    Ok(true)
}

fn classify(config: &EngineConfig, image: &Path, json: bool) -> Result<()> {
    let mut pipeline = ModelLoader::from_config(config)
        .load_pipeline()
        .context("failed to load models")?;

    let mut surface = image::open(image)
        .with_context(|| format!("failed to open {}", image.display()))?
        .to_rgb8();

    let faces = pipeline.process(&mut surface)?;
    print_results(&faces, json)
}

fn print_status(status: &Status, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(status)?);
    } else {
        println!("[{status}]");
    }
    Ok(())
}

fn print_results(faces: &[FaceDetection], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(faces)?);
        return Ok(());
    }
    if faces.is_empty() {
        println!("no faces");
    }
    for (i, face) in faces.iter().enumerate() {
        let r = &face.rect;
        println!(
            "face {i}: {} at ({}, {}) {}x{}",
            label_text(&face.result),
            r.x,
            r.y,
            r.width,
            r.height
        );
    }
    Ok(())
}
