use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tutor_voice::audio::{pcm, wav};
use tutor_voice::client::{HttpTransport, TurnTransport};
use tutor_voice::http::create_router_with_limit;
use tutor_voice::{AppState, AudioFile, Config, GeminiLiveConnector, SpeakerProfile, TurnBroker, VoiceTurnRequest, WavSpec};

#[derive(Parser)]
#[command(name = "tutor-voice")]
#[command(about = "Voice turn broker for the language tutor")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP turn broker
    Serve {
        /// Config file (extension optional)
        #[arg(short, long, default_value = "config/tutor-voice")]
        config: String,
    },
    /// Send one turn to a running broker
    Ask {
        /// Broker base URL
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,

        /// Typed message
        #[arg(short, long, conflicts_with = "audio")]
        text: Option<String>,

        /// WAV file to send as the spoken turn
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// Where to write the reply audio
        #[arg(short, long, default_value = "reply.wav")]
        out: PathBuf,

        /// Learner name
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Args::parse().command {
        Command::Serve { config } => serve(&config).await,
        Command::Ask {
            url,
            text,
            audio,
            out,
            name,
        } => ask(&url, text, audio, out, name).await,
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Live model: {}", cfg.live.model);
    if cfg.live.api_key.is_empty() {
        tracing::warn!("No API key configured; every turn will fail to connect upstream");
    }

    let connector = GeminiLiveConnector::new(cfg.gemini_settings());
    let broker = TurnBroker::new(Arc::new(connector), cfg.broker_settings());
    let app = create_router_with_limit(AppState::new(broker), cfg.service.http.max_body_bytes);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn ask(
    url: &str,
    text: Option<String>,
    audio: Option<PathBuf>,
    out: PathBuf,
    name: Option<String>,
) -> Result<()> {
    let profile = SpeakerProfile { name, gender: None };

    let request = match (text, audio) {
        (Some(text), _) => VoiceTurnRequest::text(text, profile, None),
        (None, Some(path)) => {
            let file = AudioFile::open(&path)?;
            info!(
                "Sending {:.1}s of audio from {}",
                file.duration_seconds,
                path.display()
            );
            let bytes = wav::encode(&file.to_mono_pcm(), WavSpec::mono_16bit(file.sample_rate));
            VoiceTurnRequest::audio(bytes, profile, None)
        }
        (None, None) => bail!("Pass either --text or --audio"),
    };

    let transport = HttpTransport::new(url)?;
    let reply = transport.send(&request).await?;

    if let Some(text) = reply.text.as_deref() {
        info!("Tutor: {}", text);
    }

    match reply.audio_base64.as_deref() {
        Some(audio) if !reply.fallback => {
            let bytes = pcm::from_base64(audio).context("Reply audio is not valid base64")?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Reply audio saved to {} ({} bytes)", out.display(), bytes.len());
        }
        _ => info!("No reply audio"),
    }

    Ok(())
}
