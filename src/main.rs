use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use sceneflow::config::Config;
use sceneflow::segment::{Segmentation, Segmenter, Transcoder};
use sceneflow::session::{SessionActor, SessionEvent};
use sceneflow::summary::SummaryClient;
use sceneflow::transport::stub::ScriptedTransport;
use sceneflow::transport::supervisor::HealthSupervisor;
use sceneflow::transport::{AgentTransport, TransportEvent};

/// ffmpeg-CLI adapter behind the transcoder interface. Works out of a
/// private temp directory; the log text comes back on stderr.
struct FfmpegCli {
    dir: PathBuf,
}

impl FfmpegCli {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("sceneflow-{}", Uuid::new_v4()));
        Self { dir }
    }
}

#[async_trait]
impl Transcoder for FfmpegCli {
    async fn load(&mut self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        tokio::fs::write(self.dir.join(name), bytes).await?;
        Ok(())
    }

    async fn run(&mut self, args: &[String]) -> anyhow::Result<String> {
        let output = tokio::process::Command::new("ffmpeg")
            .current_dir(&self.dir)
            .args(args)
            .output()
            .await
            .context("failed to spawn ffmpeg")?;
        // ffmpeg logs on stderr, and the bare probe invocation always exits
        // nonzero; the caller scans the text, so only a spawn failure is an
        // error here.
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    async fn read_output(&mut self, name: &str) -> anyhow::Result<Vec<u8>> {
        Ok(tokio::fs::read(self.dir.join(name)).await?)
    }

    async fn delete_output(&mut self, name: &str) -> anyhow::Result<()> {
        tokio::fs::remove_file(self.dir.join(name)).await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let Some(video_path) = std::env::args().nth(1) else {
        eprintln!("usage: sceneflow <video-file>");
        std::process::exit(2);
    };
    let video = tokio::fs::read(&video_path)
        .await
        .with_context(|| format!("reading {video_path}"))?;
    tracing::info!(bytes = video.len(), "loaded {video_path}");

    let config = Config::from_env();
    let cancel = CancellationToken::new();

    // Segmentation up front; a hard failure degrades to the whole input as
    // one scene via the empty fallback in ingestion.
    let mut segmenter = Segmenter::new(FfmpegCli::new());
    let segmentation = match segmenter.segment(&video).await {
        Ok(seg) => seg,
        Err(e) => {
            tracing::warn!("segmentation failed, continuing with an empty result: {e}");
            Segmentation::default()
        }
    };

    // Transport and the single session channel every producer feeds.
    let transport: Arc<dyn AgentTransport> = Arc::new(ScriptedTransport::new());
    let (session_tx, session_rx) = mpsc::channel(100);

    let mut transport_events = transport
        .take_events()
        .ok_or_else(|| anyhow!("transport event stream already taken"))?;
    let forward_tx = session_tx.clone();
    tokio::spawn(async move {
        while let Some(ev) = transport_events.recv().await {
            let forwarded = match ev {
                TransportEvent::ToolCall(tc) => SessionEvent::ToolCall(tc),
                TransportEvent::ConnectionState(up) => SessionEvent::TransportHealth(up),
            };
            if forward_tx.send(forwarded).await.is_err() {
                break;
            }
        }
    });

    let audio = sceneflow::audio::spawn(transport.clone(), cancel.clone());

    transport.connect(&config.agent_config()).await?;
    session_tx.send(SessionEvent::TransportHealth(true)).await?;
    audio.start();

    // Supervision starts only once the first connect has gone through, so
    // the opening probe watches a live transport.
    tokio::spawn(
        HealthSupervisor::new(
            transport.clone(),
            config.agent_config(),
            audio.clone(),
            session_tx.clone(),
            cancel.clone(),
        )
        .run(),
    );

    let summarizer = config.api_key.clone().map(|key| {
        SummaryClient::new(config.api_base_url.clone(), config.summary_model.clone(), key)
    });

    session_tx
        .send(SessionEvent::Ingest {
            segmentation,
            source: video,
        })
        .await?;

    // Stdin drives navigation: a 1-based scene number selects, "summary"
    // composes the final narrative, "quit" exits.
    let stdin_tx = session_tx.clone();
    let stdin_cancel = cancel.clone();
    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        println!("Commands: <scene number> | summary | quit");
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "" => {}
                "quit" | "q" => {
                    stdin_cancel.cancel();
                    break;
                }
                "summary" => {
                    let _ = stdin_tx.send(SessionEvent::GenerateSummary).await;
                }
                other => match other.parse::<usize>() {
                    Ok(n) if n >= 1 => {
                        let _ = stdin_tx.send(SessionEvent::Select(n - 1)).await;
                    }
                    _ => println!("unrecognized command: {other}"),
                },
            }
        }
    });

    let actor = SessionActor::new(session_rx, transport.clone(), summarizer);
    tokio::select! {
        _ = actor.run() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
        _ = cancel.cancelled() => {}
    }

    audio.stop();
    cancel.cancel();
    transport.disconnect().await.ok();
    Ok(())
}
