//! Interactive console for the voice ordering engine.
//!
//! Each line typed is delivered to the engine as a recognized utterance, so
//! the whole session flow can be exercised without a speech device. Spoken
//! replies and navigation are printed to stdout.

use clap::Parser;
use kiosk_voice::config::SecretRef;
use kiosk_voice::nlu::gateway::HttpClassifier;
use kiosk_voice::{
    EngineDeps, KioskConfig, MemoryCart, Menu, Navigator, NluGateway, RuntimeEvent, SessionEngine,
    SpeechEvent, SpeechInput, SpeechOutput,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Kiosk Voice: voice ordering session engine console.
#[derive(Parser)]
#[command(name = "kiosk-repl", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Prints spoken output and navigation instead of driving real devices.
struct Console;

impl SpeechOutput for Console {
    fn speak(&self, text: &str) {
        println!("🔊 {text}");
    }
}

impl SpeechInput for Console {
    fn start_capture(&self) {
        println!("(듣는 중...)");
    }
    fn stop_capture(&self) {}
}

impl Navigator for Console {
    fn go_to(&self, screen: &str, params: Option<serde_json::Value>) {
        match params {
            Some(params) => println!("→ 화면 이동: {screen} {params}"),
            None => println!("→ 화면 이동: {screen}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — quiet by default, RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kiosk_voice=warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        KioskConfig::from_file(path)?
    } else {
        KioskConfig::default()
    };

    // Without an API key every utterance degrades to the keyword fallback,
    // which is still enough to drive the session from the console.
    if config.classifier.api_key.resolve().is_err() {
        warn!("classifier API key not configured; keyword fallback only");
        config.classifier.api_key = SecretRef::None;
    }

    let menu = Arc::new(Menu::standard());
    let classifier = Arc::new(HttpClassifier::new(&config.classifier)?);
    let gateway = NluGateway::new(classifier, Arc::clone(&menu));
    let submitter = Arc::new(kiosk_voice::HttpOrderSubmitter::new(&config.orders)?);

    let console = Arc::new(Console);
    let deps = EngineDeps {
        speech_out: console.clone(),
        speech_in: console.clone(),
        navigator: console,
        submitter,
        cart: Box::new(MemoryCart::default()),
    };

    let (engine, handle) = SessionEngine::new(config, menu, gateway, deps);
    let mut events = engine.subscribe_events();
    let engine_task = tokio::spawn(engine.run());

    // Mirror cart and order events next to the spoken replies.
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RuntimeEvent::CartUpdated { lines, total } => {
                    println!("🛒 장바구니 {lines}줄, 합계 {total}원");
                }
                RuntimeEvent::OrderSubmitted { order_number } => {
                    println!("✅ 주문번호 {order_number}");
                }
                _ => {}
            }
        }
    });

    println!("kiosk-voice v{}", env!("CARGO_PKG_VERSION"));
    println!("말씀하실 내용을 입력하세요. 종료는 /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        handle.speech_event(SpeechEvent::Result(line)).await?;
    }

    handle.shutdown().await.ok();
    engine_task.await?;
    Ok(())
}
