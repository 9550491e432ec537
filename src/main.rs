//! Panegram CLI - bridges wezterm panes to a Telegram forum group.
//!
//! This is the binary entry point. See the `panegram` library for the
//! core functionality.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use panegram::bridge::discovery;
use panegram::{
    Bridge, Config, HarnessKind, HarnessRegistry, Messenger, PaneController, StateStore,
    TelegramBot, WeztermController,
};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "panegram", version, about = "wezterm ↔ Telegram bridge for AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge daemon (default).
    Run,
    /// One-shot pane discovery listing, without touching Telegram.
    Panes,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_bridge(),
        Command::Panes => list_panes(),
    }
}

/// Build everything, validate configuration, and run the loops.
fn run_bridge() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    // Set up signal handlers before any connection work.
    let shutdown = Arc::new(AtomicBool::new(false));
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))?;
    }

    // The Claude identity is required; Codex rides along when its token
    // is present and is simply absent otherwise.
    let mut kinds = vec![HarnessKind::Claude];
    let mut messengers: HashMap<HarnessKind, Arc<dyn Messenger>> = HashMap::new();
    messengers.insert(
        HarnessKind::Claude,
        Arc::new(TelegramBot::new(config.claude_token.clone(), config.chat_id)?),
    );
    if !config.codex_token.is_empty() {
        kinds.push(HarnessKind::Codex);
        messengers.insert(
            HarnessKind::Codex,
            Arc::new(TelegramBot::new(config.codex_token.clone(), config.chat_id)?),
        );
    }

    let registry = Arc::new(HarnessRegistry::new(kinds));
    let controller: Arc<dyn PaneController> = Arc::new(WeztermController::new());
    let store = StateStore::new(config.state_file.clone());

    let names: Vec<&str> = registry.kinds().iter().map(|k| k.name()).collect();
    println!(
        "panegram: [{}] bridging chat {} every {}s",
        names.join(", "),
        config.chat_id,
        config.poll_interval
    );

    let bridge = Arc::new(Bridge::new(
        config,
        registry,
        controller,
        messengers,
        store,
    )?);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move { bridge.run(shutdown).await });
    Ok(())
}

/// Render one discovery pass to stdout. Purely local: session lookup
/// needs no credentials, so both harness kinds are always probed.
fn list_panes() -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let controller = WeztermController::new();
        let registry = HarnessRegistry::new(vec![HarnessKind::Claude, HarnessKind::Codex]);

        let panes = controller.list_panes().await;
        let discovered = discovery::classify(panes, &registry);

        if discovered.is_empty() {
            println!("no panes");
            return;
        }
        for (pane, kind) in &discovered.matched {
            println!("{:<6} {:<24} {}", kind.name(), pane.tab_title, pane.title);
        }
        for pane in &discovered.unmatched {
            println!("{:<6} {:<24} {}", "--", pane.tab_title, pane.title);
        }
    });
    Ok(())
}
