//! Headless monitor: runs the sync engine against a live backend and logs
//! every state transition. Useful for watching what a console session would
//! see without a frontend attached.

use std::sync::Arc;

use leadsync::{LogNotifier, SyncConfig, SyncEngine};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("syncwatch failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadsync=debug,info".parse().expect("valid env filter")),
        )
        .init();

    let mut token = std::env::var("LEADSYNC_TOKEN").ok();
    let mut select: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            print_help();
            return Ok(());
        }
        if let Some(value) = arg.strip_prefix("--token=") {
            token = Some(value.to_string());
            continue;
        }
        if arg == "--token" {
            token = Some(args.next().ok_or("--token requires a value")?);
            continue;
        }
        if let Some(value) = arg.strip_prefix("--select=") {
            select = Some(value.to_string());
            continue;
        }
        if arg == "--select" {
            select = Some(args.next().ok_or("--select requires a value")?);
            continue;
        }
        return Err(format!("unknown argument '{arg}'. Try --help"));
    }

    let token = token.ok_or("no session token. Pass --token or set LEADSYNC_TOKEN")?;
    let config = SyncConfig::from_env()?;

    let engine = SyncEngine::start(config, Arc::new(LogNotifier));
    engine
        .set_session(&token)
        .await
        .map_err(|e| format!("session bootstrap failed: {e}"))?;
    if let Some(phone) = select {
        engine
            .select_lead(Some(phone))
            .await
            .map_err(|e| format!("select failed: {e}"))?;
    }

    let mut rx = engine.subscribe();
    loop {
        {
            let s = rx.borrow();
            tracing::info!(
                connected = s.connected,
                leads = s.leads.len(),
                pending = s.pending.len(),
                messages = s.conversations.len(),
                typing = s.is_typing,
                selected = s.selected_phone.as_deref().unwrap_or("-"),
                "state"
            );
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
    Ok(())
}

fn print_help() {
    println!("syncwatch - watch backend sync state from the terminal");
    println!();
    println!("Usage: syncwatch [--token <jwt>] [--select <phone>]");
    println!();
    println!("Options:");
    println!("  --token <jwt>     session token (default: LEADSYNC_TOKEN env var)");
    println!("  --select <phone>  open one conversation after bootstrap");
    println!("  -h, --help        show this help");
    println!();
    println!("Environment:");
    println!("  LEADSYNC_API_URL       backend base url (required)");
    println!("  LEADSYNC_POLL_MS       fallback poll interval override");
    println!("  LEADSYNC_RECONNECT_MS  reconnect delay override");
}
