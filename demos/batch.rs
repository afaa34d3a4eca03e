use fluxez::{BatchOrchestrator, BatchProgress, GenerateApiClient, GenerationRequest, SlotStatus};
use futures::StreamExt;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_loaded = dotenv::dotenv().is_ok();
    fluxez::logger::init()?;
    if env_loaded {
        log::info!("✅ .env file loaded");
    } else {
        log::warn!("⚠️  No .env file found");
    }

    let app_url = env::var("FLUXEZ_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let client = GenerateApiClient::new(app_url)?;
    let orchestrator = BatchOrchestrator::new(Arc::new(client));

    let request = GenerationRequest::new("A lighthouse on a cliff at dusk, cinematic")
        .with_size(768, 512)
        .with_steps(20)
        .with_batch_size(4);

    let mut handle = orchestrator.start(request)?;
    let mut progress = BatchProgress::new(handle.size());
    if let Some(mut updates) = handle.updates() {
        while let Some(slot) = updates.next().await {
            println!("[{}] #{} {}", slot.index, slot.retries, slot.message);
            progress.apply(slot);
        }
    }

    let report = handle.wait().await;
    for slot in &report.slots {
        match slot.status {
            SlotStatus::Success => println!("slot {}: seed {:?}, {}", slot.index, slot.seed, slot.message),
            _ => println!("slot {}: {}", slot.index, slot.error.as_deref().unwrap_or(&slot.message)),
        }
    }
    println!("{:.0}% settled", progress.fraction() * 100.0);
    Ok(())
}
