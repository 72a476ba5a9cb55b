//! Terminal simulator: one phone talking to the engine over in-memory
//! repositories and demo collaborators.
//!
//! Lines starting with `/` are simulator commands:
//! `/quit`, `/resume` (agent hands back), `/media <url>` (send a file),
//! `/vote <hash>` (answer a native poll by option hash).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use chrono::{Duration, NaiveTime, Utc};
use clap::Args;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use db::memory::{MemoryExecutionRepository, MemoryFlowRepository, MemorySlotRepository};
use db::{DeliverySlot, RetryPolicy, SlotReservations};
use engine::{EngineConfig, FlowEngine, ReservingSlotService, SlotReservingOrders};
use nodes::executors::keys;
use nodes::mock::{
    sample_products, MemoryOrders, RecordingHandover, RecordingReports, StaticCatalog,
    TextReceiptRenderer,
};
use nodes::services::Product;
use nodes::text::poll_option_hash;
use nodes::{standard_registry, ContextPatch, OutboundMessage, Services};

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Flow definition files; every one is loaded and validated.
    #[arg(long = "flow", required = true)]
    flows: Vec<PathBuf>,
    /// JSON array of products replacing the demo catalog.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// JSON array of delivery slots replacing the demo slots.
    #[arg(long)]
    slots: Option<PathBuf>,
    #[arg(long, default_value = "5491100000000")]
    phone: String,
}

/// A delivery slot as written in a `--slots` file.
#[derive(Debug, Deserialize)]
struct SlotSeed {
    date: chrono::NaiveDate,
    time_start: NaiveTime,
    time_end: NaiveTime,
    max_orders: i32,
    #[serde(default)]
    orders_count: i32,
}

impl From<SlotSeed> for DeliverySlot {
    fn from(seed: SlotSeed) -> Self {
        DeliverySlot {
            id: Uuid::new_v4(),
            date: seed.date,
            time_start: seed.time_start,
            time_end: seed.time_end,
            max_orders: seed.max_orders,
            orders_count: seed.orders_count,
            version: 0,
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Tomorrow morning and afternoon.
fn demo_slots() -> Vec<DeliverySlot> {
    let tomorrow = Utc::now().date_naive() + Duration::days(1);
    let window = |start: u32, end: u32, max_orders: i32| DeliverySlot {
        id: Uuid::new_v4(),
        date: tomorrow,
        time_start: NaiveTime::from_hms_opt(start, 0, 0).unwrap_or_default(),
        time_end: NaiveTime::from_hms_opt(end, 0, 0).unwrap_or_default(),
        max_orders,
        orders_count: 0,
        version: 0,
    };
    vec![window(9, 12, 3), window(14, 18, 5)]
}

fn build_engine(args: &ChatArgs) -> Result<FlowEngine> {
    let mut rows = Vec::with_capacity(args.flows.len());
    for path in &args.flows {
        let flow = crate::read_flow(path)?;
        if let Err(e) = engine::validate_flow(&flow) {
            bail!("flow {} is invalid: {e}", path.display());
        }
        info!(flow = %flow.name, trigger = %flow.trigger_word, "flow loaded");
        rows.push(flow.to_row()?);
    }

    let products: Vec<Product> = match &args.catalog {
        Some(path) => read_json(path)?,
        None => sample_products(),
    };
    let slots: Vec<DeliverySlot> = match &args.slots {
        Some(path) => read_json::<Vec<SlotSeed>>(path)?
            .into_iter()
            .map(DeliverySlot::from)
            .collect(),
        None => demo_slots(),
    };

    let catalog = Arc::new(StaticCatalog::new(products));
    let reservations =
        SlotReservations::new(Arc::new(MemorySlotRepository::new(slots)), RetryPolicy::from_env());
    let slot_service = Arc::new(ReservingSlotService::new(reservations));
    let orders = Arc::new(MemoryOrders::new(catalog.clone()));

    let services = Services {
        catalog,
        orders: Arc::new(SlotReservingOrders::new(orders, slot_service.clone())),
        slots: slot_service,
        documents: Arc::new(TextReceiptRenderer),
        reports: Arc::new(RecordingReports::default()),
        handover: Arc::new(RecordingHandover::default()),
    };

    Ok(FlowEngine::new(
        Arc::new(MemoryFlowRepository::new(rows)),
        Arc::new(MemoryExecutionRepository::new()),
        standard_registry(&services),
        EngineConfig::from_env(),
    ))
}

fn print_messages(messages: &[OutboundMessage]) {
    for message in messages {
        match message {
            OutboundMessage::Text { body } => println!("bot> {body}"),
            OutboundMessage::Poll { question, options } => {
                println!("bot> 📊 {question}");
                for option in options {
                    let hash = poll_option_hash(option);
                    println!("     - {option}  (/vote {})", &hash[..8]);
                }
            }
            OutboundMessage::Document {
                file_name,
                bytes,
                caption,
                ..
            } => {
                println!("bot> 📄 {file_name} ({} bytes)", bytes.len());
                if let Some(caption) = caption {
                    println!("     {caption}");
                }
            }
            OutboundMessage::Image { url, caption } => {
                println!("bot> 🖼  {url}");
                if let Some(caption) = caption {
                    println!("     {caption}");
                }
            }
        }
    }
}

pub async fn run(args: ChatArgs) -> Result<()> {
    let engine = build_engine(&args)?;
    let phone = args.phone.as_str();
    println!("Chatting as {phone}. /quit to leave.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        let replies = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/resume", _) => engine.resume_from_handover(phone).await?,
            ("/media", url) => {
                let inbound = ContextPatch::new().with(keys::MEDIA_URL, url.trim());
                engine.process_message(phone, "", inbound).await?
            }
            ("/vote", hash) => match engine.resolve_poll_vote(phone, hash).await? {
                Some(option) => {
                    println!("you> [voted] {option}");
                    engine.process_message(phone, &option, ContextPatch::new()).await?
                }
                None => {
                    println!("(no poll option matches that hash)");
                    continue;
                }
            },
            _ if line.is_empty() => continue,
            _ => engine.process_message(phone, line, ContextPatch::new()).await?,
        };

        print_messages(&replies);
    }

    Ok(())
}
