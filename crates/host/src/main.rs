//! Scripted host session.
//!
//! Generates the spawn area, plays a short scripted session through the
//! handle (protected and unprotected placements, falling sand, a torch losing
//! its support, a host-issued spawn, a few ticks) and shuts down, failing if
//! any phase was left open.

use anyhow::{Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use phase_core::{BlockKind, BlockPos, BlockState, EntityId, EntityKind, ItemKind, ItemStack};
use phase_host::{Event, Host, HostConfig, Packet, Session, Topic};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = HostConfig::from_env();
    info!(
        max_phase_depth = config.tracker.max_phase_depth,
        protection_radius = config.protection.radius,
        max_spawns_per_batch = config.max_spawns_per_batch,
        "Starting phase host"
    );

    let host = Host::start(config)?;
    let mut phases = host.subscribe(Topic::Phases);
    let journal = tokio::spawn(async move {
        let mut unclean = 0usize;
        loop {
            match phases.recv().await {
                Ok(Event::Phase(event)) => {
                    if let phase_host::PhaseEvent::Unwound(summary) = &event
                        && !summary.is_clean()
                    {
                        unclean += 1;
                    }
                    match serde_json::to_string(&event) {
                        Ok(line) => info!(target: "phase_host::journal", "{line}"),
                        Err(error) => warn!(%error, "failed to encode phase event"),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "journal lagged"),
                Err(RecvError::Closed) => break,
            }
        }
        unclean
    });

    let handle = host.handle();
    let player = Session::new(EntityId(1_000)).holding(ItemStack::one(ItemKind::Torch));
    let operator = Session::new(EntityId(1_001)).as_operator();
    let surface = BlockPos::new(0, phase_host::world::SURFACE_Y, 0);

    // Spawn protection: the player is refused, the operator is not.
    let near_spawn = surface.offset(1, 1, 1);
    let place_stone = Packet::PlaceBlock {
        pos: near_spawn,
        state: BlockState::STONE,
    };
    let refused = handle.submit_packet(player.clone(), place_stone.clone()).await?;
    info!(cancelled = refused.cancelled_blocks, "player placement near spawn");
    let allowed = handle.submit_packet(operator.clone(), place_stone).await?;
    info!(committed = allowed.committed_blocks, "operator placement near spawn");

    // Sand placed in mid-air falls one block per tick until it lands.
    let sand = surface.offset(5, 3, 5);
    handle
        .submit_packet(
            player.clone(),
            Packet::PlaceBlock {
                pos: sand,
                state: BlockState::of(BlockKind::Sand),
            },
        )
        .await?;

    // A torch pops off when the block under it is broken.
    let torch = surface.offset(-5, 1, 5);
    handle
        .submit_packet(
            player.clone(),
            Packet::PlaceBlock {
                pos: torch,
                state: BlockState::of(BlockKind::Torch),
            },
        )
        .await?;
    let broken = handle
        .submit_packet(player.clone(), Packet::BreakBlock { pos: torch.down() })
        .await?;
    info!(
        committed = broken.committed_blocks,
        drops = broken.dropped.len(),
        "support broken under torch"
    );

    let zombie = handle
        .spawn_entity(EntityKind::Zombie, surface.offset(-6, 1, -6))
        .await?;
    info!(?zombie, "host spawn");

    for _ in 0..4 {
        let summary = handle.tick().await?;
        info!(tick = summary.tick, phases = summary.phases.len(), "tick");
    }

    let landed = handle.block_at(surface.offset(5, 1, 5)).await?;
    if landed.kind() != BlockKind::Sand {
        warn!(found = %landed, "sand did not land on the surface");
    }

    drop(handle);
    host.shutdown().await?;

    let unclean = journal.await?;
    if unclean > 0 {
        bail!("{unclean} phases unwound with leaks or were abandoned");
    }
    info!("Clean shutdown");
    Ok(())
}
