//! # Bedrock Guard Proxy
//!
//! A man-in-the-middle anti-cheat proxy. Game clients connect to the proxy,
//! the proxy connects to the real server, and every packet in either
//! direction passes through a per-player authority engine that decides
//! whether the client could legitimately have produced it.
//!
//! ## Core Responsibilities
//!
//! ### Lag Compensation
//! Whatever the server tells a client only becomes true for that client one
//! round trip later. The acknowledgment engine (`ack`) attaches pending
//! effects to latency probes and runs them when the client echoes the probe,
//! so the proxy's mirrors track the world the client actually saw.
//!
//! ### Authoritative Movement
//! The movement simulator (`movement`) replays every `PlayerAuthInput`
//! against the mirrored world: gravity, jumping, friction, knockback, block
//! collision with step-up and sneak edges. Positions that drift beyond the
//! correction threshold are corrected back to the simulated one.
//!
//! ### Combat Validation
//! Attacks (`combat`) are checked with a swept, interpolated ray against the
//! victim's rewound hitbox (`entity`), including block occlusion, and only
//! forwarded to the server when they would have connected.
//!
//! ### Detections
//! A roster of detectors (`detection`) watches the same traffic and flags
//! behaviour no vanilla client produces. Punishable detectors disconnect the
//! player once they run out of allowed violations.
//!
//! ## Module Organization
//!
//! - `world`: block registry, paletted chunk columns and the process-wide
//!   copy-on-write chunk cache shared by all sessions.
//! - `component`: effects and inventory mirrors.
//! - `world_updater`: block breaking and placement validation.
//! - `player`: per-session state and the client/server packet handlers.
//! - `session`: the async orchestrator that owns both links, rate limits,
//!   ticks the player at 20 Hz and performs server transfers.
//! - `network`: the TCP listener.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use proxy::config::Config;
//! use proxy::network::ProxyServer;
//! use proxy::session::{link::tcp_dialer, ProxyContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Arc::new(ProxyContext::new(Config::default(), tcp_dialer()));
//!     let _sweeper = proxy::world::cache::spawn_sweeper(Arc::clone(&ctx.cache));
//!
//!     // Accepts clients on 127.0.0.1:19133 and relays them to 127.0.0.1:19132
//!     ProxyServer::bind(ctx).await?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Model
//!
//! Handlers never panic on bad input. Every failure is a
//! [`error::ProxyError`] whose policy decides whether the packet is dropped,
//! the player's simulation is reset, a transfer is abandoned, or the session
//! is terminated with a disconnect message. Errors never cross sessions.

pub mod ack;
pub mod codec;
pub mod combat;
pub mod component;
pub mod config;
pub mod detection;
pub mod entity;
pub mod error;
pub mod movement;
pub mod network;
pub mod player;
pub mod session;
pub mod world;
pub mod world_updater;
