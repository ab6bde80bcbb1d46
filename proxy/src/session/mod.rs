//! One proxied client, from `Login` to disconnect.
//!
//! A session owns two links: downstream to the game client and upstream to
//! the real server. After the handshake three tasks run against the same
//! [`SessionState`], serialised by one `tokio` mutex:
//!
//! - the client reader, which rate limits, decodes, runs the detectors and
//!   the client handlers, then forwards to the upstream;
//! - the server reader, which runs the server handlers, forwards to the
//!   client and performs transfers;
//! - the ticker, which advances the player at 20 Hz and flushes ack probes.
//!
//! Frames are forwarded as the bytes they arrived as unless a handler
//! rewrote the packet. When any task ends the other two are aborted and both
//! links are shut down.

pub mod link;
pub mod rate_limit;
pub mod transfer;

use crate::codec::{decode_packet, encode_packet, read_frame, write_packet};
use crate::config::Config;
use crate::detection::{DetectionHost, Verdict};
use crate::error::{ErrorPolicy, ProxyError, Result};
use crate::player::{Disposition, Player, PlayerSetup};
use crate::world::block::BlockRegistry;
use crate::world::cache::ChunkCache;
use link::{send_all, send_raw, split, Dialer, Link, LinkReader, LinkWriter};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rate_limit::{DecodeBudget, RateDecision, RateLimiter};
use shared::{Packet, TICK_DURATION_MS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

/// Process-wide state every session borrows.
pub struct ProxyContext {
    pub config: Arc<Config>,
    pub cache: Arc<ChunkCache>,
    pub registry: Arc<BlockRegistry>,
    pub dialer: Dialer,
}

impl ProxyContext {
    pub fn new(config: Config, dialer: Dialer) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(ChunkCache::new()),
            registry: Arc::new(BlockRegistry::new()),
            dialer,
        }
    }
}

type Shared = Arc<Mutex<SessionState>>;

struct SessionState {
    player: Player,
    detections: DetectionHost,
    limiter: RateLimiter,
    decode_budget: DecodeBudget,
    client: LinkWriter,
    server: LinkWriter,
    /// The client's login frame, replayed to every new upstream.
    login: Vec<u8>,
}

fn punishment(verdict: Verdict) -> Result<()> {
    match verdict.punishment {
        Some(message) => Err(ProxyError::Punished(message)),
        None => Ok(()),
    }
}

impl SessionState {
    async fn flush_outbox(&mut self) -> Result<()> {
        let outbox = self.player.take_outbox();
        send_all(&mut self.server, &outbox.to_server).await?;
        send_all(&mut self.client, &outbox.to_client).await?;
        Ok(())
    }

    async fn on_client_frame(&mut self, body: Vec<u8>) -> Result<()> {
        match self.limiter.record() {
            RateDecision::Allow => {}
            RateDecision::Drop => return Ok(()),
            RateDecision::Disconnect => {
                warn!(
                    "[{}] Sent more than {} packets in one tick",
                    self.player.name, self.player.config.network.rate_limit_spammed
                );
                return Err(ProxyError::Punished("sending too many packets".to_string()));
            }
        }

        let mut packet = match decode_packet(&body) {
            Ok(packet) => packet,
            Err(e) => {
                if !self.decode_budget.record(Instant::now()) {
                    return Err(ProxyError::DecodeBudgetExceeded);
                }
                return Err(e);
            }
        };

        let verdict = self.detections.on_client_packet(&packet, &self.player);
        let cancel = verdict.cancel;
        punishment(verdict)?;
        if cancel {
            return Ok(());
        }

        let disposition = self.player.handle_client_packet(&mut packet)?;
        self.flush_outbox().await?;
        match disposition {
            Disposition::Forward => send_raw(&mut self.server, &body).await?,
            Disposition::ForwardModified => send_raw(&mut self.server, &encode_packet(&packet)?).await?,
            Disposition::Cancel | Disposition::Transfer(_) => {}
        }

        punishment(self.detections.post_client_packet(&packet, &self.player))
    }

    /// Returns the address to transfer to when the upstream asked for one.
    async fn on_server_frame(&mut self, body: Vec<u8>) -> Result<Option<String>> {
        let mut packet = decode_packet(&body)?;

        let verdict = self.detections.on_server_packet(&packet, &self.player);
        let cancel = verdict.cancel;
        punishment(verdict)?;
        if cancel {
            return Ok(None);
        }

        let disposition = self.player.handle_server_packet(&mut packet)?;
        self.flush_outbox().await?;
        match disposition {
            Disposition::Forward => send_raw(&mut self.client, &body).await?,
            Disposition::ForwardModified => send_raw(&mut self.client, &encode_packet(&packet)?).await?,
            Disposition::Cancel => {}
            Disposition::Transfer(address) => return Ok(Some(address)),
        }
        Ok(None)
    }

    async fn on_tick(&mut self) -> Result<()> {
        self.limiter.reset();
        self.player.tick()?;
        punishment(self.detections.on_tick(&self.player))?;
        self.flush_outbox().await
    }

    /// Swaps in a freshly dialed upstream and replays the login on it.
    async fn switch_upstream(&mut self, mut server: LinkWriter, address: &str) -> Result<()> {
        send_raw(&mut server, &self.login)
            .await
            .map_err(|e| ProxyError::Upstream(format!("login to {} failed: {}", address, e)))?;
        let mut old = std::mem::replace(&mut self.server, server);
        if let Err(e) = old.shutdown().await {
            debug!("[{}] Closing previous upstream: {}", self.player.name, e);
        }
        self.player.begin_transfer();
        info!("[{}] Transferring to {}", self.player.name, address);
        Ok(())
    }

    /// Applies the error's policy. An `Err` return ends the calling task.
    async fn handle_error(&mut self, err: ProxyError) -> Result<()> {
        match err.policy() {
            ErrorPolicy::DropPacket => {
                if self.decode_budget.should_log(Instant::now()) {
                    warn!("[{}] Dropped packet: {}", self.player.name, err);
                }
                Ok(())
            }
            ErrorPolicy::ResetState => {
                warn!("[{}] {}", self.player.name, err);
                self.player.reset_movement();
                self.flush_outbox().await
            }
            ErrorPolicy::KeepUpstream => {
                warn!("[{}] Keeping current upstream: {}", self.player.name, err);
                Ok(())
            }
            ErrorPolicy::Terminate(reason) => {
                error!("[{}] Session terminated: {}", self.player.name, reason);
                if let Err(e) = write_packet(&mut self.client, &Packet::Disconnect { message: reason }).await {
                    debug!("[{}] Disconnect not delivered: {}", self.player.name, e);
                }
                Err(err)
            }
        }
    }
}

async fn refuse(client: &mut LinkWriter, reason: &str) {
    let packet = Packet::Disconnect {
        message: reason.to_string(),
    };
    if let Err(e) = write_packet(client, &packet).await {
        debug!("Refusal not delivered: {}", e);
    }
}

/// Reads the login, dials the upstream and relays until `StartGame` names the player.
async fn handshake(
    client_reader: &mut LinkReader,
    mut client: LinkWriter,
    ctx: &ProxyContext,
) -> Result<(SessionState, LinkReader)> {
    let login = read_frame(client_reader).await?.ok_or(ProxyError::Closed)?;
    let identity = match decode_packet(&login) {
        Ok(Packet::Login { identity }) => identity,
        _ => {
            refuse(&mut client, "expected login").await;
            return Err(ProxyError::Malformed("first packet was not a login".to_string()));
        }
    };
    info!(
        "[{}] Logging in from {:?} (protocol {})",
        identity.name, identity.device_os, identity.protocol
    );

    let upstream = match transfer::dial(&ctx.dialer, &ctx.config.proxy.upstream).await {
        Ok(link) => link,
        Err(e) => {
            refuse(&mut client, "upstream unavailable").await;
            return Err(e);
        }
    };
    let (mut server_reader, mut server) = split(upstream);
    send_raw(&mut server, &login).await?;

    let setup = loop {
        let body = match read_frame(&mut server_reader).await? {
            Some(body) => body,
            None => {
                refuse(&mut client, "upstream closed").await;
                return Err(ProxyError::Closed);
            }
        };
        send_raw(&mut client, &body).await?;
        if let Ok(packet) = decode_packet(&body) {
            if let Some(setup) = PlayerSetup::from_start_game(identity.clone(), &packet) {
                break setup;
            }
        }
    };

    let config = Arc::clone(&ctx.config);
    let network = config.network.clone();
    let player = Player::new(
        setup,
        Arc::clone(&config),
        Arc::clone(&ctx.cache),
        Arc::clone(&ctx.registry),
        StdRng::from_entropy(),
    );
    let state = SessionState {
        player,
        detections: DetectionHost::new(config),
        limiter: RateLimiter::new(network.rate_limit_normal, network.rate_limit_spammed),
        decode_budget: DecodeBudget::new(Instant::now()),
        client,
        server,
        login,
    };
    Ok((state, server_reader))
}

async fn client_loop(session: Shared, mut reader: LinkReader) -> Result<()> {
    loop {
        let frame = read_frame(&mut reader).await;
        let mut state = session.lock().await;
        let result = match frame {
            Ok(Some(body)) => state.on_client_frame(body).await,
            Ok(None) => {
                info!("[{}] Client closed the connection", state.player.name);
                return Ok(());
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            state.handle_error(e).await?;
        }
    }
}

async fn server_loop(session: Shared, mut reader: LinkReader, ctx: Arc<ProxyContext>) -> Result<()> {
    loop {
        let frame = read_frame(&mut reader).await;
        let mut state = session.lock().await;
        let result = match frame {
            Ok(Some(body)) => state.on_server_frame(body).await,
            Ok(None) => Err(ProxyError::Closed),
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(address)) => {
                // the dial runs unlocked so the client keeps being served
                drop(state);
                let dialed = transfer::dial(&ctx.dialer, &address).await;
                let mut state = session.lock().await;
                match dialed {
                    Ok(link) => {
                        let (next_reader, next_writer) = split(link);
                        match state.switch_upstream(next_writer, &address).await {
                            Ok(()) => reader = next_reader,
                            Err(e) => state.handle_error(e).await?,
                        }
                    }
                    Err(e) => state.handle_error(e).await?,
                }
            }
            Ok(None) => {}
            Err(e) => state.handle_error(e).await?,
        }
    }
}

async fn tick_loop(session: Shared) -> Result<()> {
    let mut ticker = interval(Duration::from_millis(TICK_DURATION_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let mut state = session.lock().await;
        if let Err(e) = state.on_tick().await {
            state.handle_error(e).await?;
        }
    }
}

/// Runs a session on an accepted client link until either side closes.
pub async fn run_session(client: Link, ctx: Arc<ProxyContext>) -> Result<()> {
    let (mut client_reader, client_writer) = split(client);
    let (state, server_reader) = handshake(&mut client_reader, client_writer, &ctx).await?;
    let name = state.player.name.clone();
    let session: Shared = Arc::new(Mutex::new(state));

    let mut client_task = tokio::spawn(client_loop(Arc::clone(&session), client_reader));
    let mut server_task = tokio::spawn(server_loop(Arc::clone(&session), server_reader, Arc::clone(&ctx)));
    let mut tick_task = tokio::spawn(tick_loop(Arc::clone(&session)));

    let finished = tokio::select! {
        result = &mut client_task => result,
        result = &mut server_task => result,
        result = &mut tick_task => result,
    };
    client_task.abort();
    server_task.abort();
    tick_task.abort();

    let mut state = session.lock().await;
    let latency = state.player.latency;
    if let Err(e) = state.client.shutdown().await {
        debug!("[{}] Closing client link: {}", name, e);
    }
    if let Err(e) = state.server.shutdown().await {
        debug!("[{}] Closing upstream link: {}", name, e);
    }

    match finished {
        Ok(Ok(())) => {
            info!("[{}] Disconnected (latency {}ms)", name, latency.as_millis());
            Ok(())
        }
        Ok(Err(e)) => {
            info!("[{}] Disconnected: {} (latency {}ms)", name, e, latency.as_millis());
            Err(e)
        }
        Err(e) => {
            error!("[{}] Session task failed: {}", name, e);
            Err(ProxyError::Internal(e.to_string()))
        }
    }
}
