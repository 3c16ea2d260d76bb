//! Shared relay state — built once at startup and passed around as
//! `Arc<RelayApp>` by every task.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use dashmap::DashMap;
use tracing::{info, warn};

use teleclaw_chat::ChatTransport;
use teleclaw_core::config::TeleclawConfig;
use teleclaw_core::events::EventBus;
use teleclaw_core::ids::{Clock, SystemClock};
use teleclaw_injector::{
    DeliveryBackend, DropFolderBackend, PaneDriver, PaneInjector, TmuxDriver,
};
use teleclaw_mail::{MaildirFetcher, MailTransport};
use teleclaw_queue::CommandQueue;
use teleclaw_sessions::SessionStore;
use teleclaw_transport::{CursorStore, InboundTransport, OutboundTransport};

pub struct RelayApp {
    pub config: TeleclawConfig,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionStore,
    pub queue: CommandQueue,
    pub cursors: CursorStore,
    pub events: EventBus,
    /// Delivery backend the dispatcher hands commands to.
    pub backend: Arc<dyn DeliveryBackend>,
    /// Pane driver for the monitor's captures; absent in drop-folder mode.
    pub driver: Option<Arc<dyn PaneDriver>>,
    pub inbound: Vec<Arc<dyn InboundTransport>>,
    pub outbound: HashMap<String, Arc<dyn OutboundTransport>>,
    /// Chat adapter kept separately so the webhook server can reach it.
    pub chat: Option<Arc<ChatTransport>>,
    /// Sessions with a command currently at the injector.
    pub in_flight: DashMap<String, String>,
}

impl RelayApp {
    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.relay.state_dir)
    }

    pub fn pid_path(&self) -> PathBuf {
        self.state_dir().join("relay.pid")
    }

    /// Wire up stores, the delivery backend, and every enabled transport.
    pub fn build(config: TeleclawConfig) -> anyhow::Result<Self> {
        let state_dir = PathBuf::from(&config.relay.state_dir);
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("creating state dir {}", state_dir.display()))?;

        let sessions = SessionStore::open(state_dir.join("sessions"))?;
        let queue = CommandQueue::open(state_dir.join("queue.json"))?;
        let cursors = CursorStore::open(state_dir.join("cursors"))?;

        // Delivery backend: tmux when available, otherwise the drop folder.
        let (backend, driver): (Arc<dyn DeliveryBackend>, Option<Arc<dyn PaneDriver>>) =
            match TmuxDriver::discover(&config.injector.multiplexer_bin) {
                Ok(tmux) => {
                    let tmux: Arc<dyn PaneDriver> = Arc::new(tmux);
                    let injector =
                        PaneInjector::new(Arc::clone(&tmux), config.injector.clone());
                    (Arc::new(injector), Some(tmux))
                }
                Err(e) => {
                    let Some(drop_dir) = &config.injector.drop_dir else {
                        anyhow::bail!(
                            "{e}; configure [injector] drop_dir for multiplexer-less operation"
                        );
                    };
                    warn!(error = %e, drop_dir = %drop_dir, "multiplexer unavailable, using drop-folder delivery");
                    (Arc::new(DropFolderBackend::open(drop_dir)?), None)
                }
            };

        let mut inbound: Vec<Arc<dyn InboundTransport>> = Vec::new();
        let mut outbound: HashMap<String, Arc<dyn OutboundTransport>> = HashMap::new();

        if let Some(mail_cfg) = config.transports.mail.clone() {
            let maildir = mail_cfg
                .maildir
                .clone()
                .map(PathBuf::from)
                .unwrap_or_else(|| state_dir.join("maildir"));
            std::fs::create_dir_all(&maildir)?;

            let mail = Arc::new(
                MailTransport::new(mail_cfg, Arc::new(MaildirFetcher::new(maildir)))
                    .map_err(|e| anyhow::anyhow!("mail transport: {e}"))?,
            );
            inbound.push(Arc::clone(&mail) as Arc<dyn InboundTransport>);
            outbound.insert("mail".into(), mail);
            info!("mail transport enabled");
        }

        let mut chat = None;
        if let Some(chat_cfg) = config.transports.chat.clone() {
            let initial_offset = cursors
                .load("chat")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            let adapter = Arc::new(ChatTransport::new(chat_cfg, initial_offset));
            inbound.push(Arc::clone(&adapter) as Arc<dyn InboundTransport>);
            outbound.insert("chat".into(), Arc::clone(&adapter) as Arc<dyn OutboundTransport>);
            chat = Some(adapter);
            info!("chat transport enabled");
        }

        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            sessions,
            queue,
            cursors,
            events: EventBus::new(),
            backend,
            driver,
            inbound,
            outbound,
            chat,
            in_flight: DashMap::new(),
        })
    }
}
