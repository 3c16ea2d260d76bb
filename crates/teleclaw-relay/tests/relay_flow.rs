//! End-to-end relay scenarios against fake transports and a scripted
//! delivery backend: reply ingestion, authorization, expiry, retry
//! exhaustion, crash recovery, and the pane monitor's outbound path.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use dashmap::DashMap;

use teleclaw_core::config::TeleclawConfig;
use teleclaw_core::events::EventBus;
use teleclaw_core::ids::{Clock, FixedClock};
use teleclaw_core::types::{NotificationPayload, TransportKind};
use teleclaw_injector::{DeliveryBackend, InjectorError, PaneDriver};
use teleclaw_queue::{CommandQueue, CommandStatus};
use teleclaw_relay::app::RelayApp;
use teleclaw_relay::controller::handle_envelope;
use teleclaw_relay::dispatch::dispatch_once;
use teleclaw_sessions::{SessionRecord, SessionStore};
use teleclaw_transport::{
    CursorStore, InboundEnvelope, InboundTransport, OutboundTransport, PollBatch, TransportError,
};

// --- fakes -----------------------------------------------------------------

struct FakeMailTransport {
    allowed: Vec<String>,
    replies: Arc<Mutex<Vec<String>>>,
    sent: Arc<Mutex<Vec<NotificationPayload>>>,
}

impl FakeMailTransport {
    fn new(allowed: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            replies: Arc::new(Mutex::new(Vec::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }

    fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl InboundTransport for FakeMailTransport {
    fn name(&self) -> &str {
        "mail"
    }

    async fn poll(&self, _cursor: Option<&str>) -> Result<PollBatch, TransportError> {
        Ok(PollBatch::empty())
    }

    fn authenticate(&self, envelope: &InboundEnvelope) -> Result<(), TransportError> {
        if self.allowed.iter().any(|a| a == &envelope.sender) {
            Ok(())
        } else {
            Err(TransportError::Unauthorized(envelope.sender.clone()))
        }
    }
}

#[async_trait]
impl OutboundTransport for FakeMailTransport {
    fn name(&self) -> &str {
        "mail"
    }

    async fn send(
        &self,
        _recipient: &str,
        payload: &NotificationPayload,
    ) -> Result<String, TransportError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok("fake:ref".into())
    }

    async fn reply(&self, _envelope: &InboundEnvelope, text: &str) -> Result<(), TransportError> {
        self.replies.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Delivery backend scripted to succeed or time out.
struct ScriptedBackend {
    fail: bool,
    delivered: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedBackend {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            delivered: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn deliver(&self, pane: &str, command: &str) -> teleclaw_injector::Result<()> {
        if self.fail {
            return Err(InjectorError::InjectionTimeout { attempts: 8 });
        }
        self.delivered
            .lock()
            .unwrap()
            .push((pane.to_string(), command.to_string()));
        Ok(())
    }

    async fn cancel(&self, _pane: &str) -> teleclaw_injector::Result<()> {
        Ok(())
    }
}

/// Scripted pane driver for the monitor: first capture busy, then idle.
struct ScriptedDriver {
    captures: Mutex<Vec<String>>,
}

#[async_trait]
impl PaneDriver for ScriptedDriver {
    async fn has_session(&self, _pane: &str) -> teleclaw_injector::Result<bool> {
        Ok(true)
    }

    async fn create_session(
        &self,
        _pane: &str,
        _cwd: &str,
        _command: &str,
    ) -> teleclaw_injector::Result<()> {
        Ok(())
    }

    async fn send_text(&self, _pane: &str, _text: &str) -> teleclaw_injector::Result<()> {
        Ok(())
    }

    async fn send_key(
        &self,
        _pane: &str,
        _key: teleclaw_injector::driver::ControlKey,
    ) -> teleclaw_injector::Result<()> {
        Ok(())
    }

    async fn capture(&self, _pane: &str, _lines: u32) -> teleclaw_injector::Result<String> {
        let mut captures = self.captures.lock().unwrap();
        if captures.len() > 1 {
            Ok(captures.remove(0))
        } else {
            Ok(captures.first().cloned().unwrap_or_default())
        }
    }
}

// --- helpers ---------------------------------------------------------------

fn clock_at_start() -> FixedClock {
    FixedClock::at(Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap())
}

fn build_app(
    dir: &Path,
    clock: FixedClock,
    backend: Arc<dyn DeliveryBackend>,
    mail: &Arc<FakeMailTransport>,
    driver: Option<Arc<dyn PaneDriver>>,
) -> Arc<RelayApp> {
    let mut config = TeleclawConfig::default();
    config.relay.state_dir = dir.to_string_lossy().into_owned();

    let mut outbound: HashMap<String, Arc<dyn OutboundTransport>> = HashMap::new();
    outbound.insert("mail".into(), Arc::clone(mail) as Arc<dyn OutboundTransport>);

    Arc::new(RelayApp {
        config,
        clock: Arc::new(clock),
        sessions: SessionStore::open(dir.join("sessions")).unwrap(),
        queue: CommandQueue::open(dir.join("queue.json")).unwrap(),
        cursors: CursorStore::open(dir.join("cursors")).unwrap(),
        events: EventBus::new(),
        backend,
        driver,
        inbound: Vec::new(),
        outbound,
        chat: None,
        in_flight: DashMap::new(),
    })
}

fn seed_session(app: &RelayApp, token: &str) -> String {
    let now = app.clock.now();
    let record = SessionRecord::new(
        teleclaw_core::ids::session_id(),
        token.into(),
        TransportKind::Mail,
        "ops@example.com",
        "claw-main",
        "my-project",
        now,
        24,
    );
    app.sessions.create(record, now).unwrap()
}

fn mail_envelope(app: &RelayApp, sender: &str, subject: &str, body: &str) -> InboundEnvelope {
    InboundEnvelope {
        transport: TransportKind::Mail,
        sender: sender.into(),
        subject: Some(subject.into()),
        body: body.into(),
        group: None,
        reply_handle: None,
        received_at: app.clock.now(),
    }
}

async fn run_dispatch(app: &Arc<RelayApp>) {
    for handle in dispatch_once(app) {
        handle.await.unwrap();
    }
}

// --- scenarios -------------------------------------------------------------

#[tokio::test]
async fn happy_path_email_reply_executes_command() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let backend = ScriptedBackend::new(false);
    let app = build_app(
        dir.path(),
        clock_at_start(),
        Arc::clone(&backend) as Arc<dyn DeliveryBackend>,
        &mail,
        None,
    );
    let session_id = seed_session(&app, "ABCDEFGH");

    let envelope = mail_envelope(
        &app,
        "ops@example.com",
        "Re: [Teleclaw #ABCDEFGH] done",
        "fix the failing test\n\n--\nSent from my phone\n> original quoted text",
    );
    handle_envelope(&app, mail.as_ref(), &envelope).await;

    let commands = app.queue.list();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].command, "fix the failing test");
    assert_eq!(commands[0].session_id, session_id);

    run_dispatch(&app).await;

    assert_eq!(app.queue.list()[0].status, CommandStatus::Completed);
    assert_eq!(
        backend.delivered(),
        vec![("claw-main".to_string(), "fix the failing test".to_string())]
    );
    assert_eq!(app.sessions.get(&session_id).unwrap().command_count, 1);
    assert!(mail.replies().iter().any(|r| r.contains("Queued for my-project")));
}

#[tokio::test]
async fn unauthorized_sender_gets_rejected_without_enqueue() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let backend = ScriptedBackend::new(false);
    let app = build_app(
        dir.path(),
        clock_at_start(),
        backend as Arc<dyn DeliveryBackend>,
        &mail,
        None,
    );
    seed_session(&app, "ABCDEFGH");

    let envelope = mail_envelope(
        &app,
        "mallory@evil.example",
        "Re: [Teleclaw #ABCDEFGH]",
        "hello",
    );
    handle_envelope(&app, mail.as_ref(), &envelope).await;

    assert!(app.queue.list().is_empty());
    assert_eq!(mail.replies(), vec!["Unauthorized.".to_string()]);
}

#[tokio::test]
async fn sender_not_bound_to_session_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    // Both addresses pass transport auth, but the token belongs to ops@.
    let mail = FakeMailTransport::new(&["ops@example.com", "other@example.com"]);
    let backend = ScriptedBackend::new(false);
    let app = build_app(
        dir.path(),
        clock_at_start(),
        backend as Arc<dyn DeliveryBackend>,
        &mail,
        None,
    );
    seed_session(&app, "ABCDEFGH");

    let envelope = mail_envelope(
        &app,
        "other@example.com",
        "Re: [Teleclaw #ABCDEFGH]",
        "do something",
    );
    handle_envelope(&app, mail.as_ref(), &envelope).await;

    assert!(app.queue.list().is_empty());
    assert_eq!(mail.replies(), vec!["Unauthorized.".to_string()]);
}

#[tokio::test]
async fn expired_token_reports_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let backend = ScriptedBackend::new(false);
    let clock = clock_at_start();
    let app = build_app(
        dir.path(),
        clock.clone(),
        backend as Arc<dyn DeliveryBackend>,
        &mail,
        None,
    );
    seed_session(&app, "WXYZ0123");

    clock.advance(Duration::hours(25));
    let envelope = mail_envelope(&app, "ops@example.com", "Re: [Teleclaw #WXYZ0123]", "hello");
    handle_envelope(&app, mail.as_ref(), &envelope).await;

    assert!(app.queue.list().is_empty());
    assert_eq!(
        mail.replies(),
        vec!["Token expired. Wait for the next notification.".to_string()]
    );
}

#[tokio::test]
async fn injection_timeouts_retry_then_go_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let backend = ScriptedBackend::new(true);
    let clock = clock_at_start();
    let app = build_app(
        dir.path(),
        clock.clone(),
        backend as Arc<dyn DeliveryBackend>,
        &mail,
        None,
    );
    seed_session(&app, "ABCDEFGH");

    let envelope = mail_envelope(&app, "ops@example.com", "Re: [Teleclaw #ABCDEFGH]", "run it");
    handle_envelope(&app, mail.as_ref(), &envelope).await;

    // First failure: back to queued with one retry recorded.
    run_dispatch(&app).await;
    let cmd = &app.queue.list()[0];
    assert_eq!(cmd.status, CommandStatus::Queued);
    assert_eq!(cmd.retries, 1);
    assert_eq!(cmd.retry_at, Some(clock.now() + Duration::seconds(60)));

    // Not ready again until the backoff elapses.
    assert!(dispatch_once(&app).is_empty());

    clock.advance(Duration::seconds(61));
    run_dispatch(&app).await;
    assert_eq!(app.queue.list()[0].retries, 2);

    clock.advance(Duration::seconds(121));
    run_dispatch(&app).await;

    let cmd = &app.queue.list()[0];
    assert_eq!(cmd.status, CommandStatus::Failed);
    assert_eq!(cmd.retries, 3);
}

#[tokio::test]
async fn crash_recovery_requeues_executing_commands() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let clock = clock_at_start();

    let queue_id = {
        let backend = ScriptedBackend::new(false);
        let app = build_app(
            dir.path(),
            clock.clone(),
            backend as Arc<dyn DeliveryBackend>,
            &mail,
            None,
        );
        let session_id = seed_session(&app, "ABCDEFGH");
        let id = app.queue.enqueue(&session_id, "long task", clock.now()).unwrap();
        // Crash between mark_executing and completion.
        app.queue.mark_executing(&id, clock.now()).unwrap();
        id
    };

    let queue = CommandQueue::open(dir.path().join("queue.json")).unwrap();
    assert_eq!(queue.recover().unwrap(), 1);
    let cmd = queue.get(&queue_id).unwrap();
    assert_eq!(cmd.status, CommandStatus::Queued);
    assert_eq!(cmd.retries, 0);
}

#[tokio::test(start_paused = true)]
async fn monitor_notifies_once_per_idle_transition() {
    let dir = tempfile::tempdir().unwrap();
    let mail = FakeMailTransport::new(&["ops@example.com"]);
    let backend = ScriptedBackend::new(false);
    let driver: Arc<dyn PaneDriver> = Arc::new(ScriptedDriver {
        captures: Mutex::new(vec!["Working…".into(), "all done\n│ > ".into()]),
    });
    let app = build_app(
        dir.path(),
        clock_at_start(),
        backend as Arc<dyn DeliveryBackend>,
        &mail,
        Some(driver),
    );

    // Watch one pane over mail.
    let mut config = (*app).config.clone();
    config.monitor.panes = vec![teleclaw_core::config::MonitoredPane {
        pane: "claw-main".into(),
        project: "my-project".into(),
        transport: TransportKind::Mail,
        recipient: "ops@example.com".into(),
    }];
    config.monitor.interval_secs = 1;
    let app = Arc::new(RelayApp {
        config,
        clock: Arc::clone(&app.clock),
        sessions: SessionStore::open(dir.path().join("sessions")).unwrap(),
        queue: CommandQueue::open(dir.path().join("queue.json")).unwrap(),
        cursors: CursorStore::open(dir.path().join("cursors")).unwrap(),
        events: EventBus::new(),
        backend: ScriptedBackend::new(false) as Arc<dyn DeliveryBackend>,
        driver: app.driver.clone(),
        inbound: Vec::new(),
        outbound: app.outbound.clone(),
        chat: None,
        in_flight: DashMap::new(),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor = tokio::spawn(teleclaw_relay::monitor::run_monitor_loop(
        Arc::clone(&app),
        shutdown_rx,
    ));

    // Several virtual ticks: busy, then idle (notify), then idle (debounced).
    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    shutdown_tx.send(true).unwrap();
    let _ = monitor.await;

    let sent = mail.sent();
    assert_eq!(sent.len(), 1, "exactly one notification per completion");
    let payload = &sent[0];
    assert!(payload.subject.contains(&format!("#{}", payload.token)));
    assert!(payload.body.contains("Session ID:"));

    // The minted session resolves by its token and carries the audit copy.
    let record = app
        .sessions
        .find_by_token(&payload.token, app.clock.now())
        .unwrap();
    assert_eq!(record.pane, "claw-main");
    assert!(record.notification.is_some());
}
