//! Initialization state machine for the weather entity.
//!
//! Connect, subscribe and startup all race toward the same transition; only one
//! of them may run initialization at a time, and a finished initialization is
//! not repeated until the configuration changes.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use skycast_core::{Config, ConfigError, ConfigStore};
use skycast_weather::{
    OnUpdate, PollUpdate, PollerConfig, PollerHandle, WeatherPoller, WeatherSnapshot,
    WeatherSource,
};
use tokio::sync::oneshot;

use crate::entity::{
    Availability, CommandStatus, DeviceState, EntityCommand, EntityHost, WeatherEntity,
};

/// Phase of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Initializing,
    Ready,
}

impl LifecycleState {
    pub fn entities_ready(self) -> bool {
        matches!(self, LifecycleState::Ready)
    }

    pub fn initialization_in_flight(self) -> bool {
        matches!(self, LifecycleState::Initializing)
    }

    /// True if a trigger may begin initialization.
    pub fn can_start_initialization(self) -> bool {
        matches!(self, LifecycleState::Idle)
    }

    /// State after registration and the first fetch succeeded.
    pub fn on_initialized(self) -> Self {
        LifecycleState::Ready
    }

    /// State after initialization failed; a later trigger may retry.
    pub fn on_failed(self) -> Self {
        LifecycleState::Idle
    }
}

/// Events delivered by the host integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect,
    Subscribe(Vec<String>),
    EnterStandby,
    ExitStandby,
    /// Setup finished and the stored config changed.
    Reconfigured,
}

/// What a trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Initialized,
    AlreadyInitializing,
    AlreadyReady,
    NotConfigured,
    InitializationFailed(String),
    /// Reconfiguration arrived while an initialization was running.
    Rejected,
    Handled,
    Ignored,
}

struct Session {
    entity: WeatherEntity,
    config: Config,
    poller: WeatherPoller,
    handle: Option<PollerHandle>,
    subscribed: bool,
}

#[derive(Default)]
struct Lifecycle {
    state: LifecycleState,
    session: Option<Session>,
    /// Bumped whenever an initialization starts or is abandoned.
    generation: u64,
}

struct Inner {
    store: Arc<ConfigStore>,
    host: Arc<dyn EntityHost>,
    source: Arc<dyn WeatherSource>,
    poller_config: PollerConfig,
    icon_dir: PathBuf,
    lifecycle: Mutex<Lifecycle>,
}

/// Owns the lifecycle state and the running session. Cheap to clone.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("state", &self.state())
            .field("entity_id", &self.entity_id())
            .finish_non_exhaustive()
    }
}

impl LifecycleCoordinator {
    pub fn new(
        store: Arc<ConfigStore>,
        host: Arc<dyn EntityHost>,
        source: Arc<dyn WeatherSource>,
        poller_config: PollerConfig,
        icon_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                host,
                source,
                poller_config,
                icon_dir: icon_dir.into(),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.lock().state
    }

    /// Id of the registered entity while Ready.
    pub fn entity_id(&self) -> Option<String> {
        self.inner
            .lifecycle
            .lock()
            .session
            .as_ref()
            .map(|s| s.entity.id.clone())
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .lifecycle
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.handle.as_ref())
            .is_some_and(|h| h.is_running())
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .lifecycle
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.subscribed)
    }

    pub fn latest(&self) -> Option<WeatherSnapshot> {
        self.inner
            .lifecycle
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.poller.latest())
    }

    /// Called once at process start. Initializes right away when a saved config exists.
    pub async fn on_startup(&self) -> TriggerOutcome {
        if !self.inner.store.is_configured() {
            tracing::info!("No saved configuration, waiting for setup");
            self.inner.host.set_device_state(DeviceState::Disconnected);
            return TriggerOutcome::NotConfigured;
        }
        tracing::info!("Saved configuration found, initializing on startup");
        self.try_initialize().await
    }

    pub async fn handle_event(&self, event: LifecycleEvent) -> TriggerOutcome {
        tracing::debug!("Lifecycle event: {:?}", event);
        match event {
            LifecycleEvent::Connect => self.on_connect().await,
            LifecycleEvent::Subscribe(ids) => self.on_subscribe(ids).await,
            LifecycleEvent::Disconnect => {
                tracing::info!("Remote disconnected");
                TriggerOutcome::Handled
            }
            LifecycleEvent::EnterStandby => self.on_enter_standby(),
            LifecycleEvent::ExitStandby => self.on_exit_standby(),
            LifecycleEvent::Reconfigured => self.on_reconfigured().await,
        }
    }

    /// Entity command from the remote.
    pub fn handle_command(&self, entity_id: &str, command: EntityCommand) -> CommandStatus {
        let mut lifecycle = self.inner.lifecycle.lock();
        let Some(session) = lifecycle
            .session
            .as_mut()
            .filter(|s| s.entity.id == entity_id)
        else {
            tracing::warn!("Command {:?} for unknown entity {}", command, entity_id);
            return CommandStatus::NotFound;
        };

        match command {
            EntityCommand::On => {
                tracing::info!("Refresh requested for {}", entity_id);
                self.inner.wake_or_restart(session);
                CommandStatus::Ok
            }
            EntityCommand::Off | EntityCommand::PlayPause => CommandStatus::Ok,
            EntityCommand::Other(name) => {
                tracing::debug!("Unsupported command {} for {}", name, entity_id);
                CommandStatus::NotImplemented
            }
        }
    }

    /// Stop polling and forget the session. Any initialization in flight is abandoned.
    pub fn shutdown(&self) {
        let session = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.state = LifecycleState::Idle;
            lifecycle.generation += 1;
            lifecycle.session.take()
        };
        if let Some(handle) = session.and_then(|s| s.handle) {
            handle.stop();
        }
        tracing::info!("Lifecycle coordinator shut down");
    }

    /// Begin initialization unless one is running or already done.
    pub async fn try_initialize(&self) -> TriggerOutcome {
        let generation = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let state = lifecycle.state;
            if !state.can_start_initialization() {
                if state.initialization_in_flight() {
                    tracing::debug!("Initialization already in flight");
                    return TriggerOutcome::AlreadyInitializing;
                }
                return TriggerOutcome::AlreadyReady;
            }
            if !self.inner.store.is_configured() {
                return TriggerOutcome::NotConfigured;
            }
            lifecycle.state = LifecycleState::Initializing;
            lifecycle.generation += 1;
            lifecycle.generation
        };

        self.initialize(generation).await
    }

    async fn initialize(&self, generation: u64) -> TriggerOutcome {
        let inner = &self.inner;
        let config = inner.store.load();
        let Some(location) = config.location.clone() else {
            return self.fail(generation, None, "no location configured");
        };

        let entity = WeatherEntity::new(&location, &inner.icon_dir);
        tracing::info!("Initializing entity {} for {}", entity.id, location.name);

        if let Err(e) = inner.host.register_entity(&entity, &entity.loading_attributes()) {
            return self.fail(generation, None, &format!("registration failed: {:#}", e));
        }

        let poller = WeatherPoller::new(inner.source.clone(), inner.poller_config.clone());
        let (first_tx, first_rx) = oneshot::channel();
        let handle = poller.start(
            config.clone(),
            publisher(inner.host.clone(), entity.clone(), Some(first_tx)),
        );

        let snapshot = match first_rx.await {
            Ok(PollUpdate::Updated(snapshot)) => snapshot,
            Ok(PollUpdate::Unavailable(e)) => {
                handle.stop();
                return self.fail(generation, Some(&entity), &e.to_string());
            }
            Err(_) => {
                handle.stop();
                return self.fail(generation, Some(&entity), "poll loop ended before first fetch");
            }
        };

        let mut lifecycle = inner.lifecycle.lock();
        if lifecycle.generation != generation || !lifecycle.state.initialization_in_flight() {
            drop(lifecycle);
            handle.stop();
            // The id may already belong to a newer initialization, so leave the host alone
            tracing::info!("Initialization of {} abandoned", entity.id);
            return TriggerOutcome::InitializationFailed("abandoned".to_string());
        }

        inner
            .host
            .update_attributes(&entity.id, &entity.attributes_for(&snapshot));
        inner.host.set_availability(&entity.id, Availability::Available);

        lifecycle.session = Some(Session {
            entity,
            config,
            poller,
            handle: Some(handle),
            subscribed: false,
        });
        lifecycle.state = lifecycle.state.on_initialized();
        drop(lifecycle);

        inner.host.set_device_state(DeviceState::Connected);
        tracing::info!("Weather entity ready");
        TriggerOutcome::Initialized
    }

    /// Roll back a failed initialization to Idle.
    fn fail(&self, generation: u64, registered: Option<&WeatherEntity>, reason: &str) -> TriggerOutcome {
        tracing::error!("Initialization failed: {}", reason);
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.generation != generation {
            tracing::debug!("Failed initialization was already abandoned");
            return TriggerOutcome::InitializationFailed(reason.to_string());
        }
        // Removed before leaving Initializing so a new trigger cannot re-register first
        if let Some(entity) = registered {
            self.inner.host.remove_entity(&entity.id);
        }
        lifecycle.state = lifecycle.state.on_failed();
        drop(lifecycle);

        self.inner.host.set_device_state(DeviceState::Error);
        TriggerOutcome::InitializationFailed(reason.to_string())
    }

    async fn on_connect(&self) -> TriggerOutcome {
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            let state = lifecycle.state;
            match state {
                LifecycleState::Initializing => return TriggerOutcome::AlreadyInitializing,
                LifecycleState::Ready => {
                    if let Some(session) = lifecycle.session.as_mut() {
                        self.inner.wake_or_restart(session);
                    }
                    drop(lifecycle);
                    self.inner.host.set_device_state(DeviceState::Connected);
                    return TriggerOutcome::Handled;
                }
                LifecycleState::Idle => {}
            }
        }
        self.try_initialize().await
    }

    async fn on_subscribe(&self, ids: Vec<String>) -> TriggerOutcome {
        let outcome = match self.state() {
            LifecycleState::Idle => self.try_initialize().await,
            LifecycleState::Initializing => return TriggerOutcome::AlreadyInitializing,
            LifecycleState::Ready => TriggerOutcome::Handled,
        };
        if !matches!(outcome, TriggerOutcome::Initialized | TriggerOutcome::Handled) {
            return outcome;
        }

        let mut lifecycle = self.inner.lifecycle.lock();
        let Some(session) = lifecycle.session.as_mut() else {
            return TriggerOutcome::Ignored;
        };
        if !ids.iter().any(|id| *id == session.entity.id) {
            tracing::debug!("Subscription does not include {}", session.entity.id);
            return match outcome {
                TriggerOutcome::Initialized => outcome,
                _ => TriggerOutcome::Ignored,
            };
        }

        session.subscribed = true;
        let attributes = match session.poller.latest() {
            Some(snapshot) => session.entity.attributes_for(&snapshot),
            None => session.entity.loading_attributes(),
        };
        self.inner.host.update_attributes(&session.entity.id, &attributes);
        tracing::info!("Entity {} subscribed", session.entity.id);
        outcome
    }

    fn on_enter_standby(&self) -> TriggerOutcome {
        let handle = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.session.as_mut().and_then(|s| s.handle.take())
        };
        match handle {
            Some(handle) => {
                tracing::info!("Entering standby, polling paused");
                handle.stop();
                TriggerOutcome::Handled
            }
            None => TriggerOutcome::Ignored,
        }
    }

    fn on_exit_standby(&self) -> TriggerOutcome {
        let mut lifecycle = self.inner.lifecycle.lock();
        match lifecycle.session.as_mut() {
            Some(session) => {
                tracing::info!("Leaving standby, refreshing weather");
                self.inner.wake_or_restart(session);
                TriggerOutcome::Handled
            }
            None => TriggerOutcome::Ignored,
        }
    }

    async fn on_reconfigured(&self) -> TriggerOutcome {
        let session = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state.initialization_in_flight() {
                tracing::warn!("Reconfiguration rejected while initialization is running");
                return TriggerOutcome::Rejected;
            }
            lifecycle.state = LifecycleState::Idle;
            lifecycle.session.take()
        };

        self.teardown(session);
        self.inner.store.reload();
        self.try_initialize().await
    }

    /// Save `config` and rebuild the entity from it.
    ///
    /// While an initialization is running nothing is saved and the outcome is
    /// `Rejected`, so the store never disagrees with the session being built.
    pub async fn apply_config(&self, config: Config) -> Result<TriggerOutcome, ConfigError> {
        let session = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.state.initialization_in_flight() {
                tracing::warn!("New configuration rejected while initialization is running");
                return Ok(TriggerOutcome::Rejected);
            }
            self.inner.store.save(config)?;
            lifecycle.state = LifecycleState::Idle;
            lifecycle.session.take()
        };

        self.teardown(session);
        Ok(self.try_initialize().await)
    }

    fn teardown(&self, session: Option<Session>) {
        if let Some(session) = session {
            tracing::info!("Tearing down {} for reconfiguration", session.entity.id);
            if let Some(handle) = session.handle {
                handle.stop();
            }
            self.inner.host.remove_entity(&session.entity.id);
        }
    }
}

impl Inner {
    /// Fetch now if the loop is alive, otherwise start a fresh one (fetches immediately).
    fn wake_or_restart(&self, session: &mut Session) {
        match session.handle.as_ref().filter(|h| h.is_running()) {
            Some(handle) => {
                handle.wake();
            }
            None => {
                session.handle = Some(session.poller.start(
                    session.config.clone(),
                    publisher(self.host.clone(), session.entity.clone(), None),
                ));
            }
        }
    }
}

/// Poll callback pushing updates to the host. The first update goes to `first`
/// instead, so initialization decides whether the entity survives.
fn publisher(
    host: Arc<dyn EntityHost>,
    entity: WeatherEntity,
    first: Option<oneshot::Sender<PollUpdate>>,
) -> OnUpdate {
    let first = Mutex::new(first);
    Arc::new(move |update: PollUpdate| {
        if let Some(tx) = first.lock().take() {
            let _ = tx.send(update);
            return;
        }
        match update {
            PollUpdate::Updated(snapshot) => {
                host.update_attributes(&entity.id, &entity.attributes_for(&snapshot));
                host.set_availability(&entity.id, Availability::Available);
            }
            PollUpdate::Unavailable(_) => {
                host.update_attributes(&entity.id, &entity.unavailable_attributes());
                host.set_availability(&entity.id, Availability::Unavailable);
            }
        }
    })
}
