//! End-to-end driver tests: setup, restart and events against a mock Open-Meteo.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use skycast_core::{Config, ConfigStore, Location, LocationError, TemperatureUnit};
use skycast_driver::{
    Availability, CommandStatus, DeviceState, Driver, DriverSettings, EntityAttributes, EntityHost,
    LifecycleEvent, LifecycleState, SetupError, SetupRequest, TriggerOutcome, WeatherEntity,
};
use skycast_weather::{PollerConfig, RetryConfig};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingHost {
    registered: Mutex<Vec<WeatherEntity>>,
    removed: Mutex<Vec<String>>,
    updates: Mutex<Vec<EntityAttributes>>,
    device_states: Mutex<Vec<DeviceState>>,
}

impl EntityHost for RecordingHost {
    fn register_entity(
        &self,
        entity: &WeatherEntity,
        _attributes: &EntityAttributes,
    ) -> anyhow::Result<()> {
        self.registered.lock().push(entity.clone());
        Ok(())
    }

    fn remove_entity(&self, entity_id: &str) {
        self.removed.lock().push(entity_id.to_string());
    }

    fn update_attributes(&self, _entity_id: &str, attributes: &EntityAttributes) {
        self.updates.lock().push(attributes.clone());
    }

    fn set_availability(&self, _entity_id: &str, _availability: Availability) {}

    fn set_device_state(&self, state: DeviceState) {
        self.device_states.lock().push(state);
    }
}

async fn mount_geocoder(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "10001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{
                "name": "New York",
                "latitude": 40.71427,
                "longitude": -74.00597,
                "country_code": "US",
                "country": "United States",
                "admin1": "New York",
                "timezone": "America/New_York"
            }]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Atlantis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(server)
        .await;
}

async fn mount_forecast(server: &MockServer, status: u16) {
    mount_forecast_with_delay(server, status, Duration::ZERO).await;
}

async fn mount_forecast_with_delay(server: &MockServer, status: u16, delay: Duration) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current": {
                "temperature_2m": 72.54,
                "weather_code": 2,
                "is_day": 1
            }
        }))
    } else {
        ResponseTemplate::new(status)
    }
    .set_delay(delay);
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(template)
        .mount(server)
        .await;
}

fn driver(server: &MockServer, dir: &TempDir, host: Arc<RecordingHost>) -> Driver {
    let settings = DriverSettings {
        config_dir: Some(dir.path().to_path_buf()),
        icon_dir: "/opt/skycast/icons".into(),
        poller: PollerConfig {
            interval: Duration::from_secs(3600),
            retry: RetryConfig::new(1, 10, 10),
        },
        geocoding_url: Some(format!("{}/v1/search", server.uri())),
        forecast_url: Some(format!("{}/v1/forecast", server.uri())),
    };
    Driver::new(settings, host).unwrap()
}

#[tokio::test]
async fn test_setup_registers_entity_and_survives_restart() {
    let server = MockServer::start().await;
    mount_geocoder(&server).await;
    mount_forecast(&server, 200).await;
    let dir = tempfile::tempdir().unwrap();

    let host = Arc::new(RecordingHost::default());
    let first = driver(&server, &dir, host.clone());
    assert_eq!(first.start().await, TriggerOutcome::NotConfigured);

    let outcome = first
        .setup(SetupRequest::new("10001", TemperatureUnit::Fahrenheit))
        .await
        .unwrap();
    assert_eq!(outcome, TriggerOutcome::Initialized);
    assert!(first.config().is_configured());
    {
        let registered = host.registered.lock();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, "Weather - New York, New York");
    }
    let last = host.updates.lock().last().cloned().unwrap();
    assert_eq!(last.subtitle, "72.5°F");
    assert_eq!(last.album, "Partly cloudy");
    assert_eq!(last.image, "/opt/skycast/icons/partly-cloudy-day.png");
    first.shutdown();

    // Reboot: new process, same config directory
    let host = Arc::new(RecordingHost::default());
    let second = driver(&server, &dir, host.clone());
    assert_eq!(second.start().await, TriggerOutcome::Initialized);
    assert_eq!(second.coordinator().state(), LifecycleState::Ready);
    assert_eq!(
        second.handle_event(LifecycleEvent::Connect).await,
        TriggerOutcome::Handled
    );
    assert_eq!(host.registered.lock().len(), 1);
    assert_eq!(host.device_states.lock().last(), Some(&DeviceState::Connected));
    second.shutdown();
}

#[tokio::test]
async fn test_empty_location_rejected() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&server, &dir, Arc::new(RecordingHost::default()));

    let err = driver
        .setup(SetupRequest::new("   ", TemperatureUnit::Celsius))
        .await
        .unwrap_err();
    assert!(matches!(err, SetupError::EmptyLocation));
    assert!(!driver.config().is_configured());
}

#[tokio::test]
async fn test_unknown_location_not_saved() {
    let server = MockServer::start().await;
    mount_geocoder(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(RecordingHost::default());
    let driver = driver(&server, &dir, host.clone());

    let err = driver
        .setup(SetupRequest::new("Atlantis", TemperatureUnit::Fahrenheit))
        .await
        .unwrap_err();
    assert!(matches!(err, SetupError::Location(LocationError::NotFound(_))));
    assert!(!driver.config().is_configured());
    assert!(!dir.path().join("config.json").exists());
    assert!(host.registered.lock().is_empty());
}

#[tokio::test]
async fn test_failed_test_fetch_not_saved() {
    let server = MockServer::start().await;
    mount_geocoder(&server).await;
    mount_forecast(&server, 503).await;
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&server, &dir, Arc::new(RecordingHost::default()));

    let err = driver
        .setup(SetupRequest::new("10001", TemperatureUnit::Fahrenheit))
        .await
        .unwrap_err();
    assert!(matches!(err, SetupError::Fetch(_)));
    assert!(!driver.config().is_configured());
    assert_eq!(driver.coordinator().state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_refresh_command_reaches_registered_entity() {
    let server = MockServer::start().await;
    mount_geocoder(&server).await;
    mount_forecast(&server, 200).await;
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(&server, &dir, Arc::new(RecordingHost::default()));

    driver
        .setup(SetupRequest::new("10001", TemperatureUnit::Fahrenheit))
        .await
        .unwrap();
    let id = driver.coordinator().entity_id().unwrap();

    assert_eq!(driver.handle_command(&id, "on"), CommandStatus::Ok);
    assert_eq!(driver.handle_command(&id, "stop"), CommandStatus::NotImplemented);
    assert_eq!(driver.handle_command("weather-0-0", "on"), CommandStatus::NotFound);
    driver.shutdown();
}

#[tokio::test]
async fn test_setup_refused_while_initializing() {
    let server = MockServer::start().await;
    mount_geocoder(&server).await;
    mount_forecast_with_delay(&server, 200, Duration::from_millis(300)).await;
    let dir = tempfile::tempdir().unwrap();
    let saved = Config::new(
        Location {
            input: "10001".into(),
            name: "New York, New York".into(),
            latitude: 40.71427,
            longitude: -74.00597,
            timezone: "America/New_York".into(),
        },
        TemperatureUnit::Fahrenheit,
    );
    ConfigStore::open(dir.path()).save(saved.clone()).unwrap();

    let driver = driver(&server, &dir, Arc::new(RecordingHost::default()));
    let (started, setup) = tokio::join!(driver.start(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver
            .setup(SetupRequest::new("10001", TemperatureUnit::Celsius))
            .await
    });

    assert_eq!(started, TriggerOutcome::Initialized);
    assert!(matches!(setup, Err(SetupError::InitializationInProgress)));
    assert_eq!(driver.config(), saved);
    assert_eq!(ConfigStore::open(dir.path()).load(), saved);
    driver.shutdown();
}
