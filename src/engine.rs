//! The composition root (spec §2, §4.5, §9): owns the router, the
//! transports, and a tick counter, and drives one step of the cooperative
//! loop at a time.

use log::debug;

use crate::config::{ConfigStore, FujiConfig, ModemDefaults};
use crate::error::Result;
use crate::router::Router;
use crate::service::IoService;
use crate::transport::Transport;

/// Ties the router, the I/O service, and a tick counter together.
///
/// Single-threaded, cooperative: `tick` does one pass of the service loop
/// (each transport polled, drained, dispatched) and then fans a tick out to
/// every registered device. There is no internal locking and no assumption
/// of preemption (spec §4.5 "Scheduling model"); a host that wants
/// parallelism runs multiple `Engine`s.
pub struct Engine {
    router: Router,
    service: IoService,
    config: FujiConfig,
    tick_count: u64,
}

impl Engine {
    /// Build an engine around an already-populated [`Router`], loading
    /// config from `store` (falling back to defaults if none is stored
    /// yet).
    pub fn new(router: Router, store: &dyn ConfigStore) -> Result<Self> {
        let config = store.load()?;
        Ok(Self {
            router,
            service: IoService::new(),
            config,
            tick_count: 0,
        })
    }

    /// Build an engine with an explicit config, bypassing any store (tests,
    /// or a caller that already resolved config elsewhere).
    pub fn with_config(router: Router, config: FujiConfig) -> Self {
        Self {
            router,
            service: IoService::new(),
            config,
            tick_count: 0,
        }
    }

    /// The config this engine was started with.
    pub fn config(&self) -> &FujiConfig {
        &self.config
    }

    /// Modem defaults loaded at construction (listen port, baud,
    /// auto-answer rings). The registry holds devices as `Box<dyn Device>`,
    /// so the engine itself never constructs a concretely-typed
    /// `ModemDevice<S>`; a caller building one passes this to
    /// [`crate::modem::ModemDevice::with_defaults`] before registering it.
    pub fn modem_defaults(&self) -> &ModemDefaults {
        &self.config.modem
    }

    /// Register a transport to be serviced on every tick.
    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        self.service.add_transport(transport);
    }

    /// Direct access to the router (e.g. to register/unregister devices via
    /// `router.registry()`, or install a takeover override).
    pub fn router(&mut self) -> &mut Router {
        &mut self.router
    }

    /// How many ticks this engine has run.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// One engine tick: service every transport once, then fan a tick out
    /// to every registered device so they can advance their own state
    /// machines (spec §2 "Control flow").
    pub fn tick(&mut self) {
        self.tick_count += 1;
        self.service.service_once(&mut self.router);
        self.router.registry().poll_devices();
        debug!("engine tick {} complete", self.tick_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonFileConfigStore;
    use crate::device::Device;
    use crate::message::{Request, RequestType, Response};
    use crate::registry::Registry;
    use crate::router::RequestHandler;

    struct CountingDevice {
        polls: std::rc::Rc<std::cell::Cell<u32>>,
    }

    impl Device for CountingDevice {
        fn handle(&mut self, request: &Request) -> Response {
            Response::ok(request.id, request.device_id, request.command)
        }

        fn poll(&mut self) {
            self.polls.set(self.polls.get() + 1);
        }
    }

    #[test]
    fn tick_counter_advances_and_polls_devices() {
        let polls = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut registry = Registry::new();
        registry.register(1, Box::new(CountingDevice { polls: polls.clone() }));
        let router = Router::new(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let mut engine = Engine::new(router, &store).unwrap();

        assert_eq!(engine.tick_count(), 0);
        engine.tick();
        engine.tick();
        assert_eq!(engine.tick_count(), 2);
        assert_eq!(polls.get(), 2);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let engine = Engine::new(Router::new(Registry::new()), &store).unwrap();
        assert_eq!(*engine.config(), FujiConfig::default());
    }

    #[test]
    fn modem_defaults_reflect_loaded_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("fujinet.json"));
        let mut config = FujiConfig::default();
        config.modem.baud = 2400;
        config.modem.auto_answer_rings = 3;
        store.save(&config).unwrap();

        let engine = Engine::new(Router::new(Registry::new()), &store).unwrap();
        assert_eq!(engine.modem_defaults().baud, 2400);
        assert_eq!(engine.modem_defaults().auto_answer_rings, 3);
    }

    #[test]
    fn dispatch_through_engine_reaches_registered_device() {
        let mut registry = Registry::new();
        registry.register(3, Box::new(CountingDevice { polls: std::rc::Rc::new(std::cell::Cell::new(0)) }));
        let router = Router::new(registry);
        let mut engine = Engine::with_config(router, FujiConfig::default());
        let resp = engine.router().handle_request(&Request::new(1, 3, RequestType::Command, 0));
        assert_eq!(resp.status, crate::message::StatusCode::Ok);
    }
}
