//! Path-keyed JSON service routing.

use std::collections::HashMap;

use stagecentral_wire::{JsonRequestHead, unmarshal_request};
use tracing::debug;

use crate::error::ServiceError;
use crate::session::ClientSession;

/// A request/response operation reachable through the JSON channel.
pub trait JsonService: Send + Sync {
    /// Well-known path identifying the operation, e.g. `misc/sync_available_songs`.
    fn path(&self) -> &'static str;

    /// Handle a raw JSON request from `session`, returning the JSON response.
    fn handle(&self, data: &str, session: &ClientSession) -> Result<String, ServiceError>;
}

/// Routes JSON requests to the service registered for their `path`.
#[derive(Default)]
pub struct JsonDispatcher {
    services: HashMap<&'static str, Box<dyn JsonService>>,
}

impl JsonDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. A later registration for the same path replaces
    /// the earlier one.
    pub fn register(&mut self, service: Box<dyn JsonService>) {
        self.services.insert(service.path(), service);
    }

    pub fn paths(&self) -> Vec<&'static str> {
        let mut paths: Vec<_> = self.services.keys().copied().collect();
        paths.sort_unstable();
        paths
    }

    pub fn dispatch(&self, data: &str, session: &ClientSession) -> Result<String, ServiceError> {
        let head: JsonRequestHead =
            unmarshal_request(data).map_err(ServiceError::MalformedRequest)?;
        let service = self
            .services
            .get(head.path.as_str())
            .ok_or_else(|| ServiceError::UnknownPath(head.path.clone()))?;

        debug!(path = %head.path, session = session.id(), "Dispatching JSON request");
        service.handle(data, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl JsonService for Echo {
        fn path(&self) -> &'static str {
            "test/echo"
        }

        fn handle(&self, data: &str, _session: &ClientSession) -> Result<String, ServiceError> {
            Ok(data.to_string())
        }
    }

    fn session() -> ClientSession {
        ClientSession::new(1, "127.0.0.1:9000".parse().unwrap())
    }

    #[test]
    fn test_routes_by_path() {
        let mut dispatcher = JsonDispatcher::new();
        dispatcher.register(Box::new(Echo));

        let request = r#"{"path":"test/echo","x":1}"#;
        assert_eq!(dispatcher.dispatch(request, &session()).unwrap(), request);
        assert_eq!(dispatcher.paths(), vec!["test/echo"]);
    }

    #[test]
    fn test_unknown_path() {
        let dispatcher = JsonDispatcher::new();
        let result = dispatcher.dispatch(r#"{"path":"nope"}"#, &session());
        assert!(matches!(result, Err(ServiceError::UnknownPath(p)) if p == "nope"));
    }

    #[test]
    fn test_malformed_request() {
        let dispatcher = JsonDispatcher::new();
        assert!(matches!(
            dispatcher.dispatch("not json", &session()),
            Err(ServiceError::MalformedRequest(_))
        ));
        assert!(matches!(
            dispatcher.dispatch(r#"{"no_path":true}"#, &session()),
            Err(ServiceError::MalformedRequest(_))
        ));
    }
}
