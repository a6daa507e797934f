//! Injected services, looked up by capability type.
//!
//! All concrete I/O goes through these traits. The engine itself never
//! touches the network or the file system; actions ask the context for a
//! service and fail with `MissingService` when none was registered.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use aro_foundation::{ActionError, ActionResult, Value};

use crate::BoxFuture;

// =============================================================================
// Registry
// =============================================================================

/// Services keyed by the `TypeId` of their capability, usually a trait
/// object type such as `dyn Console`.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` as the provider of capability `T`, replacing any
    /// previous provider.
    pub fn register<T>(&mut self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        self.services.insert(id, Arc::new(service));
        self.names.insert(id, type_name::<T>());
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with<T>(mut self, service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(service);
        self
    }

    /// Returns the provider of capability `T`.
    #[must_use]
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| service.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Returns the provider of capability `T`.
    ///
    /// # Errors
    ///
    /// Returns `MissingService` naming the capability if none is registered.
    pub fn require<T>(&self) -> ActionResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.get::<T>()
            .ok_or_else(|| ActionError::missing_service(capability_name::<T>()))
    }

    /// Returns the number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names.values().copied().collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

/// Short capability name: `dyn aro_engine::services::Console` becomes
/// `Console`.
fn capability_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let trimmed = full.trim_start_matches("dyn ");
    trimmed.rsplit("::").next().unwrap_or(trimmed).to_string()
}

// =============================================================================
// Capabilities
// =============================================================================

/// Line-oriented console output.
pub trait Console: Send + Sync {
    /// Writes a line to standard output.
    fn print(&self, line: &str);

    /// Writes a line to standard error.
    fn eprint(&self, line: &str);
}

/// Outbound HTTP.
pub trait HttpClient: Send + Sync {
    /// Performs a request and returns the decoded response body.
    fn request<'a>(
        &'a self,
        method: &'a str,
        url: &'a str,
        body: Option<Value>,
    ) -> BoxFuture<'a, ActionResult<Value>>;
}

/// File access.
pub trait FileSystem: Send + Sync {
    /// Reads a whole file as text.
    fn read(&self, path: &str) -> BoxFuture<'_, ActionResult<String>>;

    /// Replaces a file's contents.
    fn write<'a>(&'a self, path: &'a str, contents: &'a str) -> BoxFuture<'a, ActionResult<()>>;

    /// Lists the entry names of a directory.
    fn list(&self, path: &str) -> BoxFuture<'_, ActionResult<Vec<String>>>;
}

/// Fire-and-forget messaging to a named destination.
pub trait MessageTransport: Send + Sync {
    /// Sends `payload` to `destination`.
    fn send<'a>(&'a self, destination: &'a str, payload: Value) -> BoxFuture<'a, ActionResult<()>>;
}

/// Long-running listeners such as HTTP or socket servers.
pub trait ServerHost: Send + Sync {
    /// Starts the named server and returns a description of it.
    fn start<'a>(&'a self, name: &'a str, config: Value) -> BoxFuture<'a, ActionResult<Value>>;

    /// Stops the named server.
    fn stop<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ActionResult<()>>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// A console that records lines instead of printing them.
#[derive(Debug, Default)]
pub struct CapturedConsole {
    lines: Mutex<Vec<(bool, String)>>,
}

impl CapturedConsole {
    /// Creates an empty console.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the standard-output lines written so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries(false)
    }

    /// Returns the standard-error lines written so far.
    #[must_use]
    pub fn error_lines(&self) -> Vec<String> {
        self.entries(true)
    }

    fn entries(&self, stderr: bool) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(is_err, _)| *is_err == stderr)
            .map(|(_, line)| line.clone())
            .collect()
    }

    fn push(&self, stderr: bool, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stderr, line.to_string()));
    }
}

impl Console for CapturedConsole {
    fn print(&self, line: &str) {
        self.push(false, line);
    }

    fn eprint(&self, line: &str) {
        self.push(true, line);
    }
}

/// A transport that records every message it is asked to send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(destination, payload)` pair sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MessageTransport for RecordingTransport {
    fn send<'a>(&'a self, destination: &'a str, payload: Value) -> BoxFuture<'a, ActionResult<()>> {
        Box::pin(async move {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((destination.to_string(), payload));
            Ok(())
        })
    }
}

/// File access through `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

impl FileSystem for TokioFileSystem {
    fn read(&self, path: &str) -> BoxFuture<'_, ActionResult<String>> {
        let path = path.to_string();
        Box::pin(async move {
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ActionError::io(format!("{path}: {e}")))
        })
    }

    fn write<'a>(&'a self, path: &'a str, contents: &'a str) -> BoxFuture<'a, ActionResult<()>> {
        Box::pin(async move {
            tokio::fs::write(path, contents)
                .await
                .map_err(|e| ActionError::io(format!("{path}: {e}")))
        })
    }

    fn list(&self, path: &str) -> BoxFuture<'_, ActionResult<Vec<String>>> {
        let path = path.to_string();
        Box::pin(async move {
            let io_error = |e: std::io::Error| ActionError::io(format!("{path}: {e}"));
            let mut entries = tokio::fs::read_dir(&path).await.map_err(io_error)?;
            let mut names = Vec::new();
            while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
            names.sort();
            Ok(names)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_capability_type() {
        let console = Arc::new(CapturedConsole::new());
        let registry = ServiceRegistry::new().with::<dyn Console>(console.clone());

        let found = registry.get::<dyn Console>().unwrap();
        found.print("hello");
        found.eprint("oops");
        assert_eq!(console.lines(), vec!["hello"]);
        assert_eq!(console.error_lines(), vec!["oops"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn missing_capability_names_the_trait() {
        let registry = ServiceRegistry::new();
        let err = registry.require::<dyn HttpClient>().err().unwrap();
        assert_eq!(err, ActionError::missing_service("HttpClient"));
    }

    #[test]
    fn concrete_and_trait_capabilities_are_distinct() {
        let registry =
            ServiceRegistry::new().with::<CapturedConsole>(Arc::new(CapturedConsole::new()));
        assert!(registry.get::<dyn Console>().is_none());
        assert!(registry.get::<CapturedConsole>().is_some());
    }

    #[tokio::test]
    async fn recording_transport_keeps_messages() {
        let transport = RecordingTransport::new();
        transport.send("audit", Value::from(1)).await.unwrap();
        assert_eq!(transport.sent(), vec![("audit".to_string(), Value::from(1))]);
    }

    #[tokio::test]
    async fn tokio_file_system_reports_missing_files() {
        let err = TokioFileSystem
            .read("/definitely/not/a/real/path.aro")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "io-error");
    }
}
