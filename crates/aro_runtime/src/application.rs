//! Application lifecycle: load, start, wait, drain, exit.

use std::sync::Arc;

use aro_engine::services::{Console, FileSystem, TokioFileSystem};
use aro_engine::{Engine, ExecutionError, RunOutcome, ServiceRegistry};
use aro_foundation::Value;
use aro_language::ast::{ERROR_BINDING, ExitKind};
use aro_language::{FeatureSet, Program};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::check::{CheckReport, check_sources};
use crate::config::{ConfigError, RuntimeConfig};
use crate::console::StdoutConsole;
use crate::source::{self, SourceError};

/// Why an application could not be started.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The sources could not be collected.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Static checking found errors; nothing ran.
    #[error("{0}")]
    Check(CheckReport),

    /// The program has no `Application-Start` feature set.
    #[error("no Application-Start feature set")]
    MissingEntryPoint,
}

/// What an application run produced.
#[derive(Debug)]
pub struct ApplicationOutcome {
    /// The response of `Application-Start`, if it returned one.
    pub response: Option<Value>,
    /// The error that ended `Application-Start`, if any.
    pub failure: Option<ExecutionError>,
    /// True if the start feature set entered the keep-alive wait.
    pub waited: bool,
    /// True if every in-flight handler finished within the grace period.
    pub drained: bool,
    /// Which exit point applied.
    pub exit: ExitKind,
}

impl ApplicationOutcome {
    /// Returns true if the application exited without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit == ExitKind::Success
    }
}

/// Signals an application to shut down from outside its run.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    engine: Engine,
}

impl ShutdownHandle {
    /// Releases the keep-alive wait and starts shutdown.
    pub fn signal(&self) {
        self.engine.signal_shutdown();
    }

    /// Returns true once shutdown has been signalled.
    #[must_use]
    pub fn is_signalled(&self) -> bool {
        self.engine.is_shutting_down()
    }
}

/// A checked program wired to built-in actions and services.
#[derive(Debug)]
pub struct Application {
    engine: Engine,
    config: RuntimeConfig,
}

/// Services used when none are supplied: stdout console and `tokio::fs`.
#[must_use]
pub fn default_services() -> ServiceRegistry {
    ServiceRegistry::new()
        .with::<dyn Console>(Arc::new(StdoutConsole))
        .with::<dyn FileSystem>(Arc::new(TokioFileSystem))
}

impl Application {
    /// Wraps an already checked program.
    #[must_use]
    pub fn from_program(program: Program, services: ServiceRegistry, config: RuntimeConfig) -> Self {
        let engine = Engine::builder(program)
            .with_actions(aro_stdlib::builtins())
            .with_services(services)
            .build();
        Self { engine, config }
    }

    /// Loads, checks and wires the sources under `config.source_dir` with
    /// the default services.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::Source`] if the sources cannot be read
    /// and [`ApplicationError::Check`] if checking finds any error.
    pub fn load(config: RuntimeConfig) -> Result<Self, ApplicationError> {
        Self::load_with_services(config, default_services())
    }

    /// Like [`Application::load`] with caller-supplied services.
    ///
    /// # Errors
    ///
    /// See [`Application::load`].
    pub fn load_with_services(
        config: RuntimeConfig,
        services: ServiceRegistry,
    ) -> Result<Self, ApplicationError> {
        let files = source::load(&config.source_dir)?;
        info!(files = files.len(), dir = %config.source_dir.display(), "loaded sources");
        let report = check_sources(&files, &aro_stdlib::builtins(), &config.analyzer_config());
        if report.has_errors() {
            return Err(ApplicationError::Check(report));
        }
        for problem in report.warnings() {
            warn!("{problem}");
        }
        Ok(Self::from_program(report.program, services, config))
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The configuration this application runs with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A handle that can stop this application from another task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            engine: self.engine.clone(),
        }
    }

    /// Runs the application to completion.
    ///
    /// Handlers are subscribed before `Application-Start` runs. Once it
    /// finishes (after any keep-alive wait), the event bus is closed and
    /// in-flight handlers get `shutdown_grace` to finish. The matching
    /// `Application-End` feature set runs last.
    ///
    /// # Errors
    ///
    /// Returns [`ApplicationError::MissingEntryPoint`] if there is nothing
    /// to start. Failures inside the program are reported in the outcome.
    pub async fn run(&self) -> Result<ApplicationOutcome, ApplicationError> {
        let entry = self
            .engine
            .entry_point()
            .ok_or(ApplicationError::MissingEntryPoint)?;
        let handlers = self.engine.subscribe_handlers();
        info!(handlers = handlers.len(), "application starting");

        let listener = self
            .config
            .handle_signals
            .then(|| listen_for_interrupt(self.engine.clone()));

        let ctx = self.engine.root_context(&entry);
        let started = self.engine.run(&entry, ctx).await;
        let (response, waited, failure) = match started {
            Ok(outcome) => (outcome.response, outcome.waiting, None),
            Err(e) => {
                error!(error = %e, "Application-Start failed");
                (None, false, Some(e))
            }
        };

        let events = self.engine.events();
        events.close();
        let drained = events.wait_idle(self.config.shutdown_grace).await;

        let exit = if failure.is_some() {
            ExitKind::Error
        } else {
            ExitKind::Success
        };
        if let Some(exit_point) = self.engine.exit_point(exit) {
            let message = failure.as_ref().map(ToString::to_string);
            if let Err(e) = self.run_exit(&exit_point, message).await {
                error!(error = %e, "Application-End failed");
            }
        }

        self.engine.signal_shutdown();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
        info!(?exit, "application stopped");
        Ok(ApplicationOutcome {
            response,
            failure,
            waited,
            drained,
            exit,
        })
    }

    async fn run_exit(
        &self,
        exit_point: &FeatureSet,
        failure: Option<String>,
    ) -> Result<RunOutcome, ExecutionError> {
        let mut ctx = self.engine.root_context(exit_point);
        if let Some(message) = failure {
            ctx.bind(ERROR_BINDING, Value::from(message))?;
        }
        self.engine.run(exit_point, ctx).await
    }
}

/// Signals shutdown on Ctrl-C. Ends once shutdown is signalled either way.
fn listen_for_interrupt(engine: Engine) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = engine.shutdown_token();
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    engine.signal_shutdown();
                }
                Err(e) => warn!(error = %e, "cannot listen for interrupts"),
            },
            () = token.cancelled() => {}
        }
    })
}
