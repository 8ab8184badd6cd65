// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Registry of active watches.
//!
//! A watch binds one [`Source`] to one [`Output`]: the source watcher feeds
//! template changes to a [`RenderTask`], which renders them and flushes the
//! result to the output. The registry owns every watch from registration until
//! [`WatchRegistry::deregister`] or [`WatchRegistry::stop`].
//!
//! Registration and deregistration are serialized by a registry-wide lock so
//! that duplicate detection cannot race. Listing the active watches only takes
//! a read lock on the registration map.

use crate::errors::{DescriptorError, RegistrationError};
use crate::metrics::set_active_watches;
use crate::output::{parse_output, FileOutput, FileWriter, Output};
use crate::scheduler::{Flush, RenderTask, Renderer};
use crate::source::{parse_source, FileWatcher, Source};
use async_trait::async_trait;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// A source and the output its rendered template is written to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchConfig {
    pub source: Source,
    pub output: Output,
}

impl WatchConfig {
    #[must_use]
    pub fn new(source: Source, output: Output) -> Self {
        Self { source, output }
    }

    /// Parse a watch from its source and output DSNs.
    ///
    /// # Errors
    ///
    /// Returns an error if either DSN is invalid.
    pub fn parse(
        source: &str,
        output: &str,
        default_period: Duration,
    ) -> Result<Self, DescriptorError> {
        Ok(Self {
            source: parse_source(source, default_period)?,
            output: parse_output(output)?,
        })
    }
}

impl fmt::Display for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.output)
    }
}

impl Serialize for WatchConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WatchConfig", 2)?;
        state.serialize_field("source", &self.source.to_string())?;
        state.serialize_field("output", &self.output.to_string())?;
        state.end()
    }
}

/// Flushes rendered content to a file output.
pub struct OutputSink {
    writer: Arc<FileWriter>,
    output: FileOutput,
}

impl OutputSink {
    #[must_use]
    pub fn new(writer: Arc<FileWriter>, output: FileOutput) -> Self {
        Self { writer, output }
    }
}

#[async_trait]
impl Flush for OutputSink {
    async fn flush(&self, content: &str) -> anyhow::Result<()> {
        self.writer.flush(&self.output, content).await?;
        Ok(())
    }
}

/// Live state of one registered watch.
struct Registration {
    task: RenderTask,
}

impl Registration {
    fn stop(self, file_watcher: &FileWatcher, config: &WatchConfig) {
        match &config.source {
            Source::File(source) => {
                file_watcher.remove_watch(source);
            }
        }
        self.task.stop();
    }
}

/// Owns every active watch of the process.
pub struct WatchRegistry {
    renderer: Arc<dyn Renderer>,
    writer: Arc<FileWriter>,
    file_watcher: Arc<FileWatcher>,
    retry_delay: Duration,
    running: AtomicBool,
    registrations: RwLock<HashMap<WatchConfig, Registration>>,
    /// Serializes register, deregister and stop
    lock: Mutex<()>,
}

impl WatchRegistry {
    /// Create a registry. It rejects registrations until [`Self::start`].
    #[must_use]
    pub fn new(
        renderer: Arc<dyn Renderer>,
        writer: Arc<FileWriter>,
        file_watcher: Arc<FileWatcher>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            renderer,
            writer,
            file_watcher,
            retry_delay,
            running: AtomicBool::new(false),
            registrations: RwLock::new(HashMap::new()),
            lock: Mutex::new(()),
        }
    }

    /// Accept registrations from now on.
    pub fn start(&self) {
        debug!("Starting watch registry");
        self.running.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start watching `config.source` and rendering it to `config.output`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry is not running, the same config is
    /// already registered, or another registration already watches the source.
    pub fn register(&self, config: WatchConfig) -> Result<(), RegistrationError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.is_running() {
            return Err(RegistrationError::NotRunning {
                config: config.to_string(),
            });
        }

        {
            let registrations = self.read();
            if registrations.contains_key(&config) {
                return Err(RegistrationError::AlreadyRegistered {
                    config: config.to_string(),
                });
            }
            if registrations
                .keys()
                .any(|existing| existing.source == config.source)
            {
                return Err(RegistrationError::SourceAlreadyWatched {
                    location: config.source.to_string(),
                });
            }
        }

        debug!(config = %config, "Registering watch");

        let sink = match &config.output {
            Output::File(output) => OutputSink::new(Arc::clone(&self.writer), output.clone()),
        };
        let task = RenderTask::spawn(
            config.to_string(),
            Arc::clone(&self.renderer),
            Arc::new(sink),
            self.retry_delay,
        );

        match &config.source {
            Source::File(source) => {
                if !self.file_watcher.add_watch(source.clone(), task.change_callback()) {
                    task.stop();
                    return Err(RegistrationError::SourceAlreadyWatched {
                        location: config.source.to_string(),
                    });
                }
            }
        }

        let mut registrations = self.write();
        registrations.insert(config.clone(), Registration { task });
        set_active_watches(registrations.len());
        info!(config = %config, "Started watch");
        Ok(())
    }

    /// Stop the watch registered for `config`.
    ///
    /// # Returns
    ///
    /// `false` if no such watch was registered.
    pub fn deregister(&self, config: &WatchConfig) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let removed = {
            let mut registrations = self.write();
            let removed = registrations.remove(config);
            set_active_watches(registrations.len());
            removed
        };

        match removed {
            Some(registration) => {
                registration.stop(&self.file_watcher, config);
                info!(config = %config, "Stopped watch");
                true
            }
            None => {
                debug!(config = %config, "No such watch registered");
                false
            }
        }
    }

    /// Sorted snapshot of the active watches.
    #[must_use]
    pub fn registrations(&self) -> Vec<WatchConfig> {
        let mut configs: Vec<WatchConfig> = self.read().keys().cloned().collect();
        configs.sort();
        configs
    }

    /// Stop every watch and reject further registrations.
    pub fn stop(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        info!("Shutting down all watches");
        self.running.store(false, Ordering::SeqCst);

        let drained: Vec<(WatchConfig, Registration)> = self.write().drain().collect();
        set_active_watches(0);

        for (config, registration) in drained {
            info!(config = %config, "Stopping watch");
            registration.stop(&self.file_watcher, &config);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<WatchConfig, Registration>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<WatchConfig, Registration>> {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
