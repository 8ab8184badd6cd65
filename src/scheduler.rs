// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-watch render scheduling.
//!
//! A [`RenderTask`] owns one tokio task that renders a template and writes the
//! result, then renders the same template again once the render TTL has
//! elapsed (or after the retry delay if the cycle failed):
//!
//! ```text
//! template change ──► render ──► unchanged? ──yes──► sleep(ttl) ──┐
//!        ▲               ▲          │ no                          │
//!        │               │          ▼                             │
//!        │               │        write ──► sleep(ttl) ───────────┤
//!        │               │                                        │
//!        │               └────────── failure ──► sleep(retry) ◄───┘
//!        └── cancels the pending sleep and renders immediately
//! ```
//!
//! Renders of one task never overlap. Template changes received while a
//! render is in flight are coalesced: only the latest one is rendered next.
//! A scheduled re-render reuses the template of the current cycle; only the
//! source watcher reads new templates.

use crate::metrics::{record_render_failure, record_render_success};
use crate::render::{Render, RenderEngine};
use crate::source::file::ChangeCallback;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Produces a [`Render`] from template text.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, template: &str) -> Result<Render>;
}

#[async_trait]
impl Renderer for RenderEngine {
    async fn render(&self, template: &str) -> Result<Render> {
        Ok(RenderEngine::render(self, template).await?)
    }
}

/// Persists rendered content to the output of a watch.
#[async_trait]
pub trait Flush: Send + Sync {
    async fn flush(&self, content: &str) -> Result<()>;
}

/// Handle to the render loop of one watch.
pub struct RenderTask {
    name: String,
    templates: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
}

impl RenderTask {
    /// Spawn the render loop. It stays idle until the first template change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        renderer: Arc<dyn Renderer>,
        flush: Arc<dyn Flush>,
        retry_delay: Duration,
    ) -> Self {
        let name = name.into();
        let (templates, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let task = RenderLoop {
            name: name.clone(),
            renderer,
            flush,
            retry_delay,
            last_written: None,
        };
        tokio::spawn(task.run(rx, shutdown_rx));

        Self {
            name,
            templates,
            shutdown,
        }
    }

    /// Cancel any pending re-render and render `template` as soon as possible.
    ///
    /// Ignored once the task is stopped.
    pub fn template_changed(&self, template: String) {
        if self.is_stopped() || self.templates.send(template).is_err() {
            info!(watch = %self.name, "Render task is shutting down, ignoring template change");
        }
    }

    /// Callback forwarding source changes to this task.
    #[must_use]
    pub fn change_callback(&self) -> ChangeCallback {
        let name = self.name.clone();
        let templates = self.templates.clone();
        Arc::new(move |template| {
            if templates.send(template).is_err() {
                debug!(watch = %name, "Render task stopped, dropping template change");
            }
        })
    }

    /// Cancel the pending re-render and drop all further work.
    ///
    /// A render already in flight completes, but nothing is scheduled after it.
    pub fn stop(&self) {
        if !self.shutdown.send_replace(true) {
            debug!(watch = %self.name, "Stopping render task");
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl Drop for RenderTask {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RenderLoop {
    name: String,
    renderer: Arc<dyn Renderer>,
    flush: Arc<dyn Flush>,
    retry_delay: Duration,
    /// Checksum of the last content written
    last_written: Option<String>,
}

impl RenderLoop {
    async fn run(
        mut self,
        mut templates: mpsc::UnboundedReceiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!(watch = %self.name, "Render task started");
        let mut template: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                received = templates.recv() => {
                    let Some(mut latest) = received else { break };
                    // Only the most recent of the queued changes matters
                    let mut skipped = 0;
                    while let Ok(newer) = templates.try_recv() {
                        latest = newer;
                        skipped += 1;
                    }
                    if skipped > 0 {
                        debug!(watch = %self.name, skipped = skipped, "Coalesced queued template changes");
                    }
                    template = Some(latest);
                }
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }

            let Some(current) = template.as_deref() else {
                deadline = None;
                continue;
            };

            let delay = self.cycle(current).await;
            deadline = Instant::now().checked_add(delay);
            if deadline.is_none() {
                warn!(watch = %self.name, delay = ?delay, "Next render is too far away, not scheduling it");
            }
        }

        debug!(watch = %self.name, "Render task stopped");
    }

    /// Render and write once, returning the delay before the next cycle.
    async fn cycle(&mut self, template: &str) -> Duration {
        let started = std::time::Instant::now();

        let render = match self.renderer.render(template).await {
            Ok(render) => render,
            Err(e) => {
                record_render_failure(started.elapsed());
                error!(
                    watch = %self.name,
                    error = %format!("{e:#}"),
                    retry_in = ?self.retry_delay,
                    "Failed rendering template"
                );
                return self.retry_delay;
            }
        };
        let ttl = Duration::from_secs(render.ttl_seconds());

        if self.last_written.as_deref() == Some(render.checksum()) {
            record_render_success(started.elapsed(), false);
            debug!(watch = %self.name, ttl = render.ttl_seconds(), "Configuration left unchanged after rendering");
            return ttl;
        }

        if let Err(e) = self.flush.flush(render.rendered()).await {
            record_render_failure(started.elapsed());
            error!(
                watch = %self.name,
                error = %format!("{e:#}"),
                retry_in = ?self.retry_delay,
                "Failed writing rendered configuration"
            );
            return self.retry_delay;
        }

        record_render_success(started.elapsed(), true);
        info!(
            watch = %self.name,
            previous = self.last_written.as_deref().unwrap_or("none"),
            current = %render.checksum(),
            ttl = render.ttl_seconds(),
            "Configuration changed"
        );
        self.last_written = Some(render.checksum().to_string());
        ttl
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod scheduler_tests;
