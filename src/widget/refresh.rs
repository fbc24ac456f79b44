use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::{render_widget, WidgetBindings, WidgetView};
use crate::storage::StorageHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// Re-render every bound widget.
    All,
    Widget(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedWidget {
    pub widget_id: i64,
    pub view: WidgetView,
}

/// Background worker that re-renders widgets while the foreground keeps
/// using the same storage handle.
pub struct WidgetRefresher {
    requests: Option<Sender<RefreshRequest>>,
    results: Receiver<RenderedWidget>,
    worker: Option<JoinHandle<()>>,
}

impl WidgetRefresher {
    pub fn spawn(storage: StorageHandle, bindings: Arc<Mutex<WidgetBindings>>) -> Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let worker = thread::Builder::new()
            .name("widget-refresh".into())
            .spawn(move || run_worker(&storage, &bindings, &request_rx, &result_tx))
            .context("spawning widget refresh worker")?;
        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
        })
    }

    pub fn request(&self, request: RefreshRequest) -> Result<()> {
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| anyhow!("widget refresh worker already stopped"))?;
        sender
            .send(request)
            .map_err(|_| anyhow!("widget refresh worker is not running"))
    }

    /// Stops accepting requests, lets the worker drain, and returns what it
    /// rendered.
    pub fn shutdown(mut self) -> Result<Vec<RenderedWidget>> {
        self.stop()?;
        Ok(self.results.try_iter().collect())
    }

    fn stop(&mut self) -> Result<()> {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| anyhow!("widget refresh worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for WidgetRefresher {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::error!(error = %err, "stopping widget refresh worker");
        }
    }
}

fn run_worker(
    storage: &StorageHandle,
    bindings: &Mutex<WidgetBindings>,
    requests: &Receiver<RefreshRequest>,
    results: &Sender<RenderedWidget>,
) {
    for request in requests.iter() {
        let widget_ids = match request {
            RefreshRequest::All => bindings.lock().widget_ids(),
            RefreshRequest::Widget(widget_id) => vec![widget_id],
        };
        tracing::debug!(?request, widgets = widget_ids.len(), "refreshing widgets");
        for widget_id in widget_ids {
            let view = {
                let mut guard = bindings.lock();
                render_widget(storage, &mut guard, widget_id)
            };
            let view = view.unwrap_or_else(|err| {
                tracing::error!(widget_id, error = %err, "rendering widget");
                WidgetView::Failed {
                    message: err.to_string(),
                }
            });
            if results.send(RenderedWidget { widget_id, view }).is_err() {
                return;
            }
        }
    }
}
