//! Background loader for point sets, fields and the catalogue.
//!
//! Fetching and decoding run on a dedicated thread so the frame loop never
//! blocks on I/O. Results are queued back and only applied when the frame
//! thread drains them, which keeps every buffer mutation on that one thread.
//! There is no cancellation: superseded field loads still complete and are
//! dropped by their generation tag.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::compositor::FieldRequest;
use crate::error::EmbedError;
use crate::field::{FieldId, ScalarField};
use crate::point_set::{PointSet, PointSetId};
use crate::source::{self, DataSource};

/// Work for the loader thread.
#[derive(Debug, Clone)]
pub enum LoadRequest {
    /// Fetch and center a point set.
    PointSet {
        /// Point set id.
        id: PointSetId,
        /// Path of the point JSON.
        path: String,
    },
    /// Fetch a scalar field for a selection generation.
    Field {
        /// Generation-tagged field request.
        request: FieldRequest,
        /// Path of the field payload.
        path: String,
    },
    /// Fetch the identifier catalogue.
    Catalogue {
        /// Path of the catalogue file.
        path: String,
    },
    /// Stop the thread.
    Shutdown,
}

/// A finished load, success or failure.
#[derive(Debug)]
pub enum LoadResult {
    /// Point set finished.
    PointSet {
        /// Point set id.
        id: PointSetId,
        /// Decoded set or the failure.
        result: Result<PointSet, EmbedError>,
    },
    /// Field finished.
    Field {
        /// The request this answers, tag included.
        request: FieldRequest,
        /// Decoded field or the failure.
        result: Result<ScalarField, EmbedError>,
    },
    /// Catalogue finished.
    Catalogue(Result<Vec<FieldId>, EmbedError>),
}

/// Handle to the loader thread.
pub struct Loader {
    request_tx: mpsc::Sender<LoadRequest>,
    result_rx: mpsc::Receiver<LoadResult>,
    in_flight: usize,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Loader {
    /// Spawn the loader thread over `source`.
    ///
    /// # Errors
    ///
    /// [`EmbedError::ThreadSpawn`] if the thread cannot be started.
    pub fn new(source: Arc<dyn DataSource>) -> Result<Self, EmbedError> {
        let (request_tx, request_rx) = mpsc::channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();

        let thread = std::thread::Builder::new()
            .name("embedview-loader".into())
            .spawn(move || {
                Self::thread_loop(&*source, &request_rx, &result_tx);
            })
            .map_err(EmbedError::ThreadSpawn)?;

        Ok(Self {
            request_tx,
            result_rx,
            in_flight: 0,
            thread: Some(thread),
        })
    }

    /// Queue a request (non-blocking).
    pub fn submit(&mut self, request: LoadRequest) {
        let counts = !matches!(request, LoadRequest::Shutdown);
        if self.request_tx.send(request).is_ok() && counts {
            self.in_flight += 1;
        }
    }

    /// Non-blocking check for one finished load.
    pub fn try_recv(&mut self) -> Option<LoadResult> {
        let result = self.result_rx.try_recv().ok()?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Some(result)
    }

    /// Wait up to `timeout` for one finished load.
    ///
    /// # Errors
    ///
    /// [`mpsc::RecvTimeoutError::Timeout`] if nothing finished in time, and
    /// [`mpsc::RecvTimeoutError::Disconnected`] once the thread has exited.
    pub fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<LoadResult, mpsc::RecvTimeoutError> {
        let result = self.result_rx.recv_timeout(timeout)?;
        self.in_flight = self.in_flight.saturating_sub(1);
        Ok(result)
    }

    /// Requests submitted but not yet received back.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Shut down the thread and wait for it to finish.
    pub fn shutdown(&mut self) {
        let _ = self.request_tx.send(LoadRequest::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn thread_loop(
        source: &dyn DataSource,
        request_rx: &mpsc::Receiver<LoadRequest>,
        result_tx: &mpsc::Sender<LoadResult>,
    ) {
        while let Ok(request) = request_rx.recv() {
            let result = match request {
                LoadRequest::Shutdown => break,
                LoadRequest::PointSet { id, path } => LoadResult::PointSet {
                    result: source::load_point_set(source, id.clone(), &path),
                    id,
                },
                LoadRequest::Field { request, path } => LoadResult::Field {
                    result: source::load_scalar_field(
                        source,
                        request.field.clone(),
                        &path,
                    ),
                    request,
                },
                LoadRequest::Catalogue { path } => LoadResult::Catalogue(
                    source.fetch(&path).map(|b| source::decode_catalogue(&b)),
                ),
            };
            if result_tx.send(result).is_err() {
                break;
            }
        }
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.shutdown();
    }
}
