//! One serial lane per request kind.
//!
//! Each lane is a dedicated thread draining an unbounded channel, started the
//! first time a request of that kind arrives. Requests in a lane run one at a
//! time in arrival order; the two lanes run independently of each other.

use crate::engine::RequestEngine;
use crate::request::{Request, RequestKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Accepts requests for direct transport.
pub trait RequestSink: Send + Sync {
    fn enqueue(&self, request: Box<dyn Request>);
}

struct Lane {
    sender: UnboundedSender<Box<dyn Request>>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Lanes {
    slots: [Option<Lane>; 2],
    closed: bool,
}

pub struct QueueDispatcher {
    engine: Arc<RequestEngine>,
    lanes: Mutex<Lanes>,
}

impl QueueDispatcher {
    pub fn new(engine: Arc<RequestEngine>) -> Self {
        Self { engine, lanes: Mutex::new(Lanes::default()) }
    }

    pub fn engine(&self) -> &Arc<RequestEngine> {
        &self.engine
    }

    /// Kinds whose worker has been started.
    pub fn active_lanes(&self) -> Vec<RequestKind> {
        let lanes = self.lock();
        RequestKind::ALL.into_iter().filter(|kind| lanes.slots[kind.index()].is_some()).collect()
    }

    /// Stops accepting work and waits for the workers to drain their inboxes.
    /// Requests offered afterwards run on the caller's thread.
    pub fn close(&self) {
        let taken: Vec<Lane> = {
            let mut lanes = self.lock();
            lanes.closed = true;
            lanes.slots.iter_mut().filter_map(Option::take).collect()
        };
        for Lane { sender, worker } in taken {
            drop(sender);
            if worker.join().is_err() {
                log::error!("queue: worker panicked before shutdown");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_lane(&self, kind: RequestKind) -> std::io::Result<Lane> {
        let (sender, receiver) = unbounded_channel();
        let engine = Arc::clone(&self.engine);
        let worker = thread::Builder::new()
            .name(format!("mms-queue-{kind}"))
            .spawn(move || lane_worker(kind, engine, receiver))?;
        log::debug!("queue({kind}): worker started");
        Ok(Lane { sender, worker })
    }

    /// Hands the request to its lane, starting or restarting the worker as
    /// needed. Gives the request back if no lane can take it.
    fn dispatch(&self, request: Box<dyn Request>) -> Result<(), Box<dyn Request>> {
        let kind = request.kind();
        let mut lanes = self.lock();
        if lanes.closed {
            log::warn!("queue({kind}): dispatcher closed");
            return Err(request);
        }

        let mut request = request;
        for _ in 0..2 {
            let slot = &mut lanes.slots[kind.index()];
            if slot.is_none() {
                match self.spawn_lane(kind) {
                    Ok(lane) => *slot = Some(lane),
                    Err(err) => {
                        log::error!("queue({kind}): failed to spawn worker: {err}");
                        return Err(request);
                    }
                }
            }
            let Some(lane) = slot.as_ref() else {
                return Err(request);
            };
            match lane.sender.send(request) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    log::error!("queue({kind}): worker gone, restarting");
                    request = returned.0;
                    *slot = None;
                }
            }
        }
        Err(request)
    }
}

impl RequestSink for QueueDispatcher {
    fn enqueue(&self, request: Box<dyn Request>) {
        if let Err(mut request) = self.dispatch(request) {
            log::warn!("queue({}): executing request inline", request.kind());
            self.engine.execute(&mut *request);
        }
    }
}

fn lane_worker(
    kind: RequestKind,
    engine: Arc<RequestEngine>,
    mut receiver: UnboundedReceiver<Box<dyn Request>>,
) {
    while let Some(mut request) = receiver.blocking_recv() {
        log::debug!("queue({kind}): executing request for {}", request.core().subscription());
        engine.execute(&mut *request);
    }
    log::debug!("queue({kind}): inbox closed, worker exiting");
}
