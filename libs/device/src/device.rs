//! Device context object
//!
//! A [`Device`] is one process's view of the point-to-point engine: its
//! transport socket, world communicator, request arena and event channel.
//! Every entry point takes `&self`; engine state sits behind one mutex and is
//! only touched by the calling thread while it drives progress.
//!
//! Progress is polled. `wait`, `test`, `probe` and `iprobe` drain the event
//! channel fed by the transport's completion sink and the receive router, and
//! apply each event under the engine lock.

use crate::comm::Communicator;
use crate::engine::{Completion, Engine};
use crate::error::{DeviceError, Result};
use crate::event::{ControlEvent, DeviceEvent, EventSink};
use crate::p2p::Envelope;
use crate::request::RequestHandle;
use crate::router::{self, LoggingRmaHandler, ReceiveRouter, RmaHandler};
use codec::{Datatype, DatatypeEngine, PackService};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use device_config::DeviceConfig;
use network::{EndpointId, StatsSnapshot, Transport, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use types::{MessageType, Status, WireHeader};

/// Context id of the world communicator
const WORLD_CONTEXT_ID: u32 = 0;

/// Each communicator reserves two ids: its own and the collective offset
const CONTEXT_STRIDE: u32 = 2;

/// Outcome of [`Device::finalize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeReport {
    /// Transport receives withdrawn because they never matched in time
    pub cancelled: usize,
    /// Requests the application never waited on or freed
    pub unreleased: usize,
}

/// Builder wiring a transport socket into a [`Device`]
pub struct DeviceBuilder {
    transport: Arc<dyn Transport>,
    endpoints: Vec<EndpointId>,
    config: DeviceConfig,
    pack: Arc<dyn PackService>,
    rma: Arc<dyn RmaHandler>,
}

impl DeviceBuilder {
    /// `endpoints` lists every process in world-rank order
    pub fn new(transport: Arc<dyn Transport>, endpoints: Vec<EndpointId>) -> Self {
        Self {
            transport,
            endpoints,
            config: DeviceConfig::default(),
            pack: Arc::new(DatatypeEngine::new()),
            rma: Arc::new(LoggingRmaHandler),
        }
    }

    pub fn config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pack_service(mut self, pack: Arc<dyn PackService>) -> Self {
        self.pack = pack;
        self
    }

    pub fn rma_handler(mut self, rma: Arc<dyn RmaHandler>) -> Self {
        self.rma = rma;
        self
    }

    /// Connect to every endpoint and register the receive router
    pub fn init(self) -> Result<Device> {
        self.config
            .validate()
            .map_err(|err| DeviceError::arg(format!("{:#}", err)))?;

        let local = self.transport.local_endpoint();
        let rank = self
            .endpoints
            .iter()
            .position(|ep| *ep == local)
            .ok_or_else(|| {
                DeviceError::arg(format!("local endpoint {} not in endpoint table", local))
            })?;
        let connections = self
            .endpoints
            .iter()
            .map(|ep| self.transport.connect(*ep))
            .collect::<network::Result<Vec<_>>>()?;

        let (tx, events) = unbounded();
        self.transport
            .set_completion_sink(Arc::new(EventSink::new(tx.clone())));
        let router = Arc::new(ReceiveRouter::new(tx));

        let world = Communicator::new(rank as i32, WORLD_CONTEXT_ID, connections);
        let engine = Engine::new(
            self.transport.clone(),
            self.pack,
            self.config.device.max_requests,
        );
        let device = Device {
            engine: Mutex::new(engine),
            events,
            transport: self.transport,
            router,
            rma: self.rma,
            world,
            poll: self.config.device.progress_poll(),
            finalize_timeout: self.config.device.finalize_timeout(),
            next_context: AtomicU32::new(WORLD_CONTEXT_ID + CONTEXT_STRIDE),
            finalized: AtomicBool::new(false),
        };
        device.enable_receive_dispatch()?;

        info!(
            rank,
            size = device.world.size(),
            endpoint = %local,
            max_requests = self.config.device.max_requests,
            "device initialized"
        );
        Ok(device)
    }
}

/// Point-to-point engine of one process
pub struct Device {
    engine: Mutex<Engine>,
    events: Receiver<DeviceEvent>,
    transport: Arc<dyn Transport>,
    router: Arc<ReceiveRouter>,
    rma: Arc<dyn RmaHandler>,
    world: Communicator,
    poll: Duration,
    finalize_timeout: Duration,
    next_context: AtomicU32,
    finalized: AtomicBool,
}

impl Device {
    pub fn world(&self) -> &Communicator {
        &self.world
    }

    pub fn rank(&self) -> i32 {
        self.world.rank()
    }

    pub fn size(&self) -> i32 {
        self.world.size()
    }

    /// Install the receive router as the transport's default-receive hook
    ///
    /// Repeating the call is harmless. A hook installed by anyone else is
    /// an argument error.
    pub fn enable_receive_dispatch(&self) -> Result<()> {
        self.transport
            .set_default_recv(self.router.clone())
            .map_err(|err| match err {
                TransportError::HookAlreadyRegistered { .. } => DeviceError::arg(err.to_string()),
                other => other.into(),
            })
    }

    /// New communicator over the same group with a fresh context id
    ///
    /// Ids are handed out in call order, so ranks issuing the same sequence
    /// of `dup` calls agree without communicating.
    pub fn dup(&self, comm: &Communicator) -> Result<Communicator> {
        self.ensure_active()?;
        let context_id = self.next_context.fetch_add(CONTEXT_STRIDE, Ordering::Relaxed);
        debug!(context_id, parent = comm.context_id(), "communicator duplicated");
        Ok(comm.derive(context_id))
    }

    pub fn isend(
        &self,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        dest: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<RequestHandle> {
        self.start_send(buf, count, datatype, dest, tag, comm, MessageType::Data)
    }

    /// Synchronous send: completes only after the receiver matched it
    pub fn issend(
        &self,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        dest: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<RequestHandle> {
        self.start_send(buf, count, datatype, dest, tag, comm, MessageType::DataRequestAck)
    }

    #[allow(clippy::too_many_arguments)]
    fn start_send(
        &self,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        dest: i32,
        tag: i32,
        comm: &Communicator,
        msg_type: MessageType,
    ) -> Result<RequestHandle> {
        self.ensure_active()?;
        let env = Envelope {
            comm,
            peer: dest,
            tag,
        };
        self.engine
            .lock()
            .start_send(env, buf, count, datatype, msg_type)
    }

    /// Post a receive into `buf`, which is handed back on completion
    pub fn irecv(
        &self,
        buf: Vec<u8>,
        count: usize,
        datatype: &Datatype,
        source: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<RequestHandle> {
        self.ensure_active()?;
        let env = Envelope {
            comm,
            peer: source,
            tag,
        };
        self.engine.lock().start_recv(env, buf, count, datatype)
    }

    pub fn send(
        &self,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        dest: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<Status> {
        let handle = self.isend(buf, count, datatype, dest, tag, comm)?;
        self.wait(handle).map(|done| done.status)
    }

    pub fn ssend(
        &self,
        buf: &[u8],
        count: usize,
        datatype: &Datatype,
        dest: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<Status> {
        let handle = self.issend(buf, count, datatype, dest, tag, comm)?;
        self.wait(handle).map(|done| done.status)
    }

    pub fn recv(
        &self,
        buf: Vec<u8>,
        count: usize,
        datatype: &Datatype,
        source: i32,
        tag: i32,
        comm: &Communicator,
    ) -> Result<Completion> {
        let handle = self.irecv(buf, count, datatype, source, tag, comm)?;
        self.wait(handle)
    }

    /// Block until the request completes, then release it
    pub fn wait(&self, handle: RequestHandle) -> Result<Completion> {
        loop {
            self.progress();
            if let Some(done) = self.engine.lock().take_completed(handle)? {
                return Ok(done);
            }
            if self.is_finalized() && self.engine.lock().outstanding_ops() == 0 {
                return Err(DeviceError::Finalized);
            }
            self.poll_event()?;
        }
    }

    /// Complete and release the request if it is done
    pub fn test(&self, handle: RequestHandle) -> Result<Option<Completion>> {
        self.progress();
        self.engine.lock().take_completed(handle)
    }

    /// Wait for every request; the first failure is reported after all finish
    pub fn wait_all(&self, handles: &[RequestHandle]) -> Result<Vec<Completion>> {
        let mut done = Vec::with_capacity(handles.len());
        let mut first_err = None;
        for handle in handles {
            match self.wait(*handle) {
                Ok(completion) => done.push(completion),
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(done),
        }
    }

    /// Ask for cancellation; check `status.cancelled` after waiting
    pub fn cancel(&self, handle: RequestHandle) -> Result<()> {
        self.engine.lock().cancel(handle)
    }

    /// Give up the handle; the request still runs to completion
    pub fn request_free(&self, handle: RequestHandle) -> Result<()> {
        self.engine.lock().request_free(handle)
    }

    /// Block until a matching message is queued, without receiving it
    pub fn probe(&self, source: i32, tag: i32, comm: &Communicator) -> Result<Status> {
        let env = Envelope {
            comm,
            peer: source,
            tag,
        };
        let Some(spec) = Engine::probe_spec(env, "probe")? else {
            return Ok(Status::null());
        };
        loop {
            self.ensure_active()?;
            self.progress();
            if let Some(info) = self.transport.probe(&spec, self.poll)? {
                return Ok(probe_status(&info));
            }
        }
    }

    /// Check once for a matching queued message
    pub fn iprobe(&self, source: i32, tag: i32, comm: &Communicator) -> Result<Option<Status>> {
        let env = Envelope {
            comm,
            peer: source,
            tag,
        };
        let Some(spec) = Engine::probe_spec(env, "iprobe")? else {
            return Ok(Some(Status::null()));
        };
        self.ensure_active()?;
        self.progress();
        Ok(self.transport.iprobe(&spec)?.map(|info| probe_status(&info)))
    }

    /// Apply every pending event; returns how many were handled
    pub fn progress(&self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            handled += 1;
        }
        handled
    }

    fn poll_event(&self) -> Result<()> {
        match self.events.recv_timeout(self.poll) {
            Ok(event) => {
                self.apply(event);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::fatal("event channel closed")),
        }
    }

    fn apply(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Completion(completion) => self.engine.lock().on_completion(completion),
            DeviceEvent::Control(ControlEvent::CancelRequest { connection, header }) => {
                self.engine.lock().on_cancel_request(connection, header)
            }
            DeviceEvent::Control(ControlEvent::Rma {
                connection,
                request,
                data,
            }) => router::forward_rma(self.rma.as_ref(), connection, request, &data),
        }
    }

    /// Drain outstanding work, withdraw what is left and detach from the transport
    pub fn finalize(&self) -> Result<FinalizeReport> {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return Err(DeviceError::Finalized);
        }

        let deadline = Instant::now() + self.finalize_timeout;
        loop {
            self.progress();
            let in_flight = self.engine.lock().requests.in_flight();
            if in_flight == 0 {
                break;
            }
            if Instant::now() >= deadline {
                warn!(in_flight, "finalize timeout, cancelling outstanding receives");
                break;
            }
            self.poll_event()?;
        }

        let cancelled = self.engine.lock().cancel_outstanding();
        self.progress();
        self.transport.clear_default_recv();

        let unreleased = self.engine.lock().requests.len();
        info!(rank = self.rank(), cancelled, unreleased, "device finalized");
        Ok(FinalizeReport {
            cancelled,
            unreleased,
        })
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(DeviceError::Finalized);
        }
        Ok(())
    }

    /// Transport counters of this process's socket
    pub fn stats(&self) -> StatsSnapshot {
        self.transport.stats()
    }

    /// Requests currently held in the arena
    pub fn request_count(&self) -> usize {
        self.engine.lock().requests.len()
    }

    /// Receives waiting for a message and sends waiting for an ack
    pub fn pending_counts(&self) -> (usize, usize) {
        let engine = self.engine.lock();
        (engine.requests.posted_len(), engine.requests.awaiting_ack_len())
    }
}

fn probe_status(info: &network::ProbeInfo) -> Status {
    let mut status = Status::null();
    if let Some(header) = WireHeader::peek(&info.xheader) {
        status.source = header.src_rank;
        status.tag = header.tag;
    }
    status.count = info.data_len;
    status
}
