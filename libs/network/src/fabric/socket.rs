use super::FabricShared;
use crate::error::{Result, TransportError};
use crate::state::RequestState;
use crate::stats::{StatsSnapshot, TransportStats};
use crate::transport::{
    AcceptFn, CompletionSink, ConnectionId, DefaultRecv, Dispatch, EndpointId, NetCompletion,
    OpId, ProbeInfo, ProbeSpec, RecvPost, RecvTicket, SendPost, Transport,
};
use bytes::Bytes;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

struct PostedRecv {
    id: OpId,
    token: u64,
    connection: Option<ConnectionId>,
    capacity: usize,
    accept: AcceptFn,
}

impl PostedRecv {
    fn accepts(&self, from: ConnectionId, xheader: &[u8]) -> bool {
        self.connection.map_or(true, |c| c == from) && (self.accept)(xheader)
    }
}

struct Generated {
    connection: ConnectionId,
    xheader: Bytes,
    data: Bytes,
}

fn generated_matches(
    spec_conn: Option<ConnectionId>,
    accept: &AcceptFn,
    msg: &Generated,
) -> bool {
    spec_conn.map_or(true, |c| c == msg.connection) && accept(&msg.xheader)
}

#[derive(Default)]
struct Queues {
    posted: VecDeque<PostedRecv>,
    generated: VecDeque<Generated>,
}

pub(crate) struct SocketCore {
    endpoint: EndpointId,
    queues: Mutex<Queues>,
    arrival: Condvar,
    sink: RwLock<Option<Arc<dyn CompletionSink>>>,
    hook: RwLock<Option<Arc<dyn DefaultRecv>>>,
    stats: TransportStats,
    closed: AtomicBool,
}

impl SocketCore {
    pub(crate) fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            queues: Mutex::new(Queues::default()),
            arrival: Condvar::new(),
            sink: RwLock::new(None),
            hook: RwLock::new(None),
            stats: TransportStats::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed {
                endpoint: self.endpoint.0,
            });
        }
        Ok(())
    }

    fn notify(&self, completion: NetCompletion) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.complete(completion),
            None => warn!(
                endpoint = %self.endpoint,
                token = completion.token,
                "completion dropped: no sink installed"
            ),
        }
    }

    fn complete_recv(&self, recv: PostedRecv, from: ConnectionId, xheader: Bytes, data: Bytes) {
        let data_len = data.len();
        let mut state = RequestState::POSTED | RequestState::IO_STARTED | RequestState::DONE;
        let stored = if data_len > recv.capacity {
            state |= RequestState::TRUNCATED;
            data.slice(..recv.capacity)
        } else {
            data
        };
        self.stats.record_receive(data_len);

        self.notify(NetCompletion {
            token: recv.token,
            op: recv.id,
            state,
            connection: Some(from),
            xheader,
            data: stored,
            data_len,
        });
    }

    /// Place an inbound message: posted receives, then the hook, then the generated queue
    fn deliver(&self, from: ConnectionId, xheader: Bytes, data: Bytes) -> Result<()> {
        self.ensure_open()?;
        let mut queues = self.queues.lock();

        let matched = queues
            .posted
            .iter()
            .position(|recv| recv.accepts(from, &xheader))
            .and_then(|pos| queues.posted.remove(pos));
        if let Some(recv) = matched {
            drop(queues);
            trace!(endpoint = %self.endpoint, %from, "delivered to posted receive");
            self.complete_recv(recv, from, xheader, data);
            return Ok(());
        }

        // Hook runs under the queue lock so a receive posted concurrently
        // cannot miss a message the hook declined
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            if hook.dispatch(from, &xheader, &data) == Dispatch::Consumed {
                self.stats.record_dispatch();
                self.stats.record_receive(data.len());
                return Ok(());
            }
        }

        queues.generated.push_back(Generated {
            connection: from,
            xheader,
            data,
        });
        self.stats.set_unexpected_depth(queues.generated.len());
        trace!(
            endpoint = %self.endpoint,
            %from,
            depth = queues.generated.len(),
            "queued unexpected"
        );
        self.arrival.notify_all();
        Ok(())
    }

    fn find(&self, queues: &Queues, spec: &ProbeSpec) -> Option<ProbeInfo> {
        queues
            .generated
            .iter()
            .find(|msg| generated_matches(spec.connection, &spec.accept, msg))
            .map(|msg| ProbeInfo {
                connection: msg.connection,
                xheader: msg.xheader.clone(),
                data_len: msg.data.len(),
            })
    }
}

/// One process's socket on a [`Fabric`](super::Fabric)
pub struct FabricSocket {
    core: Arc<SocketCore>,
    fabric: Arc<FabricShared>,
}

impl FabricSocket {
    pub(crate) fn new(core: Arc<SocketCore>, fabric: Arc<FabricShared>) -> Self {
        Self { core, fabric }
    }

    pub fn endpoint(&self) -> EndpointId {
        self.core.endpoint
    }

    /// Close the socket: posted receives are canceled, later operations fail
    pub fn close(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let drained: Vec<PostedRecv> = {
            let mut queues = self.core.queues.lock();
            queues.generated.clear();
            self.core.stats.set_unexpected_depth(0);
            queues.posted.drain(..).collect()
        };
        self.core.arrival.notify_all();
        for recv in drained {
            self.core.stats.record_cancel();
            self.core.notify(canceled(recv));
        }
        debug!(endpoint = %self.core.endpoint, "fabric socket closed");
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::Acquire)
    }

    /// Messages waiting in the generated queue
    pub fn unexpected_len(&self) -> usize {
        self.core.queues.lock().generated.len()
    }

    /// Receives waiting in the posted queue
    pub fn posted_len(&self) -> usize {
        self.core.queues.lock().posted.len()
    }
}

fn canceled(recv: PostedRecv) -> NetCompletion {
    NetCompletion {
        token: recv.token,
        op: recv.id,
        state: RequestState::POSTED | RequestState::DONE | RequestState::CANCELED,
        connection: recv.connection,
        xheader: Bytes::new(),
        data: Bytes::new(),
        data_len: 0,
    }
}

impl Transport for FabricSocket {
    fn local_endpoint(&self) -> EndpointId {
        self.core.endpoint
    }

    fn connect(&self, remote: EndpointId) -> Result<ConnectionId> {
        self.fabric.socket(remote)?;
        Ok(ConnectionId(remote))
    }

    fn set_completion_sink(&self, sink: Arc<dyn CompletionSink>) {
        *self.core.sink.write() = Some(sink);
    }

    fn post_send(&self, post: SendPost) -> Result<OpId> {
        self.core.ensure_open()?;
        let target = self.fabric.socket(post.connection.remote())?;
        let op = OpId(self.fabric.next_op());
        let data_len = post.data.len();

        target.deliver(
            ConnectionId(self.core.endpoint),
            post.xheader.clone(),
            post.data,
        )?;
        self.core.stats.record_send(data_len);

        self.core.notify(NetCompletion {
            token: post.token,
            op,
            state: RequestState::POSTED | RequestState::IO_STARTED | RequestState::DONE,
            connection: Some(post.connection),
            xheader: post.xheader,
            data: Bytes::new(),
            data_len,
        });
        Ok(op)
    }

    fn post_recv(&self, post: RecvPost) -> Result<RecvTicket> {
        self.core.ensure_open()?;
        let id = OpId(self.fabric.next_op());
        let mut queues = self.core.queues.lock();

        let found = queues
            .generated
            .iter()
            .position(|msg| generated_matches(post.connection, &post.accept, msg))
            .and_then(|pos| queues.generated.remove(pos));

        match found {
            Some(msg) => {
                self.core.stats.set_unexpected_depth(queues.generated.len());
                drop(queues);
                let recv = PostedRecv {
                    id,
                    token: post.token,
                    connection: post.connection,
                    capacity: post.capacity,
                    accept: post.accept,
                };
                self.core.complete_recv(recv, msg.connection, msg.xheader, msg.data);
                Ok(RecvTicket { id, started: true })
            }
            None => {
                queues.posted.push_back(PostedRecv {
                    id,
                    token: post.token,
                    connection: post.connection,
                    capacity: post.capacity,
                    accept: post.accept,
                });
                Ok(RecvTicket { id, started: false })
            }
        }
    }

    fn probe(&self, spec: &ProbeSpec, timeout: Duration) -> Result<Option<ProbeInfo>> {
        let deadline = Instant::now() + timeout;
        let mut queues = self.core.queues.lock();
        loop {
            if let Some(info) = self.core.find(&queues, spec) {
                return Ok(Some(info));
            }
            self.core.ensure_open()?;
            if self
                .core
                .arrival
                .wait_until(&mut queues, deadline)
                .timed_out()
            {
                return Ok(self.core.find(&queues, spec));
            }
        }
    }

    fn iprobe(&self, spec: &ProbeSpec) -> Result<Option<ProbeInfo>> {
        self.core.ensure_open()?;
        let queues = self.core.queues.lock();
        Ok(self.core.find(&queues, spec))
    }

    fn cancel_recv(&self, id: OpId) -> bool {
        let removed = {
            let mut queues = self.core.queues.lock();
            queues
                .posted
                .iter()
                .position(|recv| recv.id == id)
                .and_then(|pos| queues.posted.remove(pos))
        };
        match removed {
            Some(recv) => {
                self.core.stats.record_cancel();
                self.core.notify(canceled(recv));
                true
            }
            None => false,
        }
    }

    fn set_default_recv(&self, hook: Arc<dyn DefaultRecv>) -> Result<()> {
        let mut slot = self.core.hook.write();
        if let Some(existing) = slot.as_ref() {
            let same = Arc::as_ptr(existing) as *const () == Arc::as_ptr(&hook) as *const ();
            if !same {
                return Err(TransportError::HookAlreadyRegistered {
                    endpoint: self.core.endpoint.0,
                });
            }
        }
        *slot = Some(hook);
        Ok(())
    }

    fn clear_default_recv(&self) {
        *self.core.hook.write() = None;
    }

    fn stats(&self) -> StatsSnapshot {
        self.core.stats.snapshot()
    }
}
