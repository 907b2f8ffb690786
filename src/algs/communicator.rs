//! Thin façade over in-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices*. All handles are **waitable** but
//! non-blocking; the collective helpers call `.wait()` before they trust a
//! buffer. Messages between one `(source, destination, tag)` triple are
//! delivered in send order.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Message tag namespace. Each collective step derives its own tag from a
/// base with [`CommTag::offset`] so steps never consume each other's messages.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

/// Non-blocking point-to-point communication.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `len` bytes. The delivered message may differ in
    /// length; callers validate it.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank communicator; there is never a peer to talk to.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}
}

// --- LocalComm: ranks as threads of one process ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

/// Delivery counter; receivers sleep on it instead of spinning.
#[derive(Debug, Default)]
struct Doorbell {
    rings: Mutex<u64>,
    ringing: Condvar,
}

impl Doorbell {
    fn ring(&self) {
        *self.rings.lock() += 1;
        self.ringing.notify_all();
    }

    fn rings(&self) -> u64 {
        *self.rings.lock()
    }

    /// Sleep until a delivery after the one counted as `seen`.
    fn wait_past(&self, seen: u64) {
        let mut rings = self.rings.lock();
        while *rings == seen {
            self.ringing.wait(&mut rings);
        }
    }
}

/// One rank of an in-process world. Ranks of the same world share a
/// mailbox; separate worlds never see each other's messages.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    doorbell: Arc<Doorbell>,
}

impl LocalComm {
    /// All `size` ranks of a fresh world, in rank order.
    pub fn world(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::new());
        let doorbell = Arc::new(Doorbell::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
                doorbell: Arc::clone(&doorbell),
            })
            .collect()
    }
}

pub struct LocalRecv {
    key: Key,
    mailbox: Arc<Mailbox>,
    doorbell: Arc<Doorbell>,
}

impl Wait for LocalRecv {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            // Read the counter first so a delivery racing the check below
            // cannot be missed.
            let seen = self.doorbell.rings();
            if let Some(mut queue) = self.mailbox.get_mut(&self.key) {
                if let Some(bytes) = queue.pop_front() {
                    return Some(bytes.to_vec());
                }
            }
            self.doorbell.wait_past(seen);
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        self.doorbell.ring();
    }

    fn irecv(&self, peer: usize, tag: u16, _len: usize) -> LocalRecv {
        LocalRecv {
            key: (peer, self.rank, tag),
            mailbox: Arc::clone(&self.mailbox),
            doorbell: Arc::clone(&self.doorbell),
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::environment::Universe;
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::{Request, StaticScope};
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    pub struct MpiComm {
        _universe: Option<Universe>,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialise MPI and wrap `MPI_COMM_WORLD`. Returns `None` when MPI
        /// was already initialised elsewhere.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            Some(Self {
                rank: world.rank() as usize,
                size: world.size() as usize,
                world,
                _universe: Some(universe),
            })
        }
    }

    /// Pending send; the buffer is leaked for the `'static` request and
    /// reclaimed on completion.
    pub struct MpiSend {
        request: Request<'static, [u8], StaticScope>,
        buffer: *mut [u8],
    }

    impl Wait for MpiSend {
        fn wait(self) -> Option<Vec<u8>> {
            self.request.wait();
            // SAFETY: the request completed, so MPI no longer reads the
            // buffer and this is the only remaining owner.
            drop(unsafe { Box::from_raw(self.buffer) });
            None
        }
    }

    /// Completed receive. MPI receives finish eagerly inside `irecv`, which
    /// is why the collectives post every send before their receives.
    pub struct MpiRecv(Vec<u8>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            Some(self.0)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiSend;
        type RecvHandle = MpiRecv;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
            let buffer: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let raw: *mut [u8] = buffer;
            // SAFETY: `raw` stays alive until `MpiSend::wait` reclaims it.
            let shared: &'static [u8] = unsafe { &*raw };
            let request = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, shared, tag as i32);
            MpiSend {
                request,
                buffer: raw,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, _len: usize) -> MpiRecv {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(tag as i32);
            MpiRecv(data)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
