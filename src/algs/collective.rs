//! Collective building blocks over a [`Communicator`].
//!
//! Every function here must be called by all ranks of the world with the
//! same tag. Sends are posted before receives (MPI receives complete
//! eagerly) and every handle is drained before returning, even on error.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, cast_slice, decode_exact};
use crate::transfer_error::TransferError;
use bytemuck::Pod;
use std::mem::size_of;

/// Symmetric count exchange: `outgoing[r]` items go to rank `r`; returns
/// how many items each rank will send here. The own-rank entry is copied.
pub fn exchange_counts<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &[usize],
) -> Result<Vec<usize>, TransferError> {
    let (me, size) = (comm.rank(), comm.size());
    debug_assert_eq!(outgoing.len(), size);

    let mut pending_sends = Vec::with_capacity(size.saturating_sub(1));
    for (peer, &n) in outgoing.iter().enumerate() {
        if peer != me {
            let count = WireCount::new(n);
            pending_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(&[count])));
        }
    }

    let mut incoming = vec![0usize; size];
    incoming[me] = outgoing[me];
    let mut maybe_err = None;
    let recvs: Vec<_> = (0..size)
        .filter(|&peer| peer != me)
        .map(|peer| (peer, comm.irecv(peer, tag.as_u16(), size_of::<WireCount>())))
        .collect();
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) => match decode_exact::<WireCount>(&data, 1) {
                Ok(c) => incoming[peer] = c[0].get(),
                Err(e) => {
                    maybe_err.get_or_insert(TransferError::CommError {
                        neighbor: peer,
                        message: e.to_string(),
                    });
                }
            },
            None => {
                maybe_err.get_or_insert(TransferError::CommError {
                    neighbor: peer,
                    message: "failed to receive count".into(),
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(incoming),
    }
}

/// Ship `outgoing[r]` to every rank `r` and collect `incoming_counts[r]`
/// records from each. Empty batches are not sent; the own-rank batch is
/// moved through without messaging.
pub fn exchange_records<C: Communicator, T: Pod>(
    comm: &C,
    tag: CommTag,
    mut outgoing: Vec<Vec<T>>,
    incoming_counts: &[usize],
) -> Result<Vec<Vec<T>>, TransferError> {
    let (me, size) = (comm.rank(), comm.size());
    debug_assert_eq!(outgoing.len(), size);
    debug_assert_eq!(incoming_counts.len(), size);

    let mut pending_sends = Vec::new();
    for (peer, batch) in outgoing.iter().enumerate() {
        if peer != me && !batch.is_empty() {
            pending_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(batch)));
        }
    }

    let mut incoming: Vec<Vec<T>> = vec![Vec::new(); size];
    incoming[me] = std::mem::take(&mut outgoing[me]);
    let mut maybe_err = None;
    let recvs: Vec<_> = (0..size)
        .filter(|&peer| peer != me && incoming_counts[peer] > 0)
        .map(|peer| {
            let len = incoming_counts[peer] * size_of::<T>();
            (peer, comm.irecv(peer, tag.as_u16(), len))
        })
        .collect();
    for (peer, h) in recvs {
        let result = h
            .wait()
            .ok_or_else(|| TransferError::CommError {
                neighbor: peer,
                message: "failed to receive batch".into(),
            })
            .and_then(|data| decode_exact::<T>(&data, incoming_counts[peer]));
        match result {
            Ok(batch) => incoming[peer] = batch,
            Err(e) => {
                maybe_err.get_or_insert(match e {
                    TransferError::WireLength { .. } => TransferError::CommError {
                        neighbor: peer,
                        message: e.to_string(),
                    },
                    other => other,
                });
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(incoming),
    }
}

/// Every rank's `local` records, indexed by rank.
pub fn all_gather<C: Communicator, T: Pod>(
    comm: &C,
    tag: CommTag,
    local: &[T],
) -> Result<Vec<Vec<T>>, TransferError> {
    let size = comm.size();
    let counts = exchange_counts(comm, tag, &vec![local.len(); size])?;
    exchange_records(comm, tag.offset(1), vec![local.to_vec(); size], &counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{LocalComm, NoComm};

    #[test]
    fn serial_all_gather_is_identity() {
        let got = all_gather(&NoComm, CommTag::new(0x10), &[WireCount::new(5)]).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0][0].get(), 5);
    }

    #[test]
    fn three_rank_all_gather_and_exchange() {
        let world = LocalComm::world(3);
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = world
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let me = comm.rank();
                        let local: Vec<_> = (0..=me).map(WireCount::new).collect();
                        let gathered = all_gather(comm, CommTag::new(0x20), &local).unwrap();

                        // Rank r sends r + peer records to each peer.
                        let outgoing: Vec<Vec<WireCount>> = (0..3)
                            .map(|peer| vec![WireCount::new(10 * me + peer); me + peer])
                            .collect();
                        let sizes: Vec<usize> = outgoing.iter().map(Vec::len).collect();
                        let counts = exchange_counts(comm, CommTag::new(0x30), &sizes).unwrap();
                        let got =
                            exchange_records(comm, CommTag::new(0x31), outgoing, &counts).unwrap();
                        (gathered, got)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (me, (gathered, got)) in results.iter().enumerate() {
            let lens: Vec<usize> = gathered.iter().map(Vec::len).collect();
            assert_eq!(lens, vec![1, 2, 3]);
            for (peer, batch) in got.iter().enumerate() {
                assert_eq!(batch.len(), me + peer);
                assert!(batch.iter().all(|c| c.get() == 10 * peer + me));
            }
        }
    }
}
