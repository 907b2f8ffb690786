//! The point exchange: one explicit message round per variable.
//!
//! 1. symmetric count exchange with every rank,
//! 2. query batches to each rank with a non-zero count,
//! 3. each rank evaluates its received batches in ascending origin order,
//! 4. replies travel back in the order the queries arrived.
//!
//! The own-rank batch is evaluated in place. An evaluation failure is held
//! until the round completes so no peer is left waiting for a reply.

use crate::algs::collective::{exchange_counts, exchange_records};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireQueryPoint, WireResponse};
use crate::transfer::{QueryPoint, Response, Sample};
use crate::transfer_error::TransferError;
use std::collections::BTreeSet;

/// Answers gathered for one outgoing point: `(evaluating rank, response)`
/// in ascending rank order.
pub type Answers = Vec<(usize, Response)>;

/// Statistics of one round on this rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// Queries sent to other ranks.
    pub sent: usize,
    /// Queries received from other ranks.
    pub received: usize,
    /// Queries evaluated for this rank's own points.
    pub local: usize,
}

fn to_wire(q: &QueryPoint) -> WireQueryPoint {
    WireQueryPoint::new(&q.point, q.target_problem, q.division)
}

fn from_wire(w: &WireQueryPoint) -> QueryPoint {
    QueryPoint {
        point: w.point(),
        target_problem: w.target_problem(),
        division: w.division(),
    }
}

fn response_to_wire(r: &Response) -> WireResponse {
    WireResponse::new(r.map(|s| (s.value, s.distance, s.source)))
}

fn response_from_wire(w: &WireResponse) -> Response {
    w.get().map(|(value, distance, source)| Sample {
        value,
        distance,
        source,
    })
}

/// Run the round. `routes[i]` lists the ranks that must evaluate
/// `queries[i]`; `evaluate` answers one received batch. Collective.
pub fn exchange_points<C, F>(
    comm: &C,
    tag: CommTag,
    queries: &[QueryPoint],
    routes: &[BTreeSet<usize>],
    mut evaluate: F,
) -> Result<(Vec<Answers>, ExchangeStats), TransferError>
where
    C: Communicator,
    F: FnMut(&[QueryPoint]) -> Result<Vec<Response>, TransferError>,
{
    let (me, size) = (comm.rank(), comm.size());
    debug_assert_eq!(queries.len(), routes.len());

    let mut batches: Vec<Vec<WireQueryPoint>> = vec![Vec::new(); size];
    let mut origin: Vec<Vec<usize>> = vec![Vec::new(); size];
    for (i, (q, ranks)) in queries.iter().zip(routes).enumerate() {
        for &r in ranks {
            batches[r].push(to_wire(q));
            origin[r].push(i);
        }
    }
    let sent_counts: Vec<usize> = batches.iter().map(Vec::len).collect();

    let recv_counts = exchange_counts(comm, tag, &sent_counts)?;
    let received = exchange_records(comm, tag.offset(1), batches, &recv_counts)?;

    let mut deferred = None;
    let mut replies: Vec<Vec<WireResponse>> = Vec::with_capacity(size);
    for batch in &received {
        let points: Vec<QueryPoint> = batch.iter().map(from_wire).collect();
        let answers = if deferred.is_some() {
            vec![None; points.len()]
        } else {
            match evaluate(&points) {
                Ok(answers) if answers.len() == points.len() => answers,
                Ok(answers) => {
                    deferred = Some(TransferError::CommError {
                        neighbor: me,
                        message: format!(
                            "evaluator answered {} of {} points",
                            answers.len(),
                            points.len()
                        ),
                    });
                    vec![None; points.len()]
                }
                Err(e) => {
                    deferred = Some(e);
                    vec![None; points.len()]
                }
            }
        };
        replies.push(answers.iter().map(response_to_wire).collect());
    }

    let returned = exchange_records(comm, tag.offset(2), replies, &sent_counts)?;
    if let Some(err) = deferred {
        return Err(err);
    }

    let mut answers: Vec<Answers> = vec![Vec::new(); queries.len()];
    for (rank, batch) in returned.iter().enumerate() {
        for (k, w) in batch.iter().enumerate() {
            answers[origin[rank][k]].push((rank, response_from_wire(w)));
        }
    }

    let stats = ExchangeStats {
        sent: sent_counts
            .iter()
            .enumerate()
            .filter(|&(r, _)| r != me)
            .map(|(_, n)| n)
            .sum(),
        received: recv_counts
            .iter()
            .enumerate()
            .filter(|&(r, _)| r != me)
            .map(|(_, n)| n)
            .sum(),
        local: sent_counts[me],
    };
    Ok((answers, stats))
}
