//! The global incumbent: the single authoritative best node of a search.
//!
//! [`Incumbent`] holds the apply-if-better logic. [`IncumbentActor`] runs it
//! on its own thread behind a mailbox, so updates from every locality are
//! serialized without shared memory; callers talk to it through an
//! [`IncumbentHandle`].

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use bnbforge_core::{BnbError, Objective, Result, SearchNode};

/// Stream of accepted improvements as (node, bound) pairs.
pub type ImprovementSender<N> = UnboundedSender<(N, <N as SearchNode>::Bound)>;

/// Best known node under a fixed objective.
#[derive(Debug)]
pub struct Incumbent<N: SearchNode> {
    objective: Objective,
    best: N,
    improvements: Option<ImprovementSender<N>>,
}

impl<N: SearchNode> Incumbent<N> {
    /// Creates an incumbent seeded with `seed`.
    pub fn new(objective: Objective, seed: N) -> Self {
        Self {
            objective,
            best: seed,
            improvements: None,
        }
    }

    /// Forwards every accepted improvement to `sender`.
    pub fn with_improvement_sender(mut self, sender: ImprovementSender<N>) -> Self {
        self.improvements = Some(sender);
        self
    }

    /// Replaces the best node if `candidate` is strictly better.
    ///
    /// Stale or equal candidates are dropped. Returns true if accepted.
    pub fn update(&mut self, candidate: N) -> bool {
        let bound = candidate.objective();
        if !self.objective.is_better(bound, self.best.objective()) {
            return false;
        }
        if let Some(sender) = &self.improvements {
            // A dropped receiver just means nobody is listening anymore.
            let _ = sender.send((candidate.clone(), bound));
        }
        self.best = candidate;
        true
    }

    /// Returns the best node.
    pub fn best(&self) -> &N {
        &self.best
    }

    /// Returns the bound of the best node.
    pub fn bound(&self) -> N::Bound {
        self.best.objective()
    }

    /// Consumes the incumbent, returning the best node.
    pub fn into_best(self) -> N {
        self.best
    }
}

enum IncumbentMessage<N> {
    Update(N),
    Get(Sender<N>),
    Stop,
}

/// Address of a running incumbent actor.
pub struct IncumbentHandle<N: SearchNode> {
    tx: Sender<IncumbentMessage<N>>,
}

impl<N: SearchNode> Clone for IncumbentHandle<N> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<N: SearchNode> std::fmt::Debug for IncumbentHandle<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncumbentHandle").finish_non_exhaustive()
    }
}

impl<N: SearchNode> IncumbentHandle<N> {
    /// Submits a candidate. Returns without waiting for the comparison.
    pub fn update(&self, candidate: N) -> Result<()> {
        self.tx
            .send(IncumbentMessage::Update(candidate))
            .map_err(|_| BnbError::IncumbentUnavailable)
    }

    /// Reads the current best node.
    ///
    /// Updates sent before this call, from any thread that happens-before
    /// it, are applied first.
    pub fn get(&self) -> Result<N> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.tx
            .send(IncumbentMessage::Get(reply_tx))
            .map_err(|_| BnbError::IncumbentUnavailable)?;
        reply_rx.recv().map_err(|_| BnbError::IncumbentUnavailable)
    }

    fn stop(&self) {
        let _ = self.tx.send(IncumbentMessage::Stop);
    }
}

/// Thread hosting an [`Incumbent`].
#[derive(Debug)]
pub struct IncumbentActor<N: SearchNode> {
    handle: IncumbentHandle<N>,
    thread: JoinHandle<N>,
}

impl<N: SearchNode> IncumbentActor<N> {
    /// Starts an actor owning `incumbent`.
    pub fn spawn(incumbent: Incumbent<N>) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let thread = thread::Builder::new()
            .name("bnb-incumbent".to_string())
            .spawn(move || run(incumbent, rx))
            .map_err(|e| BnbError::Runtime(e.to_string()))?;
        Ok(Self {
            handle: IncumbentHandle { tx },
            thread,
        })
    }

    /// Returns a handle for sending updates and queries.
    pub fn handle(&self) -> IncumbentHandle<N> {
        self.handle.clone()
    }

    /// Stops the actor after draining queued messages and returns the best
    /// node.
    pub fn shutdown(self) -> Result<N> {
        self.handle.stop();
        self.thread
            .join()
            .map_err(|_| BnbError::IncumbentUnavailable)
    }
}

fn run<N: SearchNode>(mut incumbent: Incumbent<N>, rx: Receiver<IncumbentMessage<N>>) -> N {
    for message in rx.iter() {
        match message {
            IncumbentMessage::Update(candidate) => {
                if incumbent.update(candidate) {
                    debug!(event = "incumbent_improved", bound = ?incumbent.bound());
                }
            }
            IncumbentMessage::Get(reply) => {
                let _ = reply.send(incumbent.best().clone());
            }
            IncumbentMessage::Stop => break,
        }
    }
    incumbent.into_best()
}
