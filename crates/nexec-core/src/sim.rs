//! In-process transports for tests and the CLI simulator.
//!
//! [`ScriptedTransport`] replays queued outcomes and records every call;
//! [`FlakyTransport`] draws faults from a seeded random source.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use crate::node::{Node, NodeId};
use crate::request::{ChunkInfo, Request};
use crate::transport::{ItemStream, RawOutcome, StreamItem, Transport, TransportError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One recorded `send`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub node: NodeId,
    pub request: Request,
}

struct Scripted {
    delay: Duration,
    outcome: RawOutcome,
}

type FeedItem = Result<StreamItem, TransportError>;

enum ScriptedStream {
    Feed(mpsc::UnboundedReceiver<FeedItem>),
    Fail(TransportError),
}

/// Transport that answers from a queue.
///
/// Each `send` pops the next outcome; once the queue is empty every send
/// gets the fallback (success by default).
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<RawOutcome>,
    calls: Mutex<Vec<Call>>,
    streams: Mutex<VecDeque<ScriptedStream>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            outcomes: Mutex::default(),
            fallback: Mutex::new(RawOutcome::ok("ok")),
            calls: Mutex::default(),
            streams: Mutex::default(),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = RawOutcome>) -> Self {
        let t = Self::new();
        for outcome in outcomes {
            t.push(outcome);
        }
        t
    }

    pub fn with_fallback(self, outcome: RawOutcome) -> Self {
        *lock(&self.fallback) = outcome;
        self
    }

    pub fn push(&self, outcome: RawOutcome) {
        self.push_delayed(Duration::ZERO, outcome);
    }

    /// Queue an outcome that is returned only after `delay`.
    pub fn push_delayed(&self, delay: Duration, outcome: RawOutcome) {
        lock(&self.outcomes).push_back(Scripted { delay, outcome });
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Nodes contacted, in call order.
    pub fn nodes_called(&self) -> Vec<NodeId> {
        lock(&self.calls).iter().map(|c| c.node.clone()).collect()
    }

    /// Script the next `open_stream`: the returned feed pushes its items.
    pub fn stream_feed(&self) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.streams).push_back(ScriptedStream::Feed(rx));
        StreamFeed { tx }
    }

    /// Make the next `open_stream` fail with `err`.
    pub fn fail_next_open(&self, err: TransportError) {
        lock(&self.streams).push_back(ScriptedStream::Fail(err));
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, node: &Node, request: &Request) -> RawOutcome {
        lock(&self.calls).push(Call {
            node: node.id().clone(),
            request: request.clone(),
        });
        let next = lock(&self.outcomes).pop_front();
        let Some(Scripted { delay, outcome }) = next else {
            return lock(&self.fallback).clone();
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn open_stream(
        &self,
        _node: &Node,
        _request: &Request,
    ) -> Result<ItemStream, TransportError> {
        let next = lock(&self.streams).pop_front();
        match next {
            Some(ScriptedStream::Feed(rx)) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(ScriptedStream::Fail(err)) => Err(err),
            None => Err(TransportError::Other("no stream scripted".into())),
        }
    }
}

/// Producer side of a scripted stream. Dropping it ends the stream.
#[derive(Clone)]
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<FeedItem>,
}

impl StreamFeed {
    /// Push a plain item. Returns false once the subscriber is gone.
    pub fn item(&self, payload: impl Into<bytes::Bytes>) -> bool {
        self.tx.send(Ok(StreamItem::single(payload))).is_ok()
    }

    /// Push one chunk of a chunked message.
    pub fn chunk(&self, info: ChunkInfo, payload: impl Into<bytes::Bytes>) -> bool {
        self.tx
            .send(Ok(StreamItem {
                chunk: Some(info),
                payload: payload.into(),
            }))
            .is_ok()
    }

    /// Fail the stream.
    pub fn fail(&self, err: TransportError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Transport that fails at configured rates, reproducibly for a seed.
pub struct FlakyTransport {
    rng: Mutex<StdRng>,
    fail_rate: f64,
    pending_rate: f64,
    reject_rate: f64,
    latency: Duration,
    stream_items: usize,
    stream_interval: Duration,
    sent: AtomicU64,
}

impl FlakyTransport {
    /// Always-successful transport; adjust with the builder methods.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fail_rate: 0.0,
            pending_rate: 0.0,
            reject_rate: 0.0,
            latency: Duration::ZERO,
            stream_items: 0,
            stream_interval: Duration::ZERO,
            sent: AtomicU64::new(0),
        }
    }

    /// Share of sends that hit a node fault (refused connection or busy node).
    pub fn fail_rate(mut self, rate: f64) -> Self {
        self.fail_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Share of sends answered "pending".
    pub fn pending_rate(mut self, rate: f64) -> Self {
        self.pending_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Share of sends rejected as invalid.
    pub fn reject_rate(mut self, rate: f64) -> Self {
        self.reject_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Streams yield `items` plain items, one every `interval`, then end.
    pub fn stream(mut self, items: usize, interval: Duration) -> Self {
        self.stream_items = items;
        self.stream_interval = interval;
        self
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn roll(&self, node: &Node, request: &Request) -> RawOutcome {
        let mut rng = lock(&self.rng);
        let roll: f64 = rng.gen();
        let mut edge = self.fail_rate;
        if roll < edge {
            return if rng.gen_bool(0.5) {
                TransportError::ConnectionRefused(node.address().to_string()).into()
            } else {
                RawOutcome::busy("node busy")
            };
        }
        edge += self.pending_rate;
        if roll < edge {
            return RawOutcome::pending();
        }
        edge += self.reject_rate;
        if roll < edge {
            return RawOutcome::invalid("rejected by simulated node");
        }
        RawOutcome::ok(format!("receipt {} from {}", request.idempotency_key(), node.id()))
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn send(&self, node: &Node, request: &Request) -> RawOutcome {
        self.sent.fetch_add(1, Ordering::Relaxed);
        let outcome = self.roll(node, request);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        outcome
    }

    async fn open_stream(
        &self,
        _node: &Node,
        _request: &Request,
    ) -> Result<ItemStream, TransportError> {
        let total = self.stream_items;
        let interval = self.stream_interval;
        Ok(stream::unfold(0usize, move |i| async move {
            if i >= total {
                return None;
            }
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            Some((Ok(StreamItem::single(format!("item {}", i + 1))), i + 1))
        })
        .boxed())
    }
}
