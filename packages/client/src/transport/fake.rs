//! In-memory transport used by the channel tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    config::Endpoint,
    error::{ConnectionError, TransportError},
};

use super::{
    AckReceiver, Connector, TransportHandle, TransportLink, TransportOptions, TransportSignal,
};

/// What the fake server does as soon as a connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnOpen {
    Nothing,
    Connect,
    Fail,
}

/// Server side of one fake connection.
#[derive(Clone)]
pub(crate) struct FakeRemote {
    signals: mpsc::UnboundedSender<TransportSignal>,
    sent: Arc<Mutex<Vec<(String, Value)>>>,
    acks: Arc<Mutex<Vec<oneshot::Sender<Vec<Value>>>>>,
    closed: Arc<AtomicBool>,
}

impl FakeRemote {
    pub(crate) fn push(&self, signal: TransportSignal) {
        let _ = self.signals.send(signal);
    }

    pub(crate) fn event(&self, name: &str, payload: Value) {
        self.push(TransportSignal::Event {
            name: name.to_string(),
            payload,
        });
    }

    pub(crate) fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Answer every outstanding acknowledgment with `args`.
    pub(crate) fn ack_all(&self, args: Vec<Value>) {
        for sender in self.acks.lock().unwrap().drain(..) {
            let _ = sender.send(args.clone());
        }
    }
}

struct FakeHandle {
    remote: FakeRemote,
}

impl TransportHandle for FakeHandle {
    fn send(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.remote.is_closed() {
            return Err(TransportError::Closed);
        }
        self.remote
            .sent
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }

    fn send_with_ack(&self, event: &str, payload: Value) -> Result<AckReceiver, TransportError> {
        self.send(event, payload)?;
        let (tx, rx) = oneshot::channel();
        self.remote.acks.lock().unwrap().push(tx);
        Ok(rx)
    }

    fn close(&mut self) {
        self.remote.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector recording every connection it opens.
#[derive(Clone)]
pub(crate) struct FakeConnector {
    on_open: OnOpen,
    remotes: Arc<Mutex<Vec<FakeRemote>>>,
}

impl FakeConnector {
    pub(crate) fn new(on_open: OnOpen) -> Self {
        Self {
            on_open,
            remotes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn opened(&self) -> usize {
        self.remotes.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> FakeRemote {
        self.remotes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened")
    }
}

impl Connector for FakeConnector {
    fn open(
        &self,
        _endpoint: &Endpoint,
        _options: &TransportOptions,
    ) -> Result<TransportLink, TransportError> {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let remote = FakeRemote {
            signals: signal_tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            acks: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };

        match self.on_open {
            OnOpen::Nothing => {}
            OnOpen::Connect => remote.push(TransportSignal::Connected),
            OnOpen::Fail => remote.push(TransportSignal::ConnectError(
                ConnectionError::Transport("connection refused".to_string()),
            )),
        }

        self.remotes.lock().unwrap().push(remote.clone());
        Ok(TransportLink {
            handle: Box::new(FakeHandle { remote }),
            signals: signal_rx,
        })
    }
}
