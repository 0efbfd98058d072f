//! In-memory broker for subscriber and page tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pawmap_stomp::{Command, Frame, FrameParser};
use tokio::sync::mpsc;

use crate::error::RealtimeError;
use crate::realtime::events::APP_LOCATION_SUBSCRIBE;
use crate::realtime::transport::{Connector, RealtimeTransport};

/// `None` on the session channel means "broker closed the connection"
type SessionTx = mpsc::UnboundedSender<Option<Vec<u8>>>;

#[derive(Debug, Default)]
pub(crate) struct MockBroker {
    connects: AtomicUsize,
    refuse: AtomicUsize,
    sent: Mutex<Vec<Frame>>,
    session: Mutex<Option<SessionTx>>,
}

impl MockBroker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(MockConnector(self.clone()))
    }

    /// Connect attempts so far, refused ones included
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn refuse_next(&self, n: usize) {
        self.refuse.store(n, Ordering::SeqCst);
    }

    pub(crate) fn sent_with(&self, command: Command) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    /// Bodies of every location subscription sent
    pub(crate) fn location_payloads(&self) -> Vec<serde_json::Value> {
        self.sent_with(Command::Send)
            .iter()
            .filter(|f| f.get_header("destination") == Some(APP_LOCATION_SUBSCRIBE))
            .map(|f| serde_json::from_str(&f.body).unwrap())
            .collect()
    }

    /// Deliver a frame on the current session
    pub(crate) fn push(&self, frame: Frame) {
        if let Some(tx) = self.session.lock().unwrap().as_ref() {
            let _ = tx.send(Some(frame.encode().into_bytes()));
        }
    }

    pub(crate) fn push_raw(&self, bytes: &[u8]) {
        if let Some(tx) = self.session.lock().unwrap().as_ref() {
            let _ = tx.send(Some(bytes.to_vec()));
        }
    }

    pub(crate) fn drop_connection(&self) {
        if let Some(tx) = self.session.lock().unwrap().take() {
            let _ = tx.send(None);
        }
    }
}

#[derive(Debug)]
struct MockConnector(Arc<MockBroker>);

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, RealtimeError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .0
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(RealtimeError::Closed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.0.session.lock().unwrap() = Some(tx.clone());
        Ok(Box::new(MockTransport {
            broker: self.0.clone(),
            tx,
            rx,
        }))
    }
}

struct MockTransport {
    broker: Arc<MockBroker>,
    tx: SessionTx,
    rx: mpsc::UnboundedReceiver<Option<Vec<u8>>>,
}

#[async_trait]
impl RealtimeTransport for MockTransport {
    async fn send_text(&mut self, text: String) -> Result<(), RealtimeError> {
        for frame in FrameParser::new().feed(text.as_bytes()) {
            let frame = frame?;
            if frame.command == Command::Connect {
                let connected = Frame::new(Command::Connected).header("version", "1.2");
                let _ = self.tx.send(Some(connected.encode().into_bytes()));
            }
            self.broker.sent.lock().unwrap().push(frame);
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, RealtimeError>> {
        match self.rx.recv().await {
            Some(Some(bytes)) => Some(Ok(bytes)),
            _ => None,
        }
    }

    async fn close(&mut self) {}
}
