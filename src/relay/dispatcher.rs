//! Relay dispatcher
//!
//! Applies the relay rules to one parsed message. Rules are independent: a
//! message carrying several known top-level tags triggers each matching rule.
//!
//! | tag    | effect                                                     |
//! |--------|------------------------------------------------------------|
//! | `BAMS` | update sender state, relay to every other session          |
//! | `MESG` | relay to every session, sender included                    |
//! | `WHO`  | reply to sender with the known station names               |
//! | `NTWK` | acknowledge `OPEN`, `CHECK`, `TRANSACTION` to sender       |
//! | `SCLK` | logged only                                                |
//!
//! Deliveries go through each session's bounded outbound queue and never
//! wait: a full or closed queue drops that one delivery.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

use crate::capture::CaptureLog;
use crate::client::registry::{ClientRegistry, Frame, Outbound};
use crate::protocol::codec::encode_message;
use crate::protocol::messages::{
    self, CHECK, ChatMessage, ClockSync, NetworkControl, OPEN, ROSTER_QUERY, StationAnnouncement,
    TRANSACTION,
};
use crate::protocol::tags::{Tags, parse_tags};

pub struct Dispatcher {
    registry: Arc<ClientRegistry>,
    capture: Arc<CaptureLog>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ClientRegistry>, capture: Arc<CaptureLog>) -> Self {
        Self { registry, capture }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Queues the unsolicited greeting for a newly registered session.
    pub async fn greet(&self, addr: SocketAddr) {
        self.reply(addr, &messages::greeting()).await;
    }

    /// Handles one message body received from `addr`.
    pub async fn dispatch(&self, addr: SocketAddr, body: &str) {
        let tags = parse_tags(body);
        if tags.is_empty() {
            debug!("Ignoring untagged message from {}", addr);
            return;
        }
        debug!(
            "Dispatching message from {} with tags {:?}",
            addr,
            tags.names().collect::<Vec<_>>()
        );

        if let Some(announcement) = StationAnnouncement::from_tags(&tags) {
            self.handle_station(addr, &announcement, body).await;
        }

        if let Some(chat) = ChatMessage::from_tags(&tags) {
            debug!(
                "Chat from {} ({:?} -> {:?})",
                addr,
                chat.from.as_deref().unwrap_or("?"),
                chat.to.as_deref().unwrap_or("?")
            );
            self.broadcast(None, body).await;
        }

        if tags.contains(ROSTER_QUERY) {
            let stations = self.registry.snapshot().await;
            debug!("Roster for {}: {:?}", addr, stations);
            self.reply(addr, &messages::roster_reply(&stations)).await;
        }

        if let Some(control) = NetworkControl::from_tags(&tags) {
            self.handle_network_control(addr, control).await;
        }

        if let Some(clock) = ClockSync::from_tags(&tags) {
            info!(
                "Clock sync from {}: {:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
                addr,
                clock.year.unwrap_or(0),
                clock.month.unwrap_or(0),
                clock.day.unwrap_or(0),
                clock.hour.unwrap_or(0),
                clock.minute.unwrap_or(0),
                clock.second.unwrap_or(0),
                clock.millisecond.unwrap_or(0),
            );
        }

        log_unhandled(addr, &tags);
    }

    async fn handle_station(&self, addr: SocketAddr, announcement: &StationAnnouncement, body: &str) {
        match self.registry.update(&addr, announcement).await {
            Some(state) => info!(
                "Station {} at {}: band {} mode {}",
                state.station().unwrap_or("?"),
                addr,
                state.band().unwrap_or("?"),
                state.mode().unwrap_or("?"),
            ),
            None => warn!("Station announcement from unregistered client {}", addr),
        }
        self.broadcast(Some(&addr), body).await;
    }

    async fn handle_network_control(&self, addr: SocketAddr, control: NetworkControl) {
        if control.open {
            debug!("Network open from {}", addr);
            self.reply(addr, &messages::acknowledgement(OPEN)).await;
        }

        if control.check {
            debug!("Heartbeat from {}", addr);
            self.reply(addr, &messages::acknowledgement(CHECK)).await;
        }

        if let Some(transaction) = control.transaction {
            info!(
                "Log entry from {} (station {}): {}",
                addr,
                transaction.from.as_deref().unwrap_or("?"),
                transaction.summary()
            );
            self.capture.message(addr, &transaction.summary()).await;
            self.reply(addr, &messages::acknowledgement(TRANSACTION)).await;
        }
    }

    /// Sends `body` to every registered session except `exclude`.
    async fn broadcast(&self, exclude: Option<&SocketAddr>, body: &str) {
        let recipients = self.registry.recipients(exclude).await;
        let frame: Frame = encode_message(body).into();

        let mut delivered = 0;
        for (addr, outbound) in &recipients {
            if deliver(*addr, outbound, frame.clone()) {
                delivered += 1;
            }
        }
        debug!("Relayed to {}/{} clients", delivered, recipients.len());
    }

    async fn reply(&self, addr: SocketAddr, body: &str) {
        match self.registry.outbound(&addr).await {
            Some(outbound) => {
                deliver(addr, &outbound, encode_message(body).into());
            }
            None => debug!("No session for {}, reply dropped", addr),
        }
    }
}

/// Queues a frame without waiting. Returns whether it was accepted.
fn deliver(addr: SocketAddr, outbound: &Outbound, frame: Frame) -> bool {
    match outbound.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("Outbound queue full for {}, dropping message", addr);
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!("Client {} is gone, dropping message", addr);
            false
        }
    }
}

fn log_unhandled(addr: SocketAddr, tags: &Tags) {
    const KNOWN: [&str; 5] = [
        messages::STATION_ANNOUNCEMENT,
        messages::CHAT,
        messages::ROSTER_QUERY,
        messages::NETWORK_CONTROL,
        messages::CLOCK_SYNC,
    ];
    if !KNOWN.iter().any(|name| tags.contains(name)) {
        debug!(
            "No rule for message from {} (tags {:?})",
            addr,
            tags.names().collect::<Vec<_>>()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{decode_utf16le_lossy, encode_utf16le};
    use crate::protocol::framer::Framer;
    use tokio::sync::mpsc;

    struct Harness {
        dispatcher: Dispatcher,
        queues: Vec<(SocketAddr, mpsc::Receiver<Frame>)>,
    }

    impl Harness {
        async fn new(clients: u16) -> Self {
            let registry = Arc::new(ClientRegistry::new(16));
            let mut queues = Vec::new();
            for port in 1..=clients {
                let addr = SocketAddr::from(([127, 0, 0, 1], port));
                let (tx, rx) = mpsc::channel(8);
                registry.register(addr, tx).await.unwrap();
                queues.push((addr, rx));
            }
            Self {
                dispatcher: Dispatcher::new(registry, Arc::new(CaptureLog::disabled())),
                queues,
            }
        }

        fn addr(&self, index: usize) -> SocketAddr {
            self.queues[index].0
        }

        /// Bodies queued for client `index` so far.
        fn drain(&mut self, index: usize) -> Vec<String> {
            let mut framer = Framer::new(1 << 20);
            let mut bodies = Vec::new();
            while let Ok(frame) = self.queues[index].1.try_recv() {
                bodies.extend(framer.push(&frame));
            }
            bodies
        }
    }

    const BAMS: &str = "<BAMS><STATION>ALPHA</STATION><BAND>20</BAND><MODE>CW</MODE></BAMS>";

    #[tokio::test]
    async fn test_station_announcement_relayed_to_others_only() {
        let mut h = Harness::new(3).await;
        h.dispatcher.dispatch(h.addr(0), BAMS).await;

        assert!(h.drain(0).is_empty());
        assert_eq!(h.drain(1), vec![BAMS]);
        assert_eq!(h.drain(2), vec![BAMS]);

        let state = h.dispatcher.registry().state(&h.addr(0)).await.unwrap();
        assert_eq!(state.station(), Some("ALPHA"));
        assert_eq!(state.band(), Some("20"));
        assert_eq!(state.mode(), Some("CW"));
    }

    #[tokio::test]
    async fn test_chat_relayed_to_everyone() {
        let mut h = Harness::new(2).await;
        let chat = "<MESG><TO>ALL</TO><FROM>ALPHA</FROM><MSGTXT>cq</MSGTXT></MESG>";
        h.dispatcher.dispatch(h.addr(0), chat).await;

        assert_eq!(h.drain(0), vec![chat]);
        assert_eq!(h.drain(1), vec![chat]);
    }

    #[tokio::test]
    async fn test_roster_query_answered_to_requester_only() {
        let mut h = Harness::new(3).await;
        h.dispatcher
            .dispatch(h.addr(0), "<BAMS><STATION>ALPHA</STATION></BAMS>")
            .await;
        h.dispatcher
            .dispatch(h.addr(1), "<BAMS><STATION>BRAVO</STATION></BAMS>")
            .await;
        h.drain(0);
        h.drain(1);
        h.drain(2);

        h.dispatcher.dispatch(h.addr(2), "<WHO></WHO>").await;

        let reply = h.drain(2);
        assert_eq!(reply.len(), 1);
        assert_eq!(messages::parse_roster(&reply[0]), vec!["ALPHA", "BRAVO"]);
        assert!(h.drain(0).is_empty());
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_acknowledged_to_sender_only() {
        let mut h = Harness::new(2).await;
        h.dispatcher
            .dispatch(h.addr(0), "<NTWK><CHECK></CHECK></NTWK>")
            .await;

        assert_eq!(h.drain(0), vec!["<NTWK><CHECK>"]);
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn test_open_and_transaction_acknowledged() {
        let mut h = Harness::new(1).await;
        h.dispatcher.dispatch(h.addr(0), "<NTWK><OPEN>").await;
        h.dispatcher
            .dispatch(
                h.addr(0),
                "<NTWK><TRANSACTION>ADD</TRANSACTION><XMLDATA><FLDCALL>K1ABC</FLDCALL></XMLDATA></NTWK>",
            )
            .await;

        assert_eq!(h.drain(0), vec!["<NTWK><OPEN>", "<NTWK><TRANSACTION>"]);
        // Transactions are logged only.
        assert_eq!(
            h.dispatcher.registry().state(&h.addr(0)).await.unwrap(),
            Default::default()
        );
    }

    #[tokio::test]
    async fn test_combined_tags_trigger_every_rule() {
        let mut h = Harness::new(2).await;
        h.dispatcher
            .dispatch(h.addr(0), "<BAMS><STATION>ALPHA</STATION></BAMS><WHO></WHO>")
            .await;

        let own = h.drain(0);
        assert_eq!(own.len(), 1);
        assert_eq!(messages::parse_roster(&own[0]), vec!["ALPHA"]);
        assert_eq!(h.drain(1).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_clock_messages_produce_no_traffic() {
        let mut h = Harness::new(2).await;
        h.dispatcher.dispatch(h.addr(0), "<FOO>1</FOO>").await;
        h.dispatcher.dispatch(h.addr(0), "no tags at all").await;
        h.dispatcher
            .dispatch(h.addr(0), "<SCLK><YEAR>2024</YEAR></SCLK>")
            .await;

        assert!(h.drain(0).is_empty());
        assert!(h.drain(1).is_empty());
    }

    #[tokio::test]
    async fn test_greeting() {
        let mut h = Harness::new(1).await;
        h.dispatcher.greet(h.addr(0)).await;
        assert_eq!(h.drain(0), vec![messages::greeting()]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let registry = Arc::new(ClientRegistry::new(4));
        let sender = SocketAddr::from(([127, 0, 0, 1], 1));
        let slow = SocketAddr::from(([127, 0, 0, 1], 2));
        let (sender_tx, _sender_rx) = mpsc::channel(8);
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        registry.register(sender, sender_tx).await.unwrap();
        registry.register(slow, slow_tx).await.unwrap();

        let dispatcher = Dispatcher::new(registry, Arc::new(CaptureLog::disabled()));
        dispatcher.dispatch(sender, BAMS).await;
        dispatcher.dispatch(sender, BAMS).await;

        let first = slow_rx.try_recv().unwrap();
        assert!(slow_rx.try_recv().is_err());
        let mut expected = encode_utf16le(&format!("<BOR>{}<EOR>", BAMS));
        expected.extend_from_slice(&crate::protocol::codec::TRAILER);
        assert_eq!(&first[..], expected.as_slice());
        assert!(decode_utf16le_lossy(&first).contains("ALPHA"));
    }

    #[tokio::test]
    async fn test_transaction_written_to_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.log");
        let registry = Arc::new(ClientRegistry::new(4));
        let addr = SocketAddr::from(([127, 0, 0, 1], 7));
        let (tx, _rx) = mpsc::channel(8);
        registry.register(addr, tx).await.unwrap();

        let capture = Arc::new(CaptureLog::open(&path).await.unwrap());
        let dispatcher = Dispatcher::new(registry, capture);
        dispatcher
            .dispatch(
                addr,
                "<NTWK><TRANSACTION>ADD</TRANSACTION><XMLDATA><FLDCALL>K1ABC</FLDCALL>\
                 <FLDBAND>20</FLDBAND><FLDMODE>CW</FLDMODE></XMLDATA></NTWK>",
            )
            .await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "MSG 127.0.0.1:7: TRANSACTION ADD: K1ABC 20m CW\n");
    }
}
