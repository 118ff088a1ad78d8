use std::sync::{Arc, Mutex};

use bytes::Bytes;
use netsdr_frame::{
    encode_control_item, encode_data_item, try_decode, ControlItemCode, Message, MessageType,
};
use netsdr_transport::{TcpTransport, Transport, UdpTransport};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatch::{
    dispatch_control, lock, next_sequence, run_control, run_data, DataPath, PendingCommand,
    PendingSlot, SharedSink,
};
use crate::error::{Result, SessionError};
use crate::params::{
    frequency_parameters, sample_rate_parameters, AD_MODES_DEFAULT, RECEIVER_RUN_IQ,
    RECEIVER_STOP, RF_FILTER_AUTO,
};
use crate::sink::SampleSink;
use crate::stats::{SessionStats, StatsSnapshot};

/// Reply to a control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Reply bytes as received.
    pub raw: Bytes,
    /// Decoded reply; `None` when the bytes did not decode.
    pub message: Option<Message>,
}

impl Response {
    fn new(raw: Bytes) -> Self {
        let message = try_decode(&raw);
        Self { raw, message }
    }

    /// Whether the receiver answered with a NAK (a bare two-byte header).
    pub fn is_nak(&self) -> bool {
        self.raw.len() == netsdr_frame::HEADER_SIZE
    }
}

/// Client session against one receiver: a control connection for commands
/// and a data connection for samples.
///
/// Commands take `&mut self`, so at most one command is outstanding per
/// session. A reply completes the waiting command only when it carries the
/// same control item code; late replies to earlier commands are logged and
/// counted as unsolicited.
pub struct ClientSession<C: Transport = TcpTransport, D: Transport = UdpTransport> {
    control: C,
    data: D,
    config: SessionConfig,
    pending: PendingSlot,
    data_path: Arc<DataPath>,
    stats: Arc<SessionStats>,
    control_cancel: CancellationToken,
    data_cancel: CancellationToken,
    control_task: Option<JoinHandle<()>>,
    data_task: Option<JoinHandle<()>>,
    next_sequence: u16,
}

impl ClientSession {
    /// Session over TCP control and UDP data, addressed by `config`.
    pub fn from_config(config: SessionConfig, sink: impl SampleSink + 'static) -> Result<Self> {
        config.validate()?;
        let control = TcpTransport::new(config.tcp_config());
        let data = UdpTransport::new(config.udp_config());
        Ok(Self::new(control, data, config, sink))
    }
}

impl<C: Transport, D: Transport> ClientSession<C, D> {
    pub fn new(control: C, data: D, config: SessionConfig, sink: impl SampleSink + 'static) -> Self {
        let sink: SharedSink = Arc::new(Mutex::new(sink));
        Self::with_shared_sink(control, data, config, sink)
    }

    /// Like [`ClientSession::new`], for a sink the caller also holds.
    pub fn with_shared_sink(control: C, data: D, config: SessionConfig, sink: SharedSink) -> Self {
        let stats = Arc::new(SessionStats::default());
        let data_path = Arc::new(DataPath::new(sink, config.bit_depth, Arc::clone(&stats)));
        Self {
            control,
            data,
            config,
            pending: PendingSlot::default(),
            data_path,
            stats,
            control_cancel: CancellationToken::new(),
            data_cancel: CancellationToken::new(),
            control_task: None,
            data_task: None,
            next_sequence: 1,
        }
    }

    /// Open the control connection and, if configured, bring the receiver up.
    ///
    /// Connecting a connected session is a no-op.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            debug!("session already connected");
            return Ok(());
        }
        self.stop_control_task().await;

        let incoming = self.control.connect().await?;
        self.control_cancel = CancellationToken::new();
        self.control_task = Some(tokio::spawn(run_control(
            incoming,
            Arc::clone(&self.pending),
            Arc::clone(&self.stats),
            self.control_cancel.clone(),
        )));
        info!(transport = self.control.transport_name(), "session connected");

        if self.config.configure_on_connect {
            self.configure().await?;
        }
        Ok(())
    }

    /// Send the bring-up commands: sample rate, RF filter, A/D modes.
    pub async fn configure(&mut self) -> Result<()> {
        let rate = sample_rate_parameters(self.config.sample_rate);
        self.set(ControlItemCode::IqOutputDataSampleRate, &rate)
            .await?;
        self.set(ControlItemCode::RfFilter, &RF_FILTER_AUTO).await?;
        self.set(ControlItemCode::AdModes, &AD_MODES_DEFAULT).await?;
        debug!(sample_rate = self.config.sample_rate, "receiver configured");
        Ok(())
    }

    /// Whether the control connection is open.
    pub fn is_connected(&self) -> bool {
        self.control.is_connected()
    }

    /// Whether the data path is running.
    pub fn iq_started(&self) -> bool {
        self.data_task.is_some()
    }

    /// Encode and send a control item, then wait for the reply.
    pub async fn send_command(
        &mut self,
        message_type: MessageType,
        code: ControlItemCode,
        parameters: &[u8],
    ) -> Result<Response> {
        if !self.is_connected() {
            warn!(%code, "no active connection");
            return Err(SessionError::NotConnected);
        }
        let frame = encode_control_item(message_type, code, parameters)?;

        let (tx, rx) = oneshot::channel();
        if lock(&self.pending)
            .replace(PendingCommand::new(code, tx))
            .is_some()
        {
            debug!("discarding stale response slot");
        }
        if let Err(err) = self.control.send(frame).await {
            lock(&self.pending).take();
            return Err(err.into());
        }
        self.stats.command_sent();
        debug!(%message_type, %code, params = parameters.len(), "command sent");

        let reply = match self.config.response_timeout() {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    lock(&self.pending).take();
                    warn!(%code, ?limit, "response timed out");
                    return Err(SessionError::Timeout(limit));
                }
            },
            None => rx.await,
        };
        let raw = reply.map_err(|_| SessionError::Disconnected)?;
        Ok(Response::new(raw))
    }

    /// Handle a message from the control connection.
    ///
    /// Completes the waiting command when the message answers it; otherwise
    /// the message is only logged.
    pub fn on_control_message(&self, frame: Bytes) {
        dispatch_control(&self.pending, &self.stats, frame);
    }

    /// Handle a message from the data connection: decode it, extract samples
    /// at the configured bit depth and append them to the sink.
    ///
    /// Returns the number of samples appended.
    pub fn on_data_message(&self, frame: &[u8]) -> Result<usize> {
        self.data_path.ingest(frame)
    }

    /// Tune `channel` to `frequency` Hz.
    ///
    /// The value is not range checked.
    pub async fn change_frequency(&mut self, frequency: i64, channel: u8) -> Result<Response> {
        let parameters = frequency_parameters(frequency, channel, self.config.frequency_width)?;
        self.set(ControlItemCode::ReceiverFrequency, &parameters)
            .await
    }

    /// Start the receiver's I/Q stream and the local data path.
    ///
    /// The data connection is opened first so the first data items are not
    /// missed.
    pub async fn start_iq(&mut self) -> Result<Response> {
        if !self.is_connected() {
            warn!("no active connection");
            return Err(SessionError::NotConnected);
        }
        self.start_data().await?;
        match self.set(ControlItemCode::ReceiverState, &RECEIVER_RUN_IQ).await {
            Ok(response) => {
                info!("I/Q stream started");
                Ok(response)
            }
            Err(err) => {
                self.stop_data().await?;
                Err(err)
            }
        }
    }

    /// Stop the receiver's I/Q stream and the local data path.
    ///
    /// The data path is stopped even when the stop command fails.
    pub async fn stop_iq(&mut self) -> Result<Response> {
        let response = self.set(ControlItemCode::ReceiverState, &RECEIVER_STOP).await;
        self.stop_data().await?;
        if response.is_ok() {
            info!("I/Q stream stopped");
        }
        response
    }

    /// Open the data connection and start ingesting samples.
    pub async fn start_data(&mut self) -> Result<()> {
        if self.data_task.is_some() {
            return Ok(());
        }
        let incoming = self.data.connect().await?;
        self.data_path.reset();
        self.data_cancel = CancellationToken::new();
        self.data_task = Some(tokio::spawn(run_data(
            incoming,
            Arc::clone(&self.data_path),
            self.data_cancel.clone(),
        )));
        debug!(transport = self.data.transport_name(), "data path started");
        Ok(())
    }

    /// Stop ingesting samples and close the data connection.
    ///
    /// Returns once the last batch has reached the sink.
    pub async fn stop_data(&mut self) -> Result<()> {
        self.data_cancel.cancel();
        if let Some(task) = self.data_task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "data task ended abnormally");
            }
        }
        self.data.close().await?;
        Ok(())
    }

    /// Send `body` as a data item on the data connection.
    ///
    /// Sequence numbers start at 1 and wrap from 65535 back to 1. Returns the
    /// sequence number used.
    pub async fn send_data_item(&mut self, message_type: MessageType, body: &[u8]) -> Result<u16> {
        if !self.data.is_connected() {
            warn!("no active data connection");
            return Err(SessionError::NotConnected);
        }
        let sequence = self.next_sequence;
        let frame = encode_data_item(message_type, sequence, body)?;
        self.data.send(frame).await?;
        self.next_sequence = next_sequence(sequence);
        debug!(sequence, size = body.len(), "data item sent");
        Ok(sequence)
    }

    /// Stop both paths and close both connections.
    ///
    /// A command still waiting for its reply resolves as
    /// [`SessionError::Disconnected`].
    pub async fn disconnect(&mut self) -> Result<()> {
        let data = self.stop_data().await;
        self.stop_control_task().await;
        let control = self.control.close().await;
        info!("session disconnected");
        data?;
        control?;
        Ok(())
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The sink samples are appended to.
    pub fn sink(&self) -> &SharedSink {
        self.data_path.sink()
    }

    /// Current counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn control_transport(&self) -> &C {
        &self.control
    }

    pub fn data_transport(&self) -> &D {
        &self.data
    }

    async fn set(&mut self, code: ControlItemCode, parameters: &[u8]) -> Result<Response> {
        self.send_command(MessageType::SetControlItem, code, parameters)
            .await
    }

    async fn stop_control_task(&mut self) {
        self.control_cancel.cancel();
        if let Some(task) = self.control_task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "control task ended abnormally");
            }
        }
        lock(&self.pending).take();
    }
}

impl<C: Transport, D: Transport> Drop for ClientSession<C, D> {
    fn drop(&mut self) {
        self.control_cancel.cancel();
        self.data_cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use netsdr_frame::{decode, encode_data_item};
    use netsdr_transport::{Incoming, TransportError};
    use tokio::sync::mpsc;

    use super::*;
    use crate::sink::{ChannelSink, DiscardSink};

    #[derive(Default)]
    struct MockState {
        connected: bool,
        echo: bool,
        hang_up_on_send: bool,
        echo_delays: VecDeque<Duration>,
        sent: Vec<Bytes>,
        tx: Option<mpsc::Sender<Bytes>>,
    }

    /// In-memory transport. Clones share state so tests can observe and
    /// drive a transport the session owns.
    #[derive(Clone, Default)]
    struct MockTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockTransport {
        fn echoing() -> Self {
            let mock = Self::default();
            lock(&mock.state).echo = true;
            mock
        }

        /// Echoes the n-th frame after the n-th delay; later frames immediately.
        fn echoing_after(delays: impl IntoIterator<Item = Duration>) -> Self {
            let mock = Self::echoing();
            lock(&mock.state).echo_delays = delays.into_iter().collect();
            mock
        }

        fn hanging_up() -> Self {
            let mock = Self::default();
            lock(&mock.state).hang_up_on_send = true;
            mock
        }

        fn sent(&self) -> Vec<Bytes> {
            lock(&self.state).sent.clone()
        }

        async fn inject(&self, frame: Bytes) {
            let tx = lock(&self.state).tx.clone();
            tx.expect("mock should be connected")
                .send(frame)
                .await
                .expect("session should be receiving");
        }
    }

    impl Transport for MockTransport {
        async fn connect(&mut self) -> netsdr_transport::Result<Incoming> {
            let (tx, rx) = mpsc::channel(16);
            let mut state = lock(&self.state);
            state.connected = true;
            state.tx = Some(tx);
            Ok(rx)
        }

        async fn close(&mut self) -> netsdr_transport::Result<()> {
            let mut state = lock(&self.state);
            state.connected = false;
            state.tx = None;
            Ok(())
        }

        async fn send(&mut self, message: Bytes) -> netsdr_transport::Result<()> {
            let (reply_to, delay) = {
                let mut state = lock(&self.state);
                if !state.connected {
                    return Err(TransportError::NotConnected);
                }
                state.sent.push(message.clone());
                if state.hang_up_on_send {
                    state.connected = false;
                    state.tx = None;
                }
                if state.echo {
                    (state.tx.clone(), state.echo_delays.pop_front())
                } else {
                    (None, None)
                }
            };
            match (reply_to, delay) {
                (Some(tx), Some(delay)) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(message).await;
                    });
                }
                (Some(tx), None) => {
                    let _ = tx.send(message).await;
                }
                (None, _) => {}
            }
            Ok(())
        }

        fn is_connected(&self) -> bool {
            lock(&self.state).connected
        }

        fn transport_name(&self) -> &'static str {
            "mock"
        }
    }

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            configure_on_connect: false,
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn change_frequency_without_connection_sends_nothing() {
        let control = MockTransport::echoing();
        let mut session =
            ClientSession::new(control.clone(), MockTransport::default(), quiet_config(), DiscardSink);

        let err = session.change_frequency(100_000_000, 1).await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected));
        assert!(control.sent().is_empty());
    }

    #[tokio::test]
    async fn change_frequency_sends_one_frame_per_call() {
        let control = MockTransport::echoing();
        let mut session =
            ClientSession::new(control.clone(), MockTransport::default(), quiet_config(), DiscardSink);
        session.connect().await.unwrap();

        let response = session.change_frequency(100_000_000, 1).await.unwrap();
        assert_eq!(control.sent().len(), 1);
        let message = response.message.expect("echoed command should decode");
        assert_eq!(message.message_type, MessageType::SetControlItem);
        assert_eq!(message.code, ControlItemCode::ReceiverFrequency);
        assert_eq!(message.body.as_ref(), &[0x01, 0x00, 0xE1, 0xF5, 0x05, 0x00]);

        session.change_frequency(7_100_000, 1).await.unwrap();
        assert_eq!(control.sent().len(), 2);
        assert_eq!(session.stats().commands_sent, 2);
    }

    #[tokio::test]
    async fn connect_sends_bring_up_commands() {
        let control = MockTransport::echoing();
        let mut session = ClientSession::new(
            control.clone(),
            MockTransport::default(),
            SessionConfig::default(),
            DiscardSink,
        );
        session.connect().await.unwrap();
        assert!(session.is_connected());

        let codes: Vec<ControlItemCode> = control
            .sent()
            .iter()
            .map(|frame| decode(frame).unwrap().code)
            .collect();
        assert_eq!(
            codes,
            vec![
                ControlItemCode::IqOutputDataSampleRate,
                ControlItemCode::RfFilter,
                ControlItemCode::AdModes
            ]
        );
        let rate = decode(&control.sent()[0]).unwrap();
        assert_eq!(rate.body.as_ref(), &[0xA0, 0x86, 0x01, 0x00, 0x00]);

        // Already connected: nothing more is sent.
        session.connect().await.unwrap();
        assert_eq!(control.sent().len(), 3);
    }

    #[tokio::test]
    async fn peer_hang_up_resolves_pending_command() {
        let control = MockTransport::hanging_up();
        let mut session =
            ClientSession::new(control.clone(), MockTransport::default(), quiet_config(), DiscardSink);
        session.connect().await.unwrap();

        let err = session.change_frequency(1_000, 0).await.unwrap_err();
        assert!(matches!(err, SessionError::Disconnected));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn silent_receiver_times_out() {
        let control = MockTransport::default();
        let config = SessionConfig {
            response_timeout_ms: Some(50),
            ..quiet_config()
        };
        let mut session =
            ClientSession::new(control.clone(), MockTransport::default(), config, DiscardSink);
        session.connect().await.unwrap();

        let err = session.change_frequency(1_000, 0).await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout(limit) if limit == Duration::from_millis(50)));
        assert_eq!(control.sent().len(), 1);
    }

    #[tokio::test]
    async fn late_reply_is_not_taken_by_next_command() {
        // The first echo lands after its command gave up but while the second
        // command is still waiting; the second echo lands inside its window.
        let control = MockTransport::echoing_after([
            Duration::from_millis(300),
            Duration::from_millis(150),
        ]);
        let config = SessionConfig {
            response_timeout_ms: Some(200),
            ..quiet_config()
        };
        let mut session =
            ClientSession::new(control.clone(), MockTransport::default(), config, DiscardSink);
        session.connect().await.unwrap();

        let err = session
            .send_command(MessageType::CurrentControlItem, ControlItemCode::RfFilter, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));

        let response = session
            .send_command(MessageType::SetControlItem, ControlItemCode::AdModes, &AD_MODES_DEFAULT)
            .await
            .unwrap();
        let message = response.message.expect("echo should decode");
        assert_eq!(message.code, ControlItemCode::AdModes);
        assert_eq!(session.stats().unsolicited, 1);
    }

    #[tokio::test]
    async fn start_iq_runs_data_path() {
        let control = MockTransport::echoing();
        let data = MockTransport::default();
        let (sink, mut stream) = ChannelSink::new(8);
        let mut session = ClientSession::new(control.clone(), data.clone(), quiet_config(), sink);
        session.connect().await.unwrap();

        session.start_iq().await.unwrap();
        assert!(session.iq_started());
        let run = decode(&control.sent()[0]).unwrap();
        assert_eq!(run.code, ControlItemCode::ReceiverState);
        assert_eq!(run.body.as_ref(), &RECEIVER_RUN_IQ);

        let frame = encode_data_item(MessageType::DataItem0, 1, &[0x10, 0x00, 0x20, 0x00]).unwrap();
        data.inject(frame).await;
        let batch = tokio::time::timeout(Duration::from_secs(2), stream.recv())
            .await
            .expect("batch should arrive")
            .expect("stream open");
        assert_eq!(batch.sequence, 1);
        assert_eq!(batch.samples, vec![0x10, 0x20]);

        session.stop_iq().await.unwrap();
        assert!(!session.iq_started());
        assert!(!data.is_connected());
        let stop = decode(&control.sent()[1]).unwrap();
        assert_eq!(stop.body.as_ref(), &RECEIVER_STOP);
    }

    #[tokio::test]
    async fn start_iq_requires_connection() {
        let data = MockTransport::default();
        let mut session =
            ClientSession::new(MockTransport::echoing(), data.clone(), quiet_config(), DiscardSink);
        assert!(matches!(
            session.start_iq().await,
            Err(SessionError::NotConnected)
        ));
        assert!(!data.is_connected());
    }

    #[tokio::test]
    async fn on_data_message_appends_batch() {
        let (sink, mut stream) = ChannelSink::new(2);
        let session = ClientSession::new(
            MockTransport::default(),
            MockTransport::default(),
            quiet_config(),
            sink,
        );
        let frame = encode_data_item(MessageType::DataItem2, 9, &[0xFF, 0x7F]).unwrap();
        assert_eq!(session.on_data_message(&frame).unwrap(), 1);
        assert_eq!(stream.recv().await.unwrap().samples, vec![0x7FFF]);
    }

    #[tokio::test]
    async fn send_data_item_numbers_from_one() {
        let data = MockTransport::default();
        let mut session =
            ClientSession::new(MockTransport::default(), data.clone(), quiet_config(), DiscardSink);
        assert!(matches!(
            session.send_data_item(MessageType::DataItem0, &[1]).await,
            Err(SessionError::NotConnected)
        ));

        session.start_data().await.unwrap();
        assert_eq!(session.send_data_item(MessageType::DataItem0, &[1]).await.unwrap(), 1);
        assert_eq!(session.send_data_item(MessageType::DataItem0, &[2]).await.unwrap(), 2);

        let sent = data.sent();
        assert_eq!(decode(&sent[1]).unwrap().sequence, Some(2));
    }

    #[tokio::test]
    async fn disconnect_closes_both_connections() {
        let control = MockTransport::echoing();
        let data = MockTransport::default();
        let mut session = ClientSession::new(control.clone(), data.clone(), quiet_config(), DiscardSink);
        session.connect().await.unwrap();
        session.start_iq().await.unwrap();

        session.disconnect().await.unwrap();
        assert!(!session.is_connected());
        assert!(!session.iq_started());
        assert!(!data.is_connected());
        assert!(matches!(
            session.change_frequency(1, 1).await,
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn nak_is_a_bare_header() {
        let response = Response::new(Bytes::from_static(&[0x02, 0x00]));
        assert!(response.is_nak());
        assert!(response.message.is_none());
    }
}
