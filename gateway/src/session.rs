//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Per-connection telnet session
//!
//! A [`ConnectionSession`] owns everything about one client: the decoder,
//! the option negotiator, the compression pipeline, the negotiated
//! capabilities and the pending output. It runs as its own task and talks
//! to the application only through channels.

use crate::compression::{CompressionPipeline, Direction};
use crate::context::ServerContext;
use crate::error::TelnetError;
use crate::telnet::decoder::{TelnetDecoder, TelnetEvent};
use crate::telnet::negotiator::OptionNegotiator;
use crate::telnet::options::Effect;
use crate::telnet::protocol::{
    TelnetCommand, TelnetOption, build_command, build_subnegotiation, encode_text,
};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use portcullis_common::{
    ClientCapabilities, ConnectionInfo, ConnectionState, InboundEvent, OutboundEvent, ProtocolType,
};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Decoder;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

/// Disconnect reason when the client closes the socket
pub const REASON_PEER_CLOSED: &str = "connection closed";

/// Disconnect reason when the application drops every handle to the session
pub const REASON_RELEASED: &str = "released by application";

/// Record of one client connection
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    listener: String,
    protocol: ProtocolType,
    remote_addr: SocketAddr,
    tls: bool,
    created_at: DateTime<Utc>,
    bytes_sent: u64,
    bytes_received: u64,
    state: ConnectionState,
}

impl Connection {
    pub fn new(
        id: Uuid,
        listener: impl Into<String>,
        protocol: ProtocolType,
        remote_addr: SocketAddr,
        tls: bool,
    ) -> Self {
        Self {
            id,
            listener: listener.into(),
            protocol,
            remote_addr,
            tls,
            created_at: Utc::now(),
            bytes_sent: 0,
            bytes_received: 0,
            state: ConnectionState::Active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn listener(&self) -> &str {
        &self.listener
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Bytes written to the socket, after compression
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Bytes read from the socket, before decompression
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Snapshot for the application
    pub fn info(&self, capabilities: &ClientCapabilities) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            listener: self.listener.clone(),
            protocol: self.protocol,
            remote_addr: self.remote_addr,
            tls: self.tls,
            created_at: self.created_at,
            capabilities: capabilities.clone(),
        }
    }
}

/// Pending output with high/low watermark hysteresis
///
/// Once the buffer grows past the high water mark it reports itself paused
/// until writes drain it below the low water mark.
#[derive(Debug)]
pub struct OutputBuffer {
    buffer: BytesMut,
    high_water_mark: usize,
    low_water_mark: usize,
    paused: bool,
}

impl OutputBuffer {
    pub fn new(high_water_mark: usize, low_water_mark: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            high_water_mark,
            low_water_mark,
            paused: false,
        }
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if !self.paused && self.buffer.len() > self.high_water_mark {
            self.paused = true;
            debug!(pending = self.buffer.len(), "Output above high water mark");
        }
    }

    /// Re-evaluate the pause flag after bytes were written out
    pub fn drained(&mut self) {
        if self.paused && (self.buffer.len() < self.low_water_mark || self.buffer.is_empty()) {
            self.paused = false;
            debug!(pending = self.buffer.len(), "Output drained below low water mark");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }
}

/// Telnet session for one connection
pub struct ConnectionSession {
    connection: Connection,
    decoder: TelnetDecoder,
    negotiator: OptionNegotiator,
    pipeline: CompressionPipeline,
    capabilities: ClientCapabilities,
    capabilities_tx: watch::Sender<ClientCapabilities>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
    outbound: mpsc::Receiver<OutboundEvent>,
    output: OutputBuffer,
    read_buffer_size: usize,
    closing: Option<String>,
}

impl ConnectionSession {
    /// Create a session for `connection`
    ///
    /// `outbound` carries application events for this connection and
    /// `capabilities_tx` publishes capability changes to the registry. While
    /// output is above the high water mark neither `outbound` nor the socket
    /// is read, so senders on a full queue wait.
    pub fn new(
        connection: Connection,
        context: &ServerContext,
        outbound: mpsc::Receiver<OutboundEvent>,
        capabilities_tx: watch::Sender<ClientCapabilities>,
    ) -> Self {
        let settings = context.settings();
        Self {
            connection,
            decoder: TelnetDecoder::with_limits(
                settings.max_line_length,
                settings.max_subnegotiation_length,
            ),
            negotiator: OptionNegotiator::new(context.option_registry()),
            pipeline: CompressionPipeline::new(),
            capabilities: ClientCapabilities::default(),
            capabilities_tx,
            inbound: context.inbound().clone(),
            outbound,
            output: OutputBuffer::new(settings.high_water_mark, settings.low_water_mark),
            read_buffer_size: settings.read_buffer_size.max(64),
            closing: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.connection.id
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    /// Drive the session over `stream` until either side closes it
    ///
    /// Publishes `Connect` first and `Disconnect` last, and returns the final
    /// connection record.
    pub async fn run<S>(mut self, stream: S) -> Connection
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let id = self.connection.id;
        info!(
            connection = %id,
            listener = %self.connection.listener,
            remote = %self.connection.remote_addr,
            tls = self.connection.tls,
            "Connection opened"
        );

        let reason = match self.serve(stream).await {
            Ok(reason) => reason,
            Err(e) => {
                error!(connection = %id, error = %e, "Connection failed");
                e.to_string()
            }
        };

        self.connection.state = ConnectionState::Closed;
        info!(
            connection = %id,
            bytes_sent = self.connection.bytes_sent,
            bytes_received = self.connection.bytes_received,
            reason = %reason,
            "Connection closed"
        );
        self.publish(InboundEvent::Disconnect {
            connection: id,
            reason,
        });
        self.connection
    }

    async fn serve<S>(&mut self, stream: S) -> Result<String, TelnetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (mut reader, mut writer) = tokio::io::split(stream);

        self.publish(InboundEvent::Connect {
            connection: self.connection.info(&self.capabilities),
        });
        let offers = self.negotiator.start();
        self.apply(offers)?;

        let mut read_buf = BytesMut::with_capacity(self.read_buffer_size);
        loop {
            if let Some(reason) = &self.closing {
                if self.output.is_empty() {
                    writer.flush().await?;
                    if let Err(e) = writer.shutdown().await {
                        trace!(connection = %self.connection.id, error = %e, "Shutdown failed");
                    }
                    return Ok(reason.clone());
                }
            }
            let open = self.closing.is_none() && !self.output.is_paused();

            tokio::select! {
                read = reader.read_buf(&mut read_buf), if open => {
                    let n = read?;
                    if n == 0 {
                        return Ok(REASON_PEER_CLOSED.to_string());
                    }
                    self.connection.bytes_received += n as u64;
                    let chunk = read_buf.split();
                    self.receive(&chunk)?;
                    read_buf.reserve(self.read_buffer_size);
                }
                written = writer.write_buf(self.output.buffer_mut()), if !self.output.is_empty() => {
                    let n = written?;
                    if n == 0 {
                        return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
                    }
                    self.connection.bytes_sent += n as u64;
                    self.output.drained();
                    if self.output.is_empty() {
                        writer.flush().await?;
                    }
                }
                event = self.outbound.recv(), if open => {
                    match event {
                        Some(event) => self.send_event(event)?,
                        None => self.begin_close(REASON_RELEASED.to_string())?,
                    }
                }
            }
        }
    }

    /// Process one read from the socket
    fn receive(&mut self, chunk: &[u8]) -> Result<(), TelnetError> {
        let mut pending = BytesMut::with_capacity(chunk.len());
        self.inflate(chunk, &mut pending)?;

        while let Some(event) = self.decoder.decode(&mut pending)? {
            let inflating = self.pipeline.is_active(Direction::Inbound);
            self.handle_event(event)?;
            if !inflating && self.pipeline.is_active(Direction::Inbound) && !pending.is_empty() {
                // The rest of this read is already compressed
                let compressed = pending.split();
                self.inflate(&compressed, &mut pending)?;
            }
        }
        Ok(())
    }

    fn inflate(&mut self, data: &[u8], dst: &mut BytesMut) -> Result<(), TelnetError> {
        let active = self.pipeline.is_active(Direction::Inbound);
        self.pipeline.decode(data, dst)?;
        if active && !self.pipeline.is_active(Direction::Inbound) {
            debug!(connection = %self.connection.id, "Client ended MCCP3 stream");
            self.capabilities.mccp3 = false;
            self.publish_capabilities();
        }
        Ok(())
    }

    fn handle_event(&mut self, event: TelnetEvent) -> Result<(), TelnetError> {
        let effects = match event {
            TelnetEvent::Line(text) => {
                trace!(connection = %self.connection.id, line = %text, "Received line");
                self.publish(InboundEvent::Line {
                    connection: self.connection.id,
                    text,
                });
                return Ok(());
            }
            TelnetEvent::Command(command) => self.negotiator.receive_command(command),
            TelnetEvent::Negotiation(verb, option) => {
                trace!(connection = %self.connection.id, ?verb, option, "Received negotiation");
                self.negotiator.receive(verb, option, &mut self.capabilities)
            }
            TelnetEvent::Subnegotiation(option, payload) => {
                self.negotiator
                    .receive_subnegotiation(option, &payload, &mut self.capabilities)
            }
        };
        self.apply(effects)
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), TelnetError> {
        let mut changed = false;
        for effect in effects {
            match effect {
                Effect::Send(bytes) => self.write_raw(&bytes)?,
                Effect::StartCompression(direction) => {
                    self.pipeline.enable(direction);
                }
                Effect::StopCompression(direction) => {
                    let mut trailer = BytesMut::new();
                    self.pipeline.disable(direction, &mut trailer)?;
                    self.output.extend(&trailer);
                }
                Effect::CapabilitiesChanged => changed = true,
            }
        }
        if changed {
            self.publish_capabilities();
        }
        Ok(())
    }

    fn send_event(&mut self, event: OutboundEvent) -> Result<(), TelnetError> {
        let mut data = BytesMut::new();
        match event {
            OutboundEvent::Text { text } => encode_text(&text, &mut data),
            OutboundEvent::Line { text } => {
                encode_text(&text, &mut data);
                data.extend_from_slice(b"\r\n");
            }
            OutboundEvent::Prompt { text } => {
                encode_text(&text, &mut data);
                if !self
                    .negotiator
                    .is_enabled_local(TelnetOption::SuppressGoAhead.to_byte())
                {
                    data.extend_from_slice(&build_command(TelnetCommand::GA));
                }
                if self.capabilities.forced_endline {
                    data.extend_from_slice(b"\r\n");
                }
            }
            OutboundEvent::Oob { option, payload } => {
                data.extend_from_slice(&build_subnegotiation(option, &payload));
            }
            OutboundEvent::Close { reason } => return self.begin_close(reason),
        }
        self.write_raw(&data)
    }

    fn begin_close(&mut self, reason: String) -> Result<(), TelnetError> {
        if self.closing.is_some() {
            return Ok(());
        }
        debug!(connection = %self.connection.id, reason = %reason, "Closing connection");
        let mut trailer = BytesMut::new();
        self.pipeline.disable(Direction::Outbound, &mut trailer)?;
        self.output.extend(&trailer);
        self.closing = Some(reason);
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), TelnetError> {
        let mut encoded = BytesMut::with_capacity(data.len());
        self.pipeline.encode(data, &mut encoded)?;
        self.output.extend(&encoded);
        Ok(())
    }

    fn publish_capabilities(&mut self) {
        self.capabilities_tx.send_replace(self.capabilities.clone());
        self.publish(InboundEvent::Update {
            connection: self.connection.id,
            capabilities: self.capabilities.clone(),
        });
    }

    fn publish(&self, event: InboundEvent) {
        if self.inbound.send(event).is_err() {
            trace!(connection = %self.connection.id, "Application channel closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelnetSettings;
    use crate::registry::ConnectionRegistry;
    use crate::telnet::options::{MsspStatus, OptionRegistry};
    use flate2::write::ZlibEncoder;
    use flate2::{Compression, Decompress, FlushDecompress};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    struct Harness {
        client: DuplexStream,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        outbound: mpsc::Sender<OutboundEvent>,
        task: JoinHandle<Connection>,
    }

    fn new_session(
        options: &[&str],
    ) -> (
        ConnectionSession,
        mpsc::UnboundedReceiver<InboundEvent>,
        mpsc::Sender<OutboundEvent>,
    ) {
        new_session_with(options, TelnetSettings::default())
    }

    fn new_session_with(
        options: &[&str],
        settings: TelnetSettings,
    ) -> (
        ConnectionSession,
        mpsc::UnboundedReceiver<InboundEvent>,
        mpsc::Sender<OutboundEvent>,
    ) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::channel(settings.outbound_queue_size);
        let (capabilities_tx, _) = watch::channel(ClientCapabilities::default());
        let options =
            OptionRegistry::from_names(options, MsspStatus::new("Test", Default::default())).unwrap();
        let context = ServerContext::new(
            Arc::new(ConnectionRegistry::new()),
            options,
            settings,
            inbound_tx,
        );
        let connection = Connection::new(
            Uuid::new_v4(),
            "test",
            ProtocolType::Telnet,
            "127.0.0.1:50000".parse().unwrap(),
            false,
        );
        let session = ConnectionSession::new(connection, &context, outbound_rx, capabilities_tx);
        (session, inbound, outbound)
    }

    fn spawn_session(options: &[&str]) -> Harness {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (session, inbound, outbound) = new_session(options);
        let task = tokio::spawn(session.run(server));
        Harness {
            client,
            inbound,
            outbound,
            task,
        }
    }

    async fn next_event(harness: &mut Harness) -> InboundEvent {
        timeout(Duration::from_secs(5), harness.inbound.recv())
            .await
            .expect("timed out waiting for event")
            .expect("inbound channel closed")
    }

    async fn read_exact(harness: &mut Harness, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        timeout(Duration::from_secs(5), harness.client.read_exact(&mut buf))
            .await
            .expect("timed out reading")
            .unwrap();
        buf
    }

    async fn next_line(harness: &mut Harness) -> String {
        loop {
            if let InboundEvent::Line { text, .. } = next_event(harness).await {
                return text;
            }
        }
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(b"look\r\n")
            .read(&[255, 251, 200])
            .write(&[255, 254, 200])
            .build();
        let (session, mut inbound, _outbound) = new_session(&[]);

        let connection = session.run(stream).await;
        assert_eq!(connection.bytes_received(), 9);
        assert_eq!(connection.bytes_sent(), 3);

        let mut events = Vec::new();
        while let Ok(event) = inbound.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], InboundEvent::Connect { .. }));
        assert!(matches!(&events[1], InboundEvent::Line { text, .. } if text == "look"));
        assert!(matches!(
            &events[2],
            InboundEvent::Disconnect { reason, .. } if reason == REASON_PEER_CLOSED
        ));
    }

    #[tokio::test]
    async fn test_connect_precedes_negotiation() {
        let mut harness = spawn_session(&["sga", "naws"]);

        match next_event(&mut harness).await {
            InboundEvent::Connect { connection } => {
                assert_eq!(connection.listener, "test");
                assert_eq!(connection.capabilities, ClientCapabilities::default());
            }
            other => panic!("expected connect, got {:?}", other),
        }
        assert_eq!(read_exact(&mut harness, 6).await, vec![255, 251, 3, 255, 253, 31]);
    }

    #[tokio::test]
    async fn test_line_reaches_application() {
        let mut harness = spawn_session(&[]);
        harness.client.write_all(b"look\r\n").await.unwrap();
        assert_eq!(next_line(&mut harness).await, "look");
    }

    #[tokio::test]
    async fn test_naws_updates_capabilities() {
        let mut harness = spawn_session(&["naws"]);
        assert_eq!(read_exact(&mut harness, 3).await, vec![255, 253, 31]);

        harness.client.write_all(&[255, 251, 31]).await.unwrap();
        harness
            .client
            .write_all(&[255, 250, 31, 0, 80, 0, 24, 255, 240])
            .await
            .unwrap();

        loop {
            if let InboundEvent::Update { capabilities, .. } = next_event(&mut harness).await {
                if capabilities.window_size() == (80, 24) {
                    assert!(capabilities.naws);
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_outbound_line_and_prompt() {
        let mut harness = spawn_session(&["sga"]);
        assert_eq!(read_exact(&mut harness, 3).await, vec![255, 251, 3]);

        harness
            .outbound
            .send(OutboundEvent::Line { text: "Hello".to_string() })
            .await
            .unwrap();
        harness
            .outbound
            .send(OutboundEvent::Prompt { text: "> ".to_string() })
            .await
            .unwrap();
        assert_eq!(read_exact(&mut harness, 11).await, b"Hello\r\n> \xff\xf9".to_vec());

        // Once SGA is on, prompts carry no Go Ahead
        harness.client.write_all(&[255, 253, 3]).await.unwrap();
        loop {
            if let InboundEvent::Update { capabilities, .. } = next_event(&mut harness).await {
                if capabilities.sga {
                    break;
                }
            }
        }
        harness
            .outbound
            .send(OutboundEvent::Prompt { text: "> ".to_string() })
            .await
            .unwrap();
        harness
            .outbound
            .send(OutboundEvent::Text { text: "x".to_string() })
            .await
            .unwrap();
        assert_eq!(read_exact(&mut harness, 3).await, b"> x".to_vec());
    }

    #[tokio::test]
    async fn test_oob_is_framed() {
        let mut harness = spawn_session(&[]);
        harness
            .outbound
            .send(OutboundEvent::Oob {
                option: 201,
                payload: b"Core.Ping".to_vec(),
            })
            .await
            .unwrap();
        let mut expected = vec![255, 250, 201];
        expected.extend_from_slice(b"Core.Ping");
        expected.extend_from_slice(&[255, 240]);
        assert_eq!(read_exact(&mut harness, expected.len()).await, expected);
    }

    #[tokio::test]
    async fn test_mccp2_output_inflates() {
        let mut harness = spawn_session(&["mccp2"]);
        assert_eq!(read_exact(&mut harness, 3).await, vec![255, 251, 86]);

        harness.client.write_all(&[255, 253, 86]).await.unwrap();
        assert_eq!(read_exact(&mut harness, 5).await, vec![255, 250, 86, 255, 240]);

        harness
            .outbound
            .send(OutboundEvent::Line {
                text: "You are compressed.".to_string(),
            })
            .await
            .unwrap();

        let mut inflater = Decompress::new(true);
        let mut plain = Vec::with_capacity(1024);
        let mut buf = [0u8; 1024];
        while !plain.ends_with(b"You are compressed.\r\n") {
            let n = timeout(Duration::from_secs(5), harness.client.read(&mut buf))
                .await
                .expect("timed out reading")
                .unwrap();
            assert!(n > 0, "connection closed early");
            inflater
                .decompress_vec(&buf[..n], &mut plain, FlushDecompress::None)
                .unwrap();
        }
        assert_eq!(plain, b"You are compressed.\r\n");
    }

    #[tokio::test]
    async fn test_mccp3_switches_mid_read() {
        let mut harness = spawn_session(&["mccp3"]);
        assert_eq!(read_exact(&mut harness, 3).await, vec![255, 251, 87]);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"look\r\n").unwrap();
        encoder.flush().unwrap();

        let mut data = vec![255, 253, 87, 255, 250, 87, 255, 240];
        data.extend_from_slice(encoder.get_ref());
        harness.client.write_all(&data).await.unwrap();

        assert_eq!(next_line(&mut harness).await, "look");
    }

    #[tokio::test]
    async fn test_decompression_failure_disconnects() {
        let mut harness = spawn_session(&["mccp3"]);
        assert_eq!(read_exact(&mut harness, 3).await, vec![255, 251, 87]);

        let mut data = vec![255, 253, 87, 255, 250, 87, 255, 240];
        data.extend_from_slice(b"not zlib data at all");
        harness.client.write_all(&data).await.unwrap();

        loop {
            if let InboundEvent::Disconnect { reason, .. } = next_event(&mut harness).await {
                assert!(reason.contains("Decompression failed"), "{}", reason);
                break;
            }
        }
        let connection = harness.task.await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_close_event_flushes_and_disconnects() {
        let mut harness = spawn_session(&[]);
        harness
            .outbound
            .send(OutboundEvent::Line { text: "Goodbye!".to_string() })
            .await
            .unwrap();
        harness
            .outbound
            .send(OutboundEvent::Close { reason: "quit".to_string() })
            .await
            .unwrap();

        let mut received = Vec::new();
        timeout(Duration::from_secs(5), harness.client.read_to_end(&mut received))
            .await
            .expect("timed out reading")
            .unwrap();
        assert_eq!(received, b"Goodbye!\r\n");

        loop {
            if let InboundEvent::Disconnect { reason, .. } = next_event(&mut harness).await {
                assert_eq!(reason, "quit");
                break;
            }
        }
        let connection = harness.task.await.unwrap();
        assert_eq!(connection.bytes_sent(), 10);
    }

    #[tokio::test]
    async fn test_peer_close_disconnects() {
        let mut harness = spawn_session(&[]);
        harness.client.write_all(b"quit\r\n").await.unwrap();
        assert_eq!(next_line(&mut harness).await, "quit");

        let Harness {
            client,
            mut inbound,
            task,
            ..
        } = harness;
        drop(client);

        let connection = task.await.unwrap();
        assert_eq!(connection.bytes_received(), 6);
        let mut last = None;
        while let Ok(event) = inbound.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(InboundEvent::Disconnect { reason, .. }) if reason == REASON_PEER_CLOSED
        ));
    }

    #[tokio::test]
    async fn test_slow_client_pauses_reads_and_application() {
        let settings = TelnetSettings {
            high_water_mark: 256,
            low_water_mark: 64,
            outbound_queue_size: 2,
            ..TelnetSettings::default()
        };
        let (client, server) = tokio::io::duplex(64);
        let (session, mut inbound, outbound) = new_session_with(&[], settings);
        let task = tokio::spawn(session.run(server));
        let (mut client_read, mut client_write) = tokio::io::split(client);
        assert!(matches!(next_inbound(&mut inbound).await, InboundEvent::Connect { .. }));

        // The client reads nothing, so application writes end up waiting
        let line = OutboundEvent::Line { text: "x".repeat(100) };
        let mut accepted = 0;
        while timeout(Duration::from_millis(200), outbound.send(line.clone()))
            .await
            .is_ok()
        {
            accepted += 1;
            assert!(accepted < 32, "application writes never waited");
        }

        // Nor is the socket read: input stays in the pipe and yields no line
        let flood = tokio::spawn(async move {
            client_write.write_all(b"look\r\n").await.unwrap();
            client_write.write_all(&[255, 246].repeat(1000)).await.unwrap();
            client_write
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!flood.is_finished());
        assert!(inbound.try_recv().is_err());

        // Draining the output resumes both
        let expected = accepted * 102 + 2000;
        let drain = tokio::spawn(async move {
            let mut received = vec![0u8; expected];
            client_read.read_exact(&mut received).await.unwrap();
            (client_read, received)
        });
        let line_text = match next_inbound(&mut inbound).await {
            InboundEvent::Line { text, .. } => text,
            other => panic!("expected line, got {:?}", other),
        };
        assert_eq!(line_text, "look");

        let client_write = timeout(Duration::from_secs(5), flood)
            .await
            .expect("client input never read")
            .unwrap();
        let (client_read, received) = timeout(Duration::from_secs(5), drain)
            .await
            .expect("output never drained")
            .unwrap();
        assert_eq!(received.iter().filter(|&&b| b == b'x').count(), accepted * 100);
        let nops = received.windows(2).filter(|w| w[0] == 255 && w[1] == 241).count();
        assert_eq!(nops, 1000);

        timeout(Duration::from_secs(1), outbound.send(line))
            .await
            .expect("application writes still waiting")
            .unwrap();

        drop(client_read);
        drop(client_write);
        task.await.unwrap();
    }

    async fn next_inbound(inbound: &mut mpsc::UnboundedReceiver<InboundEvent>) -> InboundEvent {
        timeout(Duration::from_secs(5), inbound.recv())
            .await
            .expect("timed out waiting for event")
            .expect("inbound channel closed")
    }

    #[test]
    fn test_output_buffer_watermarks() {
        let mut output = OutputBuffer::new(10, 4);
        output.extend(&[0; 8]);
        assert!(!output.is_paused());
        output.extend(&[0; 4]);
        assert!(output.is_paused());

        let _ = output.buffer_mut().split_to(6);
        output.drained();
        assert!(output.is_paused());

        // Resumes only below the low water mark
        let _ = output.buffer_mut().split_to(2);
        output.drained();
        assert!(output.is_paused());

        let _ = output.buffer_mut().split_to(1);
        output.drained();
        assert!(!output.is_paused());
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_output_buffer_zero_low_water_mark() {
        let mut output = OutputBuffer::new(4, 0);
        output.extend(&[0; 6]);
        assert!(output.is_paused());

        let _ = output.buffer_mut().split_to(5);
        output.drained();
        assert!(output.is_paused());

        let _ = output.buffer_mut().split_to(1);
        output.drained();
        assert!(!output.is_paused());
    }
}
