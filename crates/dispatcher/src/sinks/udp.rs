//! UdpSink - fire-and-forget JSON datagrams
//!
//! One datagram per delivery, tagged with `"kind": "event"` or
//! `"kind": "property"`. Useful for piping a live event stream into a
//! debugging console on another host.

use contracts::{ContractError, Event, EventParams, EventSink, InstallContext, SharedStorage};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Configuration for UdpSink
#[derive(Debug, Clone)]
pub struct UdpSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max datagram size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl UdpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", s, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Datagram<'a> {
    Event {
        app_id: &'a str,
        name: &'a str,
        params: &'a EventParams,
    },
    Property {
        app_id: &'a str,
        name: &'a str,
        value: Option<&'a str>,
    },
}

/// Sink that sends deliveries over UDP
pub struct UdpSink {
    name: String,
    config: UdpSinkConfig,
    app_id: String,
    socket: Option<UdpSocket>,
}

impl UdpSink {
    /// Create a new UdpSink; the socket is opened on `start`
    pub fn new(name: impl Into<String>, config: UdpSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            app_id: String::new(),
            socket: None,
        }
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config =
            UdpSinkConfig::from_params(params).map_err(|e| ContractError::sink_start(&name, e))?;
        Ok(Self::new(name, config))
    }

    fn socket(&self) -> Result<&UdpSocket, ContractError> {
        self.socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))
    }

    fn prepare_payload(&self, datagram: &Datagram<'_>) -> Result<Vec<u8>, ContractError> {
        let data = serde_json::to_vec(datagram)
            .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;

        if data.len() > self.config.max_packet_size {
            warn!(
                sink = %self.name,
                size = data.len(),
                max = self.config.max_packet_size,
                "Datagram too large, dropping"
            );
            return Err(ContractError::sink_write(
                &self.name,
                format!("datagram of {} bytes exceeds limit", data.len()),
            ));
        }

        Ok(data)
    }

    async fn transmit(&self, datagram: Datagram<'_>) -> Result<(), ContractError> {
        let socket = self.socket()?;
        let data = self.prepare_payload(&datagram)?;
        match socket.send(&data).await {
            Ok(sent) => {
                debug!(sink = %self.name, bytes = sent, "Sent");
            }
            Err(e) => {
                // UDP is best-effort
                error!(sink = %self.name, error = %e, "UDP send failed");
            }
        }
        Ok(())
    }
}

impl EventSink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "udp_sink_start", skip_all, fields(sink = %self.name, target = %self.config.addr))]
    async fn start(
        &mut self,
        context: &InstallContext,
        _storage: &SharedStorage,
    ) -> Result<(), ContractError> {
        let bind_addr = if self.config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: self.name.clone(),
                message: e.to_string(),
            })?;
        socket
            .connect(self.config.addr)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: self.name.clone(),
                message: e.to_string(),
            })?;

        self.app_id = context.app_id.clone();
        self.socket = Some(socket);
        debug!(sink = %self.name, target = %self.config.addr, "UdpSink connected");
        Ok(())
    }

    #[instrument(
        name = "udp_sink_track",
        skip(self, event),
        fields(sink = %self.name, event = event.name())
    )]
    async fn track(&mut self, event: &Event) -> Result<(), ContractError> {
        self.transmit(Datagram::Event {
            app_id: &self.app_id,
            name: event.name(),
            params: event.params(),
        })
        .await
    }

    async fn set_property(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ContractError> {
        self.transmit(Datagram::Property {
            app_id: &self.app_id,
            name,
            value,
        })
        .await
    }

    #[instrument(name = "udp_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // UDP doesn't buffer
        Ok(())
    }

    #[instrument(name = "udp_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, "UdpSink closed");
        Ok(())
    }
}
