//! Client side of the FA archiver wire protocol.
//!
//! Commands are ASCII lines; responses are either a status byte followed by
//! binary data (subscriptions) or plain text terminated by end of stream
//! (queries). Every receive waits at most `timeout`, so a caller polling a
//! stop flag between blocks is never stuck on a silent socket.
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;
use log::{debug, warn};
use crate::drivers::buffer::Sample;
use crate::drivers::mask::SubscriptionMask;
use crate::drivers::FaError;
pub const DEFAULT_SERVER: &str = "fa-archiver.cs.diamond.ac.uk";
pub const DEFAULT_PORT: u16 = 8888;
/// Nominal FA sample rate, used whenever the server cannot be asked.
pub const NOMINAL_SAMPLE_FREQUENCY: f64 = 10072.0;
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(200);
const RECV_CHUNK: usize = 65536;
/// Bytes per channel per sample: X and Y as little-endian `i32`.
const SAMPLE_BYTES: usize = 2 * 4;
/// One decoded block, laid out `[sample][channel]`.
#[derive(Clone, Debug)]
pub struct SampleBlock {
    /// Server sample counter of the first sample in the block.
    pub t0: u32,
    pub channel_count: usize,
    pub samples: Vec<Sample>,
}
impl SampleBlock {
    pub fn sample_count(&self) -> usize {
        if self.channel_count == 0 {
            0
        } else {
            self.samples.len() / self.channel_count
        }
    }
    /// Samples of one subscribed channel (index into the mask's id order).
    pub fn channel(&self, index: usize) -> Vec<Sample> {
        if index >= self.channel_count {
            return Vec::new();
        }
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channel_count)
            .copied()
            .collect()
    }
}
pub struct ProtocolClient {
    stream: Option<TcpStream>,
    pending: Vec<u8>,
    channel_count: usize,
    t0: u32,
}
impl ProtocolClient {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, FaError> {
        let address = format!("{host}:{port}");
        let stream = TcpStream::connect(&address).map_err(|source| FaError::Connect {
            address: address.clone(),
            source,
        })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        debug!("connected to {address}");
        Ok(Self {
            stream: Some(stream),
            pending: Vec::new(),
            channel_count: 0,
            t0: 0,
        })
    }
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }
    /// Sample counter of the next sample to be read.
    pub fn t0(&self) -> u32 {
        self.t0
    }
    /// Performs the `SR` handshake and returns the server's initial `t0`.
    pub fn subscribe(&mut self, mask: &SubscriptionMask) -> Result<u32, FaError> {
        self.send(mask.subscribe_command().as_bytes())?;
        let status = self.read_exact(1)?[0];
        if status != 0 {
            return Err(FaError::Protocol(self.read_error_message(status)));
        }
        let raw = self.read_exact(4)?;
        let t0 = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        self.channel_count = mask.count();
        self.t0 = t0;
        debug!("subscribed to {mask}, t0 = {t0}");
        Ok(t0)
    }
    /// Reads exactly `samples` samples for every subscribed channel.
    pub fn read_block(&mut self, samples: usize) -> Result<SampleBlock, FaError> {
        let raw = self.read_exact(samples * self.channel_count * SAMPLE_BYTES)?;
        let decoded = raw
            .chunks_exact(SAMPLE_BYTES)
            .map(|word| {
                Sample::new(
                    i32::from_le_bytes([word[0], word[1], word[2], word[3]]),
                    i32::from_le_bytes([word[4], word[5], word[6], word[7]]),
                )
            })
            .collect();
        let t0 = self.t0;
        self.t0 = self.t0.wrapping_add(samples as u32);
        Ok(SampleBlock {
            t0,
            channel_count: self.channel_count,
            samples: decoded,
        })
    }
    /// Sends a query command and returns everything the server writes before
    /// closing the connection.
    pub fn server_command(&mut self, command: &str) -> Result<String, FaError> {
        self.send(command.as_bytes())?;
        let mut response = std::mem::take(&mut self.pending);
        loop {
            match self.recv() {
                Ok(chunk) => response.extend_from_slice(&chunk),
                Err(FaError::Eof) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
    pub fn query_frequency(&mut self) -> Result<f64, FaError> {
        let response = self.server_command("CF\n")?;
        let text = response.trim();
        text.parse::<f64>()
            .map_err(|_| FaError::Protocol(format!("invalid frequency response {text:?}")))
    }
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!("connection closed");
        }
        self.pending.clear();
    }
    fn send(&mut self, bytes: &[u8]) -> Result<(), FaError> {
        let stream = self.stream.as_mut().ok_or(FaError::Eof)?;
        stream.write_all(bytes)?;
        stream.flush()?;
        Ok(())
    }
    /// One bounded wait for data from the socket.
    fn recv(&mut self) -> Result<Vec<u8>, FaError> {
        let stream = self.stream.as_mut().ok_or(FaError::Eof)?;
        let mut chunk = vec![0u8; RECV_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Err(FaError::Eof),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(chunk);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(FaError::Timeout)
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    /// Reassembles `length` bytes from buffered and freshly received chunks.
    fn read_exact(&mut self, length: usize) -> Result<Vec<u8>, FaError> {
        while self.pending.len() < length {
            let chunk = self.recv()?;
            self.pending.extend_from_slice(&chunk);
        }
        let rest = self.pending.split_off(length);
        Ok(std::mem::replace(&mut self.pending, rest))
    }
    /// Reads the rest of a failed handshake up to the newline.
    fn read_error_message(&mut self, status: u8) -> String {
        let mut message = Vec::new();
        // The server writes its error text straight after a failed command,
        // so a printable status byte is the first character of the message.
        if status.is_ascii_graphic() || status == b' ' {
            message.push(status);
        }
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                message.extend(self.pending.drain(..=pos).take(pos));
                break;
            }
            message.append(&mut self.pending);
            match self.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(err) => {
                    warn!("error message truncated: {err}");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&message).into_owned()
    }
}
impl Drop for ProtocolClient {
    fn drop(&mut self) {
        self.close();
    }
}
/// Asks the server for its sample frequency, falling back to the nominal value.
pub fn sample_frequency(host: &str, port: u16, timeout: Duration) -> f64 {
    match try_sample_frequency(host, port, timeout) {
        Ok(frequency) => frequency,
        Err(err) => {
            warn!("frequency query failed ({err}), using {NOMINAL_SAMPLE_FREQUENCY} Hz");
            NOMINAL_SAMPLE_FREQUENCY
        }
    }
}
pub fn try_sample_frequency(host: &str, port: u16, timeout: Duration) -> Result<f64, FaError> {
    let mut client = ProtocolClient::connect(host, port, timeout)?;
    client.query_frequency()
}
