use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use log::{info, warn};
use ndarray::Array2;
use crate::drivers::buffer::SharedBuffer;
use crate::drivers::mask::SubscriptionMask;
use crate::drivers::protocol::{ProtocolClient, DEFAULT_RECV_TIMEOUT};
use crate::drivers::FaError;
use crate::types::MonitorMessage;
/// Receiver of acquisition events. Called from the worker thread, except for
/// handshake failures which are reported from `start` itself.
pub trait AcquisitionSink: Send + Sync {
    fn on_connect(&self);
    /// `window` is the most recent `notify_size` samples in micrometres.
    fn on_event(&self, window: Array2<f64>);
    fn on_eof(&self, reason: &str);
}
impl AcquisitionSink for Sender<MonitorMessage> {
    fn on_connect(&self) {
        self.send(MonitorMessage::Connected).ok();
    }
    fn on_event(&self, window: Array2<f64>) {
        self.send(MonitorMessage::Data(window)).ok();
    }
    fn on_eof(&self, reason: &str) {
        self.send(MonitorMessage::Disconnected(reason.to_owned())).ok();
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    /// The worker stopped itself after a transport error.
    Faulted,
}
#[derive(Clone, Debug)]
pub struct AcquisitionConfig {
    pub server: String,
    pub port: u16,
    /// Samples held by the rolling buffer.
    pub buffer_size: usize,
    /// Samples fetched from the socket per block.
    pub read_size: usize,
    pub recv_timeout: Duration,
}
impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            server: crate::drivers::protocol::DEFAULT_SERVER.to_owned(),
            port: crate::drivers::protocol::DEFAULT_PORT,
            buffer_size: 500_000,
            read_size: 1000,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
        }
    }
}
/// Notification cadence shared between the owner and the worker.
#[derive(Debug)]
struct Cadence {
    notify_size: usize,
    update_size: usize,
    data_ready: usize,
}
impl Cadence {
    /// Accounts for `received` new samples and returns how many notifications
    /// are now due. Excess progress carries over to the next interval.
    fn advance(&mut self, received: usize) -> usize {
        self.data_ready += received;
        let due = self.data_ready / self.update_size;
        self.data_ready -= due * self.update_size;
        due
    }
}
/// Streams one BPM into a rolling buffer on a background thread.
pub struct AcquisitionLoop {
    config: AcquisitionConfig,
    channel: usize,
    buffer: SharedBuffer,
    cadence: Arc<Mutex<Cadence>>,
    sink: Arc<dyn AcquisitionSink>,
    running: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}
impl AcquisitionLoop {
    pub fn new(
        config: AcquisitionConfig,
        channel: usize,
        sink: Arc<dyn AcquisitionSink>,
    ) -> Result<Self, FaError> {
        SubscriptionMask::single(channel)?;
        let buffer = SharedBuffer::with_capacity(config.buffer_size)?;
        if config.read_size == 0 || config.read_size > config.buffer_size {
            return Err(FaError::InvalidCadence {
                notify_size: config.read_size,
                update_size: config.read_size,
                capacity: config.buffer_size,
            });
        }
        let cadence = Cadence {
            notify_size: config.read_size,
            update_size: config.read_size,
            data_ready: 0,
        };
        Ok(Self {
            config,
            channel,
            buffer,
            cadence: Arc::new(Mutex::new(cadence)),
            sink,
            running: Arc::new(AtomicBool::new(false)),
            faulted: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }
    pub fn state(&self) -> LoopState {
        if self.worker.is_none() {
            LoopState::Idle
        } else if self.faulted.load(Ordering::Acquire) {
            LoopState::Faulted
        } else {
            LoopState::Running
        }
    }
    pub fn channel(&self) -> usize {
        self.channel
    }
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
    /// Connects, subscribes and spawns the worker. Handshake failures are
    /// reported through `on_eof` as well as returned.
    pub fn start(&mut self) -> Result<(), FaError> {
        match self.state() {
            LoopState::Running => return Err(FaError::AlreadyRunning),
            LoopState::Faulted => self.reap(),
            LoopState::Idle => {}
        }
        let client = match self.subscribe() {
            Ok(client) => client,
            Err(err) => {
                warn!("subscription to channel {} failed: {err}", self.channel);
                self.sink.on_eof(&err.to_string());
                return Err(err);
            }
        };
        self.buffer.reset();
        self.faulted.store(false, Ordering::Release);
        self.running.store(true, Ordering::Release);
        let worker = Worker {
            client,
            buffer: self.buffer.clone(),
            cadence: Arc::clone(&self.cadence),
            sink: Arc::clone(&self.sink),
            running: Arc::clone(&self.running),
            faulted: Arc::clone(&self.faulted),
            read_size: self.config.read_size,
        };
        let spawned = thread::Builder::new()
            .name(format!("fa-monitor-{}", self.channel))
            .spawn(move || worker.run());
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("monitoring channel {}", self.channel);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                self.sink.on_eof(&err.to_string());
                Err(err.into())
            }
        }
    }
    /// Stops the worker and waits for it to exit; the socket is closed and no
    /// further buffer write or callback happens once this returns.
    pub fn stop(&mut self) {
        if self.worker.is_some() {
            self.running.store(false, Ordering::Release);
            self.reap();
        }
    }
    pub fn set_channel(&mut self, channel: usize) -> Result<(), FaError> {
        SubscriptionMask::single(channel)?;
        let was_running = self.state() == LoopState::Running;
        self.stop();
        self.channel = channel;
        if was_running {
            self.start()?;
        }
        Ok(())
    }
    /// `notify_size` is the window delivered with each event, `update_size`
    /// the amount of new data between events.
    pub fn resize(&mut self, notify_size: usize, update_size: usize) -> Result<(), FaError> {
        let capacity = self.buffer.capacity();
        if notify_size == 0 || notify_size > capacity || update_size == 0 {
            return Err(FaError::InvalidCadence {
                notify_size,
                update_size,
                capacity,
            });
        }
        let mut cadence = lock(&self.cadence);
        cadence.notify_size = notify_size;
        cadence.update_size = update_size;
        cadence.data_ready = 0;
        Ok(())
    }
    pub fn notify_size(&self) -> usize {
        lock(&self.cadence).notify_size
    }
    /// Current window in micrometres; may be called at any time.
    pub fn read(&self) -> Result<Array2<f64>, FaError> {
        let size = self.notify_size();
        self.buffer.read_scaled(size)
    }
    fn subscribe(&self) -> Result<ProtocolClient, FaError> {
        let mut client = ProtocolClient::connect(
            &self.config.server,
            self.config.port,
            self.config.recv_timeout,
        )?;
        client.subscribe(&SubscriptionMask::single(self.channel)?)?;
        Ok(client)
    }
    fn reap(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("monitor worker for channel {} panicked", self.channel);
            }
        }
    }
}
impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
struct Worker {
    client: ProtocolClient,
    buffer: SharedBuffer,
    cadence: Arc<Mutex<Cadence>>,
    sink: Arc<dyn AcquisitionSink>,
    running: Arc<AtomicBool>,
    faulted: Arc<AtomicBool>,
    read_size: usize,
}
impl Worker {
    fn run(mut self) {
        let mut stop_reason = String::from("Stopped");
        self.sink.on_connect();
        while self.running.load(Ordering::Acquire) {
            match self.pump() {
                Ok(()) => {}
                Err(err) => {
                    if err.is_transport() {
                        info!("stream ended: {err}");
                    } else {
                        warn!("monitor stopping: {err}");
                    }
                    stop_reason = err.to_string();
                    self.faulted.store(true, Ordering::Release);
                    self.running.store(false, Ordering::Release);
                }
            }
        }
        self.client.close();
        self.sink.on_eof(&stop_reason);
    }
    fn pump(&mut self) -> Result<(), FaError> {
        let block = self.client.read_block(self.read_size)?;
        self.buffer.write(&block.channel(0))?;
        let (due, notify_size) = {
            let mut cadence = lock(&self.cadence);
            (cadence.advance(self.read_size), cadence.notify_size)
        };
        for _ in 0..due {
            self.sink.on_event(self.buffer.read_scaled(notify_size)?);
        }
        Ok(())
    }
}
fn lock(cadence: &Mutex<Cadence>) -> MutexGuard<'_, Cadence> {
    cadence.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::buffer::Sample;
    use crate::drivers::protocol::tests::{encode, mock_server, read_command};
    use std::io::Write;
    use std::sync::mpsc::{self, Receiver};
    fn config(port: u16) -> AcquisitionConfig {
        AcquisitionConfig {
            server: "127.0.0.1".into(),
            port,
            buffer_size: 4000,
            read_size: 1000,
            recv_timeout: Duration::from_millis(200),
        }
    }
    fn drain(rx: &Receiver<MonitorMessage>) -> Vec<MonitorMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.recv_timeout(Duration::from_secs(2)) {
            let done = matches!(message, MonitorMessage::Disconnected(_));
            messages.push(message);
            if done {
                break;
            }
        }
        messages
    }
    #[test]
    fn streams_three_blocks_into_three_events() {
        let (port, server) = mock_server(|mut stream| {
            let command = read_command(&stream);
            assert_eq!(command, SubscriptionMask::single(3).unwrap().subscribe_command());
            stream.write_all(&[0, 0, 0, 0, 0]).unwrap();
            for (x, y) in [(100, -50), (200, -100), (100, -50)] {
                let block = vec![Sample::new(x, y); 1000];
                stream.write_all(&encode(&block)).unwrap();
            }
        });
        let (tx, rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(port), 3, Arc::new(tx)).unwrap();
        monitor.resize(1000, 1000).unwrap();
        monitor.start().unwrap();
        let messages = drain(&rx);
        server.join().unwrap();
        monitor.stop();
        assert_eq!(monitor.state(), LoopState::Idle);
        assert!(matches!(messages.first(), Some(MonitorMessage::Connected)));
        let windows: Vec<&Array2<f64>> = messages
            .iter()
            .filter_map(|m| match m {
                MonitorMessage::Data(w) => Some(w),
                _ => None,
            })
            .collect();
        assert_eq!(windows.len(), 3);
        for (window, (x, y)) in windows.iter().zip([(0.1, -0.05), (0.2, -0.1), (0.1, -0.05)]) {
            assert_eq!(window.nrows(), 1000);
            let last = window.row(999);
            assert!((last[0] - x).abs() < 1e-12);
            assert!((last[1] - y).abs() < 1e-12);
        }
        assert!(matches!(
            messages.last(),
            Some(MonitorMessage::Disconnected(reason)) if reason == "connection closed by server"
        ));
    }
    #[test]
    fn large_blocks_owe_catch_up_events() {
        let (port, server) = mock_server(|mut stream| {
            read_command(&stream);
            stream.write_all(&[0, 0, 0, 0, 0]).unwrap();
            for value in 1..=3 {
                let block = vec![Sample::new(value, -value); 1000];
                stream.write_all(&encode(&block)).unwrap();
            }
        });
        let (tx, rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(port), 3, Arc::new(tx)).unwrap();
        monitor.resize(1000, 400).unwrap();
        monitor.start().unwrap();
        let messages = drain(&rx);
        server.join().unwrap();
        monitor.stop();
        let windows: Vec<f64> = messages
            .iter()
            .filter_map(|m| match m {
                MonitorMessage::Data(w) => Some(w[[999, 0]]),
                _ => None,
            })
            .collect();
        // 1000 -> 2 events (200 left), 1200 -> 3 (0 left), 1000 -> 2 (200 left).
        assert_eq!(windows.len(), 7);
        let expected = [0.001, 0.001, 0.002, 0.002, 0.002, 0.003, 0.003];
        for (got, want) in windows.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }
    #[test]
    fn rejected_subscription_never_runs() {
        let (port, server) = mock_server(|mut stream| {
            read_command(&stream);
            stream.write_all(&[1]).unwrap();
            stream.write_all(b"bad mask\n").unwrap();
        });
        let (tx, rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(port), 3, Arc::new(tx)).unwrap();
        assert!(matches!(monitor.start(), Err(FaError::Protocol(_))));
        assert_eq!(monitor.state(), LoopState::Idle);
        server.join().unwrap();
        let messages: Vec<MonitorMessage> = rx.try_iter().collect();
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], MonitorMessage::Disconnected(r) if r == "bad mask"));
    }
    #[test]
    fn stop_joins_worker_and_reports_once() {
        let (port, server) = mock_server(|mut stream| {
            read_command(&stream);
            stream.write_all(&[0, 0, 0, 0, 0]).unwrap();
            let block = encode(&vec![Sample::new(1, 1); 1000]);
            // Keep streaming until the client hangs up.
            while stream.write_all(&block).is_ok() {
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        let (tx, rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(port), 3, Arc::new(tx)).unwrap();
        monitor.start().unwrap();
        assert!(matches!(monitor.start(), Err(FaError::AlreadyRunning)));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(MonitorMessage::Connected)
        ));
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Ok(MonitorMessage::Data(_))
        ));
        monitor.stop();
        assert_eq!(monitor.state(), LoopState::Idle);
        let rest: Vec<MonitorMessage> = rx.try_iter().collect();
        let eofs: Vec<&MonitorMessage> = rest
            .iter()
            .filter(|m| matches!(m, MonitorMessage::Disconnected(_)))
            .collect();
        assert_eq!(eofs.len(), 1);
        assert!(matches!(rest.last(), Some(MonitorMessage::Disconnected(r)) if r == "Stopped"));
        // Nothing more arrives after stop has returned.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        server.join().unwrap();
    }
    #[test]
    fn transport_error_faults_the_loop() {
        let (port, server) = mock_server(|mut stream| {
            read_command(&stream);
            stream.write_all(&[0, 0, 0, 0, 0]).unwrap();
        });
        let (tx, rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(port), 3, Arc::new(tx)).unwrap();
        monitor.start().unwrap();
        let messages = drain(&rx);
        server.join().unwrap();
        assert!(matches!(messages.last(), Some(MonitorMessage::Disconnected(_))));
        assert_eq!(monitor.state(), LoopState::Faulted);
        monitor.stop();
        assert_eq!(monitor.state(), LoopState::Idle);
    }
    #[test]
    fn cadence_carries_excess_progress() {
        let mut cadence = Cadence {
            notify_size: 10,
            update_size: 400,
            data_ready: 0,
        };
        assert_eq!(cadence.advance(1000), 2);
        assert_eq!(cadence.data_ready, 200);
        assert_eq!(cadence.advance(1000), 3);
        assert_eq!(cadence.data_ready, 0);
        cadence.update_size = 2500;
        assert_eq!(cadence.advance(1000), 0);
        assert_eq!(cadence.advance(1000), 0);
        assert_eq!(cadence.advance(1000), 1);
        assert_eq!(cadence.data_ready, 500);
    }
    #[test]
    fn resize_validates_sizes() {
        let (tx, _rx) = mpsc::channel();
        let mut monitor = AcquisitionLoop::new(config(1), 3, Arc::new(tx)).unwrap();
        assert!(monitor.resize(0, 10).is_err());
        assert!(monitor.resize(4001, 10).is_err());
        assert!(monitor.resize(10, 0).is_err());
        monitor.resize(2500, 1000).unwrap();
        assert_eq!(monitor.notify_size(), 2500);
        assert_eq!(monitor.read().unwrap().dim(), (2500, 2));
        assert!(AcquisitionLoop::new(config(1), 300, Arc::new(mpsc::channel().0)).is_err());
    }
}
