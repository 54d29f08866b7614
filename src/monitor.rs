// src/monitor.rs
//! Serial connection loop

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};

use crate::bus::EventEmitter;
use crate::config::BridgeConfig;
use crate::error::{GpsError, Result};
use crate::gps::data::FixRecord;
use crate::gps::nmea;

/// Cooperative shutdown token shared between the connection loop and the
/// signal handlers. Cancellation is observed between read cycles and wakes
/// any pending backoff sleep or blocking read.
pub struct Shutdown {
    flag: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before re-checking the flag so a concurrent cancel
            // cannot slip between the check and the await
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the `Connecting → Connected → Disconnected` cycle against the
/// configured serial device, forever, until cancelled.
///
/// The fix record is owned here and mutated only by this loop; each decoded
/// sentence republishes the full record on the bus.
pub struct GpsMonitor {
    config: BridgeConfig,
    emitter: EventEmitter,
    shutdown: Arc<Shutdown>,
    record: FixRecord,
}

impl GpsMonitor {
    pub fn new(config: BridgeConfig, emitter: EventEmitter, shutdown: Arc<Shutdown>) -> Self {
        Self {
            config,
            emitter,
            shutdown,
            record: FixRecord::new(),
        }
    }

    /// Outer retry loop: one connection session per iteration, with a fixed
    /// delay between attempts.
    pub async fn run(&mut self) -> Result<()> {
        while !self.shutdown.is_cancelled() {
            self.run_session().await;
            if self.shutdown.is_cancelled() {
                break;
            }

            debug!(
                "Reconnecting to '{}' in {:?}",
                self.config.device,
                self.config.reconnect_delay()
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = sleep(self.config.reconnect_delay()) => {}
            }
        }

        info!("Connection loop stopped");
        Ok(())
    }

    /// One `Connecting → Connected → Disconnected` cycle. Every exit path
    /// returns to the caller's retry delay; the serial handle never outlives
    /// the session.
    async fn run_session(&mut self) {
        let device = self.config.device.clone();

        if !Path::new(&device).exists() {
            let err = GpsError::DeviceMissing(device);
            error!("{}", err);
            self.emitter.error(&err.to_string());
            return;
        }

        info!("Starting GPS on '{}'", device);
        let serial = tokio_serial::new(&device, self.config.baud)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(self.config.read_timeout())
            .open_native_async();

        let serial = match serial {
            Ok(serial) => serial,
            Err(e) => {
                let err = GpsError::Connection(format!(
                    "Failed to open serial port {}: {}",
                    device, e
                ));
                error!("{}", err);
                self.emitter.error(&err.to_string());
                return;
            }
        };

        self.connected_session(serial, &device).await;
    }

    /// Connected state: announce the device, pump lines until the source
    /// fails or shutdown is requested, then announce the disconnect. The
    /// source is dropped (closed) before the disconnect event goes out.
    async fn connected_session<R>(&mut self, source: R, device: &str)
    where
        R: AsyncRead + Unpin,
    {
        self.emitter.connected(device);
        self.pump(source).await;
        self.emitter.disconnected(device);
    }

    /// Read loop for one connected session, generic over the byte source so
    /// tests can script reads. A timed-out read is an empty cycle, not a
    /// failure; EOF and I/O errors end the session.
    async fn pump<R>(&mut self, source: R)
    where
        R: AsyncRead + Unpin,
    {
        let shutdown = Arc::clone(&self.shutdown);
        let read_timeout = self.config.read_timeout();
        let mut reader = BufReader::new(source);
        let mut line = String::new();

        while !shutdown.is_cancelled() {
            line.clear();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                read = timeout(read_timeout, reader.read_line(&mut line)) => match read {
                    // Timeout with no data: skip this cycle
                    Err(_) => continue,
                    Ok(Ok(0)) => {
                        warn!("Serial port closed (EOF)");
                        break;
                    }
                    Ok(Ok(_)) => self.handle_line(&line),
                    Ok(Err(e)) => {
                        error!("Error reading from serial port: {}", e);
                        break;
                    }
                },
            }
        }
    }

    fn handle_line(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        debug!("{}", line);

        match nmea::apply_sentence(&mut self.record, line) {
            Ok(Some(_)) => self.emitter.data(&self.record),
            // Not a fix-bearing talker
            Ok(None) => {}
            Err(e) => warn!("Skipping sentence: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use tokio::io::ReadBuf;
    use tokio::time::Instant;

    use super::*;
    use crate::bus::testing::RecordingBus;
    use crate::bus::{
        BusPublisher, TOPIC_CONNECTED, TOPIC_DATA, TOPIC_DISCONNECTED, TOPIC_ERROR,
    };

    const GPRMC_LINE: &str =
        "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W\r\n";
    const GPGGA_LINE: &str =
        "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

    enum Step {
        Line(&'static str),
        Fail(io::ErrorKind),
        Stall,
    }

    /// Scripted serial port double. Counts drops so tests can assert the
    /// handle is closed exactly once per session.
    struct ScriptedPort {
        steps: VecDeque<Step>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedPort {
        fn new(steps: Vec<Step>, closed: Arc<AtomicUsize>) -> Self {
            Self {
                steps: steps.into(),
                closed,
            }
        }
    }

    impl AsyncRead for ScriptedPort {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.steps.front() {
                // The timeout or shutdown timer wakes the task
                Some(Step::Stall) => return Poll::Pending,
                None => return Poll::Ready(Ok(())), // EOF
                _ => {}
            }
            match self.steps.pop_front().unwrap() {
                Step::Line(line) => {
                    buf.put_slice(line.as_bytes());
                    Poll::Ready(Ok(()))
                }
                Step::Fail(kind) => Poll::Ready(Err(io::Error::new(kind, "scripted read failure"))),
                Step::Stall => unreachable!(),
            }
        }
    }

    impl Drop for ScriptedPort {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn monitor_with(
        device: &str,
        bus: &Arc<RecordingBus>,
        shutdown: &Arc<Shutdown>,
    ) -> GpsMonitor {
        let config = BridgeConfig {
            device: device.to_string(),
            ..BridgeConfig::default()
        };
        GpsMonitor::new(
            config,
            EventEmitter::new(bus.clone() as Arc<dyn BusPublisher>),
            Arc::clone(shutdown),
        )
    }

    #[tokio::test]
    async fn test_missing_device_emits_single_error() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/definitely/not/a/device", &bus, &shutdown);

        monitor.run_session().await;

        assert_eq!(bus.topics(), vec![TOPIC_ERROR.to_string()]);
        let frames = bus.frames();
        assert!(frames[0].1["error"]
            .as_str()
            .unwrap()
            .contains("does not exist"));
    }

    #[tokio::test]
    async fn test_read_failure_ends_session_and_closes_handle() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/dev/scripted", &bus, &shutdown);

        let closed = Arc::new(AtomicUsize::new(0));
        let port = ScriptedPort::new(
            vec![
                Step::Line(GPRMC_LINE),
                Step::Fail(io::ErrorKind::BrokenPipe),
            ],
            closed.clone(),
        );

        monitor.connected_session(port, "/dev/scripted").await;

        assert_eq!(closed.load(Ordering::Relaxed), 1);
        assert_eq!(
            bus.topics(),
            vec![
                TOPIC_CONNECTED.to_string(),
                TOPIC_DATA.to_string(),
                TOPIC_DISCONNECTED.to_string(),
            ]
        );

        let frames = bus.frames();
        let fix = &frames[1].1;
        assert_eq!(fix["validity"], "A");
        assert!((fix["latitude_decimal"].as_f64().unwrap() - 48.1173).abs() < 1e-4);
        assert!((fix["longitude_decimal"].as_f64().unwrap() - 11.5167).abs() < 1e-4);
        assert!((fix["speed_kmh"].as_f64().unwrap() - 41.5).abs() < 0.1);
    }

    #[tokio::test]
    async fn test_bad_lines_are_skipped_without_ending_session() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/dev/scripted", &bus, &shutdown);

        let closed = Arc::new(AtomicUsize::new(0));
        let port = ScriptedPort::new(
            vec![
                Step::Line("$GPRMC,123519,A\r\n"), // malformed: too few fields
                Step::Line("$GPGSV,3,1,12,01,40,083,46*75\r\n"), // unrecognized talker
                Step::Line(GPGGA_LINE),
            ],
            closed.clone(),
        );

        monitor.connected_session(port, "/dev/scripted").await;

        // Only the well-formed GPGGA produced a data event; EOF then ended
        // the session
        assert_eq!(
            bus.topics(),
            vec![
                TOPIC_CONNECTED.to_string(),
                TOPIC_DATA.to_string(),
                TOPIC_DISCONNECTED.to_string(),
            ]
        );
        let frames = bus.frames();
        assert_eq!(frames[1].1["altitude_m"], "545.4");
        assert_eq!(closed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reads_keep_session_alive() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/dev/scripted", &bus, &shutdown);

        let closed = Arc::new(AtomicUsize::new(0));
        let port = ScriptedPort::new(vec![Step::Line(GPRMC_LINE), Step::Stall], closed.clone());

        let stopper = Arc::clone(&shutdown);
        tokio::spawn(async move {
            sleep(Duration::from_millis(3500)).await;
            stopper.cancel();
        });

        let start = Instant::now();
        monitor.connected_session(port, "/dev/scripted").await;

        // Three 1 s read timeouts passed without ending the session; only
        // the cancellation at 3.5 s did
        assert!(start.elapsed() >= Duration::from_millis(3500));
        assert_eq!(
            bus.topics(),
            vec![
                TOPIC_CONNECTED.to_string(),
                TOPIC_DATA.to_string(),
                TOPIC_DISCONNECTED.to_string(),
            ]
        );
        assert_eq!(closed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_missing_device() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/definitely/not/a/device", &bus, &shutdown);

        let stopper = Arc::clone(&shutdown);
        tokio::spawn(async move {
            sleep(Duration::from_secs(12)).await;
            stopper.cancel();
        });

        monitor.run().await.unwrap();

        // Attempts at 0 s, 5 s and 10 s with the default 5 s backoff
        let errors = bus
            .topics()
            .iter()
            .filter(|topic| *topic == TOPIC_ERROR)
            .count();
        assert_eq!(errors, 3);
    }

    #[tokio::test]
    async fn test_cancelled_loop_exits_without_connecting() {
        let bus = Arc::new(RecordingBus::new());
        let shutdown = Arc::new(Shutdown::new());
        let mut monitor = monitor_with("/definitely/not/a/device", &bus, &shutdown);

        shutdown.cancel();
        monitor.run().await.unwrap();

        assert!(bus.frames().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let shutdown = Arc::new(Shutdown::new());

        let waiter = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;

        shutdown.cancel();
        handle.await.unwrap();
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_wait_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.cancel();
        shutdown.cancelled().await;
    }
}
