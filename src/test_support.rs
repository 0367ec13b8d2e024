//! Scripted in-memory thermostat used by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::ble::link::{ConnectableDevice, GattLink};
use crate::ble::uuids::{JSON_CMD_UUID, PASSWORD_CMD_UUID};
use crate::error::{Error, Result};

pub(crate) const SAMPLE_STATUS: &str = r#"{"SN":"ET-0042","Z_sts":{"0":[65,70,72,68,60,0,1,0,0,128,2,0,74,0,0,0]},"PRM":[]}"#;

/// Outcome of one scripted call. Unscripted calls succeed.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Ok,
    Fail(&'static str),
    Hang,
}

/// Something that happened on the fake radio, tagged with the connection id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Connect(usize),
    Write(usize, Uuid),
    Read(usize, Uuid),
    Disconnect(usize),
}

#[derive(Default)]
struct Shared {
    connect_script: VecDeque<Step>,
    write_script: VecDeque<Step>,
    command_write_script: VecDeque<Step>,
    read_script: VecDeque<Step>,
    events: Vec<Event>,
    writes: Vec<(Uuid, Vec<u8>)>,
    connects: usize,
    connect_attempts: usize,
    busy: bool,
    overlaps: usize,
    status_payload: Vec<u8>,
    links: Vec<Arc<AtomicBool>>,
}

#[derive(Clone)]
pub(crate) struct FakeDevice {
    address: String,
    has_services: bool,
    shared: Arc<Mutex<Shared>>,
}

impl FakeDevice {
    pub(crate) fn new(address: &str) -> Self {
        let shared = Shared {
            status_payload: SAMPLE_STATUS.as_bytes().to_vec(),
            ..Default::default()
        };
        Self {
            address: address.to_string(),
            has_services: true,
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    pub(crate) fn without_services(mut self) -> Self {
        self.has_services = false;
        self
    }

    pub(crate) fn with_status(self, payload: &str) -> Self {
        self.shared.lock().status_payload = payload.as_bytes().to_vec();
        self
    }

    pub(crate) fn script_connects(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().connect_script.extend(steps);
    }

    /// Script every write, password included.
    pub(crate) fn script_writes(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().write_script.extend(steps);
    }

    /// Script writes to the command characteristic only.
    pub(crate) fn script_command_writes(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().command_write_script.extend(steps);
    }

    pub(crate) fn script_reads(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().read_script.extend(steps);
    }

    /// Drop every open link as if the device went out of range.
    pub(crate) fn drop_links(&self) {
        for link in &self.shared.lock().links {
            link.store(false, Ordering::SeqCst);
        }
    }

    /// Connections that succeeded.
    pub(crate) fn connect_count(&self) -> usize {
        self.shared.lock().connects
    }

    /// Connection attempts, failed and hung ones included.
    pub(crate) fn connect_attempts(&self) -> usize {
        self.shared.lock().connect_attempts
    }

    pub(crate) fn disconnect_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Disconnect(_)))
            .count()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.shared.lock().events.clone()
    }

    /// Number of times two radio operations were in flight at once.
    pub(crate) fn overlaps(&self) -> usize {
        self.shared.lock().overlaps
    }

    pub(crate) fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.shared
            .lock()
            .writes
            .iter()
            .filter(|(u, _)| *u == uuid)
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub(crate) fn password_writes(&self) -> Vec<Vec<u8>> {
        self.writes_to(PASSWORD_CMD_UUID)
    }

    pub(crate) fn command_writes(&self) -> Vec<serde_json::Value> {
        self.writes_to(JSON_CMD_UUID)
            .iter()
            .map(|d| serde_json::from_slice(d).expect("command is JSON"))
            .collect()
    }

    fn enter(&self) {
        let mut shared = self.shared.lock();
        if shared.busy {
            shared.overlaps += 1;
        }
        shared.busy = true;
    }

    fn exit(&self) {
        self.shared.lock().busy = false;
    }

    async fn radio_time(&self) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn run(step: Step) -> Result<()> {
    match step {
        Step::Ok => Ok(()),
        Step::Fail(message) => Err(Error::transport(message)),
        Step::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl ConnectableDevice for FakeDevice {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<Box<dyn GattLink>> {
        let step = {
            let mut shared = self.shared.lock();
            shared.connect_attempts += 1;
            shared.connect_script.pop_front().unwrap_or(Step::Ok)
        };
        self.enter();
        self.radio_time().await;
        self.exit();
        run(step).await?;

        let connected = Arc::new(AtomicBool::new(true));
        let id = {
            let mut shared = self.shared.lock();
            shared.connects += 1;
            let id = shared.connects;
            shared.events.push(Event::Connect(id));
            shared.links.push(connected.clone());
            id
        };

        Ok(Box::new(FakeLink {
            id,
            device: self.clone(),
            connected,
        }))
    }
}

struct FakeLink {
    id: usize,
    device: FakeDevice,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl GattLink for FakeLink {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn has_services(&self) -> bool {
        self.device.has_services
    }

    async fn discover_services(&self) -> Result<()> {
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8], _with_response: bool) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        let step = {
            let mut shared = self.device.shared.lock();
            let scripted = if characteristic == JSON_CMD_UUID {
                shared.command_write_script.pop_front()
            } else {
                None
            };
            scripted
                .or_else(|| shared.write_script.pop_front())
                .unwrap_or(Step::Ok)
        };

        self.device.enter();
        self.device.radio_time().await;
        {
            let mut shared = self.device.shared.lock();
            shared.events.push(Event::Write(self.id, characteristic));
            shared.writes.push((characteristic, data.to_vec()));
        }
        self.device.exit();

        run(step).await
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }

        let step = self.device.shared.lock().read_script.pop_front().unwrap_or(Step::Ok);

        self.device.enter();
        self.device.radio_time().await;
        self.device
            .shared
            .lock()
            .events
            .push(Event::Read(self.id, characteristic));
        self.device.exit();

        run(step).await?;
        Ok(self.device.shared.lock().status_payload.clone())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.device
            .shared
            .lock()
            .events
            .push(Event::Disconnect(self.id));
        Ok(())
    }
}
