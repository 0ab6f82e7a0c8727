//! Mock device connector simulating an access switch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::device::{
    CliDialect, DeviceConnector, DeviceSession, DeviceTarget, SessionError, SHOW_INTERFACES_TRUNK,
    SHOW_VLAN_BRIEF,
};

/// VLANs and port memberships of the simulated switch.
#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    /// VLAN id → name.
    pub vlans: BTreeMap<u16, String>,
    /// Access port → VLAN id.
    pub access: BTreeMap<String, u16>,
    /// Port → voice VLAN id, listed in addition to the access VLAN.
    pub voice: BTreeMap<String, u16>,
    pub trunks: BTreeSet<String>,
}

impl SwitchState {
    /// `show vlan brief`, four ports per line like IOS.
    pub fn render_vlan_brief(&self) -> String {
        let mut out = String::from(
            "VLAN Name                             Status    Ports\n\
             ---- -------------------------------- --------- -------------------------------\n",
        );
        for (id, name) in &self.vlans {
            let ports: Vec<&str> = self
                .access
                .iter()
                .chain(self.voice.iter())
                .filter(|(_, vlan)| *vlan == id)
                .map(|(port, _)| port.as_str())
                .collect();

            let mut chunks = ports.chunks(4);
            let first = chunks.next().map(|c| c.join(", ")).unwrap_or_default();
            out.push_str(
                format!("{:<4} {:<32} {:<9} {}", id, name, "active", first).trim_end(),
            );
            out.push('\n');
            for chunk in chunks {
                out.push_str(&format!("{:<48}{}\n", "", chunk.join(", ")));
            }
        }
        out
    }

    /// `show interfaces trunk`; empty when there are no trunks.
    pub fn render_trunks(&self) -> String {
        if self.trunks.is_empty() {
            return String::new();
        }
        let mut out =
            String::from("\nPort        Mode             Encapsulation  Status        Native vlan\n");
        for port in &self.trunks {
            out.push_str(&format!(
                "{:<12}{:<17}{:<15}{:<14}{}\n",
                port, "on", "802.1q", "trunking", 1
            ));
        }
        out.push_str("\nPort        Vlans allowed on trunk\n");
        for port in &self.trunks {
            out.push_str(&format!("{:<12}{}\n", port, "1-4094"));
        }
        out
    }
}

#[derive(Debug, Default)]
struct MockInner {
    state: RwLock<SwitchState>,
    /// Address → error returned by `open`.
    open_errors: RwLock<HashMap<String, SessionError>>,
    /// Commands containing this text fail with a transport error.
    fail_trigger: RwLock<Option<String>>,
    /// Accept config lines without changing state.
    ignore_changes: AtomicBool,
    command_delay: RwLock<Option<Duration>>,
    config_lines: RwLock<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
    persisted: AtomicUsize,
}

/// Mock implementation of the DeviceConnector trait.
///
/// Every address reaches the same simulated switch. Provides controllable
/// behavior for testing:
/// - Seed VLANs, access ports, voice ports and trunks
/// - Fail `open` per address with any session error
/// - Drop the connection when a command matches a trigger
/// - Count opened/closed sessions for leak assertions
///
/// # Example
///
/// ```rust,ignore
/// let device = MockDeviceConnector::new();
/// device.add_vlan(8, "DATA").await;
/// device.set_access_port("Gi0/13", 5).await;
///
/// // ... run a job ...
///
/// assert_eq!(device.access_vlan("Gi0/13").await, Some(8));
/// assert_eq!(device.opened(), device.closed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDeviceConnector {
    inner: Arc<MockInner>,
}

impl MockDeviceConnector {
    /// Create a switch with only the default VLAN.
    pub fn new() -> Self {
        let connector = Self::default();
        if let Ok(mut state) = connector.inner.state.try_write() {
            state.vlans.insert(1, "default".to_string());
        }
        connector
    }

    pub async fn add_vlan(&self, id: u16, name: &str) {
        self.inner
            .state
            .write()
            .await
            .vlans
            .insert(id, name.to_string());
    }

    pub async fn set_access_port(&self, port: &str, vlan: u16) {
        self.inner
            .state
            .write()
            .await
            .access
            .insert(port.to_string(), vlan);
    }

    pub async fn set_voice_port(&self, port: &str, vlan: u16) {
        self.inner
            .state
            .write()
            .await
            .voice
            .insert(port.to_string(), vlan);
    }

    pub async fn add_trunk(&self, port: &str) {
        self.inner
            .state
            .write()
            .await
            .trunks
            .insert(port.to_string());
    }

    pub async fn access_vlan(&self, port: &str) -> Option<u16> {
        self.inner.state.read().await.access.get(port).copied()
    }

    pub async fn state(&self) -> SwitchState {
        self.inner.state.read().await.clone()
    }

    /// Make `open` to `address` fail with `error`.
    pub async fn fail_open(&self, address: &str, error: SessionError) {
        self.inner
            .open_errors
            .write()
            .await
            .insert(address.to_string(), error);
    }

    pub async fn clear_open_failures(&self) {
        self.inner.open_errors.write().await.clear();
    }

    /// Fail any command or config line containing `trigger`.
    pub async fn fail_on_command(&self, trigger: &str) {
        *self.inner.fail_trigger.write().await = Some(trigger.to_string());
    }

    pub fn set_ignore_changes(&self, ignore: bool) {
        self.inner.ignore_changes.store(ignore, Ordering::SeqCst);
    }

    pub async fn set_command_delay(&self, delay: Duration) {
        *self.inner.command_delay.write().await = Some(delay);
    }

    /// Config lines received, in order, across all sessions.
    pub async fn config_lines(&self) -> Vec<String> {
        self.inner.config_lines.read().await.clone()
    }

    pub fn opened(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Most sessions open at the same time.
    pub fn peak_sessions(&self) -> usize {
        self.inner.peak_live.load(Ordering::SeqCst)
    }

    /// Times the running config was saved.
    pub fn persisted(&self) -> usize {
        self.inner.persisted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceConnector for MockDeviceConnector {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(
        &self,
        target: &DeviceTarget,
        _dialect: &CliDialect,
    ) -> Result<Box<dyn DeviceSession>, SessionError> {
        if let Some(err) = self.inner.open_errors.read().await.get(&target.address) {
            return Err(err.clone());
        }

        self.inner.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.inner.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockSession {
            inner: Arc::clone(&self.inner),
            interface: None,
            closed: false,
        }))
    }
}

struct MockSession {
    inner: Arc<MockInner>,
    /// Interface selected by the last `interface` config line.
    interface: Option<String>,
    closed: bool,
}

impl MockSession {
    async fn check(&self, command: &str) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if let Some(delay) = *self.inner.command_delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if let Some(trigger) = self.inner.fail_trigger.read().await.as_deref() {
            if command.contains(trigger) {
                return Err(SessionError::Transport(format!(
                    "connection reset during '{}'",
                    command
                )));
            }
        }
        Ok(())
    }

    async fn apply_line(&mut self, line: &str) -> Result<(), SessionError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["interface", name] => self.interface = Some(name.to_string()),
            ["switchport", "access", "vlan", id] => {
                let id: u16 = id.parse().map_err(|_| SessionError::CommandRejected {
                    command: line.to_string(),
                    output: "% Invalid input detected at '^' marker.".to_string(),
                })?;
                let Some(port) = self.interface.clone() else {
                    return Err(SessionError::CommandRejected {
                        command: line.to_string(),
                        output: "% Invalid input detected at '^' marker.".to_string(),
                    });
                };
                if !self.inner.ignore_changes.load(Ordering::SeqCst) {
                    let mut state = self.inner.state.write().await;
                    state
                        .vlans
                        .entry(id)
                        .or_insert_with(|| format!("VLAN{:04}", id));
                    state.access.insert(port, id);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    async fn run(&mut self, command: &str) -> Result<String, SessionError> {
        self.check(command).await?;
        let state = self.inner.state.read().await;
        Ok(match command {
            SHOW_VLAN_BRIEF => state.render_vlan_brief(),
            SHOW_INTERFACES_TRUNK => state.render_trunks(),
            _ => String::new(),
        })
    }

    async fn apply_config(&mut self, lines: &[String]) -> Result<String, SessionError> {
        for line in lines {
            self.check(line).await?;
            self.inner.config_lines.write().await.push(line.clone());
            self.apply_line(line).await?;
        }
        self.interface = None;
        Ok(String::new())
    }

    async fn persist(&mut self) -> Result<(), SessionError> {
        self.check("write memory").await?;
        self.inner.persisted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            self.closed = true;
            self.inner.closed.fetch_add(1, Ordering::SeqCst);
            self.inner.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CiscoIosDriver, DeviceDriver};
    use crate::parser::{current_assignment, is_trunk_port, PortVlanFact};

    #[tokio::test]
    async fn test_rendered_tables_parse() {
        let device = MockDeviceConnector::new();
        device.add_vlan(8, "DATA").await;
        device.add_vlan(100, "VOICE").await;
        for port in ["Gi0/1", "Gi0/2", "Gi0/3", "Gi0/4", "Gi0/13"] {
            device.set_access_port(port, 8).await;
        }
        device.set_voice_port("Gi0/13", 100).await;
        device.add_trunk("Gi0/24").await;

        let state = device.state().await;
        let brief = state.render_vlan_brief();
        assert!(brief.contains("8    DATA"));
        assert_eq!(
            current_assignment(&brief, "Gi0/13"),
            PortVlanFact::assigned("DATA", 8)
        );
        assert_eq!(current_assignment(&brief, "Gi0/24"), PortVlanFact::Unknown);
        assert!(is_trunk_port(&state.render_trunks(), "Gi0/24"));
        assert!(!is_trunk_port(&state.render_trunks(), "Gi0/13"));
    }

    #[tokio::test]
    async fn test_session_applies_and_counts() {
        let device = MockDeviceConnector::new();
        device.set_access_port("Gi0/5", 1).await;

        let target = DeviceTarget::new("10.0.0.1", 22);
        let driver = CiscoIosDriver::new();
        let mut session = device.open(&target, driver.dialect()).await.unwrap();
        session
            .apply_config(&[
                "interface Gi0/5".to_string(),
                "switchport access vlan 12".to_string(),
            ])
            .await
            .unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(device.access_vlan("Gi0/5").await, Some(12));
        assert_eq!(device.opened(), 1);
        assert_eq!(device.closed(), 1);
        assert!(matches!(
            session.run(SHOW_VLAN_BRIEF).await,
            Err(SessionError::Closed)
        ));
    }
}
