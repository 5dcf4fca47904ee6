//! Keep a fridge and a Domoticz server in step.
//!
//! The measured and target temperatures are mirrored into Domoticz whenever
//! they change, and a setpoint changed in Domoticz is written to the fridge.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::DomoticzSettings;
use crate::domoticz::DomoticzClient;
use crate::fridge_client::FridgeClient;
use crate::fridge_state::FridgeState;

/// A value that should be pushed to Domoticz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Temperature(i8),
    Setpoint(i8),
}

/// What is known about the fridge and what Domoticz has already been told
#[derive(Debug, Default)]
pub struct SyncState {
    known_setpoint: Option<i8>,
    last_reported_temp: Option<i8>,
    last_reported_target: Option<i8>,
}

impl SyncState {
    pub fn known_setpoint(&self) -> Option<i8> {
        self.known_setpoint
    }

    /// Record a status report from the fridge, returning the values that changed since last reported.
    pub fn observe(&mut self, state: &FridgeState) -> Vec<Report> {
        let mut reports = Vec::new();
        if self.last_reported_temp != Some(state.actual_temp_c) {
            self.last_reported_temp = Some(state.actual_temp_c);
            reports.push(Report::Temperature(state.actual_temp_c));
        }
        if let Some(report) = self.target_applied(state.target_temp_c) {
            reports.push(report);
        }
        reports
    }

    /// Record that the fridge is now regulating towards `target`.
    pub fn target_applied(&mut self, target: i8) -> Option<Report> {
        self.known_setpoint = Some(target);
        if self.last_reported_target == Some(target) {
            return None;
        }
        self.last_reported_target = Some(target);
        Some(Report::Setpoint(target))
    }

    /// Decide whether a setpoint read from Domoticz should be written to the fridge.
    pub fn setpoint_change(&self, domoticz_setpoint: f32) -> Option<i8> {
        let rounded = domoticz_setpoint.round_ties_even();
        if !(i8::MIN as f32..=i8::MAX as f32).contains(&rounded) {
            warn!("Ignoring Domoticz setpoint {domoticz_setpoint}, out of range");
            return None;
        }
        let target = rounded as i8;
        (self.known_setpoint != Some(target)).then_some(target)
    }
}

/// Run until Ctrl-C, mirroring the fridge into Domoticz and applying setpoint changes.
pub async fn run(client: &mut FridgeClient, settings: &DomoticzSettings, initial_target: Option<i8>) -> anyhow::Result<()> {
    let domoticz = DomoticzClient::new(settings.url.clone(), settings.request_timeout())?;
    let mut state = SyncState::default();

    match client.fetch_state().await {
        Ok(fridge) => {
            info!("Initial state: {}", fridge.to_string().replace('\n', ", "));
            publish(&domoticz, settings, state.observe(&fridge)).await;
        }
        Err(err) => warn!("Could not read initial state: {err}"),
    }

    if let Some(target) = initial_target {
        apply_target(client, &domoticz, settings, &mut state, target).await?;
    }

    match state.known_setpoint() {
        Some(setpoint) => info!("Known fridge setpoint: {setpoint}°C"),
        None => warn!("Fridge setpoint unknown, Domoticz may be out of sync initially"),
    }

    info!("Polling Domoticz every {:?}. Press Ctrl+C to stop.", settings.poll_interval());
    let mut poller = SyncPoller { client, domoticz: &domoticz, settings, state };
    poll_until(ctrl_c(), settings.poll_interval(), &mut poller).await;
    info!("Stopping");
    Ok(())
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C: {err}");
        std::future::pending::<()>().await;
    }
}

/// One round of work in a polling loop
trait Poller {
    async fn poll(&mut self) -> anyhow::Result<()>;
}

struct SyncPoller<'a> {
    client: &'a mut FridgeClient,
    domoticz: &'a DomoticzClient,
    settings: &'a DomoticzSettings,
    state: SyncState,
}

impl Poller for SyncPoller<'_> {
    async fn poll(&mut self) -> anyhow::Result<()> {
        poll_once(self.client, self.domoticz, self.settings, &mut self.state).await
    }
}

/// Call `poller` every `period` until `shutdown` completes, abandoning a poll in progress.
///
/// Poll errors are logged and do not end the loop.
async fn poll_until<S: Future<Output = ()>>(shutdown: S, period: Duration, poller: &mut impl Poller) {
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            _ = interval.tick() => {}
        }
        tokio::select! {
            _ = &mut shutdown => return,
            result = poller.poll() => {
                if let Err(err) = result {
                    error!("Sync failed: {err:#}");
                }
            }
        }
    }
}

async fn poll_once(
    client: &mut FridgeClient,
    domoticz: &DomoticzClient,
    settings: &DomoticzSettings,
    state: &mut SyncState,
) -> anyhow::Result<()> {
    let fridge = client.fetch_state().await?;
    publish(domoticz, settings, state.observe(&fridge)).await;

    let Some(idx) = settings.setpoint_idx.as_deref() else {
        return Ok(());
    };
    let setpoint = domoticz.get_setpoint(idx).await?;
    if let Some(target) = state.setpoint_change(setpoint) {
        info!("New Domoticz setpoint {target}°C (fridge: {:?})", state.known_setpoint());
        apply_target(client, domoticz, settings, state, target).await?;
    }

    Ok(())
}

async fn apply_target(
    client: &mut FridgeClient,
    domoticz: &DomoticzClient,
    settings: &DomoticzSettings,
    state: &mut SyncState,
    target: i8,
) -> anyhow::Result<()> {
    let fridge = client.set_target_temperature(target).await?;
    let mut reports: Vec<Report> = state.target_applied(target).into_iter().collect();
    reports.extend(state.observe(&fridge));
    publish(domoticz, settings, reports).await;
    Ok(())
}

/// Push reports to their Domoticz devices. Failures are logged, not returned.
async fn publish(domoticz: &DomoticzClient, settings: &DomoticzSettings, reports: Vec<Report>) {
    for report in reports {
        let (idx, value) = match report {
            Report::Temperature(t) => (settings.temperature_idx.as_deref(), t),
            Report::Setpoint(t) => (settings.setpoint_idx.as_deref(), t),
        };
        let Some(idx) = idx else { continue };
        if let Err(err) = domoticz.update_device(idx, &value.to_string(), 0).await {
            warn!("Could not update Domoticz device {idx}: {err}");
        }
    }
}

#[cfg(test)]
fn fridge(actual: i8, target: i8) -> FridgeState {
    FridgeState { actual_temp_c: actual, target_temp_c: target, battery_pct: 90, battery_voltage_v: 12, battery_voltage_dv: 8 }
}

#[test]
fn test_first_observation_reports_everything() {
    let mut state = SyncState::default();
    assert_eq!(state.observe(&fridge(6, 4)), vec![Report::Temperature(6), Report::Setpoint(4)]);
    assert_eq!(state.known_setpoint(), Some(4));
}

#[test]
fn test_only_changes_reported() {
    let mut state = SyncState::default();
    state.observe(&fridge(6, 4));
    assert_eq!(state.observe(&fridge(6, 4)), vec![]);
    assert_eq!(state.observe(&fridge(5, 4)), vec![Report::Temperature(5)]);
    assert_eq!(state.observe(&fridge(5, -2)), vec![Report::Setpoint(-2)]);
}

#[test]
fn test_target_applied_suppresses_duplicate_report() {
    let mut state = SyncState::default();
    assert_eq!(state.target_applied(3), Some(Report::Setpoint(3)));
    assert_eq!(state.observe(&fridge(7, 3)), vec![Report::Temperature(7)]);
}

#[test]
fn test_setpoint_change() {
    let mut state = SyncState::default();
    assert_eq!(state.setpoint_change(4.0), Some(4));

    state.target_applied(4);
    assert_eq!(state.setpoint_change(4.0), None);
    assert_eq!(state.setpoint_change(4.4), None);
    assert_eq!(state.setpoint_change(4.5), None);
    assert_eq!(state.setpoint_change(5.5), Some(6));
    assert_eq!(state.setpoint_change(-3.2), Some(-3));
}

#[test]
fn test_setpoint_out_of_range() {
    let state = SyncState::default();
    assert_eq!(state.setpoint_change(300.0), None);
    assert_eq!(state.setpoint_change(f32::NAN), None);
    assert_eq!(state.setpoint_change(-128.0), Some(-128));
}

#[cfg(test)]
struct CountingPoller {
    polls: usize,
    poll_duration: Duration,
    fail: bool,
    started: Option<tokio::sync::oneshot::Sender<()>>,
}

#[cfg(test)]
impl Poller for CountingPoller {
    async fn poll(&mut self) -> anyhow::Result<()> {
        self.polls += 1;
        if let Some(started) = self.started.take() {
            let _ = started.send(());
        }
        tokio::time::sleep(self.poll_duration).await;
        if self.fail {
            anyhow::bail!("poll {} failed", self.polls);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_interrupts_running_poll() {
    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let mut poller =
        CountingPoller { polls: 0, poll_duration: Duration::from_secs(60), fail: false, started: Some(started_tx) };
    let shutdown = async {
        let _ = started_rx.await;
    };

    tokio::time::timeout(Duration::from_secs(5), poll_until(shutdown, Duration::from_millis(10), &mut poller))
        .await
        .expect("loop kept running after shutdown");
    assert_eq!(poller.polls, 1);
}

#[tokio::test]
async fn test_poll_errors_do_not_stop_loop() {
    let mut poller = CountingPoller { polls: 0, poll_duration: Duration::ZERO, fail: true, started: None };
    let shutdown = tokio::time::sleep(Duration::from_millis(200));

    tokio::time::timeout(Duration::from_secs(5), poll_until(shutdown, Duration::from_millis(10), &mut poller))
        .await
        .expect("loop kept running after shutdown");
    assert!(poller.polls >= 2, "only {} polls", poller.polls);
}
