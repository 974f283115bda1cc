//! The DTC table: single-writer actor owning all fault records (§3,
//! §4.10). Queries are served as snapshots, same shape as the Entity
//! Store and Broadcaster actors.

use crate::dtc::{CorrelationGroup, Dtc, FaultSeverity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

const INBOX_CAPACITY: usize = 256;

enum DiagMsg {
    Raise { protocol: String, source_address: u8, code: String, severity: FaultSeverity, reply: oneshot::Sender<()> },
    Clear { protocol: String, source_address: u8, code: String, reply: oneshot::Sender<()> },
    ActiveFaults { reply: oneshot::Sender<Vec<Dtc>> },
    BySourceAddress { source_address: u8, reply: oneshot::Sender<Vec<Dtc>> },
    ByProtocol { protocol: String, reply: oneshot::Sender<Vec<Dtc>> },
    CorrelationGroups { reply: oneshot::Sender<Vec<CorrelationGroup>> },
}

struct DiagState {
    faults: HashMap<(String, u8, String), Dtc>,
}

impl DiagState {
    fn raise(&mut self, protocol: String, source_address: u8, code: String, severity: FaultSeverity, now: DateTime<Utc>) {
        let key = (protocol.clone(), source_address, code.clone());
        self.faults
            .entry(key)
            .and_modify(|dtc| {
                dtc.active = true;
                dtc.last_seen = now;
                dtc.occurrence_count += 1;
                dtc.severity = severity;
            })
            .or_insert(Dtc { protocol, source_address, code, severity, active: true, first_seen: now, last_seen: now, occurrence_count: 1 });
    }

    fn clear(&mut self, protocol: &str, source_address: u8, code: &str, now: DateTime<Utc>) {
        if let Some(dtc) = self.faults.get_mut(&(protocol.to_string(), source_address, code.to_string())) {
            dtc.active = false;
            dtc.last_seen = now;
        }
    }

    fn correlation_groups(&self) -> Vec<CorrelationGroup> {
        let mut groups: HashMap<(u8, String), Vec<Dtc>> = HashMap::new();
        for dtc in self.faults.values() {
            groups.entry((dtc.source_address, dtc.code.clone())).or_default().push(dtc.clone());
        }
        groups
            .into_iter()
            .filter(|(_, faults)| faults.len() > 1 && overlapping_active_windows(faults))
            .map(|((source_address, code), faults)| CorrelationGroup { source_address, code, faults })
            .collect()
    }
}

/// Two or more protocols' windows overlap when every pair of
/// `[first_seen, last_seen]` ranges intersects (we treat still-active
/// faults as extending to "now" implicitly via their last `last_seen`
/// update on every raise).
fn overlapping_active_windows(faults: &[Dtc]) -> bool {
    faults.iter().all(|a| faults.iter().all(|b| a.first_seen <= b.last_seen && b.first_seen <= a.last_seen))
}

/// Cloneable handle to the running Cross-Protocol Diagnostics actor.
#[derive(Clone)]
pub struct DiagHandle {
    inbox: mpsc::Sender<DiagMsg>,
}

impl DiagHandle {
    pub fn spawn() -> Self {
        let (inbox_tx, mut inbox_rx) = mpsc::channel(INBOX_CAPACITY);

        tokio::spawn(async move {
            let mut state = DiagState { faults: HashMap::new() };

            while let Some(msg) = inbox_rx.recv().await {
                match msg {
                    DiagMsg::Raise { protocol, source_address, code, severity, reply } => {
                        state.raise(protocol, source_address, code, severity, Utc::now());
                        let _ = reply.send(());
                    }
                    DiagMsg::Clear { protocol, source_address, code, reply } => {
                        state.clear(&protocol, source_address, &code, Utc::now());
                        let _ = reply.send(());
                    }
                    DiagMsg::ActiveFaults { reply } => {
                        let _ = reply.send(state.faults.values().filter(|d| d.active).cloned().collect());
                    }
                    DiagMsg::BySourceAddress { source_address, reply } => {
                        let _ = reply.send(state.faults.values().filter(|d| d.source_address == source_address).cloned().collect());
                    }
                    DiagMsg::ByProtocol { protocol, reply } => {
                        let _ = reply.send(state.faults.values().filter(|d| d.protocol == protocol).cloned().collect());
                    }
                    DiagMsg::CorrelationGroups { reply } => {
                        let _ = reply.send(state.correlation_groups());
                    }
                }
            }
        });

        Self { inbox: inbox_tx }
    }

    pub async fn raise_fault(&self, protocol: &str, source_address: u8, code: &str, severity: FaultSeverity) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .inbox
            .send(DiagMsg::Raise { protocol: protocol.to_string(), source_address, code: code.to_string(), severity, reply: reply_tx })
            .await;
        let _ = reply_rx.await;
    }

    pub async fn clear_fault(&self, protocol: &str, source_address: u8, code: &str) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .inbox
            .send(DiagMsg::Clear { protocol: protocol.to_string(), source_address, code: code.to_string(), reply: reply_tx })
            .await;
        let _ = reply_rx.await;
    }

    pub async fn active_faults(&self) -> Vec<Dtc> {
        self.query(|reply| DiagMsg::ActiveFaults { reply }).await
    }

    pub async fn faults_by_source_address(&self, source_address: u8) -> Vec<Dtc> {
        self.query(|reply| DiagMsg::BySourceAddress { source_address, reply }).await
    }

    pub async fn faults_by_protocol(&self, protocol: &str) -> Vec<Dtc> {
        let protocol = protocol.to_string();
        self.query(|reply| DiagMsg::ByProtocol { protocol, reply }).await
    }

    pub async fn correlation_groups(&self) -> Vec<CorrelationGroup> {
        self.query(|reply| DiagMsg::CorrelationGroups { reply }).await
    }

    async fn query<T: Default>(&self, build: impl FnOnce(oneshot::Sender<T>) -> DiagMsg) -> T {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.inbox.send(build(reply_tx)).await.is_err() {
            return T::default();
        }
        reply_rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn raise_then_active_faults_reports_it() {
        let diag = DiagHandle::spawn();
        diag.raise_fault("j1939", 0x20, "SPN12-FMI3", FaultSeverity::Critical).await;

        let active = diag.active_faults().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].occurrence_count, 1);
    }

    #[tokio::test]
    async fn repeated_raise_bumps_occurrence_count() {
        let diag = DiagHandle::spawn();
        diag.raise_fault("j1939", 0x20, "SPN12-FMI3", FaultSeverity::Critical).await;
        diag.raise_fault("j1939", 0x20, "SPN12-FMI3", FaultSeverity::Critical).await;

        let active = diag.active_faults().await;
        assert_eq!(active[0].occurrence_count, 2);
    }

    #[tokio::test]
    async fn clear_marks_inactive_and_excludes_from_active_faults() {
        let diag = DiagHandle::spawn();
        diag.raise_fault("j1939", 0x20, "SPN12-FMI3", FaultSeverity::Critical).await;
        diag.clear_fault("j1939", 0x20, "SPN12-FMI3").await;

        assert!(diag.active_faults().await.is_empty());
        assert_eq!(diag.faults_by_source_address(0x20).await.len(), 1);
    }

    #[tokio::test]
    async fn correlated_faults_from_two_protocols_group_together() {
        let diag = DiagHandle::spawn();
        diag.raise_fault("j1939", 0x20, "SAME", FaultSeverity::Warning).await;
        diag.raise_fault("firefly", 0x20, "SAME", FaultSeverity::Warning).await;

        let groups = diag.correlation_groups().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].faults.len(), 2);
    }

    #[tokio::test]
    async fn distinct_source_addresses_do_not_correlate() {
        let diag = DiagHandle::spawn();
        diag.raise_fault("j1939", 0x20, "SAME", FaultSeverity::Warning).await;
        diag.raise_fault("firefly", 0x21, "SAME", FaultSeverity::Warning).await;

        assert!(diag.correlation_groups().await.is_empty());
    }
}
