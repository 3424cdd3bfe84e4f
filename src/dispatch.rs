// MIT License - Copyright (c) 2026 Peter Wright
// Routes decoded inbound records to state-update handlers

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::messages::notifications::LifestyleZoneStatus;
use crate::messages::{MessageRecord, ZoneConditionFlags};
use crate::state::PanelStateStore;

/// Routes each completed inbound exchange to the handlers interested in
/// the record's type.
///
/// Handler failures are logged and swallowed; a bad notification must
/// never take the session down with it.
pub struct NotificationDispatcher {
    store: Arc<PanelStateStore>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<PanelStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<PanelStateStore> {
        &self.store
    }

    /// Dispatch one decoded record for a session. A
    /// `MultipleMessagePacket` is unpacked and its contents dispatched
    /// individually, in order.
    pub async fn dispatch(&self, session_id: &str, record: &MessageRecord) {
        match record {
            MessageRecord::Multiple(container) => {
                for sub in &container.messages {
                    Box::pin(self.dispatch(session_id, sub)).await;
                }
            }

            MessageRecord::ArmDisarm(n) => {
                debug!(session_id, partition = n.partition, ?n.arm_mode, "Arm/disarm notification");
                self.store
                    .update_partition(session_id, n.partition, |p| p.apply_arm_mode(n.arm_mode))
                    .await;
            }

            MessageRecord::PartitionReadyStatus(n) => {
                debug!(session_id, partition = n.partition, "Ready status notification");
                self.store
                    .update_partition(session_id, n.partition, |p| p.apply_ready_status(n.status))
                    .await;
            }

            MessageRecord::ExitDelay(n) => {
                debug!(
                    session_id,
                    partition = n.partition,
                    duration = n.duration,
                    active = n.is_active(),
                    "Exit delay notification"
                );
                let now = Utc::now();
                self.store
                    .update_partition(session_id, n.partition, |p| {
                        p.apply_exit_delay(n.flags, n.duration, now)
                    })
                    .await;
            }

            // Entry delay does not change arming state; the partition is
            // touched so subscribers see the activity timestamp move.
            MessageRecord::EntryDelay(n) => {
                debug!(session_id, partition = n.partition, "Entry delay notification");
                self.store.update_partition(session_id, n.partition, |_| {}).await;
            }

            MessageRecord::LifestyleZoneStatus(n) => {
                let open = n.status == LifestyleZoneStatus::Open;
                self.store
                    .update_zone(session_id, n.zone, |z| z.is_open = open)
                    .await;
            }

            MessageRecord::ZoneStatus(n) => {
                let open = n.condition.contains(ZoneConditionFlags::OPEN);
                self.store
                    .update_zone(session_id, n.zone, |z| z.is_open = open)
                    .await;
            }

            MessageRecord::DateTimeBroadcast(n) => {
                self.store.sync_clock(session_id, n.timestamp).await;
            }

            MessageRecord::PartitionAlarm(n) => {
                warn!(
                    session_id,
                    partition = n.partition,
                    zone = n.zone,
                    ?n.alarm_type,
                    "Partition alarm"
                );
                self.store
                    .update_partition(session_id, n.partition, |p| {
                        p.status = crate::devices::ArmingStatus::Triggered;
                    })
                    .await;
            }

            MessageRecord::TroubleStatus(n) => {
                warn!(
                    session_id,
                    device = n.device,
                    trouble = n.trouble_type,
                    active = n.active,
                    "Trouble status"
                );
            }

            MessageRecord::PartitionLabel(n) => {
                let label = n.label.trim().to_string();
                self.store
                    .update_partition(session_id, n.partition, |p| {
                        p.name = (!label.is_empty()).then_some(label);
                    })
                    .await;
            }

            MessageRecord::ZoneLabel(n) => {
                let label = n.label.trim().to_string();
                self.store
                    .update_zone(session_id, n.zone, |z| {
                        z.name = (!label.is_empty()).then_some(label);
                    })
                    .await;
            }

            MessageRecord::ZoneAssignment(n) => {
                let partitions = n.partitions.clone();
                self.store
                    .update_zone(session_id, n.zone, |z| {
                        if !partitions.is_empty() {
                            z.partitions = partitions;
                        }
                    })
                    .await;
            }

            MessageRecord::SoftwareVersion(n) => {
                let version = format!("{}.{}.{}", n.major, n.minor, n.build);
                self.store
                    .update_session(session_id, |s| s.software_version = Some(version))
                    .await;
            }

            MessageRecord::Unknown(d) => {
                debug!(session_id, command = %d.command, len = d.raw.len(), "Unhandled command");
            }

            // Control and command records carry no panel state.
            _ => {}
        }
    }
}
