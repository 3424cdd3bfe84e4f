// MIT License - Copyright (c) 2026 Peter Wright
// Partition state model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::messages::notifications::{DelayFlags, ReadyStatus};
use crate::messages::records::ArmMode;

/// Arming status of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmingStatus {
    Unknown,
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
    Arming,
    Pending,
    Triggered,
}

impl ArmingStatus {
    /// Map a wire arm mode onto a stored status. Unrecognised modes are
    /// treated as away-armed, the most restrictive assumption.
    pub fn from_arm_mode(mode: ArmMode) -> Self {
        match mode {
            ArmMode::Disarm => Self::Disarmed,
            ArmMode::AwayArm | ArmMode::AwayArmQuick | ArmMode::ArmWithNoEntryDelay => {
                Self::ArmedAway
            }
            ArmMode::StayArm | ArmMode::StayArmQuick => Self::ArmedHome,
            ArmMode::NightArm => Self::ArmedNight,
            ArmMode::Other(_) => Self::ArmedAway,
        }
    }
}

/// A running exit-delay countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitDelay {
    pub started_at: DateTime<Utc>,
    pub duration_secs: u16,
    pub audible: bool,
    pub urgent: bool,
}

impl ExitDelay {
    /// Seconds left on the countdown at `now`; zero once elapsed.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - self.started_at).num_seconds();
        (self.duration_secs as i64 - elapsed).max(0)
    }
}

/// Live state of one partition, lazily created on the first notification
/// that references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionState {
    pub number: u8,
    pub name: Option<String>,
    pub status: ArmingStatus,
    pub is_ready: bool,
    pub exit_delay: Option<ExitDelay>,
    pub last_updated: DateTime<Utc>,
}

impl PartitionState {
    pub fn new(number: u8) -> Self {
        Self {
            number,
            name: None,
            status: ArmingStatus::Unknown,
            is_ready: false,
            exit_delay: None,
            last_updated: Utc::now(),
        }
    }

    /// Effective status as seen by subscribers: a partition with a live
    /// exit-delay countdown reads as `Arming` regardless of the stored
    /// status.
    pub fn effective_status(&self) -> ArmingStatus {
        self.effective_status_at(Utc::now())
    }

    pub fn effective_status_at(&self, now: DateTime<Utc>) -> ArmingStatus {
        match &self.exit_delay {
            Some(delay) if delay.remaining_secs(now) > 0 => ArmingStatus::Arming,
            _ => self.status,
        }
    }

    /// Apply an arm/disarm notification. Disarming clears any exit delay.
    pub fn apply_arm_mode(&mut self, mode: ArmMode) {
        self.status = ArmingStatus::from_arm_mode(mode);
        if self.status == ArmingStatus::Disarmed {
            self.exit_delay = None;
        }
        self.last_updated = Utc::now();
    }

    /// Apply a readiness notification. A ready report always means the
    /// partition is disarmed, so the stored status and any exit delay are
    /// reset unconditionally.
    pub fn apply_ready_status(&mut self, status: ReadyStatus) {
        self.is_ready = status.is_ready();
        self.status = ArmingStatus::Disarmed;
        self.exit_delay = None;
        self.last_updated = Utc::now();
    }

    /// Apply an exit-delay notification.
    ///
    /// A repeated active report with the same duration keeps the original
    /// `started_at` so the countdown does not restart on retransmits; any
    /// change of duration, or a fresh activation, restarts the clock.
    pub fn apply_exit_delay(&mut self, flags: DelayFlags, duration: u16, now: DateTime<Utc>) {
        if flags.contains(DelayFlags::ACTIVE) && duration > 0 {
            let started_at = match &self.exit_delay {
                Some(existing) if existing.duration_secs == duration => existing.started_at,
                _ => now,
            };
            self.exit_delay = Some(ExitDelay {
                started_at,
                duration_secs: duration,
                audible: flags.contains(DelayFlags::AUDIBLE),
                urgent: flags.contains(DelayFlags::URGENT),
            });
        } else {
            self.exit_delay = None;
        }
        self.last_updated = Utc::now();
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Partition {}", self.number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_arm_mode_mapping() {
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::Disarm), ArmingStatus::Disarmed);
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::AwayArm), ArmingStatus::ArmedAway);
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::AwayArmQuick), ArmingStatus::ArmedAway);
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::StayArm), ArmingStatus::ArmedHome);
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::StayArmQuick), ArmingStatus::ArmedHome);
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::NightArm), ArmingStatus::ArmedNight);
        assert_eq!(
            ArmingStatus::from_arm_mode(ArmMode::ArmWithNoEntryDelay),
            ArmingStatus::ArmedAway
        );
        assert_eq!(ArmingStatus::from_arm_mode(ArmMode::Other(0x7F)), ArmingStatus::ArmedAway);
    }

    #[test]
    fn test_disarm_clears_exit_delay() {
        let mut part = PartitionState::new(1);
        part.apply_exit_delay(DelayFlags::ACTIVE, 60, Utc::now());
        assert!(part.exit_delay.is_some());
        part.apply_arm_mode(ArmMode::Disarm);
        assert_eq!(part.status, ArmingStatus::Disarmed);
        assert!(part.exit_delay.is_none());
    }

    #[test]
    fn test_ready_overrides_everything() {
        let mut part = PartitionState::new(1);
        part.status = ArmingStatus::ArmedAway;
        part.apply_exit_delay(DelayFlags::ACTIVE, 60, Utc::now());

        part.apply_ready_status(ReadyStatus::ReadyToArm);
        assert_eq!(part.status, ArmingStatus::Disarmed);
        assert!(part.is_ready);
        assert!(part.exit_delay.is_none());

        part.apply_ready_status(ReadyStatus::NotReady);
        assert_eq!(part.status, ArmingStatus::Disarmed);
        assert!(!part.is_ready);
    }

    #[test]
    fn test_exit_delay_idempotent_restart() {
        let mut part = PartitionState::new(1);
        let t0 = Utc::now();
        part.apply_exit_delay(DelayFlags::ACTIVE | DelayFlags::AUDIBLE, 60, t0);
        let started = part.exit_delay.as_ref().unwrap().started_at;

        // Same duration, still active: started_at is preserved.
        part.apply_exit_delay(DelayFlags::ACTIVE | DelayFlags::AUDIBLE, 60, t0 + Duration::seconds(5));
        assert_eq!(part.exit_delay.as_ref().unwrap().started_at, started);

        // Different duration restarts the countdown.
        let t1 = t0 + Duration::seconds(10);
        part.apply_exit_delay(DelayFlags::ACTIVE, 30, t1);
        assert_eq!(part.exit_delay.as_ref().unwrap().started_at, t1);

        // Inactive report clears it.
        part.apply_exit_delay(DelayFlags::empty(), 30, t1);
        assert!(part.exit_delay.is_none());
    }

    #[test]
    fn test_exit_delay_flag_updates_follow_notifications() {
        let mut part = PartitionState::new(1);
        let t0 = Utc::now();
        part.apply_exit_delay(DelayFlags::ACTIVE | DelayFlags::AUDIBLE, 60, t0);
        let delay = part.exit_delay.as_ref().unwrap();
        assert!(delay.audible);
        assert!(!delay.urgent);

        part.apply_exit_delay(DelayFlags::ACTIVE | DelayFlags::URGENT, 60, t0);
        let delay = part.exit_delay.as_ref().unwrap();
        assert!(!delay.audible);
        assert!(delay.urgent);
        assert_eq!(delay.started_at, t0);
    }

    #[test]
    fn test_effective_status_override() {
        let mut part = PartitionState::new(1);
        part.status = ArmingStatus::ArmedAway;
        let t0 = Utc::now();
        part.apply_exit_delay(DelayFlags::ACTIVE, 60, t0);

        assert_eq!(part.effective_status_at(t0 + Duration::seconds(10)), ArmingStatus::Arming);
        // After the countdown runs out, the stored status shows through.
        assert_eq!(
            part.effective_status_at(t0 + Duration::seconds(61)),
            ArmingStatus::ArmedAway
        );
    }

    #[test]
    fn test_remaining_secs_clamps_to_zero() {
        let t0 = Utc::now();
        let delay = ExitDelay {
            started_at: t0,
            duration_secs: 10,
            audible: false,
            urgent: false,
        };
        assert_eq!(delay.remaining_secs(t0), 10);
        assert_eq!(delay.remaining_secs(t0 + Duration::seconds(4)), 6);
        assert_eq!(delay.remaining_secs(t0 + Duration::seconds(30)), 0);
    }
}
