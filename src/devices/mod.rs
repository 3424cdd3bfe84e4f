// MIT License - Copyright (c) 2026 Peter Wright

pub mod partition;
pub mod zone;

pub use partition::{ArmingStatus, ExitDelay, PartitionState};
pub use zone::ZoneState;
