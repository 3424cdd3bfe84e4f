// MIT License - Copyright (c) 2026 Peter Wright

pub mod registry;
pub mod server;
pub mod session;

pub use registry::SessionRegistry;
pub use server::PanelServer;
pub use session::{Session, SessionHandle};
