//! Assistive Lens - controller core for a wearable assistive vision device
//!
//! This library provides:
//! - Button gesture classification (single press, double tap, long press)
//! - A serialized speech output queue
//! - Background proximity monitoring with buzzer alerts
//! - Navigation guidance sessions
//! - Command dispatch from gestures, voice and a remote API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Inputs                          │
//! │   Buttons  │  Voice  │  Keyboard  │  Remote API      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Device                           │
//! │  Gestures │ Dispatcher │ Proximity │ Navigation      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Outputs                          │
//! │   Speech queue  │  Buzzer  │  LED  │  Event stream   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod hardware;
pub mod input;
pub mod navigation;
pub mod proximity;
pub mod services;
pub mod speech;
pub mod state;
pub mod task;
pub mod voice;

pub use config::Config;
pub use device::{Device, DeviceStatus};
pub use dispatch::{Command, CommandAck, CommandArgs, CommandDispatcher, GestureMap};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventKind};
pub use hardware::Hardware;
pub use input::{ButtonId, GestureEvent, GestureKind, Level};
pub use services::Services;
