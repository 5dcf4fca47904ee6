//! Read status from, and set the target temperature of, WT-0001 compressor fridge controllers over Bluetooth Low Energy
//!
//! These controllers are found in portable 12 V compressor fridges sold under brands such as Vevor and
//! Alpicool. They expose one GATT characteristic to write commands to and one that notifies replies.
//! Commands and replies share a simple frame format: a `FE FE` header, a length byte, a command byte,
//! a payload and a 16 bit sum checksum.
//!
//! Currently the following data can be accessed:
//!
//! - Actual temperature (°C)
//! - Target temperature (°C), which can also be set
//! - Battery charge (%)
//! - Battery voltage (V)
//!
//! The [`sync`] module can additionally mirror the fridge into a Domoticz home automation server.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::time::Duration;
//! #
//! # #[tokio::main]
//! # pub async fn main(){
//!     let mut fridge_client = fridgeread::FridgeClient::new_default().await.unwrap();
//!     loop {
//!         let fridge_state = fridge_client.fetch_state().await.unwrap();
//!         println!("{fridge_state}");
//!         tokio::time::sleep(Duration::from_secs(5)).await;
//!     }
//! # }
//! ```

pub mod command;
pub mod config;
pub mod domoticz;
pub mod frame;
mod fridge_client;
mod fridge_state;
pub mod logging;
pub mod message;
pub mod sync;

pub use command::Command;
pub use config::{Config, DeviceSettings, DomoticzSettings};
pub use fridge_client::FridgeClient;
pub use fridge_state::FridgeState;
