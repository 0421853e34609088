//! Per-pin GPIO access to the MCP23017 16-bit I2C port-expander.
//!
//! The chip is driven through a write-only shadow register model: every single-pin change is one
//! register write, nothing is read back except live pin levels and the interrupt registers.  The
//! shared interrupt line is demultiplexed into per-pin [`EdgeEvent`]s.
//!
//! ```no_run
//! # let i2c = embedded_hal_mock::eh1::i2c::Mock::new(&[]);
//! use mcp23017_gpio::{Edge, EdgeEvent, Mcp23017, PinDirection, PinOptions};
//!
//! let chip = Mcp23017::attach(i2c, false, false, false).unwrap();
//!
//! let mut led = chip
//!     .pin("io-0", PinOptions::new().direction(PinDirection::OutputLow))
//!     .unwrap();
//! let _button = chip
//!     .pin("io-8", PinOptions::new().edge(Edge::Falling).active_low(true))
//!     .unwrap();
//!
//! led.write(true).unwrap();
//!
//! // from the handler of the host pin wired to INTA/INTB:
//! chip.handle_interrupt(&mut |event: EdgeEvent| {
//!     assert_eq!(event.pin, 8);
//! })
//! .unwrap();
//! ```
#![cfg_attr(not(test), no_std)]

#[cfg(feature = "std")]
extern crate std;

mod bus;
mod common;
pub mod dev;
mod interrupt;
mod mutex;
mod pin;

pub use bus::{I2cBus, Mcp23017Bus, RegisterBus};
pub use common::{
    pin_index, ConfigError, Direction, Edge, Level, PinDirection, PinOptions, Port, PIN_COUNT,
};
pub use interrupt::{EdgeEvent, EdgeEvents, EdgeListener};
pub use mutex::PortMutex;
pub use pin::{Pin, PinError};

pub use dev::mcp23017::Mcp23017;
