//! Support for the `MCP23017` "16-Bit I/O Expander with Serial Interface"
//!
//! Datasheet: https://ww1.microchip.com/downloads/en/devicedoc/20001952c.pdf
//!
//! The MCP23017 offers two eight-bit GPIO ports.  Both port interrupts are mirrored onto a single
//! line, which the host hands back to [`Mcp23017::handle_interrupt()`].
//!
//! When passing 16-bit values to this driver, the upper byte corresponds to port
//! B (pins 7..0) and the lower byte corresponds to port A (pins 7..0).
use crate::common::{Direction, Edge, Port, PIN_COUNT};
use crate::interrupt::{EdgeEvents, EdgeListener};
use crate::{Mcp23017Bus, Pin, PinError, PinOptions, PortMutex, RegisterBus};

/// IOCON value written to both ports on startup: MIRROR set, everything else at reset default.
pub const IOCON_CONFIG: u8 = 0b0100_0000;

/// `MCP23017` "16-Bit I/O Expander with Serial Interface"
pub struct Mcp23017<M>(M);

impl<I2C> Mcp23017<core::cell::RefCell<Driver<Mcp23017Bus<I2C>>>>
where
    I2C: crate::I2cBus,
{
    /// Create a new instance without touching the bus.
    pub fn new(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        Self::with_mutex(Mcp23017Bus::new(i2c, a0, a1, a2))
    }

    /// Create a new instance and bring the chip into its startup configuration.
    pub fn attach(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Result<Self, I2C::BusError> {
        let chip = Self::new(i2c, a0, a1, a2);
        chip.initialize()?;
        Ok(chip)
    }
}

impl<B, M> Mcp23017<M>
where
    B: RegisterBus,
    M: PortMutex<Port = Driver<B>>,
{
    /// Create a new instance over any [`RegisterBus`], shared through the mutex type `M`.
    ///
    /// Like [`new()`][Mcp23017::new], this does not touch the bus.
    pub fn with_mutex(bus: B) -> Self {
        Self(PortMutex::create(Driver::new(bus)))
    }

    /// Write the interrupt configuration and reset all registers to the factory state.
    pub fn initialize(&self) -> Result<(), B::BusError> {
        self.0.lock(|drv| drv.initialize())
    }

    /// Return all pins to inputs with interrupts disabled and output latches cleared.
    pub fn reset(&self) -> Result<(), B::BusError> {
        self.0.lock(|drv| drv.reset())
    }

    /// Look up a pin by name (`"io-0"` ... `"io-15"`).
    ///
    /// The first lookup of a name configures the pin from `options`.  Later lookups of the same
    /// name return a handle to the already configured pin and `options` are ignored.
    pub fn pin(
        &self,
        name: &str,
        options: PinOptions,
    ) -> Result<Pin<'_, M>, PinError<B::BusError>> {
        let index = crate::common::pin_index(name).map_err(PinError::Config)?;
        self.0.lock(|drv| {
            if drv.is_registered(index) {
                log::debug!("{} already configured, ignoring {:?}", name, options);
                return Ok(());
            }
            drv.register(index, options.active_low);
            if let Err(e) = crate::pin::configure(drv, index, options) {
                drv.unregister(index);
                return Err(PinError::BusError(e));
            }
            log::debug!("{} configured: {:?}", name, options);
            Ok(())
        })?;
        Ok(Pin::new(index, &self.0))
    }

    /// Service the shared interrupt line.
    ///
    /// Reads the interrupt flags and captured levels of both ports and hands every matching edge
    /// to `listener`, lowest pin first.  The listener runs after the controller has been
    /// released, so it may freely use pins of this chip.
    pub fn handle_interrupt<L: EdgeListener>(&self, listener: &mut L) -> Result<(), B::BusError> {
        let events = self.0.lock(|drv| drv.handle_interrupt())?;
        for event in events {
            listener.on_edge(event);
        }
        Ok(())
    }

    /// Reset the chip and give back the bus.
    pub fn detach(self) -> Result<B, B::BusError> {
        let mut drv = self.0.into_inner();
        drv.reset()?;
        log::debug!("detached");
        Ok(drv.release())
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// N.B.: These values are for BANK=0, which is the reset state of
/// the chip (and this driver does not change).
///
/// For all registers, the reset value is 0x00, except for
/// IODIR{A,B} which are 0xFF (making all pins inputs) at reset.
pub(crate) enum Regs {
    /// IODIR: input/output direction: 0=output; 1=input
    IODIRA = 0x00,
    /// IPOL: input polarity: 0=register values match input pins; 1=opposite
    IPOLA = 0x02,
    /// GPINTEN: interrupt-on-change: 0=disable; 1=enable
    GPINTENA = 0x04,
    /// DEFVAL: default values for interrupt-on-change
    DEFVALA = 0x06,
    /// INTCON: interrupt-on-change config: 0=compare to previous pin value;
    ///   1=compare to corresponding bit in DEFVAL
    INTCONA = 0x08,
    /// IOCON: configuration register
    /// - Pin 7: BANK (which driver assumes stays 0)
    /// - Pin 6: MIRROR: if enabled, INT{A,B} are logically ORed; an interrupt on either
    ///          port will cause both pins to activate
    /// - Pin 5: SEQOP: controls the incrementing function of the address pointer
    /// - Pin 4: DISSLW: disables slew rate control on SDA
    /// - Pin 3: HAEN: no effect on MCP23017
    /// - Pin 2: ODR: interrupt pins are 0=active-driver outputs (INTPOL sets polarity)
    ///          or 1=open-drain outputs (overrides INTPOL)
    /// - Pin 1: INTPOL: interrupt pin is 0=active-low or 1=active-high
    /// - Pin 0: unused
    IOCONA = 0x0a,
    /// GPPU: GPIO pull-ups
    GPPUA = 0x0c,
    /// INTF: interrupt flags: 0=no interrupt pending; 1=corresponding pin caused interrupt
    INTFA = 0x0e,
    /// INTCAP: interrupt captured value: reflects value of each pin at the time that they
    ///   caused an interrupt
    INTCAPA = 0x10,
    /// GPIO: reflects logic level on pins
    GPIOA = 0x12,
    /// OLAT: output latches: sets state for pins configured as outputs
    OLATA = 0x14,
    IODIRB = 0x01,
    IPOLB = 0x03,
    GPINTENB = 0x05,
    DEFVALB = 0x07,
    INTCONB = 0x09,
    IOCONB = 0x0b,
    GPPUB = 0x0d,
    INTFB = 0x0f,
    INTCAPB = 0x11,
    GPIOB = 0x13,
    OLATB = 0x15,
}

impl Regs {
    fn iodir(port: Port) -> Self {
        match port {
            Port::A => Regs::IODIRA,
            Port::B => Regs::IODIRB,
        }
    }

    fn gpinten(port: Port) -> Self {
        match port {
            Port::A => Regs::GPINTENA,
            Port::B => Regs::GPINTENB,
        }
    }

    fn gpio(port: Port) -> Self {
        match port {
            Port::A => Regs::GPIOA,
            Port::B => Regs::GPIOB,
        }
    }

    fn olat(port: Port) -> Self {
        match port {
            Port::A => Regs::OLATA,
            Port::B => Regs::OLATB,
        }
    }
}

impl From<Regs> for u8 {
    fn from(r: Regs) -> u8 {
        r as u8
    }
}

/// Per-pin state kept for every pin that has been looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinConfig {
    pub direction: Direction,
    pub active_low: bool,
    pub edge: Edge,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Input,
            active_low: false,
            edge: Edge::None,
        }
    }
}

const FACTORY_IODIR: u16 = 0xFFFF;
const FACTORY_OLAT: u16 = 0x0000;
const FACTORY_GPINTEN: u16 = 0x0000;

/// Register model of one chip.
///
/// `iodir`, `olat` and `gpinten` always hold the last value successfully written to the
/// respective registers.  They are never refreshed from the chip.
pub struct Driver<B> {
    bus: B,
    iodir: u16,
    olat: u16,
    gpinten: u16,
    pins: [Option<PinConfig>; PIN_COUNT as usize],
}

impl<B> Driver<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            iodir: FACTORY_IODIR,
            olat: FACTORY_OLAT,
            gpinten: FACTORY_GPINTEN,
            pins: [None; PIN_COUNT as usize],
        }
    }

    pub fn release(self) -> B {
        self.bus
    }

    /// Shadow of IODIR{B,A}.
    pub fn direction_shadow(&self) -> u16 {
        self.iodir
    }

    /// Shadow of OLAT{B,A}.
    pub fn output_shadow(&self) -> u16 {
        self.olat
    }

    /// Shadow of GPINTEN{B,A}.
    pub fn interrupt_enable_shadow(&self) -> u16 {
        self.gpinten
    }

    /// Last level written to the output latch of pin `index`.
    pub fn is_set(&self, index: u8) -> bool {
        assert!(index < PIN_COUNT);
        self.olat & (1 << index) != 0
    }

    pub fn is_registered(&self, index: u8) -> bool {
        self.pins[index as usize].is_some()
    }

    pub fn pin_config(&self, index: u8) -> Option<&PinConfig> {
        self.pins[index as usize].as_ref()
    }

    pub(crate) fn pin_config_mut(&mut self, index: u8) -> &mut PinConfig {
        self.pins[index as usize].get_or_insert_with(PinConfig::default)
    }

    pub(crate) fn register(&mut self, index: u8, active_low: bool) {
        self.pins[index as usize] = Some(PinConfig {
            active_low,
            ..PinConfig::default()
        });
    }

    pub(crate) fn unregister(&mut self, index: u8) {
        self.pins[index as usize] = None;
    }
}

impl<B: RegisterBus> Driver<B> {
    pub fn initialize(&mut self) -> Result<(), B::BusError> {
        log::debug!("initializing, IOCON={:#04x}", IOCON_CONFIG);
        self.bus.write_reg(Regs::IOCONA, IOCON_CONFIG)?;
        self.bus.write_reg(Regs::IOCONB, IOCON_CONFIG)?;
        self.reset()
    }

    pub fn reset(&mut self) -> Result<(), B::BusError> {
        log::debug!("resetting registers to factory state");

        let bus = &mut self.bus;
        Self::write_word(bus, &mut self.iodir, Regs::IODIRA, Regs::IODIRB, FACTORY_IODIR)?;
        Self::write_word(bus, &mut self.gpinten, Regs::GPINTENA, Regs::GPINTENB, FACTORY_GPINTEN)?;
        Self::write_word(bus, &mut self.olat, Regs::OLATA, Regs::OLATB, FACTORY_OLAT)?;

        // compare against the previous pin value, not DEFVAL; INTCON is not shadowed
        let mut intcon = 0x0000;
        Self::write_word(bus, &mut intcon, Regs::INTCONA, Regs::INTCONB, 0x0000)?;

        for config in self.pins.iter_mut().flatten() {
            config.direction = Direction::Input;
            config.edge = Edge::None;
        }
        Ok(())
    }

    /// Drive the output latch of pin `index`.
    pub fn write(&mut self, index: u8, value: bool) -> Result<(), B::BusError> {
        let (port, _) = Port::of(index);
        let olat = with_bit(self.olat, index, value);
        self.bus.write_reg(Regs::olat(port), port.byte(olat))?;
        self.olat = olat;
        Ok(())
    }

    /// Sample the current level of pin `index`.
    pub fn read(&mut self, index: u8) -> Result<bool, B::BusError> {
        let (port, bit) = Port::of(index);
        let gpio = self.bus.read_reg(Regs::gpio(port))?;
        Ok(gpio & (1 << bit) != 0)
    }

    pub fn set_direction(&mut self, index: u8, direction: Direction) -> Result<(), B::BusError> {
        let (port, _) = Port::of(index);
        let iodir = with_bit(self.iodir, index, direction.iodir_bit());
        self.bus.write_reg(Regs::iodir(port), port.byte(iodir))?;
        self.iodir = iodir;
        Ok(())
    }

    /// Enable or disable interrupt-on-change for pin `index`.
    ///
    /// Only whether *any* edge is wanted reaches the chip; rising/falling filtering happens in
    /// [`handle_interrupt()`][Self::handle_interrupt].
    pub fn set_edge(&mut self, index: u8, edge: Edge) -> Result<(), B::BusError> {
        let (port, _) = Port::of(index);
        let gpinten = with_bit(self.gpinten, index, edge.interrupt_enabled());
        self.bus.write_reg(Regs::gpinten(port), port.byte(gpinten))?;
        self.gpinten = gpinten;
        Ok(())
    }

    /// Read INTF and INTCAP of both ports and work out which registered pins saw a wanted edge.
    ///
    /// Reading INTCAP clears the interrupt condition on the chip.
    pub fn handle_interrupt(&mut self) -> Result<EdgeEvents, B::BusError> {
        let flags = self.read_word(Regs::INTFA, Regs::INTFB)?;
        let captured = self.read_word(Regs::INTCAPA, Regs::INTCAPB)?;
        log::trace!("interrupt: INTF={:#06x} INTCAP={:#06x}", flags, captured);

        let pins = &self.pins;
        Ok(EdgeEvents::demux(flags, captured, |index| {
            pins[index as usize].map(|config| config.edge)
        }))
    }

    /// Write both port bytes of `word`, committing each into `shadow` as soon as its own write
    /// went through.
    fn write_word(
        bus: &mut B,
        shadow: &mut u16,
        reg_a: Regs,
        reg_b: Regs,
        word: u16,
    ) -> Result<(), B::BusError> {
        log::trace!("{:?}/{:?} <- {:#06x}", reg_a, reg_b, word);
        for (port, reg) in [(Port::A, reg_a), (Port::B, reg_b)] {
            bus.write_reg(reg, port.byte(word))?;
            *shadow = (*shadow & !port.mask()) | (word & port.mask());
        }
        Ok(())
    }

    fn read_word(&mut self, reg_a: Regs, reg_b: Regs) -> Result<u16, B::BusError> {
        let a = self.bus.read_reg(reg_a)?;
        let b = self.bus.read_reg(reg_b)?;
        Ok(((b as u16) << 8) | a as u16)
    }
}

fn with_bit(word: u16, index: u8, set: bool) -> u16 {
    if set {
        word | (1 << index)
    } else {
        word & !(1 << index)
    }
}
