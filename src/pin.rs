use crate::common::{Direction, Edge, Level, PinDirection, PinOptions};
use crate::dev::mcp23017::{Driver, PinConfig};
use crate::{ConfigError, PortMutex, RegisterBus};
use embedded_hal::digital::{self as hal_digital, ErrorKind};

/// Representation of one GPIO line of the port-expander.
///
/// `Pin` is not constructed directly, it is obtained by name from
/// [`Mcp23017::pin()`][crate::Mcp23017::pin].  All handles for the same name refer to the same
/// pin state inside the controller.
pub struct Pin<'a, MUTEX> {
    index: u8,
    port_driver: &'a MUTEX,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError<BE> {
    BusError(BE),
    Config(ConfigError),
}

impl<BE> From<BE> for PinError<BE> {
    fn from(value: BE) -> Self {
        Self::BusError(value)
    }
}

impl<BE: core::fmt::Debug> core::fmt::Display for PinError<BE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PinError::BusError(e) => write!(f, "bus error: {:?}", e),
            PinError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl<BE: core::fmt::Debug> hal_digital::Error for PinError<BE> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Apply the options of a freshly registered pin.
pub(crate) fn configure<B: RegisterBus>(
    drv: &mut Driver<B>,
    index: u8,
    options: PinOptions,
) -> Result<(), B::BusError> {
    set_direction(drv, index, options.direction, None)?;
    if config_of(drv, index).direction == Direction::Input {
        set_edge(drv, index, options.edge)?;
    }
    Ok(())
}

fn set_direction<B: RegisterBus>(
    drv: &mut Driver<B>,
    index: u8,
    direction: PinDirection,
    level: Option<Level>,
) -> Result<(), B::BusError> {
    let (direction, implied) = direction.resolve();
    drv.set_direction(index, direction)?;
    drv.pin_config_mut(index).direction = direction;

    if direction == Direction::Output {
        if let Some(level) = implied.or(level) {
            let active_low = config_of(drv, index).active_low;
            drv.write(index, level.is_high() ^ active_low)?;
        }
    }
    Ok(())
}

/// Settings of pin `index`; a pin that was never looked up reads as the reset state.
fn config_of<B>(drv: &Driver<B>, index: u8) -> PinConfig {
    drv.pin_config(index).copied().unwrap_or_default()
}

fn set_edge<B: RegisterBus>(drv: &mut Driver<B>, index: u8, edge: Edge) -> Result<(), B::BusError> {
    drv.set_edge(index, edge)?;
    drv.pin_config_mut(index).edge = edge;
    Ok(())
}

impl<'a, MUTEX, B> Pin<'a, MUTEX>
where
    B: RegisterBus,
    MUTEX: PortMutex<Port = Driver<B>>,
{
    pub(crate) fn new(index: u8, port_driver: &'a MUTEX) -> Self {
        assert!(index < crate::common::PIN_COUNT);
        Self { index, port_driver }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    fn config(&self) -> PinConfig {
        self.port_driver.lock(|drv| config_of(drv, self.index))
    }

    pub fn active_low(&self) -> bool {
        self.config().active_low
    }

    /// Change the polarity used by future reads and writes.  Nothing is sent to the chip.
    pub fn set_active_low(&mut self, active_low: bool) {
        self.port_driver
            .lock(|drv| drv.pin_config_mut(self.index).active_low = active_low)
    }

    pub fn direction(&self) -> Direction {
        self.config().direction
    }

    /// Switch the pin direction.
    ///
    /// For outputs, `level` is driven right after the switch.  `OutputLow` and `OutputHigh`
    /// carry their own level, which takes precedence.  `level` is ignored for inputs.
    pub fn set_direction(
        &mut self,
        direction: PinDirection,
        level: Option<Level>,
    ) -> Result<(), PinError<B::BusError>> {
        self.port_driver
            .lock(|drv| set_direction(drv, self.index, direction, level))?;
        Ok(())
    }

    pub fn edge(&self) -> Edge {
        self.config().edge
    }

    pub fn set_edge(&mut self, edge: Edge) -> Result<(), PinError<B::BusError>> {
        self.port_driver
            .lock(|drv| set_edge(drv, self.index, edge))?;
        Ok(())
    }

    /// Read the logical level of the pin, freshly sampled from the chip.
    pub fn read(&self) -> Result<bool, PinError<B::BusError>> {
        Ok(self.port_driver.lock(|drv| {
            let active_low = config_of(drv, self.index).active_low;
            drv.read(self.index).map(|level| level ^ active_low)
        })?)
    }

    /// Drive the logical level of the pin.
    pub fn write(&mut self, value: bool) -> Result<(), PinError<B::BusError>> {
        self.port_driver.lock(|drv| {
            let active_low = config_of(drv, self.index).active_low;
            drv.write(self.index, value ^ active_low)
        })?;
        Ok(())
    }

    /// Logical level last written to this pin, without bus access.
    pub fn is_set_high(&self) -> bool {
        self.port_driver.lock(|drv| {
            let active_low = config_of(drv, self.index).active_low;
            drv.is_set(self.index) ^ active_low
        })
    }

    pub fn toggle(&mut self) -> Result<(), PinError<B::BusError>> {
        let high = self.is_set_high();
        self.write(!high)
    }
}

impl<'a, MUTEX, B> hal_digital::ErrorType for Pin<'a, MUTEX>
where
    B: RegisterBus,
    B::BusError: core::fmt::Debug,
    MUTEX: PortMutex<Port = Driver<B>>,
{
    type Error = PinError<B::BusError>;
}

impl<'a, MUTEX, B> hal_digital::InputPin for Pin<'a, MUTEX>
where
    B: RegisterBus,
    B::BusError: core::fmt::Debug,
    MUTEX: PortMutex<Port = Driver<B>>,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Pin::read(self)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Pin::read(self).map(|v| !v)
    }
}

impl<'a, MUTEX, B> hal_digital::OutputPin for Pin<'a, MUTEX>
where
    B: RegisterBus,
    B::BusError: core::fmt::Debug,
    MUTEX: PortMutex<Port = Driver<B>>,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Pin::write(self, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Pin::write(self, true)
    }
}

impl<'a, MUTEX, B> hal_digital::StatefulOutputPin for Pin<'a, MUTEX>
where
    B: RegisterBus,
    B::BusError: core::fmt::Debug,
    MUTEX: PortMutex<Port = Driver<B>>,
{
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(Pin::is_set_high(self))
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!Pin::is_set_high(self))
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        Pin::toggle(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ConfigError, Edge, EdgeEvent, Level, Mcp23017, PinDirection, PinError, PinOptions};
    use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
    use embedded_hal_mock::eh1::i2c as mock_i2c;
    use std::vec;
    use std::vec::Vec;

    fn write(reg: u8, value: u8) -> mock_i2c::Transaction {
        mock_i2c::Transaction::write(0x20, vec![reg, value])
    }

    fn read(reg: u8, value: u8) -> mock_i2c::Transaction {
        mock_i2c::Transaction::write_read(0x20, vec![reg], vec![value])
    }

    fn output() -> PinOptions {
        PinOptions::new().direction(PinDirection::Output)
    }

    #[test]
    fn turn_on_turn_off() {
        let expectations = [
            // io-0 as output
            write(0x00, 0xfe),
            // turn on
            write(0x14, 0x01),
            // turn off
            write(0x14, 0x00),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io0 = chip.pin("io-0", output()).unwrap();

        io0.set_high().unwrap();
        assert!(io0.is_set_high());
        io0.set_low().unwrap();
        assert!(io0.is_set_low().unwrap());

        bus.done();
    }

    #[test]
    fn default_input() {
        let expectations = [
            // direction input, edge none
            write(0x01, 0xff),
            write(0x05, 0x00),
            read(0x13, 0b0000_0010),
            read(0x13, 0b0000_0000),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io9 = chip.pin("io-9", PinOptions::default()).unwrap();
        assert_eq!(io9.direction(), crate::Direction::Input);
        assert_eq!(io9.edge(), Edge::None);

        assert!(io9.is_high().unwrap());
        assert!(io9.is_low().unwrap());

        bus.done();
    }

    #[test]
    fn active_low_round_trip() {
        let expectations = [
            write(0x00, 0xfb),
            // logical high drives the line low
            write(0x14, 0x00),
            // reading the line back low
            read(0x12, 0x00),
            // logical low drives the line high
            write(0x14, 0x04),
            read(0x12, 0x04),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io2 = chip.pin("io-2", output().active_low(true)).unwrap();
        assert!(io2.active_low());

        io2.write(true).unwrap();
        assert!(io2.read().unwrap());
        assert!(io2.is_set_high());

        io2.write(false).unwrap();
        assert!(!io2.read().unwrap());
        assert!(!io2.is_set_high());

        bus.done();
    }

    #[test]
    fn set_active_low_has_no_bus_traffic() {
        let expectations = [write(0x01, 0x7f), read(0x13, 0x80)];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io15 = chip.pin("io-15", output()).unwrap();
        io15.set_active_low(true);
        assert!(!io15.read().unwrap());

        bus.done();
    }

    #[test]
    fn output_with_initial_level() {
        let expectations = [
            // out_high on an active-low pin: driven low
            write(0x00, 0xef),
            write(0x14, 0x00),
            // out_low on the same pin: driven high
            write(0x00, 0xef),
            write(0x14, 0x10),
            // plain out with an explicit level
            write(0x00, 0xef),
            write(0x14, 0x00),
            // input ignores the level
            write(0x00, 0xff),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let opts = PinOptions::new()
            .direction(PinDirection::OutputHigh)
            .active_low(true);
        let mut io4 = chip.pin("io-4", opts).unwrap();

        // implied level wins over the argument
        io4.set_direction(PinDirection::OutputLow, Some(Level::Low))
            .unwrap();
        io4.set_direction(PinDirection::Output, Some(Level::High))
            .unwrap();
        io4.set_direction(PinDirection::Input, Some(Level::High))
            .unwrap();
        assert_eq!(io4.direction(), crate::Direction::Input);

        bus.done();
    }

    #[test]
    fn output_ignores_edge_option() {
        let expectations = [write(0x00, 0xfe)];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let io0 = chip.pin("io-0", output().edge(Edge::Both)).unwrap();
        assert_eq!(io0.edge(), Edge::None);

        bus.done();
    }

    #[test]
    fn second_lookup_returns_existing_pin() {
        let expectations = [write(0x00, 0xff), write(0x04, 0x08)];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let first = chip
            .pin("io-3", PinOptions::new().edge(Edge::Rising))
            .unwrap();
        let second = chip
            .pin("io-3", output().active_low(true).edge(Edge::Falling))
            .unwrap();

        assert_eq!(first.index(), second.index());
        assert_eq!(second.direction(), crate::Direction::Input);
        assert_eq!(second.edge(), Edge::Rising);
        assert!(!second.active_low());

        bus.done();
    }

    #[test]
    fn unknown_pin_name() {
        let mut bus = mock_i2c::Mock::new(&[]);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        assert!(matches!(
            chip.pin("io-16", PinOptions::default()),
            Err(PinError::Config(ConfigError::InvalidPinName))
        ));
        assert!(matches!(
            chip.pin("gpa0", PinOptions::default()),
            Err(PinError::Config(ConfigError::InvalidPinName))
        ));

        bus.done();
    }

    #[test]
    fn failed_construction_creates_no_pin() {
        let expectations = [
            write(0x00, 0xfe).with_error(embedded_hal::i2c::ErrorKind::Other),
            write(0x00, 0xfe),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        assert!(matches!(
            chip.pin("io-0", output()),
            Err(PinError::BusError(embedded_hal::i2c::ErrorKind::Other))
        ));
        // the retry configures the pin from scratch
        let io0 = chip.pin("io-0", output()).unwrap();
        assert_eq!(io0.direction(), crate::Direction::Output);

        bus.done();
    }

    #[test]
    fn config_lookup_creates_no_slot() {
        let mut bus = mock_i2c::Mock::new(&[]);

        let drv = crate::dev::mcp23017::Driver::new(crate::Mcp23017Bus::new(
            bus.clone(),
            false,
            false,
            false,
        ));
        let config = super::config_of(&drv, 3);
        assert_eq!(config.direction, crate::Direction::Input);
        assert_eq!(config.edge, Edge::None);
        assert!(!config.active_low);
        assert!(!drv.is_registered(3));

        bus.done();
    }

    #[test]
    fn getters_have_no_bus_traffic() {
        let expectations = [write(0x00, 0xfe)];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let io0 = chip.pin("io-0", output().active_low(true)).unwrap();
        assert!(io0.active_low());
        assert_eq!(io0.direction(), crate::Direction::Output);
        assert_eq!(io0.edge(), Edge::None);
        // latch still low, which is logical high for an active-low pin
        assert!(io0.is_set_high());

        bus.done();
    }

    #[test]
    fn edge_setter() {
        let expectations = [
            write(0x01, 0xff),
            write(0x05, 0x00),
            write(0x05, 0x20),
            write(0x05, 0x00),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io13 = chip.pin("io-13", PinOptions::default()).unwrap();

        io13.set_edge("both".parse().unwrap()).unwrap();
        assert_eq!(io13.edge(), Edge::Both);
        io13.set_edge(Edge::None).unwrap();
        assert_eq!(io13.edge(), Edge::None);

        assert_eq!("up".parse::<Edge>(), Err(ConfigError::InvalidEdgeValue));

        bus.done();
    }

    #[test]
    fn toggle() {
        let expectations = [write(0x00, 0xfd), write(0x14, 0x02), write(0x14, 0x00)];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let mut io1 = chip.pin("io-1", output()).unwrap();
        StatefulOutputPin::toggle(&mut io1).unwrap();
        assert!(io1.is_set_high());
        StatefulOutputPin::toggle(&mut io1).unwrap();
        assert!(!io1.is_set_high());

        bus.done();
    }

    fn interrupt_setup(pin0_edge: Edge) -> Vec<mock_i2c::Transaction> {
        let mut expectations = vec![
            // io-0
            write(0x00, 0xff),
        ];
        if pin0_edge != Edge::None {
            expectations.push(write(0x04, 0x01));
        } else {
            expectations.push(write(0x04, 0x00));
        }
        expectations.extend([
            // io-8
            write(0x01, 0xff),
            write(0x05, 0x01),
            // pins 0 and 8 changed, pin 0 high, pin 8 low
            read(0x0e, 0x01),
            read(0x0f, 0x01),
            read(0x10, 0x01),
            read(0x11, 0x00),
        ]);
        expectations
    }

    fn run_interrupt(pin0_edge: Edge) -> Vec<EdgeEvent> {
        let mut bus = mock_i2c::Mock::new(&interrupt_setup(pin0_edge));

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let _io0 = chip.pin("io-0", PinOptions::new().edge(pin0_edge)).unwrap();
        let _io8 = chip
            .pin("io-8", PinOptions::new().edge(Edge::Falling))
            .unwrap();

        let mut events = Vec::new();
        chip.handle_interrupt(&mut |event: EdgeEvent| events.push(event))
            .unwrap();

        bus.done();
        events
    }

    #[test]
    fn interrupt_both_notify() {
        assert_eq!(
            run_interrupt(Edge::Rising),
            [
                EdgeEvent { pin: 0, level: Level::High },
                EdgeEvent { pin: 8, level: Level::Low },
            ]
        );
    }

    #[test]
    fn interrupt_wrong_edge_suppressed() {
        assert_eq!(
            run_interrupt(Edge::Falling),
            [EdgeEvent { pin: 8, level: Level::Low }]
        );
    }

    #[test]
    fn interrupt_level_is_raw() {
        let expectations = [
            write(0x00, 0xff),
            write(0x04, 0x01),
            read(0x0e, 0x01),
            read(0x0f, 0x00),
            read(0x10, 0x01),
            read(0x11, 0x00),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let io0 = chip
            .pin("io-0", PinOptions::new().edge(Edge::Both).active_low(true))
            .unwrap();
        assert!(io0.active_low());

        let mut levels = Vec::new();
        chip.handle_interrupt(&mut |event: EdgeEvent| levels.push(event.level))
            .unwrap();
        // the hardware level, not the active-low view of it
        assert_eq!(levels, [Level::High]);

        bus.done();
    }

    #[test]
    fn listener_may_use_pins() {
        let expectations = [
            write(0x00, 0xff),
            write(0x04, 0x01),
            read(0x0e, 0x01),
            read(0x0f, 0x00),
            read(0x10, 0x00),
            read(0x11, 0x00),
            read(0x12, 0x00),
        ];
        let mut bus = mock_i2c::Mock::new(&expectations);

        let chip = Mcp23017::new(bus.clone(), false, false, false);
        let io0 = chip
            .pin("io-0", PinOptions::new().edge(Edge::Falling))
            .unwrap();

        let mut now = None;
        chip.handle_interrupt(&mut |_: EdgeEvent| now = Some(io0.read().unwrap()))
            .unwrap();
        assert_eq!(now, Some(false));

        bus.done();
    }
}
