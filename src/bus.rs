use embedded_hal::i2c as hal_i2c;

/// Blanket trait for types implementing `i2c::I2c`
pub trait I2cBus: hal_i2c::I2c {
    type BusError: From<<Self as hal_i2c::ErrorType>::Error>;
}

impl<T, E> I2cBus for T
where
    T: hal_i2c::I2c<Error = E>,
    E: hal_i2c::Error,
{
    type BusError = E;
}

pub(crate) trait I2cExt {
    type Error;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error>;
    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error>;
}

impl<I2C: I2cBus> I2cExt for I2C {
    type Error = I2C::BusError;

    fn write_reg<R: Into<u8>>(&mut self, addr: u8, reg: R, value: u8) -> Result<(), Self::Error> {
        self.write(addr, &[reg.into(), value])?;
        Ok(())
    }

    fn read_reg<R: Into<u8>>(&mut self, addr: u8, reg: R) -> Result<u8, Self::Error> {
        let mut buf = [0x00];
        self.write_read(addr, &[reg.into()], &mut buf)?;
        Ok(buf[0])
    }
}

/// Single-byte register transport of one MCP23017.
///
/// The driver never issues burst transfers: every register access is exactly one byte written to
/// or read from one register address.  Implement this trait to run the driver over something
/// other than a plain I2C peripheral (a bridge chip, a simulator, ...).
pub trait RegisterBus {
    type BusError;

    fn write_reg<R: Into<u8>>(&mut self, reg: R, value: u8) -> Result<(), Self::BusError>;
    fn read_reg<R: Into<u8>>(&mut self, reg: R) -> Result<u8, Self::BusError>;
}

/// [`RegisterBus`] over an I2C peripheral, addressing one chip.
pub struct Mcp23017Bus<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C> Mcp23017Bus<I2C> {
    /// Address the chip whose hardware address pins are strapped to `a0`, `a1`, `a2`.
    pub fn new(i2c: I2C, a0: bool, a1: bool, a2: bool) -> Self {
        let addr = 0x20 | ((a2 as u8) << 2) | ((a1 as u8) << 1) | (a0 as u8);
        Self { i2c, addr }
    }

    pub fn address(&self) -> u8 {
        self.addr
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2cBus> RegisterBus for Mcp23017Bus<I2C> {
    type BusError = I2C::BusError;

    fn write_reg<R: Into<u8>>(&mut self, reg: R, value: u8) -> Result<(), Self::BusError> {
        self.i2c.write_reg(self.addr, reg, value)
    }

    fn read_reg<R: Into<u8>>(&mut self, reg: R) -> Result<u8, Self::BusError> {
        self.i2c.read_reg(self.addr, reg)
    }
}
