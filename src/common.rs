use core::str::FromStr;

/// Number of GPIO lines on one chip.
pub const PIN_COUNT: u8 = 16;

/// One of the two eight-bit halves of the register set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    A,
    B,
}

impl Port {
    /// Owning port and bit position of logical pin `index`.
    pub fn of(index: u8) -> (Port, u8) {
        assert!(index < PIN_COUNT);
        if index < 8 {
            (Port::A, index)
        } else {
            (Port::B, index - 8)
        }
    }

    /// Extract this port's byte from a 16-bit word (port B is the upper byte).
    pub fn byte(self, word: u16) -> u8 {
        match self {
            Port::A => (word & 0xFF) as u8,
            Port::B => (word >> 8) as u8,
        }
    }

    /// Mask of this port's byte inside a 16-bit word.
    pub fn mask(self) -> u16 {
        match self {
            Port::A => 0x00FF,
            Port::B => 0xFF00,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Value of this pin's bit in IODIR.
    ///
    /// The chip encodes input as 1 and output as 0.
    pub fn iodir_bit(self) -> bool {
        match self {
            Direction::Input => true,
            Direction::Output => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Level::Low),
            "high" => Ok(Level::High),
            _ => Err(ConfigError::InvalidLevelValue),
        }
    }
}

/// Which transitions of an input pin are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    None,
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether a change that left the pin at `level` should be reported.
    ///
    /// `None` reports nothing, even for a flag the chip still reports from before the pin's
    /// interrupt was disabled.  Only `Rising` at level 0 and `Falling` at level 1 are filtered
    /// out otherwise.
    pub fn accepts(self, level: bool) -> bool {
        match self {
            Edge::None => false,
            Edge::Rising => level,
            Edge::Falling => !level,
            Edge::Both => true,
        }
    }

    /// Whether the chip has to watch this pin for changes at all.
    pub fn interrupt_enabled(self) -> bool {
        self != Edge::None
    }
}

impl FromStr for Edge {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Edge::None),
            "rising" => Ok(Edge::Rising),
            "falling" => Ok(Edge::Falling),
            "both" => Ok(Edge::Both),
            _ => Err(ConfigError::InvalidEdgeValue),
        }
    }
}

/// Direction as requested by a user of a pin.
///
/// `OutputLow` and `OutputHigh` switch the pin to output and immediately drive the given logical
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinDirection {
    #[default]
    Input,
    Output,
    OutputLow,
    OutputHigh,
}

impl PinDirection {
    /// Hardware direction plus the initial level implied by the variant itself.
    pub fn resolve(self) -> (Direction, Option<Level>) {
        match self {
            PinDirection::Input => (Direction::Input, None),
            PinDirection::Output => (Direction::Output, None),
            PinDirection::OutputLow => (Direction::Output, Some(Level::Low)),
            PinDirection::OutputHigh => (Direction::Output, Some(Level::High)),
        }
    }
}

impl FromStr for PinDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(PinDirection::Input),
            "out" => Ok(PinDirection::Output),
            "out_low" => Ok(PinDirection::OutputLow),
            "out_high" => Ok(PinDirection::OutputHigh),
            _ => Err(ConfigError::InvalidDirectionValue),
        }
    }
}

/// Options applied when a pin is looked up for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinOptions {
    pub direction: PinDirection,
    pub active_low: bool,
    pub edge: Edge,
}

impl PinOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn direction(mut self, direction: PinDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edge = edge;
        self
    }
}

/// Rejected configuration input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidPinName,
    InvalidEdgeValue,
    InvalidDirectionValue,
    InvalidLevelValue,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ConfigError::InvalidPinName => "invalid pin name",
            ConfigError::InvalidEdgeValue => "invalid edge value",
            ConfigError::InvalidDirectionValue => "invalid direction value",
            ConfigError::InvalidLevelValue => "invalid level value",
        };
        f.write_str(msg)
    }
}

/// Map a pin name `"io-0"` ... `"io-15"` to its index.
pub fn pin_index(name: &str) -> Result<u8, ConfigError> {
    let digits = name
        .strip_prefix("io-")
        .ok_or(ConfigError::InvalidPinName)?;
    // Only the canonical spelling: no sign, no leading zeros.
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return Err(ConfigError::InvalidPinName);
    }
    match digits.parse::<u8>() {
        Ok(index) if index < PIN_COUNT => Ok(index),
        _ => Err(ConfigError::InvalidPinName),
    }
}
