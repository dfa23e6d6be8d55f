//! # SI1145 Driver
//!
//! This is a driver for the Silicon Labs SI1145 UV index, infrared and
//! visible light sensor.
//!
//! The SI1145 is not a plain register device. It runs a small firmware
//! sequencer, and most of its configuration lives in an internal *parameter
//! RAM* which can only be reached indirectly, by writing commands into the
//! `COMMAND` register and waiting for the firmware to acknowledge them by
//! bumping a counter in the `RESPONSE` register.
//!
//! This driver handles:
//!
//! * The command / response handshake, including device-reported errors
//! * Reading and writing parameter RAM
//! * Checking the part identity, resetting and unlocking the sensor
//! * Enabling and disabling the Ambient Light System (ALS) and the UV index
//! * Forcing an ALS conversion and reading the visible, infrared and UV index
//!   results
//!
//! The [`Si1145`] object owns the I²C bus you give it. Use
//! [`Si1145::release`] to get it back.
//!
//! # Example
//!
//! You might setup the sensor like this:
//!
//! ```rust
//! # use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};
//! # struct I2c;
//! # impl Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: SevenBitAddress, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, _address: SevenBitAddress, _bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.fill(0);
//! #         Ok(())
//! #     }
//! # }
//! # struct Delay;
//! # impl embedded_hal::blocking::delay::DelayMs<u8> for Delay {
//! #     fn delay_ms(&mut self, _ms: u8) {}
//! # }
//! # let i2c = I2c;
//! # let mut delay = Delay;
//! match si1145::Si1145::new(i2c, &mut delay, si1145::CONFIG_DEFAULT) {
//!     Ok(mut sensor) => {
//!         if let Ok((visible, infrared)) = sensor.read_ambient_light() {
//!             // Raw ALS counts
//!         }
//!         if let Ok(uv_index) = sensor.read_uv_index() {
//!             // UV index, e.g. 3.27
//!         }
//!     }
//!     Err(si1145::Error::Initialization(identity)) => {
//!         // Something answered, but it wasn't an SI1145
//!     }
//!     Err(e) => {
//!         // Sensor didn't respond
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]

//
// Public Types
//

/// Represents an SI1145 sitting on an I²C bus.
///
/// Only exists in the fully configured state: identity checked, firmware
/// reset, hardware key written and the measurement channels set up as per
/// the [`Config`] it was built with.
pub struct Si1145<I2C> {
    i2c: I2C,
    address: u8,
    poll_limit: Option<u32>,
    als_enabled: bool,
    uv_index_enabled: bool,
}

/// Settings applied when the sensor is brought up with [`Si1145::new`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// The 7-bit I²C address of the sensor.
    pub address: u8,
    /// Enable the visible and infrared ALS channels.
    pub als_enabled: bool,
    /// Enable the UV index channel.
    pub uv_index_enabled: bool,
    /// How many times to poll the `RESPONSE` register for each command
    /// before giving up with [`Error::Timeout`].
    ///
    /// `None` waits forever, which is what the hardware protocol itself
    /// assumes. At least one poll is always made.
    pub poll_limit: Option<u32>,
}

/// The identity block read from the first three registers of the chip.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Identity {
    /// Part ID. 69 (0x45) for the SI1145.
    pub part_id: u8,
    /// Silicon revision.
    pub revision: u8,
    /// Firmware sequencer revision.
    pub sequencer_id: u8,
}

/// Everything that can go wrong talking to the SI1145.
///
/// `E` is the error type of your I²C bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The I²C transaction itself failed.
    Bus(E),
    /// The sensor firmware flagged an error while executing a command.
    ///
    /// Holds the raw `RESPONSE` register value. The error sticks until you
    /// call [`Si1145::clear_error`].
    Device(u8),
    /// The device on the bus did not identify itself as an SI1145.
    Initialization(Identity),
    /// The firmware never acknowledged a command within the configured
    /// [`Config::poll_limit`].
    Timeout,
}

/// Decoded form of an error value found in the `RESPONSE` register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseError {
    /// An invalid command was issued, or a parameter write hit a bad offset.
    InvalidSetting,
    /// The PS1 ADC overflowed
    Ps1AdcOverflow,
    /// The PS2 ADC overflowed
    Ps2AdcOverflow,
    /// The PS3 ADC overflowed
    Ps3AdcOverflow,
    /// The visible light ADC overflowed
    AlsVisAdcOverflow,
    /// The infrared ADC overflowed
    AlsIrAdcOverflow,
    /// The auxiliary (UV) ADC overflowed
    AuxAdcOverflow,
    /// Some other non-zero error code
    Unknown(u8),
}

//
// Private Types
//

/// The registers in the SI1145 that this driver touches
#[derive(Copy, Clone, Debug)]
enum Register {
    PartId = 0x00,
    HwKey = 0x07,
    UCoeff0 = 0x13,
    UCoeff1 = 0x14,
    UCoeff2 = 0x15,
    UCoeff3 = 0x16,
    ParamWr = 0x17,
    Command = 0x18,
    Response = 0x20,
    AlsVisData0 = 0x22,
    UvIndexData0 = 0x2C,
    ParamRd = 0x2E,
}

//
// Public Data
//

/// The I²C address the SI1145 answers on out of reset.
pub const DEFAULT_ADDRESS: u8 = 0x60;

/// The default number of `RESPONSE` polls per command.
pub const DEFAULT_POLL_LIMIT: u32 = 1000;

/// Both ALS and UV index enabled, default address, bounded polling.
pub const CONFIG_DEFAULT: Config = Config {
    address: DEFAULT_ADDRESS,
    als_enabled: true,
    uv_index_enabled: true,
    poll_limit: Some(DEFAULT_POLL_LIMIT),
};

/// Opcodes for the `COMMAND` register.
pub mod command {
    /// Read a parameter. OR in the parameter offset.
    pub const PARAM_QUERY: u8 = 0b1000_0000;
    /// Write a parameter. OR in the parameter offset.
    pub const PARAM_SET: u8 = 0b1010_0000;
    /// Does nothing, but clears the `RESPONSE` register.
    pub const NOP: u8 = 0b0000_0000;
    /// Software reset of the firmware.
    pub const RESET: u8 = 0b0000_0001;
    /// Take a single ALS (and UV) measurement.
    pub const ALS_FORCE: u8 = 0b0000_0110;
}

/// Offsets into parameter RAM, for use with [`Si1145::param_query`] and
/// [`Si1145::param_set`].
pub mod param {
    /// Channel list. Selects which measurements the sequencer performs.
    pub const CHLIST: u8 = 0x01;
}

//
// Private Data
//

/// Magic value that must be written to `HW_KEY` before the firmware will run.
const HW_KEY_VALUE: u8 = 0x17;

/// The datasheet says 25 ms. We wait twice that.
const RESET_DELAY_MS: u8 = 50;

/// Fixed coefficients for the UV index calculation, for `UCOEFF0..=UCOEFF3`.
const UV_COEFFICIENTS: [(Register, u8); 4] = [
    (Register::UCoeff0, 0x00),
    (Register::UCoeff1, 0x02),
    (Register::UCoeff2, 0x89),
    (Register::UCoeff3, 0x29),
];

/// Visible and infrared ALS channels.
const CHLIST_ALS: u8 = 0b0011_0000;

/// UV index channel.
const CHLIST_UV: u8 = 0b0100_0000;

/// Parameter offsets are five bits wide.
const PARAM_OFFSET_MASK: u8 = 0x1F;

const RESPONSE_COUNTER_MASK: u8 = 0x0F;

const RESPONSE_ERROR_MASK: u8 = 0xF0;

//
// impls on Public Types
//

impl Default for Config {
    fn default() -> Config {
        CONFIG_DEFAULT
    }
}

impl Identity {
    /// What an SI1145 reports.
    pub const EXPECTED: Identity = Identity {
        part_id: 69,
        revision: 0,
        sequencer_id: 8,
    };

    fn from_bytes(bytes: [u8; 3]) -> Identity {
        Identity {
            part_id: bytes[0],
            revision: bytes[1],
            sequencer_id: bytes[2],
        }
    }
}

impl<E> Error<E> {
    /// If this is a [`Error::Device`], decode the error code.
    pub fn response_error(&self) -> Option<ResponseError> {
        match self {
            Error::Device(response) => ResponseError::from_response(*response),
            _ => None,
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Error<E> {
        Error::Bus(e)
    }
}

impl ResponseError {
    /// Decode a `RESPONSE` register value.
    ///
    /// Returns `None` if the error bits are clear.
    pub fn from_response(response: u8) -> Option<ResponseError> {
        if response & RESPONSE_ERROR_MASK == 0 {
            return None;
        }
        Some(match response {
            0x80 => ResponseError::InvalidSetting,
            0x88 => ResponseError::Ps1AdcOverflow,
            0x89 => ResponseError::Ps2AdcOverflow,
            0x8A => ResponseError::Ps3AdcOverflow,
            0x8C => ResponseError::AlsVisAdcOverflow,
            0x8D => ResponseError::AlsIrAdcOverflow,
            0x8E => ResponseError::AuxAdcOverflow,
            other => ResponseError::Unknown(other),
        })
    }
}

impl<I2C, E> Si1145<I2C>
where
    I2C: embedded_hal::blocking::i2c::Write<Error = E>
        + embedded_hal::blocking::i2c::WriteRead<Error = E>,
{
    /// Find, reset and configure an SI1145.
    ///
    /// Checks the identity block, resets the firmware (which takes at least
    /// 50 ms, using `delay`), writes the hardware key and then sets the ALS
    /// and UV index channels as requested in `config`.
    ///
    /// If something other than an SI1145 answers at `config.address` you get
    /// [`Error::Initialization`] and no driver object.
    pub fn new<D>(i2c: I2C, delay: &mut D, config: Config) -> Result<Si1145<I2C>, Error<E>>
    where
        D: embedded_hal::blocking::delay::DelayMs<u8>,
    {
        let mut sensor = Si1145 {
            i2c,
            address: config.address,
            poll_limit: config.poll_limit,
            als_enabled: false,
            uv_index_enabled: false,
        };

        let identity = sensor.device_info()?;
        #[cfg(feature = "defmt")]
        defmt::debug!("SI1145 identity {}", identity);
        if identity != Identity::EXPECTED {
            return Err(Error::Initialization(identity));
        }

        sensor.reset(delay)?;
        sensor.write_register(Register::HwKey, HW_KEY_VALUE)?;
        sensor.set_als_enabled(config.als_enabled)?;
        sensor.set_uv_index_enabled(config.uv_index_enabled)?;

        Ok(sensor)
    }

    /// Give back the I²C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// The I²C address we are talking to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read the part, revision and sequencer IDs.
    pub fn device_info(&mut self) -> Result<Identity, Error<E>> {
        let mut buffer = [0u8; 3];
        self.read_registers(Register::PartId, &mut buffer)?;
        Ok(Identity::from_bytes(buffer))
    }

    /// Perform a software reset of the firmware.
    ///
    /// This puts the parameter RAM back to its power-on state, so the
    /// hardware key and channel settings applied by [`Si1145::new`] are lost.
    /// Afterwards [`Si1145::als_enabled`] and [`Si1145::uv_index_enabled`]
    /// both report `false`.
    pub fn reset<D>(&mut self, delay: &mut D) -> Result<(), Error<E>>
    where
        D: embedded_hal::blocking::delay::DelayMs<u8>,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("Resetting SI1145");
        self.send_command(command::RESET)?;
        delay.delay_ms(RESET_DELAY_MS);
        // Channel list is back to its power-on value of zero
        self.als_enabled = false;
        self.uv_index_enabled = false;
        Ok(())
    }

    /// Clear any error code left in the `RESPONSE` register.
    ///
    /// Call this after getting an [`Error::Device`], otherwise the next
    /// command will most likely fail the same way.
    pub fn clear_error(&mut self) -> Result<(), Error<E>> {
        self.send_command(command::NOP)?;
        Ok(())
    }

    /// Get whether the ALS channels are enabled.
    pub fn als_enabled(&self) -> bool {
        self.als_enabled
    }

    /// Enable or disable the visible and infrared ALS channels.
    ///
    /// Only the two ALS bits of the channel list are touched.
    pub fn set_als_enabled(&mut self, enabled: bool) -> Result<(), Error<E>> {
        self.update_chlist(CHLIST_ALS, enabled)?;
        self.als_enabled = enabled;
        Ok(())
    }

    /// Get whether the UV index channel is enabled.
    pub fn uv_index_enabled(&self) -> bool {
        self.uv_index_enabled
    }

    /// Enable or disable the UV index channel.
    ///
    /// Enabling also loads the UV calibration coefficients.
    pub fn set_uv_index_enabled(&mut self, enabled: bool) -> Result<(), Error<E>> {
        self.update_chlist(CHLIST_UV, enabled)?;
        if enabled {
            for (register, value) in UV_COEFFICIENTS {
                self.write_register(register, value)?;
            }
        }
        self.uv_index_enabled = enabled;
        Ok(())
    }

    /// Force an ALS conversion and return the raw `(visible, infrared)`
    /// counts.
    pub fn read_ambient_light(&mut self) -> Result<(u16, u16), Error<E>> {
        self.send_command(command::ALS_FORCE)?;
        let mut buffer = [0u8; 4];
        self.read_registers(Register::AlsVisData0, &mut buffer)?;
        let visible = u16::from_le_bytes([buffer[0], buffer[1]]);
        let infrared = u16::from_le_bytes([buffer[2], buffer[3]]);
        Ok((visible, infrared))
    }

    /// Get the UV index from the most recent ALS conversion.
    ///
    /// The UV result comes out of the same conversion as the ALS readings,
    /// so call [`Si1145::read_ambient_light`] first if you want a fresh
    /// value.
    pub fn read_uv_index(&mut self) -> Result<f32, Error<E>> {
        let mut buffer = [0u8; 2];
        self.read_registers(Register::UvIndexData0, &mut buffer)?;
        Ok(f32::from(u16::from_le_bytes(buffer)) / 100.0)
    }

    /// Read a byte from parameter RAM.
    ///
    /// `offset` must fit in five bits.
    pub fn param_query(&mut self, offset: u8) -> Result<u8, Error<E>> {
        self.send_command(command::PARAM_QUERY | (offset & PARAM_OFFSET_MASK))?;
        let value = self.read_register(Register::ParamRd)?;
        #[cfg(feature = "defmt")]
        defmt::debug!("SI1145 param 0x{:02x} is 0x{:02x}", offset, value);
        Ok(value)
    }

    /// Write a byte to parameter RAM.
    ///
    /// `offset` must fit in five bits.
    pub fn param_set(&mut self, offset: u8, value: u8) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("Setting SI1145 param 0x{:02x} to 0x{:02x}", offset, value);
        self.write_register(Register::ParamWr, value)?;
        self.send_command(command::PARAM_SET | (offset & PARAM_OFFSET_MASK))?;
        Ok(())
    }

    /// Send a command to the firmware and wait for it to be acknowledged.
    ///
    /// Returns the `RESPONSE` register value that acknowledged the command.
    /// [`command::NOP`] and [`command::RESET`] are never acknowledged, so
    /// they return 0 straight away.
    pub fn send_command(&mut self, opcode: u8) -> Result<u8, Error<E>> {
        let counter = self.read_register(Register::Response)? & RESPONSE_COUNTER_MASK;
        #[cfg(feature = "defmt")]
        defmt::debug!("SI1145 command 0x{:02x}, counter {}", opcode, counter);
        self.write_register(Register::Command, opcode)?;
        if opcode == command::NOP || opcode == command::RESET {
            return Ok(0);
        }

        let mut polls: u32 = 0;
        loop {
            let response = self.read_register(Register::Response)?;
            // Error bits win, whatever the counter says
            if response & RESPONSE_ERROR_MASK != 0 {
                #[cfg(feature = "defmt")]
                defmt::warn!("SI1145 error 0x{:02x} on command 0x{:02x}", response, opcode);
                return Err(Error::Device(response));
            }
            if response & RESPONSE_COUNTER_MASK != counter {
                return Ok(response);
            }
            polls = polls.saturating_add(1);
            if let Some(limit) = self.poll_limit {
                if polls >= limit {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("SI1145 command 0x{:02x} never acknowledged", opcode);
                    return Err(Error::Timeout);
                }
            }
        }
    }

    /// Set or clear `bits` in the channel list, leaving the rest alone.
    fn update_chlist(&mut self, bits: u8, enabled: bool) -> Result<(), Error<E>> {
        let old = self.param_query(param::CHLIST)?;
        let chlist = if enabled { old | bits } else { old & !bits };
        #[cfg(feature = "defmt")]
        defmt::debug!("SI1145 chlist 0x{:02x} -> 0x{:02x}", old, chlist);
        self.param_set(param::CHLIST, chlist)
    }

    fn read_register(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.read_registers(register, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Read consecutive registers, starting at `register`.
    fn read_registers(&mut self, register: Register, buffer: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(self.address, &[register as u8], buffer)?;
        Ok(())
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c.write(self.address, &[register as u8, value])?;
        Ok(())
    }
}

//
// impls on Private Types
//

// None

//
// Tests
//


//
// End of file
//
