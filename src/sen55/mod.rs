use core::str;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use heapless::{String, Vec};

use crate::error::Error;
use crate::frame::{self, Cmd, MAX_RX, Payload};
use crate::types::{
    DeviceStatus, GasTuning, Measurement, ParticleMeasurement, RhtAccelerationMode,
    TempCompensation, Version,
};

pub mod commands;

const ADDR: u8 = 0x69;

/// Wait between a command write and clocking out the response.
const COMMAND_DELAY_MS: u32 = 5;
/// Warm-up after starting a measurement; the device needs at least 20 ms,
/// the first meaningful conversion considerably longer.
const START_SETTLE_MS: u32 = 1000;
/// Extra settle between an implicit start and the first read.
const AUTO_START_SETTLE_MS: u32 = 100;
/// Device reboot time after a reset.
const RESET_DELAY_MS: u32 = 1000;

/// Firmware level that introduced the device-status register.
const STATUS_MIN_FW: (u8, u8) = (2, 0);

/// Bounded retry policy for read transactions.
///
/// Only [`Error::DataLength`] is retried: it signals that the device had
/// not finished converting when the response was clocked out. Every other
/// error surfaces immediately, and writes never retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Attempts per read transaction, including the first.
    pub attempts: u8,
    /// Wait between attempts.
    pub backoff_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Measuring { pm_enabled: bool },
}

/// SEN55 driver session.
///
/// Owns the bus and delay handles plus the little state the protocol
/// requires: whether a measurement is running and the firmware level
/// discovered on the first version read. The bus is used strictly
/// write-then-read; no second transaction starts before the first one
/// finished.
#[derive(Debug)]
pub struct Sen55<I2C, D> {
    i2c: I2C,
    delay: D,
    mode: Mode,
    firmware: Option<(u8, u8)>,
    retry: RetryPolicy,
}

impl<I2C, D> Sen55<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            mode: Mode::Idle,
            firmware: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the retry policy for transiently failing reads.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Releases the bus and delay handles.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// True while a measurement (either variant) is running.
    pub fn is_measuring(&self) -> bool {
        matches!(self.mode, Mode::Measuring { .. })
    }
}

impl<I2C: I2c, D: DelayNs> Sen55<I2C, D> {
    /// Checks that the sensor responds by reading its version. Also
    /// primes the cached firmware level.
    pub fn probe(&mut self) -> Result<(), Error<I2C::Error>> {
        self.version().map(|_| ())
    }

    /// Reads the device and driver version levels.
    pub fn version(&mut self) -> Result<Version, Error<I2C::Error>> {
        let words = self.read_words::<4>(commands::READ_VERSION)?;
        let version = Version::from_words(&words);
        self.firmware = Some((version.firmware_major, version.firmware_minor));
        Ok(version)
    }

    /// Starts a measurement with the particle laser engaged. Blocks for
    /// the warm-up delay; the first reading is valid only afterwards.
    pub fn start_measurement(&mut self) -> Result<(), Error<I2C::Error>> {
        self.start(commands::START_MEASUREMENT, true)
    }

    /// Starts a gas and RH/T measurement without engaging the particle
    /// laser. Mass readings are unavailable in this mode.
    pub fn start_measurement_without_pm(&mut self) -> Result<(), Error<I2C::Error>> {
        self.start(commands::START_MEASUREMENT_WITHOUT_PM, false)
    }

    fn start(&mut self, cmd: Cmd, pm_enabled: bool) -> Result<(), Error<I2C::Error>> {
        self.send(cmd, &Payload::None)?;
        self.mode = Mode::Measuring { pm_enabled };
        self.delay.delay_ms(START_SETTLE_MS);
        Ok(())
    }

    /// Stops the running measurement and returns the device to idle.
    pub fn stop_measurement(&mut self) -> Result<(), Error<I2C::Error>> {
        self.send(commands::STOP_MEASUREMENT, &Payload::None)?;
        self.mode = Mode::Idle;
        Ok(())
    }

    /// Resets the device. The session returns to idle unconditionally and
    /// this call blocks until the device has rebooted. Measurement must
    /// be restarted explicitly afterwards.
    pub fn reset(&mut self) -> Result<(), Error<I2C::Error>> {
        self.send(commands::RESET, &Payload::None)?;
        self.mode = Mode::Idle;
        self.delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Starts a fan cleaning cycle. Only legal while measuring; fails
    /// with [`Error::IllegalState`] before touching the bus otherwise.
    pub fn start_fan_cleaning(&mut self) -> Result<(), Error<I2C::Error>> {
        if !self.is_measuring() {
            return Err(Error::IllegalState);
        }

        self.send(commands::START_FAN_CLEANING, &Payload::None)
    }

    /// Polls whether a new measurement is ready to be read out.
    pub fn data_ready(&mut self) -> Result<bool, Error<I2C::Error>> {
        let words = self.read_words::<1>(commands::READ_DATA_READY_FLAG)?;
        Ok((words[0] & 0x00ff) == 1)
    }

    /// Reads the measured values.
    ///
    /// When the device is idle, a full measurement is started implicitly
    /// and the call blocks for the warm-up plus settle time. In the
    /// laser-off mode the mass fields are forced to zero; the hardware
    /// reports unknown-value sentinels there.
    pub fn measurement(&mut self) -> Result<Measurement, Error<I2C::Error>> {
        self.auto_start(false)?;

        let words = self.read_words::<8>(commands::READ_MEASURED_VALUES)?;
        let mut values = Measurement::from_words(&words);
        if matches!(self.mode, Mode::Measuring { pm_enabled: false }) {
            values.clear_mass();
        }
        Ok(values)
    }

    /// Reads the particle values: mass and number concentrations plus the
    /// typical particle size. Requires the laser, so a session started
    /// without PM fails with [`Error::IllegalState`].
    pub fn particle_measurement(&mut self) -> Result<ParticleMeasurement, Error<I2C::Error>> {
        self.auto_start(true)?;

        let words = self.read_words::<10>(commands::READ_MEASURED_PM_VALUES)?;
        Ok(ParticleMeasurement::from_words(&words))
    }

    fn auto_start(&mut self, pm_needed: bool) -> Result<(), Error<I2C::Error>> {
        match self.mode {
            Mode::Idle => {
                self.start_measurement()?;
                self.delay.delay_ms(AUTO_START_SETTLE_MS);
                Ok(())
            }
            Mode::Measuring { pm_enabled: false } if pm_needed => Err(Error::IllegalState),
            Mode::Measuring { .. } => Ok(()),
        }
    }

    /// Reads and clears the device-status register.
    ///
    /// Needs firmware 2.0; older devices fail with
    /// [`Error::FirmwareUnsupported`] before any bus traffic. The
    /// register is not clear-on-read: an explicit clear command follows
    /// every read attempt, whatever its outcome.
    pub fn device_status(&mut self) -> Result<DeviceStatus, Error<I2C::Error>> {
        self.require_firmware(STATUS_MIN_FW)?;

        let words = self.read_words::<2>(commands::READ_DEVICE_STATUS);
        let cleared = self.send(commands::CLEAR_DEVICE_STATUS, &Payload::None);

        let words = words?;
        cleared?;
        Ok(DeviceStatus::from_words(&words))
    }

    /// Reads the serial number, up to 32 ASCII characters.
    pub fn serial_number(&mut self) -> Result<String<32>, Error<I2C::Error>> {
        self.device_info(commands::READ_SERIAL_NUMBER)
    }

    /// Reads the product name, up to 32 ASCII characters.
    pub fn product_name(&mut self) -> Result<String<32>, Error<I2C::Error>> {
        self.device_info(commands::READ_PRODUCT_NAME)
    }

    /// Reads the auto-cleaning interval in seconds.
    pub fn auto_cleaning_interval(&mut self) -> Result<u32, Error<I2C::Error>> {
        let words = self.read_words::<2>(commands::AUTO_CLEANING_INTERVAL)?;
        Ok((u32::from(words[0]) << 16) | u32::from(words[1]))
    }

    /// Writes the auto-cleaning interval in seconds (0 disables it).
    ///
    /// The device accepts the write only while idle. A running
    /// measurement is stopped around the write and restarted in the same
    /// variant it was running in.
    pub fn set_auto_cleaning_interval(&mut self, seconds: u32) -> Result<(), Error<I2C::Error>> {
        let resume = match self.mode {
            Mode::Measuring { pm_enabled } => {
                self.stop_measurement()?;
                Some(pm_enabled)
            }
            Mode::Idle => None,
        };

        self.send(commands::AUTO_CLEANING_INTERVAL, &Payload::DoubleWord(seconds))?;

        match resume {
            Some(true) => self.start_measurement(),
            Some(false) => self.start_measurement_without_pm(),
            None => Ok(()),
        }
    }

    /// Reads the warm-start parameter.
    pub fn warm_start(&mut self) -> Result<u16, Error<I2C::Error>> {
        let words = self.read_words::<1>(commands::WARM_START_PARAMETER)?;
        Ok(words[0])
    }

    /// Sets the warm-start behavior, from 0 (cold start, the default) to
    /// 65535 (warm start). Applied on the next start of a measurement, so
    /// it must be written before that start.
    pub fn set_warm_start(&mut self, value: u16) -> Result<(), Error<I2C::Error>> {
        self.send(commands::WARM_START_PARAMETER, &Payload::Word(value))
    }

    /// Reads the RH/T acceleration mode.
    pub fn rht_acceleration_mode(&mut self) -> Result<RhtAccelerationMode, Error<I2C::Error>> {
        let words = self.read_words::<1>(commands::RHT_ACCELERATION_MODE)?;
        RhtAccelerationMode::from_word(words[0]).ok_or(Error::Protocol)
    }

    /// Sets the RH/T acceleration mode. Applied on the next start of a
    /// measurement.
    pub fn set_rht_acceleration_mode(
        &mut self,
        mode: RhtAccelerationMode,
    ) -> Result<(), Error<I2C::Error>> {
        self.send(commands::RHT_ACCELERATION_MODE, &Payload::Word(mode as u16))
    }

    /// Reads the VOC algorithm tuning parameters.
    pub fn voc_tuning(&mut self) -> Result<GasTuning, Error<I2C::Error>> {
        let words = self.read_words::<6>(commands::VOC_TUNING_PARAMETERS)?;
        Ok(GasTuning::from_words(&words))
    }

    /// Writes the VOC algorithm tuning parameters. Out-of-range fields
    /// are replaced with their documented defaults before encoding.
    pub fn set_voc_tuning(&mut self, tuning: GasTuning) -> Result<(), Error<I2C::Error>> {
        let tuning = tuning.sanitized_for_voc();
        self.send(commands::VOC_TUNING_PARAMETERS, &Payload::Tuning(&tuning))
    }

    /// Reads the NOx algorithm tuning parameters.
    pub fn nox_tuning(&mut self) -> Result<GasTuning, Error<I2C::Error>> {
        let words = self.read_words::<6>(commands::NOX_TUNING_PARAMETERS)?;
        Ok(GasTuning::from_words(&words))
    }

    /// Writes the NOx algorithm tuning parameters.
    /// `learn_time_gain_hours` and `std_initial` are fixed by the device
    /// contract and forced to 12 and 50; other out-of-range fields are
    /// replaced with their defaults.
    pub fn set_nox_tuning(&mut self, tuning: GasTuning) -> Result<(), Error<I2C::Error>> {
        let tuning = tuning.sanitized_for_nox();
        self.send(commands::NOX_TUNING_PARAMETERS, &Payload::Tuning(&tuning))
    }

    /// Saves the VOC algorithm state for a later restore across a power
    /// cycle. The blob is opaque and exactly 8 bytes.
    pub fn voc_algorithm_state(&mut self) -> Result<[u8; 8], Error<I2C::Error>> {
        let words = self.read_words::<4>(commands::VOC_ALGORITHM_STATE)?;

        let mut state = [0u8; 8];
        for (chunk, word) in state.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        Ok(state)
    }

    /// Restores a previously saved VOC algorithm state.
    pub fn set_voc_algorithm_state(&mut self, state: &[u8; 8]) -> Result<(), Error<I2C::Error>> {
        self.send(commands::VOC_ALGORITHM_STATE, &Payload::Blob(state))
    }

    /// Reads the temperature compensation parameters.
    pub fn temp_compensation(&mut self) -> Result<TempCompensation, Error<I2C::Error>> {
        let words = self.read_words::<3>(commands::TEMPERATURE_COMPENSATION)?;
        Ok(TempCompensation::from_words(&words))
    }

    /// Writes the temperature compensation parameters. They take effect
    /// on the next start of a measurement; stop first for an immediate
    /// effect.
    pub fn set_temp_compensation(
        &mut self,
        comp: TempCompensation,
    ) -> Result<(), Error<I2C::Error>> {
        self.send(
            commands::TEMPERATURE_COMPENSATION,
            &Payload::TempComp(comp.to_words()),
        )
    }

    fn require_firmware(&mut self, least: (u8, u8)) -> Result<(), Error<I2C::Error>> {
        let current = match self.firmware {
            Some(level) => level,
            None => {
                let version = self.version()?;
                (version.firmware_major, version.firmware_minor)
            }
        };

        if current < least {
            return Err(Error::FirmwareUnsupported);
        }

        Ok(())
    }

    fn send(&mut self, cmd: Cmd, payload: &Payload<'_>) -> Result<(), Error<I2C::Error>> {
        let frame = frame::encode(cmd, payload);
        trace!("sen55 tx {=[u8]:x}", frame.as_bytes());
        self.i2c.write(ADDR, frame.as_bytes())?;
        Ok(())
    }

    fn read_raw(&mut self, cmd: Cmd, raw: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.send(cmd, &Payload::None)?;
        self.delay.delay_ms(COMMAND_DELAY_MS);
        self.i2c.read(ADDR, raw)?;
        trace!("sen55 rx {=[u8]:x}", &raw[..]);
        Ok(())
    }

    fn read_words<const N: usize>(&mut self, cmd: Cmd) -> Result<[u16; N], Error<I2C::Error>> {
        let mut attempt = 1;
        loop {
            let mut raw = [0u8; MAX_RX];
            let result = self
                .read_raw(cmd, &mut raw[..3 * N])
                .and_then(|()| frame::decode_exact(&raw[..3 * N]));

            match result {
                Err(Error::DataLength) if attempt < self.retry.attempts => {
                    attempt += 1;
                    self.delay.delay_ms(self.retry.backoff_ms);
                }
                other => return other,
            }
        }
    }

    fn device_info(&mut self, cmd: Cmd) -> Result<String<32>, Error<I2C::Error>> {
        let mut raw = [0u8; MAX_RX];
        self.read_raw(cmd, &mut raw)?;

        let mut bytes: Vec<u8, 32> = Vec::new();
        frame::decode_terminated(&raw, &mut bytes)?;

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = str::from_utf8(&bytes[..end]).map_err(|_| Error::Protocol)?;
        String::try_from(text).map_err(|_| Error::Protocol)
    }
}
