//! Typed register values and their pure wire mappings.
//!
//! Words arrive as big-endian 16-bit values with the checksums already
//! stripped; everything here is a total function of those words. Signed
//! fields use two's-complement interpretation, fixed-point fields carry
//! their scale in the conversion.

use bitflags::bitflags;

/// Version of this driver, reported alongside the device levels.
const DRIVER_VERSION: (u8, u8) = (0, 1);

fn unsigned(word: u16, scale: f32) -> f32 {
    f32::from(word) / scale
}

fn signed(word: u16, scale: f32) -> f32 {
    f32::from(word as i16) / scale
}

/// SEN55 measured values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Mass Concentration PM1.0 [µg/m³]
    pub pm1_0: f32,
    /// Mass Concentration PM2.5 [µg/m³]
    pub pm2_5: f32,
    /// Mass Concentration PM4.0 [µg/m³]
    pub pm4_0: f32,
    /// Mass Concentration PM10 [µg/m³]
    pub pm10_0: f32,
    /// Compensated Ambient Humidity [%RH]
    pub humidity: f32,
    /// Compensated Ambient Temperature [°C]
    pub temperature: f32,
    /// VOC Index
    pub voc_index: f32,
    /// NOx Index
    pub nox_index: f32,
}

impl Measurement {
    pub(crate) fn from_words(words: &[u16; 8]) -> Self {
        Self {
            pm1_0: unsigned(words[0], 10.0),
            pm2_5: unsigned(words[1], 10.0),
            pm4_0: unsigned(words[2], 10.0),
            pm10_0: unsigned(words[3], 10.0),
            humidity: signed(words[4], 100.0),
            temperature: signed(words[5], 200.0),
            voc_index: signed(words[6], 10.0),
            nox_index: signed(words[7], 10.0),
        }
    }

    pub(crate) fn clear_mass(&mut self) {
        self.pm1_0 = 0.0;
        self.pm2_5 = 0.0;
        self.pm4_0 = 0.0;
        self.pm10_0 = 0.0;
    }
}

/// SEN55 particle values (mass and number concentrations), layout
/// compatible with the SPS30.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParticleMeasurement {
    /// Mass Concentration PM1.0 [µg/m³]
    pub pm1_0: f32,
    /// Mass Concentration PM2.5 [µg/m³]
    pub pm2_5: f32,
    /// Mass Concentration PM4.0 [µg/m³]
    pub pm4_0: f32,
    /// Mass Concentration PM10 [µg/m³]
    pub pm10_0: f32,
    /// Number Concentration PM0.5 [#/cm³]
    pub nc0_5: f32,
    /// Number Concentration PM1.0 [#/cm³]
    pub nc1_0: f32,
    /// Number Concentration PM2.5 [#/cm³]
    pub nc2_5: f32,
    /// Number Concentration PM4.0 [#/cm³]
    pub nc4_0: f32,
    /// Number Concentration PM10 [#/cm³]
    pub nc10_0: f32,
    /// Typical Particle Size [µm]
    pub typical_particle_size: f32,
}

impl ParticleMeasurement {
    pub(crate) fn from_words(words: &[u16; 10]) -> Self {
        Self {
            pm1_0: unsigned(words[0], 10.0),
            pm2_5: unsigned(words[1], 10.0),
            pm4_0: unsigned(words[2], 10.0),
            pm10_0: unsigned(words[3], 10.0),
            nc0_5: unsigned(words[4], 10.0),
            nc1_0: unsigned(words[5], 10.0),
            nc2_5: unsigned(words[6], 10.0),
            nc4_0: unsigned(words[7], 10.0),
            nc10_0: unsigned(words[8], 10.0),
            typical_particle_size: unsigned(words[9], 1000.0),
        }
    }
}

/// Device and driver version levels.
///
/// Only the firmware level is documented by Sensirion; the hardware and
/// protocol levels are reported by the device all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    /// Firmware built with debugging enabled.
    pub firmware_debug: bool,
    pub hardware_major: u8,
    pub hardware_minor: u8,
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub driver_major: u8,
    pub driver_minor: u8,
}

impl Version {
    pub(crate) fn from_words(words: &[u16; 4]) -> Self {
        let [firmware_major, firmware_minor] = words[0].to_be_bytes();
        let [firmware_debug, hardware_major] = words[1].to_be_bytes();
        let [hardware_minor, protocol_major] = words[2].to_be_bytes();
        let [protocol_minor, _] = words[3].to_be_bytes();

        Self {
            firmware_major,
            firmware_minor,
            firmware_debug: firmware_debug != 0,
            hardware_major,
            hardware_minor,
            protocol_major,
            protocol_minor,
            driver_major: DRIVER_VERSION.0,
            driver_minor: DRIVER_VERSION.1,
        }
    }
}

bitflags! {
    /// Fault bits of the device-status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FaultFlags: u8 {
        /// Fan speed outside the accepted range.
        const SPEED = 0b00000001;
        /// Laser current out of range.
        const LASER = 0b00000010;
        /// Fan broken or blocked (0 RPM while switched on).
        const FAN = 0b00000100;
        /// Gas sensor error (VOC and NOx).
        const GAS = 0b00001000;
        /// RH/T sensor communication or measurement error.
        const RHT = 0b00010000;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FaultFlags {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "FaultFlags({=u8:b})", self.bits());
    }
}

/// Decoded device-status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceStatus {
    /// No faults, no cleaning cycle running.
    Ok,
    /// No faults; a fan cleaning cycle is currently running.
    CleaningActive,
    /// At least one subsystem reports a fault. Fault bits take
    /// precedence: the cleaning indication is suppressed while any of
    /// them is set.
    Fault(FaultFlags),
}

impl DeviceStatus {
    pub(crate) fn from_words(words: &[u16; 2]) -> Self {
        let mut faults = FaultFlags::empty();
        if words[0] & 0x0020 != 0 {
            faults |= FaultFlags::SPEED;
        }
        if words[1] & 0x0080 != 0 {
            faults |= FaultFlags::GAS;
        }
        if words[1] & 0x0040 != 0 {
            faults |= FaultFlags::RHT;
        }
        if words[1] & 0x0020 != 0 {
            faults |= FaultFlags::LASER;
        }
        if words[1] & 0x0010 != 0 {
            faults |= FaultFlags::FAN;
        }

        if !faults.is_empty() {
            Self::Fault(faults)
        } else if words[0] & 0x0008 != 0 {
            Self::CleaningActive
        } else {
            Self::Ok
        }
    }
}

/// Gas index algorithm tuning parameters.
///
/// The VOC and NOx registers share this layout. Details are in the
/// Sensirion application note "Engineering Guidelines for SEN5x".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GasTuning {
    /// Index representing typical (average) conditions, range 1..=250.
    pub index_offset: i16,
    /// Time constant to estimate the algorithm offset from history, in
    /// hours; past events are forgotten after about twice this time.
    /// Range 1..=1000.
    pub learn_time_offset_hours: i16,
    /// Time constant to estimate the algorithm gain from history, in
    /// hours. Has no effect for NOx and must stay at 12 there.
    pub learn_time_gain_hours: i16,
    /// Maximum duration of gating in minutes (estimator freeze during a
    /// high index signal); 0 disables gating. Range 0..=3000.
    pub gate_max_duration_min: i16,
    /// Initial estimate for the standard deviation. Has no effect for
    /// NOx and must stay at 50 there.
    pub std_initial: i16,
    /// Gain factor to amplify or attenuate the index output, range
    /// 1..=1000.
    pub gain_factor: i16,
}

impl GasTuning {
    /// Factory defaults of the VOC tuning register.
    pub const VOC_DEFAULT: Self = Self {
        index_offset: 100,
        learn_time_offset_hours: 12,
        learn_time_gain_hours: 12,
        gate_max_duration_min: 180,
        std_initial: 50,
        gain_factor: 230,
    };

    /// Factory defaults of the NOx tuning register.
    pub const NOX_DEFAULT: Self = Self {
        index_offset: 1,
        learn_time_offset_hours: 12,
        learn_time_gain_hours: 12,
        gate_max_duration_min: 720,
        std_initial: 50,
        gain_factor: 230,
    };

    pub(crate) fn from_words(words: &[u16; 6]) -> Self {
        Self {
            index_offset: words[0] as i16,
            learn_time_offset_hours: words[1] as i16,
            learn_time_gain_hours: words[2] as i16,
            gate_max_duration_min: words[3] as i16,
            std_initial: words[4] as i16,
            gain_factor: words[5] as i16,
        }
    }

    /// Replaces out-of-range fields with the VOC defaults.
    pub(crate) fn sanitized_for_voc(mut self) -> Self {
        if !(1..=250).contains(&self.index_offset) {
            self.index_offset = Self::VOC_DEFAULT.index_offset;
        }
        if !(1..=1000).contains(&self.learn_time_offset_hours) {
            self.learn_time_offset_hours = Self::VOC_DEFAULT.learn_time_offset_hours;
        }
        if !(1..=1000).contains(&self.learn_time_gain_hours) {
            self.learn_time_gain_hours = Self::VOC_DEFAULT.learn_time_gain_hours;
        }
        if !(0..=3000).contains(&self.gate_max_duration_min) {
            self.gate_max_duration_min = Self::VOC_DEFAULT.gate_max_duration_min;
        }
        if !(10..=5000).contains(&self.std_initial) {
            self.std_initial = Self::VOC_DEFAULT.std_initial;
        }
        if !(1..=1000).contains(&self.gain_factor) {
            self.gain_factor = Self::VOC_DEFAULT.gain_factor;
        }
        self
    }

    /// Replaces out-of-range fields with the NOx defaults and forces the
    /// two fields the device treats as fixed constants, which are
    /// writable on the wire but must not be changed.
    pub(crate) fn sanitized_for_nox(mut self) -> Self {
        self.learn_time_gain_hours = Self::NOX_DEFAULT.learn_time_gain_hours;
        self.std_initial = Self::NOX_DEFAULT.std_initial;

        if !(1..=250).contains(&self.index_offset) {
            self.index_offset = Self::NOX_DEFAULT.index_offset;
        }
        if !(1..=1000).contains(&self.learn_time_offset_hours) {
            self.learn_time_offset_hours = Self::NOX_DEFAULT.learn_time_offset_hours;
        }
        if !(0..=3000).contains(&self.gate_max_duration_min) {
            self.gate_max_duration_min = Self::NOX_DEFAULT.gate_max_duration_min;
        }
        if !(1..=1000).contains(&self.gain_factor) {
            self.gain_factor = Self::NOX_DEFAULT.gain_factor;
        }
        self
    }
}

/// Temperature compensation parameters in engineering units.
///
/// Offset and slope are smoothed with the time constant: after
/// `time_constant` seconds, 63% of the new values are applied.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempCompensation {
    /// Temperature offset [°C], wire scale 200.
    pub offset: f32,
    /// Normalized temperature offset slope, wire scale 1000.
    pub slope: f32,
    /// Time constant [s].
    pub time_constant: u16,
}

impl TempCompensation {
    pub(crate) fn from_words(words: &[u16; 3]) -> Self {
        Self {
            offset: signed(words[0], 200.0),
            slope: signed(words[1], 1000.0),
            time_constant: words[2],
        }
    }

    pub(crate) fn to_words(self) -> [u16; 3] {
        [
            scale_to_wire(self.offset, 200.0),
            scale_to_wire(self.slope, 1000.0),
            self.time_constant,
        ]
    }
}

fn scale_to_wire(value: f32, scale: f32) -> u16 {
    let scaled = value * scale;
    let rounded = if scaled >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
    rounded as i16 as u16
}

/// RH/T acceleration mode, applied on the next start of a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum RhtAccelerationMode {
    /// For stationary devices not subject to large temperature swings.
    Low = 0,
    /// For monitors subjected to large, fast temperature changes.
    High = 1,
    Medium = 2,
}

impl RhtAccelerationMode {
    pub(crate) fn from_word(word: u16) -> Option<Self> {
        match word {
            0 => Some(Self::Low),
            1 => Some(Self::High),
            2 => Some(Self::Medium),
            _ => None,
        }
    }
}
