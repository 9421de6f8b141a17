//! Analog sensor conversion
//!
//! NTC thermistors on the heater blocks and the steam wand, and the two
//! ratiometric pressure transducers. Everything is integer math on raw
//! 12-bit ADC counts.

/// Sensor read failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Reading pinned at the top rail
    OpenCircuit,
    /// Reading pinned at the bottom rail
    ShortCircuit,
    /// Valid reading outside the conversion table
    OutOfRange,
    /// ADC did not deliver a sample
    Conversion,
}

/// One ADC channel
pub trait AdcReader {
    /// 12-bit sample
    fn read(&mut self) -> Result<u16, SensorError>;
}

/// Temperature in 0.1 °C
pub trait TemperatureSensor {
    fn read_celsius_x10(&mut self) -> Result<i16, SensorError>;
}

/// Pressure in mbar
pub trait PressureSensor {
    fn read_mbar(&mut self) -> Result<u32, SensorError>;
}

const ADC_MAX: u16 = 4096;

/// 10K B3950 thermistor, (resistance in ohms, temperature ×10)
///
/// Sorted by falling resistance. Covers the range from a cold machine to
/// superheated steam.
const NTC_TABLE: &[(u32, i16)] = &[
    (32_650, 0),
    (19_900, 100),
    (12_490, 200),
    (10_000, 250),
    (8_057, 300),
    (5_327, 400),
    (3_603, 500),
    (2_488, 600),
    (1_752, 700),
    (1_258, 800),
    (918, 900),
    (680, 1000),
    (511, 1100),
    (389, 1200),
    (301, 1300),
    (235, 1400),
    (185, 1500),
    (148, 1600),
];

/// NTC thermistor on the low side of a pull-up divider
pub struct NtcSensor<ADC> {
    adc: ADC,
    pullup_ohms: u32,
}

impl<ADC> NtcSensor<ADC> {
    pub fn new(adc: ADC, pullup_ohms: u32) -> Self {
        Self { adc, pullup_ohms }
    }

    /// R_ntc = R_pullup * adc / (adc_max - adc)
    pub fn adc_to_resistance(&self, adc_value: u16) -> Result<u32, SensorError> {
        if adc_value >= ADC_MAX - 10 {
            return Err(SensorError::OpenCircuit);
        }
        if adc_value < 10 {
            return Err(SensorError::ShortCircuit);
        }
        let numerator = u64::from(self.pullup_ohms) * u64::from(adc_value);
        let denominator = u64::from(ADC_MAX - adc_value);
        Ok((numerator / denominator) as u32)
    }

    /// Linear interpolation between table points
    pub fn resistance_to_temp_x10(resistance: u32) -> Result<i16, SensorError> {
        let first = NTC_TABLE[0];
        let last = NTC_TABLE[NTC_TABLE.len() - 1];
        if resistance > first.0 || resistance < last.0 {
            return Err(SensorError::OutOfRange);
        }

        NTC_TABLE
            .windows(2)
            .find(|pair| resistance <= pair[0].0 && resistance >= pair[1].0)
            .map(|pair| {
                let (r_high, t_low) = pair[0];
                let (r_low, t_high) = pair[1];
                let offset = i32::from(t_high - t_low) * (r_high - resistance) as i32
                    / (r_high - r_low) as i32;
                t_low + offset as i16
            })
            .ok_or(SensorError::OutOfRange)
    }
}

impl<ADC: AdcReader> TemperatureSensor for NtcSensor<ADC> {
    fn read_celsius_x10(&mut self) -> Result<i16, SensorError> {
        let raw = self.adc.read()?;
        let resistance = self.adc_to_resistance(raw)?;
        Self::resistance_to_temp_x10(resistance)
    }
}

/// Ratiometric transducer, 10 %..90 % of supply over 0..full scale
pub struct PressureTransducer<ADC> {
    adc: ADC,
    full_scale_mbar: u32,
}

impl<ADC> PressureTransducer<ADC> {
    const ZERO: u32 = ADC_MAX as u32 / 10;
    const SPAN: u32 = ADC_MAX as u32 * 8 / 10;

    pub fn new(adc: ADC, full_scale_mbar: u32) -> Self {
        Self {
            adc,
            full_scale_mbar,
        }
    }

    /// Convert a raw sample, clamping below zero pressure
    pub fn raw_to_mbar(&self, raw: u16) -> Result<u32, SensorError> {
        if raw < 10 {
            return Err(SensorError::ShortCircuit);
        }
        let above_zero = u32::from(raw).saturating_sub(Self::ZERO);
        Ok((above_zero * self.full_scale_mbar / Self::SPAN).min(self.full_scale_mbar))
    }
}

impl<ADC: AdcReader> PressureSensor for PressureTransducer<ADC> {
    fn read_mbar(&mut self) -> Result<u32, SensorError> {
        let raw = self.adc.read()?;
        self.raw_to_mbar(raw)
    }
}
