//! Board constants and persisted records
//!
//! Constants come from machine.toml through build.rs. Settings and the
//! partition table are postcard records in the flash key/value store; a
//! record that is missing or fails to decode is replaced by its default,
//! which is written straight back.

use defmt::*;

use crema_core::config::{ConfigError, MachineSettings, SETTINGS_RECORD_LEN};
use crema_core::partition::{PartitionTable, PARTITION_RECORD_LEN};
use crema_drivers::heater::{HeaterConfig, HeaterKind, TrackPower};
use crema_drivers::pid::PidCoefficients;
use crema_drivers::pump::{PumpConfig, PumpMode};
use crema_drivers::PlantConfig;
use crema_hal::{KeyValueStore, StorageError, StorageKey};

/// Constants of this board build
pub struct MachineConfig {
    pub serial_number: u32,
    pub baudrate: u32,
    pub ul_per_pulse: u16,
    pub no_flow_cutoff: u16,
    pub pump_mode: PumpMode,
    pub flow_gains: PidCoefficients,
    pub flow_offset: u16,
    pub pressure_gains: PidCoefficients,
    pub flow_through_gains: PidCoefficients,
    pub tracks: TrackPower,
    pub brew_head_gains: PidCoefficients,
    pub brew_head_track_w: u16,
    pub brew_head_full_w: u16,
    pub ntc_pullup_ohms: u32,
    pub pressure_full_scale_mbar: u32,
}

include!(concat!(env!("OUT_DIR"), "/machine_config.rs"));

impl MachineConfig {
    /// Controller tuning for the plant
    pub fn plant(&self) -> PlantConfig {
        let flow_through = HeaterConfig {
            kind: HeaterKind::FlowThrough(self.tracks),
            gains: self.flow_through_gains,
            full_output_w: self.tracks.total(),
            ..HeaterConfig::flow_through()
        };
        let brew_head = HeaterConfig {
            kind: HeaterKind::BrewHead {
                track_w: self.brew_head_track_w,
            },
            gains: self.brew_head_gains,
            full_output_w: self.brew_head_full_w,
            ..HeaterConfig::brew_head()
        };
        PlantConfig {
            heaters: [flow_through, flow_through, brew_head],
            pump: PumpConfig {
                flow_gains: self.flow_gains,
                pressure_gains: self.pressure_gains,
                flow_offset: self.flow_offset,
                no_flow_cutoff: self.no_flow_cutoff,
                mode: self.pump_mode,
                ..PumpConfig::default()
            },
            ul_per_pulse: [self.ul_per_pulse; 2],
        }
    }

    /// Settings used when flash holds none
    pub fn default_settings(&self) -> MachineSettings {
        MachineSettings {
            ul_per_pulse: [self.ul_per_pulse; 2],
            ..MachineSettings::default()
        }
    }
}

/// Persistence failures
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    Storage(StorageError),
    Record(ConfigError),
}

impl From<StorageError> for PersistError {
    fn from(e: StorageError) -> Self {
        PersistError::Storage(e)
    }
}

impl From<ConfigError> for PersistError {
    fn from(e: ConfigError) -> Self {
        PersistError::Record(e)
    }
}

/// Load the machine settings, restoring defaults when needed
pub async fn load_settings<S: KeyValueStore>(
    storage: &mut S,
    defaults: MachineSettings,
) -> MachineSettings {
    let mut buffer = [0u8; SETTINGS_RECORD_LEN];
    let loaded = match storage.read(StorageKey::MachineSettings, &mut buffer).await {
        Ok(len) => MachineSettings::decode(&buffer[..len]).map_err(PersistError::from),
        Err(e) => Err(PersistError::from(e)),
    };

    let (mut settings, mut dirty) = match loaded {
        Ok(settings) => {
            info!("Loaded machine settings");
            (settings, false)
        }
        Err(PersistError::Storage(StorageError::NotFound)) => {
            info!("No machine settings stored, using defaults");
            (defaults, true)
        }
        Err(e) => {
            warn!("Machine settings unreadable: {:?}, using defaults", e);
            (defaults, true)
        }
    };
    dirty |= settings.sanitize();

    if dirty {
        if let Err(e) = save_settings(storage, &settings).await {
            error!("Failed to write back machine settings: {:?}", e);
        }
    }
    debug!(
        "ul/pulse {} {}, dummy {}",
        settings.ul_per_pulse[0], settings.ul_per_pulse[1], settings.dummy
    );
    settings
}

/// Load the partition table, starting empty when none is stored
pub async fn load_partitions<S: KeyValueStore>(storage: &mut S) -> PartitionTable {
    let mut buffer = [0u8; PARTITION_RECORD_LEN];
    let loaded = match storage.read(StorageKey::PartitionTable, &mut buffer).await {
        Ok(len) => PartitionTable::decode(&buffer[..len]).map_err(PersistError::from),
        Err(e) => Err(PersistError::from(e)),
    };

    match loaded {
        Ok(table) => {
            info!("Loaded partition table");
            table
        }
        Err(e) => {
            warn!("Partition table unavailable: {:?}, starting empty", e);
            let table = PartitionTable::default();
            if let Err(e) = save_partitions(storage, &table).await {
                error!("Failed to write back partition table: {:?}", e);
            }
            table
        }
    }
}

pub async fn save_settings<S: KeyValueStore>(
    storage: &mut S,
    settings: &MachineSettings,
) -> Result<(), PersistError> {
    let mut buffer = [0u8; SETTINGS_RECORD_LEN];
    let record = settings.encode(&mut buffer)?;
    storage.write(StorageKey::MachineSettings, record).await?;
    Ok(())
}

pub async fn save_partitions<S: KeyValueStore>(
    storage: &mut S,
    table: &PartitionTable,
) -> Result<(), PersistError> {
    let mut buffer = [0u8; PARTITION_RECORD_LEN];
    let record = table.encode(&mut buffer)?;
    storage.write(StorageKey::PartitionTable, record).await?;
    Ok(())
}
