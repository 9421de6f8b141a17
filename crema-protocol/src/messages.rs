//! Message type identifiers
//!
//! The high nibble of the type byte selects a message class; the low nibble
//! selects the message inside it.

// Recipe block upload
pub const MSG_RECIPE_1: u8 = 0x01;
pub const MSG_RECIPE_2: u8 = 0x02;
pub const MSG_RECIPE_3: u8 = 0x03;

// Recipe actions
pub const MSG_START_RECIPE_1: u8 = 0x11;
pub const MSG_START_RECIPE_2: u8 = 0x12;
pub const MSG_START_RECIPE_3: u8 = 0x13;
pub const MSG_STOP_RECIPE_1: u8 = 0x14;
pub const MSG_STOP_RECIPE_2: u8 = 0x15;
pub const MSG_STOP_RECIPE_3: u8 = 0x16;

// Partition and firmware upgrade
pub const MSG_SEND_PARTITION_BLOCK: u8 = 0x21;
pub const MSG_UPGRADE_APPLICATION: u8 = 0x22;
pub const MSG_GET_PARTITION_INFO: u8 = 0x23;
pub const MSG_GET_UPDATE_PROGRESS: u8 = 0x24;
pub const MSG_GET_BOOTLOADER_STATUS: u8 = 0x25;
pub const MSG_SET_PARTITION_STATUS: u8 = 0x26;
pub const MSG_GET_BACKUP_PROGRESS: u8 = 0x27;
pub const MSG_GET_RESTORE_PROGRESS: u8 = 0x28;
pub const MSG_RESTORE_PARTITION: u8 = 0x29;

// Data requests
pub const MSG_GET_ALL_DATA: u8 = 0x31;
pub const MSG_GET_PROCESS_DATA: u8 = 0x32;
pub const MSG_GET_PHYSICAL_DATA: u8 = 0x33;
pub const MSG_GET_DEVICE_DATA: u8 = 0x34;
pub const MSG_GET_DUMMY_MODE: u8 = 0x35;
pub const MSG_GET_DOSING_DATA: u8 = 0x36;
pub const MSG_GET_SETTINGS: u8 = 0x37;
pub const MSG_GET_MACHINE_PARAMETERS: u8 = 0x38;
pub const MSG_SET_MACHINE_PARAMETERS: u8 = 0x39;

// Settings
pub const MSG_SET_LED: u8 = 0x41;
pub const MSG_SET_DUMMY_MODE: u8 = 0x42;
pub const MSG_SET_DOSING_DATA: u8 = 0x43;

// Machine actions
pub const MSG_REBOOT: u8 = 0x51;
pub const MSG_SWITCH_ON: u8 = 0x52;
pub const MSG_STANDBY: u8 = 0x53;
pub const MSG_START_EMBEDDED: u8 = 0x54;

// Consumables
pub const MSG_GET_CONSUMABLE_DATA: u8 = 0x61;
pub const MSG_SET_CONSUMABLE_DATA: u8 = 0x62;

/// Message class selected by the high nibble of the type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageClass {
    RecipeUpload,
    RecipeAction,
    Partition,
    DataRequest,
    Setting,
    MachineAction,
    Consumable,
    Unknown,
}

impl MessageClass {
    pub const fn of(msg_type: u8) -> Self {
        match msg_type & 0xF0 {
            0x00 => Self::RecipeUpload,
            0x10 => Self::RecipeAction,
            0x20 => Self::Partition,
            0x30 => Self::DataRequest,
            0x40 => Self::Setting,
            0x50 => Self::MachineAction,
            0x60 => Self::Consumable,
            _ => Self::Unknown,
        }
    }
}

/// Every message type the controller recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// Upload one block of recipe slot 0..=2
    RecipeBlock(u8),
    /// Start recipe slot 0..=2
    StartRecipe(u8),
    /// Stop recipe slot 0..=2
    StopRecipe(u8),
    SendPartitionBlock,
    UpgradeApplication,
    GetPartitionInfo,
    GetUpdateProgress,
    GetBootloaderStatus,
    SetPartitionStatus,
    GetBackupProgress,
    GetRestoreProgress,
    RestorePartition,
    GetAllData,
    GetProcessData,
    GetPhysicalData,
    GetDeviceData,
    GetDummyMode,
    GetDosingData,
    GetSettings,
    GetMachineParameters,
    SetMachineParameters,
    SetLed,
    SetDummyMode,
    SetDosingData,
    Reboot,
    SwitchOn,
    Standby,
    StartEmbedded,
    GetConsumableData,
    SetConsumableData,
}

impl MessageType {
    /// Decode a type byte
    pub fn from_u8(msg_type: u8) -> Option<Self> {
        Some(match msg_type {
            MSG_RECIPE_1..=MSG_RECIPE_3 => Self::RecipeBlock(msg_type - MSG_RECIPE_1),
            MSG_START_RECIPE_1..=MSG_START_RECIPE_3 => {
                Self::StartRecipe(msg_type - MSG_START_RECIPE_1)
            }
            MSG_STOP_RECIPE_1..=MSG_STOP_RECIPE_3 => Self::StopRecipe(msg_type - MSG_STOP_RECIPE_1),
            MSG_SEND_PARTITION_BLOCK => Self::SendPartitionBlock,
            MSG_UPGRADE_APPLICATION => Self::UpgradeApplication,
            MSG_GET_PARTITION_INFO => Self::GetPartitionInfo,
            MSG_GET_UPDATE_PROGRESS => Self::GetUpdateProgress,
            MSG_GET_BOOTLOADER_STATUS => Self::GetBootloaderStatus,
            MSG_SET_PARTITION_STATUS => Self::SetPartitionStatus,
            MSG_GET_BACKUP_PROGRESS => Self::GetBackupProgress,
            MSG_GET_RESTORE_PROGRESS => Self::GetRestoreProgress,
            MSG_RESTORE_PARTITION => Self::RestorePartition,
            MSG_GET_ALL_DATA => Self::GetAllData,
            MSG_GET_PROCESS_DATA => Self::GetProcessData,
            MSG_GET_PHYSICAL_DATA => Self::GetPhysicalData,
            MSG_GET_DEVICE_DATA => Self::GetDeviceData,
            MSG_GET_DUMMY_MODE => Self::GetDummyMode,
            MSG_GET_DOSING_DATA => Self::GetDosingData,
            MSG_GET_SETTINGS => Self::GetSettings,
            MSG_GET_MACHINE_PARAMETERS => Self::GetMachineParameters,
            MSG_SET_MACHINE_PARAMETERS => Self::SetMachineParameters,
            MSG_SET_LED => Self::SetLed,
            MSG_SET_DUMMY_MODE => Self::SetDummyMode,
            MSG_SET_DOSING_DATA => Self::SetDosingData,
            MSG_REBOOT => Self::Reboot,
            MSG_SWITCH_ON => Self::SwitchOn,
            MSG_STANDBY => Self::Standby,
            MSG_START_EMBEDDED => Self::StartEmbedded,
            MSG_GET_CONSUMABLE_DATA => Self::GetConsumableData,
            MSG_SET_CONSUMABLE_DATA => Self::SetConsumableData,
            _ => return None,
        })
    }

    /// Type byte on the wire
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::RecipeBlock(slot) => MSG_RECIPE_1 + slot,
            Self::StartRecipe(slot) => MSG_START_RECIPE_1 + slot,
            Self::StopRecipe(slot) => MSG_STOP_RECIPE_1 + slot,
            Self::SendPartitionBlock => MSG_SEND_PARTITION_BLOCK,
            Self::UpgradeApplication => MSG_UPGRADE_APPLICATION,
            Self::GetPartitionInfo => MSG_GET_PARTITION_INFO,
            Self::GetUpdateProgress => MSG_GET_UPDATE_PROGRESS,
            Self::GetBootloaderStatus => MSG_GET_BOOTLOADER_STATUS,
            Self::SetPartitionStatus => MSG_SET_PARTITION_STATUS,
            Self::GetBackupProgress => MSG_GET_BACKUP_PROGRESS,
            Self::GetRestoreProgress => MSG_GET_RESTORE_PROGRESS,
            Self::RestorePartition => MSG_RESTORE_PARTITION,
            Self::GetAllData => MSG_GET_ALL_DATA,
            Self::GetProcessData => MSG_GET_PROCESS_DATA,
            Self::GetPhysicalData => MSG_GET_PHYSICAL_DATA,
            Self::GetDeviceData => MSG_GET_DEVICE_DATA,
            Self::GetDummyMode => MSG_GET_DUMMY_MODE,
            Self::GetDosingData => MSG_GET_DOSING_DATA,
            Self::GetSettings => MSG_GET_SETTINGS,
            Self::GetMachineParameters => MSG_GET_MACHINE_PARAMETERS,
            Self::SetMachineParameters => MSG_SET_MACHINE_PARAMETERS,
            Self::SetLed => MSG_SET_LED,
            Self::SetDummyMode => MSG_SET_DUMMY_MODE,
            Self::SetDosingData => MSG_SET_DOSING_DATA,
            Self::Reboot => MSG_REBOOT,
            Self::SwitchOn => MSG_SWITCH_ON,
            Self::Standby => MSG_STANDBY,
            Self::StartEmbedded => MSG_START_EMBEDDED,
            Self::GetConsumableData => MSG_GET_CONSUMABLE_DATA,
            Self::SetConsumableData => MSG_SET_CONSUMABLE_DATA,
        }
    }

    pub const fn class(self) -> MessageClass {
        MessageClass::of(self.to_u8())
    }
}
