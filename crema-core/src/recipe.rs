//! Recipe and block model
//!
//! Three recipe slots exist. Slots 1 and 2 are brewing recipes that may run
//! side by side and compete for the two brew circuits. Slot 3 is the
//! brew-head pre-heat pseudo-recipe; only heater 3 and the temperature of
//! its first block matter.

use crema_protocol::{FieldError, Frame, Status};

use crate::conditions::EndConditions;
use crate::traits::ControlType;

/// Maximum number of blocks per recipe
pub const MAX_BLOCKS: usize = 8;

/// Pre-heat temperature held by slot 3 after boot, °C
pub const DEFAULT_PREHEAT_C: u8 = 60;

/// Current-block value reported for a recipe that is not running
pub const NO_BLOCK: u8 = 0xFF;

/// One of the three recipe slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecipeSlot {
    One,
    Two,
    /// Brew-head pre-heat
    Three,
}

impl RecipeSlot {
    pub const ALL: [RecipeSlot; 3] = [RecipeSlot::One, RecipeSlot::Two, RecipeSlot::Three];

    /// The slots that brew and compete for circuits
    pub const BREWING: [RecipeSlot; 2] = [RecipeSlot::One, RecipeSlot::Two];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RecipeSlot::One),
            1 => Some(RecipeSlot::Two),
            2 => Some(RecipeSlot::Three),
            _ => None,
        }
    }

    /// The other brewing slot; slot 3 has none
    pub const fn other(self) -> Option<Self> {
        match self {
            RecipeSlot::One => Some(RecipeSlot::Two),
            RecipeSlot::Two => Some(RecipeSlot::One),
            RecipeSlot::Three => None,
        }
    }
}

/// A physical brew circuit (pump, heater and outlet valves)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Circuit {
    One,
    Two,
}

impl Circuit {
    pub const ALL: [Circuit; 2] = [Circuit::One, Circuit::Two];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Where a circuit delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outlet {
    #[default]
    Off,
    Coffee,
    /// Steam to the milk outlet
    Milk,
    /// Hot water through the shared S3 valve
    Water,
}

/// Circuits a block runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CircuitSelection {
    One,
    Two,
    Both,
}

/// Decoded valve selector of a block
///
/// High nibble: 0 circuit 1, 1 circuit 2, 2 both. Low nibble: 0 off,
/// 1 coffee, 2 milk, 3 water.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValveSelector {
    pub circuits: CircuitSelection,
    pub outlet: Outlet,
}

impl ValveSelector {
    /// Decode the raw byte; `None` means the block uses no circuit
    pub const fn decode(raw: u8) -> Option<Self> {
        let circuits = match raw >> 4 {
            0 => CircuitSelection::One,
            1 => CircuitSelection::Two,
            2 => CircuitSelection::Both,
            _ => return None,
        };
        let outlet = match raw & 0x0F {
            0 => Outlet::Off,
            1 => Outlet::Coffee,
            2 => Outlet::Milk,
            3 => Outlet::Water,
            _ => return None,
        };
        Some(Self { circuits, outlet })
    }

    pub const fn encode(self) -> u8 {
        let hi = match self.circuits {
            CircuitSelection::One => 0,
            CircuitSelection::Two => 1,
            CircuitSelection::Both => 2,
        };
        let lo = match self.outlet {
            Outlet::Off => 0,
            Outlet::Coffee => 1,
            Outlet::Milk => 2,
            Outlet::Water => 3,
        };
        (hi << 4) | lo
    }

    pub const fn uses(self, circuit: Circuit) -> bool {
        matches!(
            (self.circuits, circuit),
            (CircuitSelection::Both, _)
                | (CircuitSelection::One, Circuit::One)
                | (CircuitSelection::Two, Circuit::Two)
        )
    }

    pub fn circuits(self) -> impl Iterator<Item = Circuit> {
        Circuit::ALL.into_iter().filter(move |&c| self.uses(c))
    }
}

/// Targets for one brew circuit inside a block, in recipe units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CircuitTargets {
    /// Heater temperature, °C
    pub temperature: u8,
    /// Flow, 0.1 ml/s
    pub flow: u8,
    /// Pressure, 0.1 bar
    pub pressure: u8,
    /// Volume, ml
    pub volume: u16,
    pub control: ControlType,
}

impl CircuitTargets {
    /// Whether the block needs the pump of this circuit
    pub const fn needs_pump(&self) -> bool {
        self.flow > 0 || self.pressure > 0 || self.volume > 0
    }
}

/// One step of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecipeBlock {
    /// Targets for circuit 1 and circuit 2
    pub circuits: [CircuitTargets; 2],
    /// Brew-head heater temperature, °C
    pub preheat: u8,
    /// Milk temperature, °C
    pub milk: u8,
    /// Air pump duty, %
    pub air_pump: u8,
    /// Raw valve selector, see [`ValveSelector`]
    pub valves: u8,
    pub piston: u8,
    /// Time budget in sequencer ticks (100 ms)
    pub time: u16,
    pub end_conditions: EndConditions,
}

/// Header and body of an uploaded block, as carried in the frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockUpload {
    pub block_count: u8,
    pub index: u8,
    pub block: RecipeBlock,
}

impl BlockUpload {
    /// Decode the payload of a recipe upload message
    pub fn from_frame(frame: &Frame) -> Result<Self, FieldError> {
        let byte = |offset| frame.field(offset, 2).map(|v| v as u8);
        let word = |offset| frame.field(offset, 4);

        let block = RecipeBlock {
            circuits: [
                CircuitTargets {
                    temperature: byte(12)?,
                    flow: byte(20)?,
                    pressure: byte(26)?,
                    volume: word(30)?,
                    control: ControlType::from_u8(byte(46)?),
                },
                CircuitTargets {
                    temperature: byte(14)?,
                    flow: byte(22)?,
                    pressure: byte(28)?,
                    volume: word(34)?,
                    control: ControlType::from_u8(byte(48)?),
                },
            ],
            preheat: byte(16)?,
            milk: byte(18)?,
            air_pump: byte(24)?,
            valves: byte(38)?,
            piston: byte(40)?,
            time: word(42)?,
            end_conditions: EndConditions::from_masks([
                word(50)?,
                word(54)?,
                word(58)?,
                word(62)?,
            ]),
        };

        Ok(Self {
            block_count: byte(8)?,
            index: byte(10)?,
            block,
        })
    }
}

/// Reasons a block upload is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockError {
    /// Index not below the announced block count
    OutOfRange,
    /// Block count zero or larger than [`MAX_BLOCKS`]
    TooManyBlocks,
    /// Index neither repeats nor follows the previous upload
    OutOfSequence,
}

impl From<BlockError> for Status {
    fn from(_: BlockError) -> Self {
        Status::BlockNrError
    }
}

/// Run-time state and contents of one slot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Recipe {
    blocks: [RecipeBlock; MAX_BLOCKS],
    block_count: u8,
    /// Last block index received, for sequencing uploads
    last_uploaded: Option<u8>,
    current_block: Option<u8>,
    active: bool,
    valid: bool,
    /// Volume credited while running, µl
    total_volume: u32,
    /// Sum of the pump volumes of all blocks, µl
    target_total_volume: u32,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot 3 as it is after boot
    ///
    /// Nothing has been uploaded, but block 0 already carries the default
    /// pre-heat temperature so idle pre-heating works out of the box.
    pub fn preheat() -> Self {
        let mut recipe = Self::new();
        recipe.blocks[0].preheat = DEFAULT_PREHEAT_C;
        recipe
    }

    /// Activate or deactivate
    ///
    /// Activating a recipe that is already active changes nothing.
    pub fn set_active(&mut self, active: bool) {
        if active {
            if !self.active {
                self.active = true;
                self.current_block = Some(0);
                self.total_volume = 0;
            }
        } else {
            self.active = false;
            self.current_block = None;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn block_count(&self) -> u8 {
        self.block_count
    }

    pub fn current_block(&self) -> Option<u8> {
        self.current_block
    }

    /// Current block for telemetry, [`NO_BLOCK`] when not running
    pub fn current_block_raw(&self) -> u8 {
        self.current_block.unwrap_or(NO_BLOCK)
    }

    /// The block being executed
    pub fn active_block(&self) -> Option<&RecipeBlock> {
        self.current_block
            .and_then(|i| self.blocks.get(usize::from(i)))
    }

    pub fn block(&self, index: usize) -> Option<&RecipeBlock> {
        self.blocks[..usize::from(self.block_count)].get(index)
    }

    /// Move to the next block; returns false once past the last one
    pub fn advance(&mut self) -> bool {
        let next = self.current_block.map_or(0, |i| i.saturating_add(1));
        self.current_block = Some(next);
        next < self.block_count
    }

    pub fn total_volume(&self) -> u32 {
        self.total_volume
    }

    pub fn target_total_volume(&self) -> u32 {
        self.target_total_volume
    }

    pub fn credit_volume(&mut self, microlitres: u32) {
        self.total_volume = self.total_volume.saturating_add(microlitres);
    }

    /// Store one uploaded block
    ///
    /// Block 0 clears everything uploaded before. The recipe is valid once
    /// the last announced block is in.
    pub fn store(&mut self, upload: BlockUpload) -> Result<(), BlockError> {
        let BlockUpload {
            block_count,
            index,
            block,
        } = upload;

        if index >= block_count {
            return Err(BlockError::OutOfRange);
        }
        if usize::from(block_count) > MAX_BLOCKS {
            return Err(BlockError::TooManyBlocks);
        }
        if index > 0 {
            let in_sequence = self
                .last_uploaded
                .is_some_and(|last| index == last || index == last + 1);
            if !in_sequence || block_count != self.block_count {
                return Err(BlockError::OutOfSequence);
            }
        }

        if index == 0 {
            self.blocks = Default::default();
            self.target_total_volume = 0;
        } else if self.last_uploaded == Some(index) {
            // A resent block replaces its earlier copy
            let replaced = block_volume(&self.blocks[usize::from(index)]);
            self.target_total_volume = self.target_total_volume.saturating_sub(replaced);
        }
        self.block_count = block_count;
        self.target_total_volume = self
            .target_total_volume
            .saturating_add(block_volume(&block));
        self.blocks[usize::from(index)] = block;
        self.last_uploaded = Some(index);
        self.valid = index + 1 == block_count;
        Ok(())
    }
}

/// P1 plus P2 volume of a block in µl
fn block_volume(block: &RecipeBlock) -> u32 {
    block
        .circuits
        .iter()
        .map(|c| u32::from(c.volume) * 1000)
        .sum()
}

/// All three slots
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecipeBook {
    recipes: [Recipe; 3],
}

impl Default for RecipeBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeBook {
    pub fn new() -> Self {
        Self {
            recipes: [Recipe::new(), Recipe::new(), Recipe::preheat()],
        }
    }

    pub fn get(&self, slot: RecipeSlot) -> &Recipe {
        &self.recipes[slot.index()]
    }

    pub fn get_mut(&mut self, slot: RecipeSlot) -> &mut Recipe {
        &mut self.recipes[slot.index()]
    }

    pub fn set_active(&mut self, slot: RecipeSlot, active: bool) {
        self.get_mut(slot).set_active(active);
    }

    pub fn is_active(&self, slot: RecipeSlot) -> bool {
        self.get(slot).is_active()
    }

    /// Pre-heat temperature from slot 3, °C
    pub fn preheat_temperature(&self) -> u8 {
        self.recipes[RecipeSlot::Three.index()].blocks[0].preheat
    }

    /// Pre-heat time budget from slot 3, in sequencer ticks
    pub fn preheat_time(&self) -> u16 {
        self.recipes[RecipeSlot::Three.index()].blocks[0].time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(block_count: u8, index: u8, volume: u16) -> BlockUpload {
        let mut block = RecipeBlock::default();
        block.circuits[0].volume = volume;
        BlockUpload {
            block_count,
            index,
            block,
        }
    }

    #[test]
    fn test_valve_selector_decode() {
        let sel = ValveSelector::decode(0x21).unwrap();
        assert_eq!(sel.circuits, CircuitSelection::Both);
        assert_eq!(sel.outlet, Outlet::Coffee);
        assert!(sel.uses(Circuit::One) && sel.uses(Circuit::Two));

        let sel = ValveSelector::decode(0x13).unwrap();
        assert_eq!(sel.circuits().collect::<heapless::Vec<_, 2>>(), [Circuit::Two]);
        assert_eq!(sel.outlet, Outlet::Water);
        assert_eq!(sel.encode(), 0x13);

        assert_eq!(ValveSelector::decode(0x31), None);
        assert_eq!(ValveSelector::decode(0x04), None);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut recipe = Recipe::new();
        recipe.store(upload(2, 0, 0)).unwrap();
        recipe.store(upload(2, 1, 0)).unwrap();

        recipe.set_active(true);
        recipe.credit_volume(500);
        recipe.advance();
        recipe.set_active(true);

        assert_eq!(recipe.current_block(), Some(1));
        assert_eq!(recipe.total_volume(), 500);

        recipe.set_active(false);
        assert_eq!(recipe.current_block_raw(), NO_BLOCK);
    }

    #[test]
    fn test_upload_marks_valid_on_last_block() {
        let mut recipe = Recipe::new();
        recipe.store(upload(3, 0, 10)).unwrap();
        assert!(!recipe.is_valid());
        recipe.store(upload(3, 1, 20)).unwrap();
        assert!(!recipe.is_valid());
        recipe.store(upload(3, 2, 30)).unwrap();
        assert!(recipe.is_valid());
        assert_eq!(recipe.target_total_volume(), 60_000);
    }

    #[test]
    fn test_resent_block_counts_once() {
        let mut recipe = Recipe::new();
        recipe.store(upload(3, 0, 10)).unwrap();
        recipe.store(upload(3, 1, 20)).unwrap();
        recipe.store(upload(3, 1, 20)).unwrap();
        recipe.store(upload(3, 2, 0)).unwrap();
        assert!(recipe.is_valid());
        assert_eq!(recipe.target_total_volume(), 30_000);

        // A corrected resend replaces the earlier volume
        recipe.store(upload(3, 2, 5)).unwrap();
        assert_eq!(recipe.target_total_volume(), 35_000);
    }

    #[test]
    fn test_block_zero_restarts_upload() {
        let mut recipe = Recipe::new();
        recipe.store(upload(2, 0, 10)).unwrap();
        recipe.store(upload(2, 1, 10)).unwrap();
        assert!(recipe.is_valid());

        recipe.store(upload(2, 0, 5)).unwrap();
        assert!(!recipe.is_valid());
        assert_eq!(recipe.target_total_volume(), 5_000);
        assert_eq!(recipe.block(1), Some(&RecipeBlock::default()));
    }

    #[test]
    fn test_upload_rejects_bad_indices() {
        let mut recipe = Recipe::new();
        assert_eq!(recipe.store(upload(2, 2, 0)), Err(BlockError::OutOfRange));
        assert_eq!(recipe.store(upload(9, 0, 0)), Err(BlockError::TooManyBlocks));
        assert_eq!(recipe.store(upload(3, 1, 0)), Err(BlockError::OutOfSequence));

        recipe.store(upload(3, 0, 0)).unwrap();
        assert_eq!(recipe.store(upload(3, 2, 0)), Err(BlockError::OutOfSequence));
        // Repeating the last block is allowed
        recipe.store(upload(3, 0, 0)).unwrap();
        recipe.store(upload(3, 1, 0)).unwrap();
        recipe.store(upload(3, 1, 0)).unwrap();
    }

    #[test]
    fn test_advance_past_last_block() {
        let mut recipe = Recipe::new();
        recipe.store(upload(2, 0, 0)).unwrap();
        recipe.store(upload(2, 1, 0)).unwrap();
        recipe.set_active(true);
        assert!(recipe.advance());
        assert!(!recipe.advance());
    }

    #[test]
    fn test_preheat_slot_defaults() {
        let book = RecipeBook::new();
        assert_eq!(book.preheat_temperature(), DEFAULT_PREHEAT_C);
        assert!(!book.get(RecipeSlot::Three).is_valid());
        assert!(!book.get(RecipeSlot::One).is_valid());
        assert!(!book.is_active(RecipeSlot::Three));
    }
}
