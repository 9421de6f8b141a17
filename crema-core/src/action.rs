//! Host actions waiting for the sequencer
//!
//! Start, stop, switch-on and standby requests are not executed by the
//! dispatcher. They are parked here as a single pending token until the
//! sequencer picks them up on one of its ticks. The host gets its reply only
//! then, or an execute-timeout if nobody took the token within
//! [`ACTION_TIMEOUT_MS`].

use crema_protocol::{MessageType, Status};

use crate::recipe::{RecipeBook, RecipeSlot};
use crate::traits::MainsStatus;

/// Time the sequencer has to pick up a pending action
pub const ACTION_TIMEOUT_MS: u32 = 500;

/// An action the host can ask the sequencer for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    StartRecipe(RecipeSlot),
    StopRecipe(RecipeSlot),
    SwitchOn,
    Standby,
    StartEmbedded,
}

impl Action {
    pub fn from_message(message: MessageType) -> Option<Self> {
        match message {
            MessageType::StartRecipe(i) => RecipeSlot::from_index(i).map(Action::StartRecipe),
            MessageType::StopRecipe(i) => RecipeSlot::from_index(i).map(Action::StopRecipe),
            MessageType::SwitchOn => Some(Action::SwitchOn),
            MessageType::Standby => Some(Action::Standby),
            MessageType::StartEmbedded => Some(Action::StartEmbedded),
            _ => None,
        }
    }

    /// Message type the reply carries
    pub fn message(self) -> MessageType {
        match self {
            Action::StartRecipe(slot) => MessageType::StartRecipe(slot.index() as u8),
            Action::StopRecipe(slot) => MessageType::StopRecipe(slot.index() as u8),
            Action::SwitchOn => MessageType::SwitchOn,
            Action::Standby => MessageType::Standby,
            Action::StartEmbedded => MessageType::StartEmbedded,
        }
    }
}

/// Why an action was refused before it became pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionRejected {
    /// Start requested for a recipe without a complete upload
    NoValidRecipe,
    /// Stop requested for a recipe that is not running
    RecipeNotActive,
    /// Start requested without a mains reference
    NoZeroCross,
}

impl From<ActionRejected> for Status {
    fn from(rejected: ActionRejected) -> Self {
        match rejected {
            ActionRejected::NoValidRecipe => Status::NoValidRecipe,
            ActionRejected::RecipeNotActive => Status::RecipeNotActive,
            ActionRejected::NoZeroCross => Status::NoZeroCross,
        }
    }
}

/// Check the preconditions of an action
///
/// Starting a recipe needs a valid upload and, unless the machine runs
/// without hardware, a live zero-cross. Stopping needs the recipe running.
pub fn admit(
    action: Action,
    recipes: &RecipeBook,
    mains: MainsStatus,
    simulated: bool,
) -> Result<(), ActionRejected> {
    match action {
        Action::StartRecipe(slot) => {
            if !recipes.get(slot).is_valid() {
                Err(ActionRejected::NoValidRecipe)
            } else if mains != MainsStatus::Active && !simulated {
                Err(ActionRejected::NoZeroCross)
            } else {
                Ok(())
            }
        }
        Action::StopRecipe(slot) if !recipes.is_active(slot) => {
            Err(ActionRejected::RecipeNotActive)
        }
        _ => Ok(()),
    }
}

/// Reply owed to the host once a pending action resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActionOutcome {
    pub action: Action,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Pending {
    action: Action,
    since_ms: u32,
    accepted_ms: Option<u32>,
}

/// The single pending-action slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PendingAction {
    pending: Option<Pending>,
}

impl PendingAction {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Park an admitted action, replacing whatever was pending
    pub fn set(&mut self, action: Action, now_ms: u32) {
        self.pending = Some(Pending {
            action,
            since_ms: now_ms,
            accepted_ms: None,
        });
    }

    /// Drop the pending action without replying
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Action waiting to be taken
    pub fn peek(&self) -> Option<Action> {
        self.pending
            .filter(|p| p.accepted_ms.is_none())
            .map(|p| p.action)
    }

    /// Take the pending action if it is `action`
    ///
    /// Returns true at most once per action. The reply is produced by the
    /// next [`PendingAction::poll`].
    pub fn take(&mut self, action: Action, now_ms: u32) -> bool {
        match self.pending.as_mut() {
            Some(p) if p.action == action && p.accepted_ms.is_none() => {
                p.accepted_ms = Some(now_ms);
                true
            }
            _ => false,
        }
    }

    /// Resolve the pending action
    ///
    /// An action taken within the timeout replies success. One taken later,
    /// or not taken at all once the timeout has passed, replies
    /// execute-timeout.
    pub fn poll(&mut self, now_ms: u32) -> Option<ActionOutcome> {
        let p = self.pending?;
        let status = match p.accepted_ms {
            Some(at) if at.wrapping_sub(p.since_ms) <= ACTION_TIMEOUT_MS => Status::Success,
            Some(_) => Status::ExecuteTimeout,
            None if now_ms.wrapping_sub(p.since_ms) > ACTION_TIMEOUT_MS => Status::ExecuteTimeout,
            None => return None,
        };
        self.pending = None;

        #[cfg(feature = "defmt")]
        if status != Status::Success {
            defmt::warn!("action {} timed out", p.action);
        }

        Some(ActionOutcome {
            action: p.action,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{BlockUpload, RecipeBlock};

    fn book_with_valid_recipe_1() -> RecipeBook {
        let mut book = RecipeBook::new();
        book.get_mut(RecipeSlot::One)
            .store(BlockUpload {
                block_count: 1,
                index: 0,
                block: RecipeBlock::default(),
            })
            .unwrap();
        book
    }

    #[test]
    fn test_start_needs_valid_recipe() {
        let book = RecipeBook::new();
        assert_eq!(
            admit(Action::StartRecipe(RecipeSlot::One), &book, MainsStatus::Active, false),
            Err(ActionRejected::NoValidRecipe)
        );
        assert_eq!(
            Status::from(ActionRejected::NoValidRecipe).code(),
            0x16
        );
    }

    #[test]
    fn test_start_needs_zero_cross_unless_simulated() {
        let book = book_with_valid_recipe_1();
        let start = Action::StartRecipe(RecipeSlot::One);
        assert_eq!(
            admit(start, &book, MainsStatus::Fault, false),
            Err(ActionRejected::NoZeroCross)
        );
        assert_eq!(
            admit(start, &book, MainsStatus::Inactive, false),
            Err(ActionRejected::NoZeroCross)
        );
        assert_eq!(admit(start, &book, MainsStatus::Inactive, true), Ok(()));
        assert_eq!(admit(start, &book, MainsStatus::Active, false), Ok(()));
    }

    #[test]
    fn test_stop_needs_active_recipe() {
        let mut book = book_with_valid_recipe_1();
        let stop = Action::StopRecipe(RecipeSlot::One);
        assert_eq!(
            admit(stop, &book, MainsStatus::Active, false),
            Err(ActionRejected::RecipeNotActive)
        );
        book.set_active(RecipeSlot::One, true);
        assert_eq!(admit(stop, &book, MainsStatus::Active, false), Ok(()));
    }

    #[test]
    fn test_machine_actions_always_admitted() {
        let book = RecipeBook::new();
        for action in [Action::SwitchOn, Action::Standby, Action::StartEmbedded] {
            assert_eq!(admit(action, &book, MainsStatus::Inactive, false), Ok(()));
        }
    }

    #[test]
    fn test_take_once() {
        let mut slot = PendingAction::new();
        slot.set(Action::SwitchOn, 0);
        assert!(!slot.take(Action::Standby, 10));
        assert!(slot.take(Action::SwitchOn, 10));
        assert!(!slot.take(Action::SwitchOn, 20));
        assert_eq!(slot.peek(), None);
    }

    #[test]
    fn test_accepted_in_time_replies_success() {
        let mut slot = PendingAction::new();
        slot.set(Action::SwitchOn, 1000);
        assert_eq!(slot.poll(1100), None);
        assert!(slot.take(Action::SwitchOn, 1500));
        let outcome = slot.poll(1600).unwrap();
        assert_eq!(outcome.status, Status::Success);
        assert_eq!(slot.poll(1700), None);
    }

    #[test]
    fn test_late_acceptance_is_timeout() {
        let mut slot = PendingAction::new();
        slot.set(Action::StartRecipe(RecipeSlot::One), 0);
        assert_eq!(slot.poll(500), None);
        assert!(slot.take(Action::StartRecipe(RecipeSlot::One), 501));
        assert_eq!(slot.poll(600).unwrap().status, Status::ExecuteTimeout);
    }

    #[test]
    fn test_untaken_action_times_out() {
        let mut slot = PendingAction::new();
        slot.set(Action::StartEmbedded, 0);
        assert_eq!(slot.poll(500), None);
        let outcome = slot.poll(600).unwrap();
        assert_eq!(outcome.action, Action::StartEmbedded);
        assert_eq!(outcome.status, Status::ExecuteTimeout);
        assert!(!slot.take(Action::StartEmbedded, 650));
    }

    #[test]
    fn test_cancel_drops_silently() {
        let mut slot = PendingAction::new();
        slot.set(Action::Standby, 0);
        slot.cancel();
        assert_eq!(slot.poll(1000), None);
    }
}
