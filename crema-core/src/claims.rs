//! Ownership of the shared physical resources
//!
//! Two brewing recipes may run at once. Each circuit, the shared S3 water
//! valve and the air pump belong to at most one of them at any time. A
//! recipe that cannot get everything its block needs waits and asks again
//! on the next tick; nothing here blocks.

use crate::recipe::{Circuit, RecipeSlot};

/// A resource that only one recipe may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resource {
    Circuit1,
    Circuit2,
    /// Shared hot-water valve
    S3,
    /// Air pump (P3)
    AirPump,
}

impl Resource {
    pub const ALL: [Resource; 4] = [
        Resource::Circuit1,
        Resource::Circuit2,
        Resource::S3,
        Resource::AirPump,
    ];

    pub const fn circuit(circuit: Circuit) -> Self {
        match circuit {
            Circuit::One => Resource::Circuit1,
            Circuit::Two => Resource::Circuit2,
        }
    }

    /// Circuit behind a circuit resource
    pub const fn as_circuit(self) -> Option<Circuit> {
        match self {
            Resource::Circuit1 => Some(Circuit::One),
            Resource::Circuit2 => Some(Circuit::Two),
            Resource::S3 | Resource::AirPump => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Claim refused because another recipe holds the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClaimError {
    WouldBlock {
        resource: Resource,
        owner: RecipeSlot,
    },
}

/// Resource to owner map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClaimTable {
    owners: [Option<RecipeSlot>; 4],
}

impl ClaimTable {
    pub const fn new() -> Self {
        Self { owners: [None; 4] }
    }

    pub fn owner(&self, resource: Resource) -> Option<RecipeSlot> {
        self.owners[resource.index()]
    }

    pub fn is_held_by(&self, resource: Resource, slot: RecipeSlot) -> bool {
        self.owner(resource) == Some(slot)
    }

    /// Claim one resource; claiming what `slot` already holds succeeds
    pub fn try_claim(&mut self, resource: Resource, slot: RecipeSlot) -> Result<(), ClaimError> {
        match self.owner(resource) {
            Some(owner) if owner != slot => Err(ClaimError::WouldBlock { resource, owner }),
            _ => {
                self.owners[resource.index()] = Some(slot);
                Ok(())
            }
        }
    }

    /// Claim every resource in `wanted`, or none of them
    pub fn try_claim_all(&mut self, wanted: &[Resource], slot: RecipeSlot) -> Result<(), ClaimError> {
        for &resource in wanted {
            if let Some(owner) = self.owner(resource).filter(|&o| o != slot) {
                return Err(ClaimError::WouldBlock { resource, owner });
            }
        }
        for &resource in wanted {
            self.owners[resource.index()] = Some(slot);
        }
        Ok(())
    }

    /// Release a resource if `slot` holds it; returns whether it did
    pub fn release(&mut self, resource: Resource, slot: RecipeSlot) -> bool {
        let held = self.is_held_by(resource, slot);
        if held {
            self.owners[resource.index()] = None;
        }
        held
    }

    /// Resources held by `slot`
    pub fn held_by(&self, slot: RecipeSlot) -> impl Iterator<Item = Resource> + '_ {
        Resource::ALL
            .into_iter()
            .filter(move |&r| self.is_held_by(r, slot))
    }

    /// Release everything `slot` holds
    pub fn release_all(&mut self, slot: RecipeSlot) {
        for owner in self.owners.iter_mut() {
            if *owner == Some(slot) {
                *owner = None;
            }
        }
    }
}
