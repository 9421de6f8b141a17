//! Outlet valves
//!
//! Each circuit has a coffee, a milk and a water valve; at most one of them
//! is open. The shared S3 valve joins the circuits for hot water.

use crema_core::recipe::{Circuit, Outlet};

use crate::io::PlantIo;

/// Outlets that have a valve, in bit order
const OUTLETS: [Outlet; 3] = [Outlet::Coffee, Outlet::Milk, Outlet::Water];

/// Telemetry bit of the shared valve
const SHARED_BIT: u16 = 1 << 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValveBank {
    outlets: [Outlet; 2],
    shared: bool,
}

impl ValveBank {
    pub const fn new() -> Self {
        Self {
            outlets: [Outlet::Off, Outlet::Off],
            shared: false,
        }
    }

    pub fn set_outlet(&mut self, circuit: Circuit, outlet: Outlet) {
        self.outlets[circuit.index()] = outlet;
    }

    pub fn set_shared(&mut self, open: bool) {
        self.shared = open;
    }

    /// Drive the three valves of a circuit
    ///
    /// Closing valves are released before the opening one is energised.
    pub fn drive<IO: PlantIo>(&self, io: &mut IO, circuit: Circuit) {
        let outlet = self.outlets[circuit.index()];
        for valve in OUTLETS.iter().filter(|&&v| v != outlet) {
            io.set_valve(circuit, *valve, false);
        }
        if outlet != Outlet::Off {
            io.set_valve(circuit, outlet, true);
        }
    }

    pub fn drive_shared<IO: PlantIo>(&self, io: &mut IO) {
        io.set_shared_valve(self.shared);
    }

    pub fn outlet(&self, circuit: Circuit) -> Outlet {
        self.outlets[circuit.index()]
    }

    pub fn shared(&self) -> bool {
        self.shared
    }

    /// Bits 0-2 circuit 1 coffee/milk/water, bits 3-5 circuit 2, bit 6 S3
    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        for circuit in Circuit::ALL {
            let outlet = self.outlets[circuit.index()];
            if let Some(pos) = OUTLETS.iter().position(|&v| v == outlet) {
                bits |= 1 << (circuit.index() * 3 + pos);
            }
        }
        if self.shared {
            bits |= SHARED_BIT;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockIo;

    #[test]
    fn test_only_selected_valve_opens() {
        let mut io = MockIo::default();
        let mut valves = ValveBank::new();
        valves.set_outlet(Circuit::Two, Outlet::Milk);
        valves.drive(&mut io, Circuit::Two);
        assert_eq!(io.valves[1], [false, true, false]);

        valves.set_outlet(Circuit::Two, Outlet::Water);
        valves.drive(&mut io, Circuit::Two);
        assert_eq!(io.valves[1], [false, false, true]);

        valves.set_outlet(Circuit::Two, Outlet::Off);
        valves.drive(&mut io, Circuit::Two);
        assert_eq!(io.valves[1], [false; 3]);
    }

    #[test]
    fn test_telemetry_bits() {
        let mut valves = ValveBank::new();
        assert_eq!(valves.bits(), 0);
        valves.set_outlet(Circuit::One, Outlet::Coffee);
        valves.set_outlet(Circuit::Two, Outlet::Water);
        valves.set_shared(true);
        assert_eq!(valves.bits(), 0b110_0001);
    }
}
