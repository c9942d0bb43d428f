//! Actuator outputs driven by the sequencer.

use std::fmt;

/// One of the five duty-cycle outputs on the sensor board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Starter,
    GlowPlug,
    FuelPump,
    FuelSolenoid,
    LubeSolenoid,
}

impl Actuator {
    pub const ALL: [Actuator; 5] = [
        Actuator::Starter,
        Actuator::GlowPlug,
        Actuator::FuelPump,
        Actuator::FuelSolenoid,
        Actuator::LubeSolenoid,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Actuator::Starter => "starter",
            Actuator::GlowPlug => "glow-plug",
            Actuator::FuelPump => "fuel-pump",
            Actuator::FuelSolenoid => "fuel-solenoid",
            Actuator::LubeSolenoid => "lube-solenoid",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output stage for actuator duty cycles.
///
/// `duty` is always within `0.0..=1.0`; the sequencer converts voltages
/// against the supply before calling.
pub trait Actuators {
    fn drive(&mut self, actuator: Actuator, duty: f32);
}

impl<A: Actuators + ?Sized> Actuators for &mut A {
    fn drive(&mut self, actuator: Actuator, duty: f32) {
        (**self).drive(actuator, duty);
    }
}

/// Drive every actuator to zero.
pub fn de_energize_all(actuators: &mut impl Actuators) {
    for actuator in Actuator::ALL {
        actuators.drive(actuator, 0.0);
    }
}

/// Keeps the current level of each actuator and every drive call made.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuators {
    levels: [f32; 5],
    history: Vec<(Actuator, f32)>,
}

impl RecordingActuators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, actuator: Actuator) -> f32 {
        self.levels[actuator.index()]
    }

    pub fn all_off(&self) -> bool {
        self.levels.iter().all(|level| *level == 0.0)
    }

    pub fn history(&self) -> &[(Actuator, f32)] {
        &self.history
    }

    /// Forget the recorded calls, keeping current levels.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

impl Actuators for RecordingActuators {
    fn drive(&mut self, actuator: Actuator, duty: f32) {
        self.levels[actuator.index()] = duty;
        self.history.push((actuator, duty));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn de_energize_zeroes_everything() {
        let mut outputs = RecordingActuators::new();
        outputs.drive(Actuator::Starter, 0.5);
        outputs.drive(Actuator::FuelPump, 0.2);
        assert!(!outputs.all_off());

        de_energize_all(&mut outputs);
        assert!(outputs.all_off());
        assert_eq!(outputs.history().len(), 7);
        assert_eq!(outputs.history()[2], (Actuator::Starter, 0.0));
    }

    #[test]
    fn names_are_stable() {
        let names: Vec<_> = Actuator::ALL.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            names,
            ["starter", "glow-plug", "fuel-pump", "fuel-solenoid", "lube-solenoid"]
        );
    }
}
