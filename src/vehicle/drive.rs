// Differential-drive mapping for the four-wheel car
// Converts a driving action into left/right wheel angular velocities.

use crate::config::{
    BACKWARD_SPEED_KMH, FORWARD_SPEED_KMH, MAX_SPEED_KMH, MAX_STEERING_DEG, STEERING_GAIN,
    TURN_ANGLE_DEG, WHEEL_RADIUS,
};
use crate::messages::{Action, Gear};

/// Wheel angular velocity setpoints in rad/s (positive = forward)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSignals {
    pub left: f64,  // front-left and rear-left motors
    pub right: f64, // front-right and rear-right motors
}

impl WheelSignals {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Setpoints the controller is currently holding
#[derive(Debug, Clone, Copy)]
pub struct DriveState {
    speed_kmh: f64,
    steering_deg: f64, // positive = left
    gear: Gear,
}

impl Default for DriveState {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveState {
    pub fn new() -> Self {
        Self {
            speed_kmh: 0.0,
            steering_deg: 0.0,
            gear: Gear::Park,
        }
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_kmh
    }

    pub fn steering_deg(&self) -> f64 {
        self.steering_deg
    }

    pub fn gear(&self) -> Gear {
        self.gear
    }

    /// Apply an action and return the wheel signals it calls for.
    ///
    /// Turns change only the steering; speed and gear carry over so the car
    /// keeps moving through the turn (or pivots when stopped).
    pub fn command(&mut self, action: Action, magnitude: f64) -> WheelSignals {
        let magnitude = if magnitude.is_finite() { magnitude.abs() } else { 0.0 };

        match action {
            Action::Forward => {
                self.set_speed(FORWARD_SPEED_KMH * magnitude);
                self.steering_deg = 0.0;
            }
            Action::Backward => {
                self.set_speed(-BACKWARD_SPEED_KMH * magnitude);
                self.steering_deg = 0.0;
            }
            Action::TurnLeft => self.set_steering(TURN_ANGLE_DEG * magnitude),
            Action::TurnRight => self.set_steering(-TURN_ANGLE_DEG * magnitude),
            Action::Stop => {
                self.set_speed(0.0);
                self.steering_deg = 0.0;
            }
        }

        self.signals()
    }

    fn set_speed(&mut self, kmh: f64) {
        self.speed_kmh = kmh.clamp(-MAX_SPEED_KMH, MAX_SPEED_KMH);

        // Gear follows direction of travel
        self.gear = if self.speed_kmh > 0.1 {
            Gear::Drive
        } else if self.speed_kmh < -0.1 {
            Gear::Reverse
        } else {
            Gear::Park
        };
    }

    fn set_steering(&mut self, degrees: f64) {
        self.steering_deg = degrees.clamp(-MAX_STEERING_DEG, MAX_STEERING_DEG);
    }

    /// Wheel signals for the current setpoints
    pub fn signals(&self) -> WheelSignals {
        let base = (self.speed_kmh / 3.6) / WHEEL_RADIUS;
        let differential = self.steering_deg.to_radians() * STEERING_GAIN;

        // Turning left means the right side runs faster
        WheelSignals {
            left: base - differential,
            right: base + differential,
        }
    }
}
