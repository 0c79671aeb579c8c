//! Simulated machine state.

use serde_json::{Map, Value, json};

/// A toy three-axis machine tracing a slow circle.
pub struct Machine {
    tick: u64,
    x: f64,
    y: f64,
    z: f64,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            tick: 0,
            x: 0.0,
            y: 0.0,
            z: 5.0,
        }
    }

    /// Full state for a freshly connected panel.
    pub fn snapshot(&self) -> Map<String, Value> {
        let mut state = self.delta();
        state.insert("xx".into(), json!("READY"));
        state.insert("rpi_model".into(), json!("Raspberry Pi 4 Model B"));
        state.insert("units".into(), json!("METRIC"));
        state
    }

    /// Advance the simulation and return the keys that changed.
    pub fn advance(&mut self) -> Map<String, Value> {
        self.tick += 1;
        let angle = self.tick as f64 / 20.0;
        self.x = 40.0 * angle.cos();
        self.y = 40.0 * angle.sin();
        self.z = 5.0 - (self.tick % 10) as f64 / 10.0;
        self.delta()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn delta(&self) -> Map<String, Value> {
        let Value::Object(delta) = json!({
            "tick": self.tick,
            "position": {
                "x": (self.x * 1000.0).round() / 1000.0,
                "y": (self.y * 1000.0).round() / 1000.0,
                "z": (self.z * 1000.0).round() / 1000.0,
            },
            "velocity": 1200.0,
        }) else {
            unreachable!("delta literal is an object");
        };
        delta
    }
}
