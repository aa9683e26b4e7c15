//! Simulated sensor reading sources
//!
//! Readings are value-bearing strings of the form `"<name> temp: <v>"`,
//! independently timestamped and order-independent. The temperature channel
//! is driven by the publish loop; humidity exists as an unused capability.

use chrono::Utc;
use rand::Rng;

/// How a sensor obtains its process identity.
///
/// Random identities follow the `Sensor<N>` convention with N in [0, 100).
/// They are NOT guaranteed unique across concurrently running instances;
/// deployments that need uniqueness should assign fixed names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorIdentity {
    /// Randomly generated `Sensor<N>` name
    Random,
    /// Externally assigned name
    Fixed(String),
}

impl SensorIdentity {
    /// Resolve the identity into a concrete sensor name.
    pub fn resolve(&self) -> String {
        match self {
            SensorIdentity::Random => format!("Sensor{}", rand::thread_rng().gen_range(0..100)),
            SensorIdentity::Fixed(name) => name.clone(),
        }
    }
}

/// A simulated environmental sensor producing random readings on demand.
/// No internal state beyond its identity.
#[derive(Debug, Clone)]
pub struct Sensor {
    name: String,
}

impl Sensor {
    pub fn new(identity: SensorIdentity) -> Self {
        Self {
            name: identity.resolve(),
        }
    }

    /// Sensor name, also used as the MQTT client identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current temperature reading, 0..50 degrees.
    pub fn temperature(&self) -> String {
        let t = rand::thread_rng().gen_range(0..50);
        format!("{} temp: {}", self.name, t)
    }

    /// Current relative humidity reading, 0..100 percent.
    pub fn humidity(&self) -> String {
        let h = rand::thread_rng().gen_range(0..100);
        format!("{} humidity: {}", self.name, h)
    }

    /// Wall-clock timestamp line for this sensor.
    pub fn timestamp(&self) -> String {
        format!("{} time: {}", self.name, Utc::now().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_identity_format() {
        for _ in 0..50 {
            let name = SensorIdentity::Random.resolve();
            let n: u32 = name
                .strip_prefix("Sensor")
                .expect("name should start with Sensor")
                .parse()
                .expect("suffix should be numeric");
            assert!(n < 100);
        }
    }

    #[test]
    fn test_fixed_identity_passes_through() {
        let identity = SensorIdentity::Fixed("bench-sensor".to_string());
        assert_eq!(identity.resolve(), "bench-sensor");
    }

    #[test]
    fn test_temperature_reading_shape_and_range() {
        let sensor = Sensor::new(SensorIdentity::Fixed("Sensor1".to_string()));
        for _ in 0..100 {
            let reading = sensor.temperature();
            let value: i32 = reading
                .strip_prefix("Sensor1 temp: ")
                .expect("reading should carry the sensor prefix")
                .parse()
                .unwrap();
            assert!((0..50).contains(&value));
        }
    }

    #[test]
    fn test_humidity_reading_shape_and_range() {
        let sensor = Sensor::new(SensorIdentity::Fixed("Sensor1".to_string()));
        for _ in 0..100 {
            let reading = sensor.humidity();
            let value: i32 = reading
                .strip_prefix("Sensor1 humidity: ")
                .expect("reading should carry the sensor prefix")
                .parse()
                .unwrap();
            assert!((0..100).contains(&value));
        }
    }

    #[test]
    fn test_timestamp_carries_identity() {
        let sensor = Sensor::new(SensorIdentity::Fixed("Sensor9".to_string()));
        assert!(sensor.timestamp().starts_with("Sensor9 time: "));
    }
}
