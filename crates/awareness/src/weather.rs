use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Cloudy,
    Foggy,
    Hazy,
    Icy,
    Rainy,
    Snowy,
    Stormy,
    Windy,
    Unknown,
}

/// Weather at the device location. Temperatures are in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub conditions: Vec<WeatherCondition>,
    pub temperature_c: f32,
    #[serde(default)]
    pub feels_like_c: Option<f32>,
    #[serde(default)]
    pub dew_point_c: Option<f32>,
    /// Relative humidity in percent.
    #[serde(default)]
    pub humidity: Option<u8>,
}

impl Weather {
    pub fn new(conditions: Vec<WeatherCondition>, temperature_c: f32) -> Self {
        Self {
            conditions,
            temperature_c,
            feels_like_c: None,
            dew_point_c: None,
            humidity: None,
        }
    }

    pub fn has_condition(&self, condition: WeatherCondition) -> bool {
        self.conditions.contains(&condition)
    }
}
