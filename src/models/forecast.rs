use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Weather forecast data from OpenWeatherMap 5-day/3-hour API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub location: ForecastLocation,
    pub hourly: Vec<ForecastPoint>,        // 3-hour intervals
    pub daily_summary: Vec<DailyForecast>, // Aggregated by day
}

impl WeatherForecast {
    pub fn for_date(&self, date: NaiveDate) -> Option<&DailyForecast> {
        self.daily_summary.iter().find(|d| d.date == date)
    }

    /// Daily summaries from `from` onward, at most `days` of them
    pub fn next_days(&self, from: NaiveDate, days: usize) -> Vec<&DailyForecast> {
        self.daily_summary
            .iter()
            .filter(|d| d.date >= from)
            .take(days)
            .collect()
    }

    pub fn horizon(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.daily_summary.first()?.date;
        let last = self.daily_summary.last()?.date;
        Some((first, last))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastLocation {
    pub city: String,
    pub country: String,
}

/// A single 3-hour forecast point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub temp_c: f64,
    pub humidity_percent: f64,
    pub precipitation_mm: f64,   // rain + snow
    pub precipitation_prob: f64, // 0.0-1.0
    pub weather_condition: WeatherCondition,
}

/// Aggregated daily forecast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high_temp_c: f64,
    pub low_temp_c: f64,
    pub avg_humidity: f64,
    pub total_precipitation_mm: f64,
    pub max_precipitation_prob: f64,
    pub dominant_condition: WeatherCondition,
}

impl DailyForecast {
    pub fn rain_verdict(&self, thresholds: &RainThresholds) -> RainVerdict {
        let rain_expected = self.dominant_condition.has_precipitation()
            || self.max_precipitation_prob >= thresholds.probability
            || self.total_precipitation_mm >= thresholds.precipitation_mm;

        RainVerdict {
            rain_expected,
            probability: self.max_precipitation_prob,
            precipitation_mm: self.total_precipitation_mm,
        }
    }
}

/// When a day counts as rainy for watering purposes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainThresholds {
    pub probability: f64,
    pub precipitation_mm: f64,
}

impl Default for RainThresholds {
    fn default() -> Self {
        Self {
            probability: 0.5,
            precipitation_mm: 1.0,
        }
    }
}

/// Rain answer for one coordinate on one date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RainVerdict {
    pub rain_expected: bool,
    pub probability: f64,
    pub precipitation_mm: f64,
}

impl RainVerdict {
    pub fn dry() -> Self {
        Self {
            rain_expected: false,
            probability: 0.0,
            precipitation_mm: 0.0,
        }
    }

    pub fn rain(probability: f64, precipitation_mm: f64) -> Self {
        Self {
            rain_expected: true,
            probability,
            precipitation_mm,
        }
    }
}

/// OpenWeatherMap condition groups as they matter on a tropical estate.
/// Fog and mist share one bucket; haze and squalls get their own.
/// Declared from driest to wettest; the order ranks ties between conditions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum WeatherCondition {
    #[default]
    Clear,
    Haze,
    Mist,
    Clouds,
    Other,
    Drizzle,
    Snow,
    Rain,
    Squall,
    Thunderstorm,
}

impl WeatherCondition {
    /// Map an OWM condition code (https://openweathermap.org/weather-conditions).
    pub fn from_owm_id(id: u32) -> Self {
        use WeatherCondition::*;
        match id / 100 {
            2 => Thunderstorm,
            3 => Drizzle,
            5 => Rain,
            6 => Snow,
            7 => match id {
                701 | 741 => Mist,
                711 | 721 | 731 | 751 | 761 => Haze,
                771 | 781 => Squall,
                _ => Other,
            },
            8 if id == 800 => Clear,
            8 => Clouds,
            _ => Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use WeatherCondition::*;
        match self {
            Clear => "Clear",
            Clouds => "Cloudy",
            Drizzle => "Drizzle",
            Rain => "Rain",
            Thunderstorm => "Thunderstorm",
            Squall => "Squall",
            Snow => "Snow",
            Haze => "Haze",
            Mist => "Mist",
            Other => "Other",
        }
    }

    pub fn symbol(&self) -> &'static str {
        use WeatherCondition::*;
        match self {
            Clear => "☀",
            Clouds => "☁",
            Drizzle => "🌦",
            Rain => "🌧",
            Thunderstorm | Squall => "⛈",
            Snow => "❄",
            Haze | Mist => "🌫",
            Other => "?",
        }
    }

    /// Conditions that put water on the ground
    pub fn has_precipitation(&self) -> bool {
        use WeatherCondition::*;
        matches!(self, Drizzle | Rain | Thunderstorm | Squall | Snow)
    }
}

impl std::fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
