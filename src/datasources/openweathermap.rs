use crate::config::{ForecastConfig, OpenWeatherMapConfig};
use crate::error::{PlannerError, Result};
use crate::logic::ForecastProvider;
use crate::models::forecast::{
    DailyForecast, ForecastLocation, ForecastPoint, RainThresholds, RainVerdict, WeatherCondition,
    WeatherForecast,
};
use crate::models::LatLng;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;

const API_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    config: OpenWeatherMapConfig,
    thresholds: RainThresholds,
    base_url: String,
}

// OpenWeatherMap API response structures
#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastItem>,
    city: OwmCity,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    weather: Vec<OwmWeather>,
    #[serde(default)]
    pop: f64, // probability of precipitation
    #[serde(default)]
    rain: Option<OwmPrecipitation>,
    #[serde(default)]
    snow: Option<OwmPrecipitation>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmWeather {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct OwmPrecipitation {
    #[serde(rename = "3h", default)]
    three_hour: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    country: String,
    /// Shift from UTC in seconds
    #[serde(default)]
    timezone: i32,
}

impl OpenWeatherMapClient {
    pub fn new(config: OpenWeatherMapConfig, forecast: &ForecastConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(forecast.timeout())
            .build()?;

        Ok(Self {
            client,
            config,
            thresholds: forecast.rain_thresholds(),
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Fetch the 5-day/3-hour forecast at `at`
    pub async fn fetch_forecast(&self, at: LatLng) -> Result<WeatherForecast> {
        let response = self
            .client
            .get(self.endpoint("forecast", at)?)
            .send()
            .await
            .map_err(|e| {
                PlannerError::ForecastUnavailable(format!("OpenWeatherMap: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let owm_response: OwmForecastResponse = response.json().await.map_err(|e| {
            PlannerError::ForecastUnavailable(format!(
                "Failed to parse OpenWeatherMap response: {}",
                e.without_url()
            ))
        })?;

        let forecast = convert_response(owm_response);
        tracing::debug!(
            %at,
            city = %forecast.location.city,
            country = %forecast.location.country,
            points = forecast.hourly.len(),
            days = forecast.daily_summary.len(),
            "Forecast fetched"
        );
        Ok(forecast)
    }

    /// Daily summaries at `at` starting from `from`
    pub async fn daily_outlook(
        &self,
        at: LatLng,
        from: NaiveDate,
        days: usize,
    ) -> Result<Vec<DailyForecast>> {
        let forecast = self.fetch_forecast(at).await?;
        Ok(forecast.next_days(from, days).into_iter().cloned().collect())
    }

    /// Test connection to OpenWeatherMap API
    pub async fn test_connection(&self, at: LatLng) -> Result<bool> {
        let response = self
            .client
            .get(self.endpoint("weather", at)?)
            .send()
            .await
            .map_err(|e| {
                PlannerError::ForecastUnavailable(format!("OpenWeatherMap: {}", e.without_url()))
            })?;

        Ok(response.status().is_success())
    }

    fn endpoint(&self, path: &str, at: LatLng) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, path),
            &[
                ("lat", at.lat.to_string()),
                ("lon", at.lng.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.config.api_key.clone()),
            ],
        )
        .map_err(|e| PlannerError::Config(format!("Invalid OpenWeatherMap URL: {}", e)))
    }

    fn verdict_for(&self, forecast: &WeatherForecast, date: NaiveDate) -> Result<RainVerdict> {
        match forecast.for_date(date) {
            Some(day) => Ok(day.rain_verdict(&self.thresholds)),
            None => Err(PlannerError::ForecastUnavailable(match forecast.horizon() {
                Some((first, last)) => {
                    format!("{} is outside the forecast range {} to {}", date, first, last)
                }
                None => format!("no forecast data for {}", date),
            })),
        }
    }
}

impl ForecastProvider for OpenWeatherMapClient {
    fn rain_verdict(
        &self,
        at: LatLng,
        date: NaiveDate,
    ) -> impl Future<Output = Result<RainVerdict>> + Send {
        async move {
            let forecast = self.fetch_forecast(at).await?;
            self.verdict_for(&forecast, date)
        }
    }
}

/// Bad keys are a configuration problem; everything else may pass on retry.
fn status_error(status: StatusCode, body: &str) -> PlannerError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlannerError::Config(format!(
            "OpenWeatherMap rejected the API key ({})",
            status
        )),
        StatusCode::BAD_REQUEST => {
            PlannerError::InvalidData(format!("OpenWeatherMap returned {}: {}", status, body))
        }
        _ => PlannerError::ForecastUnavailable(format!(
            "OpenWeatherMap returned {}: {}",
            status, body
        )),
    }
}

fn convert_response(response: OwmForecastResponse) -> WeatherForecast {
    let location = ForecastLocation {
        city: response.city.name,
        country: response.city.country,
    };

    let offset = FixedOffset::east_opt(response.city.timezone).unwrap_or(Utc.fix());

    let hourly: Vec<ForecastPoint> = response.list.iter().map(convert_forecast_item).collect();
    let daily_summary = aggregate_daily(&hourly, offset);

    WeatherForecast {
        location,
        hourly,
        daily_summary,
    }
}

fn convert_forecast_item(item: &OwmForecastItem) -> ForecastPoint {
    let timestamp = DateTime::from_timestamp(item.dt, 0).unwrap_or_else(Utc::now);

    let weather_condition = item
        .weather
        .first()
        .map(|w| WeatherCondition::from_owm_id(w.id))
        .unwrap_or_default();

    // Combine rain and snow precipitation
    let rain_mm = item.rain.as_ref().map(|r| r.three_hour).unwrap_or(0.0);
    let snow_mm = item.snow.as_ref().map(|s| s.three_hour).unwrap_or(0.0);

    ForecastPoint {
        timestamp,
        temp_c: item.main.temp,
        humidity_percent: item.main.humidity,
        precipitation_mm: rain_mm + snow_mm,
        precipitation_prob: item.pop,
        weather_condition,
    }
}

/// Group 3-hour points by local calendar day at the forecast location
fn aggregate_daily(hourly: &[ForecastPoint], offset: FixedOffset) -> Vec<DailyForecast> {
    let mut by_date: HashMap<NaiveDate, Vec<&ForecastPoint>> = HashMap::new();
    for point in hourly {
        let date = point.timestamp.with_timezone(&offset).date_naive();
        by_date.entry(date).or_default().push(point);
    }

    let mut days: Vec<DailyForecast> = by_date
        .into_iter()
        .map(|(date, points)| aggregate_day(date, &points))
        .collect();

    days.sort_by_key(|d| d.date);
    days
}

fn aggregate_day(date: NaiveDate, points: &[&ForecastPoint]) -> DailyForecast {
    let high_temp_c = points
        .iter()
        .map(|p| p.temp_c)
        .fold(f64::NEG_INFINITY, f64::max);

    let low_temp_c = points.iter().map(|p| p.temp_c).fold(f64::INFINITY, f64::min);

    let avg_humidity: f64 =
        points.iter().map(|p| p.humidity_percent).sum::<f64>() / points.len().max(1) as f64;

    let total_precipitation_mm: f64 = points.iter().map(|p| p.precipitation_mm).sum();

    let max_precipitation_prob = points
        .iter()
        .map(|p| p.precipitation_prob)
        .fold(0.0, f64::max);

    // Most frequent condition; ties go to the wetter one
    let mut condition_counts: BTreeMap<WeatherCondition, usize> = BTreeMap::new();
    for point in points {
        *condition_counts.entry(point.weather_condition).or_insert(0) += 1;
    }
    let dominant_condition = condition_counts
        .into_iter()
        .max_by_key(|&(condition, count)| (count, condition))
        .map(|(condition, _)| condition)
        .unwrap_or_default();

    DailyForecast {
        date,
        high_temp_c: if points.is_empty() { 0.0 } else { high_temp_c },
        low_temp_c: if points.is_empty() { 0.0 } else { low_temp_c },
        avg_humidity,
        total_precipitation_mm,
        max_precipitation_prob,
        dominant_condition,
    }
}
