//! Current weather lookups against the OpenWeather API.
//!
//! The service issues a single GET per city, checks for `200 OK` and maps the
//! nested response into a flat [`OpenWeatherData`] record. Every lookup in the
//! mapping falls back to `None`, so a short payload yields a sparse record
//! rather than an error. Persisting a record is a separate, explicit call.

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::db::Storage;

pub const OPEN_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("failed to fetch weather data from OpenWeather API: HTTP {0}")]
    UpstreamStatus(u16),
    #[error("request to OpenWeather API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("cannot decode OpenWeather API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("cannot save weather data: {0}")]
    Storage(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OpenWeatherData {
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub temperature: Option<f64>,      // °C
    pub feels_like: Option<f64>,       // °C
    pub temp_min: Option<f64>,         // °C
    pub temp_max: Option<f64>,         // °C
    pub pressure: Option<i32>,         // hPa
    pub humidity: Option<i32>,         // percent
    pub wind_speed: Option<f64>,       // m/s
    pub wind_direction: Option<i32>,   // deg
    pub visibility: Option<i32>,       // m
    pub cloudiness: Option<i32>,       // percent
    pub weather_description: Option<String>,
    pub weather_main: Option<String>,
    pub weather_icon: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<i32>,         // s, shift from UTC
    pub timestamp: Option<DateTime<Utc>>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OpenWeatherData {
    /// A record with nothing but its creation time.
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self {
            city_name: None,
            country: None,
            temperature: None,
            feels_like: None,
            temp_min: None,
            temp_max: None,
            pressure: None,
            humidity: None,
            wind_speed: None,
            wind_direction: None,
            visibility: None,
            cloudiness: None,
            weather_description: None,
            weather_main: None,
            weather_icon: None,
            latitude: None,
            longitude: None,
            timezone: None,
            timestamp: None,
            sunrise: None,
            sunset: None,
            created_at,
        }
    }

    /// Maps a decoded OpenWeather response. Never fails: anything missing or
    /// of an unexpected type ends up as `None`.
    pub fn from_json(data: &Value) -> Self {
        Self {
            city_name: text(data, "/name"),
            country: text(data, "/sys/country"),

            temperature: float(data, "/main/temp"),
            feels_like: float(data, "/main/feels_like"),
            temp_min: float(data, "/main/temp_min"),
            temp_max: float(data, "/main/temp_max"),
            pressure: int(data, "/main/pressure"),
            humidity: int(data, "/main/humidity"),

            wind_speed: float(data, "/wind/speed"),
            wind_direction: int(data, "/wind/deg"),
            visibility: int(data, "/visibility"),
            cloudiness: int(data, "/clouds/all"),

            weather_description: text(data, "/weather/0/description"),
            weather_main: text(data, "/weather/0/main"),
            weather_icon: text(data, "/weather/0/icon"),

            latitude: float(data, "/coord/lat"),
            longitude: float(data, "/coord/lon"),

            timezone: int(data, "/timezone"),
            timestamp: epoch(data, "/dt"),
            sunrise: epoch(data, "/sys/sunrise"),
            sunset: epoch(data, "/sys/sunset"),
            created_at: Utc::now(),
        }
    }
}

fn text(data: &Value, path: &str) -> Option<String> {
    data.pointer(path)?.as_str().map(str::to_owned)
}

fn float(data: &Value, path: &str) -> Option<f64> {
    data.pointer(path)?.as_f64()
}

fn int(data: &Value, path: &str) -> Option<i32> {
    let value = data.pointer(path)?;
    let n = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    i32::try_from(n).ok()
}

fn epoch(data: &Value, path: &str) -> Option<DateTime<Utc>> {
    let value = data.pointer(path)?;
    let secs = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(secs, 0)
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Outbound HTTP used by [`WeatherService`].
pub trait HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<TransportResponse, WeatherError>;
}

/// Blocking reqwest client with its default settings.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, WeatherError> {
        Ok(Self {
            client: reqwest::blocking::Client::builder().build()?,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<TransportResponse, WeatherError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()?;

        Ok(TransportResponse {
            status: resp.status().as_u16(),
            body: resp.bytes()?.to_vec(),
        })
    }
}

pub struct WeatherService<T, S> {
    transport: T,
    storage: S,
    api_url: String,
    api_key: String,
}

impl<T, S> WeatherService<T, S>
where
    T: HttpTransport,
    S: Storage,
{
    pub fn new(
        transport: T,
        storage: S,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            storage,
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn storage(&self) -> &S {
        &self.storage
    }

    /// Fetches and maps the current weather for `city_name`.
    ///
    /// Anything but `200 OK` is an [`WeatherError::UpstreamStatus`]; there is
    /// no retry.
    pub fn fetch_weather_data(&self, city_name: &str) -> Result<OpenWeatherData, WeatherError> {
        log::debug!("Fetching weather for {city_name}");

        let resp = self.transport.get(
            &self.api_url,
            &[("q", city_name), ("appid", self.api_key.as_str()), ("units", "metric")],
        )?;

        if resp.status != 200 {
            log::warn!("OpenWeather API answered {} for {city_name}", resp.status);
            return Err(WeatherError::UpstreamStatus(resp.status));
        }

        let data: Value = serde_json::from_slice(&resp.body)?;
        Ok(OpenWeatherData::from_json(&data))
    }

    pub fn save_weather_data(&mut self, data: &OpenWeatherData) -> Result<(), WeatherError> {
        self.storage
            .save_weather_data(data)
            .map_err(WeatherError::Storage)
    }
}
