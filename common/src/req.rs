// keep in sync with measurement.rs of backend

/// Sensor reading as submitted to `POST /api/data`.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EnvironmentalReading {
    pub temperature: f64, // °C
    pub humidity: f64,    // percent
    pub pressure: f64,    // hPa
    pub co2: f64,         // ppm
    pub created: String,  // ISO-8601, time of measurement
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SaveDataResponse {
    pub message: String,
}

impl SaveDataResponse {
    pub fn saved() -> Self {
        Self {
            message: "Data saved successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
