use crate::measurement::EnvironmentalData;
use crate::schema::*;
use crate::weather::OpenWeatherData;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::backend::Backend;
use diesel::connection::SimpleConnection;
use diesel::deserialize::{self, FromSql};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::BigInt;
use diesel::sqlite::{Sqlite, SqliteConnection};
use diesel::{AsExpression, FromSqlRow};

use std::ops::Deref;

static SQL_CREATE_TABLES: &str = include_str!("sql/create_tables.sql");

/// Persistence seam shared by the ingestion handler and the weather service.
pub trait Storage {
    fn persist_environmental_data(&mut self, data: &EnvironmentalData) -> Result<()>;
    fn save_weather_data(&mut self, data: &OpenWeatherData) -> Result<()>;
}

/// UTC timestamp stored as microseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, AsExpression, FromSqlRow)]
#[diesel(sql_type = BigInt)]
pub struct DateTimeUtc(DateTime<Utc>);

impl From<DateTime<Utc>> for DateTimeUtc {
    fn from(ts: DateTime<Utc>) -> Self {
        DateTimeUtc(ts)
    }
}

impl Deref for DateTimeUtc {
    type Target = DateTime<Utc>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromSql<BigInt, Sqlite> for DateTimeUtc
where
    i64: FromSql<BigInt, Sqlite>,
{
    fn from_sql(value: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        let timestamp_us = i64::from_sql(value)?;

        DateTime::from_timestamp_micros(timestamp_us)
            .map(DateTimeUtc)
            .ok_or_else(|| format!("timestamp {timestamp_us}us out of range").into())
    }
}

impl ToSql<BigInt, Sqlite> for DateTimeUtc
where
    i64: ToSql<BigInt, Sqlite>,
{
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.0.timestamp_micros());

        Ok(IsNull::No)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = environmental_data)]
pub struct NewEnvironmentalData {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub co2: f64,
    pub measured_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

impl From<&EnvironmentalData> for NewEnvironmentalData {
    fn from(data: &EnvironmentalData) -> Self {
        Self {
            temperature: data.temperature,
            humidity: data.humidity,
            pressure: data.pressure,
            co2: data.co2,
            measured_at: data.measured_at.into(),
            created_at: data.created_at.into(),
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = open_weather_data)]
pub struct NewOpenWeatherData {
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub temperature: Option<f64>,
    pub feels_like: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub pressure: Option<i32>,
    pub humidity: Option<i32>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<i32>,
    pub visibility: Option<i32>,
    pub cloudiness: Option<i32>,
    pub weather_description: Option<String>,
    pub weather_main: Option<String>,
    pub weather_icon: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<i32>,
    pub timestamp: Option<DateTimeUtc>,
    pub sunrise: Option<DateTimeUtc>,
    pub sunset: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

impl From<&OpenWeatherData> for NewOpenWeatherData {
    fn from(data: &OpenWeatherData) -> Self {
        Self {
            city_name: data.city_name.clone(),
            country: data.country.clone(),
            temperature: data.temperature,
            feels_like: data.feels_like,
            temp_min: data.temp_min,
            temp_max: data.temp_max,
            pressure: data.pressure,
            humidity: data.humidity,
            wind_speed: data.wind_speed,
            wind_direction: data.wind_direction,
            visibility: data.visibility,
            cloudiness: data.cloudiness,
            weather_description: data.weather_description.clone(),
            weather_main: data.weather_main.clone(),
            weather_icon: data.weather_icon.clone(),
            latitude: data.latitude,
            longitude: data.longitude,
            timezone: data.timezone,
            timestamp: data.timestamp.map(DateTimeUtc::from),
            sunrise: data.sunrise.map(DateTimeUtc::from),
            sunset: data.sunset.map(DateTimeUtc::from),
            created_at: data.created_at.into(),
        }
    }
}

pub struct Db {
    conn: SqliteConnection,
}

impl Db {
    pub fn connect(database_url: &str) -> Result<Self> {
        let mut conn = SqliteConnection::establish(database_url)
            .with_context(|| format!("cannot open database `{database_url}`"))?;
        conn.batch_execute(SQL_CREATE_TABLES)
            .context("cannot create tables")?;

        log::info!("Connected to database {database_url}");
        Ok(Self { conn })
    }
}

impl Storage for Db {
    fn persist_environmental_data(&mut self, data: &EnvironmentalData) -> Result<()> {
        log::debug!("Insert environmental data into db: {data:?}");

        diesel::insert_into(environmental_data::table)
            .values(NewEnvironmentalData::from(data))
            .execute(&mut self.conn)?;

        Ok(())
    }

    fn save_weather_data(&mut self, data: &OpenWeatherData) -> Result<()> {
        log::debug!("Insert weather data into db: {data:?}");

        diesel::insert_into(open_weather_data::table)
            .values(NewOpenWeatherData::from(data))
            .execute(&mut self.conn)?;

        Ok(())
    }
}
