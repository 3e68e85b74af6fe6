use anyhow::Result;
use std::env;
use crate::constants::{
    DEFAULT_ENCOUNTER_WINDOW_DAYS, DEFAULT_MIN_ENCOUNTER_COUNT, DEFAULT_SERVER_PORT,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub encounter_window_days: i64,
    pub min_encounter_count: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_SERVER_PORT.to_string())
                .parse()
                .unwrap_or(DEFAULT_SERVER_PORT),
            encounter_window_days: env::var("ENCOUNTER_WINDOW_DAYS")
                .unwrap_or_else(|_| DEFAULT_ENCOUNTER_WINDOW_DAYS.to_string())
                .parse()
                .unwrap_or(DEFAULT_ENCOUNTER_WINDOW_DAYS),
            min_encounter_count: env::var("MIN_ENCOUNTER_COUNT")
                .unwrap_or_else(|_| DEFAULT_MIN_ENCOUNTER_COUNT.to_string())
                .parse()
                .unwrap_or(DEFAULT_MIN_ENCOUNTER_COUNT),
        })
    }
}
