//! Input records supplied by the caller for one batch
//!
//! Records are plain optional scalars. They are never persisted by this crate;
//! the pipeline keeps a JSON snapshot in the batch workspace so later stages can
//! replay without the caller supplying them again.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One client record as delivered by the upstream system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputRecord {
    #[serde(rename = "clientID")]
    pub client_id: Option<i64>,
    pub title_prefix: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub title_suffix: Option<String>,
    pub citizenship1: Option<String>,
    pub citizenship2: Option<String>,
    pub onboarding_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub name_at_birth: Option<String>,
    pub nick_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub language: Option<String>,
    pub occupation: Option<String>,
    pub country_of_tax: Option<String>,
    pub source_of_funds_country: Option<String>,
    pub fatca_status: Option<String>,
    pub crs_status: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub nationality: Option<String>,
    pub leg_doc_type: Option<String>,
    pub id_number: Option<String>,
    pub place_of_birth: Option<String>,
    pub city_of_birth: Option<String>,
    pub country_of_birth: Option<String>,
}

impl InputRecord {
    /// Full display name: first, middle and last name joined by spaces
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
