//! Document payload for the "create document" endpoint.
//!
//! Field names follow the remote API, which mixes `snake_case` fields with
//! a couple of `camelCase` ones (`importRequest`, `participantInn`).

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;

/// Document type for introducing goods into circulation.
pub const DOC_TYPE_INTRODUCE_GOODS: &str = "LP_INTRODUCE_GOODS";

mod date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

/// A single product line in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub certificate_document: String,
    #[serde(with = "date_format")]
    pub certificate_document_date: NaiveDate,
    pub certificate_document_number: String,
    pub owner_inn: String,
    pub producer_inn: String,
    #[serde(with = "date_format")]
    pub production_date: NaiveDate,
    pub tnved_code: String,
    pub uit_code: String,
    pub uitu_code: String,
}

/// A document submitted to the create endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    #[serde(rename = "importRequest")]
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    #[serde(with = "date_format")]
    pub production_date: NaiveDate,
    pub production_type: String,
    pub products: Vec<Product>,
    #[serde(with = "date_format")]
    pub reg_date: NaiveDate,
    pub reg_number: String,
}

impl Document {
    /// A document with placeholder values in every field, as used by the
    /// API's own examples. Handy for smoke-testing the endpoint.
    pub fn placeholder() -> Self {
        let date = NaiveDate::from_ymd_opt(2020, 1, 23).expect("2020-01-23 is a valid date");
        let text = || "string".to_string();

        Self {
            description: Description {
                participant_inn: text(),
            },
            doc_id: text(),
            doc_status: text(),
            doc_type: DOC_TYPE_INTRODUCE_GOODS.to_string(),
            import_request: true,
            owner_inn: text(),
            participant_inn: text(),
            producer_inn: text(),
            production_date: date,
            production_type: text(),
            products: vec![Product {
                certificate_document: text(),
                certificate_document_date: date,
                certificate_document_number: text(),
                owner_inn: text(),
                producer_inn: text(),
                production_date: date,
                tnved_code: text(),
                uit_code: text(),
                uitu_code: text(),
            }],
            reg_date: date,
            reg_number: text(),
        }
    }

    /// Reads a document from a JSON file.
    pub fn from_json_file(path: &Path) -> ClientResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
