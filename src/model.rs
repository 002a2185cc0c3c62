//! Records written to disk, one JSON array per collection.
//!
//! Field names follow the upstream API so the output stays recognizable next to
//! the raw responses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub state_cd: String,
    pub state_name: String,
    pub state_name_hindi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct District {
    pub district_cd: String,
    pub district_value: String,
    pub district_value_hindi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    #[serde(rename = "acNumber")]
    pub ac_number: u32,
    #[serde(rename = "asmblyName")]
    pub name: String,
    #[serde(rename = "asmblyNameL1")]
    pub name_l1: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub part_number: u32,
    pub part_name: String,
}

/// POST body of the parts endpoint. The upstream rejects any other shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsQuery {
    pub state_cd: String,
    pub district_cd: String,
    pub ac_number: u32,
    pub page_number: u32,
    pub page_size: u32,
}
