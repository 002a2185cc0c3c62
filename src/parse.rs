use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{Assembly, District, Part, State};
use crate::{Error, Result, ACTIVE_FLAG, PARTS_SUCCESS};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    state_cd: Option<String>,
    state_name: Option<String>,
    state_name_hindi: Option<String>,
    is_active: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDistrict {
    district_cd: Option<String>,
    district_value: Option<String>,
    district_value_hindi: Option<String>,
    is_active: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssembly {
    asmbly_no: Option<Value>,
    asmbly_name: Option<String>,
    #[serde(rename = "asmblyNameL1")]
    asmbly_name_l1: Option<String>,
    is_active: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    part_number: Option<Value>,
    part_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPartsPage {
    status: Option<String>,
    payload: Option<Vec<RawPart>>,
}

/// One decoded page of the parts endpoint.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PartsPage {
    /// Usable parts, nameless ones removed.
    pub parts: Vec<Part>,
    /// Number of records the server sent, before filtering. Drives the last-page check.
    pub received: usize,
    /// The server reported a non-success status or sent nothing: no further pages.
    pub exhausted: bool,
}

#[inline]
fn is_active(flag: &Option<String>) -> bool {
    flag.as_deref() == Some(ACTIVE_FLAG)
}

#[inline]
fn present(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Upstream numbers sometimes arrive quoted.
fn as_u32(value: &Option<Value>) -> Option<u32> {
    match value.as_ref()? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str, context: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::decode(context, e))
}

/// Decodes the states listing, keeping active states in source order.
pub(crate) fn parse_states(body: &str) -> Result<Vec<State>> {
    let raw: Vec<RawState> = decode(body, "states")?;
    let received = raw.len();

    let states: Vec<State> = raw
        .into_iter()
        .filter(|s| is_active(&s.is_active))
        .filter_map(|s| match (present(&s.state_cd), present(&s.state_name)) {
            (Some(code), Some(name)) => Some(State {
                state_cd: code.to_string(),
                state_name: name.to_string(),
                state_name_hindi: s.state_name_hindi,
            }),
            _ => {
                warn!(?s, "dropping state without code or name");
                None
            }
        })
        .collect();

    debug!(received, active = states.len(), "parsed states");
    Ok(states)
}

/// Decodes the districts of `state_cd`, keeping active ones in source order.
pub(crate) fn parse_districts(body: &str, state_cd: &str) -> Result<Vec<District>> {
    let raw: Vec<RawDistrict> = decode(body, &format!("districts of state {state_cd}"))?;
    let received = raw.len();

    let districts: Vec<District> = raw
        .into_iter()
        .filter(|d| is_active(&d.is_active))
        .filter_map(
            |d| match (present(&d.district_cd), present(&d.district_value)) {
                (Some(code), Some(name)) => Some(District {
                    district_cd: code.to_string(),
                    district_value: name.to_string(),
                    district_value_hindi: d.district_value_hindi,
                }),
                _ => {
                    warn!(state_cd, ?d, "dropping district without code or name");
                    None
                }
            },
        )
        .collect();

    debug!(state_cd, received, active = districts.len(), "parsed districts");
    Ok(districts)
}

/// Decodes the assembly constituencies of `district_cd`.
/// Inactive records and records missing a name or a (non-zero) number are dropped.
pub(crate) fn parse_assemblies(body: &str, district_cd: &str) -> Result<Vec<Assembly>> {
    let raw: Vec<RawAssembly> = decode(body, &format!("assemblies of district {district_cd}"))?;
    if raw.is_empty() {
        warn!(district_cd, "no assemblies returned");
        return Ok(Vec::new());
    }
    let received = raw.len();

    let mut assemblies = Vec::with_capacity(received);
    for a in raw {
        if !is_active(&a.is_active) {
            debug!(district_cd, name = ?a.asmbly_name, "skipping inactive assembly");
            continue;
        }
        match (as_u32(&a.asmbly_no).filter(|n| *n > 0), present(&a.asmbly_name)) {
            (Some(ac_number), Some(name)) => assemblies.push(Assembly {
                ac_number,
                name: name.to_string(),
                name_l1: a.asmbly_name_l1,
            }),
            _ => warn!(district_cd, ?a, "dropping assembly missing name or number"),
        }
    }

    debug!(district_cd, received, active = assemblies.len(), "parsed assemblies");
    Ok(assemblies)
}

/// Decodes one page of parts. `context` names the assembly/page for error messages.
pub(crate) fn parse_parts_page(body: &str, context: &str) -> Result<PartsPage> {
    let raw: RawPartsPage = decode(body, context)?;

    let payload = match raw.payload {
        Some(payload) if raw.status.as_deref() == Some(PARTS_SUCCESS) && !payload.is_empty() => {
            payload
        }
        _ => {
            debug!(context, status = ?raw.status, "no parts on page");
            return Ok(PartsPage {
                exhausted: true,
                ..PartsPage::default()
            });
        }
    };

    let received = payload.len();
    let parts = payload
        .into_iter()
        .filter_map(|p| match (as_u32(&p.part_number), present(&p.part_name)) {
            (Some(part_number), Some(name)) => Some(Part {
                part_number,
                part_name: name.to_string(),
            }),
            (_, None) => {
                debug!(context, number = ?p.part_number, "dropping nameless part");
                None
            }
            (None, Some(name)) => {
                warn!(context, name, "dropping part without a number");
                None
            }
        })
        .collect();

    Ok(PartsPage {
        parts,
        received,
        exhausted: false,
    })
}
