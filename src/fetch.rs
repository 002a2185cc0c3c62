//! One fetch per hierarchy level.
//!
//! Every fetcher returns `Ok(vec![])` when the level legitimately has no
//! records and `Err` when it could not be determined; callers decide whether
//! that is fatal.

use reqwest::Method;
use tracing::{debug, info, warn};

use crate::model::{Assembly, District, Part, PartsQuery, State};
use crate::parse::{parse_assemblies, parse_districts, parse_parts_page, parse_states};
use crate::request::{ApiRequest, EciClient, Transport};
use crate::{Error, Result};

impl<T: Transport> EciClient<T> {
    fn lookup(&self, url: String) -> ApiRequest {
        ApiRequest {
            method: Method::GET,
            url,
            body: None,
            timeout: self.lookup_timeout,
        }
    }

    /// All active states, in the order the gateway lists them.
    pub async fn fetch_states(&self) -> Result<Vec<State>> {
        let request = self.lookup(self.states_url());
        info!(url = %request.url, "fetching states");
        let res = self.execute(&request).await?;
        let states = parse_states(&res.body)?;
        info!(count = states.len(), "fetched active states");
        Ok(states)
    }

    /// Active districts of `state_cd`.
    pub async fn fetch_districts(&self, state_cd: &str) -> Result<Vec<District>> {
        let request = self.lookup(self.districts_url(state_cd));
        info!(state_cd, url = %request.url, "fetching districts");
        let res = self.execute(&request).await?;
        let districts = parse_districts(&res.body, state_cd)?;
        info!(state_cd, count = districts.len(), "fetched active districts");
        Ok(districts)
    }

    /// Active assembly constituencies of `district_cd` that carry both a name and a number.
    pub async fn fetch_assemblies(&self, district_cd: &str) -> Result<Vec<Assembly>> {
        let request = self.lookup(self.assemblies_url(district_cd));
        info!(district_cd, url = %request.url, "fetching assemblies");
        let res = self.execute(&request).await?;
        let assemblies = parse_assemblies(&res.body, district_cd)?;
        info!(district_cd, count = assemblies.len(), "fetched active assemblies");
        Ok(assemblies)
    }

    /// Every part of one assembly constituency, walking pages until a short or empty one.
    ///
    /// A page is requested only after the previous one came back full, with
    /// `page_delay` in between. Any failing page fails the whole assembly: a
    /// partial list is never returned.
    pub async fn fetch_parts(
        &self,
        state_cd: &str,
        district_cd: &str,
        ac_number: u32,
    ) -> Result<Vec<Part>> {
        info!(state_cd, district_cd, ac_number, "fetching parts");
        let page_size = self.page_size as usize;
        let mut parts = Vec::new();
        let mut page_number = 0;

        loop {
            let query = PartsQuery {
                state_cd: state_cd.to_string(),
                district_cd: district_cd.to_string(),
                ac_number,
                page_number,
                page_size: self.page_size,
            };
            let body = serde_json::to_value(&query).map_err(Error::Serialize)?;
            let request = ApiRequest {
                method: Method::POST,
                url: self.parts_url(),
                body: Some(body),
                timeout: self.parts_timeout,
            };

            let res = self.execute(&request).await?;
            let context = format!("parts of AC {ac_number} ({district_cd}) page {page_number}");
            let page = parse_parts_page(&res.body, &context)?;
            if page.exhausted {
                break;
            }

            debug!(ac_number, page_number, received = page.received, kept = page.parts.len(), "parts page");
            parts.extend(page.parts);
            if page.received < page_size {
                break;
            }

            page_number += 1;
            if page_number >= self.max_pages {
                warn!(
                    ac_number,
                    district_cd,
                    max_pages = self.max_pages,
                    "page limit reached, stopping pagination"
                );
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        info!(ac_number, district_cd, count = parts.len(), "fetched parts");
        Ok(parts)
    }
}
