//! Electoral roll hierarchy harvester.
//!
//! Walks state → district → assembly constituency → polling-station part on the
//! election commission gateway and mirrors every level to disk as a directory
//! tree of pretty-printed JSON arrays.

pub mod cli;
pub mod config;
mod error;
pub mod fetch;
mod macros;
pub mod model;
mod parse;
pub mod process;
pub mod request;
pub mod tree;

pub use config::Config;
pub use error::{Error, Result};
pub use process::{harvest, HarvestReport};
pub use request::{EciClient, HttpTransport, Transport};
pub use tree::{sanitize_name, TreeWriter};

const BASE_URL: &str = "https://gateway-voters.eci.gov.in/api/v1";
const STATES_PATH: &str = "/common/states/";
const DISTRICTS_PATH: &str = "/common/districts/";
const ACS_PATH: &str = "/common/acs/";
const PARTS_PATH: &str = "/printing-publish/get-part-list";

const OUTPUT_DIR: &str = "data";
const ALL_STATES_FILE: &str = "allstates.json";
const DISTRICTS_FILE: &str = "districts.json";
const ASSEMBLIES_FILE: &str = "assemblies.json";
const PARTS_FILE: &str = "assemblies-part.json";

/// Value of the upstream `isActive` flag for records we keep.
const ACTIVE_FLAG: &str = "Y";
/// Value of the parts response `status` field on a usable page.
const PARTS_SUCCESS: &str = "Success";

const PARTS_PAGE_SIZE: u32 = 10;
const PAGE_DELAY_MS: u64 = 1_000;
/// Guard against a server that ignores `pageNumber` and keeps returning full pages.
const MAX_PAGES: u32 = 1_000;
const LOOKUP_TIMEOUT_MS: u64 = 10_000;
const PARTS_TIMEOUT_MS: u64 = 15_000;
const RETRY_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 5_000;
