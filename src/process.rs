use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cli::normalize_state_code;
use crate::model::{Assembly, District, State};
use crate::request::{EciClient, Transport};
use crate::tree::{sanitize_name, TreeWriter};
use crate::{
    info_time, Error, Result, ALL_STATES_FILE, ASSEMBLIES_FILE, DISTRICTS_FILE, PARTS_FILE,
};

/// Hierarchy level a branch failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    States,
    Districts,
    Assemblies,
    Parts,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::States => write!(f, "states"),
            Self::Districts => write!(f, "districts"),
            Self::Assemblies => write!(f, "assemblies"),
            Self::Parts => write!(f, "parts"),
        }
    }
}

/// A piece of the tree that was left out, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBranch {
    pub level: Level,
    /// Codes leading to the branch, e.g. `S2408/86`.
    pub key: String,
    pub reason: String,
}

/// Two siblings whose names sanitize to the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    pub dir: PathBuf,
    pub first: String,
    pub second: String,
}

/// Outcome of a run that got past the fatal stages.
#[derive(Debug, Default)]
pub struct HarvestReport {
    pub state: Option<State>,
    pub states: usize,
    pub districts: usize,
    pub assemblies: usize,
    pub parts: usize,
    pub files_written: Vec<PathBuf>,
    pub skipped: Vec<SkippedBranch>,
    pub collisions: Vec<NameCollision>,
}

impl HarvestReport {
    /// True when no branch was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn log_summary(&self) {
        info!(
            states = self.states,
            districts = self.districts,
            assemblies = self.assemblies,
            parts = self.parts,
            files = self.files_written.len(),
            skipped = self.skipped.len(),
            collisions = self.collisions.len(),
            "harvest summary"
        );
        for skip in &self.skipped {
            warn!(level = %skip.level, key = %skip.key, reason = %skip.reason, "skipped branch");
        }
        for c in &self.collisions {
            warn!(dir = %c.dir.display(), first = %c.first, second = %c.second, "name collision");
        }
    }

    fn skip(&mut self, level: Level, key: impl Into<String>, err: &Error) {
        let key = key.into();
        error!(%level, key = %key, error = %err, "skipping branch");
        self.skipped.push(SkippedBranch {
            level,
            key,
            reason: err.to_string(),
        });
    }

    /// Writes one collection. A failed write is recorded as a skipped branch.
    async fn save<S: Serialize>(
        &mut self,
        writer: &TreeWriter,
        rel_dir: &Path,
        file_name: &str,
        records: &[S],
        level: Level,
        key: &str,
    ) -> bool {
        match writer.write_records(rel_dir, file_name, records).await {
            Ok(path) => {
                self.files_written.push(path);
                true
            }
            Err(e) => {
                self.skip(level, key, &e);
                false
            }
        }
    }
}

/// Tracks the sanitized directory names handed out under one parent.
#[derive(Debug, Default)]
struct Siblings {
    taken: HashMap<String, String>,
}

impl Siblings {
    /// Directory name for `name`, falling back to `code` when nothing survives sanitizing.
    fn dir_name(
        &mut self,
        parent: &Path,
        name: &str,
        code: &str,
        report: &mut HarvestReport,
    ) -> String {
        let mut dir = sanitize_name(name);
        if dir.is_empty() {
            dir = sanitize_name(code);
            warn!(name, code, "name has no ASCII alphanumerics, using its code as directory");
        }

        if let Some(first) = self.taken.get(&dir) {
            warn!(
                dir = %parent.join(&dir).display(),
                first = %first,
                second = name,
                "sanitized names collide"
            );
            report.collisions.push(NameCollision {
                dir: parent.join(&dir),
                first: first.clone(),
                second: name.to_string(),
            });
        } else {
            self.taken.insert(dir.clone(), name.to_string());
        }
        dir
    }
}

/// Harvests one state into `writer`'s root.
///
/// Fatal, returned as `Err`: the state list can't be fetched, `state_cd` isn't
/// among the active states, or the state's district list can't be fetched.
/// Everything below that is isolated per branch and lands in the report.
pub async fn harvest<T: Transport>(
    client: &EciClient<T>,
    writer: &TreeWriter,
    state_cd: &str,
) -> Result<HarvestReport> {
    let start_time = Local::now();
    let state_cd = normalize_state_code(state_cd)?;
    let mut report = HarvestReport::default();
    info_time!("Started harvesting state {}", state_cd);

    let states = client.fetch_states().await?;
    report.states = states.len();
    report
        .save(writer, Path::new(""), ALL_STATES_FILE, &states, Level::States, "all")
        .await;

    let state = states
        .into_iter()
        .find(|s| s.state_cd == state_cd)
        .ok_or_else(|| Error::StateNotFound(state_cd.clone()))?;
    let state_dir = PathBuf::from(Siblings::default().dir_name(
        Path::new(""),
        &state.state_name,
        &state.state_cd,
        &mut report,
    ));
    info!(state_cd = %state_cd, name = %state.state_name, dir = %state_dir.display(), "resolved state");

    let districts = client.fetch_districts(&state_cd).await?;
    report.districts = districts.len();
    report
        .save(writer, &state_dir, DISTRICTS_FILE, &districts, Level::Districts, &state_cd)
        .await;

    let mut siblings = Siblings::default();
    for district in &districts {
        let dir = siblings.dir_name(
            &state_dir,
            &district.district_value,
            &district.district_cd,
            &mut report,
        );
        harvest_district(client, writer, &state_cd, district, &state_dir.join(dir), &mut report)
            .await;
    }

    report.state = Some(state);
    info_time!(start_time, "Finished harvesting state {}", state_cd);
    Ok(report)
}

async fn harvest_district<T: Transport>(
    client: &EciClient<T>,
    writer: &TreeWriter,
    state_cd: &str,
    district: &District,
    district_dir: &Path,
    report: &mut HarvestReport,
) {
    let district_cd = district.district_cd.as_str();
    let assemblies = match client.fetch_assemblies(district_cd).await {
        Ok(assemblies) => assemblies,
        Err(e) => return report.skip(Level::Assemblies, district_cd, &e),
    };

    // Children would land in the same directory, so a failed write ends the district.
    if !report
        .save(writer, district_dir, ASSEMBLIES_FILE, &assemblies, Level::Assemblies, district_cd)
        .await
    {
        return;
    }
    report.assemblies += assemblies.len();

    let mut siblings = Siblings::default();
    for assembly in &assemblies {
        let dir = siblings.dir_name(
            district_dir,
            &assembly.name,
            &assembly.ac_number.to_string(),
            report,
        );
        let assembly_dir = district_dir.join(dir);
        harvest_assembly(client, writer, state_cd, district_cd, assembly, &assembly_dir, report)
            .await;
    }
}

async fn harvest_assembly<T: Transport>(
    client: &EciClient<T>,
    writer: &TreeWriter,
    state_cd: &str,
    district_cd: &str,
    assembly: &Assembly,
    assembly_dir: &Path,
    report: &mut HarvestReport,
) {
    let key = format!("{district_cd}/{}", assembly.ac_number);
    let parts = match client
        .fetch_parts(state_cd, district_cd, assembly.ac_number)
        .await
    {
        Ok(parts) => parts,
        Err(e) => return report.skip(Level::Parts, key, &e),
    };

    if report
        .save(writer, assembly_dir, PARTS_FILE, &parts, Level::Parts, &key)
        .await
    {
        report.parts += parts.len();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::request::mock::*;

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    fn scenario() -> MockTransport {
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(r#"[{"districtCd":"S2408","districtValue":"Test Dist","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/acs/S2408",
                Reply::ok(r#"[{"asmblyNo":86,"asmblyName":"Test AC","isActive":"Y"}]"#),
            )
            .on_parts(
                86,
                0,
                Reply::ok(r#"{"status":"Success","payload":[{"partNumber":1,"partName":"Booth A"}]}"#),
            )
            .on_parts(86, 1, Reply::ok(r#"{"status":"Success","payload":[]}"#));
        transport
    }

    #[tokio::test]
    async fn end_to_end_tree() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let client = EciClient::with_transport(scenario(), &test_config());

        let report = harvest(&client, &writer, "s24").await.unwrap();
        assert!(report.is_complete());
        assert_eq!(
            (report.states, report.districts, report.assemblies, report.parts),
            (1, 1, 1, 1)
        );
        assert_eq!(report.files_written.len(), 4);

        let root = dir.path();
        assert_eq!(read_json(&root.join("allstates.json")).as_array().unwrap().len(), 1);
        assert_eq!(
            read_json(&root.join("TestState/districts.json"))[0]["districtCd"],
            "S2408"
        );
        assert_eq!(
            read_json(&root.join("TestState/TestDist/assemblies.json"))[0]["acNumber"],
            86
        );
        assert_eq!(
            read_json(&root.join("TestState/TestDist/TestAC/assemblies-part.json")),
            json!([{"partNumber": 1, "partName": "Booth A"}])
        );
    }

    #[tokio::test]
    async fn unknown_state_is_fatal_after_allstates() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let client = EciClient::with_transport(scenario(), &test_config());

        let err = harvest(&client, &writer, "S99").await.unwrap_err();
        assert!(matches!(err, Error::StateNotFound(ref code) if code == "S99"));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["allstates.json"]);
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn state_list_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport.on_get("/common/states/", Reply::Status(502, String::new()));
        let client = EciClient::with_transport(transport, &test_config());

        assert!(matches!(
            harvest(&client, &writer, "S24").await,
            Err(Error::HttpStatus { status: 502, .. })
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn district_list_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport.on_get(
            "/common/states/",
            Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
        );
        let client = EciClient::with_transport(transport, &test_config());

        assert!(matches!(
            harvest(&client, &writer, "S24").await,
            Err(Error::HttpStatus { status: 404, .. })
        ));
        assert!(!dir.path().join("TestState").exists());
    }

    #[tokio::test]
    async fn invalid_code_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let client = EciClient::with_transport(MockTransport::new(), &test_config());

        assert!(matches!(
            harvest(&client, &writer, "").await,
            Err(Error::InvalidStateCode(_))
        ));
        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn failed_district_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(
                    r#"[{"districtCd":"S2401","districtValue":"Broken","isActive":"Y"},
                        {"districtCd":"S2402","districtValue":"Fine","isActive":"Y"}]"#,
                ),
            )
            .on_get("/common/acs/S2401", Reply::Status(500, String::new()))
            .on_get(
                "/common/acs/S2402",
                Reply::ok(r#"[{"asmblyNo":7,"asmblyName":"Seven","isActive":"Y"}]"#),
            )
            .on_parts(
                7,
                0,
                Reply::ok(r#"{"status":"Success","payload":[{"partNumber":1,"partName":"P1"}]}"#),
            );
        let client = EciClient::with_transport(transport, &test_config());

        let report = harvest(&client, &writer, "S24").await.unwrap();
        assert_eq!(
            report.skipped,
            vec![SkippedBranch {
                level: Level::Assemblies,
                key: "S2401".into(),
                reason: format!("HTTP status 500 from {BASE}/common/acs/S2401"),
            }]
        );
        assert!(client
            .transport()
            .requests()
            .iter()
            .any(|r| r.url.ends_with("/common/acs/S2402")));

        let state_dir = dir.path().join("TestState");
        assert!(!state_dir.join("Broken").exists());
        assert!(state_dir.join("Fine/Seven/assemblies-part.json").exists());
        // Only the district listing, written before the failure, mentions it.
        for path in report
            .files_written
            .iter()
            .filter(|p| !p.ends_with("allstates.json") && !p.ends_with("districts.json"))
        {
            assert!(!std::fs::read_to_string(path).unwrap().contains("Broken"));
        }
    }

    #[tokio::test]
    async fn failed_parts_skip_only_that_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(r#"[{"districtCd":"S2408","districtValue":"Test Dist","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/acs/S2408",
                Reply::ok(
                    r#"[{"asmblyNo":1,"asmblyName":"One","isActive":"Y"},
                        {"asmblyNo":2,"asmblyName":"Two","isActive":"Y"}]"#,
                ),
            )
            .on_parts(1, 0, Reply::Status(403, String::new()))
            .on_parts(
                2,
                0,
                Reply::ok(r#"{"status":"Success","payload":[{"partNumber":5,"partName":"P5"}]}"#),
            );
        let client = EciClient::with_transport(transport, &test_config());

        let report = harvest(&client, &writer, "S24").await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].level, Level::Parts);
        assert_eq!(report.skipped[0].key, "S2408/1");
        assert_eq!(report.parts, 1);

        let district_dir = dir.path().join("TestState/TestDist");
        assert!(!district_dir.join("One/assemblies-part.json").exists());
        assert!(district_dir.join("Two/assemblies-part.json").exists());
    }

    #[tokio::test]
    async fn unwritable_district_skips_its_assemblies_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("TestState")).unwrap();
        std::fs::write(dir.path().join("TestState/TestDist"), b"not a directory").unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(
                    r#"[{"districtCd":"S2408","districtValue":"Test Dist","isActive":"Y"},
                        {"districtCd":"S2409","districtValue":"Other","isActive":"Y"}]"#,
                ),
            )
            .on_get(
                "/common/acs/S2408",
                Reply::ok(r#"[{"asmblyNo":86,"asmblyName":"Test AC","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/acs/S2409",
                Reply::ok(r#"[{"asmblyNo":7,"asmblyName":"Seven","isActive":"Y"}]"#),
            )
            .on_parts(
                86,
                0,
                Reply::ok(r#"{"status":"Success","payload":[{"partNumber":1,"partName":"A"}]}"#),
            )
            .on_parts(
                7,
                0,
                Reply::ok(r#"{"status":"Success","payload":[{"partNumber":1,"partName":"P1"}]}"#),
            );
        let client = EciClient::with_transport(transport, &test_config());

        let report = harvest(&client, &writer, "S24").await.unwrap();

        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| (s.level, s.key.as_str()))
            .collect();
        assert_eq!(skipped, vec![(Level::Assemblies, "S2408")]);
        assert_eq!(
            client
                .transport()
                .count(|r| r.body.as_ref().is_some_and(|b| b["acNumber"] == 86)),
            0
        );
        assert!(dir
            .path()
            .join("TestState/Other/Seven/assemblies-part.json")
            .exists());
        assert_eq!(report.assemblies, 1);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn zero_parts_still_writes_an_empty_collection() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"Test State","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(r#"[{"districtCd":"S2408","districtValue":"Test Dist","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/acs/S2408",
                Reply::ok(r#"[{"asmblyNo":86,"asmblyName":"Test AC","isActive":"Y"}]"#),
            )
            .on_parts(86, 0, Reply::ok(r#"{"status":"Success","payload":[]}"#));
        let client = EciClient::with_transport(transport, &test_config());

        let report = harvest(&client, &writer, "S24").await.unwrap();
        assert!(report.is_complete());
        assert_eq!(
            read_json(&dir.path().join("TestState/TestDist/TestAC/assemblies-part.json")),
            json!([])
        );
    }

    #[tokio::test]
    async fn colliding_names_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TreeWriter::new(dir.path());
        let transport = MockTransport::new();
        transport
            .on_get(
                "/common/states/",
                Reply::ok(r#"[{"stateCd":"S24","stateName":"मथुरा","isActive":"Y"}]"#),
            )
            .on_get(
                "/common/districts/S24",
                Reply::ok(
                    r#"[{"districtCd":"S2401","districtValue":"A.B","isActive":"Y"},
                        {"districtCd":"S2402","districtValue":"AB","isActive":"Y"}]"#,
                ),
            )
            .on_get("/common/acs/S2401", Reply::ok("[]"))
            .on_get("/common/acs/S2402", Reply::ok("[]"));
        let client = EciClient::with_transport(transport, &test_config());

        let report = harvest(&client, &writer, "S24").await.unwrap();
        // Nothing ASCII in the state name: the code names the directory.
        assert!(dir.path().join("S24/districts.json").exists());
        assert_eq!(
            report.collisions,
            vec![NameCollision {
                dir: PathBuf::from("S24/AB"),
                first: "A.B".into(),
                second: "AB".into(),
            }]
        );
        assert!(report.is_complete());
    }
}
