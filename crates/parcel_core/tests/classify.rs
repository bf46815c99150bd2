use parcel_core::{
    classify, ApiStatus, EntityRecord, FetchOutcome, FetchResolution, OUTPUT_COLUMNS,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn entity() -> EntityRecord {
    EntityRecord::from_raw(Some("P-1"), "1001", Some(46.7), Some(24.7)).unwrap()
}

fn resolved(outcome: FetchOutcome) -> FetchResolution {
    FetchResolution {
        outcome,
        attempts: 1,
        exhausted: false,
    }
}

fn column(record: &[String], name: &str) -> String {
    let index = OUTPUT_COLUMNS.iter().position(|c| *c == name).unwrap();
    record[index].clone()
}

#[test]
fn success_fans_out_one_row_per_result() {
    let outcome = FetchOutcome::Success(vec![
        json!({"id": 11, "landuse": "Residential", "maxBuildingHeight": 12.5}),
        json!({"id": 12, "landuse": "Commercial"}),
    ]);
    let rows = classify(&entity(), &resolved(outcome));

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.api_status == ApiStatus::Success));
    assert_eq!(rows[0].rule_id().as_deref(), Some("11"));
    assert_eq!(rows[1].rule_id().as_deref(), Some("12"));

    let record = rows[0].to_record();
    assert_eq!(record.len(), OUTPUT_COLUMNS.len());
    assert_eq!(column(&record, "parcel_id"), "P-1");
    assert_eq!(column(&record, "parcel_objectid"), "1001");
    assert_eq!(column(&record, "lon"), "46.7");
    assert_eq!(column(&record, "landuse"), "Residential");
    assert_eq!(column(&record, "maxBuildingHeight"), "12.5");
    assert_eq!(column(&record, "api_status"), "SUCCESS");
    assert_eq!(column(&record, "extra_data"), "");
}

#[test]
fn unknown_fields_are_preserved_and_decodable() {
    let outcome = FetchOutcome::Success(vec![json!({
        "id": 5,
        "zoningId": 3,
        "futureField": {"nested": [1, 2]},
        "arabicName": "سكني",
        "parcel_objectid": "spoofed",
    })]);
    let rows = classify(&entity(), &resolved(outcome));
    let record = rows[0].to_record();

    // Identity columns always come from the entity.
    assert_eq!(column(&record, "parcel_objectid"), "1001");
    assert_eq!(column(&record, "zoningId"), "3");

    let extras: Value = serde_json::from_str(&column(&record, "extra_data")).unwrap();
    assert_eq!(
        extras,
        json!({
            "futureField": {"nested": [1, 2]},
            "arabicName": "سكني",
            "parcel_objectid": "spoofed",
        })
    );
    assert!(column(&record, "extra_data").contains("سكني"));
}

#[test]
fn non_object_element_is_kept_verbatim() {
    let outcome = FetchOutcome::Success(vec![json!("opaque")]);
    let rows = classify(&entity(), &resolved(outcome));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].extra_data, Some(json!("opaque")));
}

#[test]
fn every_terminal_outcome_yields_exactly_one_status_row() {
    let cases = [
        (resolved(FetchOutcome::NoData), ApiStatus::NoData),
        (resolved(FetchOutcome::NotFound), ApiStatus::NotFound),
        (resolved(FetchOutcome::JsonError("bad".into())), ApiStatus::JsonError),
        (
            FetchResolution {
                outcome: FetchOutcome::HttpError(503),
                attempts: 5,
                exhausted: true,
            },
            ApiStatus::FailedAfterRetries,
        ),
        (
            FetchResolution {
                outcome: FetchOutcome::ConnectionError("timed out".into()),
                attempts: 5,
                exhausted: true,
            },
            ApiStatus::FailedAfterRetries,
        ),
    ];

    for (resolution, expected) in cases {
        let rows = classify(&entity(), &resolution);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].api_status, expected);
        let record = rows[0].to_record();
        assert_eq!(column(&record, "api_status"), expected.as_str());
        assert_eq!(column(&record, "rule_id"), "");
    }
}

#[test]
fn null_attributes_render_as_empty_cells() {
    let outcome = FetchOutcome::Success(vec![json!({"id": 1, "description": null, "coloring": true})]);
    let record = classify(&entity(), &resolved(outcome))[0].to_record();
    assert_eq!(column(&record, "description"), "");
    assert_eq!(column(&record, "coloring"), "true");
}

#[test]
fn explicit_rule_id_next_to_id_lands_in_extra_data() {
    let outcome = FetchOutcome::Success(vec![json!({
        "id": 7,
        "rule_id": "R-7",
        "landuse": "Residential",
    })]);
    let rows = classify(&entity(), &resolved(outcome));
    let record = rows[0].to_record();

    assert_eq!(column(&record, "rule_id"), "7");
    let extra: Value = serde_json::from_str(&column(&record, "extra_data")).unwrap();
    assert_eq!(extra, json!({"rule_id": "R-7"}));
}
