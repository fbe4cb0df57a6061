use lab_report_extract::parsers::{LabCorpParser, LabParser, MyChartParser, QuestParser};
use lab_report_extract::record::{ResultRecord, UNKNOWN_LAB};
use lab_report_extract::ParserRegistry;
use std::fs;

fn fixture(filename: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), filename);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {path}: {e}"))
}

fn find<'a>(records: &'a [ResultRecord], name: &str) -> &'a ResultRecord {
    records
        .iter()
        .find(|r| r.test_name == name)
        .unwrap_or_else(|| panic!("no record named {name}"))
}

#[test]
fn test_each_parser_accepts_only_its_own_format() {
    let samples = [
        ("labcorp_sample.txt", "LabCorp"),
        ("labcorp_cmp_sample.txt", "LabCorp"),
        ("quest_sample.txt", "Quest Diagnostics"),
        ("quest_two_line_sample.txt", "Quest Diagnostics"),
        ("mychart_sample.txt", "MyChart"),
        ("mychart_cards_sample.txt", "MyChart"),
    ];
    let parsers: [&dyn LabParser; 3] = [&LabCorpParser, &QuestParser, &MyChartParser];

    for (file, owner) in samples {
        let text = fixture(file);
        for parser in parsers {
            assert_eq!(
                parser.detect(&text),
                parser.name() == owner,
                "{} on {file}",
                parser.name()
            );
        }
    }
}

#[test]
fn test_registry_routes_labcorp_report() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("labcorp_sample.txt"));

    assert_eq!(outcome.lab_name, "LabCorp");
    assert_eq!(outcome.method_tag, Some("labcorp_parser"));
    assert_eq!(outcome.records.len(), 4);

    let wbc = find(&outcome.records, "WBC");
    assert_eq!(wbc.value, Some(6.2));
    assert_eq!(wbc.unit, "x10E3/uL");
    assert_eq!(wbc.reference_range, "3.4-10.8");
    assert_eq!(find(&outcome.records, "Platelets").flag, "High");
    assert!(outcome.records.iter().all(|r| r.lab_name == "LabCorp"));
}

#[test]
fn test_registry_routes_quest_report() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("quest_sample.txt"));

    assert_eq!(outcome.lab_name, "Quest Diagnostics");
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(find(&outcome.records, "HDL CHOLESTEROL").reference_range, ">=50");
    assert_eq!(find(&outcome.records, "GLUCOSE").flag, "High");
}

#[test]
fn test_registry_routes_mychart_export() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("mychart_sample.txt"));

    assert_eq!(outcome.lab_name, "MyChart");
    let names: Vec<&str> = outcome.records.iter().map(|r| r.test_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Glucose", "Sodium", "Creatinine Level", "eGFR", "LDL Cholesterol"]
    );

    assert_eq!(find(&outcome.records, "Creatinine Level").flag, "High");
    assert_eq!(find(&outcome.records, "LDL Cholesterol").flag, "High");
    assert_eq!(find(&outcome.records, "eGFR").flag, "");
    assert_eq!(find(&outcome.records, "Glucose").value, Some(92.0));
}

#[test]
fn test_registry_routes_labcorp_page_without_previous_results() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("labcorp_cmp_sample.txt"));

    assert_eq!(outcome.lab_name, "LabCorp");
    assert_eq!(outcome.records.len(), 11);

    let bun = find(&outcome.records, "BUN");
    assert_eq!(bun.value, Some(21.0));
    assert_eq!(bun.flag, "High");
    assert_eq!(bun.reference_range, "6-20");
    assert_eq!(find(&outcome.records, "Potassium").flag, "High");
    assert_eq!(find(&outcome.records, "AST (SGOT)").unit, "IU/L");
    assert_eq!(find(&outcome.records, "Glucose").flag, "");
}

#[test]
fn test_registry_routes_quest_two_line_report() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("quest_two_line_sample.txt"));

    assert_eq!(outcome.lab_name, "Quest Diagnostics");
    let names: Vec<&str> = outcome.records.iter().map(|r| r.test_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Hemoglobin A1c", "Glucose", "TSH", "Vitamin D, 25-OH, Total"]
    );

    let a1c = find(&outcome.records, "Hemoglobin A1c");
    assert_eq!(a1c.flag, "High");
    assert_eq!(a1c.reference_range, "<5.7");
    assert_eq!(a1c.unit, "% of total Hgb");

    let vitamin_d = find(&outcome.records, "Vitamin D, 25-OH, Total");
    assert_eq!(vitamin_d.flag, "Low");
    assert_eq!(vitamin_d.unit, "ng/mL");
    assert_eq!(find(&outcome.records, "TSH").reference_range, "0.40-4.50");
}

#[test]
fn test_registry_routes_mychart_cards_without_banner() {
    let outcome = ParserRegistry::with_defaults().parse(&fixture("mychart_cards_sample.txt"));

    assert_eq!(outcome.lab_name, "MyChart");
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(find(&outcome.records, "Cholesterol, Total").flag, "High");
    assert_eq!(find(&outcome.records, "HDL Cholesterol").flag, "");
    assert_eq!(find(&outcome.records, "Hemoglobin A1c").value, Some(6.1));
    assert_eq!(find(&outcome.records, "Hemoglobin A1c").flag, "High");
}

#[test]
fn test_every_record_is_well_formed() {
    let registry = ParserRegistry::with_defaults();
    for file in [
        "labcorp_sample.txt",
        "labcorp_cmp_sample.txt",
        "quest_sample.txt",
        "quest_two_line_sample.txt",
        "mychart_sample.txt",
        "mychart_cards_sample.txt",
    ] {
        let text = fixture(file);
        let first = registry.parse(&text).records;
        let second = registry.parse(&text).records;
        assert_eq!(first, second, "{file} parse is not repeatable");

        for record in &first {
            assert!(!record.test_name.trim().is_empty());
            assert!((0.0..=1.0).contains(&record.confidence));
            assert!(record.test_date.is_some(), "{file}: {} has no date", record.test_name);
            assert!(["", "High", "Low", "Critical"].contains(&record.flag.as_str()));
        }
    }
}

#[test]
fn test_unknown_format_is_unmatched() {
    let text = "Community Clinic\nVitamin D 25-Hydroxy 41.2 ng/mL 30.0-100.0\n";
    let outcome = ParserRegistry::with_defaults().parse(text);

    assert!(!outcome.is_matched());
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.lab_name, UNKNOWN_LAB);
}
