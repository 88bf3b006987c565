use exam_lens::pipeline::load_sessions;
use exam_lens::table::{table_keys, table_path, TableSet};
use exam_lens::{
    Dashboard, Exam, Feature, LensConfig, LensError, QueryResolver, ReferenceData, StudentId,
    TargetVector,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

/// Raw reading for a student in a table: distinct per (feature, exam, student)
fn reading(feature: Feature, exam: Exam, student: StudentId, minute: u32) -> f64 {
    let exam_offset = match exam {
        Exam::Midterm1 => 0.0,
        Exam::Midterm2 => 0.5,
        Exam::Final => 1.0,
    };
    let base = match feature {
        Feature::Hr => 60.0 + 4.0 * f64::from(student.number()),
        Feature::Eda => 0.1 * f64::from(student.number()),
        Feature::Bvp => f64::from(student.number()),
        Feature::Temp => 30.0 + 0.1 * f64::from(student.number()),
        Feature::Stress => 0.05 * f64::from(student.number()),
    };
    let jitter = if minute % 2 == 0 { -0.01 } else { 0.01 };
    base + exam_offset + jitter
}

fn write_dataset(root: &Path, skip_student_stress: Option<StudentId>) {
    for (feature, exam) in table_keys() {
        let students: Vec<StudentId> = StudentId::all()
            .filter(|s| !(feature == Feature::Stress && Some(*s) == skip_student_stress))
            .collect();

        let mut csv = String::from("minute");
        for &student in &students {
            csv.push(',');
            csv.push_str(&feature.column_name(student, exam));
        }
        csv.push('\n');

        for minute in 0..4 {
            csv.push_str(&minute.to_string());
            for &student in &students {
                csv.push_str(&format!(",{}", reading(feature, exam, student, minute)));
            }
            csv.push('\n');
        }

        let path = table_path(root, feature, exam);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, csv).unwrap();
    }
}

fn temp_root(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("exam-lens-{name}-{}", uuid::Uuid::new_v4()))
}

fn config_for(root: &Path) -> LensConfig {
    LensConfig {
        data_dir: root.to_path_buf(),
        reference: ReferenceData::default(),
    }
}

#[test]
fn test_full_load_and_resolve() {
    let root = temp_root("full");
    write_dataset(&root, None);

    let sessions = load_sessions(&config_for(&root)).unwrap();
    assert_eq!(sessions.len(), 30);

    let reference = ReferenceData::default();
    for session in &sessions {
        assert_eq!(
            session.grade,
            reference.grade(session.exam, session.student).unwrap()
        );
        assert!(session.avg.iter().all(|(_, avg)| avg.is_some()));
    }

    // s4 final: HR readings 60 + 16 + 1 +- 0.01, mean 77
    let s4_final = sessions
        .iter()
        .find(|s| s.exam == Exam::Final && s.student == StudentId::new(4).unwrap())
        .unwrap();
    assert!((s4_final.avg[Feature::Hr].unwrap() - 77.0).abs() < 1e-9);
    // EDA is scaled x100: (0.4 + 1.0) * 100
    assert!((s4_final.avg[Feature::Eda].unwrap() - 140.0).abs() < 1e-6);

    let target = TargetVector::single(Feature::Hr, 77.0).unwrap();
    let found = QueryResolver::resolve(&target, &sessions).unwrap();
    assert_eq!(found.session.student, StudentId::new(4).unwrap());
    assert_eq!(found.session.exam, Exam::Final);
    assert_eq!(found.session.grade, 149);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_dashboard_stress_query_skips_missing_student() {
    let root = temp_root("stress");
    let s1 = StudentId::new(1).unwrap();
    write_dataset(&root, Some(s1));

    let mut dashboard = Dashboard::load(&config_for(&root)).unwrap();

    // s1 has no stress column in any exam, so stress stays undefined for them
    let undefined: Vec<_> = dashboard
        .sessions()
        .iter()
        .filter(|s| s.avg[Feature::Stress].is_none())
        .map(|s| s.student)
        .collect();
    assert_eq!(undefined, vec![s1, s1, s1]);

    // lowest possible stress would be s1 if it had data; s2 midterm1 wins instead
    let found = dashboard.set_control(Feature::Stress, 0.0).unwrap();
    assert_eq!(found.session.student, StudentId::new(2).unwrap());
    assert_eq!(found.session.exam, Exam::Midterm1);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_missing_file_fails_whole_load() {
    let root = temp_root("partial");
    write_dataset(&root, None);
    fs::remove_file(table_path(&root, Feature::Bvp, Exam::Midterm2)).unwrap();

    let err = TableSet::load_dir(&root).unwrap_err();
    match err {
        LensError::Io { path, .. } => assert!(path.ends_with("BVP/BVPmidterm2.csv")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(Dashboard::load(&config_for(&root)).is_err());

    fs::remove_dir_all(&root).ok();
}
