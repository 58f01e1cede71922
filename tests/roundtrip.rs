//! Write-then-read round trips over temporary files.

use std::collections::BTreeMap;
use std::fs;

use cdf3::{
    epoch, Cdf, CdfDataType, CdfError, CdfSpec, CdfValues, CdfWriter, EpochValue, Majority,
    Sparseness, VarRecords, VarSpec, VargetOptions, VariableKind,
};

fn scratch(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    (dir, path)
}

fn doubles(count: usize, per_record: usize) -> CdfValues {
    CdfValues::Real8(
        (0..count * per_record)
            .map(|i| i as f64 / 8.0)
            .collect(),
    )
}

#[test]
fn compressed_file_round_trips() {
    let (_dir, path) = scratch("compressed.cdf");
    let mut writer = CdfWriter::create(
        &path,
        CdfSpec {
            majority: Majority::Row,
            compression: Some(6),
            checksum: true,
            ..CdfSpec::default()
        },
    )
    .unwrap();
    writer
        .write_var(
            VarSpec {
                name: "B_gse".to_string(),
                data_type: CdfDataType::Real8,
                dim_sizes: vec![3],
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(1000, 3))),
        )
        .unwrap();
    writer.close().unwrap();
    // close is idempotent.
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let info = cdf.info();
    assert!(info.compressed);
    assert!(info.checksum);
    assert_eq!(info.majority, Majority::Row);
    assert_eq!(info.zvariables, vec!["B_gse".to_string()]);

    let got = cdf.varget("B_gse", &VargetOptions::default()).unwrap();
    assert_eq!(got.num_records, 1000);
    assert_eq!(got.records_returned, 1000);
    assert_eq!(got.rec_shape, vec![3]);
    assert_eq!(got.data, doubles(1000, 3));
    assert_eq!(got.real_records.len(), 1000);
}

#[test]
fn majority_transpose_at_the_boundary() {
    let (_dir, path) = scratch("majority.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    // One record of shape [2, 3], stored row-major as 0..6.
    writer
        .write_var(
            VarSpec {
                name: "counts".to_string(),
                data_type: CdfDataType::Int4,
                dim_sizes: vec![2, 3],
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(CdfValues::Int4((0..6).collect()))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let stored = cdf.varget("counts", &VargetOptions::default()).unwrap();
    assert_eq!(stored.data, CdfValues::Int4(vec![0, 1, 2, 3, 4, 5]));

    let transposed = cdf
        .varget(
            "counts",
            &VargetOptions {
                majority: Some(Majority::Column),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(transposed.data, CdfValues::Int4(vec![0, 3, 1, 4, 2, 5]));
}

#[test]
fn record_ranges_clamp_instead_of_failing() {
    let (_dir, path) = scratch("clamp.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer
        .write_var(
            VarSpec {
                name: "n".to_string(),
                data_type: CdfDataType::Real8,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(10, 1))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let got = cdf
        .varget(
            "n",
            &VargetOptions {
                record_range: Some((5, 500)),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(got.records_returned, 5);
    assert_eq!(got.real_records, vec![5, 6, 7, 8, 9]);

    let empty = cdf
        .varget(
            "n",
            &VargetOptions {
                record_range: Some((50, 60)),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(empty.records_returned, 0);
}

#[test]
fn pad_sparse_gaps_read_as_the_pad_value() {
    let (_dir, path) = scratch("sparse.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer
        .write_var(
            VarSpec {
                name: "flux".to_string(),
                data_type: CdfDataType::Real8,
                sparseness: Sparseness::Pad,
                pad_value: Some(CdfValues::Real8(vec![-1.0e30])),
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Sparse {
                records: vec![0, 5, 10],
                values: CdfValues::Real8(vec![1.0, 2.0, 3.0]),
            }),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let inq = cdf.varinq("flux").unwrap();
    assert_eq!(inq.sparseness, Sparseness::Pad);
    assert_eq!(inq.last_rec, 10);

    let got = cdf.varget("flux", &VargetOptions::default()).unwrap();
    assert_eq!(got.records_returned, 11);
    assert_eq!(got.real_records, vec![0, 5, 10]);
    let CdfValues::Real8(values) = got.data else {
        panic!("wrong type");
    };
    assert_eq!(values[0], 1.0);
    assert_eq!(values[5], 2.0);
    assert_eq!(values[10], 3.0);
    for gap in [1, 2, 3, 4, 6, 7, 8, 9] {
        assert_eq!(values[gap], -1.0e30, "record {gap} must be the pad value");
    }
}

#[test]
fn previous_sparse_gaps_repeat_the_last_record() {
    let (_dir, path) = scratch("sparse_prev.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer
        .write_var(
            VarSpec {
                name: "mode".to_string(),
                data_type: CdfDataType::Int4,
                sparseness: Sparseness::Previous,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Sparse {
                records: vec![2, 6],
                values: CdfValues::Int4(vec![7, 9]),
            }),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let got = cdf.varget("mode", &VargetOptions::default()).unwrap();
    let CdfValues::Int4(values) = got.data else {
        panic!("wrong type");
    };
    // Before the first physical record the pad value fills in.
    assert_eq!(values[0], values[1]);
    assert_eq!(values[2], 7);
    assert_eq!(&values[3..6], &[7, 7, 7]);
    assert_eq!(values[6], 9);

    // A slice starting inside a gap still sees the previous record.
    let tail = cdf
        .varget(
            "mode",
            &VargetOptions {
                record_range: Some((3, 5)),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(tail.data, CdfValues::Int4(vec![7, 7, 7]));
    assert!(tail.real_records.is_empty());
}

#[test]
fn mixed_type_global_attributes_round_trip() {
    let (_dir, path) = scratch("attrs.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer
        .write_globalattrs(&BTreeMap::from([(
            "Source".to_string(),
            BTreeMap::from([
                (0, CdfValues::String(vec!["MMS1".to_string()])),
                (1, CdfValues::Int4(vec![4])),
                (2, CdfValues::Real8(vec![2.5, -7.0])),
            ]),
        )]))
        .unwrap();
    writer
        .write_globalattrs(&BTreeMap::from([(
            "Mission".to_string(),
            BTreeMap::from([(0, CdfValues::String(vec!["GSE".to_string(), "GSM".to_string()]))]),
        )]))
        .unwrap();
    writer.close().unwrap();

    let cdf = Cdf::open(&path).unwrap();
    let attrs = cdf.globalattsget().unwrap();
    let source = &attrs["Source"];
    assert_eq!(source[&0], CdfValues::String(vec!["MMS1".to_string()]));
    assert_eq!(source[&1], CdfValues::Int4(vec![4]));
    assert_eq!(source[&2], CdfValues::Real8(vec![2.5, -7.0]));
    // Multi-string entries split back into their strings.
    assert_eq!(
        attrs["Mission"][&0],
        CdfValues::String(vec!["GSE".to_string(), "GSM".to_string()])
    );

    let inq = cdf.attinq("Source").unwrap();
    assert_eq!(inq.num_gr_entries, 3);
    let entry = cdf.attget("Source", 2).unwrap();
    assert_eq!(entry.data_type, CdfDataType::Real8);
}

#[test]
fn variable_attributes_and_time_ranges() {
    let (_dir, path) = scratch("depend.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();

    let base = epoch::compute_tt2000(&[2015.0, 3.0, 12.0, 0.0, 0.0, 0.0]).unwrap();
    let epochs: Vec<i64> = (0..100).map(|i| base + i * 1_000_000_000).collect();
    writer
        .write_var(
            VarSpec {
                name: "Epoch".to_string(),
                data_type: CdfDataType::TimeTt2000,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(CdfValues::TimeTt2000(epochs.clone()))),
        )
        .unwrap();
    writer
        .write_var(
            VarSpec {
                name: "density".to_string(),
                data_type: CdfDataType::Real8,
                ..VarSpec::default()
            },
            &BTreeMap::from([(
                "DEPEND_0".to_string(),
                CdfValues::String(vec!["Epoch".to_string()]),
            )]),
            Some(VarRecords::Full(doubles(100, 1))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    // TT2000 data marks the leap-second currency of the file.
    assert_eq!(cdf.info().leapsecond_updated, Some(20_170_101));

    let atts = cdf.varattsget("density").unwrap();
    assert_eq!(
        atts["DEPEND_0"],
        CdfValues::String(vec!["Epoch".to_string()])
    );

    let range = cdf
        .epochrange(
            "Epoch",
            Some(EpochValue::Tt2000(epochs[25])),
            Some(EpochValue::Tt2000(epochs[75])),
        )
        .unwrap();
    assert_eq!(range, Some((25, 75)));
    let past_the_end = cdf
        .epochrange("Epoch", Some(EpochValue::Tt2000(epochs[99] + 1_000_000)), None)
        .unwrap();
    assert_eq!(past_the_end, None);

    let sliced = cdf
        .varget(
            "density",
            &VargetOptions {
                start_time: Some(EpochValue::Tt2000(epochs[10])),
                end_time: Some(EpochValue::Tt2000(epochs[19])),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(sliced.records_returned, 10);
    assert_eq!(sliced.real_records.first(), Some(&10));

    // An explicit record range wins over the time range.
    let overridden = cdf
        .varget(
            "density",
            &VargetOptions {
                record_range: Some((0, 4)),
                start_time: Some(EpochValue::Tt2000(epochs[10])),
                end_time: Some(EpochValue::Tt2000(epochs[19])),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(overridden.records_returned, 5);
}

#[test]
fn per_variable_compression_spans_many_segments() {
    let (_dir, path) = scratch("segments.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    // Blocking factor 2 over 40 records forces 20 segments, which needs a
    // two-level index tree.
    writer
        .write_var(
            VarSpec {
                name: "wave".to_string(),
                data_type: CdfDataType::Real8,
                compression: Some(6),
                blocking_factor: 2,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(40, 1))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let inq = cdf.varinq("wave").unwrap();
    assert_eq!(inq.compression, Some(6));
    let got = cdf.varget("wave", &VargetOptions::default()).unwrap();
    assert_eq!(got.data, doubles(40, 1));

    let middle = cdf
        .varget(
            "wave",
            &VargetOptions {
                record_range: Some((13, 26)),
                ..VargetOptions::default()
            },
        )
        .unwrap();
    assert_eq!(middle.data, CdfValues::Real8((13..27).map(|i| i as f64 / 8.0).collect()));
}

#[test]
fn string_variables_round_trip() {
    let (_dir, path) = scratch("strings.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    let labels = CdfValues::String(vec![
        "Bx".to_string(),
        "By".to_string(),
        "Bz".to_string(),
    ]);
    writer
        .write_var(
            VarSpec {
                name: "label".to_string(),
                data_type: CdfDataType::Char,
                num_elements: 8,
                rec_vary: false,
                dim_sizes: vec![3],
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(labels.clone())),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let got = cdf.varget("label", &VargetOptions::default()).unwrap();
    assert_eq!(got.data, labels);
}

#[test]
fn rvariables_share_the_file_dimensions() {
    let (_dir, path) = scratch("rvars.cdf");
    let mut writer = CdfWriter::create(
        &path,
        CdfSpec {
            r_dim_sizes: vec![3],
            ..CdfSpec::default()
        },
    )
    .unwrap();
    writer
        .write_var(
            VarSpec {
                name: "position".to_string(),
                kind: VariableKind::R,
                data_type: CdfDataType::Real8,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(5, 3))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    let info = cdf.info();
    assert_eq!(info.rvariables, vec!["position".to_string()]);
    assert_eq!(info.r_dim_sizes, vec![3]);
    let inq = cdf.varinq("position").unwrap();
    assert_eq!(inq.kind, VariableKind::R);
    assert_eq!(inq.dim_sizes, vec![3]);
    let got = cdf.varget("position", &VargetOptions::default()).unwrap();
    assert_eq!(got.data, doubles(5, 3));
}

#[test]
fn corrupted_checksum_degrades_but_does_not_block_metadata() {
    let (_dir, path) = scratch("checksum.cdf");
    let mut writer = CdfWriter::create(
        &path,
        CdfSpec {
            checksum: true,
            ..CdfSpec::default()
        },
    )
    .unwrap();
    writer
        .write_var(
            VarSpec {
                name: "n".to_string(),
                data_type: CdfDataType::Real8,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(4, 1))),
        )
        .unwrap();
    writer.close().unwrap();

    // The pristine file verifies.
    let mut good = Cdf::open(&path).unwrap();
    assert!(good.varget("n", &VargetOptions::default()).is_ok());

    // Corrupt the trailer.
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    assert_eq!(cdf.info().zvariables, vec!["n".to_string()]);
    let first_read = cdf.varget("n", &VargetOptions::default());
    assert!(matches!(first_read, Err(CdfError::ChecksumMismatch { .. })));
    // The handle stays usable afterwards.
    assert!(cdf.varget("n", &VargetOptions::default()).is_ok());
}

#[test]
fn writer_state_machine_poisons_and_closes() {
    let (_dir, path) = scratch("state.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    // An invalid spec poisons the writer.
    let error = writer.write_var(VarSpec::default(), &BTreeMap::new(), None);
    assert!(matches!(error, Err(CdfError::OutOfRange(_))));
    assert!(matches!(
        writer.write_globalattrs(&BTreeMap::new()),
        Err(CdfError::Poisoned)
    ));
    // Close aborts without flushing.
    writer.close().unwrap();
    assert!(!path.exists());
}

#[test]
fn write_after_close_is_rejected() {
    let (_dir, path) = scratch("closed.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer.close().unwrap();
    assert!(path.exists());
    assert!(matches!(
        writer.write_globalattrs(&BTreeMap::new()),
        Err(CdfError::Closed)
    ));
}

#[test]
fn missing_names_are_not_found_and_do_not_poison_the_reader() {
    let (_dir, path) = scratch("lookup.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer
        .write_var(
            VarSpec {
                name: "n".to_string(),
                data_type: CdfDataType::Real8,
                ..VarSpec::default()
            },
            &BTreeMap::new(),
            Some(VarRecords::Full(doubles(1, 1))),
        )
        .unwrap();
    writer.close().unwrap();

    let mut cdf = Cdf::open(&path).unwrap();
    assert!(matches!(
        cdf.varget("absent", &VargetOptions::default()),
        Err(CdfError::NotFound(_))
    ));
    assert!(matches!(cdf.attinq("absent"), Err(CdfError::NotFound(_))));
    assert!(cdf.varget("n", &VargetOptions::default()).is_ok());
    assert!(cdf.varinq(0).is_ok());
}

#[test]
fn create_refuses_to_clobber_without_delete() {
    let (_dir, path) = scratch("exists.cdf");
    let mut writer = CdfWriter::create(&path, CdfSpec::default()).unwrap();
    writer.close().unwrap();

    assert!(matches!(
        CdfWriter::create(&path, CdfSpec::default()),
        Err(CdfError::Io(_))
    ));
    let mut replacing = CdfWriter::create(
        &path,
        CdfSpec {
            delete: true,
            ..CdfSpec::default()
        },
    )
    .unwrap();
    replacing.close().unwrap();
    assert!(Cdf::open(&path).is_ok());
}
