//! 跨模块集成测试：格式往返与格式之间的几何联动

use qcio::geometry::{self, cell_multiply, distance_pbc};
use qcio::{
    CubeFile, Cp2kInput, HoldsCoordinates, HoldsLabels, HoldsUnitCell, PathValue, QcioError,
    WriteOptions, Xyz,
};

const UNIT_CUBE: &str = "cube written by hand
second header line
1 0 0 0
1 1 0 0
1 0 2 0
1 0 0 3
12 0 1 2 3
1
";

const WATER_BOX: &str = "&FORCE_EVAL
  &SUBSYS
    &CELL
      ABC 10.0 10.0 10.0
    &END CELL
    &COORD
      O 0.000 0.000 0.117
      H 0.000 0.757 -0.469
    &END COORD
  &END SUBSYS
&END FORCE_EVAL
";

const TWO_ATOMS: &str = "2
dimer
Ar 0.0 0.0 0.0
Ar 3.8 0.0 0.0
";

#[test]
fn cube_serialization_round_trip() {
    let cube: CubeFile = UNIT_CUBE.parse().unwrap();
    let text = cube.to_string();
    let again: CubeFile = text.parse().unwrap();

    for (p, q) in cube.get_coordinates().iter().zip(again.get_coordinates()) {
        for d in 0..3 {
            assert!((p[d] - q[d]).abs() < 1e-6);
        }
    }
    for (a, b) in cube.get_data().iter().zip(again.get_data()) {
        assert!((a - b).abs() < 1e-6);
    }
    assert_eq!(cube.get_voxel_volume(), again.get_voxel_volume());
    assert_eq!(
        (cube.get_xlen(), cube.get_ylen(), cube.get_zlen()),
        (again.get_xlen(), again.get_ylen(), again.get_zlen())
    );
    // 再次写出得到完全相同的文本
    assert_eq!(again.to_string(), text);
}

#[test]
fn cp2k_closing_markers_and_errors() {
    let text = "&SECTIONA\n&SECTIONB\nFOOBAR 1\n&END\nSNAFU 2\n&END SECTIONA\n";
    let input: Cp2kInput = text.parse().unwrap();
    let rendered = input.render(&WriteOptions {
        close_sections: true,
        ..Default::default()
    });
    assert!(rendered.contains("  &END SECTIONB\n"));
    assert!(rendered.contains("&END SECTIONA\n"));

    let truncated = "&SECTIONA\n&SECTIONB\nFOOBAR 1\n&END\nSNAFU 2\n";
    assert!(matches!(
        truncated.parse::<Cp2kInput>(),
        Err(QcioError::ParseError { .. })
    ));
}

#[test]
fn cp2k_coord_wildcard_in_source_order() {
    let input: Cp2kInput = WATER_BOX.parse().unwrap();
    assert_eq!(
        input.get_path("FORCE_EVAL / SUBSYS / COORD / *").unwrap(),
        Some(PathValue::Multiple(vec![
            "O 0.000 0.000 0.117".to_string(),
            "H 0.000 0.757 -0.469".to_string(),
        ]))
    );
}

#[test]
fn xyz_counts_and_frames() {
    let xyz: Xyz = TWO_ATOMS.parse().unwrap();
    assert_eq!(xyz.get_coordinates(), vec![[0.0, 0.0, 0.0], [3.8, 0.0, 0.0]]);

    let overcounted = TWO_ATOMS.replacen('2', "10", 1);
    assert!(matches!(
        overcounted.parse::<Xyz>(),
        Err(QcioError::ParseError { .. })
    ));

    let two_frames = format!("{}{}", TWO_ATOMS, TWO_ATOMS);
    assert!(matches!(
        two_frames.parse::<Xyz>(),
        Err(QcioError::UnsupportedFormat(_))
    ));
}

#[test]
fn capabilities_are_independent() {
    let mut cube: CubeFile = UNIT_CUBE.parse().unwrap();
    let mut xyz: Xyz = TWO_ATOMS.parse().unwrap();
    let input: Cp2kInput = WATER_BOX.parse().unwrap();

    let holders: Vec<&mut dyn HoldsCoordinates> = vec![&mut cube, &mut xyz];
    let counts: Vec<usize> = holders.iter().map(|h| h.count_atoms()).collect();
    assert_eq!(counts, vec![1, 2]);

    let cells: [&dyn HoldsUnitCell; 2] = [&cube, &input];
    let volumes: Vec<f64> = cells
        .iter()
        .map(|c| geometry::cell_volume(&c.get_h_matrix().unwrap()))
        .collect();
    // cube: 三个 Bohr 轴 1×2×3
    assert!((volumes[0] - 6.0 * 0.529177_f64.powi(3)).abs() < 1e-9);
    assert!((volumes[1] - 1000.0).abs() < 1e-9);

    let labelled: &dyn HoldsLabels = &xyz;
    assert_eq!(labelled.get_labels(), vec!["Ar", "Ar"]);
}

#[test]
fn xyz_supercell_in_cp2k_cell() {
    let input: Cp2kInput = WATER_BOX.parse().unwrap();
    let h = input.get_h_matrix().unwrap();
    let xyz: Xyz = TWO_ATOMS.parse().unwrap();

    let supercell = cell_multiply(&xyz.get_coordinates(), 2, 1, 1, Some(&h), false, false).unwrap();
    assert_eq!(supercell.len(), 4);

    let labels: Vec<String> = std::iter::repeat(xyz.get_labels()).take(2).flatten().collect();
    let mut doubled = Xyz::default();
    doubled.set_data(labels, &supercell).unwrap();
    doubled.set_comment("2x1x1");

    let reparsed: Xyz = doubled.to_string().parse().unwrap();
    assert_eq!(reparsed.count_atoms(), 4);
    assert!(reparsed.get_coordinates().contains(&[13.8, 0.0, 0.0]));

    // 最小镜像：跨越晶胞边界的两个原子只相距 1.0
    let d = distance_pbc([0.5, 0.0, 0.0], [9.5, 0.0, 0.0], &h).unwrap();
    assert!((d - 1.0).abs() < 1e-9);
}

#[test]
fn rewritten_cp2k_input_survives_save() {
    let mut input: Cp2kInput = WATER_BOX.parse().unwrap();
    assert_eq!(
        input
            .set_keyword("FORCE_EVAL/SUBSYS/CELL/ABC", "12.0 12.0 12.0")
            .unwrap(),
        1
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.inp");
    input.save(&path).unwrap();

    let reloaded = Cp2kInput::from_file(&path).unwrap();
    let [a, _, _] = reloaded.get_cell_vectors().unwrap();
    assert!((a[0] - 12.0).abs() < 1e-9);
}
