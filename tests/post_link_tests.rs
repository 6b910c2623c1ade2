//! End-to-end tests of the post-link pipeline through the library API.

use std::fs;
use std::path::{Path, PathBuf};

use sycl_post_link::core::{PostLinkConfig, PostLinkError, SpecConstMode, SplitMode};
use sycl_post_link::driver::{run, Outcome};
use sycl_post_link::output::{SimpleTable, COL_CODE, COL_PROPS, COL_SYM};
use sycl_post_link::read_module_file;

fn input(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("inputs")
        .join(name)
}

fn config_in(dir: &Path, input_name: &str) -> PostLinkConfig {
    PostLinkConfig {
        output: Some(dir.join("out.table")),
        output_assembly: true,
        ..PostLinkConfig::new(input(input_name))
    }
}

fn read_table(path: &Path) -> SimpleTable {
    SimpleTable::parse(&fs::read_to_string(path).unwrap()).unwrap()
}

fn column_contents(table: &SimpleTable, column: &str) -> Vec<String> {
    table
        .column(column)
        .unwrap()
        .into_iter()
        .map(|path| fs::read_to_string(path).unwrap())
        .collect()
}

#[test]
fn test_split_per_source_with_runtime_spec_constants() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        split: Some(SplitMode::Source),
        symbols: true,
        spec_const: Some(SpecConstMode::Runtime),
        ..config_in(dir.path(), "two_sources.ll")
    };

    let outcome = run(&config).unwrap();
    let table_path = dir.path().join("out.table");
    assert_eq!(
        outcome,
        Outcome::Table {
            path: table_path.clone(),
            rows: 2
        }
    );

    let file = |name: &str| dir.path().join(name).display().to_string();
    let expected = format!(
        "[Code|Properties|Symbols]\n{}|{}|{}\n{}|{}|{}\n",
        file("out_0.ll"),
        file("out_0.prop"),
        file("out_0.sym"),
        file("out_1.ll"),
        file("out_1.prop"),
        file("out_1.sym"),
    );
    assert_eq!(fs::read_to_string(&table_path).unwrap(), expected);

    let table = read_table(&table_path);
    assert_eq!(
        column_contents(&table, COL_SYM),
        vec!["a1\na2\n".to_string(), "b1\n".to_string()]
    );
    assert_eq!(
        column_contents(&table, COL_PROPS),
        vec![
            "[SYCL/specialization constants]\nSizeA=1|0\n".to_string(),
            "[SYCL/specialization constants]\nSizeA=1|0\nSizeB=1|1\n".to_string(),
        ]
    );

    let code = table.column(COL_CODE).unwrap();
    let a = read_module_file(Path::new(code[0])).unwrap();
    assert!(!a.function("a1").unwrap().is_declaration());
    assert!(!a.function("a2").unwrap().is_declaration());
    assert!(!a.function("common").unwrap().is_declaration());
    assert!(a.function("b1").is_none());
    assert!(a.global("shared").is_some());

    let b = read_module_file(Path::new(code[1])).unwrap();
    assert!(b.function("a1").is_none());
    assert!(b.function("common").is_none());
    assert!(b.global("shared").is_none());
    assert!(b.function("__spirv_SpecConstant_i32").is_some());
}

#[test]
fn test_split_per_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        split: Some(SplitMode::Kernel),
        symbols: true,
        spec_const: Some(SpecConstMode::Runtime),
        ..config_in(dir.path(), "two_sources.ll")
    };
    let Outcome::Table { path, rows } = run(&config).unwrap() else {
        panic!("expected a file table");
    };
    assert_eq!(rows, 3);

    let table = read_table(&path);
    assert_eq!(table.num_rows(), 3);
    assert_eq!(
        column_contents(&table, COL_SYM),
        vec!["a1\n".to_string(), "a2\n".to_string(), "b1\n".to_string()]
    );
    // A partition without spec constant uses still gets an empty property set
    assert_eq!(
        column_contents(&table, COL_PROPS)[1],
        "[SYCL/specialization constants]\n"
    );

    let a2 = read_module_file(Path::new(table.column(COL_CODE).unwrap()[1])).unwrap();
    assert_eq!(a2.functions.len(), 1);
    assert!(a2.globals.is_empty());
}

#[test]
fn test_no_grouped_kernels_reuses_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        split: Some(SplitMode::Source),
        symbols: true,
        ..config_in(dir.path(), "no_module_ids.ll")
    };
    let Outcome::Table { path, rows } = run(&config).unwrap() else {
        panic!("expected a file table");
    };
    assert_eq!(rows, 1);

    let table = read_table(&path);
    assert_eq!(table.columns(), [COL_CODE.to_string(), COL_SYM.to_string()]);
    assert_eq!(
        table.column(COL_CODE).unwrap(),
        vec![input("no_module_ids.ll").display().to_string()]
    );
    assert_eq!(column_contents(&table, COL_SYM), vec![String::new()]);
    assert!(!dir.path().join("out_0.ll").exists());
}

#[test]
fn test_symbols_without_split_lists_all_kernels() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        symbols: true,
        ..config_in(dir.path(), "two_sources.ll")
    };
    let Outcome::Table { path, rows } = run(&config).unwrap() else {
        panic!("expected a file table");
    };
    assert_eq!(rows, 1);
    let table = read_table(&path);
    assert_eq!(column_contents(&table, COL_SYM), vec!["a1\na2\nb1\n".to_string()]);
}

#[test]
fn test_ir_output_only_with_split_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        ir_output_only: true,
        split: Some(SplitMode::Source),
        ..config_in(dir.path(), "two_sources.ll")
    };
    let err = run(&config).unwrap_err();
    assert!(matches!(err, PostLinkError::Usage(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_spec_constant_lowering_is_idempotent() {
    for mode in [SpecConstMode::Default, SpecConstMode::Runtime] {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.ll");
        let second = dir.path().join("second.ll");

        let config = PostLinkConfig {
            output: Some(first.clone()),
            output_assembly: true,
            ir_output_only: true,
            spec_const: Some(mode),
            ..PostLinkConfig::new(input("two_sources.ll"))
        };
        assert_eq!(run(&config).unwrap(), Outcome::Module(first.clone()));

        let config = PostLinkConfig {
            input: first.clone(),
            output: Some(second.clone()),
            ..config
        };
        run(&config).unwrap();

        let first_text = fs::read_to_string(&first).unwrap();
        assert!(!first_text.contains("__sycl_getSpecConstantValue"));
        assert_eq!(first_text, fs::read_to_string(&second).unwrap());
    }
}

#[test]
fn test_default_spec_constants_fold_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("folded.ll");
    let config = PostLinkConfig {
        output: Some(out.clone()),
        output_assembly: true,
        ir_output_only: true,
        spec_const: Some(SpecConstMode::Default),
        ..PostLinkConfig::new(input("two_sources.ll"))
    };
    run(&config).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.contains("call void @common(i32 0)"));
    assert!(text.contains("%s = add i32 0, i32 0"));
}

#[test]
fn test_binary_output_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        output: Some(dir.path().join("out.table")),
        split: Some(SplitMode::Kernel),
        ..PostLinkConfig::new(input("two_sources.ll"))
    };
    let Outcome::Table { path, .. } = run(&config).unwrap() else {
        panic!("expected a file table");
    };
    let table = read_table(&path);
    let code = table.column(COL_CODE).unwrap();
    assert!(code.iter().all(|path| path.ends_with(".bc")));

    let b1 = read_module_file(Path::new(code[2])).unwrap();
    assert!(!b1.function("b1").unwrap().is_declaration());
    assert_eq!(b1.source_filename.as_deref(), Some("device.cpp"));
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = PostLinkConfig {
        split: Some(SplitMode::Kernel),
        ..config_in(dir.path(), "does_not_exist.ll")
    };
    let err = run(&config).unwrap_err();
    assert!(matches!(err, PostLinkError::Io { .. }));
    assert!(err.to_string().contains("does_not_exist.ll"));
}
