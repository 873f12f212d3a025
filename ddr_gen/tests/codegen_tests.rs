use ddr_gen::{ERROR_THRESHOLD, GenError, GeneratorConfig, run};
use ddr_store::{SchemaStore, write_blob};
use ddr_types::{Blob, Constant, Field, Structure};
use std::fs;
use std::path::{Path, PathBuf};

const USER_CODE_BEGIN: &str = "/*[BEGIN USER CODE]*/\n";

fn foo(extra: Vec<Field>) -> Structure {
    let mut foo = Structure::new("Foo")
        .with_field(Field::new("x", "U32", 0))
        .with_field(Field::new("clazz", "struct J9Class *", 8))
        .with_constant(Constant::new("SIZEOF", 16));
    for field in extra {
        foo = foo.with_field(field);
    }
    foo
}

fn write_superset(dir: &Path, structures: Vec<Structure>) -> PathBuf {
    let path = dir.join("superset.yaml");
    write_blob(&path, &Blob::new(structures)).expect("write superset");
    path
}

fn config(source: PathBuf, output: PathBuf) -> GeneratorConfig {
    GeneratorConfig {
        output_dir: output,
        source,
        ..GeneratorConfig::default()
    }
}

fn read(path: PathBuf) -> String {
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e))
}

/* Put lines right after the user code marker of a generated module */
fn insert_user_code(path: &Path, lines: &[&str]) {
    let text = fs::read_to_string(path).expect("read module");
    let mut inserted = String::from(USER_CODE_BEGIN);
    for line in lines {
        inserted.push_str(line);
        inserted.push('\n');
    }
    fs::write(path, text.replacen(USER_CODE_BEGIN, &inserted, 1)).expect("write module");
}

#[test]
fn second_run_on_unchanged_schema_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    let out = dir.path().join("generated");
    let config = config(source, out.clone());

    let first = run(&config).expect("first run");
    assert!(first.is_success());
    assert_eq!(first.generated, vec!["foopointer", "j9classpointer"]);
    assert!(first.mod_file_written);
    let before = read(out.join("foopointer.rs"));

    let second = run(&config).expect("second run");
    assert!(second.is_success());
    assert!(second.generated.is_empty());
    assert_eq!(second.unchanged.len(), 2);
    assert!(!second.mod_file_written);
    assert_eq!(read(out.join("foopointer.rs")), before);
}

#[test]
fn generated_module_has_accessors_and_mod_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    let out = dir.path().join("generated");

    run(&config(source, out.clone())).expect("run");

    let module = read(out.join("foopointer.rs"));
    assert!(module.contains("pub struct FooPointer {"));
    assert!(module.contains("pub fn x(&self) -> DdrResult<UDATA>"));
    assert!(module.contains("pub fn clazz(&self) -> DdrResult<J9ClassPointer>"));
    assert!(module.contains("/*[BEGIN USER IMPORTS]*/"));
    assert!(module.contains(USER_CODE_BEGIN));

    let mod_rs = read(out.join("mod.rs"));
    assert!(mod_rs.contains("pub mod foopointer;\npub mod j9classpointer;\n"));
    assert!(mod_rs.contains("pub use foopointer::FooPointer;"));
    assert!(mod_rs.contains("pub use j9classpointer::J9ClassPointer;"));
}

#[test]
fn user_code_survives_schema_change() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    run(&config(source, out.clone())).expect("first run");

    let module_path = out.join("foopointer.rs");
    insert_user_code(&module_path, &["    pub fn answer(&self) -> u64 { 42 }"]);

    /* Field y appears in a newer capture */
    let source = write_superset(
        dir.path(),
        vec![foo(vec![Field::new("y", "I32", 4)]), Structure::new("J9Class")],
    );
    let summary = run(&config(source, out.clone())).expect("second run");
    assert!(summary.generated.contains(&"foopointer".to_string()));

    let module = read(module_path);
    assert!(module.contains("    pub fn answer(&self) -> u64 { 42 }\n"));
    assert!(module.contains("pub fn y(&self) -> DdrResult<IDATA>"));
    assert_eq!(module.matches("pub fn answer").count(), 1);
}

#[test]
fn cache_flags_declared_in_user_code_enable_caching() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    let config = config(source, out.clone());
    run(&config).expect("first run");
    assert!(!read(out.join("foopointer.rs")).contains("OnceCell"));

    insert_user_code(
        &out.join("foopointer.rs"),
        &["    const CACHE_FIELDS: bool = true;", "    const CACHE_CLASS: bool = false;"],
    );
    run(&config).expect("second run");

    let module = read(out.join("foopointer.rs"));
    assert!(module.contains("use std::cell::OnceCell;"));
    assert!(module.contains("x_cache: OnceCell<UDATA>"));
    assert!(module.contains("if Self::CACHE_FIELDS {"));
}

#[test]
fn cache_properties_apply_without_user_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    let properties = dir.path().join("cache.properties");
    fs::write(&properties, "Foo=false,true\n").expect("write properties");

    let config = GeneratorConfig {
        user_code: false,
        cache_properties: Some(properties),
        ..config(source, out.clone())
    };
    run(&config).expect("run");

    let module = read(out.join("foopointer.rs"));
    assert!(!module.contains("[BEGIN USER CODE]"));
    assert!(module.contains("const CACHE_FIELDS: bool = true;"));
    assert!(module.contains("x_cache: OnceCell<UDATA>"));
    assert!(!read(out.join("j9classpointer.rs")).contains("OnceCell"));
}

#[test]
fn missing_required_field_is_counted_and_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let source = write_superset(
        dir.path(),
        vec![
            foo(vec![Field::new("z", "U32", 12).required().absent()]),
            Structure::new("J9Class"),
        ],
    );

    let summary = run(&config(source, out.clone())).expect("run");
    assert!(!summary.is_success());
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.failed_structures, vec!["Foo"]);
    assert!(matches!(
        summary.errors[0],
        GenError::MissingRequiredField { ref field, .. } if field == "z"
    ));

    /* The rest of the structure is still generated */
    let module = read(out.join("foopointer.rs"));
    assert!(module.contains("pub fn x(&self)"));
    assert!(!module.contains("pub fn z(&self)"));
}

#[test]
fn build_flags_structure_gets_constants_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let flags = Structure::new("J9BuildFlags")
        .with_constant(Constant::new("gc_debug", 0))
        .with_constant(Constant::new("arch_x86", 1));
    let source = write_superset(dir.path(), vec![flags]);

    run(&config(source, out.clone())).expect("run");

    let module = read(out.join("j9buildflags.rs"));
    assert!(module.contains("pub struct J9BuildFlags {"));
    assert!(module.contains("    pub arch_x86: bool,"));
    assert!(!module.contains("[BEGIN USER CODE]"));
    assert!(read(out.join("mod.rs")).contains("pub use j9buildflags::J9BuildFlags;"));
}

#[test]
fn long_user_code_is_copied_to_helper_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let helpers = dir.path().join("helpers");
    let source = write_superset(dir.path(), vec![foo(vec![]), Structure::new("J9Class")]);
    let config = GeneratorConfig {
        helper_dir: Some(helpers.clone()),
        ..config(source, out.clone())
    };
    run(&config).expect("first run");

    let code = [
        "    pub fn first_slot(&self) -> DdrResult<U32> {",
        "        let value = self.x()?;",
        "        // slot zero",
        "        Ok(U32::from(value))",
        "    }",
    ];
    insert_user_code(&out.join("foopointer.rs"), &code);

    let summary = run(&config).expect("second run");
    assert_eq!(summary.helpers, vec![helpers.join("FooPointer.rs")]);
    let helper = read(helpers.join("FooPointer.rs"));
    assert_eq!(helper, format!("{}\n", code.join("\n")));
    assert!(!helpers.join("J9ClassPointer.rs").exists());
}

#[test]
fn store_directory_source_reports_conflicts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store_dir = dir.path().join("store");
    let mut store = SchemaStore::open(&store_dir, None).expect("open store");
    store
        .add_blob("b", &Blob::new(vec![Structure::new("Foo").with_field(Field::new("x", "U32", 0))]))
        .expect("add b");
    store
        .add_blob("c", &Blob::new(vec![Structure::new("Foo").with_field(Field::new("x", "U32", 8))]))
        .expect("add c");

    let out = dir.path().join("generated");
    let summary = run(&config(store_dir, out.clone())).expect("run");

    assert_eq!(summary.error_count, 1);
    assert!(matches!(summary.errors[0], GenError::SchemaConflict(ref c) if c.field == "x"));
    /* The first definition is kept and generated */
    assert!(read(out.join("foopointer.rs")).contains("pub fn x(&self)"));
}

#[test]
fn unreadable_schema_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = run(&config(
        dir.path().join("missing.yaml"),
        dir.path().join("generated"),
    ));
    assert!(matches!(result, Err(GenError::SchemaLoad(_))));
}

#[test]
fn unclassified_field_fails_only_its_structure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("generated");
    let source = write_superset(
        dir.path(),
        vec![
            foo(vec![Field::new("mystery", "Mystery", 12)]),
            Structure::new("J9Class"),
        ],
    );

    let summary = run(&config(source, out.clone())).expect("run");
    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.failed_structures, vec!["Foo"]);
    assert!(matches!(
        summary.errors[0],
        GenError::UnclassifiedType { ref field, ref declared_type, .. }
            if field == "mystery" && declared_type == "Mystery"
    ));
    assert_eq!(summary.generated, vec!["foopointer", "j9classpointer"]);

    let module = read(out.join("foopointer.rs"));
    assert!(module.contains("pub fn x(&self)"));
    assert!(!module.contains("pub fn mystery(&self)"));
}

#[test]
fn error_threshold_stops_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let structures: Vec<Structure> = (0..ERROR_THRESHOLD + 5)
        .map(|i| {
            Structure::new(format!("S{:03}", i))
                .with_field(Field::new("gone", "U32", 0).required().absent())
        })
        .collect();
    let source = write_superset(dir.path(), structures);

    match run(&config(source, dir.path().join("generated"))) {
        Err(GenError::TooManyErrors {
            count,
            failed_structures,
            last,
        }) => {
            assert_eq!(count, ERROR_THRESHOLD);
            assert_eq!(failed_structures.len(), ERROR_THRESHOLD);
            assert_eq!(failed_structures[0], "S000");
            assert!(matches!(
                *last,
                GenError::MissingRequiredField { ref structure, .. } if structure == "S099"
            ));
        }
        other => panic!("expected too many errors, got {:?}", other.map(|s| s.error_count)),
    }
}

#[test]
fn legacy_store_keeps_exact_widths_and_legacy_offsets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store_dir = dir.path().join("store");
    let mut store = SchemaStore::open(&store_dir, None).expect("open store");
    let mut legacy = Blob::new(vec![
        Structure::new("Foo")
            .with_field(Field::new("x", "U32", 0))
            .with_field(Field::new("flags_v1", "U16", 4)),
    ]);
    legacy.format_version = 1;
    store.add_blob("aix", &legacy).expect("add aix");

    let out = dir.path().join("generated");
    let summary = run(&config(store_dir, out.clone())).expect("run");
    assert!(summary.is_success());

    let module = read(out.join("foopointer.rs"));
    assert!(module.contains("pub fn x(&self) -> DdrResult<U32>"));
    assert!(module.contains("Foo::_flagsOffset_()"));
}
