//! Tests for recipe parsing and property access.

use super::*;
use rstest::rstest;

const APPLICATION: &str = "\
class: Application
name: hello
source: [\"src/*.cc\"]
use: ../core
optimize: 2
static: true
children:
  - class: Release
    optimize: 3
  - class: Linux
    link: [pthread]
";

#[test]
fn parses_class_properties_and_children() {
    let recipe = from_str(APPLICATION, Utf8Path::new("Recipe.yml")).expect("parse");
    assert_eq!(recipe.class_name, "Application");
    assert_eq!(recipe.text("name"), "hello");
    assert_eq!(recipe.list("source"), ["src/*.cc"]);
    assert_eq!(recipe.list("use"), ["../core"]);
    assert_eq!(recipe.text("optimize"), "2");
    assert!(recipe.flag("static"));
    let classes: Vec<&str> = recipe
        .children
        .iter()
        .map(|child| child.class_name.as_str())
        .collect();
    assert_eq!(classes, ["Release", "Linux"]);
}

#[test]
fn properties_keep_document_order() {
    let recipe = from_str(APPLICATION, Utf8Path::new("Recipe.yml")).expect("parse");
    let keys: Vec<&str> = recipe.properties.keys().map(String::as_str).collect();
    assert_eq!(keys, ["name", "source", "use", "optimize", "static"]);
}

#[test]
fn missing_class_is_a_parse_error() {
    let err = from_str("name: hello\n", Utf8Path::new("broken.yml")).expect_err("error");
    assert!(matches!(err, RecipeError::Parse { ref path, .. } if path == "broken.yml"));
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
    let err = FileRecipeSource.load(&root).expect_err("error");
    assert!(matches!(err, RecipeError::Read { .. }));
}

#[rstest]
#[case(ConfigValue::from("x"), vec!["x"])]
#[case(ConfigValue::from(""), vec![])]
#[case(ConfigValue::from(["a", "b"]), vec!["a", "b"])]
#[case(ConfigValue::from(true), vec![])]
fn list_reads_scalars_and_lists(#[case] value: ConfigValue, #[case] expected: Vec<&str>) {
    let object = ConfigObject::new("Library").with("link", value);
    assert_eq!(object.list("link"), expected);
}

#[test]
fn absent_keys_read_as_defaults() {
    let object = ConfigObject::new("Library");
    assert_eq!(object.text("compiler"), "");
    assert!(!object.flag("static"));
    assert!(object.list("include-paths").is_empty());
}

#[test]
fn decimal_versions_read_as_text() {
    let recipe = from_str("class: Library\nversion: 1.2\n", Utf8Path::new("Recipe.yml"))
        .expect("parse");
    assert_eq!(recipe.text("version"), "1.2");
}
