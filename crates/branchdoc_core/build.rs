use std::env;
use std::fs;
use std::path::PathBuf;

/// README files published as rustdoc, and the name each is written under
/// in `OUT_DIR`.
const MODULE_DOCS: &[(&str, &str)] = &[
    ("README.md", "README.md"),
    ("src/crdt/README.md", "crdt_README.md"),
];

fn main() {
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").expect("cargo sets OUT_DIR"));

    for &(readme, published) in MODULE_DOCS {
        println!("cargo:rerun-if-changed={readme}");

        // A missing README publishes as empty docs rather than breaking include_str!
        let markdown = fs::read_to_string(readme).unwrap_or_default();
        let target = out_dir.join(published);
        if let Err(e) = fs::write(&target, doc_body(&markdown)) {
            panic!("cannot write {}: {e}", target.display());
        }
    }
}

/// The markdown after a leading `---` metadata block, or all of it when
/// there is none.
fn doc_body(markdown: &str) -> &str {
    let Some(after_open) = markdown.strip_prefix("---") else {
        return markdown;
    };
    match after_open.split_once("\n---") {
        Some((_, rest)) => rest.trim_start(),
        None => markdown,
    }
}
